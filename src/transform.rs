//! Transformer
//!
//! Replaces each component declaration with a runtime component definition and prepends
//! the helper imports it needs. All edits go through the file's [`SpliceBuffer`] in original
//! offsets, so the order components are rewritten in does not matter.
//!
//! [`SpliceBuffer`]: crate::splice::SpliceBuffer

use std::collections::BTreeSet;

use crate::compile::CompilerOptions;
use crate::context::{ComponentContext, ExportKind, FileContext, PropMeta};
use crate::css_vars::generate_css_vars;
use crate::error::CompileError;
use crate::rules::VineRules;
use crate::syntax::{Span, SyntaxTree};
use crate::template::{TemplateCompiler, TemplateRequest};
use crate::virtual_module::style_request_id;

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// Rewrite every component of `ctx` into its runtime form.
pub fn transform(
    rules: &VineRules,
    ctx: &mut FileContext,
    options: &CompilerOptions,
    templates: &dyn TemplateCompiler,
) -> Result<(), CompileError> {
    let inline = options.inline_template;
    let mut imports = ImportSet::default();
    let mut render_fns = String::new();
    let mut edits: Vec<(Span, String)> = Vec::with_capacity(ctx.components.len());

    {
        let eval = rules.set.evaluator(&ctx.tree);
        for component in &ctx.components {
            let style = ctx.styles.get(&component.scope_id);
            if !component.css_bindings.is_empty() && style.is_none() {
                return Err(CompileError::MissingStyle(component.scope_id.clone()));
            }

            let css_vars = generate_css_vars(rules, &eval, component);
            let bindings = template_bindings(&ctx.tree, component, inline);
            let compiled = templates
                .compile(&TemplateRequest {
                    component: &component.name,
                    source: &component.template,
                    inline,
                    bindings: &bindings,
                })
                .map_err(|source| CompileError::Template {
                    component: component.name.clone(),
                    source,
                })?;
            for helper in &compiled.helpers {
                imports.runtime(helper);
            }

            let generator = ComponentGenerator {
                component,
                inline,
                scoped: style.is_some_and(|s| s.scoped),
                css_vars: css_vars.as_deref(),
                bindings: &bindings,
                render: &compiled.code,
            };
            let mut code = generator.generate(&mut imports);
            if !inline {
                render_fns.push_str(&format!(
                    "const {} = {}\n",
                    render_fn_name(&component.name),
                    compiled.code
                ));
            }
            if matches!(component.export, Some(e) if e.kind == ExportKind::Default) {
                code.push_str(&format!("\nexport default {}", component.name));
            }
            edits.push((component.replace_span(), code));
        }
    }

    for (span, code) in edits {
        ctx.buffer.overwrite(span, code)?;
    }

    let mut prelude = imports.render(options);
    for component in &ctx.components {
        if let Some(style) = ctx.styles.get(&component.scope_id) {
            let id = style_request_id(
                &ctx.file_id,
                &component.scope_id,
                style.scoped,
                style.lang.as_str(),
            )?;
            prelude.push_str(&format!("import {}\n", js_string(&id)));
        }
    }
    prelude.push_str(&render_fns);
    ctx.buffer.prepend(&prelude);

    if !inline {
        if let Some(footer) = hmr_footer(ctx) {
            ctx.buffer.append(&footer);
        }
    }

    tracing::debug!(file = %ctx.file_id, components = ctx.components.len(), inline, "transform finished");
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// IMPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct ImportSet {
    runtime: BTreeSet<String>,
    use_defaults: bool,
}

impl ImportSet {
    fn runtime(&mut self, name: &str) {
        self.runtime.insert(name.to_string());
    }

    fn render(&self, options: &CompilerOptions) -> String {
        let mut out = String::new();
        if !self.runtime.is_empty() {
            let specifiers: Vec<String> = self
                .runtime
                .iter()
                .map(|name| format!("{name} as _{name}"))
                .collect();
            out.push_str(&format!(
                "import {{ {} }} from {}\n",
                specifiers.join(", "),
                js_string(&options.runtime_module)
            ));
        }
        if self.use_defaults {
            out.push_str(&format!(
                "import {{ useDefaults as _useDefaults }} from {}\n",
                js_string(&options.helper_module)
            ));
        }
        out
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENT CODE
// ═══════════════════════════════════════════════════════════════════════════════

struct ComponentGenerator<'a> {
    component: &'a ComponentContext,
    inline: bool,
    scoped: bool,
    css_vars: Option<&'a str>,
    bindings: &'a [String],
    render: &'a str,
}

impl ComponentGenerator<'_> {
    fn generate(&self, imports: &mut ImportSet) -> String {
        let c = self.component;
        imports.runtime("defineComponent");

        let mut out = format!("const {} = (() => {{\n", c.name);
        out.push_str("  const __vine = _defineComponent({\n");
        out.push_str(&format!("    name: {},\n", js_string(&c.name)));
        if !c.props.is_empty() {
            out.push_str("    props: {\n");
            for prop in &c.props {
                out.push_str(&format!("      {}: {},\n", js_key(&prop.name), prop_definition(prop)));
            }
            out.push_str("    },\n");
        }
        if !c.emits.is_empty() {
            let names: Vec<String> = c.emits.iter().map(|e| js_string(e)).collect();
            out.push_str(&format!("    emits: [{}],\n", names.join(", ")));
        }
        if let Some(options) = &c.options {
            out.push_str(&format!("    ...({options}),\n"));
        }
        out.push_str("    setup(__props, { emit: __emit, expose: __expose }) {\n");
        out.push_str(&self.setup_body(imports));
        out.push_str("    },\n");
        out.push_str("  })\n");

        if self.scoped {
            out.push_str(&format!("  __vine.__scopeId = 'data-v-{}'\n", c.scope_id));
        }
        if !self.inline {
            out.push_str(&format!("  __vine.__hmrId = '{}'\n", c.scope_id));
            out.push_str(&format!("  __vine.render = {}\n", render_fn_name(&c.name)));
        }
        out.push_str("  return __vine\n");
        out.push_str("})()");
        out
    }

    fn setup_body(&self, imports: &mut ImportSet) -> String {
        let c = self.component;
        let indent = "      ";
        let mut out = String::new();

        let defaults: Vec<String> = c
            .props
            .iter()
            .filter_map(|p| p.default.as_ref().map(|d| format!("{}: {}", js_key(&p.name), d)))
            .collect();
        if defaults.is_empty() {
            out.push_str(&format!("{indent}const props = __props\n"));
        } else {
            imports.use_defaults = true;
            out.push_str(&format!(
                "{indent}const props = _useDefaults(__props, {{ {} }})\n",
                defaults.join(", ")
            ));
        }
        if let Some(binding) = c.props_binding.as_deref().filter(|b| *b != "props") {
            out.push_str(&format!("{indent}const {binding} = props\n"));
        }
        if let Some(pattern) = &c.props_destructure {
            out.push_str(&format!("{indent}const {pattern} = props\n"));
        }
        if let Some(emit) = &c.emits_binding {
            out.push_str(&format!("{indent}const {emit} = __emit\n"));
        }
        for prop in c.props.iter().filter(|p| p.from_macro) {
            imports.runtime("toRef");
            out.push_str(&format!(
                "{indent}const {} = _toRef(props, {})\n",
                prop.name,
                js_string(&prop.name)
            ));
        }
        if let Some(css_vars) = self.css_vars {
            imports.runtime("useCssVars");
            out.push_str(&format!("{indent}{}\n", css_vars.replace('\n', &format!("\n{indent}"))));
        }
        for stmt in &c.setup_statements {
            out.push_str(&format!("{indent}{}\n", stmt.text));
        }
        match &c.expose {
            Some(exposed) => out.push_str(&format!("{indent}__expose({exposed})\n")),
            None => out.push_str(&format!("{indent}__expose()\n")),
        }
        if self.inline {
            out.push_str(&format!("{indent}return {}\n", self.render));
        } else {
            out.push_str(&format!("{indent}return {{ {} }}\n", self.bindings.join(", ")));
        }
        out
    }
}

fn prop_definition(prop: &PropMeta) -> String {
    let mut parts = vec![
        format!("type: {}", runtime_type(prop.type_text.as_deref())),
        format!("required: {}", prop.required),
    ];
    if let Some(validator) = &prop.validator {
        parts.push(format!("validator: {validator}"));
    }
    format!("{{ {} }}", parts.join(", "))
}

/// Runtime prop type constructor(s) for a TypeScript type.
pub fn runtime_type(type_text: Option<&str>) -> String {
    let Some(text) = type_text else {
        return "null".to_string();
    };
    let mut types: Vec<&'static str> = Vec::new();
    for part in split_union(text) {
        let Some(ty) = constructor_for(part) else {
            // any / unknown accept everything
            if matches!(part, "any" | "unknown") {
                return "null".to_string();
            }
            continue;
        };
        if !types.contains(&ty) {
            types.push(ty);
        }
    }
    match types.as_slice() {
        [] => "null".to_string(),
        [single] => single.to_string(),
        many => format!("[{}]", many.join(", ")),
    }
}

fn constructor_for(part: &str) -> Option<&'static str> {
    let part = part.trim();
    if part.starts_with('(') && part.ends_with(')') && !part.contains("=>") {
        return constructor_for(&part[1..part.len() - 1]);
    }
    let quoted = |s: &str| s.starts_with(['\'', '"', '`']);
    match part {
        "string" => Some("String"),
        "number" | "bigint" => Some("Number"),
        "boolean" | "true" | "false" => Some("Boolean"),
        "null" | "undefined" | "void" | "any" | "unknown" | "never" => None,
        "Function" => Some("Function"),
        "Date" => Some("Date"),
        p if quoted(p) => Some("String"),
        p if p.parse::<f64>().is_ok() => Some("Number"),
        p if p.contains("=>") => Some("Function"),
        p if p.ends_with("[]")
            || p.starts_with('[')
            || p.starts_with("Array<")
            || p.starts_with("ReadonlyArray<") =>
        {
            Some("Array")
        }
        _ => Some("Object"),
    }
}

/// Split on `|` outside of brackets.
fn split_union(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut prev = ' ';
    for (i, ch) in text.char_indices() {
        match ch {
            '<' | '(' | '[' | '{' => depth += 1,
            // `=>` is not a closing bracket
            '>' if prev == '=' => {}
            '>' | ')' | ']' | '}' => depth -= 1,
            '|' if depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
        prev = ch;
    }
    parts.push(text[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Names the template can see: props, emit binding, prop locals and top-level setup locals.
///
/// Inline renders get no instance proxy, so props without a setup local are bound as
/// `name: props.name` entries; the object is rebuilt on every render.
fn template_bindings(tree: &SyntaxTree, component: &ComponentContext, inline: bool) -> Vec<String> {
    let mut names: Vec<String> = vec!["props".to_string()];
    let mut push = |name: &str| {
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    };
    if let Some(binding) = &component.props_binding {
        push(binding);
    }
    if let Some(emit) = &component.emits_binding {
        push(emit);
    }
    for prop in component.props.iter().filter(|p| p.from_macro) {
        push(&prop.name);
    }
    for stmt in &component.setup_statements {
        let node = tree.node(stmt.node);
        match node.kind() {
            "lexical_declaration" | "variable_declaration" => {
                for declarator in node.children().filter(|c| c.kind() == "variable_declarator") {
                    let Some(id) = declarator.field("id") else { continue };
                    for ident in id.descendants().filter(|n| n.kind() == "identifier") {
                        push(ident.text());
                    }
                }
            }
            "function_declaration" | "class_declaration" => {
                if let Some(id) = node.field("id") {
                    push(id.text());
                }
            }
            _ => {}
        }
    }

    if inline {
        // Setup locals shadow props of the same name.
        let entries: Vec<String> = component
            .props
            .iter()
            .filter(|p| !p.from_macro && js_key(&p.name) == p.name)
            .filter(|p| !names.iter().any(|n| *n == p.name))
            .map(|p| format!("{0}: props.{0}", p.name))
            .collect();
        names.extend(entries);
    }
    names
}

fn hmr_footer(ctx: &FileContext) -> Option<String> {
    let exported: Vec<(&str, &str)> = ctx
        .components
        .iter()
        .filter_map(|c| match c.export?.kind {
            ExportKind::Named => Some((c.name.as_str(), c.name.as_str())),
            ExportKind::Default => Some(("default", c.name.as_str())),
        })
        .collect();
    if exported.is_empty() {
        return None;
    }

    let affected = ctx
        .patch
        .as_ref()
        .and_then(|p| p.component.as_deref())
        .and_then(|name| exported.iter().find(|(_, local)| *local == name))
        .map(|(key, _)| *key)
        .unwrap_or("");

    let mut out = String::from("\n");
    out.push_str(&format!("export const _rerender_only = {}\n", ctx.render_only));
    out.push_str(&format!("export const _rerender_vcf_fn_name = {}\n", js_string(affected)));
    out.push_str("if (import.meta.hot) {\n");
    for (_, local) in &exported {
        out.push_str(&format!("  __VUE_HMR_RUNTIME__.createRecord({local}.__hmrId, {local})\n"));
    }
    let keys: Vec<String> = exported.iter().map(|(key, _)| js_string(key)).collect();
    out.push_str("  import.meta.hot.accept((mod) => {\n");
    out.push_str("    if (!mod) return\n");
    out.push_str("    const { _rerender_only, _rerender_vcf_fn_name } = mod\n");
    out.push_str(&format!("    for (const key of [{}]) {{\n", keys.join(", ")));
    out.push_str("      if (_rerender_vcf_fn_name && key !== _rerender_vcf_fn_name) continue\n");
    out.push_str("      const comp = mod[key]\n");
    out.push_str("      if (!comp) continue\n");
    out.push_str("      if (_rerender_only) __VUE_HMR_RUNTIME__.rerender(comp.__hmrId, comp.render)\n");
    out.push_str("      else __VUE_HMR_RUNTIME__.reload(comp.__hmrId, comp)\n");
    out.push_str("    }\n");
    out.push_str("  })\n");
    out.push_str("}\n");
    Some(out)
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn render_fn_name(component: &str) -> String {
    format!("__vine_render_{component}")
}

fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

fn js_key(name: &str) -> String {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if valid {
        name.to_string()
    } else {
        js_string(name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_runtime_type_mapping() {
        assert_eq!(runtime_type(Some("string")), "String");
        assert_eq!(runtime_type(Some("number | string")), "[Number, String]");
        assert_eq!(runtime_type(Some("'a' | 'b'")), "String");
        assert_eq!(runtime_type(Some("boolean | undefined")), "Boolean");
        assert_eq!(runtime_type(Some("string[]")), "Array");
        assert_eq!(runtime_type(Some("Array<string | number>")), "Array");
        assert_eq!(runtime_type(Some("(v: string) => void")), "Function");
        assert_eq!(runtime_type(Some("((v: string) => void) | string")), "[Function, String]");
        assert_eq!(runtime_type(Some("{ a: string }")), "Object");
        assert_eq!(runtime_type(Some("Record<string, number>")), "Object");
        assert_eq!(runtime_type(Some("any")), "null");
        assert_eq!(runtime_type(None), "null");
    }

    #[test]
    fn test_prop_definition() {
        let prop = PropMeta {
            name: "size".into(),
            type_text: Some("number".into()),
            required: false,
            default: Some("10".into()),
            validator: Some("(v) => v > 0".into()),
            from_macro: true,
        };
        assert_eq!(
            prop_definition(&prop),
            "{ type: Number, required: false, validator: (v) => v > 0 }"
        );
    }

    #[test]
    fn test_js_key_quotes_when_needed() {
        assert_eq!(js_key("title"), "title");
        assert_eq!(js_key("$el_2"), "$el_2");
        assert_eq!(js_key("update:open"), "\"update:open\"");
        assert_eq!(js_key("2x"), "\"2x\"");
    }
}

//! Analyzer
//!
//! Walks each located component and extracts the metadata the transformer needs: name,
//! template, setup statements, props (type literal merged with `vineProp` macros), emits,
//! expose/options arguments, the style block and its CSS variable bindings.
//!
//! Analysis never fails. Questionable but compilable input is reported as a warning.

use std::collections::BTreeMap;

use crate::context::{scope_id, ComponentContext, CssBinding, SetupStatement};
use crate::diagnostics::Diagnostic;
use crate::locate::LocatedComponent;
use crate::query::Evaluator;
use crate::rules::VineRules;
use crate::style::{css_var_name, extract_css_bindings, StyleDefine, StyleLang};
use crate::syntax::{Node, Span};

#[derive(Debug, Default)]
pub struct Analysis {
    pub components: Vec<ComponentContext>,
    pub styles: BTreeMap<String, StyleDefine>,
    pub warnings: Vec<Diagnostic>,
}

pub fn analyze<'t>(
    rules: &VineRules,
    eval: &Evaluator<'_, 't>,
    file_id: &str,
    located: &[LocatedComponent<'t>],
) -> Analysis {
    let mut analyzer = Analyzer {
        rules,
        eval,
        file_id,
        analysis: Analysis::default(),
    };
    for (ordinal, component) in located.iter().enumerate() {
        let ctx = analyzer.component(ordinal, component);
        analyzer.analysis.components.push(ctx);
    }
    tracing::debug!(
        file = file_id,
        components = analyzer.analysis.components.len(),
        warnings = analyzer.analysis.warnings.len(),
        "analysis finished"
    );
    analyzer.analysis
}

struct Analyzer<'a, 'r, 't> {
    rules: &'a VineRules,
    eval: &'a Evaluator<'r, 't>,
    file_id: &'a str,
    analysis: Analysis,
}

impl<'a, 'r, 't> Analyzer<'a, 'r, 't> {
    fn warn(&mut self, node: Option<Node<'t>>, message: impl Into<String>) {
        let source = self.eval.tree().source();
        self.analysis.warnings.push(Diagnostic::warning(
            self.file_id,
            source,
            message,
            node.map(|n| n.span()),
        ));
    }

    fn component(&mut self, ordinal: usize, located: &LocatedComponent<'t>) -> ComponentContext {
        let decl = located.decl;
        let name = component_name(decl).unwrap_or_else(|| format!("__VineComponent{ordinal}"));
        let mut ctx = ComponentContext::new(
            name,
            decl.id(),
            decl.span(),
            scope_id(self.file_id, ordinal),
        );
        ctx.export = located.export;

        let templates = self.eval.find_all(self.rules.tagged_template, decl);
        let Some(template) = templates.first().copied() else {
            return ctx;
        };
        if templates.len() > 1 {
            self.warn(
                templates.get(1).copied(),
                format!("Component `{}` has more than one vine template; only the first is used", ctx.name),
            );
        }
        if let Some(quasi) = template.field("quasi") {
            let (text, span) = strip_delimiters(quasi);
            ctx.template = text.to_string();
            ctx.template_span = Some(span);
        }

        let Some(function) = component_function(decl, template) else {
            return ctx;
        };

        if let Some(body) = function.field("body") {
            ctx.setup_statements = self.setup_statements(body, template);
        }
        if let Some(params) = function.field("params") {
            self.props_from_params(&mut ctx, params);
        }
        for call in self.eval.find_all(self.rules.macro_call, function) {
            self.macro_call(&mut ctx, call);
        }
        ctx
    }

    fn setup_statements(&self, body: Node<'t>, template: Node<'t>) -> Vec<SetupStatement> {
        if body.kind() != "function_body" {
            return Vec::new();
        }
        body.children()
            .filter(|stmt| !template.is_descendant_of(*stmt) && !self.is_macro_statement(*stmt))
            .map(|stmt| SetupStatement {
                node: stmt.id(),
                span: stmt.span(),
                text: stmt.text().to_string(),
            })
            .collect()
    }

    /// Statements consumed into metadata: a bare macro call, or a declaration whose every
    /// initializer is a macro call.
    fn is_macro_statement(&self, stmt: Node<'t>) -> bool {
        match stmt.kind() {
            "expression_statement" => stmt
                .field("expression")
                .is_some_and(|expr| self.eval.evaluate(self.rules.macro_call, expr)),
            "lexical_declaration" | "variable_declaration" => {
                let mut declarators = stmt.children().filter(|c| c.kind() == "variable_declarator").peekable();
                declarators.peek().is_some()
                    && declarators.all(|d| {
                        d.field("init")
                            .is_some_and(|init| self.eval.evaluate(self.rules.macro_call, init))
                    })
            }
            _ => false,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // PROPS
    // ─────────────────────────────────────────────────────────────────────────────

    fn props_from_params(&mut self, ctx: &mut ComponentContext, params: Node<'t>) {
        let Some(param) = params.children().find(|c| c.kind() == "formal_parameter") else {
            return;
        };
        let binding = param
            .descendants()
            .skip(1)
            .find(|n| matches!(n.kind(), "identifier" | "object_pattern"));
        match binding {
            Some(ident) if ident.kind() == "identifier" => {
                ctx.props_binding = Some(ident.text().to_string());
            }
            Some(pattern) => ctx.props_destructure = Some(pattern.text().to_string()),
            None => {}
        }

        let Some(typing) = self.eval.find(self.rules.props_typing, params) else {
            self.warn(
                Some(param),
                format!(
                    "Props of component `{}` should be typed with an object literal type",
                    ctx.name
                ),
            );
            return;
        };
        for sig in typing.children().filter(|c| c.kind() == "property_signature") {
            let Some(key) = sig.field("key") else { continue };
            let annotation = sig.field("type");
            let gap_end = annotation.map(|a| a.span().start).unwrap_or(sig.span().end);
            let optional = self
                .eval
                .tree()
                .slice(Span::new(key.span().end, gap_end))
                .contains('?');

            let prop = ctx.prop_entry(unquote(key.text()));
            prop.required = !optional;
            prop.type_text = annotation.map(|a| a.text().trim_start_matches(':').trim().to_string());
        }
    }

    fn prop_macro(&mut self, ctx: &mut ComponentContext, call: Node<'t>, callee: &str) {
        let Some(local) = declared_name(call) else {
            // Reported by the validator.
            return;
        };
        let args: Vec<Node<'t>> = call.fields("argument").collect();
        let type_text = call
            .children()
            .find(|c| c.kind() == "type_arguments")
            .map(|t| t.text().trim_start_matches('<').trim_end_matches('>').trim().to_string());

        let (required, default, validator) = match callee {
            "vineProp.withDefault" => (false, args.first().copied(), args.get(1).copied()),
            "vineProp.optional" => (false, None, args.first().copied()),
            _ => (true, None, args.first().copied()),
        };
        let inferred = default.and_then(infer_type_from_literal).map(str::to_string);

        // Macro metadata wins only where it says something.
        let prop = ctx.prop_entry(&local);
        prop.from_macro = true;
        prop.required = required;
        if let Some(default) = default {
            prop.default = Some(default.text().to_string());
        }
        if let Some(validator) = validator {
            prop.validator = Some(validator.text().to_string());
        }
        if let Some(type_text) = type_text.or(inferred) {
            prop.type_text = Some(type_text);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // MACROS
    // ─────────────────────────────────────────────────────────────────────────────

    fn macro_call(&mut self, ctx: &mut ComponentContext, call: Node<'t>) {
        let Some(callee) = call.field("callee").map(|c| c.text()) else {
            return;
        };
        match callee {
            "vineProp" | "vineProp.optional" | "vineProp.withDefault" => {
                self.prop_macro(ctx, call, callee)
            }
            "vineEmits" => self.emits_macro(ctx, call),
            "vineExpose" => {
                ctx.expose = call.fields("argument").next().map(|a| a.text().to_string());
            }
            "vineOptions" => {
                ctx.options = call.fields("argument").next().map(|a| a.text().to_string());
            }
            "vineStyle" | "vineStyle.scoped" => self.style_macro(ctx, call, callee == "vineStyle.scoped"),
            _ => {}
        }
    }

    fn emits_macro(&mut self, ctx: &mut ComponentContext, call: Node<'t>) {
        if ctx.emits_binding.is_some() || !ctx.emits.is_empty() {
            self.warn(
                Some(call),
                format!("Component `{}` declares `vineEmits` more than once", ctx.name),
            );
        }

        let typed = call
            .children()
            .find(|c| c.kind() == "type_arguments")
            .and_then(|args| args.descendants().find(|n| n.kind() == "object_type"));
        let events: Vec<String> = match typed {
            Some(object) => object
                .children()
                .filter(|c| c.kind() == "property_signature")
                .filter_map(|sig| sig.field("key"))
                .map(|key| unquote(key.text()).to_string())
                .collect(),
            None => call
                .fields("argument")
                .next()
                .filter(|arg| arg.kind() == "array_expression")
                .map(|array| {
                    array
                        .children()
                        .filter(|c| c.kind() == "string_literal")
                        .map(|s| unquote(s.text()).to_string())
                        .collect()
                })
                .unwrap_or_default(),
        };
        for event in events {
            if !ctx.emits.contains(&event) {
                ctx.emits.push(event);
            }
        }

        match declared_name(call) {
            Some(binding) => ctx.emits_binding = Some(binding),
            None => self.warn(
                Some(call),
                "`vineEmits` should be assigned to a variable, e.g. `const emit = vineEmits<...>()`",
            ),
        }
    }

    fn style_macro(&mut self, ctx: &mut ComponentContext, call: Node<'t>, scoped: bool) {
        if self.analysis.styles.contains_key(&ctx.scope_id) {
            self.warn(
                Some(call),
                format!("Component `{}` calls `vineStyle` more than once; only the first is used", ctx.name),
            );
            return;
        }
        let Some(arg) = call.fields("argument").next() else {
            return;
        };

        let (source, tag) = match arg.kind() {
            "template_literal" => (strip_delimiters(arg).0, None),
            "tagged_template_expression" => {
                let tag = arg.field("tag").map(|t| t.text());
                let text = arg.field("quasi").map(|q| strip_delimiters(q).0).unwrap_or("");
                (text, tag)
            }
            "string_literal" => (unquote(arg.text()), None),
            _ => {
                self.warn(
                    Some(arg),
                    "`vineStyle` expects a template literal, a tagged template or a string",
                );
                return;
            }
        };
        let lang = match tag {
            None => StyleLang::Css,
            Some(tag) => StyleLang::from_tag(tag).unwrap_or_else(|| {
                self.warn(
                    Some(arg),
                    format!("Unknown style language `{tag}`, falling back to css"),
                );
                StyleLang::Css
            }),
        };

        ctx.css_bindings = extract_css_bindings(source)
            .into_iter()
            .map(|key| CssBinding {
                var_name: css_var_name(&ctx.scope_id, &key),
                key,
            })
            .collect();
        self.analysis.styles.insert(
            ctx.scope_id.clone(),
            StyleDefine {
                source: source.to_string(),
                lang,
                scoped,
            },
        );
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn component_name(decl: Node<'_>) -> Option<String> {
    let id = match decl.kind() {
        "lexical_declaration" | "variable_declaration" => decl
            .children()
            .find(|c| c.kind() == "variable_declarator")
            .and_then(|d| d.field("id")),
        _ => decl.field("id"),
    };
    id.filter(|n| n.kind() == "identifier")
        .map(|n| n.text().to_string())
}

/// Outermost function between the declaration and its template.
fn component_function<'t>(decl: Node<'t>, template: Node<'t>) -> Option<Node<'t>> {
    let is_function = |n: &Node<'t>| {
        matches!(
            n.kind(),
            "function_declaration" | "function_expression" | "arrow_function_expression"
        )
    };
    if decl.kind() == "function_declaration" {
        return Some(decl);
    }
    template
        .ancestors()
        .take_while(|n| *n != decl)
        .filter(is_function)
        .last()
}

/// Identifier a call's result is assigned to, when the call is a declarator initializer.
fn declared_name(call: Node<'_>) -> Option<String> {
    if call.field_name() != Some("init") {
        return None;
    }
    call.parent()
        .filter(|p| p.kind() == "variable_declarator")
        .and_then(|d| d.field("id"))
        .filter(|id| id.kind() == "identifier")
        .map(|id| id.text().to_string())
}

/// Text inside the first and last character (backticks, quotes) and its span.
fn strip_delimiters<'t>(node: Node<'t>) -> (&'t str, Span) {
    let span = node.span();
    if span.len() < 2 {
        return ("", Span::new(span.start, span.start));
    }
    let inner = Span::new(span.start + 1, span.end - 1);
    (node.tree().slice(inner), inner)
}

fn unquote(text: &str) -> &str {
    let bytes = text.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && matches!(first, b'\'' | b'"' | b'`') {
            return &text[1..text.len() - 1];
        }
    }
    text
}

fn infer_type_from_literal(node: Node<'_>) -> Option<&'static str> {
    match node.kind() {
        "string_literal" | "template_literal" => Some("string"),
        "number_literal" => Some("number"),
        "boolean_literal" => Some("boolean"),
        "array_expression" => Some("unknown[]"),
        "object_expression" => Some("object"),
        "arrow_function_expression" | "function_expression" => Some("Function"),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

//! CSS variable injection.
//!
//! Resolves each `v-bind()` key of a component to a runtime expression and emits the
//! `_useCssVars` call placed at the top of `setup`. Resolution order per key:
//!
//! 1. the first setup statement declaring a local of that name (`.value` when the local is
//!    initialized by a ref-producing call),
//! 2. a prop named like the key, or `props.<name>`,
//! 3. otherwise the key is dropped.

use crate::context::{ComponentContext, CssBinding};
use crate::query::Evaluator;
use crate::rules::VineRules;
use crate::syntax::Node;

/// `_useCssVars(...)` source, or `None` when the component has no CSS bindings.
pub fn generate_css_vars<'t>(
    rules: &VineRules,
    eval: &Evaluator<'_, 't>,
    component: &ComponentContext,
) -> Option<String> {
    if component.css_bindings.is_empty() {
        return None;
    }

    let mut lines = String::new();
    for binding in &component.css_bindings {
        match resolve_binding(rules, eval, component, binding) {
            Some(expr) => {
                lines.push_str(&format!("  '{}': ({}),\n", binding.var_name, expr));
            }
            None => {
                tracing::debug!(
                    component = %component.name,
                    key = %binding.key,
                    "css binding matches no setup local or prop"
                );
            }
        }
    }
    Some(format!("_useCssVars(_ctx => ({{\n{lines}}}))"))
}

fn resolve_binding<'t>(
    rules: &VineRules,
    eval: &Evaluator<'_, 't>,
    component: &ComponentContext,
    binding: &CssBinding,
) -> Option<String> {
    let tree = eval.tree();
    for stmt in &component.setup_statements {
        let stmt = tree.node(stmt.node);
        if let Some(local) = declared_locals(rules, eval, stmt)
            .into_iter()
            .find(|l| l.name == binding.key)
        {
            let reactive = local
                .init
                .is_some_and(|init| eval.evaluate(rules.reactive_ref_call, init));
            return Some(if reactive {
                format!("{}.value", local.name)
            } else {
                local.name.to_string()
            });
        }
    }

    let binding_name = component.props_binding.as_deref().unwrap_or("props");
    component
        .props
        .iter()
        .find(|prop| {
            prop.name == binding.key
                || format!("{}.{}", binding_name, prop.name) == binding.key
                || format!("props.{}", prop.name) == binding.key
        })
        .map(|prop| format!("props.{}", prop.name))
}

struct Local<'t> {
    name: &'t str,
    init: Option<Node<'t>>,
}

/// Names declared by a setup statement itself, skipping locals of nested functions.
fn declared_locals<'t>(rules: &VineRules, eval: &Evaluator<'_, 't>, stmt: Node<'t>) -> Vec<Local<'t>> {
    eval.find_all(rules.setup_variable_declaration, stmt)
        .into_iter()
        .filter(|decl| !in_nested_function(*decl, stmt))
        .filter_map(|decl| {
            let (ident, init) = match decl.kind() {
                "variable_declarator" => (decl.field("id")?, decl.field("init")),
                _ => (decl.field("value")?, None),
            };
            (ident.kind() == "identifier").then(|| Local {
                name: ident.text(),
                init,
            })
        })
        .collect()
}

fn in_nested_function<'t>(node: Node<'t>, stmt: Node<'t>) -> bool {
    node.ancestors()
        .take_while(|a| a.id() != stmt.id())
        .chain(std::iter::once(stmt))
        .any(|a| {
            matches!(
                a.kind(),
                "function_declaration" | "function_expression" | "arrow_function_expression"
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::analyze;
    use crate::locate::locate;
    use crate::syntax::SyntaxTree;
    use pretty_assertions::assert_eq;

    fn css_vars(source: &str) -> (String, Option<String>) {
        let rules = VineRules::builtin().unwrap();
        let (tree, _) = SyntaxTree::parse(source);
        let eval = rules.set.evaluator(&tree);
        let located = locate(rules, &eval, tree.root());
        let analysis = analyze(rules, &eval, "test.vine.ts", &located);
        let comp = &analysis.components[0];
        (comp.scope_id.clone(), generate_css_vars(rules, &eval, comp))
    }

    #[test]
    fn test_ref_local_reads_value() {
        let (id, code) = css_vars(
            "function Foo() {\n  const msg = ref('b')\n  vineStyle(`.a { color: v-bind(msg) }`)\n  return vine`<div/>`\n}",
        );
        assert_eq!(
            code.unwrap(),
            format!("_useCssVars(_ctx => ({{\n  '{id}-msg': (msg.value),\n}}))")
        );
    }

    #[test]
    fn test_plain_local_and_props_fallback() {
        let source = r#"
function Foo(props: { size: string; theme: string }) {
  const color = 'red'
  function inner() { const size = 1 }
  vineStyle(`.a { color: v-bind(color); width: v-bind(size); border: v-bind('props.theme'); x: v-bind(nope) }`)
  return vine`<div/>`
}"#;
        let (id, code) = css_vars(source);
        assert_eq!(
            code.unwrap(),
            format!(
                "_useCssVars(_ctx => ({{\n  '{id}-color': (color),\n  '{id}-size': (props.size),\n  '{id}-props_theme': (props.theme),\n}}))"
            )
        );
    }

    #[test]
    fn test_first_declaring_statement_wins() {
        let source = "function Foo() {\n  let a = computed(() => 1)\n  {\n  }\n  vineStyle(`x { y: v-bind(a) }`)\n  return vine`<i/>`\n}";
        let (id, code) = css_vars(source);
        assert_eq!(
            code.unwrap(),
            format!("_useCssVars(_ctx => ({{\n  '{id}-a': (a.value),\n}}))")
        );
    }

    #[test]
    fn test_no_bindings_no_call() {
        let (_, code) = css_vars("function Foo() { vineStyle(`.a{}`); return vine`<i/>` }");
        assert_eq!(code, None);
    }
}

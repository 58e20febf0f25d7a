//! Component Locator
//!
//! Finds every function in a file that carries a `vine` tagged template. Exported
//! components are reported through their inner declaration so the rest of the pipeline
//! sees one node shape regardless of export wrapping.

use crate::context::{ExportInfo, ExportKind};
use crate::query::Evaluator;
use crate::rules::VineRules;
use crate::syntax::Node;

#[derive(Debug, Clone, Copy)]
pub struct LocatedComponent<'t> {
    pub decl: Node<'t>,
    pub export: Option<ExportInfo>,
}

/// Component declarations in source order.
pub fn locate<'t>(rules: &VineRules, eval: &Evaluator<'_, 't>, root: Node<'t>) -> Vec<LocatedComponent<'t>> {
    let mut found: Vec<LocatedComponent<'t>> = Vec::new();
    let mut last_outer: Option<Node<'t>> = None;

    for node in eval.find_all(rules.component_declaration, root) {
        // Components nested in another component belong to its setup.
        if last_outer.is_some_and(|outer| node.is_descendant_of(outer)) {
            continue;
        }
        last_outer = Some(node);

        let export = match node.kind() {
            "export_named_declaration" => Some(ExportKind::Named),
            "export_default_declaration" => Some(ExportKind::Default),
            _ => None,
        };
        let located = match export {
            Some(kind) => match node.field("declaration") {
                Some(decl) => LocatedComponent {
                    decl,
                    export: Some(ExportInfo {
                        kind,
                        span: node.span(),
                    }),
                },
                None => continue,
            },
            None => LocatedComponent { decl: node, export: None },
        };
        found.push(located);
    }

    tracing::debug!(count = found.len(), "located vine components");
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::SyntaxTree;

    fn names(source: &str) -> Vec<(String, Option<ExportKind>)> {
        let rules = VineRules::builtin().unwrap();
        let (tree, _) = SyntaxTree::parse(source);
        let eval = rules.set.evaluator(&tree);
        locate(rules, &eval, tree.root())
            .into_iter()
            .map(|c| {
                let name = c
                    .decl
                    .field("id")
                    .or_else(|| c.decl.children().next().and_then(|d| d.field("id")))
                    .map(|n| n.text().to_string())
                    .unwrap_or_default();
                (name, c.export.map(|e| e.kind))
            })
            .collect()
    }

    #[test]
    fn test_finds_plain_and_exported_components() {
        let source = r#"
function A() { return vine`<div/>` }
export function B() { return vine`<p/>` }
export const C = () => vine`<span/>`
export default function D() { return vine`<i/>` }
function notComponent() { return html`<div/>` }
const alsoNot = () => 1
"#;
        assert_eq!(
            names(source),
            vec![
                ("A".to_string(), None),
                ("B".to_string(), Some(ExportKind::Named)),
                ("C".to_string(), Some(ExportKind::Named)),
                ("D".to_string(), Some(ExportKind::Default)),
            ]
        );
    }

    #[test]
    fn test_exported_decl_has_same_shape_as_plain() {
        let rules = VineRules::builtin().unwrap();
        let (tree, _) = SyntaxTree::parse(
            "function A() { return vine`a` }\nexport function B() { return vine`b` }",
        );
        let eval = rules.set.evaluator(&tree);
        let found = locate(rules, &eval, tree.root());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].decl.kind(), found[1].decl.kind());
    }

    #[test]
    fn test_no_components() {
        assert!(names("const a = 1\nfunction f() {}").is_empty());
    }

    #[test]
    fn test_template_deep_in_body() {
        let source = "function A() { if (x) { return vine`<a/>` } return vine`<b/>` }";
        assert_eq!(names(source), vec![("A".to_string(), None)]);
    }
}

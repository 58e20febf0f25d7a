//! Validator for Vine DSL placement rules.
//!
//! Runs before analysis. Every violation produces its own diagnostic; nothing here stops at
//! the first problem, and nothing here decides whether compilation aborts. That is up to the
//! caller's `on_validate_end` hook.

use crate::diagnostics::Diagnostic;
use crate::locate::LocatedComponent;
use crate::query::Evaluator;
use crate::rules::VineRules;
use crate::syntax::Node;

// ═══════════════════════════════════════════════════════════════════════════════
// MESSAGES
// ═══════════════════════════════════════════════════════════════════════════════

fn outside_macro_message(macro_name: &str) -> String {
    format!("Vue Vine macro `{macro_name}` can only be called inside a Vine component function")
}

const NO_DECL_PROP_MESSAGE: &str =
    "`vineProp` must be the initializer of a variable declaration, e.g. `const title = vineProp<string>()`";

const DECL_STYLE_MESSAGE: &str =
    "`vineStyle` returns nothing and cannot be used as the initializer of a variable declaration";

const ROOT_SCOPE_MESSAGE: &str = "Only imports, exports, type declarations, plain declarations and Vine components are allowed at the root scope of a .vine.ts file";

const SHARED_DECLARATION_MESSAGE: &str =
    "A Vine component must be the only declarator of its declaration; declare each component in its own statement";

const INTERPOLATION_MESSAGE: &str =
    "Vine templates are compiled statically and must not contain `${}` interpolation";

// ═══════════════════════════════════════════════════════════════════════════════
// VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// All placement violations of the file, ordered by position.
pub fn validate<'t>(
    rules: &VineRules,
    eval: &Evaluator<'_, 't>,
    file_id: &str,
    components: &[LocatedComponent<'t>],
) -> Vec<Diagnostic> {
    let root = eval.tree().root();
    let source = eval.tree().source();
    let error = |node: Node<'t>, message: String| {
        Diagnostic::error(file_id, source, message, Some(node.span()))
    };

    let mut findings: Vec<Diagnostic> = Vec::new();
    findings.extend(
        eval.find_all(rules.invalid_outside_macro_call, root)
            .into_iter()
            .map(|call| {
                let name = call.field("callee").map(|c| c.text()).unwrap_or("vine macro");
                error(call, outside_macro_message(name))
            }),
    );
    findings.extend(
        eval.find_all(rules.invalid_no_decl_prop_call, root)
            .into_iter()
            .map(|call| error(call, NO_DECL_PROP_MESSAGE.to_string())),
    );
    findings.extend(
        eval.find_all(rules.invalid_decl_of_style_call, root)
            .into_iter()
            .map(|call| error(call, DECL_STYLE_MESSAGE.to_string())),
    );
    findings.extend(
        // Program children only.
        root.children()
            .filter(|stmt| eval.evaluate(rules.invalid_root_scope_stmt, *stmt))
            .map(|stmt| error(stmt, ROOT_SCOPE_MESSAGE.to_string())),
    );
    for component in components {
        findings.extend(
            component
                .decl
                .children()
                .filter(|c| c.kind() == "variable_declarator")
                .skip(1)
                .map(|declarator| error(declarator, SHARED_DECLARATION_MESSAGE.to_string())),
        );
        findings.extend(
            eval.find_all(rules.template_with_interpolation, component.decl)
                .into_iter()
                .map(|tpl| error(tpl, INTERPOLATION_MESSAGE.to_string())),
        );
    }

    findings.sort_by_key(|d| d.span.map(|s| s.start).unwrap_or(0));
    tracing::debug!(file = file_id, errors = findings.len(), "validation finished");
    findings
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

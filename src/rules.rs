//! Built-in Vine rule catalog.
//!
//! `rules/vine_script.json` is compiled once per process; every rule the pipeline looks up
//! is resolved to a [`RuleId`] up front so a typo in the catalog fails at setup.

use lazy_static::lazy_static;

use crate::error::ConfigError;
use crate::query::{RuleId, RuleSet};

const VINE_SCRIPT_RULES: &str = include_str!("../rules/vine_script.json");

lazy_static! {
    static ref BUILTIN: Result<VineRules, String> =
        VineRules::from_json(VINE_SCRIPT_RULES).map_err(|err| err.to_string());
}

#[derive(Debug)]
pub struct VineRules {
    pub set: RuleSet,
    pub tagged_template: RuleId,
    pub template_with_interpolation: RuleId,
    pub prop_call: RuleId,
    pub style_call: RuleId,
    pub emits_call: RuleId,
    pub expose_call: RuleId,
    pub options_call: RuleId,
    pub macro_call: RuleId,
    pub component_declaration: RuleId,
    pub invalid_outside_macro_call: RuleId,
    pub invalid_no_decl_prop_call: RuleId,
    pub invalid_decl_of_style_call: RuleId,
    pub invalid_root_scope_stmt: RuleId,
    pub props_typing: RuleId,
    pub setup_variable_declaration: RuleId,
    pub reactive_ref_call: RuleId,
}

impl VineRules {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let set = RuleSet::from_json(json)?;
        Ok(Self {
            tagged_template: set.rule("vineTaggedTemplateString")?,
            template_with_interpolation: set.rule("vineTemplateWithInterpolation")?,
            prop_call: set.rule("vinePropCall")?,
            style_call: set.rule("vineStyleCall")?,
            emits_call: set.rule("vineEmitsCall")?,
            expose_call: set.rule("vineExposeCall")?,
            options_call: set.rule("vineOptionsCall")?,
            macro_call: set.rule("macroCall")?,
            component_declaration: set.rule("vineFunctionComponentDeclaration")?,
            invalid_outside_macro_call: set.rule("invalidOutsideMacroCall")?,
            invalid_no_decl_prop_call: set.rule("invalidNoDeclVinePropCall")?,
            invalid_decl_of_style_call: set.rule("invalidDeclOfVineStyleCall")?,
            invalid_root_scope_stmt: set.rule("invalidRootScopeStmt")?,
            props_typing: set.rule("vinePropsTyping")?,
            setup_variable_declaration: set.rule("setupVariableDeclaration")?,
            reactive_ref_call: set.rule("reactiveRefCall")?,
            set,
        })
    }

    /// The shared built-in catalog.
    pub fn builtin() -> Result<&'static VineRules, ConfigError> {
        BUILTIN
            .as_ref()
            .map_err(|message| ConfigError::InvalidCatalog(message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_compiles() {
        let rules = VineRules::builtin().unwrap();
        assert!(rules.set.len() >= 20);
        assert_eq!(rules.set.name(rules.macro_call), "macroCall");
    }
}

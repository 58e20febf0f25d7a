//! Style blocks declared with `vineStyle`.
//!
//! Styles are keyed by component scope id. `v-bind(expr)` references inside a style become
//! CSS custom properties named `<scopeId>-<expr>`, filled at runtime by `useCssVars`.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::context::FileRegistry;
use crate::virtual_module::{parse_query, ModuleType};

lazy_static! {
    static ref V_BIND_RE: Regex =
        Regex::new(r#"v-bind\s*\(\s*(?:'([^']*)'|"([^"]*)"|([^'"()][^()]*?))\s*\)"#).unwrap();
    static ref VAR_NAME_UNSAFE_RE: Regex = Regex::new(r"[^A-Za-z0-9_-]").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleLang {
    #[default]
    Css,
    Scss,
    Sass,
    Less,
    Stylus,
    Postcss,
}

impl StyleLang {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "css" => Some(Self::Css),
            "scss" => Some(Self::Scss),
            "sass" => Some(Self::Sass),
            "less" => Some(Self::Less),
            "stylus" => Some(Self::Stylus),
            "postcss" => Some(Self::Postcss),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::Scss => "scss",
            Self::Sass => "sass",
            Self::Less => "less",
            Self::Stylus => "stylus",
            Self::Postcss => "postcss",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleDefine {
    pub source: String,
    pub lang: StyleLang,
    pub scoped: bool,
}

/// Raw `v-bind()` expressions in order of first appearance.
pub fn extract_css_bindings(source: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for caps in V_BIND_RE.captures_iter(source) {
        let key = binding_key(&caps);
        if !key.is_empty() && !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
    }
    keys
}

fn binding_key<'c>(caps: &Captures<'c>) -> &'c str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().trim())
        .unwrap_or("")
}

pub fn css_var_name(scope_id: &str, key: &str) -> String {
    format!("{}-{}", scope_id, VAR_NAME_UNSAFE_RE.replace_all(key, "_"))
}

/// Replace every `v-bind(expr)` with `var(--<scopeId>-<expr>)`.
pub fn rewrite_css_vars(source: &str, scope_id: &str) -> String {
    V_BIND_RE
        .replace_all(source, |caps: &Captures<'_>| {
            format!("var(--{})", css_var_name(scope_id, binding_key(caps)))
        })
        .into_owned()
}

/// Serve a style virtual module: the stored style source with CSS variables rewritten.
/// `None` when the id is not a style request or nothing is registered for it.
pub fn load_style_module(store: &FileRegistry, id: &str) -> Option<String> {
    let request = parse_query(id).ok()?;
    if request.query.module_type != ModuleType::Style {
        return None;
    }
    let scope_id = request.query.scope_id?;
    let style = store.get(&request.file_id)?.styles.get(&scope_id)?;
    tracing::debug!(file = %request.file_id, scope = %scope_id, "loading style module");
    Some(rewrite_css_vars(&style.source, &scope_id))
}

//! Virtual module ids.
//!
//! Each style block is served to the host bundler as a virtual module whose id is the
//! component file id plus a query string:
//! `<fileId>?type=style&scopeId=<id>&scoped=<bool>&lang=<tag>`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleType {
    #[default]
    Script,
    Style,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VineQuery {
    pub module_type: ModuleType,
    pub scope_id: Option<String>,
    pub scoped: bool,
    pub lang: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRequest {
    pub file_id: String,
    pub query: VineQuery,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuery {
    #[serde(rename = "type")]
    module_type: Option<String>,
    scope_id: Option<String>,
    scoped: Option<String>,
    lang: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StyleQuery<'a> {
    #[serde(rename = "type")]
    module_type: ModuleType,
    scope_id: &'a str,
    scoped: bool,
    lang: &'a str,
}

/// Split a module id on its first `?` and decode the query. A missing `type` means script;
/// `scoped` is true only for the literal `true`.
pub fn parse_query(id: &str) -> Result<ModuleRequest, serde_urlencoded::de::Error> {
    let (file_id, raw) = match id.split_once('?') {
        Some((file_id, query)) => (file_id, serde_urlencoded::from_str::<RawQuery>(query)?),
        None => (id, RawQuery::default()),
    };
    let module_type = match raw.module_type.as_deref() {
        Some("style") => ModuleType::Style,
        _ => ModuleType::Script,
    };
    Ok(ModuleRequest {
        file_id: file_id.to_string(),
        query: VineQuery {
            module_type,
            scope_id: raw.scope_id,
            scoped: raw.scoped.as_deref() == Some("true"),
            lang: raw.lang,
        },
    })
}

pub fn style_request_id(
    file_id: &str,
    scope_id: &str,
    scoped: bool,
    lang: &str,
) -> Result<String, serde_urlencoded::ser::Error> {
    let query = serde_urlencoded::to_string(StyleQuery {
        module_type: ModuleType::Style,
        scope_id,
        scoped,
        lang,
    })?;
    Ok(format!("{file_id}?{query}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_style_id_parses_back() {
        let id = style_request_id("/src/App.vine.ts", "1a2b3c4d", true, "scss").unwrap();
        assert_eq!(
            id,
            "/src/App.vine.ts?type=style&scopeId=1a2b3c4d&scoped=true&lang=scss"
        );
        let request = parse_query(&id).unwrap();
        assert_eq!(request.file_id, "/src/App.vine.ts");
        assert_eq!(
            request.query,
            VineQuery {
                module_type: ModuleType::Style,
                scope_id: Some("1a2b3c4d".to_string()),
                scoped: true,
                lang: Some("scss".to_string()),
            }
        );
    }

    #[test]
    fn test_missing_type_defaults_to_script() {
        let request = parse_query("/src/App.vine.ts").unwrap();
        assert_eq!(request.query.module_type, ModuleType::Script);
        assert!(!request.query.scoped);

        let request = parse_query("/src/App.vine.ts?scoped=yes&v=123").unwrap();
        assert_eq!(request.query.module_type, ModuleType::Script);
        assert!(!request.query.scoped);
    }

    #[test]
    fn test_splits_on_first_question_mark() {
        let request = parse_query("a.vine.ts?type=style&lang=css?x").unwrap();
        assert_eq!(request.file_id, "a.vine.ts");
        assert_eq!(request.query.lang.as_deref(), Some("css?x"));
    }
}

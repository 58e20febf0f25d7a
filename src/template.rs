//! Template compilation seam.
//!
//! Turning markup into a render function is delegated to a [`TemplateCompiler`]. The
//! transformer only needs an expression that evaluates to a render function plus the runtime
//! helpers that expression refers to.

use crate::error::TemplateError;

#[derive(Debug, Clone, Copy)]
pub struct TemplateRequest<'a> {
    pub component: &'a str,
    pub source: &'a str,
    /// Inline render closure (production) or a separate render function (development).
    pub inline: bool,
    /// Object entries visible to the template, in declaration order: shorthand names or
    /// `key: expr` pairs.
    pub bindings: &'a [String],
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompiledTemplate {
    /// JavaScript expression evaluating to a `(ctx, cache)` render function.
    pub code: String,
    /// Runtime helpers referenced as `_<name>`.
    pub helpers: Vec<String>,
}

pub trait TemplateCompiler: Send + Sync {
    fn compile(&self, request: &TemplateRequest<'_>) -> Result<CompiledTemplate, TemplateError>;
}

/// Compiles templates at runtime with the runtime's `compile` function.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeTemplateCompiler;

impl TemplateCompiler for RuntimeTemplateCompiler {
    fn compile(&self, request: &TemplateRequest<'_>) -> Result<CompiledTemplate, TemplateError> {
        let literal = serde_json::to_string(request.source).map_err(|e| {
            TemplateError::new(format!("cannot encode template of `{}`: {e}", request.component))
        })?;
        let render = format!("_compile({literal})");

        if !request.inline {
            return Ok(CompiledTemplate {
                code: render,
                helpers: vec!["compile".to_string()],
            });
        }

        let bindings = request.bindings.join(", ");
        Ok(CompiledTemplate {
            code: format!(
                "((__render) => (_ctx, _cache) => __render(_proxyRefs({{ {bindings} }}), _cache))({render})"
            ),
            helpers: vec!["compile".to_string(), "proxyRefs".to_string()],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request<'a>(source: &'a str, inline: bool, bindings: &'a [String]) -> TemplateRequest<'a> {
        TemplateRequest {
            component: "Foo",
            source,
            inline,
            bindings,
        }
    }

    #[test]
    fn test_dev_render_is_plain_compile_call() {
        let out = RuntimeTemplateCompiler
            .compile(&request("<div class=\"a\">{{ msg }}</div>", false, &[]))
            .unwrap();
        assert_eq!(out.code, r#"_compile("<div class=\"a\">{{ msg }}</div>")"#);
        assert_eq!(out.helpers, vec!["compile"]);
    }

    #[test]
    fn test_inline_render_closes_over_bindings() {
        let bindings = vec!["msg".to_string(), "props".to_string(), "title: props.title".to_string()];
        let out = RuntimeTemplateCompiler
            .compile(&request("<p>\n</p>", true, &bindings))
            .unwrap();
        assert_eq!(
            out.code,
            r#"((__render) => (_ctx, _cache) => __render(_proxyRefs({ msg, props, title: props.title }), _cache))(_compile("<p>\n</p>"))"#
        );
        assert_eq!(out.helpers, vec!["compile", "proxyRefs"]);
    }
}

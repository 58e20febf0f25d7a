//! Compiler entry points.
//!
//! Per file: resolve options → parse → bind context → locate → validate (abort on error)
//! → analyze → transform. Everything is synchronous; the only shared state is the
//! [`FileRegistry`] the caller passes in.

#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::analyze::analyze;
use crate::cache::compute_hash;
use crate::context::{FileContext, FileRegistry};
use crate::diagnostics::Diagnostic;
use crate::error::{CompileError, ConfigError};
use crate::hmr::PatchDescriptor;
use crate::locate::locate;
use crate::rules::VineRules;
use crate::style::rewrite_css_vars;
use crate::template::{RuntimeTemplateCompiler, TemplateCompiler};
use crate::transform::transform;
use crate::validate::validate;
use crate::virtual_module::style_request_id;

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerOptions {
    /// Inline render closures (production). `false` emits separate render functions and
    /// HMR registration (development).
    pub inline_template: bool,
    pub runtime_module: String,
    pub helper_module: String,
    /// Directory for the batch output cache; no caching when unset.
    pub cache_dir: Option<PathBuf>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            inline_template: true,
            runtime_module: "vue".to_string(),
            helper_module: "vue-vine".to_string(),
            cache_dir: None,
        }
    }
}

impl CompilerOptions {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::InvalidOptions)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HOOKS
// ═══════════════════════════════════════════════════════════════════════════════

/// Callbacks the host provides for one compile.
pub trait CompilerHooks {
    /// Called once before parsing; may adjust the options for this file.
    fn on_options_resolved(&mut self, _options: &mut CompilerOptions) {}

    /// Called as soon as the file context exists, before validation.
    fn on_bind_file_ctx(&mut self, _file_id: &str, _ctx: &FileContext) {}

    /// Called after validation. Returning an error aborts the file.
    fn on_validate_end(&mut self) -> Result<(), CompileError> {
        Ok(())
    }

    fn on_error(&mut self, diagnostic: Diagnostic);

    fn on_warn(&mut self, diagnostic: Diagnostic);
}

/// Hooks that collect diagnostics and fail validation when any error was reported.
#[derive(Debug, Default)]
pub struct CollectingHooks {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl CollectingHooks {
    /// Log and drain the collected warnings.
    pub fn flush_warnings(&mut self) -> Vec<Diagnostic> {
        for warning in &self.warnings {
            tracing::warn!("{}", warning.full);
        }
        std::mem::take(&mut self.warnings)
    }
}

impl CompilerHooks for CollectingHooks {
    fn on_validate_end(&mut self) -> Result<(), CompileError> {
        if self.errors.is_empty() {
            return Ok(());
        }
        let combined = self
            .errors
            .iter()
            .map(|d| d.full.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.errors.clear();
        Err(CompileError::Validation(combined))
    }

    fn on_error(&mut self, diagnostic: Diagnostic) {
        self.errors.push(diagnostic);
    }

    fn on_warn(&mut self, diagnostic: Diagnostic) {
        self.warnings.push(diagnostic);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "napi", napi(object))]
pub struct StyleModule {
    /// Virtual module id the compiled code imports.
    pub id: String,
    pub lang: String,
    pub scoped: bool,
    /// Style source with `v-bind()` rewritten to CSS variables.
    pub css: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "napi", napi(object))]
pub struct CompileOutput {
    pub code: String,
    pub styles: Vec<StyleModule>,
    pub warnings: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Full,
    AnalyzeOnly,
}

pub struct VineCompiler {
    rules: &'static VineRules,
    templates: Box<dyn TemplateCompiler>,
    options: CompilerOptions,
}

impl VineCompiler {
    pub fn new(options: CompilerOptions) -> Result<Self, ConfigError> {
        Ok(Self {
            rules: VineRules::builtin()?,
            templates: Box::new(RuntimeTemplateCompiler),
            options,
        })
    }

    pub fn with_template_compiler(mut self, templates: Box<dyn TemplateCompiler>) -> Self {
        self.templates = templates;
        self
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compile one file. Diagnostics go to `hooks`; the context is returned only on success.
    pub fn compile(
        &self,
        source: &str,
        file_id: &str,
        hooks: &mut dyn CompilerHooks,
    ) -> Result<FileContext, CompileError> {
        let (ctx, result) = self.run(source, file_id, hooks, Mode::Full, None);
        result.map(|()| ctx)
    }

    /// Compile one file and register its context in `store`, even when compilation fails.
    ///
    /// A stored patch from a preceding hot update of the same source is carried over so
    /// the generated HMR code can take the render-only path.
    pub fn compile_into<'s>(
        &self,
        store: &'s mut FileRegistry,
        source: &str,
        file_id: &str,
        hooks: &mut dyn CompilerHooks,
    ) -> Result<&'s FileContext, CompileError> {
        let hash = compute_hash(source);
        let carried = store
            .get(file_id)
            .filter(|prev| prev.source_hash == hash && prev.patch.is_some())
            .map(|prev| (prev.render_only, prev.patch.clone()));

        let (ctx, result) = self.run(source, file_id, hooks, Mode::Full, carried);
        let stored = store.insert(ctx);
        result.map(|()| stored)
    }

    /// Compile with [`CollectingHooks`] and return the output text and style modules.
    pub fn compile_to_string(&self, source: &str, file_id: &str) -> Result<CompileOutput, CompileError> {
        let mut hooks = CollectingHooks::default();
        let ctx = self.compile(source, file_id, &mut hooks)?;
        let warnings = hooks
            .flush_warnings()
            .into_iter()
            .map(|d| d.full)
            .collect();

        let mut styles = Vec::new();
        for component in &ctx.components {
            if let Some(style) = ctx.style_of(component) {
                styles.push(StyleModule {
                    id: style_request_id(file_id, &component.scope_id, style.scoped, style.lang.as_str())?,
                    lang: style.lang.as_str().to_string(),
                    scoped: style.scoped,
                    css: rewrite_css_vars(&style.source, &component.scope_id),
                });
            }
        }
        Ok(CompileOutput {
            code: ctx.output(),
            styles,
            warnings,
        })
    }

    /// Validate and analyze without transforming; used for hot updates.
    pub fn analyze_only(
        &self,
        source: &str,
        file_id: &str,
        hooks: &mut dyn CompilerHooks,
    ) -> Result<FileContext, CompileError> {
        let (ctx, result) = self.run(source, file_id, hooks, Mode::AnalyzeOnly, None);
        result.map(|()| ctx)
    }

    fn run(
        &self,
        source: &str,
        file_id: &str,
        hooks: &mut dyn CompilerHooks,
        mode: Mode,
        carried: Option<(bool, Option<PatchDescriptor>)>,
    ) -> (FileContext, Result<(), CompileError>) {
        let span = tracing::debug_span!("vine_compile", file = file_id);
        let _enter = span.enter();

        let mut options = self.options.clone();
        hooks.on_options_resolved(&mut options);

        let (mut ctx, parse_errors) = FileContext::new(file_id, source);
        if let Some((render_only, patch)) = carried {
            ctx.render_only = render_only;
            ctx.patch = patch;
        }
        hooks.on_bind_file_ctx(file_id, &ctx);

        let result = self.run_phases(&mut ctx, parse_errors, &options, hooks, mode);
        (ctx, result)
    }

    fn run_phases(
        &self,
        ctx: &mut FileContext,
        parse_errors: Vec<crate::syntax::ParseError>,
        options: &CompilerOptions,
        hooks: &mut dyn CompilerHooks,
        mode: Mode,
    ) -> Result<(), CompileError> {
        let rules = self.rules;

        let analysis = {
            let eval = rules.set.evaluator(&ctx.tree);
            let source = ctx.tree.source();
            let mut errors: Vec<Diagnostic> = parse_errors
                .into_iter()
                .map(|e| Diagnostic::error(&ctx.file_id, source, e.message, None))
                .collect();

            let located = locate(rules, &eval, ctx.tree.root());
            errors.extend(validate(rules, &eval, &ctx.file_id, &located));
            tracing::debug!(errors = errors.len(), "validation phase done");

            let failures: Vec<String> = errors.iter().map(|d| d.full.clone()).collect();
            for diagnostic in errors {
                hooks.on_error(diagnostic);
            }

            hooks.on_validate_end()?;
            if !failures.is_empty() {
                return Err(CompileError::Validation(failures.join("\n")));
            }
            if located.is_empty() {
                tracing::debug!("no vine components found");
                return Ok(());
            }
            analyze(rules, &eval, &ctx.file_id, &located)
        };

        for warning in analysis.warnings {
            hooks.on_warn(warning);
        }
        ctx.components = analysis.components;
        ctx.styles = analysis.styles;

        if mode == Mode::Full {
            transform(rules, ctx, options, self.templates.as_ref())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults_and_json() {
        let options = CompilerOptions::from_json(r#"{ "inlineTemplate": false }"#).unwrap();
        assert!(!options.inline_template);
        assert_eq!(options.runtime_module, "vue");
        assert_eq!(options.helper_module, "vue-vine");
        assert!(CompilerOptions::from_json("{ \"inlineTemplate\": 3 }").is_err());
    }

    #[test]
    fn test_collecting_hooks_combine_errors() {
        let mut hooks = CollectingHooks::default();
        hooks.on_error(Diagnostic::error("a", "", "first", None));
        hooks.on_error(Diagnostic::error("a", "", "second", None));
        let err = hooks.on_validate_end().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Vue Vine compilation failed:\n[Vue Vine Error] first\n[Vue Vine Error] second"
        );
        assert!(hooks.errors.is_empty());
        assert!(hooks.on_validate_end().is_ok());
    }
}

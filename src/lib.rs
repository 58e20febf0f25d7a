//! # Vue Vine Compiler
//!
//! Compiles `.vine.ts` files, TypeScript modules whose functions return a `vine` tagged
//! template, into plain component definitions for the Vue runtime.
//!
//! ## Pipeline
//!
//! 1. **Parse**: oxc parses the file; the AST is lowered into an owned [`SyntaxTree`].
//! 2. **Locate**: component functions are found with declarative rules ([`RuleSet`]).
//! 3. **Validate**: macro placement, root-scope statements and template interpolation.
//!    Any error aborts the file.
//! 4. **Analyze**: props, emits, expose, options, styles and setup statements are
//!    collected per component.
//! 5. **Transform**: each component declaration is rewritten in place through a
//!    [`SpliceBuffer`](splice::SpliceBuffer).
//!
//! During development, [`VineCompiler::hot_update`] re-analyzes changed files and
//! classifies the change so the dev server can rerender instead of reloading.

#[cfg(feature = "napi")]
use napi_derive::napi;

pub mod analyze;
pub mod cache;
pub mod compile;
pub mod context;
pub mod css_vars;
pub mod diagnostics;
pub mod discovery;
pub mod error;
pub mod hmr;
pub mod locate;
pub mod query;
pub mod rules;
pub mod splice;
pub mod style;
pub mod syntax;
pub mod template;
pub mod transform;
pub mod validate;
pub mod virtual_module;

#[cfg(test)]
mod compile_tests;
#[cfg(test)]
mod hmr_tests;

pub use compile::{
    CollectingHooks, CompileOutput, CompilerHooks, CompilerOptions, StyleModule, VineCompiler,
};
pub use context::{ComponentContext, FileContext, FileRegistry};
pub use diagnostics::{Diagnostic, Severity};
pub use discovery::{compile_dir, find_vine_files, BatchReport};
pub use error::{CompileError, ConfigError};
pub use hmr::{HotUpdate, PatchDescriptor, PatchScope};
pub use query::{RuleConfig, RuleSet};
pub use style::load_style_module;
pub use syntax::SyntaxTree;
pub use virtual_module::{parse_query, ModuleRequest, ModuleType, VineQuery};

// ═══════════════════════════════════════════════════════════════════════════════
// NATIVE BRIDGE
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
fn native_compiler(options_json: Option<String>) -> napi::Result<VineCompiler> {
    let options = match options_json {
        Some(json) => CompilerOptions::from_json(&json)
            .map_err(|e| napi::Error::from_reason(e.to_string()))?,
        None => CompilerOptions::default(),
    };
    VineCompiler::new(options).map_err(|e| napi::Error::from_reason(e.to_string()))
}

/// Compile one Vine file. `options_json` is a camelCase [`CompilerOptions`] object.
#[cfg(feature = "napi")]
#[napi]
pub fn compile_vine_native(
    source: String,
    file_id: String,
    options_json: Option<String>,
) -> napi::Result<CompileOutput> {
    native_compiler(options_json)?
        .compile_to_string(&source, &file_id)
        .map_err(|e| napi::Error::from_reason(e.to_string()))
}

/// Compile every Vine file below `base_dir`.
#[cfg(feature = "napi")]
#[napi]
pub fn compile_dir_native(
    base_dir: String,
    options_json: Option<String>,
) -> napi::Result<serde_json::Value> {
    let compiler = native_compiler(options_json)?;
    let report = compile_dir(&compiler, std::path::Path::new(&base_dir))
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_value(report).map_err(|e| napi::Error::from_reason(e.to_string()))
}

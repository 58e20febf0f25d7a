//! Batch compilation of a source tree.
//!
//! Recursively scans a directory for `.vine.ts` files and compiles them in parallel. Outputs
//! are cached on disk by source hash when the compiler options name a cache directory.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::cache::OutputCache;
use crate::compile::{CompileOutput, VineCompiler};
use crate::error::CompileError;

const VINE_SUFFIX: &str = ".vine.ts";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledFile {
    pub file_id: String,
    #[serde(flatten)]
    pub output: CompileOutput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileFailure {
    pub file_id: String,
    pub message: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub files: Vec<CompiledFile>,
    pub failures: Vec<CompileFailure>,
}

/// All `*.vine.ts` files below `dir`, sorted by path.
pub fn find_vine_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(VINE_SUFFIX))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// Compile every Vine file below `dir`. One failing file does not stop the others.
pub fn compile_dir(compiler: &VineCompiler, dir: &Path) -> Result<BatchReport, CompileError> {
    let cache = compiler
        .options()
        .cache_dir
        .as_ref()
        .map(OutputCache::new)
        .transpose()?;

    let files = find_vine_files(dir);
    tracing::debug!(dir = %dir.display(), count = files.len(), "compiling vine files");

    let results: Vec<Result<CompiledFile, CompileFailure>> = files
        .par_iter()
        .map(|path| compile_file(compiler, cache.as_ref(), path))
        .collect();

    let mut report = BatchReport::default();
    for result in results {
        match result {
            Ok(file) => report.files.push(file),
            Err(failure) => {
                tracing::warn!(file = %failure.file_id, "compilation failed");
                report.failures.push(failure);
            }
        }
    }
    Ok(report)
}

fn compile_file(
    compiler: &VineCompiler,
    cache: Option<&OutputCache>,
    path: &Path,
) -> Result<CompiledFile, CompileFailure> {
    let file_id = path.to_string_lossy().replace('\\', "/");
    let failure = |message: String| CompileFailure {
        file_id: file_id.clone(),
        message,
    };

    let source = fs::read_to_string(path).map_err(|e| failure(format!("failed to read file: {e}")))?;

    if let Some(output) = cache.and_then(|c| c.get::<CompileOutput>(&file_id, &source)) {
        tracing::debug!(file = %file_id, "cache hit");
        return Ok(CompiledFile { file_id, output });
    }

    let output = compiler
        .compile_to_string(&source, &file_id)
        .map_err(|e| failure(e.to_string()))?;
    if let Some(cache) = cache {
        cache.set(&file_id, &source, &output);
    }
    Ok(CompiledFile { file_id, output })
}

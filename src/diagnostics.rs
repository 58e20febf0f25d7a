//! Compiler diagnostics.
//!
//! Validation errors and analysis warnings are values, not panics or `Err`s. They are handed
//! to [`CompilerHooks`](crate::compile::CompilerHooks) as soon as they are produced and carry
//! a pre-rendered `full` message with a one-line code frame.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::syntax::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// 1-based line and column of a span start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn of(source: &str, offset: u32) -> Self {
        let offset = (offset as usize).min(source.len());
        let before = source.get(..offset).unwrap_or(source);
        let line = before.matches('\n').count() as u32 + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = before[line_start..].chars().count() as u32 + 1;
        Self { line, column }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub file_id: String,
    pub span: Option<Span>,
    pub location: Option<SourceLocation>,
    /// Message with location and code frame, ready to print.
    pub full: String,
}

impl Diagnostic {
    pub fn error(file_id: &str, source: &str, message: impl Into<String>, span: Option<Span>) -> Self {
        Self::new(Severity::Error, file_id, source, message.into(), span)
    }

    pub fn warning(
        file_id: &str,
        source: &str,
        message: impl Into<String>,
        span: Option<Span>,
    ) -> Self {
        Self::new(Severity::Warning, file_id, source, message.into(), span)
    }

    fn new(
        severity: Severity,
        file_id: &str,
        source: &str,
        message: String,
        span: Option<Span>,
    ) -> Self {
        let location = span.map(|s| SourceLocation::of(source, s.start));
        let label = match severity {
            Severity::Error => "Vue Vine Error",
            Severity::Warning => "Vue Vine Warning",
        };
        let mut full = format!("[{label}] {message}");
        if let (Some(span), Some(loc)) = (span, location) {
            full.push_str(&format!("\n  --> {}:{}:{}\n", file_id, loc.line, loc.column));
            full.push_str(&code_frame(source, span, loc));
        }
        Self {
            severity,
            message,
            file_id: file_id.to_string(),
            span,
            location,
            full,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

/// The first line of `span` with a caret underline.
fn code_frame(source: &str, span: Span, loc: SourceLocation) -> String {
    let line_text = source.lines().nth(loc.line as usize - 1).unwrap_or("");
    let gutter = loc.line.to_string();
    let pad = " ".repeat(gutter.len());
    let indent = " ".repeat(loc.column as usize - 1);
    let remaining = line_text.chars().count().saturating_sub(loc.column as usize - 1);
    let span_chars = source
        .get(span.range())
        .map(|s| s.lines().next().unwrap_or("").chars().count())
        .unwrap_or(1);
    let carets = "^".repeat(span_chars.min(remaining).max(1));
    format!("{pad} |\n{gutter} | {line_text}\n{pad} | {indent}{carets}")
}

//! Compilation contexts and the file registry.
//!
//! A [`FileContext`] is built from scratch for every compile or re-analysis of a file and
//! replaces any previous entry in the caller-owned [`FileRegistry`]; it is never patched in
//! place.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::cache::compute_hash;
use crate::hmr::PatchDescriptor;
use crate::splice::SpliceBuffer;
use crate::style::StyleDefine;
use crate::syntax::{NodeId, ParseError, Span, SyntaxTree};

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENT METADATA
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropMeta {
    pub name: String,
    /// Raw TypeScript type text, when known.
    pub type_text: Option<String>,
    pub required: bool,
    /// Source text of the `vineProp.withDefault` default value.
    pub default: Option<String>,
    /// Source text of the validator function.
    pub validator: Option<String>,
    /// Declared through a `vineProp` macro and bound to a setup local.
    pub from_macro: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Named,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportInfo {
    pub kind: ExportKind,
    /// Span of the whole export statement.
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CssBinding {
    /// Custom property name without the leading `--`.
    pub var_name: String,
    /// The `v-bind()` expression, e.g. `color` or `props.size`.
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupStatement {
    pub node: NodeId,
    pub span: Span,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ComponentContext {
    pub name: String,
    /// Declaration node, normalized to the inner declaration when exported.
    pub decl: NodeId,
    pub decl_span: Span,
    pub export: Option<ExportInfo>,
    pub template: String,
    /// Template text span, without the backticks.
    pub template_span: Option<Span>,
    pub setup_statements: Vec<SetupStatement>,
    pub props: Vec<PropMeta>,
    /// Name of the first formal parameter, if it is a plain identifier.
    pub props_binding: Option<String>,
    /// Source of the first formal parameter's object pattern, e.g. `{ title, size = 1 }`.
    pub props_destructure: Option<String>,
    pub emits: Vec<String>,
    pub emits_binding: Option<String>,
    pub expose: Option<String>,
    pub options: Option<String>,
    pub scope_id: String,
    pub css_bindings: Vec<CssBinding>,
}

impl ComponentContext {
    pub fn new(name: String, decl: NodeId, decl_span: Span, scope_id: String) -> Self {
        Self {
            name,
            decl,
            decl_span,
            export: None,
            template: String::new(),
            template_span: None,
            setup_statements: Vec::new(),
            props: Vec::new(),
            props_binding: None,
            props_destructure: None,
            emits: Vec::new(),
            emits_binding: None,
            expose: None,
            options: None,
            scope_id,
            css_bindings: Vec::new(),
        }
    }

    pub fn prop(&self, name: &str) -> Option<&PropMeta> {
        self.props.iter().find(|p| p.name == name)
    }

    /// Existing entry for `name`, or a new one appended in declaration order.
    pub fn prop_entry(&mut self, name: &str) -> &mut PropMeta {
        let index = match self.props.iter().position(|p| p.name == name) {
            Some(index) => index,
            None => {
                self.props.push(PropMeta {
                    name: name.to_string(),
                    ..PropMeta::default()
                });
                self.props.len() - 1
            }
        };
        &mut self.props[index]
    }

    pub fn has_defaults(&self) -> bool {
        self.props.iter().any(|p| p.default.is_some())
    }

    /// Span replaced by generated code: the export statement for default exports,
    /// the declaration itself otherwise.
    pub fn replace_span(&self) -> Span {
        match self.export {
            Some(ExportInfo {
                kind: ExportKind::Default,
                span,
            }) => span,
            _ => self.decl_span,
        }
    }
}

/// Scope id for the `ordinal`-th component of `file_id`.
pub fn scope_id(file_id: &str, ordinal: usize) -> String {
    let mut hash = compute_hash(&format!("{file_id}:{ordinal}"));
    hash.truncate(8);
    hash
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct FileContext {
    pub file_id: String,
    pub source_hash: String,
    pub buffer: SpliceBuffer,
    pub tree: SyntaxTree,
    pub components: Vec<ComponentContext>,
    pub styles: BTreeMap<String, StyleDefine>,
    /// Only the template changed since the previous compile.
    pub render_only: bool,
    pub patch: Option<PatchDescriptor>,
}

impl FileContext {
    pub fn new(file_id: &str, source: &str) -> (Self, Vec<ParseError>) {
        let (tree, errors) = SyntaxTree::parse(source);
        let ctx = Self {
            file_id: file_id.to_string(),
            source_hash: compute_hash(source),
            buffer: SpliceBuffer::new(source),
            tree,
            components: Vec::new(),
            styles: BTreeMap::new(),
            render_only: false,
            patch: None,
        };
        (ctx, errors)
    }

    pub fn source(&self) -> &str {
        self.tree.source()
    }

    pub fn component(&self, name: &str) -> Option<&ComponentContext> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn style_of(&self, component: &ComponentContext) -> Option<&StyleDefine> {
        self.styles.get(&component.scope_id)
    }

    /// Final output text.
    pub fn output(&self) -> String {
        self.buffer.render()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// File id to latest [`FileContext`]. Owned by the caller and passed to each entry point.
#[derive(Debug, Default)]
pub struct FileRegistry {
    files: HashMap<String, FileContext>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `ctx`, replacing any previous entry for its file id.
    pub fn insert(&mut self, ctx: FileContext) -> &FileContext {
        match self.files.entry(ctx.file_id.clone()) {
            Entry::Occupied(mut slot) => {
                slot.insert(ctx);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(ctx),
        }
    }

    pub fn get(&self, file_id: &str) -> Option<&FileContext> {
        self.files.get(file_id)
    }

    pub fn remove(&mut self, file_id: &str) -> Option<FileContext> {
        self.files.remove(file_id)
    }

    pub fn contains(&self, file_id: &str) -> bool {
        self.files.contains_key(file_id)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

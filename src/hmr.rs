//! Incremental Differ and hot update driver.
//!
//! On a file change the new source is re-analyzed (no transform) and compared with the
//! stored context component by component. The result is a single [`PatchDescriptor`] saying
//! how much of the module the dev server has to refresh.

use serde::{Deserialize, Serialize};

use crate::cache::compute_hash;
use crate::compile::{CompilerHooks, VineCompiler};
use crate::context::{ComponentContext, FileContext, FileRegistry};
use crate::error::CompileError;
use crate::virtual_module::style_request_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchScope {
    /// Component set changed; re-evaluate the whole module.
    Module,
    Script,
    Template,
    Style,
    /// Nothing observable changed.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchDescriptor {
    pub scope: PatchScope,
    /// Affected component, `None` for module-wide or empty patches.
    pub component: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotUpdate {
    pub patch: PatchDescriptor,
    /// Style virtual modules to refresh; only set for style patches.
    pub style_modules: Vec<String>,
}

/// Classify the change from `old` to `new`, updating `new.render_only`.
///
/// Components are compared pairwise by position. When several differ, the last one
/// determines the result.
pub fn diff(old: &FileContext, new: &mut FileContext) -> PatchDescriptor {
    if old.components.len() != new.components.len() {
        new.render_only = false;
        return PatchDescriptor {
            scope: PatchScope::Module,
            component: None,
        };
    }

    let mut patch = PatchDescriptor {
        scope: PatchScope::Unchanged,
        component: None,
    };
    let mut render_only = new.render_only;
    for (old_comp, new_comp) in old.components.iter().zip(&new.components) {
        let old_style = style_source(old, old_comp);
        let new_style = style_source(new, new_comp);

        let scope = if residual(old, old_comp, old_style) != residual(new, new_comp, new_style) {
            render_only = false;
            PatchScope::Script
        } else if old_comp.template != new_comp.template {
            render_only = true;
            PatchScope::Template
        } else if old_style != new_style {
            render_only = false;
            PatchScope::Style
        } else {
            continue;
        };
        patch = PatchDescriptor {
            scope,
            component: Some(new_comp.name.clone()),
        };
    }
    new.render_only = render_only;
    patch
}

fn style_source<'c>(ctx: &'c FileContext, component: &ComponentContext) -> &'c str {
    ctx.style_of(component).map(|s| s.source.as_str()).unwrap_or("")
}

/// Declaration text with the template span cut out and the style source removed once.
fn residual(ctx: &FileContext, component: &ComponentContext, style: &str) -> String {
    let decl = component.decl_span;
    let text = ctx.tree.slice(decl);
    let without_template = match component.template_span {
        Some(t) if decl.start <= t.start && t.end <= decl.end => {
            let (start, end) = ((t.start - decl.start) as usize, (t.end - decl.start) as usize);
            format!("{}{}", &text[..start], &text[end..])
        }
        _ => text.to_string(),
    };
    without_template.replacen(style, "", 1)
}

impl VineCompiler {
    /// Re-analyze a changed file and record the resulting patch in `store`.
    ///
    /// Returns `Ok(None)` when the file was never compiled or its source is unchanged.
    pub fn hot_update(
        &self,
        store: &mut FileRegistry,
        file_id: &str,
        source: &str,
        hooks: &mut dyn CompilerHooks,
    ) -> Result<Option<HotUpdate>, CompileError> {
        let Some(old) = store.get(file_id) else {
            return Ok(None);
        };
        if old.source_hash == compute_hash(source) {
            return Ok(None);
        }

        let mut new = self.analyze_only(source, file_id, hooks)?;
        let patch = diff(old, &mut new);

        let mut style_modules = Vec::new();
        if patch.scope == PatchScope::Style {
            let component = patch.component.as_deref().and_then(|name| new.component(name));
            if let Some(component) = component {
                if let Some(style) = new.style_of(component) {
                    style_modules.push(style_request_id(
                        file_id,
                        &component.scope_id,
                        style.scoped,
                        style.lang.as_str(),
                    )?);
                }
            }
        }

        tracing::debug!(file = file_id, scope = ?patch.scope, component = ?patch.component, "hot update");
        new.patch = Some(patch.clone());
        store.insert(new);
        Ok(Some(HotUpdate {
            patch,
            style_modules,
        }))
    }
}

//! Hot update flows through the registry.

use pretty_assertions::assert_eq;

use crate::compile::{CollectingHooks, CompilerOptions, VineCompiler};
use crate::context::FileRegistry;
use crate::hmr::{PatchDescriptor, PatchScope};
use crate::style::load_style_module;
use crate::virtual_module::style_request_id;

const FILE: &str = "src/Card.vine.ts";

const V1: &str = r#"export function Card() {
  const color = ref('red')
  vineStyle(`.card { color: v-bind(color) }`)
  return vine`<div class="card">{{ color }}</div>`
}
"#;

fn dev_compiler() -> VineCompiler {
    VineCompiler::new(CompilerOptions {
        inline_template: false,
        ..CompilerOptions::default()
    })
    .unwrap()
}

fn seeded(compiler: &VineCompiler) -> FileRegistry {
    let mut store = FileRegistry::new();
    compiler
        .compile_into(&mut store, V1, FILE, &mut CollectingHooks::default())
        .unwrap();
    store
}

#[test]
fn test_unknown_or_unchanged_file_yields_nothing() {
    let compiler = dev_compiler();
    let mut store = FileRegistry::new();
    let mut hooks = CollectingHooks::default();
    assert_eq!(compiler.hot_update(&mut store, FILE, V1, &mut hooks).unwrap(), None);

    let mut store = seeded(&compiler);
    assert_eq!(compiler.hot_update(&mut store, FILE, V1, &mut hooks).unwrap(), None);
}

#[test]
fn test_template_edit_rerenders_only() {
    let compiler = dev_compiler();
    let mut store = seeded(&compiler);
    let mut hooks = CollectingHooks::default();
    let v2 = V1.replace("{{ color }}", "{{ color }}!");

    let update = compiler.hot_update(&mut store, FILE, &v2, &mut hooks).unwrap().unwrap();
    assert_eq!(
        update.patch,
        PatchDescriptor {
            scope: PatchScope::Template,
            component: Some("Card".into())
        }
    );
    assert!(update.style_modules.is_empty());
    assert!(store.get(FILE).unwrap().render_only);

    let ctx = compiler.compile_into(&mut store, &v2, FILE, &mut hooks).unwrap();
    let code = ctx.output();
    assert!(code.contains("export const _rerender_only = true\n"));
    assert!(code.contains("export const _rerender_vcf_fn_name = \"Card\"\n"));
}

#[test]
fn test_script_edit_reloads() {
    let compiler = dev_compiler();
    let mut store = seeded(&compiler);
    let mut hooks = CollectingHooks::default();
    let v2 = V1.replace("ref('red')", "ref('blue')");

    let update = compiler.hot_update(&mut store, FILE, &v2, &mut hooks).unwrap().unwrap();
    assert_eq!(update.patch.scope, PatchScope::Script);

    let ctx = compiler.compile_into(&mut store, &v2, FILE, &mut hooks).unwrap();
    assert!(ctx.output().contains("export const _rerender_only = false\n"));
}

#[test]
fn test_style_edit_refreshes_style_module() {
    let compiler = dev_compiler();
    let mut store = seeded(&compiler);
    let mut hooks = CollectingHooks::default();
    let v2 = V1.replace(".card { color", ".card { background");

    let update = compiler.hot_update(&mut store, FILE, &v2, &mut hooks).unwrap().unwrap();
    assert_eq!(update.patch.scope, PatchScope::Style);

    let scope = store.get(FILE).unwrap().components[0].scope_id.clone();
    let id = style_request_id(FILE, &scope, false, "css").unwrap();
    assert_eq!(update.style_modules, vec![id.clone()]);
    assert_eq!(
        load_style_module(&store, &id),
        Some(format!(".card {{ background: var(--{scope}-color) }}"))
    );
}

#[test]
fn test_new_component_is_module_wide() {
    let compiler = dev_compiler();
    let mut store = seeded(&compiler);
    let v2 = format!("{V1}export function Badge() {{ return vine`<b/>` }}\n");

    let update = compiler
        .hot_update(&mut store, FILE, &v2, &mut CollectingHooks::default())
        .unwrap()
        .unwrap();
    assert_eq!(update.patch.scope, PatchScope::Module);
    assert_eq!(update.patch.component, None);
}

#[test]
fn test_invalid_edit_keeps_previous_context() {
    let compiler = dev_compiler();
    let mut store = seeded(&compiler);
    let broken = V1.replace("const color = ref('red')", "const color = vineStyle(`x{}`)");

    let result = compiler.hot_update(&mut store, FILE, &broken, &mut CollectingHooks::default());
    assert!(result.is_err());
    assert!(store.get(FILE).unwrap().output().contains("_defineComponent"));
}

#[test]
fn test_failed_compile_is_still_registered() {
    let compiler = dev_compiler();
    let mut store = FileRegistry::new();
    let result = compiler.compile_into(
        &mut store,
        "vineProp('x')",
        "src/Broken.vine.ts",
        &mut CollectingHooks::default(),
    );
    assert!(result.is_err());
    assert!(store.contains("src/Broken.vine.ts"));
}

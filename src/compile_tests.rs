//! End-to-end compilation scenarios.

use pretty_assertions::assert_eq;

use crate::compile::{CollectingHooks, CompilerHooks, CompilerOptions, VineCompiler};
use crate::context::{scope_id, FileContext};
use crate::diagnostics::Diagnostic;
use crate::error::CompileError;
use crate::virtual_module::style_request_id;

const FILE: &str = "test.vine.ts";

fn compiler() -> VineCompiler {
    VineCompiler::new(CompilerOptions::default()).unwrap()
}

fn dev_compiler() -> VineCompiler {
    VineCompiler::new(CompilerOptions {
        inline_template: false,
        ..CompilerOptions::default()
    })
    .unwrap()
}

#[derive(Default)]
struct RecordingHooks {
    bound: Vec<String>,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
    force_dev: bool,
}

impl CompilerHooks for RecordingHooks {
    fn on_options_resolved(&mut self, options: &mut CompilerOptions) {
        if self.force_dev {
            options.inline_template = false;
        }
    }

    fn on_bind_file_ctx(&mut self, file_id: &str, _ctx: &FileContext) {
        self.bound.push(file_id.to_string());
    }

    fn on_error(&mut self, diagnostic: Diagnostic) {
        self.errors.push(diagnostic);
    }

    fn on_warn(&mut self, diagnostic: Diagnostic) {
        self.warnings.push(diagnostic);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT SHAPE
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_inline_component_output() {
    let source = "export function Foo() {\n  const msg = ref('hi')\n  return vine`<div>{{ msg }}</div>`\n}\n";
    let out = compiler().compile_to_string(source, FILE).unwrap();

    let expected = r#"import { compile as _compile, defineComponent as _defineComponent, proxyRefs as _proxyRefs } from "vue"
export const Foo = (() => {
  const __vine = _defineComponent({
    name: "Foo",
    setup(__props, { emit: __emit, expose: __expose }) {
      const props = __props
      const msg = ref('hi')
      __expose()
      return ((__render) => (_ctx, _cache) => __render(_proxyRefs({ props, msg }), _cache))(_compile("<div>{{ msg }}</div>"))
    },
  })
  return __vine
})()
"#;
    assert_eq!(out.code, expected);
    assert!(out.styles.is_empty());
    assert!(out.warnings.is_empty());
}

#[test]
fn test_file_without_components_is_untouched() {
    let source = "import { ref } from 'vue'\nexport const count = ref(0)\n";
    let out = compiler().compile_to_string(source, FILE).unwrap();
    assert_eq!(out.code, source);
}

#[test]
fn test_default_export_replaces_statement() {
    let source = "export default function Foo() { return vine`<i/>` }\n";
    let out = compiler().compile_to_string(source, FILE).unwrap();
    assert!(out.code.contains("const Foo = (() => {"));
    assert!(!out.code.contains("export default function"));
    assert!(out.code.trim_end().ends_with("export default Foo"));
}

#[test]
fn test_props_and_defaults() {
    let source = r#"
export function Counter(props: { label: string; step?: number | string }) {
  const start = vineProp.withDefault(10)
  const emit = vineEmits<{ change: [value: number] }>()
  return vine`<button @click="emit('change', start)">{{ label }}</button>`
}
"#;
    let out = compiler().compile_to_string(source, FILE).unwrap();
    let code = &out.code;
    assert!(code.contains("import { useDefaults as _useDefaults } from \"vue-vine\"\n"));
    assert!(code.contains("      label: { type: String, required: true },\n"));
    assert!(code.contains("      step: { type: [Number, String], required: false },\n"));
    assert!(code.contains("      start: { type: Number, required: false },\n"));
    assert!(code.contains("    emits: [\"change\"],\n"));
    assert!(code.contains("      const props = _useDefaults(__props, { start: 10 })\n"));
    assert!(code.contains("      const emit = __emit\n"));
    assert!(code.contains("      const start = _toRef(props, \"start\")\n"));
    assert!(code.contains("toRef as _toRef"));
    assert!(code.contains("_proxyRefs({ props, emit, start, label: props.label, step: props.step })"));
    assert!(!code.contains("vineProp"));
    assert!(!code.contains("vineEmits"));
}

#[test]
fn test_scoped_style_and_css_vars() {
    let source = r#"export function Card() {
  const color = ref('red')
  vineStyle.scoped(`.card { color: v-bind(color) }`)
  return vine`<div class="card"/>`
}
"#;
    let out = compiler().compile_to_string(source, FILE).unwrap();
    let id = scope_id(FILE, 0);
    let request = style_request_id(FILE, &id, true, "css").unwrap();

    assert!(out.code.contains(&format!("import {}\n", serde_json::Value::from(request.as_str()))));
    assert!(out.code.contains(&format!("  __vine.__scopeId = 'data-v-{id}'\n")));
    assert!(out.code.contains(&format!("'{id}-color': (color.value),")));
    assert!(out.code.contains("useCssVars as _useCssVars"));
    assert_eq!(out.styles.len(), 1);
    assert_eq!(out.styles[0].id, request);
    assert!(out.styles[0].scoped);
    assert_eq!(out.styles[0].css, format!(".card {{ color: var(--{id}-color) }}"));
}

#[test]
fn test_inline_render_binds_type_literal_props() {
    let source = "export function Foo(props: { label: string }) { return vine`<p>{{ label }}</p>` }";
    let out = compiler().compile_to_string(source, FILE).unwrap();
    assert!(out
        .code
        .contains(r#"__render(_proxyRefs({ props, label: props.label }), _cache))(_compile("<p>{{ label }}</p>"))"#));

    let dev = dev_compiler().compile_to_string(source, FILE).unwrap();
    assert!(dev.code.contains("      return { props }\n"));
}

#[test]
fn test_destructured_props_are_rebound() {
    let source = "export function Foo({ title }: { title: string }) {\n  const upper = title.toUpperCase()\n  return vine`<p>{{ upper }}</p>`\n}\n";
    let out = compiler().compile_to_string(source, FILE).unwrap();
    assert!(out.code.contains(
        "      const props = __props\n      const { title } = props\n      const upper = title.toUpperCase()\n"
    ));
    assert!(out.code.contains("_proxyRefs({ props, upper, title: props.title })"));
}

#[test]
fn test_components_sharing_a_declaration_abort() {
    let source = "export const A = () => vine`<a/>`, B = () => vine`<b/>`";
    let err = compiler().compile_to_string(source, FILE).unwrap_err();
    assert!(matches!(err, CompileError::Validation(_)));
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEVELOPMENT MODE
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_dev_mode_render_function_and_hmr_footer() {
    let source = "export function Foo() {\n  const msg = ref('hi')\n  return vine`<p>{{ msg }}</p>`\n}\n";
    let out = dev_compiler().compile_to_string(source, FILE).unwrap();
    let code = &out.code;
    let id = scope_id(FILE, 0);

    assert!(code.starts_with(
        "import { compile as _compile, defineComponent as _defineComponent } from \"vue\"\nconst __vine_render_Foo = _compile(\"<p>{{ msg }}</p>\")\n"
    ));
    assert!(code.contains("      return { props, msg }\n"));
    assert!(code.contains(&format!("  __vine.__hmrId = '{id}'\n")));
    assert!(code.contains("  __vine.render = __vine_render_Foo\n"));
    assert!(code.contains("export const _rerender_only = false\n"));
    assert!(code.contains("export const _rerender_vcf_fn_name = \"\"\n"));
    assert!(code.contains("__VUE_HMR_RUNTIME__.createRecord(Foo.__hmrId, Foo)"));
}

#[test]
fn test_options_hook_can_switch_mode() {
    let source = "export function Foo() { return vine`<i/>` }";
    let mut hooks = RecordingHooks {
        force_dev: true,
        ..RecordingHooks::default()
    };
    let ctx = compiler().compile(source, FILE, &mut hooks).unwrap();
    assert!(ctx.output().contains("__vine.__hmrId"));
    assert_eq!(hooks.bound, vec![FILE]);
}

#[test]
fn test_unexported_component_has_no_hmr_footer() {
    let out = dev_compiler()
        .compile_to_string("function Foo() { return vine`<i/>` }", FILE)
        .unwrap();
    assert!(!out.code.contains("import.meta.hot"));
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_validation_errors_abort() {
    let source = "vineProp('x')\nfunction Foo() { return vine`<div>${1}</div>` }";
    let err = compiler().compile_to_string(source, FILE).unwrap_err();
    let message = match err {
        CompileError::Validation(message) => message,
        other => panic!("expected validation error, got {other:?}"),
    };
    assert!(message.starts_with("[Vue Vine Error]"));
    assert_eq!(message.matches("[Vue Vine Error]").count(), 2);
}

#[test]
fn test_errors_abort_even_when_hook_accepts() {
    let source = "function Foo() { const s = vineStyle(`a{}`); return vine`<i/>` }";
    let mut hooks = RecordingHooks::default();
    let result = compiler().compile(source, FILE, &mut hooks);

    assert!(matches!(result, Err(CompileError::Validation(_))));
    assert_eq!(hooks.errors.len(), 1);
    assert_eq!(hooks.bound, vec![FILE]);
}

#[test]
fn test_warnings_do_not_abort() {
    let source = "function Foo() { vineEmits(['a']); return vine`<i/>` }";
    let mut hooks = CollectingHooks::default();
    let ctx = compiler().compile(source, FILE, &mut hooks).unwrap();
    assert_eq!(ctx.components.len(), 1);
    assert_eq!(hooks.warnings.len(), 1);
    assert!(hooks.errors.is_empty());
}

#[test]
fn test_syntax_errors_are_reported() {
    let mut hooks = CollectingHooks::default();
    let result = compiler().compile("function Foo( { return vine`<i/>`", FILE, &mut hooks);
    assert!(matches!(result, Err(CompileError::Validation(_))));
}

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use shaderfx::{
    Config,
    backend::{CompileContext, IncludeResolver, ShaderCompiler, StageRequest},
    batch,
    binary::{deserialize, serialize},
    effect::{
        BlendFactor, CompareOp, CullMode, DataKind, PolygonMode, ResourceKind, ShaderDataType,
        StageKind, StageMask, VertexInputRate,
    },
    error::{Error, ParseError, SemanticError},
    load_effect,
    roundtrip::assert_equal,
};

/// Deterministic stand-in for a GLSL compiler: SPIR-V magic, stage tag, source length.
struct FakeCompiler;

impl ShaderCompiler for FakeCompiler {
    fn compile(
        &self,
        request: &StageRequest,
        _includes: &dyn IncludeResolver,
    ) -> Result<Vec<u32>, String> {
        if request.source.contains("#error") {
            return Err(format!("{}: #error directive", request.file_name));
        }
        Ok(vec![
            0x0723_0203,
            request.stage as u32,
            request.source.len() as u32,
        ])
    }
}

fn cases_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("cases")
}

fn load_case(name: &str) -> Result<shaderfx::Effect, Error> {
    let path = cases_root().join(name);
    let source = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read case {}: {e}", path.display()));
    load_effect(&source, &path)
}

fn fake_context(path: &Path) -> CompileContext {
    CompileContext::for_source(path).with_compiler(Arc::new(FakeCompiler))
}

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("shaderfx-it-{tag}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn basic_effect_parses_to_expected_tree() {
    let effect = load_case("basic.kfx").unwrap();
    assert_eq!(effect.name, "Basic");

    assert_eq!(effect.vertex_layouts.len(), 1);
    let layout = &effect.vertex_layouts[0];
    assert_eq!(layout.name, "Default");
    assert_eq!(layout.attributes.len(), 1);
    let attr = layout.attributes[0];
    assert_eq!(attr.format, ShaderDataType::scalar(DataKind::Float3));
    assert_eq!((attr.binding, attr.location, attr.offset), (0, 0, 0));

    assert_eq!(effect.render_states.len(), 1);
    let state = &effect.render_states[0];
    assert_eq!(state.cull, CullMode::Back);
    assert!(state.depth_write);

    assert_eq!(effect.passes.len(), 1);
    let pass = &effect.passes[0];
    assert_eq!(pass.render_state.as_ref().unwrap().name, "Main");
    assert!(pass.vertex_layout.is_none());
    assert!(pass.constant_buffer.is_none());
    let stages: Vec<_> = pass
        .stages
        .iter()
        .map(|s| (s.kind, s.fragment.name.as_str(), s.fragment.target.map(|h| h.index())))
        .collect();
    assert_eq!(
        stages,
        vec![
            (StageKind::Vertex, "Foo", Some(0)),
            (StageKind::Fragment, "Foo", Some(0)),
        ]
    );
    assert!(effect.code_fragments[0].source.contains("gl_Position"));
}

#[test]
fn sprite_effect_covers_layout_and_render_state() {
    let effect = load_case("sprite.kfx").unwrap();
    assert_eq!(effect.name, "Sprite");

    let layout = &effect.vertex_layouts[0];
    assert_eq!(layout.attributes.len(), 3);
    assert_eq!(layout.attributes[2].format.kind, DataKind::UByte4N);
    assert_eq!(layout.bindings[1].rate, VertexInputRate::PerInstance);
    assert_eq!(layout.bindings[0].stride, 24);

    let local = &effect.local_resources[0];
    let camera = &local.bindings[0];
    assert_eq!(camera.kind, ResourceKind::UniformBuffer);
    assert_eq!(camera.stages, StageMask::VERTEX);
    assert_eq!(camera.size, Some(128));
    assert_eq!(camera.buffer.map(|h| h.index()), Some(0));
    let albedo = &local.bindings[1];
    assert_eq!(albedo.kind, ResourceKind::Sampler);
    assert_eq!((albedo.binding, albedo.set), (1, 1));
    assert!(albedo.buffer.is_none());

    let lights = &effect.global_resources[0].bindings[0];
    assert_eq!((lights.binding, lights.set, lights.size), (2, 2, Some(260)));

    let push = &effect.constant_buffers[0];
    assert_eq!(push.size(), Some(80));
    assert_eq!(push.fields[1].stages, Some(StageMask::FRAGMENT));
    assert_eq!(push.fields[0].stages, None);

    let names: Vec<_> = effect.render_states.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Opaque", "Premultiplied", "Wireframe"]);
    let premultiplied = &effect.render_states[1];
    assert_eq!(premultiplied.cull, CullMode::None);
    assert_eq!(premultiplied.depth_test, CompareOp::Always);
    assert!(!premultiplied.depth_write);
    assert!(premultiplied.blend.enabled);
    assert_eq!(premultiplied.blend.src_alpha, BlendFactor::One);
    assert_eq!(premultiplied.blend.dst_alpha, BlendFactor::OneMinusSrcAlpha);
    let wireframe = &effect.render_states[2];
    assert_eq!(wireframe.polygon_mode, PolygonMode::Line);
    assert_eq!(wireframe.line_width, 1.5);

    let main = effect.pass("Main").unwrap();
    assert_eq!(main.resources.as_ref().unwrap().target.map(|h| h.index()), Some(0));
    assert_eq!(main.render_state.as_ref().unwrap().target.map(|h| h.index()), Some(1));
    let debug = effect.pass("Debug").unwrap();
    assert_eq!(debug.render_state.as_ref().unwrap().target.map(|h| h.index()), Some(2));
    assert!(effect.code_fragments[0].source.contains("if (true) { }"));
}

#[test]
fn undeclared_render_state_is_reported_by_name() {
    let err = load_case("unresolved_render_state.kfx").unwrap_err();
    match err {
        Error::Semantic(SemanticError::UnresolvedReference { kind, name, scope }) => {
            assert_eq!(kind, "render state");
            assert_eq!(name, "Transparent");
            assert_eq!(scope, "Main");
        }
        other => panic!("expected unresolved render state, got {other:?}"),
    }
}

#[test]
fn declared_size_must_match_buffer_fields() {
    let err = load_case("buffer_size_mismatch.kfx").unwrap_err();
    assert!(
        matches!(
            &err,
            Error::Semantic(SemanticError::BufferSizeMismatch {
                buffer,
                declared: 64,
                computed: 32,
            }) if buffer == "Bar"
        ),
        "{err:?}"
    );
    assert!(err.to_string().contains("Bar"));
}

#[test]
fn array_suffix_parses_to_length() {
    let effect = load_effect(
        "Layout { UniformBuffer U { UInt[4] a; UInt b; } }",
        Path::new("arrays.kfx"),
    )
    .unwrap();
    let fields = &effect.uniform_buffers[0].fields;
    assert_eq!(fields[0].ty, ShaderDataType::array(DataKind::UInt, 4));
    assert_eq!(fields[1].ty, ShaderDataType::scalar(DataKind::UInt));
    assert_eq!(effect.name, "arrays");
}

#[test]
fn grammar_breaking_mutations_fail() {
    let source = fs::read_to_string(cases_root().join("sprite.kfx")).unwrap();
    let mutations = [
        ("Mat4 view;", "Mat4 view"),
        ("Float4 tint", "Float3x tint"),
        ("Binding(0);", "Binding(0)"),
        ("UInt count;", "UInt[ count;"),
        ("Float4[16]", "Float4[-16]"),
        ("ZTest Always", "ZTest Sometimes"),
        ("RenderState Wireframe", "RenderState Wirefram"),
        ("Pass Debug {", "Pass Debug"),
    ];
    for (from, to) in mutations {
        assert!(source.contains(from), "fixture no longer contains {from:?}");
        let mutated = source.replacen(from, to, 1);
        let result = load_effect(&mutated, Path::new("sprite.kfx"));
        assert!(
            matches!(result, Err(Error::Parse(_)) | Err(Error::Semantic(_))),
            "mutation {from:?} -> {to:?} was accepted"
        );
    }
}

#[test]
fn parse_errors_carry_positions() {
    let err = load_effect(
        "Layout {\n  Vertex V {\n    Attribute Float9 p 0 0 0\n  }\n}",
        Path::new("x.kfx"),
    )
    .unwrap_err();
    match err {
        Error::Parse(ParseError::UnknownIdentifier { name, at, .. }) => {
            assert_eq!(name, "Float9");
            assert_eq!((at.line, at.column), (3, 15));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn compiled_effect_survives_binary_roundtrip() {
    for case in ["basic.kfx", "sprite.kfx"] {
        let path = cases_root().join(case);
        let compiled = shaderfx::compile_file(&path, &fake_context(&path)).unwrap();
        assert!(
            compiled
                .passes
                .iter()
                .flat_map(|p| &p.stages)
                .all(|s| s.bytecode.first() == Some(&0x0723_0203))
        );

        let bytes = serialize(&compiled).unwrap();
        let decoded = deserialize(&bytes).unwrap();
        assert_equal(&compiled, &decoded).unwrap();
        assert_eq!(decoded, compiled);
    }
}

#[test]
fn missing_source_file_is_io_error() {
    let path = cases_root().join("does_not_exist.kfx");
    let err = shaderfx::compile_file(&path, &fake_context(&path)).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}

#[test]
fn batch_continues_past_failing_file_and_writes_artifacts() {
    let src = scratch_dir("batch-src");
    let out = src.join("out");
    for case in ["basic.kfx", "sprite.kfx", "unresolved_render_state.kfx"] {
        fs::copy(cases_root().join(case), src.join(case)).unwrap();
    }
    fs::write(
        src.join("failing_stage.kfx"),
        "Pass P { VertexShader C } GLSL C { #error nope }",
    )
    .unwrap();

    let config = Config {
        output_dir: Some(out.clone()),
        jobs: 3,
        emit_spirv: true,
        ..Config::default()
    };
    let report = batch::compile_path_with(&src, &config, Arc::new(FakeCompiler)).unwrap();

    assert_eq!(report.written, vec![out.join("basic.kfxb"), out.join("sprite.kfxb")]);
    let failed: Vec<_> = report
        .failed
        .iter()
        .map(|(p, _)| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(failed, ["failing_stage.kfx", "unresolved_render_state.kfx"]);
    assert!(report.failed[0].1.contains("#error directive"), "{}", report.failed[0].1);

    let artifact = fs::read(out.join("sprite.kfxb")).unwrap();
    let decoded = deserialize(&artifact).unwrap();
    assert_eq!(decoded.name, "Sprite");
    assert_eq!(decoded.passes.len(), 2);

    let spv = fs::read(out.join("basic.Main.frag.spv")).unwrap();
    assert_eq!(spv.len(), 3 * 4);
    assert_eq!(&spv[..4], &0x0723_0203u32.to_ne_bytes());

    fs::remove_dir_all(&src).ok();
}

#[test]
fn naga_compiles_basic_effect() {
    let path = cases_root().join("basic.kfx");
    let compiled = shaderfx::compile_file(&path, &CompileContext::for_source(&path)).unwrap();
    for stage in &compiled.passes[0].stages {
        assert_eq!(stage.bytecode.first(), Some(&0x0723_0203), "{} stage", stage.kind);
    }
    let decoded = deserialize(&serialize(&compiled).unwrap()).unwrap();
    assert_equal(&compiled, &decoded).unwrap();
}

//! Integration tests for the shader pipeline
//!
//! Exercises the path the renderer takes at init: load the two stock
//! shaders from disk, compile and validate them, and address their
//! uniform blocks through the reflected layout.

use std::fs;

use candela_shader::{ShaderCompiler, ShaderError, ShaderSource, UniformKind};

const BASIC_WGSL: &str = include_str!("../../../shaders/basic.wgsl");
const SHADOW_WGSL: &str = include_str!("../../../shaders/shadow.wgsl");

fn write_stock_shaders(dir: &std::path::Path) {
    fs::write(dir.join("basic.wgsl"), BASIC_WGSL).unwrap();
    fs::write(dir.join("shadow.wgsl"), SHADOW_WGSL).unwrap();
}

#[test]
fn test_stock_shaders_compile_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    write_stock_shaders(dir.path());
    let compiler = ShaderCompiler::new();

    let basic = compiler
        .compile(&ShaderSource::from_file(dir.path().join("basic.wgsl")).unwrap())
        .unwrap();
    assert_eq!(basic.label(), "basic");
    assert_eq!(basic.fragment_entry(), Some("fs_main"));
    assert!(basic.require_fragment().is_ok());

    let shadow = compiler
        .compile(&ShaderSource::from_file(dir.path().join("shadow.wgsl")).unwrap())
        .unwrap();
    assert_eq!(shadow.label(), "shadow");
    assert_eq!(shadow.fragment_entry(), None);
}

#[test]
fn test_depth_only_program_rejected_for_color_use() {
    let compiler = ShaderCompiler::new();
    let shadow = compiler
        .compile(&ShaderSource::from_str("shadow", SHADOW_WGSL))
        .unwrap();

    match shadow.require_fragment() {
        Err(ShaderError::MissingEntryPoint { label, name }) => {
            assert_eq!(label, "shadow");
            assert_eq!(name, "fs_main");
        }
        other => panic!("expected MissingEntryPoint, got {other:?}"),
    }
}

#[test]
fn test_basic_shader_block_layout() {
    let compiler = ShaderCompiler::new();
    let program = compiler
        .compile(&ShaderSource::from_str("basic", BASIC_WGSL))
        .unwrap();
    let block = program.uniforms().primary().unwrap();

    assert_eq!(block.name, "frame");
    assert_eq!((block.group, block.binding), (0, 0));
    assert_eq!(block.size, 992);

    let view = block.slot("view").unwrap();
    assert_eq!((view.offset, view.kind), (0, UniformKind::Mat4));
    assert_eq!(block.slot("projection").unwrap().offset, 64);
    assert_eq!(block.slot("model").unwrap().offset, 128);

    // mat4 array, stride 64.
    assert_eq!(block.slot("light_space[0]").unwrap().offset, 192);
    assert_eq!(block.slot("light_space[7]").unwrap().offset, 640);

    // Light packs vec3+f32 pairs into 32 bytes.
    let p0 = block.slot("lights[0].position").unwrap();
    assert_eq!((p0.offset, p0.kind), (704, UniformKind::Vec3));
    assert_eq!(block.slot("lights[0].intensity").unwrap().offset, 716);
    assert_eq!(block.slot("lights[7].radius").unwrap().offset, 956);
    assert!(block.slot("lights[8].position").is_none());

    assert_eq!(
        block.slot("light_count").unwrap().kind,
        UniformKind::UInt
    );
    let bias = block.slot("shadow_bias").unwrap();
    assert_eq!((bias.offset, bias.kind), (988, UniformKind::Float));
}

#[test]
fn test_shadow_shader_block_layout() {
    let compiler = ShaderCompiler::new();
    let program = compiler
        .compile(&ShaderSource::from_str("shadow", SHADOW_WGSL))
        .unwrap();
    let block = program.uniforms().primary().unwrap();

    assert_eq!(block.name, "shadow");
    assert_eq!(block.size, 128);
    assert_eq!(block.slot("light_space").unwrap().offset, 0);
    assert_eq!(block.slot("model").unwrap().offset, 64);
}

#[test]
fn test_missing_file_surfaces_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("basic.wgsl");

    match ShaderSource::from_file(&path) {
        Err(ShaderError::Io { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected Io error, got {other:?}"),
    }
}

//! Shader compilation using naga
//!
//! Parses WGSL, validates the module, verifies entry points, and reflects
//! the uniform layout. The validated source is retained on the resulting
//! [`ShaderProgram`] so a GPU backend can create its own module from it.

use naga::front::wgsl;
use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::reflect::{reflect_uniforms, UniformLayout};
use crate::{ShaderError, ShaderSource};

/// Entry point every program must provide.
pub const VERTEX_ENTRY: &str = "vs_main";
/// Entry point for programs that drive a color target.
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// A parsed, validated shader with its reflected uniform layout.
#[derive(Clone, Debug)]
pub struct ShaderProgram {
    label: String,
    source: String,
    has_fragment: bool,
    uniforms: UniformLayout,
}

impl ShaderProgram {
    /// Origin label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Validated WGSL source, for backend module creation.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Vertex entry point name.
    pub fn vertex_entry(&self) -> &str {
        VERTEX_ENTRY
    }

    /// Fragment entry point name, when the program has one.
    pub fn fragment_entry(&self) -> Option<&str> {
        self.has_fragment.then_some(FRAGMENT_ENTRY)
    }

    /// Fragment entry point name, or an error for depth-only programs.
    pub fn require_fragment(&self) -> Result<&str, ShaderError> {
        self.fragment_entry()
            .ok_or_else(|| ShaderError::MissingEntryPoint {
                label: self.label.clone(),
                name: FRAGMENT_ENTRY.to_string(),
            })
    }

    /// Reflected uniform layout.
    pub fn uniforms(&self) -> &UniformLayout {
        &self.uniforms
    }
}

/// Shader compiler
pub struct ShaderCompiler {
    flags: ValidationFlags,
    capabilities: Capabilities,
}

impl ShaderCompiler {
    /// Create a new compiler with full validation.
    pub fn new() -> Self {
        Self {
            flags: ValidationFlags::all(),
            capabilities: Capabilities::all(),
        }
    }

    /// Parse WGSL source into a naga module.
    pub fn parse_wgsl(&self, source: &ShaderSource) -> Result<naga::Module, ShaderError> {
        wgsl::parse_str(source.text()).map_err(|e| ShaderError::Parse {
            label: source.label().to_string(),
            message: format!("{:?}", e),
        })
    }

    /// Parse, validate, check entry points, and reflect a program.
    ///
    /// A vertex entry point is mandatory; the fragment entry point is
    /// optional so depth-only programs compile without one.
    pub fn compile(&self, source: &ShaderSource) -> Result<ShaderProgram, ShaderError> {
        let module = self.parse_wgsl(source)?;

        let mut validator = Validator::new(self.flags, self.capabilities);
        validator
            .validate(&module)
            .map_err(|e| ShaderError::Validation {
                label: source.label().to_string(),
                message: format!("{:?}", e),
            })?;

        let mut has_vertex = false;
        let mut has_fragment = false;
        for ep in &module.entry_points {
            match ep.stage {
                naga::ShaderStage::Vertex if ep.name == VERTEX_ENTRY => has_vertex = true,
                naga::ShaderStage::Fragment if ep.name == FRAGMENT_ENTRY => has_fragment = true,
                _ => {}
            }
        }
        if !has_vertex {
            return Err(ShaderError::MissingEntryPoint {
                label: source.label().to_string(),
                name: VERTEX_ENTRY.to_string(),
            });
        }

        let uniforms = reflect_uniforms(&module);

        log::debug!(
            "Compiled shader '{}' ({} uniform block(s), fragment: {})",
            source.label(),
            uniforms.blocks().len(),
            has_fragment,
        );

        Ok(ShaderProgram {
            label: source.label().to_string(),
            source: source.text().to_string(),
            has_fragment,
            uniforms,
        })
    }
}

impl Default for ShaderCompiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SHADER: &str = r#"
        @vertex
        fn vs_main(@location(0) pos: vec3<f32>) -> @builtin(position) vec4<f32> {
            return vec4<f32>(pos, 1.0);
        }

        @fragment
        fn fs_main() -> @location(0) vec4<f32> {
            return vec4<f32>(1.0, 0.0, 0.0, 1.0);
        }
    "#;

    const DEPTH_ONLY_SHADER: &str = r#"
        @vertex
        fn vs_main(@location(0) pos: vec3<f32>) -> @builtin(position) vec4<f32> {
            return vec4<f32>(pos, 1.0);
        }
    "#;

    #[test]
    fn test_compile_program() {
        let compiler = ShaderCompiler::new();
        let program = compiler
            .compile(&ShaderSource::from_str("test", TEST_SHADER))
            .unwrap();

        assert_eq!(program.label(), "test");
        assert_eq!(program.vertex_entry(), "vs_main");
        assert_eq!(program.fragment_entry(), Some("fs_main"));
    }

    #[test]
    fn test_depth_only_program() {
        let compiler = ShaderCompiler::new();
        let program = compiler
            .compile(&ShaderSource::from_str("depth", DEPTH_ONLY_SHADER))
            .unwrap();

        assert_eq!(program.fragment_entry(), None);
        assert!(program.require_fragment().is_err());
    }

    #[test]
    fn test_invalid_shader() {
        let compiler = ShaderCompiler::new();
        let result = compiler.compile(&ShaderSource::from_str("bad", "invalid shader source { } }"));
        assert!(matches!(result, Err(ShaderError::Parse { .. })));
    }

    #[test]
    fn test_missing_vertex_entry() {
        let source = r#"
            @fragment
            fn fs_main() -> @location(0) vec4<f32> {
                return vec4<f32>(1.0);
            }
        "#;
        let compiler = ShaderCompiler::new();
        let result = compiler.compile(&ShaderSource::from_str("frag_only", source));
        match result {
            Err(ShaderError::MissingEntryPoint { name, .. }) => assert_eq!(name, "vs_main"),
            other => panic!("expected MissingEntryPoint, got {other:?}"),
        }
    }
}

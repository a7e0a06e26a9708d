//! Renderer configuration with serde support.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shadow::ShadowConfig;

/// Where the renderer's two fixed shaders come from.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ShaderSet {
    /// Load `basic.wgsl` and `shadow.wgsl` from a directory.
    Files { base_path: PathBuf },

    /// Compile from in-memory WGSL text. Used by tests and by hosts
    /// that embed shaders with `include_str!`.
    Inline { basic: String, shadow: String },
}

impl Default for ShaderSet {
    fn default() -> Self {
        Self::Files {
            base_path: PathBuf::from("shaders"),
        }
    }
}

/// Renderer settings applied at `init` time.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Shader source locations.
    pub shaders: ShaderSet,

    /// Initial frame clear color (linear RGBA).
    pub clear_color: [f32; 4],

    /// Triangle-fan subdivisions for the unit circle mesh (minimum 3).
    pub circle_segments: u32,

    /// Shadow map settings shared by all lights.
    pub shadow: ShadowConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            shaders: ShaderSet::default(),
            clear_color: [0.1, 0.1, 0.1, 1.0],
            circle_segments: 32,
            shadow: ShadowConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RendererConfig::default();
        assert_eq!(config.circle_segments, 32);
        assert_eq!(config.clear_color[3], 1.0);
        match config.shaders {
            ShaderSet::Files { ref base_path } => {
                assert_eq!(base_path, &PathBuf::from("shaders"));
            }
            _ => panic!("default shader set should load from files"),
        }
    }

    #[test]
    fn test_config_roundtrip() {
        let config = RendererConfig {
            shaders: ShaderSet::Inline {
                basic: "@vertex fn vs_main() {}".to_string(),
                shadow: "@vertex fn vs_main() {}".to_string(),
            },
            clear_color: [0.0, 0.0, 0.0, 1.0],
            circle_segments: 64,
            shadow: ShadowConfig::default(),
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: RendererConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.circle_segments, 64);
        match back.shaders {
            ShaderSet::Inline { ref basic, .. } => assert!(basic.contains("vs_main")),
            _ => panic!("expected inline shader set"),
        }
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let back: RendererConfig = serde_json::from_str(r#"{"circle_segments": 16}"#).unwrap();
        assert_eq!(back.circle_segments, 16);
        assert_eq!(back.clear_color, [0.1, 0.1, 0.1, 1.0]);
    }
}

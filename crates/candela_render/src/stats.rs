//! Per-frame renderer counters.

use serde::{Deserialize, Serialize};

/// Counters accumulated between [`Renderer::clear`](crate::Renderer::clear)
/// calls. Serializable so capture tooling can log frames as JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderStats {
    /// Color-pass draw calls issued this frame.
    pub draw_calls: u32,
    /// Depth-only shadow passes executed this frame.
    pub shadow_passes: u32,
    /// Shadow passes skipped because a light's map failed to allocate.
    pub shadow_skipped: u32,
    /// Triangles submitted across all passes.
    pub triangles: u64,
    /// Uniform writes dropped because the active shader has no slot
    /// with the requested name.
    pub uniform_skips: u32,
    /// Lights active at the end of the frame.
    pub lights: u32,
}

impl RenderStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_reset() {
        let mut stats = RenderStats {
            draw_calls: 4,
            shadow_passes: 8,
            shadow_skipped: 1,
            triangles: 96,
            uniform_skips: 2,
            lights: 3,
        };
        stats.reset();
        assert_eq!(stats, RenderStats::default());
    }

    #[test]
    fn test_stats_serialize() {
        let stats = RenderStats {
            draw_calls: 2,
            shadow_passes: 2,
            shadow_skipped: 0,
            triangles: 4,
            uniform_skips: 0,
            lights: 1,
        };
        let json = serde_json::to_string(&stats).unwrap();
        let back: RenderStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stats);
    }
}

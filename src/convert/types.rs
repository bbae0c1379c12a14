use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Blank texture reference used when a material has none.
pub const DEFAULT_BLANK_TEXTURE: &str = "../textures/whitepixel.png";

/// Fallback ticks-per-second for animations whose source reports zero.
pub const DEFAULT_TICKS_PER_SECOND: f64 = 25.0;

// ─── Options ──────────────────────────────────────────────────────────────────

/// Where vertex positions end up relative to the node hierarchy.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransformMode {
    /// `Local` for rigged or animated scenes, `Baked` otherwise.
    #[default]
    Auto,
    /// Node transforms are applied to vertices. Rigged scenes still get a
    /// skeleton so bound bone ids resolve.
    Baked,
    /// Vertices stay in mesh space and the skeleton carries the transforms.
    Local,
}

/// Conversion options shared by the CLI and library callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConvertOptions {
    pub transform_mode: TransformMode,
    /// Apply a 180° turn about +Y to baked geometry.
    pub flip_handedness: bool,
    /// Write each animation to its own file instead of embedding it.
    pub split_animations: bool,
    pub default_ticks_per_second: f64,
    pub blank_texture: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            transform_mode: TransformMode::Auto,
            flip_handedness: true,
            split_animations: true,
            default_ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            blank_texture: DEFAULT_BLANK_TEXTURE.to_string(),
        }
    }
}

// ─── Report ───────────────────────────────────────────────────────────────────

/// Summary of one converted input file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversionReport {
    pub model_name: String,
    /// Main document first, then one entry per split animation.
    pub output_paths: Vec<PathBuf>,
    pub mesh_count: usize,
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub bone_count: usize,
    pub animation_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_partial_json_when_deserialized_then_missing_fields_use_defaults() {
        let options: ConvertOptions =
            serde_json::from_str(r#"{"transform_mode":"baked","split_animations":false}"#)
                .expect("parse options");

        assert_eq!(options.transform_mode, TransformMode::Baked);
        assert!(!options.split_animations);
        assert!(options.flip_handedness);
        assert_eq!(options.default_ticks_per_second, 25.0);
        assert_eq!(options.blank_texture, "../textures/whitepixel.png");
    }
}

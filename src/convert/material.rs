use crate::{model::Material, scene::SourceMaterial};

const DEFAULT_DIFFUSE: [f32; 3] = [0.5, 0.5, 0.5];
const DEFAULT_AMBIENT: [f32; 3] = [0.5, 0.5, 0.5];
const DEFAULT_SPECULAR: [f32; 3] = [1.0, 1.0, 1.0];
const DEFAULT_ALPHA: f32 = 1.0;
const DEFAULT_SHININESS: f32 = 0.0;

impl Material {
    /// Fill every property the source left undefined with its default.
    pub fn from_source(source: &SourceMaterial, blank_texture: &str) -> Self {
        Self {
            diffuse: source.diffuse.unwrap_or(DEFAULT_DIFFUSE),
            ambient: source.ambient.unwrap_or(DEFAULT_AMBIENT),
            specular: source.specular.unwrap_or(DEFAULT_SPECULAR),
            alpha: source.alpha.unwrap_or(DEFAULT_ALPHA),
            shininess: source.shininess.unwrap_or(DEFAULT_SHININESS),
            texture: source
                .texture
                .clone()
                .unwrap_or_else(|| blank_texture.to_string()),
        }
    }

    /// Material for meshes that reference no material at all.
    pub fn fallback(blank_texture: &str) -> Self {
        Self::from_source(&SourceMaterial::default(), blank_texture)
    }
}

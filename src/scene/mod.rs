//! Source scene intermediate representation.
//!
//! Every input format is first turned into a [`SourceScene`] by a
//! [`SceneImporter`]; the conversion core only ever sees this shape and never
//! branches on where the data came from.

pub mod gltf;
pub mod pmd;

use std::path::Path;

use nalgebra::Matrix4;

use crate::error::{ConvertError, SourceError};

pub use self::gltf::GltfImporter;
pub use self::pmd::PmdReader;

/// Deepest node hierarchy a producer may hand to the conversion core. Tree
/// walks downstream recurse once per level.
pub const MAX_NODE_DEPTH: usize = 256;

// ─── Importer seam ────────────────────────────────────────────────────────────

/// A producer of [`SourceScene`] values from raw file bytes.
pub trait SceneImporter {
    /// Short format label used in log output.
    fn format_name(&self) -> &'static str;

    fn import(&self, bytes: &[u8]) -> Result<SourceScene, SourceError>;
}

/// Pick an importer from the (case-insensitive) file extension.
pub fn importer_for_path(path: &Path) -> Result<Box<dyn SceneImporter>, ConvertError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "gltf" | "glb" => Ok(Box::new(GltfImporter::with_base_dir(path.parent()))),
        "pmd" => Ok(Box::new(PmdReader)),
        _ => Err(ConvertError::UnsupportedFormat(extension)),
    }
}

// ─── Scene graph ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SourceScene {
    pub root: SourceNode,
    pub meshes: Vec<SourceMesh>,
    pub materials: Vec<SourceMaterial>,
    pub animations: Vec<SourceAnimation>,
}

impl SourceScene {
    /// Total number of transform nodes, root included.
    pub fn node_count(&self) -> usize {
        self.root.subtree_len()
    }

    pub fn has_bones(&self) -> bool {
        self.meshes.iter().any(|mesh| !mesh.bones.is_empty())
    }

    pub fn has_animations(&self) -> bool {
        !self.animations.is_empty()
    }
}

/// One transform node of the source hierarchy.
#[derive(Debug, Clone)]
pub struct SourceNode {
    pub name: String,
    /// Local transform relative to the parent node.
    pub transform: Matrix4<f32>,
    /// Indices into [`SourceScene::meshes`].
    pub meshes: Vec<usize>,
    pub children: Vec<SourceNode>,
}

impl SourceNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Matrix4::identity(),
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(SourceNode::subtree_len)
            .sum::<usize>()
    }
}

/// A polygon soup with optional per-vertex attributes and skin data.
#[derive(Debug, Clone, Default)]
pub struct SourceMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    /// First UV set, top-left origin.
    pub texcoords: Option<Vec<[f32; 2]>>,
    pub faces: Vec<SourceFace>,
    /// Index into [`SourceScene::materials`].
    pub material: Option<usize>,
    pub bones: Vec<SourceBone>,
}

impl SourceMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// A face as the importer delivered it; may hold any number of indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFace {
    pub indices: Vec<u32>,
}

impl SourceFace {
    pub fn triangle(a: u32, b: u32, c: u32) -> Self {
        Self {
            indices: vec![a, b, c],
        }
    }
}

impl From<Vec<u32>> for SourceFace {
    fn from(indices: Vec<u32>) -> Self {
        Self { indices }
    }
}

#[derive(Debug, Clone)]
pub struct SourceBone {
    pub name: String,
    /// Inverse bind pose of the bone.
    pub offset: Matrix4<f32>,
    pub weights: Vec<VertexWeight>,
}

/// One influence of a bone on a mesh-local vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexWeight {
    pub vertex: u32,
    pub weight: f32,
}

/// Material properties exactly as present in the source; `None` means the
/// source did not define the property.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMaterial {
    pub ambient: Option<[f32; 3]>,
    pub diffuse: Option<[f32; 3]>,
    pub specular: Option<[f32; 3]>,
    pub alpha: Option<f32>,
    pub shininess: Option<f32>,
    pub texture: Option<String>,
}

// ─── Animation ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SourceAnimation {
    pub name: String,
    pub duration_ticks: f64,
    /// `0.0` when the source does not say.
    pub ticks_per_second: f64,
    pub channels: Vec<NodeAnimation>,
}

/// Keyframes for one node, keyed in ticks.
#[derive(Debug, Clone, Default)]
pub struct NodeAnimation {
    pub node: String,
    pub positions: Vec<VectorKey>,
    pub scales: Vec<VectorKey>,
    pub rotations: Vec<QuatKey>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorKey {
    pub time: f64,
    pub value: [f32; 3],
}

/// Rotation key; `value` is `[x, y, z, w]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuatKey {
    pub time: f64,
    pub value: [f32; 4],
}

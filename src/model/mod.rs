//! Canonical render-ready model and its JSON document shape.

pub mod layout;

use nalgebra::Matrix4;
use serde::{Serialize, Serializer};

pub use self::layout::{VertexBuffer, VertexFormat};

/// Value of the `version` field in every written document.
pub const DOCUMENT_VERSION: u32 = 1;

// ─── Model ────────────────────────────────────────────────────────────────────

/// One fully assembled input file.
#[derive(Debug, Clone, Default)]
pub struct CanonicalModel {
    pub name: String,
    pub vertices: VertexBuffer,
    /// Only meshes with at least one triangle.
    pub meshes: Vec<Mesh>,
    pub skeleton: Option<Bone>,
    pub animations: Vec<Animation>,
}

impl CanonicalModel {
    pub fn vertex_count(&self) -> usize {
        self.vertices.vertex_count()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.faces.len() / 3).sum()
    }

    /// Skeleton nodes that carry a bind identity.
    pub fn bound_bone_count(&self) -> usize {
        self.skeleton.as_ref().map_or(0, Bone::bound_count)
    }

    /// Borrowing view used for serialization. Animations are included only
    /// when `embed_animations` is set.
    pub fn document(&self, embed_animations: bool) -> ModelDocument<'_> {
        ModelDocument {
            name: &self.name,
            version: DOCUMENT_VERSION,
            format: self.vertices.format(),
            vertices: self.vertices.data(),
            meshes: &self.meshes,
            skeleton: self.skeleton.as_ref(),
            animations: (embed_animations && !self.animations.is_empty())
                .then_some(self.animations.as_slice()),
        }
    }
}

/// Field order here is the field order of the written JSON.
#[derive(Debug, Serialize)]
pub struct ModelDocument<'a> {
    pub name: &'a str,
    pub version: u32,
    pub format: &'a VertexFormat,
    pub vertices: &'a [f32],
    pub meshes: &'a [Mesh],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<&'a Bone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animations: Option<&'a [Animation]>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mesh {
    pub material: Material,
    /// Triangle list of model-global vertex ordinals.
    pub faces: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Material {
    pub diffuse: [f32; 3],
    pub ambient: [f32; 3],
    pub specular: [f32; 3],
    pub alpha: f32,
    pub shininess: f32,
    pub texture: String,
}

// ─── Skeleton ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bone {
    pub name: String,
    /// Local transform relative to the parent bone.
    #[serde(serialize_with = "serialize_rows")]
    pub matrix: Matrix4<f32>,
    /// Inverse bind pose; set only on bones that influence vertices.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_rows"
    )]
    pub offset: Option<Matrix4<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boneid: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Bone>,
}

impl Bone {
    pub fn new(name: impl Into<String>, matrix: Matrix4<f32>) -> Self {
        Self {
            name: name.into(),
            matrix,
            offset: None,
            boneid: None,
            children: Vec::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Bone::node_count).sum::<usize>()
    }

    pub fn bound_count(&self) -> usize {
        usize::from(self.boneid.is_some())
            + self.children.iter().map(Bone::bound_count).sum::<usize>()
    }

    /// Depth-first pre-order search by exact name.
    #[cfg(test)]
    pub(crate) fn find(&self, name: &str) -> Option<&Bone> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    /// Follow a child-index path from this bone.
    pub fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut Bone> {
        match path.split_first() {
            None => Some(self),
            Some((&head, rest)) => self.children.get_mut(head)?.at_path_mut(rest),
        }
    }
}

/// 4×4 matrix as four row arrays.
fn matrix_rows(matrix: &Matrix4<f32>) -> [[f32; 4]; 4] {
    let mut rows = [[0.0; 4]; 4];
    for (r, row) in rows.iter_mut().enumerate() {
        for (c, value) in row.iter_mut().enumerate() {
            *value = matrix[(r, c)];
        }
    }
    rows
}

fn serialize_rows<S: Serializer>(matrix: &Matrix4<f32>, serializer: S) -> Result<S::Ok, S::Error> {
    matrix_rows(matrix).serialize(serializer)
}

fn serialize_optional_rows<S: Serializer>(
    matrix: &Option<Matrix4<f32>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    matrix.as_ref().map(matrix_rows).serialize(serializer)
}

// ─── Animation ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Animation {
    pub name: String,
    /// Seconds.
    pub length: f64,
    pub channels: Vec<Channel>,
}

/// Keyframes for one skeleton node; the three curves keep their own times.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Channel {
    pub name: String,
    pub positions: Vec<PositionKey>,
    pub scales: Vec<ScaleKey>,
    pub rotations: Vec<RotationKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionKey {
    pub time: f64,
    pub pos: [f32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaleKey {
    pub time: f64,
    pub scale: [f32; 3],
}

/// `rot` is `[x, y, z, w]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RotationKey {
    pub time: f64,
    pub rot: [f32; 4],
}

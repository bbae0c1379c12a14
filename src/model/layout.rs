use serde::{Serialize, Serializer, ser::SerializeSeq};

/// Placeholder stored in bone-id slots that no influence has claimed yet.
pub const UNASSIGNED_BONE: f32 = -1.0;

/// Maximum bone influences per vertex.
pub const MAX_INFLUENCES: usize = 4;

// ─── Format ───────────────────────────────────────────────────────────────────

/// Ordered `(attribute, component count)` list describing one vertex record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexFormat {
    attributes: Vec<(&'static str, usize)>,
}

impl VertexFormat {
    /// `position:3, texcoord:2, normal:3, boneIDs:4, weights:4`.
    pub fn skinned() -> Self {
        Self {
            attributes: vec![
                ("position", 3),
                ("texcoord", 2),
                ("normal", 3),
                ("boneIDs", MAX_INFLUENCES),
                ("weights", MAX_INFLUENCES),
            ],
        }
    }

    /// Floats per vertex record.
    pub fn stride(&self) -> usize {
        self.attributes.iter().map(|(_, count)| count).sum()
    }

    /// Float offset of `name` inside one record.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        let mut offset = 0;
        for (attribute, count) in &self.attributes {
            if *attribute == name {
                return Some(offset);
            }
            offset += count;
        }
        None
    }
}

impl Default for VertexFormat {
    fn default() -> Self {
        Self::skinned()
    }
}

/// Written flat: `["position", 3, "texcoord", 2, ...]`.
impl Serialize for VertexFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.attributes.len() * 2))?;
        for (name, count) in &self.attributes {
            seq.serialize_element(name)?;
            seq.serialize_element(count)?;
        }
        seq.end()
    }
}

// ─── Buffer ───────────────────────────────────────────────────────────────────

/// Interleaved float storage for [`VertexFormat::skinned`] records.
///
/// `data.len()` is always a multiple of the format stride.
#[derive(Debug, Clone, Default)]
pub struct VertexBuffer {
    format: VertexFormat,
    data: Vec<f32>,
}

impl VertexBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(&self) -> &VertexFormat {
        &self.format
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn vertex_count(&self) -> usize {
        self.data.len() / self.format.stride()
    }

    /// Start offset of vertex `i` in [`Self::data`].
    pub fn vertex_index(&self, i: usize) -> usize {
        i * self.format.stride()
    }

    /// Append one record and return its vertex ordinal.
    ///
    /// The texcoord V axis is flipped to a bottom-left origin; a missing
    /// texcoord becomes `(0, 0)`. Bone slots start unassigned.
    pub fn append_vertex(
        &mut self,
        position: [f32; 3],
        texcoord: Option<[f32; 2]>,
        normal: [f32; 3],
    ) -> usize {
        let ordinal = self.vertex_count();
        let texcoord = texcoord.map_or([0.0, 0.0], |[u, v]| [u, 1.0 - v]);

        self.data.extend_from_slice(&position);
        self.data.extend_from_slice(&texcoord);
        self.data.extend_from_slice(&normal);
        self.data.extend_from_slice(&[UNASSIGNED_BONE; MAX_INFLUENCES]);
        self.data.extend_from_slice(&[0.0; MAX_INFLUENCES]);
        ordinal
    }

    /// Put `(bone, weight)` into the first unassigned slot of `vertex`.
    ///
    /// Returns `false` when the vertex does not exist or all slots are taken.
    pub fn bind_influence(&mut self, vertex: usize, bone: u32, weight: f32) -> bool {
        if vertex >= self.vertex_count() {
            return false;
        }
        let (ids, weights) = self.slot_offsets(vertex);
        for slot in 0..MAX_INFLUENCES {
            if self.data[ids + slot] == UNASSIGNED_BONE {
                self.data[ids + slot] = bone as f32;
                self.data[weights + slot] = weight;
                return true;
            }
        }
        false
    }

    /// Rewrite every slot still holding [`UNASSIGNED_BONE`] to bone 0 with
    /// weight 0.
    pub fn clear_unassigned_slots(&mut self) {
        for vertex in 0..self.vertex_count() {
            let (ids, weights) = self.slot_offsets(vertex);
            for slot in 0..MAX_INFLUENCES {
                if self.data[ids + slot] == UNASSIGNED_BONE {
                    self.data[ids + slot] = 0.0;
                    self.data[weights + slot] = 0.0;
                }
            }
        }
    }

    pub fn position(&self, vertex: usize) -> [f32; 3] {
        let start = self.vertex_index(vertex);
        [self.data[start], self.data[start + 1], self.data[start + 2]]
    }

    pub fn texcoord(&self, vertex: usize) -> [f32; 2] {
        let start = self.vertex_index(vertex) + 3;
        [self.data[start], self.data[start + 1]]
    }

    pub fn normal(&self, vertex: usize) -> [f32; 3] {
        let start = self.vertex_index(vertex) + 5;
        [self.data[start], self.data[start + 1], self.data[start + 2]]
    }

    /// `(bone ids, weights)` of one vertex.
    pub fn bone_slots(&self, vertex: usize) -> ([f32; MAX_INFLUENCES], [f32; MAX_INFLUENCES]) {
        let (ids, weights) = self.slot_offsets(vertex);
        let mut out_ids = [0.0; MAX_INFLUENCES];
        let mut out_weights = [0.0; MAX_INFLUENCES];
        out_ids.copy_from_slice(&self.data[ids..ids + MAX_INFLUENCES]);
        out_weights.copy_from_slice(&self.data[weights..weights + MAX_INFLUENCES]);
        (out_ids, out_weights)
    }

    fn slot_offsets(&self, vertex: usize) -> (usize, usize) {
        let start = self.vertex_index(vertex);
        let ids = start + self.format.offset_of("boneIDs").unwrap_or(8);
        let weights = start + self.format.offset_of("weights").unwrap_or(12);
        (ids, weights)
    }
}

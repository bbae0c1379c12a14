use std::collections::HashMap;

use crate::{
    model::VertexBuffer,
    scene::{SourceBone, SourceScene},
};

// ─── Bone ids ─────────────────────────────────────────────────────────────────

/// Model-wide bone ids, one per distinct bone name.
///
/// Ids are handed out in first-seen order walking `scene.meshes` by index
/// and each mesh's bones in declaration order.
#[derive(Debug, Clone, Default)]
pub struct BoneRegistry {
    ids: HashMap<String, u32>,
}

impl BoneRegistry {
    pub fn from_scene(scene: &SourceScene) -> Self {
        let mut registry = Self::default();
        for bone in scene.meshes.iter().flat_map(|mesh| &mesh.bones) {
            registry.register(&bone.name);
        }
        registry
    }

    pub fn register(&mut self, name: &str) -> u32 {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id = self.ids.len() as u32;
        self.ids.insert(name.to_string(), id);
        id
    }

    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }
}

// ─── Binding ──────────────────────────────────────────────────────────────────

/// Write each bone's influences into the free slots of the mesh vertices
/// that start at `vertex_start`.
///
/// Slots are taken first-fit in bone declaration order, then weight-list
/// order. Influences past the fourth on a vertex, and weights that point
/// outside the mesh, are dropped. Returns how many were dropped.
pub(super) fn bind_bone_weights(
    buffer: &mut VertexBuffer,
    bones: &[SourceBone],
    vertex_start: usize,
    mesh_vertex_count: usize,
    registry: &BoneRegistry,
) -> usize {
    let mut dropped = 0;
    for bone in bones {
        let Some(id) = registry.id_of(&bone.name) else {
            dropped += bone.weights.len();
            continue;
        };
        for influence in &bone.weights {
            let local = influence.vertex as usize;
            if local >= mesh_vertex_count
                || !buffer.bind_influence(vertex_start + local, id, influence.weight)
            {
                dropped += 1;
            }
        }
    }
    dropped
}

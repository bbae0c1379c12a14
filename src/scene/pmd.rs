//! Reader for the fixed-layout PMD (Polygon Model Data) binary format.
//!
//! All multi-byte values are little-endian and records are tightly packed.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    io::{Cursor, Read},
};

use log::warn;
use nalgebra::{Matrix4, Vector3};

use super::{
    MAX_NODE_DEPTH, SceneImporter, SourceBone, SourceFace, SourceMaterial, SourceMesh,
    SourceNode, SourceScene, VertexWeight,
};
use crate::error::SourceError;

const MAGIC: &[u8; 3] = b"Pmd";
const NO_PARENT: u16 = 0xFFFF;

#[derive(Debug, Clone, Copy, Default)]
pub struct PmdReader;

impl SceneImporter for PmdReader {
    fn format_name(&self) -> &'static str {
        "PMD"
    }

    fn import(&self, bytes: &[u8]) -> Result<SourceScene, SourceError> {
        PmdFile::parse(bytes)?.into_scene()
    }
}

// ─── Raw records ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct PmdVertex {
    position: [f32; 3],
    normal: [f32; 3],
    uv: [f32; 2],
    bones: [u16; 2],
    /// Influence of `bones[0]` in percent.
    weight: u8,
}

#[derive(Debug, Clone)]
struct PmdMaterial {
    diffuse: [f32; 3],
    alpha: f32,
    shininess: f32,
    specular: [f32; 3],
    ambient: [f32; 3],
    index_count: u32,
    texture: Vec<u8>,
}

#[derive(Debug, Clone)]
struct PmdBone {
    name: Vec<u8>,
    parent: u16,
    head: [f32; 3],
}

#[derive(Debug, Clone)]
struct PmdFile {
    vertices: Vec<PmdVertex>,
    indices: Vec<u16>,
    materials: Vec<PmdMaterial>,
    bones: Vec<PmdBone>,
}

// ─── Byte helpers ─────────────────────────────────────────────────────────────

fn read_bytes<const N: usize>(
    cursor: &mut Cursor<&[u8]>,
    section: &'static str,
) -> Result<[u8; N], SourceError> {
    let mut buf = [0u8; N];
    cursor
        .read_exact(&mut buf)
        .map_err(|_| SourceError::Truncated { section })?;
    Ok(buf)
}

fn read_u8(cursor: &mut Cursor<&[u8]>, section: &'static str) -> Result<u8, SourceError> {
    Ok(read_bytes::<1>(cursor, section)?[0])
}

fn read_u16(cursor: &mut Cursor<&[u8]>, section: &'static str) -> Result<u16, SourceError> {
    Ok(u16::from_le_bytes(read_bytes(cursor, section)?))
}

fn read_u32(cursor: &mut Cursor<&[u8]>, section: &'static str) -> Result<u32, SourceError> {
    Ok(u32::from_le_bytes(read_bytes(cursor, section)?))
}

fn read_f32(cursor: &mut Cursor<&[u8]>, section: &'static str) -> Result<f32, SourceError> {
    Ok(f32::from_le_bytes(read_bytes(cursor, section)?))
}

fn read_vec3(cursor: &mut Cursor<&[u8]>, section: &'static str) -> Result<[f32; 3], SourceError> {
    Ok([
        read_f32(cursor, section)?,
        read_f32(cursor, section)?,
        read_f32(cursor, section)?,
    ])
}

/// Fixed-size, NUL-padded string field.
fn read_fixed<const N: usize>(
    cursor: &mut Cursor<&[u8]>,
    section: &'static str,
) -> Result<Vec<u8>, SourceError> {
    let raw = read_bytes::<N>(cursor, section)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(N);
    Ok(raw[..end].to_vec())
}

/// Reject a declared record count that cannot fit in the remaining bytes
/// before allocating for it.
fn check_count(
    cursor: &Cursor<&[u8]>,
    count: usize,
    record_size: usize,
    section: &'static str,
) -> Result<(), SourceError> {
    let len = cursor.get_ref().len() as u64;
    let remaining = len.saturating_sub(cursor.position());
    if (count as u64) * (record_size as u64) > remaining {
        return Err(SourceError::Truncated { section });
    }
    Ok(())
}

// ─── Parsing ──────────────────────────────────────────────────────────────────

impl PmdFile {
    fn parse(bytes: &[u8]) -> Result<Self, SourceError> {
        let mut cursor = Cursor::new(bytes);

        let magic = read_bytes::<3>(&mut cursor, "header")?;
        if &magic != MAGIC {
            return Err(SourceError::BadMagic { expected: "Pmd" });
        }
        let _version = read_f32(&mut cursor, "header")?;
        let _name = read_fixed::<20>(&mut cursor, "header")?;
        let _comment = read_fixed::<256>(&mut cursor, "header")?;

        let vertex_count = read_u32(&mut cursor, "vertices")? as usize;
        check_count(&cursor, vertex_count, 38, "vertices")?;
        let mut vertices = Vec::with_capacity(vertex_count);
        for _ in 0..vertex_count {
            let position = read_vec3(&mut cursor, "vertices")?;
            let normal = read_vec3(&mut cursor, "vertices")?;
            let uv = [
                read_f32(&mut cursor, "vertices")?,
                read_f32(&mut cursor, "vertices")?,
            ];
            let bones = [
                read_u16(&mut cursor, "vertices")?,
                read_u16(&mut cursor, "vertices")?,
            ];
            let weight = read_u8(&mut cursor, "vertices")?;
            let _edge = read_u8(&mut cursor, "vertices")?;
            vertices.push(PmdVertex {
                position,
                normal,
                uv,
                bones,
                weight,
            });
        }

        let index_count = read_u32(&mut cursor, "indices")? as usize;
        check_count(&cursor, index_count, 2, "indices")?;
        let mut indices = Vec::with_capacity(index_count);
        for _ in 0..index_count {
            indices.push(read_u16(&mut cursor, "indices")?);
        }

        let material_count = read_u32(&mut cursor, "materials")? as usize;
        check_count(&cursor, material_count, 70, "materials")?;
        let mut materials = Vec::with_capacity(material_count);
        for _ in 0..material_count {
            let diffuse = read_vec3(&mut cursor, "materials")?;
            let alpha = read_f32(&mut cursor, "materials")?;
            let shininess = read_f32(&mut cursor, "materials")?;
            let specular = read_vec3(&mut cursor, "materials")?;
            let ambient = read_vec3(&mut cursor, "materials")?;
            let _toon = read_u8(&mut cursor, "materials")?;
            let _edge = read_u8(&mut cursor, "materials")?;
            let index_count = read_u32(&mut cursor, "materials")?;
            let texture = read_fixed::<20>(&mut cursor, "materials")?;
            materials.push(PmdMaterial {
                diffuse,
                alpha,
                shininess,
                specular,
                ambient,
                index_count,
                texture,
            });
        }

        // Older exports stop after the material table.
        let mut bones = Vec::new();
        if (cursor.position() as usize) < bytes.len() {
            let bone_count = read_u16(&mut cursor, "bones")? as usize;
            check_count(&cursor, bone_count, 39, "bones")?;
            for _ in 0..bone_count {
                let name = read_fixed::<20>(&mut cursor, "bones")?;
                let parent = read_u16(&mut cursor, "bones")?;
                let _tail = read_u16(&mut cursor, "bones")?;
                let _kind = read_u8(&mut cursor, "bones")?;
                let _ik = read_u16(&mut cursor, "bones")?;
                let head = read_vec3(&mut cursor, "bones")?;
                bones.push(PmdBone { name, parent, head });
            }
        }

        Ok(Self {
            vertices,
            indices,
            materials,
            bones,
        })
    }

    // ─── Scene conversion ─────────────────────────────────────────────────────

    fn into_scene(self) -> Result<SourceScene, SourceError> {
        let bone_names = self.unique_bone_names();

        let mut root = SourceNode::new("RootNode");
        let mut children_of = HashMap::<u16, Vec<u16>>::new();
        for (index, bone) in self.bones.iter().enumerate() {
            let parent = if (bone.parent as usize) < self.bones.len() {
                bone.parent
            } else {
                NO_PARENT
            };
            children_of.entry(parent).or_default().push(index as u16);
        }
        if let Some(roots) = children_of.get(&NO_PARENT) {
            for &bone in roots {
                root.children
                    .push(self.bone_node(bone, [0.0; 3], 1, &bone_names, &children_of)?);
            }
        }

        let mut meshes = Vec::new();
        let mut materials = Vec::new();
        let mut start = 0usize;
        for material in &self.materials {
            let end = (start + material.index_count as usize).min(self.indices.len());
            let range = &self.indices[start.min(end)..end];
            start = end;

            materials.push(convert_material(material));
            let mesh = self.mesh_for_range(range, materials.len() - 1, &bone_names);
            root.meshes.push(meshes.len());
            meshes.push(mesh);
        }

        Ok(SourceScene {
            root,
            meshes,
            materials,
            animations: Vec::new(),
        })
    }

    fn unique_bone_names(&self) -> Vec<String> {
        let mut seen = HashSet::<String>::new();
        self.bones
            .iter()
            .enumerate()
            .map(|(index, bone)| {
                let decoded = String::from_utf8(bone.name.clone()).ok();
                let name = match decoded {
                    Some(name) if !name.is_empty() && !seen.contains(&name) => name,
                    _ => {
                        warn!("PMD bone {index} has no usable name, renaming to bone{index}");
                        format!("bone{index}")
                    }
                };
                seen.insert(name.clone());
                name
            })
            .collect()
    }

    fn bone_node(
        &self,
        bone: u16,
        parent_head: [f32; 3],
        depth: usize,
        names: &[String],
        children_of: &HashMap<u16, Vec<u16>>,
    ) -> Result<SourceNode, SourceError> {
        if depth > MAX_NODE_DEPTH {
            return Err(SourceError::Malformed(format!(
                "bone {bone} is nested deeper than {MAX_NODE_DEPTH} levels"
            )));
        }
        let head = self.bones[bone as usize].head;
        let mut node = SourceNode::new(names[bone as usize].clone());
        node.transform = Matrix4::new_translation(&(Vector3::from(head) - Vector3::from(parent_head)));

        // Each bone has exactly one parent, so descending from a root never
        // revisits a bone; members of a parent cycle are simply unreachable.
        if let Some(children) = children_of.get(&bone) {
            for &child in children {
                node.children
                    .push(self.bone_node(child, head, depth + 1, names, children_of)?);
            }
        }
        Ok(node)
    }

    /// Build a self-contained mesh from one material's slice of the shared
    /// index buffer.
    fn mesh_for_range(&self, range: &[u16], material: usize, bone_names: &[String]) -> SourceMesh {
        let mut local_of = HashMap::<u16, u32>::new();
        let mut used = Vec::<u16>::new();
        let mut local_indices = Vec::with_capacity(range.len());
        for &index in range {
            if index as usize >= self.vertices.len() {
                // Keeps the face but points it past the end; the assembler
                // drops out-of-range faces.
                local_indices.push(u32::MAX);
                continue;
            }
            let local = *local_of.entry(index).or_insert_with(|| {
                used.push(index);
                (used.len() - 1) as u32
            });
            local_indices.push(local);
        }

        let vertices: Vec<&PmdVertex> = used.iter().map(|&i| &self.vertices[i as usize]).collect();

        let mut weights_of = BTreeMap::<u16, Vec<VertexWeight>>::new();
        for (local, vertex) in vertices.iter().enumerate() {
            for (bone, weight) in vertex_influences(vertex) {
                if (bone as usize) < self.bones.len() {
                    weights_of.entry(bone).or_default().push(VertexWeight {
                        vertex: local as u32,
                        weight,
                    });
                }
            }
        }

        let bones = weights_of
            .into_iter()
            .map(|(bone, weights)| {
                let head = Vector3::from(self.bones[bone as usize].head);
                SourceBone {
                    name: bone_names[bone as usize].clone(),
                    offset: Matrix4::new_translation(&-head),
                    weights,
                }
            })
            .collect();

        SourceMesh {
            positions: vertices.iter().map(|v| v.position).collect(),
            normals: Some(vertices.iter().map(|v| v.normal).collect()),
            texcoords: Some(vertices.iter().map(|v| v.uv).collect()),
            faces: local_indices
                .chunks_exact(3)
                .map(|tri| SourceFace::triangle(tri[0], tri[1], tri[2]))
                .collect(),
            material: Some(material),
            bones,
        }
    }
}

/// The (bone, weight) pairs encoded by a vertex's two bone slots.
fn vertex_influences(vertex: &PmdVertex) -> Vec<(u16, f32)> {
    let [first, second] = vertex.bones;
    if first == second {
        return vec![(first, 1.0)];
    }
    let weight = f32::from(vertex.weight.min(100)) / 100.0;
    [(first, weight), (second, 1.0 - weight)]
        .into_iter()
        .filter(|&(_, w)| w > 0.0)
        .collect()
}

fn convert_material(material: &PmdMaterial) -> SourceMaterial {
    let raw = String::from_utf8_lossy(&material.texture);
    let texture = raw.split('*').next().unwrap_or_default().trim();

    SourceMaterial {
        ambient: Some(material.ambient),
        diffuse: Some(material.diffuse),
        specular: Some(material.specular),
        alpha: Some(material.alpha),
        shininess: Some(material.shininess),
        texture: (!texture.is_empty()).then(|| texture.to_string()),
    }
}

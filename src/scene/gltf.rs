//! glTF 2.0 producer built on the `gltf` crate.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use gltf::{
    Document, Gltf,
    animation::{Interpolation, util::ReadOutputs},
    buffer,
    image::Source,
    mesh::Mode,
};
use nalgebra::Matrix4;

use super::{
    MAX_NODE_DEPTH, NodeAnimation, QuatKey, SceneImporter, SourceAnimation, SourceBone, SourceFace,
    SourceMaterial, SourceMesh, SourceNode, SourceScene, VectorKey, VertexWeight,
};
use crate::error::SourceError;

/// Key times are stored in milliseconds so that the animation stage has a
/// real tick rate to normalize against.
const TICKS_PER_SECOND: f64 = 1000.0;

/// glTF specular-glossiness stores glossiness in `[0, 1]`; scale it to a
/// Phong exponent.
const GLOSSINESS_TO_SHININESS: f32 = 128.0;

#[derive(Debug, Clone, Default)]
pub struct GltfImporter {
    /// Directory used to resolve external buffer URIs of `.gltf` files.
    pub base_dir: Option<PathBuf>,
}

impl GltfImporter {
    pub fn with_base_dir(base_dir: Option<&Path>) -> Self {
        Self {
            base_dir: base_dir.map(Path::to_path_buf),
        }
    }
}

impl SceneImporter for GltfImporter {
    fn format_name(&self) -> &'static str {
        "glTF"
    }

    fn import(&self, bytes: &[u8]) -> Result<SourceScene, SourceError> {
        let Gltf { document, blob } =
            Gltf::from_slice(bytes).map_err(|err| SourceError::Import(err.to_string()))?;
        let buffers = gltf::import_buffers(&document, self.base_dir.as_deref(), blob)
            .map_err(|err| SourceError::Import(err.to_string()))?;

        build_scene(&document, &buffers)
    }
}

// ─── Scene graph ──────────────────────────────────────────────────────────────

fn build_scene(document: &Document, buffers: &[buffer::Data]) -> Result<SourceScene, SourceError> {
    let mut builder = SceneBuilder {
        buffers,
        meshes: Vec::new(),
        primitive_ranges: HashMap::new(),
    };

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next());
    let mut root = SourceNode::new(
        scene
            .as_ref()
            .and_then(|scene| scene.name())
            .unwrap_or("RootNode"),
    );

    match scene {
        Some(scene) => {
            for node in scene.nodes() {
                root.children.push(builder.build_node(&node, 1)?);
            }
        }
        None => {
            // No scene list: every node that is nobody's child is a root.
            let mut is_child = vec![false; document.nodes().count()];
            for node in document.nodes() {
                for child in node.children() {
                    is_child[child.index()] = true;
                }
            }
            for node in document.nodes().filter(|node| !is_child[node.index()]) {
                root.children.push(builder.build_node(&node, 1)?);
            }
        }
    }

    let materials = document.materials().map(|m| convert_material(&m)).collect();
    let animations = document
        .animations()
        .map(|animation| convert_animation(&animation, buffers))
        .collect();

    Ok(SourceScene {
        root,
        meshes: builder.meshes,
        materials,
        animations,
    })
}

pub(super) fn node_name(node: &gltf::Node) -> String {
    node.name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node{}", node.index()))
}

struct SceneBuilder<'a> {
    buffers: &'a [buffer::Data],
    meshes: Vec<SourceMesh>,
    /// (glTF mesh, skin) → indices of the produced source meshes.
    primitive_ranges: HashMap<(usize, Option<usize>), Vec<usize>>,
}

impl SceneBuilder<'_> {
    fn build_node(&mut self, node: &gltf::Node, depth: usize) -> Result<SourceNode, SourceError> {
        if depth > MAX_NODE_DEPTH {
            return Err(SourceError::Malformed(format!(
                "node {} is nested deeper than {MAX_NODE_DEPTH} levels",
                node.index()
            )));
        }
        let mut out = SourceNode::new(node_name(node));
        out.transform = Matrix4::from(node.transform().matrix());

        if let Some(mesh) = node.mesh() {
            let skin = node.skin();
            let key = (mesh.index(), skin.as_ref().map(|skin| skin.index()));
            let indices = match self.primitive_ranges.get(&key) {
                Some(indices) => indices.clone(),
                None => {
                    let indices = self.convert_mesh(&mesh, skin.as_ref())?;
                    self.primitive_ranges.insert(key, indices.clone());
                    indices
                }
            };
            out.meshes = indices;
        }

        for child in node.children() {
            out.children.push(self.build_node(&child, depth + 1)?);
        }

        Ok(out)
    }

    fn convert_mesh(
        &mut self,
        mesh: &gltf::Mesh,
        skin: Option<&gltf::Skin>,
    ) -> Result<Vec<usize>, SourceError> {
        let joints = match skin {
            Some(skin) => self.skin_joints(skin),
            None => Vec::new(),
        };

        let mut indices = Vec::new();
        for primitive in mesh.primitives() {
            let source = self.convert_primitive(&primitive, &joints)?;
            indices.push(self.meshes.len());
            self.meshes.push(source);
        }
        Ok(indices)
    }

    /// Joint names and inverse bind matrices of a skin, in joint order.
    fn skin_joints(&self, skin: &gltf::Skin) -> Vec<(String, Matrix4<f32>)> {
        let reader = skin.reader(|buffer| self.buffers.get(buffer.index()).map(|b| &b.0[..]));
        let inverse_binds: Vec<Matrix4<f32>> = reader
            .read_inverse_bind_matrices()
            .map(|iter| iter.map(Matrix4::from).collect())
            .unwrap_or_default();

        skin.joints()
            .enumerate()
            .map(|(slot, joint)| {
                let offset = inverse_binds
                    .get(slot)
                    .copied()
                    .unwrap_or_else(Matrix4::identity);
                (node_name(&joint), offset)
            })
            .collect()
    }

    fn convert_primitive(
        &self,
        primitive: &gltf::Primitive,
        joints: &[(String, Matrix4<f32>)],
    ) -> Result<SourceMesh, SourceError> {
        let reader =
            primitive.reader(|buffer| self.buffers.get(buffer.index()).map(|b| &b.0[..]));

        let positions: Vec<[f32; 3]> = reader
            .read_positions()
            .map(|iter| iter.collect())
            .ok_or_else(|| {
                SourceError::Malformed(format!(
                    "primitive {} has no POSITION attribute",
                    primitive.index()
                ))
            })?;
        let normals = reader.read_normals().map(|iter| iter.collect());
        let texcoords = reader
            .read_tex_coords(0)
            .map(|coords| coords.into_f32().collect());

        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };

        let mut bones = Vec::new();
        if !joints.is_empty()
            && let (Some(slots), Some(weights)) = (reader.read_joints(0), reader.read_weights(0))
        {
            bones = bones_from_vertex_slots(joints, slots.into_u16().zip(weights.into_f32()));
        }

        Ok(SourceMesh {
            positions,
            normals,
            texcoords,
            faces: faces_for_mode(primitive.mode(), &indices),
            material: primitive.material().index(),
            bones,
        })
    }
}

/// Invert per-vertex joint slots into per-bone weight lists.
fn bones_from_vertex_slots(
    joints: &[(String, Matrix4<f32>)],
    vertices: impl Iterator<Item = ([u16; 4], [f32; 4])>,
) -> Vec<SourceBone> {
    let mut bones: Vec<SourceBone> = joints
        .iter()
        .map(|(name, offset)| SourceBone {
            name: name.clone(),
            offset: *offset,
            weights: Vec::new(),
        })
        .collect();

    for (vertex, (slots, weights)) in vertices.enumerate() {
        for lane in 0..4 {
            let weight = weights[lane];
            if weight <= 0.0 {
                continue;
            }
            if let Some(bone) = bones.get_mut(slots[lane] as usize) {
                bone.weights.push(VertexWeight {
                    vertex: vertex as u32,
                    weight,
                });
            }
        }
    }

    bones
}

/// Split a primitive's index list into faces according to its topology.
fn faces_for_mode(mode: Mode, indices: &[u32]) -> Vec<SourceFace> {
    match mode {
        Mode::Triangles => indices
            .chunks_exact(3)
            .map(|tri| SourceFace::triangle(tri[0], tri[1], tri[2]))
            .collect(),
        Mode::TriangleStrip => indices
            .windows(3)
            .enumerate()
            .map(|(i, tri)| {
                if i % 2 == 0 {
                    SourceFace::triangle(tri[0], tri[1], tri[2])
                } else {
                    SourceFace::triangle(tri[1], tri[0], tri[2])
                }
            })
            .collect(),
        Mode::TriangleFan => match indices.split_first() {
            Some((&center, rest)) => rest
                .windows(2)
                .map(|pair| SourceFace::triangle(center, pair[0], pair[1]))
                .collect(),
            None => Vec::new(),
        },
        Mode::Lines => indices
            .chunks_exact(2)
            .map(|line| SourceFace::from(line.to_vec()))
            .collect(),
        Mode::LineStrip => indices
            .windows(2)
            .map(|line| SourceFace::from(line.to_vec()))
            .collect(),
        Mode::LineLoop => {
            let mut faces: Vec<SourceFace> = indices
                .windows(2)
                .map(|line| SourceFace::from(line.to_vec()))
                .collect();
            if let (Some(&first), Some(&last)) = (indices.first(), indices.last())
                && indices.len() > 2
            {
                faces.push(SourceFace::from(vec![last, first]));
            }
            faces
        }
        Mode::Points => indices
            .iter()
            .map(|&point| SourceFace::from(vec![point]))
            .collect(),
    }
}

// ─── Materials ────────────────────────────────────────────────────────────────

fn texture_reference(texture: &gltf::Texture) -> String {
    let image = texture.source();
    match image.source() {
        Source::Uri { uri, .. } => uri.to_string(),
        Source::View { .. } => format!("*{}", image.index()),
    }
}

fn convert_material(material: &gltf::Material) -> SourceMaterial {
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, a] = pbr.base_color_factor();
    let mut out = SourceMaterial {
        diffuse: Some([r, g, b]),
        alpha: Some(a),
        texture: pbr
            .base_color_texture()
            .map(|info| texture_reference(&info.texture())),
        ..SourceMaterial::default()
    };

    if let Some(spec_gloss) = material.pbr_specular_glossiness() {
        let [r, g, b, a] = spec_gloss.diffuse_factor();
        out.diffuse = Some([r, g, b]);
        out.alpha = Some(a);
        out.specular = Some(spec_gloss.specular_factor());
        out.shininess = Some(spec_gloss.glossiness_factor() * GLOSSINESS_TO_SHININESS);
        if let Some(info) = spec_gloss.diffuse_texture() {
            out.texture = Some(texture_reference(&info.texture()));
        }
    }

    out
}

// ─── Animations ───────────────────────────────────────────────────────────────

/// Keep only the value element of each cubic-spline key (in-tangent, value,
/// out-tangent triplets).
fn spline_values<T: Copy>(values: Vec<T>, cubic: bool) -> Vec<T> {
    if cubic {
        values.chunks_exact(3).map(|key| key[1]).collect()
    } else {
        values
    }
}

fn convert_animation(animation: &gltf::Animation, buffers: &[buffer::Data]) -> SourceAnimation {
    let mut channels = Vec::<NodeAnimation>::new();
    let mut channel_of_node = HashMap::<usize, usize>::new();
    let mut duration_ticks = 0.0f64;

    for channel in animation.channels() {
        let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(|b| &b.0[..]));
        let Some(inputs) = reader.read_inputs() else {
            continue;
        };
        let Some(outputs) = reader.read_outputs() else {
            continue;
        };
        let times: Vec<f64> = inputs.map(|t| t as f64 * TICKS_PER_SECOND).collect();
        let cubic = matches!(channel.sampler().interpolation(), Interpolation::CubicSpline);

        let node = channel.target().node();
        let slot = *channel_of_node.entry(node.index()).or_insert_with(|| {
            channels.push(NodeAnimation {
                node: node_name(&node),
                ..NodeAnimation::default()
            });
            channels.len() - 1
        });
        let target = &mut channels[slot];

        match outputs {
            ReadOutputs::Translations(values) => {
                let values = spline_values(values.collect(), cubic);
                target.positions = vector_keys(&times, &values);
            }
            ReadOutputs::Scales(values) => {
                let values = spline_values(values.collect(), cubic);
                target.scales = vector_keys(&times, &values);
            }
            ReadOutputs::Rotations(values) => {
                let values = spline_values(values.into_f32().collect(), cubic);
                target.rotations = times
                    .iter()
                    .zip(values)
                    .map(|(&time, value)| QuatKey { time, value })
                    .collect();
            }
            ReadOutputs::MorphTargetWeights(_) => continue,
        }

        if let Some(&last) = times.last() {
            duration_ticks = duration_ticks.max(last);
        }
    }

    // Morph-only channels leave empty entries behind.
    channels.retain(|channel| {
        !(channel.positions.is_empty() && channel.scales.is_empty() && channel.rotations.is_empty())
    });

    SourceAnimation {
        name: animation.name().unwrap_or_default().to_string(),
        duration_ticks,
        ticks_per_second: TICKS_PER_SECOND,
        channels,
    }
}

fn vector_keys(times: &[f64], values: &[[f32; 3]]) -> Vec<VectorKey> {
    times
        .iter()
        .zip(values)
        .map(|(&time, &value)| VectorKey { time, value })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_triangle_strip_when_splitting_then_winding_alternates() {
        let faces = faces_for_mode(Mode::TriangleStrip, &[0, 1, 2, 3]);
        assert_eq!(
            faces,
            vec![SourceFace::triangle(0, 1, 2), SourceFace::triangle(2, 1, 3)]
        );
    }

    #[test]
    fn given_triangle_fan_when_splitting_then_center_is_shared() {
        let faces = faces_for_mode(Mode::TriangleFan, &[0, 1, 2, 3]);
        assert_eq!(
            faces,
            vec![SourceFace::triangle(0, 1, 2), SourceFace::triangle(0, 2, 3)]
        );
    }

    #[test]
    fn given_lines_when_splitting_then_faces_have_two_indices() {
        let faces = faces_for_mode(Mode::Lines, &[0, 1, 2, 3]);
        assert_eq!(faces.len(), 2);
        assert!(faces.iter().all(|face| face.indices.len() == 2));
    }

    #[test]
    fn given_cubic_spline_outputs_when_reducing_then_only_values_remain() {
        let values = vec![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]];
        assert_eq!(spline_values(values, true), vec![[1.0, 1.0, 1.0]]);
    }

    #[test]
    fn given_vertex_joint_slots_when_inverting_then_bones_keep_vertex_order() {
        let joints = vec![
            ("hip".to_string(), Matrix4::identity()),
            ("knee".to_string(), Matrix4::identity()),
        ];
        let vertices = vec![
            ([0u16, 1, 0, 0], [0.75f32, 0.25, 0.0, 0.0]),
            ([1u16, 0, 0, 0], [1.0f32, 0.0, 0.0, 0.0]),
        ];

        let bones = bones_from_vertex_slots(&joints, vertices.into_iter());

        assert_eq!(
            bones[0].weights,
            vec![VertexWeight {
                vertex: 0,
                weight: 0.75
            }]
        );
        assert_eq!(
            bones[1].weights,
            vec![
                VertexWeight {
                    vertex: 0,
                    weight: 0.25
                },
                VertexWeight {
                    vertex: 1,
                    weight: 1.0
                },
            ]
        );
    }
}

use std::f32::consts::PI;

use log::{debug, info};
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

use super::{
    normals::{NORMALIZE_THRESHOLD, synthesize_normals},
    skinning::{BoneRegistry, bind_bone_weights},
};
use crate::{
    model::{Material, Mesh, VertexBuffer},
    scene::{SourceMesh, SourceNode, SourceScene},
};

/// Rotation applied above the scene root when baking with handedness flip.
///
/// Equivalent to a 180° turn about X followed by a 180° turn about Z.
pub(crate) fn handedness_correction() -> Matrix4<f32> {
    Matrix4::from_axis_angle(&Vector3::y_axis(), PI)
}

/// Output of one scene walk.
#[derive(Debug, Default)]
pub(super) struct AssembledGeometry {
    pub(super) vertices: VertexBuffer,
    pub(super) meshes: Vec<Mesh>,
}

/// Walks the node tree depth-first and appends every referenced mesh.
pub(super) struct MeshAssembler<'a> {
    scene: &'a SourceScene,
    registry: &'a BoneRegistry,
    blank_texture: &'a str,
    /// `Some(root)` bakes node transforms into vertices starting from `root`.
    bake_root: Option<Matrix4<f32>>,
    output: AssembledGeometry,
}

impl<'a> MeshAssembler<'a> {
    pub(super) fn new(
        scene: &'a SourceScene,
        registry: &'a BoneRegistry,
        blank_texture: &'a str,
        bake_root: Option<Matrix4<f32>>,
    ) -> Self {
        Self {
            scene,
            registry,
            blank_texture,
            bake_root,
            output: AssembledGeometry::default(),
        }
    }

    pub(super) fn assemble(mut self) -> AssembledGeometry {
        let scene = self.scene;
        let start = self.bake_root.unwrap_or_else(Matrix4::identity);
        self.visit(&scene.root, &start);
        self.output.vertices.clear_unassigned_slots();
        self.output
    }

    fn visit(&mut self, node: &SourceNode, parent: &Matrix4<f32>) {
        let world = parent * node.transform;
        let scene = self.scene;

        for &mesh_index in &node.meshes {
            match scene.meshes.get(mesh_index) {
                Some(mesh) => self.append_mesh(mesh, &world),
                None => debug!("Node {} references missing mesh {mesh_index}", node.name),
            }
        }

        for child in &node.children {
            self.visit(child, &world);
        }
    }

    fn append_mesh(&mut self, mesh: &SourceMesh, world: &Matrix4<f32>) {
        let vertex_count = mesh.vertex_count();
        let normals = match &mesh.normals {
            Some(normals) if normals.len() == vertex_count => normals.clone(),
            _ => {
                info!("Mesh does not have normals...calculating");
                synthesize_normals(&mesh.positions, &mesh.faces)
            }
        };

        let bake = self.bake_root.map(|_| (world, normal_matrix(world)));
        let vertex_start = self.output.vertices.vertex_count();
        for (i, position) in mesh.positions.iter().enumerate() {
            let texcoord = mesh
                .texcoords
                .as_ref()
                .and_then(|texcoords| texcoords.get(i).copied());
            let (position, normal) = match &bake {
                Some((world, normals_to_world)) => (
                    bake_position(world, *position),
                    bake_normal(normals_to_world, normals[i]),
                ),
                None => (*position, normals[i]),
            };
            self.output
                .vertices
                .append_vertex(position, texcoord, normal);
        }

        let material = mesh
            .material
            .and_then(|index| self.scene.materials.get(index))
            .map(|source| Material::from_source(source, self.blank_texture))
            .unwrap_or_else(|| Material::fallback(self.blank_texture));

        let mut faces = Vec::with_capacity(mesh.faces.len() * 3);
        let mut out_of_range = 0usize;
        for face in &mesh.faces {
            let &[a, b, c] = face.indices.as_slice() else {
                continue;
            };
            if [a, b, c].iter().any(|&index| index as usize >= vertex_count) {
                out_of_range += 1;
                continue;
            }
            faces.extend([a, b, c].map(|index| (vertex_start + index as usize) as u32));
        }
        if out_of_range > 0 {
            debug!("Dropped {out_of_range} faces with out-of-range indices");
        }

        if !mesh.bones.is_empty() {
            let dropped = bind_bone_weights(
                &mut self.output.vertices,
                &mesh.bones,
                vertex_start,
                vertex_count,
                self.registry,
            );
            if dropped > 0 {
                debug!("Dropped {dropped} bone influences beyond the slot limit");
            }
        }

        debug!(
            "Mesh with {} vertices, {} triangles",
            vertex_count,
            faces.len() / 3
        );
        if !faces.is_empty() {
            self.output.meshes.push(Mesh { material, faces });
        }
    }
}

/// Inverse-transpose of the upper 3×3, for transforming normals.
fn normal_matrix(world: &Matrix4<f32>) -> Matrix3<f32> {
    let linear: Matrix3<f32> = world.fixed_view::<3, 3>(0, 0).into_owned();
    linear
        .try_inverse()
        .map(|inverse| inverse.transpose())
        .unwrap_or(linear)
}

fn bake_position(world: &Matrix4<f32>, position: [f32; 3]) -> [f32; 3] {
    let point = world.transform_point(&Point3::from(position));
    [point.x, point.y, point.z]
}

fn bake_normal(normal_matrix: &Matrix3<f32>, normal: [f32; 3]) -> [f32; 3] {
    let transformed = normal_matrix * Vector3::from(normal);
    let length = transformed.norm();
    if length > NORMALIZE_THRESHOLD {
        let unit = transformed / length;
        [unit.x, unit.y, unit.z]
    } else {
        [transformed.x, transformed.y, transformed.z]
    }
}

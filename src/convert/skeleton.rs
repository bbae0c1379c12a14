use std::collections::HashMap;

use log::debug;

use super::skinning::BoneRegistry;
use crate::{
    model::Bone,
    scene::{SourceNode, SourceScene},
};

/// Mirror the whole node tree into a skeleton and attach bind data to every
/// node named by a mesh bone.
///
/// Every node becomes a bone, bound or not. When several meshes bind the
/// same name, the last one wins.
pub(super) fn build_skeleton(scene: &SourceScene, registry: &BoneRegistry) -> Bone {
    let mut root = mirror_node(&scene.root);
    let index = path_index(&root);

    for source_bone in scene.meshes.iter().flat_map(|mesh| &mesh.bones) {
        let target = index
            .get(source_bone.name.as_str())
            .and_then(|path| root.at_path_mut(path));
        match target {
            Some(node) => {
                node.boneid = registry.id_of(&source_bone.name);
                node.offset = Some(source_bone.offset);
            }
            None => debug!("Bone {} has no matching node", source_bone.name),
        }
    }
    root
}

fn mirror_node(node: &SourceNode) -> Bone {
    let mut bone = Bone::new(node.name.clone(), node.transform);
    bone.children = node.children.iter().map(mirror_node).collect();
    bone
}

/// Name to child-index path, keeping the first pre-order match per name.
fn path_index(root: &Bone) -> HashMap<String, Vec<usize>> {
    let mut index = HashMap::new();
    let mut stack = vec![(root, Vec::new())];
    while let Some((bone, path)) = stack.pop() {
        index.entry(bone.name.clone()).or_insert_with(|| path.clone());
        // Reverse push keeps pre-order.
        for (i, child) in bone.children.iter().enumerate().rev() {
            let mut child_path = path.clone();
            child_path.push(i);
            stack.push((child, child_path));
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use nalgebra::{Matrix4, Vector3};

    use super::*;
    use crate::scene::{SourceBone, SourceMesh};

    fn node(name: &str, children: Vec<SourceNode>) -> SourceNode {
        let mut node = SourceNode::new(name);
        node.children = children;
        node
    }

    fn mesh_with_bone(name: &str, offset: Matrix4<f32>) -> SourceMesh {
        SourceMesh {
            bones: vec![SourceBone {
                name: name.to_string(),
                offset,
                weights: Vec::new(),
            }],
            ..SourceMesh::default()
        }
    }

    fn scene(root: SourceNode, meshes: Vec<SourceMesh>) -> SourceScene {
        SourceScene {
            root,
            meshes,
            materials: Vec::new(),
            animations: Vec::new(),
        }
    }

    #[test]
    fn given_unbound_nodes_when_building_then_tree_is_isomorphic_to_scene() {
        let root = node(
            "RootNode",
            vec![
                node("hips", vec![node("spine", vec![node("head", vec![])])]),
                node("camera", vec![]),
            ],
        );
        let scene = scene(root, vec![mesh_with_bone("spine", Matrix4::identity())]);
        let registry = BoneRegistry::from_scene(&scene);

        let skeleton = build_skeleton(&scene, &registry);

        assert_eq!(skeleton.node_count(), scene.node_count());
        assert_eq!(skeleton.bound_count(), 1);
        let spine = skeleton.find("spine").expect("spine mirrored");
        assert_eq!(spine.boneid, Some(0));
        assert!(skeleton.find("camera").is_some_and(|b| b.boneid.is_none()));
    }

    #[test]
    fn given_duplicate_node_names_when_binding_then_first_preorder_match_is_used() {
        let root = node(
            "RootNode",
            vec![
                node("left", vec![node("joint", vec![])]),
                node("joint", vec![]),
            ],
        );
        let scene = scene(root, vec![mesh_with_bone("joint", Matrix4::identity())]);
        let registry = BoneRegistry::from_scene(&scene);

        let skeleton = build_skeleton(&scene, &registry);

        assert_eq!(skeleton.children[0].children[0].boneid, Some(0));
        assert_eq!(skeleton.children[1].boneid, None);
    }

    #[test]
    fn given_two_meshes_binding_same_name_when_building_then_last_offset_wins() {
        let first = Matrix4::new_translation(&Vector3::new(1.0, 0.0, 0.0));
        let second = Matrix4::new_translation(&Vector3::new(2.0, 0.0, 0.0));
        let root = node("RootNode", vec![node("hips", vec![])]);
        let scene = scene(
            root,
            vec![mesh_with_bone("hips", first), mesh_with_bone("hips", second)],
        );
        let registry = BoneRegistry::from_scene(&scene);

        let skeleton = build_skeleton(&scene, &registry);

        assert_eq!(skeleton.children[0].offset, Some(second));
    }
}

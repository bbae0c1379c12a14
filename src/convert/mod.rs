mod animation;
mod assembler;
mod material;
mod normals;
mod output;
mod skeleton;
mod skinning;
mod types;

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::info;
use nalgebra::Matrix4;

use crate::{
    error::ConvertError,
    model::CanonicalModel,
    scene::{SceneImporter, SourceScene, importer_for_path},
};

// Re-export public types for callers of this module.
pub use normals::synthesize_normals;
pub use output::{animation_output_path, default_output_path, sanitize_file_component, write_model};
pub use skinning::BoneRegistry;
pub use types::{
    ConversionReport, ConvertOptions, DEFAULT_BLANK_TEXTURE, DEFAULT_TICKS_PER_SECOND,
    TransformMode,
};

use animation::extract_animations;
use assembler::{MeshAssembler, handedness_correction};
use skeleton::build_skeleton;

// ─── Public API ───────────────────────────────────────────────────────────────

/// Resolve `Auto` against the scene content.
pub fn resolve_transform_mode(scene: &SourceScene, mode: TransformMode) -> TransformMode {
    match mode {
        TransformMode::Auto if scene.has_animations() || scene.has_bones() => TransformMode::Local,
        TransformMode::Auto => TransformMode::Baked,
        explicit => explicit,
    }
}

/// Build the canonical model for an already imported scene.
pub fn convert_scene(scene: &SourceScene, name: &str, options: &ConvertOptions) -> CanonicalModel {
    let mode = resolve_transform_mode(scene, options.transform_mode);
    info!("Transform mode: {mode:?}");

    let registry = BoneRegistry::from_scene(scene);
    let bake_root = (mode == TransformMode::Baked).then(|| {
        if options.flip_handedness {
            handedness_correction()
        } else {
            Matrix4::identity()
        }
    });

    let geometry = MeshAssembler::new(scene, &registry, &options.blank_texture, bake_root).assemble();
    // Bound vertices reference bone ids, so rigged scenes keep their skeleton
    // even when the geometry is baked.
    let skeleton = (mode == TransformMode::Local || scene.has_bones())
        .then(|| build_skeleton(scene, &registry));
    let animations = extract_animations(&scene.animations, options.default_ticks_per_second);

    CanonicalModel {
        name: name.to_string(),
        vertices: geometry.vertices,
        meshes: geometry.meshes,
        skeleton,
        animations,
    }
}

/// Import `bytes` with `importer` and build the canonical model.
///
/// The intermediate scene is dropped before returning.
pub fn convert_bytes(
    bytes: &[u8],
    importer: &dyn SceneImporter,
    name: &str,
    options: &ConvertOptions,
) -> Result<CanonicalModel, ConvertError> {
    let scene = importer.import(bytes)?;
    info!(
        "Imported {} scene: {} nodes, {} meshes, {} animations",
        importer.format_name(),
        scene.node_count(),
        scene.meshes.len(),
        scene.animations.len()
    );
    Ok(convert_scene(&scene, name, options))
}

/// Convert one model file and write its documents.
///
/// `output` overrides the main document path; animation files are placed
/// next to it. Nothing is written unless the whole model was built.
pub fn convert_file(
    input: &Path,
    output: Option<&Path>,
    options: &ConvertOptions,
) -> Result<ConversionReport> {
    let importer = importer_for_path(input)?;
    let bytes = fs::read(input)
        .with_context(|| format!("failed to read input model: {}", input.display()))?;
    if bytes.is_empty() {
        return Err(ConvertError::EmptyInput(input.to_path_buf()).into());
    }

    let file_name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());
    let model = convert_bytes(
        &bytes,
        importer.as_ref(),
        &format!("Converted from {file_name}"),
        options,
    )
    .with_context(|| format!("failed to convert {}", input.display()))?;
    drop(bytes);

    let output_paths = write_model(&model, input, output, options)?;

    Ok(ConversionReport {
        model_name: model.name.clone(),
        output_paths,
        mesh_count: model.meshes.len(),
        vertex_count: model.vertex_count(),
        triangle_count: model.triangle_count(),
        bone_count: model.bound_bone_count(),
        animation_count: model.animations.len(),
    })
}

/// Convert each input independently; one failure never affects the others.
pub fn convert_files(inputs: &[PathBuf], options: &ConvertOptions) -> Vec<Result<ConversionReport>> {
    inputs
        .iter()
        .map(|input| convert_file(input, None, options))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::env;

    use super::*;
    use crate::scene::{
        NodeAnimation, SourceAnimation, SourceBone, SourceFace, SourceMesh, SourceNode,
        VertexWeight,
    };

    fn rigged_scene() -> SourceScene {
        let mut root = SourceNode::new("RootNode");
        root.meshes.push(0);
        root.children.push(SourceNode::new("hips"));
        root.children.push(SourceNode::new("spine"));
        SourceScene {
            root,
            meshes: vec![SourceMesh {
                positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                faces: vec![SourceFace::triangle(0, 1, 2)],
                bones: vec![
                    SourceBone {
                        name: "hips".to_string(),
                        offset: Matrix4::identity(),
                        weights: vec![
                            VertexWeight { vertex: 0, weight: 0.5 },
                            VertexWeight { vertex: 1, weight: 1.0 },
                        ],
                    },
                    SourceBone {
                        name: "spine".to_string(),
                        offset: Matrix4::identity(),
                        weights: vec![VertexWeight { vertex: 0, weight: 0.5 }],
                    },
                ],
                ..SourceMesh::default()
            }],
            materials: Vec::new(),
            animations: Vec::new(),
        }
    }

    #[test]
    fn given_auto_mode_when_resolving_then_rigged_scene_stays_local() {
        let mut scene = rigged_scene();
        assert_eq!(
            resolve_transform_mode(&scene, TransformMode::Auto),
            TransformMode::Local
        );

        scene.meshes[0].bones.clear();
        assert_eq!(
            resolve_transform_mode(&scene, TransformMode::Auto),
            TransformMode::Baked
        );

        scene.animations.push(SourceAnimation {
            name: "idle".to_string(),
            duration_ticks: 0.0,
            ticks_per_second: 0.0,
            channels: vec![NodeAnimation::default()],
        });
        assert_eq!(
            resolve_transform_mode(&scene, TransformMode::Auto),
            TransformMode::Local
        );
        assert_eq!(
            resolve_transform_mode(&scene, TransformMode::Baked),
            TransformMode::Baked
        );
    }

    #[test]
    fn given_rigged_scene_when_converting_then_skeleton_and_slots_are_bound() {
        let model = convert_scene(&rigged_scene(), "Converted from rig.glb", &ConvertOptions::default());

        let skeleton = model.skeleton.as_ref().expect("local mode writes a skeleton");
        assert_eq!(skeleton.node_count(), 3);
        assert_eq!(model.bound_bone_count(), 2);
        assert_eq!(model.vertices.bone_slots(0), ([0.0, 1.0, 0.0, 0.0], [0.5, 0.5, 0.0, 0.0]));
        assert_eq!(model.vertices.bone_slots(2), ([0.0; 4], [0.0; 4]));
        assert_eq!(model.vertices.data().len() % 16, 0);
        assert_eq!(model.triangle_count(), 1);
    }

    #[test]
    fn given_rigged_scene_in_baked_mode_when_converting_then_bound_ids_exist_in_skeleton() {
        let options = ConvertOptions {
            transform_mode: TransformMode::Baked,
            ..ConvertOptions::default()
        };

        let model = convert_scene(&rigged_scene(), "baked", &options);

        let skeleton = model.skeleton.as_ref().expect("rigged scene keeps a skeleton");
        assert_eq!(model.bound_bone_count(), 2);
        let (ids, weights) = model.vertices.bone_slots(0);
        assert_eq!(ids, [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(weights, [0.5, 0.5, 0.0, 0.0]);
        for name in ["hips", "spine"] {
            let bone = skeleton.children.iter().find(|bone| bone.name == name);
            assert!(bone.and_then(|bone| bone.boneid).is_some(), "{name} is bound");
        }
        // Geometry is still baked with the root flip.
        assert!((model.vertices.position(1)[0] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn given_static_scene_when_converting_then_geometry_is_baked_without_skeleton() {
        let mut scene = rigged_scene();
        scene.meshes[0].bones.clear();

        let model = convert_scene(&scene, "static", &ConvertOptions::default());

        assert!(model.skeleton.is_none());
        let position = model.vertices.position(1);
        assert!((position[0] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn given_empty_file_when_converting_then_nothing_is_written() {
        let dir = env::temp_dir().join(format!("modelconvert-empty-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("create temp dir");
        let input = dir.join("empty.glb");
        fs::write(&input, b"").expect("write empty input");

        let error = convert_file(&input, None, &ConvertOptions::default())
            .expect_err("empty input must fail");

        assert!(matches!(
            error.downcast_ref::<ConvertError>(),
            Some(ConvertError::EmptyInput(_))
        ));
        assert!(!default_output_path(&input).exists());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn given_batch_with_bad_file_when_converting_then_each_input_gets_its_own_result() {
        let results = convert_files(
            &[PathBuf::from("missing.glb"), PathBuf::from("notes.txt")],
            &ConvertOptions::default(),
        );

        assert_eq!(results.len(), 2);
        assert!(results[0].is_err());
        let unsupported = results[1].as_ref().expect_err("txt is unsupported");
        assert!(matches!(
            unsupported.downcast_ref::<ConvertError>(),
            Some(ConvertError::UnsupportedFormat(ext)) if ext == "txt"
        ));
    }
}

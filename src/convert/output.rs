use std::{
    collections::HashSet,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::info;

use super::types::ConvertOptions;
use crate::model::CanonicalModel;

/// `<input>.json`, next to the input file.
pub fn default_output_path(input: &Path) -> PathBuf {
    let mut path = OsString::from(input.as_os_str());
    path.push(".json");
    PathBuf::from(path)
}

/// `<main without .json>.<animation>.anim.json`.
pub fn animation_output_path(main_output: &Path, animation_name: &str) -> PathBuf {
    let raw = main_output.as_os_str().to_string_lossy();
    let base = raw.strip_suffix(".json").unwrap_or(&raw);
    PathBuf::from(format!(
        "{base}.{}.anim.json",
        sanitize_file_component(animation_name)
    ))
}

/// Replace path separators so an animation name stays one path component.
pub fn sanitize_file_component(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect()
}

/// Serialize every document for `model` and write them out.
///
/// All documents are rendered in memory first so a serialization failure
/// writes nothing. Returns the written paths, main document first.
pub fn write_model(
    model: &CanonicalModel,
    input: &Path,
    output: Option<&Path>,
    options: &ConvertOptions,
) -> Result<Vec<PathBuf>> {
    let main_path = output.map_or_else(|| default_output_path(input), Path::to_path_buf);
    let split = options.split_animations;

    let mut documents = Vec::with_capacity(1 + model.animations.len());
    let main = serde_json::to_vec(&model.document(!split))
        .context("failed to serialize model document as JSON")?;
    documents.push((main_path.clone(), main));

    if split {
        let mut used = HashSet::new();
        for (index, animation) in model.animations.iter().enumerate() {
            let mut path = animation_output_path(&main_path, &animation.name);
            let mut suffix = index;
            while !used.insert(path.clone()) {
                path = animation_output_path(&main_path, &format!("{}_{suffix}", animation.name));
                suffix += 1;
            }
            let content = serde_json::to_vec(animation).with_context(|| {
                format!("failed to serialize animation {} as JSON", animation.name)
            })?;
            documents.push((path, content));
        }
    }

    let mut written = Vec::with_capacity(documents.len());
    for (path, content) in documents {
        fs::write(&path, content)
            .with_context(|| format!("failed to write output file: {}", path.display()))?;
        info!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::env;

    use serde_json::Value;

    use super::*;
    use crate::model::Animation;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("modelconvert-output-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn animated_model() -> CanonicalModel {
        let animation = |name: &str| Animation {
            name: name.to_string(),
            length: 1.0,
            channels: Vec::new(),
        };
        CanonicalModel {
            name: "Converted from dancer.glb".to_string(),
            animations: vec![animation("walk"), animation("arm/wave"), animation("walk")],
            ..CanonicalModel::default()
        }
    }

    #[test]
    fn given_input_path_when_deriving_outputs_then_suffixes_are_appended() {
        let main = default_output_path(Path::new("models/dancer.glb"));
        assert_eq!(main, PathBuf::from("models/dancer.glb.json"));
        assert_eq!(
            animation_output_path(&main, "arm/wave"),
            PathBuf::from("models/dancer.glb.arm_wave.anim.json")
        );
    }

    #[test]
    fn given_split_animations_when_writing_then_one_file_per_animation_is_created() {
        let dir = temp_dir("split");
        let input = dir.join("dancer.glb");

        let written = write_model(&animated_model(), &input, None, &ConvertOptions::default())
            .expect("write model");

        assert_eq!(written.len(), 4);
        assert_eq!(written[0], dir.join("dancer.glb.json"));
        assert_eq!(written[1], dir.join("dancer.glb.walk.anim.json"));
        assert_eq!(written[2], dir.join("dancer.glb.arm_wave.anim.json"));
        assert_eq!(written[3], dir.join("dancer.glb.walk_2.anim.json"));

        let main: Value =
            serde_json::from_slice(&fs::read(&written[0]).expect("read main")).expect("parse");
        assert!(main.get("animations").is_none());
        let walk: Value =
            serde_json::from_slice(&fs::read(&written[1]).expect("read anim")).expect("parse");
        assert_eq!(walk["name"], "walk");

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn given_suffixed_name_already_taken_when_writing_then_no_file_is_overwritten() {
        let dir = temp_dir("collision");
        let input = dir.join("dancer.glb");
        let mut model = animated_model();
        model.animations[1].name = "walk_2".to_string();

        let written = write_model(&model, &input, None, &ConvertOptions::default())
            .expect("write model");

        assert_eq!(written[1], dir.join("dancer.glb.walk.anim.json"));
        assert_eq!(written[2], dir.join("dancer.glb.walk_2.anim.json"));
        assert_eq!(written[3], dir.join("dancer.glb.walk_3.anim.json"));
        let taken: Value =
            serde_json::from_slice(&fs::read(&written[2]).expect("read anim")).expect("parse");
        assert_eq!(taken["name"], "walk_2");

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn given_embedded_animations_when_writing_explicit_output_then_single_file_is_created() {
        let dir = temp_dir("embedded");
        let output = dir.join("custom.json");
        let options = ConvertOptions {
            split_animations: false,
            ..ConvertOptions::default()
        };

        let written = write_model(&animated_model(), Path::new("dancer.glb"), Some(output.as_path()), &options)
            .expect("write model");

        assert_eq!(written, vec![output.clone()]);
        let main: Value =
            serde_json::from_slice(&fs::read(&output).expect("read main")).expect("parse");
        assert_eq!(main["animations"].as_array().map(Vec::len), Some(3));

        fs::remove_dir_all(dir).ok();
    }
}

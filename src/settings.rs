use std::{fs, path::Path};

use anyhow::{Context, Result};

use crate::convert::ConvertOptions;

/// Save conversion options to a JSON file.
pub fn save_options(path: &Path, options: &ConvertOptions) -> Result<()> {
    let content = serde_json::to_string_pretty(options)
        .context("failed to serialize conversion options as JSON")?;
    fs::write(path, content)
        .with_context(|| format!("failed to save conversion options: {}", path.display()))?;
    Ok(())
}

/// Load conversion options from a JSON file. Missing keys keep their defaults.
pub fn load_options(path: &Path) -> Result<ConvertOptions> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to load conversion options: {}", path.display()))?;
    let options: ConvertOptions =
        serde_json::from_str(&content).context("failed to parse conversion options JSON")?;
    Ok(options)
}

#[cfg(test)]
mod tests {
    use std::env;

    use super::*;
    use crate::convert::TransformMode;

    #[test]
    fn given_saved_options_when_loading_then_values_survive() {
        let path = env::temp_dir().join(format!("modelconvert-settings-{}.json", std::process::id()));
        let options = ConvertOptions {
            transform_mode: TransformMode::Local,
            default_ticks_per_second: 30.0,
            ..ConvertOptions::default()
        };

        save_options(&path, &options).expect("save options");
        let loaded = load_options(&path).expect("load options");
        fs::remove_file(&path).ok();

        assert_eq!(loaded, options);
    }

    #[test]
    fn given_missing_file_when_loading_then_error_names_the_path() {
        let error = load_options(Path::new("does/not/exist.json")).expect_err("missing file");
        assert!(format!("{error:#}").contains("does/not/exist.json"));
    }
}

use std::{env, path::PathBuf, process};

use env_logger::Env;
use modelconvert::{ConvertOptions, convert::convert_files, settings::load_options};

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match run() {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            eprintln!("{err:#}");
            process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when at least one input failed.
fn run() -> anyhow::Result<bool> {
    let mut args = env::args().skip(1);
    let mut settings = None;
    let mut inputs = Vec::new();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--settings" => match args.next() {
                Some(path) => settings = Some(PathBuf::from(path)),
                None => usage(),
            },
            "-h" | "--help" => usage(),
            _ => inputs.push(PathBuf::from(arg)),
        }
    }
    if inputs.is_empty() {
        usage();
    }

    let options = match settings {
        Some(path) => load_options(&path)?,
        None => ConvertOptions::default(),
    };

    let mut all_ok = true;
    for (input, result) in inputs.iter().zip(convert_files(&inputs, &options)) {
        match result {
            Ok(report) => {
                println!("Model: {}", report.model_name);
                println!(
                    "Meshes: {}, Vertices: {}, Triangles: {}",
                    report.mesh_count, report.vertex_count, report.triangle_count
                );
                println!(
                    "Bones: {}, Animations: {}",
                    report.bone_count, report.animation_count
                );
                for path in &report.output_paths {
                    println!("  -> {}", path.display());
                }
            }
            Err(err) => {
                eprintln!("{}: {err:#}", input.display());
                all_ok = false;
            }
        }
    }
    Ok(all_ok)
}

fn usage() -> ! {
    eprintln!("Usage: modelconvert [--settings <options.json>] <input.gltf|glb|pmd>...");
    process::exit(2);
}

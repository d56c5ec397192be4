/// Offline background removal for a single image
///
/// Usage: cargo run --release --bin remove_bg -- input.png [--output dir]

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

use bg_remover::core::config::Config;
use bg_remover::services::OnnxBackgroundRemover;
use bg_remover::utils::upload::{nobg_filename, validate_type};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <image> [--output dir]", args[0]);
        std::process::exit(1);
    }

    let input_path = Path::new(&args[1]);
    let mut output_dir: Option<PathBuf> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--output" | "-o" if i + 1 < args.len() => {
                output_dir = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            _ => i += 1,
        }
    }

    let file_name = input_path
        .file_name()
        .and_then(|s| s.to_str())
        .context("Input path has no usable file name")?;
    validate_type(file_name)?;

    let output_dir = match output_dir {
        Some(dir) => dir,
        None => input_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    println!("Loading: {}", input_path.display());
    let bytes = std::fs::read(input_path)
        .with_context(|| format!("Failed to read {}", input_path.display()))?;

    println!("Initializing model...");
    let config = Config::new()?;
    let remover = OnnxBackgroundRemover::new(&config)?;
    println!("Backend: {}", remover.device_type());

    let start = Instant::now();
    let png = remover.remove_background(&bytes)?;
    println!("Removed background in {:.2}s", start.elapsed().as_secs_f64());

    let output_path = output_dir.join(nobg_filename(file_name));
    std::fs::write(&output_path, png)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    println!("Saved: {}", output_path.display());

    Ok(())
}

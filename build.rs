use std::env;

fn main() {
    // The model is read at runtime from MODEL_PATH; this only checks the default location
    let model_path = "models/u2net.onnx";
    println!("cargo:rerun-if-changed={}", model_path);
    println!("cargo:rerun-if-env-changed=MODEL_PATH");

    match std::fs::metadata(model_path) {
        Ok(meta) if meta.len() < 1024 => {
            println!(
                "cargo:warning={} is only {} bytes; it may be a Git LFS pointer",
                model_path,
                meta.len()
            );
        }
        Ok(meta) => {
            println!(
                "cargo:warning=Found u2net.onnx: {:.1} MB",
                meta.len() as f64 / 1_048_576.0
            );
        }
        Err(_) if env::var("MODEL_PATH").is_err() => {
            println!(
                "cargo:warning=Model not found at {}. Set MODEL_PATH or copy the model there before starting the server.",
                model_path
            );
        }
        Err(_) => {}
    }

    // Detect enabled acceleration features
    let mut enabled_features = Vec::new();

    if env::var("CARGO_FEATURE_CUDA").is_ok() {
        enabled_features.push("CUDA");
    }
    if env::var("CARGO_FEATURE_COREML").is_ok() {
        enabled_features.push("CoreML");
    }

    if enabled_features.is_empty() {
        println!("cargo:warning=Building with CPU-only inference (no GPU acceleration)");
        println!("cargo:warning=To enable GPU: cargo build --features cuda (or coreml on macOS)");
    } else {
        println!("cargo:warning=GPU acceleration enabled: {}", enabled_features.join(", "));
    }
}

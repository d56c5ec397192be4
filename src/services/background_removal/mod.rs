// Background removal using a u2net-style salient object model

use anyhow::{Context, Result};
use image::DynamicImage;
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::core::config::Config;
use crate::core::errors::ProcessingResult;
use crate::services::onnx_builder::{self, OnnxSessionPool};
use crate::services::processor::ImageProcessor;
use crate::utils::image_ops::{
    apply_alpha_mask, encode_png, load_image_from_memory, prediction_to_mask,
    to_normalized_tensor,
};

/// Load model bytes from the configured path
fn load_model_bytes(config: &Config) -> Result<Vec<u8>> {
    let path = config.model_path();
    debug!("Loading background removal model from: {}", path);
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to load background removal model from {}", path))?;

    // Git LFS pointer files are ~130 bytes
    if bytes.len() < 1024 {
        anyhow::bail!(
            "Model file {} is too small ({} bytes). This might be a Git LFS stub.",
            path,
            bytes.len()
        );
    }
    Ok(bytes)
}

/// ONNX-backed `ImageProcessor`.
///
/// Holds a fixed pool of sessions created at startup; each call borrows one
/// session for the duration of a single inference.
pub struct OnnxBackgroundRemover {
    session_pool: OnnxSessionPool,
    input_name: String,
    output_name: String,
    input_size: u32,
    device_type: String,
}

impl OnnxBackgroundRemover {
    /// Load the model, fill the session pool and run one warmup inference
    #[instrument(skip(config), fields(model = config.model_path(), pool = config.onnx_pool_size()))]
    pub fn new(config: &Config) -> Result<Self> {
        let model_bytes = load_model_bytes(config)?;
        info!(
            "Loaded background removal model ({:.1} MB)",
            model_bytes.len() as f64 / 1_048_576.0
        );

        let pool_size = config.onnx_pool_size();
        let forced_backend = config.model.inference_backend.as_deref();
        let session_pool = OnnxSessionPool::new(pool_size);

        let mut device_type = String::new();
        let mut input_name = String::new();
        let mut output_name = String::new();

        for i in 0..pool_size {
            let (backend, session) = onnx_builder::build_session_with_acceleration(
                &model_bytes,
                "background-removal",
                forced_backend,
                pool_size,
            )?;

            if i == 0 {
                input_name = session
                    .inputs
                    .first()
                    .map(|input| input.name.clone())
                    .context("Model declares no inputs")?;
                output_name = session
                    .outputs
                    .first()
                    .map(|output| output.name.clone())
                    .context("Model declares no outputs")?;
                device_type = backend;
            }
            session_pool.add_session(session)?;
        }

        let remover = Self {
            session_pool,
            input_name,
            output_name,
            input_size: config.input_size(),
            device_type,
        };

        info!("Running warmup inference for background removal...");
        let warmup_start = Instant::now();
        remover.warmup()?;
        info!(
            "✓ Background removal: {} ({} sessions, warmup {:.2}ms)",
            remover.device_type,
            pool_size,
            warmup_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(remover)
    }

    /// Backend the sessions run on ("CPU", "CUDA", ...)
    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    fn warmup(&self) -> Result<()> {
        let dummy = DynamicImage::new_rgb8(self.input_size, self.input_size);
        self.predict_mask(&dummy).map(|_| ())
    }

    /// Run the model and return the raw mask at model resolution
    fn predict_mask(&self, img: &DynamicImage) -> Result<image::GrayImage> {
        let tensor = to_normalized_tensor(img, self.input_size);
        let input_value = ort::value::Value::from_array(tensor)?;

        let (shape, prediction) = {
            let mut session = self.session_pool.acquire()?;
            let outputs = session.run(ort::inputs![self.input_name.as_str() => input_value])?;
            let (shape, data) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
            (shape.to_vec(), data.to_vec())
        };

        // Expect [1, 1, H, W]; only the trailing two dims matter
        anyhow::ensure!(
            shape.len() >= 2,
            "Unexpected model output shape {:?}",
            shape
        );
        let height = shape[shape.len() - 2] as u32;
        let width = shape[shape.len() - 1] as u32;
        let plane = (width as usize) * (height as usize);
        anyhow::ensure!(
            prediction.len() >= plane,
            "Model output has {} values, expected at least {}",
            prediction.len(),
            plane
        );

        prediction_to_mask(&prediction[..plane], width, height)
    }

    /// Decode, segment, cut out and re-encode as PNG
    #[instrument(skip(self, input), fields(bytes = input.len()))]
    pub fn remove_background(&self, input: &[u8]) -> Result<Vec<u8>> {
        let start = Instant::now();

        let img = load_image_from_memory(input)?;
        debug!("Removing background from {}x{} image", img.width(), img.height());

        let mask = self.predict_mask(&img)?;
        let cutout = DynamicImage::ImageRgba8(apply_alpha_mask(&img, &mask));
        let png = encode_png(&cutout)?;

        debug!(
            "Background removed in {:.2}ms ({} bytes out)",
            start.elapsed().as_secs_f64() * 1000.0,
            png.len()
        );
        Ok(png)
    }
}

impl ImageProcessor for OnnxBackgroundRemover {
    fn process(&self, input: &[u8]) -> ProcessingResult<Vec<u8>> {
        Ok(self.remove_background(input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::test_config;

    #[test]
    fn test_missing_model_is_an_error() {
        let mut config = test_config("/tmp/uploads");
        config.model.model_path = "/nonexistent/u2net.onnx".to_string();
        let err = OnnxBackgroundRemover::new(&config).err().unwrap();
        assert!(format!("{:#}", err).contains("/nonexistent/u2net.onnx"));
    }

    #[test]
    fn test_lfs_stub_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("u2net.onnx");
        std::fs::write(&path, b"version https://git-lfs.github.com/spec/v1\n").unwrap();

        let mut config = test_config(dir.path());
        config.model.model_path = path.display().to_string();
        let err = OnnxBackgroundRemover::new(&config).err().unwrap();
        assert!(err.to_string().contains("too small"));
    }
}

use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage, GrayImage, ImageFormat, RgbaImage};
use ndarray::Array4;
use std::io::Cursor;

/// ImageNet channel statistics used by u2net-family models
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Decode an image of any enabled format from memory
pub fn load_image_from_memory(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).context("Failed to load image from memory")
}

/// Encode an image as PNG bytes
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    let mut cursor = Cursor::new(&mut png_bytes);
    img.write_to(&mut cursor, ImageFormat::Png)
        .context("Failed to encode image as PNG")?;
    Ok(png_bytes)
}

/// Build the NCHW model input for a salient-object model.
///
/// The image is resized to `size`x`size`, scaled by its brightest channel
/// value, then normalized with the ImageNet mean and std.
pub fn to_normalized_tensor(img: &DynamicImage, size: u32) -> Array4<f32> {
    let resized = img.resize_exact(size, size, FilterType::Lanczos3);
    let rgb = resized.to_rgb8();

    let max_value = rgb.as_raw().iter().copied().max().unwrap_or(0).max(1) as f32;

    let side = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            let value = pixel[c] as f32 / max_value;
            tensor[[0, c, y as usize, x as usize]] = (value - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }
    tensor
}

/// Min-max normalize a raw prediction into a `width`x`height` 8-bit mask
pub fn prediction_to_mask(prediction: &[f32], width: u32, height: u32) -> Result<GrayImage> {
    let expected = (width as usize) * (height as usize);
    anyhow::ensure!(
        prediction.len() == expected,
        "Prediction has {} values, expected {}x{}",
        prediction.len(),
        width,
        height
    );

    let (min, max) = prediction
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;

    let pixels = prediction
        .iter()
        .map(|&v| {
            let scaled = if range > f32::EPSILON { (v - min) / range } else { 0.0 };
            (scaled * 255.0).round().clamp(0.0, 255.0) as u8
        })
        .collect();

    GrayImage::from_raw(width, height, pixels).context("Failed to build mask image")
}

/// Use `mask` (resized to fit) as the alpha channel of `img`
pub fn apply_alpha_mask(img: &DynamicImage, mask: &GrayImage) -> RgbaImage {
    let (width, height) = (img.width(), img.height());
    let mask = if mask.dimensions() == (width, height) {
        mask.clone()
    } else {
        image::imageops::resize(mask, width, height, FilterType::Lanczos3)
    };

    let mut rgba = img.to_rgba8();
    for (pixel, alpha) in rgba.pixels_mut().zip(mask.pixels()) {
        pixel[3] = alpha[0];
    }
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgba};

    fn red_png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([255, 0, 0, 255]),
        ));
        encode_png(&img).unwrap()
    }

    #[test]
    fn test_load_and_encode_round_trip() {
        let img = load_image_from_memory(&red_png(3, 2)).unwrap();
        assert_eq!((img.width(), img.height()), (3, 2));
    }

    #[test]
    fn test_load_rejects_garbage() {
        assert!(load_image_from_memory(b"definitely not an image").is_err());
    }

    #[test]
    fn test_tensor_shape_and_normalization() {
        let img = load_image_from_memory(&red_png(10, 7)).unwrap();
        let tensor = to_normalized_tensor(&img, 8);
        assert_eq!(tensor.shape(), &[1, 3, 8, 8]);

        // Red channel is the max value, so it scales to 1.0
        let expected_r = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let expected_g = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        assert!((tensor[[0, 0, 4, 4]] - expected_r).abs() < 0.05);
        assert!((tensor[[0, 1, 4, 4]] - expected_g).abs() < 0.05);
    }

    #[test]
    fn test_prediction_to_mask_stretches_range() {
        let mask = prediction_to_mask(&[0.0, 1.0, 2.0, 0.0], 2, 2).unwrap();
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
        assert_eq!(mask.get_pixel(0, 1)[0], 255);
        assert_eq!(mask.get_pixel(1, 0)[0], 128);
    }

    #[test]
    fn test_prediction_to_mask_flat_input() {
        let mask = prediction_to_mask(&[0.5; 4], 2, 2).unwrap();
        assert!(mask.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_prediction_to_mask_wrong_length() {
        assert!(prediction_to_mask(&[0.5; 3], 2, 2).is_err());
    }

    #[test]
    fn test_apply_alpha_mask_resizes_mask() {
        let img = load_image_from_memory(&red_png(4, 4)).unwrap();
        let mask = GrayImage::from_pixel(2, 2, Luma([0]));
        let out = apply_alpha_mask(&img, &mask);
        assert_eq!(out.dimensions(), (4, 4));
        assert!(out.pixels().all(|p| p[3] == 0 && p[0] == 255));
    }
}

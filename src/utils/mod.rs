pub mod image_ops;
pub mod metrics;
pub mod upload;

// Re-export commonly used items
pub use image_ops::{
    apply_alpha_mask, encode_png, load_image_from_memory, prediction_to_mask,
    to_normalized_tensor,
};
pub use metrics::Metrics;
pub use upload::{nobg_filename, sanitize_filename, validate, validate_type};

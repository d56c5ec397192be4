pub mod background_removal;
pub mod onnx_builder; // Shared ONNX session builder and pool
pub mod processor;

// Re-export commonly used services
pub use background_removal::OnnxBackgroundRemover;
pub use processor::ImageProcessor;

// Image processor capability
//
// Handlers only see this trait; the ONNX model sits behind it in production
// and tests swap in stubs.

use crate::core::errors::ProcessingResult;

/// Removes the background from an encoded image.
///
/// Implementations are synchronous and may block for the whole inference, so
/// async callers must run them on the blocking pool. Output is always PNG.
/// Every failure is reported as one opaque `ProcessingFailure`.
pub trait ImageProcessor: Send + Sync {
    fn process(&self, input: &[u8]) -> ProcessingResult<Vec<u8>>;
}

// Shared ONNX Runtime session builder with hardware acceleration detection

use anyhow::{Context, Result};
use crossbeam::channel::{bounded, Receiver, Sender};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::ops::{Deref, DerefMut};
use tracing::{debug, info, warn};

#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;

#[cfg(all(target_os = "macos", feature = "coreml"))]
use ort::execution_providers::CoreMLExecutionProvider;

/// Calculate thread count for ONNX Runtime CPU inference.
///
/// Each pooled session gets an equal share of the cores so concurrent requests
/// don't oversubscribe the CPU.
fn intra_op_threads(pool_size: usize) -> usize {
    let total_cores = num_cpus::get();

    #[cfg(target_os = "windows")]
    let cap = 6;
    #[cfg(not(target_os = "windows"))]
    let cap = total_cores;

    let threads = (total_cores / pool_size.max(1)).clamp(1, cap.max(1));
    debug!("CPU threads: {} total cores, {} per session", total_cores, threads);
    threads
}

/// Fixed-size pool of ONNX sessions backed by a crossbeam bounded channel
pub struct OnnxSessionPool {
    sender: Sender<Session>,
    receiver: Receiver<Session>,
    capacity: usize,
}

impl OnnxSessionPool {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of idle sessions
    pub fn available(&self) -> usize {
        self.receiver.len()
    }

    pub fn add_session(&self, session: Session) -> Result<()> {
        self.sender
            .try_send(session)
            .map_err(|_| anyhow::anyhow!("Session pool is full ({} sessions)", self.capacity))
    }

    /// Borrow a session, blocking until one is idle.
    ///
    /// The session goes back to the pool when the guard is dropped, including
    /// when inference fails.
    pub fn acquire(&self) -> Result<PooledSession<'_>> {
        let session = self
            .receiver
            .recv()
            .context("Session pool closed")?;
        Ok(PooledSession {
            session: Some(session),
            pool: self,
        })
    }
}

/// Session borrowed from an `OnnxSessionPool`
pub struct PooledSession<'a> {
    session: Option<Session>,
    pool: &'a OnnxSessionPool,
}

impl Deref for PooledSession<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        self.session.as_ref().expect("session present until drop")
    }
}

impl DerefMut for PooledSession<'_> {
    fn deref_mut(&mut self) -> &mut Session {
        self.session.as_mut().expect("session present until drop")
    }
}

impl Drop for PooledSession<'_> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            if self.pool.sender.try_send(session).is_err() {
                warn!("Dropping ONNX session: pool is already full");
            }
        }
    }
}

/// Build an ONNX Runtime session, trying compiled-in accelerators first.
///
/// Order: CUDA, CoreML, CPU. `forced_backend` ("cuda", "coreml" or "cpu")
/// skips detection.
///
/// Returns (backend_name, Session)
pub fn build_session_with_acceleration(
    model_bytes: &[u8],
    model_name: &str,
    forced_backend: Option<&str>,
    pool_size: usize,
) -> Result<(String, Session)> {
    let threads = intra_op_threads(pool_size);

    if let Some(backend) = forced_backend {
        info!("INFERENCE_BACKEND={}, forcing specific backend for {}", backend, model_name);
        return try_forced_backend(backend, model_bytes, model_name, pool_size);
    }

    #[cfg(feature = "cuda")]
    {
        if let Ok(session) = Session::builder()
            .and_then(|b| b.with_execution_providers([CUDAExecutionProvider::default().build()]))
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(threads))
            .and_then(|b| b.with_inter_threads(1))
            .and_then(|b| b.commit_from_memory(model_bytes))
        {
            info!("✓ Using CUDA acceleration for {}", model_name);
            return Ok(("CUDA".to_string(), session));
        }
    }

    #[cfg(all(target_os = "macos", feature = "coreml"))]
    {
        if let Ok(session) = Session::builder()
            .and_then(|b| b.with_execution_providers([CoreMLExecutionProvider::default().build()]))
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(threads))
            .and_then(|b| b.with_inter_threads(1))
            .and_then(|b| b.commit_from_memory(model_bytes))
        {
            info!("✓ Using CoreML acceleration for {} (Apple Neural Engine)", model_name);
            return Ok(("CoreML".to_string(), session));
        }
    }

    let session = build_cpu_session(model_bytes, model_name, threads)?;
    warn!("Using CPU-only inference for {} (no GPU acceleration available)", model_name);
    Ok(("CPU".to_string(), session))
}

fn build_cpu_session(model_bytes: &[u8], model_name: &str, threads: usize) -> Result<Session> {
    Session::builder()
        .context(format!("Failed to create ONNX session builder for {}", model_name))?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .context(format!("Failed to configure CPU execution provider for {}", model_name))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context(format!("Failed to set graph optimization level for {}", model_name))?
        .with_intra_threads(threads)
        .context(format!("Failed to configure intra-op threads for {}", model_name))?
        .with_inter_threads(1)
        .context(format!("Failed to configure inter-op threads for {}", model_name))?
        .commit_from_memory(model_bytes)
        .context(format!(
            "Failed to load {} ONNX model from memory ({:.1} MB)",
            model_name,
            model_bytes.len() as f64 / 1_048_576.0
        ))
}

fn try_forced_backend(
    backend: &str,
    model_bytes: &[u8],
    model_name: &str,
    pool_size: usize,
) -> Result<(String, Session)> {
    let threads = intra_op_threads(pool_size);
    match backend.to_lowercase().as_str() {
        #[cfg(feature = "cuda")]
        "cuda" => {
            let session = Session::builder()
                .context("Failed to create session builder")?
                .with_execution_providers([CUDAExecutionProvider::default().build()])
                .context("Failed to configure CUDA provider")?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .context("Failed to set optimization level")?
                .with_intra_threads(threads)
                .context("Failed to configure intra-op threads")?
                .with_inter_threads(1)
                .context("Failed to configure inter-op threads")?
                .commit_from_memory(model_bytes)
                .context("Failed to load model with CUDA")?;
            info!("✓ Forced CUDA backend for {}", model_name);
            Ok(("CUDA".to_string(), session))
        }

        #[cfg(all(target_os = "macos", feature = "coreml"))]
        "coreml" => {
            let session = Session::builder()
                .context("Failed to create session builder")?
                .with_execution_providers([CoreMLExecutionProvider::default().build()])
                .context("Failed to configure CoreML provider")?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .context("Failed to set optimization level")?
                .with_intra_threads(threads)
                .context("Failed to configure intra-op threads")?
                .with_inter_threads(1)
                .context("Failed to configure inter-op threads")?
                .commit_from_memory(model_bytes)
                .context("Failed to load model with CoreML")?;
            info!("✓ Forced CoreML backend for {}", model_name);
            Ok(("CoreML".to_string(), session))
        }

        "cpu" => {
            let session = build_cpu_session(model_bytes, model_name, threads)?;
            info!("✓ Forced CPU backend for {}", model_name);
            Ok(("CPU".to_string(), session))
        }

        _ => {
            warn!("Unknown backend '{}', falling back to auto-detection for {}", backend, model_name);
            build_session_with_acceleration(model_bytes, model_name, None, pool_size)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intra_op_threads_is_positive() {
        assert!(intra_op_threads(1) >= 1);
        assert!(intra_op_threads(1024) >= 1);
        assert!(intra_op_threads(0) >= 1);
    }

    #[test]
    fn test_empty_pool_reports_capacity() {
        let pool = OnnxSessionPool::new(3);
        assert_eq!(pool.capacity(), 3);
        assert_eq!(pool.available(), 0);
    }
}

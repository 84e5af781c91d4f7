//! GPU context: owns the `wgpu::Device` and `Queue`.
//!
//! Glint renders offscreen only, so the context is always headless. The
//! default render target is a texture owned by the backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};
use thiserror::Error;
use wgpu::{Adapter, Device, DeviceDescriptor, Instance, InstanceDescriptor, Queue, RequestAdapterOptions};

#[derive(Error, Debug)]
pub enum GpuError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,
    #[error("Failed to request device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("Readback failed: {0}")]
    Readback(String),
}

/// Device, queue and adapter plus a device-lost flag.
pub struct GpuContext {
    pub device: Device,
    pub queue: Queue,
    pub adapter: Adapter,
    lost: Arc<AtomicBool>,
}

impl GpuContext {
    /// Create a headless context (no window, no surface).
    ///
    /// Useful for off-screen rendering, tests, and CI pipelines.
    pub async fn new_headless() -> Result<Self, GpuError> {
        Self::new_headless_with_label("glint-headless").await
    }

    pub async fn new_headless_with_label(label: &str) -> Result<Self, GpuError> {
        let instance = Instance::new(&InstanceDescriptor::default());

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: Some(label),
                    ..Default::default()
                },
                None,
            )
            .await?;

        let lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            warn!("GPU device lost ({reason:?}): {message}");
            flag.store(true, Ordering::SeqCst);
        });

        let adapter_info = adapter.get_info();
        info!("GPU context ready: {} ({:?})", adapter_info.name, adapter_info.backend);

        Ok(Self { device, queue, adapter, lost })
    }

    /// Synchronous wrapper around [`GpuContext::new_headless`].
    pub fn new_headless_blocking() -> Result<Self, GpuError> {
        pollster::block_on(Self::new_headless())
    }

    /// The device has been lost; every GPU resource is gone.
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }

    /// Largest 2D texture edge the device accepts.
    pub fn max_texture_size(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_context_is_not_lost() {
        // May fail in CI without GPU; skip gracefully.
        if let Ok(ctx) = GpuContext::new_headless_blocking() {
            assert!(!ctx.is_lost());
            assert!(ctx.max_texture_size() >= 2048);
        }
    }

    #[test]
    fn test_gpu_error_messages() {
        assert_eq!(GpuError::NoAdapter.to_string(), "No suitable GPU adapter found");
        assert_eq!(
            GpuError::Readback("map failed".into()).to_string(),
            "Readback failed: map failed"
        );
    }
}

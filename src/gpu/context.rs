// ============================================================================
// GPU CONTEXT — wgpu Device, Queue, and adapter initialization
// ============================================================================

use std::sync::Arc;

use crate::error::PaintError;

/// Core wgpu resources shared by everything that draws on the GPU.
/// Created once at startup; if creation fails the app renders on the CPU.
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_name: String,
    /// Maximum texture dimension supported by this device.
    pub max_texture_dim: u32,
}

impl GpuContext {
    /// Try a hardware adapter first, then the software rasterizer
    /// (`force_fallback_adapter`).
    ///
    /// `pollster::block_on` because eframe doesn't expose its wgpu device to
    /// application code and we need our own for offscreen rendering.
    pub fn new(preferred_gpu: &str) -> Result<Self, PaintError> {
        match pollster::block_on(Self::new_async(preferred_gpu, false)) {
            Ok(ctx) => return Ok(ctx),
            Err(e) => log::warn!("gpu: hardware adapter unavailable ({}), trying software fallback", e),
        }
        pollster::block_on(Self::new_async(preferred_gpu, true))
    }

    async fn new_async(preferred_gpu: &str, force_fallback: bool) -> Result<Self, PaintError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: power_preference(preferred_gpu),
                compatible_surface: None, // headless: offscreen only
                force_fallback_adapter: force_fallback,
            })
            .await
            .ok_or(PaintError::NoAdapter)?;

        let adapter_name = adapter.get_info().name.clone();
        let limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("LayerPaint GPU"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits {
                        max_texture_dimension_2d: limits.max_texture_dimension_2d,
                        ..wgpu::Limits::downlevel_defaults()
                    },
                },
                None,
            )
            .await
            .map_err(|e| PaintError::Device(e.to_string()))?;

        log::info!(
            "gpu: using adapter '{}'{}",
            adapter_name,
            if force_fallback { " (software fallback)" } else { "" }
        );

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_name,
            max_texture_dim: limits.max_texture_dimension_2d,
        })
    }

    /// Check if a texture of the given dimensions can be created.
    pub fn supports_size(&self, width: u32, height: u32) -> bool {
        width <= self.max_texture_dim && height <= self.max_texture_dim
    }

    /// Submit a single encoder's commands.
    pub fn submit_one(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

/// Map the `preferred_gpu` setting to a wgpu power preference.
pub fn power_preference(preferred_gpu: &str) -> wgpu::PowerPreference {
    match preferred_gpu.trim().to_lowercase().as_str() {
        "low power" | "integrated" => wgpu::PowerPreference::LowPower,
        _ => wgpu::PowerPreference::HighPerformance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_strings() {
        assert_eq!(power_preference("Low Power"), wgpu::PowerPreference::LowPower);
        assert_eq!(power_preference("integrated"), wgpu::PowerPreference::LowPower);
        assert_eq!(power_preference("auto"), wgpu::PowerPreference::HighPerformance);
        assert_eq!(power_preference("discrete"), wgpu::PowerPreference::HighPerformance);
    }
}

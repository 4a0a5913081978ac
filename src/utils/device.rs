//! Placement of decoded weights.

use candle_core::Device;

/// Resolve the device decoded weights are moved to.
///
/// Accelerators are only considered when the matching cargo feature is
/// enabled; an unavailable accelerator falls back to the CPU.
pub fn get_device(device_id: Option<usize>) -> crate::Result<Device> {
    #[cfg(feature = "cuda")]
    {
        let id = device_id.unwrap_or(0);
        match Device::new_cuda(id) {
            Ok(device) => {
                tracing::debug!("Placing weights on CUDA device {}", id);
                return Ok(device);
            }
            Err(e) => {
                tracing::warn!("CUDA device {} not available: {}", id, e);
            }
        }
    }

    #[cfg(feature = "metal")]
    {
        let id = device_id.unwrap_or(0);
        match Device::new_metal(id) {
            Ok(device) => {
                tracing::debug!("Placing weights on Metal device {}", id);
                return Ok(device);
            }
            Err(e) => {
                tracing::warn!("Metal device {} not available: {}", id, e);
            }
        }
    }

    if let Some(id) = device_id {
        if !cfg!(any(feature = "cuda", feature = "metal")) {
            tracing::warn!("Device {} requested without accelerator support, using CPU", id);
        }
    }

    Ok(Device::Cpu)
}

/// Short label for log and CLI output
pub fn device_label(device: &Device) -> &'static str {
    match device {
        Device::Cpu => "cpu",
        Device::Cuda(_) => "cuda",
        Device::Metal(_) => "metal",
    }
}

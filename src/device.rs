//! # Device Selection
//!
//! Picks the compute device (CPU/GPU) the embedding model runs on, with a
//! CPU fallback whenever the requested accelerator is missing.

use candle_core::Device;
use serde::Serialize;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Best available device, detected once per process.
static BEST_DEVICE: OnceLock<Device> = OnceLock::new();

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DevicePreference {
    /// Best available device: CUDA, then Metal, then CPU
    #[default]
    Auto,
    Cpu,
    /// CUDA GPU, falling back to CPU
    Cuda,
    /// Metal GPU, falling back to CPU
    Metal,
}

impl std::str::FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "automatic" => Ok(DevicePreference::Auto),
            "cpu" => Ok(DevicePreference::Cpu),
            "cuda" | "gpu" => Ok(DevicePreference::Cuda),
            "metal" => Ok(DevicePreference::Metal),
            _ => Err(format!("Unknown device preference: {}", s)),
        }
    }
}

pub struct DeviceManager;

impl DeviceManager {
    pub fn get_device(preference: DevicePreference) -> Device {
        match preference {
            DevicePreference::Auto => Self::get_best_device(),
            DevicePreference::Cpu => Device::Cpu,
            DevicePreference::Cuda => Self::get_cuda_device().unwrap_or(Device::Cpu),
            DevicePreference::Metal => Self::get_metal_device().unwrap_or(Device::Cpu),
        }
    }

    pub fn get_best_device() -> Device {
        BEST_DEVICE.get_or_init(Self::detect_best_device).clone()
    }

    fn detect_best_device() -> Device {
        info!("Detecting best available compute device...");

        if let Some(cuda_device) = Self::get_cuda_device() {
            info!("Selected CUDA GPU for embeddings");
            return cuda_device;
        }

        if let Some(metal_device) = Self::get_metal_device() {
            info!("Selected Metal GPU for embeddings");
            return metal_device;
        }

        info!("Using CPU for embeddings (no GPU acceleration available)");
        Device::Cpu
    }

    fn get_cuda_device() -> Option<Device> {
        Device::new_cuda(0)
            .map_err(|e| debug!("CUDA not available: {}", e))
            .ok()
    }

    fn get_metal_device() -> Option<Device> {
        Device::new_metal(0)
            .map_err(|e| debug!("Metal not available: {}", e))
            .ok()
    }

    pub fn get_device_info(device: &Device) -> String {
        match device {
            Device::Cpu => "CPU".to_string(),
            Device::Cuda(_) => "CUDA GPU".to_string(),
            Device::Metal(_) => "Metal GPU (Apple Silicon)".to_string(),
        }
    }

    /// Probe every accelerator. Slow on first call; meant for diagnostics.
    pub fn get_device_summary() -> DeviceSummary {
        let cuda_available = Self::get_cuda_device().is_some();
        let metal_available = Self::get_metal_device().is_some();
        DeviceSummary {
            cuda_available,
            metal_available,
            gpu_available: cuda_available || metal_available,
            best_device: Self::get_device_info(&Self::get_best_device()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceSummary {
    pub cuda_available: bool,
    pub metal_available: bool,
    pub gpu_available: bool,
    pub best_device: String,
}

/// Device for a configuration string; unknown values fall back to auto.
pub fn create_device_from_string(device_str: &str) -> Device {
    match device_str.parse::<DevicePreference>() {
        Ok(preference) => DeviceManager::get_device(preference),
        Err(_) => {
            warn!("Invalid device preference '{}', using auto", device_str);
            DeviceManager::get_best_device()
        }
    }
}

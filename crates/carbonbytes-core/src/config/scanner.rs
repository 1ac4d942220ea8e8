//! Code scanner configuration.

use serde::{Deserialize, Serialize};

/// Which physical camera to prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Rear camera.
    #[default]
    Environment,
    /// Front camera.
    User,
}

/// Options handed to the code source when a scan starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Preferred camera.
    #[serde(default)]
    pub preferred_camera: FacingMode,
    /// Decode attempts per second.
    #[serde(default = "default_fps")]
    pub frames_per_second: u32,
    /// Width of the scan region in pixels.
    #[serde(default = "default_region")]
    pub scan_region_width: u32,
    /// Height of the scan region in pixels.
    #[serde(default = "default_region")]
    pub scan_region_height: u32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            preferred_camera: FacingMode::default(),
            frames_per_second: default_fps(),
            scan_region_width: default_region(),
            scan_region_height: default_region(),
        }
    }
}

fn default_fps() -> u32 {
    10
}

fn default_region() -> u32 {
    250
}

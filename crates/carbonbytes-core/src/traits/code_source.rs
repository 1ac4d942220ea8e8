//! Decoded-code source trait (the camera + QR decoder).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::scanner::{FacingMode, ScannerConfig};
use crate::result::AppResult;

/// Something the code source reports for a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A code was decoded; the raw, untrimmed text.
    Decoded(String),
    /// A frame could not be decoded.
    Error(String),
}

/// Callback invoked by the code source for every scan event.
pub type ScanCallback = Arc<dyn Fn(ScanEvent) + Send + Sync>;

/// Opaque handle to a started scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanHandle(pub u64);

/// Region of the frame the decoder looks at, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRegion {
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

/// Options passed to [`CodeSource::start`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Which camera to prefer.
    pub preferred_camera: FacingMode,
    /// Decode attempts per second.
    pub frames_per_second: u32,
    /// Region of interest.
    pub scan_region: ScanRegion,
}

impl From<&ScannerConfig> for ScanOptions {
    fn from(config: &ScannerConfig) -> Self {
        Self {
            preferred_camera: config.preferred_camera,
            frames_per_second: config.frames_per_second,
            scan_region: ScanRegion {
                width: config.scan_region_width,
                height: config.scan_region_height,
            },
        }
    }
}

/// A lazy, infinite sequence of decoded strings delivered via callback.
///
/// A started scan is not restartable once stopped; start a new one instead.
/// Implementations may keep invoking the callback after the first successful
/// decode, so consumers must be idempotent.
#[async_trait]
pub trait CodeSource: Send + Sync + std::fmt::Debug + 'static {
    /// Start scanning. Fails with `Scanner` if the camera is unavailable.
    async fn start(&self, options: &ScanOptions, on_event: ScanCallback) -> AppResult<ScanHandle>;

    /// Stop a scan. Stopping an unknown or already stopped handle is not an error.
    async fn stop(&self, handle: ScanHandle) -> AppResult<()>;
}

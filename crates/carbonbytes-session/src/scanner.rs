//! A code source fed by hand instead of a camera.
//!
//! The terminal client pipes stdin lines through it and tests use it to
//! simulate decoded frames, failed frames and a camera that will not open.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use carbonbytes_core::error::AppError;
use carbonbytes_core::result::AppResult;
use carbonbytes_core::traits::{CodeSource, ScanCallback, ScanEvent, ScanHandle, ScanOptions};

#[derive(Default)]
struct ScannerState {
    next_handle: u64,
    active: Option<(ScanHandle, ScanCallback)>,
    fail_next_start: Option<String>,
    starts: u32,
    stops: u32,
    last_options: Option<ScanOptions>,
}

impl fmt::Debug for ScannerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScannerState")
            .field("active", &self.active.as_ref().map(|(h, _)| *h))
            .field("starts", &self.starts)
            .field("stops", &self.stops)
            .finish()
    }
}

fn lock(state: &Mutex<ScannerState>) -> MutexGuard<'_, ScannerState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// [`CodeSource`] whose frames come from a [`CodeFeeder`].
#[derive(Debug, Clone, Default)]
pub struct ManualCodeSource {
    state: Arc<Mutex<ScannerState>>,
}

/// Delivers text to whichever scan is currently running.
#[derive(Debug, Clone)]
pub struct CodeFeeder {
    state: Arc<Mutex<ScannerState>>,
}

impl ManualCodeSource {
    /// Create a source and the feeder that drives it.
    pub fn new() -> (Self, CodeFeeder) {
        let source = Self::default();
        let feeder = CodeFeeder {
            state: Arc::clone(&source.state),
        };
        (source, feeder)
    }

    /// Make the next `start` fail as if the camera were unavailable.
    pub fn fail_next_start(&self, message: impl Into<String>) {
        lock(&self.state).fail_next_start = Some(message.into());
    }

    /// Whether a scan is running.
    pub fn is_active(&self) -> bool {
        lock(&self.state).active.is_some()
    }

    /// Number of successful starts.
    pub fn start_count(&self) -> u32 {
        lock(&self.state).starts
    }

    /// Number of stops that ended a running scan.
    pub fn stop_count(&self) -> u32 {
        lock(&self.state).stops
    }

    /// Options passed to the most recent start.
    pub fn last_options(&self) -> Option<ScanOptions> {
        lock(&self.state).last_options.clone()
    }
}

#[async_trait]
impl CodeSource for ManualCodeSource {
    async fn start(&self, options: &ScanOptions, on_event: ScanCallback) -> AppResult<ScanHandle> {
        let mut state = lock(&self.state);
        if let Some(message) = state.fail_next_start.take() {
            return Err(AppError::scanner(message));
        }
        state.next_handle += 1;
        let handle = ScanHandle(state.next_handle);
        state.active = Some((handle, on_event));
        state.starts += 1;
        state.last_options = Some(options.clone());
        debug!(handle = handle.0, fps = options.frames_per_second, "Scan started");
        Ok(handle)
    }

    async fn stop(&self, handle: ScanHandle) -> AppResult<()> {
        let mut state = lock(&self.state);
        if state.active.as_ref().is_some_and(|(h, _)| *h == handle) {
            state.active = None;
            state.stops += 1;
            debug!(handle = handle.0, "Scan stopped");
        }
        Ok(())
    }
}

impl CodeFeeder {
    /// Deliver a decoded code. Returns `false` if no scan is running.
    pub fn decode(&self, text: impl Into<String>) -> bool {
        self.deliver(ScanEvent::Decoded(text.into()))
    }

    /// Deliver a frame that failed to decode.
    pub fn fail_frame(&self, message: impl Into<String>) -> bool {
        self.deliver(ScanEvent::Error(message.into()))
    }

    /// Whether a scan is running.
    pub fn is_scanning(&self) -> bool {
        lock(&self.state).active.is_some()
    }

    fn deliver(&self, event: ScanEvent) -> bool {
        // Invoke outside the lock; the callback may re-enter the source.
        let callback = lock(&self.state).active.as_ref().map(|(_, cb)| Arc::clone(cb));
        match callback {
            Some(callback) => {
                callback(event);
                true
            }
            None => false,
        }
    }
}

//! Output device lifecycle
//!
//! `Uninitialized -> Ready -> Running`, with a latched `Unavailable` state on failure.
//! The device is opened on the first channel attach and started the first time a
//! channel becomes audible. It is never stopped by channel writes; a silent mix simply
//! renders zeros. [`AudioOutput::shutdown`] closes it explicitly for teardown.
//!
//! The lock here is only ever taken by control threads. The audio thread reads the
//! channel table directly and never touches this state.

use super::{AudioBackend, StreamConfig};
use crate::engine::MixingEngine;
use crate::{LedcError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Lifecycle state of the output device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Not opened yet (or shut down)
    Uninitialized,
    /// Opened but not started
    Ready,
    /// Stream started
    Running,
    /// Opening or starting failed; no further attempts are made
    Unavailable,
}

struct OutputInner {
    backend: Box<dyn AudioBackend>,
    state: DeviceState,
}

/// Audio backend with lazy, idempotent, failure-latched startup
pub struct AudioOutput {
    inner: Mutex<OutputInner>,
    unavailable: AtomicBool,
    config: StreamConfig,
    engine: MixingEngine,
}

impl AudioOutput {
    /// Wrap `backend`; nothing is opened until [`ensure_open`](Self::ensure_open)
    pub fn new(backend: Box<dyn AudioBackend>, config: StreamConfig, engine: MixingEngine) -> Self {
        AudioOutput {
            inner: Mutex::new(OutputInner {
                backend,
                state: DeviceState::Uninitialized,
            }),
            unavailable: AtomicBool::new(false),
            config,
            engine,
        }
    }

    /// Whether a previous open/start failed
    #[inline]
    pub fn is_unavailable(&self) -> bool {
        self.unavailable.load(Ordering::Acquire)
    }

    /// Current lifecycle state
    pub fn state(&self) -> DeviceState {
        self.inner.lock().state
    }

    /// Open the device if it is not open yet
    pub fn ensure_open(&self) -> Result<()> {
        if self.is_unavailable() {
            return Err(LedcError::DeviceUnavailable);
        }
        let mut inner = self.inner.lock();
        self.open_locked(&mut inner)
    }

    /// Open and start the device if it is not running yet
    pub fn ensure_running(&self) -> Result<()> {
        if self.is_unavailable() {
            return Err(LedcError::DeviceUnavailable);
        }
        let mut inner = self.inner.lock();
        self.open_locked(&mut inner)?;
        if inner.state == DeviceState::Running {
            return Ok(());
        }

        match inner.backend.start() {
            Ok(()) => {
                inner.state = DeviceState::Running;
                log::debug!("{} audio device started", inner.backend.name());
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to start {} audio device: {}", inner.backend.name(), e);
                inner.backend.close();
                self.latch_unavailable(&mut inner);
                Err(LedcError::DeviceUnavailable)
            }
        }
    }

    /// Close the device and return to `Uninitialized`
    ///
    /// A latched `Unavailable` state survives shutdown.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            DeviceState::Ready | DeviceState::Running => {
                inner.backend.close();
                inner.state = DeviceState::Uninitialized;
                log::info!("{} audio device shut down", inner.backend.name());
            }
            DeviceState::Uninitialized | DeviceState::Unavailable => {}
        }
    }

    fn open_locked(&self, inner: &mut OutputInner) -> Result<()> {
        match inner.state {
            DeviceState::Ready | DeviceState::Running => Ok(()),
            DeviceState::Unavailable => Err(LedcError::DeviceUnavailable),
            DeviceState::Uninitialized => {
                match inner.backend.open(&self.config, self.engine.clone()) {
                    Ok(()) => {
                        inner.state = DeviceState::Ready;
                        log::info!(
                            "{} audio device initialized ({} Hz, mono, {} frames)",
                            inner.backend.name(),
                            self.config.sample_rate,
                            self.config.buffer_frames
                        );
                        Ok(())
                    }
                    Err(e) => {
                        log::error!(
                            "Failed to initialize {} audio device: {}",
                            inner.backend.name(),
                            e
                        );
                        self.latch_unavailable(inner);
                        Err(LedcError::DeviceUnavailable)
                    }
                }
            }
        }
    }

    fn latch_unavailable(&self, inner: &mut OutputInner) {
        inner.state = DeviceState::Unavailable;
        self.unavailable.store(true, Ordering::Release);
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelTable;
    use crate::streaming::NullBackend;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[derive(Default)]
    struct Calls {
        opens: AtomicUsize,
        starts: AtomicUsize,
        closes: AtomicUsize,
    }

    struct ScriptedBackend {
        calls: Arc<Calls>,
        fail_open: bool,
        fail_start: bool,
    }

    impl AudioBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        fn open(&mut self, _config: &StreamConfig, _engine: MixingEngine) -> Result<()> {
            self.calls.opens.fetch_add(1, Ordering::SeqCst);
            if self.fail_open {
                return Err(LedcError::AudioDeviceError("no device".into()));
            }
            Ok(())
        }

        fn start(&mut self) -> Result<()> {
            self.calls.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail_start {
                return Err(LedcError::AudioDeviceError("cannot start".into()));
            }
            Ok(())
        }

        fn close(&mut self) {
            self.calls.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn output(fail_open: bool, fail_start: bool) -> (AudioOutput, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let backend = ScriptedBackend {
            calls: Arc::clone(&calls),
            fail_open,
            fail_start,
        };
        let engine = MixingEngine::new(Arc::new(ChannelTable::new(2).unwrap()), 48_000, 0.1);
        (
            AudioOutput::new(Box::new(backend), StreamConfig::default(), engine),
            calls,
        )
    }

    #[test]
    fn test_open_is_idempotent() {
        let (out, calls) = output(false, false);
        assert_eq!(out.state(), DeviceState::Uninitialized);

        out.ensure_open().unwrap();
        out.ensure_open().unwrap();
        assert_eq!(out.state(), DeviceState::Ready);
        assert_eq!(calls.opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_running_opens_first_and_starts_once() {
        let (out, calls) = output(false, false);
        out.ensure_running().unwrap();
        out.ensure_running().unwrap();
        assert_eq!(out.state(), DeviceState::Running);
        assert_eq!(calls.opens.load(Ordering::SeqCst), 1);
        assert_eq!(calls.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_open_failure_is_latched() {
        let (out, calls) = output(true, false);
        assert!(matches!(out.ensure_open(), Err(LedcError::DeviceUnavailable)));
        assert!(out.is_unavailable());
        assert_eq!(out.state(), DeviceState::Unavailable);

        // No retry
        assert!(matches!(out.ensure_running(), Err(LedcError::DeviceUnavailable)));
        assert!(matches!(out.ensure_open(), Err(LedcError::DeviceUnavailable)));
        assert_eq!(calls.opens.load(Ordering::SeqCst), 1);
        assert_eq!(calls.starts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_start_failure_closes_and_latches() {
        let (out, calls) = output(false, true);
        out.ensure_open().unwrap();
        assert!(matches!(out.ensure_running(), Err(LedcError::DeviceUnavailable)));
        assert_eq!(out.state(), DeviceState::Unavailable);
        assert_eq!(calls.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shutdown_returns_to_uninitialized() {
        let (out, calls) = output(false, false);
        out.ensure_running().unwrap();
        out.shutdown();
        assert_eq!(out.state(), DeviceState::Uninitialized);
        assert_eq!(calls.closes.load(Ordering::SeqCst), 1);

        // Shutting down twice does nothing
        out.shutdown();
        assert_eq!(calls.closes.load(Ordering::SeqCst), 1);

        out.ensure_open().unwrap();
        assert_eq!(calls.opens.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_null_backend_output() {
        let engine = MixingEngine::new(Arc::new(ChannelTable::new(1).unwrap()), 48_000, 0.1);
        let out = AudioOutput::new(Box::new(NullBackend::new()), StreamConfig::default(), engine);
        out.ensure_running().unwrap();
        assert_eq!(out.state(), DeviceState::Running);
    }
}

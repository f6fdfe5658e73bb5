//! Audio device integration using rodio
//!
//! rodio pulls samples one at a time from a [`Source`]. [`MixerSource`] renders a
//! whole buffer from the mixing engine whenever its internal buffer runs dry, which
//! gives the engine the "fill N frames" callback shape it expects.
//!
//! `rodio::OutputStream` is not `Send`, so the stream and its sink live on a dedicated
//! device thread. Control threads talk to it through a command channel.

use super::{AudioBackend, StreamConfig};
use crate::engine::MixingEngine;
use crate::{LedcError, Result};
use rodio::{OutputStream, Sink, Source};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Audio source that renders from the mixing engine
struct MixerSource {
    engine: MixingEngine,
    sample_rate: u32,
    finished: Arc<AtomicBool>,
    /// One engine buffer; refilled when exhausted
    buffer: Vec<f32>,
    buffer_pos: usize,
}

impl MixerSource {
    fn new(engine: MixingEngine, config: &StreamConfig, finished: Arc<AtomicBool>) -> Self {
        let frames = config.buffer_frames.max(1);
        MixerSource {
            engine,
            sample_rate: config.sample_rate,
            finished,
            buffer: vec![0.0f32; frames],
            buffer_pos: frames, // Render on first pull
        }
    }
}

impl Source for MixerSource {
    fn current_frame_len(&self) -> Option<usize> {
        // Parameters never change, the stream runs until finished
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

impl Iterator for MixerSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.finished.load(Ordering::Relaxed) {
            return None;
        }

        if self.buffer_pos >= self.buffer.len() {
            self.engine.render(&mut self.buffer);
            self.buffer_pos = 0;
        }

        let sample = self.buffer[self.buffer_pos];
        self.buffer_pos += 1;
        Some(sample)
    }
}

enum DeviceCommand {
    Play,
    Close,
}

struct DeviceThread {
    commands: mpsc::Sender<DeviceCommand>,
    handle: JoinHandle<()>,
    finished: Arc<AtomicBool>,
}

/// Audio output through the system default device using rodio
#[derive(Default)]
pub struct RodioBackend {
    device: Option<DeviceThread>,
}

impl RodioBackend {
    /// Create a backend; the device is opened lazily
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the device thread is alive
    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }
}

impl AudioBackend for RodioBackend {
    fn name(&self) -> &str {
        "rodio"
    }

    fn open(&mut self, config: &StreamConfig, engine: MixingEngine) -> Result<()> {
        if self.device.is_some() {
            return Ok(());
        }

        let (ready_tx, ready_rx) = mpsc::channel::<std::result::Result<(), String>>();
        let (cmd_tx, cmd_rx) = mpsc::channel::<DeviceCommand>();
        let finished = Arc::new(AtomicBool::new(false));
        let source = MixerSource::new(engine, config, Arc::clone(&finished));
        let thread_finished = Arc::clone(&finished);

        let handle = thread::Builder::new()
            .name("ledc-audio-device".into())
            .spawn(move || {
                let (stream, stream_handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("Failed to create audio stream: {}", e)));
                        return;
                    }
                };
                let sink = match Sink::try_new(&stream_handle) {
                    Ok(sink) => sink,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("Failed to create audio sink: {}", e)));
                        return;
                    }
                };
                sink.pause();
                sink.append(source);
                let _ = ready_tx.send(Ok(()));

                while let Ok(command) = cmd_rx.recv() {
                    match command {
                        DeviceCommand::Play => sink.play(),
                        DeviceCommand::Close => break,
                    }
                }

                thread_finished.store(true, Ordering::Relaxed);
                sink.stop();
                drop(stream);
            })?;

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err("audio device thread exited during startup".to_string()));
        match ready {
            Ok(()) => {
                self.device = Some(DeviceThread {
                    commands: cmd_tx,
                    handle,
                    finished,
                });
                Ok(())
            }
            Err(msg) => {
                let _ = handle.join();
                Err(LedcError::AudioDeviceError(msg))
            }
        }
    }

    fn start(&mut self) -> Result<()> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| LedcError::AudioDeviceError("device not open".into()))?;
        device
            .commands
            .send(DeviceCommand::Play)
            .map_err(|_| LedcError::AudioDeviceError("audio device thread has exited".into()))
    }

    fn close(&mut self) {
        if let Some(device) = self.device.take() {
            device.finished.store(true, Ordering::Relaxed);
            let _ = device.commands.send(DeviceCommand::Close);
            if device.handle.join().is_err() {
                log::error!("Audio device thread panicked during shutdown");
            }
        }
    }
}

impl Drop for RodioBackend {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelTable;

    fn source(frames: usize) -> (MixerSource, Arc<ChannelTable>, Arc<AtomicBool>) {
        let table = Arc::new(ChannelTable::new(2).unwrap());
        let engine = MixingEngine::new(Arc::clone(&table), 48_000, 0.1);
        let finished = Arc::new(AtomicBool::new(false));
        let config = StreamConfig::new(48_000, frames);
        (
            MixerSource::new(engine, &config, Arc::clone(&finished)),
            table,
            finished,
        )
    }

    #[test]
    fn test_mixer_source_parameters() {
        let (src, _table, _finished) = source(256);
        assert_eq!(src.sample_rate(), 48_000);
        assert_eq!(src.channels(), 1);
        assert!(src.total_duration().is_none());
    }

    #[test]
    fn test_mixer_source_silence_when_idle() {
        let (mut src, _table, _finished) = source(64);
        for _ in 0..200 {
            assert_eq!(src.next(), Some(0.0));
        }
    }

    #[test]
    fn test_mixer_source_renders_tone() {
        let (mut src, table, _finished) = source(64);
        let ch = table.get(0).unwrap();
        ch.configure(25, 1000.0, 1023);
        ch.set_duty(511);

        let samples: Vec<f32> = (0..128).filter_map(|_| src.next()).collect();
        assert_eq!(samples.len(), 128);
        assert!(samples.iter().all(|s| s.abs() > 0.0));
    }

    #[test]
    fn test_mixer_source_finished_signal() {
        let (mut src, _table, finished) = source(64);
        assert!(src.next().is_some());
        finished.store(true, Ordering::Relaxed);
        assert_eq!(src.next(), None);
    }

    #[test]
    fn test_rodio_backend_open_close() {
        let table = Arc::new(ChannelTable::new(1).unwrap());
        let engine = MixingEngine::new(table, 48_000, 0.1);
        let mut backend = RodioBackend::new();
        match backend.open(&StreamConfig::default(), engine) {
            Ok(()) => {
                assert!(backend.is_open());
                backend.start().unwrap();
                backend.close();
                assert!(!backend.is_open());
            }
            Err(err) => {
                eprintln!("Skipping rodio backend test (audio backend unavailable): {}", err);
            }
        }
    }

    #[test]
    fn test_start_before_open_fails() {
        let mut backend = RodioBackend::new();
        assert!(matches!(backend.start(), Err(LedcError::AudioDeviceError(_))));
    }
}

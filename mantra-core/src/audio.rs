//! # Audio Capture Module
//!
//! This module captures audio from a device using CPAL (Cross-Platform Audio
//! Library) and feeds it into a capture graph.
//!
//! ## Features
//! - Default or named input device selection
//! - Sample rate chosen as close to the caller's hint as the device allows
//! - Any channel count; the first channel is analysed
//! - Fixed 128-sample blocks delivered to the graph
//! - One worker thread per stream that owns the CPAL handle and services
//!   resume/suspend requests

use anyhow::{Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use std::thread;

use crate::backend::{CaptureBackend, OpenedStream, StreamControl, swallow_resume_failure};
use crate::error::{AttachFailure, ResumeFailure};
use crate::graph::{GraphState, GraphStateCell, TapSink};
use crate::source::{PlaybackSource, SourceId};

/// Block size delivered to the graph, in samples.
///
/// Matches the render quantum of typical real-time audio graphs.
pub const RENDER_QUANTUM: usize = 128;

/// Capture backend reading from a CPAL input device.
#[derive(Debug, Clone, Default)]
pub struct CpalBackend {
    device_name: Option<String>,
}

impl CpalBackend {
    /// Captures from the host's default input device.
    pub fn default_input() -> Self {
        Self::default()
    }

    /// Captures from the input device with exactly this name.
    pub fn with_device(name: impl Into<String>) -> Self {
        Self { device_name: Some(name.into()) }
    }
}

enum StreamCommand {
    Resume,
    Suspend,
}

struct CpalControl {
    commands: Sender<StreamCommand>,
}

impl StreamControl for CpalControl {
    fn request_resume(&self) {
        // The worker is gone only if the stream died; nothing left to resume.
        let _ = self.commands.send(StreamCommand::Resume);
    }

    fn request_suspend(&self) {
        let _ = self.commands.send(StreamCommand::Suspend);
    }
}

impl CaptureBackend for CpalBackend {
    /// Opens the device on a dedicated worker thread.
    ///
    /// CPAL streams cannot move between threads on every platform, so the
    /// worker builds the stream, reports the negotiated sample rate back,
    /// and then owns it until the graph (and with it the command sender)
    /// is dropped.
    fn open(
        &self,
        source: &PlaybackSource,
        sample_rate_hint: u32,
        sink: TapSink,
    ) -> Result<OpenedStream, AttachFailure> {
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let device_name = self.device_name.clone();
        let source_id = source.id();

        thread::Builder::new()
            .name(format!("mantra-capture-{}", source_id))
            .spawn(move || {
                run_stream_worker(device_name, sample_rate_hint, sink, source_id, command_rx, ready_tx)
            })
            .map_err(|e| AttachFailure::Backend(e.to_string()))?;

        let sample_rate = ready_rx
            .recv()
            .map_err(|_| AttachFailure::Backend("capture thread exited before opening".to_string()))?
            .map_err(AttachFailure::Backend)?;

        Ok(OpenedStream {
            sample_rate,
            control: Box::new(CpalControl { commands: command_tx }),
        })
    }
}

/// Body of the per-stream worker thread.
fn run_stream_worker(
    device_name: Option<String>,
    sample_rate_hint: u32,
    sink: TapSink,
    source_id: SourceId,
    commands: Receiver<StreamCommand>,
    ready: Sender<std::result::Result<u32, String>>,
) {
    let state: GraphStateCell = sink.state().clone();
    let stream = match build_input_stream(device_name.as_deref(), sample_rate_hint, sink) {
        Ok((stream, sample_rate)) => {
            let _ = ready.send(Ok(sample_rate));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };

    // Graphs start suspended; some hosts start streams on build.
    if let Err(e) = stream.pause() {
        log::debug!("[CAPTURE] {} could not be paused after build: {}", source_id, e);
    }

    for command in commands.iter() {
        match command {
            StreamCommand::Resume => match stream.play() {
                Ok(()) => {
                    state.set(GraphState::Running);
                    log::info!("[CAPTURE] {} running", source_id);
                }
                Err(e) => swallow_resume_failure(source_id, ResumeFailure(e.to_string())),
            },
            StreamCommand::Suspend => {
                if let Err(e) = stream.pause() {
                    log::warn!("[CAPTURE] {} pause failed: {}", source_id, e);
                }
                state.set(GraphState::Suspended);
                log::info!("[CAPTURE] {} suspended", source_id);
            }
        }
    }

    // Command sender dropped: the graph is gone.
    let _ = stream.pause();
    drop(stream);
    log::info!("[CAPTURE] {} stream closed", source_id);
}

/// Builds a paused-or-playing input stream that feeds `sink`.
///
/// # Arguments
/// * `device_name` - Exact device name, or `None` for the default input
/// * `sample_rate_hint` - Preferred sample rate in Hz
/// * `sink` - Graph sink, moved into the real-time callback
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Stream handle and the negotiated sample rate
/// * `Err(e)` - No device, no usable f32 format, or the host refused the stream
fn build_input_stream(
    device_name: Option<&str>,
    sample_rate_hint: u32,
    mut sink: TapSink,
) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => host
            .input_devices()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| anyhow!("No input device named {name}"))?,
        None => host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?,
    };

    log::info!("[CAPTURE] Using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, sample_rate_hint)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let rate = sample_rate_hint.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
    let channels = config.channels().max(1) as usize;
    let sample_rate_val = config.sample_rate().0;
    let config: cpal::StreamConfig = config.into();

    log::info!("[CAPTURE] Selected sample rate: {} Hz, {} channel(s)", sample_rate_val, channels);

    let err_fn = |err: cpal::StreamError| log::error!("[CAPTURE] An error occurred on the audio stream: {}", err);

    // Accumulates first-channel samples until a full block is available.
    let mut pending = Vec::with_capacity(RENDER_QUANTUM * 8);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            pending.extend(data.chunks(channels).map(|frame| frame[0]));

            let mut consumed = 0;
            while pending.len() - consumed >= RENDER_QUANTUM {
                sink.process_block(&pending[consumed..consumed + RENDER_QUANTUM]);
                consumed += RENDER_QUANTUM;
            }
            pending.drain(..consumed);
        },
        err_fn,
        None,
    )?;

    Ok((stream, sample_rate_val))
}

/// Finds the best supported configuration for the target sample rate.
///
/// Only 32-bit float formats qualify. Among those, configurations whose
/// range contains the target win, then fewer channels.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min = c.min_sample_rate().0;
            let max = c.max_sample_rate().0;
            let distance = if (min..=max).contains(&target_rate) {
                0
            } else {
                min.abs_diff(target_rate).min(max.abs_diff(target_rate))
            };
            (distance, c.channels())
        })
}

//! # Mantra - Live Hymn Visualizer
//!
//! This module contains the GUI application for the Mantra visualizer. It
//! taps the default audio input, draws a bar spectrum and shows the live
//! features (pitch, onset, spectral shape) extracted by `mantra-core`.
//!
//! ## Architecture
//! - **Main Thread**: Iced GUI application with dark theme; the analysis
//!   engine ticks here, once per display refresh
//! - **Capture Thread**: Owned by the CPAL backend; feeds the capture graph
//! - **Communication**: The capture graph's latest-window taps
//! - **Updates**: Timer subscription at the configured refresh rate

mod ui;

use anyhow::Context;
use iced::{Element, Subscription, Theme};
use mantra_core::{
    Access, AnalysisConfig, AnalysisEngine, AudioTapRegistry, CpalBackend, FeatureSnapshot, GraphState,
    PlaybackSource,
};
use std::sync::Arc;
use std::time::Duration;
use ui::main_display::create_main_view;

const CONFIG_PATH: &str = "mantra.toml";
const INPUT_URL: &str = "device://default-input";
const SAMPLE_RATE_HINT: u32 = 44_100;
/// How many ticks an onset stays highlighted.
const ONSET_HOLD_TICKS: u8 = 9;

pub fn main() -> iced::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("[MAIN] Starting Mantra visualizer...");
    let result = iced::application("Mantra Visualizer", VisualizerApp::update, VisualizerApp::view)
        .subscription(VisualizerApp::subscription)
        .theme(VisualizerApp::theme)
        .run();
    log::info!("[MAIN] Application finished with result: {:?}", result);
    result
}

#[derive(Debug, Clone)]
pub enum Message {
    // Playback control
    Play,
    Pause,

    // Panel visibility toggles
    ToggleBars,
    ToggleFeatures,

    // Display refresh
    Tick,
}

/// Everything the views need to render a frame.
#[derive(Debug, Clone)]
pub struct AppDisplayData {
    /// `false` when the input could not be tapped; the views show "no data".
    pub analysis_available: bool,
    pub status: String,
    pub running: bool,
    pub last_snapshot: Option<FeatureSnapshot>,
    pub bars: Vec<f32>,
    /// Remaining ticks of onset highlight.
    pub onset_hold: u8,

    pub bars_visible: bool,
    pub features_visible: bool,
}

struct VisualizerApp {
    registry: AudioTapRegistry,
    source: Arc<PlaybackSource>,
    // None when the attach failed: the app keeps running without snapshots.
    engine: Option<AnalysisEngine>,
    refresh: Duration,
    display_data: AppDisplayData,
}

impl Default for VisualizerApp {
    fn default() -> Self {
        let config = match AnalysisConfig::load(CONFIG_PATH) {
            Ok(config) => {
                log::info!("[MAIN] Loaded configuration from {}", CONFIG_PATH);
                config
            }
            Err(e) => {
                log::warn!("[MAIN] Using default configuration: {:#}", e);
                AnalysisConfig::default()
            }
        };

        let registry = AudioTapRegistry::new(Arc::new(CpalBackend::default_input()), config.taps.clone());
        let source = PlaybackSource::new(INPUT_URL, Access::SameOrigin);

        let (engine, status) = match open_analysis(&registry, &source, &config) {
            Ok(engine) => {
                let status = format!("Paused ({} Hz)", engine.graph().sample_rate());
                (Some(engine), status)
            }
            Err(e) => {
                log::warn!("[MAIN] Analysis unavailable: {:#}", e);
                (None, format!("Analysis unavailable: {:#}", e))
            }
        };

        let display_data = AppDisplayData {
            analysis_available: engine.is_some(),
            status,
            running: false,
            last_snapshot: None,
            bars: Vec::new(),
            onset_hold: 0,
            bars_visible: true,
            features_visible: true,
        };

        Self {
            registry,
            source,
            engine,
            refresh: Duration::from_secs_f64(1.0 / f64::from(config.schedule.refresh_hz.max(1))),
            display_data,
        }
    }
}

/// Taps `source` and builds the engine that analyses it.
fn open_analysis(
    registry: &AudioTapRegistry,
    source: &Arc<PlaybackSource>,
    config: &AnalysisConfig,
) -> anyhow::Result<AnalysisEngine> {
    let graph = registry
        .attach(source, SAMPLE_RATE_HINT)
        .with_context(|| format!("tapping {}", source.url()))?;
    Ok(AnalysisEngine::new(graph, config))
}

impl VisualizerApp {
    fn update(&mut self, message: Message) {
        match message {
            Message::Play => {
                log::info!("[MAIN] Play requested");
                self.registry.on_play(&self.source);
            }
            Message::Pause => {
                log::info!("[MAIN] Pause requested");
                self.registry.on_pause(&self.source);
            }
            Message::ToggleBars => {
                self.display_data.bars_visible = !self.display_data.bars_visible;
            }
            Message::ToggleFeatures => {
                self.display_data.features_visible = !self.display_data.features_visible;
            }
            Message::Tick => self.tick(),
        }
    }

    /// Runs one analysis tick and refreshes the display data.
    fn tick(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };

        let snapshot = engine.tick();
        let graph = engine.graph();
        let running = graph.state() == GraphState::Running;

        let data = &mut self.display_data;
        if running != data.running {
            data.status = if running {
                format!("Listening ({} Hz)", graph.sample_rate())
            } else {
                format!("Paused ({} Hz)", graph.sample_rate())
            };
        }
        data.running = running;
        data.bars = graph.display_bars();
        data.onset_hold = if snapshot.onset {
            ONSET_HOLD_TICKS
        } else {
            data.onset_hold.saturating_sub(1)
        };
        data.last_snapshot = Some(snapshot);
    }

    fn view(&self) -> Element<'_, Message> {
        create_main_view(&self.display_data)
    }

    fn subscription(&self) -> Subscription<Message> {
        iced::time::every(self.refresh).map(|_| Message::Tick)
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

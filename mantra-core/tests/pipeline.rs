use std::f32::consts::PI;
use std::sync::Arc;

use mantra_core::config::RelayConfig;
use mantra_core::{
    Access, AnalysisConfig, AnalysisEngine, AttachFailure, AudioTapRegistry, GraphState, ManualBackend,
    PlaybackSource, RelayMessage,
};

const SAMPLE_RATE: u32 = 44_100;
const BLOCK: usize = 128;
const TICKS_PER_SECOND: usize = 60;
// 44100 / 60 = 735 samples per display tick, rounded up to whole blocks.
const BLOCKS_PER_TICK: usize = 6;

struct Sine {
    freq: f32,
    amplitude: f32,
    index: usize,
}

impl Sine {
    fn next_samples(&mut self, len: usize) -> Vec<f32> {
        let start = self.index;
        self.index += len;
        (start..start + len)
            .map(|i| {
                let t = i as f64 / SAMPLE_RATE as f64;
                self.amplitude * (2.0 * std::f64::consts::PI * self.freq as f64 * t).sin() as f32
            })
            .collect()
    }
}

fn registry() -> (ManualBackend, AudioTapRegistry) {
    let backend = ManualBackend::new();
    let config = AnalysisConfig::default();
    let registry = AudioTapRegistry::new(Arc::new(backend.clone()), config.taps);
    (backend, registry)
}

#[test]
fn sine_converges_to_440_without_onsets() {
    let (backend, registry) = registry();
    let source = PlaybackSource::new("/audio/H100.mp3", Access::SameOrigin);
    let graph = registry.attach(&source, SAMPLE_RATE).unwrap();
    registry.on_play(&source);
    assert_eq!(graph.state(), GraphState::Running);

    let mut feed = backend.take_feed(source.id()).unwrap();
    let mut sine = Sine { freq: 440.0, amplitude: 0.1, index: 0 };
    let mut engine = AnalysisEngine::new(Arc::clone(&graph), &AnalysisConfig::default());

    // One full analysis window before the first tick.
    feed.push_blocks(&sine.next_samples(graph.analysis_tap().fft_size()), BLOCK);

    let mut snapshots = Vec::with_capacity(TICKS_PER_SECOND);
    for _ in 0..TICKS_PER_SECOND {
        snapshots.push(engine.tick());
        feed.push_blocks(&sine.next_samples(BLOCK * BLOCKS_PER_TICK), BLOCK);
    }

    for (tick, snapshot) in snapshots.iter().enumerate().skip(1) {
        assert!(!snapshot.onset, "onset on tick {tick}");
    }
    for snapshot in &snapshots {
        let f0 = snapshot.f0_hz.unwrap();
        assert!((f0 - 440.0).abs() / 440.0 < 0.02, "estimated {f0}");
    }

    let last = snapshots[TICKS_PER_SECOND - 1];
    let centroid = last.centroid_hz.unwrap();
    assert!(centroid > 300.0 && centroid < 800.0, "centroid {centroid}");
    assert!(last.flatness.unwrap() < 0.5);
}

#[test]
fn display_bars_follow_the_signal() {
    let (backend, registry) = registry();
    let source = PlaybackSource::new("/audio/H101.mp3", Access::SameOrigin);
    let graph = registry.attach(&source, SAMPLE_RATE).unwrap();
    assert_eq!(graph.display_bars().len(), 128);
    assert!(graph.display_bars().iter().all(|&bar| bar == 0.0));

    registry.on_play(&source);
    let mut feed = backend.take_feed(source.id()).unwrap();
    let samples: Vec<f32> = (0..1024)
        .map(|i| 0.5 * (2.0 * PI * 1_000.0 * i as f32 / SAMPLE_RATE as f32).sin())
        .collect();
    feed.push_blocks(&samples, BLOCK);

    let bars = graph.display_bars();
    assert_eq!(bars.len(), 128);
    assert!(bars.iter().any(|&bar| bar > 0.0));
}

#[test]
fn restricted_source_does_not_block_others() {
    let (_backend, registry) = registry();
    let restricted = PlaybackSource::new(
        "https://media.example.org/H102.mp3",
        Access::classify("https://media.example.org/H102.mp3", "https://hymns.example.com", false),
    );
    let local = PlaybackSource::new(
        "/audio/H102.mp3",
        Access::classify("/audio/H102.mp3", "https://hymns.example.com", false),
    );

    assert!(matches!(
        registry.attach(&restricted, SAMPLE_RATE),
        Err(AttachFailure::Security { .. })
    ));
    // Play events for a source without a graph are harmless.
    registry.on_play(&restricted);

    let graph = registry.attach(&local, SAMPLE_RATE).unwrap();
    assert!(Arc::ptr_eq(&graph, &registry.attach(&local, SAMPLE_RATE).unwrap()));
}

#[test]
fn relay_streams_blocks_and_heartbeats() {
    let (backend, registry) = registry();
    let source = PlaybackSource::new("/audio/H103.mp3", Access::SameOrigin);
    let graph = registry.attach(&source, SAMPLE_RATE).unwrap();
    registry.on_play(&source);

    let rx = graph.open_relay(&RelayConfig::default());
    let mut feed = backend.take_feed(source.id()).unwrap();
    let mut sine = Sine { freq: 220.0, amplitude: 0.3, index: 0 };
    feed.push_blocks(&sine.next_samples(BLOCK * 100), BLOCK);

    let messages: Vec<RelayMessage> = rx.try_iter().collect();
    let frames = messages
        .iter()
        .filter(|m| matches!(m, RelayMessage::Frames { samples } if samples.len() == BLOCK))
        .count();
    let heartbeats: Vec<u64> = messages
        .iter()
        .filter_map(|m| match m {
            RelayMessage::Heartbeat { total_frames } => Some(*total_frames),
            RelayMessage::Frames { .. } => None,
        })
        .collect();
    assert_eq!(frames, 100);
    assert_eq!(heartbeats, vec![(BLOCK * 50) as u64, (BLOCK * 100) as u64]);
}

#[test]
fn snapshot_serializes_with_camel_case_keys() {
    let snapshot = mantra_core::FeatureSnapshot {
        f0_hz: Some(440.0),
        onset: false,
        centroid_hz: Some(512.0),
        rolloff_hz: Some(1024.0),
        flatness: None,
    };
    let value = serde_json::to_value(snapshot).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "f0Hz": 440.0,
            "onset": false,
            "centroidHz": 512.0,
            "rolloffHz": 1024.0,
            "flatness": null
        })
    );
}

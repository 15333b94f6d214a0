//! # UI Module
//!
//! This module contains all UI components for the Mantra visualizer.

pub mod flatness_meter;
pub mod main_display;
pub mod spectrum_bars;

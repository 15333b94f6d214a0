//! # Main Display Module
//!
//! This module contains the main display components and layout logic
//! for the Mantra visualizer.

use iced::widget::{Space, button, column, container, horizontal_space, row, text};
use iced::{Alignment, Element, Length};

use super::{flatness_meter, spectrum_bars};

/// Configuration for a single button in the sidebar
#[derive(Debug, Clone)]
struct ButtonConfig {
    label: &'static str,
    message: crate::Message,
}

const SIDEBAR_CONFIG: &[(&str, &[ButtonConfig])] = &[(
    "Panels",
    &[
        ButtonConfig { label: "Spectrum", message: crate::Message::ToggleBars },
        ButtonConfig { label: "Features", message: crate::Message::ToggleFeatures },
    ],
)];

/// Creates the complete main application view
pub fn create_main_view(data: &crate::AppDisplayData) -> Element<'static, crate::Message> {
    let title = text("Mantra Visualizer").size(28);
    let status = text(data.status.clone()).size(14);

    let body: Element<'static, crate::Message> = if data.analysis_available {
        let mut panels = column![].spacing(10);
        if let Some(bars) = create_bars_panel(data) {
            panels = panels.push(bars);
        }
        if let Some(features) = create_features_panel(data) {
            panels = panels.push(features);
        }
        panels.into()
    } else {
        container(text("No data").size(40))
            .width(Length::Fill)
            .height(Length::Fixed(300.0))
            .center_x(Length::Fill)
            .center_y(Length::Fixed(300.0))
            .into()
    };

    let main_content = row![
        column![title, status, Space::with_height(20), body]
            .width(Length::Fill)
            .spacing(10),
        Space::with_width(10),
        create_sidebar(data),
    ]
    .align_y(Alignment::Start)
    .padding(20);

    container(main_content)
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

/// Creates the spectrum bars panel.
fn create_bars_panel(data: &crate::AppDisplayData) -> Option<Element<'static, crate::Message>> {
    if !data.bars_visible {
        return None;
    }

    let bars_content = container(spectrum_bars::SpectrumBars::new(data.bars.clone()).view())
        .width(Length::Fill)
        .height(Length::Fill);

    let panel = container(
        column![text("Spectrum").size(18), Space::with_height(10), bars_content]
            .spacing(5)
            .padding(15),
    )
    .width(Length::Fill)
    .height(Length::Fixed(300.0));

    Some(panel.into())
}

/// Creates the feature read-out panel
fn create_features_panel(data: &crate::AppDisplayData) -> Option<Element<'static, crate::Message>> {
    if !data.features_visible {
        return None;
    }

    let snapshot = data.last_snapshot.unwrap_or_default();
    let onset_shown = data.onset_hold > 0;

    let pitch_text = format_hz(snapshot.f0_hz);
    let onset_text = if onset_shown { "Onset" } else { "--" };

    let readout = column![
        row![
            text("Pitch").size(14),
            horizontal_space(),
            text("Onset").size(14),
        ],
        Space::with_height(5),
        row![
            text(pitch_text).size(24),
            horizontal_space(),
            container(text(onset_text).size(16)).padding([4, 8]),
        ]
        .align_y(Alignment::Center),
        Space::with_height(10),
        row![
            feature_cell("Centroid", format_hz(snapshot.centroid_hz)),
            feature_cell("Rolloff", format_hz(snapshot.rolloff_hz)),
            feature_cell("Flatness", format_ratio(snapshot.flatness)),
        ]
        .spacing(20),
        Space::with_height(10),
        flatness_meter::FlatnessMeter::new(snapshot.flatness, onset_shown).view(),
    ]
    .spacing(5);

    let panel = container(
        column![text("Features").size(18), Space::with_height(10), readout]
            .spacing(5)
            .padding(15),
    )
    .width(Length::Fill)
    .height(Length::Fixed(260.0));

    Some(panel.into())
}

fn feature_cell(label: &'static str, value: String) -> Element<'static, crate::Message> {
    column![text(label).size(14), text(value).size(18)]
        .spacing(4)
        .width(Length::Fill)
        .into()
}

/// Creates the sidebar: playback control plus panel toggles.
fn create_sidebar(data: &crate::AppDisplayData) -> Element<'static, crate::Message> {
    let mut sections = column![].spacing(10);

    if data.analysis_available {
        sections = sections.push(make_playback_button(data.running));
    }

    for (title, buttons) in SIDEBAR_CONFIG {
        let items = buttons.iter().fold(column![].spacing(8), |col, config| {
            col.push(
                button(text(config.label).size(14).width(Length::Fill))
                    .padding([6, 10])
                    .on_press(config.message.clone()),
            )
        });
        sections = sections.push(column![text(*title).size(18), Space::with_height(10), items].spacing(5));
    }

    container(sections.padding(15))
        .width(Length::Fixed(220.0))
        .height(Length::Fill)
        .into()
}

/// Large Play/Pause button, green while paused and red while listening.
fn make_playback_button(running: bool) -> Element<'static, crate::Message> {
    let (label, color, message) = if running {
        ("Pause", iced::Color::from_rgb(0.8, 0.2, 0.2), crate::Message::Pause)
    } else {
        ("Play", iced::Color::from_rgb(0.2, 0.7, 0.3), crate::Message::Play)
    };

    button(text(label).size(18).width(Length::Fill))
        .padding([12, 20])
        .style(move |_theme, _status| {
            use iced::widget::button;
            button::Style {
                background: Some(iced::Background::Color(color)),
                text_color: iced::Color::WHITE,
                ..button::Style::default()
            }
        })
        .on_press(message)
        .into()
}

fn format_hz(value: Option<f32>) -> String {
    value.map(|hz| format!("{:.1} Hz", hz)).unwrap_or_else(|| "--".to_string())
}

fn format_ratio(value: Option<f32>) -> String {
    value.map(|ratio| format!("{:.3}", ratio)).unwrap_or_else(|| "--".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_features_render_as_dashes() {
        assert_eq!(format_hz(None), "--");
        assert_eq!(format_ratio(None), "--");
        assert_eq!(format_hz(Some(440.04)), "440.0 Hz");
        assert_eq!(format_ratio(Some(0.5)), "0.500");
    }
}

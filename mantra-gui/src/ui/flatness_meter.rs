//! # Flatness Meter Widget
//!
//! Horizontal meter running from tonal (left) to noise-like (right), with
//! a needle at the current spectral flatness. The background lights up
//! while an onset is being shown.

use iced::widget::canvas::{self, Geometry, Path, Stroke};
use iced::widget::container;
use iced::{Color, Element, Point, Rectangle, Renderer, Size, Theme, mouse};

pub struct FlatnessMeter {
    /// Spectral flatness in [0, 1] (None when not estimable)
    flatness: Option<f32>,
    onset: bool,
}

impl FlatnessMeter {
    pub fn new(flatness: Option<f32>, onset: bool) -> Self {
        Self { flatness, onset }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fixed(60.0)),
        )
        .into()
    }
}

impl<Message> canvas::Program<Message> for FlatnessMeter {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());

        let background_color = if self.onset {
            Color::from_rgb8(0x6A, 0x4A, 0x20)
        } else {
            Color::from_rgb8(0x40, 0x40, 0x40)
        };
        let background = Path::rectangle(Point::ORIGIN, bounds.size());
        frame.fill(&background, background_color);

        // Midpoint tick
        let center_x = bounds.width / 2.0;
        let center_line = Path::line(Point::new(center_x, 0.0), Point::new(center_x, bounds.height));
        frame.stroke(
            &center_line,
            Stroke::default().with_width(1.0).with_color(Color::from_rgb8(0x80, 0x80, 0x80)),
        );

        if let Some(flatness) = self.flatness {
            let position = flatness.clamp(0.0, 1.0) * bounds.width;

            let color = if flatness < 0.2 {
                Color::from_rgb8(0x34, 0xDB, 0x98) // Tonal
            } else if flatness < 0.6 {
                Color::from_rgb8(0xFF, 0xC3, 0x00)
            } else {
                Color::from_rgb8(0xFF, 0x33, 0x33) // Noise-like
            };

            let needle = Path::rectangle(
                Point::new((position - 2.0).max(0.0), 0.0),
                Size::new(4.0, bounds.height),
            );
            frame.fill(&needle, color);
        }

        vec![frame.into_geometry()]
    }
}

//! # Spectrum Bars Widget
//!
//! Bar display of the capture graph's 256-point tap: one bar per bin,
//! height proportional to the 0..=255 byte magnitude, hue sweeping from
//! amber in the bass upwards.

use iced::widget::canvas::{self, Geometry, Path};
use iced::widget::container;
use iced::{Color, Element, Point, Rectangle, Renderer, Size, Theme, mouse};

/// Largest value a display-tap bin can take.
const BYTE_MAX: f32 = 255.0;

pub struct SpectrumBars {
    /// Byte magnitudes from the display tap
    bars: Vec<f32>,
}

impl SpectrumBars {
    pub fn new(bars: Vec<f32>) -> Self {
        Self { bars }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fill),
        )
        .into()
    }
}

impl<Message> canvas::Program<Message> for SpectrumBars {
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

        if !bounds.width.is_finite() || !bounds.height.is_finite() || self.bars.is_empty() {
            return vec![frame.into_geometry()];
        }

        let bar_width = bounds.width / self.bars.len() as f32;
        // One-pixel gap between bars, unless the bars are thinner than that.
        let fill_width = if bar_width > 2.0 { bar_width - 1.0 } else { bar_width };

        for (i, &value) in self.bars.iter().enumerate() {
            let height = (value / BYTE_MAX).clamp(0.0, 1.0) * bounds.height;
            if height <= 0.0 {
                continue;
            }
            let bar = Path::rectangle(
                Point::new(i as f32 * bar_width, bounds.height - height),
                Size::new(fill_width, height),
            );
            frame.fill(&bar, bar_color(i));
        }

        vec![frame.into_geometry()]
    }
}

/// Colour of bar `i`: hue `30 + i/2` degrees at 60% saturation and lightness.
fn bar_color(i: usize) -> Color {
    let hue = (30.0 + i as f32 / 2.0) % 360.0;
    let (r, g, b) = hsl_to_rgb(hue, 0.6, 0.6);
    Color::from_rgb(r, g, b)
}

fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> (f32, f32, f32) {
    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let sector = hue / 60.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = lightness - chroma / 2.0;
    (r + m, g + m, b + m)
}

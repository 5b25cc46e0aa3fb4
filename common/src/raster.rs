//! 1-bit framebuffer in SSD1306 page order, drawn through `embedded-graphics`.

use core::convert::Infallible;

use embedded_graphics::{
    mono_font::{ascii::FONT_5X7, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{Circle, Line, PrimitiveStyle, Rectangle},
    text::{Baseline, Text},
};

use crate::face::{Frame, Shape, PANEL_HEIGHT, PANEL_WIDTH};

pub const BUFFER_LEN: usize = (PANEL_WIDTH * PANEL_HEIGHT / 8) as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framebuffer {
    pixels: [u8; BUFFER_LEN],
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framebuffer {
    pub fn new() -> Self {
        Self {
            pixels: [0; BUFFER_LEN],
        }
    }

    pub fn clear(&mut self) {
        self.pixels = [0; BUFFER_LEN];
    }

    /// Raw bytes ready to stream to the panel: eight pages of 128 columns.
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Off-panel coordinates are clipped.
    pub fn set(&mut self, x: i32, y: i32, lit: bool) {
        let Some((index, mask)) = Self::locate(x, y) else {
            return;
        };
        if lit {
            self.pixels[index] |= mask;
        } else {
            self.pixels[index] &= !mask;
        }
    }

    pub fn get(&self, x: i32, y: i32) -> bool {
        Self::locate(x, y)
            .map(|(index, mask)| self.pixels[index] & mask != 0)
            .unwrap_or(false)
    }

    pub fn lit_count(&self) -> u32 {
        self.pixels.iter().map(|byte| byte.count_ones()).sum()
    }

    pub fn draw_frame(&mut self, frame: &Frame) {
        self.clear();
        for shape in &frame.shapes {
            self.draw_shape(shape);
        }
        for line in &frame.text {
            self.draw_text(line.x, line.y, &line.text);
        }
    }

    // Drawing into memory is infallible, so the results are discarded.
    pub fn draw_shape(&mut self, shape: &Shape) {
        match *shape {
            Shape::FillCircle { x, y, r, lit } => {
                let _ = circle(x, y, r)
                    .into_styled(PrimitiveStyle::with_fill(BinaryColor::from(lit)))
                    .draw(self);
            }
            Shape::Circle { x, y, r } => {
                let _ = circle(x, y, r).into_styled(stroke()).draw(self);
            }
            Shape::Line { x0, y0, x1, y1 } => {
                let _ = Line::new(Point::new(x0, y0), Point::new(x1, y1))
                    .into_styled(stroke())
                    .draw(self);
            }
            Shape::FillRect { x, y, w, h, lit } => {
                let _ = rectangle(x, y, w, h)
                    .into_styled(PrimitiveStyle::with_fill(BinaryColor::from(lit)))
                    .draw(self);
            }
            Shape::Rect { x, y, w, h } => {
                let _ = rectangle(x, y, w, h).into_styled(stroke()).draw(self);
            }
            Shape::Pixel { x, y } => self.set(x, y, true),
        }
    }

    /// `(x, y)` is the top-left corner of the first glyph.
    pub fn draw_text(&mut self, x: i32, y: i32, text: &str) {
        let style = MonoTextStyle::new(&FONT_5X7, BinaryColor::On);
        let _ = Text::with_baseline(text, Point::new(x, y), style, Baseline::Top).draw(self);
    }

    fn locate(x: i32, y: i32) -> Option<(usize, u8)> {
        if !(0..PANEL_WIDTH).contains(&x) || !(0..PANEL_HEIGHT).contains(&y) {
            return None;
        }
        let index = (x + (y / 8) * PANEL_WIDTH) as usize;
        Some((index, 1 << (y % 8)))
    }
}

fn stroke() -> PrimitiveStyle<BinaryColor> {
    PrimitiveStyle::with_stroke(BinaryColor::On, 1)
}

fn circle(x: i32, y: i32, r: i32) -> Circle {
    Circle::with_center(Point::new(x, y), (2 * r.max(0) + 1) as u32)
}

fn rectangle(x: i32, y: i32, w: i32, h: i32) -> Rectangle {
    Rectangle::new(Point::new(x, y), Size::new(w.max(0) as u32, h.max(0) as u32))
}

impl OriginDimensions for Framebuffer {
    fn size(&self) -> Size {
        Size::new(PANEL_WIDTH as u32, PANEL_HEIGHT as u32)
    }
}

impl DrawTarget for Framebuffer {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.set(point.x, point.y, color.is_on());
        }
        Ok(())
    }
}

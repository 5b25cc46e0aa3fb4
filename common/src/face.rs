//! Mood faces as drawing primitives for a 128x64 monochrome panel.
//!
//! The layout is plain data so it can be checked in tests and rasterised by whatever
//! panel driver the board provides.

use crate::types::{MoodState, SensorSample};

pub const PANEL_WIDTH: i32 = 128;
pub const PANEL_HEIGHT: i32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    FillCircle { x: i32, y: i32, r: i32, lit: bool },
    Circle { x: i32, y: i32, r: i32 },
    Line { x0: i32, y0: i32, x1: i32, y1: i32 },
    FillRect { x: i32, y: i32, w: i32, h: i32, lit: bool },
    Rect { x: i32, y: i32, w: i32, h: i32 },
    Pixel { x: i32, y: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLine {
    pub x: i32,
    pub y: i32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub shapes: Vec<Shape>,
    pub text: Vec<TextLine>,
}

impl Frame {
    /// One-line summary of the text overlay, for log-based displays.
    pub fn caption(&self) -> String {
        self.text
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub fn face(mood: MoodState, sample: &SensorSample, now_ms: u64) -> Frame {
    let mut shapes = vec![
        Shape::FillCircle { x: 64, y: 32, r: 30, lit: true },
        Shape::FillCircle { x: 64, y: 32, r: 28, lit: false },
    ];
    let mut text = Vec::new();

    match mood {
        MoodState::Happy => shapes.extend([
            Shape::FillCircle { x: 50, y: 25, r: 3, lit: true },
            Shape::FillCircle { x: 78, y: 25, r: 3, lit: true },
            Shape::Circle { x: 64, y: 32, r: 15 },
            // Mask the top of the circle so only the smile remains.
            Shape::FillRect { x: 49, y: 32, w: 30, h: 15, lit: false },
        ]),
        MoodState::AlertHigh => shapes.extend([
            Shape::Line { x0: 45, y0: 20, x1: 55, y1: 30 },
            Shape::Line { x0: 55, y0: 20, x1: 45, y1: 30 },
            Shape::Line { x0: 73, y0: 20, x1: 83, y1: 30 },
            Shape::Line { x0: 83, y0: 20, x1: 73, y1: 30 },
            Shape::FillRect { x: 62, y: 38, w: 4, h: 4, lit: true },
        ]),
        MoodState::AlertLow => shapes.extend([
            Shape::Pixel { x: 50, y: 25 },
            Shape::Pixel { x: 78, y: 25 },
            Shape::Line { x0: 50, y0: 40, x1: 77, y1: 40 },
        ]),
        MoodState::Touched => shapes.extend([
            Shape::FillCircle { x: 50, y: 25, r: 3, lit: true },
            Shape::Line { x0: 75, y0: 25, x1: 81, y1: 25 },
            Shape::Circle { x: 64, y: 35, r: 18 },
            Shape::FillRect { x: 46, y: 35, w: 36, h: 18, lit: false },
        ]),
        MoodState::Updating => {
            let progress = ((now_ms / 100) % 114) as i32;
            shapes.extend([
                Shape::FillCircle { x: 64, y: 32, r: 30, lit: false },
                Shape::Rect { x: 5, y: 45, w: 118, h: 10 },
                Shape::FillRect { x: 7, y: 47, w: progress, h: 6, lit: true },
            ]);
            text.push(TextLine {
                x: 10,
                y: 10,
                text: "OTA UPDATE".to_string(),
            });
        }
    }

    text.push(TextLine {
        x: 0,
        y: 0,
        text: format!("T:{:.1}C", sample.temperature_c),
    });
    text.push(TextLine {
        x: 0,
        y: 56,
        text: format!("H:{:.0}%", sample.humidity_pct),
    });
    text.push(TextLine {
        x: 90,
        y: 56,
        text: format!("P:{:.0}hPa", sample.pressure_hpa),
    });

    Frame { shapes, text }
}

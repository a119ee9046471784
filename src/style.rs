use serde::{Deserialize, Serialize};

/// Fixed pen palette offered to the inspector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PenColor {
    #[default]
    Red,
    Blue,
    Green,
    Yellow,
    Black,
    White,
}

impl PenColor {
    pub const ALL: [PenColor; 6] = [
        PenColor::Red,
        PenColor::Blue,
        PenColor::Green,
        PenColor::Yellow,
        PenColor::Black,
        PenColor::White,
    ];

    pub fn rgba(self) -> [u8; 4] {
        match self {
            PenColor::Red => [220, 20, 20, 255],
            PenColor::Blue => [20, 70, 220, 255],
            PenColor::Green => [20, 160, 50, 255],
            PenColor::Yellow => [240, 200, 0, 255],
            PenColor::Black => [0, 0, 0, 255],
            PenColor::White => [255, 255, 255, 255],
        }
    }

    pub fn to_egui(self) -> egui::Color32 {
        let [r, g, b, a] = self.rgba();
        egui::Color32::from_rgba_unmultiplied(r, g, b, a)
    }

    pub fn label(self) -> &'static str {
        match self {
            PenColor::Red => "Red",
            PenColor::Blue => "Blue",
            PenColor::Green => "Green",
            PenColor::Yellow => "Yellow",
            PenColor::Black => "Black",
            PenColor::White => "White",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PenWidth {
    Thin,
    #[default]
    Medium,
    Thick,
}

impl PenWidth {
    pub const ALL: [PenWidth; 3] = [PenWidth::Thin, PenWidth::Medium, PenWidth::Thick];

    /// Stroke diameter in surface pixels.
    pub fn pixels(self) -> f32 {
        match self {
            PenWidth::Thin => 2.0,
            PenWidth::Medium => 5.0,
            PenWidth::Thick => 10.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PenWidth::Thin => "Thin",
            PenWidth::Medium => "Medium",
            PenWidth::Thick => "Thick",
        }
    }
}

/// Pen settings passed with every segment instead of living on the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DrawingStyle {
    pub color: PenColor,
    pub width: PenWidth,
}

impl DrawingStyle {
    pub fn new(color: PenColor, width: PenWidth) -> Self {
        Self { color, width }
    }
}

/// A point in surface-local pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

//! Alignment enums and the box arithmetic shared by both text paths.
//!
//! ```text
//!   ┌──────────── box width ────────────┐
//!   │◀2▶ left-aligned text              │
//!   │      ◀(box − w)/2▶ centered       │
//!   │              right-aligned text◀2▶│
//!   └───────────────────────────────────┘
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TextError;

/// Gap between the box edge and leading/trailing aligned text.
pub const LEADING_INSET: f32 = 2.0;
/// Slack added to the natural width when the width auto-sizes.
pub const AUTO_SIZE_PADDING_X: f32 = 5.0;
/// Slack added to the natural height when the height auto-sizes.
pub const AUTO_SIZE_PADDING_Y: f32 = 4.0;
/// Auto-scale never shrinks the rasterized font below this size.
pub const MIN_AUTO_SCALE_SIZE: f32 = 4.0;
/// Total horizontal/vertical gutter the text engine reserves.
pub const GUTTER: f32 = 4.0;
/// Stand-in for an unbounded axis while auto-sizing.
pub const UNBOUNDED: f32 = i32::MAX as f32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HAlign {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VAlign {
    Top,
    #[default]
    Center,
    Bottom,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoSize {
    #[default]
    None,
    Horizontal,
    Vertical,
    Both,
}

impl AutoSize {
    pub fn horizontal(self) -> bool {
        matches!(self, AutoSize::Horizontal | AutoSize::Both)
    }

    pub fn vertical(self) -> bool {
        matches!(self, AutoSize::Vertical | AutoSize::Both)
    }
}

fn invalid(kind: &'static str, value: &str) -> TextError {
    TextError::InvalidAlignment { kind, value: value.to_string() }
}

impl FromStr for HAlign {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(HAlign::Left),
            "center" => Ok(HAlign::Center),
            "right" => Ok(HAlign::Right),
            _ => Err(invalid("horizontal alignment", s)),
        }
    }
}

impl FromStr for VAlign {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "top" => Ok(VAlign::Top),
            "center" => Ok(VAlign::Center),
            "bottom" => Ok(VAlign::Bottom),
            _ => Err(invalid("vertical alignment", s)),
        }
    }
}

impl FromStr for AutoSize {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(AutoSize::None),
            "horizontal" => Ok(AutoSize::Horizontal),
            "vertical" => Ok(AutoSize::Vertical),
            "both" | "both_directions" => Ok(AutoSize::Both),
            _ => Err(invalid("auto-size", s)),
        }
    }
}

/// Box and alignment actually used for layout.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutBox {
    pub width: f32,
    pub height: f32,
    pub h_align: HAlign,
    pub v_align: VAlign,
}

/// Auto-sized axes are unbounded and laid out from the leading edge.
pub fn resolve_layout_box(width: f32, height: f32, h_align: HAlign, v_align: VAlign, auto_size: AutoSize) -> LayoutBox {
    let mut layout = LayoutBox { width, height, h_align, v_align };
    if auto_size.horizontal() {
        layout.width = UNBOUNDED;
        layout.h_align = HAlign::Left;
    }
    if auto_size.vertical() {
        layout.height = UNBOUNDED;
        layout.v_align = VAlign::Top;
    }
    layout
}

pub fn h_offset(align: HAlign, box_width: f32, text_width: f32) -> f32 {
    match align {
        HAlign::Left => LEADING_INSET,
        HAlign::Center => (box_width - text_width) / 2.0,
        HAlign::Right => box_width - text_width - LEADING_INSET,
    }
}

pub fn v_offset(align: VAlign, box_height: f32, text_height: f32) -> f32 {
    match align {
        VAlign::Top => LEADING_INSET,
        VAlign::Center => (box_height - text_height) / 2.0,
        VAlign::Bottom => box_height - text_height - LEADING_INSET,
    }
}

/// `ceil(natural) + padding`.
pub fn auto_sized_extent(natural: f32, padding: f32) -> f32 {
    natural.ceil() + padding
}

/// Natural text size reported by a measurement.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TextMetrics {
    pub width: f32,
    pub height: f32,
}

impl TextMetrics {
    pub fn is_empty(&self) -> bool {
        self.width == 0.0 || self.height == 0.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AutoScaleOutcome {
    pub font_size: f32,
    pub metrics: TextMetrics,
    /// Number of one-unit decrements applied.
    pub steps: u32,
}

/// Shrink the font by whole units until the text fits into the box minus
/// the gutter, or the size reaches [`MIN_AUTO_SCALE_SIZE`].
///
/// `measure` maps a font size to natural text metrics.
pub fn auto_scale<F>(box_width: f32, box_height: f32, font_size: f32, initial: TextMetrics, mut measure: F) -> AutoScaleOutcome
where
    F: FnMut(f32) -> TextMetrics,
{
    let max_width = (box_width - GUTTER).trunc();
    let max_height = (box_height - GUTTER).trunc();
    let mut size = font_size;
    let mut metrics = initial;
    let mut steps = 0;
    while !(metrics.width <= max_width && metrics.height <= max_height) {
        if size <= MIN_AUTO_SCALE_SIZE {
            break;
        }
        size -= 1.0;
        steps += 1;
        metrics = measure(size);
    }
    AutoScaleOutcome { font_size: size, metrics, steps }
}

// ===================================================================
// Tests
// ===================================================================

use serde::{Deserialize, Serialize};

use crate::shared::bounding_box::{BoundingBox, PixelRect};
use crate::shared::constants::{OVERLAY_COLOR, OVERLAY_LINE_WIDTH};
use crate::shared::frame::Frame;

/// Stroke used for face rectangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    pub color: [u8; 3],
    pub line_width: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: OVERLAY_COLOR,
            line_width: OVERLAY_LINE_WIDTH,
        }
    }
}

/// Draws face rectangles into a captured frame.
///
/// The stroke lies inside each box edge and is clipped to the image, so a
/// box touching the border keeps all four sides visible.
pub struct OverlayRenderer {
    style: OverlayStyle,
    luma: u8,
}

impl OverlayRenderer {
    pub fn new(style: OverlayStyle) -> Self {
        let [r, g, b] = style.color.map(u32::from);
        // BT.601 weights, scaled by 1000
        let luma = ((299 * r + 587 * g + 114 * b + 500) / 1000) as u8;
        Self { style, luma }
    }

    /// Strokes every box. Boxes entirely outside the frame are skipped.
    /// Gray frames get the stroke color's luma; alpha is left untouched.
    pub fn draw(&self, boxes: &[BoundingBox], frame: &mut Frame) {
        let (width, height) = (frame.width(), frame.height());
        let ink = self.ink(frame.channels());
        if ink.is_empty() {
            return;
        }
        for rect in boxes.iter().filter_map(|b| b.pixel_bounds(width, height)) {
            self.stroke(rect, ink, frame);
        }
    }

    fn ink(&self, channels: u8) -> &[u8] {
        match channels {
            0 => &[],
            1 | 2 => std::slice::from_ref(&self.luma),
            _ => &self.style.color,
        }
    }

    fn stroke(&self, rect: PixelRect, ink: &[u8], frame: &mut Frame) {
        let lw = self
            .style
            .line_width
            .max(1)
            .min(rect.width().div_ceil(2))
            .min(rect.height().div_ceil(2));

        // top and bottom bands
        fill(frame, ink, rect.x0, rect.y0, rect.x1, rect.y0 + lw);
        fill(frame, ink, rect.x0, rect.y1 - lw, rect.x1, rect.y1);
        // left and right bands
        fill(frame, ink, rect.x0, rect.y0, rect.x0 + lw, rect.y1);
        fill(frame, ink, rect.x1 - lw, rect.y0, rect.x1, rect.y1);
    }
}

fn fill(frame: &mut Frame, ink: &[u8], x0: u32, y0: u32, x1: u32, y1: u32) {
    let channels = frame.channels() as usize;
    let stride = frame.width() as usize * channels;
    let data = frame.data_mut();
    for y in y0 as usize..y1 as usize {
        for x in x0 as usize..x1 as usize {
            let idx = y * stride + x * channels;
            data[idx..idx + ink.len()].copy_from_slice(ink);
        }
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(OverlayStyle::default())
    }
}

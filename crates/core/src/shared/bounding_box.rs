use serde::{Deserialize, Serialize};

/// Axis-aligned face box in image pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Integer pixel bounds of a box clipped to an image, end-exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelRect {
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True for boxes without a positive area (including NaN sides).
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }


    /// Rounds the box to whole pixels and clips it to a `width x height`
    /// image. `None` when nothing of the box lands inside the image.
    pub fn pixel_bounds(&self, width: u32, height: u32) -> Option<PixelRect> {
        if self.is_empty() || !self.x.is_finite() || !self.y.is_finite() {
            return None;
        }
        let clip = |v: f32, max: u32| v.round().clamp(0.0, max as f32) as u32;
        let rect = PixelRect {
            x0: clip(self.x, width),
            y0: clip(self.y, height),
            x1: clip(self.x + self.width, width),
            y1: clip(self.y + self.height, height),
        };
        (rect.x1 > rect.x0 && rect.y1 > rect.y0).then_some(rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_pixel_bounds_inside_image() {
        let b = BoundingBox::new(10.0, 20.0, 100.0, 120.0);
        assert_eq!(
            b.pixel_bounds(640, 480),
            Some(PixelRect {
                x0: 10,
                y0: 20,
                x1: 110,
                y1: 140
            })
        );
    }

    #[test]
    fn test_pixel_bounds_clips_at_edges() {
        let b = BoundingBox::new(-15.0, 400.0, 50.0, 200.0);
        let rect = b.pixel_bounds(640, 480).unwrap();
        assert_eq!((rect.x0, rect.y0, rect.x1, rect.y1), (0, 400, 35, 480));
        assert_eq!(rect.width(), 35);
        assert_eq!(rect.height(), 80);
    }

    #[test]
    fn test_pixel_bounds_outside_image_is_none() {
        let b = BoundingBox::new(700.0, 10.0, 30.0, 30.0);
        assert_eq!(b.pixel_bounds(640, 480), None);
    }

    #[rstest]
    #[case(0.0, 10.0)]
    #[case(10.0, 0.0)]
    #[case(-5.0, 10.0)]
    #[case(f32::NAN, 10.0)]
    fn test_degenerate_boxes_are_empty(#[case] w: f32, #[case] h: f32) {
        let b = BoundingBox::new(1.0, 1.0, w, h);
        assert!(b.is_empty());
        assert_eq!(b.pixel_bounds(100, 100), None);
    }

    #[test]
    fn test_serializes_with_plain_field_names() {
        let b = BoundingBox::new(10.0, 20.0, 100.0, 120.0);
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, r#"{"x":10.0,"y":20.0,"width":100.0,"height":120.0}"#);
    }
}

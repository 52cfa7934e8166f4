use serde::Deserialize;

/// Width of the tag name field in a label. Longer names are not truncated.
pub const LABEL_TAG_WIDTH: usize = 10;

/// Bounding box as fractions of the image dimensions, as the service returns it.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// One detected object.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub tag_name: String,
    pub probability: f64,
    pub bounding_box: BoundingBox,
}

/// Bounding box in pixel coordinates of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelBox {
    pub const fn start(&self) -> (i32, i32) {
        (self.left, self.top)
    }

    pub const fn end(&self) -> (i32, i32) {
        (self.left + self.width, self.top + self.height)
    }
}

impl BoundingBox {
    /// Scales the normalized box to an image of `image_width` x `image_height`.
    /// Each component is rounded independently, ties to even (2.5 -> 2, 3.5 -> 4).
    pub fn to_pixel_box(&self, image_width: u32, image_height: u32) -> PixelBox {
        let w = f64::from(image_width);
        let h = f64::from(image_height);
        PixelBox {
            left: (self.left * w).round_ties_even() as i32,
            top: (self.top * h).round_ties_even() as i32,
            width: (self.width * w).round_ties_even() as i32,
            height: (self.height * h).round_ties_even() as i32,
        }
    }
}

impl Prediction {
    /// Inclusive: a prediction exactly at the threshold is kept.
    pub fn passes_threshold(&self, threshold: f64) -> bool {
        self.probability >= threshold
    }

    pub fn label(&self) -> String {
        format_label(&self.tag_name, self.probability)
    }
}

/// `"{tag:<10}({pct:.2}%)"`, e.g. `cat       (87.34%)`.
pub fn format_label(tag_name: &str, probability: f64) -> String {
    format!(
        "{:<width$}({:.2}%)",
        tag_name,
        probability * 100.0,
        width = LABEL_TAG_WIDTH
    )
}

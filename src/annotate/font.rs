use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::RgbImage;
use imageproc::drawing::{draw_text_mut, text_size};
use tracing::debug;

use super::TextStyle;
use crate::errors::{Result, VisionBatchError};
use crate::traits::TextRenderer;

/// Glyph height in pixels at a style scale of 1.0.
const BASE_GLYPH_HEIGHT: f32 = 22.0;

/// DejaVu Sans, used when no system font loads. License in `assets/fonts/`.
const BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// Fonts tried, in order, when the parameter file names none.
pub const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Renders labels with a TrueType/OpenType font through imageproc.
pub struct FontTextRenderer {
    font: FontVec,
}

impl FontTextRenderer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read(path).map_err(|e| VisionBatchError::FileSystem {
            path: path.to_path_buf(),
            operation: "ラベルフォント読み込み".to_string(),
            source: e,
        })?;
        let font = FontVec::try_from_vec(data).map_err(|e| VisionBatchError::Font {
            message: format!("{}: {}", path.display(), e),
        })?;
        Ok(Self { font })
    }

    pub fn bundled() -> Result<Self> {
        let font =
            FontVec::try_from_vec(BUNDLED_FONT.to_vec()).map_err(|e| VisionBatchError::Font {
                message: format!("同梱フォント: {}", e),
            })?;
        Ok(Self { font })
    }

    /// Uses `configured` when given, otherwise the first system font that
    /// loads, otherwise the bundled font.
    pub fn discover(configured: Option<&Path>) -> Result<Self> {
        if let Some(path) = configured {
            return Self::from_file(path);
        }

        let system = SYSTEM_FONT_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .filter(|path| path.is_file())
            .find_map(|path| match Self::from_file(&path) {
                Ok(renderer) => {
                    debug!(font = %path.display(), "システムフォント使用");
                    Some(renderer)
                }
                Err(e) => {
                    debug!(font = %path.display(), error = %e, "使用できないフォントをスキップ");
                    None
                }
            });

        match system {
            Some(renderer) => Ok(renderer),
            None => {
                debug!("同梱フォント使用");
                Self::bundled()
            }
        }
    }

    fn px_scale(style: &TextStyle) -> PxScale {
        PxScale::from(BASE_GLYPH_HEIGHT * style.scale)
    }
}

impl TextRenderer for FontTextRenderer {
    fn text_size(&self, text: &str, style: &TextStyle) -> (u32, u32) {
        let (width, height) = text_size(Self::px_scale(style), &self.font, text);
        // overdrawn strokes widen the text by thickness - 1
        (width + style.thickness.saturating_sub(1), height)
    }

    fn draw_text(&self, image: &mut RgbImage, text: &str, style: &TextStyle, x: i32, y: i32) {
        let scale = Self::px_scale(style);
        for dx in 0..style.thickness.max(1) as i32 {
            draw_text_mut(image, style.text_color, x + dx, y, scale, &self.font, text);
        }
    }
}

use std::cell::RefCell;

use image::RgbImage;
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::annotate::TextStyle;
use crate::errors::{Result, VisionBatchError};
use crate::prediction::Prediction;
use crate::traits::{PredictionClient, TextRenderer};

/// テスト用のモック検出クライアント
///
/// 全ての画像に同じ検出結果を返し、受け取ったリクエストを記録する
#[derive(Debug, Default)]
pub struct MockPredictionClient {
    predictions: Vec<Prediction>,
    fail: bool,
    requests: RefCell<Vec<DetectRequest>>,
}

/// 記録されたリクエスト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectRequest {
    pub project_id: String,
    pub published_name: String,
    pub image_len: usize,
}

impl MockPredictionClient {
    pub fn new(predictions: Vec<Prediction>) -> Self {
        Self {
            predictions,
            ..Self::default()
        }
    }

    /// 常にエラーを返すクライアント
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<DetectRequest> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl PredictionClient for MockPredictionClient {
    fn detect(
        &self,
        project_id: &str,
        published_name: &str,
        image: &[u8],
    ) -> Result<Vec<Prediction>> {
        self.requests.borrow_mut().push(DetectRequest {
            project_id: project_id.to_string(),
            published_name: published_name.to_string(),
            image_len: image.len(),
        });

        if self.fail {
            return Err(VisionBatchError::prediction_message(
                "モック物体検出",
                "サービス利用不可",
            ));
        }
        Ok(self.predictions.clone())
    }
}

/// テスト用の固定幅テキストレンダラー
///
/// 1文字を `cell_width` x `cell_height` として計測し、テキスト領域を塗りつぶす
#[derive(Debug, Clone, Copy)]
pub struct MockTextRenderer {
    pub cell_width: u32,
    pub cell_height: u32,
}

impl MockTextRenderer {
    pub const fn new(cell_width: u32, cell_height: u32) -> Self {
        Self {
            cell_width,
            cell_height,
        }
    }
}

impl TextRenderer for MockTextRenderer {
    fn text_size(&self, text: &str, _style: &TextStyle) -> (u32, u32) {
        (
            self.cell_width * text.chars().count() as u32,
            self.cell_height,
        )
    }

    fn draw_text(&self, image: &mut RgbImage, text: &str, style: &TextStyle, x: i32, y: i32) {
        let (width, height) = self.text_size(text, style);
        if width == 0 || height == 0 {
            return;
        }
        draw_filled_rect_mut(
            image,
            Rect::at(x, y).of_size(width, height),
            style.text_color,
        );
    }
}

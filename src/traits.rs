use crate::annotate::TextStyle;
use crate::errors::Result;
use crate::prediction::Prediction;
use image::RgbImage;

/// 物体検出サービスの抽象化
///
/// 依存関係逆転原則（DIP）に従い、HTTPクライアントの具象型ではなく抽象に依存する
pub trait PredictionClient {
    /// 公開済みイテレーションで画像の物体検出を実行
    fn detect(&self, project_id: &str, published_name: &str, image: &[u8])
        -> Result<Vec<Prediction>>;
}

impl<T: PredictionClient + ?Sized> PredictionClient for &T {
    fn detect(
        &self,
        project_id: &str,
        published_name: &str,
        image: &[u8],
    ) -> Result<Vec<Prediction>> {
        (**self).detect(project_id, published_name, image)
    }
}

/// ラベル文字列の計測と描画の抽象化
pub trait TextRenderer {
    /// 描画後のテキストのピクセルサイズ (幅, 高さ)
    fn text_size(&self, text: &str, style: &TextStyle) -> (u32, u32);

    /// `(x, y)` をテキストの左上として `style.text_color` で描画
    fn draw_text(&self, image: &mut RgbImage, text: &str, style: &TextStyle, x: i32, y: i32);
}

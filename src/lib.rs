pub mod annotate;
pub mod client;
pub mod config;
pub mod errors;
pub mod prediction;
pub mod traits;

pub mod mocks;

use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

pub use annotate::{FontTextRenderer, TextStyle};
pub use client::CustomVisionClient;
pub use config::{AppConfig, Cli};
pub use errors::{Result, VisionBatchError};
pub use prediction::{BoundingBox, PixelBox, Prediction};
pub use traits::*;

/// A file is processed when its name contains this literal substring.
///
/// This is a substring test, not an extension check: `photo.jpgx` and
/// `a.jpg.bak` both match, `photo.JPG` and `photo.jpeg` do not.
pub const JPG_NAME_PATTERN: &str = ".jpg";

pub fn is_jpg_name(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().contains(JPG_NAME_PATTERN))
        .unwrap_or(false)
}

/// How output file names are derived from input paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputLayout {
    /// Base name only. Same-named files from different subdirectories
    /// overwrite each other.
    #[default]
    Flatten,
    /// Keep the path relative to the source folder.
    PreserveStructure,
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub files: usize,
    pub boxes: usize,
}

pub struct BatchProcessor<C: PredictionClient, R: TextRenderer> {
    client: C,
    renderer: R,
    config: AppConfig,
    output_dir: PathBuf,
    layout: OutputLayout,
}

impl<C: PredictionClient, R: TextRenderer> BatchProcessor<C, R> {
    pub fn new(client: C, renderer: R, config: AppConfig) -> Self {
        Self {
            client,
            renderer,
            config,
            output_dir: PathBuf::from(crate::config::OUTPUT_DIR),
            layout: OutputLayout::Flatten,
        }
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_layout(mut self, layout: OutputLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Runs detection and annotation over every matching file under the source
    /// folder, one file at a time. The first error aborts the run; outputs
    /// already written are left in place.
    pub fn process_directory(&self) -> Result<RunSummary> {
        fs::create_dir_all(&self.output_dir).map_err(|e| VisionBatchError::FileSystem {
            path: self.output_dir.clone(),
            operation: "出力ディレクトリ作成".to_string(),
            source: e,
        })?;

        let image_files = self.collect_image_files();
        let mut summary = RunSummary::default();

        if image_files.is_empty() {
            info!(
                source = %self.config.source_folder.display(),
                "'{}' を含む画像ファイルが見つかりません",
                JPG_NAME_PATTERN
            );
            return Ok(summary);
        }

        let pb = ProgressBar::new(image_files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
                )
                .map_err(|e| VisionBatchError::Configuration {
                    message: e.to_string(),
                })?
                .progress_chars("#>-"),
        );

        for input_file in &image_files {
            summary.boxes += self.process_single_image(input_file)?;
            summary.files += 1;
            pb.inc(1);
        }

        pb.finish_and_clear();
        info!(
            files = summary.files,
            boxes = summary.boxes,
            output = %self.output_dir.display(),
            "全ての画像処理が完了しました"
        );
        Ok(summary)
    }

    /// Recursive walk of the source folder, sorted by file name within each
    /// directory. Unreadable entries are skipped. Symlinked files are kept;
    /// symlinked directories are not entered.
    pub fn collect_image_files(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.config.source_folder)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file() && is_jpg_name(e.path()))
            .map(|e| e.into_path())
            .collect()
    }

    /// Returns the number of boxes drawn.
    pub fn process_single_image(&self, input_file: &Path) -> Result<usize> {
        debug!(file = %input_file.display(), "画像解析");

        let image_data = fs::read(input_file).map_err(|e| VisionBatchError::FileSystem {
            path: input_file.to_path_buf(),
            operation: "画像読み込み".to_string(),
            source: e,
        })?;

        let predictions = self.client.detect(
            &self.config.project_id,
            &self.config.published_name,
            &image_data,
        )?;

        let format = image::guess_format(&image_data)
            .map_err(|e| self.image_error(input_file, "画像形式判定", e))?;
        let mut image = self.decode_upright(input_file, &image_data, format)?;
        drop(image_data);

        let mut boxes = 0;
        for prediction in predictions
            .iter()
            .filter(|p| p.passes_threshold(self.config.probability_threshold))
        {
            let pixel_box = annotate::annotate_prediction(&mut image, &self.renderer, prediction);
            debug!(
                tag = %prediction.tag_name,
                probability = prediction.probability,
                left = pixel_box.left,
                top = pixel_box.top,
                width = pixel_box.width,
                height = pixel_box.height,
                "ボックス描画"
            );
            boxes += 1;
        }

        let output_file = self.output_path(input_file)?;
        if let Some(parent) = output_file.parent() {
            fs::create_dir_all(parent).map_err(|e| VisionBatchError::FileSystem {
                path: parent.to_path_buf(),
                operation: "出力ディレクトリ作成".to_string(),
                source: e,
            })?;
        }

        save_image(&image, &output_file, format)?;
        Ok(boxes)
    }

    pub fn output_path(&self, input_file: &Path) -> Result<PathBuf> {
        match self.layout {
            OutputLayout::Flatten => {
                let file_name =
                    input_file
                        .file_name()
                        .ok_or_else(|| VisionBatchError::Validation {
                            field: input_file.display().to_string(),
                            reason: "ファイル名がありません".to_string(),
                        })?;
                Ok(self.output_dir.join(file_name))
            }
            OutputLayout::PreserveStructure => Ok(self
                .output_dir
                .join(self.get_relative_path(input_file)?)),
        }
    }

    pub fn get_relative_path(&self, input_file: &Path) -> Result<PathBuf> {
        input_file
            .strip_prefix(&self.config.source_folder)
            .map(|p| p.to_path_buf())
            .map_err(|_| VisionBatchError::FileSystem {
                path: input_file.to_path_buf(),
                operation: "相対パス取得".to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "入力ファイルが入力ディレクトリ内にありません",
                ),
            })
    }

    /// Decodes with the EXIF orientation applied, so box coordinates are
    /// scaled against the upright image.
    fn decode_upright(
        &self,
        input_file: &Path,
        image_data: &[u8],
        format: ImageFormat,
    ) -> Result<image::RgbImage> {
        let mut decoder = ImageReader::with_format(Cursor::new(image_data), format)
            .into_decoder()
            .map_err(|e| self.image_error(input_file, "画像デコード", e))?;
        let orientation = decoder
            .orientation()
            .map_err(|e| self.image_error(input_file, "EXIF向き取得", e))?;
        let mut image = DynamicImage::from_decoder(decoder)
            .map_err(|e| self.image_error(input_file, "画像デコード", e))?;
        image.apply_orientation(orientation);
        Ok(image.into_rgb8())
    }

    fn image_error(
        &self,
        path: &Path,
        operation: &str,
        source: image::ImageError,
    ) -> VisionBatchError {
        VisionBatchError::ImageProcessing {
            path: path.display().to_string(),
            operation: operation.to_string(),
            source: Box::new(source),
        }
    }
}

// 本番用のHTTPクライアントとラベルフォントで組み立てるコンストラクタ
impl BatchProcessor<CustomVisionClient, FontTextRenderer> {
    pub fn with_custom_vision(config: AppConfig) -> Result<Self> {
        let client = CustomVisionClient::new(&config.endpoint, &config.access_key)?;
        let renderer = FontTextRenderer::discover(config.label_font_path.as_deref())?;
        Ok(Self::new(client, renderer, config))
    }
}

/// Encodes with the input's own format so loosely matched names such as
/// `photo.jpgx` still write.
fn save_image(image: &image::RgbImage, path: &Path, format: ImageFormat) -> Result<()> {
    image
        .save_with_format(path, format)
        .map_err(|e| VisionBatchError::ImageProcessing {
            path: path.display().to_string(),
            operation: "画像保存".to_string(),
            source: Box::new(e),
        })
}

use clap::Parser;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{Result, VisionBatchError};

/// Output directory used when none is given on the command line.
pub const OUTPUT_DIR: &str = "output";

/// Column width of the key column in the printed configuration tables.
pub const DISPLAY_KEY_WIDTH: usize = 45;

/// Number of leading access key characters shown in clear text.
pub const VISIBLE_KEY_CHARS: usize = 5;

pub const KEY_ENDPOINT: &str = "CUSTOM_VISION_ENDPOINT";
pub const KEY_PROJECT_ID: &str = "CUSTOM_VISION_PROJECT_ID";
pub const KEY_ACCESS_KEY: &str = "CUSTOM_VISION_KEY";
pub const KEY_PUBLISHED_NAME: &str = "CUSTOM_VISION_PUBLISHED_ITERATION_NAME";
// The misspelling is part of the parameter file format.
pub const KEY_THRESHOLD: &str = "PROBABILIY_THRESHOLD";
pub const KEY_SOURCE_FOLDER: &str = "SOURCE_FOLDER";
pub const KEY_LABEL_FONT: &str = "LABEL_FONT_PATH";

/// Keys every parameter file must define, checked in this order.
pub const REQUIRED_KEYS: [&str; 6] = [
    KEY_ENDPOINT,
    KEY_PROJECT_ID,
    KEY_ACCESS_KEY,
    KEY_PUBLISHED_NAME,
    KEY_THRESHOLD,
    KEY_SOURCE_FOLDER,
];

#[derive(Parser, Clone, Debug)]
#[command(version, about = "Custom Vision - Batch Inference", long_about = None)]
pub struct Cli {
    /// The parameter input file to load the credentials and values for
    #[arg(long, alias = "parameter_file")]
    pub parameter_file: PathBuf,

    /// Directory annotated images are written to
    #[arg(short, long, default_value = OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Mirror the source folder's subdirectories instead of flattening to base names
    #[arg(long, default_value_t = false)]
    pub preserve_structure: bool,
}

impl Cli {
    /// Rows for the "CONFIG VALUES" table, sorted by name.
    pub fn display_rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("output_dir", self.output_dir.display().to_string()),
            ("parameter_file", self.parameter_file.display().to_string()),
            ("preserve_structure", self.preserve_structure.to_string()),
        ]
    }
}

/// Settings loaded from the parameter file. Read-only once loaded.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct AppConfig {
    #[serde(rename = "CUSTOM_VISION_ENDPOINT")]
    pub endpoint: String,

    #[serde(rename = "CUSTOM_VISION_PROJECT_ID")]
    pub project_id: String,

    #[serde(rename = "CUSTOM_VISION_KEY")]
    pub access_key: String,

    #[serde(rename = "CUSTOM_VISION_PUBLISHED_ITERATION_NAME")]
    pub published_name: String,

    #[serde(rename = "PROBABILIY_THRESHOLD")]
    pub probability_threshold: f64,

    #[serde(rename = "SOURCE_FOLDER")]
    pub source_folder: PathBuf,

    #[serde(rename = "LABEL_FONT_PATH", default)]
    pub label_font_path: Option<PathBuf>,
}

impl AppConfig {
    /// Loads and validates a JSON parameter file.
    ///
    /// Fails on the first missing required key, on any value of the wrong type,
    /// on a threshold outside `0.0..=1.0` and on a source folder that is not an
    /// existing directory.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(VisionBatchError::Configuration {
                message: format!(
                    "Parameter file '{}' doesn't exist.  Please check your path",
                    path.display()
                ),
            });
        }

        let contents = fs::read_to_string(path).map_err(|e| VisionBatchError::FileSystem {
            path: path.to_path_buf(),
            operation: "パラメータファイル読み込み".to_string(),
            source: e,
        })?;

        Self::from_json_str(&contents, path)
    }

    /// Decodes parameter file contents. `origin` only appears in error messages.
    pub fn from_json_str(contents: &str, origin: &Path) -> Result<Self> {
        let parameters: Map<String, Value> =
            serde_json::from_str(contents).map_err(|e| VisionBatchError::Configuration {
                message: format!(
                    "Parameter file '{}' is not a JSON object: {}",
                    origin.display(),
                    e
                ),
            })?;

        if let Some(missing) = REQUIRED_KEYS
            .iter()
            .find(|key| !parameters.contains_key(**key))
        {
            return Err(VisionBatchError::MissingParameter {
                key: missing.to_string(),
                path: origin.to_path_buf(),
            });
        }

        let config: Self = serde_json::from_value(Value::Object(parameters)).map_err(|e| {
            VisionBatchError::Configuration {
                message: format!("Parameter file '{}': {}", origin.display(), e),
            }
        })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.probability_threshold) {
            return Err(VisionBatchError::Validation {
                field: KEY_THRESHOLD.to_string(),
                reason: format!(
                    "must be between 0 and 1, got {}",
                    self.probability_threshold
                ),
            });
        }

        if !self.source_folder.is_dir() {
            return Err(VisionBatchError::SourceFolder {
                path: self.source_folder.clone(),
            });
        }

        Ok(())
    }

    pub fn redacted_key(&self) -> String {
        redact_key(&self.access_key)
    }

    /// Rows for the "PARAMETER FILE VALUES" table. The access key is redacted.
    pub fn display_rows(&self) -> Vec<(&'static str, String)> {
        let mut rows = vec![
            (KEY_ENDPOINT, self.endpoint.clone()),
            (KEY_PROJECT_ID, self.project_id.clone()),
            (KEY_SOURCE_FOLDER, self.source_folder.display().to_string()),
            (KEY_THRESHOLD, self.probability_threshold.to_string()),
            (KEY_PUBLISHED_NAME, self.published_name.clone()),
        ];
        if let Some(font) = &self.label_font_path {
            rows.push((KEY_LABEL_FONT, font.display().to_string()));
        }
        rows.push((KEY_ACCESS_KEY, self.redacted_key()));
        rows
    }
}

/// Keeps the first five characters and replaces each remaining one with `*`.
pub fn redact_key(key: &str) -> String {
    let hidden = key.chars().count().saturating_sub(VISIBLE_KEY_CHARS);
    key.chars()
        .take(VISIBLE_KEY_CHARS)
        .chain(std::iter::repeat('*').take(hidden))
        .collect()
}

/// One row of a configuration table: key left-justified in a 45 column field.
pub fn format_row(key: &str, value: &str) -> String {
    format!("{:<width$}{}", key, value, width = DISPLAY_KEY_WIDTH)
}

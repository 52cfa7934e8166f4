use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{Result, VisionBatchError};
use crate::prediction::Prediction;
use crate::traits::PredictionClient;

const PREDICTION_KEY_HEADER: &str = "Prediction-Key";
const API_VERSION: &str = "v3.0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Deserialize, Debug)]
struct ImagePrediction {
    predictions: Vec<Prediction>,
}

/// Blocking client for the Custom Vision prediction REST API.
pub struct CustomVisionClient {
    client: Client,
    endpoint: String,
    prediction_key: String,
}

impl CustomVisionClient {
    pub fn new(endpoint: &str, prediction_key: &str) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            prediction_key: prediction_key.to_string(),
        })
    }

    pub fn detect_url(&self, project_id: &str, published_name: &str) -> String {
        format!(
            "{}/customvision/{}/Prediction/{}/detect/iterations/{}/image",
            self.endpoint, API_VERSION, project_id, published_name
        )
    }
}

impl PredictionClient for CustomVisionClient {
    fn detect(
        &self,
        project_id: &str,
        published_name: &str,
        image: &[u8],
    ) -> Result<Vec<Prediction>> {
        let url = self.detect_url(project_id, published_name);
        debug!(%url, bytes = image.len(), "物体検出リクエスト送信");

        let response = self
            .client
            .post(&url)
            .header(PREDICTION_KEY_HEADER, &self.prediction_key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(VisionBatchError::prediction_message(
                format!("物体検出リクエスト ({})", url),
                format!("ステータス {} を受信: {}", status, body),
            ));
        }

        let result: ImagePrediction = response.json()?;
        debug!(count = result.predictions.len(), "予測結果受信");
        Ok(result.predictions)
    }
}

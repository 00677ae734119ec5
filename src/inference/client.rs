use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response};

use super::error::InferenceError;
use super::types::{FaceTensor, ModelStatusResponse, PredictRequest, PredictResponse};

/// Anything that can report model availability and classify faces.
pub trait Predictor: Send + Sync {
    fn model_status(
        &self,
    ) -> impl Future<Output = Result<ModelStatusResponse, InferenceError>> + Send;

    fn predict(
        &self,
        instances: Vec<FaceTensor>,
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, InferenceError>> + Send;
}

pub struct InferenceClient {
    client: Client,
    base_url: String,
    model: String,
}

impl InferenceClient {
    /// Create a client for `model` served under `base_url`
    /// (e.g. `http://localhost:8501`).
    pub fn new(base_url: &str, model: &str) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn model_url(&self) -> String {
        format!("{}/v1/models/{}", self.base_url, self.model)
    }

    async fn check(response: Response) -> Result<Response, InferenceError> {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(1000);
            return Err(InferenceError::RateLimited {
                retry_after_ms: retry_after,
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(InferenceError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

impl Predictor for InferenceClient {
    async fn model_status(&self) -> Result<ModelStatusResponse, InferenceError> {
        let response = self.client.get(self.model_url()).send().await?;
        let body = Self::check(response)
            .await?
            .json::<ModelStatusResponse>()
            .await?;
        Ok(body)
    }

    async fn predict(&self, instances: Vec<FaceTensor>) -> Result<Vec<Vec<f32>>, InferenceError> {
        let req = PredictRequest { instances };
        let response = self
            .client
            .post(format!("{}:predict", self.model_url()))
            .json(&req)
            .send()
            .await?;
        let body = Self::check(response).await?.json::<PredictResponse>().await?;
        Ok(body.predictions)
    }
}

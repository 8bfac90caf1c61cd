use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::JobBackend;
use super::error::ApiError;
use super::types::{CreateOrderResponse, SubmitJobRequest, SubmitJobResponse, WireMedia};
use crate::state_machine::{JobId, JobResult, MediaRef, OrderRequest};

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// HTTP implementation of [`JobBackend`].
pub struct HttpBackend {
    api_key: String,
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Create a backend pointing at a custom base URL (useful for testing).
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            api_key,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        if self.api_key.is_empty() {
            req
        } else {
            req.bearer_auth(&self.api_key)
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

impl JobBackend for HttpBackend {
    async fn submit_job(&self, garment: &MediaRef, photo: &MediaRef) -> Result<JobId, ApiError> {
        let body = SubmitJobRequest {
            garment: WireMedia::from(garment),
            photo: WireMedia::from(photo),
        };
        let response = self
            .authorize(self.client.post(format!("{}/jobs", self.base_url)))
            .json(&body)
            .send()
            .await?;
        let parsed: SubmitJobResponse = Self::decode(response).await?;
        debug!(job_id = %parsed.job_id, "job submitted");
        Ok(parsed.job_id)
    }

    async fn query_job_status(&self, job_id: &JobId) -> Result<JobResult, ApiError> {
        let response = self
            .authorize(
                self.client
                    .get(format!("{}/jobs/{}", self.base_url, job_id.as_str())),
            )
            .send()
            .await?;
        let result: JobResult = Self::decode(response).await?;
        if result.job_id != *job_id {
            return Err(ApiError::Decode(format!(
                "asked for job {job_id}, got {}",
                result.job_id
            )));
        }
        Ok(result)
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<String, ApiError> {
        let response = self
            .authorize(self.client.post(format!("{}/orders", self.base_url)))
            .json(request)
            .send()
            .await?;
        let parsed: CreateOrderResponse = Self::decode(response).await?;
        Ok(parsed.order_id)
    }
}

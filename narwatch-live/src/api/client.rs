//! Detection backend HTTP client

use async_trait::async_trait;
use narwatch_common::config::DashboardConfig;
use narwatch_common::intake::{SharingPackage, SharingRequest};
use narwatch_common::{CaseRecord, IntakePayload};
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::ApiError;

const USER_AGENT: &str = concat!("narwatch/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Case reads and writes the engine needs from the backend
///
/// [`ApiClient`] is the production implementation; tests substitute
/// in-memory backends.
#[async_trait]
pub trait CaseBackend: Send + Sync {
    /// `POST /api/v1/intake`
    async fn submit_intake(&self, payload: &IntakePayload) -> Result<CaseRecord, ApiError>;

    /// `GET /api/v1/cases/{intake_id}`
    async fn fetch_case(&self, case_id: &str) -> Result<CaseRecord, ApiError>;
}

/// HTTP client bound to one backend base address
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    stream_http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client for `base_url`
    ///
    /// `request_timeout` bounds ordinary requests. The event stream uses a
    /// separate client with only a connect timeout, since it stays open
    /// indefinitely.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::Network(format!("Invalid base URL {:?}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Network(format!("Invalid base URL {:?}", base_url.as_str())));
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;
        let stream_http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            stream_http,
            base_url,
        })
    }

    pub fn from_config(config: &DashboardConfig) -> Result<Self, ApiError> {
        Self::new(&config.api_base_url, config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Live event stream address
    pub fn stream_url(&self) -> Url {
        self.endpoint(&["api", "v1", "events", "stream"])
    }

    pub(crate) fn stream_http(&self) -> &reqwest::Client {
        &self.stream_http
    }

    /// Join path segments onto the base address, percent-encoding each one
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Request a signed sharing package for one case
    pub async fn request_sharing_package(
        &self,
        request: &SharingRequest,
    ) -> Result<SharingPackage, ApiError> {
        let url = self.endpoint(&["api", "v1", "share"]);
        debug!(intake_id = %request.intake_id, destination = %request.destination, "Requesting sharing package");

        let response = self.http.post(url).json(request).send().await?;
        let package: SharingPackage = read_json(response).await?;

        info!(
            intake_id = %request.intake_id,
            package_id = %package.package_id,
            "Received sharing package"
        );
        Ok(package)
    }
}

#[async_trait]
impl CaseBackend for ApiClient {
    async fn submit_intake(&self, payload: &IntakePayload) -> Result<CaseRecord, ApiError> {
        let url = self.endpoint(&["api", "v1", "intake"]);
        debug!(url = %url, chars = payload.text.chars().count(), "Submitting narrative");

        let response = self.http.post(url).json(payload).send().await?;
        let record: CaseRecord = read_json(response).await?;
        if !record.has_id() {
            return Err(ApiError::MissingCaseId);
        }

        info!(intake_id = %record.case_id, "Narrative accepted");
        Ok(record)
    }

    async fn fetch_case(&self, case_id: &str) -> Result<CaseRecord, ApiError> {
        let url = self.endpoint(&["api", "v1", "cases", case_id]);
        debug!(intake_id = %case_id, url = %url, "Fetching case");

        let response = self.http.get(url).send().await?;
        let record: CaseRecord = read_json(response).await?;
        if !record.has_id() {
            return Err(ApiError::MissingCaseId);
        }
        if record.case_id != case_id {
            warn!(
                requested = %case_id,
                returned = %record.case_id,
                "Case detail returned a different intake_id"
            );
        }

        Ok(record)
    }
}

/// Decode a JSON body, turning non-2xx responses into [`ApiError::Status`]
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::Parse(e.to_string()))
}

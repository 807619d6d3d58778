// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build-management API client.
//!
//! Two calls matter to the worker: opening an upload session for an
//! artifact, and registering the uploaded object once it is in the bucket.

use async_trait::async_trait;
use fh_core::{BuildId, SignedUrl};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from build-management API calls
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("build-management API URL is not configured")]
    MissingApiUrl,

    #[error("access token is not configured")]
    MissingAccessToken,

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSessionRequest {
    pub filename: String,
    pub name: String,
    pub size: u64,
}

/// Server-issued upload target for one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub bucket_key: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub storage_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl UploadSession {
    pub fn signed_url(&self) -> SignedUrl {
        SignedUrl { url: self.url.clone(), headers: self.headers.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSource {
    pub bucket_key: String,
    #[serde(rename = "type")]
    pub storage_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveArtifactRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub source: ArtifactSource,
    /// Dispatch metadata the artifact is registered with
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl SaveArtifactRequest {
    pub fn for_session(kind: impl Into<String>, session: &UploadSession) -> Self {
        Self {
            kind: kind.into(),
            source: ArtifactSource {
                bucket_key: session.bucket_key.clone(),
                storage_type: session.storage_type.clone(),
            },
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Responses are wrapped in a `data` envelope.
#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Adapter for the build-management API
#[async_trait]
pub trait BuildApi: Clone + Send + Sync + 'static {
    async fn create_upload_session(&self, req: UploadSessionRequest) -> Result<UploadSession, ApiError>;

    async fn save_artifact(&self, req: SaveArtifactRequest) -> Result<(), ApiError>;
}

/// HTTP client for the build-management API, authenticated with a bearer
/// token scoped to one build.
#[derive(Clone)]
pub struct HttpBuildApi {
    client: reqwest::Client,
    base_url: Option<String>,
    access_token: Option<String>,
    build_id: BuildId,
}

impl HttpBuildApi {
    pub fn new(base_url: Option<String>, access_token: Option<String>, build_id: BuildId) -> Self {
        Self { client: reqwest::Client::new(), base_url, access_token, build_id }
    }

    /// Resolve the endpoint and token, failing before any network call when
    /// either is missing.
    fn endpoint(&self, path: &str) -> Result<(String, &str), ApiError> {
        let base = self.base_url.as_deref().ok_or(ApiError::MissingApiUrl)?;
        let token = self.access_token.as_deref().ok_or(ApiError::MissingAccessToken)?;
        let url = format!("{}/v2/builds/{}/{}/", base.trim_end_matches('/'), self.build_id, path);
        Ok((url, token))
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> Result<reqwest::Response, ApiError> {
        let (url, token) = self.endpoint(path)?;
        tracing::debug!(%url, "build API request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|source| ApiError::Request { url: url.clone(), source })?;

        if !response.status().is_success() {
            return Err(ApiError::Status { url, status: response.status().as_u16() });
        }
        Ok(response)
    }
}

#[async_trait]
impl BuildApi for HttpBuildApi {
    async fn create_upload_session(&self, req: UploadSessionRequest) -> Result<UploadSession, ApiError> {
        let response = self.post("upload-sessions", &req).await?;
        let url = response.url().to_string();
        let envelope: Envelope<UploadSession> =
            response.json().await.map_err(|source| ApiError::Request { url, source })?;
        Ok(envelope.data)
    }

    async fn save_artifact(&self, req: SaveArtifactRequest) -> Result<(), ApiError> {
        self.post("artifacts", &req).await?;
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{ApiError, BuildApi, SaveArtifactRequest, UploadSession, UploadSessionRequest};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Recorded API call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ApiCall {
        CreateUploadSession(UploadSessionRequest),
        SaveArtifact(SaveArtifactRequest),
    }

    #[derive(Default)]
    struct FakeApiState {
        calls: Vec<ApiCall>,
        fail_sessions: bool,
        fail_save: bool,
    }

    /// Fake build-management API.
    ///
    /// Sessions point at `https://storage.test/<filename>` with bucket key
    /// `bucket/<filename>`.
    #[derive(Clone, Default)]
    pub struct FakeBuildApi {
        inner: Arc<Mutex<FakeApiState>>,
    }

    impl FakeBuildApi {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every `create_upload_session` call fail
        pub fn fail_sessions(&self) {
            self.inner.lock().fail_sessions = true;
        }

        /// Make every `save_artifact` call fail
        pub fn fail_save(&self) {
            self.inner.lock().fail_save = true;
        }

        pub fn calls(&self) -> Vec<ApiCall> {
            self.inner.lock().calls.clone()
        }

        pub fn saved(&self) -> Vec<SaveArtifactRequest> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    ApiCall::SaveArtifact(req) => Some(req),
                    ApiCall::CreateUploadSession(_) => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl BuildApi for FakeBuildApi {
        async fn create_upload_session(&self, req: UploadSessionRequest) -> Result<UploadSession, ApiError> {
            let mut inner = self.inner.lock();
            inner.calls.push(ApiCall::CreateUploadSession(req.clone()));
            if inner.fail_sessions {
                return Err(ApiError::Status { url: "https://api.test/upload-sessions/".into(), status: 503 });
            }
            Ok(UploadSession {
                bucket_key: format!("bucket/{}", req.filename),
                url: format!("https://storage.test/{}", req.filename),
                headers: Default::default(),
                storage_type: "GCS".into(),
                id: None,
            })
        }

        async fn save_artifact(&self, req: SaveArtifactRequest) -> Result<(), ApiError> {
            let mut inner = self.inner.lock();
            inner.calls.push(ApiCall::SaveArtifact(req));
            if inner.fail_save {
                return Err(ApiError::Status { url: "https://api.test/artifacts/".into(), status: 500 });
            }
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{ApiCall, FakeBuildApi};

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;

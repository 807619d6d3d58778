// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Object transfer over pre-signed URLs.

use async_trait::async_trait;
use fh_core::SignedUrl;
use futures_util::StreamExt;
use std::path::Path;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Errors from signed-URL transfers
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("file I/O on {path} failed: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// Adapter for moving bytes to and from object storage
#[async_trait]
pub trait ObjectTransport: Clone + Send + Sync + 'static {
    /// Stream a local file to the signed URL with HTTP PUT.
    async fn put_file(&self, target: &SignedUrl, path: &Path) -> Result<(), TransportError>;

    /// Download an object with HTTP GET into `dest`, returning its size.
    ///
    /// The body is streamed to disk; `dest` is only created once the
    /// server has answered with a success status.
    async fn get_to_file(&self, url: &str, dest: &Path) -> Result<u64, TransportError>;
}

#[derive(Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectTransport for HttpTransport {
    async fn put_file(&self, target: &SignedUrl, path: &Path) -> Result<(), TransportError> {
        let io_err = |source| TransportError::Io { path: path.display().to_string(), source };
        let file = tokio::fs::File::open(path).await.map_err(io_err)?;
        let size = file.metadata().await.map_err(io_err)?.len();

        tracing::info!(url = %target.url, path = %path.display(), size, "uploading file");

        let mut request = self.client.put(&target.url).header(reqwest::header::CONTENT_LENGTH, size);
        for (name, value) in &target.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request
            .body(reqwest::Body::from(file))
            .send()
            .await
            .map_err(|source| TransportError::Request { url: target.url.clone(), source })?;

        if !response.status().is_success() {
            return Err(TransportError::Status { url: target.url.clone(), status: response.status().as_u16() });
        }
        Ok(())
    }

    async fn get_to_file(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
        let request_err = |source| TransportError::Request { url: url.to_string(), source };
        let io_err = |source| TransportError::Io { path: dest.display().to_string(), source };
        let response = self.client.get(url).send().await.map_err(request_err)?;
        if !response.status().is_success() {
            return Err(TransportError::Status { url: url.to_string(), status: response.status().as_u16() });
        }

        let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
        let mut body = response.bytes_stream();
        let mut size = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(request_err)?;
            file.write_all(&chunk).await.map_err(io_err)?;
            size += chunk.len() as u64;
        }
        file.flush().await.map_err(io_err)?;

        tracing::debug!(%url, dest = %dest.display(), size, "downloaded object");
        Ok(size)
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{ObjectTransport, TransportError};
    use async_trait::async_trait;
    use fh_core::SignedUrl;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    /// Recorded PUT, with the bytes that were read from disk at call time
    #[derive(Debug, Clone)]
    pub struct PutCall {
        pub url: String,
        pub path: PathBuf,
        pub bytes: Vec<u8>,
    }

    #[derive(Default)]
    struct FakeTransportState {
        puts: Vec<PutCall>,
        gets: Vec<String>,
        objects: HashMap<String, Vec<u8>>,
        failing_prefixes: Vec<String>,
    }

    /// Fake object store keyed by URL.
    #[derive(Clone, Default)]
    pub struct FakeTransport {
        inner: Arc<Mutex<FakeTransportState>>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Serve `bytes` for GET requests to `url`
        pub fn set_object(&self, url: &str, bytes: Vec<u8>) {
            self.inner.lock().objects.insert(url.to_string(), bytes);
        }

        /// Fail every request whose URL starts with `prefix`
        pub fn fail_urls(&self, prefix: &str) {
            self.inner.lock().failing_prefixes.push(prefix.to_string());
        }

        pub fn puts(&self) -> Vec<PutCall> {
            self.inner.lock().puts.clone()
        }

        pub fn gets(&self) -> Vec<String> {
            self.inner.lock().gets.clone()
        }

        pub fn call_count(&self) -> usize {
            let inner = self.inner.lock();
            inner.puts.len() + inner.gets.len()
        }

        fn check(&self, url: &str) -> Result<(), TransportError> {
            let failing = self.inner.lock().failing_prefixes.iter().any(|p| url.starts_with(p.as_str()));
            if failing {
                return Err(TransportError::Status { url: url.to_string(), status: 403 });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ObjectTransport for FakeTransport {
        async fn put_file(&self, target: &SignedUrl, path: &Path) -> Result<(), TransportError> {
            let bytes = std::fs::read(path)
                .map_err(|source| TransportError::Io { path: path.display().to_string(), source })?;
            {
                let mut inner = self.inner.lock();
                inner.puts.push(PutCall { url: target.url.clone(), path: path.to_path_buf(), bytes: bytes.clone() });
            }
            self.check(&target.url)?;
            self.inner.lock().objects.insert(target.url.clone(), bytes);
            Ok(())
        }

        async fn get_to_file(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
            self.inner.lock().gets.push(url.to_string());
            self.check(url)?;
            let bytes = self
                .inner
                .lock()
                .objects
                .get(url)
                .cloned()
                .ok_or_else(|| TransportError::Status { url: url.to_string(), status: 404 })?;
            std::fs::write(dest, &bytes)
                .map_err(|source| TransportError::Io { path: dest.display().to_string(), source })?;
            Ok(bytes.len() as u64)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeTransport, PutCall};

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;

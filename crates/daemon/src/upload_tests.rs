// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fh_adapters::{ApiCall, FakeBuildApi, FakeTransport};
use tempfile::TempDir;

struct Fixture {
    api: FakeBuildApi,
    transport: FakeTransport,
    src: TempDir,
    staging: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            api: FakeBuildApi::new(),
            transport: FakeTransport::new(),
            src: TempDir::new().unwrap(),
            staging: TempDir::new().unwrap(),
        }
    }

    fn uploader(&self) -> ArtifactUploader<FakeBuildApi, FakeTransport> {
        ArtifactUploader::new(self.api.clone(), self.transport.clone(), self.staging.path().to_path_buf())
    }

    fn file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.src.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }
}

const NO_METADATA: serde_json::Value = serde_json::Value::Null;

fn fallback_for(kind: ArtifactKind) -> BTreeMap<ArtifactKind, SignedUrl> {
    BTreeMap::from([(kind, SignedUrl::new("https://fallback.test/app"))])
}

#[tokio::test]
async fn managed_upload_returns_bucket_key() {
    let fx = Fixture::new();
    let apk = fx.file("app.apk", "apk");

    let metadata = serde_json::json!({"projectId": "p-1"});
    let reference = fx.uploader().upload(&ArtifactKind::ApplicationArchive, &[apk], &metadata).await.unwrap();

    assert_eq!(reference, "bucket/app.apk");
    let puts = fx.transport.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].url, "https://storage.test/app.apk");
    assert_eq!(puts[0].bytes, b"apk");

    let saved = fx.api.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].kind, "application-archive");
    assert_eq!(saved[0].source.bucket_key, "bucket/app.apk");
    assert_eq!(saved[0].metadata, metadata);
}

#[tokio::test]
async fn session_request_carries_name_and_size() {
    let fx = Fixture::new();
    let apk = fx.file("app.aab", "12345");

    fx.uploader().upload(&ArtifactKind::ApplicationArchive, &[apk], &NO_METADATA).await.unwrap();

    let calls = fx.api.calls();
    let ApiCall::CreateUploadSession(req) = &calls[0] else {
        panic!("expected upload session request");
    };
    assert_eq!(req.filename, "app.aab");
    assert_eq!(req.name, "application-archive");
    assert_eq!(req.size, 5);
}

#[tokio::test]
async fn session_failure_uses_fallback_exactly_once() {
    let fx = Fixture::new();
    fx.api.fail_sessions();
    let apk = fx.file("app.apk", "apk");

    let reference = fx
        .uploader()
        .with_fallback_urls(fallback_for(ArtifactKind::ApplicationArchive))
        .upload(&ArtifactKind::ApplicationArchive, &[apk], &NO_METADATA)
        .await
        .unwrap();

    assert_eq!(reference, "app.apk");
    let puts = fx.transport.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].url, "https://fallback.test/app");
}

#[tokio::test]
async fn session_failure_without_fallback_propagates_original_error() {
    let fx = Fixture::new();
    fx.api.fail_sessions();
    let apk = fx.file("app.apk", "apk");

    let err = fx.uploader().upload(&ArtifactKind::ApplicationArchive, &[apk], &NO_METADATA).await.unwrap_err();

    assert!(matches!(err, UploadError::Api(ApiError::Status { status: 503, .. })), "{err}");
    assert!(fx.transport.puts().is_empty());
}

#[tokio::test]
async fn fallback_for_other_kind_is_not_used() {
    let fx = Fixture::new();
    fx.api.fail_sessions();
    let log = fx.file("gradle.log", "log");

    let result = fx
        .uploader()
        .with_fallback_urls(fallback_for(ArtifactKind::ApplicationArchive))
        .upload(&ArtifactKind::BuildLogs, &[log], &NO_METADATA)
        .await;

    assert!(matches!(result, Err(UploadError::Api(_))));
    assert!(fx.transport.puts().is_empty());
}

#[yare::parameterized(
    signed_put_fails = { false },
    save_fails       = { true },
)]
#[test_macro(tokio::test)]
async fn any_tier_one_failure_triggers_fallback(fail_save: bool) {
    let fx = Fixture::new();
    if fail_save {
        fx.api.fail_save();
    } else {
        fx.transport.fail_urls("https://storage.test/");
    }
    let apk = fx.file("app.apk", "apk");

    let reference = fx
        .uploader()
        .with_fallback_urls(fallback_for(ArtifactKind::ApplicationArchive))
        .upload(&ArtifactKind::ApplicationArchive, &[apk], &NO_METADATA)
        .await
        .unwrap();

    assert_eq!(reference, "app.apk");
    let puts = fx.transport.puts();
    assert_eq!(puts.len(), 2, "one managed attempt, one fallback");
    assert_eq!(puts[1].url, "https://fallback.test/app");
}

#[tokio::test]
async fn failed_fallback_reports_both_errors() {
    let fx = Fixture::new();
    fx.api.fail_sessions();
    fx.transport.fail_urls("https://fallback.test/");
    let apk = fx.file("app.apk", "apk");

    let err = fx
        .uploader()
        .with_fallback_urls(fallback_for(ArtifactKind::ApplicationArchive))
        .upload(&ArtifactKind::ApplicationArchive, &[apk], &NO_METADATA)
        .await
        .unwrap_err();

    let UploadError::Fallback { primary, .. } = &err else {
        panic!("expected fallback error, got {err}");
    };
    assert!(matches!(**primary, UploadError::Api(_)));
    assert_eq!(fx.transport.puts().len(), 1);
}

#[tokio::test]
async fn archive_failure_is_fatal_without_api_calls() {
    let fx = Fixture::new();

    let err = fx
        .uploader()
        .with_fallback_urls(fallback_for(ArtifactKind::BuildArtifacts))
        .upload(
            &ArtifactKind::BuildArtifacts,
            &[PathBuf::from("/nonexistent/a"), PathBuf::from("/nonexistent/b")],
            &NO_METADATA,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Archive(_)), "{err}");
    assert!(fx.api.calls().is_empty());
    assert_eq!(fx.transport.call_count(), 0);
}

#[tokio::test]
async fn staged_archive_is_removed_after_upload() {
    let fx = Fixture::new();
    let a = fx.file("a.xml", "a");
    let b = fx.file("b.xml", "b");

    let reference = fx.uploader().upload(&ArtifactKind::BuildArtifacts, &[a, b], &NO_METADATA).await.unwrap();

    assert_eq!(reference, "bucket/build-artifacts.tar.gz");
    assert!(!fx.staging.path().join("build-artifacts.tar.gz").exists());
}

#[tokio::test]
async fn fallback_attempts_can_be_disabled() {
    let fx = Fixture::new();
    fx.api.fail_sessions();
    let apk = fx.file("app.apk", "apk");

    let err = fx
        .uploader()
        .with_fallback_urls(fallback_for(ArtifactKind::ApplicationArchive))
        .with_fallback_attempts(0)
        .upload(&ArtifactKind::ApplicationArchive, &[apk], &NO_METADATA)
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Api(_)));
    assert!(fx.transport.puts().is_empty());
}

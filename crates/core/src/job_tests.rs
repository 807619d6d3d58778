// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn minimal_job_uses_defaults() {
    let job: Job = serde_json::from_str(r#"{"platform":"android"}"#).unwrap();
    assert_eq!(job.platform, Platform::Android);
    assert_eq!(job.mode, JobMode::Build);
    assert_eq!(job.cache, CacheConfig::default());
    assert!(job.extra.is_empty());
}

#[test]
fn unknown_fields_are_carried_opaquely() {
    let json = r#"{
        "platform": "ios",
        "mode": "custom",
        "secrets": {"token": "s3cr3t"},
        "buildProfile": "production"
    }"#;
    let job: Job = serde_json::from_str(json).unwrap();
    assert_eq!(job.mode, JobMode::Custom);
    assert_eq!(job.extra.get("buildProfile"), Some(&serde_json::json!("production")));

    let back = serde_json::to_value(&job).unwrap();
    assert_eq!(back["secrets"]["token"], "s3cr3t");
}

#[test]
fn cache_config_reads_camel_case() {
    let json = r#"{
        "platform": "android",
        "cache": {
            "paths": ["~/.gradle/caches"],
            "downloadUrl": "https://storage.test/cache.tar.gz",
            "uploadUrl": {"url": "https://storage.test/put", "headers": {"x-goog-content-length-range": "0,100"}}
        }
    }"#;
    let job: Job = serde_json::from_str(json).unwrap();
    assert!(!job.cache.disabled);
    assert_eq!(job.cache.paths, vec!["~/.gradle/caches".to_string()]);
    assert_eq!(job.cache.download_url.as_deref(), Some("https://storage.test/cache.tar.gz"));
    assert_eq!(job.cache.upload_url.unwrap().content_length_range(), Some(0..=100));
}

#[yare::parameterized(
    build  = { JobMode::Build, true },
    resign = { JobMode::Resign, true },
    custom = { JobMode::Custom, false },
    repack = { JobMode::Repack, false },
)]
fn standard_job_modes(mode: JobMode, standard: bool) {
    assert_eq!(mode.is_standard(), standard);
}

#[test]
fn build_request_carries_dispatch_context() {
    let request = BuildRequest::new(Job::new(Platform::Android))
        .with_initiating_user("user-7")
        .with_metadata(serde_json::json!({"projectId": "p-1"}));

    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["job"]["platform"], "android");
    assert_eq!(json["initiatingUserId"], "user-7");
    assert_eq!(json["metadata"]["projectId"], "p-1");
}

#[test]
fn build_request_without_metadata_omits_it() {
    let json = serde_json::to_value(BuildRequest::new(Job::new(Platform::Ios))).unwrap();
    assert!(json.get("metadata").is_none());
    assert!(json.get("initiatingUserId").is_none());
}

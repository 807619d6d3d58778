// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve a single canned HTTP response on loopback and return its URL.
async fn serve_once(status_line: &'static str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let head = format!("HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n", body.len());
        stream.write_all(head.as_bytes()).await.unwrap();
        // Several writes so the client sees more than one chunk
        for chunk in body.chunks(4096) {
            stream.write_all(chunk).await.unwrap();
            stream.flush().await.unwrap();
        }
    });
    format!("http://{addr}/cache/download")
}

#[tokio::test]
async fn http_put_reports_missing_file_as_io_error() {
    let transport = HttpTransport::new();
    let target = SignedUrl::new("http://127.0.0.1:9/never");
    let err = transport.put_file(&target, Path::new("/nonexistent/app.apk")).await.unwrap_err();
    assert!(matches!(err, TransportError::Io { .. }), "{err}");
}

#[tokio::test]
async fn fake_stores_put_objects_for_later_get() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("cache.tar.gz");
    std::fs::write(&file, b"payload").unwrap();

    let transport = FakeTransport::new();
    transport.put_file(&SignedUrl::new("https://storage.test/c"), &file).await.unwrap();

    let dest = dir.path().join("downloaded");
    assert_eq!(transport.get_to_file("https://storage.test/c", &dest).await.unwrap(), 7);
    assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    assert_eq!(transport.puts()[0].bytes, b"payload");
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn fake_fails_matching_prefix_but_records_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("a");
    std::fs::write(&file, b"x").unwrap();

    let transport = FakeTransport::new();
    transport.fail_urls("https://storage.test/");
    let result = transport.put_file(&SignedUrl::new("https://storage.test/a"), &file).await;

    assert!(matches!(result, Err(TransportError::Status { status: 403, .. })));
    assert_eq!(transport.puts().len(), 1);
}

#[tokio::test]
async fn fake_get_of_unknown_object_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("missing");
    let transport = FakeTransport::new();
    let err = transport.get_to_file("https://storage.test/missing", &dest).await.unwrap_err();
    assert!(matches!(err, TransportError::Status { status: 404, .. }));
    assert!(!dest.exists());
}

#[tokio::test]
async fn http_get_streams_body_to_file() {
    let body: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
    let url = serve_once("200 OK", body.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("cache-download.tar.gz");

    let size = HttpTransport::new().get_to_file(&url, &dest).await.unwrap();

    assert_eq!(size, body.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
}

#[tokio::test]
async fn http_get_error_status_leaves_no_file() {
    let url = serve_once("404 Not Found", b"no such key".to_vec()).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("cache-download.tar.gz");

    let err = HttpTransport::new().get_to_file(&url, &dest).await.unwrap_err();

    assert!(matches!(err, TransportError::Status { status: 404, .. }), "{err}");
    assert!(!dest.exists());
}

//! Tab captures routed through the frame coordinator

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Fixture, MockClient};
use kodegen_tools_pagecapture::capture::{CaptureError, FrameCoordinator, TabId};
use kodegen_tools_pagecapture::config::CaptureOptions;
use kodegen_tools_pagecapture::dom::{FrameContent, SourceDocument};
use tokio::task::LocalSet;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

#[tokio::test]
async fn test_tab_capture_reaches_child_frame() {
    let fixture = Fixture::new(MockClient::new().route("http://other.example/b.png", "image/png", PNG));
    let capturer = fixture.capturer.clone();

    LocalSet::new()
        .run_until(async move {
            let tab = TabId(3);
            let child = capturer.attach_frame(
                tab,
                SourceDocument::parse_html("http://other.example/frame.html", "<body><img src=\"b.png\"></body>"),
                false,
            );
            let main = SourceDocument::parse_html(
                "http://example.com/",
                "<body><iframe src=\"http://other.example/frame.html\"></iframe></body>",
            )
            .with_frame(0, FrameContent::Remote { instance: Some(child.instance()) });
            let _main = capturer.attach_frame(tab, main, true);

            let saved = capturer
                .capture_tab(tab, Arc::new(CaptureOptions::default()))
                .await
                .expect("tab captured");
            assert_eq!(saved.filename, "index.html");

            let index = fixture
                .sink
                .text(&format!("{}/index.html", saved.target_dir))
                .expect("main document stored");
            assert!(index.contains("<iframe src=\"index_1.html\"></iframe>"), "{index}");

            let frame = fixture
                .sink
                .text(&format!("{}/index_1.html", saved.target_dir))
                .expect("frame document stored");
            assert!(frame.contains("<img src=\"b.png\">"), "{frame}");
            assert!(capturer.sessions().list_active().is_empty());
        })
        .await;
}

#[tokio::test]
async fn test_navigated_frame_is_marked_unavailable() {
    let fixture = Fixture::new(MockClient::new());
    let capturer = fixture.capturer.clone();

    LocalSet::new()
        .run_until(async move {
            let tab = TabId(4);
            let child = capturer.attach_frame(
                tab,
                SourceDocument::parse_html("http://other.example/frame.html", "<body></body>"),
                false,
            );
            child.set_url("http://other.example/moved.html");

            let main = SourceDocument::parse_html(
                "http://example.com/",
                "<body><iframe src=\"http://other.example/frame.html\"></iframe></body>",
            )
            .with_frame(0, FrameContent::Remote { instance: Some(child.instance()) });
            let _main = capturer.attach_frame(tab, main, true);

            let options = CaptureOptions::builder()
                .record_error_uri(true)
                .build()
                .expect("valid options");
            let saved = capturer
                .capture_tab(tab, Arc::new(options))
                .await
                .expect("main capture survives a missing frame");

            let index = fixture
                .sink
                .text(&format!("{}/index.html", saved.target_dir))
                .expect("main document stored");
            assert!(
                index.contains("src=\"urn:scrapbook:download:error:http://other.example/frame.html\""),
                "{index}"
            );
        })
        .await;
}

#[tokio::test]
async fn test_tab_without_main_frame_fails_fast() {
    let fixture = Fixture::new(MockClient::new());
    let capturer = fixture
        .capturer
        .clone()
        .with_frames(FrameCoordinator::new(Duration::from_secs(1)));

    let result = capturer
        .capture_tab(TabId(9), Arc::new(CaptureOptions::default()))
        .await;
    assert!(matches!(result, Err(CaptureError::FrameUnavailable(_))));
    assert!(capturer.sessions().list_active().is_empty());
}

#[tokio::test]
async fn test_detached_frame_unregisters() {
    let fixture = Fixture::new(MockClient::new());
    let capturer = fixture.capturer.clone();

    LocalSet::new()
        .run_until(async move {
            let handle = capturer.attach_frame(
                TabId(5),
                SourceDocument::parse_html("http://example.com/", "<body></body>"),
                true,
            );
            assert_eq!(capturer.frames().len(), 1);
            drop(handle);
            assert!(capturer.frames().is_empty());
        })
        .await;
}

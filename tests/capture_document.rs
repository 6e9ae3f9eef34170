//! Document capture against an in-memory network and archive

mod common;

use std::sync::Arc;

use common::{Fixture, MockClient, PAGE_URL, SESSION_KEY, main_settings};
use kodegen_tools_pagecapture::capture::CaptureError;
use kodegen_tools_pagecapture::config::{CaptureOptions, Policy, ResourceCategory};
use kodegen_tools_pagecapture::dom::{Boundary, FrameContent, Range, ReadyState, Selection, SourceDocument};
use kuchiki::NodeRef;
use kuchiki::traits::TendrilSink;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

fn options() -> Arc<CaptureOptions> {
    Arc::new(CaptureOptions::default())
}

fn with_policy(category: ResourceCategory, policy: Policy) -> Arc<CaptureOptions> {
    Arc::new(
        CaptureOptions::builder()
            .policy(category, policy)
            .build()
            .expect("valid options"),
    )
}

fn page(html: &str) -> SourceDocument {
    SourceDocument::parse_html(PAGE_URL, html)
}

async fn capture(fixture: &Fixture, source: &SourceDocument, options: Arc<CaptureOptions>) -> String {
    let saved = fixture
        .capturer
        .capture_document(source, main_settings(), options)
        .await
        .expect("capture succeeds");
    assert_eq!(saved.filename, "index.html");
    fixture.member("index.html").expect("main document stored")
}

#[tokio::test]
async fn test_single_image_is_localized() {
    let fixture = Fixture::new(MockClient::new().route("http://example.com/dir/a.png", "image/png", PNG));
    let html = capture(&fixture, &page("<html><head></head><body><img src=\"a.png\"></body></html>"), options()).await;

    assert!(html.contains("<img src=\"a.png\">"), "{html}");
    assert!(html.contains("<meta charset=\"UTF-8\">"));
    assert_eq!(fixture.client.requests(), vec!["http://example.com/dir/a.png".to_string()]);
    assert_eq!(fixture.member_bytes("a.png"), Some(PNG.to_vec()));
}

#[tokio::test]
async fn test_duplicate_images_fetch_once() {
    let fixture = Fixture::new(MockClient::new().route("http://example.com/dir/a.png", "image/png", PNG));
    let html = capture(
        &fixture,
        &page("<body><img src=\"a.png\"><img src=\"http://example.com/dir/a.png\"><img src=\"a.png#top\"></body>"),
        options(),
    )
    .await;

    assert_eq!(fixture.client.request_count("http://example.com/dir/a.png"), 1);
    assert_eq!(html.matches("<img src=\"a.png\">").count(), 2, "{html}");
    assert!(html.contains("<img src=\"a.png#top\">"), "{html}");
}

#[tokio::test]
async fn test_srcset_candidates_are_localized() {
    let fixture = Fixture::new(
        MockClient::new()
            .route("http://example.com/dir/small.png", "image/png", PNG)
            .route("http://example.com/big.png", "image/png", PNG),
    );
    let html = capture(
        &fixture,
        &page("<body><img srcset=\"small.png 1x, /big.png 2x\"></body>"),
        options(),
    )
    .await;

    assert!(html.contains("srcset=\"small.png 1x, big.png 2x\""), "{html}");
    assert!(fixture.member("big.png").is_some());
}

#[tokio::test]
async fn test_blank_policy_never_fetches() {
    let fixture = Fixture::new(MockClient::new());
    let html = capture(
        &fixture,
        &page("<body><img src=\"a.png\" srcset=\"b.png 2x\"></body>"),
        with_policy(ResourceCategory::Image, Policy::Blank),
    )
    .await;

    assert!(html.contains("<img src=\"about:blank\">"), "{html}");
    assert!(fixture.client.requests().is_empty());
}

#[tokio::test]
async fn test_link_policy_keeps_absolute_reference() {
    let fixture = Fixture::new(MockClient::new());
    let html = capture(
        &fixture,
        &page("<body><img src=\"a.png\"></body>"),
        with_policy(ResourceCategory::Image, Policy::Link),
    )
    .await;

    assert!(html.contains("<img src=\"http://example.com/dir/a.png\">"), "{html}");
    assert!(fixture.client.requests().is_empty());
}

#[tokio::test]
async fn test_comment_policy_keeps_markup_in_comment() {
    let fixture = Fixture::new(MockClient::new());
    let html = capture(
        &fixture,
        &page("<head><script src=\"s.js\"></script></head><body></body>"),
        with_policy(ResourceCategory::Script, Policy::Comment),
    )
    .await;

    assert!(
        html.contains("<!--<script src=\"http://example.com/dir/s.js\"></script>-->"),
        "{html}"
    );
}

#[tokio::test]
async fn test_removed_node_leaves_audit_comment() {
    let fixture = Fixture::new(MockClient::new());
    let options = CaptureOptions::builder()
        .policy(ResourceCategory::Script, Policy::Remove)
        .record_removed_node(true)
        .build()
        .expect("valid options");
    let html = capture(
        &fixture,
        &page("<body><script>run()</script><p>kept</p></body>"),
        Arc::new(options),
    )
    .await;

    assert!(!html.contains("<script>"));
    assert!(html.contains(&format!("<!--sb-{SESSION_KEY}-orig-node--<script>run()</script>-->")), "{html}");
    assert!(html.contains("<p>kept</p>"));
}

#[tokio::test]
async fn test_failed_fetch_marks_error_uri() {
    let fixture = Fixture::new(MockClient::new().route_status("http://example.com/dir/missing.png", 404));
    let options = CaptureOptions::builder()
        .record_error_uri(true)
        .build()
        .expect("valid options");
    let html = capture(&fixture, &page("<body><img src=\"missing.png\"></body>"), Arc::new(options)).await;

    assert!(
        html.contains("src=\"urn:scrapbook:download:error:http://example.com/dir/missing.png\""),
        "{html}"
    );
}

#[tokio::test]
async fn test_css_references_are_localized() {
    let fixture = Fixture::new(
        MockClient::new()
            .route("http://example.com/dir/bg.png", "image/png", PNG)
            .route("http://example.com/dir/tile.png", "image/png", PNG)
            .route(
                "http://example.com/dir/site.css",
                "text/css",
                "p{background:url(bg.png)}",
            ),
    );
    let html = capture(
        &fixture,
        &page(
            "<head><link rel=\"stylesheet\" href=\"site.css\"><style>div{background:url(tile.png)}</style></head>\
             <body><div style=\"background:url(bg.png)\"></div></body>",
        ),
        options(),
    )
    .await;

    assert!(html.contains("href=\"site.css\""), "{html}");
    assert!(html.contains("div{background:url(\"tile.png\")}"), "{html}");
    assert!(html.contains("style=\"background:url(&quot;bg.png&quot;)\""), "{html}");
    let css = fixture.member("site.css").expect("stylesheet stored");
    assert!(css.contains("url(\"bg.png\")"), "{css}");
    // shared between the stylesheet and the style attribute
    assert_eq!(fixture.client.request_count("http://example.com/dir/bg.png"), 1);
}

#[tokio::test]
async fn test_charset_declaration_forced_once() {
    let fixture = Fixture::new(MockClient::new());
    let html = capture(
        &fixture,
        &page("<head><meta charset=\"iso-8859-1\"></head><body></body>"),
        options(),
    )
    .await;

    assert_eq!(html.matches("charset").count(), 1, "{html}");
    assert!(html.contains("<meta charset=\"UTF-8\">"));
}

#[tokio::test]
async fn test_script_attributes_and_anchors() {
    let fixture = Fixture::new(MockClient::new());
    let options = CaptureOptions::builder()
        .policy(ResourceCategory::ScriptAnchor, Policy::Blank)
        .build()
        .expect("valid options");
    let html = capture(
        &fixture,
        &page(
            "<body onload=\"init()\"><a href=\"javascript:go()\" onclick=\"x()\">go</a>\
             <a href=\"next.html\">next</a><script src=\"s.js\" integrity=\"sha384-x\"></script></body>",
        ),
        Arc::new(options),
    )
    .await;

    assert!(!html.contains("onload"), "{html}");
    assert!(!html.contains("onclick"), "{html}");
    assert!(html.contains("<a href=\"javascript:\">go</a>"), "{html}");
    assert!(html.contains("<a href=\"http://example.com/dir/next.html\">next</a>"), "{html}");
    assert!(!html.contains("integrity"), "{html}");
}

#[tokio::test]
async fn test_kept_script_attributes() {
    let fixture = Fixture::new(MockClient::new());
    let html = capture(
        &fixture,
        &page("<body onload=\"init()\"></body>"),
        with_policy(ResourceCategory::ScriptAttr, Policy::Save),
    )
    .await;
    assert!(html.contains("onload=\"init()\""), "{html}");
}

#[tokio::test]
async fn test_canvas_gets_restore_script() {
    let fixture = Fixture::new(MockClient::new());
    let source = page("<body><canvas id=\"c\"></canvas></body>")
        .with_canvas_data(0, "data:image/png;base64,AAAA");
    let html = capture(&fixture, &source, options()).await;

    assert!(html.contains("<canvas id=\"c\"></canvas><script>"), "{html}");
    assert!(html.contains("('data:image/png;base64,AAAA')</script>"), "{html}");
}

#[tokio::test]
async fn test_same_origin_frame_is_captured_as_subdocument() {
    let fixture = Fixture::new(MockClient::new().route("http://example.com/dir/b.png", "image/png", PNG));
    let child = SourceDocument::parse_html(
        "http://example.com/dir/frame.html",
        "<body><img src=\"b.png\"></body>",
    );
    let source = page("<body><iframe src=\"frame.html\" srcdoc=\"x\"></iframe></body>")
        .with_frame(0, FrameContent::Document(Box::new(child)));
    let html = capture(&fixture, &source, options()).await;

    assert!(html.contains("<iframe src=\"index_1.html\"></iframe>"), "{html}");
    let frame = fixture.member("index_1.html").expect("frame document stored");
    assert!(frame.contains("<img src=\"b.png\">"), "{frame}");
}

#[tokio::test]
async fn test_unreachable_frame_gets_error_url() {
    let fixture = Fixture::new(MockClient::new());
    let options = CaptureOptions::builder()
        .record_error_uri(true)
        .build()
        .expect("valid options");
    let source = page("<body><iframe src=\"about:srcdoc\"></iframe></body>")
        .with_frame(0, FrameContent::Remote { instance: None });
    let html = capture(&fixture, &source, Arc::new(options)).await;

    assert!(
        html.contains("<iframe src=\"urn:scrapbook:download:error:about:srcdoc\"></iframe>"),
        "{html}"
    );
}

fn first(document: &NodeRef, selector: &str) -> NodeRef {
    document
        .select_first(selector)
        .expect("element present")
        .as_node()
        .clone()
}

#[tokio::test]
async fn test_nested_selection_keeps_ancestor_chain() {
    let fixture = Fixture::new(MockClient::new());
    let source = page("<html><head><title>t</title></head><body><h1>skip</h1><div><section><p>TEXT</p></section></div></body></html>");
    let text = first(source.document(), "p").first_child().expect("text node");
    let source = source.with_selection(Selection::new(vec![Range::new(
        Boundary::new(text.clone(), 0),
        Boundary::new(text, 4),
    )]));
    let options = CaptureOptions::builder()
        .save_selection_only(true)
        .build()
        .expect("valid options");
    let html = capture(&fixture, &source, Arc::new(options)).await;

    assert!(
        html.contains("<body><div><section><p><!--DOCUMENT_FRAGMENT-->TEXT<!--/DOCUMENT_FRAGMENT--></p></section></div></body>"),
        "{html}"
    );
    assert!(html.contains("<title>t</title>"));
    assert!(!html.contains("skip"));
}

#[tokio::test]
async fn test_two_ranges_in_one_text_node_get_separator() {
    let fixture = Fixture::new(MockClient::new());
    let source = page("<body><p>one two three</p></body>");
    let text = first(source.document(), "p").first_child().expect("text node");
    let source = source.with_selection(Selection::new(vec![
        Range::new(Boundary::new(text.clone(), 0), Boundary::new(text.clone(), 3)),
        Range::new(Boundary::new(text.clone(), 8), Boundary::new(text, 13)),
    ]));
    let options = CaptureOptions::builder()
        .save_selection_only(true)
        .build()
        .expect("valid options");
    let html = capture(&fixture, &source, Arc::new(options)).await;

    assert!(
        html.contains(
            "<p><!--DOCUMENT_FRAGMENT-->one<!--/DOCUMENT_FRAGMENT-->\
             <!--DOCUMENT_FRAGMENT_SPLITTER--> \u{2026} <!--/DOCUMENT_FRAGMENT_SPLITTER-->\
             <!--DOCUMENT_FRAGMENT-->three<!--/DOCUMENT_FRAGMENT--></p>"
        ),
        "{html}"
    );
}

#[tokio::test]
async fn test_source_url_recorded_on_root() {
    let fixture = Fixture::new(MockClient::new());
    let html = capture(&fixture, &page("<body></body>"), options()).await;
    assert!(
        html.contains(&format!("data-sb-{SESSION_KEY}-source=\"{PAGE_URL}\"")),
        "{html}"
    );
}

#[tokio::test]
async fn test_non_html_document_is_captured_as_file() {
    let fixture = Fixture::new(MockClient::new().route("http://example.com/doc.pdf", "application/pdf", "%PDF-1.4"));
    let source = SourceDocument::new(
        "http://example.com/doc.pdf",
        "application/pdf",
        kuchiki::parse_html().one(""),
    );

    let saved = fixture
        .capturer
        .capture_document_or_file(&source, main_settings(), options())
        .await
        .expect("capture succeeds");
    assert_eq!(saved.filename, "index.html");

    let index = fixture.member("index.html").expect("redirect stored");
    assert!(index.contains("content=\"0;URL=doc.pdf\""), "{index}");
    assert_eq!(fixture.member("doc.pdf").as_deref(), Some("%PDF-1.4"));
}

#[tokio::test]
async fn test_loading_document_is_rejected() {
    let fixture = Fixture::new(MockClient::new());
    let source = page("<body></body>").with_ready_state(ReadyState::Loading);
    let result = fixture
        .capturer
        .capture_document_or_file(&source, main_settings(), options())
        .await;
    assert!(matches!(result, Err(CaptureError::DocumentNotReady { .. })));
    assert!(fixture.sink.paths().is_empty());
}

#[tokio::test]
async fn test_capture_page_by_url() {
    let fixture = Fixture::new(
        MockClient::new()
            .route(PAGE_URL, "text/html; charset=utf-8", "<body><img src=\"a.png\"></body>")
            .route("http://example.com/dir/a.png", "image/png", PNG),
    );
    let saved = fixture
        .capturer
        .capture_page(PAGE_URL, options())
        .await
        .expect("capture succeeds");

    assert_eq!(saved.filename, "index.html");
    assert_eq!(saved.frame_url, PAGE_URL);
    let stored = fixture
        .sink
        .text(&format!("{}/index.html", saved.target_dir))
        .expect("main document stored");
    assert!(stored.contains("<img src=\"a.png\">"), "{stored}");
    // the session is gone once the capture finished
    assert!(fixture.capturer.sessions().list_active().is_empty());
    // only the main document keeps its download record
    assert_eq!(fixture.sink.history(), vec![format!("{}/index.html", saved.target_dir)]);
}

#[tokio::test]
async fn test_frame_of_its_own_page_is_not_recaptured() {
    let fixture = Fixture::new(MockClient::new().route(
        PAGE_URL,
        "text/html",
        "<body><iframe src=\"\"></iframe><iframe src=\"page.html#x\"></iframe></body>",
    ));
    let options = CaptureOptions::builder()
        .record_error_uri(true)
        .build()
        .expect("valid options");
    let saved = fixture
        .capturer
        .capture_page(PAGE_URL, Arc::new(options))
        .await
        .expect("capture succeeds");

    let stored = fixture
        .sink
        .text(&format!("{}/index.html", saved.target_dir))
        .expect("main document stored");
    assert_eq!(
        stored.matches("src=\"urn:scrapbook:download:error:").count(),
        2,
        "{stored}"
    );
    assert_eq!(fixture.client.request_count(PAGE_URL), 1);
}

#[tokio::test]
async fn test_pages_framing_each_other_stop_at_the_loop() {
    let other = "http://example.com/dir/other.html";
    let fixture = Fixture::new(
        MockClient::new()
            .route(PAGE_URL, "text/html", "<body><iframe src=\"other.html\"></iframe></body>")
            .route(other, "text/html", "<body><iframe src=\"page.html\"></iframe></body>"),
    );
    let saved = fixture
        .capturer
        .capture_page(PAGE_URL, options())
        .await
        .expect("capture succeeds");

    let main = fixture
        .sink
        .text(&format!("{}/index.html", saved.target_dir))
        .expect("main document stored");
    assert!(main.contains("<iframe src=\"index_1.html\"></iframe>"), "{main}");
    let frame = fixture
        .sink
        .text(&format!("{}/index_1.html", saved.target_dir))
        .expect("frame document stored");
    assert!(frame.contains("<iframe src=\"http://example.com/dir/page.html\"></iframe>"), "{frame}");
    assert_eq!(fixture.client.request_count(PAGE_URL), 1);
    assert_eq!(fixture.client.request_count(other), 1);
}

#[tokio::test]
async fn test_page_declaring_legacy_charset_in_meta_is_decoded() {
    let (body, _, _) = encoding_rs::SHIFT_JIS
        .encode("<html><head><meta charset=\"Shift_JIS\"><title>日本</title></head><body></body></html>");
    let fixture = Fixture::new(MockClient::new().route(PAGE_URL, "text/html", body.into_owned()));
    let saved = fixture
        .capturer
        .capture_page(PAGE_URL, options())
        .await
        .expect("capture succeeds");

    let stored = fixture
        .sink
        .text(&format!("{}/index.html", saved.target_dir))
        .expect("main document stored");
    assert!(stored.contains("<title>日本</title>"), "{stored}");
    assert!(stored.contains("<meta charset=\"UTF-8\">"), "{stored}");
    assert!(!stored.contains('\u{FFFD}'), "{stored}");
}

#[tokio::test]
async fn test_default_options_strip_script_urls() {
    let fixture = Fixture::new(MockClient::new());
    let html = capture(
        &fixture,
        &page("<body><a href=\"javascript:go()\">go</a><a href=\"next.html\">next</a></body>"),
        options(),
    )
    .await;

    assert!(html.contains("<a>go</a>"), "{html}");
    assert!(!html.contains("javascript:"), "{html}");
    assert!(html.contains("<a href=\"http://example.com/dir/next.html\">next</a>"), "{html}");
}

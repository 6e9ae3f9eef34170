//! Per-element capture rules
//!
//! Every rule first makes the element's references absolute, then applies
//! the policy of its resource category. Attribute-level rules (`style=`,
//! `on*=`, `integrity=`) run afterwards for every element still in the tree.

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};
use kuchiki::NodeRef;
use once_cell::sync::Lazy;
use regex::Regex;

use super::audit::DomRewriter;
use super::errors::CaptureError;
use super::settings::SavedDocument;
use super::srcset::rewrite_srcset;
use super::walker::{Completion, TextTarget, Walk, link_rels};
use crate::config::{CssRewriteMode, Policy, ResourceCategory};
use crate::dom::FrameContent;
use crate::dom::node::{
    attr_names, create_element, descendant_elements, get_attr, has_attr, set_attr,
    set_text_content, tag_name,
};
use crate::stylesheet::PlaceholderSet;
use crate::utils::constants::BLANK_URI;
use crate::utils::get_error_url;
use crate::utils::url_utils::is_fetchable;

static META_CONTENT_CHARSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[^;]*;\s*charset=(.*)$")
        .unwrap_or_else(|e| panic!("invalid meta charset pattern: {e}"))
});

/// Open Graph properties whose `content` is a URL
const OPEN_GRAPH_URL_PROPERTIES: [&str; 10] = [
    "og:image",
    "og:image:url",
    "og:image:secure_url",
    "og:audio",
    "og:audio:url",
    "og:audio:secure_url",
    "og:video",
    "og:video:url",
    "og:video:secure_url",
    "og:url",
];

/// Redraws the canvas right before the script from the captured pixels,
/// then removes itself.
const CANVAS_RESTORE_SCRIPT: &str = "(function (data) { \
var scripts = document.getElementsByTagName(\"script\"); \
var script = scripts[scripts.length-1], canvas = script.previousSibling; \
var img = new Image(); \
img.onload = function(){ canvas.getContext('2d').drawImage(img, 0, 0); }; \
img.src = data; \
script.parentNode.removeChild(script); })";

/// Whether the element is still in the tree after its rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Kept,
    Gone,
}

impl<'a> Walk<'a> {
    pub(super) fn capture_element(&mut self, elem: &NodeRef) {
        let Some(tag) = tag_name(elem) else {
            return;
        };

        let visit = match tag.as_str() {
            "base" => self.capture_base(elem),
            "meta" => {
                self.capture_meta(elem);
                Visit::Kept
            }
            "link" => self.capture_link(elem),
            "script" => self.capture_script(elem),
            "noscript" => self.capture_noscript(elem),
            "body" | "table" | "tr" | "th" | "td" => {
                self.capture_background(elem);
                Visit::Kept
            }
            "frame" | "iframe" => self.capture_frame(elem),
            "a" | "area" => {
                self.capture_anchor(elem);
                Visit::Kept
            }
            "img" => self.capture_img(elem),
            "picture" => self.capture_picture(elem),
            "audio" => self.capture_media(elem, ResourceCategory::Audio),
            "video" => self.capture_media(elem, ResourceCategory::Video),
            "embed" => self.capture_embedded(elem, ResourceCategory::Embed, "src"),
            "object" => self.capture_embedded(elem, ResourceCategory::Object, "data"),
            "applet" => self.capture_embedded(elem, ResourceCategory::Applet, "archive"),
            "canvas" => self.capture_canvas(elem),
            "form" => {
                self.absolutize_attr(elem, "action");
                Visit::Kept
            }
            "input" => {
                let is_image = get_attr(elem, "type").is_some_and(|t| t.trim().eq_ignore_ascii_case("image"));
                if is_image {
                    self.capture_embedded(elem, ResourceCategory::Image, "src")
                } else {
                    Visit::Kept
                }
            }
            _ => Visit::Kept,
        };
        if visit == Visit::Gone {
            return;
        }

        self.capture_style_attr(elem);
        self.capture_event_handlers(elem);
        if self.options.remove_integrity() {
            self.rewriter.rewrite_attr(elem, "integrity", None);
        }
    }

    /// `remove` and `comment` take the node out of the tree.
    fn drop_node(&self, elem: &NodeRef, policy: Policy) -> Visit {
        match policy {
            Policy::Comment => self.rewriter.comment_node(elem),
            _ => self.rewriter.remove_node(elem),
        }
        Visit::Gone
    }

    fn capture_base(&mut self, elem: &NodeRef) -> Visit {
        if self.absolutize_attr(elem, "href").is_none() {
            return Visit::Kept;
        }
        match self.policy(ResourceCategory::Base) {
            Policy::Save | Policy::Link => {}
            Policy::Blank => self.rewriter.rewrite_attr(elem, "href", None),
            policy @ (Policy::Remove | Policy::Comment) => return self.drop_node(elem, policy),
        }
        Visit::Kept
    }

    /// Force UTF-8 declarations, absolutize Open Graph URLs.
    fn capture_meta(&mut self, elem: &NodeRef) {
        let content = get_attr(elem, "content");
        let declares_content_type = get_attr(elem, "http-equiv")
            .is_some_and(|value| value.eq_ignore_ascii_case("content-type"))
            && content
                .as_deref()
                .is_some_and(|value| META_CONTENT_CHARSET.is_match(value));

        if declares_content_type {
            self.has_meta = true;
            set_attr(elem, "content", "text/html; charset=UTF-8");
        } else if has_attr(elem, "charset") {
            self.has_meta = true;
            set_attr(elem, "charset", "UTF-8");
        } else if let (Some(property), Some(content)) = (get_attr(elem, "property"), content) {
            let property = property.to_ascii_lowercase();
            if OPEN_GRAPH_URL_PROPERTIES.contains(&property.as_str()) {
                let absolute = self.resolve(&content);
                set_attr(elem, "content", absolute);
            }
        }
    }

    /// Non-stylesheet links; icons follow the image policy.
    fn capture_link(&mut self, elem: &NodeRef) -> Visit {
        if !has_attr(elem, "href") {
            return Visit::Kept;
        }
        let rels = link_rels(elem);
        if rels.iter().any(|rel| rel == "stylesheet") {
            return Visit::Kept;
        }
        let Some(href) = self.absolutize_attr(elem, "href") else {
            return Visit::Kept;
        };
        if !rels.iter().any(|rel| rel == "icon") {
            return Visit::Kept;
        }

        match self.policy(ResourceCategory::Image) {
            Policy::Link => {}
            Policy::Blank => self.rewriter.rewrite_uri(elem, "href", Some(BLANK_URI)),
            policy @ (Policy::Remove | Policy::Comment) => return self.drop_node(elem, policy),
            Policy::Save => self.fetch_into(elem, "href", href, None),
        }
        Visit::Kept
    }

    fn capture_script(&mut self, elem: &NodeRef) -> Visit {
        let src = self.absolutize_attr(elem, "src");
        match self.policy(ResourceCategory::Script) {
            Policy::Link => {}
            Policy::Blank => {
                self.rewriter.rewrite_uri(elem, "src", Some(BLANK_URI));
                self.rewriter.rewrite_text(elem, None);
            }
            policy @ (Policy::Remove | Policy::Comment) => return self.drop_node(elem, policy),
            Policy::Save => {
                if let Some(src) = src {
                    self.fetch_into(elem, "src", src, None);
                }
            }
        }
        Visit::Kept
    }

    fn capture_noscript(&mut self, elem: &NodeRef) -> Visit {
        match self.policy(ResourceCategory::Noscript) {
            Policy::Save | Policy::Link => {}
            Policy::Blank => self.rewriter.rewrite_text(elem, None),
            policy @ (Policy::Remove | Policy::Comment) => return self.drop_node(elem, policy),
        }
        Visit::Kept
    }

    /// Deprecated `background` attribute of body and table parts
    fn capture_background(&mut self, elem: &NodeRef) {
        let Some(url) = self.absolutize_attr(elem, "background") else {
            return;
        };
        match self.policy(ResourceCategory::ImageBackground) {
            Policy::Link => {}
            Policy::Blank => self.rewriter.rewrite_uri(elem, "background", Some(BLANK_URI)),
            Policy::Remove | Policy::Comment => self.rewriter.rewrite_attr(elem, "background", None),
            Policy::Save => self.fetch_into(elem, "background", url, None),
        }
    }

    fn capture_frame(&mut self, frame: &NodeRef) -> Visit {
        let src = self.absolutize_attr(frame, "src");
        // srcdoc would take precedence over the rewritten src
        self.rewriter.rewrite_attr(frame, "srcdoc", None);

        match self.policy(ResourceCategory::Frame) {
            Policy::Link => {}
            Policy::Blank => self.rewriter.rewrite_uri(frame, "src", Some(BLANK_URI)),
            policy @ (Policy::Remove | Policy::Comment) => return self.drop_node(frame, policy),
            Policy::Save => self.dispatch_frame(frame, src),
        }
        Visit::Kept
    }

    /// Capture the frame's content as its own document and point `src` at it.
    fn dispatch_frame(&mut self, frame: &NodeRef, src: Option<String>) {
        let source = self.source;
        let capturer = self.capturer;
        let settings = self.settings.for_subframe(source.url());
        let options = std::sync::Arc::clone(&self.options);

        let original = self.refs.original(frame).cloned();
        let content = original.as_ref().and_then(|live| source.frame_content(live));

        let task: LocalBoxFuture<'a, Result<SavedDocument, CaptureError>> = match (content, &src) {
            (Some(FrameContent::Document(document)), _) => {
                capturer.capture_document_or_file(document, settings, options)
            }
            (Some(FrameContent::Remote { instance }), Some(url)) => match source.tab() {
                Some(tab) => {
                    let (instance, url) = (*instance, url.clone());
                    async move {
                        capturer
                            .frames()
                            .request_frame(tab, &url, instance, settings, options)
                            .await
                    }
                    .boxed_local()
                }
                None => future::ready(Err(CaptureError::FrameUnavailable(format!(
                    "{url} is in another frame context but the document has no tab"
                ))))
                .boxed_local(),
            },
            (None, Some(url)) if is_fetchable(url) => capturer.capture_url(url.clone(), settings, options),
            _ => future::ready(Err(CaptureError::FrameUnavailable(format!(
                "content of frame {} is not reachable",
                src.as_deref().unwrap_or("without src")
            ))))
            .boxed_local(),
        };

        let record_error_uri = self.options.record_error_uri();
        let frame = frame.clone();
        self.defer(
            async move {
                let result = task.await;
                let completion: Completion = Box::new(move |rw: &DomRewriter| match (result, src) {
                    (Ok(saved), Some(_)) => rw.rewrite_uri(&frame, "src", Some(&saved.filename)),
                    (Ok(saved), None) => set_attr(&frame, "src", saved.filename),
                    (Err(e), src) => {
                        log::warn!("Failed to capture frame {}: {e}", src.as_deref().unwrap_or("without src"));
                        if let Some(src) = src {
                            rw.rewrite_uri(&frame, "src", Some(&get_error_url(&src, record_error_uri)));
                        }
                    }
                });
                completion
            }
            .boxed_local(),
        );
    }

    fn capture_anchor(&mut self, elem: &NodeRef) {
        let Some(href) = self.absolutize_attr(elem, "href") else {
            return;
        };
        if !href.trim_start().to_ascii_lowercase().starts_with("javascript:") {
            return;
        }
        match self.policy(ResourceCategory::ScriptAnchor) {
            Policy::Save | Policy::Link => {}
            Policy::Blank => self.rewriter.rewrite_attr(elem, "href", Some("javascript:")),
            Policy::Remove | Policy::Comment => self.rewriter.rewrite_attr(elem, "href", None),
        }
    }

    fn absolutize_srcset(&self, elem: &NodeRef) {
        if let Some(srcset) = get_attr(elem, "srcset") {
            let absolute = rewrite_srcset(&srcset, |url| self.resolve(url));
            set_attr(elem, "srcset", absolute);
        }
    }

    /// Fetch every `srcset` candidate, rewriting the attribute once all settle.
    fn fetch_srcset(&mut self, elem: &NodeRef) {
        let Some(srcset) = get_attr(elem, "srcset") else {
            return;
        };
        let mut placeholders = PlaceholderSet::new();
        let text = rewrite_srcset(&srcset, |url| {
            placeholders.register(self.spawn_fetch(url.to_string(), None))
        });
        self.defer_text(elem, TextTarget::Attr("srcset"), text, placeholders);
    }

    fn capture_img(&mut self, elem: &NodeRef) -> Visit {
        let src = self.absolutize_attr(elem, "src");
        self.absolutize_srcset(elem);

        match self.policy(ResourceCategory::Image) {
            Policy::Link => {}
            Policy::Blank => {
                self.rewriter.rewrite_uri(elem, "src", Some(BLANK_URI));
                self.rewriter.rewrite_attr(elem, "srcset", None);
            }
            policy @ (Policy::Remove | Policy::Comment) => return self.drop_node(elem, policy),
            Policy::Save => {
                if let Some(src) = src {
                    self.fetch_into(elem, "src", src, None);
                }
                self.fetch_srcset(elem);
            }
        }
        Visit::Kept
    }

    fn capture_picture(&mut self, elem: &NodeRef) -> Visit {
        let sources: Vec<NodeRef> = descendant_elements(elem, "source")
            .into_iter()
            .filter(|source| has_attr(source, "srcset"))
            .collect();
        for source in &sources {
            self.absolutize_srcset(source);
        }

        match self.policy(ResourceCategory::Image) {
            Policy::Link => {}
            Policy::Blank => {
                for source in &sources {
                    self.rewriter.rewrite_attr(source, "srcset", None);
                }
            }
            policy @ (Policy::Remove | Policy::Comment) => return self.drop_node(elem, policy),
            Policy::Save => {
                for source in &sources {
                    self.fetch_srcset(source);
                }
            }
        }
        Visit::Kept
    }

    /// `<audio>`/`<video>`: own `src`, `<source src>` and `<track src>`.
    fn capture_media(&mut self, elem: &NodeRef, category: ResourceCategory) -> Visit {
        let own = self.absolutize_attr(elem, "src");
        let sources: Vec<(NodeRef, String)> = descendant_elements(elem, "source")
            .into_iter()
            .filter_map(|source| self.absolutize_attr(&source, "src").map(|src| (source, src)))
            .collect();
        let tracks: Vec<(NodeRef, String)> = descendant_elements(elem, "track")
            .into_iter()
            .filter_map(|track| self.absolutize_attr(&track, "src").map(|src| (track, src)))
            .collect();

        match self.policy(category) {
            Policy::Link => {}
            Policy::Blank => {
                self.rewriter.rewrite_uri(elem, "src", Some(BLANK_URI));
                for (node, _) in sources.iter().chain(&tracks) {
                    self.rewriter.rewrite_uri(node, "src", Some(BLANK_URI));
                }
            }
            policy @ (Policy::Remove | Policy::Comment) => return self.drop_node(elem, policy),
            Policy::Save => {
                if let Some(src) = own {
                    self.fetch_into(elem, "src", src, None);
                }
                for (node, src) in sources.into_iter().chain(tracks) {
                    self.fetch_into(&node, "src", src, None);
                }
            }
        }
        Visit::Kept
    }

    /// Elements with a single resource reference: embed, object, applet,
    /// image inputs.
    fn capture_embedded(&mut self, elem: &NodeRef, category: ResourceCategory, attr: &'static str) -> Visit {
        let url = self.absolutize_attr(elem, attr);
        match self.policy(category) {
            Policy::Link => {}
            Policy::Blank => self.rewriter.rewrite_uri(elem, attr, Some(BLANK_URI)),
            policy @ (Policy::Remove | Policy::Comment) => return self.drop_node(elem, policy),
            Policy::Save => {
                if let Some(url) = url {
                    self.fetch_into(elem, attr, url, None);
                }
            }
        }
        Visit::Kept
    }

    /// A cloned canvas has no pixels: append a script that redraws the
    /// original's exported image.
    fn capture_canvas(&mut self, elem: &NodeRef) -> Visit {
        match self.policy(ResourceCategory::Canvas) {
            Policy::Blank => {}
            policy @ (Policy::Remove | Policy::Comment) => return self.drop_node(elem, policy),
            Policy::Save | Policy::Link => {
                let source = self.source;
                let data = self
                    .refs
                    .original(elem)
                    .and_then(|live| source.canvas_data(live));
                if let Some(data) = data {
                    match create_element("script", &[]) {
                        Some(script) => {
                            set_text_content(&script, &format!("{CANVAS_RESTORE_SCRIPT}('{data}')"));
                            elem.insert_after(script);
                        }
                        None => log::warn!("Failed to create canvas restore script"),
                    }
                }
            }
        }
        Visit::Kept
    }

    fn capture_style_attr(&mut self, elem: &NodeRef) {
        let Some(style) = get_attr(elem, "style") else {
            return;
        };
        match self.policy(ResourceCategory::StyleInline) {
            Policy::Blank => self.rewriter.rewrite_attr(elem, "style", Some("")),
            Policy::Remove | Policy::Comment => self.rewriter.rewrite_attr(elem, "style", None),
            Policy::Save | Policy::Link => {
                if self.options.rewrite_css() == CssRewriteMode::Url {
                    self.rewrite_css_of(elem, TextTarget::Attr("style"), &style);
                }
            }
        }
    }

    /// `on*` attributes
    fn capture_event_handlers(&mut self, elem: &NodeRef) {
        if matches!(self.policy(ResourceCategory::ScriptAttr), Policy::Save | Policy::Link) {
            return;
        }
        for name in attr_names(elem) {
            if name.to_ascii_lowercase().starts_with("on") {
                self.rewriter.rewrite_attr(elem, &name, None);
            }
        }
    }
}

//! The live side of a capture
//!
//! A [`SourceDocument`] stands in for a rendered browser document: the
//! parsed tree plus the state a clone cannot carry (frame contents, canvas
//! pixels, the user's selection, load state).

use std::collections::HashMap;

use kuchiki::NodeRef;
use kuchiki::traits::TendrilSink;

use super::node::{is_element, node_key};
use super::selection::Selection;
use crate::capture::frames::{FrameInstanceId, TabId};

/// Load state of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyState {
    Loading,
    Interactive,
    #[default]
    Complete,
}

/// What sits behind a `<frame>`/`<iframe>` element
#[derive(Debug)]
pub enum FrameContent {
    /// Same-origin document the walker can recurse into directly
    Document(Box<SourceDocument>),
    /// Content owned by another frame context, reached through the
    /// frame coordinator
    Remote {
        /// Instance the frame registered under, when known
        instance: Option<FrameInstanceId>,
    },
}

#[derive(Debug)]
pub struct SourceDocument {
    url: String,
    content_type: String,
    ready_state: ReadyState,
    document: NodeRef,
    selection: Option<Selection>,
    /// keyed by position among the document's frame elements
    frames: HashMap<usize, FrameContent>,
    /// canvas data URLs keyed by position among canvas elements
    canvases: HashMap<usize, String>,
    tab: Option<TabId>,
}

impl SourceDocument {
    pub fn new(url: impl Into<String>, content_type: impl Into<String>, document: NodeRef) -> Self {
        Self {
            url: url.into(),
            content_type: content_type.into().to_ascii_lowercase(),
            ready_state: ReadyState::Complete,
            document,
            selection: None,
            frames: HashMap::new(),
            canvases: HashMap::new(),
            tab: None,
        }
    }

    /// Parse `html` as a loaded `text/html` document.
    pub fn parse_html(url: impl Into<String>, html: &str) -> Self {
        Self::new(url, "text/html", kuchiki::parse_html().one(html))
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_ascii_lowercase();
        self
    }

    #[must_use]
    pub fn with_ready_state(mut self, state: ReadyState) -> Self {
        self.ready_state = state;
        self
    }

    #[must_use]
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Attach content to the `ordinal`-th frame element (document order).
    #[must_use]
    pub fn with_frame(mut self, ordinal: usize, content: FrameContent) -> Self {
        self.frames.insert(ordinal, content);
        self
    }

    /// Pixel data of the `ordinal`-th canvas element, as a `data:` URL.
    #[must_use]
    pub fn with_canvas_data(mut self, ordinal: usize, data_url: impl Into<String>) -> Self {
        self.canvases.insert(ordinal, data_url.into());
        self
    }

    /// The browser tab this document is displayed in, if any.
    #[must_use]
    pub fn with_tab(mut self, tab: TabId) -> Self {
        self.tab = Some(tab);
        self
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    #[must_use]
    pub fn is_html(&self) -> bool {
        matches!(
            self.content_type.as_str(),
            "text/html" | "application/xhtml+xml"
        )
    }

    #[must_use]
    pub fn document(&self) -> &NodeRef {
        &self.document
    }

    /// The root `<html>` element
    #[must_use]
    pub fn document_element(&self) -> Option<NodeRef> {
        self.document
            .children()
            .find(|child| child.as_element().is_some())
    }

    /// The selection, unless it is empty or collapsed
    #[must_use]
    pub fn selection(&self) -> Option<&Selection> {
        self.selection
            .as_ref()
            .filter(|selection| !selection.is_collapsed())
    }

    #[must_use]
    pub fn tab(&self) -> Option<TabId> {
        self.tab
    }

    fn ordinal_among(&self, node: &NodeRef, tags: &[&str]) -> Option<usize> {
        let key = node_key(node);
        self.document
            .descendants()
            .filter(|d| tags.iter().any(|tag| is_element(d, tag)))
            .position(|d| node_key(&d) == key)
    }

    /// Content behind a live frame element of this document
    #[must_use]
    pub fn frame_content(&self, frame: &NodeRef) -> Option<&FrameContent> {
        self.ordinal_among(frame, &["frame", "iframe"])
            .and_then(|ordinal| self.frames.get(&ordinal))
    }

    /// Exported pixels of a live canvas element of this document
    #[must_use]
    pub fn canvas_data(&self, canvas: &NodeRef) -> Option<&str> {
        self.ordinal_among(canvas, &["canvas"])
            .and_then(|ordinal| self.canvases.get(&ordinal))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::node::descendant_elements;

    #[test]
    fn test_frame_and_canvas_lookup_by_position() {
        let doc = SourceDocument::parse_html(
            "http://h/",
            "<iframe src=a></iframe><canvas></canvas><iframe src=b></iframe><canvas></canvas>",
        )
        .with_frame(1, FrameContent::Remote { instance: None })
        .with_canvas_data(1, "data:image/png;base64,AA==");

        let canvases = descendant_elements(doc.document(), "canvas");
        assert_eq!(doc.canvas_data(&canvases[0]), None);
        assert_eq!(canvases.len(), 2);
        assert_eq!(doc.canvas_data(&canvases[1]), Some("data:image/png;base64,AA=="));

        let iframes = descendant_elements(doc.document(), "iframe");
        assert!(doc.frame_content(&iframes[0]).is_none());
        assert!(matches!(
            doc.frame_content(&iframes[1]),
            Some(FrameContent::Remote { instance: None })
        ));
    }

    #[test]
    fn test_content_type_classification() {
        let doc = SourceDocument::parse_html("http://h/", "<p>x</p>");
        assert!(doc.is_html());
        assert!(!doc.with_content_type("IMAGE/PNG").is_html());
    }
}

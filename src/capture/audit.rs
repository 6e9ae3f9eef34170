//! Destructive DOM edits with an optional audit trail
//!
//! When the matching option is on, the previous value of a rewritten
//! attribute is kept in `data-sb-<timeId>-orig-<attr>` and a removed node
//! leaves a `sb-<timeId>-orig-node--<markup>` comment behind.

use kuchiki::NodeRef;

use crate::config::CaptureOptions;
use crate::dom::node::{get_attr, has_attr, outer_html, remove_attr, set_attr, set_text_content};
use crate::session::SessionKey;
use crate::utils::string_utils::escape_html_comment;

#[derive(Debug, Clone)]
pub struct DomRewriter {
    time_id: String,
    record_removed_node: bool,
    record_removed_attr: bool,
    record_source_uri: bool,
}

/// Put `replacement` where `node` is, detaching `node`.
fn replace_node(node: &NodeRef, replacement: NodeRef) {
    if node.parent().is_some() {
        node.insert_before(replacement);
    }
    node.detach();
}

impl DomRewriter {
    #[must_use]
    pub fn new(key: &SessionKey, options: &CaptureOptions) -> Self {
        Self {
            time_id: key.as_str().to_string(),
            record_removed_node: options.record_removed_node(),
            record_removed_attr: options.record_removed_attr(),
            record_source_uri: options.record_source_uri(),
        }
    }

    /// `data-sb-<timeId>-source`
    #[must_use]
    pub fn source_attr(&self) -> String {
        format!("data-sb-{}-source", self.time_id)
    }

    #[must_use]
    pub fn orig_attr(&self, attr: &str) -> String {
        format!("data-sb-{}-orig-{attr}", self.time_id)
    }

    pub fn remove_node(&self, node: &NodeRef) {
        if self.record_removed_node {
            let markup = escape_html_comment(&outer_html(node));
            let comment = NodeRef::new_comment(format!("sb-{}-orig-node--{markup}", self.time_id));
            replace_node(node, comment);
        } else {
            node.detach();
        }
    }

    /// Replace the node with a comment holding its markup.
    pub fn comment_node(&self, node: &NodeRef) {
        let markup = escape_html_comment(&outer_html(node));
        replace_node(node, NodeRef::new_comment(markup));
    }

    /// Set (`Some`) or remove (`None`) an attribute the element already has.
    pub fn rewrite_attr(&self, node: &NodeRef, attr: &str, value: Option<&str>) {
        self.rewrite(node, attr, value, self.record_removed_attr);
    }

    /// Like [`rewrite_attr`](Self::rewrite_attr), for resource references.
    pub fn rewrite_uri(&self, node: &NodeRef, attr: &str, value: Option<&str>) {
        self.rewrite(node, attr, value, self.record_source_uri);
    }

    fn rewrite(&self, node: &NodeRef, attr: &str, value: Option<&str>, record: bool) {
        let Some(previous) = get_attr(node, attr) else {
            return;
        };
        if record {
            set_attr(node, &self.orig_attr(attr), previous);
        }
        match value {
            Some(value) => set_attr(node, attr, value),
            None => remove_attr(node, attr),
        }
    }

    /// Replace the text content of a non-empty element.
    pub fn rewrite_text(&self, node: &NodeRef, value: Option<&str>) {
        let previous = node.text_contents();
        if previous.is_empty() {
            return;
        }
        if self.record_removed_attr {
            set_attr(node, &self.orig_attr("textContent"), previous);
        }
        set_text_content(node, value.unwrap_or_default());
    }

    /// Whether `attr` carries an audit copy on `node`
    #[must_use]
    pub fn has_orig(&self, node: &NodeRef, attr: &str) -> bool {
        has_attr(node, &self.orig_attr(attr))
    }
}

//! Document tree walker
//!
//! One walk captures one document: it registers a document name, clones
//! the live tree (whole or selection only), normalizes it, rewrites every
//! capturable reference according to the options, waits for the subtasks
//! it dispatched, then serializes and stores the result.
//!
//! The walk runs on a single task. Subtasks are futures polled from a
//! `FuturesUnordered`; each resolves to a completion that edits the cloned
//! tree, so the tree is only ever touched from the walk itself.

use std::sync::Arc;

use futures::future::{BoxFuture, LocalBoxFuture};
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use kuchiki::NodeRef;

use super::audit::DomRewriter;
use super::capturer::Capturer;
use super::counter::TaskCounter;
use super::errors::CaptureError;
use super::settings::{CaptureSettings, SavedDocument};
use crate::config::{CaptureOptions, CssRewriteMode, Policy, ResourceCategory};
use crate::dom::node::{
    create_element, descendant_elements, doctype_to_string, get_attr, has_attr, is_attached_to,
    is_element, is_text, outer_html, set_attr, set_text_content,
};
use crate::dom::{Range, RefTable, Selection, SourceDocument};
use crate::fetcher::{FetchOutcome, RewriteKind};
use crate::session::CaptureSession;
use crate::stylesheet::{CssLocalizer, PlaceholderSet};
use crate::utils::absolutize;
use crate::utils::constants::BLANK_URI;

/// Edit applied to the cloned tree once a subtask settles
pub(super) type Completion = Box<dyn FnOnce(&DomRewriter)>;

/// Where deferred text goes once its placeholders resolve
#[derive(Debug, Clone, Copy)]
pub(super) enum TextTarget {
    Attr(&'static str),
    Content,
}

impl TextTarget {
    fn apply(self, node: &NodeRef, text: &str) {
        match self {
            Self::Attr(attr) => set_attr(node, attr, text),
            Self::Content => set_text_content(node, text),
        }
    }
}

/// Selection-only output: one branch per distinct ancestor
struct Branch {
    original: NodeRef,
    clone: NodeRef,
    children: Vec<Branch>,
}

pub(super) struct Walk<'a> {
    pub(super) capturer: &'a Capturer,
    pub(super) source: &'a SourceDocument,
    pub(super) session: Arc<CaptureSession>,
    pub(super) settings: CaptureSettings,
    pub(super) options: Arc<CaptureOptions>,
    pub(super) rewriter: DomRewriter,
    pub(super) refs: RefTable,
    /// Base for element references: the document `<base>`, else its URL
    pub(super) base_url: String,
    pub(super) has_meta: bool,
    counter: TaskCounter,
    tasks: FuturesUnordered<LocalBoxFuture<'a, Completion>>,
}

/// Capture `source` as a document and store it.
pub(super) async fn capture_document(
    capturer: &Capturer,
    source: &SourceDocument,
    settings: CaptureSettings,
    options: Arc<CaptureOptions>,
) -> Result<SavedDocument, CaptureError> {
    let session = capturer.sessions().get_or_create(&settings.session_key);

    let document_name = session.register_document_name(&settings.document_name);
    log::debug!("capture_document: {} as {document_name}", source.url());

    let html = source.document_element().ok_or_else(|| {
        CaptureError::Serialize(format!("{} has no root element", source.url()))
    })?;

    let mut walk = Walk::new(capturer, source, Arc::clone(&session), settings, options);
    let (root, head) = walk.build_root(&html)?;
    walk.normalize(&root, &head);
    walk.capture_stylesheets(&root);
    walk.capture_elements(&root);
    if !walk.has_meta {
        let meta = create_element("meta", &[("charset", "UTF-8")])
            .ok_or_else(|| CaptureError::Serialize("failed to create charset declaration".into()))?;
        head.prepend(meta);
        head.prepend(NodeRef::new_text("\n"));
    }
    walk.drain().await;

    let content = format!("{}{}", doctype_to_string(source.document()), outer_html(&root));
    capturer
        .save_document(
            &session,
            &walk.settings,
            &walk.options,
            source.url(),
            &document_name,
            source.content_type(),
            content,
        )
        .await
}

impl<'a> Walk<'a> {
    fn new(
        capturer: &'a Capturer,
        source: &'a SourceDocument,
        session: Arc<CaptureSession>,
        settings: CaptureSettings,
        options: Arc<CaptureOptions>,
    ) -> Self {
        let rewriter = DomRewriter::new(&settings.session_key, &options);
        Self {
            capturer,
            source,
            session,
            settings,
            rewriter,
            refs: RefTable::new(),
            base_url: document_base_url(source),
            has_meta: false,
            counter: TaskCounter::new(),
            tasks: FuturesUnordered::new(),
            options,
        }
    }

    pub(super) fn policy(&self, category: ResourceCategory) -> Policy {
        self.options.policy(category)
    }

    pub(super) fn resolve(&self, url: &str) -> String {
        absolutize(&self.base_url, url)
    }

    /// Make the `attr` reference of `node` absolute, returning it.
    pub(super) fn absolutize_attr(&self, node: &NodeRef, attr: &str) -> Option<String> {
        let value = get_attr(node, attr)?;
        let absolute = self.resolve(&value);
        set_attr(node, attr, absolute.clone());
        Some(absolute)
    }

    // ---- subtasks ----

    pub(super) fn defer(&mut self, task: LocalBoxFuture<'a, Completion>) {
        self.counter.increment();
        self.tasks.push(task);
    }

    /// Start a fetch on the runtime, returning its outcome.
    pub(super) fn spawn_fetch(&self, url: String, kind: Option<RewriteKind>) -> BoxFuture<'static, FetchOutcome> {
        let fetch = self.capturer.fetcher().fetch(
            Arc::clone(&self.session),
            Arc::clone(&self.options),
            url.clone(),
            kind,
        );
        let options = Arc::clone(&self.options);
        let handle = tokio::spawn(fetch);
        async move {
            handle.await.unwrap_or_else(|e| {
                log::warn!("Fetch task for {url} did not complete: {e}");
                FetchOutcome::failed(&url, &options, e)
            })
        }
        .boxed()
    }

    /// Fetch `url` and point `attr` of `node` at the result.
    pub(super) fn fetch_into(&mut self, node: &NodeRef, attr: &'static str, url: String, kind: Option<RewriteKind>) {
        let fetch = self.spawn_fetch(url, kind);
        let node = node.clone();
        self.defer(
            async move {
                let outcome = fetch.await;
                let completion: Completion =
                    Box::new(move |rw: &DomRewriter| rw.rewrite_uri(&node, attr, Some(&outcome.url)));
                completion
            }
            .boxed_local(),
        );
    }

    /// Write `text` to `target` once every placeholder in it is resolved.
    pub(super) fn defer_text(
        &mut self,
        node: &NodeRef,
        target: TextTarget,
        text: String,
        placeholders: PlaceholderSet,
    ) {
        if placeholders.is_empty() {
            target.apply(node, &text);
            return;
        }
        let node = node.clone();
        self.defer(
            async move {
                let text = placeholders.resolve().await.apply(&text);
                let completion: Completion = Box::new(move |_: &DomRewriter| target.apply(&node, &text));
                completion
            }
            .boxed_local(),
        );
    }

    /// Localize the CSS text in `target` of `node`.
    pub(super) fn rewrite_css_of(&mut self, node: &NodeRef, target: TextTarget, css: &str) {
        let mut placeholders = PlaceholderSet::new();
        let text = CssLocalizer::new(self.capturer.fetcher(), &self.session, &self.options).rewrite(
            css,
            self.source.url(),
            &mut placeholders,
        );
        self.defer_text(node, target, text, placeholders);
    }

    async fn drain(&mut self) {
        let mut ready = self.counter.finish_walk();
        while !ready {
            let Some(completion) = self.tasks.next().await else {
                log::warn!(
                    "Subtask queue of {} ran dry with {} outstanding",
                    self.source.url(),
                    self.counter.pending()
                );
                break;
            };
            completion(&self.rewriter);
            ready = self.counter.settle();
        }
    }

    // ---- clone construction ----

    fn build_root(&mut self, html: &NodeRef) -> Result<(NodeRef, NodeRef), CaptureError> {
        if self.options.save_selection_only() {
            if let Some(selection) = self.source.selection() {
                if let Some(built) = self.build_selection_root(html, selection)? {
                    return Ok(built);
                }
            }
        }

        let root = self.refs.deep_clone(html);
        let head = match descendant_elements(&root, "head").into_iter().next() {
            Some(head) => head,
            None => {
                let head = new_head()?;
                root.prepend(head.clone());
                head
            }
        };
        Ok((root, head))
    }

    /// Rebuild the ancestor chain of every selected range around copies of
    /// the selected content. `None` when a range spans the root element, in
    /// which case the whole document is captured.
    fn build_selection_root(
        &mut self,
        html: &NodeRef,
        selection: &Selection,
    ) -> Result<Option<(NodeRef, NodeRef)>, CaptureError> {
        let spans_root = selection.ranges().iter().any(|range| {
            let common = range.common_ancestor();
            is_element(&common, "html") || common.as_document().is_some()
        });
        if spans_root {
            log::debug!("Selection spans the root element, capturing the whole document");
            return Ok(None);
        }

        let root = self.refs.shallow_clone(html);
        let head = match descendant_elements(html, "head").into_iter().next() {
            Some(live_head) => self.refs.deep_clone(&live_head),
            None => new_head()?,
        };
        root.append(head.clone());
        root.append(NodeRef::new_text("\n"));

        let mut branches: Vec<Branch> = Vec::new();
        for range in selection.ranges() {
            self.append_range(&root, &mut branches, range);
        }
        Ok(Some((root, head)))
    }

    fn append_range(&mut self, root: &NodeRef, branches: &mut Vec<Branch>, range: &Range) {
        let common = range.common_ancestor();
        let mut current = if is_text(&common) || common.as_comment().is_some() {
            common.parent()
        } else {
            Some(common.clone())
        };

        let mut chain = Vec::new();
        while let Some(node) = current {
            if is_element(&node, "html") {
                break;
            }
            current = node.parent();
            chain.push(node);
        }
        chain.reverse();

        let mut parent = root.clone();
        let mut level = branches;
        let mut matched_depth = None;
        for (depth, node) in chain.iter().enumerate() {
            let index = match level.iter().position(|branch| &branch.original == node) {
                Some(index) => {
                    matched_depth = Some(depth);
                    index
                }
                None => {
                    let clone = self.refs.shallow_clone(node);
                    parent.append(clone.clone());
                    level.push(Branch {
                        original: node.clone(),
                        clone,
                        children: Vec::new(),
                    });
                    level.len() - 1
                }
            };
            let branch = &mut level[index];
            parent = branch.clone.clone();
            level = &mut branch.children;
        }

        // a second range inside the same text node gets a visible separator
        if !chain.is_empty() && matched_depth == Some(chain.len() - 1) && is_text(&common) {
            parent.append(NodeRef::new_comment("DOCUMENT_FRAGMENT_SPLITTER"));
            parent.append(NodeRef::new_text(" \u{2026} "));
            parent.append(NodeRef::new_comment("/DOCUMENT_FRAGMENT_SPLITTER"));
        }
        parent.append(NodeRef::new_comment("DOCUMENT_FRAGMENT"));
        for node in range.clone_contents(&mut self.refs) {
            parent.append(node);
        }
        parent.append(NodeRef::new_comment("/DOCUMENT_FRAGMENT"));
    }

    /// Linebreaks around `<head>` and `<body>`, provenance attribute.
    fn normalize(&self, root: &NodeRef, head: &NodeRef) {
        let linebreak = || NodeRef::new_text("\n");

        if !head.previous_sibling().is_some_and(|n| is_text(&n)) {
            head.insert_before(linebreak());
        }
        match head.first_child() {
            Some(first) if is_text(&first) => {}
            Some(first) => first.insert_before(linebreak()),
            None => head.append(linebreak()),
        }
        if !head.last_child().is_some_and(|n| is_text(&n)) {
            head.append(linebreak());
        }
        if !head.next_sibling().is_some_and(|n| is_text(&n)) {
            head.insert_after(linebreak());
        }
        if let Some(body) = descendant_elements(root, "body").into_iter().next() {
            if body.next_sibling().is_none() {
                body.insert_after(linebreak());
            }
        }

        if self.options.record_document_meta() {
            let url = if self.source.url().starts_with("data:") {
                "data:"
            } else {
                self.source.url()
            };
            set_attr(root, &self.rewriter.source_attr(), url);
        }
    }

    // ---- stylesheets ----

    /// `<style>` and `<link rel=stylesheet>` elements of the capture.
    fn capture_stylesheets(&mut self, root: &NodeRef) {
        let sheets: Vec<NodeRef> = root
            .descendants()
            .filter(|node| is_element(node, "style") || (is_element(node, "link") && is_stylesheet_link(node)))
            .collect();

        for sheet in sheets {
            if is_element(&sheet, "style") {
                self.capture_style_element(&sheet);
            } else {
                self.capture_stylesheet_link(&sheet);
            }
        }
    }

    fn capture_style_element(&mut self, style: &NodeRef) {
        match self.policy(ResourceCategory::Style) {
            Policy::Blank => self.rewriter.rewrite_text(style, None),
            Policy::Remove => self.rewriter.remove_node(style),
            Policy::Comment => self.rewriter.comment_node(style),
            Policy::Save | Policy::Link => {
                if self.options.rewrite_css() == CssRewriteMode::Url {
                    let css = style.text_contents();
                    self.rewrite_css_of(style, TextTarget::Content, &css);
                }
            }
        }
    }

    fn capture_stylesheet_link(&mut self, link: &NodeRef) {
        let Some(href) = self.absolutize_attr(link, "href") else {
            return;
        };
        match self.policy(ResourceCategory::Style) {
            Policy::Link => {}
            Policy::Blank => self.rewriter.rewrite_attr(link, "href", Some(BLANK_URI)),
            Policy::Remove => self.rewriter.remove_node(link),
            Policy::Comment => self.rewriter.comment_node(link),
            Policy::Save => {
                let kind = (self.options.rewrite_css() == CssRewriteMode::Url).then_some(RewriteKind::Css);
                self.fetch_into(link, "href", href, kind);
            }
        }
    }

    // ---- elements ----

    /// Apply the per-element rules to every element below `root`.
    fn capture_elements(&mut self, root: &NodeRef) {
        let elements: Vec<NodeRef> = root
            .descendants()
            .filter(|node| node.as_element().is_some())
            .collect();

        for element in elements {
            // skip elements that an earlier rule removed
            if !is_attached_to(&element, root) {
                continue;
            }
            self.capture_element(&element);
        }
    }
}

/// `rel` tokens of a `<link>`, lowercased
pub(super) fn link_rels(link: &NodeRef) -> Vec<String> {
    get_attr(link, "rel")
        .map(|rel| rel.split_ascii_whitespace().map(str::to_ascii_lowercase).collect())
        .unwrap_or_default()
}

fn is_stylesheet_link(link: &NodeRef) -> bool {
    has_attr(link, "href") && link_rels(link).iter().any(|rel| rel == "stylesheet")
}

fn new_head() -> Result<NodeRef, CaptureError> {
    create_element("head", &[]).ok_or_else(|| CaptureError::Serialize("failed to create head element".into()))
}

/// The URL relative references in the document resolve against.
fn document_base_url(source: &SourceDocument) -> String {
    source
        .document()
        .descendants()
        .find(|node| is_element(node, "base") && has_attr(node, "href"))
        .and_then(|base| get_attr(&base, "href"))
        .map(|href| absolutize(source.url(), &href))
        .unwrap_or_else(|| source.url().to_string())
}

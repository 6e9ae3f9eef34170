//! Small helpers over `kuchiki` nodes

use kuchiki::traits::TendrilSink;
use kuchiki::{Node, NodeRef};

/// Lowercase local name of an element, `None` for other node kinds
#[must_use]
pub fn tag_name(node: &NodeRef) -> Option<String> {
    node.as_element()
        .map(|element| element.name.local.to_string().to_ascii_lowercase())
}

#[must_use]
pub fn is_element(node: &NodeRef, tag: &str) -> bool {
    node.as_element()
        .is_some_and(|element| (*element.name.local).eq_ignore_ascii_case(tag))
}

#[must_use]
pub fn is_text(node: &NodeRef) -> bool {
    node.as_text().is_some()
}

#[must_use]
pub fn get_attr(node: &NodeRef, name: &str) -> Option<String> {
    node.as_element()
        .and_then(|element| element.attributes.borrow().get(name).map(str::to_string))
}

#[must_use]
pub fn has_attr(node: &NodeRef, name: &str) -> bool {
    node.as_element()
        .is_some_and(|element| element.attributes.borrow().contains(name))
}

pub fn set_attr(node: &NodeRef, name: &str, value: impl Into<String>) {
    if let Some(element) = node.as_element() {
        element.attributes.borrow_mut().insert(name, value.into());
    }
}

pub fn remove_attr(node: &NodeRef, name: &str) {
    if let Some(element) = node.as_element() {
        element.attributes.borrow_mut().remove(name);
    }
}

/// Attribute names of an element, in storage order
#[must_use]
pub fn attr_names(node: &NodeRef) -> Vec<String> {
    node.as_element()
        .map(|element| {
            element
                .attributes
                .borrow()
                .map
                .keys()
                .map(|name| name.local.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Element children only
pub fn child_elements(node: &NodeRef) -> impl Iterator<Item = NodeRef> + '_ {
    node.children().filter(|child| child.as_element().is_some())
}

/// First child element with the given tag
#[must_use]
pub fn child_element(node: &NodeRef, tag: &str) -> Option<NodeRef> {
    child_elements(node).find(|child| is_element(child, tag))
}

/// Descendant elements with the given tag, in document order
#[must_use]
pub fn descendant_elements(node: &NodeRef, tag: &str) -> Vec<NodeRef> {
    node.descendants()
        .filter(|descendant| is_element(descendant, tag))
        .collect()
}

/// Whether `node` is still attached below `root` (or is `root` itself)
#[must_use]
pub fn is_attached_to(node: &NodeRef, root: &NodeRef) -> bool {
    node.inclusive_ancestors().any(|ancestor| &ancestor == root)
}

/// Replace all children with a single text node (or nothing for "").
pub fn set_text_content(node: &NodeRef, text: &str) {
    for child in node.children().collect::<Vec<_>>() {
        child.detach();
    }
    if !text.is_empty() {
        node.append(NodeRef::new_text(text));
    }
}

/// Serialized markup of the node itself, children included.
#[must_use]
pub fn outer_html(node: &NodeRef) -> String {
    let mut buffer = Vec::new();
    if let Err(e) = node.serialize(&mut buffer) {
        log::warn!("Failed to serialize node: {e}");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Stable identity of a node for side tables. Only meaningful while the
/// node is kept alive.
#[must_use]
pub fn node_key(node: &NodeRef) -> usize {
    let raw: *const Node = &**node;
    raw as usize
}

/// A detached element built by the HTML parser, so that the usual
/// namespace and attribute handling applies.
#[must_use]
pub fn create_element(tag: &str, attrs: &[(&str, &str)]) -> Option<NodeRef> {
    let document = kuchiki::parse_html().one(format!("<{tag}></{tag}>"));
    let element = document.select_first(tag).ok()?.as_node().clone();
    element.detach();
    for (name, value) in attrs {
        set_attr(&element, name, *value);
    }
    Some(element)
}

/// `<!DOCTYPE ...>` line for the document, or "" when it has none
#[must_use]
pub fn doctype_to_string(document: &NodeRef) -> String {
    let Some(doctype) = document.children().find_map(|child| child.as_doctype().cloned()) else {
        return String::new();
    };
    let mut out = format!("<!DOCTYPE {}", doctype.name);
    if !doctype.public_id.is_empty() {
        out.push_str(&format!(" PUBLIC \"{}\"", doctype.public_id));
    }
    if !doctype.system_id.is_empty() {
        if doctype.public_id.is_empty() {
            out.push_str(" SYSTEM");
        }
        out.push_str(&format!(" \"{}\"", doctype.system_id));
    }
    out.push_str(">\n");
    out
}

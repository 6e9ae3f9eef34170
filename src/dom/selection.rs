//! User selections over a source document
//!
//! Offsets follow DOM range rules: a child index for element containers, a
//! character offset for text and comment nodes.

use kuchiki::NodeRef;

use super::clone::RefTable;

/// A point in the tree: a container node and an offset into it
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    pub node: NodeRef,
    pub offset: usize,
}

impl Boundary {
    pub fn new(node: NodeRef, offset: usize) -> Self {
        Self { node, offset }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub start: Boundary,
    pub end: Boundary,
}

/// Character data of text and comment nodes
fn character_data(node: &NodeRef) -> Option<String> {
    node.as_text()
        .or_else(|| node.as_comment())
        .map(|data| data.borrow().clone())
}

fn node_length(node: &NodeRef) -> usize {
    match character_data(node) {
        Some(data) => data.chars().count(),
        None => node.children().count(),
    }
}

fn char_slice(data: &str, from: usize, to: usize) -> String {
    data.chars().skip(from).take(to.saturating_sub(from)).collect()
}

/// Clone of a text or comment node carrying only `[from, to)` of its data
fn clone_data_slice(table: &mut RefTable, node: &NodeRef, from: usize, to: usize) -> NodeRef {
    let clone = table.shallow_clone(node);
    let data = character_data(node).unwrap_or_default();
    let slice = char_slice(&data, from, to);
    if let Some(cell) = clone.as_text().or_else(|| clone.as_comment()) {
        *cell.borrow_mut() = slice;
    }
    clone
}

fn child_index(node: &NodeRef) -> usize {
    node.preceding_siblings().count()
}

/// The child of `ancestor` on the path down to `node`
fn child_towards(ancestor: &NodeRef, node: &NodeRef) -> Option<NodeRef> {
    node.inclusive_ancestors()
        .find(|candidate| candidate.parent().as_ref() == Some(ancestor))
}

fn is_inclusive_ancestor(ancestor: &NodeRef, node: &NodeRef) -> bool {
    node.inclusive_ancestors().any(|candidate| &candidate == ancestor)
}

impl Range {
    pub fn new(start: Boundary, end: Boundary) -> Self {
        Self { start, end }
    }

    /// Range spanning all children (or all characters) of `node`
    pub fn select_node_contents(node: &NodeRef) -> Self {
        Self {
            start: Boundary::new(node.clone(), 0),
            end: Boundary::new(node.clone(), node_length(node)),
        }
    }

    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Deepest node containing both boundaries
    #[must_use]
    pub fn common_ancestor(&self) -> NodeRef {
        self.start
            .node
            .inclusive_ancestors()
            .find(|candidate| is_inclusive_ancestor(candidate, &self.end.node))
            .unwrap_or_else(|| self.start.node.clone())
    }

    /// Copies of everything inside the range, in order, as a list of
    /// sibling nodes. Partially selected nodes are cloned shallowly and
    /// filled with the selected part of their content.
    pub fn clone_contents(&self, table: &mut RefTable) -> Vec<NodeRef> {
        let (start, end) = (&self.start, &self.end);
        if self.is_collapsed() {
            return Vec::new();
        }

        if start.node == end.node && character_data(&start.node).is_some() {
            return vec![clone_data_slice(table, &start.node, start.offset, end.offset)];
        }

        let common = self.common_ancestor();
        let first_partial = (!is_inclusive_ancestor(&start.node, &end.node))
            .then(|| child_towards(&common, &start.node))
            .flatten();
        let last_partial = (!is_inclusive_ancestor(&end.node, &start.node))
            .then(|| child_towards(&common, &end.node))
            .flatten();

        let contained_from = match &first_partial {
            Some(child) => child_index(child) + 1,
            None => start.offset,
        };
        let contained_to = match &last_partial {
            Some(child) => child_index(child),
            None => end.offset,
        };

        let mut fragment = Vec::new();

        if let Some(child) = &first_partial {
            if character_data(child).is_some() {
                fragment.push(clone_data_slice(table, child, start.offset, node_length(child)));
            } else {
                let clone = table.shallow_clone(child);
                let sub = Range::new(start.clone(), Boundary::new(child.clone(), node_length(child)));
                for node in sub.clone_contents(table) {
                    clone.append(node);
                }
                fragment.push(clone);
            }
        }

        let contained: Vec<NodeRef> = common
            .children()
            .skip(contained_from)
            .take(contained_to.saturating_sub(contained_from))
            .collect();
        for child in contained {
            fragment.push(table.deep_clone(&child));
        }

        if let Some(child) = &last_partial {
            if character_data(child).is_some() {
                fragment.push(clone_data_slice(table, child, 0, end.offset));
            } else {
                let clone = table.shallow_clone(child);
                let sub = Range::new(Boundary::new(child.clone(), 0), end.clone());
                for node in sub.clone_contents(table) {
                    clone.append(node);
                }
                fragment.push(clone);
            }
        }

        fragment
    }
}

/// The ranges a user has selected in a document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    ranges: Vec<Range>,
}

impl Selection {
    #[must_use]
    pub fn new(ranges: Vec<Range>) -> Self {
        Self { ranges }
    }

    #[must_use]
    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    /// No range or only collapsed ones
    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        self.ranges.iter().all(Range::is_collapsed)
    }
}

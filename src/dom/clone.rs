//! Cloning with a clone → original side table
//!
//! A clone of a frame has no content document and a clone of a canvas has
//! no pixels, so the walker needs the live original of every cloned node.
//! The correlation lives here instead of in temporary DOM attributes.

use std::collections::HashMap;

use kuchiki::NodeRef;

use super::node::node_key;

/// Maps every clone made through it back to its original.
#[derive(Debug, Default)]
pub struct RefTable {
    // the clone is held so its address stays unique for the table's lifetime
    originals: HashMap<usize, (NodeRef, NodeRef)>,
}

impl RefTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of `node` without children.
    pub fn shallow_clone(&mut self, node: &NodeRef) -> NodeRef {
        let clone = NodeRef::new(node.data().clone());
        self.originals
            .insert(node_key(&clone), (clone.clone(), node.clone()));
        clone
    }

    /// Copy of `node` and its whole subtree.
    pub fn deep_clone(&mut self, node: &NodeRef) -> NodeRef {
        let clone = self.shallow_clone(node);
        for child in node.children() {
            clone.append(self.deep_clone(&child));
        }
        clone
    }

    /// The live node `clone` was copied from
    #[must_use]
    pub fn original(&self, clone: &NodeRef) -> Option<&NodeRef> {
        self.originals
            .get(&node_key(clone))
            .map(|(_, original)| original)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.originals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::node::outer_html;
    use kuchiki::traits::TendrilSink;

    #[test]
    fn test_deep_clone_maps_every_node() {
        let doc = kuchiki::parse_html().one("<div id=a><span>x</span><canvas></canvas></div>");
        let div = doc.select_first("div").expect("div").as_node().clone();

        let mut table = RefTable::new();
        let clone = table.deep_clone(&div);

        assert_eq!(outer_html(&clone), outer_html(&div));
        assert_ne!(clone, div);
        assert_eq!(table.len(), 4);

        let cloned_canvas = clone.select_first("canvas").expect("canvas").as_node().clone();
        let live_canvas = div.select_first("canvas").expect("canvas").as_node().clone();
        assert_eq!(table.original(&cloned_canvas), Some(&live_canvas));
    }

    #[test]
    fn test_clone_attributes_are_independent() {
        let doc = kuchiki::parse_html().one("<img src=a.png>");
        let img = doc.select_first("img").expect("img").as_node().clone();
        let mut table = RefTable::new();
        let clone = table.shallow_clone(&img);
        crate::dom::node::set_attr(&clone, "src", "b.png");
        assert_eq!(crate::dom::node::get_attr(&img, "src").as_deref(), Some("a.png"));
    }
}

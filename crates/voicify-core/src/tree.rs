//! Live interface tree abstraction.
//!
//! The replay engine never talks to a platform accessibility API directly.
//! It reads the foreground tree through [`UiNode`] handles, which are
//! reference counted and released when the last handle is dropped.
//!
//! All walks are iterative over an explicit stack so deep layouts cannot
//! overflow the replay worker's stack.

use std::fmt;
use std::sync::Arc;

use crate::geometry::Rect;

/// Stable identifier of a node within its window.
pub type NodeId = u64;

/// Shared handle to a live interface element.
pub type NodeHandle = Arc<dyn UiNode>;

/// One element of the foreground interface tree.
pub trait UiNode: Send + Sync + fmt::Debug {
    /// Identifier that stays the same for as long as the element is on
    /// screen. Used to tell whether navigation moved the selection.
    fn node_id(&self) -> NodeId;

    /// Identifier of the window this element belongs to.
    fn window_id(&self) -> i64;

    /// Identifier of the application owning the window, if known.
    fn app_identifier(&self) -> Option<&str>;

    /// Toolkit type name, e.g. `android.widget.ListView`.
    fn class_name(&self) -> &str;

    fn text(&self) -> Option<&str>;

    fn content_label(&self) -> Option<&str>;

    /// Bounds in absolute screen coordinates.
    fn bounds(&self) -> Rect;

    fn children(&self) -> Vec<NodeHandle>;

    fn parent(&self) -> Option<NodeHandle>;

    /// Ask the toolkit to give this element input focus. Returns whether
    /// the focus request took effect.
    fn focus(&self) -> bool;

    /// Whether the element has non-empty text or a non-empty content label.
    fn has_readable_content(&self) -> bool {
        self.text().is_some_and(|t| !t.is_empty())
            || self.content_label().is_some_and(|l| !l.is_empty())
    }
}

/// Collect every node accepted by `wanted`, in pre-order.
///
/// The root is always considered. When `regions` is given, a child subtree
/// is only entered if the child's bounds intersect at least one region;
/// with `None` the whole tree is walked.
pub fn collect_nodes<F>(root: &NodeHandle, regions: Option<&[Rect]>, mut wanted: F) -> Vec<NodeHandle>
where
    F: FnMut(&dyn UiNode) -> bool,
{
    let mut found = Vec::new();
    let mut stack: Vec<NodeHandle> = vec![Arc::clone(root)];

    while let Some(node) = stack.pop() {
        if wanted(node.as_ref()) {
            found.push(Arc::clone(&node));
        }

        let children = node.children();
        // Reverse so the first child is popped first.
        for child in children.into_iter().rev() {
            let in_regions = match regions {
                Some(regions) => {
                    let bounds = child.bounds();
                    regions.iter().any(|region| bounds.intersects(region))
                }
                None => true,
            };
            if in_regions {
                stack.push(child);
            }
        }
    }

    found
}

/// Every node whose text contains `needle`, ignoring case.
pub fn find_by_text(root: &NodeHandle, needle: &str) -> Vec<NodeHandle> {
    let needle = needle.to_lowercase();
    collect_nodes(root, None, |node| {
        node.text()
            .is_some_and(|text| text.to_lowercase().contains(&needle))
    })
}

/// Every node whose content label contains `needle`, ignoring case.
pub fn find_by_content_label(root: &NodeHandle, needle: &str) -> Vec<NodeHandle> {
    let needle = needle.to_lowercase();
    collect_nodes(root, None, |node| {
        node.content_label()
            .is_some_and(|label| label.to_lowercase().contains(&needle))
    })
}

/// Walk `levels` steps up the parent chain.
pub fn ancestor(node: &NodeHandle, levels: usize) -> Option<NodeHandle> {
    let mut current = Arc::clone(node);
    for _ in 0..levels {
        current = current.parent()?;
    }
    Some(current)
}

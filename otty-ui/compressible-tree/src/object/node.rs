use std::fmt;

use super::{NodeId, ObjectTreeModel, ROOT, Slot, TreeVisibility};
use crate::element::TreeElement;

/// Read-only handle to a node held by an [`ObjectTreeModel`].
///
/// Handles are cheap to copy and borrow the model, so they cannot outlive
/// the next mutation.
pub struct TreeNode<'a, K> {
    pub(super) model: &'a ObjectTreeModel<K>,
    pub(super) id: NodeId,
}

impl<K> Clone for TreeNode<'_, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for TreeNode<'_, K> {}

impl<'a, K> TreeNode<'a, K> {
    fn slot(&self) -> &'a Slot<K> {
        self.model.slot(self.id)
    }

    /// Element stored in the node, `None` for the root.
    pub fn element(&self) -> Option<&'a K> {
        self.slot().element.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT
    }

    /// Zero for the root, one for its children.
    pub fn depth(&self) -> usize {
        self.slot().depth
    }

    pub fn parent(self) -> Option<TreeNode<'a, K>> {
        let model = self.model;
        self.slot().parent.map(|id| TreeNode { model, id })
    }

    pub fn children(
        self,
    ) -> impl ExactSizeIterator<Item = TreeNode<'a, K>> + DoubleEndedIterator
    {
        let model = self.model;
        self.slot()
            .children
            .iter()
            .map(move |&id| TreeNode { model, id })
    }

    pub fn child_count(&self) -> usize {
        self.slot().children.len()
    }

    pub fn collapsible(&self) -> bool {
        self.slot().is_collapsible()
    }

    /// Whether the node hides its children. Never true for a node that
    /// cannot collapse.
    pub fn collapsed(&self) -> bool {
        self.slot().is_collapsed()
    }

    /// Whether the node passes the filter.
    pub fn visible(&self) -> bool {
        self.slot().visible
    }

    /// Filter verdict for the node. Nodes below a hidden ancestor are
    /// `Hidden` without being filtered.
    pub fn visibility(&self) -> TreeVisibility {
        self.slot().visibility
    }

    pub fn visible_children_count(&self) -> usize {
        self.slot().visible_children_count
    }

    /// Rows rendered by this node and its expanded descendants.
    pub fn render_node_count(&self) -> usize {
        self.slot().render_node_count
    }

    /// Copy this subtree into a fragment that recreates it, collapse state
    /// included. `None` for the root.
    pub(crate) fn snapshot(self) -> Option<TreeElement<K>>
    where
        K: Clone,
    {
        let slot = self.slot();
        let element = slot.element.clone()?;
        Some(TreeElement {
            element,
            children: self.children().filter_map(TreeNode::snapshot).collect(),
            incompressible: false,
            collapsible: slot.collapsible,
            collapsed: Some(slot.collapsed),
        })
    }
}

impl<K: fmt::Debug> fmt::Debug for TreeNode<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeNode")
            .field("element", &self.element())
            .field("depth", &self.depth())
            .field("collapsed", &self.collapsed())
            .field("visible", &self.visible())
            .finish()
    }
}

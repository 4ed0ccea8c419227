use std::cmp::Ordering;
use std::fmt;

/// Filter verdict for a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeVisibility {
    /// Hide the node and its whole subtree.
    Hidden,
    /// Show the node.
    #[default]
    Visible,
    /// Show the node only while one of its children is visible.
    Recurse,
}

/// Decides the visibility of an element given its parent's visibility.
pub type TreeFilter<K> = dyn Fn(&K, TreeVisibility) -> TreeVisibility;

/// Orders siblings.
pub type TreeSorter<K> = dyn Fn(&K, &K) -> Ordering;

/// Stable identity of an element, used to carry collapse state over when a
/// subtree is replaced.
pub type IdentityProvider<K> = dyn Fn(&K) -> String;

/// Configuration options for the [`ObjectTreeModel`](super::ObjectTreeModel).
pub struct ObjectTreeModelOptions<K> {
    /// Label used in error messages to tell trees apart.
    pub user: String,
    /// Collapse state of nodes that do not state one.
    pub collapse_by_default: bool,
    /// Expanding a node with a single child expands that child as well.
    pub auto_expand_single_children: bool,
    pub filter: Option<Box<TreeFilter<K>>>,
    pub sorter: Option<Box<TreeSorter<K>>>,
    pub identity_provider: Option<Box<IdentityProvider<K>>>,
}

impl<K> Default for ObjectTreeModelOptions<K> {
    fn default() -> Self {
        Self {
            user: String::from("tree"),
            collapse_by_default: false,
            auto_expand_single_children: false,
            filter: None,
            sorter: None,
            identity_provider: None,
        }
    }
}

impl<K> fmt::Debug for ObjectTreeModelOptions<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectTreeModelOptions")
            .field("user", &self.user)
            .field("collapse_by_default", &self.collapse_by_default)
            .field(
                "auto_expand_single_children",
                &self.auto_expand_single_children,
            )
            .field("filter", &self.filter.is_some())
            .field("sorter", &self.sorter.is_some())
            .field("identity_provider", &self.identity_provider.is_some())
            .finish()
    }
}

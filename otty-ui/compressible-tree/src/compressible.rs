//! Raw-element façade over the [`CompressedObjectTreeModel`].
//!
//! Callers never see compressed nodes unless they ask for them: every node
//! is shown as the single element picked by an [`ElementMapper`], and every
//! event is rewritten in terms of those elements.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use flume::Receiver;

use crate::compress::{Chain, CompressedTreeNode};
use crate::compressed::{
    CompressedObjectTreeModel, CompressedObjectTreeModelOptions,
};
use crate::element::TreeElement;
use crate::error::Result;
use crate::event::{EventEmitter, TreeEvent};
use crate::object::{
    IdentityProvider, ObjectTreeModelOptions, TreeFilter, TreeNode,
    TreeSorter, TreeVisibility,
};

/// Picks the element that stands for a whole chain.
pub type ElementMapper<T> = dyn Fn(&[T]) -> T;

/// Shows a chain as its last element.
pub fn default_element_mapper<T: Clone>(elements: &[T]) -> T {
    elements[elements.len() - 1].clone()
}

/// Mapped elements keyed by compressed node identity.
struct ElementCache<T> {
    mapper: Box<ElementMapper<T>>,
    entries: RefCell<HashMap<usize, (Weak<Chain<T>>, T)>>,
}

impl<T: Clone> ElementCache<T> {
    fn new(mapper: Box<ElementMapper<T>>) -> Self {
        Self {
            mapper,
            entries: RefCell::new(HashMap::new()),
        }
    }

    fn element(&self, node: &CompressedTreeNode<T>) -> T {
        let address = node.address();
        if let Some((chain, element)) = self.entries.borrow().get(&address) {
            if node.is(chain) {
                return element.clone();
            }
        }

        let element = (self.mapper)(node.elements());
        self.entries
            .borrow_mut()
            .insert(address, (node.downgrade(), element.clone()));
        element
    }

    /// Forget nodes that no longer exist.
    fn prune(&self) {
        self.entries
            .borrow_mut()
            .retain(|_, (chain, _)| chain.strong_count() > 0);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

/// Configuration options for the [`CompressibleObjectTreeModel`].
///
/// Strategies are written against raw elements; they see the element the
/// mapper picks for each chain.
pub struct CompressibleObjectTreeModelOptions<T> {
    pub user: String,
    pub compression_enabled: bool,
    pub collapse_by_default: bool,
    pub auto_expand_single_children: bool,
    pub filter: Option<Box<TreeFilter<T>>>,
    pub sorter: Option<Box<TreeSorter<T>>>,
    pub identity_provider: Option<Box<IdentityProvider<T>>>,
    /// Defaults to [`default_element_mapper`].
    pub element_mapper: Option<Box<ElementMapper<T>>>,
}

impl<T> Default for CompressibleObjectTreeModelOptions<T> {
    fn default() -> Self {
        Self {
            user: String::from("tree"),
            compression_enabled: true,
            collapse_by_default: false,
            auto_expand_single_children: false,
            filter: None,
            sorter: None,
            identity_provider: None,
            element_mapper: None,
        }
    }
}

impl<T> fmt::Debug for CompressibleObjectTreeModelOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressibleObjectTreeModelOptions")
            .field("user", &self.user)
            .field("compression_enabled", &self.compression_enabled)
            .field("collapse_by_default", &self.collapse_by_default)
            .field(
                "auto_expand_single_children",
                &self.auto_expand_single_children,
            )
            .field("filter", &self.filter.is_some())
            .field("sorter", &self.sorter.is_some())
            .field("identity_provider", &self.identity_provider.is_some())
            .field("element_mapper", &self.element_mapper.is_some())
            .finish()
    }
}

fn adapt_filter<T: Clone + 'static>(
    filter: Box<TreeFilter<T>>,
    elements: Rc<ElementCache<T>>,
) -> Box<TreeFilter<CompressedTreeNode<T>>> {
    Box::new(
        move |node: &CompressedTreeNode<T>, parent: TreeVisibility| {
            filter(&elements.element(node), parent)
        },
    )
}

fn adapt_sorter<T: Clone + 'static>(
    sorter: Box<TreeSorter<T>>,
    elements: Rc<ElementCache<T>>,
) -> Box<TreeSorter<CompressedTreeNode<T>>> {
    Box::new(
        move |left: &CompressedTreeNode<T>, right: &CompressedTreeNode<T>| {
            sorter(&elements.element(left), &elements.element(right))
        },
    )
}

fn adapt_identity<T: Clone + 'static>(
    identity: Box<IdentityProvider<T>>,
    elements: Rc<ElementCache<T>>,
) -> Box<IdentityProvider<CompressedTreeNode<T>>> {
    Box::new(move |node: &CompressedTreeNode<T>| {
        identity(&elements.element(node))
    })
}

/// Node handle that shows its chain as one mapped element.
pub struct CompressibleTreeNode<'a, T> {
    node: TreeNode<'a, CompressedTreeNode<T>>,
    elements: &'a ElementCache<T>,
}

impl<T> Clone for CompressibleTreeNode<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for CompressibleTreeNode<'_, T> {}

impl<'a, T: Clone> CompressibleTreeNode<'a, T> {
    /// Mapped element, `None` for the root.
    pub fn element(&self) -> Option<T> {
        self.node.element().map(|node| self.elements.element(node))
    }

    /// The chain behind this node.
    pub fn compressed(&self) -> Option<&'a CompressedTreeNode<T>> {
        self.node.element()
    }

    pub fn depth(&self) -> usize {
        self.node.depth()
    }

    pub fn parent(self) -> Option<CompressibleTreeNode<'a, T>> {
        let elements = self.elements;
        self.node
            .parent()
            .map(|node| CompressibleTreeNode { node, elements })
    }

    pub fn children(
        self,
    ) -> impl ExactSizeIterator<Item = CompressibleTreeNode<'a, T>>
    + DoubleEndedIterator {
        let elements = self.elements;
        self.node
            .children()
            .map(move |node| CompressibleTreeNode { node, elements })
    }

    pub fn child_count(&self) -> usize {
        self.node.child_count()
    }

    pub fn collapsible(&self) -> bool {
        self.node.collapsible()
    }

    pub fn collapsed(&self) -> bool {
        self.node.collapsed()
    }

    pub fn visible(&self) -> bool {
        self.node.visible()
    }

    pub fn visible_children_count(&self) -> usize {
        self.node.visible_children_count()
    }

    pub fn render_node_count(&self) -> usize {
        self.node.render_node_count()
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for CompressibleTreeNode<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressibleTreeNode")
            .field("element", &self.element())
            .field("depth", &self.depth())
            .field("collapsed", &self.collapsed())
            .finish()
    }
}

/// Tree model addressed and reported purely in raw elements, with
/// single-child chains shown as one row.
pub struct CompressibleObjectTreeModel<T> {
    model: CompressedObjectTreeModel<T>,
    elements: Rc<ElementCache<T>>,
    inner_events: Receiver<TreeEvent<CompressedTreeNode<T>>>,
    events: EventEmitter<TreeEvent<T>>,
}

impl<T> CompressibleObjectTreeModel<T>
where
    T: Clone + Eq + Hash + fmt::Debug + 'static,
{
    pub fn new(options: CompressibleObjectTreeModelOptions<T>) -> Self {
        let CompressibleObjectTreeModelOptions {
            user,
            compression_enabled,
            collapse_by_default,
            auto_expand_single_children,
            filter,
            sorter,
            identity_provider,
            element_mapper,
        } = options;

        let mapper = element_mapper
            .unwrap_or_else(|| Box::new(default_element_mapper::<T>));
        let elements = Rc::new(ElementCache::new(mapper));

        let model_options = ObjectTreeModelOptions {
            user,
            collapse_by_default,
            auto_expand_single_children,
            filter: filter
                .map(|filter| adapt_filter(filter, Rc::clone(&elements))),
            sorter: sorter
                .map(|sorter| adapt_sorter(sorter, Rc::clone(&elements))),
            identity_provider: identity_provider.map(|identity| {
                adapt_identity(identity, Rc::clone(&elements))
            }),
        };
        let mut model =
            CompressedObjectTreeModel::new(CompressedObjectTreeModelOptions {
                compression_enabled,
                model: model_options,
            });
        let inner_events = model.subscribe();

        Self {
            model,
            elements,
            inner_events,
            events: EventEmitter::new(),
        }
    }

    pub fn user(&self) -> &str {
        self.model.user()
    }

    /// Receive every event emitted from now on, in raw elements.
    pub fn subscribe(&mut self) -> Receiver<TreeEvent<T>> {
        self.events.subscribe()
    }

    pub fn set_children<I>(
        &mut self,
        element: Option<&T>,
        children: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = TreeElement<T>>,
    {
        let result = self.model.set_children(element, children);
        self.settle();
        result
    }

    pub fn is_compression_enabled(&self) -> bool {
        self.model.is_compression_enabled()
    }

    pub fn set_compression_enabled(&mut self, enabled: bool) -> Result<()> {
        let result = self.model.set_compression_enabled(enabled);
        self.settle();
        result
    }

    pub fn get_list_index(
        &self,
        location: Option<&T>,
    ) -> Result<Option<usize>> {
        self.model.get_list_index(location)
    }

    pub fn get_list_render_count(&self, location: Option<&T>) -> Result<usize> {
        self.model.get_list_render_count(location)
    }

    pub fn get_node(
        &self,
        location: Option<&T>,
    ) -> Result<CompressibleTreeNode<'_, T>> {
        let node = self.model.get_node(location)?;
        Ok(self.wrap(node))
    }

    /// The underlying node, compressed chain included.
    pub fn get_compressed_tree_node(
        &self,
        location: Option<&T>,
    ) -> Result<TreeNode<'_, CompressedTreeNode<T>>> {
        self.model.get_node(location)
    }

    /// Last element of the chain behind `node`.
    pub fn get_node_location(
        &self,
        node: &CompressibleTreeNode<'_, T>,
    ) -> Option<T> {
        self.model.get_node_location(&node.node)
    }

    pub fn get_parent_node_location(
        &self,
        location: Option<&T>,
    ) -> Result<Option<T>> {
        self.model.get_parent_node_location(location)
    }

    pub fn get_first_element_child(
        &self,
        location: Option<&T>,
    ) -> Result<Option<T>> {
        let node = self.model.get_first_element_child(location)?;
        Ok(node.map(|node| self.elements.element(&node)))
    }

    pub fn get_last_element_ancestor(
        &self,
        location: Option<&T>,
    ) -> Result<Option<T>> {
        let node = self.model.get_last_element_ancestor(location)?;
        Ok(node.map(|node| self.elements.element(&node)))
    }

    pub fn is_collapsible(&self, location: Option<&T>) -> Result<bool> {
        self.model.is_collapsible(location)
    }

    pub fn set_collapsible(
        &mut self,
        location: &T,
        collapsible: Option<bool>,
    ) -> Result<bool> {
        let result = self.model.set_collapsible(location, collapsible);
        self.settle();
        result
    }

    pub fn is_collapsed(&self, location: Option<&T>) -> Result<bool> {
        self.model.is_collapsed(location)
    }

    pub fn set_collapsed(
        &mut self,
        location: Option<&T>,
        collapsed: Option<bool>,
        recursive: bool,
    ) -> Result<bool> {
        let result = self.model.set_collapsed(location, collapsed, recursive);
        self.settle();
        result
    }

    pub fn expand_to(&mut self, location: Option<&T>) -> Result<()> {
        let result = self.model.expand_to(location);
        self.settle();
        result
    }

    pub fn rerender(&mut self, location: Option<&T>) -> Result<()> {
        let result = self.model.rerender(location);
        self.settle();
        result
    }

    pub fn refilter(&mut self) {
        self.model.refilter();
        self.settle();
    }

    pub fn resort(
        &mut self,
        location: Option<&T>,
        recursive: bool,
    ) -> Result<()> {
        let result = self.model.resort(location, recursive);
        self.settle();
        result
    }

    /// Rendered rows in list order.
    pub fn visible_rows(&self) -> Vec<CompressibleTreeNode<'_, T>> {
        self.model
            .visible_rows()
            .into_iter()
            .map(|node| self.wrap(node))
            .collect()
    }

    fn wrap<'a>(
        &'a self,
        node: TreeNode<'a, CompressedTreeNode<T>>,
    ) -> CompressibleTreeNode<'a, T> {
        CompressibleTreeNode {
            node,
            elements: &self.elements,
        }
    }

    /// Forward pending events in raw elements, then drop cache entries of
    /// nodes that are gone.
    fn settle(&mut self) {
        let elements = &self.elements;
        for event in self.inner_events.drain() {
            self.events.emit(event.map(|node| elements.element(&node)));
        }
        self.elements.prune();
    }
}

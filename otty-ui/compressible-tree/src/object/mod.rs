//! Generic ordered tree keyed by its elements.
//!
//! [`ObjectTreeModel`] stores the nodes, tracks collapse and filter state,
//! keeps per-node render counts for a virtualized list and reports every
//! structural change through [`TreeEvent`]s.

mod node;
mod options;

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::mem;

use flume::Receiver;
use log::{debug, trace};

pub use node::TreeNode;
pub use options::{
    IdentityProvider, ObjectTreeModelOptions, TreeFilter, TreeSorter,
    TreeVisibility,
};

use crate::element::TreeElement;
use crate::error::{Result, TreeError};
use crate::event::{EventEmitter, TreeEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct NodeId(usize);

const ROOT: NodeId = NodeId(0);

#[derive(Debug)]
struct Slot<K> {
    element: Option<K>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    depth: usize,
    collapsible: Option<bool>,
    collapsed: bool,
    visibility: TreeVisibility,
    visible: bool,
    visible_children_count: usize,
    render_node_count: usize,
}

impl<K> Slot<K> {
    fn root() -> Self {
        Self {
            element: None,
            parent: None,
            children: Vec::new(),
            depth: 0,
            collapsible: Some(false),
            collapsed: false,
            visibility: TreeVisibility::Visible,
            visible: true,
            visible_children_count: 0,
            render_node_count: 0,
        }
    }

    fn is_collapsible(&self) -> bool {
        self.collapsible.unwrap_or(!self.children.is_empty())
    }

    fn is_collapsed(&self) -> bool {
        self.collapsed && self.is_collapsible()
    }
}

/// Fragment pulled into memory and sorted, ready to be committed.
struct Staged<K> {
    element: K,
    collapsible: Option<bool>,
    collapsed: Option<bool>,
    children: Vec<Staged<K>>,
}

/// Ordered, filterable, sortable tree keyed by element.
///
/// Locations are `Option<&K>`: `None` is the root, which holds no element
/// and is never rendered.
pub struct ObjectTreeModel<K> {
    options: ObjectTreeModelOptions<K>,
    slots: Vec<Slot<K>>,
    free: Vec<NodeId>,
    index: HashMap<K, NodeId>,
    events: EventEmitter<TreeEvent<K>>,
}

impl<K> ObjectTreeModel<K> {
    fn slot(&self, id: NodeId) -> &Slot<K> {
        &self.slots[id.0]
    }

    fn slot_mut(&mut self, id: NodeId) -> &mut Slot<K> {
        &mut self.slots[id.0]
    }
}

impl<K> ObjectTreeModel<K>
where
    K: Clone + Eq + Hash + fmt::Debug,
{
    pub fn new(options: ObjectTreeModelOptions<K>) -> Self {
        Self {
            options,
            slots: vec![Slot::root()],
            free: Vec::new(),
            index: HashMap::new(),
            events: EventEmitter::new(),
        }
    }

    /// Label used in error messages.
    pub fn user(&self) -> &str {
        &self.options.user
    }

    /// Number of elements in the tree.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, element: &K) -> bool {
        self.index.contains_key(element)
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&mut self) -> Receiver<TreeEvent<K>> {
        self.events.subscribe()
    }

    /// Replace the children of `parent` with `children`.
    ///
    /// The fragment is fully materialized and validated before anything
    /// changes. `on_deleted` is called for every removed node and
    /// `on_created` for every new node, both in pre-order, removals first.
    pub fn set_children<I>(
        &mut self,
        parent: Option<&K>,
        children: I,
        on_created: &mut dyn FnMut(&K),
        on_deleted: &mut dyn FnMut(&K),
    ) -> Result<()>
    where
        I: IntoIterator<Item = TreeElement<K>>,
    {
        let parent = self.resolve(parent)?;
        let staged = self.stage(children);
        self.check_duplicates(parent, &staged)?;
        let preserved = self.preserved_collapse_state(parent);

        let old_children = mem::take(&mut self.slot_mut(parent).children);
        let mut deleted = Vec::with_capacity(old_children.len());
        for id in old_children {
            if let Some(element) = self.slot(id).element.clone() {
                deleted.push(element);
            }
            self.release_subtree(id, on_deleted);
        }

        let depth = self.slot(parent).depth + 1;
        let mut inserted = Vec::with_capacity(staged.len());
        let mut created = Vec::with_capacity(staged.len());
        for item in staged {
            inserted.push(item.element.clone());
            created.push(self.create_subtree(
                item,
                parent,
                depth,
                &preserved,
                on_created,
            ));
        }
        self.slot_mut(parent).children = created.clone();

        let parent_visibility = self.slot(parent).visibility;
        for id in created {
            self.refresh_subtree(id, parent_visibility);
        }

        debug!(
            "tree[{}] spliced {} node(s) over {} under {:?}",
            self.options.user,
            inserted.len(),
            deleted.len(),
            self.slot(parent).element
        );
        self.events.emit(TreeEvent::Splice { inserted, deleted });
        self.refresh_ancestors(parent);
        Ok(())
    }

    pub fn get_node(&self, location: Option<&K>) -> Result<TreeNode<'_, K>> {
        let id = self.resolve(location)?;
        Ok(TreeNode { model: self, id })
    }

    /// Location of a node handed out by this model.
    pub fn get_node_location(&self, node: &TreeNode<'_, K>) -> Option<K> {
        node.element().cloned()
    }

    pub fn get_parent_node_location(
        &self,
        location: Option<&K>,
    ) -> Result<Option<K>> {
        let id = self.resolve(location)?;
        Ok(self
            .slot(id)
            .parent
            .and_then(|parent| self.slot(parent).element.clone()))
    }

    pub fn get_first_element_child(
        &self,
        location: Option<&K>,
    ) -> Result<Option<K>> {
        let id = self.resolve(location)?;
        Ok(self
            .slot(id)
            .children
            .first()
            .and_then(|&child| self.slot(child).element.clone()))
    }

    /// Deepest last descendant of `location`, following the last child at
    /// every level.
    pub fn get_last_element_ancestor(
        &self,
        location: Option<&K>,
    ) -> Result<Option<K>> {
        let mut id = self.resolve(location)?;
        while let Some(&last) = self.slot(id).children.last() {
            id = last;
        }
        Ok(self.slot(id).element.clone().filter(|_| id != ROOT))
    }

    /// Row of `location` in the flattened list of rendered nodes.
    ///
    /// `None` for the root, for filtered out nodes and for nodes below a
    /// collapsed ancestor.
    pub fn get_list_index(
        &self,
        location: Option<&K>,
    ) -> Result<Option<usize>> {
        let id = self.resolve(location)?;
        Ok(self.list_index(id))
    }

    pub fn get_list_render_count(&self, location: Option<&K>) -> Result<usize> {
        let id = self.resolve(location)?;
        Ok(self.slot(id).render_node_count)
    }

    pub fn is_collapsible(&self, location: Option<&K>) -> Result<bool> {
        let id = self.resolve(location)?;
        Ok(self.slot(id).is_collapsible())
    }

    /// Set, or toggle when `collapsible` is `None`, whether `location` can
    /// collapse. A node that can no longer collapse is expanded.
    ///
    /// Returns whether the node changed.
    pub fn set_collapsible(
        &mut self,
        location: &K,
        collapsible: Option<bool>,
    ) -> Result<bool> {
        let id = self.resolve(Some(location))?;
        let slot = self.slot_mut(id);
        let was_collapsible = slot.is_collapsible();
        let was_collapsed = slot.is_collapsed();
        let collapsible = collapsible.unwrap_or(!was_collapsible);

        slot.collapsible = Some(collapsible);
        if !collapsible {
            slot.collapsed = false;
        }
        if was_collapsible == collapsible {
            return Ok(false);
        }

        if slot.is_collapsed() != was_collapsed {
            let event = TreeEvent::CollapseStateChange {
                element: location.clone(),
                collapsed: slot.is_collapsed(),
                deep: false,
            };
            self.events.emit(event);
        }
        self.refresh_ancestors(id);
        Ok(true)
    }

    pub fn is_collapsed(&self, location: Option<&K>) -> Result<bool> {
        let id = self.resolve(location)?;
        Ok(self.slot(id).is_collapsed())
    }

    /// Collapse or expand `location`, toggling when `collapsed` is `None`.
    /// `recursive` applies the same state to every descendant.
    ///
    /// Returns whether any node changed.
    pub fn set_collapsed(
        &mut self,
        location: Option<&K>,
        collapsed: Option<bool>,
        recursive: bool,
    ) -> Result<bool> {
        let id = self.resolve(location)?;
        let collapsed =
            collapsed.unwrap_or_else(|| !self.slot(id).is_collapsed());

        let mut changed = Vec::new();
        self.apply_collapse(id, collapsed, recursive, &mut changed);
        Ok(self.commit_collapse(id, &changed, recursive))
    }

    /// Expand every ancestor of `location`.
    pub fn expand_to(&mut self, location: Option<&K>) -> Result<()> {
        let id = self.resolve(location)?;
        let mut ancestors = Vec::new();
        let mut current = self.slot(id).parent;
        while let Some(ancestor) =
            current.filter(|&ancestor| ancestor != ROOT)
        {
            ancestors.push(ancestor);
            current = self.slot(ancestor).parent;
        }

        let mut changed = Vec::new();
        for &ancestor in ancestors.iter().rev() {
            self.apply_collapse(ancestor, false, false, &mut changed);
        }
        if let Some(top) = ancestors.last().copied() {
            self.commit_collapse(top, &changed, false);
        }
        Ok(())
    }

    /// Ask the list to draw the rows of `location` again.
    pub fn rerender(&mut self, location: Option<&K>) -> Result<()> {
        let id = self.resolve(location)?;
        let element = self.slot(id).element.clone();
        self.events.emit(TreeEvent::Rerender { element });
        Ok(())
    }

    /// Run the filter over the whole tree again.
    pub fn refilter(&mut self) {
        for id in self.slot(ROOT).children.clone() {
            self.refresh_subtree(id, TreeVisibility::Visible);
        }
        self.refresh_ancestors(ROOT);
        self.events.emit(TreeEvent::Rerender { element: None });
    }

    /// Sort the children of `location` again, and their descendants when
    /// `recursive` is set. Does nothing without a sorter.
    pub fn resort(
        &mut self,
        location: Option<&K>,
        recursive: bool,
    ) -> Result<()> {
        let id = self.resolve(location)?;
        if self.options.sorter.is_none() {
            return Ok(());
        }

        self.sort_children(id, recursive);
        let element = self.slot(id).element.clone();
        self.events.emit(TreeEvent::Rerender { element });
        Ok(())
    }

    /// Rendered nodes in list order, depth first.
    pub fn visible_rows(&self) -> Vec<TreeNode<'_, K>> {
        let mut rows = Vec::with_capacity(self.slot(ROOT).render_node_count);
        for &child in &self.slot(ROOT).children {
            self.push_rows(child, &mut rows);
        }
        rows
    }

    /// Whether `element` sits below `ancestor`; every element sits below
    /// the root.
    pub(crate) fn is_within(&self, element: &K, ancestor: Option<&K>) -> bool {
        let Some(&id) = self.index.get(element) else {
            return false;
        };
        match self.resolve(ancestor) {
            Ok(ancestor) => self.is_below(id, ancestor),
            Err(_) => false,
        }
    }

    fn resolve(&self, location: Option<&K>) -> Result<NodeId> {
        match location {
            None => Ok(ROOT),
            Some(element) => self
                .index
                .get(element)
                .copied()
                .ok_or_else(|| self.not_found(element)),
        }
    }

    fn not_found(&self, element: &K) -> TreeError {
        TreeError::ElementNotFound {
            user: self.options.user.clone(),
            element: format!("{element:?}"),
        }
    }

    fn duplicate(&self, element: &K) -> TreeError {
        TreeError::DuplicateElement {
            user: self.options.user.clone(),
            element: format!("{element:?}"),
        }
    }

    fn identity(&self, element: &K) -> Option<String> {
        self.options
            .identity_provider
            .as_ref()
            .map(|identity| identity(element))
    }

    fn is_below(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.slot(id).parent;
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.slot(parent).parent;
        }
        false
    }

    fn stage<I>(&self, children: I) -> Vec<Staged<K>>
    where
        I: IntoIterator<Item = TreeElement<K>>,
    {
        let mut staged: Vec<Staged<K>> = children
            .into_iter()
            .map(|child| Staged {
                element: child.element,
                collapsible: child.collapsible,
                collapsed: child.collapsed,
                children: self.stage(child.children),
            })
            .collect();
        if let Some(sorter) = &self.options.sorter {
            staged.sort_by(|left, right| sorter(&left.element, &right.element));
        }
        staged
    }

    /// Elements may only be reused from the subtree being replaced.
    fn check_duplicates(
        &self,
        parent: NodeId,
        staged: &[Staged<K>],
    ) -> Result<()> {
        let mut seen = HashSet::new();
        let mut pending: Vec<&Staged<K>> = staged.iter().collect();
        while let Some(item) = pending.pop() {
            let elsewhere = self
                .index
                .get(&item.element)
                .is_some_and(|&id| !self.is_below(id, parent));
            if elsewhere || !seen.insert(&item.element) {
                return Err(self.duplicate(&item.element));
            }
            pending.extend(&item.children);
        }
        Ok(())
    }

    fn preserved_collapse_state(
        &self,
        parent: NodeId,
    ) -> HashMap<String, bool> {
        let mut preserved = HashMap::new();
        if self.options.identity_provider.is_none() {
            return preserved;
        }

        let mut pending = self.slot(parent).children.clone();
        while let Some(id) = pending.pop() {
            let slot = self.slot(id);
            if let Some(identity) =
                slot.element.as_ref().and_then(|element| self.identity(element))
            {
                preserved.insert(identity, slot.collapsed);
            }
            pending.extend(&slot.children);
        }
        preserved
    }

    fn allocate(&mut self, slot: Slot<K>) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.slots[id.0] = slot;
                id
            },
            None => {
                self.slots.push(slot);
                NodeId(self.slots.len() - 1)
            },
        }
    }

    fn create_subtree(
        &mut self,
        item: Staged<K>,
        parent: NodeId,
        depth: usize,
        preserved: &HashMap<String, bool>,
        on_created: &mut dyn FnMut(&K),
    ) -> NodeId {
        let Staged {
            element,
            collapsible,
            collapsed,
            children,
        } = item;
        let collapsed = collapsed
            .or_else(|| {
                self.identity(&element)
                    .and_then(|identity| preserved.get(&identity).copied())
            })
            .unwrap_or(self.options.collapse_by_default);

        let id = self.allocate(Slot {
            element: Some(element.clone()),
            parent: Some(parent),
            children: Vec::new(),
            depth,
            collapsible,
            collapsed,
            visibility: TreeVisibility::Visible,
            visible: true,
            visible_children_count: 0,
            render_node_count: 0,
        });
        trace!("tree[{}] created {element:?}", self.options.user);
        self.index.insert(element.clone(), id);
        on_created(&element);

        let mut created = Vec::with_capacity(children.len());
        for child in children {
            created.push(self.create_subtree(
                child,
                id,
                depth + 1,
                preserved,
                on_created,
            ));
        }
        self.slot_mut(id).children = created;
        id
    }

    fn release_subtree(&mut self, id: NodeId, on_deleted: &mut dyn FnMut(&K)) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let slot = &mut self.slots[id.0];
            let children = mem::take(&mut slot.children);
            slot.parent = None;
            if let Some(element) = slot.element.take() {
                trace!("tree[{}] released {element:?}", self.options.user);
                self.index.remove(&element);
                on_deleted(&element);
            }
            pending.extend(children.into_iter().rev());
            self.free.push(id);
        }
    }

    /// Run the filter over a subtree and recount it bottom-up.
    ///
    /// Descendants of a hidden node are not filtered. They are hidden too.
    fn refresh_subtree(
        &mut self,
        id: NodeId,
        parent_visibility: TreeVisibility,
    ) {
        if parent_visibility == TreeVisibility::Hidden {
            self.hide_subtree(id);
            return;
        }

        let visibility =
            match (&self.options.filter, &self.slot(id).element) {
                (Some(filter), Some(element)) => {
                    filter(element, parent_visibility)
                },
                _ => TreeVisibility::Visible,
            };
        self.slot_mut(id).visibility = visibility;

        for child in self.slot(id).children.clone() {
            self.refresh_subtree(child, visibility);
        }
        self.recount(id);
    }

    fn hide_subtree(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let slot = self.slot_mut(id);
            slot.visibility = TreeVisibility::Hidden;
            slot.visible = false;
            slot.visible_children_count = 0;
            slot.render_node_count = 0;
            pending.extend(slot.children.iter().copied());
        }
    }

    fn recount(&mut self, id: NodeId) {
        let slot = self.slot(id);
        let mut visible_children = 0;
        let mut child_rows = 0;
        for &child in &slot.children {
            let child = self.slot(child);
            if child.visible {
                visible_children += 1;
                child_rows += child.render_node_count;
            }
        }

        let visible = match slot.visibility {
            TreeVisibility::Hidden => false,
            TreeVisibility::Visible => true,
            TreeVisibility::Recurse => visible_children > 0,
        };
        let render_node_count = if !visible {
            0
        } else if id == ROOT {
            child_rows
        } else if slot.is_collapsed() {
            1
        } else {
            1 + child_rows
        };

        let slot = self.slot_mut(id);
        slot.visible = visible;
        slot.visible_children_count = visible_children;
        slot.render_node_count = render_node_count;
    }

    fn recount_descendants(&mut self, id: NodeId) {
        for child in self.slot(id).children.clone() {
            self.recount_descendants(child);
            self.recount(child);
        }
    }

    /// Recount `from` and every ancestor, reporting changed render counts.
    fn refresh_ancestors(&mut self, from: NodeId) {
        let mut current = Some(from);
        while let Some(id) = current {
            let before = self.slot(id).render_node_count;
            self.recount(id);

            let slot = self.slot(id);
            current = slot.parent;
            if slot.render_node_count != before {
                let event = TreeEvent::RenderNodeCountChange {
                    element: slot.element.clone(),
                    render_node_count: slot.render_node_count,
                };
                self.events.emit(event);
            }
        }
    }

    fn apply_collapse(
        &mut self,
        id: NodeId,
        collapsed: bool,
        recursive: bool,
        changed: &mut Vec<NodeId>,
    ) {
        let slot = &mut self.slots[id.0];
        let toggled =
            id != ROOT && slot.is_collapsible() && slot.collapsed != collapsed;
        if toggled {
            slot.collapsed = collapsed;
            changed.push(id);
        }

        let children = slot.children.clone();
        if recursive {
            for child in children {
                self.apply_collapse(child, collapsed, true, changed);
            }
        } else if toggled
            && !collapsed
            && self.options.auto_expand_single_children
            && children.len() == 1
        {
            self.apply_collapse(children[0], false, false, changed);
        }
    }

    /// Report collapse changes made below `top` and recount from there.
    fn commit_collapse(
        &mut self,
        top: NodeId,
        changed: &[NodeId],
        deep: bool,
    ) -> bool {
        if changed.is_empty() {
            return false;
        }

        let events: Vec<_> = changed
            .iter()
            .filter_map(|&id| {
                let slot = self.slot(id);
                slot.element.clone().map(|element| {
                    TreeEvent::CollapseStateChange {
                        element,
                        collapsed: slot.collapsed,
                        deep,
                    }
                })
            })
            .collect();
        for event in events {
            self.events.emit(event);
        }

        self.recount_descendants(top);
        self.refresh_ancestors(top);
        true
    }

    fn sort_children(&mut self, id: NodeId, recursive: bool) {
        let mut children = mem::take(&mut self.slots[id.0].children);
        if let Some(sorter) = &self.options.sorter {
            let slots = &self.slots;
            children.sort_by(|&left, &right| {
                match (&slots[left.0].element, &slots[right.0].element) {
                    (Some(left), Some(right)) => sorter(left, right),
                    _ => Ordering::Equal,
                }
            });
        }
        if recursive {
            for &child in &children {
                self.sort_children(child, true);
            }
        }
        self.slots[id.0].children = children;
    }

    fn list_index(&self, id: NodeId) -> Option<usize> {
        if id == ROOT || !self.slot(id).visible {
            return None;
        }

        let mut index = 0;
        let mut current = id;
        while let Some(parent) = self.slot(current).parent {
            let parent_slot = self.slot(parent);
            if parent != ROOT {
                if !parent_slot.visible || parent_slot.is_collapsed() {
                    return None;
                }
                index += 1;
            }
            index += parent_slot
                .children
                .iter()
                .take_while(|&&sibling| sibling != current)
                .map(|&sibling| self.slot(sibling).render_node_count)
                .sum::<usize>();
            current = parent;
        }
        Some(index)
    }

    fn push_rows<'a>(&'a self, id: NodeId, rows: &mut Vec<TreeNode<'a, K>>) {
        let slot = self.slot(id);
        if !slot.visible {
            return;
        }

        rows.push(TreeNode { model: self, id });
        if !slot.is_collapsed() {
            for &child in &slot.children {
                self.push_rows(child, rows);
            }
        }
    }
}

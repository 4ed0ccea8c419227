use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use flume::Receiver;
use log::{debug, trace};

use crate::compress::{
    CompressedTreeNode, compress, decompress, no_compress, splice,
};
use crate::element::TreeElement;
use crate::error::{Result, TreeError};
use crate::event::TreeEvent;
use crate::object::{ObjectTreeModel, ObjectTreeModelOptions, TreeNode};

type Policy<T> = fn(TreeElement<T>) -> TreeElement<CompressedTreeNode<T>>;

/// Configuration options for the [`CompressedObjectTreeModel`].
pub struct CompressedObjectTreeModelOptions<T> {
    pub compression_enabled: bool,
    /// Options of the underlying tree, expressed on compressed nodes.
    pub model: ObjectTreeModelOptions<CompressedTreeNode<T>>,
}

impl<T> Default for CompressedObjectTreeModelOptions<T> {
    fn default() -> Self {
        Self {
            compression_enabled: true,
            model: ObjectTreeModelOptions::default(),
        }
    }
}

impl<T> fmt::Debug for CompressedObjectTreeModelOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressedObjectTreeModelOptions")
            .field("compression_enabled", &self.compression_enabled)
            .field("model", &self.model)
            .finish()
    }
}

/// Tree of compressed nodes addressed by raw elements.
///
/// Keeps an index from every raw element to the compressed node that holds
/// it, and rewrites the affected chains whenever children change.
pub struct CompressedObjectTreeModel<T> {
    model: ObjectTreeModel<CompressedTreeNode<T>>,
    nodes: HashMap<T, CompressedTreeNode<T>>,
    enabled: bool,
}

impl<T> CompressedObjectTreeModel<T>
where
    T: Clone + Eq + Hash + fmt::Debug + 'static,
{
    pub fn new(options: CompressedObjectTreeModelOptions<T>) -> Self {
        Self {
            model: ObjectTreeModel::new(options.model),
            nodes: HashMap::new(),
            enabled: options.compression_enabled,
        }
    }

    pub fn user(&self) -> &str {
        self.model.user()
    }

    /// Number of raw elements in the tree.
    pub fn element_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of compressed nodes in the tree.
    pub fn node_count(&self) -> usize {
        self.model.len()
    }

    /// Replace the children of `element`, or of the root for `None`.
    ///
    /// The chain holding `element` is unfolded, given its new children and
    /// folded again. Siblings of that chain keep their nodes.
    pub fn set_children<I>(
        &mut self,
        element: Option<&T>,
        children: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = TreeElement<T>>,
    {
        let policy = self.policy();
        let Some(element) = element else {
            let fragment: Vec<_> = children
                .into_iter()
                .map(|child| policy(child).materialize())
                .collect();
            self.check_duplicates(None, &fragment)?;
            return self.splice_model(None, fragment);
        };

        let node = self.get_compressed_node(element)?.clone();
        let parent = self
            .model
            .get_parent_node_location(Some(&node))
            .map_err(|_| TreeError::UnknownCompressedNode)?;
        let snapshot = self
            .model
            .get_node(Some(&node))
            .ok()
            .and_then(TreeNode::snapshot)
            .ok_or(TreeError::UnknownCompressedNode)?;

        let spliced = splice(
            decompress(snapshot),
            element,
            children.into_iter().collect(),
        )?;
        let mut replacement = Some(policy(spliced).materialize());

        let siblings = self
            .model
            .get_node(parent.as_ref())
            .map_err(|_| TreeError::UnknownCompressedNode)?;
        let mut fragment = Vec::with_capacity(siblings.child_count());
        for sibling in siblings.children() {
            if sibling.element() == Some(&node) {
                fragment.extend(replacement.take());
            } else {
                fragment.extend(sibling.snapshot());
            }
        }

        self.check_duplicates(parent.as_ref(), &fragment)?;
        self.splice_model(parent.as_ref(), fragment)
    }

    pub fn is_compression_enabled(&self) -> bool {
        self.enabled
    }

    /// Switch compression on or off, rebuilding the whole tree in one
    /// splice. Collapse state is carried over.
    pub fn set_compression_enabled(&mut self, enabled: bool) -> Result<()> {
        if self.enabled == enabled {
            return Ok(());
        }

        self.enabled = enabled;
        let policy = self.policy();
        let fragment: Vec<_> = self
            .model
            .get_node(None)?
            .children()
            .filter_map(TreeNode::snapshot)
            .map(|snapshot| policy(decompress(snapshot)))
            .collect();

        debug!(
            "tree[{}] compression {}",
            self.model.user(),
            if enabled { "enabled" } else { "disabled" }
        );
        self.splice_model(None, fragment)
    }

    /// Compressed node holding `element`.
    pub fn get_compressed_node(
        &self,
        element: &T,
    ) -> Result<&CompressedTreeNode<T>> {
        self.nodes
            .get(element)
            .ok_or_else(|| TreeError::ElementNotFound {
                user: self.model.user().to_owned(),
                element: format!("{element:?}"),
            })
    }

    pub fn get_list_index(
        &self,
        location: Option<&T>,
    ) -> Result<Option<usize>> {
        let node = self.locate(location)?;
        self.model.get_list_index(node.as_ref())
    }

    pub fn get_list_render_count(&self, location: Option<&T>) -> Result<usize> {
        let node = self.locate(location)?;
        self.model.get_list_render_count(node.as_ref())
    }

    pub fn get_node(
        &self,
        location: Option<&T>,
    ) -> Result<TreeNode<'_, CompressedTreeNode<T>>> {
        let node = self.locate(location)?;
        self.model.get_node(node.as_ref())
    }

    /// Last element of the chain held by `node`.
    pub fn get_node_location(
        &self,
        node: &TreeNode<'_, CompressedTreeNode<T>>,
    ) -> Option<T> {
        node.element().map(|node| node.last().clone())
    }

    /// Last element of the chain above the one holding `location`.
    pub fn get_parent_node_location(
        &self,
        location: Option<&T>,
    ) -> Result<Option<T>> {
        let node = self.locate(location)?;
        let parent = self.model.get_parent_node_location(node.as_ref())?;
        Ok(parent.map(|parent| parent.last().clone()))
    }

    pub fn get_first_element_child(
        &self,
        location: Option<&T>,
    ) -> Result<Option<CompressedTreeNode<T>>> {
        let node = self.locate(location)?;
        self.model.get_first_element_child(node.as_ref())
    }

    pub fn get_last_element_ancestor(
        &self,
        location: Option<&T>,
    ) -> Result<Option<CompressedTreeNode<T>>> {
        let node = self.locate(location)?;
        self.model.get_last_element_ancestor(node.as_ref())
    }

    pub fn is_collapsible(&self, location: Option<&T>) -> Result<bool> {
        let node = self.locate(location)?;
        self.model.is_collapsible(node.as_ref())
    }

    pub fn set_collapsible(
        &mut self,
        location: &T,
        collapsible: Option<bool>,
    ) -> Result<bool> {
        let node = self.get_compressed_node(location)?.clone();
        self.model.set_collapsible(&node, collapsible)
    }

    pub fn is_collapsed(&self, location: Option<&T>) -> Result<bool> {
        let node = self.locate(location)?;
        self.model.is_collapsed(node.as_ref())
    }

    pub fn set_collapsed(
        &mut self,
        location: Option<&T>,
        collapsed: Option<bool>,
        recursive: bool,
    ) -> Result<bool> {
        let node = self.locate(location)?;
        self.model.set_collapsed(node.as_ref(), collapsed, recursive)
    }

    pub fn expand_to(&mut self, location: Option<&T>) -> Result<()> {
        let node = self.locate(location)?;
        self.model.expand_to(node.as_ref())
    }

    pub fn rerender(&mut self, location: Option<&T>) -> Result<()> {
        let node = self.locate(location)?;
        self.model.rerender(node.as_ref())
    }

    pub fn refilter(&mut self) {
        self.model.refilter();
    }

    pub fn resort(
        &mut self,
        location: Option<&T>,
        recursive: bool,
    ) -> Result<()> {
        let node = self.locate(location)?;
        self.model.resort(node.as_ref(), recursive)
    }

    pub fn visible_rows(&self) -> Vec<TreeNode<'_, CompressedTreeNode<T>>> {
        self.model.visible_rows()
    }

    pub fn subscribe(&mut self) -> Receiver<TreeEvent<CompressedTreeNode<T>>> {
        self.model.subscribe()
    }

    fn policy(&self) -> Policy<T> {
        if self.enabled { compress } else { no_compress }
    }

    fn locate(
        &self,
        location: Option<&T>,
    ) -> Result<Option<CompressedTreeNode<T>>> {
        location
            .map(|element| self.get_compressed_node(element).cloned())
            .transpose()
    }

    /// A raw element may appear once in `fragment`, and may already be in
    /// the tree only below `parent`, whose children are being replaced.
    fn check_duplicates(
        &self,
        parent: Option<&CompressedTreeNode<T>>,
        fragment: &[TreeElement<CompressedTreeNode<T>>],
    ) -> Result<()> {
        let mut seen = HashSet::new();
        let mut pending: Vec<_> = fragment.iter().collect();
        while let Some(item) = pending.pop() {
            for element in item.element.elements() {
                let elsewhere = self
                    .nodes
                    .get(element)
                    .is_some_and(|node| !self.model.is_within(node, parent));
                if elsewhere || !seen.insert(element) {
                    return Err(TreeError::DuplicateElement {
                        user: self.model.user().to_owned(),
                        element: format!("{element:?}"),
                    });
                }
            }
            pending.extend(item.children.as_slice().unwrap_or_default());
        }
        Ok(())
    }

    /// Commit `fragment` as the children of `parent` and bring the index
    /// in line with the nodes that were created and deleted.
    fn splice_model(
        &mut self,
        parent: Option<&CompressedTreeNode<T>>,
        fragment: Vec<TreeElement<CompressedTreeNode<T>>>,
    ) -> Result<()> {
        let mut created = Vec::new();
        let mut deleted = Vec::new();
        self.model.set_children(
            parent,
            fragment,
            &mut |node| created.push(node.clone()),
            &mut |node| deleted.push(node.clone()),
        )?;

        // An element can be deleted and created by the same splice when it
        // moves between chains. The new node wins.
        let recreated: HashSet<&T> = created
            .iter()
            .flat_map(|node| node.elements())
            .collect();
        for node in &deleted {
            for element in node.elements() {
                if !recreated.contains(element) {
                    self.nodes.remove(element);
                }
            }
        }
        for node in &created {
            for element in node.elements() {
                self.nodes.insert(element.clone(), node.clone());
            }
        }

        trace!(
            "tree[{}] index updated: {} created, {} deleted, {} element(s)",
            self.model.user(),
            created.len(),
            deleted.len(),
            self.nodes.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Model = CompressedObjectTreeModel<&'static str>;

    fn leaf(element: &'static str) -> TreeElement<&'static str> {
        TreeElement::new(element)
    }

    fn branch(
        element: &'static str,
        children: Vec<TreeElement<&'static str>>,
    ) -> TreeElement<&'static str> {
        TreeElement::new(element).with_children(children)
    }

    /// Visible rows as (chain, depth).
    fn rows(model: &Model) -> Vec<(Vec<&'static str>, usize)> {
        model
            .visible_rows()
            .into_iter()
            .filter_map(|row| {
                row.element()
                    .map(|node| (node.elements().to_vec(), row.depth()))
            })
            .collect()
    }

    fn assert_index_complete(model: &Model) {
        let mut reachable = 0;
        for row in model.model.get_node(None).unwrap().children() {
            let mut pending = vec![row];
            while let Some(row) = pending.pop() {
                let node = row.element().unwrap();
                for element in node.elements() {
                    reachable += 1;
                    assert_eq!(model.get_compressed_node(element), Ok(node));
                }
                pending.extend(row.children());
            }
        }
        assert_eq!(model.element_count(), reachable);
    }

    /// a > b > c > d, a > e > f, g
    fn sample() -> Model {
        let mut model = Model::new(CompressedObjectTreeModelOptions::default());
        model
            .set_children(
                None,
                vec![
                    branch(
                        "a",
                        vec![
                            branch("b", vec![branch("c", vec![leaf("d")])]),
                            branch("e", vec![leaf("f")]),
                        ],
                    ),
                    leaf("g"),
                ],
            )
            .unwrap();
        model
    }

    #[test]
    fn root_children_are_compressed() {
        let model = sample();

        assert_eq!(
            rows(&model),
            vec![
                (vec!["a"], 1),
                (vec!["b", "c", "d"], 2),
                (vec!["e", "f"], 2),
                (vec!["g"], 1),
            ]
        );
        assert_eq!(model.node_count(), 4);
        assert_index_complete(&model);
    }

    #[test]
    fn splice_into_chain_interior_splits_the_chain() {
        let mut model = sample();

        model
            .set_children(Some(&"c"), vec![leaf("x"), leaf("y")])
            .unwrap();

        assert_eq!(
            rows(&model),
            vec![
                (vec!["a"], 1),
                (vec!["b", "c"], 2),
                (vec!["x"], 3),
                (vec!["y"], 3),
                (vec!["e", "f"], 2),
                (vec!["g"], 1),
            ]
        );
        assert_eq!(
            model.get_compressed_node(&"d"),
            Err(TreeError::ElementNotFound {
                user: String::from("tree"),
                element: String::from("\"d\""),
            })
        );
        assert_index_complete(&model);
    }

    #[test]
    fn single_child_extends_the_chain() {
        let mut model = sample();

        model.set_children(Some(&"g"), vec![leaf("h")]).unwrap();

        assert_eq!(rows(&model).last(), Some(&(vec!["g", "h"], 1)));
        assert_index_complete(&model);
    }

    #[test]
    fn splice_keeps_sibling_nodes() {
        let mut model = sample();
        let before = model.get_compressed_node(&"e").cloned().unwrap();

        model.set_children(Some(&"d"), vec![leaf("x")]).unwrap();

        assert_eq!(model.get_compressed_node(&"e"), Ok(&before));
        assert_eq!(
            model.get_compressed_node(&"x").map(|node| node.elements()),
            Ok(&["b", "c", "d", "x"][..])
        );
    }

    #[test]
    fn moved_element_points_at_its_new_node() {
        let mut model = sample();

        model
            .set_children(
                Some(&"a"),
                vec![branch("f", vec![leaf("b"), leaf("e")])],
            )
            .unwrap();

        assert_eq!(
            rows(&model),
            vec![
                (vec!["a", "f"], 1),
                (vec!["b"], 2),
                (vec!["e"], 2),
                (vec!["g"], 1),
            ]
        );
        for element in ["a", "f", "b", "e"] {
            let node = model.get_compressed_node(&element).unwrap();
            assert!(node.elements().contains(&element));
        }
        assert!(model.get_compressed_node(&"c").is_err());
        assert_index_complete(&model);
    }

    #[test]
    fn unknown_element_is_rejected() {
        let mut model = sample();

        let result = model.set_children(Some(&"missing"), vec![leaf("x")]);

        assert!(matches!(result, Err(TreeError::ElementNotFound { .. })));
        assert_index_complete(&model);
    }

    #[test]
    fn element_already_elsewhere_is_rejected_without_changes() {
        let mut model = sample();

        let result = model.set_children(Some(&"f"), vec![leaf("g")]);

        assert!(matches!(result, Err(TreeError::DuplicateElement { .. })));
        assert_eq!(model.get_parent_node_location(Some(&"g")), Ok(None));
        assert_index_complete(&model);
    }

    #[test]
    fn element_twice_in_fragment_is_rejected() {
        let mut model = sample();

        let result = model.set_children(
            None,
            vec![leaf("x"), branch("y", vec![leaf("x")])],
        );

        assert!(matches!(result, Err(TreeError::DuplicateElement { .. })));
    }

    #[test]
    fn disabled_compression_keeps_one_node_per_element() {
        let mut model = Model::new(CompressedObjectTreeModelOptions {
            compression_enabled: false,
            ..Default::default()
        });

        model
            .set_children(
                None,
                vec![branch("a", vec![branch("b", vec![leaf("c")])])],
            )
            .unwrap();

        assert_eq!(
            rows(&model),
            vec![(vec!["a"], 1), (vec!["b"], 2), (vec!["c"], 3)]
        );
    }

    #[test]
    fn toggling_compression_rebuilds_the_tree() {
        let mut model = sample();

        model.set_compression_enabled(false).unwrap();
        assert_eq!(model.node_count(), 7);
        assert_index_complete(&model);

        model.set_compression_enabled(true).unwrap();
        assert_eq!(
            rows(&model),
            vec![
                (vec!["a"], 1),
                (vec!["b", "c", "d"], 2),
                (vec!["e", "f"], 2),
                (vec!["g"], 1),
            ]
        );
        assert_index_complete(&model);
    }

    #[test]
    fn setting_same_compression_twice_is_a_no_op() {
        let mut model = sample();
        let before = model.get_compressed_node(&"c").cloned().unwrap();
        let events = model.subscribe();

        model.set_compression_enabled(true).unwrap();
        model.set_compression_enabled(true).unwrap();

        assert_eq!(model.get_compressed_node(&"c"), Ok(&before));
        assert_eq!(events.drain().count(), 0);
    }

    #[test]
    fn toggling_compression_keeps_collapse_state() {
        let mut model = sample();
        model.set_collapsed(Some(&"a"), Some(true), false).unwrap();

        model.set_compression_enabled(false).unwrap();
        assert_eq!(model.is_collapsed(Some(&"a")), Ok(true));

        model.set_compression_enabled(true).unwrap();
        assert_eq!(model.is_collapsed(Some(&"a")), Ok(true));
        assert_eq!(rows(&model), vec![(vec!["a"], 1), (vec!["g"], 1)]);
    }

    #[test]
    fn queries_translate_raw_locations() {
        let model = sample();

        assert_eq!(model.get_list_index(Some(&"c")), Ok(Some(1)));
        assert_eq!(model.get_list_index(Some(&"g")), Ok(Some(3)));
        assert_eq!(model.get_list_render_count(Some(&"a")), Ok(3));
        assert_eq!(model.get_parent_node_location(Some(&"f")), Ok(Some("a")));
        assert_eq!(
            model
                .get_last_element_ancestor(Some(&"a"))
                .map(|node| node.map(|node| *node.last())),
            Ok(Some("f"))
        );
        let node = model.get_node(Some(&"b")).unwrap();
        assert_eq!(model.get_node_location(&node), Some("d"));
    }

    #[test]
    fn incompressible_chain_survives_splice_and_toggle() {
        let mut model = Model::new(CompressedObjectTreeModelOptions::default());
        model
            .set_children(
                None,
                vec![branch(
                    "a",
                    vec![
                        branch("b", vec![leaf("c")]).with_incompressible(true),
                    ],
                )],
            )
            .unwrap();
        assert_eq!(rows(&model), vec![(vec!["a"], 1), (vec!["b", "c"], 2)]);

        model.set_children(Some(&"c"), vec![leaf("x")]).unwrap();

        let expected = vec![(vec!["a"], 1), (vec!["b", "c", "x"], 2)];
        assert_eq!(rows(&model), expected);
        assert!(model.get_compressed_node(&"x").unwrap().incompressible());
        assert!(!model.get_compressed_node(&"a").unwrap().incompressible());

        model.set_compression_enabled(false).unwrap();
        assert!(model.get_compressed_node(&"b").unwrap().incompressible());
        assert!(!model.get_compressed_node(&"c").unwrap().incompressible());

        model.set_compression_enabled(true).unwrap();
        assert_eq!(rows(&model), expected);
        assert!(model.get_compressed_node(&"b").unwrap().incompressible());
        assert_index_complete(&model);
    }
}

//! Fragment transforms between raw trees and compressed trees.
//!
//! A chain `a > b > c` where every element but the last has exactly one
//! child is folded into a single [`CompressedTreeNode`] holding `[a, b, c]`.
//! [`decompress`] unfolds it again, [`splice`] swaps the children of one
//! element inside an unfolded fragment.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use crate::element::{Children, TreeElement};
use crate::error::{Result, TreeError};

#[derive(Debug)]
pub(crate) struct Chain<T> {
    elements: Vec<T>,
    incompressible: bool,
}

/// A run of raw elements displayed as one row.
///
/// Cloning is cheap and yields a handle to the same node. Two handles are
/// equal only when they point at the same node, whatever their elements.
pub struct CompressedTreeNode<T> {
    chain: Rc<Chain<T>>,
}

impl<T> CompressedTreeNode<T> {
    /// `elements` holds at least one element.
    pub(crate) fn new(elements: Vec<T>, incompressible: bool) -> Self {
        debug_assert!(!elements.is_empty());
        Self {
            chain: Rc::new(Chain {
                elements,
                incompressible,
            }),
        }
    }

    /// Elements of the chain, outermost first. Never empty.
    pub fn elements(&self) -> &[T] {
        &self.chain.elements
    }

    /// First element of the chain.
    pub fn first(&self) -> &T {
        &self.chain.elements[0]
    }

    /// Last element of the chain, the one whose children the node shows.
    pub fn last(&self) -> &T {
        &self.chain.elements[self.chain.elements.len() - 1]
    }

    /// Whether the chain was started by an incompressible element.
    pub fn incompressible(&self) -> bool {
        self.chain.incompressible
    }

    pub(crate) fn downgrade(&self) -> Weak<Chain<T>> {
        Rc::downgrade(&self.chain)
    }

    /// Whether `weak` still refers to this very node.
    pub(crate) fn is(&self, weak: &Weak<Chain<T>>) -> bool {
        weak.upgrade()
            .is_some_and(|chain| Rc::ptr_eq(&chain, &self.chain))
    }

    /// Address of the shared node, stable while any handle is alive.
    pub(crate) fn address(&self) -> usize {
        Rc::as_ptr(&self.chain) as *const () as usize
    }
}

impl<T> Clone for CompressedTreeNode<T> {
    fn clone(&self) -> Self {
        Self {
            chain: Rc::clone(&self.chain),
        }
    }
}

impl<T> PartialEq for CompressedTreeNode<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.chain, &other.chain)
    }
}

impl<T> Eq for CompressedTreeNode<T> {}

impl<T> Hash for CompressedTreeNode<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl<T: fmt::Debug> fmt::Debug for CompressedTreeNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressedTreeNode")
            .field("elements", &self.chain.elements)
            .field("incompressible", &self.chain.incompressible)
            .finish()
    }
}

/// Fold single-child chains of `element` into compressed nodes.
///
/// Only two children are ever pulled at each step, so a lazy child sequence
/// is never walked past its first branch point. An incompressible child
/// stops the chain and starts a chain of its own.
pub fn compress<T: 'static>(
    element: TreeElement<T>,
) -> TreeElement<CompressedTreeNode<T>> {
    let TreeElement {
        element: first,
        mut children,
        incompressible,
        mut collapsible,
        mut collapsed,
    } = element;
    let mut elements = vec![first];

    loop {
        match children.take_single() {
            Ok(child) if !child.incompressible => {
                elements.push(child.element);
                children = child.children;
                collapsible = child.collapsible;
                collapsed = child.collapsed;
            },
            Ok(child) => {
                children = Children::from(vec![child]);
                break;
            },
            Err(rest) => {
                children = rest;
                break;
            },
        }
    }

    TreeElement {
        element: CompressedTreeNode::new(elements, incompressible),
        children: children.map(compress),
        incompressible,
        collapsible,
        collapsed,
    }
}

/// Wrap every element in a compressed node of its own.
pub fn no_compress<T: 'static>(
    element: TreeElement<T>,
) -> TreeElement<CompressedTreeNode<T>> {
    let TreeElement {
        element,
        children,
        incompressible,
        collapsible,
        collapsed,
    } = element;

    TreeElement {
        element: CompressedTreeNode::new(vec![element], incompressible),
        children: children.map(no_compress),
        incompressible,
        collapsible,
        collapsed,
    }
}

/// Unfold a compressed fragment back into raw elements.
///
/// Inverse of [`compress`]: `decompress(compress(x))` has the same elements
/// and shape as `x`.
pub fn decompress<T: Clone + 'static>(
    element: TreeElement<CompressedTreeNode<T>>,
) -> TreeElement<T> {
    decompress_from(element, 0)
}

fn decompress_from<T: Clone + 'static>(
    element: TreeElement<CompressedTreeNode<T>>,
    index: usize,
) -> TreeElement<T> {
    let node = element.element.clone();
    let (collapsible, collapsed) = (element.collapsible, element.collapsed);

    let children = if index + 1 < node.elements().len() {
        Children::from(vec![decompress_from(element, index + 1)])
    } else {
        element.children.map(decompress)
    };

    TreeElement {
        element: node.elements()[index].clone(),
        children,
        // Only the head of an incompressible chain carries the flag.
        incompressible: index == 0 && node.incompressible(),
        collapsible,
        collapsed,
    }
}

/// Replace the children of `target` inside `fragment`.
///
/// Every other element keeps its place. The search only descends into
/// materialized child sequences.
pub fn splice<T: PartialEq>(
    mut fragment: TreeElement<T>,
    target: &T,
    children: Children<T>,
) -> Result<TreeElement<T>> {
    match replace_children(&mut fragment, target, children) {
        None => Ok(fragment),
        Some(_) => Err(TreeError::UnknownCompressedNode),
    }
}

/// Returns the replacement back when `target` is not below `fragment`.
fn replace_children<T: PartialEq>(
    fragment: &mut TreeElement<T>,
    target: &T,
    children: Children<T>,
) -> Option<Children<T>> {
    if fragment.element == *target {
        fragment.children = children;
        return None;
    }

    let mut children = children;
    if let Some(nested) = fragment.children.as_mut_slice() {
        for child in nested {
            children = replace_children(child, target, children)?;
        }
    }
    Some(children)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    struct Shape {
        element: &'static str,
        incompressible: bool,
        children: Vec<Shape>,
    }

    fn shape(fragment: TreeElement<&'static str>) -> Shape {
        Shape {
            element: fragment.element,
            incompressible: fragment.incompressible,
            children: fragment.children.into_iter().map(shape).collect(),
        }
    }

    #[derive(Debug, PartialEq, Eq)]
    struct CompressedShape {
        elements: Vec<&'static str>,
        children: Vec<CompressedShape>,
    }

    fn compressed_shape(
        fragment: TreeElement<CompressedTreeNode<&'static str>>,
    ) -> CompressedShape {
        CompressedShape {
            elements: fragment.element.elements().to_vec(),
            children: fragment
                .children
                .into_iter()
                .map(compressed_shape)
                .collect(),
        }
    }

    fn node(
        elements: &[&'static str],
        children: Vec<CompressedShape>,
    ) -> CompressedShape {
        CompressedShape {
            elements: elements.to_vec(),
            children,
        }
    }

    fn leaf(element: &'static str) -> TreeElement<&'static str> {
        TreeElement::new(element)
    }

    fn branch(
        element: &'static str,
        children: Vec<TreeElement<&'static str>>,
    ) -> TreeElement<&'static str> {
        TreeElement::new(element).with_children(children)
    }

    /// a > b > c > d, a > e > f, g
    fn sample() -> TreeElement<&'static str> {
        branch(
            "root",
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
    }

    #[test]
    fn single_leaf_compresses_to_one_element_chain() {
        let compressed = compressed_shape(compress(leaf("a")));

        assert_eq!(compressed, node(&["a"], vec![]));
    }

    #[test]
    fn single_child_chain_collapses_fully() {
        let chain = branch(
            "a",
            vec![branch("b", vec![branch("c", vec![leaf("d")])])],
        );

        let compressed = compressed_shape(compress(chain));

        assert_eq!(compressed, node(&["a", "b", "c", "d"], vec![]));
    }

    #[test]
    fn branch_point_stops_compression() {
        let tree = branch("a", vec![leaf("b"), leaf("c")]);

        let compressed = compressed_shape(compress(tree));

        assert_eq!(
            compressed,
            node(&["a"], vec![node(&["b"], vec![]), node(&["c"], vec![])])
        );
    }

    #[test]
    fn incompressible_child_starts_its_own_chain() {
        let tree = branch(
            "a",
            vec![branch("b", vec![leaf("c")]).with_incompressible(true)],
        );

        let compressed = compress(tree);
        assert!(!compressed.element.incompressible());
        let compressed = compressed_shape(compressed);

        assert_eq!(compressed, node(&["a"], vec![node(&["b", "c"], vec![])]));
    }

    #[test]
    fn nested_chains_compress_independently() {
        let compressed = compressed_shape(compress(sample()));

        assert_eq!(
            compressed,
            node(
                &["root"],
                vec![
                    node(
                        &["a"],
                        vec![
                            node(&["b", "c", "d"], vec![]),
                            node(&["e", "f"], vec![])
                        ]
                    ),
                    node(&["g"], vec![]),
                ]
            )
        );
    }

    #[test]
    fn compress_keeps_collapse_hints_of_chain_tail() {
        let tree = branch("a", vec![leaf("b").with_collapsed(true)])
            .with_collapsed(false);

        let compressed = compress(tree);

        assert_eq!(compressed.collapsed, Some(true));
    }

    #[test]
    fn compress_does_not_walk_endless_fanout() {
        let tree = TreeElement::new(0_usize)
            .with_lazy_children((1..).map(TreeElement::new));

        let compressed = compress(tree);

        assert_eq!(compressed.element.elements(), &[0]);
        let first: Vec<usize> = compressed
            .children
            .into_iter()
            .take(3)
            .map(|child| *child.element.first())
            .collect();
        assert_eq!(first, vec![1, 2, 3]);
    }

    #[test]
    fn compress_follows_lazy_single_child_chain() {
        let tree = TreeElement::new("a").with_lazy_children(vec![
            TreeElement::new("b")
                .with_lazy_children(vec![leaf("c"), leaf("d")]),
        ]);

        let compressed = compressed_shape(compress(tree));

        assert_eq!(
            compressed,
            node(&["a", "b"], vec![node(&["c"], vec![]), node(&["d"], vec![])])
        );
    }

    #[test]
    fn no_compress_wraps_every_element() {
        let tree = branch("a", vec![branch("b", vec![leaf("c")])]);

        let wrapped = compressed_shape(no_compress(tree));

        assert_eq!(
            wrapped,
            node(&["a"], vec![node(&["b"], vec![node(&["c"], vec![])])])
        );
    }

    #[test]
    fn decompress_inverts_compress() {
        let restored = shape(decompress(compress(sample())));

        assert_eq!(restored, shape(sample()));
    }

    #[test]
    fn decompress_inverts_no_compress() {
        let restored = shape(decompress(no_compress(sample())));

        assert_eq!(restored, shape(sample()));
    }

    #[test]
    fn decompress_marks_only_chain_head_incompressible() {
        let tree = branch(
            "a",
            vec![branch("b", vec![leaf("c")]).with_incompressible(true)],
        );

        let restored = shape(decompress(compress(tree)));

        assert_eq!(
            restored,
            Shape {
                element: "a",
                incompressible: false,
                children: vec![Shape {
                    element: "b",
                    incompressible: true,
                    children: vec![Shape {
                        element: "c",
                        incompressible: false,
                        children: vec![],
                    }],
                }],
            }
        );
    }

    #[test]
    fn splice_replaces_children_of_target_only() {
        let spliced = splice(
            sample(),
            &"c",
            Children::from(vec![leaf("x"), leaf("y")]),
        );

        let spliced = spliced.map(shape);
        let expected = shape(branch(
            "root",
            vec![
                branch(
                    "a",
                    vec![
                        branch(
                            "b",
                            vec![branch("c", vec![leaf("x"), leaf("y")])],
                        ),
                        branch("e", vec![leaf("f")]),
                    ],
                ),
                leaf("g"),
            ],
        ));
        assert_eq!(spliced, Ok(expected));
    }

    #[test]
    fn splice_can_clear_children_of_root() {
        let spliced = splice(sample(), &"root", Children::empty());

        assert_eq!(spliced.map(shape), Ok(shape(leaf("root"))));
    }

    #[test]
    fn splice_reports_missing_target() {
        let spliced = splice(sample(), &"missing", Children::empty());

        assert_eq!(
            spliced.map(shape),
            Err(TreeError::UnknownCompressedNode)
        );
    }

    #[test]
    fn compressed_nodes_compare_by_identity() {
        let left = CompressedTreeNode::new(vec!["a"], false);
        let right = CompressedTreeNode::new(vec!["a"], false);

        assert_ne!(left, right);
        assert_eq!(left, left.clone());
        assert!(left.is(&left.downgrade()));
        assert!(!left.is(&right.downgrade()));
    }
}

use std::fmt;

/// Input-side description of a subtree handed to `set_children`.
///
/// A fragment is consumed once: its children may be a lazy sequence that
/// can only be walked a single time.
#[derive(Debug)]
pub struct TreeElement<T> {
    /// The element stored at this position.
    pub element: T,
    /// Child fragments, materialized or lazy.
    pub children: Children<T>,
    /// Keep this element out of its parent's compressed chain.
    pub incompressible: bool,
    /// Explicit collapsible hint; `None` means "collapsible when it has
    /// children".
    pub collapsible: Option<bool>,
    /// Explicit collapse state; `None` defers to the model.
    pub collapsed: Option<bool>,
}

impl<T> TreeElement<T> {
    /// Create a leaf fragment.
    pub fn new(element: T) -> Self {
        Self {
            element,
            children: Children::default(),
            incompressible: false,
            collapsible: None,
            collapsed: None,
        }
    }

    /// Replace the children with a materialized sequence.
    #[must_use]
    pub fn with_children(
        mut self,
        children: impl IntoIterator<Item = TreeElement<T>>,
    ) -> Self {
        self.children = children.into_iter().collect();
        self
    }

    /// Replace the children with a lazy sequence that is only pulled on
    /// demand.
    #[must_use]
    pub fn with_lazy_children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = TreeElement<T>>,
        I::IntoIter: 'static,
    {
        self.children = Children::lazy(children);
        self
    }

    #[must_use]
    pub fn with_incompressible(mut self, incompressible: bool) -> Self {
        self.incompressible = incompressible;
        self
    }

    #[must_use]
    pub fn with_collapsible(mut self, collapsible: bool) -> Self {
        self.collapsible = Some(collapsible);
        self
    }

    #[must_use]
    pub fn with_collapsed(mut self, collapsed: bool) -> Self {
        self.collapsed = Some(collapsed);
        self
    }

    /// Pull every lazy child sequence in this subtree into memory.
    #[must_use]
    pub fn materialize(self) -> Self {
        let children = self
            .children
            .into_iter()
            .map(TreeElement::materialize)
            .collect();
        Self { children, ..self }
    }
}

/// Child sequence of a [`TreeElement`].
///
/// Either a materialized list or a lazy, possibly very long, iterator.
pub struct Children<T> {
    inner: ChildrenInner<T>,
}

enum ChildrenInner<T> {
    Eager(Vec<TreeElement<T>>),
    Lazy(Box<dyn Iterator<Item = TreeElement<T>>>),
}

impl<T> Children<T> {
    /// Empty, materialized sequence.
    pub fn empty() -> Self {
        Self {
            inner: ChildrenInner::Eager(Vec::new()),
        }
    }

    /// Wrap an iterator without pulling from it.
    pub fn lazy<I>(children: I) -> Self
    where
        I: IntoIterator<Item = TreeElement<T>>,
        I::IntoIter: 'static,
    {
        Self {
            inner: ChildrenInner::Lazy(Box::new(children.into_iter())),
        }
    }

    /// Whether the sequence is held in memory.
    pub fn is_materialized(&self) -> bool {
        matches!(self.inner, ChildrenInner::Eager(_))
    }

    pub(crate) fn as_slice(&self) -> Option<&[TreeElement<T>]> {
        match &self.inner {
            ChildrenInner::Eager(items) => Some(items),
            ChildrenInner::Lazy(_) => None,
        }
    }

    /// Materialized children, `None` for a lazy sequence.
    pub(crate) fn as_mut_slice(&mut self) -> Option<&mut [TreeElement<T>]> {
        match &mut self.inner {
            ChildrenInner::Eager(items) => Some(items),
            ChildrenInner::Lazy(_) => None,
        }
    }

    /// Take the only child of this sequence.
    ///
    /// At most two items are pulled from a lazy sequence. When there is not
    /// exactly one child the sequence is handed back with the pulled items
    /// restored in front of the remainder.
    pub(crate) fn take_single(self) -> Result<TreeElement<T>, Self>
    where
        T: 'static,
    {
        match self.inner {
            ChildrenInner::Eager(mut items) => {
                if items.len() == 1 {
                    if let Some(item) = items.pop() {
                        return Ok(item);
                    }
                }
                Err(Self {
                    inner: ChildrenInner::Eager(items),
                })
            },
            ChildrenInner::Lazy(mut rest) => {
                let Some(first) = rest.next() else {
                    return Err(Self::empty());
                };
                match rest.next() {
                    None => Ok(first),
                    Some(second) => Err(Self {
                        inner: ChildrenInner::Lazy(Box::new(
                            [first, second].into_iter().chain(rest),
                        )),
                    }),
                }
            },
        }
    }

    /// Transform every child, keeping a lazy sequence lazy.
    pub(crate) fn map<U, F>(self, f: F) -> Children<U>
    where
        T: 'static,
        U: 'static,
        F: FnMut(TreeElement<T>) -> TreeElement<U> + 'static,
    {
        let inner = match self.inner {
            ChildrenInner::Eager(items) => {
                ChildrenInner::Eager(items.into_iter().map(f).collect())
            },
            ChildrenInner::Lazy(rest) => {
                ChildrenInner::Lazy(Box::new(rest.map(f)))
            },
        };
        Children { inner }
    }
}

impl<T> Default for Children<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<Vec<TreeElement<T>>> for Children<T> {
    fn from(items: Vec<TreeElement<T>>) -> Self {
        Self {
            inner: ChildrenInner::Eager(items),
        }
    }
}

impl<T> FromIterator<TreeElement<T>> for Children<T> {
    fn from_iter<I: IntoIterator<Item = TreeElement<T>>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<T> IntoIterator for Children<T> {
    type Item = TreeElement<T>;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        let inner = match self.inner {
            ChildrenInner::Eager(items) => {
                IntoIterInner::Eager(items.into_iter())
            },
            ChildrenInner::Lazy(rest) => IntoIterInner::Lazy(rest),
        };
        IntoIter { inner }
    }
}

impl<T: fmt::Debug> fmt::Debug for Children<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            ChildrenInner::Eager(items) => {
                f.debug_list().entries(items).finish()
            },
            ChildrenInner::Lazy(_) => f.write_str("[..]"),
        }
    }
}

/// Owning iterator over [`Children`].
pub struct IntoIter<T> {
    inner: IntoIterInner<T>,
}

enum IntoIterInner<T> {
    Eager(std::vec::IntoIter<TreeElement<T>>),
    Lazy(Box<dyn Iterator<Item = TreeElement<T>>>),
}

impl<T> Iterator for IntoIter<T> {
    type Item = TreeElement<T>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            IntoIterInner::Eager(items) => items.next(),
            IntoIterInner::Lazy(rest) => rest.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            IntoIterInner::Eager(items) => items.size_hint(),
            IntoIterInner::Lazy(rest) => rest.size_hint(),
        }
    }
}

use flume::{Receiver, Sender};

/// Notifications emitted by the tree models.
///
/// Elements are the keys of the model that emitted the event: compressed
/// nodes for the compressed model, raw elements for the compressible one.
/// A `None` element refers to the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent<K> {
    /// Children of a node were replaced. Only the top-level nodes of the
    /// replaced and inserted subtrees are listed.
    Splice { inserted: Vec<K>, deleted: Vec<K> },
    /// A node was collapsed or expanded.
    CollapseStateChange {
        element: K,
        collapsed: bool,
        deep: bool,
    },
    /// The number of rows rendered by a node and its descendants changed.
    RenderNodeCountChange {
        element: Option<K>,
        render_node_count: usize,
    },
    /// Rows of a subtree should be drawn again.
    Rerender { element: Option<K> },
}

impl<K> TreeEvent<K> {
    /// Rewrite every element carried by the event.
    pub fn map<U>(self, mut f: impl FnMut(K) -> U) -> TreeEvent<U> {
        match self {
            TreeEvent::Splice { inserted, deleted } => TreeEvent::Splice {
                inserted: inserted.into_iter().map(&mut f).collect(),
                deleted: deleted.into_iter().map(&mut f).collect(),
            },
            TreeEvent::CollapseStateChange {
                element,
                collapsed,
                deep,
            } => TreeEvent::CollapseStateChange {
                element: f(element),
                collapsed,
                deep,
            },
            TreeEvent::RenderNodeCountChange {
                element,
                render_node_count,
            } => TreeEvent::RenderNodeCountChange {
                element: element.map(f),
                render_node_count,
            },
            TreeEvent::Rerender { element } => TreeEvent::Rerender {
                element: element.map(f),
            },
        }
    }
}

/// Fan-out of events to every live subscriber.
///
/// Subscribers whose receiver was dropped are forgotten on the next emit.
pub(crate) struct EventEmitter<E> {
    subscribers: Vec<Sender<E>>,
}

impl<E: Clone> EventEmitter<E> {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    pub(crate) fn subscribe(&mut self) -> Receiver<E> {
        let (tx, rx) = flume::unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub(crate) fn emit(&mut self, event: E) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

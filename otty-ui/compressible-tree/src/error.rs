use thiserror::Error;

/// Errors returned by the tree models.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The location does not name an element currently in the tree.
    #[error("TreeError [{user}] Tree element not found: {element}")]
    ElementNotFound { user: String, element: String },

    /// The element index points at a compressed node the underlying model
    /// does not hold.
    #[error("unknown compressed tree node")]
    UnknownCompressedNode,

    #[error("TreeError [{user}] Duplicate element: {element}")]
    DuplicateElement { user: String, element: String },
}

pub type Result<T> = std::result::Result<T, TreeError>;

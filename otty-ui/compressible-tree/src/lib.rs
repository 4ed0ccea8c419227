//! Tree models that fold single-child chains into one row.
//!
//! A file explorer showing `src > app > main.rs` as a single `src/app` row
//! is the typical user. The crate is layered:
//! - fragment transforms ([`compress`], [`no_compress`], [`decompress`],
//!   [`splice`]) that work on [`TreeElement`] values and own no state;
//! - [`ObjectTreeModel`], a generic ordered tree with collapse state,
//!   filtering, sorting, list indices and [`TreeEvent`] streams;
//! - [`CompressedObjectTreeModel`], which keeps an index from every raw
//!   element to its [`CompressedTreeNode`] and rewrites chains on update;
//! - [`CompressibleObjectTreeModel`], the façade that speaks raw elements
//!   only and shows each chain through an [`ElementMapper`].
//!
//! Models are single-threaded; events are delivered over `flume` channels
//! obtained with `subscribe`.
//!
//! # Quick Example
//!
//! ```
//! use otty_ui_compressible_tree::{
//!     CompressibleObjectTreeModel, CompressibleObjectTreeModelOptions,
//!     TreeElement,
//! };
//!
//! let mut model = CompressibleObjectTreeModel::new(
//!     CompressibleObjectTreeModelOptions::default(),
//! );
//!
//! let app = TreeElement::new("app").with_children([
//!     TreeElement::new("main.rs"),
//!     TreeElement::new("cli.rs"),
//! ]);
//! model
//!     .set_children(None, [TreeElement::new("src").with_children([app])])
//!     .unwrap();
//!
//! let rows: Vec<_> = model
//!     .visible_rows()
//!     .iter()
//!     .filter_map(|row| row.element())
//!     .collect();
//! assert_eq!(rows, ["app", "main.rs", "cli.rs"]);
//!
//! model.set_compression_enabled(false).unwrap();
//! assert_eq!(model.visible_rows().len(), 4);
//! ```

mod compress;
mod compressed;
mod compressible;
mod element;
mod error;
mod event;
mod natural;
mod object;

pub use compress::{
    CompressedTreeNode, compress, decompress, no_compress, splice,
};
pub use compressed::{
    CompressedObjectTreeModel, CompressedObjectTreeModelOptions,
};
pub use compressible::{
    CompressibleObjectTreeModel, CompressibleObjectTreeModelOptions,
    CompressibleTreeNode, ElementMapper, default_element_mapper,
};
pub use element::{Children, IntoIter, TreeElement};
pub use error::{Result, TreeError};
pub use event::TreeEvent;
pub use natural::{compare_natural, natural_sorter};
pub use object::{
    IdentityProvider, ObjectTreeModel, ObjectTreeModelOptions, TreeFilter,
    TreeNode, TreeSorter, TreeVisibility,
};

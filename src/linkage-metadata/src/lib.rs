//! Index metadata for the linkage optimizer.
//!
//! The optimizer never inspects index definitions itself. It asks an
//! [`IndexMetadata`] collaborator which link owns a field, how to walk from
//! one index to another, and what the wildcard field expands to.
//! [`MetadataCatalog`] is the in-memory implementation.
//!
//! # Example
//!
//! ```rust
//! use linkage_metadata::{IndexMetadata, LinkDefinition, MetadataCatalog};
//!
//! let catalog = MetadataCatalog::builder("main", "id")
//!     .with_fields("main", ["id", "vol_id"])
//!     .with_fields("volumes", ["id", "title"])
//!     .with_link(LinkDefinition::new("main", "vol_id", "volumes", "id").with_fieldname("vol"))
//!     .build()
//!     .unwrap();
//!
//! let session = catalog.session();
//! let owner = session.resolve_field_owner("vol.title").unwrap();
//! assert_eq!(owner.index_name(), Some("volumes"));
//!
//! let path = session.compute_join_path(&owner, &session.home_index()).unwrap();
//! assert_eq!(path, ["volumes:id", "main:vol_id"]);
//! ```

mod catalog;
mod metadata;
pub mod path;
pub mod testing;

pub use catalog::{CatalogBuilder, CatalogDefinition, CatalogSession, IndexEntry, LinkDefinition, MetadataCatalog};
pub use metadata::{FieldAndIndexPair, IndexMetadata};

//! Catalog fixtures shared by tests across the workspace.

use crate::catalog::{LinkDefinition, MetadataCatalog};

/// A small library schema.
///
/// ```text
/// main (id, subject, vol_id, author_id)
///   ├─ vol_id    ─> volumes.id     (prefix "vol")
///   │     └─ pub_id ─> publishers.id
///   └─ author_id ─> authors.id     (prefix "author")
/// ```
pub fn library_catalog() -> MetadataCatalog {
    try_library_catalog().expect("library fixture is consistent")
}

fn try_library_catalog() -> common_error::LinkageResult<MetadataCatalog> {
    MetadataCatalog::builder("main", "id")
        .with_fields("main", ["id", "subject", "vol_id", "author_id"])
        .with_fields("volumes", ["id", "title", "year", "pub_id"])
        .with_fields("publishers", ["id", "publisher_name"])
        .with_fields("authors", ["id", "author_name"])
        .with_link(LinkDefinition::new("main", "vol_id", "volumes", "id").with_fieldname("vol"))
        .with_link(LinkDefinition::new("volumes", "pub_id", "publishers", "id"))
        .with_link(
            LinkDefinition::new("main", "author_id", "authors", "id").with_fieldname("author"),
        )
        .build()
}

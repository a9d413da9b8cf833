//! In-memory catalog of indices, their fields and the links between them.

use std::collections::{HashMap, HashSet, VecDeque};

use common_error::{LinkageError, LinkageResult};
use linkage_ast::{IndexLink, LinkRef, UsedIndexes};
use log::trace;
use serde::{Deserialize, Serialize};

use crate::metadata::{FieldAndIndexPair, IndexMetadata};
use crate::path::field_hop;

/// Fields declared by one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Index name.
    pub name: String,
    /// Field names, in declaration order.
    pub fields: Vec<String>,
}

/// A declared join from `source_index.left_field` to
/// `target_index.right_field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDefinition {
    /// Index holding the left field.
    pub source_index: String,
    /// Field in the source index.
    pub left_field: String,
    /// Index the link reaches.
    pub target_index: String,
    /// Field in the target index.
    pub right_field: String,
    /// Dotted prefix under which target fields may be referenced.
    #[serde(default)]
    pub fieldname: Option<String>,
}

impl LinkDefinition {
    /// Declare a link.
    pub fn new(
        source_index: impl Into<String>,
        left_field: impl Into<String>,
        target_index: impl Into<String>,
        right_field: impl Into<String>,
    ) -> Self {
        Self {
            source_index: source_index.into(),
            left_field: left_field.into(),
            target_index: target_index.into(),
            right_field: right_field.into(),
            fieldname: None,
        }
    }

    /// Set the dotted prefix for target fields.
    pub fn with_fieldname(mut self, fieldname: impl Into<String>) -> Self {
        self.fieldname = Some(fieldname.into());
        self
    }
}

/// Serializable description of a whole catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDefinition {
    /// The index queries are written against.
    pub home_index: String,
    /// Key field of the home index.
    pub primary_key: String,
    /// Every index, home included.
    pub indices: Vec<IndexEntry>,
    /// Declared links.
    #[serde(default)]
    pub links: Vec<LinkDefinition>,
}

#[derive(Debug)]
struct DeclaredLink {
    definition: LinkDefinition,
    link: LinkRef,
}

/// Immutable index metadata.
///
/// Every declared link is interned once at build time, so lookups return
/// canonical instances. The catalog holds no per-run state and can be
/// shared between threads; open a [`CatalogSession`] per optimizer run.
#[derive(Debug)]
pub struct MetadataCatalog {
    home_index: String,
    home: LinkRef,
    indices: Vec<IndexEntry>,
    links: Vec<DeclaredLink>,
    by_prefix: HashMap<String, usize>,
}

/// Builder for [`MetadataCatalog`].
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    definition: CatalogDefinition,
}

impl CatalogBuilder {
    /// Start a catalog for `home_index` keyed by `primary_key`.
    pub fn new(home_index: impl Into<String>, primary_key: impl Into<String>) -> Self {
        let home_index = home_index.into();
        Self {
            definition: CatalogDefinition {
                indices: vec![IndexEntry {
                    name: home_index.clone(),
                    fields: Vec::new(),
                }],
                home_index,
                primary_key: primary_key.into(),
                links: Vec::new(),
            },
        }
    }

    /// Declare fields of an index, creating the index if needed.
    pub fn with_fields<I, S>(mut self, index: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let index = index.into();
        let fields = fields.into_iter().map(Into::into);
        match self.definition.indices.iter_mut().find(|e| e.name == index) {
            Some(entry) => entry.fields.extend(fields),
            None => self.definition.indices.push(IndexEntry {
                name: index,
                fields: fields.collect(),
            }),
        }
        self
    }

    /// Declare a link.
    pub fn with_link(mut self, link: LinkDefinition) -> Self {
        self.definition.links.push(link);
        self
    }

    /// Validate and intern.
    pub fn build(self) -> LinkageResult<MetadataCatalog> {
        MetadataCatalog::from_definition(self.definition)
    }
}

impl MetadataCatalog {
    /// Start building a catalog.
    pub fn builder(home_index: impl Into<String>, primary_key: impl Into<String>) -> CatalogBuilder {
        CatalogBuilder::new(home_index, primary_key)
    }

    /// Build a catalog from a serialized definition.
    pub fn from_definition(definition: CatalogDefinition) -> LinkageResult<Self> {
        let CatalogDefinition {
            home_index,
            primary_key,
            mut indices,
            links,
        } = definition;

        if !indices.iter().any(|e| e.name == home_index) {
            indices.insert(
                0,
                IndexEntry {
                    name: home_index.clone(),
                    fields: Vec::new(),
                },
            );
        }

        let mut names = HashSet::new();
        for entry in &indices {
            if !names.insert(entry.name.as_str()) {
                return Err(LinkageError::config(format!(
                    "index '{}' declared twice",
                    entry.name
                )));
            }
        }

        let mut declared = Vec::with_capacity(links.len());
        let mut by_prefix = HashMap::new();
        for definition in links {
            for index in [&definition.source_index, &definition.target_index] {
                if !names.contains(index.as_str()) {
                    return Err(LinkageError::unknown_index(index.clone()));
                }
            }
            if let Some(prefix) = &definition.fieldname {
                if by_prefix.insert(prefix.clone(), declared.len()).is_some() {
                    return Err(LinkageError::config(format!(
                        "link prefix '{prefix}' declared twice"
                    )));
                }
            }
            let link = LinkRef::new(
                IndexLink::new(
                    definition.left_field.clone(),
                    definition.target_index.clone(),
                    definition.right_field.clone(),
                )
                .with_optional_fieldname(definition.fieldname.clone()),
            );
            declared.push(DeclaredLink { definition, link });
        }

        let home = LinkRef::new(IndexLink::new(
            primary_key.clone(),
            home_index.clone(),
            primary_key,
        ));

        Ok(Self {
            home_index,
            home,
            indices,
            links: declared,
            by_prefix,
        })
    }

    /// Name of the home index.
    pub fn home_index_name(&self) -> &str {
        &self.home_index
    }

    /// Open a per-run session.
    pub fn session(&self) -> CatalogSession<'_> {
        CatalogSession {
            catalog: self,
            used: None,
        }
    }

    fn fields_of(&self, index: &str) -> &[String] {
        self.indices
            .iter()
            .find(|e| e.name == index)
            .map_or(&[], |e| e.fields.as_slice())
    }

    fn declares_field(&self, index: &str, field: &str) -> bool {
        self.fields_of(index).iter().any(|f| f == field)
    }

    /// See [`IndexMetadata::resolve_field_owner`].
    pub fn resolve_field_owner(&self, fieldname: &str) -> LinkageResult<LinkRef> {
        if let Some((prefix, rest)) = fieldname.split_once('.') {
            if let Some(&i) = self.by_prefix.get(prefix) {
                let declared = &self.links[i];
                if !self.declares_field(&declared.definition.target_index, rest) {
                    return Err(LinkageError::unknown_field(fieldname));
                }
                return Ok(declared.link.clone());
            }
        }

        if self.declares_field(&self.home_index, fieldname) {
            return Ok(self.home.clone());
        }

        self.links
            .iter()
            .find(|d| self.declares_field(&d.definition.target_index, fieldname))
            .map(|d| d.link.clone())
            .ok_or_else(|| LinkageError::unknown_field(fieldname))
    }

    /// See [`IndexMetadata::resolve_index_by_name`].
    pub fn resolve_index_by_name(&self, name: &str) -> LinkageResult<LinkRef> {
        if name == self.home_index {
            return Ok(self.home.clone());
        }
        self.links
            .iter()
            .find(|d| d.definition.target_index == name)
            .map(|d| d.link.clone())
            .ok_or_else(|| LinkageError::unknown_index(name))
    }

    /// See [`IndexMetadata::resolve_wildcard_fields`].
    pub fn resolve_wildcard_fields(&self) -> Vec<FieldAndIndexPair> {
        let mut pairs: Vec<_> = self
            .fields_of(&self.home_index)
            .iter()
            .map(|f| FieldAndIndexPair::new(f.clone(), None))
            .collect();

        for declared in &self.links {
            for field in self.fields_of(&declared.definition.target_index) {
                let fieldname = match &declared.definition.fieldname {
                    Some(prefix) => format!("{prefix}.{field}"),
                    None => field.clone(),
                };
                pairs.push(FieldAndIndexPair::new(
                    fieldname,
                    Some(declared.link.clone()),
                ));
            }
        }

        pairs
    }

    /// See [`IndexMetadata::compute_join_path`].
    ///
    /// Each link on the chain contributes `"<target>:<right>"` then
    /// `"<source>:<left>"`, innermost link first, with a bare `"<index>"`
    /// between consecutive links.
    pub fn compute_join_path(&self, from: &LinkRef, to: &LinkRef) -> LinkageResult<Vec<String>> {
        let start = self.named_index(to)?;
        let chain = match self.links.iter().position(|d| d.link == *from) {
            Some(last) => {
                let source = &self.links[last].definition.source_index;
                let mut chain = self.shortest_chain(start, source).ok_or_else(|| {
                    LinkageError::unreachable(self.links[last].definition.target_index.clone(), start)
                })?;
                chain.push(last);
                chain
            }
            None => {
                let target = self.named_index(from)?;
                self.shortest_chain(start, target)
                    .ok_or_else(|| LinkageError::unreachable(target, start))?
            }
        };

        let mut hops = Vec::with_capacity(chain.len() * 3);
        for (k, &i) in chain.iter().enumerate().rev() {
            let d = &self.links[i].definition;
            hops.push(field_hop(&d.target_index, &d.right_field));
            hops.push(field_hop(&d.source_index, &d.left_field));
            if k > 0 {
                hops.push(d.source_index.clone());
            }
        }

        trace!("Join path from {from} to {to}: {hops:?}");
        Ok(hops)
    }

    fn named_index<'a>(&self, link: &'a LinkRef) -> LinkageResult<&'a str> {
        link.index_name().ok_or_else(|| {
            LinkageError::internal(format!("cannot route through deferred link {link}"))
        })
    }

    /// Breadth-first search over declared links; returns link positions.
    fn shortest_chain(&self, from: &str, to: &str) -> Option<Vec<usize>> {
        if from == to {
            return Some(Vec::new());
        }

        let mut came_from: HashMap<&str, usize> = HashMap::new();
        let mut queue = VecDeque::from([from]);
        let mut visited = HashSet::from([from]);

        while let Some(index) = queue.pop_front() {
            for (i, declared) in self.links.iter().enumerate() {
                let d = &declared.definition;
                if d.source_index != index || !visited.insert(d.target_index.as_str()) {
                    continue;
                }
                came_from.insert(d.target_index.as_str(), i);
                if d.target_index == to {
                    let mut chain = Vec::new();
                    let mut cursor = to;
                    while cursor != from {
                        let step = came_from[cursor];
                        chain.push(step);
                        cursor = self.links[step].definition.source_index.as_str();
                    }
                    chain.reverse();
                    return Some(chain);
                }
                queue.push_back(d.target_index.as_str());
            }
        }

        None
    }
}

/// One optimizer run's view of a [`MetadataCatalog`].
///
/// Lookups go to the shared catalog; the used-index set recorded at the end
/// of the run stays with the session.
#[derive(Debug)]
pub struct CatalogSession<'a> {
    catalog: &'a MetadataCatalog,
    used: Option<UsedIndexes>,
}

impl CatalogSession<'_> {
    /// The set recorded by the finished run, if any.
    pub fn used_indexes(&self) -> Option<&UsedIndexes> {
        self.used.as_ref()
    }

    /// Take the recorded set.
    pub fn into_used_indexes(self) -> Option<UsedIndexes> {
        self.used
    }
}

impl IndexMetadata for CatalogSession<'_> {
    fn home_index(&self) -> LinkRef {
        self.catalog.home.clone()
    }

    fn resolve_field_owner(&self, fieldname: &str) -> LinkageResult<LinkRef> {
        self.catalog.resolve_field_owner(fieldname)
    }

    fn resolve_index_by_name(&self, name: &str) -> LinkageResult<LinkRef> {
        self.catalog.resolve_index_by_name(name)
    }

    fn resolve_wildcard_fields(&self) -> LinkageResult<Vec<FieldAndIndexPair>> {
        Ok(self.catalog.resolve_wildcard_fields())
    }

    fn compute_join_path(&self, from: &LinkRef, to: &LinkRef) -> LinkageResult<Vec<String>> {
        self.catalog.compute_join_path(from, to)
    }

    fn record_used_indexes(&mut self, used: &UsedIndexes) {
        self.used = Some(used.clone());
    }
}

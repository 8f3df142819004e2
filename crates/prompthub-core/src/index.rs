use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::{Error, Result, Tag, TagForest};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum IndexMode {
    /// Duplicate ids are logged and the last node visited wins.
    #[default]
    Lenient,
    /// Duplicate ids fail with `DuplicateTagId`.
    Strict,
}

/// Flat id -> node lookup derived from a [`TagForest`].
///
/// Entries are handles to the forest's own nodes, not copies. The index is
/// never edited; rebuild it whenever the forest changes.
#[derive(Debug, Clone, Default)]
pub struct TagIndex {
    nodes: HashMap<String, Arc<Tag>>,
}

impl TagIndex {
    pub fn build(forest: &TagForest) -> Self {
        let mut nodes = HashMap::new();
        for tag in forest.walk() {
            if let Some(prev) = nodes.insert(tag.id.clone(), Arc::clone(tag)) {
                log::warn!(
                    "duplicate tag id '{}' ('{}' replaced by '{}')",
                    tag.id,
                    prev.name,
                    tag.name
                );
            }
        }
        Self { nodes }
    }

    pub fn build_strict(forest: &TagForest) -> Result<Self> {
        let mut nodes = HashMap::new();
        for tag in forest.walk() {
            if nodes.insert(tag.id.clone(), Arc::clone(tag)).is_some() {
                return Err(Error::DuplicateTagId(tag.id.clone()));
            }
        }
        Ok(Self { nodes })
    }

    pub fn build_with(forest: &TagForest, mode: IndexMode) -> Result<Self> {
        match mode {
            IndexMode::Lenient => Ok(Self::build(forest)),
            IndexMode::Strict => Self::build_strict(forest),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Tag>> {
        self.nodes.get(id)
    }

    pub fn name(&self, id: &str) -> Option<&str> {
        self.nodes.get(id).map(|t| t.name.as_str())
    }

    /// Display names for `ids`, in order. Ids that don't resolve are skipped.
    pub fn names<'a, I>(&'a self, ids: I) -> Vec<&'a str>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        ids.into_iter()
            .filter_map(|id| self.name(id.as_ref()))
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn forest() -> TagForest {
        TagForest::new(vec![
            Tag::new("1", "Image Generation").with_children(vec![
                Tag::new("1-1", "Photorealism"),
                Tag::new("1-2", "Anime"),
            ]),
            Tag::new("3", "Code Generation"),
        ])
    }

    fn snapshot(index: &TagIndex) -> BTreeMap<String, String> {
        index
            .ids()
            .map(|id| (id.to_string(), index.name(id).unwrap().to_string()))
            .collect()
    }

    #[test]
    fn indexes_every_depth() {
        let index = TagIndex::build(&forest());
        assert_eq!(index.len(), 4);
        assert_eq!(index.name("1-2"), Some("Anime"));
        assert_eq!(index.name("3"), Some("Code Generation"));
    }

    #[test]
    fn rebuilding_is_idempotent() {
        let forest = forest();
        assert_eq!(snapshot(&TagIndex::build(&forest)), snapshot(&TagIndex::build(&forest)));
    }

    #[test]
    fn entries_point_at_live_nodes() {
        let forest = forest();
        let index = TagIndex::build(&forest);
        let root = &forest.roots()[0];
        assert!(Arc::ptr_eq(index.get("1").unwrap(), root));
        assert!(Arc::ptr_eq(index.get("1-1").unwrap(), &root.children[0]));
    }

    #[test]
    fn names_skip_dangling_ids() {
        let index = TagIndex::build(&forest());
        assert_eq!(index.names(["1", "gone", "1-1"]), vec!["Image Generation", "Photorealism"]);
    }

    #[test]
    fn duplicates_last_write_wins() {
        let forest = TagForest::new(vec![
            Tag::new("a", "first"),
            Tag::new("b", "parent").with_children(vec![Tag::new("a", "second")]),
        ]);
        let index = TagIndex::build(&forest);
        assert_eq!(index.len(), 2);
        assert_eq!(index.name("a"), Some("second"));
    }

    #[test]
    fn strict_mode_rejects_duplicates() {
        let forest = TagForest::new(vec![Tag::new("a", "first"), Tag::new("a", "again")]);
        let err = TagIndex::build_with(&forest, IndexMode::Strict).unwrap_err();
        assert!(matches!(err, Error::DuplicateTagId(id) if id == "a"));
        assert!(TagIndex::build_with(&forest, IndexMode::Lenient).is_ok());
    }
}

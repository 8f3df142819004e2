use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::Tag;

/// Root-level tags in display order. Multiple roots are allowed.
///
/// Cloning is shallow: roots and children are `Arc`s, so an edited forest
/// shares every untouched branch with the one it was derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagForest {
    roots: Vec<Arc<Tag>>,
}

impl TagForest {
    pub fn new(roots: Vec<Tag>) -> Self {
        Self {
            roots: roots.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn roots(&self) -> &[Arc<Tag>] {
        &self.roots
    }

    pub(crate) fn roots_mut(&mut self) -> &mut Vec<Arc<Tag>> {
        &mut self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Every node, depth-first, parents before children.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: self.roots.iter().rev().collect(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.walk().count()
    }

    pub fn find(&self, id: &str) -> Option<&Arc<Tag>> {
        self.walk().find(|t| t.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Id of `id`'s parent, `None` for roots and unknown ids.
    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.walk()
            .find(|t| t.children.iter().any(|c| c.id == id))
            .map(|t| t.id.as_str())
    }

    /// Ids of the node and all of its descendants, or empty if absent.
    pub fn subtree_ids(&self, id: &str) -> Vec<String> {
        let Some(node) = self.find(id) else {
            return Vec::new();
        };
        let mut ids = Vec::new();
        let mut stack = vec![node];
        while let Some(tag) = stack.pop() {
            ids.push(tag.id.clone());
            stack.extend(tag.children.iter().rev());
        }
        ids
    }

    /// Length of the longest root-to-leaf path; 0 for an empty forest.
    pub fn depth(&self) -> usize {
        fn depth_of(tag: &Tag) -> usize {
            1 + tag.children.iter().map(|c| depth_of(c)).max().unwrap_or(0)
        }
        self.roots.iter().map(|r| depth_of(r)).max().unwrap_or(0)
    }
}

impl From<Vec<Tag>> for TagForest {
    fn from(roots: Vec<Tag>) -> Self {
        Self::new(roots)
    }
}

pub struct Walk<'a> {
    stack: Vec<&'a Arc<Tag>>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Arc<Tag>;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.stack.pop()?;
        self.stack.extend(tag.children.iter().rev());
        Some(tag)
    }
}

//! Tag editing: add, rename, delete and drag-and-drop moves.
//!
//! Every operation takes the current forest by reference and returns a new
//! one. The input is never touched, so on any error the caller still holds
//! the unchanged tree. Only nodes on the path to an edit are copied
//! (`Arc::make_mut`); untouched branches stay shared.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::ids::IdMint;
use crate::{Error, Result, Tag, TagForest};

/// Where a dragged tag lands relative to the tag it is dropped on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum DropPosition {
    Before,
    After,
    Into,
}

impl DropPosition {
    /// Classify a pointer over a row: top quarter drops before the row,
    /// bottom quarter after it, the middle half drops into it.
    pub fn classify(offset_y: f64, row_height: f64) -> Self {
        if !offset_y.is_finite() || !row_height.is_finite() || row_height <= 0.0 {
            return DropPosition::Into;
        }
        if offset_y < row_height * 0.25 {
            DropPosition::Before
        } else if offset_y > row_height * 0.75 {
            DropPosition::After
        } else {
            DropPosition::Into
        }
    }
}

fn clean_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidName);
    }
    Ok(trimmed.to_string())
}

/// Create a tag named `name` (trimmed) as the last root, or as the last
/// child of `parent_id`. Returns the new forest and the minted id.
pub fn add_tag(
    forest: &TagForest,
    name: &str,
    parent_id: Option<&str>,
    ids: &mut IdMint,
) -> Result<(TagForest, String)> {
    let name = clean_name(name)?;
    if let Some(parent) = parent_id {
        if !forest.contains(parent) {
            return Err(Error::TagNotFound(parent.to_string()));
        }
    }

    let id = ids.mint();
    let tag = Arc::new(Tag::new(id.clone(), name));
    let mut next = forest.clone();
    match parent_id {
        None => next.roots_mut().push(tag),
        Some(parent) => {
            update_node(next.roots_mut(), parent, &mut |p: &mut Tag| {
                p.children.push(Arc::clone(&tag))
            });
        }
    }
    Ok((next, id))
}

pub fn rename_tag(forest: &TagForest, tag_id: &str, new_name: &str) -> Result<TagForest> {
    let name = clean_name(new_name)?;
    let mut next = forest.clone();
    if !update_node(next.roots_mut(), tag_id, &mut |t: &mut Tag| t.name = name.clone()) {
        return Err(Error::TagNotFound(tag_id.to_string()));
    }
    Ok(next)
}

/// Remove a tag together with its whole subtree.
pub fn delete_tag(forest: &TagForest, tag_id: &str) -> Result<TagForest> {
    let mut next = forest.clone();
    detach(next.roots_mut(), tag_id).ok_or_else(|| Error::TagNotFound(tag_id.to_string()))?;
    Ok(next)
}

/// Move `dragged_id` (with its subtree) before, after, or into `target_id`.
///
/// Dropping a tag onto itself or onto one of its own descendants is an
/// `InvalidMove`. Before/After reinsert into whichever sibling list holds
/// the target; Into appends to the target's children.
pub fn move_tag(
    forest: &TagForest,
    dragged_id: &str,
    target_id: &str,
    position: DropPosition,
) -> Result<TagForest> {
    let dragged = forest
        .find(dragged_id)
        .ok_or_else(|| Error::TagNotFound(dragged_id.to_string()))?;
    let invalid = |reason| Error::InvalidMove {
        dragged: dragged_id.to_string(),
        target: target_id.to_string(),
        reason,
    };
    if dragged_id == target_id {
        return Err(invalid("a tag cannot be dropped onto itself"));
    }
    if dragged.contains(target_id) {
        return Err(invalid("the target is inside the dragged tag"));
    }
    if !forest.contains(target_id) {
        return Err(Error::TagNotFound(target_id.to_string()));
    }

    let mut next = forest.clone();
    let node = detach(next.roots_mut(), dragged_id)
        .ok_or_else(|| Error::TagNotFound(dragged_id.to_string()))?;
    let placed = match position {
        DropPosition::Into => update_node(next.roots_mut(), target_id, &mut |t: &mut Tag| {
            t.children.push(Arc::clone(&node))
        }),
        DropPosition::Before => insert_beside(next.roots_mut(), target_id, &node, false),
        DropPosition::After => insert_beside(next.roots_mut(), target_id, &node, true),
    };
    if !placed {
        return Err(Error::TagNotFound(target_id.to_string()));
    }
    Ok(next)
}

/// Check a whole forest before it replaces the current one: names must be
/// non-blank and ids unique.
pub fn validate_forest(forest: &TagForest) -> Result<()> {
    let mut seen = HashSet::new();
    for tag in forest.walk() {
        if tag.name.trim().is_empty() {
            return Err(Error::InvalidName);
        }
        if !seen.insert(tag.id.as_str()) {
            return Err(Error::DuplicateTagId(tag.id.clone()));
        }
    }
    Ok(())
}

// --- Path-copying helpers ---

fn update_node(list: &mut [Arc<Tag>], id: &str, f: &mut dyn FnMut(&mut Tag)) -> bool {
    for node in list.iter_mut() {
        if node.id == id {
            f(Arc::make_mut(node));
            return true;
        }
        if node.contains(id) {
            return update_node(&mut Arc::make_mut(node).children, id, f);
        }
    }
    false
}

fn detach(list: &mut Vec<Arc<Tag>>, id: &str) -> Option<Arc<Tag>> {
    if let Some(pos) = list.iter().position(|t| t.id == id) {
        return Some(list.remove(pos));
    }
    for node in list.iter_mut() {
        if node.contains(id) {
            return detach(&mut Arc::make_mut(node).children, id);
        }
    }
    None
}

fn insert_beside(list: &mut Vec<Arc<Tag>>, target: &str, node: &Arc<Tag>, after: bool) -> bool {
    if let Some(pos) = list.iter().position(|t| t.id == target) {
        let at = if after { pos + 1 } else { pos };
        list.insert(at, Arc::clone(node));
        return true;
    }
    for child in list.iter_mut() {
        if child.contains(target) {
            return insert_beside(&mut Arc::make_mut(child).children, target, node, after);
        }
    }
    false
}

// --- Drag state ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropIndicator {
    pub target_id: String,
    pub position: DropPosition,
}

/// State of one drag gesture in the tag editor.
#[derive(Debug, Clone, Default)]
pub struct DragState {
    dragged: Option<String>,
    indicator: Option<DropIndicator>,
}

impl DragState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, tag_id: impl Into<String>) {
        self.dragged = Some(tag_id.into());
        self.indicator = None;
    }

    pub fn dragged(&self) -> Option<&str> {
        self.dragged.as_deref()
    }

    pub fn indicator(&self) -> Option<&DropIndicator> {
        self.indicator.as_ref()
    }

    /// Pointer moved over `target_id`'s row. Hovering the dragged tag itself
    /// leaves the previous indicator in place.
    pub fn hover(&mut self, target_id: &str, offset_y: f64, row_height: f64) -> Option<&DropIndicator> {
        let dragged = self.dragged.as_deref()?;
        if dragged != target_id {
            self.indicator = Some(DropIndicator {
                target_id: target_id.to_string(),
                position: DropPosition::classify(offset_y, row_height),
            });
        }
        self.indicator.as_ref()
    }

    /// Resolve the gesture against `forest` and reset. `Ok(None)` means there
    /// was nothing to drop.
    pub fn drop_on(&mut self, forest: &TagForest) -> Result<Option<TagForest>> {
        let dragged = self.dragged.take();
        let indicator = self.indicator.take();
        match (dragged, indicator) {
            (Some(dragged), Some(ind)) => {
                move_tag(forest, &dragged, &ind.target_id, ind.position).map(Some)
            }
            _ => Ok(None),
        }
    }

    pub fn cancel(&mut self) {
        self.dragged = None;
        self.indicator = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forest() -> TagForest {
        TagForest::new(vec![
            Tag::new("1", "Image").with_children(vec![
                Tag::new("1-1", "Photo"),
                Tag::new("1-2", "Anime"),
                Tag::new("1-3", "Fantasy"),
            ]),
            Tag::new("2", "Text").with_children(vec![Tag::new("2-1", "Copy")]),
            Tag::new("3", "Code"),
        ])
    }

    fn child_ids(forest: &TagForest, id: &str) -> Vec<String> {
        forest
            .find(id)
            .unwrap()
            .children
            .iter()
            .map(|c| c.id.clone())
            .collect()
    }

    fn root_ids(forest: &TagForest) -> Vec<String> {
        forest.roots().iter().map(|t| t.id.clone()).collect()
    }

    #[test]
    fn classify_quartiles() {
        assert_eq!(DropPosition::classify(2.0, 40.0), DropPosition::Before);
        assert_eq!(DropPosition::classify(10.0, 40.0), DropPosition::Into);
        assert_eq!(DropPosition::classify(20.0, 40.0), DropPosition::Into);
        assert_eq!(DropPosition::classify(30.0, 40.0), DropPosition::Into);
        assert_eq!(DropPosition::classify(31.0, 40.0), DropPosition::After);
        assert_eq!(DropPosition::classify(5.0, 0.0), DropPosition::Into);
        assert_eq!(DropPosition::classify(f64::NAN, 40.0), DropPosition::Into);
    }

    #[test]
    fn add_root_and_child() {
        let mut ids = IdMint::new("tag-");
        let (f1, root) = add_tag(&forest(), "  Music ", None, &mut ids).unwrap();
        assert_eq!(root, "tag-1");
        assert_eq!(root_ids(&f1), ["1", "2", "3", "tag-1"]);
        assert_eq!(f1.find("tag-1").unwrap().name, "Music");

        let (f2, child) = add_tag(&f1, "Lyrics", Some("3"), &mut ids).unwrap();
        assert_eq!(child, "tag-2");
        assert_eq!(child_ids(&f2, "3"), ["tag-2"]);
        // the previous value is untouched
        assert!(f1.find("3").unwrap().is_leaf());
    }

    #[test]
    fn add_rejects_blank_name_and_unknown_parent() {
        let mut ids = IdMint::new("tag-");
        assert!(matches!(add_tag(&forest(), "   ", None, &mut ids), Err(Error::InvalidName)));
        assert!(matches!(
            add_tag(&forest(), "x", Some("404"), &mut ids),
            Err(Error::TagNotFound(id)) if id == "404"
        ));
        // failed adds don't burn ids
        assert_eq!(ids.peek(), "tag-1");
    }

    #[test]
    fn rename_nested() {
        let renamed = rename_tag(&forest(), "1-2", " Manga ").unwrap();
        assert_eq!(renamed.find("1-2").unwrap().name, "Manga");
        assert!(matches!(rename_tag(&forest(), "1-2", ""), Err(Error::InvalidName)));
        assert!(matches!(rename_tag(&forest(), "zz", "x"), Err(Error::TagNotFound(_))));
    }

    #[test]
    fn rename_shares_untouched_branches() {
        let before = forest();
        let after = rename_tag(&before, "1-2", "Manga").unwrap();
        assert!(!Arc::ptr_eq(&before.roots()[0], &after.roots()[0]));
        assert!(Arc::ptr_eq(&before.roots()[1], &after.roots()[1]));
        assert!(Arc::ptr_eq(
            &before.roots()[0].children[0],
            &after.roots()[0].children[0]
        ));
    }

    #[test]
    fn delete_removes_subtree() {
        let tree = TagForest::new(vec![Tag::new("root", "Root").with_children(vec![
            Tag::new("child1", "Child").with_children(vec![Tag::new("grandchild", "Grand")]),
        ])]);
        let after = delete_tag(&tree, "child1").unwrap();
        assert!(after.find("root").unwrap().is_leaf());
        assert!(!crate::TagIndex::build(&after).contains("grandchild"));
    }

    #[test]
    fn delete_unknown_is_not_found() {
        let before = forest();
        assert!(matches!(delete_tag(&before, "nope"), Err(Error::TagNotFound(_))));
        assert_eq!(before, forest());
    }

    #[test]
    fn move_before_keeps_sibling_order() {
        let moved = move_tag(&forest(), "1-3", "1-1", DropPosition::Before).unwrap();
        assert_eq!(child_ids(&moved, "1"), ["1-3", "1-1", "1-2"]);
    }

    #[test]
    fn move_after_across_parents() {
        let moved = move_tag(&forest(), "2-1", "1-1", DropPosition::After).unwrap();
        assert_eq!(child_ids(&moved, "1"), ["1-1", "2-1", "1-2", "1-3"]);
        assert!(moved.find("2").unwrap().is_leaf());
    }

    #[test]
    fn move_into_appends_child_with_subtree() {
        let moved = move_tag(&forest(), "2", "3", DropPosition::Into).unwrap();
        assert_eq!(root_ids(&moved), ["1", "3"]);
        assert_eq!(child_ids(&moved, "3"), ["2"]);
        assert_eq!(child_ids(&moved, "2"), ["2-1"]);
    }

    #[test]
    fn move_nested_to_root_level() {
        let moved = move_tag(&forest(), "1-2", "3", DropPosition::Before).unwrap();
        assert_eq!(root_ids(&moved), ["1", "2", "1-2", "3"]);
        assert_eq!(moved.node_count(), forest().node_count());
    }

    #[test]
    fn move_into_descendant_is_rejected_and_tree_unchanged() {
        let before = forest();
        let snapshot = serde_json::to_string(&before).unwrap();
        let err = move_tag(&before, "1", "1-2", DropPosition::Into).unwrap_err();
        assert!(matches!(err, Error::InvalidMove { .. }));
        assert_eq!(serde_json::to_string(&before).unwrap(), snapshot);
    }

    #[test]
    fn move_onto_self_is_rejected() {
        for pos in [DropPosition::Before, DropPosition::After, DropPosition::Into] {
            assert!(matches!(
                move_tag(&forest(), "2", "2", pos),
                Err(Error::InvalidMove { .. })
            ));
        }
    }

    #[test]
    fn move_with_unknown_ids() {
        assert!(matches!(
            move_tag(&forest(), "x", "1", DropPosition::Into),
            Err(Error::TagNotFound(id)) if id == "x"
        ));
        assert!(matches!(
            move_tag(&forest(), "1", "x", DropPosition::Into),
            Err(Error::TagNotFound(id)) if id == "x"
        ));
    }

    #[test]
    fn validate_catches_blank_names_and_duplicates() {
        assert!(validate_forest(&forest()).is_ok());
        let blank = TagForest::new(vec![Tag::new("a", " ")]);
        assert!(matches!(validate_forest(&blank), Err(Error::InvalidName)));
        let dup = TagForest::new(vec![
            Tag::new("a", "A").with_children(vec![Tag::new("a", "again")]),
        ]);
        assert!(matches!(validate_forest(&dup), Err(Error::DuplicateTagId(_))));
    }

    #[test]
    fn drag_gesture_moves_tag() {
        let mut drag = DragState::new();
        drag.start("3");
        let ind = drag.hover("1-1", 1.0, 40.0).cloned().unwrap();
        assert_eq!(ind.position, DropPosition::Before);
        let moved = drag.drop_on(&forest()).unwrap().unwrap();
        assert_eq!(child_ids(&moved, "1"), ["3", "1-1", "1-2", "1-3"]);
        assert!(drag.dragged().is_none());
        assert!(drag.indicator().is_none());
    }

    #[test]
    fn hovering_self_keeps_previous_indicator() {
        let mut drag = DragState::new();
        drag.start("2");
        drag.hover("3", 20.0, 40.0);
        drag.hover("2", 20.0, 40.0);
        assert_eq!(drag.indicator().unwrap().target_id, "3");
    }

    #[test]
    fn drop_without_gesture_is_noop() {
        let mut drag = DragState::new();
        assert!(drag.drop_on(&forest()).unwrap().is_none());
        drag.start("1");
        assert!(drag.drop_on(&forest()).unwrap().is_none());
        assert!(drag.hover("1-1", 1.0, 10.0).is_none());
    }

    #[test]
    fn drop_into_own_child_is_rejected() {
        let mut drag = DragState::new();
        drag.start("1");
        drag.hover("1-1", 20.0, 40.0);
        assert!(matches!(drag.drop_on(&forest()), Err(Error::InvalidMove { .. })));
        assert!(drag.dragged().is_none());
    }
}

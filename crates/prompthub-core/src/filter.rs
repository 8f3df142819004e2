//! Prompt filtering: visibility scope AND tag selection AND free-text search.
//!
//! Filtering is a stable sub-sequence of the input; nothing is ranked or
//! re-sorted.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::users::AuthorLookup;
use crate::Prompt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum VisibilityScope {
    /// Everything the current user may see.
    #[default]
    All,
    /// Only prompts authored by the current user, public or not.
    MineOnly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum TagMatchMode {
    /// Keep prompts carrying at least one selected tag.
    #[default]
    Any,
    /// Keep prompts carrying every selected tag.
    All,
}

/// What `VisibilityScope::All` means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum VisibilityPolicy {
    /// Public prompts plus the current user's own. With nobody signed in,
    /// public prompts only.
    #[default]
    PublicOrOwn,
    /// Every prompt, regardless of the public flag.
    Unrestricted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterCriteria {
    pub scope: VisibilityScope,
    pub selected_tag_ids: BTreeSet<String>,
    pub search_query: String,
}

impl FilterCriteria {
    /// Select `tag_id` if it wasn't, deselect it if it was. Returns whether it
    /// is selected afterwards.
    pub fn toggle_tag(&mut self, tag_id: &str) -> bool {
        if self.selected_tag_ids.remove(tag_id) {
            false
        } else {
            self.selected_tag_ids.insert(tag_id.to_string());
            true
        }
    }

    pub fn clear_tags(&mut self) {
        self.selected_tag_ids.clear();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterOptions {
    pub tag_match_mode: TagMatchMode,
    pub visibility_policy: VisibilityPolicy,
}

/// One filter pass: criteria bound to the viewer and, optionally, to an
/// author directory so searches also hit author names.
pub struct PromptFilter<'a> {
    criteria: &'a FilterCriteria,
    options: FilterOptions,
    current_user: Option<&'a str>,
    authors: Option<&'a dyn AuthorLookup>,
    needle: String,
}

impl<'a> PromptFilter<'a> {
    pub fn new(criteria: &'a FilterCriteria, current_user: Option<&'a str>) -> Self {
        Self {
            criteria,
            options: FilterOptions::default(),
            current_user,
            authors: None,
            needle: criteria.search_query.to_lowercase(),
        }
    }

    pub fn with_options(mut self, options: FilterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_authors(mut self, authors: &'a dyn AuthorLookup) -> Self {
        self.authors = Some(authors);
        self
    }

    pub fn matches(&self, prompt: &Prompt) -> bool {
        self.visible(prompt) && self.tags_match(prompt) && self.search_matches(prompt)
    }

    pub fn apply<'p>(&self, prompts: &'p [Prompt]) -> Vec<&'p Prompt> {
        prompts.iter().filter(|p| self.matches(p)).collect()
    }

    fn is_own(&self, prompt: &Prompt) -> bool {
        self.current_user.is_some_and(|u| prompt.is_authored_by(u))
    }

    fn visible(&self, prompt: &Prompt) -> bool {
        match (self.criteria.scope, self.options.visibility_policy) {
            (VisibilityScope::MineOnly, _) => self.is_own(prompt),
            (VisibilityScope::All, VisibilityPolicy::PublicOrOwn) => {
                prompt.is_public || self.is_own(prompt)
            }
            (VisibilityScope::All, VisibilityPolicy::Unrestricted) => true,
        }
    }

    fn tags_match(&self, prompt: &Prompt) -> bool {
        let selected = &self.criteria.selected_tag_ids;
        if selected.is_empty() {
            return true;
        }
        match self.options.tag_match_mode {
            TagMatchMode::Any => selected.iter().any(|t| prompt.has_tag(t)),
            TagMatchMode::All => selected.iter().all(|t| prompt.has_tag(t)),
        }
    }

    fn search_matches(&self, prompt: &Prompt) -> bool {
        if self.needle.is_empty() {
            return true;
        }
        let hit = |s: &str| s.to_lowercase().contains(&self.needle);
        hit(&prompt.title)
            || hit(&prompt.prompt_text)
            || self
                .authors
                .and_then(|a| a.author_name(&prompt.author))
                .is_some_and(hit)
    }
}

/// Filter with default options and no author-name search.
pub fn filter_prompts<'p>(
    prompts: &'p [Prompt],
    criteria: &FilterCriteria,
    current_user: Option<&str>,
) -> Vec<&'p Prompt> {
    PromptFilter::new(criteria, current_user).apply(prompts)
}

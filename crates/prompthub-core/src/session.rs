//! Application state for one browser-style session, and the single entry
//! point through which the presentation layer feeds user intents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::editor::{self, DragState, DropPosition};
use crate::filter::{FilterCriteria, FilterOptions, PromptFilter, TagMatchMode, VisibilityScope};
use crate::ids::IdMint;
use crate::index::IndexMode;
use crate::seed::{self, Seed};
use crate::store::{PromptDraft, PromptStore};
use crate::users::{NewUser, UserDirectory};
use crate::{Error, LibrarySettings, Prompt, Result, TagForest, TagIndex, User};

/// Something the user asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Intent {
    ToggleTag { tag_id: String },
    ClearTags,
    SetVisibility { scope: VisibilityScope },
    SetSearch { query: String },
    SetTagMatchMode { mode: TagMatchMode },
    AddTag { name: String, parent_id: Option<String> },
    RenameTag { tag_id: String, name: String },
    DeleteTag { tag_id: String },
    MoveTag { dragged_id: String, target_id: String, position: DropPosition },
    ReplaceTags { tags: TagForest },
    AddPrompt { draft: PromptDraft },
    EditPrompt { prompt_id: String, draft: PromptDraft },
    DeletePrompt { prompt_id: String },
    OpenPrompt { prompt_id: String },
    ClosePrompt,
}

fn logged<T>(op: &str, result: Result<T>) -> Result<T> {
    result.inspect_err(|e| log::warn!("{op} rejected: {e}"))
}

pub struct Session {
    users: UserDirectory,
    current_user: Option<String>,
    tags: TagForest,
    index: TagIndex,
    index_mode: IndexMode,
    tag_ids: IdMint,
    prompts: PromptStore,
    prompt_ids: IdMint,
    criteria: FilterCriteria,
    options: FilterOptions,
    open_prompt: Option<String>,
}

impl Session {
    pub fn new(seed: Seed, library: &LibrarySettings) -> Result<Self> {
        let index_mode = if library.strict_tag_index {
            IndexMode::Strict
        } else {
            IndexMode::Lenient
        };
        let index = TagIndex::build_with(&seed.tags, index_mode)?;
        let tag_ids = IdMint::seeded("tag-", seed.tags.walk().map(|t| t.id.as_str()));
        let prompt_ids = IdMint::seeded("p", seed.prompts.ids());
        log::info!(
            "session ready: {} tags, {} prompts, {} users",
            index.len(),
            seed.prompts.len(),
            seed.users.len()
        );
        Ok(Self {
            users: seed.users,
            current_user: None,
            tags: seed.tags,
            index,
            index_mode,
            tag_ids,
            prompts: seed.prompts,
            prompt_ids,
            criteria: FilterCriteria::default(),
            options: FilterOptions {
                tag_match_mode: library.tag_match_mode,
                visibility_policy: library.visibility_policy,
            },
            open_prompt: None,
        })
    }

    pub fn from_seed(library: &LibrarySettings) -> Result<Self> {
        Self::new(seed::load()?, library)
    }

    // --- Users ---

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_deref().and_then(|id| self.users.get(id))
    }

    pub fn sign_in(&mut self, user_id: &str) -> Result<&User> {
        let user = self
            .users
            .get(user_id)
            .ok_or_else(|| Error::UnknownUser(user_id.to_string()))?;
        log::info!("signed in as {}", user.username);
        self.current_user = Some(user.id.clone());
        Ok(user)
    }

    pub fn sign_out(&mut self) {
        self.current_user = None;
        self.open_prompt = None;
    }

    /// Register and sign in as the new user.
    pub fn register_user(&mut self, new_user: NewUser) -> Result<User> {
        let user = self.users.register(new_user)?;
        self.current_user = Some(user.id.clone());
        Ok(user)
    }

    fn require_user(&self) -> Result<&str> {
        self.current_user.as_deref().ok_or(Error::NotSignedIn)
    }

    // --- Tags ---

    pub fn tags(&self) -> &TagForest {
        &self.tags
    }

    pub fn tag_index(&self) -> &TagIndex {
        &self.index
    }

    /// Names of the prompt's tags that still exist, in the prompt's order.
    pub fn tag_names(&self, prompt: &Prompt) -> Vec<&str> {
        self.index.names(&prompt.tags)
    }

    /// Swap in a new forest and its index. Selected filter tags that no
    /// longer exist are dropped from the selection.
    fn commit_tags(&mut self, forest: TagForest) -> Result<()> {
        let index = TagIndex::build_with(&forest, self.index_mode)?;
        let gone: Vec<String> = self
            .index
            .ids()
            .filter(|id| !index.contains(id))
            .map(String::from)
            .collect();
        for id in &gone {
            self.criteria.selected_tag_ids.remove(id);
        }
        self.tags = forest;
        self.index = index;
        Ok(())
    }

    pub fn add_tag(&mut self, name: &str, parent_id: Option<&str>) -> Result<String> {
        let added = editor::add_tag(&self.tags, name, parent_id, &mut self.tag_ids);
        let (forest, id) = logged("add tag", added)?;
        self.commit_tags(forest)?;
        Ok(id)
    }

    pub fn rename_tag(&mut self, tag_id: &str, name: &str) -> Result<()> {
        let forest = logged("rename tag", editor::rename_tag(&self.tags, tag_id, name))?;
        self.commit_tags(forest)
    }

    pub fn delete_tag(&mut self, tag_id: &str) -> Result<()> {
        let forest = logged("delete tag", editor::delete_tag(&self.tags, tag_id))?;
        self.commit_tags(forest)
    }

    pub fn move_tag(&mut self, dragged_id: &str, target_id: &str, position: DropPosition) -> Result<()> {
        let moved = editor::move_tag(&self.tags, dragged_id, target_id, position);
        let forest = logged("move tag", moved)?;
        self.commit_tags(forest)
    }

    /// Finish a drag gesture. Returns whether the forest changed.
    pub fn drop_tag(&mut self, drag: &mut DragState) -> Result<bool> {
        match logged("drop tag", drag.drop_on(&self.tags))? {
            Some(forest) => {
                self.commit_tags(forest)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Replace the whole forest, e.g. when a batch of edits is saved.
    pub fn replace_tags(&mut self, forest: TagForest) -> Result<()> {
        logged("replace tags", editor::validate_forest(&forest))?;
        for tag in forest.walk() {
            self.tag_ids.observe(&tag.id);
        }
        self.commit_tags(forest)
    }

    // --- Prompts ---

    pub fn prompts(&self) -> &PromptStore {
        &self.prompts
    }

    pub fn prompt(&self, id: &str) -> Option<&Prompt> {
        self.prompts.get(id)
    }

    pub fn add_prompt(&mut self, draft: PromptDraft) -> Result<&Prompt> {
        self.add_prompt_at(draft, Utc::now())
    }

    pub fn add_prompt_at(&mut self, draft: PromptDraft, created_at: DateTime<Utc>) -> Result<&Prompt> {
        let author = self.require_user()?.to_string();
        draft.validate()?;
        let id = self.prompt_ids.mint();
        self.prompts.create(id, draft, &author, created_at)
    }

    fn require_author(&self, prompt_id: &str) -> Result<()> {
        let user = self.require_user()?;
        let prompt = self
            .prompts
            .get(prompt_id)
            .ok_or_else(|| Error::PromptNotFound(prompt_id.to_string()))?;
        if !prompt.is_authored_by(user) {
            return Err(Error::NotAuthor(prompt_id.to_string()));
        }
        Ok(())
    }

    pub fn edit_prompt(&mut self, prompt_id: &str, draft: PromptDraft) -> Result<&Prompt> {
        logged("edit prompt", self.require_author(prompt_id))?;
        self.prompts.update(prompt_id, draft)
    }

    /// Delete immediately. If the prompt is open in the detail view, the view
    /// is closed.
    pub fn delete_prompt(&mut self, prompt_id: &str) -> Result<Prompt> {
        logged("delete prompt", self.require_author(prompt_id))?;
        let removed = self.prompts.delete(prompt_id)?;
        if self.open_prompt.as_deref() == Some(prompt_id) {
            self.open_prompt = None;
        }
        log::info!("deleted prompt {}", removed.id);
        Ok(removed)
    }

    pub fn open_prompt(&mut self, prompt_id: &str) -> Result<&Prompt> {
        let prompt = self
            .prompts
            .get(prompt_id)
            .ok_or_else(|| Error::PromptNotFound(prompt_id.to_string()))?;
        self.open_prompt = Some(prompt.id.clone());
        Ok(prompt)
    }

    pub fn close_prompt(&mut self) {
        self.open_prompt = None;
    }

    pub fn opened_prompt(&self) -> Option<&Prompt> {
        self.open_prompt.as_deref().and_then(|id| self.prompts.get(id))
    }

    // --- Filtering ---

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn options(&self) -> FilterOptions {
        self.options
    }

    pub fn set_options(&mut self, options: FilterOptions) {
        self.options = options;
    }

    pub fn set_visibility(&mut self, scope: VisibilityScope) {
        self.criteria.scope = scope;
    }

    pub fn set_search(&mut self, query: impl Into<String>) {
        self.criteria.search_query = query.into();
    }

    pub fn toggle_tag(&mut self, tag_id: &str) -> bool {
        self.criteria.toggle_tag(tag_id)
    }

    pub fn clear_tags(&mut self) {
        self.criteria.clear_tags();
    }

    /// Replace the selected filter tags with `tag_ids`.
    pub fn select_tags<I>(&mut self, tag_ids: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.criteria.selected_tag_ids = tag_ids.into_iter().map(Into::into).collect();
    }

    pub fn visible_prompts(&self) -> Vec<&Prompt> {
        PromptFilter::new(&self.criteria, self.current_user.as_deref())
            .with_options(self.options)
            .with_authors(&self.users)
            .apply(self.prompts.all())
    }

    // --- Intents ---

    pub fn apply(&mut self, intent: Intent) -> Result<()> {
        log::debug!("intent: {intent:?}");
        match intent {
            Intent::ToggleTag { tag_id } => {
                self.toggle_tag(&tag_id);
            }
            Intent::ClearTags => self.clear_tags(),
            Intent::SetVisibility { scope } => self.set_visibility(scope),
            Intent::SetSearch { query } => self.set_search(query),
            Intent::SetTagMatchMode { mode } => self.options.tag_match_mode = mode,
            Intent::AddTag { name, parent_id } => {
                self.add_tag(&name, parent_id.as_deref())?;
            }
            Intent::RenameTag { tag_id, name } => self.rename_tag(&tag_id, &name)?,
            Intent::DeleteTag { tag_id } => self.delete_tag(&tag_id)?,
            Intent::MoveTag {
                dragged_id,
                target_id,
                position,
            } => self.move_tag(&dragged_id, &target_id, position)?,
            Intent::ReplaceTags { tags } => self.replace_tags(tags)?,
            Intent::AddPrompt { draft } => {
                self.add_prompt(draft)?;
            }
            Intent::EditPrompt { prompt_id, draft } => {
                self.edit_prompt(&prompt_id, draft)?;
            }
            Intent::DeletePrompt { prompt_id } => {
                self.delete_prompt(&prompt_id)?;
            }
            Intent::OpenPrompt { prompt_id } => {
                self.open_prompt(&prompt_id)?;
            }
            Intent::ClosePrompt => self.close_prompt(),
        }
        Ok(())
    }
}

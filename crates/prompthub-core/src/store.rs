use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Prompt, Result, SampleResult};

/// The editable fields of a prompt. Id, author and creation time are
/// assigned by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptDraft {
    pub title: String,
    pub prompt_text: String,
    pub ai_model: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_public")]
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_result: Option<SampleResult>,
}

fn default_public() -> bool {
    true
}

impl PromptDraft {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidPrompt("title"));
        }
        if self.prompt_text.trim().is_empty() {
            return Err(Error::InvalidPrompt("prompt text"));
        }
        if self.ai_model.trim().is_empty() {
            return Err(Error::InvalidPrompt("AI model"));
        }
        Ok(())
    }

    fn dedup_tags(mut self) -> Self {
        let mut seen = std::collections::HashSet::new();
        self.tags.retain(|t| seen.insert(t.clone()));
        self
    }
}

impl From<&Prompt> for PromptDraft {
    fn from(p: &Prompt) -> Self {
        Self {
            title: p.title.clone(),
            prompt_text: p.prompt_text.clone(),
            ai_model: p.ai_model.clone(),
            tags: p.tags.clone(),
            is_public: p.is_public,
            sample_result: p.sample_result.clone(),
        }
    }
}

/// Prompts in display order, newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct PromptStore {
    prompts: Vec<Prompt>,
}

impl PromptStore {
    pub fn new(prompts: Vec<Prompt>) -> Self {
        Self { prompts }
    }

    pub fn all(&self) -> &[Prompt] {
        &self.prompts
    }

    pub fn get(&self, id: &str) -> Option<&Prompt> {
        self.prompts.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.prompts.iter().map(|p| p.id.as_str())
    }

    /// Store a new prompt at the front of the list.
    pub fn create(
        &mut self,
        id: String,
        draft: PromptDraft,
        author: &str,
        created_at: DateTime<Utc>,
    ) -> Result<&Prompt> {
        draft.validate()?;
        if self.get(&id).is_some() {
            return Err(Error::DuplicatePromptId(id));
        }
        let draft = draft.dedup_tags();
        let prompt = Prompt {
            id,
            title: draft.title,
            prompt_text: draft.prompt_text,
            ai_model: draft.ai_model,
            tags: draft.tags,
            is_public: draft.is_public,
            author: author.to_string(),
            created_at,
            sample_result: draft.sample_result,
        };
        log::debug!("created prompt {} by {}", prompt.id, prompt.author);
        self.prompts.insert(0, prompt);
        Ok(&self.prompts[0])
    }

    /// Replace the editable fields of `id`, keeping id, author and creation
    /// time. The prompt keeps its position.
    pub fn update(&mut self, id: &str, draft: PromptDraft) -> Result<&Prompt> {
        draft.validate()?;
        let draft = draft.dedup_tags();
        let prompt = self
            .prompts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::PromptNotFound(id.to_string()))?;
        prompt.title = draft.title;
        prompt.prompt_text = draft.prompt_text;
        prompt.ai_model = draft.ai_model;
        prompt.tags = draft.tags;
        prompt.is_public = draft.is_public;
        prompt.sample_result = draft.sample_result;
        Ok(&*prompt)
    }

    pub fn delete(&mut self, id: &str) -> Result<Prompt> {
        let pos = self
            .prompts
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| Error::PromptNotFound(id.to_string()))?;
        Ok(self.prompts.remove(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str) -> PromptDraft {
        PromptDraft {
            title: title.into(),
            prompt_text: "a prompt".into(),
            ai_model: "Gemini Pro".into(),
            tags: vec!["1".into(), "1-1".into(), "1".into()],
            is_public: true,
            sample_result: None,
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn create_prepends_and_binds_author() {
        let mut store = PromptStore::default();
        store.create("p1".into(), draft("first"), "u1", at("2024-01-01T00:00:00Z")).unwrap();
        let created = store
            .create("p2".into(), draft("second"), "u2", at("2024-01-02T00:00:00Z"))
            .unwrap();
        assert_eq!(created.author, "u2");
        assert_eq!(created.tags, ["1", "1-1"]);
        assert_eq!(store.ids().collect::<Vec<_>>(), ["p2", "p1"]);
    }

    #[test]
    fn create_validates_required_fields() {
        let mut store = PromptStore::default();
        let mut d = draft("x");
        d.ai_model = "  ".into();
        let err = store.create("p1".into(), d, "u1", Utc::now()).unwrap_err();
        assert!(matches!(err, Error::InvalidPrompt("AI model")));
        assert!(store.is_empty());
    }

    #[test]
    fn create_rejects_taken_id() {
        let mut store = PromptStore::default();
        store.create("p1".into(), draft("a"), "u1", Utc::now()).unwrap();
        assert!(matches!(
            store.create("p1".into(), draft("b"), "u1", Utc::now()),
            Err(Error::DuplicatePromptId(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_preserves_identity() {
        let mut store = PromptStore::default();
        let created_at = at("2023-10-26T10:00:00Z");
        store.create("p1".into(), draft("old"), "u1", created_at).unwrap();
        store.create("p2".into(), draft("other"), "u1", created_at).unwrap();

        let mut edit = draft("new");
        edit.is_public = false;
        let updated = store.update("p1", edit).unwrap();
        assert_eq!(updated.title, "new");
        assert!(!updated.is_public);
        assert_eq!(updated.author, "u1");
        assert_eq!(updated.created_at, created_at);
        assert_eq!(store.ids().collect::<Vec<_>>(), ["p2", "p1"]);
    }

    #[test]
    fn update_and_delete_unknown() {
        let mut store = PromptStore::default();
        assert!(matches!(store.update("nope", draft("x")), Err(Error::PromptNotFound(_))));
        assert!(matches!(store.delete("nope"), Err(Error::PromptNotFound(_))));
    }

    #[test]
    fn delete_removes_immediately() {
        let mut store = PromptStore::default();
        store.create("p1".into(), draft("a"), "u1", Utc::now()).unwrap();
        let removed = store.delete("p1").unwrap();
        assert_eq!(removed.id, "p1");
        assert!(store.get("p1").is_none());
    }

    #[test]
    fn draft_defaults_to_public() {
        let d: PromptDraft =
            serde_json::from_str(r#"{"title":"t","promptText":"x","aiModel":"m"}"#).unwrap();
        assert!(d.is_public);
        assert!(d.tags.is_empty());
    }
}

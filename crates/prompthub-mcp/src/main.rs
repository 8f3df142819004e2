use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use prompthub_core::editor::DropPosition;
use prompthub_core::filter::{TagMatchMode, VisibilityScope};
use prompthub_core::session::{Intent, Session};
use prompthub_core::store::PromptDraft;
use prompthub_core::users::{AuthorLookup, NewUser};
use prompthub_core::{ai_configured, Prompt, SampleResult, TagForest};
use prompthub_refine::{refine_once, InFlight, LlmRefiner, Refiner};

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct PromptIdRequest {
    /// ID of the prompt (e.g. "p3")
    prompt_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SetFilterRequest {
    /// "all" (public prompts plus your own) or "mineOnly" (only prompts you authored)
    scope: Option<VisibilityScope>,
    /// Replace the selected tags with these tag IDs. Pass [] to clear.
    tag_ids: Option<Vec<String>>,
    /// Free-text search over title, prompt text and author name. Pass "" to clear.
    search: Option<String>,
    /// "any" (a prompt needs one selected tag) or "all" (it needs every selected tag)
    match_mode: Option<TagMatchMode>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ToggleTagRequest {
    /// ID of the tag to select or deselect in the filter
    tag_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct AddPromptRequest {
    /// Short title shown in the library
    title: String,
    /// The prompt text itself
    prompt_text: String,
    /// Model the prompt targets, e.g. "Midjourney v6"
    ai_model: String,
    /// Tag IDs to attach. Use list_tags to look them up.
    tag_ids: Option<Vec<String>>,
    /// Whether other users can see the prompt. Default: true
    is_public: Option<bool>,
    /// Kind of sample output: "image" (content is a URL) or "text"
    sample_type: Option<String>,
    /// Sample output content
    sample_content: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct UpdatePromptRequest {
    /// ID of the prompt to edit. Only its author may edit it.
    prompt_id: String,
    /// New title
    title: Option<String>,
    /// New prompt text
    prompt_text: Option<String>,
    /// New target model
    ai_model: Option<String>,
    /// New tag IDs (replaces the current list)
    tag_ids: Option<Vec<String>>,
    /// New visibility
    is_public: Option<bool>,
    /// New sample kind: "image" or "text". Pass "" to remove the sample.
    sample_type: Option<String>,
    /// New sample content
    sample_content: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct AddTagRequest {
    /// Display name (surrounding whitespace is trimmed)
    name: String,
    /// Parent tag ID. Omit to add a root tag.
    parent_id: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct RenameTagRequest {
    /// ID of the tag to rename
    tag_id: String,
    /// New display name
    name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct DeleteTagRequest {
    /// ID of the tag to delete. Its whole subtree is deleted with it.
    tag_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct MoveTagRequest {
    /// ID of the tag being moved (it keeps its subtree)
    dragged_id: String,
    /// ID of the tag it is dropped on
    target_id: String,
    /// "before" or "after" the target as a sibling, or "into" it as its last child
    position: DropPosition,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ReplaceTagsRequest {
    /// The complete tag forest as a JSON array of {"id", "name", "children"?} objects.
    /// See list_tags output for the exact shape.
    tags: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SignInRequest {
    /// ID of the user to act as (e.g. "u1"). See list_users.
    user_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct RegisterUserRequest {
    /// Public handle shown as the prompt author
    username: String,
    /// First name
    name: String,
    /// Last name
    surname: String,
    /// Email address
    email: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct RefinePromptRequest {
    /// Refine the text of this prompt
    prompt_id: Option<String>,
    /// Or refine this text directly
    text: Option<String>,
    /// Save the refined text back to the prompt (author only). Default: false
    apply: Option<bool>,
}

// --- Views ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PromptView<'a> {
    #[serde(flatten)]
    prompt: &'a Prompt,
    tag_names: Vec<&'a str>,
    author_name: Option<&'a str>,
}

fn view<'a>(session: &'a Session, prompt: &'a Prompt) -> PromptView<'a> {
    PromptView {
        prompt,
        tag_names: session.tag_names(prompt),
        author_name: session.users().author_name(&prompt.author),
    }
}

fn sample_result(kind: Option<&str>, content: Option<String>) -> Result<Option<SampleResult>, String> {
    match (kind, content) {
        (None | Some(""), _) => Ok(None),
        (Some("image"), Some(c)) => Ok(Some(SampleResult::Image(c))),
        (Some("text"), Some(c)) => Ok(Some(SampleResult::Text(c))),
        (Some("image" | "text"), None) => Err("sample_content is required with sample_type".into()),
        (Some(other), _) => Err(format!("Unknown sample_type '{other}'. Use \"image\" or \"text\".")),
    }
}

fn ok(text: impl Into<String>) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(text.into())]))
}

fn fail(e: impl std::fmt::Display) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
}

fn json<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    match serde_json::to_string_pretty(value) {
        Ok(text) => ok(text),
        Err(e) => fail(format!("Failed to serialize: {e}")),
    }
}

// --- Server ---

#[derive(Clone)]
pub struct PromptHubServer {
    session: Arc<Mutex<Session>>,
    refiner: Arc<dyn Refiner>,
    in_flight: InFlight,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl PromptHubServer {
    pub fn new(session: Session, refiner: Arc<dyn Refiner>) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            refiner,
            in_flight: InFlight::new(),
            tool_router: Self::tool_router(),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[tool(
        description = "List the prompts that pass the current filter (visibility scope, selected tags, search), newest first. Each prompt includes its resolved tagNames and authorName. Change the filter with set_filter or toggle_tag."
    )]
    fn list_prompts(&self) -> Result<CallToolResult, McpError> {
        let session = self.session();
        let prompts: Vec<PromptView> = session
            .visible_prompts()
            .into_iter()
            .map(|p| view(&session, p))
            .collect();
        if prompts.is_empty() {
            return ok("No prompts match the current filter.");
        }
        json(&prompts)
    }

    #[tool(description = "Open a prompt in the detail view and return it in full")]
    fn get_prompt(&self, Parameters(req): Parameters<PromptIdRequest>) -> Result<CallToolResult, McpError> {
        let mut session = self.session();
        if let Err(e) = session.apply(Intent::OpenPrompt { prompt_id: req.prompt_id.clone() }) {
            return fail(e);
        }
        match session.prompt(&req.prompt_id) {
            Some(prompt) => json(&view(&session, prompt)),
            None => fail(format!("Prompt '{}' not found", req.prompt_id)),
        }
    }

    #[tool(description = "Close the prompt detail view")]
    fn close_prompt(&self) -> Result<CallToolResult, McpError> {
        self.session().close_prompt();
        ok("Closed")
    }

    #[tool(
        description = "Change the prompt filter. Only the fields you pass are changed. Filters combine with AND: scope, then tags, then search."
    )]
    fn set_filter(&self, Parameters(req): Parameters<SetFilterRequest>) -> Result<CallToolResult, McpError> {
        let mut session = self.session();
        if let Some(id) = req
            .tag_ids
            .iter()
            .flatten()
            .find(|id| !session.tag_index().contains(id))
        {
            return fail(format!("Tag '{id}' not found. Use list_tags to see valid IDs."));
        }
        if let Some(scope) = req.scope {
            session.set_visibility(scope);
        }
        if let Some(mode) = req.match_mode {
            if let Err(e) = session.apply(Intent::SetTagMatchMode { mode }) {
                return fail(e);
            }
        }
        if let Some(search) = req.search {
            session.set_search(search);
        }
        if let Some(tag_ids) = req.tag_ids {
            session.select_tags(tag_ids);
        }
        let count = session.visible_prompts().len();
        let mut text = match serde_json::to_string_pretty(session.criteria()) {
            Ok(s) => s,
            Err(e) => return fail(e),
        };
        text.push_str(&format!("\n{count} prompt(s) match."));
        ok(text)
    }

    #[tool(description = "Select a tag in the filter, or deselect it if it is already selected")]
    fn toggle_tag(&self, Parameters(req): Parameters<ToggleTagRequest>) -> Result<CallToolResult, McpError> {
        let mut session = self.session();
        if !session.tag_index().contains(&req.tag_id) {
            return fail(format!("Tag '{}' not found. Use list_tags to see valid IDs.", req.tag_id));
        }
        let selected = session.toggle_tag(&req.tag_id);
        let count = session.visible_prompts().len();
        ok(format!(
            "Tag '{}' {}. {} prompt(s) match.",
            req.tag_id,
            if selected { "selected" } else { "deselected" },
            count
        ))
    }

    #[tool(description = "Create a prompt authored by the signed-in user. Requires sign_in or register_user first.")]
    fn add_prompt(&self, Parameters(req): Parameters<AddPromptRequest>) -> Result<CallToolResult, McpError> {
        let sample = match sample_result(req.sample_type.as_deref(), req.sample_content) {
            Ok(s) => s,
            Err(e) => return fail(e),
        };
        let draft = PromptDraft {
            title: req.title,
            prompt_text: req.prompt_text,
            ai_model: req.ai_model,
            tags: req.tag_ids.unwrap_or_default(),
            is_public: req.is_public.unwrap_or(true),
            sample_result: sample,
        };
        let mut session = self.session();
        match session.add_prompt(draft) {
            Ok(prompt) => ok(format!("Created prompt {}", prompt.id)),
            Err(e) => fail(e),
        }
    }

    #[tool(description = "Edit a prompt you authored. Only the fields you pass are changed.")]
    fn update_prompt(&self, Parameters(req): Parameters<UpdatePromptRequest>) -> Result<CallToolResult, McpError> {
        let mut session = self.session();
        let Some(existing) = session.prompt(&req.prompt_id) else {
            return fail(format!("Prompt '{}' not found", req.prompt_id));
        };
        let mut draft = PromptDraft::from(existing);
        if let Some(title) = req.title {
            draft.title = title;
        }
        if let Some(text) = req.prompt_text {
            draft.prompt_text = text;
        }
        if let Some(model) = req.ai_model {
            draft.ai_model = model;
        }
        if let Some(tags) = req.tag_ids {
            draft.tags = tags;
        }
        if let Some(public) = req.is_public {
            draft.is_public = public;
        }
        if req.sample_type.is_some() {
            match sample_result(req.sample_type.as_deref(), req.sample_content) {
                Ok(sample) => draft.sample_result = sample,
                Err(e) => return fail(e),
            }
        }
        match session.edit_prompt(&req.prompt_id, draft) {
            Ok(prompt) => ok(format!("Updated prompt {}", prompt.id)),
            Err(e) => fail(e),
        }
    }

    #[tool(description = "Delete a prompt you authored. Takes effect immediately.")]
    fn delete_prompt(&self, Parameters(req): Parameters<PromptIdRequest>) -> Result<CallToolResult, McpError> {
        match self.session().delete_prompt(&req.prompt_id) {
            Ok(removed) => ok(format!("Deleted prompt {} \"{}\"", removed.id, removed.title)),
            Err(e) => fail(e),
        }
    }

    #[tool(
        description = "Get the tag forest as JSON: an array of {id, name, children?} objects, in display order, at any depth"
    )]
    fn list_tags(&self) -> Result<CallToolResult, McpError> {
        json(self.session().tags())
    }

    #[tool(description = "Add a tag as the last root, or as the last child of parent_id. Returns the new tag's ID.")]
    fn add_tag(&self, Parameters(req): Parameters<AddTagRequest>) -> Result<CallToolResult, McpError> {
        match self.session().add_tag(&req.name, req.parent_id.as_deref()) {
            Ok(id) => ok(format!("Added tag {id}")),
            Err(e) => fail(e),
        }
    }

    #[tool(description = "Rename a tag at any depth")]
    fn rename_tag(&self, Parameters(req): Parameters<RenameTagRequest>) -> Result<CallToolResult, McpError> {
        match self.session().rename_tag(&req.tag_id, &req.name) {
            Ok(()) => ok(format!("Renamed tag {}", req.tag_id)),
            Err(e) => fail(e),
        }
    }

    #[tool(
        description = "Delete a tag and its whole subtree. Prompts keep the deleted IDs but no longer show them; the tags are dropped from the filter."
    )]
    fn delete_tag(&self, Parameters(req): Parameters<DeleteTagRequest>) -> Result<CallToolResult, McpError> {
        match self.session().delete_tag(&req.tag_id) {
            Ok(()) => ok(format!("Deleted tag {}", req.tag_id)),
            Err(e) => fail(e),
        }
    }

    #[tool(
        description = "Move a tag with its subtree before/after a sibling or into another tag. A tag cannot be moved onto itself or into its own descendants."
    )]
    fn move_tag(&self, Parameters(req): Parameters<MoveTagRequest>) -> Result<CallToolResult, McpError> {
        let intent = Intent::MoveTag {
            dragged_id: req.dragged_id.clone(),
            target_id: req.target_id.clone(),
            position: req.position,
        };
        match self.session().apply(intent) {
            Ok(()) => ok(format!("Moved tag {} relative to {}", req.dragged_id, req.target_id)),
            Err(e) => fail(e),
        }
    }

    #[tool(
        description = "Replace the whole tag forest in one call, e.g. after editing the list_tags output. Names must be non-blank and IDs unique."
    )]
    fn replace_tags(&self, Parameters(req): Parameters<ReplaceTagsRequest>) -> Result<CallToolResult, McpError> {
        let forest: TagForest = match serde_json::from_str(&req.tags) {
            Ok(f) => f,
            Err(e) => return fail(format!("Invalid tag JSON: {e}")),
        };
        let count = forest.node_count();
        match self.session().apply(Intent::ReplaceTags { tags: forest }) {
            Ok(()) => ok(format!("Saved {count} tag(s)")),
            Err(e) => fail(e),
        }
    }

    #[tool(description = "List known users")]
    fn list_users(&self) -> Result<CallToolResult, McpError> {
        let session = self.session();
        let users: Vec<_> = session.users().iter().collect();
        json(&users)
    }

    #[tool(description = "Act as an existing user. Prompts you create are authored by this user.")]
    fn sign_in(&self, Parameters(req): Parameters<SignInRequest>) -> Result<CallToolResult, McpError> {
        let mut session = self.session();
        match session.sign_in(&req.user_id) {
            Ok(user) => ok(format!("Signed in as {} ({})", user.username, user.id)),
            Err(e) => fail(e),
        }
    }

    #[tool(description = "Sign out. Only public prompts stay visible.")]
    fn sign_out(&self) -> Result<CallToolResult, McpError> {
        self.session().sign_out();
        ok("Signed out")
    }

    #[tool(description = "Register a new user and sign in as them. All fields are required.")]
    fn register_user(&self, Parameters(req): Parameters<RegisterUserRequest>) -> Result<CallToolResult, McpError> {
        let new_user = NewUser {
            username: req.username,
            name: req.name,
            surname: req.surname,
            email: req.email,
        };
        let mut session = self.session();
        if session.users().find_by_email(&new_user.email).is_some() {
            return fail(format!("A user with email '{}' already exists", new_user.email));
        }
        match session.register_user(new_user) {
            Ok(user) => ok(format!("Registered and signed in as {} ({})", user.username, user.id)),
            Err(e) => fail(e),
        }
    }

    #[tool(
        description = "Ask the configured AI model to improve a prompt's text. Pass prompt_id or text. With apply=true the result is saved to the prompt (author only). One refinement runs at a time."
    )]
    async fn refine_prompt(&self, Parameters(req): Parameters<RefinePromptRequest>) -> Result<CallToolResult, McpError> {
        let text = {
            let session = self.session();
            match (&req.prompt_id, req.text) {
                (Some(id), _) => match session.prompt(id) {
                    Some(p) => p.prompt_text.clone(),
                    None => return fail(format!("Prompt '{id}' not found")),
                },
                (None, Some(text)) => text,
                (None, None) => return fail("Pass prompt_id or text"),
            }
        };

        let refined = match refine_once(self.refiner.as_ref(), &self.in_flight, &text).await {
            Ok(refined) => refined,
            Err(e) => return fail(e.user_message()),
        };

        if let (true, Some(id)) = (req.apply.unwrap_or(false), &req.prompt_id) {
            let mut session = self.session();
            let Some(existing) = session.prompt(id) else {
                return fail(format!("Prompt '{id}' was deleted while refining"));
            };
            let mut draft = PromptDraft::from(existing);
            draft.prompt_text = refined.clone();
            if let Err(e) = session.edit_prompt(id, draft) {
                return fail(format!("Refined but not saved: {e}\n\n{refined}"));
            }
        }
        ok(refined)
    }
}

#[tool_handler]
impl ServerHandler for PromptHubServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

const INSTRUCTIONS: &str = r#"PromptHub is a library of prompts for generative AI models, organised by a hierarchical tag taxonomy.

## Prompts
Each prompt has a title, the prompt text, the target AI model, tag IDs, a public/private flag, an author and an optional sample result. `list_prompts` returns what passes the current filter, newest first. Only a prompt's author can edit or delete it.

## Users
Nobody is signed in at startup, so only public prompts are visible. Use `list_users` and `sign_in`, or `register_user`, before creating prompts.

## Filter
`set_filter` and `toggle_tag` change what `list_prompts` returns. The scope ("all" or "mineOnly"), the selected tags and the search text combine with AND. Search is case-insensitive over title, prompt text and author name.

## Tags
Tags form a forest of any depth. Tag IDs are stable; names can change. `move_tag` mirrors drag-and-drop: "before"/"after" place the tag next to the target, "into" makes it the target's last child. Deleting a tag deletes its subtree; prompts keep the old IDs but they no longer resolve to names.

## Refinement
`refine_prompt` sends prompt text to the configured AI provider (see ~/.prompthub/settings.json or the PROMPTHUB_AI_PROVIDER, PROMPTHUB_AI_MODEL and PROMPTHUB_API_KEY environment variables)."#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the MCP transport, so logs go to stderr
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let settings = prompthub_core::read_settings();
    let ai = settings.ai.clone().with_env_overrides();
    if !ai_configured(&ai) {
        log::warn!("AI provider not configured; refine_prompt will fail");
    }

    let session = Session::from_seed(&settings.library)?;
    let refiner: Arc<dyn Refiner> = Arc::new(LlmRefiner::new(ai));

    let service = PromptHubServer::new(session, refiner)
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| log::error!("MCP server error: {e}"))?;
    service.waiting().await?;
    Ok(())
}

//! Initial library contents, embedded at build time.

use crate::store::PromptStore;
use crate::users::UserDirectory;
use crate::{Prompt, Result, TagForest, User};

const TAGS: &str = include_str!("../seed/tags.json");
const PROMPTS: &str = include_str!("../seed/prompts.json");
const USERS: &str = include_str!("../seed/users.json");

#[derive(Debug, Clone)]
pub struct Seed {
    pub users: UserDirectory,
    pub tags: TagForest,
    pub prompts: PromptStore,
}

pub fn tags() -> Result<TagForest> {
    Ok(serde_json::from_str(TAGS)?)
}

pub fn prompts() -> Result<PromptStore> {
    let prompts: Vec<Prompt> = serde_json::from_str(PROMPTS)?;
    Ok(PromptStore::new(prompts))
}

pub fn users() -> Result<UserDirectory> {
    let users: Vec<User> = serde_json::from_str(USERS)?;
    Ok(UserDirectory::new(users))
}

pub fn load() -> Result<Seed> {
    Ok(Seed {
        users: users()?,
        tags: tags()?,
        prompts: prompts()?,
    })
}

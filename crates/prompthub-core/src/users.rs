use serde::{Deserialize, Serialize};

use crate::ids::IdMint;
use crate::{Error, Result, User};

/// Registration form from the authentication collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub surname: String,
    pub email: String,
}

/// Resolves an author id to the name shown (and searched) for it.
pub trait AuthorLookup {
    fn author_name(&self, user_id: &str) -> Option<&str>;
}

#[derive(Debug, Clone)]
pub struct UserDirectory {
    users: Vec<User>,
    ids: IdMint,
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl UserDirectory {
    pub fn new(users: Vec<User>) -> Self {
        let ids = IdMint::seeded("u", users.iter().map(|u| u.id.as_str()));
        Self { users, ids }
    }

    pub fn get(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn find_by_email(&self, email: &str) -> Option<&User> {
        self.users.iter().find(|u| u.email.eq_ignore_ascii_case(email))
    }

    pub fn iter(&self) -> impl Iterator<Item = &User> {
        self.users.iter()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Add a user with a freshly minted id. Every field is required.
    pub fn register(&mut self, new_user: NewUser) -> Result<User> {
        let required = [
            ("username", &new_user.username),
            ("name", &new_user.name),
            ("surname", &new_user.surname),
            ("email", &new_user.email),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(Error::InvalidUser(*field));
        }
        let user = User {
            id: self.ids.mint(),
            username: new_user.username.trim().to_string(),
            name: new_user.name.trim().to_string(),
            surname: new_user.surname.trim().to_string(),
            email: new_user.email.trim().to_string(),
        };
        log::info!("registered user {} ({})", user.id, user.username);
        self.users.push(user.clone());
        Ok(user)
    }
}

impl AuthorLookup for UserDirectory {
    fn author_name(&self, user_id: &str) -> Option<&str> {
        self.get(user_id).map(|u| u.username.as_str())
    }
}

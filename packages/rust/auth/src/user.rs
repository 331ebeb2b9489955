//! User accounts and password hashes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tool_documents::{Document, DocumentStore, Stored, validators};
use tool_shared::{Result, ToolError};
use uuid::Uuid;

const HASH_METHOD: &str = "sha256";

/// A user account. `password` holds a salted hash, never the raw password.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl User {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            password: String::new(),
        }
    }

    /// Replace the stored hash with one for `raw_password`.
    pub fn set_password(&mut self, raw_password: &str) {
        self.password = hash_password(raw_password);
    }

    pub fn check_password(&self, raw_password: &str) -> bool {
        check_password_hash(&self.password, raw_password)
    }
}

impl Document for User {
    const COLLECTION: &'static str = "users";

    fn label(&self) -> String {
        self.username.clone()
    }

    fn validate(&self) -> Result<()> {
        validators::length("username", &self.username, 2, 16)?;
        validators::required("password", &self.password)
    }
}

/// `sha256$<salt>$<hex digest of salt + password>`.
pub fn hash_password(raw_password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{HASH_METHOD}${salt}${}", digest(&salt, raw_password))
}

pub fn check_password_hash(stored: &str, raw_password: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some(method), Some(salt), Some(expected)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    method == HASH_METHOD && constant_time_eq(digest(salt, raw_password).as_bytes(), expected.as_bytes())
}

fn digest(salt: &str, raw_password: &str) -> String {
    format!("{:x}", Sha256::digest(format!("{salt}{raw_password}").as_bytes()))
}

pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// The account with `username`, if any.
pub async fn find_user(store: &DocumentStore, username: &str) -> Result<Option<Stored<User>>> {
    let mut users = store
        .query::<User>()
        .filter("username", username)
        .limit(2)
        .all()
        .await?
        .into_iter();
    match (users.next(), users.next()) {
        (Some(_), Some(_)) => Err(ToolError::Storage(format!(
            "expected 0 or 1 users with username {username}"
        ))),
        (user, _) => Ok(user),
    }
}

/// The account matching the credentials, if they are valid.
pub async fn verify_credentials(
    store: &DocumentStore,
    username: &str,
    password: &str,
) -> Result<Option<Stored<User>>> {
    Ok(find_user(store, username)
        .await?
        .filter(|user| user.check_password(password)))
}

/// Whether `username`/`password` is a valid combination.
pub async fn check_auth(store: &DocumentStore, username: &str, password: &str) -> Result<bool> {
    Ok(verify_credentials(store, username, password).await?.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hashes() {
        let mut user = User::new("john");
        user.set_password("secret");
        assert!(user.password.starts_with("sha256$"));
        assert!(user.check_password("secret"));
        assert!(!user.check_password("Secret"));

        // same password, different salt
        assert_ne!(hash_password("secret"), hash_password("secret"));
        assert!(!check_password_hash("plain", "plain"));
        assert!(!check_password_hash("md5$salt$abc", "abc"));
    }

    #[test]
    fn username_length() {
        let mut user = User::new("j");
        user.set_password("pw");
        assert!(user.validate().is_err());
        user.username = "john".into();
        assert!(user.validate().is_ok());
        user.username = "a".repeat(17);
        assert!(user.validate().is_err());
        assert!(User::new("john").validate().is_err());
    }

    #[tokio::test]
    async fn check_credentials() {
        let store = DocumentStore::in_memory().await.expect("memory");
        let mut user = User::new("john");
        user.set_password("pw");
        store.save(user).await.expect("save");

        assert!(check_auth(&store, "john", "pw").await.expect("check"));
        assert!(!check_auth(&store, "john", "nope").await.expect("check"));
        assert!(!check_auth(&store, "mary", "pw").await.expect("check"));
    }
}

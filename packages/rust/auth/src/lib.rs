//! Authentication for Tool applications.
//!
//! User accounts are [`User`] documents with salted password hashes. The
//! [`AuthBundle`] installs [`AuthMiddleware`], which identifies the user of
//! every request (by basic credentials or a signed login cookie) and
//! challenges `401` responses. Views are protected with [`requires_auth`] and
//! read the current account with [`get_user`].

mod bundle;
mod command;
mod guard;
mod middleware;
mod user;

pub use bundle::{AuthBundle, AuthConfig, BUNDLE_NAME};
pub use command::AuthCommand;
pub use guard::{Identity, RequiresAuth, authenticate, get_user, requires_auth};
pub use middleware::{
    AuthMiddleware, LOGIN_PATH, LOGOUT_PATH, Preset, TICKET_COOKIE, TICKET_TIMEOUT,
};
pub use user::{User, check_auth, check_password_hash, find_user, hash_password, verify_credentials};

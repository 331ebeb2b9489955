//! The `auth` management command.

use std::sync::Arc;

use tool_core::clap::{self, Arg, ArgMatches};
use tool_core::{Application, Command, async_trait};
use tool_documents::default_storage;
use tool_shared::{Result, ToolError};

use crate::user::{User, find_user};

/// `auth adduser <username> <password>` and `auth ls`.
pub struct AuthCommand;

#[async_trait]
impl Command for AuthCommand {
    fn definition(&self) -> clap::Command {
        clap::Command::new("auth")
            .about("Manages user accounts")
            .subcommand_required(true)
            .subcommand(
                clap::Command::new("adduser")
                    .about("Creates a user account")
                    .arg(Arg::new("username").required(true))
                    .arg(Arg::new("password").required(true)),
            )
            .subcommand(clap::Command::new("ls").about("Lists user accounts"))
    }

    async fn run(&self, app: &Arc<Application>, matches: &ArgMatches) -> Result<String> {
        let store = default_storage(app.context())?;
        match matches.subcommand() {
            Some(("adduser", args)) => {
                let username = args.get_one::<String>("username").cloned().unwrap_or_default();
                let password = args.get_one::<String>("password").cloned().unwrap_or_default();
                if find_user(store, &username).await?.is_some() {
                    return Err(ToolError::Command(format!("User {username} already exists.")));
                }
                let mut user = User::new(&username);
                user.set_password(&password);
                let user = store.save(user).await?;
                Ok(format!("User {username} has been added with primary key {}.", user.pk))
            }
            Some(("ls", _)) => {
                let users = store.query::<User>().order_by(&["username"], false).all().await?;
                if users.is_empty() {
                    return Ok("There are no users in the database.".to_string());
                }
                let mut out = format!("There are {} users:\n---", users.len());
                for user in &users {
                    out.push_str(&format!("\n{} ({})", user.username, user.pk));
                }
                Ok(out)
            }
            _ => Err(ToolError::Command("unknown auth command".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tool_core::{ApplicationManager, BundleRegistry};
    use tool_documents::DocumentsBundle;
    use tool_shared::Settings;

    use crate::AuthBundle;

    #[tokio::test]
    async fn adduser_and_ls() {
        let settings = Settings::from_value(json!({
            "bundles": {"documents": {"path": ":memory:"}, "auth": {"secret": "x"}}
        }))
        .expect("settings");
        let registry = BundleRegistry::new()
            .register(DocumentsBundle)
            .register(AuthBundle);
        let app = ApplicationManager::load(settings, registry)
            .await
            .expect("load")
            .compile();

        assert_eq!(
            app.dispatch(["auth", "ls"]).await.expect("ls"),
            "There are no users in the database."
        );
        let added = app.dispatch(["auth", "adduser", "john", "pw"]).await.expect("add");
        assert!(added.starts_with("User john has been added with primary key "));
        assert!(app.dispatch(["auth", "adduser", "john", "pw"]).await.is_err());
        assert!(app.dispatch(["auth", "adduser", "j", "pw"]).await.is_err());

        let listing = app.dispatch(["auth", "ls"]).await.expect("ls");
        assert!(listing.starts_with("There are 1 users:\n---\njohn ("));
    }
}

//! Command-line interface: `blog ls`, `blog add <text>` and `blog drop`.

use std::sync::Arc;

use tool_core::clap::{self, Arg, ArgAction, ArgMatches};
use tool_core::{Application, Command, async_trait};
use tool_documents::{DocumentStore, Query, default_storage};
use tool_shared::{Result, ToolError};
use tracing::info;

use crate::bundle::BUNDLE_NAME;
use crate::note::Note;

pub struct BlogCommand;

/// Notes as numbered by `blog ls`: newest first.
fn listed(store: &DocumentStore) -> Query<'_, Note> {
    store.query::<Note>().order_by(&["date", "text"], true)
}

#[async_trait]
impl Command for BlogCommand {
    fn definition(&self) -> clap::Command {
        clap::Command::new(BUNDLE_NAME)
            .about("Manages notes")
            .subcommand_required(true)
            .subcommand(clap::Command::new("ls").about("Lists all existing notes"))
            .subcommand(
                clap::Command::new("add")
                    .about("Creates a note with given text")
                    .arg(Arg::new("text").required(true)),
            )
            .subcommand(
                clap::Command::new("drop")
                    .about("Deletes a note by its number in the list, or all notes")
                    .arg(
                        Arg::new("number")
                            .short('n')
                            .long("number")
                            .value_parser(clap::value_parser!(usize))
                            .help("which note to delete (as in list)"),
                    )
                    .arg(
                        Arg::new("all")
                            .short('a')
                            .long("all")
                            .action(ArgAction::SetTrue)
                            .help("drop all notes"),
                    ),
            )
    }

    async fn run(&self, app: &Arc<Application>, matches: &ArgMatches) -> Result<String> {
        let store = default_storage(app.context())?;
        match matches.subcommand() {
            Some(("ls", _)) => ls(store).await,
            Some(("add", args)) => {
                let text = args.get_one::<String>("text").cloned().unwrap_or_default();
                add(store, &text).await
            }
            Some(("drop", args)) => {
                drop_notes(store, args.get_one::<usize>("number").copied(), args.get_flag("all"))
                    .await
            }
            _ => Err(ToolError::Command("unknown blog command".into())),
        }
    }
}

async fn ls(store: &DocumentStore) -> Result<String> {
    let notes = listed(store).all().await?;
    if notes.is_empty() {
        return Ok("There are no notes in the database.".to_string());
    }
    let mut out = format!("There are {} notes:\n---", notes.len());
    for (num, note) in notes.iter().enumerate() {
        out.push_str(&format!("\n#{num} {} {}", note.date_label(), note.text));
    }
    Ok(out)
}

async fn add(store: &DocumentStore, text: &str) -> Result<String> {
    let note = store.save(Note::new(text)).await?;
    info!(pk = %note.pk, "note added");
    Ok(format!("Note has been added with primary key {}.", note.pk))
}

async fn drop_notes(store: &DocumentStore, number: Option<usize>, all: bool) -> Result<String> {
    match (number, all) {
        (Some(number), _) => {
            let Some(note) = listed(store).all().await?.into_iter().nth(number) else {
                return Ok(format!("There is no note #{number}"));
            };
            let message = format!(
                "Note \"{}\" ({}) has been deleted.",
                note.text,
                note.date_label()
            );
            note.delete(store).await?;
            Ok(message)
        }
        (None, true) => {
            let deleted = listed(store).delete().await?;
            info!(deleted, "notes dropped");
            Ok("All notes have been deleted.".to_string())
        }
        (None, false) => Ok("Please specify either --number or --all.".to_string()),
    }
}

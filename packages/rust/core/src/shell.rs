//! Interactive command shell.
//!
//! Reads one command per line and dispatches it against the same
//! application the `serve` command would run, so bundle state (the document
//! store, for instance) can be poked at without a browser.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tool_shared::{Result, ToolError};
use tracing::debug;

use crate::application::Application;

pub const BANNER: &str = "Interactive Tool Shell";
const PROMPT: &str = "> ";

/// Run the shell until `exit`, `quit` or end of input.
pub async fn run<R, W>(app: &Arc<Application>, input: R, mut output: W) -> Result<()>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let mut lines = BufReader::new(input).lines();
    let commands = app.commands().names();
    write(
        &mut output,
        &format!(
            "{BANNER}\nCommands: {}. Type \"help\" for usage, \"exit\" to leave.\n{PROMPT}",
            commands.join(", ")
        ),
    )
    .await?;

    while let Some(line) = lines.next_line().await.map_err(io_error)? {
        let words = match split_args(&line) {
            Ok(words) => words,
            Err(e) => {
                write(&mut output, &format!("error: {e}\n{PROMPT}")).await?;
                continue;
            }
        };
        let reply = match words.first().map(String::as_str) {
            None => String::new(),
            Some("exit" | "quit") => break,
            Some("help") => {
                let args: Vec<String> = words[1..].iter().cloned().chain(["--help".into()]).collect();
                render(app.dispatch(args).await)
            }
            Some("shell") => "already in the shell\n".into(),
            Some(_) => {
                debug!(line = %line, "shell command");
                render(app.dispatch(words).await)
            }
        };
        write(&mut output, &format!("{reply}{PROMPT}")).await?;
    }
    write(&mut output, "\n").await
}

fn render(result: Result<String>) -> String {
    let text = match result {
        Ok(text) => text,
        Err(ToolError::Command(text)) => text,
        Err(e) => format!("error: {e}"),
    };
    if text.is_empty() || text.ends_with('\n') {
        text
    } else {
        format!("{text}\n")
    }
}

async fn write<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output.write_all(text.as_bytes()).await.map_err(io_error)?;
    output.flush().await.map_err(io_error)
}

fn io_error(e: std::io::Error) -> ToolError {
    ToolError::io("<shell>", e)
}

/// Split a command line into words, honouring single and double quotes.
pub fn split_args(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if let Some(q) = quote {
        return Err(format!("unterminated {q} quote"));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ApplicationManager, BundleRegistry};
    use tool_shared::Settings;

    #[test]
    fn splits_quoted_words() {
        assert_eq!(
            split_args(r#"blog add "Hello world" 'x y' z"#).expect("split"),
            ["blog", "add", "Hello world", "x y", "z"]
        );
        assert_eq!(split_args("  ").expect("split"), Vec::<String>::new());
        assert_eq!(split_args(r#"a """#).expect("split"), ["a", ""]);
        assert!(split_args(r#"blog add "oops"#).is_err());
    }

    #[tokio::test]
    async fn dispatches_lines() {
        let app = ApplicationManager::new(Settings::new(), BundleRegistry::new()).compile();
        let input: &[u8] = b"urls --no-color\nshell\nexit\nurls\n";
        let mut output = Vec::new();
        run(&app, input, &mut output).await.expect("shell");

        let output = String::from_utf8(output).expect("utf8");
        assert!(output.starts_with(BANNER));
        assert!(output.contains("the URL map does not contain any rules"));
        assert!(output.contains("already in the shell"));
        // nothing after exit is executed
        assert_eq!(output.matches("does not contain").count(), 1);
    }
}

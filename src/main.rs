//! Purpose: `msgboard` CLI entry point.
//! Role: Binary crate root; parses args, runs the server or a client command, emits JSON on stdout.
//! Invariants: Client commands emit stable JSON on stdout.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{
    Args, CommandFactory, Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod serve;
mod ui;

use msgboard::api::{DEFAULT_BASE_URL, Error, ErrorKind, STORE_ROUTE_ENV, to_exit_code};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `msgboard --help`."));
            }
        },
    };

    command_dispatch::dispatch_command(cli.command).map_err(add_transport_hint)
}

#[derive(Parser)]
#[command(
    name = "msgboard",
    version,
    about = "Message board: a small REST service for text records, and a client for it",
    long_about = None,
    after_help = r#"EXAMPLES
  $ msgboard serve --db ./records.jsonl      # Terminal 1: run the server on 127.0.0.1:5000
  $ msgboard add "hello"                     # Terminal 2: create a record
  $ msgboard list                            # {"records":[{"_id":"...","message":"hello",...}]}
  $ msgboard update <id> "bye"
  $ msgboard delete <id>
  $ msgboard ui                              # interactive form-style client"#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Run the HTTP/JSON record server",
        long_about = r#"Serve the record endpoints over HTTP.

Endpoints:
  GET    /get_data      list every record
  POST   /write_data    {"message": "..."}
  DELETE /delete_data   {"id": "..."}
  POST   /update_data   {"id": "...", "update": {"message": "..."}}

The store route is taken from --db, --db-file, $MSGBOARD_DB, or defaults to
~/.msgboard/records.jsonl. Use `memory` for a throwaway in-process store."#
    )]
    Serve(ServeArgs),
    #[command(about = "List every record as JSON")]
    List(ClientArgs),
    #[command(about = "Create a record")]
    Add {
        #[arg(help = "Message text (must be non-empty)")]
        message: String,
        #[command(flatten)]
        client: ClientArgs,
    },
    #[command(about = "Replace a record's message")]
    Update {
        #[arg(help = "Record id (24 hex chars)")]
        id: String,
        #[arg(help = "New message text")]
        message: String,
        #[command(flatten)]
        client: ClientArgs,
    },
    #[command(about = "Delete a record (unknown ids are not an error)")]
    Delete {
        #[arg(help = "Record id (24 hex chars)")]
        id: String,
        #[command(flatten)]
        client: ClientArgs,
    },
    #[command(
        about = "Interactive client: view, add, update, and delete records",
        long_about = r#"Interactive client.

Fetches the record list once on start and re-fetches it after every action.
Commands: add <message> | update <id> <message> | delete <id> | reload | help | quit"#
    )]
    Ui(ClientArgs),
    #[command(about = "Generate shell completions")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
    #[command(about = "Print version info as JSON")]
    Version,
}

#[derive(Args)]
struct ClientArgs {
    #[arg(
        long,
        default_value = DEFAULT_BASE_URL,
        help = "Server base URL",
        value_hint = ValueHint::Url
    )]
    url: String,
}

#[derive(Args)]
struct ServeArgs {
    #[arg(
        long,
        default_value = serve::DEFAULT_BIND,
        help = "Bind address",
        help_heading = "Connection"
    )]
    bind: String,
    #[arg(
        long = "cors-origin",
        value_name = "ORIGIN",
        help = "Allow browser requests from this origin (repeatable, explicit list)",
        help_heading = "Connection"
    )]
    cors_origin: Vec<String>,
    #[arg(
        long,
        value_name = "ROUTE",
        help = "Store route: `memory`, or a JSON-lines file path",
        help_heading = "Store"
    )]
    db: Option<String>,
    #[arg(
        long,
        value_name = "PATH",
        help = "Read the store route from a file",
        value_hint = ValueHint::FilePath,
        help_heading = "Store"
    )]
    db_file: Option<PathBuf>,
    #[arg(
        long,
        help = "Allow non-loopback binds",
        help_heading = "Safety"
    )]
    allow_non_loopback: bool,
    #[arg(
        long,
        default_value_t = serve::DEFAULT_MAX_BODY_BYTES,
        help = "Max request body size in bytes",
        help_heading = "Safety"
    )]
    max_body_bytes: u64,
}

fn init_tracing(default_directive: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn add_transport_hint(err: Error) -> Error {
    if err.kind() == ErrorKind::Store && err.hint().is_none() {
        return err.with_hint(format!(
            "Check the server log and the store route (--db or ${STORE_ROUTE_ENV})."
        ));
    }
    err
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_version_output() {
    emit_json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }));
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }

    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Validation => "invalid input".to_string(),
        ErrorKind::Store => "store error".to_string(),
        ErrorKind::Corrupt => "corrupt data".to_string(),
        ErrorKind::Busy => "store is busy".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(err.kind().as_str()));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(path) = err.path() {
        lines.push(format!("path: {}", path.display()));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

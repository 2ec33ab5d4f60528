//! Purpose: Hold top-level CLI command dispatch for `msgboard`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Client commands print one JSON document on success.

use super::*;
use msgboard::api::{ApiClient, RecordUpdate, StoreRoute};
use std::net::SocketAddr;

pub(super) fn dispatch_command(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "msgboard", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output();
            Ok(RunOutcome::ok())
        }
        Command::Serve(args) => {
            let config = serve_config_from_args(args)?;
            init_tracing("info");
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start tokio runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config))?;
            Ok(RunOutcome::ok())
        }
        Command::List(client) => {
            init_tracing("warn");
            let records = api_client(&client)?.list_records()?;
            emit_json(json!({ "records": records }));
            Ok(RunOutcome::ok())
        }
        Command::Add { message, client } => {
            init_tracing("warn");
            api_client(&client)?.write_record(&message)?;
            emit_json(json!({ "ok": true }));
            Ok(RunOutcome::ok())
        }
        Command::Update {
            id,
            message,
            client,
        } => {
            init_tracing("warn");
            api_client(&client)?.update_record(&id, &RecordUpdate::message(message))?;
            emit_json(json!({ "ok": true }));
            Ok(RunOutcome::ok())
        }
        Command::Delete { id, client } => {
            init_tracing("warn");
            api_client(&client)?.delete_record(&id)?;
            emit_json(json!({ "ok": true }));
            Ok(RunOutcome::ok())
        }
        Command::Ui(client) => {
            init_tracing("warn");
            let client = api_client(&client)?;
            let stdin = io::stdin();
            let stdout = io::stdout();
            ui::run(client, stdin.lock(), stdout.lock())?;
            Ok(RunOutcome::ok())
        }
    }
}

fn api_client(args: &ClientArgs) -> Result<ApiClient, Error> {
    ApiClient::new(args.url.clone())
}

fn serve_config_from_args(args: ServeArgs) -> Result<serve::ServeConfig, Error> {
    let bind: SocketAddr = args.bind.parse().map_err(|_| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid bind address")
            .with_hint("Use a host:port value like 127.0.0.1:5000.")
    })?;
    let store = StoreRoute::resolve(args.db.as_deref(), args.db_file.as_deref())?;
    Ok(serve::ServeConfig {
        bind,
        store,
        cors_allowed_origins: args.cors_origin,
        allow_non_loopback: args.allow_non_loopback,
        max_body_bytes: args.max_body_bytes,
    })
}

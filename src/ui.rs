//! Purpose: Line-oriented terminal front end for the record controller.
//! Exports: `run`.
//! Role: The "form" of the client: reads commands, drives `Controller`, renders the list.
//! Invariants: The list is re-rendered after every action, including failed ones.
//! Invariants: Request failures are printed and the session continues.

use std::io::{BufRead, Write};

use msgboard::api::{Controller, Error, ErrorKind, Record, RecordService};
use time::format_description::well_known::Rfc3339;

const HELP: &str = "commands: add <message> | update <id> <message> | delete <id> | reload | help | quit";

#[derive(Debug, PartialEq, Eq)]
enum UiCommand {
    Add(String),
    Update { id: String, message: String },
    Delete(String),
    Reload,
    Help,
    Quit,
    Noop,
}

pub(crate) fn run<S, R, W>(service: S, input: R, mut out: W) -> Result<(), Error>
where
    S: RecordService,
    R: BufRead,
    W: Write,
{
    let mut controller = Controller::new(service);
    let mounted = controller.mount();
    report(&mut out, mounted)?;
    render(&mut out, controller.records())?;
    write_out(&mut out, &format!("{HELP}\n> "))?;

    for line in input.lines() {
        let line = line.map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read input")
                .with_source(err)
        })?;
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(usage) => {
                write_out(&mut out, &format!("{usage}\n> "))?;
                continue;
            }
        };
        let result = match command {
            UiCommand::Quit => return Ok(()),
            UiCommand::Noop => {
                write_out(&mut out, "> ")?;
                continue;
            }
            UiCommand::Help => {
                write_out(&mut out, &format!("{HELP}\n> "))?;
                continue;
            }
            UiCommand::Add(message) => {
                controller.set_message(message);
                controller.submit_add()
            }
            UiCommand::Update { id, message } => {
                controller.set_update(id, message);
                controller.submit_update()
            }
            UiCommand::Delete(id) => {
                controller.set_delete_id(id);
                controller.submit_delete()
            }
            UiCommand::Reload => controller.reload(),
        };
        report(&mut out, result)?;
        render(&mut out, controller.records())?;
        write_out(&mut out, "> ")?;
    }
    Ok(())
}

fn parse_command(line: &str) -> Result<UiCommand, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(UiCommand::Noop);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    match verb {
        "add" | "a" => Ok(UiCommand::Add(rest.to_string())),
        "update" | "u" => {
            let Some((id, message)) = rest.split_once(char::is_whitespace) else {
                return Err("usage: update <id> <message>".to_string());
            };
            Ok(UiCommand::Update {
                id: id.to_string(),
                message: message.trim().to_string(),
            })
        }
        "delete" | "d" => {
            if rest.is_empty() {
                return Err("usage: delete <id>".to_string());
            }
            Ok(UiCommand::Delete(rest.to_string()))
        }
        "reload" | "r" => Ok(UiCommand::Reload),
        "help" | "?" => Ok(UiCommand::Help),
        "quit" | "exit" | "q" => Ok(UiCommand::Quit),
        other => Err(format!("unknown command {other:?}; {HELP}")),
    }
}

fn report<W: Write>(out: &mut W, result: Result<(), Error>) -> Result<(), Error> {
    let Err(err) = result else {
        return Ok(());
    };
    let mut line = format!("error: {}", err.message().unwrap_or(err.kind().as_str()));
    if let Some(hint) = err.hint() {
        line.push_str(&format!(" ({hint})"));
    }
    line.push('\n');
    write_out(out, &line)
}

fn render<W: Write>(out: &mut W, records: Option<&[Record]>) -> Result<(), Error> {
    let text = match records {
        None => "(records unavailable)\n".to_string(),
        Some([]) => "(no records)\n".to_string(),
        Some(records) => {
            let rows = records
                .iter()
                .map(|record| {
                    vec![
                        record.id.to_string(),
                        record.message.clone(),
                        record
                            .updated_at
                            .format(&Rfc3339)
                            .unwrap_or_else(|_| "-".to_string()),
                    ]
                })
                .collect::<Vec<_>>();
            format!("{}\n", render_table(&["ID", "MESSAGE", "UPDATED"], &rows))
        }
    };
    write_out(out, &text)
}

fn write_out<W: Write>(out: &mut W, text: &str) -> Result<(), Error> {
    out.write_all(text.as_bytes())
        .and_then(|()| out.flush())
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write output")
                .with_source(err)
        })
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count())
        .collect::<Vec<_>>();
    let mut sanitized_rows = Vec::with_capacity(rows.len());
    for row in rows {
        let mut sanitized = Vec::with_capacity(widths.len());
        for (idx, width) in widths.iter_mut().enumerate() {
            let cleaned = sanitize_table_cell(row.get(idx).map(String::as_str).unwrap_or(""));
            *width = (*width).max(cleaned.chars().count());
            sanitized.push(cleaned);
        }
        sanitized_rows.push(sanitized);
    }

    let header_cells = headers.iter().map(|h| h.to_string()).collect::<Vec<_>>();
    let mut lines = vec![format_table_line(&header_cells, &widths)];
    for row in sanitized_rows {
        lines.push(format_table_line(&row, &widths));
    }
    lines.join("\n")
}

fn sanitize_table_cell(value: &str) -> String {
    value.replace('\n', "\\n").replace('\r', "\\r")
}

fn format_table_line(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    for (idx, width) in widths.iter().enumerate() {
        if idx > 0 {
            line.push_str("  ");
        }
        let cell = cells.get(idx).map(String::as_str).unwrap_or("");
        line.push_str(cell);
        let cell_len = cell.chars().count();
        if idx + 1 < widths.len() && *width > cell_len {
            line.push_str(&" ".repeat(*width - cell_len));
        }
    }
    line
}

use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use guestlink_host::ExecResult;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
pub struct ConnectionOutput {
    pub vsock_path: String,
    pub listen_path: String,
    pub state: &'static str,
    pub elapsed_ms: u64,
    pub reachable: bool,
}

#[derive(Serialize)]
struct ExecOutput<'a> {
    command: &'a str,
    exit_code: i32,
    stdout: &'a str,
    stderr: &'a str,
}

#[derive(Serialize)]
pub struct PushOutput {
    pub path: String,
    pub bytes: usize,
    pub sudo: bool,
}

#[derive(Serialize)]
struct FileOutput<'a> {
    path: &'a str,
    size: usize,
    content: &'a str,
}

pub fn print_connection(out: &ConnectionOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["VSOCK PATH", "STATE", "ELAPSED", "REACHABLE"]);
            table.add_row(vec![
                out.vsock_path.clone(),
                out.state.to_string(),
                format!("{}ms", out.elapsed_ms),
                out.reachable.to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "guest {} on {} after {}ms (reachable={})",
                out.state, out.vsock_path, out.elapsed_ms, out.reachable
            );
        }
        OutputFormat::Raw => println!("{}", out.state),
    }
}

pub fn print_exec(command: &str, result: &ExecResult, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ExecOutput {
            command,
            exit_code: result.exit_code,
            stdout: &result.stdout,
            stderr: &result.stderr,
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["EXIT", "STDOUT", "STDERR"]);
            table.add_row(vec![
                result.exit_code.to_string(),
                result.stdout.trim_end().to_string(),
                result.stderr.trim_end().to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            print_raw(result.stdout.as_bytes());
            let mut err = std::io::stderr();
            let _ = err.write_all(result.stderr.as_bytes());
            let _ = err.flush();
        }
    }
}

pub fn print_push(out: &PushOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["PATH", "BYTES", "SUDO"]);
            table.add_row(vec![
                out.path.clone(),
                out.bytes.to_string(),
                out.sudo.to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let via = if out.sudo { " (sudo)" } else { "" };
            println!("wrote {} bytes to {}{via}", out.bytes, out.path);
        }
        OutputFormat::Raw => {}
    }
}

pub fn print_file(path: &str, content: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&FileOutput {
            path,
            size: content.len(),
            content,
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["PATH", "SIZE", "CONTENT"]);
            table.add_row(vec![
                path.to_string(),
                content.len().to_string(),
                content.trim_end().to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => print_raw(content.as_bytes()),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

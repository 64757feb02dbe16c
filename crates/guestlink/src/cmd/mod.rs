use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use guestlink_host::{HostConfig, VsockHost};
use tracing::info;

use crate::exit::{host_error, io_error, CliError, CliResult, INTERRUPTED, USAGE};
use crate::output::OutputFormat;

pub mod cat;
pub mod exec;
pub mod push;
pub mod version;
pub mod wait;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Wait for the guest to connect and report the connection.
    Wait(WaitArgs),
    /// Run a shell command in the guest.
    Exec(ExecArgs),
    /// Copy a local file into the guest.
    Push(PushArgs),
    /// Print a file from the guest.
    Cat(CatArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Wait(args) => block_on(wait::run(args, format)),
        Command::Exec(args) => block_on(exec::run(args, format)),
        Command::Push(args) => block_on(push::run(args, format)),
        Command::Cat(args) => block_on(cat::run(args, format)),
        Command::Version(args) => version::run(args),
    }
}

/// Where the guest connects and how long to wait for it.
#[derive(Args, Debug)]
pub struct GuestArgs {
    /// Vsock socket base path configured for the VM (the host listens on `<BASE>_1000`).
    pub base: PathBuf,
    /// Maximum time to wait for the guest handshake (e.g. 30s, 500ms).
    #[arg(long, default_value = "30s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct WaitArgs {
    #[command(flatten)]
    pub guest: GuestArgs,
}

#[derive(Args, Debug)]
pub struct ExecArgs {
    #[command(flatten)]
    pub guest: GuestArgs,
    /// Time the guest may spend running the command.
    #[arg(long, default_value = "300s")]
    pub exec_timeout: String,
    /// Command line, joined with spaces and run by the guest's shell.
    #[arg(last = true, required = true, num_args = 1..)]
    pub command: Vec<String>,
}

#[derive(Args, Debug)]
pub struct PushArgs {
    #[command(flatten)]
    pub guest: GuestArgs,
    /// Local file to send.
    pub local: PathBuf,
    /// Destination path inside the guest.
    pub guest_path: String,
    /// Write with elevated privileges in the guest.
    #[arg(long)]
    pub sudo: bool,
}

#[derive(Args, Debug)]
pub struct CatArgs {
    #[command(flatten)]
    pub guest: GuestArgs,
    /// File path inside the guest.
    pub guest_path: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn block_on<F>(future: F) -> CliResult<i32>
where
    F: Future<Output = CliResult<i32>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))?;
    runtime.block_on(future)
}

/// Listen on `<BASE>_1000` and wait for the guest handshake.
///
/// Ctrl-C abandons the wait; the listening socket file is removed either way.
pub async fn connect(args: &GuestArgs, config: HostConfig) -> CliResult<VsockHost> {
    let timeout = parse_duration(&args.timeout)?;
    let host = VsockHost::with_config(&args.base, config);

    tokio::select! {
        result = host.wait_for_guest_connection(timeout) => {
            result.map_err(|err| host_error("guest connection failed", err))?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted while waiting for guest");
            return Err(CliError::new(INTERRUPTED, "interrupted while waiting for guest"));
        }
    }
    Ok(host)
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

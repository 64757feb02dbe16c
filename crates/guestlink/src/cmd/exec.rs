use guestlink_host::HostConfig;

use crate::cmd::{connect, parse_duration, ExecArgs};
use crate::exit::{guest_exit_code, CliResult};
use crate::output::{print_exec, OutputFormat};

/// Runs the command and exits with the guest command's exit code.
pub async fn run(args: ExecArgs, format: OutputFormat) -> CliResult<i32> {
    let exec_timeout = parse_duration(&args.exec_timeout)?;
    let config = HostConfig {
        exec_timeout,
        ..HostConfig::default()
    };
    let host = connect(&args.guest, config).await?;

    let command = args.command.join(" ");
    let result = host.exec(&command).await;
    host.close().await;

    print_exec(&command, &result, format);
    Ok(guest_exit_code(result.exit_code))
}

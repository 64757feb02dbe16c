use guestlink_host::HostConfig;

use crate::cmd::{connect, PushArgs};
use crate::exit::{host_error, io_error, CliResult, SUCCESS};
use crate::output::{print_push, OutputFormat, PushOutput};

pub async fn run(args: PushArgs, format: OutputFormat) -> CliResult<i32> {
    let content = tokio::fs::read(&args.local)
        .await
        .map_err(|err| io_error(&format!("failed reading {}", args.local.display()), err))?;

    let host = connect(&args.guest, HostConfig::default()).await?;
    let written = if args.sudo {
        host.write_file_with_sudo(&args.guest_path, &content).await
    } else {
        host.write_file(&args.guest_path, &content).await
    };
    host.close().await;
    written.map_err(|err| host_error("write failed", err))?;

    print_push(
        &PushOutput {
            path: args.guest_path,
            bytes: content.len(),
            sudo: args.sudo,
        },
        format,
    );
    Ok(SUCCESS)
}

use std::time::Instant;

use guestlink_host::HostConfig;

use crate::cmd::{connect, WaitArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_connection, ConnectionOutput, OutputFormat};

pub async fn run(args: WaitArgs, format: OutputFormat) -> CliResult<i32> {
    let started = Instant::now();
    let host = connect(&args.guest, HostConfig::default()).await?;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let reachable = host.is_reachable().await;
    let out = ConnectionOutput {
        vsock_path: host.vsock_path().display().to_string(),
        listen_path: host.listen_path().display().to_string(),
        state: host.state().name(),
        elapsed_ms,
        reachable,
    };
    host.close().await;

    print_connection(&out, format);
    Ok(SUCCESS)
}

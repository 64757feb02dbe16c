use guestlink_host::HostConfig;

use crate::cmd::{connect, CatArgs};
use crate::exit::{host_error, CliResult, SUCCESS};
use crate::output::{print_file, OutputFormat};

pub async fn run(args: CatArgs, format: OutputFormat) -> CliResult<i32> {
    let host = connect(&args.guest, HostConfig::default()).await?;
    let content = host.read_file(&args.guest_path).await;
    host.close().await;

    let content = content.map_err(|err| host_error("read failed", err))?;
    print_file(&args.guest_path, &content, format);
    Ok(SUCCESS)
}

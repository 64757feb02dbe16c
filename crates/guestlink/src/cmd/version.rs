use guestlink_transport::{GUEST_PORT, HOST_CID};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("guestlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: guestlink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("GUESTLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("guest_port: {GUEST_PORT}");
    println!("host_cid: {HOST_CID}");
    println!("max_frame_bytes: {}", guestlink_frame::MAX_FRAME_LEN);

    Ok(SUCCESS)
}

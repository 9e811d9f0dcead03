//! Runs one device cgroup v1 allow-list update cycle for a security tag.

use std::process::ExitCode;

use clap::Parser;
use confine_util::error::{ConfineError, Domain, Kind};

#[derive(Parser, Debug)]
#[command(name = "snap-update-cg", version)]
struct Args {
    /// Name of the cgroup directory under /sys/fs/cgroup/devices.
    cgroup_name: String,
    /// Security tag to derive the device-manager tag from.
    security_tag: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match confine_devicetag::setup_device_cgroup(&args.cgroup_name, &args.security_tag) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if is_recoverable(&err) => {
            println!("{}", recoverable_message(&err));
            ExitCode::SUCCESS
        }
        Err(err) => confine_util::error::die(&err),
    }
}

fn is_recoverable(err: &ConfineError) -> bool {
    err.is(Domain::CgroupV1, Kind::NoCgroup) || err.is(Domain::CgroupV1, Kind::NoDevices)
}

fn recoverable_message(err: &ConfineError) -> &'static str {
    if err.is(Domain::CgroupV1, Kind::NoCgroup) {
        "cgroup v1 unavailable, ignoring"
    } else {
        "cgroup v1 device controller unavailable, ignoring"
    }
}

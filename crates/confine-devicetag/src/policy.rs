//! The static portion of the device allow-list policy: devices that are
//! always reachable regardless of what udev has tagged, because they have
//! no sysfs representation to tag (or predate the tagging machinery).

use std::fs;
use std::os::unix::fs::MetadataExt;

use confine_util::error::ConfineError;
use libcgroups::facade::CgroupBackend;
use libcgroups::v1::devices::{DeviceNumber, DeviceType};

/// Static device numbers, per
/// <https://www.kernel.org/doc/html/v4.11/admin-guide/devices.html>:
/// null, zero, full, random, urandom, tty, console, ptmx.
const COMMON_DEVICES: &[(u32, u32)] = &[
    (1, 3),
    (1, 5),
    (1, 7),
    (1, 8),
    (1, 9),
    (5, 0),
    (5, 1),
    (5, 2),
];

/// Unix98 PTY slave majors.
const PTY_SLAVE_MAJORS: std::ops::RangeInclusive<u32> = 136..=143;

pub fn allow_common(cgroup: &impl CgroupBackend) -> Result<(), ConfineError> {
    tracing::debug!("allowing access to common devices");
    for &(major, minor) in COMMON_DEVICES {
        cgroup.allow(DeviceType::Char, DeviceNumber::Exact(major), DeviceNumber::Exact(minor))?;
    }
    Ok(())
}

/// PTY slaves are unconditionally allowed: a devpts new-instance is always
/// in use, so every slave major is reachable regardless of which ones
/// currently exist.
pub fn allow_pty_slaves(cgroup: &impl CgroupBackend) -> Result<(), ConfineError> {
    tracing::debug!("allowing access to current and future PTY slaves");
    for major in PTY_SLAVE_MAJORS {
        cgroup.allow(DeviceType::Char, DeviceNumber::Exact(major), DeviceNumber::Any)?;
    }
    Ok(())
}

fn allow_if_present(cgroup: &impl CgroupBackend, path: &str) -> Result<bool, ConfineError> {
    match fs::metadata(path) {
        Ok(meta) => {
            let rdev = meta.rdev();
            let major = libc::major(rdev);
            let minor = libc::minor(rdev);
            cgroup.allow(DeviceType::Char, DeviceNumber::Exact(major), DeviceNumber::Exact(minor))?;
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}

/// NVidia kernel modules are proprietary and have no sysfs representation,
/// so they cannot be udev-tagged; allow whatever nodes exist and let
/// AppArmor mediate the rest. Stops scanning `/dev/nvidiaN` at the first
/// gap, since minors are allocated contiguously from 0.
pub fn allow_nvidia(cgroup: &impl CgroupBackend) -> Result<(), ConfineError> {
    tracing::debug!("allowing access to nvidia devices, if present");
    for minor in 0..255u32 {
        if !allow_if_present(cgroup, &format!("/dev/nvidia{minor}"))? {
            break;
        }
    }
    for path in ["/dev/nvidiactl", "/dev/nvidia-uvm", "/dev/nvidia-modeset"] {
        allow_if_present(cgroup, path)?;
    }
    Ok(())
}

/// `/dev/uhid` predates device tagging; allow it if present.
pub fn allow_uhid(cgroup: &impl CgroupBackend) -> Result<(), ConfineError> {
    tracing::debug!("allowing access to uhid, if present");
    allow_if_present(cgroup, "/dev/uhid")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_if_present_is_false_for_missing_path() {
        // No DeviceCgroup needed: metadata() fails before the cgroup write.
        assert!(fs::metadata("/dev/does-not-exist-confine-devicetag-test").is_err());
    }
}

//! The device cgroup v1 controller.
//!
//! Unlike the freezer, opening the device cgroup hierarchy has two distinct
//! recoverable failure modes that callers need to tell apart: the system may
//! have no cgroup v1 filesystem at all (`Kind::NoCgroup`), or it may have one
//! without the `devices` controller mounted (`Kind::NoDevices`). Both are
//! downgraded to a warning by `snap-update-cg`, everything else is fatal.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::path::Path;

use confine_util::error::{ConfineError, Domain, Kind};
use confine_util::safe_path;
use nix::sys::stat::Mode;

const CGROUP_ROOT: &str = "/sys/fs/cgroup";
const DEVICES_SUBSYSTEM: &str = "devices";

fn cgroup_dir_mode() -> Mode {
    Mode::from_bits_truncate(0o755)
}

/// A device type as recorded in `devices.allow`/`devices.deny`: character,
/// block, or both (`a`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    All,
    Char,
    Block,
}

impl DeviceType {
    fn as_char(self) -> char {
        match self {
            DeviceType::All => 'a',
            DeviceType::Char => 'c',
            DeviceType::Block => 'b',
        }
    }
}

/// A major/minor selector. Either side may be wildcarded, matching the four
/// textual forms the device cgroup control file accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceNumber {
    Exact(u32),
    Any,
}

impl DeviceNumber {
    fn format(self) -> String {
        match self {
            DeviceNumber::Exact(n) => n.to_string(),
            DeviceNumber::Any => "*".to_string(),
        }
    }
}

fn allow_line(device_type: DeviceType, major: DeviceNumber, minor: DeviceNumber) -> String {
    format!(
        "{} {}:{} rwm",
        device_type.as_char(),
        major.format(),
        minor.format()
    )
}

/// A handle onto `/sys/fs/cgroup/devices/<cgroup_name>`'s `devices.allow`
/// and `devices.deny` control files.
pub struct DeviceCgroup {
    allow_fd: OwnedFd,
    deny_fd: OwnedFd,
}

impl DeviceCgroup {
    /// Open (creating if necessary) the device cgroup hierarchy named
    /// `cgroup_name`, chowning it to root:root.
    pub fn open(cgroup_name: &str) -> Result<Self, ConfineError> {
        let base = open_base()?;
        let devices_root = open_devices_subsystem(base.as_raw_fd())?;

        // Only the absence of /sys/fs/cgroup or its devices subsystem is
        // recoverable; a failure to create or open the per-cgroup directory
        // underneath it (e.g. permission denied) is an ordinary fatal error.
        safe_path::create_child_dir(devices_root.as_raw_fd(), cgroup_name, cgroup_dir_mode())?;
        let hierarchy = safe_path::open_child_dir_for_reading(devices_root.as_raw_fd(), cgroup_name)?;
        safe_path::chown_self(hierarchy.as_raw_fd())?;

        let allow_fd = safe_path::open_child_write(hierarchy.as_raw_fd(), "devices.allow")?;
        let deny_fd = safe_path::open_child_write(hierarchy.as_raw_fd(), "devices.deny")?;
        Ok(DeviceCgroup { allow_fd, deny_fd })
    }

    /// Remove every device previously allowed, by writing `a` to
    /// `devices.deny`.
    pub fn reset(&self) -> Result<(), ConfineError> {
        safe_path::write_all(&self.deny_fd, b"a")?;
        tracing::debug!("reset device cgroup access list");
        Ok(())
    }

    /// Allow access to a single device selector.
    pub fn allow(
        &self,
        device_type: DeviceType,
        major: DeviceNumber,
        minor: DeviceNumber,
    ) -> Result<(), ConfineError> {
        let line = allow_line(device_type, major, minor);
        safe_path::write_all(&self.allow_fd, line.as_bytes())?;
        tracing::debug!(line = line.as_str(), "allowed device access");
        Ok(())
    }
}

fn open_base() -> Result<OwnedFd, ConfineError> {
    safe_path::open_root(Path::new(CGROUP_ROOT))
        .map_err(|_| ConfineError::new(Domain::CgroupV1, Kind::NoCgroup, format!("cannot open {CGROUP_ROOT}")))
}

fn open_devices_subsystem(base: RawFd) -> Result<OwnedFd, ConfineError> {
    safe_path::open_child_dir(base, DEVICES_SUBSYSTEM).map_err(|_| {
        ConfineError::new(
            Domain::CgroupV1,
            Kind::NoDevices,
            format!("cannot open {CGROUP_ROOT}/{DEVICES_SUBSYSTEM}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::fd::FromRawFd;

    fn fixture_cgroup() -> (tempfile::TempDir, DeviceCgroup) {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("devices.allow"), "").unwrap();
        fs::write(tmp.path().join("devices.deny"), "").unwrap();
        let open_write = |name: &str| {
            let raw = nix::fcntl::open(&tmp.path().join(name), nix::fcntl::OFlag::O_WRONLY, Mode::empty()).unwrap();
            unsafe { OwnedFd::from_raw_fd(raw) }
        };
        let cgroup = DeviceCgroup {
            allow_fd: open_write("devices.allow"),
            deny_fd: open_write("devices.deny"),
        };
        (tmp, cgroup)
    }

    #[test]
    fn reset_writes_a_to_deny_file() {
        let (tmp, cgroup) = fixture_cgroup();
        cgroup.reset().unwrap();
        assert_eq!(fs::read_to_string(tmp.path().join("devices.deny")).unwrap(), "a");
    }

    #[test]
    fn allow_writes_formatted_line_to_allow_file() {
        let (tmp, cgroup) = fixture_cgroup();
        cgroup
            .allow(DeviceType::Char, DeviceNumber::Exact(1), DeviceNumber::Exact(3))
            .unwrap();
        assert_eq!(fs::read_to_string(tmp.path().join("devices.allow")).unwrap(), "c 1:3 rwm");
    }

    #[test]
    fn allow_line_formats_exact_major_minor() {
        assert_eq!(
            allow_line(DeviceType::Char, DeviceNumber::Exact(1), DeviceNumber::Exact(3)),
            "c 1:3 rwm"
        );
    }

    #[test]
    fn allow_line_formats_wildcard_minor() {
        assert_eq!(
            allow_line(DeviceType::Char, DeviceNumber::Exact(136), DeviceNumber::Any),
            "c 136:* rwm"
        );
    }

    #[test]
    fn allow_line_formats_wildcard_major() {
        assert_eq!(
            allow_line(DeviceType::Block, DeviceNumber::Any, DeviceNumber::Exact(0)),
            "b *:0 rwm"
        );
    }

    #[test]
    fn allow_line_formats_unrestricted() {
        assert_eq!(allow_line(DeviceType::All, DeviceNumber::Any, DeviceNumber::Any), "a *:* rwm");
    }
}

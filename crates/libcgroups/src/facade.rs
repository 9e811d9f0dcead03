//! The cgroup backend façade: a single capability set — `reset` and
//! `allow` — in front of whichever kernel cgroup hierarchy version is
//! actually backing a device cgroup. Only a v1 backend exists today; the
//! trait and the `Cgroup` enum exist so a v2 backend can be added later
//! as a sibling variant without touching any caller.

use confine_util::error::ConfineError;

use crate::v1::devices::{DeviceCgroup, DeviceNumber, DeviceType};

/// The operations every device cgroup backend provides, independent of
/// which kernel hierarchy version implements them.
pub trait CgroupBackend {
    fn reset(&self) -> Result<(), ConfineError>;
    fn allow(&self, device_type: DeviceType, major: DeviceNumber, minor: DeviceNumber) -> Result<(), ConfineError>;
}

impl CgroupBackend for DeviceCgroup {
    fn reset(&self) -> Result<(), ConfineError> {
        DeviceCgroup::reset(self)
    }

    fn allow(&self, device_type: DeviceType, major: DeviceNumber, minor: DeviceNumber) -> Result<(), ConfineError> {
        DeviceCgroup::allow(self, device_type, major, minor)
    }
}

/// Which cgroup hierarchy version backs a `Cgroup`. `V2` is reserved for
/// when a v2 backend exists; selecting it today is a programmer error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgroupVersion {
    V1,
}

/// A device cgroup opened against a specific backend version. Callers
/// that only need `reset`/`allow` can stay generic over `CgroupBackend`
/// and never match on the variant themselves.
pub enum Cgroup {
    V1(DeviceCgroup),
}

impl Cgroup {
    pub fn open(version: CgroupVersion, cgroup_name: &str) -> Result<Self, ConfineError> {
        match version {
            CgroupVersion::V1 => Ok(Cgroup::V1(DeviceCgroup::open(cgroup_name)?)),
        }
    }
}

impl CgroupBackend for Cgroup {
    fn reset(&self) -> Result<(), ConfineError> {
        match self {
            Cgroup::V1(backend) => backend.reset(),
        }
    }

    fn allow(&self, device_type: DeviceType, major: DeviceNumber, minor: DeviceNumber) -> Result<(), ConfineError> {
        match self {
            Cgroup::V1(backend) => backend.allow(device_type, major, minor),
        }
    }
}

//! Device-manager tag consumer: builds the device cgroup v1 allow-list for
//! a security tag from whatever the device manager (udev) has tagged for it.

pub mod enumerate;
pub mod policy;

use confine_util::error::ConfineError;
use confine_util::snapname;
use libcgroups::facade::{Cgroup, CgroupBackend, CgroupVersion};
use libcgroups::v1::devices::{DeviceNumber, DeviceType};

/// Configure the device cgroup named `cgroup_name` to match whatever the
/// device manager has tagged for `security_tag`. The builder is parametric
/// on the cgroup backend version; only `V1` exists today.
///
/// If nothing has been tagged yet, the cgroup is left unrestricted rather
/// than left absent: a snap with no device interfaces connected should
/// still run, and a cgroup already holding the process means a later
/// device-manager tagging event can reconfigure it in place (see
/// `DESIGN.md`, bug 1838937).
pub fn setup_device_cgroup(cgroup_name: &str, security_tag: &str) -> Result<(), ConfineError> {
    let udev_tag = snapname::security_tag_to_device_manager_tag(security_tag);
    tracing::debug!(cgroup_name, udev_tag = udev_tag.as_str(), "looking for tagged devices");

    let cgroup = Cgroup::open(CgroupVersion::V1, cgroup_name)?;
    let tagged = enumerate::devices_tagged(&udev_tag)?;
    cgroup.reset()?;

    if tagged.is_empty() {
        tracing::debug!("configuring cgroup to allow access to all devices");
        cgroup.allow(DeviceType::All, DeviceNumber::Any, DeviceNumber::Any)?;
        return Ok(());
    }

    tracing::debug!(count = tagged.len(), "configuring cgroup to allow access to select devices");
    policy::allow_common(&cgroup)?;
    policy::allow_pty_slaves(&cgroup)?;
    policy::allow_nvidia(&cgroup)?;
    policy::allow_uhid(&cgroup)?;
    for device in tagged {
        let device_type = if device.is_block { DeviceType::Block } else { DeviceType::Char };
        cgroup.allow(device_type, DeviceNumber::Exact(device.major), DeviceNumber::Exact(device.minor))?;
    }
    Ok(())
}

//! Enumeration of devices the device-manager (udev) has tagged for a given
//! security tag.

use confine_util::error::ConfineError;

/// One device udev has tagged: its kernel device type and (major, minor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedDevice {
    pub is_block: bool,
    pub major: u32,
    pub minor: u32,
}

fn bug(op: &str, err: impl std::fmt::Display) -> ConfineError {
    ConfineError::new(
        confine_util::error::Domain::Confine,
        confine_util::error::Kind::Bug,
        format!("{op}: {err}"),
    )
}

/// Ask the device manager for every device tagged `udev_tag`. An empty
/// result is a legitimate answer, not an error: it means nothing has been
/// tagged for this security tag yet.
pub fn devices_tagged(udev_tag: &str) -> Result<Vec<TaggedDevice>, ConfineError> {
    let mut enumerator = udev::Enumerator::new().map_err(|e| bug("cannot connect to device manager", e))?;
    enumerator
        .match_tag(udev_tag)
        .map_err(|e| bug("cannot add tag match to device enumeration", e))?;
    let devices = enumerator
        .scan_devices()
        .map_err(|e| bug("cannot enumerate tagged devices", e))?;

    let mut tagged = Vec::new();
    for device in devices {
        let devnum = match device.devnum() {
            Some(devnum) => devnum,
            None => continue,
        };
        let is_block = device.syspath().to_string_lossy().contains("/block/");
        tagged.push(TaggedDevice {
            is_block,
            major: libc::major(devnum),
            minor: libc::minor(devnum),
        });
    }
    Ok(tagged)
}

//! The freezer cgroup v1 manager.
//!
//! Operations on the freezer subsystem live at `/sys/fs/cgroup/freezer`. For
//! identifier `id` the hierarchy name is `snap.<id>`. Every I/O failure here
//! is fatal to the caller — there is no recoverable case, unlike the device
//! cgroup, where a missing controller is downgraded to a warning.

use std::io::{BufRead, BufReader};
use std::os::fd::AsRawFd;

use confine_util::error::ConfineError;
use confine_util::safe_path;
use nix::sys::stat::Mode;
use nix::unistd::Pid;

const FREEZER_ROOT: &str = "/sys/fs/cgroup/freezer";

fn hierarchy_mode() -> Mode {
    Mode::from_bits_truncate(0o755)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezerState {
    Frozen,
    Thawed,
}

impl FreezerState {
    fn as_str(self) -> &'static str {
        match self {
            FreezerState::Frozen => "FROZEN",
            FreezerState::Thawed => "THAWED",
        }
    }
}

fn hierarchy_name(id: &str) -> String {
    format!("snap.{id}")
}

/// Open the freezer hierarchy directory for `id`, creating it (idempotently)
/// and chowning it to root:root.
fn open_hierarchy_create(id: &str) -> Result<std::os::fd::OwnedFd, ConfineError> {
    let root = safe_path::open_root(std::path::Path::new(FREEZER_ROOT))?;
    let name = hierarchy_name(id);
    safe_path::create_child_dir(root.as_raw_fd(), &name, hierarchy_mode())?;
    let hierarchy = safe_path::open_child_dir(root.as_raw_fd(), &name)?;
    safe_path::chown_self(hierarchy.as_raw_fd())?;
    Ok(hierarchy)
}

/// Open the freezer hierarchy directory for `id` without creating it.
fn open_hierarchy(id: &str) -> Result<std::os::fd::OwnedFd, ConfineError> {
    let root = safe_path::open_root(std::path::Path::new(FREEZER_ROOT))?;
    safe_path::open_child_dir(root.as_raw_fd(), &hierarchy_name(id))
}

/// Move `pid` into the freezer hierarchy for `id`, creating the hierarchy if
/// it does not already exist.
pub fn join(id: &str, pid: Pid) -> Result<(), ConfineError> {
    tracing::debug!(id, pid = pid.as_raw(), "joining freezer cgroup");
    let hierarchy = open_hierarchy_create(id)?;
    let tasks = safe_path::open_child_write(hierarchy.as_raw_fd(), "tasks")?;
    safe_path::write_all(&tasks, pid.as_raw().to_string().as_bytes())?;
    tracing::debug!(id, pid = pid.as_raw(), "moved process to freezer cgroup hierarchy");
    Ok(())
}

/// Set the freezer state for `id`'s hierarchy, which must already exist.
pub fn set_state(id: &str, state: FreezerState) -> Result<(), ConfineError> {
    let hierarchy = open_hierarchy(id)?;
    let state_fd = safe_path::open_child_write(hierarchy.as_raw_fd(), "freezer.state")?;
    safe_path::write_all(&state_fd, state.as_str().as_bytes())?;
    tracing::debug!(id, state = state.as_str(), "set freezer cgroup hierarchy state");
    Ok(())
}

pub fn freeze(id: &str) -> Result<(), ConfineError> {
    set_state(id, FreezerState::Frozen)
}

pub fn thaw(id: &str) -> Result<(), ConfineError> {
    set_state(id, FreezerState::Thawed)
}

/// Invoke `visit` for every PID currently in `id`'s freezer hierarchy, in
/// the order they appear in `cgroup.procs`. Stops and propagates the error
/// as soon as `visit` returns one.
pub fn for_each_pid(
    id: &str,
    mut visit: impl FnMut(&str) -> Result<(), ConfineError>,
) -> Result<(), ConfineError> {
    let hierarchy = open_hierarchy(id)?;
    let procs_fd = safe_path::open_child_read(hierarchy.as_raw_fd(), "cgroup.procs")?;
    let reader = BufReader::new(confine_util::fd::into_file(procs_fd));
    for line in reader.lines() {
        let line = line.map_err(|err| ConfineError::io("cannot read", std::path::Path::new("cgroup.procs"), err))?;
        if line.is_empty() {
            continue;
        }
        visit(&line)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::fd::FromRawFd;

    fn fixture_hierarchy() -> (tempfile::TempDir, std::os::fd::OwnedFd) {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("tasks"), "").unwrap();
        fs::write(tmp.path().join("freezer.state"), "").unwrap();
        fs::write(tmp.path().join("cgroup.procs"), "").unwrap();
        let fd = nix::fcntl::open(
            tmp.path(),
            nix::fcntl::OFlag::O_RDONLY | nix::fcntl::OFlag::O_DIRECTORY,
            Mode::empty(),
        )
        .unwrap();
        (tmp, unsafe { std::os::fd::OwnedFd::from_raw_fd(fd) })
    }

    #[test]
    fn set_state_writes_literal_strings() {
        let (tmp, hierarchy) = fixture_hierarchy();
        let state_fd = safe_path::open_child_write(hierarchy.as_raw_fd(), "freezer.state").unwrap();
        safe_path::write_all(&state_fd, FreezerState::Frozen.as_str().as_bytes()).unwrap();
        assert_eq!(fs::read_to_string(tmp.path().join("freezer.state")).unwrap(), "FROZEN");

        let state_fd = safe_path::open_child_write(hierarchy.as_raw_fd(), "freezer.state").unwrap();
        safe_path::write_all(&state_fd, FreezerState::Thawed.as_str().as_bytes()).unwrap();
        assert_eq!(fs::read_to_string(tmp.path().join("freezer.state")).unwrap(), "THAWED");
    }

    #[test]
    fn for_each_pid_skips_empty_lines_and_strips_newline() {
        let (tmp, hierarchy) = fixture_hierarchy();
        fs::write(tmp.path().join("cgroup.procs"), "123\n\n456\n").unwrap();
        let mut seen = vec![];
        for_each_pid_at(&hierarchy, |pid| {
            seen.push(pid.to_string());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec!["123".to_string(), "456".to_string()]);
    }

    fn for_each_pid_at(
        hierarchy: &std::os::fd::OwnedFd,
        mut visit: impl FnMut(&str) -> Result<(), ConfineError>,
    ) -> Result<(), ConfineError> {
        let procs_fd = safe_path::open_child_read(hierarchy.as_raw_fd(), "cgroup.procs")?;
        let reader = BufReader::new(confine_util::fd::into_file(procs_fd));
        for line in reader.lines() {
            let line = line.map_err(|err| {
                ConfineError::io("cannot read", std::path::Path::new("cgroup.procs"), err)
            })?;
            if !line.is_empty() {
                visit(&line)?;
            }
        }
        Ok(())
    }
}

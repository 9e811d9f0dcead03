//! The namespace manager — the process-wide coordinator
//! owning the control directory, its master lock, and bootstrap state.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::path::Path;
use std::time::Duration;

use confine_util::error::{ConfineError, Domain, Kind};
use confine_util::safe_path;
use nix::mount::{mount, MsFlags};
use nix::sys::stat::Mode;

use crate::group::NamespaceGroup;
use crate::lock;
use crate::mountinfo;
use crate::paths::{self, CONTROL_DIR};

const MASTER_LOCK_TIMEOUT: Duration = Duration::from_secs(3);

/// The C sources leave the retry count after a failed bootstrap bind
/// mount unspecified; bounding it avoids looping forever against a
/// mountinfo that will never settle.
const MOUNTINFO_CHECK_ATTEMPTS: u32 = 2;

pub struct NamespaceManager {
    dir_fd: OwnedFd,
    master_lock_fd: OwnedFd,
}

impl NamespaceManager {
    /// Open (creating if necessary) `/run/snapd/ns` and its master lock,
    /// and ensure the directory is a private bind mount over itself.
    pub fn new() -> Result<Self, ConfineError> {
        let run_snapd = safe_path::open_root(Path::new("/run/snapd"))?;
        Self::build(run_snapd)
    }

    /// Like `new`, but treats a missing `/run/snapd` as a non-fatal signal
    /// instead of creating it and propagating whatever fails downstream of
    /// that. Mirrors `SC_NS_FAIL_GRACEFULLY` on the original's
    /// `sc_open_ns_group`, for callers that want to detect "namespace
    /// support isn't set up on this system" without treating it as fatal.
    pub fn new_graceful() -> Result<Option<Self>, ConfineError> {
        match safe_path::open_root(Path::new("/run/snapd")) {
            Ok(run_snapd) => Self::build(run_snapd).map(Some),
            Err(err) if err.is(Domain::Errno, Kind::Errno(nix::errno::Errno::ENOENT as i32)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn build(run_snapd: OwnedFd) -> Result<Self, ConfineError> {
        safe_path::create_child_dir(run_snapd.as_raw_fd(), "ns", Mode::from_bits_truncate(0o700))?;
        let dir_fd = safe_path::open_root(Path::new(CONTROL_DIR))?;
        let master_lock_fd = safe_path::open_child_create(
            dir_fd.as_raw_fd(),
            paths::MASTER_LOCK_NAME,
            Mode::from_bits_truncate(0o600),
        )?;

        lock::lock_exclusive_bounded(master_lock_fd.as_raw_fd(), MASTER_LOCK_TIMEOUT)?;
        let bootstrapped = bootstrap();
        lock::unlock(master_lock_fd.as_raw_fd())?;
        bootstrapped?;

        Ok(NamespaceManager { dir_fd, master_lock_fd })
    }

    pub fn lock_all(&self) -> Result<(), ConfineError> {
        lock::lock_exclusive_bounded(self.master_lock_fd.as_raw_fd(), MASTER_LOCK_TIMEOUT)
    }

    pub fn unlock_all(&self) -> Result<(), ConfineError> {
        lock::unlock(self.master_lock_fd.as_raw_fd())
    }

    pub fn open_group(&self, name: &str) -> Result<NamespaceGroup, ConfineError> {
        confine_util::snapname::validate_identifier(name)?;
        NamespaceGroup::open(self.dir_fd.as_raw_fd(), name)
    }

    /// List the identifiers with a preserved namespace file. Callers that
    /// want this serialized against concurrent create/discard should hold
    /// the master lock (`lock_all`) for the duration of the enumeration
    /// and whatever they do with the result, since `flock` re-acquired on
    /// the same descriptor here would otherwise release it early.
    pub fn enumerate(&self) -> Result<Vec<String>, ConfineError> {
        enumerate_mnt_files()
    }

    /// Discard the preserved namespace for `name`. Validates the
    /// identifier first, so a bulk-discard caller can distinguish a
    /// malformed name (recoverable) from every other failure (fatal).
    pub fn discard(&self, name: &str) -> Result<(), ConfineError> {
        confine_util::snapname::validate_identifier(name)?;
        let group = NamespaceGroup::open(self.dir_fd.as_raw_fd(), name)?;
        group.lock()?;
        let result = discard_mnt_file(self.dir_fd.as_raw_fd(), name);
        group.unlock()?;
        result
    }
}

fn enumerate_mnt_files() -> Result<Vec<String>, ConfineError> {
    let entries =
        std::fs::read_dir(CONTROL_DIR).map_err(|err| ConfineError::io("cannot list", Path::new(CONTROL_DIR), err))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| ConfineError::io("cannot read entry in", Path::new(CONTROL_DIR), err))?;
        let file_name = entry.file_name();
        if let Some(name) = file_name.to_str().and_then(paths::identifier_from_mnt_file_name) {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

pub(crate) fn discard_mnt_file(dir_fd: RawFd, name: &str) -> Result<(), ConfineError> {
    let mnt_name = paths::mnt_file_name(name);
    let target = safe_path::proc_self_fd_path(dir_fd, &mnt_name);
    match nix::mount::umount2(&target, nix::mount::MntFlags::MNT_DETACH) {
        Ok(()) => {}
        Err(nix::errno::Errno::EINVAL) | Err(nix::errno::Errno::ENOENT) => {}
        Err(err) => return Err(ConfineError::errno(format!("cannot unmount {}", target.display()), err)),
    }
    match nix::unistd::unlinkat(Some(dir_fd), mnt_name.as_str(), nix::unistd::UnlinkatFlags::NoRemoveDir) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::ENOENT) => Ok(()),
        Err(err) => Err(ConfineError::errno(format!("cannot remove {mnt_name}"), err)),
    }
}

fn bootstrap() -> Result<(), ConfineError> {
    for attempt in 0..MOUNTINFO_CHECK_ATTEMPTS {
        if mountinfo::is_private_mount_point(CONTROL_DIR)? {
            return Ok(());
        }
        if attempt + 1 == MOUNTINFO_CHECK_ATTEMPTS {
            break;
        }
        let path = Path::new(CONTROL_DIR);
        mount(Some(path), path, None::<&str>, MsFlags::MS_BIND, None::<&str>)
            .map_err(|err| ConfineError::errno(format!("cannot bind mount {CONTROL_DIR} onto itself"), err))?;
        mount(None::<&Path>, path, None::<&str>, MsFlags::MS_PRIVATE, None::<&str>)
            .map_err(|err| ConfineError::errno(format!("cannot make {CONTROL_DIR} private"), err))?;
    }
    Err(ConfineError::bug(format!(
        "{CONTROL_DIR} is still not a private mount point after bind-mounting it"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::fcntl::{self, OFlag};
    use std::os::fd::FromRawFd;

    fn fixture_dir() -> (tempfile::TempDir, OwnedFd) {
        let tmp = tempfile::tempdir().unwrap();
        let raw = fcntl::open(tmp.path(), OFlag::O_DIRECTORY | OFlag::O_RDONLY, Mode::empty()).unwrap();
        (tmp, unsafe { OwnedFd::from_raw_fd(raw) })
    }

    #[test]
    fn discard_mnt_file_is_idempotent_when_nothing_was_ever_created() {
        let (_tmp, dir_fd) = fixture_dir();
        discard_mnt_file(dir_fd.as_raw_fd(), "never-created").unwrap();
    }

    #[test]
    fn discard_mnt_file_removes_an_unmounted_placeholder() {
        let (tmp, dir_fd) = fixture_dir();
        std::fs::write(tmp.path().join("plain.mnt"), "").unwrap();
        discard_mnt_file(dir_fd.as_raw_fd(), "plain").unwrap();
        assert!(!tmp.path().join("plain.mnt").exists());
    }
}

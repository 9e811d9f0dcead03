//! Descriptor-relative safe-path I/O.
//!
//! Every traversal into a privileged-writable or world-writable tree (e.g.
//! `/sys/fs/cgroup`, `/run/snapd/ns`) proceeds one path component at a time
//! using descriptor-relative (`*at`) syscalls that refuse to follow
//! symlinks, so an attacker who controls an intermediate path component
//! cannot substitute a symlink mid-traversal. String-composed paths handed
//! straight to `open()` would be vulnerable to exactly that TOCTOU
//! substitution — which is why every function here takes a directory file
//! descriptor rather than a path string.

use std::os::fd::{OwnedFd, RawFd};
use std::path::Path;

use nix::errno::Errno;
use nix::fcntl::{self, OFlag};
use nix::sys::stat::{mkdirat, Mode};
use nix::unistd::{fchownat, FchownatFlags, Gid, Uid};

use crate::error::ConfineError;
use crate::fd;

fn traversal_flags() -> OFlag {
    OFlag::O_NOFOLLOW | OFlag::O_CLOEXEC
}

fn reject_unsafe_component(name: &str) -> Result<(), ConfineError> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(ConfineError::bug(format!(
            "refusing to traverse unsafe path component {name:?}"
        )));
    }
    Ok(())
}

/// Open an absolute path as a path-reference directory descriptor: directory
/// required, symlinks refused, close-on-exec. Suitable as the `dirfd`
/// argument to every other function in this module.
pub fn open_root(path: &Path) -> Result<OwnedFd, ConfineError> {
    let flags = OFlag::O_PATH | OFlag::O_DIRECTORY | traversal_flags();
    let raw = fcntl::open(path, flags, Mode::empty())
        .map_err(|err| ConfineError::errno(format!("cannot open {}", path.display()), err))?;
    Ok(unsafe { fd::own(raw) })
}

/// Open `name` relative to `dirfd` as a directory-reference descriptor,
/// for further descent. Rejects unsafe components.
pub fn open_child_dir(dirfd: RawFd, name: &str) -> Result<OwnedFd, ConfineError> {
    reject_unsafe_component(name)?;
    let flags = OFlag::O_PATH | OFlag::O_DIRECTORY | traversal_flags();
    let raw = fcntl::openat(dirfd, name, flags, Mode::empty())
        .map_err(|err| ConfineError::errno(format!("cannot open {name}"), err))?;
    Ok(unsafe { fd::own(raw) })
}

/// Open `name` relative to `dirfd` as a directory descriptor suitable for
/// `readdir`-style enumeration (an `O_PATH` descriptor cannot be used for
/// that). Still refuses symlinks.
pub fn open_child_dir_for_reading(dirfd: RawFd, name: &str) -> Result<OwnedFd, ConfineError> {
    reject_unsafe_component(name)?;
    let flags = OFlag::O_RDONLY | OFlag::O_DIRECTORY | traversal_flags();
    let raw = fcntl::openat(dirfd, name, flags, Mode::empty())
        .map_err(|err| ConfineError::errno(format!("cannot open {name}"), err))?;
    Ok(unsafe { fd::own(raw) })
}

/// Open a leaf file `name` relative to `dirfd` for writing. Never creates:
/// the file must already exist (it is a kernel-exposed control file).
pub fn open_child_write(dirfd: RawFd, name: &str) -> Result<OwnedFd, ConfineError> {
    reject_unsafe_component(name)?;
    let flags = OFlag::O_WRONLY | traversal_flags();
    let raw = fcntl::openat(dirfd, name, flags, Mode::empty())
        .map_err(|err| ConfineError::errno(format!("cannot open {name}"), err))?;
    Ok(unsafe { fd::own(raw) })
}

/// Open a leaf file `name` relative to `dirfd` for reading.
pub fn open_child_read(dirfd: RawFd, name: &str) -> Result<OwnedFd, ConfineError> {
    reject_unsafe_component(name)?;
    let flags = OFlag::O_RDONLY | traversal_flags();
    let raw = fcntl::openat(dirfd, name, flags, Mode::empty())
        .map_err(|err| ConfineError::errno(format!("cannot open {name}"), err))?;
    Ok(unsafe { fd::own(raw) })
}

/// Create `name` as a directory relative to `dirfd`. Idempotent: an
/// already-existing directory is not an error. Anything else is.
pub fn create_child_dir(dirfd: RawFd, name: &str, perm: Mode) -> Result<(), ConfineError> {
    reject_unsafe_component(name)?;
    match mkdirat(dirfd, name, perm) {
        Ok(()) => Ok(()),
        Err(Errno::EEXIST) => Ok(()),
        Err(err) => Err(ConfineError::errno(format!("cannot create directory {name}"), err)),
    }
}

/// Open a regular file `name` relative to `dirfd`, creating it if absent.
/// Used for lock files and bind-mount target files, neither of which are
/// kernel-exposed control files that must already exist.
pub fn open_child_create(dirfd: RawFd, name: &str, perm: Mode) -> Result<OwnedFd, ConfineError> {
    reject_unsafe_component(name)?;
    let flags = OFlag::O_RDWR | OFlag::O_CREAT | traversal_flags();
    let raw = fcntl::openat(dirfd, name, flags, perm)
        .map_err(|err| ConfineError::errno(format!("cannot open or create {name}"), err))?;
    Ok(unsafe { fd::own(raw) })
}

/// Path through `/proc/self/fd` addressing `name` relative to `dirfd`
/// without ever composing a string path through the (possibly
/// attacker-influenced) parent directory. Syscalls that require a path
/// argument (`mount(2)`) but should otherwise behave descriptor-relative
/// use this.
pub fn proc_self_fd_path(dirfd: RawFd, name: &str) -> std::path::PathBuf {
    std::path::PathBuf::from(format!("/proc/self/fd/{dirfd}/{name}"))
}

/// Reset ownership of the directory `dirfd` refers to, to `uid=0 gid=0`.
/// Only meaningful when running with effective root.
pub fn chown_self(dirfd: RawFd) -> Result<(), ConfineError> {
    fchownat(
        Some(dirfd),
        ".",
        Some(Uid::from_raw(0)),
        Some(Gid::from_raw(0)),
        FchownatFlags::NoFollowSymlink,
    )
    .map_err(|err| ConfineError::errno("cannot chown to root:root", err))
}

/// Write the full buffer to `fd` or fail; short writes are treated as
/// failures rather than silently re-issued, since every caller writes a
/// single small control line and a short write means something is wrong
/// with the target file.
pub fn write_all(fd: &OwnedFd, bytes: &[u8]) -> Result<(), ConfineError> {
    use std::io::Write;
    // Operate on a dup'd descriptor so the File's Drop (which closes it)
    // never touches the descriptor the caller still owns.
    let dup = fd
        .try_clone()
        .map_err(|err| ConfineError::io("cannot duplicate descriptor for", Path::new(""), err))?;
    let mut file = fd::into_file(dup);
    file.write_all(bytes)
        .map_err(|err| ConfineError::io("cannot write to", Path::new(""), err))
}

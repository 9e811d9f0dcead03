//! The preserve/join protocol's forked helper process.
//!
//! The bind mount of `/proc/<pid>/ns/mnt` must be performed from a
//! different process than the one whose mount namespace is being
//! preserved — `/proc/self/ns/mnt` always refers to the *current*
//! namespace, which by the time the parent wants to persist it is no
//! longer the one it unshared. A second process observing the parent by
//! PID does not have that problem.

use std::os::fd::{OwnedFd, RawFd};
use std::path::Path;

use confine_util::error::ConfineError;
use confine_util::fd;
use confine_util::safe_path;
use nix::mount::{mount, MsFlags};
use nix::sys::eventfd::{eventfd, EfdFlags};
use nix::sys::stat::Mode;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};

fn bind_mount_preserved_ns(parent_pid: Pid, dirfd: RawFd, name: &str) -> Result<(), ConfineError> {
    safe_path::open_child_create(dirfd, name, Mode::from_bits_truncate(0o600))?;
    let source = format!("/proc/{}/ns/mnt", parent_pid.as_raw());
    let target = safe_path::proc_self_fd_path(dirfd, name);
    mount(Some(Path::new(&source)), &target, None::<&str>, MsFlags::MS_BIND, None::<&str>)
        .map_err(|err| ConfineError::errno(format!("cannot bind mount {source} onto {}", target.display()), err))
}

/// Block on `event_fd` for a non-zero wakeup, then bind-mount and exit.
/// Runs entirely inside the forked child; never returns.
fn helper_main(parent_pid: Pid, dirfd: RawFd, name: String, event_fd: OwnedFd) -> ! {
    use std::io::Read;
    let mut buf = [0u8; 8];
    let mut notifier = fd::into_file(event_fd);
    let status = match notifier.read_exact(&mut buf) {
        Ok(()) if u64::from_ne_bytes(buf) != 0 => match bind_mount_preserved_ns(parent_pid, dirfd, &name) {
            Ok(()) => 0,
            Err(err) => {
                tracing::debug!(%err, "preserve-namespace helper failed to bind mount");
                1
            }
        },
        _ => 1,
    };
    std::process::exit(status);
}

/// The parent's view of a live helper: its PID and the notifier used to
/// wake it.
pub struct Helper {
    pub pid: Pid,
    event_fd: OwnedFd,
}

/// Create the event notifier and fork the helper described above. Must be
/// called before the caller unshares its own mount namespace.
pub fn spawn(dirfd: RawFd, name: &str) -> Result<Helper, ConfineError> {
    let parent_pid = Pid::this();
    let raw = eventfd(0, EfdFlags::EFD_CLOEXEC).map_err(|err| ConfineError::errno("cannot create event notifier", err))?;
    let event_fd = unsafe { fd::own(raw) };
    let child_event_fd = event_fd
        .try_clone()
        .map_err(|err| ConfineError::io("cannot duplicate", Path::new("event notifier"), err))?;
    let name = name.to_string();

    match unsafe { fork() }.map_err(|err| ConfineError::errno("cannot fork preserve-namespace helper", err))? {
        ForkResult::Child => helper_main(parent_pid, dirfd, name, child_event_fd),
        ForkResult::Parent { child } => {
            drop(child_event_fd);
            Ok(Helper { pid: child, event_fd })
        }
    }
}

/// Wake the helper and wait for it to finish persisting the namespace.
pub fn wake_and_reap(helper: Helper) -> Result<(), ConfineError> {
    use std::io::Write;
    let Helper { pid, event_fd } = helper;
    let mut notifier = fd::into_file(event_fd);
    notifier
        .write_all(&1u64.to_ne_bytes())
        .map_err(|err| ConfineError::io("cannot signal", Path::new("event notifier"), err))?;
    drop(notifier);

    match waitpid(pid, None) {
        Ok(WaitStatus::Exited(_, 0)) => Ok(()),
        Ok(WaitStatus::Exited(_, code)) => {
            Err(ConfineError::bug(format!("preserve-namespace helper exited with status {code}")))
        }
        Ok(other) => Err(ConfineError::bug(format!(
            "preserve-namespace helper terminated abnormally: {other:?}"
        ))),
        Err(err) => Err(ConfineError::errno("cannot wait for preserve-namespace helper", err)),
    }
}

//! Advisory (`flock(2)`) locking helpers for the control directory and
//! per-group lock files.

use std::os::fd::RawFd;
use std::thread::sleep;
use std::time::{Duration, Instant};

use confine_util::error::ConfineError;
use nix::fcntl::{flock, FlockArg};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Block indefinitely until the exclusive lock on `fd` is acquired. Used
/// for per-group locks, which callers are trusted not to hold for an
/// unbounded amount of time.
pub fn lock_exclusive(fd: RawFd) -> Result<(), ConfineError> {
    flock(fd, FlockArg::LockExclusive).map_err(|err| ConfineError::errno("cannot lock", err))
}

/// Acquire the exclusive lock on `fd`, giving up after `timeout` rather
/// than blocking forever. Used for the master lock, which every tool in
/// the suite takes only briefly.
pub fn lock_exclusive_bounded(fd: RawFd, timeout: Duration) -> Result<(), ConfineError> {
    let deadline = Instant::now() + timeout;
    loop {
        match flock(fd, FlockArg::LockExclusiveNonblock) {
            Ok(()) => return Ok(()),
            Err(nix::errno::Errno::EWOULDBLOCK) => {
                if Instant::now() >= deadline {
                    return Err(ConfineError::new(
                        confine_util::error::Domain::Confine,
                        confine_util::error::Kind::Bug,
                        "timed out waiting for the namespace control lock",
                    ));
                }
                sleep(POLL_INTERVAL);
            }
            Err(err) => return Err(ConfineError::errno("cannot lock", err)),
        }
    }
}

pub fn unlock(fd: RawFd) -> Result<(), ConfineError> {
    flock(fd, FlockArg::Unlock).map_err(|err| ConfineError::errno("cannot unlock", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsRawFd;

    #[test]
    fn bounded_lock_times_out_when_already_held() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let holder = std::fs::File::open(tmp.path()).unwrap();
        lock_exclusive(holder.as_raw_fd()).unwrap();

        let contender = std::fs::OpenOptions::new().write(true).open(tmp.path()).unwrap();
        let result = lock_exclusive_bounded(contender.as_raw_fd(), Duration::from_millis(120));
        assert!(result.is_err());
    }

    #[test]
    fn bounded_lock_succeeds_once_released() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let holder = std::fs::File::open(tmp.path()).unwrap();
        lock_exclusive(holder.as_raw_fd()).unwrap();
        unlock(holder.as_raw_fd()).unwrap();

        let contender = std::fs::OpenOptions::new().write(true).open(tmp.path()).unwrap();
        lock_exclusive_bounded(contender.as_raw_fd(), Duration::from_millis(500)).unwrap();
    }
}

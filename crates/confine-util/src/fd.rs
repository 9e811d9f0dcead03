//! Scoped resource helpers: guaranteed-close wrappers around descriptors
//! and the fd-to-stream hand-off.
//!
//! `std::os::fd::OwnedFd` already is the "guaranteed-close" wrapper we need,
//! so this module is thin: it only wraps the unsafe raw-fd constructors that
//! `nix` hands back and implements a bidirectional fd/stream hand-off —
//! consuming an `OwnedFd` and handing out a `File` transfers ownership;
//! there is no longer a second owner to race against.

use std::fs::File;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};

/// Take ownership of a raw fd just returned by a `nix` syscall wrapper.
///
/// # Safety
/// `raw` must be a valid, open, uniquely-owned file descriptor.
pub unsafe fn own(raw: RawFd) -> OwnedFd {
    OwnedFd::from_raw_fd(raw)
}

/// Hand a descriptor to a buffered file stream. Ownership of `fd` transfers
/// to the returned `File`; the caller must not close `fd` again.
pub fn into_file(fd: OwnedFd) -> File {
    File::from(fd)
}

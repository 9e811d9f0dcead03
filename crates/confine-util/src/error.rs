//! The error object shared by every confinement-runtime crate.
//!
//! Each error carries a `domain` and a `kind`, the way
//! `libcgroups::common::WrappedIoError` tags an I/O failure with the path
//! that caused it. Unlike the forwarding-pointer protocol of the C sources,
//! propagation here is the ordinary `Result`/`?` chain; the "outgoing error
//! pointer" collapses into whatever the caller does with the `Result`.

use std::fmt;
use std::path::PathBuf;

/// The error domain, used by callers that need to recognize a specific
/// recoverable condition (e.g. `discard --all` skipping invalid names).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Snap,
    CgroupV1,
    ProgArgs,
    Confine,
    Errno,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Domain::Snap => "snap",
            Domain::CgroupV1 => "cgroup-v1",
            Domain::ProgArgs => "prog-args",
            Domain::Confine => "confine",
            Domain::Errno => "errno",
        };
        f.write_str(s)
    }
}

/// The specific kind of failure within a domain. `Kind::Errno` carries the
/// raw `errno` value for the `errno` domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    InvalidName,
    NoCgroup,
    NoDevices,
    Usage,
    Bug,
    Errno(i32),
}

#[derive(Debug, thiserror::Error)]
#[error("{domain}: {message}")]
pub struct ConfineError {
    pub domain: Domain,
    pub kind: Kind,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ConfineError {
    pub fn new(domain: Domain, kind: Kind, message: impl Into<String>) -> Self {
        ConfineError {
            domain,
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        domain: Domain,
        kind: Kind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConfineError {
            domain,
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn invalid_name(name: &str) -> Self {
        ConfineError::new(
            Domain::Snap,
            Kind::InvalidName,
            format!("invalid snap name {name:?}"),
        )
    }

    pub fn no_cgroup(path: &PathBuf) -> Self {
        ConfineError::new(
            Domain::CgroupV1,
            Kind::NoCgroup,
            format!("cannot open {}", path.display()),
        )
    }

    pub fn no_devices(path: &PathBuf) -> Self {
        ConfineError::new(
            Domain::CgroupV1,
            Kind::NoDevices,
            format!("cannot open {}", path.display()),
        )
    }

    pub fn usage(message: impl Into<String>) -> Self {
        ConfineError::new(Domain::ProgArgs, Kind::Usage, message)
    }

    pub fn bug(message: impl Into<String>) -> Self {
        ConfineError::new(Domain::Confine, Kind::Bug, message)
    }

    pub fn errno(op: impl Into<String>, err: nix::Error) -> Self {
        ConfineError::with_source(
            Domain::Errno,
            Kind::Errno(err as i32),
            op.into(),
            std::io::Error::from(err),
        )
    }

    pub fn io(op: impl Into<String>, path: &std::path::Path, err: std::io::Error) -> Self {
        let message = format!("{} {}", op.into(), path.display());
        ConfineError::with_source(Domain::Errno, Kind::Errno(err.raw_os_error().unwrap_or(0)), message, err)
    }

    pub fn is(&self, domain: Domain, kind: Kind) -> bool {
        self.domain == domain && self.kind == kind
    }
}

/// Print `cannot <verb> <object> (<reason>)` to stderr and exit non-zero, as
/// every user-visible failure in the original tools does. `message` is
/// already the "cannot <verb> <object>" half; `source`, when present, is
/// the actual OS/syscall reason `Display` never surfaces on its own.
pub fn die(err: &ConfineError) -> ! {
    match &err.source {
        Some(source) => eprintln!("{} ({source})", err.message),
        None => eprintln!("{}", err.message),
    }
    std::process::exit(1);
}

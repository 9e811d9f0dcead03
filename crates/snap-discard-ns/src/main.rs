//! Discards preserved mount namespaces, one at a time or in bulk.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use confine_ns::NamespaceManager;
use confine_util::error::{ConfineError, Domain, Kind};

/// Discard preserved mount namespaces for one identifier, or every one of
/// them with `--all`.
#[derive(Parser, Debug)]
#[command(name = "snap-discard-ns")]
struct Args {
    /// "--all" to discard every namespace, or a single identifier.
    target: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let manager = match setup() {
        Ok(manager) => manager,
        Err(err) => {
            eprintln!("{err:?}");
            return ExitCode::FAILURE;
        }
    };

    let result = if args.target == "--all" {
        discard_all(&manager)
    } else {
        manager.discard(&args.target)
    };

    let _ = manager.unlock_all();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => confine_util::error::die(&err),
    }
}

/// Open the control directory and take the master lock, with each step
/// attributed in the error chain so a setup failure says which part of the
/// bootstrap it was.
fn setup() -> anyhow::Result<NamespaceManager> {
    let manager = NamespaceManager::new().context("cannot initialize namespace manager")?;
    manager.lock_all().context("cannot lock namespace manager")?;
    Ok(manager)
}

/// Discard every namespace, logging and skipping over malformed names
/// instead of aborting the whole batch.
fn discard_all(manager: &NamespaceManager) -> Result<(), ConfineError> {
    let names = manager.enumerate()?;
    for name in names {
        if let Err(err) = manager.discard(&name) {
            if err.is(Domain::Snap, Kind::InvalidName) {
                eprintln!("(ignored) {err}");
                continue;
            }
            return Err(err);
        }
    }
    Ok(())
}

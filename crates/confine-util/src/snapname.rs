//! Identifier and security-tag validation.
//!
//! Both `confine-ns::discard` and `confine-devicetag` need to reject
//! malformed names before touching the filesystem, so the grammar lives
//! here as a shared, real implementation rather than being duplicated or
//! stubbed out. Matches `sc_snap_name_validate` / `verify_security_tag`'s
//! grammar exactly.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ConfineError;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z0-9]+-?)*[a-z](-?[a-z0-9])*$").expect("identifier regex is valid"));

static SECURITY_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^snap\.[a-z](-?[a-z0-9])*\.([a-zA-Z0-9](-?[a-zA-Z0-9])*|hook\.[a-z](-?[a-z])*)$")
        .expect("security tag regex is valid")
});

/// Validate a bare package identifier (`snap.<identifier>`'s `<identifier>`).
pub fn validate_identifier(name: &str) -> Result<(), ConfineError> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(())
    } else {
        Err(ConfineError::invalid_name(name))
    }
}

/// Validate a full security tag (`snap.<id>.<component>`).
pub fn validate_security_tag(tag: &str) -> Result<(), ConfineError> {
    if SECURITY_TAG_RE.is_match(tag) {
        Ok(())
    } else {
        Err(ConfineError::invalid_name(tag))
    }
}

/// Derive the device-manager tag from a security tag: dots become
/// underscores, since the udev tagging machinery does not allow dots in tag
/// names. Idempotent on tags already containing no dots.
pub fn security_tag_to_device_manager_tag(security_tag: &str) -> String {
    security_tag.replace('.', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_minimal_identifier() {
        assert!(validate_identifier("a").is_ok());
    }

    #[test]
    fn accepts_hyphenated_identifier() {
        assert!(validate_identifier("hello-world").is_ok());
    }

    #[test]
    fn rejects_leading_hyphen() {
        assert!(validate_identifier("-hello").is_err());
    }

    #[test]
    fn rejects_trailing_hyphen() {
        assert!(validate_identifier("hello-").is_err());
    }

    #[test]
    fn accepts_hook_component() {
        assert!(validate_security_tag("snap.hello.hook.configure").is_ok());
    }

    #[test]
    fn accepts_app_component() {
        assert!(validate_security_tag("snap.hello.world").is_ok());
    }

    #[test]
    fn rejects_malformed_tag() {
        assert!(validate_security_tag("snap..world").is_err());
    }

    #[test]
    fn tag_to_device_manager_tag_substitutes_dots() {
        assert_eq!(
            security_tag_to_device_manager_tag("snap.hi.world"),
            "snap_hi_world"
        );
    }

    #[test]
    fn tag_to_device_manager_tag_is_idempotent_without_dots() {
        let once = security_tag_to_device_manager_tag("snap.hi.world");
        let twice = security_tag_to_device_manager_tag(&once);
        assert_eq!(once, twice);
    }
}

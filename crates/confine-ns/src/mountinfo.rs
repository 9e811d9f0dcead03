//! Minimal `/proc/self/mountinfo` parser, just enough to tell whether a
//! given path is already a distinct mount point with no propagation peers
//! (i.e. `MS_PRIVATE`).
//!
//! Format, per proc(5):
//!
//! ```text
//! 36 35 98:0 /mnt1 /mnt2 rw,noatime master:1 - ext3 /dev/root rw,errors=continue
//! (1)(2)(3)   (4)   (5)      (6)      (7)   (8) (9)   (10)         (11)
//! ```
//!
//! Fields 1-6 and 8-11 are fixed; field 7 is zero or more optional
//! propagation tags, terminated by the literal `-` separator at field 8.
//! A mount with no optional fields has no active peer group and no master,
//! which is what `MS_PRIVATE` looks like from userspace.

use std::fs;
use std::path::Path;

use confine_util::error::ConfineError;

pub struct MountEntry {
    pub mount_point: String,
    pub optional_fields: Vec<String>,
}

fn unescape(field: &str) -> String {
    field
        .replace("\\040", " ")
        .replace("\\011", "\t")
        .replace("\\012", "\n")
        .replace("\\134", "\\")
}

fn parse_line(line: &str) -> Option<MountEntry> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let dash = parts.iter().position(|&p| p == "-")?;
    if dash < 6 {
        return None;
    }
    let mount_point = unescape(parts[4]);
    let optional_fields = parts[6..dash].iter().map(|s| s.to_string()).collect();
    Some(MountEntry { mount_point, optional_fields })
}

pub fn parse(contents: &str) -> Vec<MountEntry> {
    contents.lines().filter_map(parse_line).collect()
}

fn read_self_mountinfo() -> Result<String, ConfineError> {
    fs::read_to_string("/proc/self/mountinfo")
        .map_err(|err| ConfineError::io("cannot read", Path::new("/proc/self/mountinfo"), err))
}

/// `true` if `path` is an entry in the live mount table with no optional
/// propagation fields, i.e. it is its own private mount.
pub fn is_private_mount_point(path: &str) -> Result<bool, ConfineError> {
    let contents = read_self_mountinfo()?;
    Ok(parse(&contents)
        .iter()
        .any(|entry| entry.mount_point == path && entry.optional_fields.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
36 35 98:0 / /mnt1 rw,noatime master:1 - ext3 /dev/root rw,errors=continue
37 35 98:0 / /mnt2 rw,noatime - ext3 /dev/root rw,errors=continue
38 35 98:0 / /mnt\\0403 rw,noatime - ext3 /dev/root rw,errors=continue
";

    #[test]
    fn parses_shared_and_private_entries() {
        let entries = parse(SAMPLE);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].mount_point, "/mnt1");
        assert_eq!(entries[0].optional_fields, vec!["master:1".to_string()]);
        assert_eq!(entries[1].mount_point, "/mnt2");
        assert!(entries[1].optional_fields.is_empty());
    }

    #[test]
    fn unescapes_octal_space() {
        let entries = parse(SAMPLE);
        assert_eq!(entries[2].mount_point, "/mnt 3");
    }

    #[test]
    fn private_mount_point_has_no_optional_fields() {
        let entries = parse(SAMPLE);
        let is_private = entries
            .iter()
            .any(|e| e.mount_point == "/mnt2" && e.optional_fields.is_empty());
        assert!(is_private);
        let is_private_shared = entries
            .iter()
            .any(|e| e.mount_point == "/mnt1" && e.optional_fields.is_empty());
        assert!(!is_private_shared);
    }
}

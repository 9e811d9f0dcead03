//! Fixed filesystem paths the namespace manager and group operate on.

pub const CONTROL_DIR: &str = "/run/snapd/ns";
pub const MASTER_LOCK_NAME: &str = ".lock";

pub fn lock_file_name(identifier: &str) -> String {
    format!("{identifier}.lock")
}

pub fn mnt_file_name(identifier: &str) -> String {
    format!("{identifier}.mnt")
}

pub fn identifier_from_mnt_file_name(file_name: &str) -> Option<&str> {
    file_name.strip_suffix(".mnt")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnt_file_name_round_trips_through_identifier_from_mnt_file_name() {
        let file_name = mnt_file_name("hello-world");
        assert_eq!(identifier_from_mnt_file_name(&file_name), Some("hello-world"));
    }

    #[test]
    fn identifier_from_mnt_file_name_rejects_other_extensions() {
        assert_eq!(identifier_from_mnt_file_name("hello-world.lock"), None);
    }
}

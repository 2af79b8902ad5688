use std::fmt;
use std::process::Command;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: &'static str,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

fn command_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Check that the `lxc` client is installed. An empty list means ready.
pub fn check_lxc_prereqs(binary: &str) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();

    if !command_exists(binary) {
        missing.push(MissingPrereq {
            name: "lxc",
            purpose: "LXD/Incus client used to manage containers",
            install_hint: "snap install lxd && lxd init --auto",
        });
    }

    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nlxdev drives containers through the lxc client.");
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_prereq_display() {
        let m = MissingPrereq {
            name: "lxc",
            purpose: "container management",
            install_hint: "snap install lxd",
        };
        let s = format!("{m}");
        assert!(s.contains("lxc"));
        assert!(s.contains("container management"));
        assert!(s.contains("snap install lxd"));
    }

    #[test]
    fn nonexistent_binary_is_reported() {
        let missing = check_lxc_prereqs("lxdev-definitely-not-a-binary");
        assert_eq!(missing.len(), 1);
        assert!(format_missing(&missing).contains("missing prerequisites:"));
    }
}

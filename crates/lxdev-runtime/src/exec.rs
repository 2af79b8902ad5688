//! Argument vectors handed to the runtime client for interactive sessions.
//!
//! These are passed to [`RuntimeBackend::replace_process`](crate::RuntimeBackend::replace_process),
//! which replaces the current process image; nothing runs after it succeeds.

/// `exec <name> -- <command...>`
pub fn exec_args(name: &str, command: &[String]) -> Vec<String> {
    let mut args = vec!["exec".to_owned(), name.to_owned(), "--".to_owned()];
    args.extend(command.iter().cloned());
    args
}

/// Login shell, switching to `user` unless it is root or absent.
pub fn shell_args(name: &str, user: Option<&str>) -> Vec<String> {
    let command: Vec<String> = match user {
        Some(u) if !u.is_empty() && u != "root" => {
            vec!["su".to_owned(), "-l".to_owned(), u.to_owned()]
        }
        _ => vec!["bash".to_owned(), "-l".to_owned()],
    };
    exec_args(name, &command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_prefixes_separator() {
        let args = exec_args("demo-web", &["ls".to_owned(), "-la".to_owned()]);
        assert_eq!(args, ["exec", "demo-web", "--", "ls", "-la"]);
    }

    #[test]
    fn shell_switches_to_user() {
        assert_eq!(
            shell_args("demo-web", Some("alice")),
            ["exec", "demo-web", "--", "su", "-l", "alice"]
        );
    }

    #[test]
    fn shell_as_root_or_default() {
        let expected = ["exec", "demo-web", "--", "bash", "-l"];
        assert_eq!(shell_args("demo-web", Some("root")), expected);
        assert_eq!(shell_args("demo-web", None), expected);
        assert_eq!(shell_args("demo-web", Some("")), expected);
    }
}

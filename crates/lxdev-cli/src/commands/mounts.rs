use super::{colorize_status, json_pretty, CliError, EXIT_SUCCESS};
use lxdev_core::Engine;

pub fn run(engine: &Engine, container: &str, sync: bool, json: bool) -> Result<u8, CliError> {
    let report = if sync {
        Some(engine.sync_mounts(container)?)
    } else {
        None
    };
    let mounts = engine.list_mounts(container)?;

    if json {
        let payload = serde_json::json!({
            "container": container,
            "sync": report,
            "mounts": mounts,
        });
        println!("{}", json_pretty(&payload)?);
        return Ok(EXIT_SUCCESS);
    }

    if let Some(report) = &report {
        if report.is_empty() {
            println!("mounts already in sync");
        }
        for name in &report.adopted {
            println!("adopted untracked mount '{name}'");
        }
        for name in &report.readded {
            println!("re-added missing mount '{name}'");
        }
        for name in &report.skipped {
            println!("skipped untracked mount '{name}' (no source or path)");
        }
        println!();
    }

    if mounts.is_empty() {
        println!("no mounts on {container}");
    } else {
        println!("{:<20} {:<32} {:<24} {:<5} STATUS", "NAME", "SOURCE", "PATH", "MODE");
        for m in &mounts {
            println!(
                "{:<20} {:<32} {:<24} {:<5} {}",
                m.name,
                m.source,
                m.path,
                m.mode,
                colorize_status(&m.status.to_string())
            );
        }
    }
    Ok(EXIT_SUCCESS)
}

use super::{json_pretty, with_spinner, CliError, EXIT_SUCCESS};
use lxdev_core::Engine;

pub fn run(engine: &Engine, container: &str, verbose: bool, json: bool) -> Result<u8, CliError> {
    if verbose && !json {
        for entry in engine.sync_entries(container)? {
            println!("  {} -> {}", entry.source, entry.dest);
        }
    }
    let copied = with_spinner(
        json,
        &format!("syncing files into {container}..."),
        &format!("files synced into {container}"),
        "sync failed",
        || engine.sync_files(container),
    )?;

    if json {
        let payload = serde_json::json!({
            "container": container,
            "copied": copied,
        });
        println!("{}", json_pretty(&payload)?);
    } else if copied == 0 {
        println!("no sync entries for {container}");
    }
    Ok(EXIT_SUCCESS)
}

pub fn add(engine: &Engine, container: &str, source: &str, dest: &str) -> Result<u8, CliError> {
    engine.sync_entry_add(container, source, dest)?;
    println!("sync entry {source} -> {dest} saved for {container}");
    Ok(EXIT_SUCCESS)
}

pub fn remove(engine: &Engine, container: &str, source: &str) -> Result<u8, CliError> {
    engine.sync_entry_remove(container, source)?;
    println!("sync entry {source} removed from {container}");
    Ok(EXIT_SUCCESS)
}

pub fn list(engine: &Engine, container: &str, json: bool) -> Result<u8, CliError> {
    let entries = engine.sync_entries(container)?;
    if json {
        println!("{}", json_pretty(&entries)?);
    } else if entries.is_empty() {
        println!("no sync entries for {container}");
    } else {
        println!("{:<32} DEST", "SOURCE");
        for e in &entries {
            println!("{:<32} {}", e.source, e.dest);
        }
    }
    Ok(EXIT_SUCCESS)
}

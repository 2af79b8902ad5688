use super::{json_pretty, with_spinner, CliError, EXIT_SUCCESS};
use lxdev_core::Engine;

pub fn create(
    engine: &Engine,
    container: &str,
    name: &str,
    description: &str,
) -> Result<u8, CliError> {
    with_spinner(
        false,
        &format!("snapshotting {container}..."),
        &format!("snapshot {name} created for {container}"),
        "snapshot failed",
        || engine.snapshot_create(container, name, description),
    )?;
    Ok(EXIT_SUCCESS)
}

pub fn list(engine: &Engine, container: &str, json: bool) -> Result<u8, CliError> {
    let snapshots = engine.snapshot_list(container)?;
    if json {
        let payload = serde_json::json!({
            "container": container,
            "snapshots": snapshots,
        });
        println!("{}", json_pretty(&payload)?);
    } else if snapshots.is_empty() {
        println!("no snapshots for {container}");
    } else {
        println!("{:<24} {:<22} DESCRIPTION", "NAME", "CREATED");
        for s in &snapshots {
            let created = s
                .created_at
                .map_or_else(|| "-".to_owned(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
            println!("{:<24} {:<22} {}", s.name, created, s.description);
        }
    }
    Ok(EXIT_SUCCESS)
}

pub fn delete(engine: &Engine, container: &str, name: &str) -> Result<u8, CliError> {
    engine.snapshot_delete(container, name)?;
    println!("deleted snapshot {name} of {container}");
    Ok(EXIT_SUCCESS)
}

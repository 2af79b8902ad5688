use super::{confirm, is_interactive, json_pretty, CliError, EXIT_INVALID_INPUT, EXIT_SUCCESS};
use lxdev_core::{CoreError, Engine, MountOptions};

pub fn mount(
    engine: &Engine,
    container: &str,
    source: &str,
    path: &str,
    opts: MountOptions,
    json: bool,
) -> Result<u8, CliError> {
    let name = match engine.mount(container, source, path, &opts) {
        Err(CoreError::RiskyPath(warning)) if is_interactive() => {
            if !confirm(&format!("{warning}; mount anyway?"))? {
                return Err(CliError::new(EXIT_INVALID_INPUT, "mount cancelled"));
            }
            let approved = MountOptions {
                allow_risky_path: true,
                ..opts
            };
            engine.mount(container, source, path, &approved)?
        }
        other => other?,
    };

    if json {
        let payload = serde_json::json!({
            "container": container,
            "name": name,
            "source": source,
            "path": path,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("mounted {source} at {container}:{path} as '{name}'");
    }
    Ok(EXIT_SUCCESS)
}

pub fn unmount(
    engine: &Engine,
    container: &str,
    name_or_path: &str,
    json: bool,
) -> Result<u8, CliError> {
    let name = engine.unmount(container, name_or_path)?;
    if json {
        let payload = serde_json::json!({
            "container": container,
            "name": name,
            "status": "unmounted",
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("unmounted '{name}' from {container}");
    }
    Ok(EXIT_SUCCESS)
}

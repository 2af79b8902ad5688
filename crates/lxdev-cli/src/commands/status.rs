use super::{colorize_status, json_pretty, CliError, EXIT_SUCCESS};
use lxdev_core::Engine;

pub fn run(engine: &Engine, name: &str, json: bool) -> Result<u8, CliError> {
    let status = engine.status(name)?.to_string();
    let ip = engine.ip(name)?;
    if json {
        let payload = serde_json::json!({
            "name": name,
            "status": status,
            "ip": ip,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("{name}: {}", colorize_status(&status));
        if let Some(ip) = ip {
            println!("ip: {ip}");
        }
    }
    Ok(EXIT_SUCCESS)
}

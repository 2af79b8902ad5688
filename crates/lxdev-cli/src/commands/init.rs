use super::{json_pretty, CliError, EXIT_SUCCESS};
use lxdev_core::{Engine, InitOptions};
use lxdev_schema::User;
use lxdev_store::DOCUMENT_FILE;

pub fn run(
    engine: &Engine,
    name: Option<String>,
    ports: Vec<u32>,
    user: Option<&str>,
    password: Option<&str>,
    json: bool,
) -> Result<u8, CliError> {
    let user = (user.is_some() || password.is_some())
        .then(|| User::new(user.unwrap_or_default(), password.unwrap_or_default()));
    let project = engine.init(&InitOptions { name, ports, user })?;

    if json {
        let payload = serde_json::json!({
            "status": "initialized",
            "project": project.project,
            "path": engine.store().layout().document_path(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("initialized project '{}' ({DOCUMENT_FILE})", project.project);
    }
    Ok(EXIT_SUCCESS)
}

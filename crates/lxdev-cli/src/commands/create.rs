use super::{json_pretty, with_spinner, CliError, EXIT_SUCCESS};
use lxdev_core::{CreateOptions, Engine};

pub fn run(
    engine: &Engine,
    name: &str,
    image: &str,
    opts: &CreateOptions,
    json: bool,
) -> Result<u8, CliError> {
    with_spinner(
        json,
        &format!("creating container {name} from {image}..."),
        &format!("container {name} created"),
        "create failed",
        || engine.create(name, image, opts),
    )?;

    if json {
        let payload = serde_json::json!({
            "name": name,
            "image": image,
            "status": "created",
        });
        println!("{}", json_pretty(&payload)?);
    }
    Ok(EXIT_SUCCESS)
}

use super::{with_spinner, CliError, EXIT_SUCCESS};
use lxdev_core::{CloneOptions, Engine};

pub fn run(
    engine: &Engine,
    source: &str,
    name: &str,
    opts: &CloneOptions,
    json: bool,
) -> Result<u8, CliError> {
    let from = match &opts.from_snapshot {
        Some(snapshot) => format!("{source}/{snapshot}"),
        None => source.to_owned(),
    };
    with_spinner(
        json,
        &format!("cloning {from} into {name}..."),
        &format!("container {name} cloned from {from}"),
        "clone failed",
        || engine.clone_container(source, name, opts),
    )?;
    Ok(EXIT_SUCCESS)
}

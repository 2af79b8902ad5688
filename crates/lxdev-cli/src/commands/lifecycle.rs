//! Start, stop, remove and reset.

use super::{with_spinner, CliError, EXIT_SUCCESS};
use lxdev_core::Engine;
use lxdev_schema::INITIAL_SNAPSHOT;

pub fn up(engine: &Engine, name: &str) -> Result<u8, CliError> {
    engine.start(name)?;
    println!("started container {name}");
    Ok(EXIT_SUCCESS)
}

pub fn down(engine: &Engine, name: &str) -> Result<u8, CliError> {
    engine.stop(name)?;
    println!("stopped container {name}");
    Ok(EXIT_SUCCESS)
}

pub fn remove(engine: &Engine, name: &str) -> Result<u8, CliError> {
    engine.remove(name)?;
    println!("removed container {name}");
    Ok(EXIT_SUCCESS)
}

pub fn reset(
    engine: &Engine,
    name: &str,
    snapshot: Option<&str>,
    json: bool,
) -> Result<u8, CliError> {
    let target = snapshot.unwrap_or(INITIAL_SNAPSHOT);
    with_spinner(
        json,
        &format!("resetting {name} to {target}..."),
        &format!("container {name} reset to {target}"),
        "reset failed",
        || engine.reset(name, snapshot),
    )?;
    Ok(EXIT_SUCCESS)
}

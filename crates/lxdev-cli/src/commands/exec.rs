//! Interactive sessions. With the lxc backend these calls replace the
//! process and only return on failure.

use super::{CliError, EXIT_SUCCESS};
use lxdev_core::Engine;

pub fn exec(engine: &Engine, name: &str, command: &[String]) -> Result<u8, CliError> {
    engine.exec(name, command)?;
    Ok(EXIT_SUCCESS)
}

pub fn shell(engine: &Engine, name: &str, user: Option<&str>) -> Result<u8, CliError> {
    engine.shell(name, user)?;
    Ok(EXIT_SUCCESS)
}

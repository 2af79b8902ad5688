use super::{CliError, EXIT_SUCCESS};
use lxdev_core::Engine;

pub fn run(engine: &Engine, force: bool) -> Result<u8, CliError> {
    let project = engine.load()?;
    engine.delete_project(force)?;
    println!("deleted project '{}'", project.project);
    Ok(EXIT_SUCCESS)
}

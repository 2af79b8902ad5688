use crate::engine::Engine;
use crate::CoreError;
use lxdev_schema::{validate_ports, validate_project_name, Defaults, Project, User};
use lxdev_store::StoreError;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitOptions {
    /// Defaults to the project directory's base name.
    pub name: Option<String>,
    pub ports: Vec<u32>,
    pub user: Option<User>,
}

fn name_from_dir(dir: &Path) -> Result<String, CoreError> {
    let resolved = fs::canonicalize(dir).or_else(|_| std::path::absolute(dir))?;
    resolved
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned)
        .ok_or_else(|| {
            CoreError::InvalidInput(format!(
                "cannot derive a project name from {}",
                resolved.display()
            ))
        })
}

impl Engine {
    /// Write a fresh `containers.yaml`. Fails if the directory already holds
    /// one, valid or not.
    pub fn init(&self, opts: &InitOptions) -> Result<Project, CoreError> {
        match self.store().load() {
            Ok(existing) => {
                return Err(CoreError::AlreadyExists(format!(
                    "project already exists: {}",
                    existing.project
                )))
            }
            Err(StoreError::NoProject(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let name = match opts.name.as_deref().filter(|n| !n.is_empty()) {
            Some(n) => n.to_owned(),
            None => name_from_dir(self.dir())?,
        };
        validate_project_name(&name)?;
        validate_ports(&opts.ports).map_err(|e| e.context("invalid default ports"))?;

        let project = Project {
            project: name,
            defaults: Defaults {
                ports: opts.ports.clone(),
                user: opts.user.clone().unwrap_or_default(),
            },
            ..Project::default()
        };
        info!("init project {} in {}", project.project, self.dir().display());
        self.store().create(&project)?;
        Ok(project)
    }

    /// Delete every declared container from the runtime, then the document.
    ///
    /// Without `force` the first runtime failure aborts and the document is
    /// kept. With `force` failures are collected, the document is removed
    /// anyway, and the failures are reported together.
    pub fn delete_project(&self, force: bool) -> Result<(), CoreError> {
        let (project, _lock) = self.load_locked()?;
        info!("delete project {}", project.project);

        let mut failures = Vec::new();
        for name in project.containers.keys() {
            let runtime_name = project.runtime_name(name);
            if !self.backend().exists(&runtime_name)? {
                continue;
            }
            if let Err(e) = self.backend().delete(&runtime_name) {
                if !force {
                    return Err(CoreError::Partial {
                        summary: format!("failed to delete container {name}"),
                        failures: vec![e.to_string()],
                    });
                }
                warn!("failed to delete {runtime_name}: {e}");
                failures.push(format!("{name}: {e}"));
            }
        }

        self.store().remove()?;
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Partial {
                summary: "some containers failed to delete".to_owned(),
                failures,
            })
        }
    }
}

use crate::backend::{ContainerInfo, ContainerStatus, DeviceInfo, ImageInfo, RuntimeBackend};
use crate::RuntimeError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const LXC_BIN_ENV: &str = "LXDEV_LXC_BIN";
const DEFAULT_LXC_BIN: &str = "lxc";
const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct LxcInstance {
    name: String,
    status: String,
    #[serde(default)]
    state: Option<LxcState>,
    #[serde(default)]
    snapshots: Option<Vec<LxcSnapshot>>,
}

#[derive(Debug, Deserialize)]
struct LxcState {
    #[serde(default)]
    network: Option<BTreeMap<String, LxcNetwork>>,
}

#[derive(Debug, Deserialize)]
struct LxcNetwork {
    #[serde(default)]
    addresses: Vec<LxcAddress>,
}

#[derive(Debug, Deserialize)]
struct LxcAddress {
    family: String,
    address: String,
    #[serde(default)]
    scope: String,
}

#[derive(Debug, Deserialize)]
struct LxcSnapshot {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LxcImage {
    fingerprint: String,
    #[serde(default)]
    aliases: Vec<LxcAlias>,
    #[serde(default)]
    properties: BTreeMap<String, String>,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct LxcAlias {
    name: String,
}

impl LxcInstance {
    fn ipv4(&self) -> Option<String> {
        let network = self.state.as_ref()?.network.as_ref()?;
        network
            .iter()
            .filter(|(iface, _)| iface.as_str() != "lo")
            .flat_map(|(_, net)| net.addresses.iter())
            .find(|a| a.family == "inet" && a.scope == "global")
            .map(|a| a.address.clone())
    }

    fn snapshot_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .snapshots
            .iter()
            .flatten()
            .map(|s| {
                s.name
                    .rsplit_once('/')
                    .map_or(s.name.as_str(), |(_, n)| n)
                    .to_owned()
            })
            .collect();
        names.sort();
        names
    }

    fn info(&self) -> ContainerInfo {
        ContainerInfo {
            name: self.name.clone(),
            status: ContainerStatus::parse(&self.status),
            ipv4: self.ipv4(),
        }
    }
}

fn parse_instances(json: &str) -> Result<Vec<LxcInstance>, RuntimeError> {
    serde_json::from_str(json).map_err(|e| RuntimeError::Parse(format!("lxc list: {e}")))
}

fn parse_images(json: &str) -> Result<Vec<ImageInfo>, RuntimeError> {
    let images: Vec<LxcImage> = serde_json::from_str(json)
        .map_err(|e| RuntimeError::Parse(format!("lxc image list: {e}")))?;
    Ok(images
        .into_iter()
        .map(|img| ImageInfo {
            fingerprint: img.fingerprint,
            aliases: img.aliases.into_iter().map(|a| a.name).collect(),
            description: img.properties.get("description").cloned().unwrap_or_default(),
            size: img.size,
            created_at: img.created_at,
        })
        .collect())
}

fn scalar_to_string(value: serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// `lxc config device show` prints `name: {type: .., key: value}` as YAML.
fn parse_devices(yaml: &str) -> Result<Vec<DeviceInfo>, RuntimeError> {
    if yaml.trim().is_empty() || yaml.trim() == "{}" {
        return Ok(Vec::new());
    }
    let raw: BTreeMap<String, BTreeMap<String, serde_yaml::Value>> = serde_yaml::from_str(yaml)
        .map_err(|e| RuntimeError::Parse(format!("lxc config device show: {e}")))?;
    Ok(raw
        .into_iter()
        .map(|(name, values)| {
            let mut config: BTreeMap<String, String> = values
                .into_iter()
                .map(|(k, v)| (k, scalar_to_string(v)))
                .collect();
            let kind = config.remove("type").unwrap_or_default();
            DeviceInfo { name, kind, config }
        })
        .collect())
}

/// Drives containers through the `lxc` client binary.
#[derive(Debug, Clone)]
pub struct LxcBackend {
    binary: String,
}

impl Default for LxcBackend {
    fn default() -> Self {
        Self {
            binary: DEFAULT_LXC_BIN.to_owned(),
        }
    }
}

impl LxcBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Honors `LXDEV_LXC_BIN`.
    pub fn from_env() -> Self {
        match std::env::var(LXC_BIN_ENV) {
            Ok(bin) if !bin.is_empty() => Self::with_binary(bin),
            _ => Self::new(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn output(&self, args: &[&str]) -> Result<Output, RuntimeError> {
        debug!("{} {}", self.binary, args.join(" "));
        Ok(Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()?)
    }

    /// Run and return stdout; non-zero exit becomes `CommandFailed`.
    fn run(&self, op: &str, target: &str, args: &[&str]) -> Result<String, RuntimeError> {
        let output = self.output(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RuntimeError::command_failed(op, target, stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn succeeds(&self, args: &[&str]) -> Result<bool, RuntimeError> {
        Ok(self.output(args)?.status.success())
    }

    fn exec_checked(&self, name: &str, op: &str, command: &[&str]) -> Result<(), RuntimeError> {
        let mut args = vec!["exec", name, "--"];
        args.extend_from_slice(command);
        self.run(op, name, &args).map(|_| ())
    }

    fn instance(&self, name: &str) -> Result<Option<LxcInstance>, RuntimeError> {
        let json = self.run("list", name, &["list", name, "--format", "json"])?;
        Ok(parse_instances(&json)?
            .into_iter()
            .find(|i| i.name == name))
    }

    fn require_instance(&self, name: &str) -> Result<LxcInstance, RuntimeError> {
        self.instance(name)?
            .ok_or_else(|| RuntimeError::NotFound(name.to_owned()))
    }
}

impl RuntimeBackend for LxcBackend {
    fn name(&self) -> &'static str {
        "lxc"
    }

    fn available(&self) -> bool {
        Command::new(&self.binary)
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }

    fn exists(&self, name: &str) -> Result<bool, RuntimeError> {
        self.succeeds(&["info", name])
    }

    fn status(&self, name: &str) -> Result<ContainerStatus, RuntimeError> {
        Ok(ContainerStatus::parse(&self.require_instance(name)?.status))
    }

    fn ip(&self, name: &str) -> Result<Option<String>, RuntimeError> {
        Ok(self.require_instance(name)?.ipv4())
    }

    fn launch(&self, name: &str, image: &str) -> Result<(), RuntimeError> {
        self.run("launch", name, &["launch", image, name])
            .map(|_| ())
    }

    fn enable_nesting(&self, name: &str) -> Result<(), RuntimeError> {
        self.run(
            "enable nesting",
            name,
            &["config", "set", name, "security.nesting", "true"],
        )
        .map(|_| ())
    }

    fn wait_ready(&self, name: &str, timeout: Duration) -> Result<(), RuntimeError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(instance) = self.instance(name)? {
                if ContainerStatus::parse(&instance.status).is_running()
                    && instance.ipv4().is_some()
                {
                    debug!("container {name} is ready");
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(RuntimeError::Timeout(name.to_owned()));
            }
            thread::sleep(READY_POLL_INTERVAL);
        }
    }

    fn setup_user(&self, name: &str, user: &str, password: &str) -> Result<(), RuntimeError> {
        if !self.succeeds(&["exec", name, "--", "id", "-u", user])? {
            self.exec_checked(
                name,
                "create user",
                &["useradd", "-m", "-s", "/bin/bash", user],
            )?;
        }
        if !self.succeeds(&["exec", name, "--", "usermod", "-aG", "sudo", user])? {
            warn!("could not add {user} to sudo group in {name}");
        }

        let mut child = Command::new(&self.binary)
            .args(["exec", name, "--", "chpasswd"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            writeln!(stdin, "{user}:{password}")?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(RuntimeError::command_failed(
                "set password",
                name,
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }
        Ok(())
    }

    fn enable_ssh(&self, name: &str) -> Result<(), RuntimeError> {
        self.exec_checked(
            name,
            "enable ssh",
            &[
                "sh",
                "-c",
                "systemctl enable --now ssh 2>/dev/null || systemctl enable --now sshd",
            ],
        )
    }

    fn start(&self, name: &str) -> Result<(), RuntimeError> {
        self.run("start", name, &["start", name]).map(|_| ())
    }

    fn stop(&self, name: &str) -> Result<(), RuntimeError> {
        self.run("stop", name, &["stop", name]).map(|_| ())
    }

    fn delete(&self, name: &str) -> Result<(), RuntimeError> {
        self.run("delete", name, &["delete", "--force", name])
            .map(|_| ())
    }

    fn snapshot(&self, name: &str, snapshot: &str) -> Result<(), RuntimeError> {
        self.run("snapshot", name, &["snapshot", name, snapshot])
            .map(|_| ())
    }

    fn restore(&self, name: &str, snapshot: &str) -> Result<(), RuntimeError> {
        self.run("restore", name, &["restore", name, snapshot])
            .map(|_| ())
    }

    fn copy(&self, source: &str, dest: &str) -> Result<(), RuntimeError> {
        self.run("copy", source, &["copy", source, dest]).map(|_| ())
    }

    fn copy_snapshot(&self, source: &str, snapshot: &str, dest: &str) -> Result<(), RuntimeError> {
        let from = format!("{source}/{snapshot}");
        self.run("copy", &from, &["copy", &from, dest]).map(|_| ())
    }

    fn device_add(
        &self,
        name: &str,
        device: &str,
        kind: &str,
        config: &BTreeMap<String, String>,
    ) -> Result<(), RuntimeError> {
        let pairs: Vec<String> = config.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let mut args = vec!["config", "device", "add", name, device, kind];
        args.extend(pairs.iter().map(String::as_str));
        self.run("device add", name, &args).map(|_| ())
    }

    fn device_remove(&self, name: &str, device: &str) -> Result<(), RuntimeError> {
        self.run(
            "device remove",
            name,
            &["config", "device", "remove", name, device],
        )
        .map(|_| ())
    }

    fn device_list(&self, name: &str) -> Result<Vec<DeviceInfo>, RuntimeError> {
        let yaml = self.run("device list", name, &["config", "device", "show", name])?;
        parse_devices(&yaml)
    }

    fn is_privileged(&self, name: &str) -> Result<bool, RuntimeError> {
        let value = self.run(
            "config get",
            name,
            &["config", "get", name, "security.privileged"],
        )?;
        Ok(value.trim().eq_ignore_ascii_case("true"))
    }

    fn list_all(&self) -> Result<Vec<ContainerInfo>, RuntimeError> {
        let json = self.run("list", "all", &["list", "--format", "json"])?;
        Ok(parse_instances(&json)?
            .iter()
            .map(LxcInstance::info)
            .collect())
    }

    fn list_snapshots(&self, name: &str) -> Result<Vec<String>, RuntimeError> {
        Ok(self.require_instance(name)?.snapshot_names())
    }

    fn delete_snapshot(&self, name: &str, snapshot: &str) -> Result<(), RuntimeError> {
        let target = format!("{name}/{snapshot}");
        self.run("delete snapshot", &target, &["delete", &target])
            .map(|_| ())
    }

    fn list_images(&self, all: bool) -> Result<Vec<ImageInfo>, RuntimeError> {
        let json = self.run("image list", "local", &["image", "list", "--format", "json"])?;
        let mut images = parse_images(&json)?;
        if !all {
            images.retain(|img| !img.aliases.is_empty());
        }
        Ok(images)
    }

    fn image_exists(&self, alias: &str) -> Result<bool, RuntimeError> {
        self.succeeds(&["image", "info", alias])
    }

    fn delete_image(&self, alias: &str) -> Result<(), RuntimeError> {
        self.run("image delete", alias, &["image", "delete", alias])
            .map(|_| ())
    }

    fn rename_image(&self, old: &str, new: &str) -> Result<(), RuntimeError> {
        self.run("image rename", old, &["image", "alias", "rename", old, new])
            .map(|_| ())
    }

    fn publish_snapshot(
        &self,
        name: &str,
        snapshot: &str,
        alias: &str,
        progress: &mut dyn FnMut(&str),
    ) -> Result<(), RuntimeError> {
        let source = format!("{name}/{snapshot}");
        debug!("{} publish {source} --alias {alias}", self.binary);
        let mut child = Command::new(&self.binary)
            .args(["publish", &source, "--alias", alias])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines() {
                let line = line?;
                let line = line.trim();
                if !line.is_empty() {
                    progress(line);
                }
            }
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(RuntimeError::command_failed(
                "publish",
                &source,
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }
        Ok(())
    }

    fn dir_exists(&self, name: &str, path: &str) -> Result<bool, RuntimeError> {
        self.succeeds(&["exec", name, "--", "test", "-d", path])
    }

    fn push_file(
        &self,
        name: &str,
        local: &Path,
        remote: &str,
        recursive: bool,
    ) -> Result<(), RuntimeError> {
        let local = local.to_string_lossy();
        let target = format!("{name}{remote}");
        let mut args = vec!["file", "push", "-p"];
        if recursive {
            args.push("-r");
        }
        args.push(&local);
        args.push(&target);
        self.run("file push", name, &args).map(|_| ())
    }

    fn exec(&self, name: &str, command: &[String]) -> Result<Output, RuntimeError> {
        let args = crate::exec::exec_args(name, command);
        debug!("{} {}", self.binary, args.join(" "));
        Ok(Command::new(&self.binary).args(&args).output()?)
    }

    fn replace_process(&self, args: &[String]) -> Result<(), RuntimeError> {
        debug!("exec {} {}", self.binary, args.join(" "));
        let err = Command::new(&self.binary).args(args).exec();
        Err(RuntimeError::ExecFailed(format!(
            "failed to exec {}: {err}",
            self.binary
        )))
    }
}

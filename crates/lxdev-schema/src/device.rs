use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// The only device type whose config is structurally validated.
pub const DISK_DEVICE: &str = "disk";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub config: DeviceConfig,
}

/// Typed view of a device's config map. Keys other than the known ones are
/// kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "is_false",
        serialize_with = "serialize_flag",
        deserialize_with = "deserialize_flag"
    )]
    pub readonly: bool,
    #[serde(
        default,
        skip_serializing_if = "is_false",
        serialize_with = "serialize_flag",
        deserialize_with = "deserialize_flag"
    )]
    pub shift: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(v: &bool) -> bool {
    !*v
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_flag<S: Serializer>(v: &bool, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(if *v { "true" } else { "false" })
}

fn deserialize_flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(d)? {
        Flag::Bool(b) => b,
        Flag::Text(s) => parse_flag(&s),
    })
}

fn parse_flag(s: &str) -> bool {
    matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

fn value_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_owned())
            .unwrap_or_default(),
    }
}

impl Device {
    pub fn disk(source: &str, path: &str, readonly: bool, shift: bool) -> Self {
        Self {
            kind: DISK_DEVICE.to_owned(),
            config: DeviceConfig {
                source: Some(source.to_owned()),
                path: Some(path.to_owned()),
                readonly,
                shift,
                extra: BTreeMap::new(),
            },
        }
    }

    pub fn is_disk(&self) -> bool {
        self.kind == DISK_DEVICE
    }

    /// Rebuild a declared device from the flat string map the runtime reports.
    pub fn from_runtime(kind: &str, config: &BTreeMap<String, String>) -> Self {
        Self {
            kind: kind.to_owned(),
            config: DeviceConfig::from_runtime_map(config),
        }
    }
}

impl DeviceConfig {
    pub fn source(&self) -> &str {
        self.source.as_deref().unwrap_or("")
    }

    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or("")
    }

    pub fn mode(&self) -> &'static str {
        if self.readonly {
            "ro"
        } else {
            "rw"
        }
    }

    /// Flatten into the `key=value` form the runtime accepts.
    pub fn to_runtime_map(&self) -> BTreeMap<String, String> {
        let mut map: BTreeMap<String, String> = self
            .extra
            .iter()
            .map(|(k, v)| (k.clone(), value_to_string(v)))
            .collect();
        if let Some(source) = &self.source {
            map.insert("source".to_owned(), source.clone());
        }
        if let Some(path) = &self.path {
            map.insert("path".to_owned(), path.clone());
        }
        if self.readonly {
            map.insert("readonly".to_owned(), "true".to_owned());
        }
        if self.shift {
            map.insert("shift".to_owned(), "true".to_owned());
        }
        map
    }

    pub fn from_runtime_map(map: &BTreeMap<String, String>) -> Self {
        let mut config = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "source" => config.source = Some(value.clone()),
                "path" => config.path = Some(value.clone()),
                "readonly" => config.readonly = parse_flag(value),
                "shift" => config.shift = parse_flag(value),
                _ => {
                    config
                        .extra
                        .insert(key.clone(), serde_yaml::Value::String(value.clone()));
                }
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_bool_and_string() {
        let yaml = "type: disk\nconfig:\n  source: /src\n  path: /ws\n  readonly: \"true\"\n  shift: true\n";
        let dev: Device = serde_yaml::from_str(yaml).unwrap();
        assert!(dev.is_disk());
        assert!(dev.config.readonly);
        assert!(dev.config.shift);
        assert!(dev.config.extra.is_empty());
    }

    #[test]
    fn false_flags_are_omitted() {
        let dev = Device::disk("/src", "/ws", false, false);
        let out = serde_yaml::to_string(&dev).unwrap();
        assert!(!out.contains("readonly"));
        assert!(!out.contains("shift"));

        let dev = Device::disk("/src", "/ws", true, false);
        let out = serde_yaml::to_string(&dev).unwrap();
        assert!(out.contains("readonly: 'true'") || out.contains("readonly: \"true\""));
    }

    #[test]
    fn unknown_keys_survive_in_extra() {
        let yaml = "type: disk\nconfig:\n  source: /src\n  path: /ws\n  propagation: rshared\n";
        let dev: Device = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            dev.config.extra.get("propagation"),
            Some(&serde_yaml::Value::String("rshared".to_owned()))
        );
        let map = dev.config.to_runtime_map();
        assert_eq!(map.get("propagation").map(String::as_str), Some("rshared"));
    }

    #[test]
    fn runtime_map_conversion() {
        let dev = Device::disk("/src", "/ws", true, true);
        let map = dev.config.to_runtime_map();
        assert_eq!(map.get("source").map(String::as_str), Some("/src"));
        assert_eq!(map.get("readonly").map(String::as_str), Some("true"));
        assert_eq!(map.get("shift").map(String::as_str), Some("true"));

        let back = Device::from_runtime(DISK_DEVICE, &map);
        assert_eq!(back, dev);
        assert_eq!(back.config.mode(), "ro");
    }

    #[test]
    fn rw_mode_without_readonly_key() {
        let mut map = BTreeMap::new();
        map.insert("source".to_owned(), "/a".to_owned());
        map.insert("path".to_owned(), "/b".to_owned());
        let dev = Device::from_runtime(DISK_DEVICE, &map);
        assert_eq!(dev.config.mode(), "rw");
    }
}

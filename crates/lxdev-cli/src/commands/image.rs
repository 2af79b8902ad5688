use super::{json_pretty, spin_fail, spin_ok, spinner, CliError, EXIT_SUCCESS};
use lxdev_core::Engine;

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

pub fn list(engine: &Engine, all: bool, json: bool) -> Result<u8, CliError> {
    let images = engine.image_list(all)?;
    if json {
        println!("{}", json_pretty(&images)?);
    } else if images.is_empty() {
        println!("no images found");
    } else {
        println!("{:<24} {:<14} {:<10} DESCRIPTION", "ALIAS", "FINGERPRINT", "SIZE");
        for img in &images {
            let alias = if img.aliases.is_empty() {
                "-".to_owned()
            } else {
                img.aliases.join(",")
            };
            let short = img.fingerprint.get(..12).unwrap_or(&img.fingerprint);
            println!(
                "{:<24} {:<14} {:<10} {}",
                alias,
                short,
                human_size(img.size),
                img.description
            );
        }
    }
    Ok(EXIT_SUCCESS)
}

pub fn delete(engine: &Engine, alias: &str) -> Result<u8, CliError> {
    engine.image_delete(alias)?;
    println!("deleted image {alias}");
    Ok(EXIT_SUCCESS)
}

pub fn rename(engine: &Engine, old: &str, new: &str) -> Result<u8, CliError> {
    engine.image_rename(old, new)?;
    println!("renamed image {old} to {new}");
    Ok(EXIT_SUCCESS)
}

pub fn create(engine: &Engine, container: &str, alias: &str, json: bool) -> Result<u8, CliError> {
    let pb = (!json).then(|| spinner(&format!("publishing {container} as {alias}...")));
    let mut progress = |line: &str| {
        if let Some(pb) = &pb {
            pb.set_message(format!("publishing {container}: {line}"));
        }
    };
    let result = engine.image_create(container, alias, &mut progress);
    if let Some(pb) = &pb {
        match &result {
            Ok(()) => spin_ok(pb, &format!("image {alias} created from {container}")),
            Err(_) => spin_fail(pb, "image creation failed"),
        }
    }
    result?;

    if json {
        let payload = serde_json::json!({
            "container": container,
            "alias": alias,
            "status": "published",
        });
        println!("{}", json_pretty(&payload)?);
    }
    Ok(EXIT_SUCCESS)
}

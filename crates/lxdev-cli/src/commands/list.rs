use super::{colorize_status, json_pretty, CliError, EXIT_SUCCESS};
use lxdev_core::Engine;

fn format_ports(ports: &[u32]) -> String {
    if ports.is_empty() {
        return "-".to_owned();
    }
    ports
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

pub fn run(engine: &Engine, json: bool) -> Result<u8, CliError> {
    let rows = engine.list()?;
    if json {
        println!("{}", json_pretty(&rows)?);
    } else if rows.is_empty() {
        println!("no containers declared");
    } else {
        println!("{:<20} {:<24} {:<10} {:<16} PORTS", "NAME", "IMAGE", "STATUS", "IP");
        for row in &rows {
            println!(
                "{:<20} {:<24} {:<10} {:<16} {}",
                row.name,
                row.image,
                colorize_status(&row.status),
                row.ip.as_deref().unwrap_or("-"),
                format_ports(&row.ports)
            );
        }
    }
    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ports_are_comma_joined() {
        assert_eq!(format_ports(&[3000, 5432]), "3000,5432");
        assert_eq!(format_ports(&[]), "-");
    }
}

//! Config command - manage configuration.

use std::fs;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;
use serde_json::Value;

use pagecraft_core::PagecraftConfig;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Initialize a new configuration file
    Init {
        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Get a configuration value
    Get {
        /// Dotted key (e.g., "thumbnails.width")
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Dotted key (e.g., "worker.reorder_policy")
        key: String,
        /// New value, parsed as JSON when possible
        value: String,
    },

    /// Show configuration file path
    Path,
}

/// `<config dir>/pagecraft/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pagecraft")
        .join("config.json")
}

pub async fn run(args: ConfigArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let path = config_path.map(PathBuf::from).unwrap_or_else(default_config_path);

    match args.command {
        ConfigCommand::Show => {
            if !path.exists() {
                println!("{} No config file found, showing defaults.", style("ℹ").blue());
            }
            println!("{}", serde_json::to_string_pretty(&read_or_default(&path)?)?);
        }
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at {}. Use --force to overwrite.",
                    path.display()
                );
            }
            write(&path, &PagecraftConfig::default())?;
            println!("{} Created configuration file at {}", style("✓").green(), path.display());
        }
        ConfigCommand::Get { key } => {
            let json = serde_json::to_value(read_or_default(&path)?)?;
            let value = lookup(&json, &key)
                .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))?;
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        ConfigCommand::Set { key, value } => {
            let value: Value =
                serde_json::from_str(&value).unwrap_or_else(|_| Value::String(value.clone()));
            let mut json = serde_json::to_value(read_or_default(&path)?)?;
            assign(&mut json, &key, value.clone())?;

            let config: PagecraftConfig = serde_json::from_value(json)
                .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e))?;
            config.validate()?;
            write(&path, &config)?;
            println!("{} Set {} = {}", style("✓").green(), key, value);
        }
        ConfigCommand::Path => {
            println!("Configuration file: {}", path.display());
            if path.exists() {
                println!("Status: {}", style("exists").green());
            } else {
                println!("Status: {}", style("not created").yellow());
                println!();
                println!("Run 'pagecraft config init' to create a configuration file.");
            }
        }
    }

    Ok(())
}

fn read_or_default(path: &std::path::Path) -> anyhow::Result<PagecraftConfig> {
    if path.exists() {
        Ok(PagecraftConfig::from_file(path)?)
    } else {
        Ok(PagecraftConfig::default())
    }
}

fn write(path: &std::path::Path, config: &PagecraftConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    config.save(path)?;
    Ok(())
}

fn lookup<'a>(json: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(json, |node, part| node.get(part))
}

/// Set a dotted key; every segment but the last must already exist.
fn assign(json: &mut Value, key: &str, value: Value) -> anyhow::Result<()> {
    let (parent, last) = match key.rsplit_once('.') {
        Some((parent, last)) => (
            parent
                .split('.')
                .try_fold(json, |node, part| node.get_mut(part))
                .ok_or_else(|| anyhow::anyhow!("Configuration path not found: {}", key))?,
            last,
        ),
        None => (json, key),
    };

    let object = parent
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("Cannot set value at non-object path"))?;
    if !object.contains_key(last) {
        anyhow::bail!("Configuration key not found: {}", key);
    }
    object.insert(last.to_string(), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_nested_key() {
        let json = serde_json::to_value(PagecraftConfig::default()).unwrap();
        assert_eq!(lookup(&json, "thumbnails.width"), Some(&Value::from(200)));
        assert!(lookup(&json, "thumbnails.depth").is_none());
    }

    #[test]
    fn test_assign_existing_key() {
        let mut json = serde_json::to_value(PagecraftConfig::default()).unwrap();
        assign(&mut json, "worker.compress_output", Value::Bool(true)).unwrap();

        let config: PagecraftConfig = serde_json::from_value(json).unwrap();
        assert!(config.worker.compress_output);
    }

    #[test]
    fn test_assign_unknown_key_fails() {
        let mut json = serde_json::to_value(PagecraftConfig::default()).unwrap();
        assert!(assign(&mut json, "worker.speed", Value::from(3)).is_err());
        assert!(assign(&mut json, "render.width", Value::from(3)).is_err());
    }
}

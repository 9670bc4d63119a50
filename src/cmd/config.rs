//! Configuration view command — `leadflow config`.

use anyhow::Result;

use leadflow::config::{LeadflowConfig, LeadflowToml};

use super::super::ConfigCommands;

pub fn cmd_config(config: &LeadflowConfig, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = &config.config_path;

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Leadflow Configuration");
            println!("======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
                println!();

                let toml = &config.toml;
                println!("[source]");
                println!("  base_url = \"{}\"", toml.source.base_url);
                if toml.source.forgery_token.is_some() {
                    println!("  forgery_token = \"***\"");
                }
                println!();
                println!("[refresh]");
                println!("  interval_secs = {}", toml.refresh.interval_secs);
                println!();
                println!("[cache]");
                println!("  enabled = {}", toml.cache.enabled);
                if let Some(dir) = &toml.cache.dir {
                    println!("  dir = \"{}\"", dir.display());
                }
                println!();
            } else {
                println!("No leadflow.toml found at {}", config_path.display());
                println!();
                println!("Run 'leadflow config init' to create one.");
                println!();
            }

            println!("Effective values (with env/CLI overrides):");
            println!("  base_url = \"{}\"", config.base_url());
            println!(
                "  refresh_interval = {}s",
                config.refresh_interval().as_secs()
            );
            println!("  cache_enabled = {}", config.cache_enabled());
            println!("  cache_dir = \"{}\"", config.cache_dir().display());
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("leadflow.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            let toml = LeadflowToml::default();
            toml.save(config_path)?;

            println!("Created leadflow.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [source] base_url, forgery_token");
            println!("  - [refresh] interval_secs");
            println!("  - [cache] enabled, dir");
            println!();
        }
    }

    Ok(())
}

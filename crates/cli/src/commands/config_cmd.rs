//! `bruin config` — Inspect or initialize the configuration.

use clap::Subcommand;

use bruin_config::AppConfig;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,
    /// Write a default config file if none exists
    Init,
    /// Print the config file path
    Path,
}

pub async fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            let config = AppConfig::load()?;
            println!("{config:#?}");
        }
        ConfigAction::Init => {
            let dir = AppConfig::config_dir();
            let path = dir.join("config.toml");
            if path.exists() {
                println!("Config already exists at {}", path.display());
                return Ok(());
            }
            std::fs::create_dir_all(&dir)?;
            std::fs::write(&path, AppConfig::default_toml())?;
            println!("Wrote default config to {}", path.display());
        }
        ConfigAction::Path => {
            println!("{}", AppConfig::config_dir().join("config.toml").display());
        }
    }
    Ok(())
}

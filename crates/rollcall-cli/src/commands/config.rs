use rollcall_core::config::RemoteConfig;

use crate::cli::ConfigCommands;
use crate::config::{default_config_path, CliConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            project_id,
            database,
            collection,
            endpoint,
            api_key,
            poll_interval_secs,
        } => run_config_init(RemoteConfig {
            project_id,
            database,
            collection,
            endpoint,
            api_key,
            auth_token: None,
            poll_interval_secs,
        }),
        ConfigCommands::Show => run_config_show(),
    }
}

pub fn run_config_init(explicit: RemoteConfig) -> Result<(), CliError> {
    let mut config = CliConfig::load().map_err(CliError::Config)?;
    config.remote = merge_remote(explicit, config.remote);
    config
        .remote
        .validate()
        .map_err(|error| CliError::Config(error.to_string()))?;

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Collection '{}' in project '{}' configured at {}",
        config.remote.collection(),
        config.remote.project_id(),
        path.display()
    );
    Ok(())
}

pub fn run_config_show() -> Result<(), CliError> {
    let config = CliConfig::load().map_err(CliError::Config)?;
    let effective = redact(config.effective_remote());

    println!("# {}", default_config_path().display());
    println!("{}", serde_json::to_string_pretty(&effective)?);
    if !effective.is_configured() {
        println!("{}", CliError::RemoteNotConfigured);
    }
    Ok(())
}

/// Explicit flags win over the stored values; empty flags are ignored.
pub fn merge_remote(explicit: RemoteConfig, existing: RemoteConfig) -> RemoteConfig {
    let mut explicit = explicit;
    explicit.normalize();
    let mut merged = explicit.or(existing);
    merged.normalize();
    merged
}

/// Hide credentials before printing.
pub fn redact(mut remote: RemoteConfig) -> RemoteConfig {
    let mask = |value: Option<String>| value.map(|_| "********".to_string());
    remote.api_key = mask(remote.api_key);
    remote.auth_token = mask(remote.auth_token);
    remote
}

//! Configuration lifecycle: load the file config, then apply CLI overrides.

use anyhow::{Context, Result};
use bibarchive_core::{Config, load_config};
use tracing::{debug, info};

use crate::cli::Args;

/// Loads the configuration for a run and merges the command-line flags
/// into it. The merged result is validated again.
pub(crate) fn resolve_config(args: &Args) -> Result<Config> {
    let loaded = load_config(args.config.as_deref())?;
    match (&loaded.path, loaded.loaded_from_file) {
        (Some(path), true) => info!(path = %path.display(), "Loaded configuration"),
        (Some(path), false) => debug!(path = %path.display(), "No config file, using defaults"),
        (None, _) => debug!("No config location, using defaults"),
    }

    let mut config = loaded.config;
    apply_cli_overrides(&mut config, args);
    config
        .validate()
        .context("Invalid configuration after applying command-line flags")?;
    Ok(config)
}

/// Flags override file values; an explicit email also enables the
/// open-access lookup.
pub(crate) fn apply_cli_overrides(config: &mut Config, args: &Args) {
    if let Some(email) = &args.email {
        config.unpaywall.email.clone_from(email);
        config.unpaywall.enabled = true;
    }
    if args.snapshot {
        config.snapshot.enabled = true;
    }
}

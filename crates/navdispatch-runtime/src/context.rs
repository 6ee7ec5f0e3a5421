//! Config and host-table loading shared by the commands.

use anyhow::Context;
use navdispatch_core::DispatchConfig;
use navdispatch_core::table::TableHost;
use std::path::Path;

pub fn load_config(path: Option<&Path>) -> anyhow::Result<DispatchConfig> {
    match path {
        Some(path) => DispatchConfig::load(path)
            .with_context(|| format!("loading dispatch config {}", path.display())),
        None => Ok(DispatchConfig::default()),
    }
}

pub fn load_host(path: Option<&Path>) -> anyhow::Result<TableHost> {
    match path {
        Some(path) => {
            let host = TableHost::load(path)
                .with_context(|| format!("loading host table {}", path.display()))?;
            tracing::debug!(
                path = %path.display(),
                rules = host.handlers.len(),
                scopes = host.scopes.len(),
                "loaded host table"
            );
            Ok(host)
        }
        None => Ok(TableHost::default()),
    }
}

/// Log filter: `NAVDISPATCH_LOG`, then `RUST_LOG`, else `warn` (or `debug`
/// with `--verbose`).
pub fn log_filter(verbose: bool) -> String {
    if verbose {
        return "debug".to_string();
    }
    std::env::var("NAVDISPATCH_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "warn".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_paths_use_defaults() {
        assert_eq!(load_config(None).unwrap(), DispatchConfig::default());
        assert_eq!(load_host(None).unwrap().identity, TableHost::default().identity);
    }

    #[test]
    fn unreadable_config_names_the_file() {
        let err = load_config(Some(Path::new("/nonexistent/dispatch.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/dispatch.toml"));
    }

    #[test]
    fn verbose_forces_debug() {
        assert_eq!(log_filter(true), "debug");
    }
}

//! CLI argument definitions for the voicesearch host.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Voice search plugin host speaking JSON lines on stdin/stdout.
#[derive(Parser, Debug)]
#[command(name = "voicesearch", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Start without a host surface; every start request fails with NO_ACTIVITY.
    #[arg(long = "detached")]
    pub detached: bool,

    /// Print the effective configuration as TOML and exit.
    #[arg(long = "print-config")]
    pub print_config: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > VOICESEARCH_CONFIG env var > ~/.voicesearch/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("VOICESEARCH_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        match &self.log_level {
            Some(level) => level.clone(),
            None => config_level.to_string(),
        }
    }
}

fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".voicesearch").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".voicesearch").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::try_parse_from(["voicesearch"]).unwrap();
        assert!(args.config.is_none());
        assert!(!args.detached);
        assert!(!args.print_config);
        assert_eq!(args.resolve_log_level("warn"), "warn");
    }

    #[test]
    fn test_flags() {
        let args = CliArgs::try_parse_from([
            "voicesearch",
            "--config",
            "/tmp/vs.toml",
            "-l",
            "debug",
            "--detached",
            "--print-config",
        ])
        .unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/vs.toml"));
        assert_eq!(args.resolve_log_level("info"), "debug");
        assert!(args.detached);
        assert!(args.print_config);
    }

    #[test]
    fn test_default_config_path_file_name() {
        let path = default_config_path();
        assert!(path.ends_with("config.toml"));
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(CliArgs::try_parse_from(["voicesearch", "--port", "80"]).is_err());
    }
}

//! CLI argument definitions for the concierge console.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Cottage concierge: answers guest questions from resort knowledge.
#[derive(Parser, Debug)]
#[command(name = "concierge", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// JSON file of knowledge passages.
    #[arg(short = 'k', long = "knowledge")]
    pub knowledge: Option<PathBuf>,

    /// Session identifier to resume.
    #[arg(short = 's', long = "session")]
    pub session: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Print each turn as JSON instead of plain text.
    #[arg(long = "json")]
    pub json: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CONCIERGE_CONFIG env var > ~/.concierge/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("CONCIERGE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the knowledge file.
    ///
    /// Priority: --knowledge flag > config file value. `None` means no passages.
    pub fn resolve_knowledge_path(&self, config_path: Option<&str>) -> Option<PathBuf> {
        self.knowledge
            .clone()
            .or_else(|| config_path.map(expand_home))
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > RUST_LOG (handled by the filter) > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match std::env::var("HOME") {
            Ok(home) => PathBuf::from(home).join(rest),
            Err(_) => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}

/// Default config file path.
fn default_config_path() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".concierge").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_config_wins() {
        let args = CliArgs::parse_from(["concierge", "--config", "/tmp/c.toml"]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/c.toml"));
    }

    #[test]
    fn test_knowledge_flag_overrides_config() {
        let args = CliArgs::parse_from(["concierge", "-k", "kb.json"]);
        assert_eq!(
            args.resolve_knowledge_path(Some("other.json")),
            Some(PathBuf::from("kb.json"))
        );
        let args = CliArgs::parse_from(["concierge"]);
        assert_eq!(
            args.resolve_knowledge_path(Some("other.json")),
            Some(PathBuf::from("other.json"))
        );
        assert_eq!(args.resolve_knowledge_path(None), None);
    }

    #[test]
    fn test_log_level_resolution() {
        let args = CliArgs::parse_from(["concierge", "--log-level", "debug"]);
        assert_eq!(args.resolve_log_level("info"), "debug");
        let args = CliArgs::parse_from(["concierge"]);
        assert_eq!(args.resolve_log_level("warn"), "warn");
    }

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("data/kb.json"), PathBuf::from("data/kb.json"));
    }
}

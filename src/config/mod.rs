pub mod generate;
pub mod parse;
pub mod types;

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub use parse::{load_config, parse_config, ConfigError};
pub use types::{
    BatcherConfig, BrokerConfig, BrokerKind, CommitPolicy, Config, EnrichConfig, MirrorConfig,
    StorageBackend, StorageConfig, WriterConfig,
};

pub(crate) fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var pattern is valid")
    })
}

/// Expands environment variables in a string.
/// Supports $env{VAR_NAME} syntax.
/// If an environment variable is not set, it's left unchanged.
pub fn expand_env_vars(text: &str) -> String {
    env_var_pattern()
        .replace_all(text, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string()
}

/// Expands a leading `~` to the user's home directory.
/// Returns the path unchanged if the home directory cannot be determined.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(rest);
        }
    } else if path_str == "~" {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir;
        }
    }

    path.to_path_buf()
}

/// Resolves the config file path. Returns the first existing path from:
/// 1. Explicit path (if provided, with tilde expansion)
/// 2. ~/.config/sentipipe/config.yml
/// 3. /etc/sentipipe/config.yml
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(expand_tilde(path));
    }

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            return Some(user_config);
        }
    }

    let system_config = PathBuf::from("/etc/sentipipe/config.yml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Where `config init` writes by default.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config/sentipipe/config.yml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_expand_env_vars_single() {
        std::env::set_var("SENTIPIPE_TEST_ROOT", "/data");
        let result = expand_env_vars("root: $env{SENTIPIPE_TEST_ROOT}/raw");
        assert_eq!(result, "root: /data/raw");
        std::env::remove_var("SENTIPIPE_TEST_ROOT");
    }

    #[test]
    fn test_expand_env_vars_partial() {
        std::env::set_var("SENTIPIPE_TEST_SET", "exists");
        let result = expand_env_vars("$env{SENTIPIPE_TEST_SET}/$env{SENTIPIPE_TEST_UNSET}");
        assert_eq!(result, "exists/$env{SENTIPIPE_TEST_UNSET}");
        std::env::remove_var("SENTIPIPE_TEST_SET");
    }

    #[test]
    fn test_expand_env_vars_leaves_plain_braces() {
        let result = expand_env_vars("${category}/${day}");
        assert_eq!(result, "${category}/${day}");
    }

    #[test]
    fn test_expand_tilde_with_path() {
        let expanded = expand_tilde(Path::new("~/sentipipe/data"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("sentipipe/data"));
        }
    }

    #[test]
    fn test_expand_tilde_no_expansion() {
        assert_eq!(
            expand_tilde(Path::new("/absolute/path")),
            Path::new("/absolute/path")
        );
        assert_eq!(
            expand_tilde(Path::new("relative/path")),
            Path::new("relative/path")
        );
    }

    #[test]
    fn test_resolve_explicit_path_wins() {
        let resolved = resolve_config_path(Some(Path::new("/tmp/custom.yml")));
        assert_eq!(resolved, Some(PathBuf::from("/tmp/custom.yml")));
    }
}

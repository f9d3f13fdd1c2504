use env_logger::{Env, Target};
use std::path::PathBuf;

pub const WORKSPACE_ENV: &str = "ACADREPORTD_WORKSPACE";

/// Process-level settings. Workspace-level settings live in the database.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub workspace: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let workspace = lookup(WORKSPACE_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self { workspace }
    }
}

/// Logs go to stderr; stdout carries responses only.
pub fn init_logging() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_from_env_ignores_blank() {
        let cfg = Config::from_lookup(|_| Some("   ".to_string()));
        assert!(cfg.workspace.is_none());

        let cfg = Config::from_lookup(|k| {
            (k == WORKSPACE_ENV).then(|| "/tmp/school".to_string())
        });
        assert_eq!(cfg.workspace, Some(PathBuf::from("/tmp/school")));
    }
}

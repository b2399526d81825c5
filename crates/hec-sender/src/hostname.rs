// Copyright 2026-Present the hec-sender authors.
// SPDX-License-Identifier: Apache-2.0

//! Default-host resolution.
//!
//! Runs once at client construction when the configuration does not pin a
//! hostname; `Config.hostname` bypasses it entirely and is the substitution
//! point for tests.

use std::env;

use tracing::warn;

/// Resolves the default host: `HEC_HOSTNAME`, then the standard `HOSTNAME`
/// variable (commonly set in containers), then the system hostname, then the
/// `"unknown"` sentinel.
pub(crate) fn resolve() -> String {
    from_env("HEC_HOSTNAME")
        .or_else(|| from_env("HOSTNAME"))
        .or_else(from_system)
        .unwrap_or_else(|| {
            warn!("hostname could not be resolved, using \"unknown\"");
            "unknown".to_string()
        })
}

fn from_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn from_system() -> Option<String> {
    match nix::unistd::gethostname() {
        // Non-UTF-8 hostnames fall through to the sentinel.
        Ok(raw) => raw.into_string().ok().filter(|value| !value.is_empty()),
        Err(err) => {
            warn!(%err, "gethostname failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_wins_over_system() {
        env::set_var("HEC_HOSTNAME", "pinned-by-env");
        assert_eq!(resolve(), "pinned-by-env");
        env::remove_var("HEC_HOSTNAME");
    }

    #[test]
    fn test_resolution_always_yields_a_value() {
        assert!(!resolve().is_empty());
    }
}

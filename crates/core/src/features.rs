//! Feature flags read by the web layer.
//!
//! Each flag defaults to OFF in production and ON everywhere else; an
//! explicit `FEATURE_*` env var overrides the environment default.

use serde::{Deserialize, Serialize};

use crate::config::profiled_env_opt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Show the DEV / STAGING badge.
    pub env_badge: bool,
    /// Expose the dashboard route.
    pub dashboard_access: bool,
    pub app_env: String,
}

impl FeatureFlags {
    pub(crate) fn from_env_profiled(p: &str) -> Self {
        let app_env = profiled_env_opt(p, "APP_ENV").unwrap_or_else(|| "production".to_string());
        Self::resolve(
            app_env,
            profiled_env_opt(p, "FEATURE_ENV_BADGE").as_deref(),
            profiled_env_opt(p, "FEATURE_DASHBOARD_ACCESS").as_deref(),
        )
    }

    /// Apply explicit overrides on top of the environment default.
    pub fn resolve(app_env: String, env_badge: Option<&str>, dashboard_access: Option<&str>) -> Self {
        let non_production = app_env != "production";
        Self {
            env_badge: env_badge.and_then(parse_flag).unwrap_or(non_production),
            dashboard_access: dashboard_access.and_then(parse_flag).unwrap_or(non_production),
            app_env,
        }
    }

    /// Look up a flag by name. Unknown flags read as disabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        match name {
            "env_badge" => self.env_badge,
            "dashboard_access" => self.dashboard_access,
            _ => false,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_defaults_off() {
        let flags = FeatureFlags::resolve("production".into(), None, None);
        assert!(!flags.env_badge);
        assert!(!flags.dashboard_access);
    }

    #[test]
    fn non_production_defaults_on() {
        let flags = FeatureFlags::resolve("local".into(), None, None);
        assert!(flags.is_enabled("env_badge"));
        assert!(flags.is_enabled("dashboard_access"));
    }

    #[test]
    fn explicit_override_wins() {
        let flags = FeatureFlags::resolve("production".into(), Some("true"), Some("garbage"));
        assert!(flags.env_badge);
        // Unparseable override falls back to the environment default.
        assert!(!flags.dashboard_access);
    }

    #[test]
    fn unknown_flag_is_disabled() {
        let flags = FeatureFlags::resolve("local".into(), None, None);
        assert!(!flags.is_enabled("ai_debug_panel"));
    }
}

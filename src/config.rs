//! Configuration module for queuewatch.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the API server (default: 3000)
    pub http_port: u16,
    /// Queues registered with the in-memory backend at startup
    pub demo_queues: Vec<String>,
    /// Whether the demo simulator drives the in-memory queues (default: true)
    pub simulate: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 3000,
            demo_queues: vec!["emails".to_string(), "reports".to_string()],
            simulate: true,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `QUEUEWATCH_HTTP_PORT`: HTTP port (default: 3000)
    /// - `QUEUEWATCH_DEMO_QUEUES`: comma separated queue names (default: "emails,reports")
    /// - `QUEUEWATCH_SIMULATE`: run the demo simulator (default: true)
    pub fn load() -> Self {
        Self::load_from(|key| env::var(key).ok())
    }

    fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(port) = lookup("QUEUEWATCH_HTTP_PORT").and_then(|s| s.parse().ok()) {
            cfg.http_port = port;
        }

        if let Some(list) = lookup("QUEUEWATCH_DEMO_QUEUES") {
            cfg.demo_queues = split_names(&list);
        }

        if let Some(simulate) = lookup("QUEUEWATCH_SIMULATE").and_then(|s| parse_bool(&s)) {
            cfg.simulate = simulate;
        }

        cfg
    }
}

/// Client-side dashboard settings.
#[derive(Debug, Clone)]
pub struct DashboardSettings {
    /// Base URL of the queuewatch API server
    pub base_url: String,
    /// Polling interval in seconds; zero or negative disables repeated polling
    pub polling_interval: i64,
    /// Page size for the active queue's job list
    pub jobs_per_page: u64,
    /// Ask before running destructive queue actions
    pub confirm_queue_actions: bool,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            polling_interval: 5,
            jobs_per_page: 10,
            confirm_queue_actions: true,
        }
    }
}

impl DashboardSettings {
    /// Load settings from environment variables.
    ///
    /// Environment variables:
    /// - `QUEUEWATCH_URL`: API base URL (default: "http://localhost:3000")
    /// - `QUEUEWATCH_POLLING_INTERVAL`: seconds between polls (default: 5)
    /// - `QUEUEWATCH_JOBS_PER_PAGE`: jobs per page (default: 10)
    /// - `QUEUEWATCH_CONFIRM_QUEUE_ACTIONS`: confirm destructive actions (default: true)
    pub fn load() -> Self {
        Self::load_from(|key| env::var(key).ok())
    }

    fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();

        if let Some(url) = lookup("QUEUEWATCH_URL") {
            settings.base_url = url;
        }

        if let Some(interval) = lookup("QUEUEWATCH_POLLING_INTERVAL").and_then(|s| s.parse().ok()) {
            settings.polling_interval = interval;
        }

        if let Some(per_page) = lookup("QUEUEWATCH_JOBS_PER_PAGE").and_then(|s| s.parse().ok()) {
            settings.jobs_per_page = per_page;
        }

        if let Some(confirm) =
            lookup("QUEUEWATCH_CONFIRM_QUEUE_ACTIONS").and_then(|s| parse_bool(&s))
        {
            settings.confirm_queue_actions = confirm;
        }

        settings
    }

    /// The repeat period for pollers, or `None` when polling is disabled.
    pub fn polling_period(&self) -> Option<Duration> {
        if self.polling_interval > 0 {
            Some(Duration::from_secs(self.polling_interval as u64))
        } else {
            None
        }
    }
}

fn split_names(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 3000);
        assert_eq!(cfg.demo_queues, vec!["emails", "reports"]);
        assert!(cfg.simulate);
    }

    #[test]
    fn test_server_config_from_env() {
        let cfg = ServerConfig::load_from(lookup(&[
            ("QUEUEWATCH_HTTP_PORT", "9090"),
            ("QUEUEWATCH_DEMO_QUEUES", " mail , ,billing"),
            ("QUEUEWATCH_SIMULATE", "off"),
        ]));
        assert_eq!(cfg.http_port, 9090);
        assert_eq!(cfg.demo_queues, vec!["mail", "billing"]);
        assert!(!cfg.simulate);
    }

    #[test]
    fn test_unparseable_values_keep_defaults() {
        let cfg = ServerConfig::load_from(lookup(&[
            ("QUEUEWATCH_HTTP_PORT", "not-a-port"),
            ("QUEUEWATCH_SIMULATE", "maybe"),
        ]));
        assert_eq!(cfg.http_port, 3000);
        assert!(cfg.simulate);
    }

    #[test]
    fn test_dashboard_settings() {
        let settings = DashboardSettings::load_from(lookup(&[
            ("QUEUEWATCH_URL", "http://queues.internal:8080"),
            ("QUEUEWATCH_POLLING_INTERVAL", "0"),
            ("QUEUEWATCH_JOBS_PER_PAGE", "25"),
            ("QUEUEWATCH_CONFIRM_QUEUE_ACTIONS", "false"),
        ]));
        assert_eq!(settings.base_url, "http://queues.internal:8080");
        assert_eq!(settings.jobs_per_page, 25);
        assert!(!settings.confirm_queue_actions);
        assert!(settings.polling_period().is_none());
    }

    #[test]
    fn test_polling_period() {
        let mut settings = DashboardSettings::default();
        assert_eq!(settings.polling_period(), Some(Duration::from_secs(5)));

        settings.polling_interval = -3;
        assert!(settings.polling_period().is_none());
    }
}

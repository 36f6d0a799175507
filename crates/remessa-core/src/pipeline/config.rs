use serde::Deserialize;

/// Top-level configuration, deserializable from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RemessaConfig {
    pub server: ServerConfig,
    pub cycle: CycleConfig,
    pub provider: ProviderConfig,
}

/// HTTP listen address for the webhook/ingestion surface.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
}

/// One processing cycle's budgets and the fairness caps.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Seconds between cycle triggers.
    pub interval_secs: u64,
    /// Wall-clock budget for one cycle (ms). Dispatch stops starting new
    /// batches past this point; the claim TTL returns the remainder.
    pub budget_ms: u64,
    /// Total jobs claimable per cycle across all tenants.
    pub global_budget: usize,
    /// Upper bound on jobs claimed from a single tenant per cycle, regardless
    /// of how few tenants have work.
    pub per_tenant_cap: usize,
    /// Claims unresolved after this many cycle intervals are released back
    /// to `queued`.
    pub claim_ttl_cycles: u32,
}

impl CycleConfig {
    /// Claim TTL in milliseconds.
    pub fn claim_ttl_ms(&self) -> u64 {
        self.interval_secs * 1000 * u64::from(self.claim_ttl_cycles)
    }
}

/// Provider batch-endpoint limits and pacing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Maximum items per batch call.
    pub batch_size: usize,
    /// Minimum delay between successive batch submissions (ms). Chosen so
    /// that 1000 / delay stays under the provider's requests-per-second
    /// ceiling with headroom.
    pub min_batch_interval_ms: u64,
    /// Backoff when a 429 response carries no retry-after value (seconds).
    pub retry_after_fallback_secs: u64,
    /// Per-request timeout (ms); must stay well under the cycle interval.
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8484".to_string(),
        }
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            budget_ms: 25_000,
            global_budget: 300,
            per_tenant_cap: 200,
            claim_ttl_cycles: 3,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.resend.com".to_string(),
            batch_size: 100,
            min_batch_interval_ms: 500,
            retry_after_fallback_secs: 2,
            request_timeout_ms: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = RemessaConfig::default();
        assert_eq!(config.server.listen_addr, "0.0.0.0:8484");
        assert_eq!(config.cycle.interval_secs, 30);
        assert_eq!(config.cycle.global_budget, 300);
        assert_eq!(config.cycle.per_tenant_cap, 200);
        assert_eq!(config.provider.batch_size, 100);
        assert_eq!(config.provider.min_batch_interval_ms, 500);
    }

    #[test]
    fn claim_ttl_spans_configured_cycles() {
        let config = CycleConfig::default();
        assert_eq!(config.claim_ttl_ms(), 90_000);
    }

    #[test]
    fn toml_parsing_with_overrides() {
        let toml_str = r#"
            [server]
            listen_addr = "127.0.0.1:9999"

            [cycle]
            global_budget = 500
            per_tenant_cap = 50

            [provider]
            batch_size = 25
        "#;
        let config: RemessaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen_addr, "127.0.0.1:9999");
        assert_eq!(config.cycle.global_budget, 500);
        assert_eq!(config.cycle.per_tenant_cap, 50);
        assert_eq!(config.provider.batch_size, 25);
        // Untouched sections keep defaults
        assert_eq!(config.cycle.interval_secs, 30);
        assert_eq!(config.provider.min_batch_interval_ms, 500);
    }

    #[test]
    fn toml_parsing_empty_uses_defaults() {
        let config: RemessaConfig = toml::from_str("").unwrap();
        assert_eq!(config.cycle.budget_ms, 25_000);
        assert_eq!(config.provider.retry_after_fallback_secs, 2);
    }
}

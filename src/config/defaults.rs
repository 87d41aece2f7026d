//! Default values for configuration fields
//!
//! Keeping these in one place makes the full default surface reviewable and
//! keeps `serde(default = "...")` attributes short.

pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_port() -> u16 {
    8989
}

pub fn default_base_url() -> String {
    "/".to_string()
}

pub fn default_user_agent() -> String {
    format!("Sublarr/{}", env!("CARGO_PKG_VERSION"))
}

pub fn default_database_url() -> String {
    "sqlite://./data/sublarr.db".to_string()
}

pub fn default_languages() -> Vec<String> {
    vec!["en".to_string()]
}

pub fn default_subtitle_kinds() -> Vec<String> {
    vec!["full".to_string()]
}

pub fn default_scan_interval_seconds() -> u64 {
    6 * 3600
}

pub fn default_search_interval_seconds() -> u64 {
    15
}

pub fn default_search_concurrency() -> usize {
    4
}

pub fn default_search_batch_size() -> u64 {
    25
}

pub fn default_provider_search_timeout_seconds() -> u64 {
    30
}

pub fn default_provider_download_timeout_seconds() -> u64 {
    60
}

pub fn default_min_score() -> i32 {
    60
}

pub fn default_retry_backoff_base_seconds() -> u64 {
    900
}

pub fn default_retry_backoff_cap_seconds() -> u64 {
    24 * 3600
}

pub fn default_searching_grace_seconds() -> u64 {
    120
}

pub fn default_upgrade_min_score_delta() -> i32 {
    50
}

pub fn default_upgrade_window_days() -> i64 {
    7
}

pub fn default_upgrade_prefer_ass() -> bool {
    true
}

pub fn default_webhook_delay_minutes() -> u64 {
    0
}

pub fn default_true() -> bool {
    true
}

pub fn default_circuit_breaker_failures() -> u32 {
    5
}

pub fn default_circuit_breaker_cooldown_seconds() -> u64 {
    60
}

pub fn default_response_cache_ttl_seconds() -> u64 {
    6 * 3600
}

pub fn default_plugins_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("./plugins")
}

pub fn default_translate_timeout_seconds() -> u64 {
    600
}

pub fn default_min_free_disk_mb() -> u64 {
    100
}

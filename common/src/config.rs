//! Config file schema, `§6`. Loaded from a JSONC file (parsed with
//! `serde_json` after a comment strip, matching how JSONC is normally
//! consumed without a dedicated crate) with every default named in the
//! spec's bracketed defaults, plus environment variable overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::network::NetworkPreset;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SedaChainConfig {
    pub rpc: String,
    pub chain_id: String,
    pub mnemonic: Option<String>,
    #[serde(default = "default_contract")]
    pub contract: String,
    #[serde(default = "default_account_amounts")]
    pub account_amounts: u32,
    #[serde(default = "default_min_seda_per_account")]
    pub min_seda_per_account: u128,
    #[serde(default = "default_identities_amount")]
    pub identities_amount: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_sleep_between_failed_tx")]
    pub sleep_between_failed_tx: u64,
    #[serde(default = "default_transaction_poll_interval")]
    pub transaction_poll_interval: u64,
    #[serde(default = "default_queue_interval")]
    pub queue_interval: u64,
    #[serde(default = "default_gas_price")]
    pub gas_price: String,
    #[serde(default = "default_gas_adjustment_factor")]
    pub gas_adjustment_factor: f64,
    #[serde(default = "default_gas_adjustment_factor_cosmos_messages")]
    pub gas_adjustment_factor_cosmos_messages: f64,
    #[serde(default = "default_gas")]
    pub gas: String,
    pub memo_suffix: Option<String>,
    #[serde(default = "default_true")]
    pub follow_http_redirects: bool,
    #[serde(default = "default_http_redirect_ttl_ms")]
    pub http_redirect_ttl_ms: u64,
    #[serde(default = "default_transaction_block_search_threshold")]
    pub transaction_block_search_threshold: u64,
    #[serde(default = "default_true")]
    pub disable_transaction_block_search: bool,
    #[serde(default = "default_rewards_withdrawal_interval")]
    pub rewards_withdrawal_interval: u64,
    #[serde(default = "default_rewards_withdrawal_minimum_threshold")]
    pub rewards_withdrawal_minimum_threshold: String,
    #[serde(default)]
    pub enable_rewards_withdrawal: bool,
}

fn default_contract() -> String {
    "auto".to_string()
}
fn default_account_amounts() -> u32 {
    10
}
fn default_min_seda_per_account() -> u128 {
    1_000_000_000_000_000_000
}
fn default_identities_amount() -> u32 {
    1
}
fn default_max_retries() -> u32 {
    3
}
fn default_sleep_between_failed_tx() -> u64 {
    3000
}
fn default_transaction_poll_interval() -> u64 {
    2000
}
fn default_queue_interval() -> u64 {
    200
}
fn default_gas_price() -> String {
    "10000000000".to_string()
}
fn default_gas_adjustment_factor() -> f64 {
    1.1
}
fn default_gas_adjustment_factor_cosmos_messages() -> f64 {
    2.0
}
fn default_gas() -> String {
    "auto".to_string()
}
fn default_true() -> bool {
    true
}
fn default_http_redirect_ttl_ms() -> u64 {
    300_000
}
fn default_transaction_block_search_threshold() -> u64 {
    2
}
fn default_rewards_withdrawal_interval() -> u64 {
    86_400_000
}
fn default_rewards_withdrawal_minimum_threshold() -> String {
    "1000000000000000000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: u32,
    #[serde(default = "default_max_gas_limit")]
    pub max_gas_limit: u64,
    #[serde(default = "default_max_vm_logs_size_bytes")]
    pub max_vm_logs_size_bytes: u64,
    #[serde(default = "default_process_dr_interval")]
    pub process_dr_interval: u64,
    #[serde(default = "default_true")]
    pub block_localhost: bool,
    #[serde(default)]
    pub terminate_after_completion: bool,
    #[serde(default)]
    pub thread_amount: Option<usize>,
}

fn default_max_concurrent_requests() -> u32 {
    20
}
fn default_max_gas_limit() -> u64 {
    300_000_000_000_000
}
fn default_max_vm_logs_size_bytes() -> u64 {
    1024
}
fn default_process_dr_interval() -> u64 {
    2500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalsConfig {
    #[serde(default = "default_fetch_task")]
    pub fetch_task: u64,
    #[serde(default = "default_identity_check")]
    pub identity_check: u64,
    #[serde(default = "default_status_check")]
    pub status_check: u64,
    #[serde(default = "default_eligibility_check")]
    pub eligibility_check: u64,
    #[serde(default = "default_dr_task")]
    pub dr_task: u64,
}

fn default_fetch_task() -> u64 {
    1000
}
fn default_identity_check() -> u64 {
    1_200_000
}
fn default_status_check() -> u64 {
    2500
}
fn default_eligibility_check() -> u64 {
    3000
}
fn default_dr_task() -> u64 {
    100
}

impl Default for IntervalsConfig {
    fn default() -> Self {
        Self {
            fetch_task: default_fetch_task(),
            identity_check: default_identity_check(),
            status_check: default_status_check(),
            eligibility_check: default_eligibility_check(),
            dr_task: default_dr_task(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub enable_auto_port_discovery: bool,
}

fn default_port() -> u16 {
    3000
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            enable_auto_port_discovery: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub home_dir: String,
    pub wasm_cache_dir: String,
    pub logs_dir: String,
    pub workers_dir: String,
    pub seda_chain: SedaChainConfig,
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub intervals: IntervalsConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
    #[serde(default)]
    pub logging: crate::logging::LoggingConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
            max_gas_limit: default_max_gas_limit(),
            max_vm_logs_size_bytes: default_max_vm_logs_size_bytes(),
            process_dr_interval: default_process_dr_interval(),
            block_localhost: true,
            terminate_after_completion: false,
            thread_amount: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Derives `$SEDA_HOME/.seda/<network>/...` default directories, matching
/// the teacher's pattern of deriving storage paths from a home dir plus
/// network name rather than hardcoding absolute paths.
pub fn default_home_dir(network: NetworkPreset) -> String {
    let base = std::env::var("SEDA_HOME")
        .or_else(|_| std::env::var("HOME"))
        .unwrap_or_else(|_| ".".to_string());
    format!("{base}/.seda/{network}")
}

/// Strips `//` line comments and `/* */` block comments outside of string
/// literals, the minimal transform needed to read JSONC with `serde_json`.
fn strip_jsonc_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            _ => out.push(c),
        }
    }

    out
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let stripped = strip_jsonc_comments(&raw);
    let config: Config = serde_json::from_str(&stripped)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_line_and_block_comments() {
        let input = r#"{
            // a comment
            "a": 1, /* inline */ "b": "value // not a comment"
        }"#;
        let stripped = strip_jsonc_comments(input);
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["a"], 1);
        assert_eq!(value["b"], "value // not a comment");
    }

    #[test]
    fn defaults_match_spec_brackets() {
        let chain: SedaChainConfig = serde_json::from_str(
            r#"{"rpc": "http://x", "chain_id": "seda_test"}"#,
        )
        .unwrap();
        assert_eq!(chain.account_amounts, 10);
        assert_eq!(chain.max_retries, 3);
        assert_eq!(chain.sleep_between_failed_tx, 3000);
        assert_eq!(chain.queue_interval, 200);
        assert!(chain.disable_transaction_block_search);

        let node = NodeConfig::default();
        assert_eq!(node.max_concurrent_requests, 20);
        assert_eq!(node.max_vm_logs_size_bytes, 1024);

        let intervals = IntervalsConfig::default();
        assert_eq!(intervals.fetch_task, 1000);
        assert_eq!(intervals.eligibility_check, 3000);
    }
}

//! The chain's query and broadcast surface, `§4.1`. [`HttpChainClient`]
//! wraps a `reqwest::Client` bound to one RPC endpoint with a cookie jar, so
//! a sticky load balancer routes every request from this node to the same
//! upstream; query results are cached per `§3`'s cache table.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use log::{debug, trace};
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;

use seda_overlay_common::{cache::TtlCache, crypto::Hash};

use crate::{
    error::ChainError,
    types::{Block, DrConfig, DrStatusPage, Staker, StakerAndSeq, StakingConfig},
};

/// The read/query half of the chain surface. Broadcasting goes through
/// [`crate::dispatcher::Broadcaster`], which an [`HttpChainClient`] also
/// implements.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn query_dr_status_list(&self, offset: u32, limit: u32) -> Result<DrStatusPage, ChainError>;
    async fn query_dr(&self, dr_id: Hash) -> Result<Option<seda_overlay_common::model::DataRequest>, ChainError>;
    async fn query_dr_config(&self) -> Result<DrConfig, ChainError>;
    async fn query_stakers(&self) -> Result<Vec<Staker>, ChainError>;
    async fn query_staking_config(&self) -> Result<StakingConfig, ChainError>;
    async fn query_staker(&self, identity_id: &str) -> Result<Option<Staker>, ChainError>;
    async fn query_staker_and_seq(&self, identity_id: &str) -> Result<StakerAndSeq, ChainError>;
    async fn query_block_height(&self) -> Result<u64, ChainError>;
    async fn query_block(&self, height: u64) -> Result<Block, ChainError>;
    async fn query_oracle_program(&self, exec_program_id: Hash) -> Result<Option<Vec<u8>>, ChainError>;
    async fn get_balance(&self, address: &str) -> Result<u128, ChainError>;
}

pub struct HttpChainClientConfig {
    pub rpc: String,
    pub contract: String,
    pub block_height_ttl: Duration,
    pub dr_ttl: Duration,
    pub dr_config_ttl: Duration,
    pub stakers_ttl: Duration,
    pub staking_config_ttl: Duration,
}

impl Default for HttpChainClientConfig {
    fn default() -> Self {
        Self {
            rpc: String::new(),
            contract: "auto".to_string(),
            block_height_ttl: Duration::from_millis(2500),
            dr_ttl: Duration::from_secs(3),
            dr_config_ttl: Duration::from_secs(600),
            stakers_ttl: Duration::from_secs(600),
            staking_config_ttl: Duration::from_secs(3600),
        }
    }
}

pub struct HttpChainClient {
    http: HttpClient,
    config: HttpChainClientConfig,
    block_height_cache: TtlCache<(), u64>,
    dr_cache: TtlCache<Hash, Option<seda_overlay_common::model::DataRequest>>,
    dr_config_cache: TtlCache<(), DrConfig>,
    stakers_cache: TtlCache<(), Vec<Staker>>,
    staking_config_cache: TtlCache<(), StakingConfig>,
}

impl HttpChainClient {
    pub fn new(config: HttpChainClientConfig) -> Result<Self, ChainError> {
        let http = HttpClient::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ChainError::Generic(e.to_string()))?;

        Ok(Self {
            block_height_cache: TtlCache::new(config.block_height_ttl),
            dr_cache: TtlCache::new(config.dr_ttl),
            dr_config_cache: TtlCache::new(config.dr_config_ttl),
            stakers_cache: TtlCache::new(config.stakers_ttl),
            staking_config_cache: TtlCache::new(config.staking_config_ttl),
            http,
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.rpc.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ChainError> {
        let url = self.url(path);
        trace!("GET {url} {query:?}");

        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| ChainError::classify(&e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ChainError::Generic(e.to_string()))?;

        if !status.is_success() {
            return Err(ChainError::classify(&body));
        }

        serde_json::from_str(&body).map_err(|e| ChainError::Generic(format!("malformed response body: {e}")))
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &serde_json::Value) -> Result<T, ChainError> {
        let url = self.url(path);
        debug!("POST {url}");

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ChainError::classify(&e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ChainError::Generic(e.to_string()))?;

        if !status.is_success() {
            return Err(ChainError::classify(&text));
        }

        serde_json::from_str(&text).map_err(|e| ChainError::Generic(format!("malformed response body: {e}")))
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn query_dr_status_list(&self, offset: u32, limit: u32) -> Result<DrStatusPage, ChainError> {
        self.get_json(
            "cosmwasm/contract/query",
            &[
                ("contract", self.config.contract.clone()),
                ("method", "get_data_requests".to_string()),
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn query_dr(&self, dr_id: Hash) -> Result<Option<seda_overlay_common::model::DataRequest>, ChainError> {
        self.dr_cache
            .get_or_fetch(dr_id, || async move {
                self.get_json(
                    "cosmwasm/contract/query",
                    &[
                        ("contract", self.config.contract.clone()),
                        ("method", "get_data_request".to_string()),
                        ("dr_id", dr_id.to_hex()),
                    ],
                )
                .await
            })
            .await
    }

    async fn query_dr_config(&self) -> Result<DrConfig, ChainError> {
        self.dr_config_cache
            .get_or_fetch((), || async {
                self.get_json(
                    "cosmwasm/contract/query",
                    &[
                        ("contract", self.config.contract.clone()),
                        ("method", "get_dr_config".to_string()),
                    ],
                )
                .await
            })
            .await
    }

    async fn query_stakers(&self) -> Result<Vec<Staker>, ChainError> {
        self.stakers_cache
            .get_or_fetch((), || async {
                self.get_json(
                    "cosmwasm/contract/query",
                    &[
                        ("contract", self.config.contract.clone()),
                        ("method", "get_stakers".to_string()),
                    ],
                )
                .await
            })
            .await
    }

    async fn query_staking_config(&self) -> Result<StakingConfig, ChainError> {
        self.staking_config_cache
            .get_or_fetch((), || async {
                self.get_json(
                    "cosmwasm/contract/query",
                    &[
                        ("contract", self.config.contract.clone()),
                        ("method", "get_staking_config".to_string()),
                    ],
                )
                .await
            })
            .await
    }

    async fn query_staker(&self, identity_id: &str) -> Result<Option<Staker>, ChainError> {
        self.get_json(
            "cosmwasm/contract/query",
            &[
                ("contract", self.config.contract.clone()),
                ("method", "get_staker".to_string()),
                ("identity_id", identity_id.to_string()),
            ],
        )
        .await
    }

    async fn query_staker_and_seq(&self, identity_id: &str) -> Result<StakerAndSeq, ChainError> {
        self.get_json(
            "cosmwasm/contract/query",
            &[
                ("contract", self.config.contract.clone()),
                ("method", "get_staker_and_seq".to_string()),
                ("identity_id", identity_id.to_string()),
            ],
        )
        .await
    }

    async fn query_block_height(&self) -> Result<u64, ChainError> {
        self.block_height_cache
            .get_or_fetch((), || async {
                #[derive(serde::Deserialize)]
                struct Resp {
                    height: u64,
                }
                let resp: Resp = self.get_json("cosmos/base/tendermint/v1beta1/blocks/latest", &[]).await?;
                Ok(resp.height)
            })
            .await
    }

    async fn query_block(&self, height: u64) -> Result<Block, ChainError> {
        self.get_json(
            "cosmos/base/tendermint/v1beta1/blocks",
            &[("height", height.to_string())],
        )
        .await
    }

    async fn query_oracle_program(&self, exec_program_id: Hash) -> Result<Option<Vec<u8>>, ChainError> {
        #[derive(serde::Deserialize)]
        struct Resp {
            wasm_base64: Option<String>,
        }
        let resp: Resp = self
            .get_json(
                "cosmwasm/contract/query",
                &[
                    ("contract", self.config.contract.clone()),
                    ("method", "get_oracle_program".to_string()),
                    ("exec_program_id", exec_program_id.to_hex()),
                ],
            )
            .await?;

        resp.wasm_base64
            .map(|encoded| {
                use base64::{engine::general_purpose::STANDARD, Engine};
                STANDARD
                    .decode(encoded)
                    .map_err(|e| ChainError::Generic(format!("malformed oracle program encoding: {e}")))
            })
            .transpose()
    }

    async fn get_balance(&self, address: &str) -> Result<u128, ChainError> {
        #[derive(serde::Deserialize)]
        struct Resp {
            amount: String,
        }
        let resp: Resp = self
            .get_json("cosmos/bank/v1beta1/balances", &[("address", address.to_string())])
            .await?;
        resp.amount
            .parse()
            .map_err(|_| ChainError::Generic("malformed balance amount".to_string()))
    }
}

#[async_trait]
impl crate::dispatcher::Broadcaster for HttpChainClient {
    async fn sign_and_broadcast(
        &self,
        signer_index: u32,
        messages: &[serde_json::Value],
        gas_option: seda_overlay_common::model::GasOption,
    ) -> Result<crate::types::TxResult, ChainError> {
        let gas = match gas_option {
            seda_overlay_common::model::GasOption::Auto => serde_json::json!("auto"),
            seda_overlay_common::model::GasOption::Fixed(amount) => serde_json::json!(amount),
        };

        let body = serde_json::json!({
            "signer_index": signer_index,
            "messages": messages,
            "gas": gas,
        });

        #[derive(serde::Deserialize)]
        struct Resp {
            tx_hash: String,
            height: u64,
            code: u32,
            raw_log: String,
        }
        let resp: Resp = self.post_json("cosmos/tx/v1beta1/txs", &body).await?;
        let tx_hash: Hash = resp
            .tx_hash
            .parse()
            .map_err(|_| ChainError::Generic("malformed tx hash in broadcast response".to_string()))?;

        if resp.code != 0 {
            return Err(ChainError::classify(&resp.raw_log));
        }

        Ok(crate::types::TxResult {
            tx_hash,
            height: resp.height,
            code: resp.code,
            raw_log: resp.raw_log,
        })
    }
}

pub type SharedChainClient = Arc<dyn ChainClient>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_with_single_slash() {
        let client = HttpChainClient::new(HttpChainClientConfig {
            rpc: "http://localhost:26657/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.url("/status"), "http://localhost:26657/status");
        assert_eq!(client.url("status"), "http://localhost:26657/status");
    }
}

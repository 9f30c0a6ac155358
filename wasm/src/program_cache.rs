//! On-disk oracle program cache, `§4.5`. The binary cache is the node's
//! only persisted state besides logs; deleting it is always safe since a
//! miss just re-fetches from the chain.

use std::path::{Path, PathBuf};

use log::debug;

use seda_overlay_chain::ChainClient;
use seda_overlay_common::crypto::Hash;

use crate::error::WasmError;

pub struct ProgramCache {
    cache_dir: PathBuf,
    vm_version: String,
}

impl ProgramCache {
    pub fn new(cache_dir: impl Into<PathBuf>, vm_version: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            vm_version: vm_version.into(),
        }
    }

    fn path_for(&self, exec_program_id: Hash) -> PathBuf {
        self.cache_dir
            .join(format!("{}_metered_{}.wasm", exec_program_id.to_hex(), self.vm_version))
    }

    /// Tries disk first, then the chain; a chain fetch is written back to
    /// disk best-effort (a write failure doesn't block returning the bytes).
    pub async fn get_oracle_program(
        &self,
        client: &dyn ChainClient,
        exec_program_id: Hash,
    ) -> Result<Vec<u8>, WasmError> {
        let path = self.path_for(exec_program_id);

        if let Some(bytes) = read_if_exists(&path).await? {
            debug!("oracle program {exec_program_id} served from disk cache");
            return Ok(bytes);
        }

        let bytes = client
            .query_oracle_program(exec_program_id)
            .await
            .map_err(WasmError::from)?
            .ok_or_else(|| WasmError::ProgramNotFound(exec_program_id.to_hex()))?;

        if let Some(parent) = path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            debug!("failed to persist oracle program {exec_program_id} to disk: {e}");
        }

        Ok(bytes)
    }
}

async fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>, WasmError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(WasmError::from(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use seda_overlay_chain::ChainError;
    use seda_overlay_common::model::DataRequest;

    struct StubClient {
        program: Vec<u8>,
    }

    #[async_trait]
    impl ChainClient for StubClient {
        async fn query_dr_status_list(
            &self,
            _offset: u32,
            _limit: u32,
        ) -> Result<seda_overlay_chain::types::DrStatusPage, ChainError> {
            unimplemented!()
        }
        async fn query_dr(&self, _dr_id: Hash) -> Result<Option<DataRequest>, ChainError> {
            unimplemented!()
        }
        async fn query_dr_config(&self) -> Result<seda_overlay_chain::types::DrConfig, ChainError> {
            unimplemented!()
        }
        async fn query_stakers(&self) -> Result<Vec<seda_overlay_chain::types::Staker>, ChainError> {
            unimplemented!()
        }
        async fn query_staking_config(&self) -> Result<seda_overlay_chain::types::StakingConfig, ChainError> {
            unimplemented!()
        }
        async fn query_staker(&self, _identity_id: &str) -> Result<Option<seda_overlay_chain::types::Staker>, ChainError> {
            unimplemented!()
        }
        async fn query_staker_and_seq(
            &self,
            _identity_id: &str,
        ) -> Result<seda_overlay_chain::types::StakerAndSeq, ChainError> {
            unimplemented!()
        }
        async fn query_block_height(&self) -> Result<u64, ChainError> {
            unimplemented!()
        }
        async fn query_block(&self, _height: u64) -> Result<seda_overlay_chain::types::Block, ChainError> {
            unimplemented!()
        }
        async fn query_oracle_program(&self, _exec_program_id: Hash) -> Result<Option<Vec<u8>>, ChainError> {
            Ok(Some(self.program.clone()))
        }
        async fn get_balance(&self, _address: &str) -> Result<u128, ChainError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn disk_hit_skips_chain_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ProgramCache::new(dir.path(), "v1");
        let exec_program_id = seda_overlay_common::crypto::keccak256(&[b"prog"]);
        let path = cache.path_for(exec_program_id);
        tokio::fs::write(&path, b"cached-bytes").await.unwrap();

        let client = StubClient {
            program: b"from-chain".to_vec(),
        };
        let bytes = cache.get_oracle_program(&client, exec_program_id).await.unwrap();
        assert_eq!(bytes, b"cached-bytes");
    }

    #[tokio::test]
    async fn chain_fetch_populates_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ProgramCache::new(dir.path(), "v1");
        let exec_program_id = seda_overlay_common::crypto::keccak256(&[b"prog2"]);
        let client = StubClient {
            program: b"from-chain".to_vec(),
        };

        let bytes = cache.get_oracle_program(&client, exec_program_id).await.unwrap();
        assert_eq!(bytes, b"from-chain");

        let persisted = tokio::fs::read(cache.path_for(exec_program_id)).await.unwrap();
        assert_eq!(persisted, b"from-chain");
    }
}

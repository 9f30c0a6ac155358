//! VM adapter capability set, `§4.5`: the three host calls a running oracle
//! program can make back out to the node. Kept as a narrow trait so the
//! executor can be driven by a test double without a real HTTP stack.

use std::net::IpAddr;

use async_trait::async_trait;
use log::warn;
use reqwest::Client as HttpClient;

use seda_overlay_common::crypto::{keccak256, prove, verify, Identity, Proof, PublicKey};

use crate::error::WasmError;

#[derive(Debug, Clone)]
pub struct HttpFetchResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait VmAdapter: Send + Sync {
    async fn http_fetch(&self, url: &str, method: &str, headers: &[(String, String)], body: &[u8]) -> Result<HttpFetchResponse, WasmError>;

    /// Signs a proxy proof, attaches it as `x-seda-proof`, and verifies the
    /// response's `x-seda-signature` against the declared `x-seda-publickey`.
    /// Returns the proxy public key used, for `usedProxyPublicKeys`.
    async fn proxy_http_fetch(
        &self,
        url: &str,
        method: &str,
        headers: &[(String, String)],
        body: &[u8],
    ) -> Result<(HttpFetchResponse, Vec<u8>), WasmError>;

    /// `gasCost = proxyFee / gasPrice`, derived from an `OPTIONS` prefetch
    /// that returns the proxy's fee and public key.
    async fn get_proxy_http_gas_cost(&self, url: &str, gas_price: u128) -> Result<u64, WasmError>;
}

pub struct HttpVmAdapter {
    http: HttpClient,
    identity: Identity,
    dr_id: seda_overlay_common::crypto::Hash,
    chain_id: String,
    core_contract_address: String,
    block_localhost: bool,
}

impl HttpVmAdapter {
    pub fn new(
        identity: Identity,
        dr_id: seda_overlay_common::crypto::Hash,
        chain_id: String,
        core_contract_address: String,
        block_localhost: bool,
    ) -> Self {
        Self {
            http: HttpClient::new(),
            identity,
            dr_id,
            chain_id,
            core_contract_address,
            block_localhost,
        }
    }

    fn check_not_loopback(&self, url: &str) -> Result<(), WasmError> {
        if !self.block_localhost {
            return Ok(());
        }

        let parsed = reqwest::Url::parse(url).map_err(|e| WasmError::AdapterBlocked(e.to_string()))?;
        if let Some(host) = parsed.host_str() {
            if host == "localhost" {
                return Err(WasmError::AdapterBlocked(format!("loopback host blocked: {host}")));
            }
            if let Ok(ip) = host.parse::<IpAddr>() {
                if ip.is_loopback() {
                    return Err(WasmError::AdapterBlocked(format!("loopback address blocked: {ip}")));
                }
            }
        }
        Ok(())
    }

    /// `keccak256("proxy" ‖ drId ‖ chainId ‖ coreContractAddress)`, signed
    /// with the executing identity's private key and sent as `x-seda-proof`.
    fn proxy_proof_header(&self) -> String {
        let hash = keccak256(&[
            b"proxy",
            self.dr_id.as_ref(),
            self.chain_id.as_bytes(),
            self.core_contract_address.as_bytes(),
        ]);
        prove(&self.identity.private_key, &hash).to_hex()
    }
}

#[async_trait]
impl VmAdapter for HttpVmAdapter {
    async fn http_fetch(
        &self,
        url: &str,
        method: &str,
        headers: &[(String, String)],
        body: &[u8],
    ) -> Result<HttpFetchResponse, WasmError> {
        self.check_not_loopback(url)?;

        let mut request = self
            .http
            .request(method.parse().map_err(|_| WasmError::AdapterBlocked(format!("invalid method {method}")))?, url);
        for (key, value) in headers {
            request = request.header(key, value);
        }
        if !body.is_empty() {
            request = request.body(body.to_vec());
        }

        let response = request
            .send()
            .await
            .map_err(|e| WasmError::Execution(e.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| WasmError::Execution(e.to_string()))?
            .to_vec();

        Ok(HttpFetchResponse { status, headers, body })
    }

    async fn proxy_http_fetch(
        &self,
        url: &str,
        method: &str,
        headers: &[(String, String)],
        body: &[u8],
    ) -> Result<(HttpFetchResponse, Vec<u8>), WasmError> {
        self.check_not_loopback(url)?;

        let mut full_headers = headers.to_vec();
        full_headers.push(("x-seda-proof".to_string(), self.proxy_proof_header()));

        let response = self.http_fetch(url, method, &full_headers, body).await?;

        let declared_public_key = response
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("x-seda-publickey"))
            .map(|(_, v)| v.clone());
        let signature = response
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("x-seda-signature"))
            .map(|(_, v)| v.clone());

        let Some(public_key_hex) = declared_public_key else {
            warn!("proxy response for {url} missing x-seda-publickey");
            return Err(WasmError::Execution("proxy response missing public key header".to_string()));
        };
        let Some(signature_hex) = signature else {
            return Err(WasmError::Execution("proxy response missing signature header".to_string()));
        };

        let proxy_public_key = verify_proxy_response(&public_key_hex, &signature_hex, &response.body)
            .map_err(|e| {
                warn!("proxy response for {url} failed signature verification: {e}");
                e
            })?;

        Ok((response, proxy_public_key))
    }

    async fn get_proxy_http_gas_cost(&self, url: &str, gas_price: u128) -> Result<u64, WasmError> {
        let response = self.http_fetch(url, "OPTIONS", &[], &[]).await?;

        let fee: u128 = response
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("x-seda-fee"))
            .and_then(|(_, v)| v.parse().ok())
            .ok_or_else(|| WasmError::Execution("proxy OPTIONS prefetch missing x-seda-fee".to_string()))?;

        if gas_price == 0 {
            return Err(WasmError::Execution("gas price is zero".to_string()));
        }

        Ok((fee / gas_price) as u64)
    }
}

/// Verifies a proxy's `x-seda-signature` (over the raw response body)
/// against its declared `x-seda-publickey`. Returns the decoded public key
/// bytes on success, for `usedProxyPublicKeys`.
fn verify_proxy_response(public_key_hex: &str, signature_hex: &str, body: &[u8]) -> Result<Vec<u8>, WasmError> {
    let proxy_public_key = hex::decode(public_key_hex.trim_start_matches("0x"))
        .map_err(|_| WasmError::Execution("malformed proxy public key".to_string()))?;
    let public_key =
        PublicKey::from_bytes(&proxy_public_key).map_err(|_| WasmError::Execution("malformed proxy public key".to_string()))?;

    let signature_bytes = hex::decode(signature_hex.trim_start_matches("0x"))
        .map_err(|_| WasmError::Execution("malformed proxy signature".to_string()))?;
    let proof =
        Proof::from_bytes(&signature_bytes).map_err(|_| WasmError::Execution("malformed proxy signature".to_string()))?;

    let body_hash = keccak256(&[body]);
    if !verify(&public_key, &body_hash, &proof) {
        return Err(WasmError::Execution("proxy response signature verification failed".to_string()));
    }

    Ok(proxy_public_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use seda_overlay_common::crypto::PrivateKey;

    #[test]
    fn verify_proxy_response_accepts_a_genuine_signature() {
        let private_key = PrivateKey::from_bytes(&[7u8; 32]).unwrap();
        let public_key = private_key.public_key();
        let body = b"proxy response body";
        let hash = keccak256(&[body.as_slice()]);
        let proof = prove(&private_key, &hash);

        let result = verify_proxy_response(&public_key.to_hex(), &proof.to_hex(), body);
        assert_eq!(result.unwrap(), public_key.as_bytes().to_vec());
    }

    #[test]
    fn verify_proxy_response_rejects_a_signature_over_a_different_body() {
        let private_key = PrivateKey::from_bytes(&[7u8; 32]).unwrap();
        let public_key = private_key.public_key();
        let hash = keccak256(&[b"original body".as_slice()]);
        let proof = prove(&private_key, &hash);

        let result = verify_proxy_response(&public_key.to_hex(), &proof.to_hex(), b"tampered body");
        assert!(result.is_err());
    }

    #[test]
    fn verify_proxy_response_rejects_a_foreign_public_key() {
        let signer = PrivateKey::from_bytes(&[7u8; 32]).unwrap();
        let impostor = PrivateKey::from_bytes(&[9u8; 32]).unwrap();
        let body = b"proxy response body";
        let hash = keccak256(&[body.as_slice()]);
        let proof = prove(&signer, &hash);

        let result = verify_proxy_response(&impostor.public_key().to_hex(), &proof.to_hex(), body);
        assert!(result.is_err());
    }
}

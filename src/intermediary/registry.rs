//! Discovered-LP registry: envelope verification, advertised services,
//! per-token reputation and liquidity caches (§4.2, §3 Intermediary).

use std::collections::HashMap;
use std::sync::RwLock;

use rand::RngCore;

use crate::error::{Error, Result};
use crate::signature::{recover_pubkey, tagged_hash};

use super::client::IntermediaryClient;
use super::types::{AdvertisedService, Reputation};

/// A discovered intermediary's addresses per chain and advertised terms.
#[derive(Debug, Clone)]
pub struct Intermediary {
    pub url: String,
    pub public_key: String,
    /// Chain id -> address for that chain.
    pub addresses: HashMap<String, String>,
    pub services: HashMap<String, AdvertisedService>,
    pub reputation: HashMap<String, Reputation>,
    /// Cached on-chain balance per token, refreshed by the liquidity check.
    pub liquidity: HashMap<String, u64>,
}

/// Registry of discovered LPs, keyed by base URL.
pub struct IntermediaryRegistry {
    entries: RwLock<HashMap<String, Intermediary>>,
}

impl Default for IntermediaryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IntermediaryRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Discover (or re-verify) an LP at `url` for `chain`.
    ///
    /// Generates a random 32-byte nonce for the `/info` call and rejects
    /// the LP if its signed envelope does not echo that exact nonce —
    /// the envelope-verification check in §4.2.
    pub async fn discover(&self, client: &IntermediaryClient, chain: &str) -> Result<()> {
        let mut nonce_bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce_hex = hex::encode(nonce_bytes);

        let info = client.get_info(&nonce_hex, chain).await?;
        let echoed = info
            .envelope
            .get("nonce")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Intermediary("info envelope missing nonce field".to_string()))?;

        if echoed != nonce_hex {
            return Err(Error::Intermediary(
                "info envelope nonce does not match requested nonce".to_string(),
            ));
        }

        let mut addresses: HashMap<String, String> = info
            .chains
            .iter()
            .map(|(id, chain_info)| (id.clone(), chain_info.address.clone()))
            .collect();
        addresses.insert(chain.to_string(), info.address.clone());

        // `/info` carries no separate public-key field (§6); the LP's key is
        // recovered from its recoverable-ECDSA signature over the envelope.
        let envelope_bytes = serde_json::to_vec(&info.envelope)
            .map_err(|e| Error::Parse(format!("invalid info envelope json: {e}")))?;
        let message_hash = tagged_hash("swap/lp-info", &envelope_bytes);
        let public_key = recover_pubkey(&message_hash, &info.signature)?;

        let entry = Intermediary {
            url: client.base_url().to_string(),
            public_key: hex::encode(public_key.serialize()),
            addresses,
            services: HashMap::new(),
            reputation: HashMap::new(),
            liquidity: HashMap::new(),
        };

        let mut entries = self.entries.write().unwrap();
        entries.insert(client.base_url().to_string(), entry);
        Ok(())
    }

    pub fn get(&self, url: &str) -> Option<Intermediary> {
        self.entries.read().unwrap().get(url).cloned()
    }

    pub fn list(&self) -> Vec<Intermediary> {
        self.entries.read().unwrap().values().cloned().collect()
    }

    /// Remove an LP, e.g. after the caller chooses to blacklist it for
    /// the session following an `IntermediaryError` (§7 — no automatic
    /// persisted blacklist).
    pub fn remove(&self, url: &str) {
        self.entries.write().unwrap().remove(url);
    }

    pub fn record_liquidity(&self, url: &str, token: &str, balance: u64) {
        if let Some(entry) = self.entries.write().unwrap().get_mut(url) {
            entry.liquidity.insert(token.to_string(), balance);
        }
    }

    pub fn record_success(&self, url: &str, token: &str, volume: u64) {
        if let Some(entry) = self.entries.write().unwrap().get_mut(url) {
            let rep = entry.reputation.entry(token.to_string()).or_default();
            rep.success_volume += volume;
            rep.success_count += 1;
        }
    }

    pub fn record_failure(&self, url: &str, token: &str, volume: u64) {
        if let Some(entry) = self.entries.write().unwrap().get_mut(url) {
            let rep = entry.reputation.entry(token.to_string()).or_default();
            rep.fail_volume += volume;
            rep.fail_count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_registry_is_empty() {
        let registry = IntermediaryRegistry::new();
        assert!(registry.list().is_empty());
    }

    #[test]
    fn reputation_accumulates() {
        let registry = IntermediaryRegistry::new();
        registry.entries.write().unwrap().insert(
            "https://lp.example".to_string(),
            Intermediary {
                url: "https://lp.example".to_string(),
                public_key: "pk".to_string(),
                addresses: HashMap::new(),
                services: HashMap::new(),
                reputation: HashMap::new(),
                liquidity: HashMap::new(),
            },
        );
        registry.record_success("https://lp.example", "X", 1000);
        registry.record_failure("https://lp.example", "X", 500);

        let entry = registry.get("https://lp.example").unwrap();
        let rep = entry.reputation.get("X").unwrap();
        assert_eq!(rep.success_volume, 1000);
        assert_eq!(rep.success_count, 1);
        assert_eq!(rep.fail_volume, 500);
        assert_eq!(rep.fail_count, 1);
    }
}

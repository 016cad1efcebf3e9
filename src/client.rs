//! The orchestrator: wires the price oracle, intermediary registry, swap
//! index and event reactor into the four swap-direction entry points a
//! host application calls (§1 Architecture).

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::SdkConfig;
use crate::contract::{BitcoinRpc, ChainEvents, LightningApi, SwapContract};
use crate::error::{Error, Result};
use crate::event_reactor;
use crate::intermediary::{IntermediaryClient, IntermediaryRegistry};
use crate::price::PriceOracle;
use crate::storage::SwapStorage;
use crate::swap::index::SwapIndex;
use crate::swap::wrapper::{from_btc, from_btcln, quote_all, to_btc, to_btcln, QuoteOutcome};
use crate::types::{Network, Swap};

/// Everything the orchestrator needs from the host application: the
/// chain-specific adapters it never implements itself (§1 Non-goals).
pub struct Collaborators {
    pub contract: Arc<dyn SwapContract>,
    pub chain_events: Arc<dyn ChainEvents>,
    pub bitcoin_rpc: Arc<dyn BitcoinRpc>,
    pub lightning_api: Arc<dyn LightningApi>,
    pub storage: Arc<dyn SwapStorage>,
}

/// The swap client: one instance per smart chain + network pair.
pub struct Client {
    pub config: SdkConfig,
    pub chain: String,
    pub network: Network,
    pub oracle: Arc<PriceOracle>,
    pub registry: Arc<IntermediaryRegistry>,
    pub index: Arc<SwapIndex>,
    collaborators: Collaborators,
    reactor_cancel: CancellationToken,
    reactor_handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    pub fn new(
        config: SdkConfig,
        chain: impl Into<String>,
        network: Network,
        oracle: Arc<PriceOracle>,
        collaborators: Collaborators,
    ) -> Self {
        let registry = Arc::new(IntermediaryRegistry::new());
        let index = Arc::new(SwapIndex::new(collaborators.storage.clone()));
        Self {
            config,
            chain: chain.into(),
            network,
            oracle,
            registry,
            index,
            collaborators,
            reactor_cancel: CancellationToken::new(),
            reactor_handle: tokio::sync::Mutex::new(None),
        }
    }

    /// Load persisted swaps and start the background event reactor. Must
    /// be called once before any swap is quoted or committed (§5).
    pub async fn init(&self) -> Result<()> {
        let buffered = self.index.load_all().await?;
        for event in buffered {
            if let Err(e) = event_reactor::apply_event(&self.index, &event).await {
                log::warn!("failed to apply buffered chain event: {e}");
            }
        }

        let chain_events = self.collaborators.chain_events.clone();
        let index = self.index.clone();
        let cancel = self.reactor_cancel.clone();
        let handle = tokio::spawn(event_reactor::run(chain_events, index, cancel, Duration::from_secs(5)));
        *self.reactor_handle.lock().await = Some(handle);
        Ok(())
    }

    /// Stop the background event reactor, cascading cancellation to any
    /// in-flight per-LP quote fan-outs sharing this token's lineage (§9).
    pub async fn shutdown(&self) {
        self.reactor_cancel.cancel();
        if let Some(handle) = self.reactor_handle.lock().await.take() {
            let _ = handle.await;
        }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<crate::swap::index::SwapStateChanged> {
        self.index.subscribe()
    }

    fn discovered_clients(&self) -> Vec<(String, IntermediaryClient)> {
        self.registry
            .list()
            .into_iter()
            .map(|lp| {
                let client = IntermediaryClient::new(
                    lp.url.clone(),
                    self.config.http_get_timeout,
                    self.config.http_post_timeout,
                );
                (lp.url, client)
            })
            .collect()
    }

    /// Fan a ToBTC quote request out to every discovered LP, returning
    /// every outcome (successes and per-LP failures alike) so the caller
    /// can pick the cheapest valid quote (§4.4, §7).
    pub async fn quote_to_btc(&self, params: Arc<to_btc::ToBtcParams>, now: i64) -> Vec<QuoteOutcome> {
        let lps = self.discovered_clients();
        let config = self.config.clone();
        let chain = self.chain.clone();

        quote_all(
            lps.iter().map(|(url, _)| url.clone()).collect(),
            self.reactor_cancel.child_token(),
            move |lp_url, _cancel| {
                let config = config.clone();
                let chain = chain.clone();
                let params = params.clone();
                let client = lps
                    .iter()
                    .find(|(url, _)| *url == lp_url)
                    .map(|(_, c)| c.clone())
                    .expect("lp_url came from the same discovered list");
                async move { to_btc::quote_one(&config, &client, &chain, &lp_url, &params, now).await }
            },
        )
        .await
    }

    pub async fn quote_to_btcln(&self, params: Arc<to_btcln::ToBtcLnParams>, now: i64) -> Vec<QuoteOutcome> {
        let lps = self.discovered_clients();
        let config = self.config.clone();
        let chain = self.chain.clone();

        quote_all(
            lps.iter().map(|(url, _)| url.clone()).collect(),
            self.reactor_cancel.child_token(),
            move |lp_url, _cancel| {
                let config = config.clone();
                let chain = chain.clone();
                let params = params.clone();
                let client = lps
                    .iter()
                    .find(|(url, _)| *url == lp_url)
                    .map(|(_, c)| c.clone())
                    .expect("lp_url came from the same discovered list");
                async move { to_btcln::quote_one(&config, &client, &chain, &lp_url, &params, now).await }
            },
        )
        .await
    }

    pub async fn commit_to_btc(&self, payment_hash_hex: &str) -> Result<String> {
        to_btc::commit(&self.index, self.collaborators.contract.as_ref(), payment_hash_hex).await
    }

    pub async fn refund_to_btc(&self, payment_hash_hex: &str) -> Result<String> {
        to_btc::refund(&self.index, self.collaborators.contract.as_ref(), payment_hash_hex).await
    }

    pub async fn commit_to_btcln(&self, payment_hash_hex: &str) -> Result<String> {
        to_btcln::commit(&self.index, self.collaborators.contract.as_ref(), payment_hash_hex).await
    }

    pub async fn refund_to_btcln(&self, payment_hash_hex: &str) -> Result<String> {
        to_btcln::refund(&self.index, self.collaborators.contract.as_ref(), payment_hash_hex).await
    }

    /// Insert a freshly chosen quote into the registry (§4.4: the caller
    /// picks one `QuoteOutcome` from the fan-out and persists only that one).
    pub async fn accept_quote(&self, swap: Swap) -> Result<()> {
        self.index.insert(swap).await
    }

    pub async fn get_swap(&self, payment_hash_hex: &str) -> Option<Swap> {
        self.index.get(payment_hash_hex).await
    }

    pub async fn watch_from_btc_deposit(&self, payment_hash_hex: &str, cancel: &CancellationToken) -> Result<String> {
        from_btc::watch_and_claim(
            &self.index,
            self.collaborators.contract.as_ref(),
            self.collaborators.bitcoin_rpc.as_ref(),
            payment_hash_hex,
            cancel,
            Duration::from_secs(30),
        )
        .await
    }

    pub async fn poll_from_btcln_invoice(&self, payment_hash_hex: &str, cancel: &CancellationToken) -> Result<String> {
        let swap = self
            .index
            .get(payment_hash_hex)
            .await
            .ok_or_else(|| Error::SwapNotFound(payment_hash_hex.to_string()))?;
        let lp_url = self
            .registry
            .list()
            .into_iter()
            .find(|lp| lp.addresses.get(&self.chain) == Some(&swap.data.offerer))
            .map(|lp| lp.url)
            .ok_or_else(|| Error::Intermediary("no discovered LP matches this swap's offerer address".to_string()))?;
        let client = IntermediaryClient::new(lp_url, self.config.http_get_timeout, self.config.http_post_timeout);
        from_btcln::poll_and_claim(
            &self.index,
            &client,
            self.collaborators.contract.as_ref(),
            payment_hash_hex,
            cancel,
            Duration::from_secs(3),
        )
        .await
    }

    pub fn lightning_api(&self) -> &dyn LightningApi {
        self.collaborators.lightning_api.as_ref()
    }
}

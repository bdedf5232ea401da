//! Contract event harvesting over C-Chain JSON-RPC.
//!
//! For a contract and a list of event names the harvester:
//! 1. Reads the chain tip.
//! 2. Walks `[start_block, tip)` in windows of at most
//!    [`MAX_LOG_BLOCK_RANGE`] blocks, issuing one `eth_getLogs` per event
//!    and window.
//! 3. Decodes every log against the ABI and keeps one ordered list per event.
//! 4. Concatenates the lists in event order into a single [`Table`].

use std::future::Future;
use std::time::Duration;

use alloy::json_abi::Event;
use alloy::primitives::{Address, B256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log};
use anyhow::{Context, Result, anyhow};
use avax_stats::networks::MAX_LOG_BLOCK_RANGE;
use serde::{Deserialize, Serialize};

use crate::abi::{self, ContractInterface, EventRecord};
use crate::checkpoint::Checkpoint;
use crate::error::FetchError;
use crate::retry::RetryPolicy;
use crate::table::Table;
use crate::windows::{BlockWindow, BlockWindows};

/// Events exported by default: subscription starts, then stops.
pub const DEFAULT_EVENTS: [&str; 2] = ["NewSubscription", "StopSubscription"];

/// Per-request timeout for RPC calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Read access to contract logs.
pub trait LogSource {
    /// Current chain height.
    fn tip(&self) -> impl Future<Output = Result<u64, FetchError>> + Send;

    /// Logs emitted by `address` with first topic `topic0` inside `window`.
    fn logs(
        &self,
        address: Address,
        topic0: B256,
        window: BlockWindow,
    ) -> impl Future<Output = Result<Vec<Log>, FetchError>> + Send;
}

/// [`LogSource`] backed by an HTTP JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct RpcLogSource {
    provider: DynProvider,
}

impl RpcLogSource {
    /// Connect to the endpoint at `rpc_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn connect(rpc_url: &str) -> Result<Self> {
        let url = rpc_url
            .parse()
            .with_context(|| format!("invalid RPC URL: {rpc_url}"))?;
        Ok(Self {
            provider: ProviderBuilder::new().connect_http(url).erased(),
        })
    }
}

impl LogSource for RpcLogSource {
    async fn tip(&self) -> Result<u64, FetchError> {
        tokio::time::timeout(REQUEST_TIMEOUT, self.provider.get_block_number())
            .await
            .map_err(|_| FetchError::Transient("eth_blockNumber timed out".into()))?
            .map_err(FetchError::from)
    }

    async fn logs(
        &self,
        address: Address,
        topic0: B256,
        window: BlockWindow,
    ) -> Result<Vec<Log>, FetchError> {
        let filter = Filter::new()
            .address(address)
            .event_signature(topic0)
            .from_block(window.from)
            .to_block(window.to);

        tokio::time::timeout(REQUEST_TIMEOUT, self.provider.get_logs(&filter))
            .await
            .map_err(|_| FetchError::Transient("eth_getLogs timed out".into()))?
            .map_err(FetchError::from)
    }
}

/// What to harvest: a contract, the events of interest and where to start.
#[derive(Debug, Clone)]
pub struct EventsJob<'a> {
    contract: Address,
    start_block: u64,
    window: u64,
    events: Vec<&'a Event>,
}

impl<'a> EventsJob<'a> {
    /// Harvest `names` from `contract`, starting at `start_block`.
    ///
    /// # Errors
    ///
    /// Returns an error if `names` is empty or an event is not in `interface`.
    pub fn new<S: AsRef<str>>(
        interface: &'a ContractInterface,
        contract: Address,
        start_block: u64,
        names: &[S],
    ) -> Result<Self> {
        anyhow::ensure!(!names.is_empty(), "no events to harvest");
        let events = names
            .iter()
            .map(|n| interface.event(n.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            contract,
            start_block,
            window: MAX_LOG_BLOCK_RANGE,
            events,
        })
    }

    /// Override the `eth_getLogs` block window.
    #[must_use]
    pub fn with_window(mut self, blocks: u64) -> Self {
        self.window = blocks.max(1);
        self
    }

    /// Header of the exported table.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        abi::columns(&self.events)
    }

    fn event_names(&self) -> Vec<String> {
        self.events.iter().map(|e| e.name.clone()).collect()
    }
}

/// Progress of an event harvest, persisted in checkpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsState {
    /// Harvested contract.
    pub contract: Address,
    /// First block of the harvest.
    pub start_block: u64,
    /// Harvested events, in export order.
    pub events: Vec<String>,
    /// First block not yet queried.
    pub next_block: u64,
    /// Decoded records, one list per entry of `events`.
    pub records: Vec<Vec<EventRecord>>,
}

impl EventsState {
    fn fresh(job: &EventsJob<'_>) -> Self {
        Self {
            contract: job.contract,
            start_block: job.start_block,
            events: job.event_names(),
            next_block: job.start_block,
            records: vec![Vec::new(); job.events.len()],
        }
    }

    /// Whether a saved state continues the same harvest as `other`.
    fn continues(&self, other: &Self) -> bool {
        self.contract == other.contract
            && self.start_block == other.start_block
            && self.events == other.events
            && self.records.len() == self.events.len()
    }
}

fn resume(job: &EventsJob<'_>, checkpoint: Option<&Checkpoint>) -> Result<EventsState> {
    let fresh = EventsState::fresh(job);
    let Some(cp) = checkpoint else {
        return Ok(fresh);
    };
    match cp.load::<EventsState>()? {
        Some(saved) if saved.continues(&fresh) => Ok(saved),
        Some(_) => {
            tracing::warn!(
                path = %cp.path().display(),
                "checkpoint is for another harvest, starting fresh"
            );
            Ok(fresh)
        }
        None => Ok(fresh),
    }
}

/// Fetch and decode every event of `job` up to the current tip.
///
/// Any request that still fails after `retry` aborts the harvest; no
/// partial table is returned. With a checkpoint, progress is saved after
/// every window and a matching saved state is resumed.
///
/// # Errors
///
/// Returns an error if a request fails permanently, a log cannot be
/// decoded, or the checkpoint cannot be written.
pub async fn harvest<S: LogSource>(
    source: &S,
    job: &EventsJob<'_>,
    retry: &RetryPolicy,
    checkpoint: Option<&Checkpoint>,
) -> Result<Table> {
    let tip = retry
        .run("eth_blockNumber", || source.tip())
        .await
        .context("reading chain tip")?;
    let mut state = resume(job, checkpoint)?;

    tracing::info!(
        contract = %job.contract,
        from = state.next_block,
        tip,
        "harvesting events"
    );

    for window in BlockWindows::new(state.next_block, tip, job.window) {
        tracing::info!(from = window.from, to = window.to, "processing window");
        for (event, records) in job.events.iter().zip(state.records.iter_mut()) {
            let topic0 = event.selector();
            let logs = retry
                .run(&event.name, || source.logs(job.contract, topic0, window))
                .await
                .with_context(|| {
                    format!(
                        "fetching `{}` logs in blocks [{}, {}]",
                        event.name, window.from, window.to
                    )
                })?;
            for log in &logs {
                records.push(abi::decode_log(event, log)?);
            }
        }
        state.next_block = window.to + 1;
        if let Some(cp) = checkpoint {
            cp.save(&state)?;
        }
    }

    for (name, records) in state.events.iter().zip(&state.records) {
        tracing::info!(event = %name, count = records.len(), "events collected");
    }
    to_table(job, &state.records)
}

/// Lay out `records` (one list per job event) under the job's header.
///
/// # Errors
///
/// Returns an error if a row does not fit the header.
pub fn to_table(job: &EventsJob<'_>, records: &[Vec<EventRecord>]) -> Result<Table> {
    let mut table = Table::new(job.columns());
    for record in records.iter().flatten() {
        let row = record.row(table.columns());
        table.push(row)?;
    }
    Ok(table)
}

/// Harvest `job` with automatic RPC fallback.
///
/// Opens a source for each endpoint in `rpcs` with `connect`, in order,
/// until one harvest succeeds. When a checkpoint is configured the next
/// endpoint resumes where the failed one stopped.
///
/// # Errors
///
/// Returns the last error if *all* endpoints fail, or an error if `rpcs`
/// is empty.
pub async fn sync<S, C>(
    rpcs: &[String],
    connect: C,
    job: &EventsJob<'_>,
    retry: &RetryPolicy,
    checkpoint: Option<&Checkpoint>,
) -> Result<Table>
where
    S: LogSource,
    C: Fn(&str) -> Result<S>,
{
    let mut last_err = None;

    for (i, rpc_url) in rpcs.iter().enumerate() {
        tracing::info!(rpc = %rpc_url, "connecting");
        let result = match connect(rpc_url) {
            Ok(source) => harvest(&source, job, retry, checkpoint).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(table) => return Ok(table),
            Err(e) => {
                if let Some(next) = rpcs.get(i + 1) {
                    tracing::warn!(rpc = %rpc_url, %next, error = %e, "RPC failed, falling back");
                } else {
                    tracing::error!(rpc = %rpc_url, error = %e, "last RPC failed");
                }
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("no RPC endpoint configured")))
}

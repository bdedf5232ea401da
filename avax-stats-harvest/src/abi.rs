//! Contract interface loading and event log decoding.
//!
//! The interface is read from a compiler artifact (a JSON object with an
//! `abi` array, as emitted by Hardhat and Foundry). Decoded events are
//! flattened to `args.<name>` columns, with tuple components joined by dots.

use std::path::Path;

use alloy::dyn_abi::{DynSolValue, EventExt};
use alloy::hex;
use alloy::json_abi::{Event, JsonAbi, Param};
use alloy::primitives::{Address, B256};
use alloy::rpc::types::Log;
use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};

/// Prefix of every decoded argument column.
pub const ARG_PREFIX: &str = "args";

/// Log metadata columns, placed before the argument columns.
pub const LOG_COLUMNS: [&str; 7] = [
    "event",
    "logIndex",
    "transactionIndex",
    "transactionHash",
    "address",
    "blockHash",
    "blockNumber",
];

#[derive(Deserialize)]
struct Artifact {
    abi: JsonAbi,
}

/// The event side of a contract's ABI.
#[derive(Debug, Clone)]
pub struct ContractInterface {
    abi: JsonAbi,
}

impl ContractInterface {
    /// Load the `abi` field of a compiler artifact file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or has no valid `abi`.
    pub fn load(path: &Path) -> Result<Self> {
        let text =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_artifact(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parse an artifact from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not an object with a valid `abi` array.
    pub fn from_artifact(json: &str) -> Result<Self> {
        let artifact: Artifact = serde_json::from_str(json)?;
        Ok(Self { abi: artifact.abi })
    }

    /// Look up an event by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the ABI has no such event or overloads it.
    pub fn event(&self, name: &str) -> Result<&Event> {
        match self.abi.event(name).map(Vec::as_slice) {
            Some([event]) => Ok(event),
            Some([]) | None => bail!("event `{name}` not found in contract ABI"),
            Some(_) => bail!("event `{name}` is overloaded in contract ABI"),
        }
    }
}

/// Argument columns of `event`, in declaration order.
#[must_use]
pub fn arg_columns(event: &Event) -> Vec<String> {
    let mut out = Vec::new();
    for (i, input) in event.inputs.iter().enumerate() {
        let name = column_name(ARG_PREFIX, &input.name, i);
        push_columns(name, &input.ty, &input.components, &mut out);
    }
    out
}

fn push_columns(name: String, ty: &str, components: &[Param], out: &mut Vec<String>) {
    if ty == "tuple" && !components.is_empty() {
        for (i, c) in components.iter().enumerate() {
            push_columns(column_name(&name, &c.name, i), &c.ty, &c.components, out);
        }
    } else {
        out.push(name);
    }
}

fn column_name(prefix: &str, name: &str, index: usize) -> String {
    if name.is_empty() {
        format!("{prefix}.{index}")
    } else {
        format!("{prefix}.{name}")
    }
}

/// Header for a combined export of `events`.
///
/// [`LOG_COLUMNS`] come first, followed by the argument columns in the
/// order they are first declared across the events. The header depends
/// only on the ABI, so an export without any event still has one.
#[must_use]
pub fn columns(events: &[&Event]) -> Vec<String> {
    let mut out: Vec<String> = LOG_COLUMNS.iter().map(|c| (*c).to_owned()).collect();
    for name in events.iter().flat_map(|e| arg_columns(e)) {
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

/// A decoded event log, flattened for export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Event name.
    pub event: String,
    /// `(column, value)` pairs for every decoded argument.
    pub args: Vec<(String, String)>,
    /// Position of the log within its block.
    pub log_index: u64,
    /// Position of the emitting transaction within its block.
    pub transaction_index: u64,
    /// Emitting transaction.
    pub transaction_hash: B256,
    /// Emitting contract.
    pub address: Address,
    /// Block containing the log.
    pub block_hash: B256,
    /// Height of the block containing the log.
    pub block_number: u64,
}

impl EventRecord {
    /// Render the cell for `column`, or `None` if this event lacks it.
    #[must_use]
    pub fn cell(&self, column: &str) -> Option<String> {
        match column {
            "event" => Some(self.event.clone()),
            "logIndex" => Some(self.log_index.to_string()),
            "transactionIndex" => Some(self.transaction_index.to_string()),
            "transactionHash" => Some(format!("{:#x}", self.transaction_hash)),
            "address" => Some(self.address.to_checksum(None)),
            "blockHash" => Some(format!("{:#x}", self.block_hash)),
            "blockNumber" => Some(self.block_number.to_string()),
            other => self
                .args
                .iter()
                .find(|(name, _)| name == other)
                .map(|(_, value)| value.clone()),
        }
    }

    /// Render a full row for the given header.
    #[must_use]
    pub fn row(&self, columns: &[String]) -> Vec<Option<String>> {
        columns.iter().map(|c| self.cell(c)).collect()
    }
}

/// Decode `log` as an instance of `event`.
///
/// # Errors
///
/// Returns an error if the log is still pending (no block or transaction
/// metadata) or its topics and data do not match the event signature.
pub fn decode_log(event: &Event, log: &Log) -> Result<EventRecord> {
    let (
        Some(block_number),
        Some(block_hash),
        Some(transaction_hash),
        Some(transaction_index),
        Some(log_index),
    ) = (
        log.block_number,
        log.block_hash,
        log.transaction_hash,
        log.transaction_index,
        log.log_index,
    ) else {
        bail!("log of `{}` is missing block or transaction metadata", event.name);
    };

    ensure!(
        event.anonymous || log.topics().first() == Some(&event.selector()),
        "log in tx {transaction_hash:#x} is not a `{}` event",
        event.name
    );
    let decoded = event
        .decode_log(log.data())
        .with_context(|| format!("decoding `{}` log in tx {transaction_hash:#x}", event.name))?;

    let mut indexed = decoded.indexed.into_iter();
    let mut body = decoded.body.into_iter();
    let mut args = Vec::with_capacity(event.inputs.len());
    for (i, input) in event.inputs.iter().enumerate() {
        let value = if input.indexed {
            indexed.next()
        } else {
            body.next()
        };
        let value = value.with_context(|| format!("`{}` argument {i} not decoded", event.name))?;
        flatten(
            column_name(ARG_PREFIX, &input.name, i),
            &input.components,
            &value,
            &mut args,
        );
    }
    ensure!(
        indexed.next().is_none() && body.next().is_none(),
        "`{}` log has more values than declared inputs",
        event.name
    );

    Ok(EventRecord {
        event: event.name.clone(),
        args,
        log_index,
        transaction_index,
        transaction_hash,
        address: log.address(),
        block_hash,
        block_number,
    })
}

fn flatten(
    name: String,
    components: &[Param],
    value: &DynSolValue,
    out: &mut Vec<(String, String)>,
) {
    match value {
        DynSolValue::Tuple(values) if !components.is_empty() => {
            for (i, (c, v)) in components.iter().zip(values).enumerate() {
                flatten(column_name(&name, &c.name, i), &c.components, v, out);
            }
        }
        _ => out.push((name, render(value))),
    }
}

/// Render a decoded value as a single cell.
///
/// Addresses are checksummed, integers decimal, byte strings `0x` hex.
/// Arrays and unnamed tuples become JSON arrays of rendered elements.
#[must_use]
pub fn render(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Int(i, _) => i.to_string(),
        DynSolValue::Uint(u, _) => u.to_string(),
        DynSolValue::FixedBytes(word, size) => {
            hex::encode_prefixed(word.get(..*size).unwrap_or_default())
        }
        DynSolValue::Address(a) => a.to_checksum(None),
        DynSolValue::Function(f) => hex::encode_prefixed(f.as_slice()),
        DynSolValue::Bytes(b) => hex::encode_prefixed(b),
        DynSolValue::String(s) => s.clone(),
        DynSolValue::Array(values)
        | DynSolValue::FixedArray(values)
        | DynSolValue::Tuple(values) => {
            let cells: Vec<String> = values.iter().map(render).collect();
            serde_json::Value::from(cells).to_string()
        }
        other => format!("{other:?}"),
    }
}

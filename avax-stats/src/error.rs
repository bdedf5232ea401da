//! Error type for the `avax-stats` crate.

/// Errors produced while interpreting Avalanche / Avascan data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The network name is not one of the known networks.
    #[error("unknown network `{0}` (expected `mainnet` or `testnet`)")]
    UnknownNetwork(String),

    /// The validation status is not one the API accepts.
    #[error("unknown validation status `{0}` (expected `active` or `pending`)")]
    UnknownStatus(String),

    /// A validation record or page could not be decoded.
    #[error("malformed validation payload: {0}")]
    Decode(#[from] serde_json::Error),
}

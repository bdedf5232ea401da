//! Avalanche stats harvesters.
//!
//! Two independent fetch-transform-write pipelines:
//! - [`events`] pages the C-Chain through JSON-RPC and exports decoded
//!   contract events.
//! - [`validators`] follows the Avascan validations cursor and exports one
//!   flattened row per validator.
//!
//! Both write their result through [`table`] as CSV or Parquet.

pub mod abi;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod events;
pub mod retry;
pub mod table;
pub mod validators;
pub mod windows;

pub use error::FetchError;

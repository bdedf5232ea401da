//! Avalanche network definitions and Avascan staking types.
//!
//! Shared by the harvesters in `avax-stats-harvest`: the known networks and
//! their endpoints, the subscriptions contract deployment, the nested
//! validation record returned by the Avascan API, and its fixed flattened
//! projection.

pub mod error;
pub mod flat;
pub mod networks;
pub mod validation;

pub use error::Error;
pub use flat::FlatValidation;
pub use networks::{Network, Status};
pub use validation::{Link, Validation, ValidationsPage};

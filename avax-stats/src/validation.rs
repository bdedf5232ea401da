//! Avascan staking validation payloads.
//!
//! Models the JSON returned by `GET /v2/network/{network}/staking/validations`.
//! Fields the API always sends must be present, so their absence is a
//! decode error, although the API may still send them as `null`.
//! Descriptive fields that only some validators publish are [`Option`]s
//! defaulting to [`None`].

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::Error;

/// A scalar the API may send either as a JSON string or a JSON number.
///
/// Amounts in nAVAX arrive as decimal strings, ratios and counters as
/// numbers. Numbers keep their parsed form so that rendering is lossless.
/// An explicit `null` is accepted and renders as an empty cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// A JSON number, kept in its parsed form.
    Number(serde_json::Number),
    /// A JSON string.
    Text(String),
    /// A JSON boolean.
    Bool(bool),
    /// An explicit JSON `null`.
    Null,
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null => Ok(()),
        }
    }
}

impl From<u64> for Scalar {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

/// A field that must be present but may be `null`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}

/// One page of the validations listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationsPage {
    /// Validations on this page, in API order.
    pub items: Vec<Validation>,

    /// Pagination links. Missing entirely on some final pages.
    #[serde(default)]
    pub link: Link,
}

impl ValidationsPage {
    /// Decode a page from the raw response body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the body is not a valid page, including
    /// when an item lacks a required field.
    pub fn from_json(body: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(body)?)
    }

    /// Cursor for the following page, or [`None`] on the last page.
    #[must_use]
    pub fn next_token(&self) -> Option<&str> {
        self.link.next_token.as_deref()
    }
}

/// Pagination block of a [`ValidationsPage`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    /// Relative URL of the next page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    /// Opaque cursor to pass as `next` on the following request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

/// A single validation period of a node on a subnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    /// `NodeID-...` identifier.
    pub node_id: String,

    /// Subnet being validated.
    pub subnet_id: String,

    /// Display name registered on Avascan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Operator of the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,

    /// Icon URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// P-Chain addresses receiving rewards.
    #[serde(deserialize_with = "nullable")]
    pub beneficiaries: Option<Vec<String>>,

    /// ISO-8601 start of the validation period.
    pub start_time: String,

    /// ISO-8601 end of the validation period.
    pub end_time: String,

    /// Staked asset.
    pub asset_id: String,

    /// Stake weight.
    pub stake: Stake,
    /// Potential rewards.
    pub rewards: Rewards,
    /// Delegation parameters.
    pub delegations: Delegations,
    /// Node health and placement.
    pub node: Node,
}

/// Stake weight of a validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stake {
    /// nAVAX staked by the validator itself.
    pub from_self: Scalar,
    /// nAVAX delegated to the validator.
    pub from_delegations: Scalar,
    /// Sum of both, in nAVAX.
    pub total: Scalar,
    /// Fraction of the total network stake.
    pub network_share: Scalar,
}

/// Potential rewards of a validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rewards {
    /// Reward on the validator's own stake, in nAVAX.
    pub from_self: Scalar,
    /// Fees earned from delegators, in nAVAX.
    pub from_delegations: Scalar,
    /// Sum of both, in nAVAX.
    pub total: Scalar,
}

/// Delegation parameters and totals of a validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delegations {
    /// Number of active delegations.
    pub count: Scalar,
    /// Fee charged to delegators, as a fraction.
    pub delegation_fee: Scalar,
    /// Maximum yield a delegator can expect.
    pub max_yield: Scalar,
    /// Remaining nAVAX that can still be delegated.
    pub available_delegation_capacity: Scalar,
    /// Maximum nAVAX the validator accepts.
    pub total_delegation_capacity: Scalar,
    /// Delegator rewards before fees.
    pub gross_delegation_reward: Scalar,
    /// Delegator rewards after fees.
    pub net_delegation_reward: Scalar,
}

/// Health and placement of the validating node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Average observed uptime, as a fraction.
    pub avg_uptime: Scalar,
    /// Probe counters.
    pub responsiveness: Responsiveness,

    /// AvalancheGo version string, e.g. `avalanche/1.10.1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Public IP address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// Internet service provider of `ip`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isp: Option<String>,

    /// Geolocation of `ip`.
    pub location: Location,
}

/// Responsiveness probe counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Responsiveness {
    /// Probes sent.
    pub checks_count: Scalar,
    /// Probes answered.
    pub positive_checks_count: Scalar,
}

/// Geolocation of the node's IP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// City name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    /// Country name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

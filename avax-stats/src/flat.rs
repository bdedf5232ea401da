//! Fixed single-level projection of a [`Validation`].
//!
//! Downstream consumers read the exported CSV by column name, so both the
//! names and their order in [`COLUMNS`] are part of the output contract.
//! No value is computed: every column is copied from one nested field.

use serde::Serialize;

use crate::validation::Validation;

/// Output column names, in export order.
pub const COLUMNS: [&str; 31] = [
    "nodeId",
    "subnetId",
    "name",
    "manager",
    "icon",
    "beneficiaries",
    "startTime",
    "endTime",
    "assetId",
    "stake",
    "stakeFromSelf",
    "stakeFromDelegations",
    "networkShare",
    "rewards",
    "rewardsFromSelf",
    "rewardsFromDelegations",
    "delegations",
    "delegationFee",
    "delegationsMaxYield",
    "availableDelegationCapacity",
    "totalDelegationCapacity",
    "grossDelegationReward",
    "netDelegationReward",
    "avgUptime",
    "responsivenessChecksCount",
    "responsivenessPositiveChecksCount",
    "version",
    "ip",
    "isp",
    "city",
    "country",
];

/// Render a list of addresses as a single cell, e.g. `['P-avax1a', 'P-avax1b']`.
#[must_use]
pub fn list_cell(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| format!("'{s}'")).collect();
    format!("[{}]", quoted.join(", "))
}

/// A [`Validation`] flattened to one string per [`COLUMNS`] entry.
///
/// Absent optional fields and `null` values are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatValidation {
    /// `nodeId`
    pub node_id: String,
    /// `subnetId`
    pub subnet_id: String,
    /// `name`
    pub name: String,
    /// `manager`
    pub manager: String,
    /// `icon`
    pub icon: String,
    /// `beneficiaries`, rendered by [`list_cell`].
    pub beneficiaries: String,
    /// `startTime`
    pub start_time: String,
    /// `endTime`
    pub end_time: String,
    /// `assetId`
    pub asset_id: String,
    /// `stake.total`
    pub stake: String,
    /// `stake.fromSelf`
    pub stake_from_self: String,
    /// `stake.fromDelegations`
    pub stake_from_delegations: String,
    /// `stake.networkShare`
    pub network_share: String,
    /// `rewards.total`
    pub rewards: String,
    /// `rewards.fromSelf`
    pub rewards_from_self: String,
    /// `rewards.fromDelegations`
    pub rewards_from_delegations: String,
    /// `delegations.count`
    pub delegations: String,
    /// `delegations.delegationFee`
    pub delegation_fee: String,
    /// `delegations.maxYield`
    pub delegations_max_yield: String,
    /// `delegations.availableDelegationCapacity`
    pub available_delegation_capacity: String,
    /// `delegations.totalDelegationCapacity`
    pub total_delegation_capacity: String,
    /// `delegations.grossDelegationReward`
    pub gross_delegation_reward: String,
    /// `delegations.netDelegationReward`
    pub net_delegation_reward: String,
    /// `node.avgUptime`
    pub avg_uptime: String,
    /// `node.responsiveness.checksCount`
    pub responsiveness_checks_count: String,
    /// `node.responsiveness.positiveChecksCount`
    pub responsiveness_positive_checks_count: String,
    /// `node.version`
    pub version: String,
    /// `node.ip`
    pub ip: String,
    /// `node.isp`
    pub isp: String,
    /// `node.location.city`
    pub city: String,
    /// `node.location.country`
    pub country: String,
}

impl From<&Validation> for FlatValidation {
    fn from(v: &Validation) -> Self {
        let opt = |s: &Option<String>| s.clone().unwrap_or_default();
        Self {
            node_id: v.node_id.clone(),
            subnet_id: v.subnet_id.clone(),
            name: opt(&v.name),
            manager: opt(&v.manager),
            icon: opt(&v.icon),
            beneficiaries: v.beneficiaries.as_deref().map(list_cell).unwrap_or_default(),
            start_time: v.start_time.clone(),
            end_time: v.end_time.clone(),
            asset_id: v.asset_id.clone(),
            stake: v.stake.total.to_string(),
            stake_from_self: v.stake.from_self.to_string(),
            stake_from_delegations: v.stake.from_delegations.to_string(),
            network_share: v.stake.network_share.to_string(),
            rewards: v.rewards.total.to_string(),
            rewards_from_self: v.rewards.from_self.to_string(),
            rewards_from_delegations: v.rewards.from_delegations.to_string(),
            delegations: v.delegations.count.to_string(),
            delegation_fee: v.delegations.delegation_fee.to_string(),
            delegations_max_yield: v.delegations.max_yield.to_string(),
            available_delegation_capacity: v.delegations.available_delegation_capacity.to_string(),
            total_delegation_capacity: v.delegations.total_delegation_capacity.to_string(),
            gross_delegation_reward: v.delegations.gross_delegation_reward.to_string(),
            net_delegation_reward: v.delegations.net_delegation_reward.to_string(),
            avg_uptime: v.node.avg_uptime.to_string(),
            responsiveness_checks_count: v.node.responsiveness.checks_count.to_string(),
            responsiveness_positive_checks_count: v
                .node
                .responsiveness
                .positive_checks_count
                .to_string(),
            version: opt(&v.node.version),
            ip: opt(&v.node.ip),
            isp: opt(&v.node.isp),
            city: opt(&v.node.location.city),
            country: opt(&v.node.location.country),
        }
    }
}

impl FlatValidation {
    /// Cell values in [`COLUMNS`] order.
    #[must_use]
    pub fn values(&self) -> [&str; 31] {
        [
            self.node_id.as_str(),
            self.subnet_id.as_str(),
            self.name.as_str(),
            self.manager.as_str(),
            self.icon.as_str(),
            self.beneficiaries.as_str(),
            self.start_time.as_str(),
            self.end_time.as_str(),
            self.asset_id.as_str(),
            self.stake.as_str(),
            self.stake_from_self.as_str(),
            self.stake_from_delegations.as_str(),
            self.network_share.as_str(),
            self.rewards.as_str(),
            self.rewards_from_self.as_str(),
            self.rewards_from_delegations.as_str(),
            self.delegations.as_str(),
            self.delegation_fee.as_str(),
            self.delegations_max_yield.as_str(),
            self.available_delegation_capacity.as_str(),
            self.total_delegation_capacity.as_str(),
            self.gross_delegation_reward.as_str(),
            self.net_delegation_reward.as_str(),
            self.avg_uptime.as_str(),
            self.responsiveness_checks_count.as_str(),
            self.responsiveness_positive_checks_count.as_str(),
            self.version.as_str(),
            self.ip.as_str(),
            self.isp.as_str(),
            self.city.as_str(),
            self.country.as_str(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Scalar;
    use crate::validation::tests::{SAMPLE_ITEM, sample};

    #[test]
    fn projects_every_column() {
        let flat = FlatValidation::from(&sample());
        let values = flat.values();
        let cell = |name: &str| values[COLUMNS.iter().position(|c| *c == name).unwrap()];

        assert_eq!(cell("nodeId"), "NodeID-H1yZ17sZyZe12kT52ywW3QnVBySqUHLET");
        assert_eq!(cell("beneficiaries"), "['P-avax16ujlw4nzu2rpjk74naxux9cllcagu8mq0vp95a']");
        assert_eq!(cell("stake"), "2000000000000");
        assert_eq!(cell("rewardsFromSelf"), "12465776252");
        assert_eq!(cell("delegations"), "0");
        assert_eq!(cell("delegationFee"), "0.02");
        assert_eq!(cell("avgUptime"), "0.9965721428571429");
        assert_eq!(cell("responsivenessPositiveChecksCount"), "14");
        assert_eq!(cell("isp"), "Verizon");
        assert_eq!(cell("country"), "United States");
    }

    #[test]
    fn absent_optionals_render_empty() {
        let flat = FlatValidation::from(&sample());
        assert_eq!(flat.name, "");
        assert_eq!(flat.manager, "");
        assert_eq!(flat.icon, "");
    }

    #[test]
    fn null_values_render_empty() {
        let mut v = sample();
        v.beneficiaries = None;
        v.node.avg_uptime = Scalar::Null;
        let flat = FlatValidation::from(&v);
        assert_eq!(flat.beneficiaries, "");
        assert_eq!(flat.avg_uptime, "");
    }

    #[test]
    fn list_cells() {
        assert_eq!(list_cell(&[]), "[]");
        assert_eq!(
            list_cell(&["P-avax1a".to_owned(), "P-avax1b".to_owned()]),
            "['P-avax1a', 'P-avax1b']"
        );
    }

    #[test]
    fn serialized_names_match_columns() {
        let flat = FlatValidation::from(&sample());
        let json = serde_json::to_value(&flat).unwrap();
        let obj = json.as_object().unwrap();
        for (name, value) in COLUMNS.iter().zip(flat.values()) {
            assert_eq!(obj[*name], value, "{name}");
        }
        assert_eq!(obj.len(), COLUMNS.len(), "field count");
    }

    #[test]
    fn flattening_is_deterministic() {
        let a = serde_json::from_str::<Validation>(SAMPLE_ITEM).unwrap();
        let b = serde_json::from_str::<Validation>(SAMPLE_ITEM).unwrap();
        assert_eq!(FlatValidation::from(&a), FlatValidation::from(&b));
        assert_eq!(
            FlatValidation::from(&a).values(),
            FlatValidation::from(&a).values()
        );
    }
}

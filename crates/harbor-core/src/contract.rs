//! Settlement contracts between two parties
//!
//! A contract is immutable once created except for its settled flag, which
//! moves from `false` to `true` exactly once:
//!
//! ```text
//!   PENDING (settled = false) ──oracle confirms──► SETTLED (settled = true)
//! ```
//!
//! The serialized field names are the ones exchanged with peer nodes and are
//! part of the block hash input, so they must not change.

use crate::error::{SettlementError, ValidationError};
use crate::party::PartyRegistry;
use crate::types::{unix_seconds, ContractId, PartyId};
use serde::{Deserialize, Serialize};

/// A pending or settled transfer obligation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    #[serde(rename = "uuid")]
    pub id: ContractId,
    pub timestamp: i64,
    #[serde(rename = "from_address")]
    pub source: PartyId,
    #[serde(rename = "to_address")]
    pub destination: PartyId,
    pub cost: i64,
    #[serde(rename = "is_done")]
    pub settled: bool,
}

impl Contract {
    /// New pending contract with a fresh id and the current time
    pub fn new(source: PartyId, destination: PartyId, cost: i64) -> Self {
        Self {
            id: ContractId::generate(),
            timestamp: unix_seconds(),
            source,
            destination,
            cost,
            settled: false,
        }
    }

    /// JSON record of the contract, as hashed and sent to peers
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "uuid": self.id.as_str(),
            "cost": self.cost,
            "timestamp": self.timestamp,
            "from_address": self.source.as_str(),
            "to_address": self.destination.as_str(),
            "is_done": self.settled,
        })
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Run the contract against the local registry.
    ///
    /// `confirmed` is the oracle's answer for this contract. On success the
    /// cost is added to the source balance and taken from the destination
    /// balance, and the contract becomes settled. Balances are untouched on
    /// every error path.
    pub fn execute(
        &mut self,
        parties: &mut PartyRegistry,
        confirmed: bool,
    ) -> Result<(), SettlementError> {
        if self.settled {
            return Err(SettlementError::AlreadySettled(self.id.clone()));
        }
        if !confirmed {
            return Err(SettlementError::NotYetConfirmed(self.id.clone()));
        }
        for id in [&self.source, &self.destination] {
            if !parties.contains(id) {
                return Err(SettlementError::UnknownParty(id.clone()));
            }
        }

        let credited = parties
            .balance(&self.source)
            .and_then(|b| b.checked_add(self.cost))
            .ok_or_else(|| SettlementError::BalanceOverflow(self.id.clone()))?;
        let debited = parties
            .balance(&self.destination)
            .and_then(|b| b.checked_sub(self.cost))
            .ok_or_else(|| SettlementError::BalanceOverflow(self.id.clone()))?;

        if let Some(source) = parties.get_mut(&self.source) {
            source.balance = credited;
        }
        if let Some(destination) = parties.get_mut(&self.destination) {
            destination.balance = debited;
        }
        self.settled = true;
        Ok(())
    }
}

/// Contract submission as received at the boundary.
///
/// Every field is optional on the wire so that absent values surface as
/// `ValidationError::MissingField` rather than a decode failure. Identifier
/// and timestamp are assigned here when the submitter leaves them out.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSubmission {
    #[serde(default)]
    pub port_from: Option<PartyId>,
    #[serde(default)]
    pub port_to: Option<PartyId>,
    #[serde(default)]
    pub cost: Option<i64>,
    #[serde(default)]
    pub uuid: Option<ContractId>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl ContractSubmission {
    pub fn new(port_from: impl Into<PartyId>, port_to: impl Into<PartyId>, cost: i64) -> Self {
        Self {
            port_from: Some(port_from.into()),
            port_to: Some(port_to.into()),
            cost: Some(cost),
            uuid: None,
            timestamp: None,
        }
    }

    /// Check the submission against the registry and build the contract.
    pub fn into_contract(self, parties: &PartyRegistry) -> Result<Contract, ValidationError> {
        let source = self.port_from.ok_or(ValidationError::MissingField("port_from"))?;
        let destination = self.port_to.ok_or(ValidationError::MissingField("port_to"))?;
        let cost = self.cost.ok_or(ValidationError::MissingField("cost"))?;

        let contract = Contract {
            id: self.uuid.unwrap_or_else(ContractId::generate),
            timestamp: self.timestamp.unwrap_or_else(unix_seconds),
            source,
            destination,
            cost,
            settled: false,
        };
        check_contract(&contract, parties)?;
        Ok(contract)
    }
}

/// Invariants a contract must satisfy before it may enter the pending pool
pub fn check_contract(contract: &Contract, parties: &PartyRegistry) -> Result<(), ValidationError> {
    for id in [&contract.source, &contract.destination] {
        if !parties.contains(id) {
            return Err(ValidationError::UnknownParty(id.clone()));
        }
    }
    if contract.source == contract.destination {
        return Err(ValidationError::IdenticalParties(contract.source.clone()));
    }
    if contract.cost < 0 {
        return Err(ValidationError::NegativeCost(contract.cost));
    }
    Ok(())
}

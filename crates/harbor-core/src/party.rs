//! Parties (seaports) and the node-local registry of them

use crate::types::PartyId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Balance every party starts with on registration
pub const DEFAULT_INITIAL_BALANCE: i64 = 100;

/// An account-like participant with a network address and a balance.
///
/// Only the settlement path mutates `balance`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub id: PartyId,
    pub name: String,
    /// Base URL the party's node (and oracle) is reachable at
    pub address: String,
    pub balance: i64,
}

/// Peer descriptor as submitted for registration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyDescriptor {
    pub id: PartyId,
    pub name: String,
    pub address: String,
}

/// Outcome of a registration attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Registration {
    Accepted,
    DuplicateIgnored,
}

/// Party registry, in registration order.
///
/// Parties live for the process lifetime; there is no removal.
#[derive(Clone, Debug)]
pub struct PartyRegistry {
    parties: IndexMap<PartyId, Party>,
    initial_balance: i64,
}

impl PartyRegistry {
    pub fn new() -> Self {
        Self::with_initial_balance(DEFAULT_INITIAL_BALANCE)
    }

    pub fn with_initial_balance(initial_balance: i64) -> Self {
        Self {
            parties: IndexMap::new(),
            initial_balance,
        }
    }

    /// Register a party; an already known id is left untouched.
    pub fn register(&mut self, descriptor: PartyDescriptor) -> Registration {
        if self.parties.contains_key(&descriptor.id) {
            return Registration::DuplicateIgnored;
        }

        tracing::debug!("Registered party {} at {}", descriptor.id, descriptor.address);
        self.parties.insert(
            descriptor.id.clone(),
            Party {
                id: descriptor.id,
                name: descriptor.name,
                address: descriptor.address,
                balance: self.initial_balance,
            },
        );
        Registration::Accepted
    }

    pub fn get(&self, id: &PartyId) -> Option<&Party> {
        self.parties.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &PartyId) -> Option<&mut Party> {
        self.parties.get_mut(id)
    }

    pub fn contains(&self, id: &PartyId) -> bool {
        self.parties.contains_key(id)
    }

    pub fn balance(&self, id: &PartyId) -> Option<i64> {
        self.parties.get(id).map(|p| p.balance)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Party> {
        self.parties.values()
    }

    pub fn len(&self) -> usize {
        self.parties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parties.is_empty()
    }
}

impl Default for PartyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//! Settlement engine
//!
//! Walks every contract on the chain, asks the oracle about the ones still
//! pending and executes the confirmed ones. Oracle queries run without the
//! ledger lock; execution then happens under a single write lock, where the
//! settled flag is checked again so a contract is never executed twice.

use crate::oracle::Oracle;
use futures::future::join_all;
use harbor_core::error::SettlementError;
use harbor_core::ledger::Ledger;
use harbor_core::party::Party;
use harbor_core::types::ContractId;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Settlement configuration
#[derive(Clone, Debug)]
pub struct SettlementConfig {
    /// Upper bound on a single oracle query
    pub query_timeout: Duration,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(5),
        }
    }
}

/// Tally of one settlement pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SettlementReport {
    /// Contracts executed in this pass, in chain order
    pub settled: Vec<ContractId>,
    /// Contracts skipped because they were settled before
    pub already_settled: usize,
    /// Contracts left pending (not confirmed, oracle unreachable)
    pub pending: usize,
    /// Contracts naming a party this node does not know, or whose transfer
    /// would overflow a balance
    pub unresolved: usize,
}

/// A pending contract and where to ask about it
struct Ticket {
    contract: ContractId,
    destination: Option<Party>,
}

pub struct SettlementEngine {
    oracle: Arc<dyn Oracle>,
    config: SettlementConfig,
}

impl SettlementEngine {
    pub fn new(oracle: Arc<dyn Oracle>, config: SettlementConfig) -> Self {
        Self { oracle, config }
    }

    /// Execute a single mined contract.
    ///
    /// Fails with `AlreadySettled` before consulting the oracle, and with
    /// `NotYetConfirmed` when the oracle says no or cannot be reached.
    pub async fn execute(&self, ledger: &RwLock<Ledger>, id: &ContractId) -> Result<(), SettlementError> {
        let ticket = {
            let ledger = ledger.read();
            let contract = ledger
                .chain()
                .contract(id)
                .ok_or_else(|| SettlementError::ContractNotFound(id.clone()))?;
            if contract.settled {
                return Err(SettlementError::AlreadySettled(id.clone()));
            }
            if !ledger.parties().contains(&contract.destination) {
                return Err(SettlementError::UnknownParty(contract.destination.clone()));
            }
            Ticket {
                contract: id.clone(),
                destination: ledger.party(&contract.destination).cloned(),
            }
        };

        let confirmed = self.confirm(&ticket).await;
        ledger.write().settle(id, confirmed)
    }

    /// Attempt every contract on the chain.
    ///
    /// Already settled contracts are a benign skip. Everything else that
    /// fails is logged and left pending for the next pass.
    pub async fn execute_all(&self, ledger: &RwLock<Ledger>) -> SettlementReport {
        let mut report = SettlementReport::default();

        let tickets: Vec<Ticket> = {
            let ledger = ledger.read();
            ledger
                .chain()
                .contracts()
                .filter(|c| {
                    if c.settled {
                        report.already_settled += 1;
                    }
                    !c.settled
                })
                .map(|c| Ticket {
                    contract: c.id.clone(),
                    destination: ledger.party(&c.destination).cloned(),
                })
                .collect()
        };

        if tickets.is_empty() {
            return report;
        }

        let answers = join_all(tickets.iter().map(|t| self.confirm(t))).await;

        let mut ledger = ledger.write();
        for (ticket, confirmed) in tickets.iter().zip(answers) {
            if ticket.destination.is_none() {
                report.unresolved += 1;
                continue;
            }
            match ledger.settle(&ticket.contract, confirmed) {
                Ok(()) => {
                    info!("Contract {} settled", ticket.contract);
                    report.settled.push(ticket.contract.clone());
                }
                Err(SettlementError::AlreadySettled(_)) => {
                    report.already_settled += 1;
                }
                Err(e @ (SettlementError::UnknownParty(_) | SettlementError::BalanceOverflow(_))) => {
                    warn!("{}", e);
                    report.unresolved += 1;
                }
                Err(e) => {
                    debug!("{}", e);
                    report.pending += 1;
                }
            }
        }

        if !report.settled.is_empty() || report.pending > 0 {
            info!(
                "Settlement pass: {} settled, {} pending, {} already settled",
                report.settled.len(),
                report.pending,
                report.already_settled
            );
        }
        report
    }

    /// Oracle answer for a ticket; failures read as "not confirmed"
    async fn confirm(&self, ticket: &Ticket) -> bool {
        let Some(destination) = &ticket.destination else {
            return false;
        };

        let query = self.oracle.is_confirmed(&ticket.contract, destination);
        match tokio::time::timeout(self.config.query_timeout, query).await {
            Ok(Ok(confirmed)) => confirmed,
            Ok(Err(e)) => {
                debug!("Oracle query for {} failed: {}", ticket.contract, e);
                false
            }
            Err(_) => {
                debug!(
                    "Oracle query for {} timed out after {:?}",
                    ticket.contract, self.config.query_timeout
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{OracleBook, OracleError};
    use async_trait::async_trait;
    use harbor_core::block::Block;
    use harbor_core::contract::ContractSubmission;
    use harbor_core::party::PartyDescriptor;
    use harbor_core::pow;
    use harbor_core::types::PartyId;

    fn ledger() -> Ledger {
        let mut ledger = Ledger::default();
        for id in ["A", "B"] {
            ledger.register_party(PartyDescriptor {
                id: PartyId::new(id),
                name: id.to_string(),
                address: format!("http://{}", id.to_lowercase()),
            });
        }
        ledger
    }

    fn mine(ledger: &mut Ledger) -> Block {
        let last = ledger.chain().last_block();
        let proof = pow::proof_of_work(last);
        let previous_hash = last.hash();
        ledger.append_block(proof, previous_hash)
    }

    fn balance(ledger: &RwLock<Ledger>, id: &str) -> i64 {
        ledger.read().parties().balance(&PartyId::new(id)).unwrap()
    }

    fn engine(book: Arc<OracleBook>) -> SettlementEngine {
        SettlementEngine::new(book, SettlementConfig::default())
    }

    #[tokio::test]
    async fn test_confirmed_contract_settles_once() {
        let mut state = ledger();
        state.submit(ContractSubmission::new("A", "B", 30)).unwrap();
        let id = mine(&mut state).transactions[0].id.clone();
        let ledger = RwLock::new(state);

        let book = Arc::new(OracleBook::new());
        let engine = engine(book.clone());

        let report = engine.execute_all(&ledger).await;
        assert_eq!(report.pending, 1);
        assert_eq!(balance(&ledger, "A"), 100);

        book.mark_confirmed(id.clone());
        let report = engine.execute_all(&ledger).await;
        assert_eq!(report.settled, vec![id.clone()]);
        assert_eq!(balance(&ledger, "A"), 130);
        assert_eq!(balance(&ledger, "B"), 70);
        assert!(ledger.read().chain().contract(&id).unwrap().settled);

        let report = engine.execute_all(&ledger).await;
        assert!(report.settled.is_empty());
        assert_eq!(report.already_settled, 1);
        assert_eq!(balance(&ledger, "A"), 130);
    }

    #[tokio::test]
    async fn test_execute_twice_reports_already_settled() {
        let mut state = ledger();
        state.submit(ContractSubmission::new("B", "A", 10)).unwrap();
        let id = mine(&mut state).transactions[0].id.clone();
        let ledger = RwLock::new(state);

        let book = Arc::new(OracleBook::new());
        book.mark_confirmed(id.clone());
        let engine = engine(book);

        engine.execute(&ledger, &id).await.unwrap();
        assert_eq!(
            engine.execute(&ledger, &id).await,
            Err(SettlementError::AlreadySettled(id))
        );
        assert_eq!(balance(&ledger, "B"), 110);
        assert_eq!(balance(&ledger, "A"), 90);
    }

    #[tokio::test]
    async fn test_pending_pool_is_not_settled() {
        let mut state = ledger();
        state.submit(ContractSubmission::new("A", "B", 30)).unwrap();
        let id = state.chain().pending()[0].id.clone();
        let ledger = RwLock::new(state);

        let book = Arc::new(OracleBook::new());
        book.mark_confirmed(id.clone());

        let report = engine(book.clone()).execute_all(&ledger).await;
        assert_eq!(report, SettlementReport::default());
        assert_eq!(
            engine(book).execute(&ledger, &id).await,
            Err(SettlementError::ContractNotFound(id))
        );
    }

    #[tokio::test]
    async fn test_unknown_destination_is_unresolved() {
        let mut remote = ledger();
        remote.register_party(PartyDescriptor {
            id: PartyId::new("C"),
            name: "C".into(),
            address: "http://c".into(),
        });
        remote.submit(ContractSubmission::new("A", "C", 5)).unwrap();
        let id = mine(&mut remote).transactions[0].id.clone();

        let mut state = ledger();
        state.replace_chain(remote.chain().blocks().to_vec());
        let ledger = RwLock::new(state);

        let book = Arc::new(OracleBook::new());
        book.mark_confirmed(id.clone());
        let engine = engine(book);

        assert_eq!(engine.execute_all(&ledger).await.unresolved, 1);
        assert_eq!(
            engine.execute(&ledger, &id).await,
            Err(SettlementError::UnknownParty(PartyId::new("C")))
        );
        assert_eq!(balance(&ledger, "A"), 100);
    }

    #[tokio::test]
    async fn test_overflowing_contract_does_not_block_others() {
        let mut state = ledger();
        state.submit(ContractSubmission::new("A", "B", i64::MAX)).unwrap();
        state.submit(ContractSubmission::new("B", "A", 10)).unwrap();
        let block = mine(&mut state);
        let (huge, small) = (block.transactions[0].id.clone(), block.transactions[1].id.clone());
        let ledger = RwLock::new(state);

        let book = Arc::new(OracleBook::new());
        book.mark_confirmed(huge.clone());
        book.mark_confirmed(small.clone());
        let engine = engine(book);

        let report = engine.execute_all(&ledger).await;
        assert_eq!(report.settled, vec![small]);
        assert_eq!(report.unresolved, 1);
        assert!(!ledger.read().chain().contract(&huge).unwrap().settled);
        assert_eq!(balance(&ledger, "B"), 110);
        assert_eq!(balance(&ledger, "A"), 90);

        let report = engine.execute_all(&ledger).await;
        assert!(report.settled.is_empty());
        assert_eq!(report.unresolved, 1);
    }

    struct DownOracle;

    #[async_trait]
    impl Oracle for DownOracle {
        async fn is_confirmed(&self, _contract: &ContractId, destination: &Party) -> Result<bool, OracleError> {
            Err(OracleError::Unreachable(destination.address.clone()))
        }
    }

    #[tokio::test]
    async fn test_unreachable_oracle_leaves_contract_pending() {
        let mut state = ledger();
        state.submit(ContractSubmission::new("A", "B", 30)).unwrap();
        let id = mine(&mut state).transactions[0].id.clone();
        let ledger = RwLock::new(state);

        let engine = SettlementEngine::new(Arc::new(DownOracle), SettlementConfig::default());
        assert_eq!(
            engine.execute(&ledger, &id).await,
            Err(SettlementError::NotYetConfirmed(id))
        );
        assert_eq!(engine.execute_all(&ledger).await.pending, 1);
    }

    struct SlowOracle;

    #[async_trait]
    impl Oracle for SlowOracle {
        async fn is_confirmed(&self, _contract: &ContractId, _destination: &Party) -> Result<bool, OracleError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(true)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_oracle_times_out_as_unconfirmed() {
        let mut state = ledger();
        state.submit(ContractSubmission::new("A", "B", 30)).unwrap();
        mine(&mut state);
        let ledger = RwLock::new(state);

        let config = SettlementConfig {
            query_timeout: Duration::from_millis(100),
        };
        let report = SettlementEngine::new(Arc::new(SlowOracle), config)
            .execute_all(&ledger)
            .await;
        assert_eq!(report.pending, 1);
        assert_eq!(balance(&ledger, "A"), 100);
    }
}

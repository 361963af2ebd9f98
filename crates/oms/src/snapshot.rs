//! In-memory engine snapshot and the query trait the risk gate reads.

use dashmap::DashMap;
use rg_core::types::*;

use crate::order::{OrderError, OrderManager};

/// Synchronous queries against the trading engine's current state.
///
/// Implementations must answer from memory; the gate calls these on the
/// submission path and never blocks on I/O.
pub trait EngineSnapshot: Send + Sync {
    /// Number of orders currently in a non-terminal state.
    fn active_order_count(&self) -> usize;

    /// Account snapshot for the account connected through `gateway`.
    fn account(&self, gateway: &str) -> Option<AccountData>;

    /// Contract metadata for an instrument.
    fn contract(&self, instrument: &Instrument) -> Option<ContractData>;

    /// Latest quote for an instrument.
    fn tick(&self, instrument: &Instrument) -> Option<TickData>;

    /// Equity of the account connected through `gateway`, if known.
    fn balance(&self, gateway: &str) -> Option<f64> {
        self.account(gateway).map(|a| a.balance)
    }
}

/// The engine-side state store: orders, accounts, contracts, ticks.
///
/// Written by the engine's event loop, read concurrently by the gate.
#[derive(Default)]
pub struct Oms {
    orders: OrderManager,
    accounts: DashMap<String, AccountData>,
    contracts: DashMap<Instrument, ContractData>,
    ticks: DashMap<Instrument, TickData>,
}

impl Oms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an order update to the live order table.
    pub fn on_order(&self, update: &OrderUpdate) -> Result<bool, OrderError> {
        self.orders.apply(update)
    }

    /// Replace the account snapshot for its gateway.
    pub fn on_account(&self, account: AccountData) {
        self.accounts.insert(account.gateway.clone(), account);
    }

    pub fn on_contract(&self, contract: ContractData) {
        self.contracts.insert(contract.instrument.clone(), contract);
    }

    pub fn on_tick(&self, tick: TickData) {
        self.ticks.insert(tick.instrument.clone(), tick);
    }

    pub fn orders(&self) -> &OrderManager {
        &self.orders
    }
}

impl EngineSnapshot for Oms {
    fn active_order_count(&self) -> usize {
        self.orders.active_order_count()
    }

    fn account(&self, gateway: &str) -> Option<AccountData> {
        self.accounts.get(gateway).map(|a| a.clone())
    }

    fn contract(&self, instrument: &Instrument) -> Option<ContractData> {
        self.contracts.get(instrument).map(|c| c.clone())
    }

    fn tick(&self, instrument: &Instrument) -> Option<TickData> {
        self.ticks.get(instrument).map(|t| t.clone())
    }
}

//! Paper gateway: simulates exchange order handling against the last tick.
//!
//! Implements [`OrderSubmitter`], so it sits at the end of the submission
//! chain exactly where a real gateway would. Everything the exchange would
//! report back (order status changes, fills, account and contract data,
//! ticks) is emitted as [`EngineEvent`]s on the engine channel.
//!
//! Order lifecycle: `New` then `Acked`. A limit order that crosses the last
//! quote fills immediately at that quote. Otherwise it rests until a tick
//! crosses it or it is cancelled. A price off the contract's tick grid is
//! rejected with an exchange-style payload.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, Context, Result};
use crossbeam::channel::Sender;
use parking_lot::Mutex;

use rg_core::config::PaperConfig;
use rg_core::types::*;
use rg_execution::OrderSubmitter;

use crate::event_loop::EngineEvent;

/// Error code the paper venue reports for an off-grid price.
pub const PRICE_TICK_ERROR: &str = "PRICE_TICK";
/// Error code the paper venue reports for a market order with no quote.
pub const NO_QUOTE_ERROR: &str = "NO_QUOTE";

/// Paper trading gateway.
pub struct PaperGateway {
    name: String,
    account_id: String,
    balance: f64,
    contracts: HashMap<Instrument, ContractData>,
    events: Sender<EngineEvent>,
    next_order: AtomicU64,
    next_trade: AtomicU64,
    /// Resting orders keyed by submission sequence, so fills go oldest first.
    resting: Mutex<BTreeMap<u64, OrderUpdate>>,
    ticks: Mutex<HashMap<Instrument, TickData>>,
}

impl PaperGateway {
    /// Create a paper gateway named `name` (order ids are `<name>.<n>`).
    pub fn new(
        name: impl Into<String>,
        config: &PaperConfig,
        events: Sender<EngineEvent>,
    ) -> Result<Self> {
        let mut contracts = HashMap::new();
        for c in &config.contracts {
            let instrument: Instrument = c
                .instrument
                .parse()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("invalid paper contract '{}'", c.instrument))?;
            if c.size <= 0.0 || c.pricetick <= 0.0 {
                bail!("paper contract '{}' needs a positive size and pricetick", c.instrument);
            }
            contracts.insert(
                instrument.clone(),
                ContractData {
                    instrument,
                    size: c.size,
                    pricetick: Price::from(c.pricetick),
                },
            );
        }

        Ok(Self {
            name: name.into(),
            account_id: config.account_id.clone(),
            balance: config.balance,
            contracts,
            events,
            next_order: AtomicU64::new(1),
            next_trade: AtomicU64::new(1),
            resting: Mutex::new(BTreeMap::new()),
            ticks: Mutex::new(HashMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publish the account and contract list, as a real gateway does on login.
    pub fn connect(&self) {
        self.emit(EngineEvent::Account(AccountData {
            account_id: self.account_id.clone(),
            gateway: self.name.clone(),
            balance: self.balance,
            frozen: 0.0,
        }));
        for contract in self.contracts.values() {
            self.emit(EngineEvent::Contract(contract.clone()));
        }
        tracing::info!(
            gateway = %self.name,
            contracts = self.contracts.len(),
            balance = self.balance,
            "paper gateway connected"
        );
    }

    /// Apply a market tick: publish it and fill any resting order it crosses.
    pub fn on_tick(&self, tick: TickData) {
        self.ticks.lock().insert(tick.instrument.clone(), tick.clone());
        self.emit(EngineEvent::Tick(tick.clone()));

        let crossed: Vec<(OrderUpdate, Price)> = {
            let mut resting = self.resting.lock();
            let hits: Vec<(u64, Price)> = resting
                .iter()
                .filter(|(_, o)| o.instrument() == tick.instrument)
                .filter_map(|(k, o)| fill_price(o.direction, o.price, &tick).map(|p| (*k, p)))
                .collect();
            hits.into_iter()
                .filter_map(|(k, p)| resting.remove(&k).map(|o| (o, p)))
                .collect()
        };
        for (order, price) in crossed {
            self.fill(order, price);
        }
    }

    /// Number of orders currently resting.
    pub fn resting_count(&self) -> usize {
        self.resting.lock().len()
    }

    fn emit(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            tracing::warn!(gateway = %self.name, "engine event channel closed, dropping event");
        }
    }

    fn emit_status(&self, order: &mut OrderUpdate, status: OrderStatus) {
        order.status = status;
        order.timestamp = Timestamp::now();
        self.emit(EngineEvent::Order(order.clone()));
    }

    fn reject(&self, mut order: OrderUpdate, code: &str, message: &str) {
        tracing::info!(order_id = %order.order_id, code, message, "paper venue rejected order");
        order.reject_payload = Some(
            serde_json::json!({ "code": code, "message": message }).to_string(),
        );
        self.emit_status(&mut order, OrderStatus::Rejected);
    }

    fn fill(&self, mut order: OrderUpdate, price: Price) {
        let n = self.next_trade.fetch_add(1, Ordering::Relaxed);
        let volume = order.volume - order.traded;
        self.emit(EngineEvent::Trade(TradeFill {
            trade_id: format!("{}-T{}", self.name, n),
            order_id: order.order_id.clone(),
            symbol: order.symbol.clone(),
            exchange: order.exchange,
            direction: order.direction,
            offset: order.offset,
            price,
            volume,
            gateway: self.name.clone(),
            timestamp: Timestamp::now(),
        }));
        order.traded = order.volume;
        self.emit_status(&mut order, OrderStatus::Filled);
    }

    fn off_tick_grid(&self, instrument: &Instrument, price: Price) -> Option<Price> {
        let tick = self.contracts.get(instrument)?.pricetick;
        (!price.is_multiple_of(tick)).then_some(tick)
    }
}

/// The opposite side of `tick` a `direction` order trades against. Falls
/// back to the last price when that side of the quote is empty.
fn opposite_quote(direction: Direction, tick: &TickData) -> Option<Price> {
    let quote = match direction {
        Direction::Long => tick.ask_price,
        Direction::Short => tick.bid_price,
    };
    let quote = if quote.is_zero() { tick.last_price } else { quote };
    (!quote.is_zero()).then_some(quote)
}

/// Price a limit order at `limit` would fill at against `tick`, if it crosses.
fn fill_price(direction: Direction, limit: Price, tick: &TickData) -> Option<Price> {
    let quote = opposite_quote(direction, tick)?;
    let crosses = match direction {
        Direction::Long => limit >= quote,
        Direction::Short => limit <= quote,
    };
    crosses.then_some(quote)
}

impl OrderSubmitter for PaperGateway {
    fn send_order(&self, req: &OrderRequest, gateway: &str) -> Result<OrderId> {
        if gateway != self.name {
            bail!("paper gateway '{}' cannot route to '{gateway}'", self.name);
        }
        let seq = self.next_order.fetch_add(1, Ordering::Relaxed);
        let order_id = OrderId::new(format!("{}.{}", self.name, seq));
        let instrument = req.instrument();

        let mut order = OrderUpdate {
            order_id: order_id.clone(),
            symbol: req.symbol.clone(),
            exchange: req.exchange,
            direction: req.direction,
            offset: req.offset,
            price: req.price,
            volume: req.volume,
            traded: 0,
            status: OrderStatus::New,
            gateway: self.name.clone(),
            reject_payload: None,
            timestamp: Timestamp::now(),
        };
        self.emit(EngineEvent::Order(order.clone()));

        if let Some(tick) = self.off_tick_grid(&instrument, req.price) {
            self.reject(
                order,
                PRICE_TICK_ERROR,
                &format!("price {} is not a multiple of tick {tick}", req.price),
            );
            return Ok(order_id);
        }

        let last = self.ticks.lock().get(&instrument).cloned();
        if req.order_type == OrderType::Market {
            let quote = last.as_ref().and_then(|t| opposite_quote(req.direction, t));
            match quote {
                Some(price) => {
                    self.emit_status(&mut order, OrderStatus::Acked);
                    self.fill(order, price);
                }
                None => self.reject(order, NO_QUOTE_ERROR, "no quote for market order"),
            }
            return Ok(order_id);
        }

        self.emit_status(&mut order, OrderStatus::Acked);
        match last.as_ref().and_then(|t| fill_price(req.direction, req.price, t)) {
            Some(price) => self.fill(order, price),
            None => {
                self.resting.lock().insert(seq, order);
            }
        }
        Ok(order_id)
    }

    fn cancel_order(&self, order_id: &OrderId, gateway: &str) -> Result<()> {
        if gateway != self.name {
            bail!("paper gateway '{}' cannot route to '{gateway}'", self.name);
        }
        let removed = {
            let mut resting = self.resting.lock();
            let key = resting
                .iter()
                .find(|(_, o)| &o.order_id == order_id)
                .map(|(k, _)| *k);
            key.and_then(|k| resting.remove(&k))
        };
        match removed {
            Some(mut order) => {
                self.emit_status(&mut order, OrderStatus::Cancelled);
                Ok(())
            }
            None => bail!("order {order_id} is not active"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::{self, Receiver};
    use rg_core::config::PaperContract;

    fn rb() -> Instrument {
        Instrument::new("rb2405", Exchange::Shfe)
    }

    fn make_gateway() -> (PaperGateway, Receiver<EngineEvent>) {
        let (tx, rx) = channel::unbounded();
        let config = PaperConfig {
            account_id: "paper".to_string(),
            balance: 500_000.0,
            contracts: vec![PaperContract {
                instrument: "rb2405.SHFE".to_string(),
                size: 10.0,
                pricetick: 1.0,
            }],
        };
        (PaperGateway::new("PAPER", &config, tx).unwrap(), rx)
    }

    fn make_tick(bid: i64, ask: i64) -> TickData {
        TickData {
            instrument: rb(),
            last_price: Price::new((bid + ask) / 2, 0),
            bid_price: Price::new(bid, 0),
            ask_price: Price::new(ask, 0),
            timestamp: Timestamp::now(),
        }
    }

    fn make_limit(direction: Direction, price: i64, volume: Volume) -> OrderRequest {
        OrderRequest::limit(&rb(), direction, Offset::Open, Price::new(price, 0), volume)
    }

    fn statuses(rx: &Receiver<EngineEvent>) -> Vec<OrderStatus> {
        rx.try_iter()
            .filter_map(|e| match e {
                EngineEvent::Order(o) => Some(o.status),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_connect_publishes_account_and_contracts() {
        let (gw, rx) = make_gateway();
        gw.connect();
        let events: Vec<_> = rx.try_iter().collect();
        assert!(matches!(
            &events[0],
            EngineEvent::Account(a) if a.gateway == "PAPER" && a.balance == 500_000.0
        ));
        assert!(matches!(
            &events[1],
            EngineEvent::Contract(c) if c.instrument == rb() && c.size == 10.0
        ));
    }

    #[test]
    fn test_order_ids_are_sequential() {
        let (gw, _rx) = make_gateway();
        let a = gw.send_order(&make_limit(Direction::Long, 3800, 1), "PAPER").unwrap();
        let b = gw.send_order(&make_limit(Direction::Long, 3800, 1), "PAPER").unwrap();
        assert_eq!(a, OrderId::new("PAPER.1"));
        assert_eq!(b, OrderId::new("PAPER.2"));
    }

    #[test]
    fn test_non_crossing_order_rests() {
        let (gw, rx) = make_gateway();
        gw.on_tick(make_tick(3849, 3851));
        gw.send_order(&make_limit(Direction::Long, 3845, 2), "PAPER").unwrap();
        assert_eq!(statuses(&rx), vec![OrderStatus::New, OrderStatus::Acked]);
        assert_eq!(gw.resting_count(), 1);
    }

    #[test]
    fn test_crossing_order_fills_at_quote() {
        let (gw, rx) = make_gateway();
        gw.on_tick(make_tick(3849, 3851));
        let _ = rx.try_iter().count();

        gw.send_order(&make_limit(Direction::Long, 3860, 2), "PAPER").unwrap();
        let events: Vec<_> = rx.try_iter().collect();
        let trade = events
            .iter()
            .find_map(|e| match e {
                EngineEvent::Trade(t) => Some(t.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(trade.price, Price::new(3851, 0));
        assert_eq!(trade.volume, 2);
        assert!(matches!(
            events.last(),
            Some(EngineEvent::Order(o)) if o.status == OrderStatus::Filled && o.traded == 2
        ));
        assert_eq!(gw.resting_count(), 0);
    }

    #[test]
    fn test_tick_fills_resting_order() {
        let (gw, rx) = make_gateway();
        gw.send_order(&make_limit(Direction::Short, 3855, 1), "PAPER").unwrap();
        let _ = rx.try_iter().count();

        gw.on_tick(make_tick(3850, 3852));
        assert_eq!(gw.resting_count(), 1);
        gw.on_tick(make_tick(3856, 3858));
        assert_eq!(gw.resting_count(), 0);

        let fills: Vec<_> = rx
            .try_iter()
            .filter_map(|e| match e {
                EngineEvent::Trade(t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, Price::new(3856, 0));
        assert_eq!(fills[0].direction, Direction::Short);
    }

    #[test]
    fn test_cancel_resting_order() {
        let (gw, rx) = make_gateway();
        let id = gw.send_order(&make_limit(Direction::Long, 3800, 1), "PAPER").unwrap();
        gw.cancel_order(&id, "PAPER").unwrap();
        assert_eq!(
            statuses(&rx),
            vec![OrderStatus::New, OrderStatus::Acked, OrderStatus::Cancelled]
        );
        assert!(gw.cancel_order(&id, "PAPER").is_err());
    }

    #[test]
    fn test_off_grid_price_rejected_with_payload() {
        let (gw, rx) = make_gateway();
        let price = Price::new(38505, 1);
        let req = OrderRequest::limit(&rb(), Direction::Long, Offset::Open, price, 1);
        gw.send_order(&req, "PAPER").unwrap();
        let last = rx.try_iter().last().unwrap();
        match last {
            EngineEvent::Order(o) => {
                assert_eq!(o.status, OrderStatus::Rejected);
                let payload = o.reject_payload.unwrap();
                assert!(payload.contains(PRICE_TICK_ERROR));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(gw.resting_count(), 0);
    }

    #[test]
    fn test_market_order_without_quote_rejected() {
        let (gw, rx) = make_gateway();
        let mut req = make_limit(Direction::Long, 3850, 1);
        req.order_type = OrderType::Market;
        gw.send_order(&req, "PAPER").unwrap();
        assert_eq!(statuses(&rx), vec![OrderStatus::New, OrderStatus::Rejected]);
    }

    #[test]
    fn test_wrong_gateway_is_error() {
        let (gw, _rx) = make_gateway();
        assert!(gw.send_order(&make_limit(Direction::Long, 3800, 1), "CTP").is_err());
    }

    #[test]
    fn test_invalid_contract_config() {
        let (tx, _rx) = channel::unbounded();
        let config = PaperConfig {
            contracts: vec![PaperContract {
                instrument: "rb2405".to_string(),
                size: 10.0,
                pricetick: 1.0,
            }],
            ..PaperConfig::default()
        };
        assert!(PaperGateway::new("PAPER", &config, tx).is_err());
    }
}

//! Per-instrument book of the firm's own resting orders.
//!
//! Used only for self-trade detection: the gate needs the highest resting
//! buy price and the lowest resting sell price for an instrument. Besides
//! the `order id -> price` maps, each side keeps a price-level count in a
//! `BTreeMap`, so best bid / best ask are `O(log n)` instead of a scan over
//! every live order.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use rg_core::types::{Direction, Instrument, OrderId, OrderUpdate, Price};

/// Live buy and sell orders for one instrument.
///
/// An order id appears in at most one side, and only while its status is
/// non-terminal.
#[derive(Debug)]
pub struct ActiveOrderBook {
    instrument: Instrument,
    bids: HashMap<OrderId, Price>,
    asks: HashMap<OrderId, Price>,
    bid_levels: BTreeMap<Price, usize>,
    ask_levels: BTreeMap<Price, usize>,
}

impl ActiveOrderBook {
    pub fn new(instrument: Instrument) -> Self {
        Self {
            instrument,
            bids: HashMap::new(),
            asks: HashMap::new(),
            bid_levels: BTreeMap::new(),
            ask_levels: BTreeMap::new(),
        }
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    /// Apply an order update.
    ///
    /// Non-terminal: insert or overwrite the order's price on its side.
    /// Terminal: remove the order from whichever side holds it; a no-op when
    /// it is absent.
    pub fn update(&mut self, order: &OrderUpdate) {
        self.remove(&order.order_id);
        if order.status.is_terminal() {
            return;
        }

        let (orders, levels) = match order.direction {
            Direction::Long => (&mut self.bids, &mut self.bid_levels),
            Direction::Short => (&mut self.asks, &mut self.ask_levels),
        };
        orders.insert(order.order_id.clone(), order.price);
        *levels.entry(order.price).or_insert(0) += 1;
    }

    /// Highest resting buy price.
    pub fn best_bid(&self) -> Option<Price> {
        self.bid_levels.last_key_value().map(|(p, _)| *p)
    }

    /// Lowest resting sell price.
    pub fn best_ask(&self) -> Option<Price> {
        self.ask_levels.first_key_value().map(|(p, _)| *p)
    }

    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.bids.contains_key(order_id) || self.asks.contains_key(order_id)
    }

    /// Number of resting orders on both sides.
    pub fn len(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&mut self, order_id: &OrderId) -> bool {
        if let Some(price) = self.bids.remove(order_id) {
            release_level(&mut self.bid_levels, price);
            true
        } else if let Some(price) = self.asks.remove(order_id) {
            release_level(&mut self.ask_levels, price);
            true
        } else {
            false
        }
    }
}

fn release_level(levels: &mut BTreeMap<Price, usize>, price: Price) {
    if let Some(count) = levels.get_mut(&price) {
        *count -= 1;
        if *count == 0 {
            levels.remove(&price);
        }
    }
}

/// All active order books, keyed by instrument.
///
/// Books are created on first reference and live for the process lifetime.
/// Each book has its own lock, so updates to different instruments never
/// contend.
#[derive(Default)]
pub struct OrderBooks {
    books: DashMap<Instrument, Arc<Mutex<ActiveOrderBook>>>,
}

impl OrderBooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The book for `instrument`, creating it if needed.
    pub fn book(&self, instrument: &Instrument) -> Arc<Mutex<ActiveOrderBook>> {
        if let Some(book) = self.books.get(instrument) {
            return book.clone();
        }
        self.books
            .entry(instrument.clone())
            .or_insert_with(|| Arc::new(Mutex::new(ActiveOrderBook::new(instrument.clone()))))
            .clone()
    }

    /// Route an order update to its instrument's book.
    pub fn update(&self, order: &OrderUpdate) {
        self.book(&order.instrument()).lock().update(order);
    }

    pub fn best_bid(&self, instrument: &Instrument) -> Option<Price> {
        self.book(instrument).lock().best_bid()
    }

    pub fn best_ask(&self, instrument: &Instrument) -> Option<Price> {
        self.book(instrument).lock().best_ask()
    }

    /// Number of instruments with a book.
    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

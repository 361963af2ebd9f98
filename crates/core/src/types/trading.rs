//! Records exchanged with the trading engine: order requests going out,
//! order updates and trade fills coming back, and the account / contract /
//! tick snapshots the risk rules read.

use serde::{Deserialize, Serialize};

use super::order::{
    Direction, Exchange, Instrument, Offset, OrderId, OrderStatus, OrderType, Symbol,
};
use super::price::Price;
use super::timestamp::Timestamp;
use super::Volume;

/// An outbound order request, as submitted by a strategy.
///
/// Immutable input to a risk check. The gateway the request is routed to is
/// passed alongside it, not stored in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Contract symbol.
    pub symbol: Symbol,
    /// Listing exchange.
    pub exchange: Exchange,
    /// Buy or sell.
    pub direction: Direction,
    /// Open or close.
    pub offset: Offset,
    /// Order type.
    pub order_type: OrderType,
    /// Limit price.
    pub price: Price,
    /// Requested volume in lots.
    pub volume: Volume,
    /// Free-form strategy reference.
    #[serde(default)]
    pub reference: String,
}

impl OrderRequest {
    /// Build a limit order request.
    pub fn limit(
        instrument: &Instrument,
        direction: Direction,
        offset: Offset,
        price: Price,
        volume: Volume,
    ) -> Self {
        Self {
            symbol: instrument.symbol.clone(),
            exchange: instrument.exchange,
            direction,
            offset,
            order_type: OrderType::Limit,
            price,
            volume,
            reference: String::new(),
        }
    }

    /// The instrument this request targets.
    pub fn instrument(&self) -> Instrument {
        Instrument {
            symbol: self.symbol.clone(),
            exchange: self.exchange,
        }
    }
}

/// An order-state notification from the trading engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    /// Gateway-assigned order identifier.
    pub order_id: OrderId,
    /// Contract symbol.
    pub symbol: Symbol,
    /// Listing exchange.
    pub exchange: Exchange,
    /// Buy or sell.
    pub direction: Direction,
    /// Open or close.
    pub offset: Offset,
    /// Limit price.
    pub price: Price,
    /// Total order volume.
    pub volume: Volume,
    /// Cumulative traded volume.
    pub traded: Volume,
    /// Current status.
    pub status: OrderStatus,
    /// Gateway the order was routed through.
    pub gateway: String,
    /// Raw rejection payload from the exchange, if any.
    #[serde(default)]
    pub reject_payload: Option<String>,
    /// When the update was produced.
    pub timestamp: Timestamp,
}

impl OrderUpdate {
    /// The instrument this order belongs to.
    pub fn instrument(&self) -> Instrument {
        Instrument {
            symbol: self.symbol.clone(),
            exchange: self.exchange,
        }
    }
}

/// A trade (fill) notification from the trading engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeFill {
    /// Exchange-assigned trade identifier.
    pub trade_id: String,
    /// Order the fill belongs to.
    pub order_id: OrderId,
    /// Contract symbol.
    pub symbol: Symbol,
    /// Listing exchange.
    pub exchange: Exchange,
    /// Buy or sell.
    pub direction: Direction,
    /// Open or close.
    pub offset: Offset,
    /// Fill price.
    pub price: Price,
    /// Filled volume in lots.
    pub volume: Volume,
    /// Gateway the order was routed through.
    pub gateway: String,
    /// When the fill was produced.
    pub timestamp: Timestamp,
}

impl TradeFill {
    /// The instrument this fill belongs to.
    pub fn instrument(&self) -> Instrument {
        Instrument {
            symbol: self.symbol.clone(),
            exchange: self.exchange,
        }
    }
}

/// Trading account snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountData {
    /// Broker account identifier.
    pub account_id: String,
    /// Gateway the account is connected through.
    pub gateway: String,
    /// Account equity.
    pub balance: f64,
    /// Margin and premium currently frozen.
    pub frozen: f64,
}

impl AccountData {
    /// Equity not frozen by open orders.
    pub fn available(&self) -> f64 {
        self.balance - self.frozen
    }
}

/// Static contract metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractData {
    /// The instrument described.
    pub instrument: Instrument,
    /// Contract multiplier (value of one lot per unit of price).
    pub size: f64,
    /// Minimum price increment.
    pub pricetick: Price,
}

/// Latest quote for an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickData {
    /// The instrument quoted.
    pub instrument: Instrument,
    /// Last traded price.
    pub last_price: Price,
    /// Best bid.
    pub bid_price: Price,
    /// Best ask.
    pub ask_price: Price,
    /// Quote time.
    pub timestamp: Timestamp,
}

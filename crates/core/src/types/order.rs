//! Order-related types: exchanges, instruments, direction, offset, order
//! status, and order identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    /// China Financial Futures Exchange.
    Cffex,
    /// Shanghai Futures Exchange.
    Shfe,
    /// Zhengzhou Commodity Exchange.
    Czce,
    /// Dalian Commodity Exchange.
    Dce,
    /// Shanghai International Energy Exchange.
    Ine,
    /// Guangzhou Futures Exchange.
    Gfex,
    /// Local / simulated venue.
    Local,
}

impl Exchange {
    /// Canonical upper-case code, as used in `symbol.EXCHANGE` identifiers.
    pub const fn code(&self) -> &'static str {
        match self {
            Exchange::Cffex => "CFFEX",
            Exchange::Shfe => "SHFE",
            Exchange::Czce => "CZCE",
            Exchange::Dce => "DCE",
            Exchange::Ine => "INE",
            Exchange::Gfex => "GFEX",
            Exchange::Local => "LOCAL",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Exchange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CFFEX" => Ok(Exchange::Cffex),
            "SHFE" => Ok(Exchange::Shfe),
            "CZCE" => Ok(Exchange::Czce),
            "DCE" => Ok(Exchange::Dce),
            "INE" => Ok(Exchange::Ine),
            "GFEX" => Ok(Exchange::Gfex),
            "LOCAL" => Ok(Exchange::Local),
            other => Err(format!("unknown exchange: {other}")),
        }
    }
}

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Buy.
    Long,
    /// Sell.
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "Long"),
            Direction::Short => write!(f, "Short"),
        }
    }
}

/// Whether an order opens or closes a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Offset {
    /// Not applicable (venues without open/close semantics).
    None,
    /// Open a new position.
    Open,
    /// Close an existing position.
    Close,
    /// Close a position opened today (SHFE/INE).
    CloseToday,
    /// Close a position carried over from a previous session.
    CloseYesterday,
}

impl Offset {
    /// Returns `true` for [`Offset::Open`].
    #[inline]
    pub fn is_open(&self) -> bool {
        matches!(self, Offset::Open)
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Offset::None => write!(f, "None"),
            Offset::Open => write!(f, "Open"),
            Offset::Close => write!(f, "Close"),
            Offset::CloseToday => write!(f, "CloseToday"),
            Offset::CloseYesterday => write!(f, "CloseYesterday"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    /// Limit order with specified price.
    Limit,
    /// Market order.
    Market,
    /// Fill-and-kill: fill what is available immediately, cancel the rest.
    Fak,
    /// Fill-or-kill.
    Fok,
}

/// Order states reported by the trading engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Submitted to the gateway, not yet acknowledged.
    New,
    /// Acknowledged by the exchange, resting with nothing traded.
    Acked,
    /// Partially filled; some volume remains open.
    PartialFill,
    /// Cancel requested, not yet confirmed.
    PendingCancel,
    /// Fully filled; terminal state.
    Filled,
    /// Cancelled; terminal state.
    Cancelled,
    /// Rejected by the exchange; terminal state.
    Rejected,
}

impl OrderStatus {
    /// Returns `true` if this status is terminal (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled | Self::Rejected)
    }

    /// Returns `true` while the order can still trade.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

/// Order identifier assigned by the gateway (e.g. `CTP.1_-1520_3`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    /// Create a new order identifier.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Contract symbol as quoted by the exchange (e.g. `rb2405`, `IF2406`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    /// Create a new symbol.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Borrow the raw symbol text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Product prefix: the upper-cased letters before the first digit
    /// (`rb2405` -> `RB`, `ZC406` -> `ZC`). A symbol without digits is its
    /// own prefix.
    pub fn product(&self) -> String {
        let upper = self.0.to_ascii_uppercase();
        match upper.find(|c: char| c.is_ascii_digit()) {
            Some(i) => upper[..i].to_string(),
            None => upper,
        }
    }

    /// Exact contract key: the upper-cased symbol.
    pub fn contract(&self) -> String {
        self.0.to_ascii_uppercase()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tradeable instrument: symbol qualified by exchange.
///
/// Displays and parses as `symbol.EXCHANGE` (`rb2405.SHFE`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Instrument {
    /// Contract symbol.
    pub symbol: Symbol,
    /// Listing exchange.
    pub exchange: Exchange,
}

impl Instrument {
    /// Create a new instrument.
    pub fn new(symbol: impl Into<String>, exchange: Exchange) -> Self {
        Self {
            symbol: Symbol::new(symbol),
            exchange,
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.symbol, self.exchange)
    }
}

impl FromStr for Instrument {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (symbol, exchange) = s
            .rsplit_once('.')
            .ok_or_else(|| format!("instrument must be symbol.EXCHANGE: {s}"))?;
        if symbol.is_empty() {
            return Err(format!("empty symbol in instrument: {s}"));
        }
        Ok(Instrument::new(symbol, exchange.parse()?))
    }
}

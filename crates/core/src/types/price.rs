//! Fixed-point decimal price type.
//!
//! [`Price`] stores `mantissa * 10^(-scale)`. Futures ticks are coarse
//! (`0.2` for IF, `1` for rb, `0.05` for au), so equality and ordering must be
//! exact: the self-trade guard compares a request price against resting order
//! prices with `>=` / `<=`, and an `f64` rounding error at that boundary would
//! let a crossing order through.
//!
//! Comparisons across different scales normalize to the higher scale first.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed-point decimal representing a price.
///
/// # Examples
///
/// ```
/// use rg_core::types::Price;
///
/// let price = Price::new(38505, 1); // 3850.5
/// assert_eq!(price.to_f64(), 3850.5);
/// assert_eq!(price, Price::from(3850.5));
/// ```
#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "RawPrice")]
pub struct Price {
    mantissa: i64,
    scale: u8,
}

/// Largest supported scale. `10^18` is the highest power of ten an `i64`
/// holds, and aligning any `i64` mantissa by it still fits an `i128`.
pub const MAX_SCALE: u8 = 18;

/// Wire form of [`Price`], checked before it becomes one.
#[derive(Deserialize)]
struct RawPrice {
    mantissa: i64,
    scale: u8,
}

#[derive(Debug, thiserror::Error)]
#[error("price scale {0} exceeds the maximum of {MAX_SCALE}")]
pub struct ScaleError(u8);

impl TryFrom<RawPrice> for Price {
    type Error = ScaleError;

    fn try_from(raw: RawPrice) -> Result<Self, Self::Error> {
        if raw.scale > MAX_SCALE {
            return Err(ScaleError(raw.scale));
        }
        Ok(Self {
            mantissa: raw.mantissa,
            scale: raw.scale,
        })
    }
}

impl Price {
    /// Create a new price from mantissa and scale.
    ///
    /// A scale above [`MAX_SCALE`] is reduced to it, truncating the digits
    /// past the 18th decimal place.
    #[inline]
    pub const fn new(mantissa: i64, scale: u8) -> Self {
        let mut mantissa = mantissa;
        let mut scale = scale;
        while scale > MAX_SCALE {
            mantissa /= 10;
            scale -= 1;
        }
        Self { mantissa, scale }
    }

    /// Create a zero price with the given scale.
    #[inline]
    pub const fn zero(scale: u8) -> Self {
        Self::new(0, scale)
    }

    /// Returns `true` if this price is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    /// Returns the raw mantissa.
    #[inline]
    pub const fn mantissa(&self) -> i64 {
        self.mantissa
    }

    /// Returns the scale (number of decimal places).
    #[inline]
    pub const fn scale(&self) -> u8 {
        self.scale
    }

    /// Convert to `f64` for notional arithmetic, display, and serialization.
    #[inline]
    pub fn to_f64(&self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.scale as i32)
    }

    /// Returns `true` if this price is a whole number of `tick` steps.
    ///
    /// A zero tick places no constraint.
    pub fn is_multiple_of(&self, tick: Price) -> bool {
        if tick.is_zero() {
            return true;
        }
        let (price, step) = Self::normalize(*self, tick);
        price % step == 0
    }

    /// Align two prices to the higher of their scales, returning the
    /// mantissas at that scale.
    ///
    /// Both scales are at most [`MAX_SCALE`], so this never overflows.
    #[inline]
    fn normalize(a: Self, b: Self) -> (i128, i128) {
        let (ma, mb) = (a.mantissa as i128, b.mantissa as i128);
        match a.scale.cmp(&b.scale) {
            Ordering::Equal => (ma, mb),
            Ordering::Less => (ma * 10i128.pow((b.scale - a.scale) as u32), mb),
            Ordering::Greater => (ma, mb * 10i128.pow((a.scale - b.scale) as u32)),
        }
    }
}

impl fmt::Debug for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Price({}, scale={})", self.to_f64(), self.scale)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let Some(divisor) = 10i64.checked_pow(self.scale as u32) else {
            return write!(f, "{}", self.to_f64());
        };
        let whole = self.mantissa / divisor;
        let frac = (self.mantissa % divisor).abs();
        let sign = if self.mantissa < 0 && whole == 0 { "-" } else { "" };
        write!(
            f,
            "{}{}.{:0>width$}",
            sign,
            whole,
            frac,
            width = self.scale as usize
        )
    }
}

impl PartialEq for Price {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Price {}

impl PartialOrd for Price {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Price {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = Self::normalize(*self, *other);
        a.cmp(&b)
    }
}

impl From<f64> for Price {
    /// Convert an `f64` to a `Price` with 4 decimal places, enough for every
    /// listed futures tick size.
    fn from(value: f64) -> Self {
        const DEFAULT_SCALE: u8 = 4;
        let factor = 10f64.powi(DEFAULT_SCALE as i32);
        Self {
            mantissa: (value * factor).round() as i64,
            scale: DEFAULT_SCALE,
        }
    }
}

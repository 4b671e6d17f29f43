use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize};

/// A non-signed amount of Uganda shillings, held in minor units (cents).
///
/// The backend serializes decimals as strings (`"5000.00"`) in some views
/// and as JSON numbers in others; both decode into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    /// Rounds to the nearest cent. Non-finite values become zero.
    pub fn new(value: f64) -> Self {
        if value.is_finite() {
            Self((value * 100.0).round() as i64)
        } else {
            Self(0)
        }
    }

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn minor_units(self) -> i64 {
        self.0
    }

    pub fn value(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl From<f64> for Money {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value.saturating_mul(100))
    }
}

impl Serialize for Money {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.value())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMoneyError(String);

impl fmt::Display for ParseMoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid amount: {:?}", self.0)
    }
}

impl std::error::Error for ParseMoneyError {}

/// Exact decimal to cents. A third fractional digit rounds half up; the
/// rest are ignored.
fn parse_minor(digits: &str) -> Option<i64> {
    let (negative, digits) = match digits.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, digits),
    };
    let (integral, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if integral.is_empty() && fraction.is_empty() {
        return None;
    }
    if !integral.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole: i64 = if integral.is_empty() { 0 } else { integral.parse().ok()? };
    let mut frac = fraction.bytes().map(|b| i64::from(b - b'0'));
    let tens = frac.next().unwrap_or(0);
    let units = frac.next().unwrap_or(0);
    let round_up = i64::from(frac.next().unwrap_or(0) >= 5);

    let minor = whole
        .checked_mul(100)?
        .checked_add(tens * 10 + units + round_up)?;
    Some(if negative { -minor } else { minor })
}

impl FromStr for Money {
    type Err = ParseMoneyError;

    /// Accepts `5000`, `5000.00`, `5,000` and a leading `UGX`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s
            .trim()
            .trim_start_matches("UGX")
            .chars()
            .filter(|c| *c != ',' && !c.is_whitespace())
            .collect();
        parse_minor(&cleaned)
            .map(Money)
            .ok_or_else(|| ParseMoneyError(s.to_string()))
    }
}

/// Group the integral part in thousands: 1500000 -> "1,500,000".
fn group_thousands(integral: u64) -> String {
    let digits = integral.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let minor = self.0.unsigned_abs();
        let (integral, cents) = (minor / 100, minor % 100);
        if cents == 0 {
            write!(f, "UGX {}{}", sign, group_thousands(integral))
        } else {
            write!(f, "UGX {}{}.{:02}", sign, group_thousands(integral), cents)
        }
    }
}

/// Shared visitor: JSON number or decimal string, to minor units.
struct AmountVisitor;

impl<'de> de::Visitor<'de> for AmountVisitor {
    type Value = i64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number or a numeric string")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<i64, E> {
        if !v.is_finite() {
            return Err(E::custom("amount is not finite"));
        }
        Ok(Money::new(v).minor_units())
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
        v.checked_mul(100).ok_or_else(|| E::custom("amount out of range"))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
        i64::try_from(v)
            .ok()
            .and_then(|v| v.checked_mul(100))
            .ok_or_else(|| E::custom("amount out of range"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
        let unsigned = v.trim().trim_start_matches('+');
        Money::from_str(unsigned).map(Money::minor_units).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor).map(Money)
    }
}

/// A transaction amount with its direction made explicit.
///
/// Transaction lists carry strings such as `"+500,000"` or `"-350,000"`;
/// the sign is resolved here so nothing downstream inspects prefixes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignedAmount {
    Credit(Money),
    Debit(Money),
}

impl SignedAmount {
    pub fn from_value(value: f64) -> Self {
        Self::from_minor(Money::new(value).minor_units())
    }

    pub fn from_minor(minor: i64) -> Self {
        if minor < 0 {
            SignedAmount::Debit(Money(minor.saturating_neg()))
        } else {
            SignedAmount::Credit(Money(minor))
        }
    }

    pub fn amount(&self) -> Money {
        match self {
            SignedAmount::Credit(m) | SignedAmount::Debit(m) => *m,
        }
    }

    pub fn is_credit(&self) -> bool {
        matches!(self, SignedAmount::Credit(_))
    }

    /// Value with the sign applied (debits negative).
    pub fn signed_value(&self) -> f64 {
        match self {
            SignedAmount::Credit(m) => m.value(),
            SignedAmount::Debit(m) => -m.value(),
        }
    }
}

impl fmt::Display for SignedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignedAmount::Credit(m) => write!(f, "+{}", m),
            SignedAmount::Debit(m) => write!(f, "-{}", m),
        }
    }
}

impl<'de> Deserialize<'de> for SignedAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer
            .deserialize_any(AmountVisitor)
            .map(SignedAmount::from_minor)
    }
}

impl Serialize for SignedAmount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.signed_value())
    }
}

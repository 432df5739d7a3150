//! Value objects for the storefront core

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// URL-safe unique key for a delivery location
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slug(String);

impl Slug {
    pub fn new(value: impl Into<String>) -> Result<Self, SlugError> {
        let value = value.into().trim().to_lowercase();
        if value.is_empty() { return Err(SlugError::Empty); }
        if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(SlugError::InvalidChar);
        }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone)] pub enum SlugError { Empty, InvalidChar }
impl std::error::Error for SlugError {}
impl fmt::Display for SlugError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Empty => write!(f, "slug empty"), Self::InvalidChar => write!(f, "slug has invalid character") }
    }
}

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn kes(amount: Decimal) -> Self { Self::new(amount, "KES") }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }
    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }
}

impl Default for Money { fn default() -> Self { Self::zero("KES") } }

#[derive(Debug, Clone)] pub enum MoneyError { CurrencyMismatch }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "currency mismatch") }
}

/// Cart-line quantity, always at least 1. Requests for 0 or less are rejected
/// at the boundary, never clamped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub const ONE: Quantity = Quantity(1);

    pub fn new(value: u32) -> Result<Self, QuantityError> {
        if value < 1 { return Err(QuantityError::BelowMinimum); }
        Ok(Self(value))
    }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: Quantity) -> Self { Self(self.0.saturating_add(other.0)) }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;
    fn try_from(value: u32) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> u32 { q.0 }
}

#[derive(Debug, Clone)] pub enum QuantityError { BelowMinimum }
impl std::error::Error for QuantityError {}
impl fmt::Display for QuantityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "quantity must be at least 1") }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug() {
        let slug = Slug::new("  Nairobi-CBD ").unwrap();
        assert_eq!(slug.as_str(), "nairobi-cbd");
        assert!(Slug::new("nairobi cbd").is_err());
        assert!(Slug::new("").is_err());
    }

    #[test]
    fn test_money_add() {
        let a = Money::kes(Decimal::new(3000, 0));
        let b = Money::kes(Decimal::new(500, 0));
        assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(3500, 0));
        assert!(a.add(&Money::new(Decimal::ONE, "USD")).is_err());
    }

    #[test]
    fn test_quantity_floor() {
        assert!(Quantity::new(0).is_err());
        assert_eq!(Quantity::new(2).unwrap().value(), 2);
        assert_eq!(Quantity::ONE.add(Quantity::new(3).unwrap()).value(), 4);
    }

    #[test]
    fn test_quantity_rejects_zero_on_deserialize() {
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert_eq!(serde_json::from_str::<Quantity>("2").unwrap().value(), 2);
    }
}

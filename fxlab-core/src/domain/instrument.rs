use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::position::Direction;

/// Per-instrument pip and lot metadata.
///
/// Every price-distance to money conversion goes through this type; nothing in
/// the engine assumes a fixed decimal convention.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstrumentMeta {
    pub symbol: String,
    /// Price increment that constitutes one pip (0.0001 majors, 0.01 JPY pairs and metals).
    pub pip_size: f64,
    /// Account-currency value of a one-pip move on one standard lot.
    pub pip_value_per_lot: f64,
    pub min_lot: f64,
    pub max_lot: f64,
    pub lot_step: f64,
}

impl InstrumentMeta {
    pub fn new(symbol: impl Into<String>, pip_size: f64, pip_value_per_lot: f64) -> Self {
        Self {
            symbol: symbol.into(),
            pip_size,
            pip_value_per_lot,
            min_lot: 0.01,
            max_lot: 2.0,
            lot_step: 0.01,
        }
    }

    /// Builder-style override of the broker lot constraints.
    pub fn with_lots(mut self, min_lot: f64, max_lot: f64, lot_step: f64) -> Self {
        self.min_lot = min_lot;
        self.max_lot = max_lot;
        self.lot_step = lot_step;
        self
    }

    /// Known presets for common FX/metal symbols.
    pub fn preset(symbol: &str) -> Option<Self> {
        let upper = symbol.to_ascii_uppercase();
        match upper.as_str() {
            "EURUSD" | "GBPUSD" | "AUDUSD" | "NZDUSD" => Some(Self::new(upper, 0.0001, 10.0)),
            "USDJPY" => Some(Self::new(upper, 0.01, 9.0)),
            "XAUUSD" => Some(Self::new(upper, 0.01, 1.0)),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), InstrumentError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if self.symbol.trim().is_empty() {
            return Err(InstrumentError::EmptySymbol);
        }
        if !positive(self.pip_size) {
            return Err(InstrumentError::InvalidPipSize {
                symbol: self.symbol.clone(),
                pip_size: self.pip_size,
            });
        }
        if !positive(self.pip_value_per_lot) {
            return Err(InstrumentError::InvalidPipValue {
                symbol: self.symbol.clone(),
                pip_value: self.pip_value_per_lot,
            });
        }
        if !positive(self.min_lot)
            || !positive(self.lot_step)
            || !self.max_lot.is_finite()
            || self.max_lot < self.min_lot
        {
            return Err(InstrumentError::InvalidLotLimits {
                symbol: self.symbol.clone(),
                min_lot: self.min_lot,
                max_lot: self.max_lot,
                lot_step: self.lot_step,
            });
        }
        Ok(())
    }

    /// Convert a price distance to pips.
    pub fn price_to_pips(&self, distance: f64) -> f64 {
        distance / self.pip_size
    }

    /// Convert a pip count to a price distance.
    pub fn pips_to_price(&self, pips: f64) -> f64 {
        pips * self.pip_size
    }

    /// Money value of a price distance held with `lots` standard lots.
    pub fn money_at_risk(&self, distance: f64, lots: f64) -> f64 {
        self.price_to_pips(distance) * self.pip_value_per_lot * lots
    }

    /// Realized P&L of a round trip: `lots × (exit − entry) / pip_size × pip_value`, sign-adjusted.
    pub fn pnl(&self, direction: Direction, entry: f64, exit: f64, lots: f64) -> f64 {
        direction.sign() * self.money_at_risk(exit - entry, lots)
    }
}

/// Lookup of instrument metadata by symbol.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InstrumentRegistry {
    instruments: BTreeMap<String, InstrumentMeta>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert metadata, returning the previous entry for the same symbol if any.
    pub fn insert(&mut self, meta: InstrumentMeta) -> Option<InstrumentMeta> {
        self.instruments.insert(meta.symbol.clone(), meta)
    }

    pub fn get(&self, symbol: &str) -> Option<&InstrumentMeta> {
        self.instruments.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.instruments.contains_key(symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstrumentMeta> {
        self.instruments.values()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Size a trade for `symbol`; unknown symbols size to zero.
    pub fn calculate_position_size(
        &self,
        symbol: &str,
        equity: f64,
        risk_fraction: f64,
        stop_distance_price: f64,
    ) -> f64 {
        match self.get(symbol) {
            Some(meta) => {
                crate::sizers::calculate_position_size(equity, risk_fraction, stop_distance_price, meta)
            }
            None => 0.0,
        }
    }
}

impl FromIterator<InstrumentMeta> for InstrumentRegistry {
    fn from_iter<I: IntoIterator<Item = InstrumentMeta>>(iter: I) -> Self {
        let mut registry = Self::new();
        for meta in iter {
            registry.insert(meta);
        }
        registry
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InstrumentError {
    #[error("instrument symbol is empty")]
    EmptySymbol,

    #[error("{symbol}: pip_size {pip_size} must be positive")]
    InvalidPipSize { symbol: String, pip_size: f64 },

    #[error("{symbol}: pip_value_per_lot {pip_value} must be positive")]
    InvalidPipValue { symbol: String, pip_value: f64 },

    #[error("{symbol}: invalid lot limits (min {min_lot}, max {max_lot}, step {lot_step})")]
    InvalidLotLimits { symbol: String, min_lot: f64, max_lot: f64, lot_step: f64 },
}

//! Pending-admission queues.
//!
//! A queue loses population each week to five competing outflows. All five
//! are computed from one pre-week snapshot and netted once, so no outflow
//! sees another's intermediate result and the queue never goes negative.

use serde::{Deserialize, Serialize};

use crate::sanitize::unit;

/// Weekly fractional outflow rates for one queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueRates {
    /// → D (applied at the untreated mortality rate).
    pub mortality: f64,
    /// → U.
    pub abandonment: f64,
    /// → I.
    pub bypass: f64,
    /// → R.
    pub self_resolution: f64,
    /// → the level's compartment, already gated by capacity.
    pub clearance: f64,
}

/// Amounts leaving a queue in one week.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueOutflows {
    pub deaths: f64,
    pub abandoned: f64,
    pub bypassed: f64,
    pub self_resolved: f64,
    pub cleared: f64,
}

impl QueueOutflows {
    pub fn total(&self) -> f64 {
        self.deaths + self.abandoned + self.bypassed + self.self_resolved + self.cleared
    }
}

/// Split `stock` across competing outflow probabilities.
///
/// Each rate is bounded to [0, 1]. When the rates sum above 1 they are
/// scaled down proportionally, so the returned amounts never exceed
/// `stock`.
pub fn competing_outflows<const N: usize>(stock: f64, rates: [f64; N]) -> [f64; N] {
    let stock = stock.max(0.0);
    let bounded = rates.map(unit);
    let sum: f64 = bounded.iter().sum();
    let scale = if sum > 1.0 { 1.0 / sum } else { 1.0 };
    bounded.map(|r| stock * r * scale)
}

/// Advance one queue by a week: `(queue_length, rates) → (outflows, new_length)`.
pub fn advance_queue(queue_length: f64, rates: &QueueRates) -> (QueueOutflows, f64) {
    let snapshot = queue_length.max(0.0);
    let [deaths, abandoned, bypassed, self_resolved, cleared] = competing_outflows(
        snapshot,
        [
            rates.mortality,
            rates.abandonment,
            rates.bypass,
            rates.self_resolution,
            rates.clearance,
        ],
    );
    let outflows = QueueOutflows {
        deaths,
        abandoned,
        bypassed,
        self_resolved,
        cleared,
    };
    let remaining = (snapshot - outflows.total()).max(0.0);
    (outflows, remaining)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates() -> QueueRates {
        QueueRates {
            mortality: 0.01,
            abandonment: 0.10,
            bypass: 0.05,
            self_resolution: 0.04,
            clearance: 0.30,
        }
    }

    #[test]
    fn test_outflows_from_snapshot() {
        let (out, remaining) = advance_queue(1000.0, &rates());
        assert!((out.deaths - 10.0).abs() < 1e-9);
        assert!((out.abandoned - 100.0).abs() < 1e-9);
        assert!((out.bypassed - 50.0).abs() < 1e-9);
        assert!((out.self_resolved - 40.0).abs() < 1e-9);
        assert!((out.cleared - 300.0).abs() < 1e-9);
        assert!((remaining - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_conservation() {
        let (out, remaining) = advance_queue(1234.5, &rates());
        assert!((out.total() + remaining - 1234.5).abs() < 1e-9);
    }

    #[test]
    fn test_rates_over_one_are_scaled() {
        let r = QueueRates {
            mortality: 0.5,
            abandonment: 0.5,
            bypass: 0.5,
            self_resolution: 0.5,
            clearance: 0.0,
        };
        let (out, remaining) = advance_queue(100.0, &r);
        assert!((out.total() - 100.0).abs() < 1e-9);
        assert!((out.deaths - 25.0).abs() < 1e-9);
        assert_eq!(remaining, 0.0);
    }

    #[test]
    fn test_empty_and_negative_queue() {
        let (out, remaining) = advance_queue(0.0, &rates());
        assert_eq!(out.total(), 0.0);
        assert_eq!(remaining, 0.0);
        let (out, remaining) = advance_queue(-5.0, &rates());
        assert_eq!(out.total(), 0.0);
        assert_eq!(remaining, 0.0);
    }

    #[test]
    fn test_out_of_range_rates_bounded() {
        let r = QueueRates {
            mortality: -1.0,
            clearance: 2.0,
            ..Default::default()
        };
        let (out, remaining) = advance_queue(10.0, &r);
        assert_eq!(out.deaths, 0.0);
        assert!((out.cleared - 10.0).abs() < 1e-12);
        assert_eq!(remaining, 0.0);
    }

    #[test]
    fn test_competing_outflows_below_one_untouched() {
        let [a, b] = competing_outflows(200.0, [0.25, 0.5]);
        assert!((a - 50.0).abs() < 1e-12);
        assert!((b - 100.0).abs() < 1e-12);
    }
}

//! Compartmental state and its initializer.
//!
//! A `CompartmentalState` is an immutable weekly snapshot: the step
//! function reads one and returns the next. Stocks are fractional person
//! counts.

use serde::{Deserialize, Serialize};

use crate::params::{ModelParameters, NUM_LEVELS};

/// Cumulative patient-days per compartment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientDays {
    pub untreated: f64,
    pub informal: f64,
    pub levels: [f64; NUM_LEVELS],
}

impl PatientDays {
    /// Days spent outside formal care (untreated plus informal).
    pub fn outside_formal(&self) -> f64 {
        self.untreated + self.informal
    }

    /// Days spent in formal care, all levels.
    pub fn formal(&self) -> f64 {
        self.levels.iter().sum()
    }
}

/// Weekly occupancy snapshot plus run accumulators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompartmentalState {
    /// Weeks stepped since this state's origin.
    pub week: u32,
    /// U: sick, no care.
    pub untreated: f64,
    /// I: informal care (traditional healers, pharmacies, home remedies).
    pub informal: f64,
    /// F: chose formal care this week, dispatched to a level next week.
    pub seeking_formal: f64,
    /// L0..L3: community, primary, district, tertiary.
    pub levels: [f64; NUM_LEVELS],
    /// R: cumulative resolved.
    pub resolved: f64,
    /// D: cumulative deaths, queue deaths included.
    pub dead: f64,
    pub patient_days: PatientDays,
    pub episodes_touched: f64,
    /// Pending admissions per level, not counted in `levels`.
    pub queues: [f64; NUM_LEVELS],
    pub queue_deaths: f64,
}

impl CompartmentalState {
    /// Everyone in the system who is not dead, resolved included.
    pub fn live_population(&self) -> f64 {
        self.active_cases() + self.resolved
    }

    /// Unresolved, living cases: U + I + F + levels + queues.
    pub fn active_cases(&self) -> f64 {
        self.untreated
            + self.informal
            + self.seeking_formal
            + self.formal_occupancy()
            + self.total_queued()
    }

    pub fn formal_occupancy(&self) -> f64 {
        self.levels.iter().sum()
    }

    pub fn total_queued(&self) -> f64 {
        self.queues.iter().sum()
    }

    /// Zero the run accumulators while keeping active stocks.
    ///
    /// Used at the end of burn-in so measured outcomes exclude warm-up.
    pub fn reset_accumulators(&mut self) {
        self.week = 0;
        self.resolved = 0.0;
        self.dead = 0.0;
        self.patient_days = PatientDays::default();
        self.episodes_touched = 0.0;
        self.queue_deaths = 0.0;
    }
}

/// Build the starting state for a population.
///
/// Seeds one week of incidence, split between formal seeking, informal
/// care and untreated by the parameters' care-seeking shares. Every other
/// stock and accumulator starts at zero.
pub fn initial_state(population: f64, params: &ModelParameters) -> CompartmentalState {
    let weekly_cases = (params.lambda * population.max(0.0) / 52.0).max(0.0);
    let formal = weekly_cases * params.phi0;
    let outside = weekly_cases - formal;
    let informal = outside * params.informal_care_ratio;

    CompartmentalState {
        seeking_formal: formal,
        informal,
        untreated: outside - informal,
        ..Default::default()
    }
}

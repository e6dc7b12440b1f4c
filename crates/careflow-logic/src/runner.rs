//! Scenario runs: burn-in, measured weeks, and result aggregation.
//!
//! A run starts from the seeded (or caller-supplied) state, steps through
//! a fixed 52-week burn-in whose outcomes are discarded, then steps
//! `num_weeks` measured weeks and summarises the terminal state. Runs
//! share nothing, so independent scenarios can execute on separate
//! threads with no coordination.

use serde::{Deserialize, Serialize};

use crate::economics::calculate_economics;
use crate::error::SimulationError;
use crate::params::{ModelParameters, NUM_LEVELS};
use crate::sanitize::{safe_div, sanitize};
use crate::state::{initial_state, CompartmentalState};
use crate::step::{step, step_with_flows};

/// Discarded warm-up weeks before measurement starts.
pub const BURN_IN_WEEKS: u32 = 52;

/// Upper bound on up-front trajectory allocation; longer runs grow as they go.
const PREALLOCATED_WEEKS: usize = 20 * 52;

/// Floor on the weekly resolution rate used for time-to-resolution.
pub const MIN_RESOLUTION_RATE: f64 = 0.01;

/// Run inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub population: f64,
    /// Measured weeks after burn-in.
    pub num_weeks: i32,
    /// Starting state; `None` seeds one week of incidence.
    pub initial_state: Option<CompartmentalState>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            population: 1_000_000.0,
            num_weeks: 52,
            initial_state: None,
        }
    }
}

/// Queue behaviour over the measured weeks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStatistics {
    /// Mean queue length per level.
    pub average: [f64; NUM_LEVELS],
    /// Largest queue length per level.
    pub peak: [f64; NUM_LEVELS],
    /// Σ weekly queue lengths across levels.
    pub total_person_weeks: f64,
    pub queue_deaths: f64,
}

/// Run outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub cumulative_deaths: f64,
    pub cumulative_resolved: f64,
    pub total_cost: f64,
    pub dalys: f64,
    pub yll: f64,
    pub yld: f64,
    pub avg_time_to_resolution_weeks: f64,
    /// Post-burn-in snapshot followed by one state per measured week.
    pub trajectory: Vec<CompartmentalState>,
    /// Congestion at the start of each measured week.
    pub congestion: Vec<f64>,
    pub queue_stats: QueueStatistics,
}

impl SimulationResult {
    pub fn final_state(&self) -> Option<&CompartmentalState> {
        self.trajectory.last()
    }
}

/// Run one scenario to completion.
pub fn run_simulation(
    params: &ModelParameters,
    config: &SimulationConfig,
) -> Result<SimulationResult, SimulationError> {
    run_simulation_with_cancel(params, config, || false)
}

/// Run one scenario, checking `should_stop` before every week.
///
/// Returns [`SimulationError::Cancelled`] with the absolute week index
/// (burn-in included) when the predicate fires.
pub fn run_simulation_with_cancel(
    params: &ModelParameters,
    config: &SimulationConfig,
    mut should_stop: impl FnMut() -> bool,
) -> Result<SimulationResult, SimulationError> {
    let population = config.population;
    if !(population.is_finite() && population > 0.0) {
        return Err(SimulationError::InvalidPopulation(population));
    }
    if config.num_weeks < 0 {
        return Err(SimulationError::InvalidWeekCount(config.num_weeks));
    }
    let num_weeks = config.num_weeks as u32;

    log::info!(
        "running scenario: population={} weeks={} ai_active={}",
        population,
        num_weeks,
        params.ai_active
    );

    let mut state = match &config.initial_state {
        Some(s) => s.clone(),
        None => initial_state(population, params),
    };

    for week in 0..BURN_IN_WEEKS {
        if should_stop() {
            return Err(SimulationError::Cancelled { week });
        }
        state = step(&state, params, population);
    }
    state.reset_accumulators();

    let hint = (num_weeks as usize).min(PREALLOCATED_WEEKS);
    let mut trajectory = Vec::with_capacity(hint + 1);
    let mut congestion = Vec::with_capacity(hint);
    trajectory.push(state.clone());

    for week in 0..num_weeks {
        if should_stop() {
            return Err(SimulationError::Cancelled {
                week: BURN_IN_WEEKS + week,
            });
        }
        let (next, flows) = step_with_flows(&state, params, population);
        congestion.push(flows.congestion);
        trajectory.push(next.clone());
        state = next;
    }

    let result = summarize(params, trajectory, congestion);
    log::info!(
        "scenario done: deaths={:.1} resolved={:.1} cost={:.0} dalys={:.1}",
        result.cumulative_deaths,
        result.cumulative_resolved,
        result.total_cost,
        result.dalys
    );
    Ok(result)
}

fn summarize(
    params: &ModelParameters,
    trajectory: Vec<CompartmentalState>,
    congestion: Vec<f64>,
) -> SimulationResult {
    let terminal = trajectory.last().cloned().unwrap_or_default();
    let economics = calculate_economics(&terminal, params);

    SimulationResult {
        cumulative_deaths: sanitize(terminal.dead),
        cumulative_resolved: sanitize(terminal.resolved),
        total_cost: economics.total_cost,
        dalys: economics.dalys,
        yll: economics.yll,
        yld: economics.yld,
        avg_time_to_resolution_weeks: time_to_resolution(&terminal, params),
        queue_stats: queue_statistics(&trajectory),
        trajectory,
        congestion,
    }
}

/// Mean weekly resolution rate along the care pathway, floored.
///
/// Weighted by where active cases sit in the given state; an empty state
/// falls back to the entry split of new cases.
pub fn pathway_resolution_rate(state: &CompartmentalState, params: &ModelParameters) -> f64 {
    let mut weighted = state.untreated * params.mu_untreated + state.informal * params.mu_informal;
    let mut weight = state.untreated + state.informal;
    for k in 0..NUM_LEVELS {
        weighted += state.levels[k] * params.mu_level(k);
        weight += state.levels[k];
    }

    let rate = if weight > 0.0 {
        safe_div(weighted, weight, 0.0)
    } else {
        let formal = params.phi0;
        let informal = (1.0 - params.phi0) * params.informal_care_ratio;
        let untreated = 1.0 - formal - informal;
        formal * params.mu_l0 + informal * params.mu_informal + untreated * params.mu_untreated
    };
    sanitize(rate).max(MIN_RESOLUTION_RATE)
}

/// Expected weeks to resolution, `1 / rate` for a geometric wait.
pub fn time_to_resolution(state: &CompartmentalState, params: &ModelParameters) -> f64 {
    sanitize(1.0 / pathway_resolution_rate(state, params))
}

/// Average and peak queue lengths over the measured weeks.
///
/// The first trajectory entry is the post-burn-in snapshot and is not a
/// measured week.
pub fn queue_statistics(trajectory: &[CompartmentalState]) -> QueueStatistics {
    let measured = trajectory.get(1..).unwrap_or(&[]);
    let mut stats = QueueStatistics {
        queue_deaths: trajectory.last().map_or(0.0, |s| sanitize(s.queue_deaths)),
        ..Default::default()
    };
    if measured.is_empty() {
        return stats;
    }

    let mut totals = [0.0; NUM_LEVELS];
    for s in measured {
        for k in 0..NUM_LEVELS {
            totals[k] += s.queues[k];
            stats.peak[k] = stats.peak[k].max(s.queues[k]);
        }
    }
    let weeks = measured.len() as f64;
    for k in 0..NUM_LEVELS {
        stats.average[k] = sanitize(totals[k] / weeks);
    }
    stats.total_person_weeks = sanitize(totals.iter().sum());
    stats
}

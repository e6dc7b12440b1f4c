//! Pure patient-flow simulation logic for careflow.
//!
//! This crate models weekly patient flow through a tiered health system
//! (untreated → informal care → community/primary/district/tertiary care
//! → resolved or dead) and how AI interventions shift it. Functions take
//! plain data and return results: no I/O, no global state, no hidden
//! randomness. Independent scenarios can run on separate threads.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`capacity`] | Congestion measure, feedback modifiers, admission gating |
//! | [`economics`] | Cost, DALYs, ICER |
//! | [`error`] | Caller-contract violations |
//! | [`interventions`] | AI effect tables, uptake, apply → clamp → derive pipeline |
//! | [`params`] | Rate constants, defaults, probability clamping |
//! | [`profile`] | Disease / health-system / country layering into parameters |
//! | [`queue`] | Competing queue outflows from one snapshot |
//! | [`runner`] | Burn-in, measured weeks, result aggregation |
//! | [`sanitize`] | NaN / infinity handling for returned numbers |
//! | [`state`] | Compartmental state and initializer |
//! | [`step`] | The weekly transition function |
//!
//! # Example
//!
//! ```
//! use careflow_logic::economics::calculate_icer;
//! use careflow_logic::interventions::{
//!     apply_ai_interventions, AiInterventionSpec, EffectTables, InterventionKind,
//! };
//! use careflow_logic::params::default_parameters;
//! use careflow_logic::runner::{run_simulation, SimulationConfig};
//!
//! let base = default_parameters();
//! let config = SimulationConfig { population: 100_000.0, num_weeks: 26, ..Default::default() };
//! let baseline = run_simulation(&base, &config).unwrap();
//!
//! let spec = AiInterventionSpec::with_active(&[InterventionKind::Diagnostic]);
//! let ai = apply_ai_interventions(&base, &spec, None, &EffectTables::standard(), None, true);
//! let with_ai = run_simulation(&ai, &config).unwrap();
//!
//! let _icer = calculate_icer(&with_ai, &baseline);
//! ```

pub mod capacity;
pub mod economics;
pub mod error;
pub mod interventions;
pub mod params;
pub mod profile;
pub mod queue;
pub mod runner;
pub mod sanitize;
pub mod state;
pub mod step;

pub use error::SimulationError;

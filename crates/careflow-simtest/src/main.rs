//! careflow Headless Scenario Harness
//!
//! Runs the patient-flow model end to end against built-in scenarios and
//! checks the model laws. Runs entirely in-process: no files written, no
//! networking.
//!
//! Usage:
//!   cargo run -p careflow-simtest
//!   cargo run -p careflow-simtest -- --verbose
//!   cargo run -p careflow-simtest -- --population 250000 --weeks 104

use std::collections::BTreeMap;

use careflow_logic::economics::{calculate_icer, Icer};
use careflow_logic::interventions::{
    apply_ai_interventions, AiInterventionSpec, CostTable, EffectTable, EffectTables,
    InterventionKind, UptakeConfig,
};
use careflow_logic::params::{default_parameters, ModelParameters, MORTALITY_FIELDS, NUM_LEVELS};
use careflow_logic::profile::{
    build_parameters, CountryAdjustment, DiseaseProfile, HealthSystemPreset,
};
use careflow_logic::runner::{run_simulation, SimulationConfig, SimulationResult};
use careflow_logic::state::initial_state;
use careflow_logic::step::{step, step_with_flows, WEEKS_PER_YEAR};
use careflow_logic::SimulationError;
use clap::Parser;
use colored::*;
use rayon::prelude::*;
use serde::Deserialize;
use simple_logger::SimpleLogger;

// ── Scenario library ────────────────────────────────────────────────────
const SCENARIOS_JSON: &str = include_str!("../../../data/scenarios.json");

#[derive(Debug, Deserialize)]
struct ScenarioLibrary {
    diseases: Vec<DiseaseProfile>,
    presets: Vec<HealthSystemPreset>,
    #[serde(default)]
    urban_presets: Vec<String>,
    #[serde(default)]
    countries: BTreeMap<String, CountryAdjustment>,
    /// disease id → intervention → effect entries
    #[serde(default)]
    effect_overrides: BTreeMap<String, BTreeMap<InterventionKind, EffectTable>>,
}

impl ScenarioLibrary {
    fn effect_tables(&self) -> EffectTables {
        let mut tables = EffectTables::standard();
        for (disease, per_kind) in &self.effect_overrides {
            for (&kind, entries) in per_kind {
                tables = tables.with_disease_override(disease, kind, entries.clone());
            }
        }
        tables
    }

    fn is_urban(&self, preset: &HealthSystemPreset) -> bool {
        self.urban_presets.iter().any(|n| n == &preset.name)
    }
}

// ── CLI and logging ─────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "careflow-simtest")]
#[command(about = "Headless scenario harness for the careflow patient-flow model")]
struct Args {
    /// Print every check and debug logs
    #[arg(short, long)]
    verbose: bool,

    /// Population for library scenarios and the sweep
    #[arg(short, long, default_value = "1000000")]
    population: f64,

    /// Measured weeks for library scenarios and the sweep
    #[arg(short, long, default_value = "52")]
    weeks: i32,

    /// Skip the intervention-combination sweep
    #[arg(long)]
    no_sweep: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    if let Err(e) = SimpleLogger::new().with_level(level).init() {
        eprintln!("logger already set: {}", e);
    }
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

impl TestResult {
    fn failed_run(name: &str, err: &SimulationError) -> Self {
        TestResult {
            name: name.into(),
            passed: false,
            detail: format!("run failed: {}", err),
        }
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);
    println!("{}", "=== careflow Scenario Harness ===\n".bold());

    let mut results = Vec::new();

    // 1. Scenario library parse and parameter assembly
    let library = match serde_json::from_str::<ScenarioLibrary>(SCENARIOS_JSON) {
        Ok(lib) => Some(lib),
        Err(e) => {
            results.push(TestResult {
                name: "library_parse".into(),
                passed: false,
                detail: format!("JSON parse error: {}", e),
            });
            None
        }
    };
    if let Some(lib) = &library {
        results.extend(validate_library(lib, args.verbose));
    }

    // 2. Model laws
    results.extend(validate_model_laws(args.verbose));

    // 3. Interventions and economics
    results.extend(validate_interventions(args.verbose));

    // 4. Library scenarios
    if let Some(lib) = &library {
        results.extend(run_library_scenarios(lib, &args));
    }

    // 5. Intervention-combination sweep
    if let (Some(lib), false) = (&library, args.no_sweep) {
        results.extend(run_sweep(lib, &args));
    }

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓".green() } else { "✗".red() };
        if !r.passed || args.verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    let summary = format!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );
    if failed > 0 {
        println!("{}", summary.red().bold());
        std::process::exit(1);
    }
    println!("{}", summary.green().bold());
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn config(population: f64, num_weeks: i32) -> SimulationConfig {
    SimulationConfig {
        population,
        num_weeks,
        initial_state: None,
    }
}

fn out_of_range(p: &ModelParameters) -> Vec<&'static str> {
    p.probabilities()
        .into_iter()
        .filter(|(_, v)| !(0.0..=1.0).contains(v))
        .map(|(name, _)| name)
        .collect()
}

fn result_is_bounded(r: &SimulationResult) -> bool {
    let finite = [
        r.cumulative_deaths,
        r.cumulative_resolved,
        r.total_cost,
        r.dalys,
        r.avg_time_to_resolution_weeks,
    ]
    .iter()
    .all(|v| v.is_finite() && *v >= 0.0);
    let stocks = r.trajectory.iter().all(|s| {
        s.untreated >= 0.0
            && s.informal >= 0.0
            && s.seeking_formal >= 0.0
            && s.levels.iter().chain(s.queues.iter()).all(|&v| v >= 0.0)
    });
    finite && stocks && r.congestion.iter().all(|c| (0.0..=1.0).contains(c))
}

fn describe_icer(icer: &Icer) -> String {
    match icer {
        Icer::Dominant => "dominant".into(),
        Icer::Dominated => "dominated".into(),
        Icer::Ratio(r) if r.is_infinite() => "no DALY change".into(),
        Icer::Ratio(r) => format!("{:.2}/DALY", r),
    }
}

fn kinds_for_mask(mask: u32) -> Vec<InterventionKind> {
    InterventionKind::all()
        .into_iter()
        .enumerate()
        .filter(|(i, _)| mask & (1 << *i) != 0)
        .map(|(_, k)| k)
        .collect()
}

// ── 1. Scenario Library ─────────────────────────────────────────────────

fn validate_library(lib: &ScenarioLibrary, verbose: bool) -> Vec<TestResult> {
    println!("--- Scenario Library ---");
    let mut results = Vec::new();

    results.push(TestResult {
        name: "library_not_empty".into(),
        passed: !lib.diseases.is_empty() && !lib.presets.is_empty(),
        detail: format!(
            "{} diseases, {} presets, {} countries",
            lib.diseases.len(),
            lib.presets.len(),
            lib.countries.len()
        ),
    });

    let unknown_overrides: Vec<_> = lib
        .effect_overrides
        .keys()
        .filter(|id| !lib.diseases.iter().any(|d| &d.id == *id))
        .collect();
    results.push(TestResult {
        name: "library_overrides_match_diseases".into(),
        passed: unknown_overrides.is_empty(),
        detail: if unknown_overrides.is_empty() {
            "every effect override names a known disease".into()
        } else {
            format!("overrides for unknown diseases: {:?}", unknown_overrides)
        },
    });

    // Every disease × preset × (no country | each country) assembles cleanly
    let mut combos = 0;
    let mut bad = Vec::new();
    let countries: Vec<Option<&CountryAdjustment>> = std::iter::once(None)
        .chain(lib.countries.values().map(Some))
        .collect();
    for disease in &lib.diseases {
        for preset in &lib.presets {
            for country in &countries {
                let p = build_parameters(disease, preset, *country);
                combos += 1;
                let out = out_of_range(&p);
                if !out.is_empty() || p.capacity_share <= 0.0 {
                    bad.push(format!("{}/{}", disease.id, preset.name));
                }
            }
        }
    }
    results.push(TestResult {
        name: "library_parameters_valid".into(),
        passed: bad.is_empty(),
        detail: if bad.is_empty() {
            format!("{} combinations within bounds", combos)
        } else {
            format!("invalid: {}", bad.join(", "))
        },
    });

    if verbose {
        println!("  Disease baselines:");
        for d in &lib.diseases {
            println!(
                "    {:22} λ={:.3} μ_L1={:.2} δ_U={:.4}",
                d.id, d.lambda, d.mu.levels[1], d.delta.untreated
            );
        }
    }

    results
}

// ── 2. Model Laws ───────────────────────────────────────────────────────

fn validate_model_laws(_verbose: bool) -> Vec<TestResult> {
    println!("--- Model Laws ---");
    let mut results = Vec::new();
    let base = default_parameters();
    let pop = 100_000.0;

    // Closed system: nobody resolves or dies, so stock grows by incidence
    let closed = ModelParameters {
        mu_untreated: 0.0,
        mu_informal: 0.0,
        mu_l0: 0.0,
        mu_l1: 0.0,
        mu_l2: 0.0,
        mu_l3: 0.0,
        delta_untreated: 0.0,
        delta_informal: 0.0,
        delta_l0: 0.0,
        delta_l1: 0.0,
        delta_l2: 0.0,
        delta_l3: 0.0,
        queue_self_resolve_rate: 0.0,
        ..default_parameters()
    };
    let mut s = initial_state(pop, &closed);
    let seed = s.live_population();
    let weekly = closed.lambda * pop / WEEKS_PER_YEAR;
    let mut worst = 0.0f64;
    for week in 1..=104 {
        s = step(&s, &closed, pop);
        let expected = seed + weekly * week as f64;
        worst = worst.max(((s.live_population() + s.dead) - expected).abs() / expected);
    }
    results.push(TestResult {
        name: "law_conservation_closed".into(),
        passed: worst < 1e-9 && s.dead == 0.0,
        detail: format!("104 weeks, worst relative drift {:.2e}", worst),
    });

    // Queue balance: inflow − outflow = Δqueue every week
    let tight = ModelParameters {
        capacity_share: 0.0005,
        queue_prevention: 0.2,
        ..default_parameters()
    };
    let mut s = initial_state(pop, &tight);
    let mut worst = 0.0f64;
    for _ in 0..52 {
        let (next, flows) = step_with_flows(&s, &tight, pop);
        for k in 0..NUM_LEVELS {
            let delta = next.queues[k] - s.queues[k];
            let net = flows.queue_inflow[k] - flows.queue_outflow[k].total();
            worst = worst.max((delta - net).abs() / (1.0 + s.queues[k]));
        }
        s = next;
    }
    results.push(TestResult {
        name: "law_queue_balance".into(),
        passed: worst < 1e-9,
        detail: format!(
            "52 weeks, {:.0} queued at end, worst imbalance {:.2e}",
            s.total_queued(),
            worst
        ),
    });

    // Mortality monotonicity
    let cfg = config(pop, 52);
    let deaths = |p: &ModelParameters| run_simulation(p, &cfg).map(|r| r.cumulative_deaths);
    match deaths(&base) {
        Ok(baseline) => {
            for (index, field) in MORTALITY_FIELDS.iter().enumerate() {
                let name = format!("law_mortality_monotone_{}", field);
                match deaths(&base.with_mortality_raised(index, 0.002)) {
                    Ok(d) => results.push(TestResult {
                        name,
                        passed: d >= baseline,
                        detail: format!("{:.1} → {:.1} deaths", baseline, d),
                    }),
                    Err(e) => results.push(TestResult::failed_run(&name, &e)),
                }
            }
        }
        Err(e) => results.push(TestResult::failed_run("law_mortality_monotone", &e)),
    }

    // Determinism
    let a = run_simulation(&base, &cfg);
    let b = run_simulation(&base, &cfg);
    results.push(TestResult {
        name: "law_deterministic".into(),
        passed: a.is_ok() && a == b,
        detail: "identical inputs → identical results".into(),
    });

    // Reference scenario: 1M people, 52 weeks, no AI
    match run_simulation(&base, &config(1_000_000.0, 52)) {
        Ok(r) => {
            let expected_deaths = 8823.706976143072;
            let expected_dalys = 307642.07586450834;
            let ok = (r.cumulative_deaths - expected_deaths).abs() < 1e-6 * expected_deaths
                && (r.dalys - expected_dalys).abs() < 1e-6 * expected_dalys;
            results.push(TestResult {
                name: "law_reference_scenario".into(),
                passed: ok,
                detail: format!(
                    "deaths {:.2} (expect {:.2}), DALYs {:.1} (expect {:.1})",
                    r.cumulative_deaths, expected_deaths, r.dalys, expected_dalys
                ),
            });
        }
        Err(e) => results.push(TestResult::failed_run("law_reference_scenario", &e)),
    }

    // Caller contract
    let rejected = matches!(
        run_simulation(&base, &config(0.0, 52)),
        Err(SimulationError::InvalidPopulation(_))
    ) && matches!(
        run_simulation(&base, &config(pop, -1)),
        Err(SimulationError::InvalidWeekCount(-1))
    );
    results.push(TestResult {
        name: "law_rejects_bad_config".into(),
        passed: rejected,
        detail: "population 0 and weeks −1 rejected".into(),
    });

    results
}

// ── 3. Interventions & Economics ────────────────────────────────────────

fn validate_interventions(verbose: bool) -> Vec<TestResult> {
    println!("--- Interventions & Economics ---");
    let mut results = Vec::new();
    let base = default_parameters();
    let tables = EffectTables::standard();
    let costs = CostTable::standard();
    let cfg = config(1_000_000.0, 52);

    // No interventions → identical parameters
    let none = apply_ai_interventions(
        &base,
        &AiInterventionSpec::default(),
        Some(&costs),
        &tables,
        None,
        true,
    );
    results.push(TestResult {
        name: "ai_none_is_identity".into(),
        passed: none == base,
        detail: "no active interventions leaves parameters untouched".into(),
    });

    // Zero uptake leaves every probability untouched
    let zero_uptake = AiInterventionSpec {
        uptake: Some(UptakeConfig {
            global_multiplier: 0.0,
            ..Default::default()
        }),
        ..AiInterventionSpec::with_active(&InterventionKind::all())
    };
    let p = apply_ai_interventions(&base, &zero_uptake, None, &tables, None, true);
    results.push(TestResult {
        name: "ai_zero_uptake_noop".into(),
        passed: p.probabilities() == base.probabilities(),
        detail: "uptake 0 on all six interventions".into(),
    });

    // Each intervention alone stays in bounds
    let baseline = match run_simulation(&base, &cfg) {
        Ok(r) => r,
        Err(e) => {
            results.push(TestResult::failed_run("ai_baseline", &e));
            return results;
        }
    };
    if verbose {
        println!("  Single interventions vs baseline (1M, 52 weeks):");
    }
    for kind in InterventionKind::all() {
        let spec = AiInterventionSpec::with_active(&[kind]);
        let p = apply_ai_interventions(&base, &spec, Some(&costs), &tables, None, true);
        let out = out_of_range(&p);
        let name = format!("ai_{}_bounded", kind.key());
        match run_simulation(&p, &cfg) {
            Ok(r) => {
                let icer = calculate_icer(&r, &baseline);
                if verbose {
                    println!(
                        "    {:18} deaths {:>9.1} ({:+.1})  cost {:>12.0}  {}",
                        kind.key(),
                        r.cumulative_deaths,
                        r.cumulative_deaths - baseline.cumulative_deaths,
                        r.total_cost,
                        describe_icer(&icer)
                    );
                }
                results.push(TestResult {
                    name,
                    passed: out.is_empty() && result_is_bounded(&r),
                    detail: if out.is_empty() {
                        format!("ICER {}", describe_icer(&icer))
                    } else {
                        format!("out of range: {}", out.join(", "))
                    },
                });
            }
            Err(e) => results.push(TestResult::failed_run(&name, &e)),
        }
    }

    // Self-care lowers deaths
    let self_care = apply_ai_interventions(
        &base,
        &AiInterventionSpec::with_active(&[InterventionKind::SelfCare]),
        None,
        &tables,
        None,
        true,
    );
    match run_simulation(&self_care, &cfg) {
        Ok(r) => results.push(TestResult {
            name: "ai_self_care_saves_lives".into(),
            passed: r.cumulative_deaths < baseline.cumulative_deaths,
            detail: format!(
                "{:.1} → {:.1} deaths",
                baseline.cumulative_deaths, r.cumulative_deaths
            ),
        }),
        Err(e) => results.push(TestResult::failed_run("ai_self_care_saves_lives", &e)),
    }

    // Bed management is cheaper and no worse
    let beds = apply_ai_interventions(
        &base,
        &AiInterventionSpec::with_active(&[InterventionKind::BedManagement]),
        Some(&costs),
        &tables,
        None,
        true,
    );
    match run_simulation(&beds, &cfg) {
        Ok(r) => {
            let icer = calculate_icer(&r, &baseline);
            results.push(TestResult {
                name: "econ_bed_management_dominant".into(),
                passed: icer.is_dominant() && icer.finite_value().is_none(),
                detail: format!(
                    "cost {:.0} → {:.0}, {}",
                    baseline.total_cost,
                    r.total_cost,
                    describe_icer(&icer)
                ),
            });
        }
        Err(e) => results.push(TestResult::failed_run("econ_bed_management_dominant", &e)),
    }

    // Identical outcomes → +∞ sentinel, sanitized for arithmetic
    let same = calculate_icer(&baseline, &baseline);
    results.push(TestResult {
        name: "econ_no_daly_change".into(),
        passed: same == Icer::Ratio(f64::INFINITY)
            && same.finite_value().is_some_and(|v| v.is_finite()),
        detail: format!("{:?}", same),
    });

    results
}

// ── 4. Library Scenarios ────────────────────────────────────────────────

fn run_library_scenarios(lib: &ScenarioLibrary, args: &Args) -> Vec<TestResult> {
    println!("--- Library Scenarios ---");
    let mut results = Vec::new();
    let cfg = config(args.population, args.weeks);
    let tables = lib.effect_tables();

    for disease in &lib.diseases {
        for preset in &lib.presets {
            let name = format!("scenario_{}_{}", disease.id, preset.name);
            let base = build_parameters(disease, preset, None);
            let spec = AiInterventionSpec {
                uptake: Some(UptakeConfig::default()),
                ..AiInterventionSpec::with_active(&InterventionKind::all())
            };
            let ai = apply_ai_interventions(
                &base,
                &spec,
                Some(&CostTable::standard()),
                &tables,
                Some(&disease.id),
                lib.is_urban(preset),
            );

            match (run_simulation(&base, &cfg), run_simulation(&ai, &cfg)) {
                (Ok(b), Ok(a)) => {
                    let icer = calculate_icer(&a, &b);
                    results.push(TestResult {
                        name,
                        passed: result_is_bounded(&b) && result_is_bounded(&a),
                        detail: format!(
                            "deaths {:.1} → {:.1}, wait {:.1}wk → {:.1}wk, {}",
                            b.cumulative_deaths,
                            a.cumulative_deaths,
                            b.avg_time_to_resolution_weeks,
                            a.avg_time_to_resolution_weeks,
                            describe_icer(&icer)
                        ),
                    });
                }
                (Err(e), _) | (_, Err(e)) => results.push(TestResult::failed_run(&name, &e)),
            }
        }
    }

    results
}

// ── 5. Intervention Sweep ───────────────────────────────────────────────

struct SweepRow {
    mask: u32,
    deaths: f64,
    dalys: f64,
    cost: f64,
    icer: Icer,
    bounded: bool,
}

fn run_sweep(lib: &ScenarioLibrary, args: &Args) -> Vec<TestResult> {
    println!("--- Intervention Sweep ---");
    let mut results = Vec::new();
    let cfg = config(args.population, args.weeks);
    let tables = lib.effect_tables();
    let costs = CostTable::standard();
    let combos = 1u32 << InterventionKind::all().len();

    for disease in &lib.diseases {
        for preset in &lib.presets {
            let name = format!("sweep_{}_{}", disease.id, preset.name);
            let base = build_parameters(disease, preset, None);
            let baseline = match run_simulation(&base, &cfg) {
                Ok(r) => r,
                Err(e) => {
                    results.push(TestResult::failed_run(&name, &e));
                    continue;
                }
            };
            let is_urban = lib.is_urban(preset);

            let rows: Result<Vec<SweepRow>, SimulationError> = (1..combos)
                .into_par_iter()
                .map(|mask| {
                    let spec = AiInterventionSpec {
                        uptake: Some(UptakeConfig::default()),
                        ..AiInterventionSpec::with_active(&kinds_for_mask(mask))
                    };
                    let p = apply_ai_interventions(
                        &base,
                        &spec,
                        Some(&costs),
                        &tables,
                        Some(&disease.id),
                        is_urban,
                    );
                    let r = run_simulation(&p, &cfg)?;
                    Ok(SweepRow {
                        mask,
                        deaths: r.cumulative_deaths,
                        dalys: r.dalys,
                        cost: r.total_cost,
                        icer: calculate_icer(&r, &baseline),
                        bounded: out_of_range(&p).is_empty() && result_is_bounded(&r),
                    })
                })
                .collect();

            let mut rows = match rows {
                Ok(rows) => rows,
                Err(e) => {
                    results.push(TestResult::failed_run(&name, &e));
                    continue;
                }
            };

            let unbounded = rows.iter().filter(|r| !r.bounded).count();
            let dominant = rows.iter().filter(|r| r.icer.is_dominant()).count();
            // no costlier, no worse, better on one → must be reported dominant
            let misreported = rows
                .iter()
                .filter(|r| {
                    r.cost <= baseline.total_cost
                        && r.dalys <= baseline.dalys
                        && (r.cost < baseline.total_cost || r.dalys < baseline.dalys)
                        && !r.icer.is_dominant()
                })
                .count();
            results.push(TestResult {
                name,
                passed: unbounded == 0 && misreported == 0,
                detail: format!(
                    "{} combinations, {} dominant, {} out of bounds",
                    rows.len(),
                    dominant,
                    unbounded
                ),
            });

            if args.verbose {
                rows.sort_by(|a, b| a.deaths.total_cmp(&b.deaths));
                println!("  {} / {}: fewest deaths", disease.id, preset.name);
                for row in rows.iter().take(3) {
                    let names: Vec<_> = kinds_for_mask(row.mask).iter().map(|k| k.key()).collect();
                    println!(
                        "    {:>9.1} deaths ({:+.1})  {}  [{}]",
                        row.deaths,
                        row.deaths - baseline.cumulative_deaths,
                        describe_icer(&row.icer),
                        names.join("+")
                    );
                }
            }
        }
    }

    results
}

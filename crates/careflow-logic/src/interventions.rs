//! AI intervention effects on model parameters.
//!
//! Turns a baseline [`ModelParameters`] into an AI-adjusted copy. The
//! pipeline runs as three pure stages:
//!
//! 1. **Apply**: for each active intervention, resolve its effect table
//!    (universal defaults with any disease-specific entries merged over
//!    them), scale each effect by its magnitude override and the
//!    intervention's effective uptake, and apply it to the parameters the
//!    intervention is allowed to touch.
//! 2. **Clamp**: pull every probability field back into [0, 1]
//!    ([`clamp_probabilities`]).
//! 3. **Derive**: compute self-care visit reduction and routing
//!    improvement from the clamped care-seeking shares.
//!
//! Effect tables and cost tables are immutable inputs. Unknown effect
//! keys, unknown disease ids and unrecognised magnitude keys are skipped.
//!
//! ```
//! use careflow_logic::interventions::{
//!     apply_ai_interventions, AiInterventionSpec, EffectTables, InterventionKind,
//! };
//! use careflow_logic::params::default_parameters;
//!
//! let base = default_parameters();
//! let spec = AiInterventionSpec::with_active(&[InterventionKind::Triage]);
//! let adjusted = apply_ai_interventions(&base, &spec, None, &EffectTables::standard(), None, true);
//! assert!(adjusted.phi0 > base.phi0);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::params::{clamp_probabilities, ModelParameters};
use crate::sanitize::unit;

// ── Intervention kinds ──────────────────────────────────────────────────

/// The AI tools the model knows how to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionKind {
    /// AI triage at first contact.
    Triage,
    /// Decision support for community health workers.
    Chw,
    /// AI-assisted diagnostics at primary and district level.
    Diagnostic,
    /// Bed and flow management in facilities.
    BedManagement,
    /// Clinical decision support in hospitals.
    HospitalDecision,
    /// Patient-facing self-care and symptom-checker tools.
    SelfCare,
}

impl InterventionKind {
    pub fn all() -> [InterventionKind; 6] {
        [
            Self::Triage,
            Self::Chw,
            Self::Diagnostic,
            Self::BedManagement,
            Self::HospitalDecision,
            Self::SelfCare,
        ]
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Triage => "triage",
            Self::Chw => "chw",
            Self::Diagnostic => "diagnostic",
            Self::BedManagement => "bed_management",
            Self::HospitalDecision => "hospital_decision",
            Self::SelfCare => "self_care",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::all().into_iter().find(|k| k.key() == key)
    }

    /// Effect keys this intervention is permitted to apply.
    pub fn effect_keys(self) -> &'static [EffectKey] {
        use EffectKey::*;
        match self {
            Self::Triage => &[Phi0, Rho0, QueuePrevention, SmartRouting],
            Self::Chw => &[SigmaI, MuInformal, DeltaInformal, Mu0, Delta0, TreatmentEfficiency],
            Self::Diagnostic => &[Mu1, Mu2, Delta1, Delta2, Rho1, TreatmentEfficiency],
            Self::BedManagement => &[
                LengthOfStayReduction,
                DischargeEfficiency,
                ResourceUtilization,
            ],
            Self::HospitalDecision => &[Mu2, Mu3, Delta2, Delta3, Rho2, LengthOfStayReduction],
            Self::SelfCare => &[
                VisitReduction,
                RoutingImprovement,
                MuInformal,
                DeltaInformal,
                SmartRouting,
                QueuePrevention,
            ],
        }
    }

    /// Base uptake used when an uptake configuration omits this kind.
    pub fn default_uptake(self) -> f64 {
        match self {
            Self::Triage => 0.7,
            Self::Chw => 0.6,
            Self::Diagnostic => 0.5,
            Self::BedManagement => 0.5,
            Self::HospitalDecision => 0.4,
            Self::SelfCare => 0.3,
        }
    }
}

// ── Effect keys ─────────────────────────────────────────────────────────

/// How an effect's base value combines with the current parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectMode {
    /// `new = old + magnitude × effect × uptake`.
    Additive,
    /// Ratio around 1; the deviation from 1 is scaled.
    Ratio,
    /// Self-care effects computed after clamping.
    Derived,
}

/// A parameter adjustment an effect table may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EffectKey {
    Phi0,
    SigmaI,
    MuInformal,
    DeltaInformal,
    Mu0,
    Mu1,
    Mu2,
    Mu3,
    Delta0,
    Delta1,
    Delta2,
    Delta3,
    Rho0,
    Rho1,
    Rho2,
    QueuePrevention,
    SmartRouting,
    LengthOfStayReduction,
    DischargeEfficiency,
    TreatmentEfficiency,
    ResourceUtilization,
    VisitReduction,
    RoutingImprovement,
}

impl EffectKey {
    pub fn all() -> [EffectKey; 23] {
        use EffectKey::*;
        [
            Phi0,
            SigmaI,
            MuInformal,
            DeltaInformal,
            Mu0,
            Mu1,
            Mu2,
            Mu3,
            Delta0,
            Delta1,
            Delta2,
            Delta3,
            Rho0,
            Rho1,
            Rho2,
            QueuePrevention,
            SmartRouting,
            LengthOfStayReduction,
            DischargeEfficiency,
            TreatmentEfficiency,
            ResourceUtilization,
            VisitReduction,
            RoutingImprovement,
        ]
    }

    /// Table and override key, e.g. `"deltaIEffect"`.
    pub fn name(self) -> &'static str {
        use EffectKey::*;
        match self {
            Phi0 => "phi0Effect",
            SigmaI => "sigmaIEffect",
            MuInformal => "muIEffect",
            DeltaInformal => "deltaIEffect",
            Mu0 => "mu0Effect",
            Mu1 => "mu1Effect",
            Mu2 => "mu2Effect",
            Mu3 => "mu3Effect",
            Delta0 => "delta0Effect",
            Delta1 => "delta1Effect",
            Delta2 => "delta2Effect",
            Delta3 => "delta3Effect",
            Rho0 => "rho0Effect",
            Rho1 => "rho1Effect",
            Rho2 => "rho2Effect",
            QueuePrevention => "queuePrevention",
            SmartRouting => "smartRouting",
            LengthOfStayReduction => "lengthOfStayReduction",
            DischargeEfficiency => "dischargeEfficiency",
            TreatmentEfficiency => "treatmentEfficiency",
            ResourceUtilization => "resourceUtilization",
            VisitReduction => "visitReduction",
            RoutingImprovement => "routingImprovement",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|k| k.name() == name)
    }

    pub fn mode(self) -> EffectMode {
        use EffectKey::*;
        match self {
            Phi0 | SigmaI | QueuePrevention | SmartRouting | LengthOfStayReduction
            | DischargeEfficiency | TreatmentEfficiency | ResourceUtilization => {
                EffectMode::Additive
            }
            VisitReduction | RoutingImprovement => EffectMode::Derived,
            _ => EffectMode::Ratio,
        }
    }

    /// The parameter this key adjusts directly. Derived keys have none.
    fn slot(self, p: &mut ModelParameters) -> Option<&mut f64> {
        use EffectKey::*;
        let slot = match self {
            Phi0 => &mut p.phi0,
            SigmaI => &mut p.sigma_i,
            MuInformal => &mut p.mu_informal,
            DeltaInformal => &mut p.delta_informal,
            Mu0 => &mut p.mu_l0,
            Mu1 => &mut p.mu_l1,
            Mu2 => &mut p.mu_l2,
            Mu3 => &mut p.mu_l3,
            Delta0 => &mut p.delta_l0,
            Delta1 => &mut p.delta_l1,
            Delta2 => &mut p.delta_l2,
            Delta3 => &mut p.delta_l3,
            Rho0 => &mut p.rho_l0,
            Rho1 => &mut p.rho_l1,
            Rho2 => &mut p.rho_l2,
            QueuePrevention => &mut p.queue_prevention,
            SmartRouting => &mut p.smart_routing,
            LengthOfStayReduction => &mut p.length_of_stay_reduction,
            DischargeEfficiency => &mut p.discharge_efficiency,
            TreatmentEfficiency => &mut p.treatment_efficiency,
            ResourceUtilization => &mut p.resource_utilization,
            VisitReduction | RoutingImprovement => return None,
        };
        Some(slot)
    }
}

// ── Effect arithmetic ───────────────────────────────────────────────────

/// `old + magnitude × effect × uptake`, exactly `old` when either scale is 0.
pub fn apply_additive(old: f64, effect: f64, magnitude: f64, uptake: f64) -> f64 {
    if magnitude == 0.0 || uptake == 0.0 {
        return old;
    }
    old + magnitude * effect * uptake
}

/// Scale a ratio's deviation from 1 by `magnitude × uptake`.
///
/// Reductions (r < 1) and increases (r > 1) are handled symmetrically so
/// that either scale at 0 yields a ratio of exactly 1.
pub fn scaled_ratio(ratio: f64, magnitude: f64, uptake: f64) -> f64 {
    let scale = magnitude * uptake;
    if ratio < 1.0 {
        1.0 - (1.0 - ratio) * scale
    } else if ratio > 1.0 {
        1.0 + (ratio - 1.0) * scale
    } else {
        1.0
    }
}

/// `old × scaled_ratio(...)`, exactly `old` when either scale is 0.
pub fn apply_ratio(old: f64, ratio: f64, magnitude: f64, uptake: f64) -> f64 {
    if magnitude == 0.0 || uptake == 0.0 {
        return old;
    }
    old * scaled_ratio(ratio, magnitude, uptake)
}

// ── Configuration ───────────────────────────────────────────────────────

/// Which interventions are switched on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterventionFlags {
    pub triage: bool,
    pub chw: bool,
    pub diagnostic: bool,
    pub bed_management: bool,
    pub hospital_decision: bool,
    pub self_care: bool,
}

impl InterventionFlags {
    /// Build flags from string keys, skipping any that are not recognised.
    pub fn from_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        let mut flags = Self::default();
        for key in keys {
            match InterventionKind::from_key(key) {
                Some(kind) => flags.set(kind, true),
                None => log::debug!("ignoring unknown intervention key {:?}", key),
            }
        }
        flags
    }

    pub fn is_active(&self, kind: InterventionKind) -> bool {
        match kind {
            InterventionKind::Triage => self.triage,
            InterventionKind::Chw => self.chw,
            InterventionKind::Diagnostic => self.diagnostic,
            InterventionKind::BedManagement => self.bed_management,
            InterventionKind::HospitalDecision => self.hospital_decision,
            InterventionKind::SelfCare => self.self_care,
        }
    }

    pub fn set(&mut self, kind: InterventionKind, on: bool) {
        match kind {
            InterventionKind::Triage => self.triage = on,
            InterventionKind::Chw => self.chw = on,
            InterventionKind::Diagnostic => self.diagnostic = on,
            InterventionKind::BedManagement => self.bed_management = on,
            InterventionKind::HospitalDecision => self.hospital_decision = on,
            InterventionKind::SelfCare => self.self_care = on,
        }
    }

    /// Active kinds in a fixed order, so application is deterministic.
    pub fn active_kinds(&self) -> Vec<InterventionKind> {
        InterventionKind::all()
            .into_iter()
            .filter(|k| self.is_active(*k))
            .collect()
    }

    pub fn any(&self) -> bool {
        !self.active_kinds().is_empty()
    }
}

/// Adoption of AI tools by users and providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UptakeConfig {
    pub global_multiplier: f64,
    pub base_uptake: BTreeMap<InterventionKind, f64>,
    pub urban_multiplier: f64,
    pub rural_multiplier: f64,
}

impl Default for UptakeConfig {
    fn default() -> Self {
        Self {
            global_multiplier: 1.0,
            base_uptake: InterventionKind::all()
                .into_iter()
                .map(|k| (k, k.default_uptake()))
                .collect(),
            urban_multiplier: 1.1,
            rural_multiplier: 0.8,
        }
    }
}

impl UptakeConfig {
    /// clamp(base × global × setting, 0, 1).
    pub fn effective(&self, kind: InterventionKind, is_urban: bool) -> f64 {
        let base = self
            .base_uptake
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.default_uptake());
        let setting = if is_urban {
            self.urban_multiplier
        } else {
            self.rural_multiplier
        };
        unit(base * self.global_multiplier * setting)
    }
}

/// Everything the caller chooses about AI for one scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiInterventionSpec {
    pub flags: InterventionFlags,
    /// Per-effect-key magnitude overrides; missing keys mean 1.
    pub magnitudes: BTreeMap<String, f64>,
    /// `None` applies every effect at full uptake.
    pub uptake: Option<UptakeConfig>,
}

impl AiInterventionSpec {
    pub fn with_active(kinds: &[InterventionKind]) -> Self {
        let mut spec = Self::default();
        for &kind in kinds {
            spec.flags.set(kind, true);
        }
        spec
    }

    pub fn magnitude(&self, key: EffectKey) -> f64 {
        self.magnitudes.get(key.name()).copied().unwrap_or(1.0)
    }

    pub fn uptake_for(&self, kind: InterventionKind, is_urban: bool) -> f64 {
        match &self.uptake {
            Some(cfg) => cfg.effective(kind, is_urban),
            None => 1.0,
        }
    }
}

/// Effect values keyed by effect-key name.
pub type EffectTable = BTreeMap<String, f64>;

/// Universal effect tables plus sparse disease-specific overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectTables {
    pub defaults: BTreeMap<InterventionKind, EffectTable>,
    /// disease id → intervention → entries that replace the defaults.
    pub diseases: BTreeMap<String, BTreeMap<InterventionKind, EffectTable>>,
}

fn table(entries: &[(EffectKey, f64)]) -> EffectTable {
    entries
        .iter()
        .map(|(k, v)| (k.name().to_string(), *v))
        .collect()
}

impl EffectTables {
    /// Universal defaults with no disease-specific overrides.
    pub fn standard() -> Self {
        use EffectKey::*;
        let mut defaults = BTreeMap::new();
        defaults.insert(
            InterventionKind::Triage,
            table(&[
                (Phi0, 0.10),
                (Rho0, 0.85),
                (QueuePrevention, 0.15),
                (SmartRouting, 0.30),
            ]),
        );
        defaults.insert(
            InterventionKind::Chw,
            table(&[
                (SigmaI, 0.08),
                (MuInformal, 1.25),
                (DeltaInformal, 0.85),
                (Mu0, 1.15),
                (Delta0, 0.90),
                (TreatmentEfficiency, 0.05),
            ]),
        );
        defaults.insert(
            InterventionKind::Diagnostic,
            table(&[
                (Mu1, 1.20),
                (Mu2, 1.15),
                (Delta1, 0.85),
                (Delta2, 0.90),
                (Rho1, 0.90),
                (TreatmentEfficiency, 0.10),
            ]),
        );
        defaults.insert(
            InterventionKind::BedManagement,
            table(&[
                (LengthOfStayReduction, 0.15),
                (DischargeEfficiency, 0.10),
                (ResourceUtilization, 0.15),
            ]),
        );
        defaults.insert(
            InterventionKind::HospitalDecision,
            table(&[
                (Mu2, 1.10),
                (Mu3, 1.15),
                (Delta2, 0.90),
                (Delta3, 0.85),
                (Rho2, 0.90),
                (LengthOfStayReduction, 0.05),
            ]),
        );
        defaults.insert(
            InterventionKind::SelfCare,
            table(&[
                (VisitReduction, 0.20),
                (RoutingImprovement, 0.10),
                (MuInformal, 1.10),
                (DeltaInformal, 0.90),
                (SmartRouting, 0.05),
                (QueuePrevention, 0.05),
            ]),
        );
        Self {
            defaults,
            diseases: BTreeMap::new(),
        }
    }

    /// Add or replace disease-specific entries for one intervention.
    pub fn with_disease_override(
        mut self,
        disease_id: &str,
        kind: InterventionKind,
        entries: EffectTable,
    ) -> Self {
        self.diseases
            .entry(disease_id.to_string())
            .or_default()
            .entry(kind)
            .or_default()
            .extend(entries);
        self
    }

    /// Effect table for `kind`: defaults, with the disease's entries
    /// merged over them key by key.
    pub fn resolve(&self, kind: InterventionKind, disease_id: Option<&str>) -> EffectTable {
        let mut merged = self.defaults.get(&kind).cloned().unwrap_or_default();
        if let Some(id) = disease_id {
            match self.diseases.get(id) {
                Some(per_kind) => {
                    if let Some(overrides) = per_kind.get(&kind) {
                        for (key, value) in overrides {
                            merged.insert(key.clone(), *value);
                        }
                    }
                }
                None => log::debug!("no disease-specific effects for {:?}, using defaults", id),
            }
        }
        merged
    }
}

/// Fixed and per-episode cost of one intervention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InterventionCost {
    pub fixed: f64,
    pub per_episode: f64,
}

/// Intervention costs; missing entries cost nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostTable {
    pub entries: BTreeMap<InterventionKind, InterventionCost>,
}

impl CostTable {
    pub fn standard() -> Self {
        let entries = [
            (InterventionKind::Triage, 50_000.0, 0.5),
            (InterventionKind::Chw, 80_000.0, 1.5),
            (InterventionKind::Diagnostic, 120_000.0, 2.0),
            (InterventionKind::BedManagement, 60_000.0, 0.3),
            (InterventionKind::HospitalDecision, 100_000.0, 1.0),
            (InterventionKind::SelfCare, 30_000.0, 0.2),
        ]
        .into_iter()
        .map(|(k, fixed, per_episode)| (k, InterventionCost { fixed, per_episode }))
        .collect();
        Self { entries }
    }

    pub fn get(&self, kind: InterventionKind) -> InterventionCost {
        self.entries.get(&kind).copied().unwrap_or_default()
    }
}

// ── Pipeline ────────────────────────────────────────────────────────────

/// Self-care effects held back until after clamping.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PendingSelfCare {
    /// Σ magnitude × effect × uptake for visit reduction, before usage scaling.
    pub visit_reduction: f64,
    pub routing_improvement: f64,
}

/// Apply every active intervention's direct effects and costs.
///
/// Derived self-care effects are returned separately; nothing is clamped.
pub fn apply_direct_effects(
    base: &ModelParameters,
    spec: &AiInterventionSpec,
    costs: Option<&CostTable>,
    tables: &EffectTables,
    disease_id: Option<&str>,
    is_urban: bool,
) -> (ModelParameters, PendingSelfCare) {
    let mut params = base.clone();
    let mut pending = PendingSelfCare::default();

    for name in spec.magnitudes.keys() {
        if EffectKey::from_name(name).is_none() {
            log::debug!("ignoring magnitude override for unknown effect {:?}", name);
        }
    }

    for kind in spec.flags.active_kinds() {
        let uptake = spec.uptake_for(kind, is_urban);
        let allowed = kind.effect_keys();

        for (name, &effect) in &tables.resolve(kind, disease_id) {
            let key = match EffectKey::from_name(name) {
                Some(key) if allowed.contains(&key) => key,
                _ => {
                    log::debug!("{} ignores effect {:?}", kind.key(), name);
                    continue;
                }
            };
            let magnitude = spec.magnitude(key);
            match (key.mode(), key.slot(&mut params)) {
                (EffectMode::Additive, Some(slot)) => {
                    *slot = apply_additive(*slot, effect, magnitude, uptake);
                }
                (EffectMode::Ratio, Some(slot)) => {
                    *slot = apply_ratio(*slot, effect, magnitude, uptake);
                }
                _ => {
                    let amount = apply_additive(0.0, effect, magnitude, uptake);
                    match key {
                        EffectKey::VisitReduction => pending.visit_reduction += amount,
                        EffectKey::RoutingImprovement => pending.routing_improvement += amount,
                        _ => {}
                    }
                }
            }
        }

        let cost = costs.map(|c| c.get(kind)).unwrap_or_default();
        params.ai_fixed_cost += cost.fixed;
        params.ai_variable_cost += cost.per_episode * uptake;
        params.ai_active = true;
    }

    (params, pending)
}

/// Derive self-care visit reduction and routing improvement.
///
/// Must run on clamped parameters. A self-care tool can only prevent
/// visits among people who would otherwise use informal care, so the
/// visit-reduction amount is scaled by `(1 − φ0) × (1 − informal_care_ratio)`.
/// Routing improvement is not usage-scaled.
pub fn derive_self_care(params: ModelParameters, pending: &PendingSelfCare) -> ModelParameters {
    let mut out = params;
    let usage = (1.0 - out.phi0) * (1.0 - out.informal_care_ratio);
    if pending.visit_reduction != 0.0 {
        out.visit_reduction = unit(out.visit_reduction + pending.visit_reduction * usage);
    }
    if pending.routing_improvement != 0.0 {
        out.direct_routing_improvement =
            unit(out.direct_routing_improvement + pending.routing_improvement);
    }
    out
}

/// Produce AI-adjusted parameters: apply, clamp, then derive.
///
/// `costs` of `None` means the interventions are free. The result has
/// every probability field in [0, 1].
pub fn apply_ai_interventions(
    base: &ModelParameters,
    spec: &AiInterventionSpec,
    costs: Option<&CostTable>,
    tables: &EffectTables,
    disease_id: Option<&str>,
    is_urban: bool,
) -> ModelParameters {
    let (applied, pending) = apply_direct_effects(base, spec, costs, tables, disease_id, is_urban);
    let (clamped, events) = clamp_probabilities(applied);
    if !events.is_empty() {
        log::warn!(
            "{} parameter(s) clamped after applying AI interventions",
            events.len()
        );
    }
    derive_self_care(clamped, &pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::default_parameters;

    fn apply(spec: &AiInterventionSpec) -> ModelParameters {
        apply_ai_interventions(
            &default_parameters(),
            spec,
            None,
            &EffectTables::standard(),
            None,
            true,
        )
    }

    #[test]
    fn test_no_interventions_is_identity() {
        let base = default_parameters();
        assert_eq!(apply(&AiInterventionSpec::default()), base);
    }

    #[test]
    fn test_additive_and_ratio_arithmetic() {
        assert!((apply_additive(0.4, 0.1, 1.0, 0.5) - 0.45).abs() < 1e-12);
        assert!((scaled_ratio(0.8, 1.0, 0.5) - 0.9).abs() < 1e-12);
        assert!((scaled_ratio(1.2, 1.0, 0.5) - 1.1).abs() < 1e-12);
        assert_eq!(scaled_ratio(1.0, 3.0, 1.0), 1.0);
        assert!((apply_ratio(0.5, 0.8, 2.0, 0.5) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_zero_scale_is_exact_noop() {
        for old in [0.0, 0.123_456_789, 0.99] {
            assert_eq!(apply_additive(old, 0.3, 0.0, 0.7), old);
            assert_eq!(apply_additive(old, 0.3, 1.0, 0.0), old);
            assert_eq!(apply_ratio(old, 0.6, 0.0, 0.7), old);
            assert_eq!(apply_ratio(old, 1.6, 0.0, 0.7), old);
            assert_eq!(apply_ratio(old, 1.6, 1.0, 0.0), old);
        }
    }

    #[test]
    fn test_triage_full_uptake() {
        let base = default_parameters();
        let p = apply(&AiInterventionSpec::with_active(&[InterventionKind::Triage]));
        assert!((p.phi0 - (base.phi0 + 0.10)).abs() < 1e-12);
        assert!((p.rho_l0 - base.rho_l0 * 0.85).abs() < 1e-12);
        assert!((p.queue_prevention - 0.15).abs() < 1e-12);
        assert!((p.smart_routing - 0.30).abs() < 1e-12);
        assert!(p.ai_active);
        // untouched by triage
        assert_eq!(p.mu_l2, base.mu_l2);
        assert_eq!(p.sigma_i, base.sigma_i);
    }

    #[test]
    fn test_uptake_scales_effects() {
        let base = default_parameters();
        let mut spec = AiInterventionSpec::with_active(&[InterventionKind::Triage]);
        spec.uptake = Some(UptakeConfig::default());
        let urban = apply_ai_interventions(
            &base,
            &spec,
            None,
            &EffectTables::standard(),
            None,
            true,
        );
        let rural = apply_ai_interventions(
            &base,
            &spec,
            None,
            &EffectTables::standard(),
            None,
            false,
        );
        let u_urban = 0.7 * 1.1;
        let u_rural = 0.7 * 0.8;
        assert!((urban.phi0 - (base.phi0 + 0.10 * u_urban)).abs() < 1e-12);
        assert!((rural.phi0 - (base.phi0 + 0.10 * u_rural)).abs() < 1e-12);
        assert!(urban.phi0 > rural.phi0);
    }

    #[test]
    fn test_effective_uptake_clamped() {
        let cfg = UptakeConfig {
            global_multiplier: 3.0,
            ..Default::default()
        };
        assert_eq!(cfg.effective(InterventionKind::Triage, true), 1.0);
        let off = UptakeConfig {
            global_multiplier: 0.0,
            ..Default::default()
        };
        assert_eq!(off.effective(InterventionKind::Triage, true), 0.0);
        let sparse = UptakeConfig {
            base_uptake: BTreeMap::new(),
            urban_multiplier: 1.0,
            ..Default::default()
        };
        assert!((sparse.effective(InterventionKind::Chw, true) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_zero_uptake_leaves_params_unchanged() {
        let base = default_parameters();
        let mut spec = AiInterventionSpec::with_active(&InterventionKind::all());
        spec.uptake = Some(UptakeConfig {
            global_multiplier: 0.0,
            ..Default::default()
        });
        let p = apply_ai_interventions(&base, &spec, None, &EffectTables::standard(), None, true);
        let before = base.probabilities();
        let after = p.probabilities();
        assert_eq!(before, after);
    }

    #[test]
    fn test_single_zero_magnitude() {
        let base = default_parameters();
        let mut spec = AiInterventionSpec::with_active(&[InterventionKind::Diagnostic]);
        spec.magnitudes.insert("mu1Effect".to_string(), 0.0);
        let p = apply(&spec);
        assert_eq!(p.mu_l1, base.mu_l1);
        assert!(p.mu_l2 > base.mu_l2);
        assert!(p.delta_l1 < base.delta_l1);
        assert!(p.treatment_efficiency > 0.0);
    }

    #[test]
    fn test_magnitude_scales_deviation() {
        let base = default_parameters();
        let mut spec = AiInterventionSpec::with_active(&[InterventionKind::HospitalDecision]);
        spec.magnitudes.insert("delta3Effect".to_string(), 2.0);
        let p = apply(&spec);
        // 0.85 → deviation 0.15 doubled → 0.70
        assert!((p.delta_l3 - base.delta_l3 * 0.70).abs() < 1e-12);
    }

    #[test]
    fn test_disease_override_wins() {
        let base = default_parameters();
        let tables = EffectTables::standard().with_disease_override(
            "tuberculosis",
            InterventionKind::Diagnostic,
            table(&[(EffectKey::Rho1, 1.25)]),
        );
        let spec = AiInterventionSpec::with_active(&[InterventionKind::Diagnostic]);
        let tb = apply_ai_interventions(&base, &spec, None, &tables, Some("tuberculosis"), true);
        let other = apply_ai_interventions(&base, &spec, None, &tables, Some("malaria"), true);
        // confidence-based escalation raises referrals for this disease
        assert!((tb.rho_l1 - base.rho_l1 * 1.25).abs() < 1e-12);
        assert!((other.rho_l1 - base.rho_l1 * 0.90).abs() < 1e-12);
        // keys not overridden still come from the defaults
        assert_eq!(tb.mu_l1, other.mu_l1);
    }

    #[test]
    fn test_resolve_merges_key_by_key() {
        let tables = EffectTables::standard().with_disease_override(
            "x",
            InterventionKind::Triage,
            table(&[(EffectKey::Phi0, 0.5)]),
        );
        let merged = tables.resolve(InterventionKind::Triage, Some("x"));
        assert_eq!(merged.get("phi0Effect"), Some(&0.5));
        assert_eq!(merged.get("rho0Effect"), Some(&0.85));
        assert_eq!(merged.len(), 4);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let base = default_parameters();
        let mut tables = EffectTables::standard();
        tables
            .defaults
            .get_mut(&InterventionKind::Triage)
            .unwrap()
            .insert("teleportEffect".to_string(), 9.0);
        let mut spec = AiInterventionSpec::with_active(&[InterventionKind::Triage]);
        spec.magnitudes.insert("nonsense".to_string(), 0.0);
        let p = apply_ai_interventions(&base, &spec, None, &tables, Some("unknown-disease"), true);
        assert!((p.phi0 - (base.phi0 + 0.10)).abs() < 1e-12);
    }

    #[test]
    fn test_keys_outside_mapping_ignored() {
        let base = default_parameters();
        let mut tables = EffectTables::standard();
        // triage may not touch tertiary mortality
        tables
            .defaults
            .get_mut(&InterventionKind::Triage)
            .unwrap()
            .insert("delta3Effect".to_string(), 0.1);
        let p = apply_ai_interventions(
            &base,
            &AiInterventionSpec::with_active(&[InterventionKind::Triage]),
            None,
            &tables,
            None,
            true,
        );
        assert_eq!(p.delta_l3, base.delta_l3);
    }

    #[test]
    fn test_clamping_bounds_results() {
        let base = default_parameters();
        let mut spec = AiInterventionSpec::with_active(&[InterventionKind::Triage]);
        spec.magnitudes.insert("phi0Effect".to_string(), 50.0);
        spec.magnitudes.insert("rho0Effect".to_string(), 50.0);
        let p = apply(&spec);
        assert_eq!(p.phi0, 1.0);
        assert_eq!(p.rho_l0, 0.0);
        for (name, v) in p.probabilities() {
            assert!((0.0..=1.0).contains(&v), "{} = {}", name, v);
        }
        assert_eq!(p.phi0, base.phi0.max(1.0));
    }

    #[test]
    fn test_self_care_visit_reduction_usage_scaled() {
        let base = default_parameters();
        let p = apply(&AiInterventionSpec::with_active(&[InterventionKind::SelfCare]));
        let usage = (1.0 - base.phi0) * (1.0 - base.informal_care_ratio);
        assert!((p.visit_reduction - 0.20 * usage).abs() < 1e-12);
        // routing and queue effects are not usage-scaled
        assert!((p.direct_routing_improvement - 0.10).abs() < 1e-12);
        assert!((p.smart_routing - 0.05).abs() < 1e-12);
        assert!((p.queue_prevention - 0.05).abs() < 1e-12);
        assert!(p.delta_informal < base.delta_informal);
    }

    #[test]
    fn test_self_care_derivation_uses_clamped_phi0() {
        // triage pushes phi0 past 1; derivation must see the clamped value
        let mut spec =
            AiInterventionSpec::with_active(&[InterventionKind::Triage, InterventionKind::SelfCare]);
        spec.magnitudes.insert("phi0Effect".to_string(), 20.0);
        let p = apply(&spec);
        assert_eq!(p.phi0, 1.0);
        assert_eq!(p.visit_reduction, 0.0);
    }

    #[test]
    fn test_derive_after_clamp_is_separate_stage() {
        let pending = PendingSelfCare {
            visit_reduction: 0.5,
            routing_improvement: 2.0,
        };
        let p = ModelParameters {
            phi0: 0.5,
            informal_care_ratio: 0.5,
            ..Default::default()
        };
        let out = derive_self_care(p, &pending);
        assert!((out.visit_reduction - 0.125).abs() < 1e-12);
        assert_eq!(out.direct_routing_improvement, 1.0);
    }

    #[test]
    fn test_costs_accumulate_per_intervention() {
        let base = default_parameters();
        let mut spec =
            AiInterventionSpec::with_active(&[InterventionKind::Triage, InterventionKind::Chw]);
        spec.uptake = Some(UptakeConfig {
            urban_multiplier: 1.0,
            ..Default::default()
        });
        let costs = CostTable::standard();
        let p = apply_ai_interventions(
            &base,
            &spec,
            Some(&costs),
            &EffectTables::standard(),
            None,
            true,
        );
        assert!((p.ai_fixed_cost - 130_000.0).abs() < 1e-9);
        assert!((p.ai_variable_cost - (0.5 * 0.7 + 1.5 * 0.6)).abs() < 1e-12);
    }

    #[test]
    fn test_missing_cost_entries_are_free() {
        let costs = CostTable {
            entries: BTreeMap::new(),
        };
        let p = apply_ai_interventions(
            &default_parameters(),
            &AiInterventionSpec::with_active(&[InterventionKind::BedManagement]),
            Some(&costs),
            &EffectTables::standard(),
            None,
            true,
        );
        assert_eq!(p.ai_fixed_cost, 0.0);
        assert_eq!(p.ai_variable_cost, 0.0);
        assert!(p.ai_active);
    }

    #[test]
    fn test_flags_from_keys() {
        let flags = InterventionFlags::from_keys(["triage", "self_care", "quantum_triage"]);
        assert!(flags.triage);
        assert!(flags.self_care);
        assert!(!flags.chw);
        assert_eq!(
            flags.active_kinds(),
            vec![InterventionKind::Triage, InterventionKind::SelfCare]
        );
    }

    #[test]
    fn test_effect_key_names_round_trip() {
        for key in EffectKey::all() {
            assert_eq!(EffectKey::from_name(key.name()), Some(key));
        }
        assert_eq!(EffectKey::from_name("deltaIEffect"), Some(EffectKey::DeltaInformal));
        assert_eq!(EffectKey::from_name("bogus"), None);
    }

    #[test]
    fn test_every_default_entry_is_permitted() {
        let tables = EffectTables::standard();
        for (kind, table) in &tables.defaults {
            for name in table.keys() {
                let key = EffectKey::from_name(name).expect("known key");
                assert!(kind.effect_keys().contains(&key), "{:?} {}", kind, name);
            }
        }
    }

    #[test]
    fn test_spec_json_shape() {
        let spec: AiInterventionSpec = serde_json::from_str(
            r#"{"flags": {"chw": true}, "magnitudes": {"sigmaIEffect": 0.5}}"#,
        )
        .unwrap();
        assert!(spec.flags.chw);
        assert_eq!(spec.magnitude(EffectKey::SigmaI), 0.5);
        assert_eq!(spec.magnitude(EffectKey::Mu0), 1.0);
        assert!(spec.uptake.is_none());
    }
}

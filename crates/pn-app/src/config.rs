//! Run configuration document and its validation.
//!
//! A configuration is a YAML file holding the fluid pair, solver settings,
//! the flow boundary condition, the initial wettability, output settings,
//! an optional lattice description for the CLI and the ordered stage list.

use std::fs;
use std::path::{Path, PathBuf};

use pn_capillary::{Ageing, DEFAULT_CORNER_RESISTANCE, FluidProps, WettabilityModel};
use pn_core::units::{pa_s, um};
use pn_network::element::TRIANGLE_MAX_SHAPE_FACTOR;
use pn_network::{Network, RegularLattice};
use pn_sim::{DisplacementKind, InvasionOptions, SimContext, TracerOptions, UnsteadyOptions};
use pn_solver::{BoundaryCondition, CgConfig, LinearSolverKind, SolverConfig};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub name: String,
    #[serde(default)]
    pub fluids: FluidsDef,
    #[serde(default)]
    pub solver: SolverDef,
    #[serde(default)]
    pub boundary: BoundaryDef,
    #[serde(default)]
    pub wettability: WettabilityDef,
    #[serde(default)]
    pub output: OutputDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<LatticeDef>,
    pub stages: Vec<StageDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluidsDef {
    pub water_viscosity_pa_s: f64,
    pub oil_viscosity_pa_s: f64,
    /// Oil/water interfacial tension (N/m)
    pub interfacial_tension_n_m: f64,
    pub tracer_diffusivity_m2_s: f64,
}

impl Default for FluidsDef {
    fn default() -> Self {
        let props = FluidProps::default();
        Self {
            water_viscosity_pa_s: props.water_viscosity.value,
            oil_viscosity_pa_s: props.oil_viscosity.value,
            interfacial_tension_n_m: props.interfacial_tension,
            tracer_diffusivity_m2_s: props.tracer_diffusivity,
        }
    }
}

impl FluidsDef {
    pub fn to_props(&self) -> FluidProps {
        FluidProps {
            water_viscosity: pa_s(self.water_viscosity_pa_s),
            oil_viscosity: pa_s(self.oil_viscosity_pa_s),
            interfacial_tension: self.interfacial_tension_n_m,
            tracer_diffusivity: self.tracer_diffusivity_m2_s,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverMethodDef {
    Cholesky,
    #[default]
    ConjugateGradient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverDef {
    pub method: SolverMethodDef,
    pub rtol: f64,
    pub atol: f64,
    pub max_iter: usize,
}

impl Default for SolverDef {
    fn default() -> Self {
        let cg = CgConfig::default();
        Self {
            method: SolverMethodDef::default(),
            rtol: cg.rtol,
            atol: cg.atol,
            max_iter: cg.max_iter,
        }
    }
}

impl SolverDef {
    pub fn to_config(&self) -> SolverConfig {
        SolverConfig {
            method: match self.method {
                SolverMethodDef::Cholesky => LinearSolverKind::Cholesky,
                SolverMethodDef::ConjugateGradient => LinearSolverKind::ConjugateGradient,
            },
            cg: CgConfig {
                rtol: self.rtol,
                atol: self.atol,
                max_iter: self.max_iter,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoundaryDef {
    PressureDrop { inlet_pa: f64, outlet_pa: f64 },
    FlowRate { rate_m3_s: f64, outlet_pa: f64 },
}

impl Default for BoundaryDef {
    fn default() -> Self {
        BoundaryDef::PressureDrop {
            inlet_pa: 1.0e4,
            outlet_pa: 0.0,
        }
    }
}

impl BoundaryDef {
    pub fn to_condition(&self) -> BoundaryCondition {
        match *self {
            BoundaryDef::PressureDrop {
                inlet_pa,
                outlet_pa,
            } => BoundaryCondition::PressureDrop {
                inlet: inlet_pa,
                outlet: outlet_pa,
            },
            BoundaryDef::FlowRate {
                rate_m3_s,
                outlet_pa,
            } => BoundaryCondition::FlowRate {
                rate: rate_m3_s,
                outlet: outlet_pa,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WettabilityDef {
    /// Receding contact angle of the initially water-wet medium (degrees)
    pub initial_contact_angle_deg: f64,
    /// Dimensionless corner flow resistance for film conductance
    pub corner_resistance: f64,
}

impl Default for WettabilityDef {
    fn default() -> Self {
        Self {
            initial_contact_angle_deg: 0.0,
            corner_resistance: DEFAULT_CORNER_RESISTANCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputDef {
    /// Parent directory of run folders; no folder is created when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_root: Option<PathBuf>,
    /// Snapshot whenever Sw moves by this much (0 disables)
    pub snapshot_sw_interval: f64,
    /// Snapshot every this many simulated seconds in transport stages (0 disables)
    pub snapshot_time_interval_s: f64,
    /// Keep snapshots in the run report
    pub keep_snapshots: bool,
}

/// Regular lattice used when the caller does not supply a network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatticeDef {
    pub nx: usize,
    pub ny: usize,
    #[serde(default = "one")]
    pub nz: usize,
    pub spacing_um: f64,
    pub node_radius_um: f64,
    pub pore_radius_um: f64,
    /// Defaults to an equilateral triangle
    #[serde(default = "triangle_shape_factor")]
    pub shape_factor: f64,
    #[serde(default)]
    pub radius_spread: f64,
}

fn one() -> usize {
    1
}

fn triangle_shape_factor() -> f64 {
    TRIANGLE_MAX_SHAPE_FACTOR
}

impl LatticeDef {
    pub fn to_lattice(&self) -> RegularLattice {
        RegularLattice::new(
            [self.nx, self.ny, self.nz],
            um(self.spacing_um).value,
            um(self.node_radius_um).value,
            um(self.pore_radius_um).value,
            self.shape_factor,
        )
        .with_radius_spread(self.radius_spread)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplacementDef {
    pub pressure_increment_pa: f64,
    pub max_capillary_pressure_pa: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_sw: Option<f64>,
    pub snap_off_aspect_ratio: f64,
    pub relperm: bool,
}

impl Default for DisplacementDef {
    fn default() -> Self {
        let options = InvasionOptions::default();
        Self {
            pressure_increment_pa: options.pressure_increment,
            max_capillary_pressure_pa: options.max_capillary_pressure,
            target_sw: options.target_saturation,
            snap_off_aspect_ratio: options.snap_off_aspect_ratio,
            relperm: options.compute_relperm,
        }
    }
}

impl DisplacementDef {
    pub fn to_options(&self, output: &OutputDef) -> InvasionOptions {
        InvasionOptions {
            pressure_increment: self.pressure_increment_pa,
            max_capillary_pressure: self.max_capillary_pressure_pa,
            target_saturation: self.target_sw,
            snap_off_aspect_ratio: self.snap_off_aspect_ratio,
            compute_relperm: self.relperm,
            snapshot_sw_interval: output.snapshot_sw_interval,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WettabilityModelDef {
    WaterWet,
    MixedWetLarge,
    MixedWetSmall,
    OilWet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeingDef {
    pub model: WettabilityModelDef,
    #[serde(default = "full_fraction")]
    pub oil_wet_fraction: f64,
    /// Contact angle given to altered elements (degrees)
    pub contact_angle_deg: f64,
}

fn full_fraction() -> f64 {
    1.0
}

impl AgeingDef {
    pub fn to_ageing(&self) -> Ageing {
        Ageing {
            model: match self.model {
                WettabilityModelDef::WaterWet => WettabilityModel::WaterWet,
                WettabilityModelDef::MixedWetLarge => WettabilityModel::MixedWetLarge,
                WettabilityModelDef::MixedWetSmall => WettabilityModel::MixedWetSmall,
                WettabilityModelDef::OilWet => WettabilityModel::OilWet,
            },
            oil_wet_fraction: self.oil_wet_fraction,
            oil_wet_contact_angle: self.contact_angle_deg.to_radians(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerDef {
    pub inlet_concentration: f64,
    pub injected_pore_volumes: f64,
    pub diffusion: bool,
    pub max_steps: usize,
    pub sample_interval_pv: f64,
}

impl Default for TracerDef {
    fn default() -> Self {
        let options = TracerOptions::default();
        Self {
            inlet_concentration: options.inlet_concentration,
            injected_pore_volumes: options.injected_pore_volumes,
            diffusion: options.diffusion,
            max_steps: options.max_steps,
            sample_interval_pv: options.sample_interval_pv,
        }
    }
}

impl TracerDef {
    pub fn to_options(&self, output: &OutputDef) -> TracerOptions {
        TracerOptions {
            inlet_concentration: self.inlet_concentration,
            injected_pore_volumes: self.injected_pore_volumes,
            max_steps: self.max_steps,
            diffusion: self.diffusion,
            sample_interval_pv: self.sample_interval_pv,
            snapshot_time_interval: output.snapshot_time_interval_s,
            ..TracerOptions::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnsteadyDef {
    pub injected_pore_volumes: f64,
    pub flip_threshold: f64,
    pub max_steps: usize,
    pub pressure_update_interval: usize,
    pub sample_interval_pv: f64,
}

impl Default for UnsteadyDef {
    fn default() -> Self {
        let options = UnsteadyOptions::default();
        Self {
            injected_pore_volumes: options.injected_pore_volumes,
            flip_threshold: options.flip_threshold,
            max_steps: options.max_steps,
            pressure_update_interval: options.pressure_update_interval,
            sample_interval_pv: options.sample_interval_pv,
        }
    }
}

impl UnsteadyDef {
    pub fn to_options(&self, output: &OutputDef) -> UnsteadyOptions {
        UnsteadyOptions {
            injected_pore_volumes: self.injected_pore_volumes,
            flip_threshold: self.flip_threshold,
            max_steps: self.max_steps,
            pressure_update_interval: self.pressure_update_interval,
            sample_interval_pv: self.sample_interval_pv,
            snapshot_sw_interval: output.snapshot_sw_interval,
            snapshot_time_interval: output.snapshot_time_interval_s,
            ..UnsteadyOptions::default()
        }
    }
}

/// One entry of the ordered stage list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageDef {
    PrimaryDrainage(DisplacementDef),
    SpontaneousImbibition(DisplacementDef),
    ForcedWaterInjection(DisplacementDef),
    SpontaneousOilInvasion(DisplacementDef),
    SecondaryDrainage(DisplacementDef),
    Ageing(AgeingDef),
    Tracer(TracerDef),
    UnsteadyFlood(UnsteadyDef),
}

impl StageDef {
    pub fn label(&self) -> &'static str {
        match self {
            StageDef::PrimaryDrainage(_) => "primary drainage",
            StageDef::SpontaneousImbibition(_) => "spontaneous imbibition",
            StageDef::ForcedWaterInjection(_) => "forced water injection",
            StageDef::SpontaneousOilInvasion(_) => "spontaneous oil invasion",
            StageDef::SecondaryDrainage(_) => "secondary drainage",
            StageDef::Ageing(_) => "ageing",
            StageDef::Tracer(_) => "tracer",
            StageDef::UnsteadyFlood(_) => "unsteady flood",
        }
    }

    /// The displacement cycle and its settings, for displacement stages.
    pub fn displacement(&self) -> Option<(DisplacementKind, &DisplacementDef)> {
        match self {
            StageDef::PrimaryDrainage(d) => Some((DisplacementKind::PrimaryDrainage, d)),
            StageDef::SpontaneousImbibition(d) => Some((DisplacementKind::SpontaneousImbibition, d)),
            StageDef::ForcedWaterInjection(d) => Some((DisplacementKind::ForcedWaterInjection, d)),
            StageDef::SpontaneousOilInvasion(d) => Some((DisplacementKind::SpontaneousOilInvasion, d)),
            StageDef::SecondaryDrainage(d) => Some((DisplacementKind::SecondaryDrainage, d)),
            _ => None,
        }
    }

    fn invades_with_oil(&self) -> bool {
        matches!(
            self,
            StageDef::PrimaryDrainage(_) | StageDef::SecondaryDrainage(_)
        )
    }

    fn needs_oil(&self) -> bool {
        matches!(
            self,
            StageDef::SpontaneousImbibition(_)
                | StageDef::ForcedWaterInjection(_)
                | StageDef::SpontaneousOilInvasion(_)
                | StageDef::Ageing(_)
                | StageDef::UnsteadyFlood(_)
        )
    }
}

impl SimulationConfig {
    /// Physics and numerics shared by every stage.
    pub fn context(&self) -> SimContext {
        SimContext {
            fluids: self.fluids.to_props(),
            solver: self.solver.to_config(),
            boundary: self.boundary.to_condition(),
            corner_resistance: self.wettability.corner_resistance,
        }
    }

    /// Initial receding contact angle (rad).
    pub fn initial_contact_angle(&self) -> f64 {
        self.wettability.initial_contact_angle_deg.to_radians()
    }
}

/// Load a configuration from a YAML file.
pub fn load_config(path: &Path) -> AppResult<SimulationConfig> {
    let contents = fs::read_to_string(path).map_err(|source| AppError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents)
}

/// Parse a configuration from YAML text.
pub fn parse_config(contents: &str) -> AppResult<SimulationConfig> {
    serde_yaml::from_str(contents).map_err(|e| AppError::Config(e.to_string()))
}

/// Check a configuration; returns one human-readable line per issue.
pub fn validate_config(config: &SimulationConfig) -> Vec<String> {
    let mut issues = Vec::new();

    if config.name.trim().is_empty() {
        issues.push("name must not be empty".to_string());
    }
    if let Err(e) = config.fluids.to_props().validate() {
        issues.push(format!("fluids: {e}"));
    }

    let solver = &config.solver;
    if !(solver.rtol.is_finite() && solver.rtol > 0.0) {
        issues.push(format!("solver: rtol must be positive, got {}", solver.rtol));
    }
    if !(solver.atol.is_finite() && solver.atol >= 0.0) {
        issues.push(format!("solver: atol must be non-negative, got {}", solver.atol));
    }
    if solver.max_iter == 0 {
        issues.push("solver: max_iter must be at least 1".to_string());
    }

    match config.boundary {
        BoundaryDef::PressureDrop {
            inlet_pa,
            outlet_pa,
        } => {
            if !(inlet_pa.is_finite() && outlet_pa.is_finite()) {
                issues.push("boundary: pressures must be finite".to_string());
            } else if inlet_pa <= outlet_pa {
                issues.push(format!(
                    "boundary: inlet pressure {inlet_pa} Pa must exceed outlet pressure {outlet_pa} Pa"
                ));
            }
        }
        BoundaryDef::FlowRate {
            rate_m3_s,
            outlet_pa,
        } => {
            if !(rate_m3_s.is_finite() && rate_m3_s > 0.0) {
                issues.push(format!("boundary: flow rate must be positive, got {rate_m3_s}"));
            }
            if !outlet_pa.is_finite() {
                issues.push("boundary: outlet pressure must be finite".to_string());
            }
        }
    }

    let theta = config.wettability.initial_contact_angle_deg;
    if !(0.0..=90.0).contains(&theta) {
        issues.push(format!(
            "wettability: initial contact angle must lie in [0, 90] degrees, got {theta}"
        ));
    }
    let resistance = config.wettability.corner_resistance;
    if !(resistance.is_finite() && resistance > 0.0) {
        issues.push(format!("wettability: corner resistance must be positive, got {resistance}"));
    }

    let output = &config.output;
    if !(output.snapshot_sw_interval >= 0.0 && output.snapshot_time_interval_s >= 0.0) {
        issues.push("output: snapshot intervals must be non-negative".to_string());
    }

    if let Some(lattice) = &config.network {
        validate_lattice(lattice, &mut issues);
    }

    if config.stages.is_empty() {
        issues.push("stages: at least one stage is required".to_string());
    }
    let mut oil_present = false;
    for (i, stage) in config.stages.iter().enumerate() {
        let at = format!("stages[{i}] ({})", stage.label());
        if stage.needs_oil() && !oil_present {
            issues.push(format!("{at}: needs a preceding drainage stage"));
        }
        if stage.invades_with_oil() {
            oil_present = true;
        }
        validate_stage(stage, &config.output, &at, &mut issues);
    }

    issues
}

fn validate_lattice(lattice: &LatticeDef, issues: &mut Vec<String>) {
    if lattice.nx == 0 || lattice.ny == 0 || lattice.nz == 0 {
        issues.push("network: lattice dimensions must be at least 1".to_string());
    }
    let positive = [
        ("spacing_um", lattice.spacing_um),
        ("node_radius_um", lattice.node_radius_um),
        ("pore_radius_um", lattice.pore_radius_um),
        ("shape_factor", lattice.shape_factor),
    ];
    for (what, value) in positive {
        if !(value.is_finite() && value > 0.0) {
            issues.push(format!("network: {what} must be positive, got {value}"));
        }
    }
    if !(0.0..1.0).contains(&lattice.radius_spread) {
        issues.push(format!(
            "network: radius_spread must lie in [0, 1), got {}",
            lattice.radius_spread
        ));
    }
    if 2.0 * lattice.node_radius_um >= lattice.spacing_um {
        issues.push("network: nodes overlap (2 x node_radius_um >= spacing_um)".to_string());
    }
}

fn validate_stage(stage: &StageDef, output: &OutputDef, at: &str, issues: &mut Vec<String>) {
    let result = match stage {
        StageDef::Ageing(ageing) => {
            if !(0.0..=1.0).contains(&ageing.oil_wet_fraction) {
                issues.push(format!("{at}: oil_wet_fraction must lie in [0, 1]"));
            }
            if !(90.0..=180.0).contains(&ageing.contact_angle_deg) {
                issues.push(format!("{at}: oil-wet contact angle must lie in [90, 180] degrees"));
            }
            Ok(())
        }
        StageDef::Tracer(tracer) => tracer.to_options(output).validate(),
        StageDef::UnsteadyFlood(flood) => flood.to_options(output).validate(),
        other => match other.displacement() {
            Some((_, def)) => def.to_options(output).validate(),
            None => Ok(()),
        },
    };
    if let Err(e) = result {
        issues.push(format!("{at}: {e}"));
    }
}

/// Build the configured lattice.
pub fn build_network(config: &SimulationConfig) -> AppResult<Network> {
    let lattice = config
        .network
        .as_ref()
        .ok_or_else(|| AppError::Config("no network section".to_string()))?;
    Ok(lattice.to_lattice().build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
name: minimal
stages:
  - type: primary_drainage
"#;

    #[test]
    fn defaults_fill_missing_sections() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.fluids, FluidsDef::default());
        assert_eq!(config.wettability.corner_resistance, DEFAULT_CORNER_RESISTANCE);
        assert!(config.network.is_none());
        assert_eq!(
            config.stages,
            vec![StageDef::PrimaryDrainage(DisplacementDef::default())]
        );
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn imbibition_without_drainage_is_flagged() {
        let config = parse_config(
            r#"
name: wrong order
stages:
  - type: spontaneous_imbibition
  - type: primary_drainage
"#,
        )
        .unwrap();
        let issues = validate_config(&config);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("stages[0]"));
    }

    #[test]
    fn boundary_is_tagged() {
        let config = parse_config(
            r#"
name: rate
boundary:
  type: flow_rate
  rate_m3_s: 1.0e-12
  outlet_pa: 0.0
stages:
  - type: primary_drainage
"#,
        )
        .unwrap();
        assert_eq!(
            config.context().boundary,
            BoundaryCondition::FlowRate {
                rate: 1.0e-12,
                outlet: 0.0
            }
        );
    }

    #[test]
    fn boundary_tags_share_stage_casing() {
        let config = parse_config(
            "name: x\nboundary:\n  type: pressure_drop\n  inlet_pa: 2.0e4\n  outlet_pa: 0.0\nstages:\n  - type: primary_drainage\n",
        )
        .unwrap();
        assert_eq!(
            config.boundary,
            BoundaryDef::PressureDrop {
                inlet_pa: 2.0e4,
                outlet_pa: 0.0
            }
        );
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("type: pressure_drop"));

        let camel = "name: x\nboundary:\n  type: PressureDrop\n  inlet_pa: 1.0\n  outlet_pa: 0.0\nstages:\n  - type: primary_drainage\n";
        assert!(matches!(parse_config(camel), Err(AppError::Config(_))));
    }

    #[test]
    fn unknown_stage_type_is_a_config_error() {
        let result = parse_config("name: x\nstages:\n  - type: steam_flood\n");
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}

//! Epoch driver.
//!
//! A [`Predictor`] owns two kinds of state:
//!
//! - **Static tables** ([`StaticModel`]): network graph, radial topology, per-unit bases and
//!   the electrical model. Built on the first processed epoch, then shared read-only behind an
//!   `Arc` by every horizon step.
//! - **Epoch context** ([`EpochContext`]): forecasts and diagnostics received since the last
//!   [`Predictor::start_epoch`]. Discarded when the next epoch starts.
//!
//! Inputs arrive as [`InputMessage`]s and are dispatched in one `match` by
//! [`Predictor::ingest`]. [`Predictor::process_epoch`] returns `Ok(None)` until every expected
//! input is present.

use chrono::{DateTime, Utc};
use nsp_core::messages::{
    CurrentForecastMessage, CustomerRecord, InputMessage, ResourceForecastMessage,
    VoltageForecastMessage,
};
use nsp_core::{
    Branch, Bus, CurrentForecast, DiagnosticIssue, Diagnostics, KilovoltAmperes, Network,
    NspResult, Phase, PhaseNode, Severity, Topology, VoltageForecast,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::PredictorConfig;
use crate::power_flow::{
    assemble, resolve_resources, LoadMapper, NetworkModel, PerUnitBase, StepSolution, SweepError,
};

/// Tables derived once from the topology messages
#[derive(Debug)]
pub struct StaticModel {
    pub network: Network,
    pub topology: Topology,
    pub per_unit: PerUnitBase,
    pub model: NetworkModel,
}

impl StaticModel {
    pub fn build(
        buses: Vec<Bus>,
        branches: Vec<Branch>,
        s_base: KilovoltAmperes,
        root_voltage_pu: f64,
    ) -> NspResult<Self> {
        let network = Network::from_parts(buses, branches)?;
        let topology = Topology::build(&network)?;
        let per_unit = PerUnitBase::new(&network, s_base);
        let model = NetworkModel::new(&network, &topology, root_voltage_pu);

        Ok(Self {
            network,
            topology,
            per_unit,
            model,
        })
    }
}

/// What [`Predictor::ingest`] did with a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    Stored,
    /// A forecast for a resource already seen this epoch; the first one is kept
    Duplicate,
    /// Topology data arriving after the static model was built
    Ignored,
}

/// Inputs collected for the current epoch
#[derive(Debug, Clone, Default)]
pub struct EpochContext {
    pub epoch: Option<u64>,
    forecasts: Vec<ResourceForecastMessage>,
    seen: HashSet<String>,
    time_index: Option<Vec<DateTime<Utc>>>,
    diagnostics: Diagnostics,
}

impl EpochContext {
    pub fn new(epoch: Option<u64>) -> Self {
        Self {
            epoch,
            ..Self::default()
        }
    }

    pub fn forecast_count(&self) -> usize {
        self.forecasts.len()
    }

    /// Horizon taken from the first accepted forecast, else `fallback`
    pub fn horizon(&self, fallback: usize) -> usize {
        self.time_index.as_ref().map_or(fallback, Vec::len)
    }

    pub fn time_index(&self) -> Option<&[DateTime<Utc>]> {
        self.time_index.as_deref()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn add_forecast(
        &mut self,
        forecast: ResourceForecastMessage,
        configured_horizon: usize,
    ) -> Ingested {
        if !self.seen.insert(forecast.resource_id.clone()) {
            warn!(
                resource_id = %forecast.resource_id,
                "forecast for this resource already received this epoch; keeping the first"
            );
            self.diagnostics.add_warning_with_entity(
                "forecast",
                "duplicate forecast rejected",
                &forecast.resource_id,
            );
            return Ingested::Duplicate;
        }

        match self.time_index.as_ref().map(Vec::len) {
            None => {
                if forecast.horizon() != configured_horizon {
                    warn!(
                        configured = configured_horizon,
                        received = forecast.horizon(),
                        message_id = ?forecast.message_id,
                        "forecast horizon differs from configuration; using the forecast's"
                    );
                    self.diagnostics.add_warning_with_entity(
                        "config",
                        &format!(
                            "forecast horizon {} overrides configured {}",
                            forecast.horizon(),
                            configured_horizon
                        ),
                        &forecast.resource_id,
                    );
                }
                self.time_index = Some(forecast.forecast.time_index.clone());
            }
            Some(horizon) if horizon != forecast.horizon() => {
                warn!(
                    resource_id = %forecast.resource_id,
                    expected = horizon,
                    received = forecast.horizon(),
                    "forecast horizon differs from earlier forecasts"
                );
                self.diagnostics.add_warning_with_entity(
                    "forecast",
                    &format!(
                        "forecast has {} steps, epoch horizon is {}",
                        forecast.horizon(),
                        horizon
                    ),
                    &forecast.resource_id,
                );
            }
            Some(_) => {}
        }

        self.forecasts.push(forecast);
        Ingested::Stored
    }
}

/// Solver outcome of one horizon step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSummary {
    pub step: usize,
    pub converged: bool,
    pub iterations: usize,
    pub error: f64,
}

impl From<&StepSolution> for StepSummary {
    fn from(solution: &StepSolution) -> Self {
        Self {
            step: solution.step,
            converged: solution.converged,
            iterations: solution.iterations,
            error: solution.error,
        }
    }
}

/// Everything produced for one epoch
#[derive(Debug, Clone)]
pub struct EpochForecast {
    pub epoch: Option<u64>,
    pub time_index: Vec<DateTime<Utc>>,
    pub voltages: Vec<VoltageForecast>,
    pub currents: Vec<CurrentForecast>,
    pub steps: Vec<StepSummary>,
    pub diagnostics: Diagnostics,
    pub voltage_topic: String,
    pub current_topic: String,
}

impl EpochForecast {
    pub fn horizon(&self) -> usize {
        self.steps.len()
    }

    pub fn all_converged(&self) -> bool {
        self.steps.iter().all(|s| s.converged)
    }

    pub fn voltage_messages(&self) -> Vec<VoltageForecastMessage> {
        self.voltages
            .iter()
            .map(|v| v.to_message(&self.voltage_topic, self.epoch, &self.time_index))
            .collect()
    }

    pub fn current_messages(&self) -> Vec<CurrentForecastMessage> {
        self.currents
            .iter()
            .map(|c| c.to_message(&self.current_topic, self.epoch, &self.time_index))
            .collect()
    }

    /// Voltage record for a bus and phase
    pub fn voltage(&self, bus: &str, phase: Phase) -> Option<&VoltageForecast> {
        self.voltages
            .iter()
            .find(|v| v.bus == bus && v.phase == phase)
    }

    pub fn current(&self, device_id: &str, phase: Phase) -> Option<&CurrentForecast> {
        self.currents
            .iter()
            .find(|c| c.device_id == device_id && c.phase == phase)
    }
}

pub struct Predictor {
    config: PredictorConfig,
    buses: Option<Vec<Bus>>,
    branches: Option<Vec<Branch>>,
    power_base: KilovoltAmperes,
    customers: Option<HashMap<String, CustomerRecord>>,
    customer_count: usize,
    resource_nodes: HashMap<String, PhaseNode>,
    static_model: Option<Arc<StaticModel>>,
    epoch: EpochContext,
}

impl Predictor {
    pub fn new(config: PredictorConfig) -> NspResult<Self> {
        config.validate()?;
        Ok(Self {
            power_base: config.apparent_power_base(),
            config,
            buses: None,
            branches: None,
            customers: None,
            customer_count: 0,
            resource_nodes: HashMap::new(),
            static_model: None,
            epoch: EpochContext::default(),
        })
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    pub fn epoch(&self) -> &EpochContext {
        &self.epoch
    }

    pub fn static_model(&self) -> Option<&StaticModel> {
        self.static_model.as_deref()
    }

    /// Apparent-power base in use; the component message overrides the configuration
    pub fn power_base(&self) -> KilovoltAmperes {
        self.power_base
    }

    /// Discard the previous epoch's forecasts and diagnostics
    pub fn start_epoch(&mut self, epoch: Option<u64>) {
        debug!(?epoch, "starting epoch");
        self.epoch = EpochContext::new(epoch);
    }

    pub fn ingest(&mut self, message: InputMessage) -> NspResult<Ingested> {
        let is_topology = matches!(
            message,
            InputMessage::Bus(_) | InputMessage::Component(_) | InputMessage::Customer(_)
        );
        if is_topology && self.static_model.is_some() {
            debug!(
                message_type = message.message_type(),
                "static model already built; ignoring"
            );
            return Ok(Ingested::Ignored);
        }

        match message {
            InputMessage::Bus(msg) => {
                let buses = msg.to_buses()?;
                debug!(buses = buses.len(), "received bus info");
                self.buses = Some(buses);
            }
            InputMessage::Component(msg) => {
                let branches = msg.to_branches()?;
                debug!(branches = branches.len(), "received component info");
                let message_base = msg.power_base.value;
                if (message_base - self.config.apparent_power_base_kva).abs() > 1e-9 {
                    warn!(
                        configured = self.config.apparent_power_base_kva,
                        received = message_base,
                        "power base differs from configuration; using the component info's"
                    );
                    self.epoch.diagnostics.add_warning(
                        "config",
                        &format!(
                            "power base {} kVA overrides configured {} kVA",
                            message_base, self.config.apparent_power_base_kva
                        ),
                    );
                }
                self.power_base = KilovoltAmperes(message_base);
                self.branches = Some(branches);
            }
            InputMessage::Customer(msg) => {
                let records = msg.to_records()?;
                debug!(resources = records.len(), "received customer info");
                self.customer_count = records.len();
                self.customers = Some(
                    records
                        .into_iter()
                        .map(|record| (record.resource_id.clone(), record))
                        .collect(),
                );
            }
            InputMessage::ResourceState(msg) => {
                self.resource_nodes.insert(msg.resource_id, msg.node);
            }
            InputMessage::ResourceForecast(msg) => {
                return Ok(self.epoch.add_forecast(msg, self.config.forecast_horizon));
            }
        }

        Ok(Ingested::Stored)
    }

    /// Forecasts required before an epoch runs
    pub fn expected_resources(&self) -> usize {
        self.config.expected_resources.unwrap_or(self.customer_count)
    }

    /// Distinct forecasts this epoch for resources listed in the customer info
    pub fn known_forecast_count(&self) -> usize {
        self.customers.as_ref().map_or(0, |customers| {
            self.epoch
                .forecasts
                .iter()
                .filter(|f| customers.contains_key(&f.resource_id))
                .count()
        })
    }

    pub fn is_ready(&self) -> bool {
        let topology_ready =
            self.static_model.is_some() || (self.buses.is_some() && self.branches.is_some());
        topology_ready
            && self.customers.is_some()
            && self.known_forecast_count() >= self.expected_resources()
    }

    /// Run every horizon step of the current epoch
    ///
    /// Returns `Ok(None)` while inputs are missing. On error the partial results are dropped
    /// and the epoch inputs are kept, so the call can be repeated.
    pub fn process_epoch(&mut self) -> NspResult<Option<EpochForecast>> {
        if !self.is_ready() {
            debug!(
                forecasts = self.epoch.forecast_count(),
                known = self.known_forecast_count(),
                expected = self.expected_resources(),
                "epoch inputs incomplete"
            );
            return Ok(None);
        }

        let model = self.ensure_static_model()?;
        let horizon = self.epoch.horizon(self.config.forecast_horizon);
        let mut diagnostics = self.epoch.diagnostics.clone();

        let empty = HashMap::new();
        let customers = self.customers.as_ref().unwrap_or(&empty);
        let resources = resolve_resources(
            self.epoch
                .forecasts
                .iter()
                .map(|f| (f.resource_id.as_str(), f.real_power())),
            customers,
            &self.resource_nodes,
            &model.network,
            &mut diagnostics,
        );

        info!(
            epoch = ?self.epoch.epoch,
            horizon,
            resources = resources.len(),
            buses = model.network.bus_count(),
            "processing epoch"
        );

        let mapper = LoadMapper::new(self.config.three_phase_split);
        let solver = self.config.sweep_solver();
        let bus_count = model.network.bus_count();
        let run_step = |step: usize| -> Result<(StepSolution, Diagnostics), SweepError> {
            let mut step_diagnostics = Diagnostics::new();
            let injections = mapper.injections(
                &resources,
                &model.per_unit,
                bus_count,
                step,
                &mut step_diagnostics,
            );
            let solution = solver.solve(&model.topology, &model.model, &injections, step)?;
            Ok((solution, step_diagnostics))
        };

        #[cfg(feature = "parallel")]
        let results: Result<Vec<_>, SweepError> =
            (0..horizon).into_par_iter().map(run_step).collect();
        #[cfg(not(feature = "parallel"))]
        let results: Result<Vec<_>, SweepError> = (0..horizon).map(run_step).collect();

        let results = results?;

        let mut solutions = Vec::with_capacity(results.len());
        for (solution, step_diagnostics) in results {
            diagnostics.merge(step_diagnostics);
            if !solution.converged {
                diagnostics.add(
                    DiagnosticIssue::new(
                        Severity::Warning,
                        "solver",
                        format!(
                            "sweep stopped at the iteration cap with error {:.3e}",
                            solution.error
                        ),
                    )
                    .with_step(solution.step),
                );
            }
            solutions.push(solution);
        }

        let assembled = assemble(&model.network, &model.per_unit, &solutions, horizon);
        let steps: Vec<StepSummary> = solutions.iter().map(StepSummary::from).collect();
        let converged = steps.iter().filter(|s| s.converged).count();

        info!(
            epoch = ?self.epoch.epoch,
            converged,
            steps = steps.len(),
            diagnostics = %diagnostics.summary(),
            "epoch processed"
        );

        Ok(Some(EpochForecast {
            epoch: self.epoch.epoch,
            time_index: self.epoch.time_index.clone().unwrap_or_default(),
            voltages: assembled.voltages,
            currents: assembled.currents,
            steps,
            diagnostics,
            voltage_topic: self.config.voltage_topic.clone(),
            current_topic: self.config.current_topic.clone(),
        }))
    }

    fn ensure_static_model(&mut self) -> NspResult<Arc<StaticModel>> {
        if let Some(model) = &self.static_model {
            return Ok(Arc::clone(model));
        }

        let buses = self.buses.clone().unwrap_or_default();
        let branches = self.branches.clone().unwrap_or_default();
        let model = Arc::new(StaticModel::build(
            buses,
            branches,
            self.power_base,
            self.config.root_voltage_pu,
        )?);

        info!(
            buses = model.network.bus_count(),
            branches = model.network.branch_count(),
            max_depth = model.topology.max_depth(),
            s_base_kva = self.power_base.value(),
            "built static network model"
        );

        self.buses = None;
        self.branches = None;
        self.static_model = Some(Arc::clone(&model));
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{series_feeder, three_bus_feeder};

    fn ingest_all(predictor: &mut Predictor, messages: Vec<InputMessage>) {
        for message in messages {
            predictor.ingest(message).unwrap();
        }
    }

    #[test]
    fn test_not_ready_until_every_forecast_arrives() {
        let fixture = series_feeder(2, 0.01, 0.02)
            .resource("r1", "n1", None, vec![-10.0])
            .resource("r2", "n2", None, vec![-20.0]);
        let mut predictor = Predictor::new(PredictorConfig::default()).unwrap();
        predictor.start_epoch(Some(1));

        ingest_all(
            &mut predictor,
            vec![
                fixture.bus_message(1),
                fixture.component_message(1),
                fixture.customer_message(1),
            ],
        );
        assert!(!predictor.is_ready());
        assert!(predictor.process_epoch().unwrap().is_none());

        predictor
            .ingest(fixture.forecast_message(1, "r1", vec![-10.0]))
            .unwrap();
        assert!(predictor.process_epoch().unwrap().is_none());
        assert!(predictor.static_model().is_none());

        predictor
            .ingest(fixture.forecast_message(1, "r2", vec![-20.0]))
            .unwrap();
        let forecast = predictor.process_epoch().unwrap().unwrap();
        assert_eq!(forecast.epoch, Some(1));
        assert_eq!(forecast.horizon(), 1);
        assert!(predictor.static_model().is_some());
    }

    #[test]
    fn test_unlisted_forecast_does_not_complete_epoch() {
        let fixture = series_feeder(2, 0.01, 0.02)
            .resource("r1", "n1", None, vec![-10.0])
            .resource("r2", "n2", None, vec![-20.0]);
        let mut predictor = Predictor::new(PredictorConfig::default()).unwrap();
        predictor.start_epoch(Some(1));

        ingest_all(
            &mut predictor,
            vec![
                fixture.bus_message(1),
                fixture.component_message(1),
                fixture.customer_message(1),
                fixture.forecast_message(1, "r1", vec![-10.0]),
                fixture.forecast_message(1, "stranger", vec![-50.0]),
            ],
        );
        assert_eq!(predictor.epoch().forecast_count(), 2);
        assert_eq!(predictor.known_forecast_count(), 1);
        assert!(!predictor.is_ready());
        assert!(predictor.process_epoch().unwrap().is_none());

        predictor
            .ingest(fixture.forecast_message(1, "r2", vec![-20.0]))
            .unwrap();
        let forecast = predictor.process_epoch().unwrap().unwrap();
        assert_eq!(forecast.diagnostics.issues_by_category("mapping").count(), 1);
    }

    #[test]
    fn test_duplicate_forecast_keeps_first() {
        let fixture = three_bus_feeder();
        let mut predictor = Predictor::new(PredictorConfig::default()).unwrap();
        predictor.start_epoch(Some(3));

        let first = predictor
            .ingest(fixture.forecast_message(3, "load-1", vec![-100.0]))
            .unwrap();
        let second = predictor
            .ingest(fixture.forecast_message(3, "load-1", vec![-900.0]))
            .unwrap();

        assert_eq!(first, Ingested::Stored);
        assert_eq!(second, Ingested::Duplicate);
        assert_eq!(predictor.epoch().forecast_count(), 1);
        assert_eq!(predictor.epoch().diagnostics().warning_count(), 1);
    }

    #[test]
    fn test_topology_ignored_after_build() {
        let fixture = three_bus_feeder();
        let mut predictor = Predictor::new(PredictorConfig::default()).unwrap();
        predictor.start_epoch(Some(1));
        ingest_all(&mut predictor, fixture.messages(1));
        assert!(predictor.process_epoch().unwrap().is_some());

        predictor.start_epoch(Some(2));
        let ingested = predictor.ingest(fixture.bus_message(2)).unwrap();
        assert_eq!(ingested, Ingested::Ignored);
    }

    #[test]
    fn test_component_power_base_overrides_config() {
        let fixture = three_bus_feeder().power_base(5_000.0);
        let config = PredictorConfig::default().with_forecast_horizon(1);
        let mut predictor = Predictor::new(config).unwrap();
        predictor.start_epoch(Some(1));
        ingest_all(&mut predictor, fixture.messages(1));

        assert_eq!(predictor.power_base(), KilovoltAmperes(5_000.0));
        let forecast = predictor.process_epoch().unwrap().unwrap();
        assert_eq!(forecast.diagnostics.issues_by_category("config").count(), 1);
        let model = predictor.static_model().unwrap();
        assert_eq!(model.per_unit.s_base(), KilovoltAmperes(5_000.0));
    }

    #[test]
    fn test_forecast_horizon_overrides_config() {
        let fixture = series_feeder(1, 0.01, 0.0).resource(
            "r1",
            "n1",
            None,
            vec![-1.0, -2.0, -3.0, -4.0],
        );
        let config = PredictorConfig::default().with_forecast_horizon(36);
        let mut predictor = Predictor::new(config).unwrap();
        predictor.start_epoch(Some(1));
        ingest_all(&mut predictor, fixture.messages(1));

        let forecast = predictor.process_epoch().unwrap().unwrap();
        assert_eq!(forecast.horizon(), 4);
        assert_eq!(forecast.time_index.len(), 4);
        assert_eq!(forecast.diagnostics.issues_by_category("config").count(), 1);
        assert!(forecast.voltages.iter().all(|v| v.horizon() == 4));
    }

    #[test]
    fn test_short_forecast_leaves_step_diagnostic() {
        let fixture = series_feeder(1, 0.01, 0.0)
            .resource("long", "n1", None, vec![-1.0, -1.0, -1.0])
            .resource("short", "n1", None, vec![-1.0]);
        let config = PredictorConfig::default().with_forecast_horizon(3);
        let mut predictor = Predictor::new(config).unwrap();
        predictor.start_epoch(None);
        ingest_all(&mut predictor, fixture.messages(1));

        let forecast = predictor.process_epoch().unwrap().unwrap();
        let steps: Vec<_> = forecast
            .diagnostics
            .issues_by_category("forecast")
            .filter_map(|issue| issue.step)
            .collect();
        assert_eq!(steps, vec![1, 2]);
    }

    #[test]
    fn test_start_epoch_clears_forecasts() {
        let fixture = three_bus_feeder();
        let mut predictor = Predictor::new(PredictorConfig::default()).unwrap();
        predictor.start_epoch(Some(1));
        ingest_all(&mut predictor, fixture.messages(1));
        assert_eq!(predictor.epoch().forecast_count(), 1);

        predictor.start_epoch(Some(2));
        assert_eq!(predictor.epoch().forecast_count(), 0);
        assert_eq!(predictor.epoch().epoch, Some(2));
        assert!(!predictor.is_ready());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PredictorConfig::default().with_precision(0.0);
        assert!(Predictor::new(config).is_err());
    }
}

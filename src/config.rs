use serde::Serialize;

use crate::cli;
use crate::errors::InputError;
use crate::penalty::PenaltyParameters;
use crate::tabu::TabuMemory;

/// Parameters consumed by the search loop.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SearchConfig {
    pub iterations: usize,
    pub tabu_tenure: Option<usize>,
    pub tenure_factor: f64,
    pub precision: f64,
    pub penalties: PenaltyParameters,
    /// Attach the route sequences to every iteration report.
    pub report_routes: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            tabu_tenure: None,
            tenure_factor: 7.5,
            precision: 1e-2,
            penalties: PenaltyParameters::default(),
            report_routes: true,
        }
    }
}

impl SearchConfig {
    pub fn tenure(&self, customers: usize) -> usize {
        self.tabu_tenure
            .unwrap_or_else(|| TabuMemory::size_derived_tenure(customers, self.tenure_factor))
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Config {
    pub problem: String,
    pub iterations: usize,
    pub tabu_tenure: Option<usize>,
    pub tenure_factor: f64,
    pub precision: f64,
    pub penalties: PenaltyParameters,
    pub seed: Option<u64>,
    pub start_customer: Option<usize>,
    pub distance: cli::DistanceType,
    pub initial: Option<String>,
    pub verbose: bool,
    pub outputs: String,
    pub disable_logging: bool,
    pub dry_run: bool,
}

impl Config {
    pub fn from_command(command: cli::Commands) -> Result<Self, InputError> {
        match command {
            cli::Commands::Evaluate { .. } => Err(InputError::Config("expected the `run` command".to_string())),
            cli::Commands::Run {
                problem,
                iterations,
                tabu_tenure,
                tenure_factor,
                precision,
                delta,
                upper_bound,
                reset_value,
                seed,
                start_customer,
                distance,
                initial,
                verbose,
                outputs,
                disable_logging,
                dry_run,
            } => {
                let config = Self {
                    problem,
                    iterations,
                    tabu_tenure,
                    tenure_factor,
                    precision,
                    penalties: PenaltyParameters {
                        delta,
                        upper_bound,
                        reset_value,
                    },
                    seed,
                    start_customer,
                    distance,
                    initial,
                    verbose,
                    outputs,
                    disable_logging,
                    dry_run,
                };
                config.validate()?;
                Ok(config)
            }
        }
    }

    fn validate(&self) -> Result<(), InputError> {
        let PenaltyParameters {
            delta,
            upper_bound,
            reset_value,
        } = self.penalties;

        let problem = if !(self.precision >= 0.0 && self.precision.is_finite()) {
            Some(format!("precision must be finite and non-negative, got {}", self.precision))
        } else if !(delta > 0.0 && delta.is_finite()) {
            Some(format!("delta must be positive, got {delta}"))
        } else if !(upper_bound >= 1.0 && upper_bound.is_finite()) {
            Some(format!("upper bound must be finite and at least 1, got {upper_bound}"))
        } else if !(reset_value > 0.0 && reset_value <= upper_bound) {
            Some(format!("reset value must be in (0, {upper_bound}], got {reset_value}"))
        } else if !(self.tenure_factor >= 0.0 && self.tenure_factor.is_finite()) {
            Some(format!("tenure factor must be non-negative, got {}", self.tenure_factor))
        } else {
            None
        };

        problem.map_or(Ok(()), |message| Err(InputError::Config(message)))
    }

    pub fn search(&self) -> SearchConfig {
        SearchConfig {
            iterations: if self.dry_run { 0 } else { self.iterations },
            tabu_tenure: self.tabu_tenure,
            tenure_factor: self.tenure_factor,
            precision: self.precision,
            penalties: self.penalties,
            report_routes: !self.disable_logging,
        }
    }
}

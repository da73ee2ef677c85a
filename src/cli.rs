use std::fmt;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Deserialize, Serialize)]
pub enum DistanceType {
    #[serde(rename = "manhattan")]
    Manhattan,
    #[serde(rename = "euclidean")]
    Euclidean,
}

impl fmt::Display for DistanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Manhattan => "manhattan",
                Self::Euclidean => "euclidean",
            }
        )
    }
}

impl DistanceType {
    pub fn matrix(&self, x: &[f64], y: &[f64]) -> Vec<Vec<f64>> {
        let n = x.len();
        assert_eq!(n, y.len());

        let mut matrix = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                let dx = x[i] - x[j];
                let dy = y[i] - y[j];
                matrix[i][j] = match self {
                    Self::Manhattan => dx.abs() + dy.abs(),
                    Self::Euclidean => dx.hypot(dy),
                };
            }
        }

        matrix
    }
}

#[derive(Debug, Parser)]
#[command(
    long_about = "Tabu search for the multi-depot vehicle routing problem with time windows",
    propagate_version = true,
    version
)]
pub struct Arguments {
    #[command(subcommand)]
    pub command: Commands,
}

#[allow(clippy::large_enum_variant)] // Parsed once at startup
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Evaluate an existing solution against a problem instance
    Evaluate {
        /// Path to the problem file (Cordeau format)
        problem: String,

        /// Path to the solution JSON file
        solution: String,

        /// Distance metric used to build the travel time matrix
        #[arg(long, default_value_t = DistanceType::Euclidean)]
        distance: DistanceType,
    },

    /// Run the tabu search
    Run {
        /// Path to the problem file (Cordeau format)
        problem: String,

        /// Number of tabu search iterations
        #[arg(short, long, default_value_t = 1000)]
        iterations: usize,

        /// Fixed tabu tenure. Otherwise, tenure = max(1, round([--tenure-factor] * log10(customers)))
        #[arg(short, long)]
        tabu_tenure: Option<usize>,

        /// Factor of the size-derived tabu tenure
        #[arg(long, default_value_t = 7.5)]
        tenure_factor: f64,

        /// Minimum improvement for a feasible solution to replace the recorded one
        #[arg(short, long, default_value_t = 1e-2)]
        precision: f64,

        /// Adaptive penalty step: weights are multiplied or divided by (1 + delta)
        #[arg(long, default_value_t = 0.005)]
        delta: f64,

        /// A penalty weight growing above this bound is reset to [--reset-value]
        #[arg(long, default_value_t = 1e7)]
        upper_bound: f64,

        /// Value a penalty weight is reset to after exceeding [--upper-bound]
        #[arg(long, default_value_t = 0.1)]
        reset_value: f64,

        /// Seed of the random source used by the initial solution builder
        #[arg(short, long)]
        seed: Option<u64>,

        /// Index (within each depot's customer list) the greedy builder starts from
        #[arg(long)]
        start_customer: Option<usize>,

        /// Distance metric used to build the travel time matrix
        #[arg(long, default_value_t = DistanceType::Euclidean)]
        distance: DistanceType,

        /// Chromosome JSON used as the initial solution instead of the greedy builder
        #[arg(long)]
        initial: Option<String>,

        /// The verbose mode
        #[arg(short, long)]
        verbose: bool,

        /// The directory to store results
        #[arg(long, default_value_t = String::from("outputs/"))]
        outputs: String,

        /// Disable CSV logging per iteration (this can significantly reduce the running time)
        #[arg(long)]
        disable_logging: bool,

        /// Do not run the search, only build and report the initial solution
        #[arg(long)]
        dry_run: bool,
    },
}

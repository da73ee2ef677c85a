use std::error::Error;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use rand::Rng;
use rand::distr::Alphanumeric;

use crate::chromosome::{self, Gene};
use crate::config::Config;
use crate::errors::InputError;
use crate::search::{IterationReport, SearchResult};
use crate::solutions::Solution;

#[derive(serde::Serialize)]
struct RunJSON<'a> {
    problem: &'a str,
    iterations: usize,
    tabu_tenure: usize,
    best_cost: f64,
    best_iteration: usize,
    feasible_cost: Option<f64>,
    feasible_iteration: Option<usize>,
    routes_used: usize,
    solution: &'a Solution,
    chromosome: Vec<Gene>,
    seed: u64,
    config: &'a Config,
    elapsed: f64,
}

pub struct Logger {
    _time_offset: Instant,

    _outputs: PathBuf,
    _problem: String,
    _id: String,
    _writer: Option<BufWriter<File>>,
}

impl Logger {
    pub fn new(config: &Config) -> Result<Self, InputError> {
        let outputs = PathBuf::from(&config.outputs);
        if !outputs.is_dir() {
            fs::create_dir_all(&outputs).map_err(|e| InputError::io(&config.outputs, e))?;
        }

        let problem = Path::new(&config.problem)
            .file_stem()
            .and_then(|f| f.to_os_string().into_string().ok())
            .ok_or_else(|| InputError::Config(format!("cannot name outputs after {}", config.problem)))?;
        let id = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect::<String>();

        let mut writer = if config.disable_logging {
            None
        } else {
            let path = outputs.join(format!("{problem}-{id}.csv"));
            let file = File::create(&path).map_err(|e| InputError::io(path.display().to_string(), e))?;
            eprintln!("Logging iterations to {}", path.display());
            Some(BufWriter::new(file))
        };

        if let Some(ref mut writer) = writer {
            let columns = [
                "Iteration",
                "Cost",
                "Travel time",
                "Feasible",
                "alpha",
                "Load violation",
                "beta",
                "Duration violation",
                "gamma",
                "Time window violation",
                "Routes",
                "Move",
                "Selection",
                "Attempts",
            ]
            .join(",");
            writeln!(writer, "sep=,\n{columns}").map_err(|e| InputError::io(&config.outputs, e))?;
        }

        Ok(Self {
            _time_offset: Instant::now(),
            _outputs: outputs,
            _problem: problem,
            _id: id,
            _writer: writer,
        })
    }

    pub fn log(&mut self, report: &IterationReport) -> Result<(), io::Error> {
        fn _wrap(content: &str) -> String {
            format!("\"{content}\"")
        }

        if let Some(ref mut writer) = self._writer {
            let (mv, kind) = report
                .selection
                .map_or((String::new(), String::new()), |s| {
                    (s.candidate.mv.to_string(), s.kind.to_string())
                });

            writeln!(
                writer,
                "{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
                report.iteration,
                report.cost.total,
                report.cost.travel_time,
                i32::from(report.cost.is_feasible()),
                report.penalties.alpha,
                report.cost.load_violation,
                report.penalties.beta,
                report.cost.duration_violation,
                report.penalties.gamma,
                report.cost.time_window_violation,
                _wrap(&report.routes.as_ref().map_or(String::new(), |r| format!("{r:?}"))),
                _wrap(&mv),
                kind,
                report.attempts,
            )?;
        }

        Ok(())
    }

    /// Write the run summary and the reported solution, returning the path of the latter.
    pub fn finalize(&mut self, result: &SearchResult, config: &Config, seed: u64) -> Result<PathBuf, Box<dyn Error>> {
        if let Some(ref mut writer) = self._writer {
            writer.flush()?;
        }

        let reported = result.reported();
        let run = RunJSON {
            problem: &self._problem,
            iterations: result.iterations,
            tabu_tenure: result.tabu_tenure,
            best_cost: result.best.total(),
            best_iteration: result.best.iteration,
            feasible_cost: result.feasible.as_ref().map(|s| s.total()),
            feasible_iteration: result.feasible.as_ref().map(|s| s.iteration),
            routes_used: reported.solution.routes_used(),
            solution: &reported.solution,
            chromosome: chromosome::to_chromosome(&reported.solution),
            seed,
            config,
            elapsed: self._time_offset.elapsed().as_secs_f64(),
        };

        let json_path = self._outputs.join(format!("{}-{}.json", self._problem, self._id));
        let mut json = File::create(&json_path)?;
        println!("{}", json_path.display());
        json.write_all(serde_json::to_string(&run)?.as_bytes())?;

        let json_path = self
            ._outputs
            .join(format!("{}-{}-solution.json", self._problem, self._id));
        let mut json = File::create(&json_path)?;
        println!("{}", json_path.display());
        json.write_all(serde_json::to_string(&reported.solution)?.as_bytes())?;

        Ok(json_path)
    }
}

use std::error::Error;
use std::fs;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use mimalloc::MiMalloc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

mod chromosome;
mod cli;
mod config;
mod cost;
mod errors;
mod instance;
mod logger;
mod neighborhoods;
mod penalty;
mod routes;
mod search;
mod solutions;
mod tabu;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn _evaluate(problem: &str, solution: &str, distance: cli::DistanceType) -> Result<(), Box<dyn Error>> {
    let instance = instance::Instance::load(problem, distance)?;
    let data = fs::read_to_string(solution).map_err(|e| errors::InputError::io(solution, e))?;
    let stored = serde_json::from_str::<solutions::StoredSolution>(&data).map_err(errors::InputError::from)?;

    // Weights stored alongside the routes belong to the run that produced them, start afresh.
    let s = solutions::Solution::from_sequences(&instance, &stored.routes, penalty::Penalties::default())?;
    println!("{}", serde_json::to_string(&s.cost)?);

    for d in 0..instance.depots_count() {
        for v in 0..instance.vehicles_count() {
            let route = s.route(d, v);
            if route.is_empty() {
                continue;
            }

            eprintln!("Depot {d} vehicle {v}: {route}");
            for visit in route.visits() {
                eprintln!(
                    "    customer {:>4} arrival {:>9.2} waiting {:>8.2} late {:>8.2}",
                    visit.customer, visit.arrival_time, visit.waiting_time, visit.time_window_violation
                );
            }
            eprintln!(
                "    back at depot {:.2} (late {:.2}), load {:.2}",
                route.return_to_depot_time(),
                route.depot_tw_violation(),
                route.cost().load
            );
        }
    }

    let status = if s.is_feasible() { "feasible" } else { "infeasible" };
    eprintln!("{}", format!("Result = {} ({status})", s.cost.total).red());
    s.verify(&instance)?;
    Ok(())
}

fn _run(config: config::Config) -> Result<(), Box<dyn Error>> {
    let instance = Arc::new(instance::Instance::load(&config.problem, config.distance)?);
    let seed = config.seed.unwrap_or_else(|| rand::rng().random());
    let penalties = penalty::Penalties::new(config.penalties);

    let initial = match &config.initial {
        Some(path) => chromosome::from_chromosome(&instance, &chromosome::load(path)?, penalties)?,
        None => solutions::Solution::initialize(
            &instance,
            &mut StdRng::seed_from_u64(seed),
            config.start_customer,
            penalties,
        ),
    };

    let search_config = config.search();
    if config.verbose {
        eprintln!(
            "{} customers, {} depots, {} vehicles per depot ({} routes), tabu tenure {}, seed {seed}",
            instance.customers_count(),
            instance.depots_count(),
            instance.vehicles_count(),
            instance.routes_count(),
            search_config.tenure(instance.customers_count()),
        );
    }

    let mut logger = logger::Logger::new(&config)?;
    let handle = search::spawn(instance.clone(), initial, search_config)?;
    let result = handle.wait(|event| -> Result<(), Box<dyn Error>> {
        match event {
            search::SearchEvent::Started { cost, penalties } => {
                if config.verbose {
                    eprintln!(
                        "Initial solution: {:.2} (travel time {:.2}), alpha {} beta {} gamma {}",
                        cost.total, cost.travel_time, penalties.alpha, penalties.beta, penalties.gamma,
                    );
                }
            }
            search::SearchEvent::NewBest { iteration, cost } => {
                if config.verbose {
                    eprintln!("Iteration #{iteration} - new best solution {:.2}", cost.total);
                }
            }
            search::SearchEvent::NewFeasible { iteration, cost } => {
                if config.verbose {
                    eprintln!("Iteration #{iteration} - new feasible solution {:.2}", cost.travel_time);
                }
            }
            search::SearchEvent::IterationCompleted(report) => {
                logger.log(report)?;
                if config.verbose {
                    eprint!(
                        "Iteration #{} {:.2}/{:.2}, alpha {:.3} beta {:.3} gamma {:.3}     \r",
                        report.iteration,
                        report.cost.total,
                        report.cost.travel_time,
                        report.penalties.alpha,
                        report.penalties.beta,
                        report.penalties.gamma,
                    );
                }
            }
            search::SearchEvent::Stopped(_) => {
                if config.verbose {
                    eprintln!();
                }
            }
        }

        Ok(())
    })?;

    logger.finalize(&result, &config, seed)?;

    let reported = result.reported();
    eprintln!(
        "{}",
        format!(
            "Result = {:.2} with {} routes (best {:.2} at #{}, feasible {:.2})",
            reported.solution.cost.travel_time,
            reported.solution.routes_used(),
            result.best.total(),
            result.best.iteration,
            result.feasible_cost(),
        )
        .red()
    );
    reported.solution.verify(&instance)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let arguments = cli::Arguments::parse();
    eprintln!("Received {arguments:?}");

    match arguments.command {
        cli::Commands::Evaluate {
            problem,
            solution,
            distance,
        } => _evaluate(&problem, &solution, distance),
        command => _run(config::Config::from_command(command)?),
    }
}

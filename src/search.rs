use std::cell::Cell;
use std::error::Error;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::{fmt, io};

use serde::Serialize;

use crate::config::SearchConfig;
use crate::cost::Cost;
use crate::instance::Instance;
use crate::neighborhoods::{self, Selection};
use crate::penalty::Penalties;
use crate::solutions::Solution;
use crate::tabu::TabuMemory;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SearchState {
    Idle,
    Started,
    Iterating,
    Stopped,
}

/// Independent copy of a solution taken when it was recorded.
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub iteration: usize,
    pub solution: Solution,
}

impl Snapshot {
    fn _take(solution: &Solution, iteration: usize) -> Self {
        Self {
            iteration,
            solution: solution.clone(),
        }
    }

    pub fn total(&self) -> f64 {
        self.solution.cost.total
    }
}

#[derive(Clone, Debug)]
pub struct IterationReport {
    pub iteration: usize,
    /// Cost of the current solution, weighted with the updated penalties.
    pub cost: Cost,
    pub penalties: Penalties,
    pub selection: Option<Selection>,
    /// Times the moved customer has left its source route, this move included.
    pub attempts: u32,
    /// Route sequences after the iteration, when the search was asked to report them.
    pub routes: Option<Vec<Vec<Vec<usize>>>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchResult {
    pub best: Snapshot,
    pub feasible: Option<Snapshot>,
    pub iterations: usize,
    pub tabu_tenure: usize,
}

impl SearchResult {
    pub fn feasible_cost(&self) -> f64 {
        self.feasible.as_ref().map_or(f64::INFINITY, Snapshot::total)
    }

    /// The best feasible solution if one was found, the best solution otherwise.
    pub fn reported(&self) -> &Snapshot {
        self.feasible.as_ref().unwrap_or(&self.best)
    }
}

#[derive(Clone, Debug)]
pub enum SearchEvent {
    Started { cost: Cost, penalties: Penalties },
    NewBest { iteration: usize, cost: Cost },
    NewFeasible { iteration: usize, cost: Cost },
    IterationCompleted(IterationReport),
    Stopped(Box<SearchResult>),
}

pub struct TabuSearch<'a> {
    instance: &'a Instance,
    config: SearchConfig,
    current: Solution,
    tabu: TabuMemory,
    state: SearchState,
    iteration: usize,
    best: Snapshot,
    feasible: Option<Snapshot>,
}

impl<'a> TabuSearch<'a> {
    /// Prepare a search from `initial`, whose penalty weights are reset to 1.
    pub fn new(instance: &'a Instance, mut initial: Solution, config: SearchConfig) -> Self {
        initial.penalties = Penalties::new(config.penalties);
        initial.refresh_cost();

        let tenure = config.tenure(instance.customers_count());
        let tabu = TabuMemory::new(
            instance.customers_count(),
            instance.depots_count(),
            instance.vehicles_count(),
            tenure,
        );

        let best = Snapshot::_take(&initial, 0);
        Self {
            instance,
            config,
            current: initial,
            tabu,
            state: SearchState::Idle,
            iteration: 0,
            best,
            feasible: None,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> SearchState {
        self.state
    }

    #[cfg(test)]
    pub fn current(&self) -> &Solution {
        &self.current
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn start<F>(&mut self, listener: &mut F)
    where
        F: FnMut(SearchEvent),
    {
        debug_assert_eq!(self.state, SearchState::Idle);

        self.best = Snapshot::_take(&self.current, 0);
        self.feasible = self.current.is_feasible().then(|| Snapshot::_take(&self.current, 0));
        self.state = SearchState::Started;

        listener(SearchEvent::Started {
            cost: self.current.cost,
            penalties: self.current.penalties,
        });
        if self.feasible.is_some() {
            listener(SearchEvent::NewFeasible {
                iteration: 0,
                cost: self.current.cost,
            });
        }
    }

    /// Apply the best admissible relocation and update the memories.
    pub fn step<F>(&mut self, listener: &mut F)
    where
        F: FnMut(SearchEvent),
    {
        if self.state == SearchState::Idle {
            self.start(listener);
        }
        self.state = SearchState::Iterating;
        self.iteration += 1;
        let iteration = self.iteration;

        let candidates = neighborhoods::relocations(self.instance, &self.current);
        let selection = neighborhoods::select(&candidates, &self.tabu, iteration, self.best.total());
        let mut attempts = 0;
        if let Some(selection) = &selection {
            let mv = &selection.candidate.mv;
            neighborhoods::apply(self.instance, &mut self.current, mv);
            self.tabu.record(mv, iteration);
            attempts = self.tabu.attempts(mv.customer, mv.from.depot, mv.from.vehicle);
        }

        if self.current.cost.total < self.best.total() {
            self.best = Snapshot::_take(&self.current, iteration);
            listener(SearchEvent::NewBest {
                iteration,
                cost: self.current.cost,
            });
        }

        let feasible_total = self.feasible.as_ref().map_or(f64::INFINITY, Snapshot::total);
        if self.current.is_feasible() && self.current.cost.total < feasible_total - self.config.precision {
            self.feasible = Some(Snapshot::_take(&self.current, iteration));
            listener(SearchEvent::NewFeasible {
                iteration,
                cost: self.current.cost,
            });
        }

        let cost = self.current.cost;
        self.current.penalties.update(&cost);
        self.current.refresh_cost();

        listener(SearchEvent::IterationCompleted(IterationReport {
            iteration,
            cost: self.current.cost,
            penalties: self.current.penalties,
            selection,
            attempts,
            routes: self.config.report_routes.then(|| self.current.sequences()),
        }));
    }

    pub fn stop<F>(mut self, listener: &mut F) -> SearchResult
    where
        F: FnMut(SearchEvent),
    {
        self.state = SearchState::Stopped;
        let result = SearchResult {
            iterations: self.iteration,
            tabu_tenure: self.tabu.tenure(),
            best: self.best,
            feasible: self.feasible,
        };

        listener(SearchEvent::Stopped(Box::new(result.clone())));
        result
    }

    /// Run the whole iteration budget.
    pub fn run<F>(mut self, mut listener: F) -> SearchResult
    where
        F: FnMut(SearchEvent),
    {
        self.start(&mut listener);
        while self.iteration < self.config.iterations {
            self.step(&mut listener);
        }

        self.stop(&mut listener)
    }
}

#[derive(Debug)]
pub enum SearchError {
    /// The worker went away without reporting a result.
    Disconnected,
    Panicked,
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Search worker stopped without reporting a result"),
            Self::Panicked => write!(f, "Search worker panicked"),
        }
    }
}

impl Error for SearchError {}

/// Driver side of a search running on its own thread.
pub struct SearchHandle {
    receiver: Receiver<SearchEvent>,
    worker: JoinHandle<()>,
}

pub fn spawn(instance: Arc<Instance>, initial: Solution, config: SearchConfig) -> io::Result<SearchHandle> {
    let (sender, receiver) = mpsc::channel();
    let worker = thread::Builder::new()
        .name("tabu-search".to_string())
        .spawn(move || {
            let hung_up = Cell::new(false);
            let mut listener = |event: SearchEvent| {
                if sender.send(event).is_err() {
                    hung_up.set(true);
                }
            };

            let mut search = TabuSearch::new(&instance, initial, config);
            search.start(&mut listener);
            while search.iteration() < config.iterations && !hung_up.get() {
                search.step(&mut listener);
            }
            search.stop(&mut listener);
        })?;

    Ok(SearchHandle { receiver, worker })
}

impl SearchHandle {
    /// Feed every event to `on_event` until the search stops, then hand over its result.
    ///
    /// An error from `on_event` hangs up on the worker, which stops after its current
    /// iteration, and is returned once the worker has been joined.
    pub fn wait<E, F>(self, mut on_event: F) -> Result<SearchResult, E>
    where
        E: From<SearchError>,
        F: FnMut(&SearchEvent) -> Result<(), E>,
    {
        let Self { receiver, worker } = self;
        let mut outcome = Err(E::from(SearchError::Disconnected));
        for event in receiver.iter() {
            if let Err(e) = on_event(&event) {
                outcome = Err(e);
                break;
            }
            if let SearchEvent::Stopped(result) = event {
                outcome = Ok(*result);
                break;
            }
        }

        drop(receiver);
        worker.join().map_err(|_| SearchError::Panicked)?;
        outcome
    }
}

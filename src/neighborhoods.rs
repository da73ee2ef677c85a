use std::cmp::Ordering;
use std::fmt::{self, Display};

use serde::Serialize;

use crate::cost::Cost;
use crate::instance::Instance;
use crate::penalty::Penalties;
use crate::solutions::Solution;
use crate::tabu::TabuMemory;

/// A stop of the route matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Slot {
    pub route: usize,
    pub depot: usize,
    pub vehicle: usize,
    pub position: usize,
}

/// Relocation of one customer from its current stop to a stop of another route.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Move {
    pub customer: usize,
    pub from: Slot,
    pub to: Slot,
}

impl Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {})[{}] -> ({}, {})[{}]",
            self.customer,
            self.from.depot,
            self.from.vehicle,
            self.from.position,
            self.to.depot,
            self.to.vehicle,
            self.to.position
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub mv: Move,
    /// Change of the weighted total if the move is applied.
    pub score: f64,
    /// Weighted total of the solution after the move.
    pub total: f64,
}

impl Candidate {
    fn _cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then(self.mv.from.route.cmp(&other.mv.from.route))
            .then(self.mv.customer.cmp(&other.mv.customer))
            .then(self.mv.to.route.cmp(&other.mv.to.route))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SelectionKind {
    /// The move is not tabu.
    Admissible,
    /// The move is tabu but leads to a new best-ever solution.
    Aspiration,
    /// Every candidate is tabu and none improves on the best-ever solution.
    Fallback,
}

impl Display for SelectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Admissible => "admissible",
                Self::Aspiration => "aspiration",
                Self::Fallback => "fallback",
            }
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Selection {
    pub candidate: Candidate,
    pub kind: SelectionKind,
}

fn _weighted_delta(penalties: &Penalties, before: &[&Cost; 2], after: &[&Cost; 2]) -> f64 {
    let delta = |field: fn(&Cost) -> f64| field(after[0]) + field(after[1]) - field(before[0]) - field(before[1]);
    delta(|c| c.travel_time)
        + penalties.alpha * delta(|c| c.load_violation)
        + penalties.beta * delta(|c| c.duration_violation)
        + penalties.gamma * delta(|c| c.time_window_violation)
}

/// Score every relocation of a customer into a route other than its own, at the position chosen
/// by the insertion heuristic.
pub fn relocations(instance: &Instance, solution: &Solution) -> Vec<Candidate> {
    let routes = solution.routes.iter().flatten().collect::<Vec<_>>();
    let mut candidates = vec![];

    for source in &routes {
        for position in 0..source.len() {
            let customer = source.customer_at(position);
            let removed = source.schedule_without(instance, position);

            for destination in &routes {
                if destination.index == source.index {
                    continue;
                }

                let at = destination.best_insertion_position(instance, customer);
                let inserted = destination.schedule_with(instance, at, customer);
                let score = _weighted_delta(
                    &solution.penalties,
                    &[source.cost(), destination.cost()],
                    &[&removed.cost, &inserted.cost],
                );

                candidates.push(Candidate {
                    mv: Move {
                        customer,
                        from: Slot {
                            route: source.index,
                            depot: source.depot,
                            vehicle: source.vehicle,
                            position,
                        },
                        to: Slot {
                            route: destination.index,
                            depot: destination.depot,
                            vehicle: destination.vehicle,
                            position: at,
                        },
                    },
                    score,
                    total: solution.cost.total + score,
                });
            }
        }
    }

    candidates
}

/// Best-improvement selection among the candidates that are not tabu or that beat `best_total`.
/// When every candidate is forbidden, the least bad one is taken anyway.
pub fn select(candidates: &[Candidate], tabu: &TabuMemory, iteration: usize, best_total: f64) -> Option<Selection> {
    let mut admissible: Option<Selection> = None;
    let mut fallback: Option<&Candidate> = None;

    for candidate in candidates {
        let kind = if !tabu.is_tabu(&candidate.mv, iteration) {
            Some(SelectionKind::Admissible)
        } else if candidate.total < best_total {
            Some(SelectionKind::Aspiration)
        } else {
            None
        };

        match kind {
            Some(kind) => {
                if admissible.is_none_or(|a| candidate._cmp(&a.candidate).is_lt()) {
                    admissible = Some(Selection {
                        candidate: *candidate,
                        kind,
                    });
                }
            }
            None => {
                if fallback.is_none_or(|f| candidate._cmp(f).is_lt()) {
                    fallback = Some(candidate);
                }
            }
        }
    }

    admissible.or_else(|| {
        fallback.map(|c| Selection {
            candidate: *c,
            kind: SelectionKind::Fallback,
        })
    })
}

/// Relocate the customer and refresh the solution cost with its current penalties.
pub fn apply(instance: &Instance, solution: &mut Solution, mv: &Move) {
    let customer = solution
        .route_mut(mv.from.depot, mv.from.vehicle)
        .remove(instance, mv.from.position);
    debug_assert_eq!(customer, mv.customer);

    solution
        .route_mut(mv.to.depot, mv.to.vehicle)
        .insert(instance, mv.to.position, customer);
    solution.refresh_cost();
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::instance::fixtures::two_depots;

    fn _solution(seed: u64) -> (Instance, Solution) {
        let instance = two_depots();
        let penalties = Penalties {
            alpha: 3.0,
            beta: 0.5,
            gamma: 2.0,
            ..Penalties::default()
        };
        let solution = Solution::initialize(&instance, &mut StdRng::seed_from_u64(seed), None, penalties);
        (instance, solution)
    }

    fn _candidate(customer: usize, from: usize, to: usize, score: f64) -> Candidate {
        let slot = |route: usize| Slot {
            route,
            depot: route / 3,
            vehicle: route % 3,
            position: 0,
        };
        Candidate {
            mv: Move {
                customer,
                from: slot(from),
                to: slot(to),
            },
            score,
            total: 100.0 + score,
        }
    }

    #[test]
    fn every_customer_targets_every_other_route() {
        let (instance, solution) = _solution(1);
        let candidates = relocations(&instance, &solution);

        assert_eq!(
            candidates.len(),
            instance.customers_count() * (instance.routes_count() - 1)
        );
        assert!(candidates.iter().all(|c| c.mv.from.route != c.mv.to.route));
    }

    #[test]
    fn scores_match_applied_moves() {
        for seed in 0..5 {
            let (instance, solution) = _solution(seed);
            for candidate in relocations(&instance, &solution) {
                let mut moved = solution.clone();
                apply(&instance, &mut moved, &candidate.mv);

                assert!((moved.cost.total - candidate.total).abs() < 1e-6);
                assert!((moved.cost.total - solution.cost.total - candidate.score).abs() < 1e-6);
                moved.verify(&instance).unwrap();
            }
        }
    }

    #[test]
    fn picks_lowest_score_with_deterministic_ties() {
        let tabu = TabuMemory::new(10, 2, 3, 5);
        let candidates = [
            _candidate(4, 2, 0, 1.0),
            _candidate(3, 2, 5, -2.0),
            _candidate(1, 2, 4, -2.0),
            _candidate(0, 3, 1, -2.0),
            _candidate(1, 2, 3, -2.0),
        ];

        let selection = select(&candidates, &tabu, 1, f64::INFINITY).unwrap();
        assert_eq!(selection.kind, SelectionKind::Admissible);
        assert_eq!(selection.candidate, candidates[4]);
    }

    #[test]
    fn tabu_moves_are_skipped_unless_aspirated() {
        let mut tabu = TabuMemory::new(10, 2, 3, 5);
        let best = _candidate(2, 1, 4, -5.0);
        let other = _candidate(3, 0, 2, -1.0);

        // Customer 2 left route 4 at iteration 1, so moving it back is forbidden.
        tabu.record(&_candidate(2, 4, 1, 0.0).mv, 1);

        let selection = select(&[best, other], &tabu, 2, 90.0).unwrap();
        assert_eq!(selection.candidate, other);
        assert_eq!(selection.kind, SelectionKind::Admissible);

        let selection = select(&[best, other], &tabu, 2, 96.0).unwrap();
        assert_eq!(selection.candidate, best);
        assert_eq!(selection.kind, SelectionKind::Aspiration);
    }

    #[test]
    fn falls_back_to_least_bad_tabu_move() {
        let mut tabu = TabuMemory::new(10, 2, 3, 5);
        let worse = _candidate(2, 1, 4, 7.0);
        let bad = _candidate(3, 0, 2, 4.0);
        tabu.record(&_candidate(2, 4, 1, 0.0).mv, 1);
        tabu.record(&_candidate(3, 2, 0, 0.0).mv, 1);

        let selection = select(&[worse, bad], &tabu, 2, 50.0).unwrap();
        assert_eq!(selection.candidate, bad);
        assert_eq!(selection.kind, SelectionKind::Fallback);
    }

    #[test]
    fn nothing_to_select_without_candidates() {
        let tabu = TabuMemory::new(10, 2, 3, 5);
        assert_eq!(select(&[], &tabu, 1, 0.0), None);
    }
}

use crate::neighborhoods::Move;

/// Recency memory over (customer, depot, vehicle) triples.
///
/// Applying a move stamps the triple the customer left. A later move is tabu while it would
/// put the customer back into a stamped triple less than `tenure` iterations after the stamp.
#[derive(Clone, Debug)]
pub struct TabuMemory {
    tenure: usize,
    depots: usize,
    vehicles: usize,
    stamps: Vec<Option<usize>>,
    attempts: Vec<u32>,
}

impl TabuMemory {
    pub fn new(customers: usize, depots: usize, vehicles: usize, tenure: usize) -> Self {
        let cells = customers * depots * vehicles;
        Self {
            tenure,
            depots,
            vehicles,
            stamps: vec![None; cells],
            attempts: vec![0; cells],
        }
    }

    /// `max(1, round(factor * log10(customers)))`
    pub fn size_derived_tenure(customers: usize, factor: f64) -> usize {
        if customers < 2 {
            return 1;
        }

        let tenure = (factor * (customers as f64).log10()).round();
        if tenure < 1.0 { 1 } else { tenure as usize }
    }

    fn _cell(&self, customer: usize, depot: usize, vehicle: usize) -> usize {
        (customer * self.depots + depot) * self.vehicles + vehicle
    }

    pub fn is_tabu(&self, mv: &Move, iteration: usize) -> bool {
        let cell = self._cell(mv.customer, mv.to.depot, mv.to.vehicle);
        self.stamps[cell].is_some_and(|stamp| iteration.saturating_sub(stamp) < self.tenure)
    }

    pub fn record(&mut self, mv: &Move, iteration: usize) {
        let cell = self._cell(mv.customer, mv.from.depot, mv.from.vehicle);
        self.stamps[cell] = Some(iteration);
        self.attempts[cell] += 1;
    }

    /// How many times the customer has been moved out of the given route.
    pub fn attempts(&self, customer: usize, depot: usize, vehicle: usize) -> u32 {
        self.attempts[self._cell(customer, depot, vehicle)]
    }

    pub fn tenure(&self) -> usize {
        self.tenure
    }
}

use std::ops::AddAssign;

use serde::Serialize;

/// Cost components of a route or of a whole solution.
///
/// `total` is only meaningful for solutions: it is the penalty-weighted sum computed by
/// [`crate::penalty::Penalties::weighted`]. Aggregation through `+=` leaves it untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Cost {
    pub travel_time: f64,
    pub waiting_time: f64,
    pub service_time: f64,
    pub load: f64,
    pub load_violation: f64,
    pub duration_violation: f64,
    pub time_window_violation: f64,
    pub total: f64,
}

impl Cost {
    pub fn is_feasible(&self) -> bool {
        self.load_violation == 0.0 && self.duration_violation == 0.0 && self.time_window_violation == 0.0
    }
}

impl AddAssign<&Self> for Cost {
    fn add_assign(&mut self, other: &Self) {
        self.travel_time += other.travel_time;
        self.waiting_time += other.waiting_time;
        self.service_time += other.service_time;
        self.load += other.load;
        self.load_violation += other.load_violation;
        self.duration_violation += other.duration_violation;
        self.time_window_violation += other.time_window_violation;
    }
}

use serde::Serialize;

use crate::cost::Cost;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PenaltyParameters {
    pub delta: f64,
    pub upper_bound: f64,
    pub reset_value: f64,
}

impl Default for PenaltyParameters {
    fn default() -> Self {
        Self {
            delta: 0.005,
            upper_bound: 1e7,
            reset_value: 0.1,
        }
    }
}

/// Adaptive weights of the load (`alpha`), duration (`beta`) and time window (`gamma`)
/// violations.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Penalties {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    #[serde(skip)]
    pub parameters: PenaltyParameters,
}

impl Penalties {
    pub fn new(parameters: PenaltyParameters) -> Self {
        Self {
            alpha: 1.0,
            beta: 1.0,
            gamma: 1.0,
            parameters,
        }
    }

    pub fn weighted(&self, cost: &Cost) -> f64 {
        cost.travel_time
            + self.alpha * cost.load_violation
            + self.beta * cost.duration_violation
            + self.gamma * cost.time_window_violation
    }

    /// Shrink the weight of each satisfied constraint and grow the others.
    pub fn update(&mut self, cost: &Cost) {
        let parameters = self.parameters;
        Self::_adjust(&mut self.alpha, cost.load_violation, &parameters);
        Self::_adjust(&mut self.beta, cost.duration_violation, &parameters);
        Self::_adjust(&mut self.gamma, cost.time_window_violation, &parameters);
    }

    fn _adjust(weight: &mut f64, violation: f64, parameters: &PenaltyParameters) {
        if violation == 0.0 {
            *weight /= 1.0 + parameters.delta;
        } else {
            *weight *= 1.0 + parameters.delta;
        }

        if *weight > parameters.upper_bound {
            *weight = parameters.reset_value;
        }
    }
}

impl Default for Penalties {
    fn default() -> Self {
        Self::new(PenaltyParameters::default())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn weighted_total() {
        let penalties = Penalties {
            alpha: 2.0,
            beta: 3.0,
            gamma: 4.0,
            ..Penalties::default()
        };
        let cost = Cost {
            travel_time: 10.0,
            load_violation: 1.0,
            duration_violation: 1.0,
            time_window_violation: 0.5,
            ..Cost::default()
        };
        assert_eq!(penalties.weighted(&cost), 17.0);
    }

    #[test]
    fn satisfied_constraint_shrinks_weight() {
        let mut penalties = Penalties::default();
        let cost = Cost {
            load_violation: 5.0,
            ..Cost::default()
        };
        penalties.update(&cost);

        let step = 1.0 + 0.005;
        assert_eq!(penalties.alpha, step);
        assert_eq!(penalties.beta, 1.0 / step);
        assert_eq!(penalties.gamma, 1.0 / step);
    }

    #[test]
    fn weight_is_reset_above_upper_bound() {
        let mut penalties = Penalties {
            gamma: 9_999_999.0,
            ..Penalties::default()
        };
        let cost = Cost {
            time_window_violation: 1.0,
            ..Cost::default()
        };
        penalties.update(&cost);

        assert_eq!(penalties.gamma, 0.1);
    }

    proptest! {
        #[test]
        fn weights_stay_bounded(violations in prop::collection::vec((0u8..3, 0u8..3, 0u8..3), 1..2000)) {
            let mut penalties = Penalties::default();
            for (load, duration, time_window) in violations {
                let cost = Cost {
                    load_violation: f64::from(load),
                    duration_violation: f64::from(duration),
                    time_window_violation: f64::from(time_window),
                    ..Cost::default()
                };
                penalties.update(&cost);

                for weight in [penalties.alpha, penalties.beta, penalties.gamma] {
                    prop_assert!(weight > 0.0);
                    prop_assert!(weight <= penalties.parameters.upper_bound);
                }
            }
        }
    }
}

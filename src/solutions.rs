use rand::Rng;
use serde::{Deserialize, Serialize, Serializer};

use crate::cost::Cost;
use crate::errors::InputError;
use crate::instance::Instance;
use crate::penalty::Penalties;
use crate::routes::Route;

fn _serialize_routes<S>(routes: &[Vec<Route>], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(routes.iter().map(|r| {
        r.iter()
            .map(|r| r.customers().collect::<Vec<_>>())
            .collect::<Vec<Vec<usize>>>()
    }))
}

/// Customer sequences indexed by depot then vehicle, as stored on disk.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StoredSolution {
    pub routes: Vec<Vec<Vec<usize>>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Solution {
    #[serde(serialize_with = "_serialize_routes")]
    pub routes: Vec<Vec<Route>>,
    pub cost: Cost,
    pub penalties: Penalties,
}

impl Solution {
    /// A solution where every vehicle stays at its depot.
    pub fn empty(instance: &Instance, penalties: Penalties) -> Self {
        let routes = (0..instance.depots_count())
            .map(|d| (0..instance.vehicles_count()).map(|v| Route::new(instance, d, v)).collect())
            .collect();
        let mut solution = Self {
            routes,
            cost: Cost::default(),
            penalties,
        };
        solution.refresh_cost();
        solution
    }

    /// Rebuild a solution from customer sequences. Depots may list fewer routes than there are
    /// vehicles; the remaining vehicles stay empty.
    pub fn from_sequences(
        instance: &Instance,
        sequences: &[Vec<Vec<usize>>],
        penalties: Penalties,
    ) -> Result<Self, InputError> {
        if sequences.len() != instance.depots_count() {
            return Err(InputError::Solution(format!(
                "expected routes for {} depots, got {}",
                instance.depots_count(),
                sequences.len()
            )));
        }

        let mut solution = Self::empty(instance, penalties);
        for (d, depot_routes) in sequences.iter().enumerate() {
            if depot_routes.len() > instance.vehicles_count() {
                return Err(InputError::Solution(format!(
                    "depot {d} has {} routes but only {} vehicles",
                    depot_routes.len(),
                    instance.vehicles_count()
                )));
            }

            for (v, customers) in depot_routes.iter().enumerate() {
                if let Some(c) = customers.iter().find(|&&c| c >= instance.customers_count()) {
                    return Err(InputError::Solution(format!("unknown customer {c}")));
                }
                solution.routes[d][v] = Route::with_customers(instance, d, v, customers);
            }
        }

        solution.refresh_cost();
        solution.verify(instance)?;
        Ok(solution)
    }

    /// Greedy construction: each depot's customers are taken cyclically from a start index and
    /// placed on the first vehicle that still has room for them, the last vehicle taking the rest.
    pub fn initialize<R>(instance: &Instance, rng: &mut R, start_customer: Option<usize>, penalties: Penalties) -> Self
    where
        R: Rng,
    {
        let mut solution = Self::empty(instance, penalties);
        let mut start = start_customer;
        let last = instance.vehicles_count() - 1;

        for d in 0..instance.depots_count() {
            let assigned = &instance.depot(d).assigned_customers;
            if assigned.is_empty() {
                continue;
            }

            let start = *start.get_or_insert_with(|| rng.random_range(0..assigned.len())) % assigned.len();
            for j in start..start + assigned.len() {
                let customer = assigned[j % assigned.len()];
                let data = instance.customer(customer);

                let vehicle = (0..last)
                    .find(|&v| {
                        let route = &solution.routes[d][v];
                        let limits = route.limits();
                        data.demand + route.cost().load <= limits.capacity
                            && data.service_duration + route.duration() <= limits.duration
                    })
                    .unwrap_or(last);

                let route = &mut solution.routes[d][vehicle];
                let position = route.best_insertion_position(instance, customer);
                route.insert(instance, position, customer);
            }
        }

        solution.refresh_cost();
        solution
    }

    /// Aggregate the route costs and weigh them with the current penalties.
    pub fn refresh_cost(&mut self) {
        let mut cost = Cost::default();
        for route in self.routes.iter().flatten() {
            cost += route.cost();
        }
        cost.total = self.penalties.weighted(&cost);
        self.cost = cost;
    }

    pub fn is_feasible(&self) -> bool {
        self.cost.is_feasible()
    }

    pub fn route(&self, depot: usize, vehicle: usize) -> &Route {
        &self.routes[depot][vehicle]
    }

    pub fn route_mut(&mut self, depot: usize, vehicle: usize) -> &mut Route {
        &mut self.routes[depot][vehicle]
    }

    /// Number of routes serving at least one customer.
    pub fn routes_used(&self) -> usize {
        self.routes.iter().flatten().filter(|r| !r.is_empty()).count()
    }

    pub fn sequences(&self) -> Vec<Vec<Vec<usize>>> {
        self.routes
            .iter()
            .map(|routes| routes.iter().map(|r| r.customers().collect()).collect())
            .collect()
    }

    /// Check that every customer is served exactly once and that the cached costs are up to date.
    pub fn verify(&self, instance: &Instance) -> Result<(), InputError> {
        let mut served = vec![false; instance.customers_count()];

        for (d, routes) in self.routes.iter().enumerate() {
            for (v, route) in routes.iter().enumerate() {
                if route.depot != d || route.vehicle != v {
                    return Err(InputError::Solution(format!(
                        "route of depot {} vehicle {} is stored at depot {d} vehicle {v}",
                        route.depot, route.vehicle
                    )));
                }

                for c in route.customers() {
                    match served.get_mut(c) {
                        None => return Err(InputError::Solution(format!("unknown customer {c}"))),
                        Some(true) => return Err(InputError::Solution(format!("customer {c} is served more than once"))),
                        Some(flag) => *flag = true,
                    }
                }

                let mut fresh = route.clone();
                fresh.evaluate(instance);
                if fresh.cost() != route.cost() {
                    return Err(InputError::Solution(format!(
                        "route {route} of depot {d} vehicle {v} has a stale cost"
                    )));
                }
            }
        }

        if let Some(c) = served.iter().position(|&s| !s) {
            return Err(InputError::Solution(format!("customer {c} is not served")));
        }

        let mut expected = self.clone();
        expected.refresh_cost();
        if expected.cost != self.cost {
            return Err(InputError::Solution("solution cost does not match its routes".to_string()));
        }

        Ok(())
    }
}

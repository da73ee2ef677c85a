use std::fmt;

use serde::Serialize;

use crate::cost::Cost;
use crate::instance::{Instance, Vehicle};

/// Timings of one stop, written during route evaluation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Visit {
    pub customer: usize,
    pub arrival_time: f64,
    pub waiting_time: f64,
    pub time_window_violation: f64,
}

/// Outcome of walking a customer sequence from its depot and back.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Schedule {
    pub cost: Cost,
    pub return_to_depot_time: f64,
    pub depot_tw_violation: f64,
}

/// Walk `customers` starting from `depot` at time 0, reporting each stop to `on_visit`.
///
/// An empty sequence yields an all-zero schedule: the vehicle never leaves the depot.
pub fn schedule<I, F>(instance: &Instance, depot: usize, limits: Vehicle, customers: I, mut on_visit: F) -> Schedule
where
    I: IntoIterator<Item = usize>,
    F: FnMut(Visit),
{
    let depot_node = instance.depot_node(depot);
    let mut cost = Cost::default();
    let mut time = 0.0;
    let mut previous = depot_node;

    for customer in customers {
        let data = instance.customer(customer);
        let travel = instance.distance(previous, customer);
        cost.travel_time += travel;
        time += travel;

        let arrival_time = time;
        let waiting_time = f64::max(0.0, data.start_tw - time);
        cost.waiting_time += waiting_time;
        time = f64::max(data.start_tw, time);

        let time_window_violation = f64::max(0.0, time - data.end_tw);
        cost.time_window_violation += time_window_violation;

        time += data.service_duration;
        cost.service_time += data.service_duration;
        cost.load += data.demand;

        on_visit(Visit {
            customer,
            arrival_time,
            waiting_time,
            time_window_violation,
        });
        previous = customer;
    }

    if previous == depot_node {
        return Schedule::default();
    }

    let back = instance.distance(previous, depot_node);
    cost.travel_time += back;
    time += back;

    let depot_tw_violation = f64::max(0.0, time - instance.depot(depot).end_tw);
    cost.time_window_violation += depot_tw_violation;
    cost.load_violation = f64::max(0.0, cost.load - limits.capacity);
    cost.duration_violation = f64::max(0.0, time - limits.duration);

    Schedule {
        cost,
        return_to_depot_time: time,
        depot_tw_violation,
    }
}

/// The ordered stops of one (depot, vehicle) slot with its cached evaluation.
///
/// Every mutating method re-evaluates the route, so [`Route::cost`] always matches
/// the current sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    /// Position of the slot in the flattened `depot * vehicles + vehicle` order.
    pub index: usize,
    pub depot: usize,
    pub vehicle: usize,
    limits: Vehicle,
    visits: Vec<Visit>,
    schedule: Schedule,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.customers().collect::<Vec<_>>())
    }
}

impl Route {
    pub fn new(instance: &Instance, depot: usize, vehicle: usize) -> Self {
        Self {
            index: depot * instance.vehicles_count() + vehicle,
            depot,
            vehicle,
            limits: instance.vehicle(depot, vehicle),
            visits: vec![],
            schedule: Schedule::default(),
        }
    }

    pub fn with_customers(instance: &Instance, depot: usize, vehicle: usize, customers: &[usize]) -> Self {
        let mut route = Self::new(instance, depot, vehicle);
        route.visits = customers
            .iter()
            .map(|&customer| Visit {
                customer,
                ..Visit::default()
            })
            .collect();
        route.evaluate(instance);
        route
    }

    /// Recompute the cost and the stop timings from scratch.
    pub fn evaluate(&mut self, instance: &Instance) {
        let customers = self.visits.iter().map(|v| v.customer).collect::<Vec<_>>();
        self.visits.clear();

        let visits = &mut self.visits;
        self.schedule = schedule(instance, self.depot, self.limits, customers, |visit| visits.push(visit));
    }

    pub fn insert(&mut self, instance: &Instance, position: usize, customer: usize) {
        self.visits.insert(
            position,
            Visit {
                customer,
                ..Visit::default()
            },
        );
        self.evaluate(instance);
    }

    pub fn remove(&mut self, instance: &Instance, position: usize) -> usize {
        let removed = self.visits.remove(position);
        self.evaluate(instance);
        removed.customer
    }

    /// Evaluate this route as if the stop at `position` were removed.
    pub fn schedule_without(&self, instance: &Instance, position: usize) -> Schedule {
        let customers = self
            .customers()
            .enumerate()
            .filter_map(|(i, c)| (i != position).then_some(c));
        schedule(instance, self.depot, self.limits, customers, |_| ())
    }

    /// Evaluate this route as if `customer` were inserted at `position`.
    pub fn schedule_with(&self, instance: &Instance, position: usize, customer: usize) -> Schedule {
        let customers = self
            .customers()
            .take(position)
            .chain(Some(customer))
            .chain(self.customers().skip(position));
        schedule(instance, self.depot, self.limits, customers, |_| ())
    }

    /// Cheapest position for `customer` among those keeping stops ordered by the end of their
    /// time windows, scored by the detour in travel time. Falls back to the front of the route.
    pub fn best_insertion_position(&self, instance: &Instance, customer: usize) -> usize {
        if self.visits.is_empty() {
            return 0;
        }

        let depot_node = instance.depot_node(self.depot);
        let end_tw = |c: usize| instance.customer(c).end_tw;
        let detour = |before: usize, after: usize| {
            instance.distance(before, customer) + instance.distance(customer, after) - instance.distance(before, after)
        };

        let target = end_tw(customer);
        let first = self.visits[0].customer;
        let last = self.visits[self.visits.len() - 1].customer;

        let mut min_cost = f64::MAX;
        let mut position = 0;
        let mut consider = |cost: f64, at: usize| {
            if min_cost > cost {
                min_cost = cost;
                position = at;
            }
        };

        if target <= end_tw(first) {
            consider(detour(depot_node, first), 0);
        }
        if end_tw(last) <= target {
            consider(detour(last, depot_node), self.visits.len());
        }
        for (i, pair) in self.visits.windows(2).enumerate() {
            let (before, after) = (pair[0].customer, pair[1].customer);
            if end_tw(before) <= target && target <= end_tw(after) {
                consider(detour(before, after), i + 1);
            }
        }

        position
    }

    pub fn customers(&self) -> impl Iterator<Item = usize> + '_ {
        self.visits.iter().map(|v| v.customer)
    }

    pub fn customer_at(&self, position: usize) -> usize {
        self.visits[position].customer
    }

    pub fn visits(&self) -> &[Visit] {
        &self.visits
    }

    pub fn len(&self) -> usize {
        self.visits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }

    pub fn cost(&self) -> &Cost {
        &self.schedule.cost
    }

    pub fn limits(&self) -> Vehicle {
        self.limits
    }

    pub fn return_to_depot_time(&self) -> f64 {
        self.schedule.return_to_depot_time
    }

    pub fn depot_tw_violation(&self) -> f64 {
        self.schedule.depot_tw_violation
    }

    pub fn duration(&self) -> f64 {
        self.schedule.return_to_depot_time
    }
}

#[cfg(test)]
pub mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::cli::DistanceType;
    use crate::instance::fixtures::{customer, depot, two_depots};
    use crate::penalty::Penalties;

    /// Customers on the x axis, depot at the origin, Manhattan distances.
    /// Each entry is `(x, demand, service, (start_tw, end_tw))`.
    pub fn line(stops: &[(f64, f64, f64, (f64, f64))], capacity: f64, duration: f64) -> Instance {
        let customers = stops
            .iter()
            .enumerate()
            .map(|(i, &(x, demand, service, tw))| customer(i, x, 0.0, demand, service, tw))
            .collect();
        Instance::from_coordinates(
            customers,
            vec![depot(0, 0.0, 0.0, 1000.0)],
            1,
            vec![Vehicle { capacity, duration }],
            DistanceType::Manhattan,
        )
        .unwrap()
    }

    #[test]
    fn evaluates_travel_of_sequential_visits() {
        let customers = vec![
            customer(0, 3.0, 4.0, 5.0, 0.0, (0.0, 10.0)),
            customer(1, 6.0, 8.0, 5.0, 0.0, (12.0, 40.0)),
        ];
        let instance = Instance::from_coordinates(
            customers,
            vec![depot(0, 0.0, 0.0, 1000.0)],
            1,
            vec![Vehicle {
                capacity: 100.0,
                duration: 1000.0,
            }],
            DistanceType::Manhattan,
        )
        .unwrap();

        let route = Route::with_customers(&instance, 0, 0, &[0, 1]);
        let cost = route.cost();

        assert_eq!(cost.travel_time, 7.0 + 7.0 + 14.0);
        assert_eq!(cost.waiting_time, 0.0);
        assert_eq!(cost.time_window_violation, 0.0);
        assert!(cost.is_feasible());
        assert_eq!(Penalties::default().weighted(cost), 28.0);
        assert_eq!(
            route.visits().iter().map(|v| v.arrival_time).collect::<Vec<_>>(),
            [7.0, 14.0]
        );
        assert_eq!(route.return_to_depot_time(), 28.0);
    }

    #[test]
    fn overloaded_route() {
        let instance = line(&[(2.0, 30.0, 0.0, (0.0, 100.0))], 20.0, 1000.0);
        let route = Route::with_customers(&instance, 0, 0, &[0]);
        let penalties = Penalties::default();

        assert_eq!(route.cost().load, 30.0);
        assert_eq!(route.cost().load_violation, 10.0);
        assert_eq!(
            penalties.weighted(route.cost()),
            route.cost().travel_time + penalties.alpha * 10.0
        );
    }

    #[test]
    fn waiting_and_late_arrivals() {
        let instance = line(
            &[(4.0, 1.0, 1.0, (10.0, 50.0)), (6.0, 1.0, 0.0, (0.0, 8.0))],
            100.0,
            1000.0,
        );
        let route = Route::with_customers(&instance, 0, 0, &[0, 1]);

        let visits = route.visits();
        assert_eq!(visits[0].arrival_time, 4.0);
        assert_eq!(visits[0].waiting_time, 6.0);
        assert_eq!(visits[0].time_window_violation, 0.0);
        // Service starts at 10, ends at 11, arrival at 13.
        assert_eq!(visits[1].arrival_time, 13.0);
        assert_eq!(visits[1].time_window_violation, 5.0);

        assert_eq!(route.cost().waiting_time, 6.0);
        assert_eq!(route.cost().service_time, 1.0);
        assert_eq!(route.cost().time_window_violation, 5.0);
        assert_eq!(route.return_to_depot_time(), 19.0);
        assert_eq!(route.depot_tw_violation(), 0.0);
    }

    #[test]
    fn duration_and_depot_violations() {
        let customers = vec![customer(0, 10.0, 0.0, 1.0, 5.0, (0.0, 100.0))];
        let instance = Instance::from_coordinates(
            customers,
            vec![depot(0, 0.0, 0.0, 20.0)],
            1,
            vec![Vehicle {
                capacity: 10.0,
                duration: 15.0,
            }],
            DistanceType::Manhattan,
        )
        .unwrap();
        let route = Route::with_customers(&instance, 0, 0, &[0]);

        assert_eq!(route.duration(), 25.0);
        assert_eq!(route.cost().duration_violation, 10.0);
        assert_eq!(route.depot_tw_violation(), 5.0);
        assert_eq!(route.cost().time_window_violation, 5.0);
    }

    #[test]
    fn empty_route_costs_nothing() {
        let instance = two_depots();
        let route = Route::new(&instance, 1, 2);

        assert_eq!(route.index, 5);
        assert_eq!(*route.cost(), Cost::default());
        assert_eq!(route.duration(), 0.0);
    }

    #[test]
    fn insert_and_remove_reevaluate() {
        let instance = line(
            &[(2.0, 1.0, 0.0, (0.0, 100.0)), (5.0, 1.0, 0.0, (0.0, 100.0))],
            100.0,
            1000.0,
        );
        let mut route = Route::new(&instance, 0, 0);
        route.insert(&instance, 0, 1);
        assert_eq!(route.cost().travel_time, 10.0);

        route.insert(&instance, 0, 0);
        assert_eq!(route.customers().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(route.cost().load, 2.0);

        assert_eq!(route.remove(&instance, 1), 1);
        assert_eq!(route.cost().travel_time, 4.0);
    }

    #[test]
    fn insertion_follows_time_window_order() {
        let instance = line(
            &[
                (2.0, 1.0, 0.0, (0.0, 10.0)),
                (8.0, 1.0, 0.0, (0.0, 30.0)),
                (5.0, 1.0, 0.0, (0.0, 20.0)),
                (1.0, 1.0, 0.0, (0.0, 5.0)),
                (9.0, 1.0, 0.0, (0.0, 90.0)),
            ],
            100.0,
            1000.0,
        );
        let route = Route::with_customers(&instance, 0, 0, &[0, 1]);

        assert_eq!(Route::new(&instance, 0, 0).best_insertion_position(&instance, 2), 0);
        assert_eq!(route.best_insertion_position(&instance, 2), 1);
        assert_eq!(route.best_insertion_position(&instance, 3), 0);
        assert_eq!(route.best_insertion_position(&instance, 4), 2);
    }

    #[test]
    fn insertion_prefers_earliest_of_equal_detours() {
        // Both the front and the back of the route are admissible and cost nothing extra.
        let instance = line(
            &[(4.0, 1.0, 0.0, (0.0, 50.0)), (4.0, 1.0, 0.0, (0.0, 50.0))],
            100.0,
            1000.0,
        );
        let route = Route::with_customers(&instance, 0, 0, &[0]);
        assert_eq!(route.best_insertion_position(&instance, 1), 0);
    }

    fn sequences() -> impl Strategy<Value = Vec<usize>> {
        prop::sample::subsequence((0..10).collect::<Vec<_>>(), 0..=10).prop_shuffle()
    }

    proptest! {
        #[test]
        fn evaluation_is_idempotent(customers in sequences(), depot in 0usize..2) {
            let instance = two_depots();
            let mut route = Route::with_customers(&instance, depot, 0, &customers);
            let first = route.clone();
            route.evaluate(&instance);
            prop_assert_eq!(route, first);
        }

        #[test]
        fn what_if_schedules_match_mutations(customers in sequences(), seed in 0usize..100) {
            let instance = two_depots();
            let route = Route::with_customers(&instance, 0, 1, &customers);

            if !route.is_empty() {
                let position = seed % route.len();
                let expected = route.schedule_without(&instance, position);
                let mut removed = route.clone();
                removed.remove(&instance, position);
                prop_assert_eq!(*removed.cost(), expected.cost);
                prop_assert_eq!(removed.duration(), expected.return_to_depot_time);
            }

            if let Some(missing) = (0..10).find(|c| !customers.contains(c)) {
                let position = route.best_insertion_position(&instance, missing);
                let expected = route.schedule_with(&instance, position, missing);
                let mut inserted = route.clone();
                inserted.insert(&instance, position, missing);
                prop_assert_eq!(*inserted.cost(), expected.cost);
                prop_assert_eq!(inserted.depot_tw_violation(), expected.depot_tw_violation);
            }
        }
    }
}

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::cli::DistanceType;
use crate::errors::InputError;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?").expect("valid number pattern"));

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Customer {
    pub number: usize,
    pub x: f64,
    pub y: f64,
    pub demand: f64,
    pub service_duration: f64,
    pub start_tw: f64,
    pub end_tw: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Depot {
    pub number: usize,
    pub x: f64,
    pub y: f64,
    pub start_tw: f64,
    pub end_tw: f64,
    pub assigned_customers: Vec<usize>,
}

/// Ceilings of the vehicles stationed at a depot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Vehicle {
    pub capacity: f64,
    pub duration: f64,
}

/// Static problem data. Customers occupy nodes `0..n` of the distance matrix and depot `d`
/// occupies node `n + d`.
#[derive(Clone, Debug)]
pub struct Instance {
    customers: Vec<Customer>,
    depots: Vec<Depot>,
    vehicles_count: usize,
    vehicles: Vec<Vehicle>,
    distances: Vec<Vec<f64>>,
}

impl Instance {
    pub fn new(
        customers: Vec<Customer>,
        depots: Vec<Depot>,
        vehicles_count: usize,
        vehicles: Vec<Vehicle>,
        distances: Vec<Vec<f64>>,
    ) -> Result<Self, InputError> {
        let instance = Self {
            customers,
            depots,
            vehicles_count,
            vehicles,
            distances,
        };
        instance.validate()?;
        Ok(instance)
    }

    /// Build an instance from coordinates, assigning each customer to its nearest depot.
    pub fn from_coordinates(
        customers: Vec<Customer>,
        mut depots: Vec<Depot>,
        vehicles_count: usize,
        vehicles: Vec<Vehicle>,
        distance: DistanceType,
    ) -> Result<Self, InputError> {
        let x = customers.iter().map(|c| c.x).chain(depots.iter().map(|d| d.x)).collect::<Vec<_>>();
        let y = customers.iter().map(|c| c.y).chain(depots.iter().map(|d| d.y)).collect::<Vec<_>>();
        let distances = distance.matrix(&x, &y);

        for depot in &mut depots {
            depot.assigned_customers.clear();
        }
        if !depots.is_empty() {
            let n = customers.len();
            for customer in 0..n {
                let mut nearest = 0;
                for d in 1..depots.len() {
                    if distances[n + d][customer] < distances[n + nearest][customer] {
                        nearest = d;
                    }
                }
                depots[nearest].assigned_customers.push(customer);
            }
        }

        Self::new(customers, depots, vehicles_count, vehicles, distances)
    }

    pub fn load(path: impl AsRef<Path>, distance: DistanceType) -> Result<Self, InputError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| InputError::io(path.display().to_string(), e))?;
        Self::parse_cordeau(&data, distance)
    }

    /// Parse a problem in Cordeau's MDVRPTW format.
    pub fn parse_cordeau(data: &str, distance: DistanceType) -> Result<Self, InputError> {
        let mut lines = data
            .lines()
            .map(|line| {
                NUMBER
                    .find_iter(line)
                    .map(|m| m.as_str().parse::<f64>())
                    .collect::<Result<Vec<_>, _>>()
            })
            .enumerate()
            .filter(|(_, numbers)| numbers.as_ref().map_or(true, |n| !n.is_empty()));

        let mut next_line = |what: &str| -> Result<(usize, Vec<f64>), InputError> {
            match lines.next() {
                Some((index, Ok(numbers))) => Ok((index + 1, numbers)),
                Some((index, Err(e))) => Err(InputError::Instance(format!("line {}: {e}", index + 1))),
                None => Err(InputError::Instance(format!("unexpected end of file, expected {what}"))),
            }
        };

        let (line, header) = next_line("the header")?;
        if header.len() < 4 {
            return Err(InputError::Instance(format!(
                "line {line}: expected `type vehicles customers depots`"
            )));
        }
        let vehicles_count = _as_count(header[1], line)?;
        let customers_count = _as_count(header[2], line)?;
        let depots_count = _as_count(header[3], line)?;

        let mut vehicles = Vec::with_capacity(depots_count);
        for _ in 0..depots_count {
            let (line, limits) = next_line("a depot limit line")?;
            if limits.len() < 2 {
                return Err(InputError::Instance(format!("line {line}: expected `duration capacity`")));
            }
            vehicles.push(Vehicle {
                capacity: limits[1],
                duration: if limits[0] == 0.0 { f64::INFINITY } else { limits[0] },
            });
        }

        let mut customers = Vec::with_capacity(customers_count);
        for number in 0..customers_count {
            let (line, fields) = next_line("a customer line")?;
            if fields.len() < 9 {
                return Err(InputError::Instance(format!("line {line}: customer line is too short")));
            }
            customers.push(Customer {
                number,
                x: fields[1],
                y: fields[2],
                demand: fields[4],
                service_duration: fields[3],
                start_tw: fields[fields.len() - 2],
                end_tw: fields[fields.len() - 1],
            });
        }

        let mut depots = Vec::with_capacity(depots_count);
        for number in 0..depots_count {
            let (line, fields) = next_line("a depot line")?;
            if fields.len() < 5 {
                return Err(InputError::Instance(format!("line {line}: depot line is too short")));
            }
            depots.push(Depot {
                number,
                x: fields[1],
                y: fields[2],
                start_tw: fields[fields.len() - 2],
                end_tw: fields[fields.len() - 1],
                assigned_customers: vec![],
            });
        }

        Self::from_coordinates(customers, depots, vehicles_count, vehicles, distance)
    }

    fn validate(&self) -> Result<(), InputError> {
        fn _invalid(message: String) -> Result<(), InputError> {
            Err(InputError::Instance(message))
        }

        fn _non_negative(value: f64) -> bool {
            value.is_finite() && value >= 0.0
        }

        if self.depots.is_empty() {
            return _invalid("at least one depot is required".to_string());
        }
        if self.vehicles_count == 0 {
            return _invalid("at least one vehicle per depot is required".to_string());
        }
        if self.vehicles.len() != self.depots.len() {
            return _invalid(format!(
                "{} vehicle definitions for {} depots",
                self.vehicles.len(),
                self.depots.len()
            ));
        }

        for (d, vehicle) in self.vehicles.iter().enumerate() {
            if !_non_negative(vehicle.capacity) {
                return _invalid(format!("depot {d} has capacity {}", vehicle.capacity));
            }
            if vehicle.duration.is_nan() || vehicle.duration < 0.0 {
                return _invalid(format!("depot {d} has duration ceiling {}", vehicle.duration));
            }
        }

        for (i, customer) in self.customers.iter().enumerate() {
            if customer.number != i {
                return _invalid(format!("customer at index {i} is numbered {}", customer.number));
            }
            if !_non_negative(customer.demand) || !_non_negative(customer.service_duration) {
                return _invalid(format!("customer {i} has a negative demand or service duration"));
            }
            if !(customer.start_tw <= customer.end_tw) {
                return _invalid(format!(
                    "customer {i} has time window [{}, {}]",
                    customer.start_tw, customer.end_tw
                ));
            }
        }

        for (d, depot) in self.depots.iter().enumerate() {
            if depot.number != d {
                return _invalid(format!("depot at index {d} is numbered {}", depot.number));
            }
            if !(depot.start_tw <= depot.end_tw) {
                return _invalid(format!("depot {d} has time window [{}, {}]", depot.start_tw, depot.end_tw));
            }
        }

        let nodes = self.customers.len() + self.depots.len();
        if self.distances.len() != nodes || self.distances.iter().any(|row| row.len() != nodes) {
            return _invalid(format!("distance matrix must be {nodes}x{nodes}"));
        }
        if self.distances.iter().flatten().any(|&d| !_non_negative(d)) {
            return _invalid("distance matrix contains negative or non-finite entries".to_string());
        }

        let mut assigned = vec![false; self.customers.len()];
        for depot in &self.depots {
            for &customer in &depot.assigned_customers {
                match assigned.get_mut(customer) {
                    None => return _invalid(format!("depot {} is assigned unknown customer {customer}", depot.number)),
                    Some(true) => return _invalid(format!("customer {customer} is assigned to several depots")),
                    Some(flag) => *flag = true,
                }
            }
        }
        if let Some(customer) = assigned.iter().position(|&a| !a) {
            return _invalid(format!("customer {customer} is not assigned to any depot"));
        }

        for customer in &self.customers {
            let reachable = (0..self.depots.len())
                .any(|d| self.distance(self.depot_node(d), customer.number) <= customer.end_tw);
            if !reachable {
                return _invalid(format!(
                    "customer {} cannot be reached from any depot before its time window closes at {}",
                    customer.number, customer.end_tw
                ));
            }
        }

        Ok(())
    }

    pub fn distance(&self, from: usize, to: usize) -> f64 {
        self.distances[from][to]
    }

    pub fn depot_node(&self, depot: usize) -> usize {
        self.customers.len() + depot
    }

    pub fn capacity(&self, depot: usize, _vehicle: usize) -> f64 {
        self.vehicles[depot].capacity
    }

    pub fn duration_ceiling(&self, depot: usize, _vehicle: usize) -> f64 {
        self.vehicles[depot].duration
    }

    pub fn vehicle(&self, depot: usize, vehicle: usize) -> Vehicle {
        Vehicle {
            capacity: self.capacity(depot, vehicle),
            duration: self.duration_ceiling(depot, vehicle),
        }
    }

    pub fn customer(&self, number: usize) -> &Customer {
        &self.customers[number]
    }

    pub fn depot(&self, depot: usize) -> &Depot {
        &self.depots[depot]
    }

    pub fn customers_count(&self) -> usize {
        self.customers.len()
    }

    pub fn depots_count(&self) -> usize {
        self.depots.len()
    }

    pub fn vehicles_count(&self) -> usize {
        self.vehicles_count
    }

    pub fn routes_count(&self) -> usize {
        self.depots.len() * self.vehicles_count
    }
}

fn _as_count(value: f64, line: usize) -> Result<usize, InputError> {
    if value >= 0.0 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(InputError::Instance(format!("line {line}: {value} is not a count")))
    }
}

#[cfg(test)]
pub mod fixtures {
    use super::*;

    pub fn customer(number: usize, x: f64, y: f64, demand: f64, service: f64, tw: (f64, f64)) -> Customer {
        Customer {
            number,
            x,
            y,
            demand,
            service_duration: service,
            start_tw: tw.0,
            end_tw: tw.1,
        }
    }

    pub fn depot(number: usize, x: f64, y: f64, end_tw: f64) -> Depot {
        Depot {
            number,
            x,
            y,
            start_tw: 0.0,
            end_tw,
            assigned_customers: vec![],
        }
    }

    /// Two depots on a line with three vehicles each and ten loosely constrained customers.
    pub fn two_depots() -> Instance {
        let customers = (0..10)
            .map(|i| {
                let x = if i % 2 == 0 { -(i as f64) - 1.0 } else { i as f64 + 1.0 };
                let y = ((i * 7) % 5) as f64 - 2.0;
                customer(i, x, y, 10.0 + (i % 3) as f64 * 5.0, 2.0, (0.0, 200.0 + 10.0 * i as f64))
            })
            .collect();
        let depots = vec![depot(0, -3.0, 0.0, 1000.0), depot(1, 3.0, 0.0, 1000.0)];
        let vehicle = Vehicle {
            capacity: 40.0,
            duration: 150.0,
        };
        Instance::from_coordinates(customers, depots, 3, vec![vehicle; 2], DistanceType::Euclidean)
            .expect("valid fixture")
    }
}

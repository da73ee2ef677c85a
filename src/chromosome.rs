use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::InputError;
use crate::instance::Instance;
use crate::penalty::Penalties;
use crate::solutions::Solution;

/// One position of the flat solution encoding: a depot marker opens the next vehicle route
/// of that depot, customers are appended to the route opened last.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Gene {
    Depot(usize),
    Customer(usize),
}

pub fn to_chromosome(solution: &Solution) -> Vec<Gene> {
    let mut genes = vec![];
    for (d, routes) in solution.routes.iter().enumerate() {
        for route in routes {
            genes.push(Gene::Depot(d));
            genes.extend(route.customers().map(Gene::Customer));
        }
    }

    genes
}

pub fn from_chromosome(instance: &Instance, genes: &[Gene], penalties: Penalties) -> Result<Solution, InputError> {
    fn _invalid<T>(message: String) -> Result<T, InputError> {
        Err(InputError::Solution(format!("chromosome: {message}")))
    }

    let mut sequences = vec![Vec::<Vec<usize>>::new(); instance.depots_count()];
    let mut seen = vec![false; instance.customers_count()];
    let mut open = None;

    for (i, &gene) in genes.iter().enumerate() {
        match gene {
            Gene::Depot(d) => {
                let Some(routes) = sequences.get_mut(d) else {
                    return _invalid(format!("gene {i} refers to unknown depot {d}"));
                };
                if routes.len() == instance.vehicles_count() {
                    return _invalid(format!(
                        "depot {d} is opened more than {} times",
                        instance.vehicles_count()
                    ));
                }
                routes.push(vec![]);
                open = Some(d);
            }
            Gene::Customer(c) => {
                let Some(d) = open else {
                    return _invalid(format!("customer {c} appears before any depot marker"));
                };
                match seen.get_mut(c) {
                    None => return _invalid(format!("gene {i} refers to unknown customer {c}")),
                    Some(true) => return _invalid(format!("customer {c} appears more than once")),
                    Some(flag) => *flag = true,
                }
                if let Some(route) = sequences[d].last_mut() {
                    route.push(c);
                }
            }
        }
    }

    if let Some(c) = seen.iter().position(|&s| !s) {
        return _invalid(format!("customer {c} is missing"));
    }

    Solution::from_sequences(instance, &sequences, penalties)
}

pub fn load(path: impl AsRef<Path>) -> Result<Vec<Gene>, InputError> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).map_err(|e| InputError::io(path.display().to_string(), e))?;
    Ok(serde_json::from_str(&data)?)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::instance::fixtures::two_depots;

    #[test]
    fn encodes_one_marker_per_vehicle() {
        let instance = two_depots();
        let solution = Solution::initialize(&instance, &mut StdRng::seed_from_u64(11), None, Penalties::default());
        let genes = to_chromosome(&solution);

        let markers = genes.iter().filter(|g| matches!(g, Gene::Depot(_))).count();
        assert_eq!(markers, instance.routes_count());
        assert_eq!(genes.len(), instance.routes_count() + instance.customers_count());
        assert_eq!(genes[0], Gene::Depot(0));
    }

    #[test]
    fn missing_markers_leave_vehicles_empty() {
        let instance = two_depots();
        let mut genes = vec![Gene::Depot(1)];
        genes.extend((0..10).map(Gene::Customer));

        let solution = from_chromosome(&instance, &genes, Penalties::default()).unwrap();
        assert!(solution.routes[0].iter().all(|r| r.is_empty()));
        assert_eq!(solution.route(1, 0).len(), 10);
        assert!(solution.route(1, 1).is_empty());
    }

    #[test]
    fn rejects_malformed_chromosomes() {
        let instance = two_depots();
        let all = || (0..10).map(Gene::Customer);

        let leading = all().chain([Gene::Depot(0)]).collect::<Vec<_>>();
        let unknown_depot = [Gene::Depot(2)].into_iter().chain(all()).collect::<Vec<_>>();
        let duplicated = [Gene::Depot(0), Gene::Customer(0)].into_iter().chain(all()).collect::<Vec<_>>();
        let missing = [Gene::Depot(0)].into_iter().chain(all().skip(1)).collect::<Vec<_>>();
        let unknown_customer = [Gene::Depot(0), Gene::Customer(10)].into_iter().chain(all()).collect::<Vec<_>>();
        let crowded = [Gene::Depot(0); 4].into_iter().chain(all()).collect::<Vec<_>>();

        for genes in [leading, unknown_depot, duplicated, missing, unknown_customer, crowded] {
            assert!(matches!(
                from_chromosome(&instance, &genes, Penalties::default()),
                Err(InputError::Solution(_))
            ));
        }
    }

    #[test]
    fn parses_json() {
        let genes = serde_json::from_str::<Vec<Gene>>(r#"[{"Depot":0},{"Customer":3}]"#).unwrap();
        assert_eq!(genes, vec![Gene::Depot(0), Gene::Customer(3)]);
    }

    proptest! {
        #[test]
        fn round_trips_arbitrary_layouts(slots in prop::collection::vec(0usize..6, 10)) {
            let instance = two_depots();
            let mut sequences = vec![vec![vec![]; 3]; 2];
            for (customer, slot) in slots.into_iter().enumerate() {
                sequences[slot / 3][slot % 3].push(customer);
            }

            let solution = Solution::from_sequences(&instance, &sequences, Penalties::default()).unwrap();
            let decoded = from_chromosome(&instance, &to_chromosome(&solution), Penalties::default()).unwrap();
            prop_assert_eq!(decoded.sequences(), sequences);
            prop_assert_eq!(decoded.cost, solution.cost);
        }
    }
}

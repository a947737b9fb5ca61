use std::time::Duration;

use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::constraints::*;
use crate::domain::Domain;
use crate::solver::{Limit, SearchStatus, Solver};
use crate::store::{IntVar, Store};
use crate::strategy::{BranchingStrategy, Decision};
use crate::Contradiction;

#[test]
fn test_enumerated_domain() {
    let mut d = Domain::enumerated(0, 130);
    assert_eq!(d.size(), 131);
    assert_eq!(d.remove(0), Ok(true));
    assert_eq!(d.min(), 1);
    assert_eq!(d.remove(64), Ok(true));
    assert_eq!(d.remove(64), Ok(false));
    assert!(!d.contains(64));
    assert_eq!(d.update_lb(64), Ok(true));
    assert_eq!(d.min(), 65);
    assert_eq!(d.update_ub(100), Ok(true));
    assert_eq!(d.size(), 36);
    assert_eq!(d.iter().count(), 36);
    assert_eq!(d.next_value(90), Some(90));
    assert_eq!(d.update_lb(101), Err(Contradiction));
    assert_eq!(d.size(), 36);
    assert_eq!(d.instantiate(70), Ok(true));
    assert_eq!(d.value(), Some(70));
    assert_eq!(d.remove(70), Err(Contradiction));
    assert_eq!(d.to_string(), "70");
}

#[test]
fn test_domain_with_holes() {
    let mut d = Domain::from_values(&[7, 3, 11, 3, 5]);
    assert_eq!(d.iter().collect::<Vec<_>>(), vec![3, 5, 7, 11]);
    assert_eq!(d.to_string(), "{3,5,7,11}");
    assert_eq!(d.remove(11), Ok(true));
    assert_eq!(d.max(), 7);
    assert_eq!(d.update_lb(4), Ok(true));
    assert_eq!(d.min(), 5);
    assert_eq!(d.size(), 2);
}

#[test]
fn test_bounded_domain() {
    let mut d = Domain::bounded(0, 10);
    assert!(!d.is_enumerated());
    assert_eq!(d.remove(5), Ok(false));
    assert!(d.contains(5));
    assert_eq!(d.remove(0), Ok(true));
    assert_eq!(d.remove(10), Ok(true));
    assert_eq!(d.to_string(), "[1..9]");
    assert_eq!(d.update_ub(0), Err(Contradiction));
    assert_eq!(d.size(), 9);
}

#[test]
fn test_store_retain_and_modified() {
    let mut store = Store::default();
    let x = store.add(Domain::enumerated(0, 9));
    let y = store.add(Domain::bounded(0, 9));
    assert_eq!(store.retain(x, |v| v % 3 == 0), Ok(true));
    assert_eq!(store.domain(x).iter().collect::<Vec<_>>(), vec![0, 3, 6, 9]);
    assert_eq!(store.retain(y, |v| v >= 2 && v != 5), Ok(true));
    assert_eq!((store.min(y), store.max(y)), (2, 9));
    assert_eq!(store.take_modified(), vec![x, y]);
    assert!(store.take_modified().is_empty());
    assert_eq!(store.first_unbound(), Some(x));
}

#[test]
fn test_linear_propagation() {
    let mut solver = Solver::new();
    let x = solver.int_var("x", 0, 10);
    let y = solver.int_var("y", 0, 10);
    let z = solver.bounded_var("z", 0, 100);
    solver.post(Linear::sum(&[x, y], z)).unwrap();
    solver.update_ub(z, 4).unwrap();
    assert_eq!(solver.root().max(x), 4);
    assert_eq!(solver.root().max(y), 4);
    solver.update_lb(x, 3).unwrap();
    assert_eq!(solver.root().min(z), 3);
    assert_eq!(solver.root().max(y), 1);
    solver
        .post(Linear::new(vec![(2, x), (-1, y)], Relation::Ge, 8))
        .unwrap();
    assert_eq!(solver.root().value(x), Some(4));
    assert_eq!(solver.root().value(y), Some(0));
    assert_eq!(solver.root().value(z), Some(4));
}

#[test]
fn test_element_and_reification() {
    let mut solver = Solver::new();
    let index = solver.int_var("index", 0, 3);
    let value = solver.var_from_values("value", &[0, 1, 2]);
    solver.post(Element::new(index, vec![1, 1, 2, 0], value)).unwrap();
    solver.remove_value(value, 1).unwrap();
    assert_eq!(solver.root().domain(index).iter().collect::<Vec<_>>(), vec![2, 3]);

    let b = solver.bool_var("b");
    solver.post(ReifiedEqual::not_equal(b, index, 3)).unwrap();
    assert!(!solver.root().is_instantiated(b));
    solver.instantiate(b, 1).unwrap();
    assert_eq!(solver.root().value(index), Some(2));
    assert_eq!(solver.root().value(value), Some(2));

    let m = solver.bool_var("m");
    let w = solver.int_var("w", 0, 5);
    solver.post(ReifiedMember::new(m, w, &[1, 3])).unwrap();
    solver.instantiate(m, 0).unwrap();
    assert_eq!(solver.root().domain(w).iter().collect::<Vec<_>>(), vec![0, 2, 4, 5]);
}

#[test]
fn test_clauses() {
    let mut solver = Solver::new();
    let a = solver.bool_var("a");
    let b = solver.bool_var("b");
    let c = solver.bool_var("c");
    for clause in Clause::if_then_else(a, b, c) {
        solver.post(clause).unwrap();
    }
    solver.instantiate(a, 0).unwrap();
    assert_eq!(solver.root().value(c), Some(1));
    assert!(!solver.root().is_instantiated(b));
    solver.post(Clause::implies(c, b)).unwrap();
    assert_eq!(solver.root().value(b), Some(1));
    assert_eq!(solver.post(Clause::new(vec![(a, true)])), Err(Contradiction));
    assert!(solver.is_failed());
    assert_eq!(solver.find_solution().status, SearchStatus::Infeasible);
}

#[test]
fn test_bin_packing_propagation() {
    let mut solver = Solver::new();
    // bins 0 and 1, value 2 means "not packed"
    let items = (0..3)
        .map(|i| solver.int_var(&format!("item{}", i), 0, 2))
        .collect::<Vec<_>>();
    let loads = (0..2)
        .map(|b| solver.bounded_var(&format!("load{}", b), 0, 10))
        .collect::<Vec<_>>();
    solver
        .post(BinPacking::with_fixed_load(
            items.clone(),
            vec![6, 5, 4],
            loads.clone(),
            vec![0, 3],
        ))
        .unwrap();
    assert_eq!(solver.root().min(loads[1]), 3);
    solver.instantiate(items[0], 0).unwrap();
    // item1 does not fit next to item0
    assert!(!solver.root().contains(items[1], 0));
    assert_eq!(solver.root().min(loads[0]), 6);
    solver.instantiate(items[1], 1).unwrap();
    assert_eq!(solver.root().domain(items[2]).iter().collect::<Vec<_>>(), vec![0, 2]);
    assert_eq!(solver.root().value(loads[1]), Some(8));
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "each bin needs a fixed load")]
fn test_bin_packing_fixed_load_mismatch() {
    let mut solver = Solver::new();
    let item = solver.int_var("item", 0, 2);
    let loads = (0..2)
        .map(|b| solver.bounded_var(&format!("load{}", b), 0, 10))
        .collect::<Vec<_>>();
    BinPacking::with_fixed_load(vec![item], vec![1], loads, vec![0]);
}

fn queens(n: i64) -> (Solver, Vec<IntVar>) {
    let mut solver = Solver::new();
    let vars = (0..n)
        .map(|i| solver.int_var(&format!("q{}", i), 0, n - 1))
        .collect::<Vec<_>>();
    for i in 0..n as usize {
        for j in i + 1..n as usize {
            let d = (j - i) as i64;
            solver.post(NotEqual::new(vars[i], vars[j])).unwrap();
            solver.post(NotEqual::with_offset(vars[i], vars[j], d)).unwrap();
            solver.post(NotEqual::with_offset(vars[i], vars[j], -d)).unwrap();
        }
    }
    (solver, vars)
}

#[test]
fn test_queens() {
    let (mut solver, vars) = queens(8);
    let outcome = solver.find_solution();
    assert_eq!(outcome.status, SearchStatus::Solved);
    let solution = outcome.solution.unwrap();
    let rows = vars.iter().map(|&v| solution.value(v)).collect::<Vec<_>>();
    for i in 0..rows.len() {
        for j in i + 1..rows.len() {
            assert_ne!(rows[i], rows[j]);
            assert_ne!((rows[i] - rows[j]).abs(), (j - i) as i64);
        }
    }
    assert!(outcome.statistics.nodes > 0);
    assert_eq!(outcome.statistics.solutions, 1);
}

fn pigeons(n: i64) -> Solver {
    let mut solver = Solver::new();
    let vars = (0..n)
        .map(|i| solver.int_var(&format!("p{}", i), 0, n - 2))
        .collect::<Vec<_>>();
    solver.post(AllDifferentExcept::new(vars, None)).unwrap();
    solver
}

#[test]
fn test_infeasible_search() {
    let mut solver = pigeons(5);
    let outcome = solver.find_solution();
    assert_eq!(outcome.status, SearchStatus::Infeasible);
    assert!(outcome.solution.is_none());
    assert!(outcome.statistics.backtracks > 0);
}

#[test]
fn test_search_limits() {
    let mut solver = pigeons(13);
    solver.limit_time(Some(Duration::from_millis(20)));
    let outcome = solver.find_solution();
    assert_eq!(outcome.status, SearchStatus::Stopped(Limit::Time));
    assert!(outcome.solution.is_none());

    solver.limit_time(None);
    solver.limit_nodes(Some(100));
    let outcome = solver.find_solution();
    assert_eq!(outcome.status, SearchStatus::Stopped(Limit::Nodes));
    assert_eq!(outcome.statistics.nodes, 100);

    solver.limit_nodes(None);
    solver.limit_backtracks(Some(10));
    let outcome = solver.find_solution();
    assert_eq!(outcome.status, SearchStatus::Stopped(Limit::Backtracks));
}

#[test]
fn test_optimization() {
    let mut solver = Solver::new();
    let x = solver.int_var("x", 0, 9);
    let y = solver.int_var("y", 0, 9);
    let cost = solver.bounded_var("cost", 0, 100);
    // cost = 3x + 2y, x + y >= 7, x - y <= 1
    solver
        .post(Linear::new(vec![(3, x), (2, y), (-1, cost)], Relation::Eq, 0))
        .unwrap();
    solver.post(Linear::new(vec![(1, x), (1, y)], Relation::Ge, 7)).unwrap();
    solver.post(LessOrEqual::with_offset(x, y, 1)).unwrap();
    let outcome = solver.find_optimal_solution(cost, true);
    assert_eq!(outcome.status, SearchStatus::Optimal);
    let solution = outcome.solution.unwrap();
    assert_eq!(solution.value(cost), 14);
    assert_eq!(solution.value(x), 0);
    assert_eq!(solution.value(y), 7);

    let outcome = solver.find_optimal_solution(cost, false);
    assert_eq!(outcome.solution.unwrap().value(cost), 45);
}

struct MaxValue {
    vars: Vec<IntVar>,
}

impl BranchingStrategy for MaxValue {
    fn name(&self) -> &str {
        "max_value"
    }

    fn next_decision(&mut self, store: &Store) -> Option<Decision> {
        self.vars
            .iter()
            .find(|&&v| !store.is_instantiated(v))
            .map(|&v| Decision::new(v, store.max(v)))
    }
}

#[test]
fn test_strategies() {
    let mut solver = Solver::new();
    let x = solver.int_var("x", 0, 5);
    let y = solver.int_var("y", 0, 5);
    solver.post(NotEqual::new(x, y)).unwrap();
    solver.add_strategy(Box::new(MaxValue {
        vars: vec![x, y],
    }));
    let solution = solver.find_solution().solution.unwrap();
    assert_eq!(solution.value(x), 5);
    assert_eq!(solution.value(y), 4);
}

#[test]
fn test_incomplete_search() {
    let mut solver = Solver::new();
    let x = solver.int_var("x", 0, 5);
    let y = solver.int_var("y", 0, 5);
    solver.add_strategy(Box::new(MaxValue {
        vars: vec![x],
    }));
    solver.set_complete_search(false);
    let outcome = solver.find_solution();
    assert_eq!(outcome.status, SearchStatus::Infeasible);
    solver.set_complete_search(true);
    let solution = solver.find_solution().solution.unwrap();
    assert_eq!(solution.value(x), 5);
    assert_eq!(solution.value(y), 0);
}

#[test]
// Random linear systems: every solution found satisfies the constraints.
fn test_random_linear_systems() {
    let mut rng = Pcg64::seed_from_u64(123);
    for _ in 0..50 {
        let mut solver = Solver::new();
        let vars = (0..4)
            .map(|i| solver.int_var(&format!("x{}", i), 0, rng.gen_range(1..6)))
            .collect::<Vec<_>>();
        let coefs = (0..4).map(|_| rng.gen_range(-3..4)).collect::<Vec<i64>>();
        let rhs = rng.gen_range(-5..10);
        let terms = coefs.iter().copied().zip(vars.iter().copied()).collect::<Vec<_>>();
        if solver.post(Linear::new(terms, Relation::Le, rhs)).is_err() {
            continue;
        }
        if let Some(solution) = solver.find_solution().solution {
            let lhs: i64 = coefs.iter().zip(vars.iter()).map(|(a, &x)| a * solution.value(x)).sum();
            assert!(lhs <= rhs);
        }
    }
}

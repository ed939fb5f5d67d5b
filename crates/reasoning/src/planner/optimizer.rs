//! Dependency leveling and step ordering
//!
//! Provides:
//! - Grouping of plan steps into dependency levels
//! - Per-level ordering for each [`OptimizationStrategy`]

use super::types::{OptimizationStrategy, QueryStep};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Group steps into levels; every step in a level depends only on earlier levels.
///
/// Steps that never become eligible (cyclic or unknown dependencies) are left
/// out of the result. Callers detect them by comparing counts.
pub fn get_dependency_levels(steps: &[QueryStep]) -> Vec<Vec<&QueryStep>> {
    let mut levels: Vec<Vec<&QueryStep>> = Vec::new();
    let mut done: HashSet<&str> = HashSet::new();
    let mut remaining: Vec<&QueryStep> = steps.iter().collect();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<&QueryStep>, Vec<&QueryStep>) = remaining
            .into_iter()
            .partition(|step| step.depends_on.iter().all(|dep| done.contains(dep.as_str())));

        if ready.is_empty() {
            break;
        }

        done.extend(ready.iter().map(|step| step.step_id.as_str()));
        levels.push(ready);
        remaining = blocked;
    }

    levels
}

/// Steps left out of the dependency levels, in plan order
pub fn unresolved_steps<'a>(steps: &'a [QueryStep], levels: &[Vec<&QueryStep>]) -> Vec<&'a QueryStep> {
    let resolved: HashSet<&str> = levels
        .iter()
        .flatten()
        .map(|step| step.step_id.as_str())
        .collect();

    steps
        .iter()
        .filter(|step| !resolved.contains(step.step_id.as_str()))
        .collect()
}

/// Reorder one level in place. Sorting is stable so ties keep plan order.
pub fn order_level(level: &mut [&QueryStep], strategy: OptimizationStrategy, balance_threshold: f32) {
    match strategy {
        OptimizationStrategy::MinimizeCost => {
            level.sort_by(|a, b| cmp_cost(a.estimated_cost, b.estimated_cost));
        }
        OptimizationStrategy::Balanced => {
            level.sort_by(|a, b| {
                let a_expensive = a.estimated_cost > balance_threshold;
                let b_expensive = b.estimated_cost > balance_threshold;
                a_expensive
                    .cmp(&b_expensive)
                    .then_with(|| cmp_cost(a.estimated_cost, b.estimated_cost))
            });
        }
        // Level grouping already exposes all available parallelism
        OptimizationStrategy::MinimizeLatency => {}
    }
}

fn cmp_cost(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Level-ordered copy of the steps plus the ids of steps that could not be placed
pub fn reorder_steps(
    steps: &[QueryStep],
    strategy: OptimizationStrategy,
    balance_threshold: f32,
) -> (Vec<QueryStep>, Vec<String>) {
    let mut levels = get_dependency_levels(steps);
    for level in levels.iter_mut() {
        order_level(level, strategy, balance_threshold);
    }

    let unresolved = unresolved_steps(steps, &levels);
    let unresolved_ids = unresolved.iter().map(|s| s.step_id.clone()).collect();

    let ordered = levels
        .into_iter()
        .flatten()
        .chain(unresolved)
        .cloned()
        .collect();

    (ordered, unresolved_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::types::{EntityLookupParams, StepQuery};

    fn step(id: &str, cost: f32, deps: &[&str]) -> QueryStep {
        let query = StepQuery::EntityLookup(EntityLookupParams {
            entity_id: Some(id.to_string()),
            entity_type: None,
        });
        QueryStep::new(id, query, cost, id)
            .unwrap()
            .with_dependencies(deps.iter().copied())
    }

    fn ids(level: &[&QueryStep]) -> Vec<String> {
        level.iter().map(|s| s.step_id.clone()).collect()
    }

    #[test]
    fn test_levels_partition_acyclic_plan() {
        let steps = vec![
            step("a", 0.1, &[]),
            step("b", 0.5, &["a"]),
            step("c", 0.5, &["a"]),
            step("d", 0.2, &["b", "c"]),
            step("e", 0.3, &[]),
        ];

        let levels = get_dependency_levels(&steps);
        assert_eq!(levels.len(), 3);
        assert_eq!(ids(&levels[0]), vec!["a", "e"]);
        assert_eq!(ids(&levels[1]), vec!["b", "c"]);
        assert_eq!(ids(&levels[2]), vec!["d"]);

        let total: usize = levels.iter().map(Vec::len).sum();
        assert_eq!(total, steps.len());
    }

    #[test]
    fn test_cycle_stops_silently() {
        let steps = vec![
            step("a", 0.1, &[]),
            step("b", 0.5, &["c"]),
            step("c", 0.5, &["b"]),
        ];

        let levels = get_dependency_levels(&steps);
        assert_eq!(levels.len(), 1);
        assert_eq!(ids(&unresolved_steps(&steps, &levels)), vec!["b", "c"]);
    }

    #[test]
    fn test_minimize_cost_orders_within_level() {
        let steps = vec![step("a", 0.9, &[]), step("b", 0.2, &[]), step("c", 0.5, &[])];
        let (ordered, unresolved) = reorder_steps(&steps, OptimizationStrategy::MinimizeCost, 0.7);

        let order: Vec<&str> = ordered.iter().map(|s| s.step_id.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
        assert!(unresolved.is_empty());
    }

    #[test]
    fn test_balanced_defers_expensive_steps() {
        let steps = vec![step("a", 0.8, &[]), step("b", 0.6, &[]), step("c", 0.2, &[])];
        let (ordered, _) = reorder_steps(&steps, OptimizationStrategy::Balanced, 0.7);

        let order: Vec<&str> = ordered.iter().map(|s| s.step_id.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_latency_keeps_level_order() {
        let steps = vec![step("a", 0.9, &[]), step("b", 0.2, &["a"]), step("c", 0.1, &[])];
        let (ordered, _) = reorder_steps(&steps, OptimizationStrategy::MinimizeLatency, 0.7);

        let order: Vec<&str> = ordered.iter().map(|s| s.step_id.as_str()).collect();
        assert_eq!(order, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_dependencies_never_follow_dependents() {
        let steps = vec![step("late", 0.1, &["early"]), step("early", 0.9, &[])];
        let (ordered, _) = reorder_steps(&steps, OptimizationStrategy::MinimizeCost, 0.7);

        let order: Vec<&str> = ordered.iter().map(|s| s.step_id.as_str()).collect();
        assert_eq!(order, vec!["early", "late"]);
    }
}

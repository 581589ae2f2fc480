//! Dependency resolution over the entity registry.
//!
//! Depth-first topological sort with explicit visiting/visited marks.
//! Entities with no ordering constraint between them keep their registration
//! order, so runs are reproducible regardless of how the catalog is edited.

use crate::errors::SeedError;
use crate::registry::Registry;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Visited,
}

/// Compute a total order in which every entity appears after all entities it
/// references as parents. Fails with [`SeedError::CyclicDependency`] naming the
/// members of the first back-edge cycle found.
pub fn execution_order(registry: &Registry) -> Result<Vec<String>, SeedError> {
    let specs = registry.all();
    let mut marks = vec![Mark::Unvisited; specs.len()];
    let mut order = Vec::with_capacity(specs.len());
    let mut stack = Vec::new();

    for idx in 0..specs.len() {
        visit(registry, idx, &mut marks, &mut stack, &mut order)?;
    }
    Ok(order)
}

fn visit(
    registry: &Registry,
    idx: usize,
    marks: &mut [Mark],
    stack: &mut Vec<usize>,
    order: &mut Vec<String>,
) -> Result<(), SeedError> {
    match marks[idx] {
        Mark::Visited => return Ok(()),
        Mark::Visiting => {
            // back-edge: everything from the first occurrence on the stack
            // participates in the cycle
            let start = stack.iter().position(|&i| i == idx).unwrap_or(0);
            let mut members: Vec<String> = stack[start..]
                .iter()
                .map(|&i| registry.all()[i].name.clone())
                .collect();
            members.push(registry.all()[idx].name.clone());
            return Err(SeedError::CyclicDependency(members));
        }
        Mark::Unvisited => {}
    }

    marks[idx] = Mark::Visiting;
    stack.push(idx);
    let spec = &registry.all()[idx];
    for parent in &spec.parent_refs {
        let parent_idx = registry
            .position(&parent.entity)
            .ok_or_else(|| SeedError::UnknownEntity(parent.entity.clone()))?;
        visit(registry, parent_idx, marks, stack, order)?;
    }
    stack.pop();
    marks[idx] = Mark::Visited;
    order.push(spec.name.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EntitySpec;
    use assert_matches::assert_matches;

    fn registry(specs: Vec<EntitySpec>) -> Registry {
        let mut reg = Registry::new();
        for spec in specs {
            reg.register(spec).unwrap();
        }
        reg.seal().unwrap();
        reg
    }

    fn pos(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn parents_come_before_children() {
        let reg = registry(vec![
            EntitySpec::new("invoices", "invoices").parent("clients", "client_id"),
            EntitySpec::new("clients", "clients").parent("companies", "company_id"),
            EntitySpec::new("companies", "companies"),
        ]);
        let order = execution_order(&reg).unwrap();
        assert!(pos(&order, "companies") < pos(&order, "clients"));
        assert!(pos(&order, "clients") < pos(&order, "invoices"));
    }

    #[test]
    fn unconstrained_entities_keep_registration_order() {
        let reg = registry(vec![
            EntitySpec::new("tax_rates", "tax_rates"),
            EntitySpec::new("plans", "plans"),
            EntitySpec::new("permission_sets", "permission_sets"),
        ]);
        let order = execution_order(&reg).unwrap();
        assert_eq!(order, vec!["tax_rates", "plans", "permission_sets"]);
    }

    #[test]
    fn lookup_references_also_force_ordering() {
        let reg = registry(vec![
            EntitySpec::new("subscriptions", "subscriptions")
                .parent("clients", "client_id")
                .lookup("plans", "plan_id"),
            EntitySpec::new("plans", "plans"),
            EntitySpec::new("clients", "clients"),
        ]);
        let order = execution_order(&reg).unwrap();
        assert!(pos(&order, "plans") < pos(&order, "subscriptions"));
        assert!(pos(&order, "clients") < pos(&order, "subscriptions"));
    }

    #[test]
    fn cycle_is_reported_with_members() {
        let mut reg = Registry::new();
        reg.register(EntitySpec::new("a", "a").parent("c", "c_id"))
            .unwrap();
        reg.register(EntitySpec::new("b", "b").parent("a", "a_id"))
            .unwrap();
        reg.register(EntitySpec::new("c", "c").parent("b", "b_id"))
            .unwrap();
        reg.seal().unwrap();
        let err = execution_order(&reg).unwrap_err();
        assert_matches!(err, SeedError::CyclicDependency(members) => {
            for name in ["a", "b", "c"] {
                assert!(members.iter().any(|m| m == name), "missing {name} in {members:?}");
            }
        });
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut reg = Registry::new();
        reg.register(EntitySpec::new("a", "a").parent("a", "parent_id"))
            .unwrap();
        reg.seal().unwrap();
        assert_matches!(
            execution_order(&reg),
            Err(SeedError::CyclicDependency(members)) if members.contains(&"a".to_string())
        );
    }

    #[test]
    fn cached_order_is_stable_across_calls() {
        let reg = registry(vec![
            EntitySpec::new("clients", "clients"),
            EntitySpec::new("invoices", "invoices").parent("clients", "client_id"),
        ]);
        let first = reg.execution_order().unwrap().to_vec();
        let second = reg.execution_order().unwrap().to_vec();
        assert_eq!(first, second);
    }
}

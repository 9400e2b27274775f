use std::collections::{HashMap, HashSet};

use crate::error::SupervisorError;

/// Stable dependency ordering.
///
/// Takes `(id, depends_on)` pairs in declared order and returns indices into
/// that list. Each round picks the earliest declared entry whose dependencies
/// are all placed, so declared order survives wherever dependencies allow.
pub fn start_order(decls: &[(&str, &[String])]) -> Result<Vec<usize>, SupervisorError> {
    // 1. Validate ids and dependency references
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(decls.len());
    for (i, (id, _)) in decls.iter().enumerate() {
        if index.insert(*id, i).is_some() {
            return Err(SupervisorError::DuplicateSubsystem { id: id.to_string() });
        }
    }
    for (id, deps) in decls {
        for dep in deps.iter() {
            if !index.contains_key(dep.as_str()) {
                return Err(SupervisorError::UnknownDependency {
                    id: id.to_string(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    // 2. Place entries round by round
    let mut placed: HashSet<usize> = HashSet::with_capacity(decls.len());
    let mut order = Vec::with_capacity(decls.len());
    while order.len() < decls.len() {
        let next = decls.iter().enumerate().position(|(i, (_, deps))| {
            !placed.contains(&i) && deps.iter().all(|d| placed.contains(&index[d.as_str()]))
        });

        match next {
            Some(i) => {
                placed.insert(i);
                order.push(i);
            }
            None => {
                // Whatever is left sits on or behind a cycle.
                let members = decls
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !placed.contains(i))
                    .map(|(_, (id, _))| id.to_string())
                    .collect();
                return Err(SupervisorError::DependencyCycle { members });
            }
        }
    }

    Ok(order)
}

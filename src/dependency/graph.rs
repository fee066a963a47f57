use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet, VecDeque};

/// Directed graph over service names, used once at startup.
///
/// The graph exists for two things: refusing cyclic configurations before
/// any process is spawned, and producing a topological order that is logged
/// as a diagnostic. The actual start order at runtime is driven by state
/// observation, not by this static order, because a dependency may require
/// an intermediate state rather than completion.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    services: HashSet<String>,
    /// `depends_on[a] = [b, c]` means `a` waits on states of `b` and `c`.
    depends_on: HashMap<String, Vec<String>>,
    /// `dependents[b] = [a]` means `a` waits on a state of `b`.
    dependents: HashMap<String, Vec<String>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_service(&mut self, name: String) {
        self.services.insert(name.clone());
        self.depends_on.entry(name.clone()).or_default();
        self.dependents.entry(name).or_default();
    }

    /// Record that `service` waits on some state of `dependency`.
    pub fn add_dependency(&mut self, service: String, dependency: String) {
        self.add_service(service.clone());
        self.add_service(dependency.clone());
        self.depends_on
            .entry(service.clone())
            .or_default()
            .push(dependency.clone());
        self.dependents.entry(dependency).or_default().push(service);
    }

    /// Topological order, dependencies first.
    ///
    /// Fails with [`Error::CircularDependency`] naming the cycle path if the
    /// graph is not acyclic.
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        let mut pending_deps: HashMap<&str, usize> = self
            .services
            .iter()
            .map(|name| {
                (
                    name.as_str(),
                    self.depends_on.get(name).map_or(0, Vec::len),
                )
            })
            .collect();

        let mut queue: VecDeque<&str> = pending_deps
            .iter()
            .filter(|(_, &count)| count == 0)
            .map(|(name, _)| *name)
            .collect();

        let mut order = Vec::with_capacity(self.services.len());
        while let Some(name) = queue.pop_front() {
            order.push(name.to_string());
            if let Some(dependents) = self.dependents.get(name) {
                for dependent in dependents {
                    if let Some(count) = pending_deps.get_mut(dependent.as_str()) {
                        *count -= 1;
                        if *count == 0 {
                            queue.push_back(dependent);
                        }
                    }
                }
            }
        }

        if order.len() != self.services.len() {
            return Err(Error::CircularDependency(self.find_cycle()));
        }
        Ok(order)
    }

    /// Extract one cycle path via depth-first traversal with an on-stack set.
    ///
    /// Only called after `topological_sort` established a cycle exists.
    fn find_cycle(&self) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut path = Vec::new();

        for name in &self.services {
            if !visited.contains(name.as_str()) {
                if let Some(cycle) = self.cycle_dfs(name, &mut visited, &mut on_stack, &mut path) {
                    return cycle;
                }
            }
        }
        // Unreachable when a cycle exists, but return something printable.
        self.services.iter().take(3).cloned().collect()
    }

    fn cycle_dfs<'a>(
        &'a self,
        name: &'a str,
        visited: &mut HashSet<&'a str>,
        on_stack: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        visited.insert(name);
        on_stack.insert(name);
        path.push(name);

        if let Some(deps) = self.depends_on.get(name) {
            for dep in deps {
                if !visited.contains(dep.as_str()) {
                    if let Some(cycle) = self.cycle_dfs(dep, visited, on_stack, path) {
                        return Some(cycle);
                    }
                } else if on_stack.contains(dep.as_str()) {
                    let start = path.iter().position(|n| *n == dep.as_str()).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|n| n.to_string()).collect();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
            }
        }

        on_stack.remove(name);
        path.pop();
        None
    }
}

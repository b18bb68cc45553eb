//! Task dependency graph and execution ordering.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::{Result, ShipwrightError};
use crate::task::TaskRef;

/// Dependency relationships between the tasks of one command.
///
/// Tasks keep their declaration index, which breaks ties during ordering so
/// the same graph always resolves to the same order.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    /// Task ids in declaration order.
    tasks: Vec<String>,
    /// Declaration index of each task.
    index: HashMap<String, usize>,
    /// Direct dependencies of each task, in declared order.
    dependencies: HashMap<String, Vec<String>>,
    /// Tasks that directly depend on each task, in declaration order.
    dependents: HashMap<String, Vec<String>>,
}

impl TaskGraph {
    pub fn builder() -> TaskGraphBuilder {
        TaskGraphBuilder::new()
    }

    /// Build the graph of a task set.
    pub fn from_tasks(tasks: &[TaskRef]) -> Result<Self> {
        tasks
            .iter()
            .fold(Self::builder(), |builder, task| {
                builder.add_task(task.id(), task.dependencies().to_vec())
            })
            .build()
    }

    pub fn dependencies_of(&self, task: &str) -> Option<&[String]> {
        self.dependencies.get(task).map(Vec::as_slice)
    }

    pub fn dependents_of(&self, task: &str) -> Option<&[String]> {
        self.dependents.get(task).map(Vec::as_slice)
    }

    pub fn contains(&self, task: &str) -> bool {
        self.index.contains_key(task)
    }

    /// Task ids in declaration order.
    pub fn task_ids(&self) -> &[String] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Returns tasks in topological order (dependencies before dependents).
    ///
    /// Among tasks that become ready at the same time, the one declared first
    /// comes first.
    ///
    /// # Errors
    ///
    /// Returns `CONFLICT` naming the cycle path if the graph is cyclic.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let mut in_degree: Vec<usize> = self
            .tasks
            .iter()
            .map(|t| self.dependencies.get(t).map_or(0, Vec::len))
            .collect();

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &degree)| degree == 0)
            .map(|(idx, _)| idx)
            .collect();

        let mut result = Vec::with_capacity(self.tasks.len());

        while let Some(idx) = ready.pop_first() {
            let task = &self.tasks[idx];
            result.push(task.clone());

            for dependent in self.dependents.get(task).into_iter().flatten() {
                let dep_idx = self.index[dependent];
                in_degree[dep_idx] -= 1;
                if in_degree[dep_idx] == 0 {
                    ready.insert(dep_idx);
                }
            }
        }

        if result.len() != self.tasks.len() {
            let cycle = self.find_cycle().unwrap_or_else(|| {
                self.tasks
                    .iter()
                    .zip(&in_degree)
                    .filter(|(_, &d)| d > 0)
                    .map(|(t, _)| t.clone())
                    .collect()
            });
            return Err(ShipwrightError::conflict(format!(
                "Dependency cycle detected: {}",
                cycle.join(" -> ")
            ))
            .in_component("graph"));
        }

        Ok(result)
    }

    /// Find a cycle in the graph, returning the path if one exists.
    ///
    /// The path follows dependency edges and repeats its first task at the
    /// end, e.g. `["a", "b", "a"]` when `a` depends on `b` and `b` on `a`.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum State {
            Unvisited,
            Visiting,
            Visited,
        }

        fn dfs<'a>(
            node: &'a str,
            graph: &'a TaskGraph,
            state: &mut HashMap<&'a str, State>,
            path: &mut Vec<&'a str>,
        ) -> Option<Vec<String>> {
            state.insert(node, State::Visiting);
            path.push(node);

            for dep in graph.dependencies.get(node).into_iter().flatten() {
                match state.get(dep.as_str()) {
                    Some(State::Visiting) => {
                        let start = path.iter().position(|s| *s == dep.as_str())?;
                        let mut cycle: Vec<String> =
                            path[start..].iter().map(|s| s.to_string()).collect();
                        cycle.push(dep.clone());
                        return Some(cycle);
                    }
                    Some(State::Unvisited) | None => {
                        if let Some(cycle) = dfs(dep, graph, state, path) {
                            return Some(cycle);
                        }
                    }
                    Some(State::Visited) => {}
                }
            }

            path.pop();
            state.insert(node, State::Visited);
            None
        }

        let mut state: HashMap<&str, State> = self
            .tasks
            .iter()
            .map(|t| (t.as_str(), State::Unvisited))
            .collect();
        let mut path = Vec::new();

        for task in &self.tasks {
            if state.get(task.as_str()) == Some(&State::Unvisited) {
                if let Some(cycle) = dfs(task, self, &mut state, &mut path) {
                    return Some(cycle);
                }
            }
        }

        None
    }

    /// All tasks that depend on `task`, directly or indirectly.
    pub fn transitive_dependents(&self, task: &str) -> HashSet<String> {
        let mut result = HashSet::new();
        let mut to_visit = vec![task.to_string()];

        while let Some(current) = to_visit.pop() {
            for dependent in self.dependents.get(&current).into_iter().flatten() {
                if result.insert(dependent.clone()) {
                    to_visit.push(dependent.clone());
                }
            }
        }

        result
    }
}

/// Builder for constructing a [`TaskGraph`].
#[derive(Debug, Default)]
pub struct TaskGraphBuilder {
    entries: Vec<(String, Vec<String>)>,
}

impl TaskGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task with its dependencies.
    pub fn add_task(mut self, id: impl Into<String>, depends_on: Vec<String>) -> Self {
        self.entries.push((id.into(), depends_on));
        self
    }

    /// Build the dependency graph.
    ///
    /// # Errors
    ///
    /// Returns `CONFLICT` if two tasks share an id and `NOT_FOUND` if a
    /// dependency references a task that is not part of the set.
    pub fn build(self) -> Result<TaskGraph> {
        let mut tasks = Vec::with_capacity(self.entries.len());
        let mut index = HashMap::with_capacity(self.entries.len());

        for (id, _) in &self.entries {
            if index.insert(id.clone(), tasks.len()).is_some() {
                return Err(ShipwrightError::conflict(format!(
                    "Task '{}' is declared more than once",
                    id
                ))
                .in_component("graph"));
            }
            tasks.push(id.clone());
        }

        let mut dependencies: HashMap<String, Vec<String>> = HashMap::new();
        let mut dependents: HashMap<String, Vec<String>> =
            tasks.iter().map(|t| (t.clone(), Vec::new())).collect();

        for (id, deps) in self.entries {
            let mut unique: Vec<String> = Vec::with_capacity(deps.len());
            for dep in deps {
                if !index.contains_key(&dep) {
                    return Err(ShipwrightError::not_found(format!(
                        "Task '{}' depends on unknown task '{}'",
                        id, dep
                    ))
                    .in_component("graph"));
                }
                if !unique.contains(&dep) {
                    unique.push(dep);
                }
            }

            for dep in &unique {
                if let Some(list) = dependents.get_mut(dep) {
                    list.push(id.clone());
                }
            }
            dependencies.insert(id, unique);
        }

        Ok(TaskGraph {
            tasks,
            index,
            dependencies,
            dependents,
        })
    }
}

/// Resolve a task set into an execution order.
///
/// # Errors
///
/// `CONFLICT` for duplicate ids or cycles, `NOT_FOUND` for unknown
/// dependencies.
pub fn resolve(tasks: &[TaskRef]) -> Result<Vec<String>> {
    TaskGraph::from_tasks(tasks)?.topological_order()
}

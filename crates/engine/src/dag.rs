// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage dependency graph.
//!
//! Edges are derived, not declared: stage B depends on stage A iff one of
//! B's declared deps is one of A's declared outs. Deps that no stage
//! produces are external files; they create no edge but still count for
//! freshness.

use indexmap::IndexMap;
use stagerun_core::Stage;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

/// Errors from graph construction and queries
#[derive(Debug, Error)]
pub enum DagError {
    #[error("duplicate stage: {0}")]
    DuplicateStage(String),

    #[error("output '{path}' is declared by both '{first}' and '{second}'")]
    OutputCollision {
        path: String,
        first: String,
        second: String,
    },

    #[error("unknown stage: {0}")]
    UnknownStage(String),

    #[error("circular dependency detected: {}", .0.join(" -> "))]
    Cyclic(Vec<String>),
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

/// The stage graph. Immutable once built.
#[derive(Debug, Clone)]
pub struct Dag {
    /// Stages in declaration order
    stages: IndexMap<String, Stage>,
    /// Output path → producing stage
    producers: HashMap<String, String>,
    /// Stage → producer stages whose outputs it consumes
    upstream: BTreeMap<String, BTreeSet<String>>,
    /// Stage → consumer stages of its outputs
    downstream: BTreeMap<String, BTreeSet<String>>,
}

impl Dag {
    /// Build the graph, rejecting duplicate stage names and outputs that
    /// more than one stage claims to produce. Cycles are NOT rejected here;
    /// call [`Dag::check_cycles`] to get the offending path.
    pub fn new(stages: Vec<Stage>) -> Result<Self, DagError> {
        let mut stage_map: IndexMap<String, Stage> = IndexMap::with_capacity(stages.len());
        for stage in stages {
            if stage_map.contains_key(&stage.name) {
                return Err(DagError::DuplicateStage(stage.name));
            }
            stage_map.insert(stage.name.clone(), stage);
        }

        let mut producers: HashMap<String, String> = HashMap::new();
        for (name, stage) in &stage_map {
            for out in &stage.outs {
                if let Some(first) = producers.insert(out.clone(), name.clone()) {
                    return Err(DagError::OutputCollision {
                        path: out.clone(),
                        first,
                        second: name.clone(),
                    });
                }
            }
        }

        let mut upstream: BTreeMap<String, BTreeSet<String>> = stage_map
            .keys()
            .map(|name| (name.clone(), BTreeSet::new()))
            .collect();
        let mut downstream = upstream.clone();

        for (name, stage) in &stage_map {
            for dep in &stage.deps {
                let Some(producer) = producers.get(dep).cloned() else {
                    continue; // external file
                };
                if let Some(set) = upstream.get_mut(name) {
                    set.insert(producer.clone());
                }
                if let Some(set) = downstream.get_mut(&producer) {
                    set.insert(name.clone());
                }
            }
        }

        Ok(Self {
            stages: stage_map,
            producers,
            upstream,
            downstream,
        })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Stage> {
        self.stages.get(name)
    }

    /// Stages in declaration order.
    pub fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.stages.values()
    }

    /// Stage names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stages.keys().map(String::as_str)
    }

    /// Which stage produces the given output path, if any.
    pub fn producer_of(&self, path: &str) -> Option<&str> {
        self.producers.get(path).map(String::as_str)
    }

    /// Producer stages the named stage consumes from, in name order.
    pub fn dependencies_of(&self, name: &str) -> impl Iterator<Item = &str> {
        self.upstream
            .get(name)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Find a dependency cycle, if one exists.
    ///
    /// Returns the cycle in closed notation: the first name is repeated at
    /// the end (`[a, b, a]`).
    pub fn check_cycles(&self) -> Option<Vec<String>> {
        let mut colors: HashMap<&str, Color> = self
            .stages
            .keys()
            .map(|name| (name.as_str(), Color::White))
            .collect();
        let mut path: Vec<String> = Vec::new();

        for name in self.stages.keys() {
            if colors.get(name.as_str()) == Some(&Color::White) {
                if let Some(cycle) = self.visit(name, &mut colors, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn visit<'a>(
        &'a self,
        node: &'a str,
        colors: &mut HashMap<&'a str, Color>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        colors.insert(node, Color::Gray);
        path.push(node.to_string());

        for next in self.downstream.get(node).into_iter().flatten() {
            match colors.get(next.as_str()).copied().unwrap_or(Color::White) {
                Color::Gray => {
                    // Back-edge: the cycle is the path suffix from `next`
                    let start = path.iter().position(|n| n == next).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(next.clone());
                    return Some(cycle);
                }
                Color::White => {
                    if let Some(cycle) = self.visit(next, colors, path) {
                        return Some(cycle);
                    }
                }
                Color::Black => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        None
    }

    /// Restrict the graph to the requested stages and everything they
    /// transitively depend on.
    pub fn filter_to_targets(&self, targets: &[String]) -> Result<Dag, DagError> {
        let mut keep: BTreeSet<&str> = BTreeSet::new();
        let mut queue: Vec<&str> = Vec::new();

        for target in targets {
            if !self.stages.contains_key(target) {
                return Err(DagError::UnknownStage(target.clone()));
            }
            if keep.insert(target.as_str()) {
                queue.push(target.as_str());
            }
        }

        while let Some(node) = queue.pop() {
            for producer in self.upstream.get(node).into_iter().flatten() {
                if keep.insert(producer.as_str()) {
                    queue.push(producer.as_str());
                }
            }
        }

        let stages: Vec<Stage> = self
            .stages
            .values()
            .filter(|stage| keep.contains(stage.name.as_str()))
            .cloned()
            .collect();
        Self::new(stages)
    }

    /// Split the graph into execution levels.
    ///
    /// Level k holds exactly the stages whose longest producer chain has
    /// length k, so stages within a level are mutually independent and
    /// every edge crosses from a lower level to a strictly higher one.
    /// Names within a level are sorted for stable logs.
    pub fn topological_sort(&self) -> Result<Vec<Vec<String>>, DagError> {
        let mut remaining: BTreeMap<&str, usize> = self
            .upstream
            .iter()
            .map(|(name, producers)| (name.as_str(), producers.len()))
            .collect();

        let mut levels = Vec::new();
        while !remaining.is_empty() {
            let ready: Vec<String> = remaining
                .iter()
                .filter(|(_, degree)| **degree == 0)
                .map(|(name, _)| name.to_string())
                .collect();

            if ready.is_empty() {
                let cycle = self.check_cycles().unwrap_or_default();
                return Err(DagError::Cyclic(cycle));
            }

            for name in &ready {
                remaining.remove(name.as_str());
                for consumer in self.downstream.get(name.as_str()).into_iter().flatten() {
                    if let Some(degree) = remaining.get_mut(consumer.as_str()) {
                        *degree -= 1;
                    }
                }
            }
            levels.push(ready);
        }
        Ok(levels)
    }
}

#[cfg(test)]
#[path = "dag_tests.rs"]
mod tests;

//! Feature ordering.
//!
//! Constraints form a graph with an edge `a → b` for "a runs before b".
//! Kahn's algorithm picks, at every step, the ready feature registered
//! earliest, so features without constraints keep registration order:
//!
//! ```text
//! registered: markdown, taxonomy, pages(after dirs), dirs(after taxonomy)
//! schedule:   markdown, taxonomy, dirs, pages
//! ```

use super::Feature;
use crate::site::{BuildError, BuildReport};
use smallvec::SmallVec;
use std::collections::BTreeSet;

/// Features in execution order.
pub struct Schedule<'a> {
    order: Vec<&'a dyn Feature>,
}

impl<'a> Schedule<'a> {
    pub fn iter(&self) -> impl Iterator<Item = &'a dyn Feature> + '_ {
        self.order.iter().copied()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.order.iter().map(|f| f.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

type Edges = SmallVec<[usize; 4]>;

pub(super) fn compute<'a>(
    features: &'a [Box<dyn Feature>],
    report: &BuildReport,
) -> Result<Schedule<'a>, BuildError> {
    let index_of = |name: &str| features.iter().position(|f| f.name() == name);
    let mut successors: Vec<Edges> = vec![Edges::new(); features.len()];

    let mut add_edge = |from: usize, to: usize| {
        if !successors[from].contains(&to) {
            successors[from].push(to);
        }
    };
    for (i, feature) in features.iter().enumerate() {
        for &name in feature.runs_after() {
            match index_of(name) {
                Some(j) => add_edge(j, i),
                None => unknown(report, feature.name(), "runs_after", name),
            }
        }
        for &name in feature.runs_before() {
            match index_of(name) {
                Some(j) => add_edge(i, j),
                None => unknown(report, feature.name(), "runs_before", name),
            }
        }
    }

    let mut indegree = vec![0usize; features.len()];
    for edges in &successors {
        for &to in edges {
            indegree[to] += 1;
        }
    }

    let mut ready: BTreeSet<usize> = (0..features.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(features.len());
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &to in &successors[next] {
            indegree[to] -= 1;
            if indegree[to] == 0 {
                ready.insert(to);
            }
        }
    }

    if order.len() < features.len() {
        let stuck: Vec<bool> = indegree.iter().map(|&d| d > 0).collect();
        let cycle = find_cycle(&successors, &stuck);
        let names = |i: usize| features[i].name().to_owned();
        return Err(BuildError::Cycle {
            features: cycle.iter().map(|&i| names(i)).collect(),
            constraints: cycle
                .windows(2)
                .map(|pair| format!("{} runs before {}", names(pair[0]), names(pair[1])))
                .collect(),
        });
    }

    Ok(Schedule {
        order: order.into_iter().map(|i| features[i].as_ref()).collect(),
    })
}

fn unknown(report: &BuildReport, feature: &str, constraint: &str, name: &str) {
    report.warn(
        format!("feature {feature}"),
        format!("{constraint} names unknown feature `{name}`, ignored"),
    );
}

/// A closed path through the nodes left over by Kahn's algorithm.
///
/// Every leftover node has a leftover predecessor, so walking predecessors
/// must revisit a node; successors are walked here on the reversed graph.
fn find_cycle(successors: &[Edges], stuck: &[bool]) -> Vec<usize> {
    let mut predecessor = vec![None; successors.len()];
    for (from, edges) in successors.iter().enumerate() {
        if !stuck[from] {
            continue;
        }
        for &to in edges {
            if stuck[to] && predecessor[to].is_none() {
                predecessor[to] = Some(from);
            }
        }
    }

    let Some(start) = stuck.iter().position(|&s| s) else {
        return Vec::new();
    };
    let mut seen = vec![false; successors.len()];
    let mut walk = vec![start];
    let mut node = start;
    seen[node] = true;
    while let Some(prev) = predecessor[node] {
        if seen[prev] {
            let from = walk.iter().position(|&n| n == prev).unwrap_or(0);
            let mut cycle: Vec<usize> = walk[from..].iter().rev().copied().collect();
            cycle.push(cycle[0]);
            return cycle;
        }
        seen[prev] = true;
        walk.push(prev);
        node = prev;
    }
    walk
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Arc values above this are read as selected.
pub const SELECTION_THRESHOLD: f64 = 0.5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CycleError {
    #[error("node {node} has {count} selected outgoing arcs")]
    OutDegree { node: usize, count: usize },
    #[error("arc {from}->{to} enters a node that is already covered")]
    Revisited { from: usize, to: usize },
    #[error("arc assignment has {len} values, expected {expected}")]
    Size { len: usize, expected: usize },
    #[error("solution splits into {count} cycles")]
    Subtours { count: usize },
}

/// Directed arcs `(from, to)` in traversal order.
pub type Cycle = Vec<(usize, usize)>;

/// 0/1 selection of arcs over `num_nodes` nodes, arc `i -> j` at index
/// `i * num_nodes + j`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArcAssignment {
    num_nodes: usize,
    selected: Vec<bool>,
}

impl ArcAssignment {
    pub fn from_values(num_nodes: usize, values: &[f64]) -> Result<Self, CycleError> {
        let expected = num_nodes * num_nodes;
        if values.len() != expected {
            return Err(CycleError::Size {
                len: values.len(),
                expected,
            });
        }
        Ok(Self {
            num_nodes,
            selected: values.iter().map(|&v| v > SELECTION_THRESHOLD).collect(),
        })
    }

    pub fn from_arcs(num_nodes: usize, arcs: &[(usize, usize)]) -> Self {
        let mut selected = vec![false; num_nodes * num_nodes];
        for &(from, to) in arcs {
            if from < num_nodes && to < num_nodes {
                selected[from * num_nodes + to] = true;
            }
        }
        Self { num_nodes, selected }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn is_selected(&self, from: usize, to: usize) -> bool {
        from < self.num_nodes && to < self.num_nodes && self.selected[from * self.num_nodes + to]
    }

    /// The unique selected arc leaving `node`.
    pub fn successor(&self, node: usize) -> Result<usize, CycleError> {
        let mut targets = (0..self.num_nodes).filter(|&to| self.is_selected(node, to));
        match (targets.next(), targets.next()) {
            (Some(to), None) => Ok(to),
            _ => Err(CycleError::OutDegree {
                node,
                count: (0..self.num_nodes).filter(|&to| self.is_selected(node, to)).count(),
            }),
        }
    }
}

/// Partitions the nodes into the cycles of the assignment, starting each
/// cycle at the lowest node not yet covered.
pub fn decompose_cycles(assignment: &ArcAssignment) -> Result<Vec<Cycle>, CycleError> {
    let mut unreached: BTreeSet<usize> = (0..assignment.num_nodes()).collect();
    let mut cycles = Vec::new();
    while let Some(start) = unreached.pop_first() {
        let mut cycle = Vec::new();
        let mut current = start;
        loop {
            let next = assignment.successor(current)?;
            cycle.push((current, next));
            if next == start {
                break;
            }
            if !unreached.remove(&next) {
                return Err(CycleError::Revisited { from: current, to: next });
            }
            current = next;
        }
        cycles.push(cycle);
    }
    Ok(cycles)
}

/// Elimination row `Σ_{arcs} x <= rhs` for one cycle.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubtourCut {
    pub arcs: Vec<(usize, usize)>,
    pub rhs: usize,
}

/// One cut per cycle, or none when a single cycle covers every node.
pub fn subtour_cuts(cycles: &[Cycle]) -> Vec<SubtourCut> {
    if cycles.len() <= 1 {
        return Vec::new();
    }
    cycles
        .iter()
        .map(|cycle| SubtourCut {
            arcs: cycle.clone(),
            rhs: cycle.len() - 1,
        })
        .collect()
}

/// Node order of a Hamiltonian tour starting at node 0.
pub fn tour_from_solution(num_nodes: usize, values: &[f64]) -> Result<Vec<usize>, CycleError> {
    let assignment = ArcAssignment::from_values(num_nodes, values)?;
    let cycles = decompose_cycles(&assignment)?;
    match cycles.as_slice() {
        [] => Ok(Vec::new()),
        [tour] => Ok(tour.iter().map(|&(from, _)| from).collect()),
        _ => Err(CycleError::Subtours { count: cycles.len() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_cycle_has_no_cuts() {
        let assignment = ArcAssignment::from_arcs(3, &[(0, 2), (2, 1), (1, 0)]);
        let cycles = decompose_cycles(&assignment).unwrap();
        assert_eq!(cycles, vec![vec![(0, 2), (2, 1), (1, 0)]]);
        assert!(subtour_cuts(&cycles).is_empty());
    }

    #[test]
    fn test_two_subtours_give_two_cuts() {
        let assignment = ArcAssignment::from_arcs(4, &[(0, 1), (1, 0), (2, 3), (3, 2)]);
        let cycles = decompose_cycles(&assignment).unwrap();
        assert_eq!(cycles.len(), 2);
        assert_eq!(
            subtour_cuts(&cycles),
            vec![
                SubtourCut {
                    arcs: vec![(0, 1), (1, 0)],
                    rhs: 1
                },
                SubtourCut {
                    arcs: vec![(2, 3), (3, 2)],
                    rhs: 1
                },
            ]
        );
    }

    #[test]
    fn test_missing_outgoing_arc_fails() {
        let assignment = ArcAssignment::from_arcs(3, &[(0, 1), (1, 0)]);
        assert_eq!(
            decompose_cycles(&assignment),
            Err(CycleError::OutDegree { node: 2, count: 0 })
        );
    }

    #[test]
    fn test_several_outgoing_arcs_fail() {
        let assignment = ArcAssignment::from_arcs(3, &[(0, 1), (0, 2), (1, 0), (2, 0)]);
        assert_eq!(
            decompose_cycles(&assignment),
            Err(CycleError::OutDegree { node: 0, count: 2 })
        );
    }

    #[test]
    fn test_arc_into_covered_node_fails() {
        // 0 -> 1 -> 2 -> 1 never returns to 0
        let assignment = ArcAssignment::from_arcs(3, &[(0, 1), (1, 2), (2, 1)]);
        assert_eq!(
            decompose_cycles(&assignment),
            Err(CycleError::Revisited { from: 2, to: 1 })
        );
    }

    #[test]
    fn test_values_are_thresholded() {
        let values = [0.0, 0.9999, 0.0, 0.0, 0.0, 1.0, 0.99, 1e-7, 0.0];
        assert_eq!(tour_from_solution(3, &values), Ok(vec![0, 1, 2]));
        assert_eq!(
            tour_from_solution(3, &values[..8]),
            Err(CycleError::Size { len: 8, expected: 9 })
        );
    }
}

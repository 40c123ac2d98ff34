use crate::error::{Result, SinterError};
use std::collections::VecDeque;

/// Contact edge oriented in breadth-first discovery direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientedEdge {
    pub from: usize,
    pub to: usize,
    pub in_tree: bool,
}

/// Closed loop of the contact graph introduced by one non-tree contact.
///
/// The paths list tree contacts from the lowest common ancestor down to the
/// cycle contact's `from` and `to` particle respectively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticleCycle {
    pub contact: usize,
    pub from_path: Vec<usize>,
    pub to_path: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct ContactGraph {
    pub edges: Vec<OrientedEdge>,
    /// Tree edges in discovery order; parents always precede their children.
    pub tree_order: Vec<usize>,
    pub parent_edge: Vec<Option<usize>>,
    pub cycles: Vec<ParticleCycle>,
}

impl ContactGraph {
    /// Breadth-first spanning tree rooted at particle 0 over undirected `pairs`.
    pub fn explore(particle_count: usize, pairs: &[(usize, usize)]) -> Result<Self> {
        let mut adjacency = vec![Vec::new(); particle_count];
        for (edge, &(a, b)) in pairs.iter().enumerate() {
            if a >= particle_count || b >= particle_count || a == b {
                return Err(SinterError::Topology(format!(
                    "contact {} joins invalid particles ({}, {})",
                    edge, a, b
                )));
            }
            adjacency[a].push((b, edge));
            adjacency[b].push((a, edge));
        }

        let mut edges: Vec<Option<OrientedEdge>> = vec![None; pairs.len()];
        let mut visited = vec![false; particle_count];
        let mut parent_edge = vec![None; particle_count];
        let mut tree_order = Vec::new();
        let mut queue = VecDeque::new();

        if particle_count > 0 {
            visited[0] = true;
            queue.push_back(0);
        }
        while let Some(current) = queue.pop_front() {
            for &(neighbor, edge) in &adjacency[current] {
                if edges[edge].is_some() {
                    continue;
                }
                let in_tree = !visited[neighbor];
                edges[edge] = Some(OrientedEdge {
                    from: current,
                    to: neighbor,
                    in_tree,
                });
                if in_tree {
                    visited[neighbor] = true;
                    parent_edge[neighbor] = Some(edge);
                    tree_order.push(edge);
                    queue.push_back(neighbor);
                }
            }
        }

        if let Some(detached) = visited.iter().position(|v| !v) {
            return Err(SinterError::Topology(format!(
                "particle {} is detached from the root particle",
                detached
            )));
        }
        let edges: Vec<OrientedEdge> = edges.into_iter().flatten().collect();

        let mut graph = Self {
            edges,
            tree_order,
            parent_edge,
            cycles: Vec::new(),
        };
        graph.cycles = graph
            .edges
            .iter()
            .enumerate()
            .filter(|(_, edge)| !edge.in_tree)
            .map(|(index, edge)| graph.cycle(index, edge.from, edge.to))
            .collect();
        Ok(graph)
    }

    /// Tree edges from the root down to `particle`.
    pub fn path_from_root(&self, particle: usize) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = particle;
        while let Some(edge) = self.parent_edge[current] {
            path.push(edge);
            current = self.edges[edge].from;
        }
        path.reverse();
        path
    }

    fn cycle(&self, contact: usize, from: usize, to: usize) -> ParticleCycle {
        let from_path = self.path_from_root(from);
        let to_path = self.path_from_root(to);
        let common = from_path
            .iter()
            .zip(&to_path)
            .take_while(|(a, b)| a == b)
            .count();
        ParticleCycle {
            contact,
            from_path: from_path[common..].to_vec(),
            to_path: to_path[common..].to_vec(),
        }
    }
}

/// Directed contact edge between two particles, aggregating all linked node pairs.
#[derive(Debug, Clone)]
pub struct ParticleContact {
    pub index: usize,
    /// Arena index of the particle the edge starts at (parent in the spanning tree).
    pub from: usize,
    pub to: usize,
    /// Contact nodes of the `from` particle, each linked to one node of `to`.
    pub from_nodes: Vec<usize>,
    pub in_tree: bool,
    /// Distance between the particle centers.
    pub distance: f64,
    /// Absolute angle of the vector from the `from` center to the `to` center.
    pub direction: f64,
}

impl ParticleContact {
    pub fn pair_count(&self) -> usize {
        self.from_nodes.len()
    }
}

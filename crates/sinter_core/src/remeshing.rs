use crate::system::SystemState;
use anyhow::{Context, Result};

/// Node insertion/removal pass run between time steps on SI system records.
pub trait Remesher: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn remesh(&self, system: SystemState) -> Result<SystemState>;
}

impl<F> Remesher for F
where
    F: Fn(SystemState) -> Result<SystemState> + Send + Sync,
{
    fn remesh(&self, system: SystemState) -> Result<SystemState> {
        self(system)
    }
}

/// Runs `remeshers` in order, each on the output of the previous one.
pub fn remesh_all(remeshers: &[Box<dyn Remesher>], system: SystemState) -> Result<SystemState> {
    remeshers.iter().try_fold(system, |system, remesher| {
        let id = system.id;
        remesher
            .remesh(system)
            .with_context(|| format!("remesher {} failed on state {}", remesher.name(), id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use anyhow::bail;

    fn drop_last_node(mut system: SystemState) -> Result<SystemState> {
        for particle in &mut system.particles {
            particle.nodes.pop();
        }
        Ok(system)
    }

    #[test]
    fn remeshers_run_in_sequence() {
        let remeshers: Vec<Box<dyn Remesher>> = vec![Box::new(drop_last_node), Box::new(drop_last_node)];
        let system = remesh_all(&remeshers, fixtures::perturbed_circle(10, 0.0)).expect("remeshed");
        assert_eq!(system.node_count(), 8);
    }

    #[test]
    fn failure_names_the_state() {
        let failing = |_: SystemState| -> Result<SystemState> { bail!("degenerate ring") };
        let remeshers: Vec<Box<dyn Remesher>> = vec![Box::new(failing)];
        let mut system = fixtures::perturbed_circle(10, 0.0);
        system.id = 42;
        let err = remesh_all(&remeshers, system).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("state 42"));
        assert!(message.contains("degenerate ring"));
    }
}

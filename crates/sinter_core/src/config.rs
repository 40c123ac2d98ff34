use crate::error::{Result, SinterError};
use crate::root_finding::{LagrangianRootFinder, RootFinderKind};
use crate::time_stepping::{TimeStepper, TimeStepperKind};
use serde::{Deserialize, Serialize};

/// Tunables of one solver session. Time step widths are in normalized time units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub initial_time_step_width: f64,
    pub min_time_step_width: f64,
    pub max_time_step_width: f64,
    pub time_step_increase_factor: f64,
    pub time_step_decrease_factor: f64,
    /// Largest rotation of any surface segment within one step, in radians.
    pub max_displacement_angle: f64,
    pub root_finder: RootFinderKind,
    /// How a solved root is combined with the previous step before it is applied.
    pub time_stepper: TimeStepperKind,
    pub max_iterations: usize,
    pub accuracy: f64,
    /// Depth of the recovery history.
    pub solution_memory_count: usize,
    pub max_recovery_attempts: usize,
    /// Steps between remeshing passes; zero disables remeshing.
    pub remeshing_interval: usize,
    pub instability_detection: bool,
    pub direction_compliance: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            initial_time_step_width: 1e-4,
            min_time_step_width: 1e-12,
            max_time_step_width: 1e-1,
            time_step_increase_factor: 2.0,
            time_step_decrease_factor: 0.8,
            max_displacement_angle: 0.02,
            root_finder: RootFinderKind::Tearing,
            time_stepper: TimeStepperKind::AdamsMoulton,
            max_iterations: 100,
            accuracy: 1e-8,
            solution_memory_count: 10,
            max_recovery_attempts: 10,
            remeshing_interval: 10,
            instability_detection: true,
            direction_compliance: 1e-8,
        }
    }
}

impl SolverOptions {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("initial_time_step_width", self.initial_time_step_width),
            ("min_time_step_width", self.min_time_step_width),
            ("max_time_step_width", self.max_time_step_width),
            ("max_displacement_angle", self.max_displacement_angle),
            ("accuracy", self.accuracy),
        ];
        for (name, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(SinterError::InvalidInput(format!("{} must be positive, got {}", name, value)));
            }
        }
        if self.min_time_step_width > self.max_time_step_width {
            return Err(SinterError::InvalidInput(format!(
                "min_time_step_width {} exceeds max_time_step_width {}",
                self.min_time_step_width, self.max_time_step_width
            )));
        }
        if !(self.time_step_increase_factor >= 1.0) {
            return Err(SinterError::InvalidInput(format!(
                "time_step_increase_factor must be at least one, got {}",
                self.time_step_increase_factor
            )));
        }
        if !(self.time_step_decrease_factor > 0.0 && self.time_step_decrease_factor < 1.0) {
            return Err(SinterError::InvalidInput(format!(
                "time_step_decrease_factor must lie in (0, 1), got {}",
                self.time_step_decrease_factor
            )));
        }
        if self.max_iterations == 0 {
            return Err(SinterError::InvalidInput("max_iterations must be greater than zero".into()));
        }
        if !(self.direction_compliance >= 0.0) {
            return Err(SinterError::InvalidInput(format!(
                "direction_compliance must not be negative, got {}",
                self.direction_compliance
            )));
        }
        Ok(())
    }

    pub fn root_finder(&self) -> Box<dyn LagrangianRootFinder> {
        self.root_finder.build(self.max_iterations, self.accuracy)
    }

    pub fn time_stepper(&self) -> Box<dyn TimeStepper> {
        self.time_stepper.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invalid(options: SolverOptions, fragment: &str) {
        let err = options.validate().unwrap_err();
        assert!(
            err.to_string().contains(fragment),
            "expected '{}' in '{}'",
            fragment,
            err
        );
    }

    #[test]
    fn defaults_are_valid() {
        SolverOptions::default().validate().expect("valid defaults");
    }

    #[test]
    fn rejects_inverted_width_bounds() {
        assert_invalid(
            SolverOptions {
                min_time_step_width: 1.0,
                max_time_step_width: 0.5,
                ..SolverOptions::default()
            },
            "exceeds",
        );
    }

    #[test]
    fn rejects_bad_factors() {
        assert_invalid(
            SolverOptions {
                time_step_decrease_factor: 1.5,
                ..SolverOptions::default()
            },
            "time_step_decrease_factor",
        );
        assert_invalid(
            SolverOptions {
                accuracy: 0.0,
                ..SolverOptions::default()
            },
            "accuracy",
        );
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let options: SolverOptions =
            serde_json::from_str(r#"{"max_displacement_angle": 0.05, "root_finder": "Monolithic"}"#)
                .expect("options");
        assert_eq!(options.max_displacement_angle, 0.05);
        assert_eq!(options.root_finder, RootFinderKind::Monolithic);
        assert_eq!(options.solution_memory_count, 10);
        assert_eq!(options.time_stepper, TimeStepperKind::AdamsMoulton);

        let options: SolverOptions = serde_json::from_str(r#"{"time_stepper": "ExplicitEuler"}"#).expect("options");
        assert_eq!(options.time_stepper, TimeStepperKind::ExplicitEuler);
    }
}

//! Picking the best run of a sweep under a caller-supplied objective.

use mg_types::{validation_error, MgError, MgResult, Model, Params};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Display;
use tracing::info;

use crate::grid::ParamGrid;
use crate::record::{RunRecord, RunResults};
use crate::runner::{run_on_param_grid, GridTarget};

/// Whether we are maximizing or minimizing the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveDirection {
    Maximize,
    Minimize,
}

impl Default for ObjectiveDirection {
    fn default() -> Self {
        Self::Minimize
    }
}

/// The winning run of a selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Selected<'r, O, S> {
    /// Position of the winner in the sweep's records.
    pub index: usize,
    pub label: &'r str,
    pub parameters: &'r Params,
    pub output: &'r O,
    pub objective: S,
}

/// Scores every run and keeps the best one.
#[derive(Debug, Clone, Copy, Default)]
pub struct Selector {
    direction: ObjectiveDirection,
}

impl Selector {
    pub fn new(direction: ObjectiveDirection) -> Self {
        Self { direction }
    }

    pub fn direction(&self) -> ObjectiveDirection {
        self.direction
    }

    /// Apply `objective(params, output)` to every record. Any failing or
    /// incomparable score aborts the whole selection. On ties the earliest
    /// record in grid order wins.
    pub fn select<'r, O, S, E, F>(
        &self,
        results: &'r RunResults<O>,
        mut objective: F,
    ) -> MgResult<Selected<'r, O, S>>
    where
        F: FnMut(&Params, &O) -> Result<S, E>,
        S: PartialOrd,
        E: Display,
    {
        let wanted = match self.direction {
            ObjectiveDirection::Minimize => Ordering::Less,
            ObjectiveDirection::Maximize => Ordering::Greater,
        };

        let mut best: Option<(usize, &'r RunRecord<O>, S)> = None;
        for (index, record) in results.iter().enumerate() {
            let score = objective(&record.parameters, &record.output).map_err(|e| MgError::Objective {
                label: record.label.clone(),
                message: e.to_string(),
            })?;
            if score.partial_cmp(&score).is_none() {
                return Err(MgError::Objective {
                    label: record.label.clone(),
                    message: "objective value is not comparable".to_string(),
                });
            }
            let improves = match &best {
                None => true,
                Some((_, _, current)) => score.partial_cmp(current) == Some(wanted),
            };
            if improves {
                best = Some((index, record, score));
            }
        }

        let (index, record, objective) =
            best.ok_or_else(|| validation_error!("no run records to select from"))?;
        Ok(Selected {
            index,
            label: &record.label,
            parameters: &record.parameters,
            output: &record.output,
            objective,
        })
    }
}

/// Pick the run minimizing `target(params, output)`.
pub fn calibrate_on_run_results<'r, O, S, E, F>(
    results: &'r RunResults<O>,
    target: F,
) -> MgResult<Selected<'r, O, S>>
where
    F: FnMut(&Params, &O) -> Result<S, E>,
    S: PartialOrd,
    E: Display,
{
    Selector::default().select(results, target)
}

/// Sweep `target_model` over `grid`, then return the run minimizing
/// `target`.
pub fn calibrate_on_param_grid<M, S, E, F>(
    target_model: GridTarget<'_, M>,
    data: &M::Input,
    target: F,
    grid: &ParamGrid,
) -> MgResult<RunRecord<M::Output>>
where
    M: Model,
    M::Input: Sync,
    M::Output: Send,
    F: FnMut(&Params, &M::Output) -> Result<S, E>,
    S: PartialOrd,
    E: Display,
{
    let results = run_on_param_grid(target_model, data, grid)?;
    let index = calibrate_on_run_results(&results, target)?.index;
    let best = results.into_records().swap_remove(index);
    info!("Calibration picked {} with {}", best.label, best.parameters);
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mg_types::testing::{Foo, NestedModel};
    use std::convert::Infallible;

    fn squared_distance(target: f64) -> impl FnMut(&Params, &f64) -> Result<f64, Infallible> {
        move |_, output| Ok((output - target).powi(2))
    }

    #[test]
    fn picks_the_unique_minimum() {
        let grid = ParamGrid::new().add_int("parameter", 0, 10);
        let results = run_on_param_grid(GridTarget::<Foo>::class(), &2.0, &grid).unwrap();

        let best = calibrate_on_run_results(&results, squared_distance(7.0)).unwrap();
        assert_eq!(*best.output, 7.0);
        assert_eq!(best.parameters.get("parameter").and_then(|v| v.as_i64()), Some(7));
        assert_eq!(best.objective, 0.0);
        assert_eq!(results.get(best.label).map(|r| r.output), Some(7.0));
    }

    #[test]
    fn ties_go_to_the_first_run() {
        let grid = ParamGrid::new().add_int("parameter", 0, 4);
        let results = run_on_param_grid(GridTarget::<Foo>::class(), &3.0, &grid).unwrap();

        // parameters 0..=3 all produce 3.0
        let best = calibrate_on_run_results(&results, squared_distance(3.0)).unwrap();
        assert_eq!(best.index, 0);
        assert_eq!(best.label, results.records()[0].label);
    }

    #[test]
    fn maximize_direction() {
        let grid = ParamGrid::new().add_int("parameter", 0, 5);
        let results = run_on_param_grid(GridTarget::<Foo>::class(), &0.0, &grid).unwrap();

        let best = Selector::new(ObjectiveDirection::Maximize)
            .select(&results, |_, output| Ok::<f64, Infallible>(*output))
            .unwrap();
        assert_eq!(*best.output, 5.0);
    }

    #[test]
    fn objective_failure_aborts_selection() {
        let grid = ParamGrid::new().add_int("parameter", 0, 3);
        let results = run_on_param_grid(GridTarget::<Foo>::class(), &0.0, &grid).unwrap();

        let err = calibrate_on_run_results(&results, |params, output| {
            if params.get("parameter").and_then(|v| v.as_i64()) == Some(2) {
                Err("diverged")
            } else {
                Ok(*output)
            }
        })
        .unwrap_err();
        assert!(matches!(err, MgError::Objective { ref message, .. } if message == "diverged"));
    }

    #[test]
    fn nan_scores_are_rejected() {
        let grid = ParamGrid::new().add_int("parameter", 0, 1);
        let results = run_on_param_grid(GridTarget::<Foo>::class(), &0.0, &grid).unwrap();

        let err = calibrate_on_run_results(&results, |_, _| Ok::<f64, Infallible>(f64::NAN)).unwrap_err();
        assert!(matches!(err, MgError::Objective { .. }));
    }

    #[test]
    fn empty_results_are_a_validation_error() {
        let results = run_on_param_grid(GridTarget::<Foo>::class(), &0.0, &ParamGrid::new()).unwrap();
        let err = calibrate_on_run_results(&results, squared_distance(0.0)).unwrap_err();
        assert!(matches!(err, MgError::Validation(_)));
    }

    #[test]
    fn calibrate_on_param_grid_returns_best_record() {
        let grid = ParamGrid::new()
            .add_values("alpha", vec![0.0, 1.0, 2.0])
            .add_values("parameter", vec![1.0, 4.0]);

        let best = calibrate_on_param_grid(
            GridTarget::<NestedModel>::class(),
            &2.0,
            squared_distance(5.0),
            &grid,
        )
        .unwrap();

        assert_eq!(best.output, 5.0);
        assert_eq!(best.parameters.get("alpha").and_then(|v| v.as_f64()), Some(1.0));
        assert_eq!(best.parameters.get("parameter").and_then(|v| v.as_f64()), Some(4.0));
        assert!(best.label.starts_with("NestedModel-"));
    }
}

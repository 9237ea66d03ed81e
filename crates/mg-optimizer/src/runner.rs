//! Grid sweeps: evaluate a model at every point of a [`ParamGrid`].

use chrono::Utc;
use mg_types::{internal_error, new_run_label, FromParams, MgResult, Model, Params};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::grid::ParamGrid;
use crate::record::{RunRecord, RunResults, RunnerConfig};

/// Builds a model from one grid point.
pub type Constructor<M> = fn(&Params) -> MgResult<M>;

/// What a sweep evaluates.
pub enum GridTarget<'a, M> {
    /// A model type: every grid point gets a freshly constructed instance.
    Class(Constructor<M>),
    /// A live instance, reparametrized in place before each evaluation.
    /// Points run strictly one after another.
    Instance(&'a mut M),
}

impl<'a, M: FromParams> GridTarget<'a, M> {
    pub fn class() -> Self {
        Self::Class(M::from_params)
    }
}

impl<'a, M> GridTarget<'a, M> {
    pub fn instance(model: &'a mut M) -> Self {
        Self::Instance(model)
    }
}

/// Runs sweeps according to a [`RunnerConfig`].
#[derive(Debug, Clone, Default)]
pub struct GridRunner {
    config: RunnerConfig,
}

impl GridRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Evaluate `target` on `data` at every point of `grid`.
    pub fn run<M>(
        &self,
        target: GridTarget<'_, M>,
        data: &M::Input,
        grid: &ParamGrid,
    ) -> MgResult<RunResults<M::Output>>
    where
        M: Model,
        M::Input: Sync,
        M::Output: Send,
    {
        grid.validate()?;
        let started_at = Utc::now();
        info!(
            "Starting sweep '{}' over {} grid points",
            self.config.name,
            grid.grid_size().map_or_else(|| "an unbounded number of".to_string(), |n| n.to_string())
        );

        let records = match target {
            GridTarget::Class(construct) => self.run_fresh(construct, data, grid)?,
            GridTarget::Instance(model) => Self::run_in_place(model, data, grid)?,
        };

        info!("Sweep '{}' finished with {} runs", self.config.name, records.len());
        Ok(RunResults::new(&self.config, records, started_at))
    }

    fn run_fresh<M>(
        &self,
        construct: Constructor<M>,
        data: &M::Input,
        grid: &ParamGrid,
    ) -> MgResult<Vec<RunRecord<M::Output>>>
    where
        M: Model,
        M::Input: Sync,
        M::Output: Send,
    {
        if self.config.concurrency <= 1 {
            return grid
                .iter()
                .enumerate()
                .map(|(run_number, params)| evaluate_fresh(construct, data, params, run_number))
                .collect();
        }

        let points: Vec<Params> = grid.iter().collect();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.concurrency)
            .build()
            .map_err(|e| internal_error!("failed to build worker pool: {}", e))?;
        debug!("Farming {} grid points to {} workers", points.len(), self.config.concurrency);

        pool.install(|| {
            points
                .into_par_iter()
                .enumerate()
                .map(|(run_number, params)| evaluate_fresh(construct, data, params, run_number))
                .collect()
        })
    }

    fn run_in_place<M: Model>(
        model: &mut M,
        data: &M::Input,
        grid: &ParamGrid,
    ) -> MgResult<Vec<RunRecord<M::Output>>> {
        let mut records = Vec::new();
        for (run_number, params) in grid.iter().enumerate() {
            let started = Instant::now();
            let shadow = model.reparam(&params)?;
            for name in params.keys() {
                let touched = shadow
                    .leaves()
                    .iter()
                    .any(|(path, updated)| **updated && path.last().map(String::as_str) == Some(name));
                if !touched {
                    warn!("Grid parameter '{}' matches nothing in {}", name, model.type_name());
                }
            }
            let output = model.invoke(data)?;
            records.push(record(model.type_name(), run_number, params, output, started));
        }
        Ok(records)
    }
}

fn evaluate_fresh<M: Model>(
    construct: Constructor<M>,
    data: &M::Input,
    params: Params,
    run_number: usize,
) -> MgResult<RunRecord<M::Output>> {
    let started = Instant::now();
    let model = construct(&params)?;
    let output = model.invoke(data)?;
    Ok(record(model.type_name(), run_number, params, output, started))
}

fn record<O>(type_name: &str, run_number: usize, parameters: Params, output: O, started: Instant) -> RunRecord<O> {
    let (label, id) = new_run_label(type_name);
    debug!("Run {} #{} with {}", label, run_number, parameters);
    RunRecord {
        id,
        label,
        run_number,
        parameters,
        output,
        created_at: Utc::now(),
        duration_micros: started.elapsed().as_micros() as u64,
    }
}

/// Sweep with the default single-threaded runner.
pub fn run_on_param_grid<M>(
    target: GridTarget<'_, M>,
    data: &M::Input,
    grid: &ParamGrid,
) -> MgResult<RunResults<M::Output>>
where
    M: Model,
    M::Input: Sync,
    M::Output: Send,
{
    GridRunner::default().run(target, data, grid)
}

use mg_data::{ResultStore, StoreConfig};
use mg_optimizer::*;
use mg_types::testing::{CalibratedFoo, Foo, NestedModel};
use mg_types::*;
use std::convert::Infallible;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("ModelGrid Basic Usage Example");

    // A two-level model tree
    let mut model = NestedModel::new(5.0, Foo::new(3.0));
    println!("Model tree: {}", serde_json::to_string(&model.model_tree()?)?);

    // Every `parameter` in the tree, wherever it sits
    let shadow = model.reparam(&params! { "parameter" => 5.0 })?;
    println!("Updated leaves: {}", serde_json::to_string(&shadow)?);
    println!("NestedModel(2.0) = {}", model.invoke(&2.0)?);

    // Fresh instance per grid point
    let grid = ParamGrid::new()
        .add_values("alpha", vec![0.0, 1.0, 2.0])
        .add_float("parameter", 0.0, 10.0, 11);
    let runner = GridRunner::new(RunnerConfig::new("demo").with_concurrency(4));
    let results = runner.run(GridTarget::<NestedModel>::class(), &2.0, &grid)?;
    println!("Ran {} grid points", results.len());

    let best = calibrate_on_run_results(&results, |_, output: &f64| {
        Ok::<f64, Infallible>((output - 7.5).abs())
    })?;
    println!("Best run {} with {} -> {}", best.label, best.parameters, best.output);

    // Calibrators only fire through `run`
    let mut calibrated = CalibratedFoo::new(0.0, 1.0);
    println!("invoke(5) = {}", calibrated.invoke(&5.0)?);

    let store = ResultStore::from_config(&StoreConfig::from_env())?;
    let (output, saved) = calibrated.run_and_save(&5.0, &store)?;
    println!("run(5) = {} saved to {}", output, saved.location.display());

    Ok(())
}

use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, bail};
use log::info;
use machine_learning::training::{CheckpointConfig, TrainerBuilder, TrainerSpec};
use tokio::{signal, task};

use neural_network_training::{mlp, mnist};

const USAGE: &str = "usage: train <model_path> [dataset_path]";

/// Reads the trainer spec from `TRAIN_CONFIG` if set, falling back to the MNIST perceptron.
fn trainer_spec(model_path: &Path) -> anyhow::Result<TrainerSpec> {
    let Ok(json) = env::var("TRAIN_CONFIG") else {
        return Ok(mlp::trainer_spec(model_path));
    };

    let mut spec: TrainerSpec =
        serde_json::from_str(&json).context("failed to parse TRAIN_CONFIG")?;
    spec.training
        .checkpoint
        .get_or_insert_with(|| CheckpointConfig::new(model_path));

    Ok(spec)
}

/// Reads `<model_path> [dataset_path]`, the dataset defaulting to `mnist::DEFAULT_PATH`.
fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<(PathBuf, PathBuf)> {
    let Some(model_path) = args.next() else {
        bail!(USAGE);
    };
    let dataset_path = args.next().unwrap_or_else(|| mnist::DEFAULT_PATH.to_string());

    if let Some(extra) = args.next() {
        bail!("unexpected argument {extra}, {USAGE}");
    }

    Ok((PathBuf::from(model_path), PathBuf::from(dataset_path)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let (model_path, dataset_path) = parse_args(env::args().skip(1))?;

    let spec = trainer_spec(&model_path)?;
    let (mut train, test) = mnist::load(&dataset_path)?;
    let mut trainer = TrainerBuilder::new().build(&spec)?;
    let cancel = trainer.cancel_token();

    let mut handle = task::spawn_blocking(move || trainer.train(&mut train, Some(&test)));

    let report = tokio::select! {
        ret = &mut handle => ret??,
        _ = signal::ctrl_c() => {
            info!("received SIGINT, stopping after the current batch");
            cancel.cancel();
            handle.await??
        }
    };

    info!(
        epochs = report.epochs.len(),
        skipped = report.skipped_batches(),
        best:? = report.best,
        cancelled = report.cancelled;
        "training finished"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(args: &[&str]) -> impl Iterator<Item = String> {
        args.iter().map(|arg| arg.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn dataset_path_defaults_to_mnist() {
        let (model, dataset) = parse_args(args(&["model.bin"])).unwrap();

        assert_eq!(model, PathBuf::from("model.bin"));
        assert_eq!(dataset, PathBuf::from(mnist::DEFAULT_PATH));
    }

    #[test]
    fn dataset_path_is_the_second_argument() {
        let (model, dataset) = parse_args(args(&["model.bin", "/data/digits"])).unwrap();

        assert_eq!(model, PathBuf::from("model.bin"));
        assert_eq!(dataset, PathBuf::from("/data/digits"));
    }

    #[test]
    fn missing_or_extra_arguments_are_rejected() {
        assert!(parse_args(args(&[])).is_err());
        assert!(parse_args(args(&["model.bin", "data", "extra"])).is_err());
    }
}

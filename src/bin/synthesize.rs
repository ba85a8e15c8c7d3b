//! Write a pair of synthetic input files into a directory.
//!
//! Usage: `synthesize [OUT_DIR] [LAB_NOISE]`

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use ct_composition::composition::Composition;
use ct_composition::config::Config;
use ct_composition::synthetic::SyntheticCore;
use ndarray::arr1;
use ndarray_rand::rand::SeedableRng;
use rand_isaac::Isaac64Rng;

const SEED: u64 = 40;
const CORE_DEPTH: f64 = 120.;
const NUM_SAMPLES: usize = 120;
const NUM_SCANS: usize = 2400;

fn run(out_dir: &Path, lab_noise: f64) -> ct_composition::Result<()> {
    let config = Config::default();
    let mut rng = Isaac64Rng::seed_from_u64(SEED);
    let composition = Composition::from_params(&arr1(&[0.3, 0.5, 0.1, 0.2]))?;
    log::info!("generating cores with\n{composition}");

    let sample = SyntheticCore::generate(&mut rng, composition, NUM_SAMPLES, CORE_DEPTH);
    let sample_path = out_dir.join(&config.input_path_sample_res);
    sample.write_sample_resolution(&sample_path, lab_noise, &mut rng)?;

    let scans = SyntheticCore::generate(&mut rng, composition, NUM_SCANS, CORE_DEPTH);
    let high_path = out_dir.join(&config.input_path_high_res);
    scans.write_high_resolution(&high_path)?;

    log::info!(
        "wrote {} and {}",
        sample_path.display(),
        high_path.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args_os().skip(1);
    let out_dir = args.next().map_or_else(|| PathBuf::from("."), PathBuf::from);
    let lab_noise = match args.next().map(|arg| arg.to_string_lossy().parse::<f64>()) {
        None => 0.01,
        Some(Ok(noise)) => noise,
        Some(Err(err)) => {
            log::error!("LAB_NOISE: {err}");
            return ExitCode::FAILURE;
        }
    };

    match run(&out_dir, lab_noise) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

use std::path::Path;
use std::process::ExitCode;

use ct_composition::config::Config;
use ct_composition::pipeline;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // Optional path to a TOML configuration, otherwise the defaults
    let config = match std::env::args_os().nth(1) {
        Some(path) => Config::from_file(Path::new(&path)),
        None => Ok(Config::default()),
    };

    match config.and_then(|config| pipeline::run(&config)) {
        Ok(report) => {
            print!("{report}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

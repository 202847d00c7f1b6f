use clap::Parser;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::PathBuf;

use rusty_microcircuit::driver;
use rusty_microcircuit::error::SNNError;
use rusty_microcircuit::microcircuit::Microcircuit;
use rusty_microcircuit::params::Params;

const LOG_PATTERN: &str = "{d(%H:%M:%S%.3f)} {l} - {m}\n";

#[derive(Parser, Debug)]
#[command(about = "Simulate the cortical microcircuit model of Potjans & Diesmann (2014)")]
struct Args {
    /// JSON file with the simulation parameters
    #[arg(long)]
    sim_params: Option<PathBuf>,
    /// JSON file with the network parameters
    #[arg(long)]
    net_params: Option<PathBuf>,
    /// JSON file with the stimulus parameters
    #[arg(long)]
    stim_params: Option<PathBuf>,
    /// The directory of the output files
    #[arg(long)]
    data_path: Option<PathBuf>,
    /// The simulation duration (in ms)
    #[arg(long)]
    t_sim: Option<f64>,
    /// Enable the thalamic input
    #[arg(long)]
    thalamic_input: bool,
    /// The log level, must be one of: off, error, warn, info, debug, trace
    #[arg(long, default_value = "info")]
    log_level: String,
    /// Also write the log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn load_params(&self) -> Result<Params, SNNError> {
        let mut params = Params::load(
            self.sim_params.as_deref(),
            self.net_params.as_deref(),
            self.stim_params.as_deref(),
        )?;
        if let Some(data_path) = &self.data_path {
            params.sim.data_path = data_path.clone();
        }
        if let Some(t_sim) = self.t_sim {
            params.sim.t_sim = t_sim;
        }
        if self.thalamic_input {
            params.stim.thalamic_input = true;
        }
        Ok(params)
    }
}

fn init_logging(args: &Args) -> Result<(), SNNError> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();
    let mut config =
        Config::builder().appender(Appender::builder().build("stdout", Box::new(stdout)));
    let mut root = Root::builder().appender("stdout");

    if let Some(log_file) = &args.log_file {
        let logfile = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
            .build(log_file)
            .map_err(|e| SNNError::ConfigError(e.to_string()))?;
        config = config.appender(Appender::builder().build("logfile", Box::new(logfile)));
        root = root.appender("logfile");
    }

    let level: LevelFilter = args
        .log_level
        .parse()
        .map_err(|_| SNNError::ConfigError(format!("Invalid log level: {}", args.log_level)))?;
    let config = config
        .build(root.build(level))
        .map_err(|e| SNNError::ConfigError(e.to_string()))?;
    log4rs::init_config(config).map_err(|e| SNNError::ConfigError(e.to_string()))?;
    Ok(())
}

fn main() -> Result<(), SNNError> {
    let args = Args::parse();
    init_logging(&args)?;
    log::info!("{:?}", args);

    let report = driver::run(|| args.load_params(), Microcircuit::new)?;
    println!("\n{}", report);
    Ok(())
}

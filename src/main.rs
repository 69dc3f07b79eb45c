//! Self-correcting predictor CLI
//!
//! Builds or restores a feed-forward network, trains it, and serves predictions from
//! stdin, retraining on every verified request it gets wrong.

use clap::{Args, Parser, Subcommand};
use recommender::model::Activation;
use recommender::{Config, Result};

#[derive(Parser)]
#[command(name = "recommender")]
#[command(about = "Self-correcting feed-forward predictor", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Settings that override the config file, also readable from the environment
#[derive(Args)]
struct Overrides {
    /// Log per-epoch training progress
    #[arg(long, env = "DEBUG", global = true)]
    debug: bool,

    /// Snapshot to restore instead of building a new network
    #[arg(long, env = "RESTORE_FROM", global = true)]
    restore_from: Option<String>,

    /// Where the final snapshot is written
    #[arg(long, env = "PERSIST_TO", global = true)]
    persist_to: Option<String>,

    /// Input layer width
    #[arg(long, env = "INPUT_LAYERS", global = true)]
    input_layers: Option<usize>,

    /// Hidden layer widths, comma separated
    #[arg(long, env = "HIDDEN_LAYERS", value_delimiter = ',', global = true)]
    hidden_layers: Option<Vec<usize>>,

    /// Output layer width
    #[arg(long, env = "OUTPUT_LAYERS", global = true)]
    output_layers: Option<usize>,

    /// Hidden layer activation
    #[arg(long, env = "ACTIVATION_METHOD", global = true)]
    activation: Option<Activation>,

    /// Labelled sample file to train on at startup
    #[arg(long, env = "TRAINING_DATA_SOURCE", global = true)]
    data_source: Option<String>,

    #[arg(long, env = "TRAINING_EPOCHS", global = true)]
    epochs: Option<usize>,

    #[arg(long, env = "TRAINING_RATE", global = true)]
    rate: Option<f64>,

    /// Train hierarchically instead of in one batch
    #[arg(long, env = "N_LEVEL", global = true)]
    n_level: bool,
}

impl Overrides {
    fn apply(self, config: &mut Config) {
        if self.debug {
            config.training.debug = true;
        }
        if self.n_level {
            config.training.n_level = true;
        }
        if let Some(path) = self.restore_from {
            config.persistence.restore_from = Some(path);
        }
        if let Some(path) = self.persist_to {
            config.persistence.persist_to = path;
        }
        if let Some(input) = self.input_layers {
            config.network.input = input;
        }
        if let Some(hidden) = self.hidden_layers {
            config.network.hidden = hidden;
        }
        if let Some(output) = self.output_layers {
            config.network.output = output;
        }
        if let Some(activation) = self.activation {
            config.network.activation = activation;
        }
        if let Some(source) = self.data_source {
            config.training.data_source = Some(source);
        }
        if let Some(epochs) = self.epochs {
            config.training.epochs = epochs;
        }
        if let Some(rate) = self.rate {
            config.training.rate = rate;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build or restore the network, train it, and answer requests from stdin (default)
    Serve,
    /// Build or restore the network, train it, and write the snapshot
    Train,
    /// Initialize a new project with default config
    Init,
    /// Write a synthetic "which is larger" dataset
    Generate {
        /// Output file; must not exist yet
        #[arg(default_value = "training.txt")]
        target: String,
        /// Number of samples
        #[arg(long, default_value_t = recommender::data::generate::DEFAULT_SAMPLE_COUNT)]
        count: usize,
        /// Seed for a reproducible dataset
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Load or create config
    let mut config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };
    cli.overrides.apply(&mut config);
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Initialize logging
    let log_level = if cli.verbose || config.training.debug {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => commands::serve(&config),
        Commands::Train => commands::train(&config),
        Commands::Init => commands::init(&cli.config, &config),
        Commands::Generate {
            target,
            count,
            seed,
        } => commands::generate(&target, count, seed),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use std::io::BufRead;

    use recommender::data::generate::generate_file;
    use recommender::predict::{DefaultPredictor, Predictor};
    use recommender::supervisor::serve::run_session;
    use recommender::supervisor::{ShutdownReport, Supervisor};
    use recommender::RecommenderError;
    use recommender::training::VerifyOptions;

    pub fn init(config_path: &str, config: &Config) -> Result<()> {
        Config::default().save(config_path)?;
        println!("Created default config at {}", config_path);

        let persist_dir = std::path::Path::new(&config.persistence.persist_to)
            .parent()
            .filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = persist_dir {
            std::fs::create_dir_all(dir)?;
            println!("Created {}/ for network snapshots", dir.display());
        }

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'recommender generate' to write a sample dataset");
        println!("  3. Set training.data_source and run 'recommender train'");
        println!("  4. Run 'recommender serve' and type '<input> [expected]' lines");

        Ok(())
    }

    pub fn generate(target: &str, count: usize, seed: Option<u64>) -> Result<()> {
        let written = generate_file(target, count, seed)?;
        println!("Wrote {} samples to {}", written, target);
        Ok(())
    }

    pub fn train(config: &Config) -> Result<()> {
        let supervisor = start::<DefaultPredictor>(config)?;
        let report = supervisor.shutdown(&config.persistence.persist_to)?;
        print_shutdown(&report);
        Ok(())
    }

    pub fn serve(config: &Config) -> Result<()> {
        let supervisor = start::<DefaultPredictor>(config)?;
        let persist_to = &config.persistence.persist_to;

        let setup = tokio::runtime::Runtime::new()
            .map_err(RecommenderError::from)
            .and_then(|runtime| Ok((runtime, spawn_stdin_reader()?)));
        let (runtime, lines) = match setup {
            Ok(setup) => setup,
            Err(e) => {
                // Nothing was served, but startup training is still worth keeping
                match supervisor.shutdown(persist_to) {
                    Ok(report) => print_shutdown(&report),
                    Err(shutdown_err) => log::error!("Failed to save network: {}", shutdown_err),
                }
                return Err(e);
            }
        };

        println!("Ready. Enter '<input>' or '<input> <expected>', e.g. 0.9,0.1 1,0");
        let interrupted = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for interrupt: {}", e);
                std::future::pending::<()>().await;
            }
        };
        let report = run_session(
            supervisor,
            &runtime,
            lines,
            interrupted,
            &mut std::io::stdout(),
            persist_to,
        )?;
        print_shutdown(&report);
        Ok(())
    }

    /// Build or restore the predictor and run startup training
    fn start<P: Predictor>(config: &Config) -> Result<Supervisor<P>> {
        let params = config.training_params();
        let supervisor = match &config.persistence.restore_from {
            Some(path) => {
                println!("Restoring network from {}...", path);
                Supervisor::<P>::restore_from_path(path, params)?
            }
            None => Supervisor::<P>::construct(&config.shape(), config.network.activation, params)?,
        };
        println!("Network: {}", supervisor.shape());

        let supervisor = supervisor.with_verify_options(
            VerifyOptions::new(config.verification.rounding, config.verification.precision)
                .with_tolerance(config.verification.tolerance),
        );

        match &config.training.data_source {
            Some(source) if config.training.n_level => {
                println!("Training hierarchically on {}...", source);
                let report = supervisor.train_hierarchical_from(source, params)?;
                for round in &report.rounds {
                    println!(
                        "  round {}: trained {}, verified {}, failed {}",
                        round.depth, round.trained, round.verified, round.failed
                    );
                }
                if report.abandoned > 0 {
                    println!("  {} samples still failing at the depth limit", report.abandoned);
                }
            }
            Some(source) => {
                println!("Training on {}...", source);
                supervisor.train_from(source, params)?;
            }
            None if config.persistence.restore_from.is_none() => {
                log::warn!("No training data source configured, serving an untrained network");
            }
            None => {}
        }

        Ok(supervisor)
    }

    /// Read stdin lines on a plain thread so a blocked read never holds up runtime shutdown
    fn spawn_stdin_reader() -> Result<tokio::sync::mpsc::Receiver<String>> {
        let (tx, rx) = tokio::sync::mpsc::channel::<String>(16);

        std::thread::Builder::new()
            .name("stdin".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    match line {
                        Ok(line) => {
                            if tx.blocking_send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            log::error!("Failed to read input: {}", e);
                            break;
                        }
                    }
                }
            })?;

        Ok(rx)
    }

    fn print_shutdown(report: &ShutdownReport) {
        println!(
            "Applied {} corrections, saved network to {}",
            report.corrections_applied,
            report.snapshot.display()
        );
        if let Some(previous) = &report.rotated {
            println!("Previous network kept at {}", previous.display());
        }
    }
}

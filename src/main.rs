//! nmb - main CLI entry point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::env;
use tracing_subscriber::{
    filter::Directive, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use nmb::{
    cli::{Args, Commands, Config},
    doctor::Doctor,
    repl::{Command, Engine},
};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let exit_code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            1
        }
    };

    std::process::exit(exit_code);
}

async fn run(args: Args) -> Result<i32> {
    let mut config =
        Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    init_logging(&args, &config);

    let command = match args.command() {
        Commands::Start => {
            let mut engine = Engine::interactive(config)?;
            engine.run().await?;
            return Ok(0);
        }
        Commands::Doctor => return run_doctor(&config).await,
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            return Ok(0);
        }
        Commands::List => Command::List,
        Commands::Update => Command::Update,
        Commands::Install { names } => Command::Install { names },
        Commands::Remove { name } => Command::Remove { name: Some(name) },
        Commands::Read { log } => Command::Read { log: Some(log) },
    };

    // one-shot subcommands share the REPL handlers
    let mut engine = Engine::interactive(config)?;
    engine.setup_directories()?;
    engine.execute(command).await?;
    Ok(0)
}

async fn run_doctor(config: &Config) -> Result<i32> {
    let doctor = Doctor::new(config);
    let checks = doctor.run_diagnostics().await;
    Doctor::display_results(&checks);

    if Doctor::overall_status(&checks) {
        println!("{}", "All checks passed".green());
        Ok(0)
    } else {
        println!("{}", "Some checks failed".red());
        Ok(1)
    }
}

/// Level from flags, then `NMB_LOG_LEVEL`, then the config file.
/// `RUST_LOG` replaces all of it when set.
fn init_logging(args: &Args, config: &Config) {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let level = match args.log_level() {
            Some(level) => level.to_string(),
            None => env::var("NMB_LOG_LEVEL").unwrap_or_else(|_| config.logging.level.clone()),
        };

        let mut filter = EnvFilter::from_default_env();

        if env::var("RUST_LOG").is_err() {
            for directive in [
                format!("nmb={}", level.to_lowercase()),
                "hyper=warn".to_string(),
                "reqwest=warn".to_string(),
            ] {
                match directive.parse::<Directive>() {
                    Ok(directive) => filter = filter.add_directive(directive),
                    Err(_) => eprintln!("Invalid log directive '{}', ignoring", directive),
                }
            }
        }

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    });
}

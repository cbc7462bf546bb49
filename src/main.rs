use clap::Parser;
use colored::*;
use eyre::{Result, WrapErr};
use log::{LevelFilter, info};
use macrolog::{InterpretError, InterpretRequest, InterpretResponse, MealInterpreter, MealRequest, NutritionRecord};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

mod cli;
mod config;

use cli::Cli;
use cli::commands::{Commands, join_words};
use config::Config;

fn setup_logging(config: &Config) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("macrolog")
        .join("logs");

    fs::create_dir_all(&log_dir).wrap_err("Failed to create log directory")?;

    let log_file = log_dir.join("macrolog.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .wrap_err("Failed to open log file")?,
    );

    let mut builder = env_logger::Builder::new();
    if let Some(level) = config.log_level.as_deref().and_then(|l| l.parse::<LevelFilter>().ok()) {
        builder.filter_level(level);
    }
    // RUST_LOG wins over the config file
    builder.parse_default_env();
    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        eprintln!(
            "{} {:?} / {}",
            "Using model:".yellow(),
            config.llm.provider,
            config.llm.model()
        );
    }

    let client = config.llm.build_client()?;
    let interpreter = MealInterpreter::with_options(client, config.interpreter_options());

    match &cli.command {
        Commands::Parse { description, json } => {
            let request = MealRequest::new_meal(join_words(description));
            let record = interpret_with_ctrl_c(&interpreter, request).await?;
            print_output(&record, *json)
        }
        Commands::Refine {
            record,
            instruction,
            json,
        } => {
            let prior = read_record(record)?;
            let request = MealRequest::refine(join_words(instruction), prior);
            let refined = interpret_with_ctrl_c(&interpreter, request).await?;
            print_output(&refined, *json)
        }
        Commands::Handle { input } => {
            let raw = read_input(input.as_deref())?;
            let response = match serde_json::from_str::<InterpretRequest>(&raw) {
                Ok(request) => interpreter.handle(request).await,
                Err(e) => InterpretResponse::failure(&InterpretError::InvalidInput(format!(
                    "request is not a valid envelope: {}",
                    e
                ))),
            };
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
    }
}

async fn interpret_with_ctrl_c(interpreter: &MealInterpreter, request: MealRequest) -> Result<NutritionRecord> {
    let record = interpreter
        .interpret_until(request, tokio::signal::ctrl_c())
        .await
        .wrap_err("Meal interpretation failed")?;
    Ok(record)
}

fn print_output(record: &NutritionRecord, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
    } else {
        cli::render::print_record(record);
    }
    Ok(())
}

/// Read a record file, or stdin for "-"
fn read_record(path: &Path) -> Result<NutritionRecord> {
    let source = (path != Path::new("-")).then_some(path);
    let raw = read_input(source)?;
    let record: NutritionRecord = serde_json::from_str(&raw).wrap_err("Record is not valid nutrition JSON")?;
    Ok(record)
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path).wrap_err(format!("Failed to read {}", path.display())),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .wrap_err("Failed to read stdin")?;
            Ok(buffer)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).wrap_err("Failed to load configuration")?;

    // Logging level comes from the config, so it is set up second
    setup_logging(&config).wrap_err("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.wrap_err("Application failed")?;

    Ok(())
}

//! Insight-CORE command-line entry point.
//!
//! ## CLI Subcommands
//!
//! - `status` - Model availability (exit 0 when ready)
//! - `download` - Fetch the configured model
//! - `delete` - Release and remove the model file
//! - `generate` - Print insights for a nutrition snapshot
//! - `config show|defaults|validate` - Inspect configuration

use std::process::ExitCode;
use std::sync::Arc;

use insight_core::cli::{self, config_cmd, insights_cmd, GenerateArgs};
use insight_core::telemetry;
use insight_core::{InsightRuntime, RuntimeConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let config_file = cli::config_path(&argv);
    let args = cli::strip_config_flag(&argv);
    let command = args.first().map(|s| s.as_str()).unwrap_or("help");

    match command {
        "help" | "--help" | "-h" => {
            print_usage();
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("insight-core {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        "config" => {
            let subcommand = args.get(1).map(|s| s.as_str()).unwrap_or("show");
            let file = config_file.as_deref();
            match subcommand {
                "show" => exit(config_cmd::run_show(file)),
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => exit(config_cmd::run_validate(file)),
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    ExitCode::FAILURE
                }
            }
        }
        "status" | "download" | "delete" | "generate" => {
            let env = match config_cmd::load(config_file.as_deref()) {
                Ok(env) => env,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::from(2);
                }
            };
            if let Err(e) = telemetry::init_logging(&env.log) {
                eprintln!("Logging disabled: {}", e);
            }

            let generate_args = if command == "generate" {
                match GenerateArgs::parse(&args[1..]) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        eprintln!("{}", e);
                        return ExitCode::from(2);
                    }
                }
            } else {
                GenerateArgs::default()
            };
            let snapshot = match insights_cmd::read_snapshot(generate_args.snapshot.as_deref()) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    eprintln!("Error reading snapshot: {}", e);
                    return ExitCode::from(2);
                }
            };

            let runtime = InsightRuntime::new(RuntimeConfig::from(&env), Arc::new(snapshot));
            let code = match command {
                "status" => cli::run_status(&runtime),
                "download" => cli::run_download(&runtime).await,
                "delete" => cli::run_delete(&runtime).await,
                _ => cli::run_generate(&runtime, &generate_args).await,
            };
            exit(code)
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn exit(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "insight-core - on-device nutrition insights v{}

USAGE:
    insight-core-cli [--config FILE] <COMMAND> [OPTIONS]

COMMANDS:
    status       Show model availability as JSON (exit 0 when ready)
    download     Download the configured model (Ctrl+C cancels)
    delete       Release the model and remove its file
    generate     Print insights as JSON
    config       Show, validate or list default configuration
    version      Show version information
    help         Show this help message

GENERATE OPTIONS:
    --refresh          Ignore the cached set
    --snapshot FILE    Nutrition snapshot JSON (default: empty day)
    --focus CATEGORY   macro_balance, protein, consistency, hydration,
                       onboarding or general

EXAMPLES:
    insight-core-cli status
    insight-core-cli generate --snapshot today.json --focus protein
    insight-core-cli --config insight.toml config validate

ENVIRONMENT:
    INSIGHT_CORE_CONFIG   TOML config file (same as --config)
    INSIGHT_CORE_*        See `insight-core-cli config defaults`

EXIT CODES:
    0  Success / Ready
    1  Failure / Not ready
    2  Configuration or argument error
",
        version
    );
}

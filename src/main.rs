use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use testsmith::config::AppConfig;
use testsmith::data::DEFAULT_MAX_RETRIES;

mod cli;

#[derive(Parser)]
#[command(name = "testsmith")]
#[command(about = "Generate Kotlin service tests and verify them against the Gradle build", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Enable verbose debug output")]
    verbose: bool,

    #[arg(long, global = true, help = "Configuration file (defaults to testsmith.yml if present)")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Serve the test generation tools over MCP on stdio")]
    Serve,

    #[command(about = "Analyze a service class and print its model")]
    Analyze {
        #[arg(long, default_value = ".", help = "Project root")]
        project_root: PathBuf,
        #[arg(help = "Service source path relative to the project root")]
        service_path: String,
    },

    #[command(about = "Generate a test for one service")]
    Generate {
        #[arg(long, default_value = ".", help = "Project root")]
        project_root: PathBuf,
        #[arg(help = "Service source path relative to the project root")]
        service_path: String,
        #[arg(long, help = "Output test path (inferred when omitted)")]
        test_path: Option<String>,
        #[arg(long, help = "JSON symbol overview to use instead of pattern extraction")]
        symbols: Option<PathBuf>,
        #[arg(long, help = "Generate an integration-tagged test")]
        integration: bool,
        #[arg(long, help = "Skip compile and test verification")]
        no_validate: bool,
        #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
        max_retries: u32,
    },

    #[command(about = "Generate tests for several services in order")]
    Batch {
        #[arg(long, default_value = ".", help = "Project root")]
        project_root: PathBuf,
        #[arg(required = true, help = "Service source paths relative to the project root")]
        service_paths: Vec<String>,
        #[arg(long, help = "Skip compile and test verification")]
        no_validate: bool,
        #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
        max_retries: u32,
        #[arg(long, help = "Stop after the first failing service")]
        stop_on_error: bool,
    },

    #[command(about = "Compile and run an existing test")]
    Validate {
        #[arg(long, default_value = ".", help = "Project root")]
        project_root: PathBuf,
        #[arg(help = "Test source path relative to the project root")]
        test_path: String,
        #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
        max_retries: u32,
        #[arg(long, help = "Generate a JaCoCo coverage report after a passing run")]
        coverage: bool,
    },

    #[command(about = "Print the testing standards documents")]
    Standards,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    // stdout carries protocol messages and reports.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli::Config {
        verbose: cli.verbose,
        app: AppConfig::load(cli.config.as_deref())?,
    };

    match cli.command {
        Commands::Serve => {
            cli::serve(&config).await?;
        }
        Commands::Analyze {
            project_root,
            service_path,
        } => {
            cli::analyze(project_root, service_path, &config).await?;
        }
        Commands::Generate {
            project_root,
            service_path,
            test_path,
            symbols,
            integration,
            no_validate,
            max_retries,
        } => {
            let options = cli::GenerateOptions {
                project_root,
                service_path,
                test_path,
                symbols,
                integration,
                validate: !no_validate,
                max_retries,
            };
            cli::generate(options, &config).await?;
        }
        Commands::Batch {
            project_root,
            service_paths,
            no_validate,
            max_retries,
            stop_on_error,
        } => {
            let options = cli::BatchOptions {
                project_root,
                service_paths,
                validate: !no_validate,
                max_retries,
                continue_on_error: !stop_on_error,
            };
            cli::batch(options, &config).await?;
        }
        Commands::Validate {
            project_root,
            test_path,
            max_retries,
            coverage,
        } => {
            cli::validate(project_root, test_path, max_retries, coverage, &config).await?;
        }
        Commands::Standards => {
            cli::standards(&config)?;
        }
    }

    Ok(())
}

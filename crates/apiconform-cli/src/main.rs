//! apiconform CLI - check a running API against its contract document

mod storage;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use apiconform_core::{
    RunConfig, RunReport, TestCaseRegistry, Verdict, VerdictPolicy, VerdictStatus,
    generate_schema, to_http_file,
};
use apiconform_runner::{Suite, plan, resolve};

const DEFAULT_CONFIG: &str = "apiconform.toml";

#[derive(Parser)]
#[command(name = "apiconform")]
#[command(about = "Check a running HTTP API against its OpenAPI/Swagger contract")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Strict mode (warnings become failures). Use --strict false to disable.
    #[arg(long, global = true, default_value_t = true, action = ArgAction::Set)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every scenario against the target API
    Run {
        /// Run configuration (TOML, or JSON by extension)
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Contract document (overrides `contract` in the config)
        #[arg(long)]
        contract: Option<PathBuf>,

        /// Debug logging (request URLs, response bodies)
        #[arg(long)]
        debug: bool,

        /// Directory for the .http reproduction file
        #[arg(short, long, default_value = ".apiconform")]
        output_dir: PathBuf,

        /// Scenario whose failures are reported but do not fail the run
        #[arg(long = "allow-failure", value_name = "SCENARIO")]
        allow_failures: Vec<String>,
    },

    /// Resolve the contract and show what would run, without sending requests
    Plan {
        /// Run configuration (TOML, or JSON by extension)
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Contract document (overrides `contract` in the config)
        #[arg(long)]
        contract: Option<PathBuf>,
    },

    /// Write a starter apiconform.toml
    Init,

    /// Export JSON Schema for the run report
    Schema,
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(3)
        }
    }
}

/// Logs go to stderr; `RUST_LOG` wins over the flag.
fn init_logging(debug: bool, output: OutputFormat) {
    let default = match (debug, output) {
        (true, _) => "debug",
        (false, OutputFormat::Terminal) => "info",
        (false, _) => "warn",
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

fn load_config(path: &Path) -> Result<RunConfig> {
    RunConfig::load(path).with_context(|| format!("loading run configuration {}", path.display()))
}

/// The flag wins; otherwise `contract` from the config, relative to the config file.
fn contract_path(flag: Option<PathBuf>, config: &RunConfig, config_path: &Path) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path);
    }
    let path = config.contract.clone().context(
        "no contract document: pass --contract or set `contract` in the configuration",
    )?;
    if path.is_relative() {
        if let Some(dir) = config_path.parent() {
            return Ok(dir.join(path));
        }
    }
    Ok(path)
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Run {
            config,
            contract,
            debug,
            output_dir,
            allow_failures,
        } => {
            init_logging(debug, cli.output);
            let cfg = load_config(&config)?;
            let contract = contract_path(contract, &cfg, &config)?;

            if cli.output != OutputFormat::Silent {
                eprintln!("Config:");
                eprintln!("  contract: {}", contract.display());
                eprintln!("  base_url: {}", cfg.base_url);
                if !cfg.headers.is_empty() {
                    eprintln!("  headers:  {} configured", cfg.headers.len());
                }
                eprintln!("  scenarios: {}", cfg.scenarios.len());
                eprintln!();
            }

            let started = Instant::now();
            let suite = Suite::setup(&cfg, &contract)
                .with_context(|| format!("setting up suite for {}", contract.display()))?;
            let results = suite
                .runner()
                .run(&cfg.scenarios)
                .context("preparing scenarios")?;
            let duration_secs = started.elapsed().as_secs_f64();

            let policy = VerdictPolicy {
                strict: cli.strict,
                allow_failures,
            };
            let verdict = policy.verdict(&results);
            let report = RunReport::new(
                suite.contract.dialect().as_str(),
                contract.display().to_string(),
                cfg.base_url.clone(),
                results,
            );

            match cli.output {
                OutputFormat::Terminal => print_terminal(&report, &verdict),
                OutputFormat::Json => {
                    let json_output = serde_json::json!({
                        "verdict": {
                            "status": verdict.status.to_string(),
                            "exit_code": verdict.exit_code,
                            "reason": verdict.reason,
                        },
                        "report": report,
                    });
                    println!("{}", serde_json::to_string_pretty(&json_output)?);
                }
                OutputFormat::Silent => {}
            }

            if report.failed > 0 {
                let http_path = output_dir.join("reproductions.http");
                let headers = suite.session.headers();
                let written = std::fs::create_dir_all(&output_dir)
                    .and_then(|()| std::fs::write(
                    &http_path,
                    to_http_file(report.failures(), headers, cfg.auth.is_some()),
                ));
                match written {
                    Ok(()) => {
                        if cli.output == OutputFormat::Terminal {
                            println!("Reproductions: {}", http_path.display());
                        }
                    }
                    Err(e) => eprintln!("Warning: failed to write .http file: {e}"),
                }
            }

            let report_data = storage::ReportData {
                config: &cfg,
                report: &report,
                verdict: &verdict,
                headers: suite.session.headers(),
                duration_secs,
            };
            match storage::save_report(&report_data) {
                Ok(path) => {
                    if cli.output != OutputFormat::Silent {
                        eprintln!("Report saved: {}", path.display());
                    }
                }
                Err(e) => eprintln!("Warning: failed to save report: {e}"),
            }

            Ok(verdict.exit_code)
        }

        Commands::Plan { config, contract } => {
            init_logging(false, cli.output);
            let cfg = load_config(&config)?;
            let contract = contract_path(contract, &cfg, &config)?;
            let document = resolve(&contract)
                .with_context(|| format!("resolving contract {}", contract.display()))?;
            let registry = TestCaseRegistry::from_config(&cfg);
            let plan = plan(&cfg, &registry, &document);

            match cli.output {
                OutputFormat::Terminal => println!("{}", plan.to_terminal()),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
                OutputFormat::Silent => {}
            }
            Ok(i32::from(plan.has_errors()))
        }

        Commands::Init => {
            let config_path = Path::new(DEFAULT_CONFIG);
            if config_path.exists() {
                eprintln!("{DEFAULT_CONFIG} already exists");
                return Ok(1);
            }

            std::fs::write(config_path, RunConfig::example())
                .with_context(|| format!("writing {DEFAULT_CONFIG}"))?;
            println!("Created {DEFAULT_CONFIG}");
            println!("\nEdit the file to configure:");
            println!("  - contract: path to your OpenAPI/Swagger document");
            println!("  - base_url: API under test");
            println!("  - headers / auth: credentials");
            println!("  - test_cases and scenarios: what to check");
            Ok(0)
        }

        Commands::Schema => {
            println!("{}", generate_schema());
            Ok(0)
        }
    }
}

fn print_terminal(report: &RunReport, verdict: &Verdict) {
    let icon = if verdict.status == VerdictStatus::Pass {
        "PASS"
    } else {
        "FAIL"
    };
    println!("\n{icon}: {}", verdict.reason);
    println!(
        "  Cases: {} total, {} passed, {} failed, {} warnings",
        report.total, report.passed, report.failed, report.warnings
    );
    println!("  Contract: {} ({})", report.contract, report.dialect);
    println!("  Exit code: {}", verdict.exit_code);

    let warned: Vec<_> = report
        .results
        .iter()
        .filter(|r| r.passed() && !r.warnings.is_empty())
        .collect();
    if !warned.is_empty() {
        println!("\nWarnings ({}):", warned.len());
        for r in warned {
            for w in &r.warnings {
                println!("  {}: {w}", r.label());
            }
        }
    }

    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        println!("\nFailures ({}):", failures.len());
        for r in failures {
            let Some(failure) = &r.failure else { continue };
            println!(
                "  [{:?}] {} GET {} ({})",
                failure.severity(),
                r.label(),
                r.request.url,
                failure.label()
            );
            for line in failure.describe() {
                println!("         {line}");
            }
        }
    }
}

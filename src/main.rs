use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};

use sitecheck::checker::PatternChecker;
use sitecheck::config::Config;
use sitecheck::countdown::countdown;
use sitecheck::fanout::check_websites;
use sitecheck::orchestration::{CheckOrchestrator, CheckReport, OrchestratorConfig};
use sitecheck::sleeper::DefaultSleeper;
use sitecheck::{slog, slog_error, slog_warn, Result};

/// sitecheck - concurrent URL checks with a pluggable predicate
#[derive(Parser, Debug)]
#[command(name = "sitecheck")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    SITECHECK_DEBUG=1     Enable debug logging (alternative to --debug)")]
pub struct Cli {
    /// Enable debug logging (writes to ~/.sitecheck/sitecheck.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Config file (defaults to ~/.sitecheck/sitecheck.toml)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Check URLs concurrently
    Check {
        /// URLs to check (duplicates allowed)
        #[arg(required = true)]
        urls: Vec<String>,

        /// Regex marking a URL as failing (repeatable, adds to config)
        #[arg(long)]
        deny: Vec<String>,

        /// Simulated latency per check, in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Abandon the run after this many milliseconds
        #[arg(long, conflicts_with = "wait")]
        timeout_ms: Option<u64>,

        /// Cap on checks evaluating at once
        #[arg(long, conflicts_with = "wait")]
        max_concurrent: Option<usize>,

        /// Use the thread-per-URL path that waits without a deadline
        #[arg(long)]
        wait: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Count down to the final word, pausing between numbers
    Countdown {
        /// Number to start from
        #[arg(long)]
        start: Option<u32>,

        /// Word printed at the end
        #[arg(long)]
        final_word: Option<String>,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    sitecheck::log::init_with_debug(cli.debug);
    if cli.debug {
        slog!("sitecheck starting (debug mode enabled)");
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            slog_error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load_optional(cli.config.as_deref())?;

    match cli.command {
        Command::Check {
            urls,
            deny,
            delay_ms,
            timeout_ms,
            max_concurrent,
            wait,
            json,
        } => {
            config.checker.deny.extend(deny);
            if let Some(delay) = delay_ms {
                config.checker.delay_ms = delay;
            }
            if timeout_ms.is_some() {
                config.orchestrator.timeout_ms = timeout_ms;
            }
            if max_concurrent.is_some() {
                config.orchestrator.max_concurrent = max_concurrent;
            }
            config.validate()?;
            run_check(&config, urls, wait, json)
        }
        Command::Countdown { start, final_word } => {
            if let Some(start) = start {
                config.countdown_start = start;
            }
            if let Some(word) = final_word {
                config.final_word = word;
            }
            run_countdown(&config)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_check(config: &Config, urls: Vec<String>, wait: bool, json: bool) -> Result<ExitCode> {
    slog!("Check command: urls={}, wait={}", urls.len(), wait);
    let checker = PatternChecker::from_settings(&config.checker)?;

    let report = if wait {
        if let Some(policy) = ignored_wait_policy(config) {
            slog_warn!(
                "--wait ignores the configured timeout={:?} max_concurrent={:?}",
                policy.timeout,
                policy.max_concurrent
            );
        }
        let start = Instant::now();
        let results = check_websites(&checker, urls.as_slice());
        CheckReport {
            results,
            evaluations: urls.len(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        }
    } else {
        let orchestrator = CheckOrchestrator::new(Arc::new(checker), config.orchestrator_config());
        let rt = tokio::runtime::Runtime::new()?;
        let report = rt.block_on(orchestrator.run(urls.as_slice()));
        // Abandoned checks may still be sleeping on the blocking pool.
        rt.shutdown_timeout(Duration::from_millis(100));
        report?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", format_report(&report, io::stdout().is_terminal()));
    }

    Ok(if report.all_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// The orchestrator policy from config that the `--wait` path cannot honour.
fn ignored_wait_policy(config: &Config) -> Option<OrchestratorConfig> {
    let policy = config.orchestrator_config();
    (policy != OrchestratorConfig::default()).then_some(policy)
}

/// One `url: ok|fail` line per URL in URL order, then a summary line.
fn format_report(report: &CheckReport, color: bool) -> String {
    let mut out = String::new();
    for (url, ok) in report.sorted() {
        let status = match (ok, color) {
            (true, true) => "\x1b[32mok\x1b[0m",     // Green
            (false, true) => "\x1b[31mfail\x1b[0m", // Red
            (true, false) => "ok",
            (false, false) => "fail",
        };
        out.push_str(&format!("{}: {}\n", url, status));
    }
    out.push_str(&format!(
        "\n{} checked, {} failed in {}ms\n",
        report.evaluations,
        report.failed().len(),
        report.elapsed_ms
    ));
    out
}

fn run_countdown(config: &Config) -> Result<()> {
    slog!(
        "Countdown command: start={}, sleep_ms={}",
        config.countdown_start,
        config.sleep_ms
    );
    let sleeper = DefaultSleeper::new(config.sleep_duration());
    let stdout = io::stdout();
    let mut out = stdout.lock();
    countdown(&mut out, &sleeper, config.countdown_start, &config.final_word)?;
    writeln!(out)?;
    Ok(())
}

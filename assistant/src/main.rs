//! Mail and calendar assistant CLI.
//!
//! Resolves a natural-language goal into tool calls and runs them against
//! JSON fixture backends, printing a JSON report on stdout.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{debug, info};

use assistant::exit_codes;
use assistant::io::config::{AgentConfig, DEFAULT_CONFIG_PATH, load_config, write_config};
use assistant::io::fixtures::{CalendarFixture, MailFixture};
use assistant::io::llm::{CommandLlm, LlmClient};
use assistant::logging;
use assistant::planner::{GoalPlanner, LlmPlanner, LlmToolClassifier, Planner};
use assistant::task::{TaskOptions, plan_report, run_task};
use assistant::tools::{ToolRegistry, standard_registry};

#[derive(Parser)]
#[command(
    name = "assistant",
    version,
    about = "Goal-driven mail and calendar assistant"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PlannerKind {
    /// Keyword selection and deterministic argument resolution.
    Goal,
    /// Ask a language model for each step.
    Llm,
}

#[derive(Subcommand)]
enum Command {
    /// Run a goal to completion (or the step ceiling) and print the report.
    Run(RunArgs),
    /// Print the tool calls a goal resolves to, without running them.
    Resolve {
        goal: String,
        #[arg(long, value_parser = parse_date)]
        today: Option<NaiveDate>,
    },
    /// Print the tool catalog.
    Tools,
    /// Write a default config file.
    InitConfig {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    goal: String,
    #[arg(long, value_enum, default_value_t = PlannerKind::Goal)]
    planner: PlannerKind,
    /// Let the model pick tools for the goal planner.
    #[arg(long)]
    classify: bool,
    /// Step ceiling. The goal planner spends one extra step on the final
    /// no-op, so N planned calls need N + 1 steps to report completion.
    #[arg(long)]
    max_steps: Option<u32>,
    /// Allow sending mail and deleting events.
    #[arg(long)]
    approve_destructive: bool,
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Mailbox fixture (JSON). Empty mailbox when omitted.
    #[arg(long)]
    mail: Option<PathBuf>,
    /// Calendar fixture (JSON). Empty primary calendar when omitted.
    #[arg(long)]
    calendar: Option<PathBuf>,
    /// Reference date for relative dates (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    today: Option<NaiveDate>,
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}

fn main() {
    logging::init();
    // clap's own usage exit code (2) would read as INCOMPLETE.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            let code = if err.use_stderr() {
                exit_codes::INVALID
            } else {
                exit_codes::OK
            };
            std::process::exit(code);
        }
    };
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Run(args) => cmd_run(args),
        Command::Resolve { goal, today } => {
            let reference = today.unwrap_or_else(|| Local::now().date_naive());
            print_json(&plan_report(&goal, reference))?;
            Ok(exit_codes::OK)
        }
        Command::Tools => {
            print_json(&registry(None, None)?.catalog())?;
            Ok(exit_codes::OK)
        }
        Command::InitConfig { config, force } => {
            if config.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", config.display());
            }
            write_config(&config, &AgentConfig::default())?;
            println!("{}", config.display());
            Ok(exit_codes::OK)
        }
    }
}

fn cmd_run(args: RunArgs) -> Result<i32> {
    let mut config = load_config(&args.config)?;
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(max_steps) = args.max_steps {
        config.max_steps = max_steps;
    }
    if args.approve_destructive {
        config.approve_destructive = true;
    }
    config.validate()?;
    debug!(?config, "effective config");

    let registry = registry(args.mail.as_deref(), args.calendar.as_deref())?;
    let reference = args.today.unwrap_or_else(|| Local::now().date_naive());
    let mut planner = build_planner(&config, args.planner, args.classify, reference)?;

    info!(goal = %args.goal, planner = ?args.planner, "running task");
    let report = run_task(
        &args.goal,
        &TaskOptions::from(&config),
        &registry,
        planner.as_mut(),
    );
    print_json(&report)?;
    Ok(if report.complete {
        exit_codes::OK
    } else {
        exit_codes::INCOMPLETE
    })
}

fn llm_client(config: &AgentConfig) -> Result<Rc<dyn LlmClient>> {
    let client = CommandLlm::new(&config.planner, |key| std::env::var(key).ok())?;
    Ok(Rc::new(client))
}

fn build_planner(
    config: &AgentConfig,
    kind: PlannerKind,
    classify: bool,
    reference: NaiveDate,
) -> Result<Box<dyn Planner>> {
    match kind {
        PlannerKind::Goal => {
            let planner = GoalPlanner::new(reference);
            if !classify {
                return Ok(Box::new(planner));
            }
            let classifier = LlmToolClassifier::new(llm_client(config)?)?;
            Ok(Box::new(planner.with_classifier(Box::new(classifier))))
        }
        PlannerKind::Llm => Ok(Box::new(LlmPlanner::new(llm_client(config)?)?)),
    }
}

fn registry(mail: Option<&Path>, calendar: Option<&Path>) -> Result<ToolRegistry> {
    let mail = match mail {
        Some(path) => MailFixture::load(path).context("load mail fixture")?,
        None => MailFixture::default(),
    };
    let calendar = match calendar {
        Some(path) => CalendarFixture::load(path).context("load calendar fixture")?,
        None => CalendarFixture::default(),
    };
    Ok(standard_registry(Rc::new(mail), Rc::new(calendar)))
}

/// Pretty JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}

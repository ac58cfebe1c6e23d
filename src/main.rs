//! Overseer - Supervision for interactive Claude Code sessions
//!
//! Watches a coding-assistant CLI, answers routine questions and permission
//! requests from project context, and escalates the rest.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use overseer::context::ContextProvider;
use overseer::decision::{Decision, DecisionEngine, SupervisionMode};
use overseer::error::OverseerError;
use overseer::patterns::{primary_issue, Issue, IssueCategory, PatternClassifier};
use overseer::session::{EventKind, SessionStatus, SupervisionEvent, Supervisor};
use overseer::SupervisorConfig;

#[derive(Parser)]
#[command(name = "overseer")]
#[command(version)]
#[command(about = "Real-time supervision for interactive Claude Code sessions", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a supervision session
    Supervise {
        /// Requirements document (defaults to PRD.md and its fallbacks)
        #[arg(short, long, value_name = "FILE")]
        requirements: Option<PathBuf>,

        /// Supervision mode
        #[arg(short, long, value_enum)]
        mode: Option<SupervisionMode>,

        /// Read monitored output from stdin and emit responses as JSON events
        #[arg(long)]
        observe: bool,

        /// Minimum milliseconds between two delivered responses
        #[arg(long, value_name = "MS")]
        min_interval_ms: Option<u64>,

        /// Extra arguments for the monitored CLI
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Classify output lines
    Classify {
        /// Lines to classify, in order
        #[arg(required = true)]
        lines: Vec<String>,

        /// Print issues as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the project context the supervisor would use
    Context {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the project-instruction file from the requirements document
    Init {
        /// Requirements document (defaults to PRD.md and its fallbacks)
        #[arg(short, long, value_name = "FILE")]
        requirements: Option<PathBuf>,

        /// Regenerate an existing file, keeping user sections
        #[arg(short, long)]
        force: bool,
    },

    /// Show the decision the engine would make for a line (dry run)
    Decide {
        /// Output line to decide on
        line: String,

        /// Supervision mode
        #[arg(short, long, value_enum)]
        mode: Option<SupervisionMode>,

        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "overseer=debug,info"
    } else {
        "overseer=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    // Resolve project path
    let project_path = cli.project.canonicalize().unwrap_or(cli.project.clone());

    if !project_path.exists() {
        eprintln!(
            "{} Project directory does not exist: {}",
            "Error:".red().bold(),
            project_path.display()
        );
        std::process::exit(1);
    }

    let config = match SupervisorConfig::load(&project_path) {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };

    match cli.command {
        Commands::Supervise {
            requirements,
            mode,
            observe,
            min_interval_ms,
            args,
        } => {
            let mut config = config;
            if let Some(mode) = mode {
                config = config.with_mode(mode);
            }
            if let Some(ms) = min_interval_ms {
                config = config.with_min_response_interval_ms(ms);
            }
            let requirements = read_requirements(&project_path, requirements.as_deref())?;
            supervise(&project_path, config, requirements.as_deref(), observe, &args).await?;
        }

        Commands::Classify { lines, json } => {
            let mut classifier =
                PatternClassifier::new().with_window(config.recurrence_window());
            let results: Vec<(String, Vec<Issue>)> = lines
                .into_iter()
                .map(|line| {
                    let issues = classifier.analyze(&line);
                    (line, issues)
                })
                .collect();

            if json {
                let output: Vec<serde_json::Value> = results
                    .iter()
                    .map(|(line, issues)| serde_json::json!({ "line": line, "issues": issues }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                for (line, issues) in &results {
                    println!("{}", line.bold());
                    if issues.is_empty() {
                        println!("   {}", "no issues".dimmed());
                    }
                    for issue in issues {
                        let marker = if issue.intervention_required {
                            "!".red().bold()
                        } else {
                            "·".normal()
                        };
                        println!(
                            "   {} {} {}",
                            marker,
                            category_label(issue.category),
                            issue.summary()
                        );
                    }
                }
            }
        }

        Commands::Context { json } => {
            let mut provider = provider(&project_path, &config).read_only();
            let context = provider.initialize(None);
            let health = provider.health().clone();
            let conditions = provider.condition_report();

            if json {
                let conditions: serde_json::Map<String, serde_json::Value> = conditions
                    .into_iter()
                    .map(|(name, holds)| (name, holds.into()))
                    .collect();
                let output = serde_json::json!({
                    "context": context,
                    "health": health,
                    "conditions": conditions,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("{}", "Project Context".bold());
                println!("{}", "─".repeat(40));
                println!("   Directory:     {}", project_path.display());
                println!(
                    "   Requirements:  {}",
                    if health.requirements_found {
                        format!("{} found", health.requirement_count).green()
                    } else {
                        "not found".yellow()
                    }
                );
                println!(
                    "   Instructions:  {}",
                    if health.instruction_file_found {
                        "found".green()
                    } else {
                        "missing (created on supervise)".yellow()
                    }
                );
                println!("   Project type:  {}", context.project_type);
                println!(
                    "   Frameworks:    {}",
                    if health.frameworks.is_empty() {
                        "none detected".to_string()
                    } else {
                        health.frameworks.join(", ")
                    }
                );
                println!(
                    "   Layout:        tests {} | components {} | lint config {}",
                    yes_no(context.has_tests),
                    yes_no(context.has_component_dir),
                    yes_no(context.has_lint_config)
                );
                if !context.requirements.is_empty() {
                    println!("\n{}", "Requirements:".cyan());
                    for (i, req) in context.requirements.iter().enumerate() {
                        println!("   {}. {}", i + 1, req);
                    }
                }
                println!("\n{}", "Conditions:".cyan());
                for (name, holds) in &conditions {
                    println!("   {:<32} {}", name, yes_no(*holds));
                }
            }
        }

        Commands::Init {
            requirements,
            force,
        } => {
            let requirements = read_requirements(&project_path, requirements.as_deref())?;
            let mut provider = provider(&project_path, &config);
            match provider.write_instructions(requirements.as_deref(), force) {
                Ok(path) => println!("{} Wrote {}", "OK".green().bold(), path.display()),
                Err(e) => exit_with(&e),
            }
        }

        Commands::Decide { line, mode, json } => {
            let mut provider = provider(&project_path, &config).read_only();
            let context = provider.initialize(None);
            let mut classifier = PatternClassifier::new();
            let mut engine = DecisionEngine::new(mode.unwrap_or(config.mode));

            let issues = classifier.analyze(&line);
            let decision = engine.decide(&issues, &line, &context);

            if json {
                let output = serde_json::json!({ "issues": issues, "decision": decision });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                match primary_issue(&issues) {
                    Some(issue) => println!(
                        "{} {}",
                        category_label(issue.category),
                        issue.summary()
                    ),
                    None => println!("{}", "No issues detected".dimmed()),
                }
                match decision {
                    Some(decision) => print_decision(&decision),
                    None if !issues.is_empty() => println!("{}", "No response needed".dimmed()),
                    None => {}
                }
            }
        }
    }

    Ok(())
}

/// Run one supervision session to completion or Ctrl-C.
async fn supervise(
    project: &Path,
    config: SupervisorConfig,
    requirements: Option<&str>,
    observe: bool,
    args: &[String],
) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<SupervisionEvent>();
    let supervisor = Supervisor::new(project, config).with_events(tx);

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if observe {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::warn!("Could not serialize event: {}", e),
                }
            } else {
                print_event(&event);
            }
        }
    });

    let handle = if observe {
        supervisor.observe(requirements, tokio::io::stdin())
    } else {
        match supervisor.supervise_process(requirements, args) {
            Ok(handle) => handle,
            Err(e) => {
                drop(supervisor);
                let _ = printer.await;
                exit_with(&e);
            }
        }
    };

    let token = handle.cancellation_token();
    let interrupted = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let status = handle.wait().await?;
    drop(supervisor);
    let _ = printer.await;
    print_status(&status);

    if observe && interrupted.is_cancelled() {
        // a pending stdin read cannot be cancelled and would block runtime shutdown
        std::process::exit(0);
    }
    Ok(())
}

fn provider(project: &Path, config: &SupervisorConfig) -> ContextProvider {
    ContextProvider::new(project)
        .with_requirements_files(config.requirement_candidates())
        .with_instructions_file(config.instructions_file.clone())
}

fn read_requirements(project: &Path, file: Option<&Path>) -> anyhow::Result<Option<String>> {
    let Some(file) = file else {
        return Ok(None);
    };
    let path = if file.is_absolute() {
        file.to_path_buf()
    } else {
        project.join(file)
    };
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read requirements file {}", path.display()))?;
    Ok(Some(text))
}

fn print_event(event: &SupervisionEvent) {
    match &event.kind {
        EventKind::SupervisionStarted { mode, delivery, .. } => eprintln!(
            "{} Supervision {} started ({} mode, {} delivery)",
            "→".cyan(),
            event.session_id,
            mode,
            delivery
        ),
        EventKind::InterventionRequired {
            line,
            category,
            proposed,
            ..
        } => {
            eprintln!(
                "{} {} needs review: {}",
                "Review:".yellow().bold(),
                category_label(*category),
                line
            );
            if let Some(decision) = proposed {
                eprintln!("   proposed: {}", decision.response_text.dimmed());
            }
        }
        EventKind::InterventionDelivered { response, .. } => {
            let first = response.lines().next().unwrap_or_default();
            eprintln!("{} {}", "Answered:".green(), first);
        }
        EventKind::WorkflowPhaseAdvanced { to, .. } => {
            eprintln!("{} Phase: {}", "→".cyan(), to.to_string().bold());
        }
        EventKind::ClaudeCodeError {
            type_tag,
            message,
            escalate,
            ..
        } => {
            let label = if *escalate {
                "Error:".red().bold()
            } else {
                "Recovering:".yellow()
            };
            eprintln!("{} [{}] {}", label, type_tag, message);
        }
        EventKind::SupervisionComplete { state, .. } => {
            eprintln!("{} Supervision {}", "→".cyan(), state);
        }
        EventKind::QuestionAnswered { .. }
        | EventKind::PermissionGranted { .. }
        | EventKind::ResponseReady { .. } => {}
    }
}

fn print_status(status: &SessionStatus) {
    eprintln!("\n{}", "Session Summary".bold());
    eprintln!("{}", "─".repeat(40));
    eprintln!("   {}", status.summary());
    eprintln!(
        "   Questions answered: {} | Permissions granted: {} | Context injections: {} | Errors: {}",
        status.statistics.questions_answered,
        status.statistics.permissions_granted,
        status.statistics.context_injections,
        status.statistics.errors_reported
    );
}

fn print_decision(decision: &Decision) {
    let verdict = if decision.escalate {
        "ESCALATE".red().bold()
    } else {
        "AUTO".green().bold()
    };
    println!(
        "{} {} ({:.2}, {})",
        verdict, decision.kind, decision.confidence, decision.shape
    );
    println!("   {}", decision.rationale.dimmed());
    if let Some(ref rule) = decision.rule_matched {
        println!("   rule: {}", rule);
    }
    println!("\n{}", decision.response_text);
}

fn category_label(category: IssueCategory) -> colored::ColoredString {
    let label = format!("[{}]", category);
    match category {
        IssueCategory::Error => label.red(),
        IssueCategory::Permission => label.yellow(),
        IssueCategory::Confusion | IssueCategory::Question => label.cyan(),
        IssueCategory::Progress => label.green(),
    }
}

fn yes_no(value: bool) -> colored::ColoredString {
    if value {
        "yes".green()
    } else {
        "no".dimmed()
    }
}

fn exit_with(error: &OverseerError) -> ! {
    eprintln!("{} {}", "Error:".red().bold(), error);
    std::process::exit(error.exit_code());
}

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::FmtSubscriber;

mod config;
mod export;
mod loader;
mod models;
mod outcome;
mod quiz;
mod report;
mod table;

use config::{Config, DEFAULT_CONFIG_FILE};
use models::{OutcomeScores, ScoreTable};
use outcome::PloRollup;
use table::{column_averages, render_text, student_series};

#[derive(Parser)]
#[command(name = "outcome-tracker")]
#[command(about = "Learning outcome dashboards from course quiz results", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./.outcome-tracker.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// How LO scores roll up into PLO scores
    #[arg(long, global = true, value_enum)]
    plo_rollup: Option<PloRollup>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default .outcome-tracker.toml
    InitConfig,
    #[command(flatten)]
    Course(CourseCommand),
}

/// Commands that read saved course responses and need the resolved config.
#[derive(Subcommand)]
enum CourseCommand {
    /// Show LO and PLO scores for every student
    Outcomes {
        /// Saved `flatSummary` response
        #[arg(long)]
        flat: PathBuf,
        /// Saved `ploSummary` response
        #[arg(long)]
        plo_links: PathBuf,
        #[arg(long, value_enum, default_value_t = OutcomeKind::Both)]
        kind: OutcomeKind,
        /// Show only this student
        #[arg(long)]
        student: Option<String>,
        /// Add a second student next to --student
        #[arg(long, requires = "student")]
        compare: Option<String>,
        /// Print column averages instead of rows
        #[arg(long, conflicts_with = "student")]
        averages: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Show quiz percentages for every student
    Quizzes {
        /// Saved `quizResults` response
        #[arg(long)]
        results: PathBuf,
        /// Take the roster from a `flatSummary` response instead of the results
        #[arg(long)]
        flat: Option<PathBuf>,
        #[arg(long)]
        student: Option<String>,
        #[arg(long, requires = "student")]
        compare: Option<String>,
        #[arg(long, conflicts_with = "student")]
        averages: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Export a score table to CSV
    Export {
        #[arg(long, value_enum)]
        kind: ExportKind,
        #[arg(long)]
        flat: Option<PathBuf>,
        #[arg(long)]
        plo_links: Option<PathBuf>,
        #[arg(long)]
        results: Option<PathBuf>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Generate a markdown course report
    Report {
        #[arg(long)]
        flat: PathBuf,
        #[arg(long)]
        plo_links: PathBuf,
        /// Include quiz averages from a `quizResults` response
        #[arg(long)]
        results: Option<PathBuf>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutcomeKind {
    Lo,
    Plo,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExportKind {
    Lo,
    Plo,
    Quiz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::InitConfig => init_config(),
        Commands::Course(command) => {
            let mut config = Config::resolve(cli.config.as_deref())?;
            config.merge_with_args(cli.plo_rollup, cli.verbose);
            init_logging(&config, cli.quiet);
            debug!(?config, "configuration resolved");

            run(command, &config)
        }
    }
}

fn run(command: CourseCommand, config: &Config) -> anyhow::Result<()> {
    match command {
        CourseCommand::Outcomes {
            flat,
            plo_links,
            kind,
            student,
            compare,
            averages,
            format,
        } => {
            let scores = load_outcomes(config, &flat, &plo_links)?;
            let tables: Vec<(&str, &ScoreTable)> = match kind {
                OutcomeKind::Lo => vec![("LO", &scores.lo)],
                OutcomeKind::Plo => vec![("PLO", &scores.plo)],
                OutcomeKind::Both => vec![("LO", &scores.lo), ("PLO", &scores.plo)],
            };

            for (label, table) in tables {
                let view = select_view(table, student.as_deref(), compare.as_deref())?;
                print_view(label, &view, averages, format)?;
            }
        }
        CourseCommand::Quizzes {
            results,
            flat,
            student,
            compare,
            averages,
            format,
        } => {
            let table = load_quiz_table(config, &results, flat.as_deref())?;
            let view = select_view(&table, student.as_deref(), compare.as_deref())?;
            print_view("Quiz", &view, averages, format)?;
        }
        CourseCommand::Export {
            kind,
            flat,
            plo_links,
            results,
            out,
        } => {
            let table = match kind {
                ExportKind::Quiz => {
                    let results = results.context("--results is required to export quiz scores")?;
                    load_quiz_table(config, &results, flat.as_deref())?
                }
                ExportKind::Lo | ExportKind::Plo => {
                    let (Some(flat), Some(plo_links)) = (flat, plo_links) else {
                        bail!("--flat and --plo-links are required to export outcome scores");
                    };
                    let scores = load_outcomes(config, &flat, &plo_links)?;
                    if kind == ExportKind::Lo {
                        scores.lo
                    } else {
                        scores.plo
                    }
                }
            };

            let written = export::export_csv(&table, &out)?;
            println!("Exported {written} students to {}.", out.display());
        }
        CourseCommand::Report {
            flat,
            plo_links,
            results,
            out,
        } => {
            let scores = load_outcomes(config, &flat, &plo_links)?;
            let quizzes = results
                .as_deref()
                .map(|results| load_quiz_table(config, results, Some(flat.as_path())))
                .transpose()?;

            let options = report::ReportOptions {
                title: &config.report.title,
                generated_at: chrono::Utc::now(),
                top_students: config.report.top_students,
            };
            let report = report::build_report(&options, &scores, quizzes.as_ref());
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn init_config() -> anyhow::Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);
    if path.exists() {
        bail!("{DEFAULT_CONFIG_FILE} already exists; edit or remove it first");
    }

    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("failed to write {DEFAULT_CONFIG_FILE}"))?;
    println!("Created {DEFAULT_CONFIG_FILE} with default settings.");
    Ok(())
}

fn init_logging(config: &Config, quiet: bool) {
    let level = if quiet {
        tracing::Level::ERROR
    } else if config.general.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

fn load_outcomes(config: &Config, flat: &Path, plo_links: &Path) -> anyhow::Result<OutcomeScores> {
    let summary = loader::load_flat_summary(flat)?;
    let links = loader::load_plo_links(plo_links)?;
    let options = config.aggregate_options();

    let scores = outcome::aggregate(&summary, &links, &options)
        .with_context(|| format!("failed to aggregate {}", flat.display()))?;
    info!(
        students = scores.lo.rows.len(),
        rollup = ?options.plo_rollup,
        "aggregated outcome scores"
    );
    Ok(scores)
}

fn load_quiz_table(
    config: &Config,
    results: &Path,
    roster: Option<&Path>,
) -> anyhow::Result<ScoreTable> {
    let quizzes = loader::load_quiz_results(results)?;
    let roster = match roster {
        Some(flat) => loader::load_flat_summary(flat)?.students,
        None => quiz::roster_from_results(&quizzes),
    };

    Ok(quiz::quiz_table(
        &quizzes,
        &roster,
        config.aggregation.quiz_header_width,
    ))
}

fn select_view(
    table: &ScoreTable,
    student: Option<&str>,
    compare: Option<&str>,
) -> anyhow::Result<ScoreTable> {
    match student {
        None => Ok(table.clone()),
        Some(student) => table.compare(student, compare).with_context(|| {
            format!(
                "student {} not found",
                compare
                    .filter(|other| table.student(other).is_none())
                    .unwrap_or(student)
            )
        }),
    }
}

fn print_view(
    label: &str,
    table: &ScoreTable,
    averages: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    #[derive(Serialize)]
    struct Labelled<'a, T: Serialize> {
        kind: &'a str,
        #[serde(flatten)]
        body: T,
    }

    #[derive(Serialize)]
    struct Averages {
        averages: Vec<models::ChartPoint>,
    }

    match (format, averages) {
        (OutputFormat::Json, true) => {
            let body = Averages {
                averages: column_averages(table),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&Labelled { kind: label, body })?
            );
        }
        (OutputFormat::Json, false) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&Labelled { kind: label, body: table })?
            );
        }
        (OutputFormat::Text, true) => {
            println!("{label} averages:");
            let points = column_averages(table);
            if points.is_empty() {
                println!("No data.");
            }
            for (column, point) in points.into_iter().enumerate() {
                if table.is_unlinked(column) {
                    println!("- {}: no linked outcomes", point.name);
                } else {
                    println!("- {}: {}", point.name, point.score);
                }
            }
        }
        (OutputFormat::Text, false) => {
            println!("{label} scores (%):");
            if let [row] = table.rows.as_slice() {
                for point in student_series(table, row) {
                    println!("- {}: {}", point.name, point.score);
                }
            } else {
                print!("{}", render_text(table));
            }
        }
    }

    Ok(())
}

//! Trip planner CLI
//!
//! Runs one planning session end to end from the command line.

use std::fs;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use tripplanner::budget::{BudgetCategory, allocate, hotel_guidance};
use tripplanner::cli::{Cli, Command, OutputFormat, TripArgs, get_log_path};
use tripplanner::config::Config;
use tripplanner::orchestrator::{Orchestrator, PlanningError};
use tripplanner::provider::Capability;
use tripplanner::session::{SessionSnapshot, SessionState};
use tripplanner::specialist::TripPlan;

fn setup_logging(cli_log_level: Option<&str>, verbose: bool) -> Result<()> {
    let log_path = get_log_path();
    if let Some(dir) = log_path.parent() {
        fs::create_dir_all(dir).context("Failed to create log directory")?;
    }

    let level = match cli_log_level.map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None if verbose => tracing::Level::DEBUG,
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.log_level.as_deref(), cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Plan {
            trip,
            refinements,
            finalize,
            format,
        } => cmd_plan(&config, &trip, &refinements, finalize, format).await,
        Command::Providers {
            capability,
            probe,
            format,
        } => cmd_providers(&config, capability, probe, format).await,
        Command::Budget {
            total,
            nights,
            travelers,
            format,
        } => cmd_budget(&config, total, nights, travelers, format),
    }
}

fn planning_failure(error: PlanningError) -> eyre::Report {
    eyre::eyre!("{} ({})", error.user_message(), error)
}

async fn cmd_plan(
    config: &Config,
    trip: &TripArgs,
    refinements: &[String],
    finalize: bool,
    format: OutputFormat,
) -> Result<()> {
    debug!(refinements = refinements.len(), finalize, "cmd_plan: called");
    let draft = trip.to_draft().context("Invalid trip details")?;
    let orchestrator = Orchestrator::from_config(config)?;

    let mut snapshot = orchestrator.start_planning(draft).await.map_err(planning_failure)?;
    if snapshot.state == SessionState::CollectingInfo {
        if let Some(followup) = &snapshot.followup {
            eprintln!("{} {}", "?".yellow(), followup.question);
            for reply in &followup.quick_replies {
                eprintln!("  {} {}", "-".dimmed(), reply);
            }
        }
        let missing: Vec<String> = snapshot.missing_fields.iter().map(ToString::to_string).collect();
        return Err(eyre::eyre!("Missing required trip details: {}", missing.join(", ")));
    }

    let id = snapshot.id.clone();
    for change in refinements {
        match orchestrator.refine(&id, change).await {
            Ok(next) => snapshot = next,
            Err(e @ PlanningError::RefinementLimitExceeded { .. }) => {
                eprintln!("{} {}", "!".yellow(), e.user_message());
                break;
            }
            Err(e) => {
                eprintln!("{} {} Keeping the previous plan.", "!".yellow(), e.user_message());
                snapshot = orchestrator.get_status(&id).await.map_err(planning_failure)?;
            }
        }
    }

    if finalize {
        let final_plan = orchestrator.finalize(&id).await.map_err(planning_failure)?;
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&final_plan)?),
            OutputFormat::Text => {
                snapshot.state = SessionState::Finalized;
                print_snapshot(&snapshot);
                println!("{} Finalized after {} refinement(s)", "✓".green(), final_plan.refinements);
            }
        }
    } else {
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
            OutputFormat::Text => print_snapshot(&snapshot),
        }
    }

    orchestrator.shutdown().await.map_err(planning_failure)?;
    Ok(())
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    println!("Session: {} [{}]", snapshot.id.to_string().cyan(), snapshot.state);
    if let Some(plan) = &snapshot.plan {
        print_plan(plan);
    }
    for record in &snapshot.history {
        println!(
            "  {} #{} {} ({}): {}",
            "↻".cyan(),
            record.number,
            record.change,
            record.class,
            record.diff_summary.dimmed()
        );
    }
    println!("Refinements remaining: {}", snapshot.refinements_remaining);
}

fn print_plan(plan: &TripPlan) {
    println!("{}", plan.overview.bold());
    println!(
        "Confidence: {:.2} ({}, {}){}",
        plan.confidence,
        plan.quality.tier,
        plan.quality.provider,
        if plan.low_confidence { " low-confidence change" } else { "" }
    );
    println!();
    for day in &plan.itinerary.days {
        println!("{} {} - {} ({})", format!("Day {}", day.day).bold(), day.date, day.city.cyan(), day.theme);
        for (label, block) in [("morning", &day.morning), ("afternoon", &day.afternoon), ("evening", &day.evening)] {
            for activity in block {
                println!("  {:<9} {} {}", label.dimmed(), activity.name, format!("~{:.0}", activity.estimated_cost).dimmed());
            }
        }
    }
    for note in &plan.itinerary.notes {
        println!("  {} {}", "•".cyan(), note);
    }

    println!();
    println!("{} ({} {:.2})", "Budget".bold(), plan.budget.currency, plan.budget.total_budget);
    for allocation in &plan.budget.categories {
        let marker = if allocation.actual { " actual" } else { "" };
        println!(
            "  {:<16} {:>10.2} {:>6.1}%{}",
            allocation.category.to_string(),
            allocation.amount,
            allocation.percentage,
            marker.yellow()
        );
    }
    println!(
        "  Hotels: {:.2}/night ({})",
        plan.hotel_guidance.per_night,
        plan.hotel_guidance.accommodation_types.join(", ")
    );

    if !plan.cultural_notes.is_empty() {
        println!();
        println!("{}", "Good to know".bold());
        for note in &plan.cultural_notes {
            println!("  {} {}", "•".cyan(), note);
        }
    }
    if !plan.checklist.is_empty() {
        println!();
        println!("{}", "Checklist".bold());
        for item in &plan.checklist {
            println!("  [ ] {}", item);
        }
    }
    for failure in &plan.aspect_failures {
        println!("{} {}: {}", "!".yellow(), failure.specialist, failure.message);
    }
    for warning in &plan.warnings {
        println!("{} {}", "!".yellow(), warning);
    }
}

async fn cmd_providers(config: &Config, capability: Option<Capability>, probe: bool, format: OutputFormat) -> Result<()> {
    debug!(?capability, probe, "cmd_providers: called");
    let orchestrator = Orchestrator::from_config(config)?;
    if probe {
        orchestrator.probe_providers().await;
    }
    let providers = orchestrator.list_providers(capability);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&providers)?),
        OutputFormat::Text => {
            if providers.is_empty() {
                println!("No providers registered");
            }
            for p in &providers {
                let status = if p.available { "●".green() } else { "●".red() };
                let capabilities: Vec<String> = p.capabilities.iter().map(ToString::to_string).collect();
                println!(
                    "{} {:<10} priority={:<4} confidence={:.2} freshness={} [{}]",
                    status,
                    p.id.cyan(),
                    p.priority,
                    p.confidence,
                    p.freshness,
                    capabilities.join(", ")
                );
            }
        }
    }
    orchestrator.shutdown().await.map_err(planning_failure)?;
    Ok(())
}

fn cmd_budget(config: &Config, total: f64, nights: u32, travelers: u32, format: OutputFormat) -> Result<()> {
    debug!(total, nights, travelers, "cmd_budget: called");
    let breakdown = allocate(total, &config.session.currency)?;
    let guidance = hotel_guidance(breakdown.amount(BudgetCategory::Hotels), nights, travelers);
    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({ "breakdown": breakdown, "hotel_guidance": guidance });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("{} {:.2} {}", "Budget".bold(), breakdown.total_budget, breakdown.currency);
            for allocation in &breakdown.categories {
                println!(
                    "  {:<16} {:>10.2} {:>6.1}%",
                    allocation.category.to_string(),
                    allocation.amount,
                    allocation.percentage
                );
            }
            println!(
                "Hotels: {:.2}/night, {:.2}/person/night, range {:.2}-{:.2}",
                guidance.per_night, guidance.per_person_per_night, guidance.price_range.0, guidance.price_range.1
            );
            println!("  {}", guidance.accommodation_types.join(", ").dimmed());
            for tip in &breakdown.tips {
                println!("  {} {}", "•".cyan(), tip);
            }
        }
    }
    Ok(())
}

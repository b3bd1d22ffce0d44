//! CLI command definitions and subcommands

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::domain::{BudgetTier, DateRange, DraftError, DraftField, TripDraft, TripType};
use crate::provider::Capability;

/// Trip planner - hybrid planning orchestrator
#[derive(Parser)]
#[command(
    name = "tp",
    about = "Plan trips with provider fallback, specialist coordination and bounded refinement",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Shorthand for --log-level DEBUG
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Plan a trip, optionally refine it, and print the result
    Plan {
        #[command(flatten)]
        trip: TripArgs,

        /// Change request applied after the first plan (repeatable)
        #[arg(short, long = "refine", value_name = "CHANGE")]
        refinements: Vec<String>,

        /// Finalize the session after refinements
        #[arg(long)]
        finalize: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List registered providers
    Providers {
        /// Only providers with this capability (generate_itinerary, search_flights, search_hotels)
        #[arg(long)]
        capability: Option<Capability>,

        /// Probe availability before listing
        #[arg(long)]
        probe: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show how a budget would be split
    Budget {
        /// Total trip budget
        #[arg(long)]
        total: f64,

        /// Nights away
        #[arg(long, default_value = "1")]
        nights: u32,

        /// Number of travelers
        #[arg(long, default_value = "1")]
        travelers: u32,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Trip details for `tp plan`
#[derive(Debug, Clone, clap::Args)]
pub struct TripArgs {
    /// Where the trip starts
    #[arg(long = "from")]
    pub origin: Option<String>,

    /// Where the trip goes
    #[arg(long = "to")]
    pub destination: Option<String>,

    /// Travel dates as START..END (YYYY-MM-DD)
    #[arg(long)]
    pub dates: Option<DateRange>,

    /// Number of travelers, or a description like "romantic duo"
    #[arg(long)]
    pub travelers: Option<String>,

    /// Total budget
    #[arg(long)]
    pub budget: Option<f64>,

    /// Budget tier (economy, moderate, luxury)
    #[arg(long, default_value = "moderate")]
    pub tier: BudgetTier,

    /// Comma-separated interests
    #[arg(long)]
    pub interests: Option<String>,

    /// Trip type (leisure, business, family, romantic, adventure)
    #[arg(long = "trip-type", default_value = "leisure")]
    pub trip_type: TripType,

    /// Try this provider first
    #[arg(long)]
    pub provider: Option<String>,
}

impl TripArgs {
    /// Convert the flags into a draft, validating what was given
    pub fn to_draft(&self) -> Result<TripDraft, DraftError> {
        debug!(origin = ?self.origin, destination = ?self.destination, "TripArgs::to_draft: called");
        let mut draft = TripDraft {
            origin: self.origin.clone(),
            destination: self.destination.clone(),
            dates: self.dates,
            budget_tier: self.tier,
            trip_type: self.trip_type,
            preferred_provider: self.provider.clone(),
            ..Default::default()
        };
        if let Some(travelers) = &self.travelers {
            draft.set_field(DraftField::Travelers, travelers)?;
        }
        if let Some(budget) = self.budget {
            draft.set_field(DraftField::Budget, &budget.to_string())?;
        }
        if let Some(interests) = &self.interests {
            draft.set_field(DraftField::Interests, interests)?;
        }
        Ok(draft)
    }
}

/// Output format for plan/provider/budget commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text, json", s)),
        }
    }
}

/// Where log output is written
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tripplanner")
        .join("logs")
        .join("tripplanner.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan_command() {
        let cli = Cli::try_parse_from([
            "tp",
            "plan",
            "--from",
            "NYC",
            "--to",
            "Rome",
            "--dates",
            "2025-06-01..2025-06-06",
            "--travelers",
            "2",
            "--refine",
            "make it cheaper",
            "--refine",
            "add Florence",
            "--format",
            "json",
        ])
        .unwrap();
        let Command::Plan {
            trip,
            refinements,
            finalize,
            format,
        } = cli.command
        else {
            panic!("expected plan command");
        };
        assert_eq!(refinements.len(), 2);
        assert!(!finalize);
        assert_eq!(format, OutputFormat::Json);
        let draft = trip.to_draft().unwrap();
        assert!(draft.is_complete());
        assert_eq!(draft.travelers, Some(2));
    }

    #[test]
    fn test_bad_dates_rejected_by_parser() {
        let result = Cli::try_parse_from(["tp", "plan", "--dates", "June"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_providers_capability() {
        let cli = Cli::try_parse_from(["tp", "providers", "--capability", "hotels"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Providers {
                capability: Some(Capability::SearchHotels),
                ..
            }
        ));
    }

    #[test]
    fn test_descriptive_travelers() {
        let args = TripArgs {
            origin: None,
            destination: None,
            dates: None,
            travelers: Some("Solo explorer".to_string()),
            budget: None,
            tier: BudgetTier::Economy,
            interests: Some("food, art".to_string()),
            trip_type: TripType::Leisure,
            provider: None,
        };
        let draft = args.to_draft().unwrap();
        assert_eq!(draft.travelers, Some(1));
        assert_eq!(draft.interests.len(), 2);
    }
}

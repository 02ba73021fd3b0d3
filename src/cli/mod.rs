//! Command-line interface.

pub mod commands;
pub mod context;
pub mod id_resolver;
pub mod output;

use clap::{Parser, Subcommand};

use crate::domain::errors::{DomainError, GradingError};

#[derive(Parser, Debug)]
#[command(name = "squadforge")]
#[command(about = "Squadforge - gamified work tracking for squads", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Member acting on the board (ID or unique prefix)
    #[arg(short, long, global = true, env = "SQUADFORGE_ACTOR")]
    pub actor: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the project directory and database
    Init(commands::init::InitArgs),
    /// Manage squads
    Squad(commands::squad::SquadArgs),
    /// Manage members and view their progression
    Member(commands::member::MemberArgs),
    /// Manage buildings
    Building(commands::building::BuildingArgs),
    /// Create, move, edit and grade tasks
    Task(commands::task::TaskArgs),
    /// Dashboards and leaderboards
    Report(commands::report::ReportArgs),
    /// Inspect or advance the sprint clock
    Sprint(commands::sprint::SprintArgs),
}

#[derive(Debug, serde::Serialize)]
struct ErrorOutput {
    success: bool,
    error: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    causes: Vec<String>,
}

/// Print an error the way the output mode expects and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    let kind = error_kind(&err);
    if json_mode {
        let payload = ErrorOutput {
            success: false,
            error: err.to_string(),
            kind,
            causes: err.chain().skip(1).map(ToString::to_string).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&payload).unwrap_or_default());
    } else {
        eprintln!("Error: {err}");
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
    }
    std::process::exit(1);
}

fn error_kind(err: &anyhow::Error) -> &'static str {
    match err.downcast_ref::<DomainError>() {
        Some(DomainError::Grading(grading)) => match grading {
            GradingError::Unauthorized(_) => "unauthorized",
            GradingError::NotInReview(_) => "not_in_review",
            GradingError::DistributionMismatch { .. } => "distribution_mismatch",
            GradingError::CapacityExceeded { .. } => "capacity_exceeded",
            GradingError::NothingToDistribute => "nothing_to_distribute",
            GradingError::UnknownRating(_) => "unknown_rating",
            GradingError::RenewalPending(_) => "renewal_pending",
            GradingError::NoRenewalPending(_) => "no_renewal_pending",
            GradingError::RoutineClosed(_) => "routine_closed",
        },
        Some(
            DomainError::TaskNotFound(_)
            | DomainError::BuildingNotFound(_)
            | DomainError::MemberNotFound(_)
            | DomainError::SquadNotFound(_),
        ) => "not_found",
        Some(DomainError::ValidationFailed(_) | DomainError::InvalidStateTransition { .. }) => "invalid",
        Some(_) => "internal",
        None => "error",
    }
}

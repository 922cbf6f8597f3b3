use clap::Subcommand;
use studytrack_core::model::seconds_to_hours;
use studytrack_core::storage::Database;

#[derive(Subcommand)]
pub enum SessionAction {
    /// List recorded sessions, most recent first
    List {
        /// Limit the number of rows
        #[arg(long)]
        limit: Option<u32>,
        /// Only sessions for one subject
        #[arg(long)]
        subject_id: Option<i64>,
    },
    /// Remove a recorded session
    Remove {
        /// Session ID
        id: i64,
    },
    /// Total studied time in hours
    Total {
        /// Only count one subject
        #[arg(long)]
        subject_id: Option<i64>,
    },
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    match action {
        SessionAction::List { limit, subject_id } => {
            let sessions = match subject_id {
                Some(id) => db.sessions_for_subject(id)?,
                None => db.recent_sessions(limit)?,
            };
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
        SessionAction::Remove { id } => {
            db.delete_session(id)?;
            println!("{}", serde_json::json!({ "removed": id }));
        }
        SessionAction::Total { subject_id } => {
            let secs = db.total_duration_secs(subject_id)?;
            println!(
                "{}",
                serde_json::json!({
                    "total_secs": secs,
                    "total_hours": seconds_to_hours(secs),
                })
            );
        }
    }
    Ok(())
}

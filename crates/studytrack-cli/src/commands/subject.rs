use clap::Subcommand;
use studytrack_core::storage::Database;
use studytrack_core::Subject;

#[derive(Subcommand)]
pub enum SubjectAction {
    /// Add a subject
    Add {
        /// Subject name
        name: String,
        /// Weekly goal in hours
        #[arg(long, default_value_t = 0.0)]
        goal_hours: f64,
        /// Display colors (may be repeated)
        #[arg(long)]
        color: Vec<String>,
    },
    /// List all subjects as JSON
    List,
    /// Remove a subject together with its tasks and sessions
    Remove {
        /// Subject ID
        id: i64,
    },
}

pub fn run(action: SubjectAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    match action {
        SubjectAction::Add {
            name,
            goal_hours,
            color,
        } => {
            let id = db.upsert_subject(&Subject {
                id: 0,
                name,
                goal_hours,
                colors: color,
            })?;
            println!("{}", serde_json::json!({ "id": id }));
        }
        SubjectAction::List => {
            let subjects = db.list_subjects()?;
            println!("{}", serde_json::to_string_pretty(&subjects)?);
        }
        SubjectAction::Remove { id } => {
            db.delete_subject(id)?;
            println!("{}", serde_json::json!({ "removed": id }));
        }
    }
    Ok(())
}

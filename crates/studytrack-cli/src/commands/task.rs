use clap::Subcommand;
use studytrack_core::model::millis_to_date_string;
use studytrack_core::storage::Database;
use studytrack_core::{Priority, Task};

fn parse_priority(raw: &str) -> Result<Priority, String> {
    match raw.to_ascii_lowercase().as_str() {
        "low" => Ok(Priority::Low),
        "medium" => Ok(Priority::Medium),
        "high" => Ok(Priority::High),
        other => Err(format!("unknown priority '{other}' (low|medium|high)")),
    }
}

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task to a subject
    Add {
        /// Subject ID the task belongs to
        subject_id: i64,
        /// Task title
        title: String,
        /// Longer description
        #[arg(long, default_value = "")]
        description: String,
        /// Due date as epoch milliseconds
        #[arg(long)]
        due: Option<i64>,
        /// Priority: low, medium or high
        #[arg(long, default_value = "medium", value_parser = parse_priority)]
        priority: Priority,
    },
    /// List upcoming tasks, optionally for one subject
    List {
        #[arg(long)]
        subject_id: Option<i64>,
        /// Show completed tasks instead (requires --subject-id)
        #[arg(long)]
        completed: bool,
    },
    /// Mark a task complete
    Done {
        /// Task ID
        id: i64,
    },
    /// Remove a task
    Remove {
        /// Task ID
        id: i64,
    },
}

pub fn run(action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    match action {
        TaskAction::Add {
            subject_id,
            title,
            description,
            due,
            priority,
        } => {
            let related = db
                .get_subject(subject_id)?
                .map(|s| s.name)
                .unwrap_or_default();
            let id = db.upsert_task(&Task {
                id: 0,
                subject_id,
                title,
                description,
                due_date_ms: due,
                priority,
                related_to_subject: related,
                is_complete: false,
            })?;
            println!("{}", serde_json::json!({ "id": id }));
        }
        TaskAction::List {
            subject_id,
            completed,
        } => {
            let tasks = if completed {
                let subject_id =
                    subject_id.ok_or("--completed requires --subject-id")?;
                db.completed_tasks(subject_id)?
            } else {
                db.upcoming_tasks(subject_id)?
            };
            let rows: Vec<serde_json::Value> = tasks
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "id": t.id,
                        "subject_id": t.subject_id,
                        "title": t.title,
                        "due": millis_to_date_string(t.due_date_ms),
                        "priority": t.priority.title(),
                        "is_complete": t.is_complete,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        TaskAction::Done { id } => {
            let mut task = db
                .get_task(id)?
                .ok_or_else(|| format!("no task with id {id}"))?;
            task.is_complete = true;
            db.upsert_task(&task)?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::Remove { id } => {
            db.delete_task(id)?;
            println!("{}", serde_json::json!({ "removed": id }));
        }
    }
    Ok(())
}

use studytrack_core::model::seconds_to_hours;
use studytrack_core::storage::Database;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let totals = db.subject_totals()?;
    let recent = db.recent_sessions(Some(5))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "subject_count": totals.subject_count,
            "total_goal_hours": totals.total_goal_hours,
            "total_studied_hours": seconds_to_hours(totals.total_studied_secs),
            "recent_sessions": recent,
        }))?
    );
    Ok(())
}

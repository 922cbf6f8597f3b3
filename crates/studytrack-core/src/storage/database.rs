//! SQLite-based persistence for subjects, tasks and study sessions.
//!
//! Schema mirrors the three-entity data model: `subjects`, `tasks` and
//! `sessions`, with subject deletion cascading over its tasks and sessions.
//! The database also implements [`SessionRecorder`], which is how the timer
//! service hands off completed sessions.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::data_dir;
use crate::error::DatabaseError;
use crate::model::{Priority, Session, Subject, Task};
use crate::service::SessionRecorder;
use crate::timer::CompletedSession;

/// Aggregate figures for the dashboard and `stats` command.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SubjectTotals {
    pub subject_count: u64,
    pub total_goal_hours: f64,
    pub total_studied_secs: u64,
}

/// SQLite database for subject, task and session storage.
///
/// The connection sits behind a mutex so the database can be shared with the
/// timer service's blocking record calls.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `data_dir()/studytrack.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        let path = data_dir()?.join("studytrack.db");
        let conn = Connection::open(&path).map_err(|source| DatabaseError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A poisoned lock only means another thread panicked mid-query;
        // the connection itself is still usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn()
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS subjects (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    name        TEXT NOT NULL,
                    goal_hours  REAL NOT NULL DEFAULT 0,
                    colors      TEXT NOT NULL DEFAULT '[]'
                );

                CREATE TABLE IF NOT EXISTS tasks (
                    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                    subject_id          INTEGER NOT NULL,
                    title               TEXT NOT NULL,
                    description         TEXT NOT NULL DEFAULT '',
                    due_date_ms         INTEGER,
                    priority            INTEGER NOT NULL DEFAULT 1,
                    related_to_subject  TEXT NOT NULL DEFAULT '',
                    is_complete         INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS sessions (
                    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                    subject_id          INTEGER,
                    related_to_subject  TEXT NOT NULL DEFAULT '',
                    date                TEXT NOT NULL,
                    duration_secs       INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_tasks_subject_id ON tasks(subject_id);
                CREATE INDEX IF NOT EXISTS idx_sessions_subject_id ON sessions(subject_id);
                CREATE INDEX IF NOT EXISTS idx_sessions_date ON sessions(date);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    // ── Subjects ─────────────────────────────────────────────────────

    /// Insert or update a subject. `id == 0` inserts a new row; the assigned
    /// id is returned either way.
    pub fn upsert_subject(&self, subject: &Subject) -> Result<i64, DatabaseError> {
        let colors = serde_json::to_string(&subject.colors)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let conn = self.conn();
        if subject.id == 0 {
            conn.execute(
                "INSERT INTO subjects (name, goal_hours, colors) VALUES (?1, ?2, ?3)",
                params![subject.name, subject.goal_hours, colors],
            )?;
            Ok(conn.last_insert_rowid())
        } else {
            conn.execute(
                "INSERT OR REPLACE INTO subjects (id, name, goal_hours, colors)
                 VALUES (?1, ?2, ?3, ?4)",
                params![subject.id, subject.name, subject.goal_hours, colors],
            )?;
            Ok(subject.id)
        }
    }

    pub fn get_subject(&self, id: i64) -> Result<Option<Subject>, DatabaseError> {
        let conn = self.conn();
        let subject = conn
            .query_row(
                "SELECT id, name, goal_hours, colors FROM subjects WHERE id = ?1",
                params![id],
                row_to_subject,
            )
            .optional()?;
        Ok(subject)
    }

    pub fn list_subjects(&self) -> Result<Vec<Subject>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, name, goal_hours, colors FROM subjects")?;
        let rows = stmt.query_map([], row_to_subject)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Delete a subject together with its tasks and sessions.
    pub fn delete_subject(&self, id: i64) -> Result<(), DatabaseError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM subjects WHERE id = ?1", params![id])?;
        tx.execute("DELETE FROM tasks WHERE subject_id = ?1", params![id])?;
        tx.execute("DELETE FROM sessions WHERE subject_id = ?1", params![id])?;
        tx.commit()?;
        Ok(())
    }

    /// Totals across all subjects, for the dashboard view.
    pub fn subject_totals(&self) -> Result<SubjectTotals, DatabaseError> {
        let conn = self.conn();
        let (subject_count, total_goal_hours) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(goal_hours), 0) FROM subjects",
            [],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, f64>(1)?)),
        )?;
        let total_studied_secs = conn.query_row(
            "SELECT COALESCE(SUM(duration_secs), 0) FROM sessions",
            [],
            |row| row.get::<_, u64>(0),
        )?;
        Ok(SubjectTotals {
            subject_count,
            total_goal_hours,
            total_studied_secs,
        })
    }

    // ── Tasks ────────────────────────────────────────────────────────

    pub fn upsert_task(&self, task: &Task) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        if task.id == 0 {
            conn.execute(
                "INSERT INTO tasks (subject_id, title, description, due_date_ms,
                                    priority, related_to_subject, is_complete)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    task.subject_id,
                    task.title,
                    task.description,
                    task.due_date_ms,
                    task.priority.value(),
                    task.related_to_subject,
                    task.is_complete,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        } else {
            conn.execute(
                "INSERT OR REPLACE INTO tasks (id, subject_id, title, description,
                                               due_date_ms, priority, related_to_subject,
                                               is_complete)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    task.id,
                    task.subject_id,
                    task.title,
                    task.description,
                    task.due_date_ms,
                    task.priority.value(),
                    task.related_to_subject,
                    task.is_complete,
                ],
            )?;
            Ok(task.id)
        }
    }

    pub fn get_task(&self, id: i64) -> Result<Option<Task>, DatabaseError> {
        let conn = self.conn();
        let task = conn
            .query_row(
                "SELECT id, subject_id, title, description, due_date_ms, priority,
                        related_to_subject, is_complete
                 FROM tasks WHERE id = ?1",
                params![id],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    pub fn delete_task(&self, id: i64) -> Result<(), DatabaseError> {
        self.conn()
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Incomplete tasks ordered by due date then priority, optionally
    /// filtered to one subject.
    pub fn upcoming_tasks(&self, subject_id: Option<i64>) -> Result<Vec<Task>, DatabaseError> {
        let conn = self.conn();
        let sql = "SELECT id, subject_id, title, description, due_date_ms, priority,
                          related_to_subject, is_complete
                   FROM tasks
                   WHERE is_complete = 0 AND (?1 IS NULL OR subject_id = ?1)
                   ORDER BY due_date_ms ASC, priority DESC";
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![subject_id], row_to_task)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn completed_tasks(&self, subject_id: i64) -> Result<Vec<Task>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, subject_id, title, description, due_date_ms, priority,
                    related_to_subject, is_complete
             FROM tasks
             WHERE is_complete = 1 AND subject_id = ?1",
        )?;
        let rows = stmt.query_map(params![subject_id], row_to_task)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    // ── Sessions ─────────────────────────────────────────────────────

    pub fn insert_session(&self, session: &Session) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO sessions (subject_id, related_to_subject, date, duration_secs)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session.subject_id,
                session.related_to_subject,
                session.date.to_rfc3339(),
                session.duration_secs,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn delete_session(&self, id: i64) -> Result<(), DatabaseError> {
        self.conn()
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Most recent sessions first, optionally limited.
    pub fn recent_sessions(&self, limit: Option<u32>) -> Result<Vec<Session>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, subject_id, related_to_subject, date, duration_secs
             FROM sessions
             ORDER BY date DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit.map(i64::from).unwrap_or(-1)], row_to_session)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn sessions_for_subject(&self, subject_id: i64) -> Result<Vec<Session>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, subject_id, related_to_subject, date, duration_secs
             FROM sessions
             WHERE subject_id = ?1
             ORDER BY date DESC",
        )?;
        let rows = stmt.query_map(params![subject_id], row_to_session)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Total studied seconds, across everything or one subject.
    pub fn total_duration_secs(&self, subject_id: Option<i64>) -> Result<u64, DatabaseError> {
        let conn = self.conn();
        let total = conn.query_row(
            "SELECT COALESCE(SUM(duration_secs), 0) FROM sessions
             WHERE ?1 IS NULL OR subject_id = ?1",
            params![subject_id],
            |row| row.get::<_, u64>(0),
        )?;
        Ok(total)
    }
}

impl SessionRecorder for Database {
    /// Persist a finalized session. The subject name is resolved at record
    /// time so the history row stays readable after subject edits.
    fn record_session(&self, completed: &CompletedSession) -> Result<i64, DatabaseError> {
        // The engine guards this already; guard again at the boundary so no
        // caller can persist a zero-length session.
        if completed.duration_secs == 0 {
            return Err(DatabaseError::QueryFailed(
                "refusing to record a zero-length session".into(),
            ));
        }
        let related = match completed.subject_id {
            Some(id) => self.get_subject(id)?.map(|s| s.name).unwrap_or_default(),
            None => String::new(),
        };
        self.insert_session(&Session {
            id: 0,
            subject_id: completed.subject_id,
            related_to_subject: related,
            date: completed.started_at,
            duration_secs: completed.duration_secs,
        })
    }
}

fn row_to_subject(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subject> {
    let colors_json: String = row.get(3)?;
    Ok(Subject {
        id: row.get(0)?,
        name: row.get(1)?,
        goal_hours: row.get(2)?,
        colors: serde_json::from_str(&colors_json).unwrap_or_default(),
    })
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        due_date_ms: row.get(4)?,
        priority: Priority::from_value(row.get(5)?),
        related_to_subject: row.get(6)?,
        is_complete: row.get(7)?,
    })
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let date: String = row.get(3)?;
    Ok(Session {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        related_to_subject: row.get(2)?,
        date: DateTime::parse_from_rfc3339(&date)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_default(),
        duration_secs: row.get(4)?,
    })
}

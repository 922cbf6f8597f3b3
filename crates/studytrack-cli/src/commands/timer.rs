//! Interactive timer runner.
//!
//! Hosts the timer service in-process and drives it from stdin line
//! commands, with the ongoing "notification" rendered as an in-place
//! status line on stderr.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use studytrack_core::error::NotifyError;
use studytrack_core::storage::{Config, Database};
use studytrack_core::{
    Command, NotificationContent, Notifier, SystemClock, TimerService, TimerServiceConfig,
};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Run the timer service interactively
    Run {
        /// Subject the session is attributed to
        #[arg(long)]
        subject_id: Option<i64>,
    },
}

/// Renders the ongoing notification as a status line on stderr, updated in
/// place like a platform notification would be.
struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn update(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "\r{title} {body}   ");
        let _ = stderr.flush();
        Ok(())
    }

    fn clear(&self) {
        let _ = writeln!(std::io::stderr());
    }
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let TimerAction::Run { subject_id } = action;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_service(subject_id))
}

async fn run_service(subject_id: Option<i64>) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db: Arc<Database> = Arc::new(Database::open()?);

    let service = TimerService::spawn(
        TimerServiceConfig {
            tick_interval: Duration::from_secs(1),
            notification: NotificationContent::from_config(&config.notifications),
            subject_id: subject_id.or(config.timer.default_subject_id),
        },
        db,
        Arc::new(TerminalNotifier),
        Arc::new(SystemClock),
    );
    let handle = service.bind();

    println!("commands: start | pause | stop | cancel | status | quit");

    // Blocking stdin reader feeding the async loop.
    let (line_tx, mut line_rx) = tokio::sync::mpsc::channel::<String>(8);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    loop {
        // Ctrl-C takes the same shutdown path as `quit`, so the in-flight
        // session is flushed instead of dying with the process.
        let line = tokio::select! {
            maybe = line_rx.recv() => match maybe {
                Some(line) => line,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                eprintln!();
                break;
            }
        };
        let cmd = match line.trim() {
            "start" => Command::Start,
            "pause" => Command::Pause,
            "stop" => Command::Stop,
            "cancel" => Command::Cancel,
            "status" => {
                let snap = handle.status().await?;
                println!("{}", serde_json::to_string_pretty(&snap)?);
                continue;
            }
            "quit" | "exit" => break,
            "" => continue,
            other => {
                eprintln!("unknown command: {other}");
                continue;
            }
        };
        let outcome = handle.command(cmd).await?;
        if !outcome.applied {
            eprintln!("no-op in current phase");
        }
        println!("{}", serde_json::to_string_pretty(&outcome.snapshot)?);
    }

    // Quit, EOF and Ctrl-C all land here; any in-flight session is flushed
    // before the process exits.
    if let Some(completed) = service.shutdown().await? {
        println!(
            "{}",
            serde_json::json!({
                "recorded_secs": completed.duration_secs,
                "subject_id": completed.subject_id,
            })
        );
    }
    Ok(())
}

// ABOUTME: Monitor views: a redrawn live table for terminals and a line log otherwise.
// ABOUTME: Both consume the same poll-loop callbacks and honour the output mode.

use crossterm::{
    cursor::MoveUp,
    queue,
    terminal::{Clear, ClearType},
};
use serde::Serialize;
use std::io::{self, IsTerminal, Write};

use super::{Output, OutputMode};
use crate::lifecycle::{MonitorReport, MonitorView, Outcome, ProgressRow, Resolution};
use crate::store::DeploymentRecord;

/// `12m05s` style rendering of an elapsed duration.
pub fn format_elapsed(elapsed: chrono::Duration) -> String {
    let secs = elapsed.num_seconds().max(0);
    if secs >= 3600 {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}m{:02}s", secs / 60, secs % 60)
    }
}

/// Pick the live table for interactive terminals in normal mode, else the line log.
pub fn select_view<'a>(output: &'a Output, allow_live: bool) -> Box<dyn MonitorView + 'a> {
    if allow_live && output.mode() == OutputMode::Normal && std::io::stdout().is_terminal() {
        Box::new(LiveTable::new(output))
    } else {
        Box::new(LineLog::new(output))
    }
}

fn outcome_mark(outcome: Outcome) -> &'static str {
    if outcome.is_success() { "✓" } else { "✗" }
}

fn resolution_line(record: &DeploymentRecord, resolution: &Resolution) -> String {
    let suffix = if resolution.from_store {
        " (already recorded)".to_string()
    } else {
        format!(" after {}", format_elapsed(resolution.elapsed))
    };
    format!(
        "  {} {} [{}] {}{}",
        outcome_mark(resolution.outcome),
        record.scenario,
        record.id.short(),
        resolution.outcome,
        suffix
    )
}

fn print_resolution(output: &Output, record: &DeploymentRecord, resolution: &Resolution) {
    match output.mode() {
        OutputMode::Normal => {
            println!("{}", resolution_line(record, resolution));
            if let Some(details) = &resolution.details {
                for line in details.to_string().lines() {
                    println!("      {line}");
                }
            }
        }
        OutputMode::Quiet => {}
        OutputMode::Json => output.event("resolved", &ResolvedEvent::new(record, resolution)),
    }
}

#[derive(Serialize)]
struct ResolvedEvent<'a> {
    id: &'a str,
    scenario: &'a str,
    target: &'a str,
    outcome: Outcome,
    elapsed_secs: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a crate::lifecycle::ErrorDetails>,
}

impl<'a> ResolvedEvent<'a> {
    fn new(record: &'a DeploymentRecord, resolution: &'a Resolution) -> Self {
        Self {
            id: record.id.as_str(),
            scenario: record.scenario.as_str(),
            target: record.target.as_str(),
            outcome: resolution.outcome,
            elapsed_secs: resolution.elapsed.num_seconds(),
            details: resolution.details.as_ref(),
        }
    }
}

#[derive(Serialize)]
struct TickRow<'a> {
    id: &'a str,
    scenario: &'a str,
    status: &'a str,
    elapsed_secs: i64,
}

#[derive(Serialize)]
struct TickEvent<'a> {
    tick: u64,
    active: Vec<TickRow<'a>>,
}

/// Appends one line per event. Used for pipes, CI logs, and json mode.
pub struct LineLog<'a> {
    output: &'a Output,
}

impl<'a> LineLog<'a> {
    pub fn new(output: &'a Output) -> Self {
        Self { output }
    }
}

impl MonitorView for LineLog<'_> {
    fn started(&mut self, total: usize) {
        self.output
            .progress(&format!("Monitoring {total} deployment(s)"));
    }

    fn tick(&mut self, tick: u64, active: &[ProgressRow]) {
        match self.output.mode() {
            OutputMode::Normal if !active.is_empty() => {
                let states: Vec<String> = active
                    .iter()
                    .map(|row| format!("{}={}", row.record.scenario, row.remote_status))
                    .collect();
                println!(
                    "  poll #{tick}: {} in flight ({})",
                    active.len(),
                    states.join(", ")
                );
            }
            OutputMode::Json => {
                let event = TickEvent {
                    tick,
                    active: active
                        .iter()
                        .map(|row| TickRow {
                            id: row.record.id.as_str(),
                            scenario: row.record.scenario.as_str(),
                            status: &row.remote_status,
                            elapsed_secs: row.elapsed.num_seconds(),
                        })
                        .collect(),
                };
                self.output.event("tick", &event);
            }
            _ => {}
        }
    }

    fn resolved(&mut self, record: &DeploymentRecord, resolution: &Resolution) {
        print_resolution(self.output, record, resolution);
    }

    fn interrupted(&mut self, remaining: &[DeploymentRecord]) {
        self.output.warning(&format!(
            "monitoring interrupted; {} deployment(s) still in flight (resume with `ephem monitor`)",
            remaining.len()
        ));
    }

    fn finished(&mut self, report: &MonitorReport) {
        if self.output.is_json() {
            let summary = MonitorSummary::from(report);
            self.output.event("monitor-finished", &summary);
        }
    }
}

#[derive(Serialize)]
struct MonitorSummary {
    succeeded: usize,
    failed: usize,
    canceled: usize,
    timed_out: usize,
    deleted: usize,
    interrupted: usize,
    ticks: u64,
}

impl From<&MonitorReport> for MonitorSummary {
    fn from(report: &MonitorReport) -> Self {
        Self {
            succeeded: report.count(Outcome::Succeeded),
            failed: report.count(Outcome::Failed),
            canceled: report.count(Outcome::Canceled),
            timed_out: report.count(Outcome::TimedOut),
            deleted: report.count(Outcome::Deleted),
            interrupted: report.interrupted.len(),
            ticks: report.ticks,
        }
    }
}

/// Multi-row table redrawn in place after every poll tick.
pub struct LiveTable<'a> {
    output: &'a Output,
    drawn_lines: usize,
}

impl<'a> LiveTable<'a> {
    pub fn new(output: &'a Output) -> Self {
        Self {
            output,
            drawn_lines: 0,
        }
    }

    fn clear(&mut self) {
        if self.drawn_lines == 0 {
            return;
        }
        if let Err(e) = erase(self.drawn_lines) {
            tracing::warn!("could not clear the live table: {e}");
        }
        self.drawn_lines = 0;
    }
}

/// Move up over `lines` previously drawn rows and clear to the end of screen.
fn erase(lines: usize) -> io::Result<()> {
    let rows = u16::try_from(lines).unwrap_or(u16::MAX);
    let mut stdout = io::stdout();
    queue!(stdout, MoveUp(rows), Clear(ClearType::FromCursorDown))?;
    stdout.flush()
}

fn draw(lines: &[String]) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    for line in lines {
        writeln!(stdout, "{line}")?;
    }
    stdout.flush()
}

impl MonitorView for LiveTable<'_> {
    fn started(&mut self, total: usize) {
        self.output
            .progress(&format!("Monitoring {total} deployment(s)"));
    }

    fn tick(&mut self, tick: u64, active: &[ProgressRow]) {
        self.clear();
        if active.is_empty() {
            return;
        }

        let width = active
            .iter()
            .map(|row| row.record.scenario.as_str().len())
            .max()
            .unwrap_or(0)
            .max("SCENARIO".len());

        let mut lines = vec![
            format!("poll #{tick}: {} in flight", active.len()),
            format!("  {:<width$}  {:<8}  {:<12}  ELAPSED", "SCENARIO", "ID", "STATUS"),
        ];
        for row in active {
            lines.push(format!(
                "  {:<width$}  {:<8}  {:<12}  {}",
                row.record.scenario.as_str(),
                row.record.id.short(),
                row.remote_status,
                format_elapsed(row.elapsed)
            ));
        }

        match draw(&lines) {
            Ok(()) => self.drawn_lines = lines.len(),
            Err(e) => tracing::warn!("could not draw the live table: {e}"),
        }
    }

    fn resolved(&mut self, record: &DeploymentRecord, resolution: &Resolution) {
        self.clear();
        print_resolution(self.output, record, resolution);
    }

    fn interrupted(&mut self, remaining: &[DeploymentRecord]) {
        self.clear();
        self.output.warning(&format!(
            "monitoring interrupted; {} deployment(s) still in flight (resume with `ephem monitor`)",
            remaining.len()
        ));
    }
}

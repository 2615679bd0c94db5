//! Terminal progress display fed by [`ProgressTracker`] events.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, Local};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use sshpoint_transfer::{ProgressEvent, ProgressSnapshot, ProgressTracker, TaskId};

const MIB: f64 = 1024.0 * 1024.0;

/// Overall bar plus one bar per active file.
pub struct TerminalProgress {
    multi: MultiProgress,
    overall: ProgressBar,
    bars: Mutex<HashMap<TaskId, ProgressBar>>,
    tracker: Weak<ProgressTracker>,
}

impl TerminalProgress {
    /// Draws to stderr and subscribes to `tracker`.
    pub fn attach(tracker: &Arc<ProgressTracker>) -> Arc<Self> {
        Self::attach_to(tracker, ProgressDrawTarget::stderr())
    }

    pub fn attach_to(tracker: &Arc<ProgressTracker>, target: ProgressDrawTarget) -> Arc<Self> {
        let multi = MultiProgress::with_draw_target(target);
        let overall = multi.add(ProgressBar::new(0));
        overall.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        let display = Arc::new(Self {
            multi,
            overall,
            bars: Mutex::new(HashMap::new()),
            tracker: Arc::downgrade(tracker),
        });
        let sink = Arc::clone(&display);
        tracker.on_event(Box::new(move |event| sink.handle(event)));
        display
    }

    fn file_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("  {prefix:30!} [{bar:30}] {bytes}/{total_bytes} {bytes_per_sec}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
    }

    fn handle(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::TotalFiles(_) => self.refresh_summary(),
            ProgressEvent::TaskAdded {
                task,
                name,
                total_bytes,
            } => {
                let bar = self
                    .multi
                    .insert_before(&self.overall, ProgressBar::new(*total_bytes));
                bar.set_style(Self::file_style());
                bar.set_prefix(name.clone());
                self.overall.inc_length(*total_bytes);
                self.bars.lock().unwrap().insert(*task, bar);
            }
            ProgressEvent::TaskAdvanced { task, delta } => {
                if let Some(bar) = self.bars.lock().unwrap().get(task) {
                    bar.inc(*delta);
                }
                self.overall.inc(*delta);
                self.refresh_summary();
            }
            ProgressEvent::TaskCompleted { task } => {
                if let Some(bar) = self.bars.lock().unwrap().remove(task) {
                    bar.finish_and_clear();
                    self.multi.remove(&bar);
                }
                self.refresh_summary();
            }
            ProgressEvent::Status(text) => {
                let _ = self.multi.println(text);
            }
        }
    }

    /// Re-syncs the overall bar with the tracker and rewrites its message.
    fn refresh_summary(&self) {
        let Some(tracker) = self.tracker.upgrade() else {
            return;
        };
        let snapshot = tracker.snapshot();
        self.overall.set_length(snapshot.total_bytes);
        self.overall.set_position(snapshot.completed_bytes);
        self.overall
            .set_message(summary_line(&snapshot, Local::now()));
    }

    pub fn finish(&self) {
        for (_, bar) in self.bars.lock().unwrap().drain() {
            bar.finish_and_clear();
        }
        self.overall.finish_and_clear();
    }
}

/// `files • MB/s • ETA` line for the overall bar.
pub fn summary_line(snapshot: &ProgressSnapshot, now: DateTime<Local>) -> String {
    let mut line = format!(
        "{}/{} files • {:.2} MB/s",
        snapshot.completed_files,
        snapshot.total_files,
        snapshot.bytes_per_second / MIB
    );
    if let Some(remaining) = snapshot.remaining {
        if let Ok(left) = chrono::Duration::from_std(remaining) {
            let eta = now + left;
            line.push_str(&format!(" • ETA {}", eta.format("%H:%M:%S")));
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sshpoint_transfer::ProgressSink;
    use std::time::Duration;

    fn snapshot(remaining: Option<Duration>) -> ProgressSnapshot {
        ProgressSnapshot {
            elapsed: Duration::from_secs(10),
            remaining,
            bytes_per_second: 2.5 * MIB,
            completed_bytes: 25 * 1024 * 1024,
            total_bytes: 50 * 1024 * 1024,
            completed_files: 3,
            total_files: 10,
            status: String::new(),
        }
    }

    #[test]
    fn summary_with_eta() {
        let now = Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let line = summary_line(&snapshot(Some(Duration::from_secs(90))), now);
        assert_eq!(line, "3/10 files • 2.50 MB/s • ETA 12:01:30");
    }

    #[test]
    fn summary_without_eta() {
        let now = Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let line = summary_line(&snapshot(None), now);
        assert_eq!(line, "3/10 files • 2.50 MB/s");
    }

    #[test]
    fn bars_follow_tracker_events() {
        let tracker = Arc::new(ProgressTracker::new());
        let display = TerminalProgress::attach_to(&tracker, ProgressDrawTarget::hidden());

        tracker.set_total_file_count(2);
        let a = tracker.add_task("a.bin", 100);
        let b = tracker.add_task("b.bin", 50);
        assert_eq!(display.overall.length(), Some(150));
        assert_eq!(display.bars.lock().unwrap().len(), 2);

        tracker.update_task(a, 40);
        assert_eq!(display.bars.lock().unwrap()[&a].position(), 40);
        assert_eq!(display.overall.position(), 40);

        // Completion credits unreported bytes.
        tracker.complete_task(a);
        assert_eq!(display.overall.position(), 100);
        assert!(!display.bars.lock().unwrap().contains_key(&a));

        tracker.complete_task(b);
        assert_eq!(display.overall.position(), 150);
        display.finish();
        assert!(display.bars.lock().unwrap().is_empty());
    }
}

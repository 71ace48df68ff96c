//! Line-stable progress display shared by concurrently running jobs.
//!
//! Live mode: one terminal line per job, rewritten in place with ANSI cursor
//! movement. Plain mode: every update is appended as its own line (logs, pipes).
//! Hidden mode: state is tracked but nothing is written.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{IsTerminal, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::pipeline::Stage;

/// Configured progress behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressSetting {
    /// Live when stderr is a terminal, plain otherwise.
    #[default]
    Auto,
    Live,
    Plain,
    Off,
}

/// How the reporter renders to its output surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Live,
    Plain,
    Hidden,
}

impl RenderMode {
    /// Resolves a setting against the current stderr.
    pub fn detect(setting: ProgressSetting) -> Self {
        match setting {
            ProgressSetting::Auto => {
                if std::io::stderr().is_terminal() {
                    RenderMode::Live
                } else {
                    RenderMode::Plain
                }
            }
            ProgressSetting::Live => RenderMode::Live,
            ProgressSetting::Plain => RenderMode::Plain,
            ProgressSetting::Off => RenderMode::Hidden,
        }
    }
}

/// The display line owned by one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressLine {
    pub job_id: String,
    /// Assigned once at registration, never reused.
    pub line_index: usize,
    pub last_rendered_text: String,
    pub completed: bool,
}

/// The output stream every reporter of a process writes to.
///
/// Tracks how many lines have been written; the write cursor always sits
/// just below the last one. Reporters address their lines by absolute row,
/// so runs sharing a surface never miscount each other's lines.
pub struct ProgressSurface {
    state: Mutex<SurfaceState>,
}

struct SurfaceState {
    out: Box<dyn Write + Send>,
    lines_written: usize,
}

impl SurfaceState {
    /// Writes `text` as a new line and returns its row.
    fn append(&mut self, text: &str) -> usize {
        let row = self.lines_written;
        // Display errors never fail a job.
        let _ = writeln!(self.out, "{}", text);
        let _ = self.out.flush();
        self.lines_written += 1;
        row
    }

    /// Replaces the line at `row`, leaving the cursor where it was.
    fn rewrite(&mut self, row: usize, text: &str) {
        let up = self.lines_written - row;
        let _ = write!(self.out, "\x1b[{}A\r\x1b[2K{}\x1b[{}B\r", up, text, up);
        let _ = self.out.flush();
    }
}

impl ProgressSurface {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            state: Mutex::new(SurfaceState {
                out,
                lines_written: 0,
            }),
        }
    }

    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Lines written by every reporter so far.
    pub fn lines_written(&self) -> usize {
        self.lock().lines_written
    }

    fn lock(&self) -> MutexGuard<'_, SurfaceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ProgressSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSurface")
            .field("lines_written", &self.lines_written())
            .finish()
    }
}

struct ReporterState {
    lines: Vec<ProgressLine>,
    /// Surface row of each line, parallel to `lines`.
    rows: Vec<usize>,
    by_job: HashMap<String, usize>,
}

impl ReporterState {
    /// Registers `job_id` if needed; returns its line index.
    fn ensure_line(
        &mut self,
        mode: RenderMode,
        surface: &ProgressSurface,
        job_id: &str,
        text: &str,
    ) -> usize {
        if let Some(&index) = self.by_job.get(job_id) {
            return index;
        }

        let index = self.lines.len();
        let text = single_line(text);
        let row = match mode {
            RenderMode::Live | RenderMode::Plain => surface.lock().append(&text),
            RenderMode::Hidden => 0,
        };
        self.lines.push(ProgressLine {
            job_id: job_id.to_string(),
            line_index: index,
            last_rendered_text: text,
            completed: false,
        });
        self.rows.push(row);
        self.by_job.insert(job_id.to_string(), index);
        index
    }
}

/// Multiplexes status text from concurrent jobs onto one output surface.
///
/// Every write happens under the surface lock, so updates from different
/// jobs, and from different runs on the same surface, never interleave.
/// The reporter lock is always taken before the surface lock.
pub struct ProgressReporter {
    mode: RenderMode,
    surface: Arc<ProgressSurface>,
    state: Mutex<ReporterState>,
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("mode", &self.mode)
            .field("lines", &self.line_count())
            .finish()
    }
}

impl ProgressReporter {
    /// Reporter that tracks lines but never writes.
    pub fn hidden() -> Self {
        Self::with_writer(RenderMode::Hidden, Box::new(std::io::sink()))
    }

    /// Reporter on a private surface writing to `out`.
    pub fn with_writer(mode: RenderMode, out: Box<dyn Write + Send>) -> Self {
        Self::on_surface(mode, Arc::new(ProgressSurface::new(out)))
    }

    /// Reporter sharing `surface` with other reporters.
    pub fn on_surface(mode: RenderMode, surface: Arc<ProgressSurface>) -> Self {
        Self {
            mode,
            surface,
            state: Mutex::new(ReporterState {
                lines: Vec::new(),
                rows: Vec::new(),
                by_job: HashMap::new(),
            }),
        }
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn surface(&self) -> &Arc<ProgressSurface> {
        &self.surface
    }

    fn lock(&self) -> MutexGuard<'_, ReporterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Assigns `job_id` the next display line and prints `text` on it.
    ///
    /// Registering an already known job returns its existing index.
    pub fn register_job(&self, job_id: &str, text: &str) -> usize {
        let mut state = self.lock();
        state.ensure_line(self.mode, &self.surface, job_id, text)
    }

    /// Rewrites the line of `job_id` only. Unknown jobs are registered first.
    pub fn update(&self, job_id: &str, text: &str) {
        let mut state = self.lock();
        let text = single_line(text);

        let known = state.by_job.contains_key(job_id);
        let index = state.ensure_line(self.mode, &self.surface, job_id, &text);
        if !known {
            return;
        }

        match self.mode {
            RenderMode::Live => self.surface.lock().rewrite(state.rows[index], &text),
            RenderMode::Plain => {
                self.surface
                    .lock()
                    .append(&format!("[{}] {}", job_id, text));
            }
            RenderMode::Hidden => {}
        }
        state.lines[index].last_rendered_text = text;
    }

    /// Marks the job completed. Its last line stays on screen.
    pub fn complete(&self, job_id: &str) {
        let mut state = self.lock();
        if let Some(&index) = state.by_job.get(job_id) {
            state.lines[index].completed = true;
        }
    }

    /// Redraws every line from the recorded text.
    pub fn render_all(&self) {
        let state = self.lock();
        match self.mode {
            RenderMode::Live => {
                let mut surface = self.surface.lock();
                for (line, &row) in state.lines.iter().zip(&state.rows) {
                    surface.rewrite(row, &line.last_rendered_text);
                }
            }
            RenderMode::Plain => {
                let mut surface = self.surface.lock();
                for line in &state.lines {
                    surface.append(&format!("[{}] {}", line.job_id, line.last_rendered_text));
                }
            }
            RenderMode::Hidden => {}
        }
    }

    pub fn line_count(&self) -> usize {
        self.lock().lines.len()
    }

    pub fn line(&self, job_id: &str) -> Option<ProgressLine> {
        let state = self.lock();
        state
            .by_job
            .get(job_id)
            .map(|&index| state.lines[index].clone())
    }

    /// Snapshot of every line in display order.
    pub fn lines(&self) -> Vec<ProgressLine> {
        self.lock().lines.clone()
    }
}

fn single_line(text: &str) -> String {
    text.replace(['\n', '\r'], " ")
}

/// Per-job handle on a shared reporter.
///
/// Prefixes updates with the job label and remembers the stage last entered,
/// so a timed-out job can report where it hung.
#[derive(Debug, Clone)]
pub struct JobProgress {
    reporter: Arc<ProgressReporter>,
    job_id: String,
    label: String,
    stage: Arc<Mutex<Option<Stage>>>,
}

impl JobProgress {
    /// Registers the job on `reporter` and returns its handle.
    pub fn register(reporter: Arc<ProgressReporter>, job_id: &str, label: &str) -> Self {
        reporter.register_job(job_id, &format!("{} queued", label));
        Self {
            reporter,
            job_id: job_id.to_string(),
            label: label.to_string(),
            stage: Arc::new(Mutex::new(None)),
        }
    }

    /// A handle on a private hidden reporter.
    pub fn detached(job_id: &str) -> Self {
        Self::register(Arc::new(ProgressReporter::hidden()), job_id, job_id)
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn update(&self, text: &str) {
        self.reporter
            .update(&self.job_id, &format!("{} {}", self.label, text));
    }

    /// Records `stage` as current and shows `text`.
    pub fn enter(&self, stage: Stage, text: &str) {
        *self.stage.lock().unwrap_or_else(|p| p.into_inner()) = Some(stage);
        self.update(&format!("[{}] {}", stage, text));
    }

    pub fn current_stage(&self) -> Option<Stage> {
        *self.stage.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Final update followed by completion.
    pub fn finish(&self, text: &str) {
        self.update(text);
        self.reporter.complete(&self.job_id);
    }
}

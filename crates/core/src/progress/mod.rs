//! Progress display for concurrently running jobs.
//!
//! Each job owns one display line for the life of a batch run. A reporter is
//! created per run; reporters of overlapping runs share one output surface.

mod reporter;

pub use reporter::{
    JobProgress, ProgressLine, ProgressReporter, ProgressSetting, ProgressSurface, RenderMode,
};

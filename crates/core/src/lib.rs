pub mod batch;
pub mod config;
pub mod dedup;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod store;
pub mod testing;
pub mod tools;

pub use batch::{
    BatchConfig, BatchError, BatchReport, BatchRequest, BatchResponse, BatchRun, BatchService,
    BatchTally, CollectorError, ConcurrencyScheduler, JobOutcome, JobResult, ResultCollector,
    SkipReason, WorkItem,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
    ServerConfig, StorageConfig,
};
pub use dedup::{
    source_key, Admission, BlacklistSet, ContentRestriction, DedupAuthority, DedupError,
    DedupGate, DenyList, FailureLedger, FailureRecord, FastIndex, JsonlFailureLedger,
    RestrictionProbe,
};
pub use pipeline::{
    ArtifactGenerator, ClipExtractor, FailureCategory, JobError, JobOutput, MediaAcquirer,
    PipelineExecutor, Segmenter, SourceResolver, Stage, StageError, StagedExecutor, Transcriber,
    TranscriptionMode, Unit, UnitRecord,
};
pub use progress::{JobProgress, ProgressReporter, ProgressSetting, ProgressSurface, RenderMode};
pub use store::{retitle_unit, FsRecordStore, RecordStore, RenameBatch, RenameError, StoreError};
pub use tools::{
    FfmpegClipper, FfmpegThumbnailer, HttpSegmenter, HttpTranscriber, ServiceConfig, ToolsConfig,
    YtDlpSource,
};

//! Concurrency substrate: cancellation, bounded queues, the tracker worker
//! pool, the control authority and the three-stage pipeline.

pub mod cancel;
pub mod control;
pub mod orchestrator;
pub mod pool;
pub mod queue;
pub mod sink;
pub mod source;
pub mod stage;
pub mod track;

pub use cancel::{CancelToken, Wake};
pub use control::ControlAuthority;
pub use orchestrator::{Collaborators, DisplayBuilder, Pipeline, PipelineReport};
pub use pool::WorkerPool;
pub use queue::{BoundedQueue, PushOutcome, QueueStats};
pub use sink::{SinkSettings, SinkStage};
pub use source::SourceStage;
pub use stage::{Stage, StageRunner, Transform};
pub use track::TrackStage;

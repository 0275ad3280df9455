//! Releasability checks - release gate for tag-triggered release pipelines
//!
//! Provides the check run coordinator that:
//! - Publishes one fan-out trigger carrying a fresh correlation id
//! - Discovers at run time how many checks are subscribed to the trigger
//! - Polls the shared result queue and keeps one outcome per check
//! - Turns the outcomes into a pass/fail verdict and a printable report

pub mod collector;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod directory;
pub mod error;
pub mod fakes;
pub mod message;
pub mod obs;
pub mod ports;
pub mod report;
pub mod telemetry;
pub mod trigger;

// Re-export key types
pub use collector::{CollectorState, ResultCollector};
pub use config::{PollSettings, ReleasabilityConfig};
pub use context::{CorrelationId, ReleaseContext, ReleaseRequest, VersionNormalization};
pub use coordinator::{Coordinator, Transport};
pub use directory::{CheckDirectory, Expectation};
pub use error::{ReleasabilityError, Result, TransportError};
pub use message::{CheckReply, CheckRequest, CheckState, RawMessage};
pub use ports::{
    CheckHandler, Clock, HandlerPage, HandlerRegistry, ResultQueue, SubscriberPage,
    SubscriptionRegistry, TokioClock, TopicPublisher, TransportResult,
};
pub use report::{aggregate, CheckOutcome, CheckResultSet, ChecksReport};
pub use telemetry::init_tracing;
pub use trigger::CheckTrigger;

//! The paged memory view: range snapshot, row cache, background population
//! and the engine tying them to a remote target.

pub mod cache;
pub mod engine;
pub mod populator;
pub mod range;

pub use cache::RowCache;
pub use engine::{MemoryViewEngine, RowView, ViewDescriptor};
pub use populator::{
    CancellationToken, IncrementalPopulator, PopulationCursor, PopulationEvent, PopulationJob,
    PopulationOutcome,
};
pub use range::{InitStatus, MemoryRange};

pub mod adapter;
pub mod codecs;
pub mod events;
pub mod worker_pool;

pub use adapter::{ConsumerInfo, EngineAdapter, EngineError, EngineMetrics, TransportInfo, TransportPair};
pub use events::EngineEvent;
pub use worker_pool::WorkerPool;

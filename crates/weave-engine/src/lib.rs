//! Download / reproject / mosaic engine.
//!
//! Realizes a tile plan as local georeferenced files and finally as one
//! georeferenced mosaic, with bounded concurrency, per-tile retry through a
//! proxy, and the one-shot "every tile returned XML" replan policy.

pub mod download;
pub mod engine;
pub mod error;
pub mod mosaic;
pub mod pool;

pub use engine::{EngineConfig, EngineOutput, TileEngine};
pub use error::{EngineError, PoolError};
pub use pool::WorkerPool;

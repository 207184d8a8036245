//! Top-level crate: universe selection (`spec.md` §4.E) and the engine wiring that binds the
//! time/offset providers to the data and execution crates. Re-exports the full workspace so a
//! caller needs only this one crate.

pub mod engine;
pub mod universe;

pub use engine::Engine;
pub use universe::{Member, OptionChainUniverse, SelectionResult, Universe, UniverseDiff, UniverseSelector, UniverseSettings};

pub use meridian_data as data;
pub use meridian_execution as execution;
pub use meridian_instrument as instrument;
pub use meridian_integration as integration;

//! Presence detection
//!
//! - `state`: Process-lifetime device snapshots and login time
//! - `evaluator`: Occupancy inference from mobile device records
//! - `reconciler`: HOME/AWAY transition decision
//! - `auth`: Session refresh
//! - `syncer`: Background poll loop

mod auth;
mod evaluator;
mod reconciler;
mod state;
mod syncer;

pub use syncer::PresenceSyncer;

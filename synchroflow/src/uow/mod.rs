//! Units of work: per-exchange callback bookkeeping and lifecycle.
//!
//! This module provides:
//! - UnitOfWork, the state holder for one exchange
//! - UnitOfWorkState, its lifecycle
//! - UnitOfWorkVariant and CorrelationContext for diagnostic logging
//! - ResourceRegistry for resources released when a unit of work stops

mod resources;
mod state;
mod unit;
mod variant;

pub use resources::ResourceRegistry;
pub use state::UnitOfWorkState;
pub use unit::UnitOfWork;
pub use variant::{CorrelationContext, UnitOfWorkVariant};

//! Exchange negotiation state machine
//!
//! Pure transitions over a per-item negotiation status. Persistence and the
//! item catalog side effect live in the engine; this module only decides.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::{Action, Event};
pub use state::{ExchangeStatus, Participants, Role, UnknownStatus};
pub use transition::{transition, TransitionError, TransitionResult};

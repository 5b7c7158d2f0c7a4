//! Effects produced by status transitions

/// Effects to be applied together with the new status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Record who started the negotiation and who answers it
    FixParticipants {
        initiator_id: String,
        counterparty_id: String,
    },

    /// Flip the item to "not available" in the same unit as the status write
    MarkItemUnavailable,

    /// Chat line the acting client should append after the transition.
    /// Best effort: never part of the status commit.
    Narrate { content: String },
}

impl Effect {
    pub fn narrate(content: impl Into<String>) -> Self {
        Effect::Narrate {
            content: content.into(),
        }
    }
}

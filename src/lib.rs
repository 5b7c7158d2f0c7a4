//! swapdesk - peer-to-peer item exchange negotiation
//!
//! A per-item negotiation state machine overlaid on a direct-message thread,
//! served over HTTP and watched by polling clients.

pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod poller;
pub mod state_machine;

//! # reviewroom-client-core
//!
//! Client-side companion to `reviewroom-session-core`: a read-only
//! [`mirror::SessionMirror`] of one live review session, kept current by
//! applying the coordinator's broadcast deltas and bootstrapped (or
//! repaired) from a resync response. The client never owns session state;
//! mic/camera toggles and presence shown in a UI come from the mirror, and
//! every mutation goes through the coordinator.

pub mod mirror;

pub use mirror::{Applied, SessionMirror};

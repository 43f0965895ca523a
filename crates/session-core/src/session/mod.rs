//! Session lifecycle state machine

mod session;

pub use session::{EndEffect, JoinEffect, LeaveEffect, Session};

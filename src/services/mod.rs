//! Domain services behind the websocket route.
//!
//! ARCHITECTURE
//! ============
//! `validate` and `command` are pure: they turn frames into typed commands
//! and commands into state changes plus events. `hub` owns the state and
//! the connection set; `broadcast`, `timer` and `fonts` are its helpers.
//! `persistence` snapshots the hub from the outside, and `shutdown` runs
//! the bounded teardown across all of them.

pub mod broadcast;
pub mod command;
pub mod fonts;
pub mod hub;
pub mod persistence;
pub mod shutdown;
pub mod timer;
pub mod validate;

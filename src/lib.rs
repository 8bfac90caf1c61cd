//! Result delivery for virtual try-on jobs.
//!
//! A submitted job is watched by three independent channels (polling, pushed
//! events and a manual check). [`coordinator::JobResultCoordinator`] reduces
//! their racing observations to one displayed result and one order, holds a
//! finished result behind the contact-details gate, and persists per-tab state
//! so a reload resumes where it left off.

pub mod backend;
pub mod channels;
pub mod config;
pub mod coordinator;
pub mod demo;
pub mod error;
pub mod gate;
pub mod logging;
pub mod order;
pub mod session;
pub mod state_machine;
pub mod ui;

//! Card-view task switcher core.
//!
//! Mirrors an external window stack into a horizontally scrolling strip of
//! cards, lays the strip out, tracks the current card and runs the
//! show/hide lifecycle around it. Windows, cards, the stack and the scroll
//! container are collaborators behind traits; [`desktop`] provides an
//! in-memory implementation of all of them.

pub mod card;
pub mod config;
pub mod daemon;
pub mod desktop;
pub mod events;
pub mod input;
pub mod ipc;
pub mod layout;
pub mod position;
pub mod socket_client;
pub mod socket_server;
pub mod stack;
pub mod synchronizer;
pub mod task_manager;
pub mod window;

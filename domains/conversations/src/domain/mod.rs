//! Domain model for the Conversations domain

pub mod entities;
pub mod state;

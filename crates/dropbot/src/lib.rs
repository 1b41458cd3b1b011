//! dropbot: the Telegram front end of the dropcore pipeline.
//!
//! [`telegram`] holds the transport, the dispatcher schema and the pieces
//! the handlers are built from; [`cli`] the command line of the binary.

pub mod cli;
pub mod telegram;

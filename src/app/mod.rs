//! Application runtime composition modules.

pub(crate) mod exit_handler;
pub(crate) mod progress_manager;
pub(crate) mod runtime;
pub(crate) mod selection;
pub(crate) mod terminal;

//! Testing utilities.
//!
//! This module provides:
//! - Deterministic doubles for every collaborator
//! - A helper that waits for a generation to finish

mod doubles;
mod helpers;

pub use doubles::{MockCompositor, MockImageGenerator, MockPromptRewriter, MockVideoGenerator};
pub use helpers::{fast_config, wait_for_terminal};

//! Tessera: a UML class-diagram editor core with AI review and polling collaboration.
//!
//! [`Editor`] is what a canvas front end holds. The `tessera` binary drives the same code from
//! the command line against diagrams saved as JSON.

pub mod args;
pub mod cli;
pub mod editor;
pub mod error;

pub use args::Cli;
pub use cli::run;
pub use editor::{AnalysisFlow, Editor};
pub use error::EditorError;

//! Terminal output.
//!
//! ```text
//! commands ──▶ Output (Reporter) ──events──▶ UiActor thread ──▶ SlotTable ──▶ stdout
//! ```
//!
//! Commands and the core download loop only ever hold an [`Output`]; the
//! actor thread is the single writer to the terminal.

pub mod actor;
pub mod buffer;
pub mod engine;
pub mod list;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;
pub mod tree;

pub use output::Output;
pub use theme::Theme;

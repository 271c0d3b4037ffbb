//! Command implementations.
//!
//! Available commands:
//! - **run**: search a tree with a taxonomy and write a full or summary report
//! - **list**: validate a taxonomy and list its epics
//! - **init**: write a starter taxonomy file
//!
//! `run` with a date range dispatches to [`history`] instead.

pub mod history;
pub mod init;
pub mod list;
pub mod run;

pub use history::{run_history, HistoryOptions};
pub use init::init_taxonomy;
pub use list::list_epics;
pub use run::{run, RunOptions, RunSummary};

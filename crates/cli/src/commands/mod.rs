//! CLI commands for the double calendar monitor.

pub mod monitor;
pub mod positions;

pub use monitor::{run_monitor, run_once};
pub use positions::{run_add, run_adjust, run_list, run_remove, AddArgs, AdjustArgs};

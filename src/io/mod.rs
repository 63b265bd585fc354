/*!
# Reading and writing chain output

The state log is a tab-separated table with one row per sample. Its columns
are fixed when the chain starts (see [`state_log::LogLayout`]), and floats
are written with their shortest round-trip representation so a run can be
continued from the last row.
*/

pub mod state_log;

pub use state_log::{read_state_log, restore_state, LogLayout, StateLogTable, StateLogWriter};

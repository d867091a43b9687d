pub mod command_table;
pub mod switch_selector;

pub use command_table::{CommandEntry, CommandTable, Subsystem, SwitchCommand};
pub use switch_selector::SwitchSelector;

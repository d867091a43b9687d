use strum::EnumCount;

use super::command_table::{CommandTable, SwitchCommand};
use crate::timebase::Timebase;

// ---------------------------------------------------------------------------
// Switch-selector sequencer
// ---------------------------------------------------------------------------

/// Per-phase "next command" cursors.
///
/// A cursor only ever moves forward while its phase is active. It is reset
/// when the phase is entered fresh and restored when an excursion hands
/// control back to its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchSelector {
    cursors: [usize; Timebase::COUNT],
}

impl Default for SwitchSelector {
    fn default() -> Self {
        Self { cursors: [0; Timebase::COUNT] }
    }
}

impl SwitchSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire every command of `phase` whose time has elapsed, in table order,
    /// each exactly once.
    pub fn process(&mut self, phase: Timebase, clock: f64, table: &CommandTable) -> Vec<SwitchCommand> {
        let entries = table.entries(phase);
        let cursor = &mut self.cursors[phase.index()];
        let mut fired = Vec::new();
        while let Some(entry) = entries.get(*cursor) {
            if entry.time > clock {
                break;
            }
            fired.push(entry.command);
            *cursor += 1;
        }
        fired
    }

    /// True once the cursor has run off the end of the phase's table.
    pub fn sequence_complete(&self, phase: Timebase, table: &CommandTable) -> bool {
        self.cursors[phase.index()] >= table.entries(phase).len()
    }

    pub fn cursor(&self, phase: Timebase) -> usize {
        self.cursors[phase.index()]
    }

    pub fn set_cursor(&mut self, phase: Timebase, cursor: usize) {
        self.cursors[phase.index()] = cursor;
    }

    pub fn reset(&mut self, phase: Timebase) {
        self.set_cursor(phase, 0);
    }

    /// All cursors, indexed by [`Timebase::index`].
    pub fn cursors_mut(&mut self) -> &mut [usize] {
        &mut self.cursors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::Subsystem;

    fn two_command_table() -> CommandTable {
        CommandTable::parse("TB3\n5.0,IU,3\n12.0,IU,7\nEND\n")
    }

    #[test]
    fn fires_each_command_once_at_first_eligible_tick() {
        let table = two_command_table();
        let mut ss = SwitchSelector::new();
        let a = SwitchCommand::new(Subsystem::InstrumentUnit, 3);
        let b = SwitchCommand::new(Subsystem::InstrumentUnit, 7);

        assert!(ss.process(Timebase::Tb3, 0.0, &table).is_empty());
        assert!(ss.process(Timebase::Tb3, 4.0, &table).is_empty());
        assert_eq!(ss.process(Timebase::Tb3, 6.0, &table), vec![a]);
        assert_eq!(ss.process(Timebase::Tb3, 13.0, &table), vec![b]);
        assert!(ss.process(Timebase::Tb3, 20.0, &table).is_empty());
        assert!(ss.sequence_complete(Timebase::Tb3, &table));
    }

    #[test]
    fn catches_up_in_order_after_a_long_tick() {
        let table = two_command_table();
        let mut ss = SwitchSelector::new();
        let fired = ss.process(Timebase::Tb3, 100.0, &table);
        let channels: Vec<u16> = fired.iter().map(|c| c.channel).collect();
        assert_eq!(channels, vec![3, 7]);
        // repeated call is idempotent
        assert!(ss.process(Timebase::Tb3, 100.0, &table).is_empty());
    }

    #[test]
    fn cursors_are_independent_per_phase() {
        let table = CommandTable::parse("TB1\n0.0,IU,1\nTB2\n0.0,IU,2\n");
        let mut ss = SwitchSelector::new();
        assert_eq!(ss.process(Timebase::Tb1, 0.0, &table).len(), 1);
        assert_eq!(ss.cursor(Timebase::Tb1), 1);
        assert_eq!(ss.cursor(Timebase::Tb2), 0);
        assert!(!ss.sequence_complete(Timebase::Tb2, &table));
        // empty phase is trivially complete
        assert!(ss.sequence_complete(Timebase::Tb5, &table));
    }

    #[test]
    fn never_fires_out_of_order_for_any_tick_pattern() {
        let table = CommandTable::parse("TB1\n0.5,IU,1\n1.0,IU,2\n1.0,IU,3\n4.25,IU,4\n9.0,IU,5\n");
        for step in [0.1, 0.33, 0.5, 1.0, 2.7, 10.0] {
            let mut ss = SwitchSelector::new();
            let mut clock = 0.0;
            let mut fired = Vec::new();
            while clock < 12.0 {
                fired.extend(ss.process(Timebase::Tb1, clock, &table));
                clock += step;
            }
            fired.extend(ss.process(Timebase::Tb1, clock, &table));
            let channels: Vec<u16> = fired.iter().map(|c| c.channel).collect();
            assert_eq!(channels, vec![1, 2, 3, 4, 5], "step {step}");
        }
    }
}

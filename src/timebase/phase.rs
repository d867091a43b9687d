use strum_macros::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

// ---------------------------------------------------------------------------
// Mission phases ("timebases")
// ---------------------------------------------------------------------------

/// Mission phase with its own elapsed-time clock and command schedule.
///
/// The string form is shared by command-table phase markers and persisted
/// state keys.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Display,
    EnumString,
    EnumIter,
    EnumCount,
    IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Timebase {
    #[default]
    #[strum(to_string = "PRELAUNCH")]
    PreLaunch,
    /// Platform released to inertial, vehicle still on the pad.
    #[strum(to_string = "GRR")]
    ReferenceReleased,
    /// First-stage powered flight.
    #[strum(to_string = "TB1")]
    Tb1,
    /// First-stage engine cutoff and staging.
    #[strum(to_string = "TB2")]
    Tb2,
    /// Second-stage powered flight.
    #[strum(to_string = "TB3")]
    Tb3,
    /// Third-stage first burn, or orbital coast for a single upper stage.
    #[strum(to_string = "TB4")]
    Tb4,
    /// Parking-orbit coast.
    #[strum(to_string = "TB5")]
    Tb5,
    /// Restart preparation and re-ignition.
    #[strum(to_string = "TB6")]
    Tb6,
    /// Burner-malfunction alternate sequence (excursion from TB6).
    #[strum(to_string = "TB6A")]
    Tb6a,
    /// Restart-inhibit safing sequence (excursion from TB6).
    #[strum(to_string = "TB6B")]
    Tb6b,
    /// Post-injection coast.
    #[strum(to_string = "TB7")]
    Tb7,
    /// Lunar-impact maneuver.
    #[strum(to_string = "TB8")]
    Tb8,
    #[strum(to_string = "ABORT")]
    Abort,
    /// Terminal stop, no further work.
    #[strum(to_string = "COMPLETE")]
    Complete,
}

impl Timebase {
    /// Dense index, usable for per-phase arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Bounded excursion that returns to a recorded parent phase.
    pub fn is_excursion(self) -> bool {
        matches!(self, Timebase::Tb6a | Timebase::Tb6b)
    }

    /// Phases in which the vehicle can still be commanded to abort.
    pub fn is_abortable(self) -> bool {
        matches!(
            self,
            Timebase::Tb1 | Timebase::Tb2 | Timebase::Tb3 | Timebase::Tb4 | Timebase::Tb6
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::{EnumCount, IntoEnumIterator};

    #[test]
    fn markers_round_trip() {
        for tb in Timebase::iter() {
            let text = tb.to_string();
            assert_eq!(Timebase::from_str(&text).ok(), Some(tb), "marker {text}");
        }
        assert_eq!(Timebase::from_str("tb6a").ok(), Some(Timebase::Tb6a));
    }

    #[test]
    fn index_is_dense() {
        let indices: Vec<usize> = Timebase::iter().map(Timebase::index).collect();
        assert_eq!(indices, (0..Timebase::COUNT).collect::<Vec<_>>());
    }
}

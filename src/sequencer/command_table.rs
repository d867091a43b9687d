use std::fmt;
use std::path::Path;
use std::str::FromStr;

use strum::EnumCount;
use strum_macros::{Display, EnumIter, EnumString};

use crate::error::LoadError;
use crate::timebase::Timebase;
use crate::vehicle::VehicleKind;

// ---------------------------------------------------------------------------
// Discrete commands
// ---------------------------------------------------------------------------

/// Switch-selector addressee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum Subsystem {
    #[strum(to_string = "IU")]
    InstrumentUnit,
    #[strum(to_string = "STAGE1")]
    FirstStage,
    #[strum(to_string = "STAGE2")]
    SecondStage,
    #[strum(to_string = "STAGE3")]
    ThirdStage,
}

impl Subsystem {
    /// Accepts either the symbolic name or the numeric id (0..=3).
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        match text.parse::<u8>() {
            Ok(0) => Some(Subsystem::InstrumentUnit),
            Ok(1) => Some(Subsystem::FirstStage),
            Ok(2) => Some(Subsystem::SecondStage),
            Ok(3) => Some(Subsystem::ThirdStage),
            Ok(_) => None,
            Err(_) => Subsystem::from_str(text).ok(),
        }
    }
}

/// One discrete command: subsystem plus channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwitchCommand {
    pub subsystem: Subsystem,
    pub channel: u16,
}

impl SwitchCommand {
    pub const fn new(subsystem: Subsystem, channel: u16) -> Self {
        Self { subsystem, channel }
    }
}

impl fmt::Display for SwitchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subsystem, self.channel)
    }
}

/// Scheduled command: fire time within the phase plus the command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandEntry {
    pub time: f64, // s, phase-relative
    pub command: SwitchCommand,
}

// ---------------------------------------------------------------------------
// Command table
// ---------------------------------------------------------------------------

const END_MARKER: &str = "END";

/// Per-phase ordered command schedules. Read-only once loaded.
#[derive(Debug, Clone)]
pub struct CommandTable {
    phases: Vec<Vec<CommandEntry>>,
    /// 1-based line numbers that could not be parsed.
    skipped: Vec<usize>,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self {
            phases: vec![Vec::new(); Timebase::COUNT],
            skipped: Vec::new(),
        }
    }
}

impl CommandTable {
    /// Parse the text format:
    ///
    /// ```text
    /// # comment
    /// TB1
    /// 0.0,IU,12
    /// 135.3,STAGE1,4
    /// TB2
    /// ...
    /// END
    /// ```
    ///
    /// Unparseable lines (and data before the first phase marker) are
    /// skipped. Each phase is stably sorted by fire time.
    pub fn parse(text: &str) -> Self {
        let mut table = Self::default();
        let mut phase: Option<Timebase> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.eq_ignore_ascii_case(END_MARKER) {
                break;
            }
            if let Ok(tb) = Timebase::from_str(line) {
                phase = Some(tb);
                continue;
            }
            match (phase, parse_entry(line)) {
                (Some(tb), Some(entry)) => table.phases[tb.index()].push(entry),
                _ => {
                    tracing::warn!(line = idx + 1, text = line, "skipping command table line");
                    table.skipped.push(idx + 1);
                }
            }
        }

        for entries in &mut table.phases {
            entries.sort_by(|a, b| a.time.total_cmp(&b.time));
        }
        table
    }

    /// Read and parse a table file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    /// Table shipped with the crate for a vehicle kind.
    pub fn builtin(kind: VehicleKind) -> Self {
        match kind {
            VehicleKind::SaturnIb => Self::parse(include_str!("../../data/saturn_ib.tbl")),
            VehicleKind::SaturnV => Self::parse(include_str!("../../data/saturn_v.tbl")),
        }
    }

    /// Built-in table by name (`saturn_ib`, `saturn_v`), otherwise a file path.
    pub fn named(name: &str) -> Result<Self, LoadError> {
        match name {
            "saturn_ib" => Ok(Self::builtin(VehicleKind::SaturnIb)),
            "saturn_v" => Ok(Self::builtin(VehicleKind::SaturnV)),
            path => Self::load(path),
        }
    }

    pub fn entries(&self, phase: Timebase) -> &[CommandEntry] {
        &self.phases[phase.index()]
    }

    pub fn skipped_lines(&self) -> &[usize] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.phases.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_entry(line: &str) -> Option<CommandEntry> {
    let mut fields = line.split(',');
    let time: f64 = fields.next()?.trim().parse().ok()?;
    let subsystem = Subsystem::parse(fields.next()?)?;
    let channel: u16 = fields.next()?.trim().parse().ok()?;
    if fields.next().is_some() || !time.is_finite() || time < 0.0 {
        return None;
    }
    Some(CommandEntry {
        time,
        command: SwitchCommand::new(subsystem, channel),
    })
}

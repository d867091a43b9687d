//! Telemetry sink injected into the guidance computer.
//!
//! The core never logs through globals. Every noteworthy transition or
//! computation is described as a [`GuidanceEvent`] and handed to whatever
//! sink the host installed.

use crate::sequencer::SwitchCommand;
use crate::timebase::Timebase;

/// Something the guidance computer did or noticed.
#[derive(Debug, Clone, PartialEq)]
pub enum GuidanceEvent {
    PhaseEntered {
        from: Timebase,
        to: Timebase,
        mission_time: f64,
    },
    ExcursionReturned {
        from: Timebase,
        parent: Timebase,
        restored_clock: f64,
    },
    CommandIssued {
        phase: Timebase,
        clock: f64,
        command: SwitchCommand,
    },
    GuidanceCycle {
        phase: Timebase,
        time_to_go: f64,
        pitch: f64,
        yaw: f64,
    },
    CutoffPredicted {
        phase: Timebase,
        cutoff_clock: f64,
    },
    EngineOut {
        phase: Timebase,
        clock: f64,
    },
    TargetSelected {
        source: &'static str,
        inclination: f64,
        descending_node: f64,
        eccentricity: f64,
    },
    /// A direct restart target update had no valid conic; the
    /// opportunity table was used instead.
    RestartFallback {
        c3: f64,
        eccentricity: f64,
    },
    ReferenceFailure {
        reason: String,
    },
}

/// Receiver for guidance events.
pub trait TelemetrySink {
    fn event(&mut self, event: &GuidanceEvent);
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn event(&mut self, _event: &GuidanceEvent) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn event(&mut self, event: &GuidanceEvent) {
        match event {
            GuidanceEvent::PhaseEntered { from, to, mission_time } => {
                tracing::info!(%from, %to, mission_time, "timebase transition");
            }
            GuidanceEvent::ExcursionReturned { from, parent, restored_clock } => {
                tracing::info!(%from, %parent, restored_clock, "excursion returned to parent");
            }
            GuidanceEvent::CommandIssued { phase, clock, command } => {
                tracing::debug!(%phase, clock, subsystem = %command.subsystem, channel = command.channel, "switch selector");
            }
            GuidanceEvent::GuidanceCycle { phase, time_to_go, pitch, yaw } => {
                tracing::debug!(
                    %phase,
                    time_to_go,
                    pitch_deg = pitch.to_degrees(),
                    yaw_deg = yaw.to_degrees(),
                    "guidance cycle"
                );
            }
            GuidanceEvent::CutoffPredicted { phase, cutoff_clock } => {
                tracing::debug!(%phase, cutoff_clock, "cutoff predicted");
            }
            GuidanceEvent::EngineOut { phase, clock } => {
                tracing::warn!(%phase, clock, "engine out");
            }
            GuidanceEvent::TargetSelected { source, inclination, descending_node, eccentricity } => {
                tracing::info!(
                    source,
                    inclination_deg = inclination.to_degrees(),
                    node_deg = descending_node.to_degrees(),
                    eccentricity,
                    "target selected"
                );
            }
            GuidanceEvent::RestartFallback { c3, eccentricity } => {
                tracing::warn!(c3, eccentricity, "direct target update has no valid conic, using table");
            }
            GuidanceEvent::ReferenceFailure { reason } => {
                tracing::error!(reason = reason.as_str(), "guidance reference failure");
            }
        }
    }
}

/// Keeps every event, for tests and post-run inspection.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub events: Vec<GuidanceEvent>,
}

impl TelemetrySink for RecordingSink {
    fn event(&mut self, event: &GuidanceEvent) {
        self.events.push(event.clone());
    }
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Box<T> {
    fn event(&mut self, event: &GuidanceEvent) {
        (**self).event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order() {
        let mut sink = RecordingSink::default();
        sink.event(&GuidanceEvent::EngineOut { phase: Timebase::Tb1, clock: 40.0 });
        sink.event(&GuidanceEvent::ReferenceFailure { reason: "test".into() });
        assert_eq!(sink.events.len(), 2);
        assert!(matches!(sink.events[0], GuidanceEvent::EngineOut { .. }));
    }
}

use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::orbital::{LaunchFrame, OrbitElements};
use crate::sim::{EventKind, FlightRecord};
/// Achieved orbit at the end of the run.
#[derive(Debug, Clone, Serialize)]
pub struct OrbitSummary {
    pub perigee_km: f64,
    pub apogee_km: Option<f64>,
    pub eccentricity: f64,
    pub inclination_deg: f64,
    pub period_min: Option<f64>,
    pub c3_km2s2: f64,
}

impl OrbitSummary {
    pub fn from_elements(el: &OrbitElements) -> Self {
        let apogee = el.apogee_altitude();
        Self {
            perigee_km: el.perigee_altitude() / 1000.0,
            apogee_km: apogee.is_finite().then_some(apogee / 1000.0),
            eccentricity: el.ecc,
            inclination_deg: el.inc.to_degrees(),
            period_min: el.period().map(|p| p / 60.0),
            c3_km2s2: el.c3 / 1e6,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventEntry {
    pub time: f64,
    pub event: String,
}

/// Summary of one flight.
#[derive(Debug, Clone, Serialize)]
pub struct FlightSummary {
    pub vehicle: String,
    pub final_phase: String,
    pub flight_time_s: f64,
    pub max_altitude_m: f64,
    pub max_speed_ms: f64,
    pub max_nav_error_m: f64,
    pub reference_failure: bool,
    pub impact: bool,
    pub orbit: Option<OrbitSummary>,
    pub events: Vec<EventEntry>,
}

impl FlightSummary {
    /// Compute summary from a flight record. The orbit is reported only when
    /// the run ended above the atmosphere.
    pub fn from_record(vehicle: &str, record: &FlightRecord, frame: &LaunchFrame) -> Self {
        let samples = &record.samples;
        let max_altitude = samples.iter().map(|s| s.altitude).fold(0.0_f64, f64::max);
        let max_speed = samples.iter().map(|s| s.speed).fold(0.0_f64, f64::max);
        let max_nav_error = samples.iter().map(|s| s.nav_error).fold(0.0_f64, f64::max);
        let impact = record.events.iter().any(|e| e.kind == EventKind::Impact);

        let orbit = samples
            .last()
            .filter(|s| s.altitude > 100_000.0 && !impact)
            .map(|s| OrbitSummary::from_elements(&OrbitElements::from_platform(&s.pos, &s.vel, frame)));

        FlightSummary {
            vehicle: vehicle.to_string(),
            final_phase: record.final_phase.to_string(),
            flight_time_s: samples.last().map_or(0.0, |s| s.time),
            max_altitude_m: max_altitude,
            max_speed_ms: max_speed,
            max_nav_error_m: max_nav_error,
            reference_failure: record.reference_failure,
            impact,
            orbit,
            events: record
                .events
                .iter()
                .map(|e| EventEntry { time: e.time, event: e.kind.to_string() })
                .collect(),
        }
    }
}

/// Write flight summary as JSON to a writer.
pub fn write_summary<W: Write>(writer: &mut W, summary: &FlightSummary) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, summary)?;
    writeln!(writer)
}

/// Write flight summary JSON to a file.
pub fn write_summary_file(path: impl AsRef<Path>, summary: &FlightSummary) -> io::Result<()> {
    let mut file = io::BufWriter::new(std::fs::File::create(path)?);
    write_summary(&mut file, summary)?;
    file.flush()
}

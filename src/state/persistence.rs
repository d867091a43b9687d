//! Text persistence of [`GuidanceState`].
//!
//! One field per line, `KEY v1 v2 ...`, closed by `END_GUIDANCE <phase>`.
//! Floats are written in their shortest round-trip form so a saved state
//! restores bit for bit. Reading starts from a default state and
//! overrides whatever the record provides; unknown keys and malformed
//! lines are ignored.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::str::FromStr;

use nalgebra::{Matrix3, Vector3};

use super::guidance_state::{FieldVisitor, GuidanceState};
use crate::timebase::Timebase;

pub const END_MARKER: &str = "END_GUIDANCE";

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

struct Writer {
    out: String,
}

impl Writer {
    fn line(&mut self, key: &str, values: impl IntoIterator<Item = String>) {
        self.out.push_str(key);
        for v in values {
            self.out.push(' ');
            self.out.push_str(&v);
        }
        self.out.push('\n');
    }
}

impl FieldVisitor for Writer {
    fn scalar(&mut self, key: &str, value: &mut f64) {
        self.line(key, [value.to_string()]);
    }

    fn flag(&mut self, key: &str, value: &mut bool) {
        self.line(key, [u8::from(*value).to_string()]);
    }

    fn count(&mut self, key: &str, value: &mut usize) {
        self.line(key, [value.to_string()]);
    }

    fn vector(&mut self, key: &str, value: &mut Vector3<f64>) {
        self.line(key, value.iter().map(f64::to_string));
    }

    fn matrix(&mut self, key: &str, value: &mut Matrix3<f64>) {
        // row-major on disk
        let rows: Vec<String> = (0..3)
            .flat_map(|r| (0..3).map(move |c| (r, c)))
            .map(|(r, c)| value[(r, c)].to_string())
            .collect();
        self.line(key, rows);
    }

    fn phase(&mut self, key: &str, value: &mut Timebase) {
        self.line(key, [value.to_string()]);
    }
}

/// Serialize the full guidance state.
pub fn serialize(state: &GuidanceState) -> String {
    let mut copy = state.clone();
    let mut w = Writer { out: String::new() };
    copy.fields(&mut w);
    let _ = writeln!(w.out, "{END_MARKER} {}", state.phase);
    w.out
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

struct Reader<'a> {
    fields: HashMap<&'a str, Vec<&'a str>>,
    used: Vec<&'a str>,
}

impl<'a> Reader<'a> {
    fn values(&mut self, key: &str) -> Option<&[&'a str]> {
        let (k, v) = self.fields.get_key_value(key)?;
        self.used.push(k);
        Some(v.as_slice())
    }

    fn parsed<T: FromStr, const N: usize>(&mut self, key: &str) -> Option<[T; N]> {
        let values = self.values(key)?;
        if values.len() != N {
            return None;
        }
        let parsed: Vec<T> = values.iter().map(|s| s.parse().ok()).collect::<Option<_>>()?;
        parsed.try_into().ok()
    }
}

impl FieldVisitor for Reader<'_> {
    fn scalar(&mut self, key: &str, value: &mut f64) {
        if let Some([x]) = self.parsed::<f64, 1>(key) {
            *value = x;
        }
    }

    fn flag(&mut self, key: &str, value: &mut bool) {
        if let Some([x]) = self.parsed::<u8, 1>(key) {
            *value = x != 0;
        }
    }

    fn count(&mut self, key: &str, value: &mut usize) {
        if let Some([x]) = self.parsed::<usize, 1>(key) {
            *value = x;
        }
    }

    fn vector(&mut self, key: &str, value: &mut Vector3<f64>) {
        if let Some(xs) = self.parsed::<f64, 3>(key) {
            *value = Vector3::from(xs);
        }
    }

    fn matrix(&mut self, key: &str, value: &mut Matrix3<f64>) {
        if let Some(xs) = self.parsed::<f64, 9>(key) {
            *value = Matrix3::from_row_slice(&xs);
        }
    }

    fn phase(&mut self, key: &str, value: &mut Timebase) {
        if let Some([tb]) = self.parsed::<Timebase, 1>(key) {
            *value = tb;
        }
    }
}

/// Read a record on top of `defaults`.
pub fn deserialize_onto(text: &str, mut defaults: GuidanceState) -> GuidanceState {
    let mut fields = HashMap::new();
    let mut end_phase = None;
    for line in text.lines() {
        let mut tokens = line.split_whitespace();
        let Some(key) = tokens.next() else { continue };
        if key == END_MARKER {
            end_phase = tokens.next().and_then(|p| Timebase::from_str(p).ok());
            break;
        }
        fields.insert(key, tokens.collect::<Vec<_>>());
    }

    let has_phase = fields.contains_key("PHASE");
    let mut reader = Reader { fields, used: Vec::new() };
    defaults.fields(&mut reader);
    if let (false, Some(phase)) = (has_phase, end_phase) {
        defaults.phase = phase;
    }

    for key in reader.fields.keys().filter(|k| !reader.used.contains(k)) {
        tracing::debug!(key, "ignoring unknown guidance state key");
    }
    defaults
}

/// Read a record on top of an empty state.
pub fn deserialize(text: &str) -> GuidanceState {
    deserialize_onto(text, GuidanceState::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::guidance_state::Excursion;
    use crate::vehicle::VehicleConfig;

    fn busy_state() -> GuidanceState {
        let mut st = GuidanceState::new(&VehicleConfig::saturn_v());
        st.phase = Timebase::Tb6a;
        st.clock = 1.0 / 3.0;
        st.mission_time = 9_876.543_210_987;
        st.cycle_time = 0.1 + 0.2;
        st.excursion = Some(Excursion { parent: Timebase::Tb6, clock: 120.25, cursor: 2 });
        st.sequencer.set_cursor(Timebase::Tb6, 2);
        st.nav.velocity = Vector3::new(-0.0, 7_791.123_456_789, f64::MIN_POSITIVE);
        st.igm.arcs.arcs[1].remaining = 123.456;
        st.igm.arcs.active = 1;
        st.igm.cutoff_clock = Some(402.25);
        st.igm.predictor.push(1.0, 7_000.0);
        st.igm.predictor.push(2.7, 7_030.5);
        st.igm.plane = Matrix3::new(0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9);
        st.reference_failure = true;
        st.restart.selected = Some(st.igm.target);
        st
    }

    #[test]
    fn round_trip_is_exact() {
        let st = busy_state();
        let text = serialize(&st);
        let back = deserialize(&text);
        assert_eq!(back, st);
        // signed zero survives
        assert!(back.nav.velocity.x.is_sign_negative());
        assert!(text.trim_end().ends_with("END_GUIDANCE TB6A"));
    }

    #[test]
    fn matrix_written_row_major() {
        let text = serialize(&busy_state());
        assert!(text.lines().any(|l| l == "MG 0.1 0.2 0.3 0.4 0.5 0.6 0.7 0.8 0.9"));
    }

    #[test]
    fn missing_and_unknown_keys() {
        let defaults = GuidanceState::new(&VehicleConfig::saturn_ib());
        let text = "CLOCK 12.5\nFUTURE_KEY 1 2 3\nPOS 1 2\nnonsense\n\nEND_GUIDANCE TB3\nCLOCK 99\n";
        let st = deserialize_onto(text, defaults.clone());
        assert_eq!(st.clock, 12.5);
        // phase from the end marker, malformed POS ignored, data after END ignored
        assert_eq!(st.phase, Timebase::Tb3);
        assert_eq!(st.nav.position, defaults.nav.position);
        assert_eq!(st.igm, defaults.igm);
    }

    #[test]
    fn optional_fields_clear_when_unset() {
        let mut st = busy_state();
        st.igm.cutoff_clock = None;
        st.excursion = None;
        let back = deserialize(&serialize(&st));
        assert_eq!(back.igm.cutoff_clock, None);
        assert_eq!(back.excursion, None);
    }
}

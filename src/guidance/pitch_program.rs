use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// First-stage open-loop pitch program
// ---------------------------------------------------------------------------

/// Polynomial in (t - start), degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchSegment {
    pub start: f64, // s
    pub end: f64,   // s
    pub coeffs: Vec<f64>,
}

impl PitchSegment {
    fn eval(&self, t: f64) -> f64 {
        let x = t - self.start;
        self.coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchProgram {
    pub vertical_until: f64, // s, tower clearance
    pub segments: Vec<PitchSegment>,
    pub tilt_arrest: f64, // s, pitch held from here on
}

impl PitchProgram {
    /// Pitch from vertical (rad) at program time `t`.
    pub fn pitch(&self, t: f64) -> f64 {
        if t < self.vertical_until {
            return 0.0;
        }
        let t = t.min(self.tilt_arrest);
        let deg = self
            .segments
            .iter()
            .find(|s| t >= s.start && t <= s.end)
            .or_else(|| self.segments.iter().rev().find(|s| t > s.end))
            .map(|s| s.eval(t.min(s.end)))
            .unwrap_or(0.0);
        deg.to_radians()
    }
}

// ---------------------------------------------------------------------------
// First-stage engine out
// ---------------------------------------------------------------------------

/// Pitch-freeze duration as a function of failure time:
/// `B11 t + B12` up to the knee, `B21 t + B22` after.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineOutModel {
    pub knee: f64, // s
    pub b11: f64,
    pub b12: f64,
    pub b21: f64,
    pub b22: f64,
}

impl EngineOutModel {
    pub fn freeze_duration(&self, failure_time: f64) -> f64 {
        let dt = if failure_time <= self.knee {
            self.b11 * failure_time + self.b12
        } else {
            self.b21 * failure_time + self.b22
        };
        dt.max(0.0)
    }
}

/// Program time after an engine failure at `failure` with freeze `freeze`:
/// the program stops for the freeze interval then resumes, which also pushes
/// tilt arrest out by the same amount.
pub fn program_time(t: f64, failure: Option<(f64, f64)>) -> f64 {
    match failure {
        None => t,
        Some((tf, _)) if t < tf => t,
        Some((tf, freeze)) if t < tf + freeze => tf,
        Some((_, freeze)) => t - freeze,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program() -> PitchProgram {
        PitchProgram {
            vertical_until: 10.0,
            segments: vec![
                PitchSegment { start: 10.0, end: 60.0, coeffs: vec![0.0, 0.5] },
                PitchSegment { start: 60.0, end: 120.0, coeffs: vec![25.0, 0.3] },
            ],
            tilt_arrest: 120.0,
        }
    }

    #[test]
    fn vertical_then_polynomial_then_hold() {
        let p = program();
        assert_eq!(p.pitch(5.0), 0.0);
        assert!((p.pitch(30.0).to_degrees() - 10.0).abs() < 1e-9);
        assert!((p.pitch(90.0).to_degrees() - 34.0).abs() < 1e-9);
        let arrest = p.pitch(120.0);
        assert!((arrest.to_degrees() - 43.0).abs() < 1e-9);
        assert_eq!(p.pitch(400.0), arrest);
    }

    #[test]
    fn freeze_duration_branches_at_knee() {
        let m = EngineOutModel { knee: 42.0, b11: -0.62, b12: 40.9, b21: -0.3611, b22: 29.25 };
        assert!((m.freeze_duration(10.0) - 34.7).abs() < 1e-9);
        assert!((m.freeze_duration(50.0) - (29.25 - 18.055)).abs() < 1e-9);
        assert_eq!(m.freeze_duration(200.0), 0.0);
    }

    #[test]
    fn engine_out_delays_tilt_arrest() {
        let p = program();
        let failure = Some((40.0, 15.0));
        assert_eq!(program_time(30.0, failure), 30.0);
        assert_eq!(program_time(50.0, failure), 40.0);
        assert_eq!(program_time(70.0, failure), 55.0);
        // nominal arrest at 120 now reached at 135
        assert!(p.pitch(program_time(130.0, failure)) < p.pitch(120.0));
        assert_eq!(p.pitch(program_time(135.0, failure)), p.pitch(120.0));
    }
}

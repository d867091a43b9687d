// ---------------------------------------------------------------------------
// High-speed loop: cutoff prediction from the recent speed history
// ---------------------------------------------------------------------------

const SAMPLES: usize = 3;

/// Last few (phase clock, inertial speed) samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CutoffPredictor {
    pub samples: Vec<(f64, f64)>,
}

impl CutoffPredictor {
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn push(&mut self, time: f64, speed: f64) {
        if self.samples.last().is_some_and(|&(t, _)| time <= t) {
            return;
        }
        if self.samples.len() == SAMPLES {
            self.samples.remove(0);
        }
        self.samples.push((time, speed));
    }

    /// Seconds after the latest sample until the speed reaches `target`.
    ///
    /// Quadratic through three samples, else linear through two, else the
    /// sensed acceleration `fallback_accel`.
    pub fn time_to_target(&self, target: f64, fallback_accel: f64) -> Option<f64> {
        let &(t2, v2) = self.samples.last()?;
        let remaining = target - v2;
        if remaining <= 0.0 {
            return Some(0.0);
        }
        let fallback = || (fallback_accel > 0.0).then(|| remaining / fallback_accel);

        let (b, c) = match self.samples.as_slice() {
            [(t0, v0), (t1, v1), _] => {
                let (x0, x1) = (t0 - t2, t1 - t2);
                let (y0, y1) = (v0 - v2, v1 - v2);
                let det = x0 * x1 * (x1 - x0);
                if det.abs() < 1e-12 {
                    return fallback();
                }
                ((y0 * x1 * x1 - y1 * x0 * x0) / det, (x0 * y1 - x1 * y0) / det)
            }
            [(t0, v0), _] => ((v2 - v0) / (t2 - t0), 0.0),
            _ => return fallback(),
        };

        let linear = || (b > 0.0).then(|| remaining / b).or_else(fallback);
        if c.abs() < 1e-12 {
            return linear();
        }
        let disc = b * b + 4.0 * c * remaining;
        if disc < 0.0 {
            return linear();
        }
        let sq = disc.sqrt();
        [(-b + sq) / (2.0 * c), (-b - sq) / (2.0 * c)]
            .into_iter()
            .filter(|x| x.is_finite() && *x >= 0.0)
            .reduce(f64::min)
            .or_else(linear)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn quadratic_fit_solves_exactly() {
        let v = |t: f64| 7_000.0 + 10.0 * t + 0.05 * t * t;
        let mut p = CutoffPredictor::default();
        for t in [96.0, 98.0, 100.0] {
            p.push(t, v(t - 100.0));
        }
        let dt = p.time_to_target(7_100.0, 0.0).unwrap();
        let expected = (-10.0 + (100.0_f64 + 20.0).sqrt()) / 0.1;
        assert_relative_eq!(dt, expected, max_relative = 1e-9);
    }

    #[test]
    fn keeps_only_latest_three() {
        let mut p = CutoffPredictor::default();
        for t in 0..6 {
            p.push(f64::from(t), 100.0 + f64::from(t));
        }
        assert_eq!(p.samples.len(), 3);
        assert_eq!(p.samples[0].0, 3.0);
        // stale or repeated times are ignored
        p.push(5.0, 0.0);
        assert_eq!(p.samples.len(), 3);
        assert_eq!(p.samples[2].1, 105.0);
    }

    #[test]
    fn linear_fallback_with_two_samples() {
        let mut p = CutoffPredictor::default();
        p.push(0.0, 7_000.0);
        p.push(2.0, 7_020.0);
        assert_relative_eq!(p.time_to_target(7_050.0, 0.0).unwrap(), 3.0);
    }

    #[test]
    fn single_sample_uses_sensed_accel() {
        let mut p = CutoffPredictor::default();
        p.push(0.0, 7_000.0);
        assert_relative_eq!(p.time_to_target(7_030.0, 15.0).unwrap(), 2.0);
        assert!(p.time_to_target(7_030.0, 0.0).is_none());
    }

    #[test]
    fn target_already_reached() {
        let mut p = CutoffPredictor::default();
        p.push(0.0, 7_800.0);
        assert_eq!(p.time_to_target(7_790.0, 10.0), Some(0.0));
    }
}

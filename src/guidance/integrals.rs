use crate::error::GuidanceFault;
use crate::vehicle::BurnArcConfig;

// ---------------------------------------------------------------------------
// Thrust integrals of one burn arc
// ---------------------------------------------------------------------------
//
// For thrust acceleration a(t) = v / (tau - t) over [0, T]:
//   L = int a            J = int a t          S = int int a
//   Q = int int a t      P = int a t^2        U = int int a t^2

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageIntegrals {
    pub l: f64,
    pub j: f64,
    pub s: f64,
    pub q: f64,
    pub p: f64,
    pub u: f64,
    pub duration: f64, // s, including coasts
}

impl StageIntegrals {
    pub const ZERO: Self = Self { l: 0.0, j: 0.0, s: 0.0, q: 0.0, p: 0.0, u: 0.0, duration: 0.0 };

    /// Closed-form integrals for exhaust velocity `v`, tau `tau` and burn
    /// time `t`. A burn of zero length contributes nothing.
    pub fn compute(v: f64, tau: f64, t: f64) -> Result<Self, GuidanceFault> {
        if !(v.is_finite() && tau.is_finite() && t.is_finite()) {
            return Err(GuidanceFault::NonFinite { stage: "stage integrals" });
        }
        if t <= 0.0 {
            return Ok(Self::ZERO);
        }
        if tau <= 0.0 || tau - t <= 0.0 {
            return Err(GuidanceFault::Depleted { tau, remaining: t });
        }
        let l = v * (tau / (tau - t)).ln();
        let j = tau * l - v * t;
        let s = t * l - j;
        let q = tau * s - 0.5 * v * t * t;
        let p = tau * j - 0.5 * v * t * t;
        let u = tau * q - v * t * t * t / 6.0;
        let out = Self { l, j, s, q, p, u, duration: t };
        if out.is_finite() {
            Ok(out)
        } else {
            Err(GuidanceFault::NonFinite { stage: "stage integrals" })
        }
    }

    /// Append `next`, flown after a coast of `coast` seconds.
    pub fn then(&self, coast: f64, next: &StageIntegrals) -> StageIntegrals {
        let t0 = self.duration + coast;
        let tail = coast + next.duration;
        StageIntegrals {
            l: self.l + next.l,
            j: self.j + next.j + next.l * t0,
            s: self.s + self.l * tail + next.s,
            q: self.q + self.j * tail + next.q + t0 * next.s,
            p: self.p + next.p + 2.0 * t0 * next.j + t0 * t0 * next.l,
            u: self.u + self.p * tail + next.u + 2.0 * t0 * next.q + t0 * t0 * next.s,
            duration: t0 + next.duration,
        }
    }

    pub fn is_finite(&self) -> bool {
        [self.l, self.j, self.s, self.q, self.p, self.u, self.duration]
            .iter()
            .all(|x| x.is_finite())
    }
}

// ---------------------------------------------------------------------------
// Burn arcs as the IGM tracks them
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BurnArc {
    pub stage: usize,
    pub exhaust_velocity: f64, // m/s
    pub tau: f64,              // s
    pub remaining: f64,        // s
    pub burnout_tau: f64,      // s
    pub mass_flow: f64,        // kg/s
    pub coast_before: f64,     // s
    pub engines: u32,
    pub engines_out: u32,
    pub transfer_at: Option<f64>,
    /// Seconds left during which tau is extrapolated instead of measured.
    pub artificial: f64,
}

impl From<&BurnArcConfig> for BurnArc {
    fn from(cfg: &BurnArcConfig) -> Self {
        Self {
            stage: cfg.stage,
            exhaust_velocity: cfg.exhaust_velocity,
            tau: cfg.tau,
            remaining: cfg.burn_time,
            burnout_tau: cfg.burnout_tau,
            mass_flow: cfg.mass_flow,
            coast_before: cfg.coast_before,
            engines: cfg.engines,
            engines_out: 0,
            transfer_at: cfg.transfer_at,
            artificial: 0.0,
        }
    }
}

impl BurnArc {
    /// Tau used in the integrals. If the arc would burn past its tau the
    /// burnout tau is added to the remaining time instead.
    pub fn effective_tau(&self) -> f64 {
        if self.tau <= self.remaining {
            self.remaining + self.burnout_tau
        } else {
            self.tau
        }
    }

    pub fn integrals(&self) -> Result<StageIntegrals, GuidanceFault> {
        StageIntegrals::compute(self.exhaust_velocity, self.effective_tau(), self.remaining)
    }

    /// Advance tau one cycle, from sensed acceleration unless extrapolating.
    pub fn update_tau(&mut self, sensed_accel: f64, dt: f64, min_accel: f64) {
        if self.artificial > 0.0 || sensed_accel <= min_accel {
            self.artificial = (self.artificial - dt).max(0.0);
            self.tau -= dt;
        } else {
            self.tau = self.exhaust_velocity / sensed_accel;
        }
    }

    /// Lose one running engine: remaining time and tau stretch by n/(n-1).
    pub fn engine_out(&mut self, settle: f64) -> bool {
        let running = self.engines.saturating_sub(self.engines_out);
        if running < 2 {
            return false;
        }
        let scale = f64::from(running) / f64::from(running - 1);
        self.remaining *= scale;
        self.tau *= scale;
        self.mass_flow /= scale;
        self.engines_out += 1;
        self.artificial = settle;
        true
    }
}

/// Ordered burn arcs still ahead, with the active one first in line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BurnArcs {
    pub arcs: Vec<BurnArc>,
    pub active: usize,
}

impl BurnArcs {
    pub fn from_config(configs: &[BurnArcConfig]) -> Self {
        Self {
            arcs: configs.iter().map(BurnArc::from).collect(),
            active: 0,
        }
    }

    pub fn active_arc(&self) -> Option<&BurnArc> {
        self.arcs.get(self.active)
    }

    pub fn active_arc_mut(&mut self) -> Option<&mut BurnArc> {
        self.arcs.get_mut(self.active)
    }

    /// Combined integrals from now to the end of the final arc.
    pub fn totals(&self) -> Result<StageIntegrals, GuidanceFault> {
        let mut acc = StageIntegrals::ZERO;
        for (i, arc) in self.arcs.iter().enumerate().skip(self.active) {
            let coast = if i == self.active { 0.0 } else { arc.coast_before };
            acc = acc.then(coast, &arc.integrals()?);
        }
        Ok(acc)
    }

    /// Time to go to final cutoff.
    pub fn time_to_go(&self) -> f64 {
        self.arcs
            .iter()
            .enumerate()
            .skip(self.active)
            .map(|(i, a)| a.remaining + if i == self.active { 0.0 } else { a.coast_before })
            .sum()
    }

    /// Consume `dt` of burn on the active arc. An exhausted arc hands over
    /// to the next one; the final arc never goes below zero.
    pub fn advance(&mut self, dt: f64) {
        let last = self.arcs.len().saturating_sub(1);
        let mut left = dt;
        while left > 0.0 {
            let idx = self.active;
            let Some(arc) = self.arcs.get_mut(idx) else { return };
            if arc.remaining > left || idx >= last {
                arc.remaining = (arc.remaining - left).max(0.0);
                return;
            }
            left -= arc.remaining;
            arc.remaining = 0.0;
            self.active += 1;
        }
    }

    /// Move the active arc's remaining time onto the next arc, scaled by
    /// the mass-flow ratio, and make the next arc active.
    pub fn transfer(&mut self, settle: f64) -> bool {
        let idx = self.active;
        if idx + 1 >= self.arcs.len() {
            return false;
        }
        let (head, tail) = self.arcs.split_at_mut(idx + 1);
        let cur = &mut head[idx];
        let next = &mut tail[0];
        next.remaining += cur.remaining * (cur.mass_flow / next.mass_flow);
        next.tau = next.remaining + next.burnout_tau;
        next.coast_before = 0.0;
        next.artificial = settle;
        cur.remaining = 0.0;
        self.active += 1;
        true
    }

    /// A new vehicle stage is flying: drop arcs of earlier stages.
    pub fn activate_stage(&mut self, stage: usize, settle: f64) {
        let Some(first) = self.arcs.iter().position(|a| a.stage >= stage) else { return };
        if first <= self.active {
            return;
        }
        for arc in &mut self.arcs[self.active..first] {
            arc.remaining = 0.0;
        }
        self.active = first;
        let arc = &mut self.arcs[first];
        arc.coast_before = 0.0;
        arc.artificial = settle;
    }

    /// Stretch the final arc for a change `delta_l` in total velocity
    /// capability.
    pub fn extend_final(&mut self, delta_l: f64) -> Result<(), GuidanceFault> {
        let Some(arc) = self.arcs.last_mut() else {
            return Err(GuidanceFault::NonFinite { stage: "burn arcs" });
        };
        let dt = delta_l * (arc.effective_tau() - arc.remaining) / arc.exhaust_velocity;
        if !dt.is_finite() {
            return Err(GuidanceFault::NonFinite { stage: "time-to-go correction" });
        }
        arc.remaining = (arc.remaining + dt).max(0.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn arc(v: f64, tau: f64, t: f64, burnout: f64) -> BurnArc {
        BurnArc {
            stage: 3,
            exhaust_velocity: v,
            tau,
            remaining: t,
            burnout_tau: burnout,
            mass_flow: 240.0,
            engines: 1,
            ..Default::default()
        }
    }

    #[test]
    fn rocket_equation_and_moments() {
        let (v, tau, t) = (4153.9, 700.0, 300.0);
        let i = StageIntegrals::compute(v, tau, t).unwrap();
        assert_relative_eq!(i.l, v * (700.0_f64 / 400.0).ln(), max_relative = 1e-12);
        // S is the distance gained from rest, J the first moment of L
        assert!(i.s > 0.0 && i.s < i.l * t);
        assert!(i.j > 0.0 && i.j < i.l * t);
        assert_relative_eq!(i.s + i.j, i.l * t, max_relative = 1e-12);
    }

    #[test]
    fn strict_form_rejects_tau_below_burn_time() {
        let err = StageIntegrals::compute(4153.9, 200.0, 300.0).unwrap_err();
        assert!(matches!(err, GuidanceFault::Depleted { .. }));
    }

    #[test]
    fn artificial_tau_keeps_l_finite() {
        // tau below remaining time: burnout tau takes over
        let a = arc(4153.9, 250.0, 300.0, 139.0);
        let i = a.integrals().unwrap();
        assert!(i.is_finite());
        assert_relative_eq!(i.l, 4153.9 * (439.0_f64 / 139.0).ln(), max_relative = 1e-12);
    }

    #[test]
    fn concatenation_matches_single_burn() {
        let (v, tau) = (4200.0, 800.0);
        let whole = StageIntegrals::compute(v, tau, 500.0).unwrap();
        let a = StageIntegrals::compute(v, tau, 180.0).unwrap();
        let b = StageIntegrals::compute(v, tau - 180.0, 320.0).unwrap();
        let joined = a.then(0.0, &b);
        assert_relative_eq!(joined.l, whole.l, max_relative = 1e-10);
        assert_relative_eq!(joined.j, whole.j, max_relative = 1e-10);
        assert_relative_eq!(joined.s, whole.s, max_relative = 1e-10);
        assert_relative_eq!(joined.q, whole.q, max_relative = 1e-10);
        assert_relative_eq!(joined.p, whole.p, max_relative = 1e-10);
        assert_relative_eq!(joined.u, whole.u, max_relative = 1e-10);
        assert_relative_eq!(joined.duration, 500.0);
    }

    #[test]
    fn coast_gap_shifts_moments() {
        let a = StageIntegrals::compute(4000.0, 600.0, 100.0).unwrap();
        let b = StageIntegrals::compute(4000.0, 600.0, 100.0).unwrap();
        let tight = a.then(0.0, &b);
        let gapped = a.then(10.0, &b);
        assert_relative_eq!(gapped.l, tight.l);
        assert_relative_eq!(gapped.j - tight.j, 10.0 * b.l, max_relative = 1e-12);
        assert_relative_eq!(gapped.s - tight.s, 10.0 * a.l, max_relative = 1e-12);
        assert_relative_eq!(gapped.duration, 210.0);
    }

    #[test]
    fn zero_remaining_gives_zero_integrals() {
        let a = arc(4153.9, 150.0, 0.0, 139.0);
        assert_eq!(a.integrals().unwrap(), StageIntegrals::ZERO);
        let tiny = arc(4153.9, 150.0, 1e-9, 139.0).integrals().unwrap();
        assert!(tiny.is_finite() && tiny.l > 0.0 && tiny.l < 1e-4);
    }

    #[test]
    fn tau_follows_sensed_accel_unless_settling() {
        let mut a = arc(4000.0, 500.0, 300.0, 100.0);
        a.update_tau(10.0, 2.0, 0.5);
        assert_relative_eq!(a.tau, 400.0);
        a.artificial = 3.0;
        a.update_tau(10.0, 2.0, 0.5);
        assert_relative_eq!(a.tau, 398.0);
        assert_relative_eq!(a.artificial, 1.0);
        // stale telemetry extrapolates too
        a.artificial = 0.0;
        a.update_tau(0.1, 2.0, 0.5);
        assert_relative_eq!(a.tau, 396.0);
    }

    #[test]
    fn engine_out_scales_by_running_ratio() {
        let mut a = arc(4169.0, 500.0, 300.0, 200.0);
        a.engines = 5;
        assert!(a.engine_out(10.0));
        assert_relative_eq!(a.remaining, 375.0);
        assert_relative_eq!(a.tau, 625.0);
        assert_relative_eq!(a.artificial, 10.0);

        let mut single = arc(4169.0, 500.0, 300.0, 200.0);
        assert!(!single.engine_out(10.0));
        assert_relative_eq!(single.remaining, 300.0);
    }

    #[test]
    fn mixture_ratio_transfer_preserves_propellant() {
        let mut arcs = BurnArcs {
            arcs: vec![
                BurnArc { mass_flow: 1200.0, stage: 2, ..arc(4169.0, 500.0, 40.0, 200.0) },
                BurnArc { mass_flow: 1000.0, stage: 2, ..arc(4210.0, 300.0, 70.0, 230.0) },
                BurnArc { coast_before: 5.0, ..arc(4153.9, 700.0, 150.0, 550.0) },
            ],
            active: 0,
        };
        assert!(arcs.transfer(8.0));
        assert_eq!(arcs.active, 1);
        assert_relative_eq!(arcs.arcs[1].remaining, 70.0 + 40.0 * 1.2);
        assert_relative_eq!(arcs.arcs[1].tau, 118.0 + 230.0);
        assert_relative_eq!(arcs.time_to_go(), 118.0 + 5.0 + 150.0);
    }

    #[test]
    fn advance_rolls_over_into_next_arc() {
        let mut arcs = BurnArcs {
            arcs: vec![arc(4000.0, 500.0, 3.0, 100.0), arc(4000.0, 600.0, 100.0, 100.0)],
            active: 0,
        };
        arcs.advance(5.0);
        assert_eq!(arcs.active, 1);
        assert_relative_eq!(arcs.arcs[1].remaining, 98.0);
        arcs.advance(500.0);
        assert_eq!(arcs.active, 1);
        assert_eq!(arcs.arcs[1].remaining, 0.0);
    }

    #[test]
    fn stage_change_skips_lower_stage_arcs() {
        let mut arcs = BurnArcs {
            arcs: vec![
                BurnArc { stage: 2, ..arc(4169.0, 500.0, 20.0, 200.0) },
                BurnArc { stage: 3, coast_before: 5.0, ..arc(4153.9, 700.0, 150.0, 550.0) },
            ],
            active: 0,
        };
        arcs.activate_stage(3, 10.0);
        assert_eq!(arcs.active, 1);
        assert_relative_eq!(arcs.time_to_go(), 150.0);
        assert_relative_eq!(arcs.arcs[1].artificial, 10.0);
    }

    #[test]
    fn final_arc_extension_uses_burnout_margin() {
        let mut arcs = BurnArcs { arcs: vec![arc(4000.0, 500.0, 300.0, 100.0)], active: 0 };
        arcs.extend_final(40.0).unwrap();
        // dT = dL (tau - T) / v = 40 * 200 / 4000
        assert_relative_eq!(arcs.arcs[0].remaining, 302.0);
    }
}

use nalgebra::{Matrix3, Vector3};

use super::attitude::attitude_from_direction;
use super::hsl::CutoffPredictor;
use super::integrals::{BurnArcs, StageIntegrals};
use super::targeting::TargetConic;
use crate::error::GuidanceFault;
use crate::navigation::NavState;
use crate::orbital::frames::terminal_rotation;
use crate::vehicle::IgmConfig;

// ---------------------------------------------------------------------------
// Iterative guidance mode
// ---------------------------------------------------------------------------
//
// Terminal frame (from M_K = R_y(phi_T) * M_G):
//   x  radial at the target point (xi)
//   y  negative orbit normal       (eta)
//   z  downrange                   (zeta)

/// Smallest total velocity capability the cutoff correction accepts.
const MIN_VELOCITY_CAPABILITY: f64 = 1e-3; // m/s

/// Terminal conditions the steering is aimed at.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TerminalState {
    pub range_angle: f64, // rad, phi_T
    pub radius: f64,      // m
    pub speed: f64,       // m/s
    pub flight_path: f64, // rad
    pub gravity: f64,     // m/s^2
    pub initialized: bool,
    pub frozen: bool,
}

/// Linear-in-time steering law
/// `chi_p = tchi_p - K1 + K2 t`, `chi_y = tchi_y - K3 + K4 t`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SteeringLaw {
    pub tchi_p: f64,
    pub tchi_y: f64,
    pub k: [f64; 4],
}

impl SteeringLaw {
    /// Unit thrust direction in the terminal frame, `t` seconds after the
    /// law was computed.
    pub fn direction(&self, t: f64) -> Vector3<f64> {
        let chi_p = self.tchi_p - self.k[0] + self.k[1] * t;
        let chi_y = self.tchi_y - self.k[2] + self.k[3] * t;
        let (sp, cp) = chi_p.sin_cos();
        let (sy, cy) = chi_y.sin_cos();
        Vector3::new(sp * cy, sy, cp * cy)
    }
}

/// What one guidance pass produces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuidanceOutput {
    pub direction: Vector3<f64>, // platform frame
    pub pitch: f64,
    pub yaw: f64,
    pub time_to_go: f64,
    /// Phase clock at which the engine should be cut off (high-speed loop).
    pub cutoff_clock: Option<f64>,
}

/// IGM working state: burn arcs, target and the last steering solution.
#[derive(Debug, Clone, PartialEq)]
pub struct Igm {
    pub arcs: BurnArcs,
    pub target: TargetConic,
    pub plane: Matrix3<f64>, // M_G, platform -> orbit plane
    pub terminal_frame: Matrix3<f64>, // M_K of the last pass
    pub terminal: TerminalState,
    pub steering: SteeringLaw,
    pub chi_bar: bool,
    pub predictor: CutoffPredictor,
    pub time_to_go: f64,
    pub cutoff_clock: Option<f64>,
}

impl Default for Igm {
    fn default() -> Self {
        Self {
            arcs: BurnArcs::default(),
            target: TargetConic::default(),
            plane: Matrix3::identity(),
            terminal_frame: Matrix3::identity(),
            terminal: TerminalState::default(),
            steering: SteeringLaw::default(),
            chi_bar: false,
            predictor: CutoffPredictor::default(),
            time_to_go: 0.0,
            cutoff_clock: None,
        }
    }
}

impl Igm {
    pub fn new(arcs: BurnArcs, target: TargetConic, plane: Matrix3<f64>) -> Self {
        Self { arcs, target, plane, ..Self::default() }
    }

    /// Load a new target: terminal conditions start over.
    pub fn retarget(&mut self, target: TargetConic, plane: Matrix3<f64>) {
        self.target = target;
        self.plane = plane;
        self.terminal = TerminalState::default();
        self.chi_bar = false;
        self.predictor.clear();
        self.cutoff_clock = None;
    }

    /// New target and a fresh set of burn arcs (restart burn).
    pub fn reseed(&mut self, target: TargetConic, plane: Matrix3<f64>, arcs: BurnArcs) {
        self.retarget(target, plane);
        self.arcs = arcs;
        self.time_to_go = self.arcs.time_to_go();
    }

    /// One guidance computation. `clock` is the phase clock, `dt` the cycle
    /// length used to lead the steering command.
    pub fn compute_guidance(
        &mut self,
        nav: &NavState,
        config: &IgmConfig,
        clock: f64,
        dt: f64,
    ) -> Result<GuidanceOutput, GuidanceFault> {
        if self.chi_bar {
            return self.high_speed_loop(nav, config, clock, dt);
        }

        let pos = nav.position;
        let vel = nav.velocity;
        let speed = vel.norm();
        let pos_g = self.plane * pos;
        let mut totals = self.arcs.totals()?;

        if let Some(anomaly) = self.target.cutoff_anomaly.take() {
            // seed at the cutoff anomaly itself, then place the conic so the
            // predicted cutoff point lands on it
            let phi_l = pos_g.z.atan2(pos_g.x);
            self.target.alpha_d = anomaly - phi_l;
            self.terminal = terminal_conditions(&self.target, phi_l)?;
            let phi = range_angle(&pos_g, speed, self.arcs.time_to_go(), totals.s, &self.terminal);
            self.target.alpha_d = anomaly - phi;
            self.terminal = terminal_conditions(&self.target, phi)?;
        } else if !self.terminal.initialized {
            self.terminal = terminal_conditions(&self.target, pos_g.z.atan2(pos_g.x))?;
        }

        let mut frame = self.terminal_frame;
        let mut gain = Vector3::zeros();
        let mut gravity_avg = Vector3::zeros();
        for _pass in 0..2 {
            let t_go = self.arcs.time_to_go();
            if !self.terminal.frozen {
                if t_go > config.terminal_freeze {
                    let phi = range_angle(&pos_g, speed, t_go, totals.s, &self.terminal);
                    self.terminal = terminal_conditions(&self.target, phi)?;
                } else {
                    self.terminal.frozen = true;
                }
            }

            frame = terminal_rotation(self.terminal.range_angle) * self.plane;
            let (dv, g_avg) = velocity_to_gain(&(frame * vel), &(frame * nav.gravity), &self.terminal, t_go);
            let delta_l = length_correction(&dv, totals.l)?;
            self.arcs.extend_final(delta_l)?;
            totals = self.arcs.totals()?;
            gain = dv;
            gravity_avg = g_avg;
        }

        let t_go = self.arcs.time_to_go();
        self.time_to_go = t_go;
        self.terminal_frame = frame;
        if t_go <= config.chi_bar {
            self.steering = SteeringLaw { k: [0.0; 4], ..steering_angles(&gain) };
            self.chi_bar = true;
            self.predictor.clear();
            return self.high_speed_loop(nav, config, clock, dt);
        }

        let law = steering_coefficients(&gain, &(frame * pos), &(frame * vel), &gravity_avg, &self.terminal, &totals, t_go);
        if !law.k.iter().all(|k| k.is_finite()) {
            return Err(GuidanceFault::NonFinite { stage: "steering coefficients" });
        }
        self.steering = law;
        self.output(dt, None)
    }

    fn high_speed_loop(
        &mut self,
        nav: &NavState,
        config: &IgmConfig,
        clock: f64,
        dt: f64,
    ) -> Result<GuidanceOutput, GuidanceFault> {
        self.predictor.push(clock, nav.velocity.norm());
        let target = self.terminal.speed - config.velocity_bias;
        let t_go = self
            .predictor
            .time_to_target(target, nav.sensed_accel)
            .unwrap_or_else(|| self.arcs.time_to_go());
        if !t_go.is_finite() {
            return Err(GuidanceFault::NonFinite { stage: "cutoff prediction" });
        }
        self.time_to_go = t_go;
        self.cutoff_clock = Some(clock + t_go);
        self.output(dt, self.cutoff_clock)
    }

    fn output(&self, lead: f64, cutoff_clock: Option<f64>) -> Result<GuidanceOutput, GuidanceFault> {
        let direction = self.terminal_frame.transpose() * self.steering.direction(lead);
        if !direction.iter().all(|x| x.is_finite()) {
            return Err(GuidanceFault::NonFinite { stage: "thrust direction" });
        }
        let att = attitude_from_direction(&direction, 0.0);
        Ok(GuidanceOutput {
            direction,
            pitch: att.y,
            yaw: att.z,
            time_to_go: self.time_to_go,
            cutoff_clock,
        })
    }
}

// ---------------------------------------------------------------------------
// Pipeline steps
// ---------------------------------------------------------------------------

/// Predicted in-plane angle of the cutoff point.
pub fn range_angle(pos_g: &Vector3<f64>, speed: f64, t_go: f64, s_total: f64, terminal: &TerminalState) -> f64 {
    let phi_l = pos_g.z.atan2(pos_g.x);
    phi_l + terminal.flight_path.cos() * (speed * t_go + s_total) / terminal.radius
}

/// Terminal radius, speed, flight-path angle and gravity at range angle `phi`.
pub fn terminal_conditions(target: &TargetConic, phi: f64) -> Result<TerminalState, GuidanceFault> {
    let pt = target
        .point(phi + target.alpha_d)
        .ok_or(GuidanceFault::NonFinite { stage: "terminal conditions" })?;
    Ok(TerminalState {
        range_angle: phi,
        radius: pt.radius,
        speed: pt.speed,
        flight_path: pt.flight_path,
        gravity: pt.gravity,
        initialized: true,
        frozen: false,
    })
}

/// Velocity still to be gained, in the terminal frame, with the averaged
/// gravity used for it.
pub fn velocity_to_gain(
    vel_t: &Vector3<f64>,
    grav_t: &Vector3<f64>,
    terminal: &TerminalState,
    t_go: f64,
) -> (Vector3<f64>, Vector3<f64>) {
    let g_avg = Vector3::new(0.5 * (grav_t.x + terminal.gravity), 0.5 * grav_t.y, 0.5 * grav_t.z);
    let (sg, cg) = terminal.flight_path.sin_cos();
    let wanted = Vector3::new(terminal.speed * sg, 0.0, terminal.speed * cg);
    (wanted - vel_t - g_avg * t_go, g_avg)
}

/// Change in velocity capability needed to cover `dv` along a turning path.
pub fn length_correction(dv: &Vector3<f64>, l_total: f64) -> Result<f64, GuidanceFault> {
    if !(l_total > MIN_VELOCITY_CAPABILITY) {
        return Err(GuidanceFault::NoVelocityToGain(l_total));
    }
    let dl = 0.5 * (dv.norm_squared() / l_total - l_total);
    if dl.is_finite() {
        Ok(dl)
    } else {
        Err(GuidanceFault::NonFinite { stage: "time-to-go correction" })
    }
}

/// Steering angles of the velocity to be gained.
pub fn steering_angles(dv: &Vector3<f64>) -> SteeringLaw {
    SteeringLaw {
        tchi_p: dv.x.atan2(dv.z),
        tchi_y: dv.y.atan2((dv.x * dv.x + dv.z * dv.z).sqrt()),
        k: [0.0; 4],
    }
}

/// Yaw, then yaw-coupled pitch, correction coefficients that null the
/// terminal cross-range and radius errors.
pub fn steering_coefficients(
    dv: &Vector3<f64>,
    pos_t: &Vector3<f64>,
    vel_t: &Vector3<f64>,
    g_avg: &Vector3<f64>,
    terminal: &TerminalState,
    i: &StageIntegrals,
    t_go: f64,
) -> SteeringLaw {
    let mut law = steering_angles(dv);
    let (sy, cy) = law.tchi_y.sin_cos();
    let (sp, cp) = law.tchi_p.sin_cos();
    let t2 = 0.5 * t_go * t_go;

    // yaw
    let k_y = i.l / i.j;
    let d_y = i.s - k_y * i.q;
    let d_eta = pos_t.y + vel_t.y * t_go + g_avg.y * t2 + i.s * sy;
    let k3 = d_eta / (d_y * cy);
    let k4 = k_y * k3;

    // pitch
    let c2 = cy + k3 * sy;
    let c4 = -k4 * sy;
    let l_p = c2 * i.l + c4 * i.j;
    let j_p = c2 * i.j + c4 * i.p;
    let s_p = c2 * i.s + c4 * i.q;
    let q_p = c2 * i.q + c4 * i.u;
    let k_p = l_p / j_p;
    let d_p = s_p - k_p * q_p;
    let d_xi = pos_t.x - terminal.radius + vel_t.x * t_go + g_avg.x * t2 + s_p * sp;
    let k1 = d_xi / (d_p * cp);
    let k2 = k_p * k1;

    law.k = [k1, k2, k3, k4];
    law
}

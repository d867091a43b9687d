use super::gravity::G0;

// ---------------------------------------------------------------------------
// ISA 1976 Standard Atmosphere (sea level to 86 km)
// ---------------------------------------------------------------------------

const R_AIR: f64 = 287.052_87; // specific gas constant for dry air, J/(kg·K)
const GAMMA: f64 = 1.4;        // ratio of specific heats

const T0: f64 = 288.15;        // sea-level temperature, K
const P0: f64 = 101_325.0;     // sea-level pressure, Pa

/// Atmospheric properties at a given geometric altitude.
#[derive(Debug, Clone, Copy)]
pub struct Atmo {
    pub density: f64,      // kg/m^3
    pub pressure: f64,     // Pa
    pub temperature: f64,  // K
    pub sound_speed: f64,  // m/s
}

/// ISA 1976 standard atmosphere model.
///
/// Piecewise temperature profile with 7 layers from 0-86 km.
/// Clamps negative altitudes to sea level; above 86 km the density comes
/// from the layered exponential table used for orbital drag.
pub fn isa(altitude_m: f64) -> Atmo {
    let h = altitude_m.max(0.0);

    let (temperature, pressure) = if h < 11_000.0 {
        // Troposphere: lapse -6.5 K/km
        gradient_layer(h, 0.0, T0, -0.0065, P0)
    } else if h < 20_000.0 {
        // Tropopause: isothermal 216.65 K
        isothermal_layer(h, 11_000.0, 216.65, 22_632.1)
    } else if h < 32_000.0 {
        // Stratosphere I: lapse +1.0 K/km
        gradient_layer(h, 20_000.0, 216.65, 0.001, 5_474.89)
    } else if h < 47_000.0 {
        // Stratosphere II: lapse +2.8 K/km
        gradient_layer(h, 32_000.0, 228.65, 0.0028, 868.019)
    } else if h < 51_000.0 {
        // Mesosphere I: isothermal 270.65 K
        isothermal_layer(h, 47_000.0, 270.65, 110.906)
    } else if h < 71_000.0 {
        // Mesosphere II: lapse -2.8 K/km
        gradient_layer(h, 51_000.0, 270.65, -0.0028, 66.9389)
    } else if h < 86_000.0 {
        // Mesosphere III: lapse -2.0 K/km
        gradient_layer(h, 71_000.0, 214.65, -0.002, 3.956_42)
    } else {
        // Above 86 km: isothermal temperature, pressure from the density table
        let t = 186.87;
        let rho = upper_density(h);
        (t, rho * R_AIR * t)
    };

    let density = if temperature > 0.0 {
        pressure / (R_AIR * temperature)
    } else {
        0.0
    };

    Atmo {
        density,
        pressure,
        temperature,
        sound_speed: (GAMMA * R_AIR * temperature).sqrt(),
    }
}

// ---------------------------------------------------------------------------
// Upper atmosphere (86-1000 km): layered exponential density
// ---------------------------------------------------------------------------

/// (base altitude m, base density kg/m^3, scale height m)
const UPPER_LAYERS: [(f64, f64, f64); 21] = [
    (80_000.0, 1.905e-5, 5_799.0),
    (90_000.0, 3.396e-6, 5_382.0),
    (100_000.0, 5.297e-7, 5_877.0),
    (110_000.0, 9.661e-8, 7_263.0),
    (120_000.0, 2.438e-8, 9_473.0),
    (130_000.0, 8.484e-9, 12_636.0),
    (140_000.0, 3.845e-9, 16_149.0),
    (150_000.0, 2.070e-9, 22_523.0),
    (180_000.0, 5.464e-10, 29_740.0),
    (200_000.0, 2.789e-10, 37_105.0),
    (250_000.0, 7.248e-11, 45_546.0),
    (300_000.0, 2.418e-11, 53_628.0),
    (350_000.0, 9.518e-12, 53_298.0),
    (400_000.0, 3.725e-12, 58_515.0),
    (450_000.0, 1.585e-12, 60_828.0),
    (500_000.0, 6.967e-13, 63_822.0),
    (600_000.0, 1.454e-13, 71_835.0),
    (700_000.0, 3.614e-14, 88_667.0),
    (800_000.0, 1.170e-14, 124_640.0),
    (900_000.0, 5.245e-15, 181_050.0),
    (1_000_000.0, 3.019e-15, 268_000.0),
];

/// Density above the ISA ceiling.
pub fn upper_density(altitude_m: f64) -> f64 {
    let layer = UPPER_LAYERS
        .iter()
        .rev()
        .find(|(base, _, _)| altitude_m >= *base)
        .unwrap_or(&UPPER_LAYERS[0]);
    let (base, rho0, scale) = *layer;
    rho0 * (-(altitude_m - base) / scale).exp()
}

/// Density only, valid from sea level to orbit.
pub fn density(altitude_m: f64) -> f64 {
    isa(altitude_m).density
}

// ---------------------------------------------------------------------------
// Layer helpers
// ---------------------------------------------------------------------------

/// Gradient layer: T = T_base + lapse * (h - h_base)
fn gradient_layer(h: f64, h_base: f64, t_base: f64, lapse: f64, p_base: f64) -> (f64, f64) {
    let t = t_base + lapse * (h - h_base);
    let p = p_base * (t / t_base).powf(-G0 / (lapse * R_AIR));
    (t, p)
}

/// Isothermal layer: T = const, pressure decays exponentially
fn isothermal_layer(h: f64, h_base: f64, t: f64, p_base: f64) -> (f64, f64) {
    let p = p_base * ((-G0 / (R_AIR * t)) * (h - h_base)).exp();
    (t, p)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

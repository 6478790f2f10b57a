//! Closed-form electrical calculators.
//!
//! All functions are pure. Bad input is reported as
//! [`Error::InvalidArgument`] so callers can return a soft error body.
//! Non-finite results (an open circuit, an infinite reactance) are
//! returned as IEEE infinities.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{Error, Result};

const NEED_TWO_VALUES: &str = "최소 두 개 이상의 값이 필요합니다.";
const NEED_POSITIVE_OHMS: &str = "양의 저항값(Ω)을 입력하세요.";

// ============ Ohm's law ============

/// Known quantities of `V = I·R`, `P = V·I`. Any two determine the rest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OhmsLawInput {
    #[serde(rename = "V", default)]
    pub v: Option<f64>,
    #[serde(rename = "I", default)]
    pub i: Option<f64>,
    #[serde(rename = "R", default)]
    pub r: Option<f64>,
    #[serde(rename = "P", default)]
    pub p: Option<f64>,
}

impl OhmsLawInput {
    fn known_count(&self) -> usize {
        [self.v, self.i, self.r, self.p].iter().filter(|x| x.is_some()).count()
    }
}

/// All four quantities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhmsLawSolution {
    #[serde(rename = "V")]
    pub v: f64,
    #[serde(rename = "I")]
    pub i: f64,
    #[serde(rename = "R")]
    pub r: f64,
    #[serde(rename = "P")]
    pub p: f64,
}

impl OhmsLawSolution {
    fn is_finite(&self) -> bool {
        self.v.is_finite() && self.i.is_finite() && self.r.is_finite() && self.p.is_finite()
    }
}

/// Why the numeric tier gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericFailure {
    /// Fewer than two knowns.
    Underdetermined,
    /// More than two knowns: the system is not square.
    Overdetermined,
    /// Singular Jacobian at some iterate.
    Singular,
    /// No convergence within the iteration cap.
    NoConvergence,
}

const NEWTON_MAX_ITER: usize = 100;
const NEWTON_TOL: f64 = 1e-12;

/// Numeric tier: Newton-Raphson on
/// `F1 = v − i·r = 0`, `F2 = p − v·i = 0` over the two unknowns.
///
/// Unknowns start at 1. Needs exactly two knowns.
pub fn solve_ohms_law_numeric(
    input: &OhmsLawInput,
) -> std::result::Result<OhmsLawSolution, NumericFailure> {
    match input.known_count() {
        n if n < 2 => return Err(NumericFailure::Underdetermined),
        2 => {}
        _ => return Err(NumericFailure::Overdetermined),
    }

    // x = [v, i, r, p]
    let known = [input.v, input.i, input.r, input.p];
    let mut x: [f64; 4] = [0.0; 4];
    for (slot, k) in x.iter_mut().zip(known) {
        *slot = k.unwrap_or(1.0);
    }
    let unknown: Vec<usize> = (0..4).filter(|&n| known[n].is_none()).collect();
    let (a, b) = (unknown[0], unknown[1]);

    for _ in 0..NEWTON_MAX_ITER {
        let [v, i, r, p] = x;
        let f1 = v - i * r;
        let f2 = p - v * i;
        if f1.abs() < NEWTON_TOL && f2.abs() < NEWTON_TOL {
            return Ok(OhmsLawSolution { v, i, r, p });
        }

        // Partials of (F1, F2) w.r.t. v, i, r, p.
        let j1 = [1.0, -r, -i, 0.0];
        let j2 = [-i, -v, 0.0, 1.0];

        let det = j1[a] * j2[b] - j1[b] * j2[a];
        if det == 0.0 || !det.is_finite() {
            return Err(NumericFailure::Singular);
        }
        let da = (f1 * j2[b] - f2 * j1[b]) / det;
        let db = (j1[a] * f2 - j2[a] * f1) / det;
        x[a] -= da;
        x[b] -= db;

        if !x[a].is_finite() || !x[b].is_finite() {
            return Err(NumericFailure::NoConvergence);
        }
        if da.abs() <= NEWTON_TOL * x[a].abs().max(1.0) && db.abs() <= NEWTON_TOL * x[b].abs().max(1.0) {
            let [v, i, r, p] = x;
            return Ok(OhmsLawSolution { v, i, r, p });
        }
    }
    Err(NumericFailure::NoConvergence)
}

/// Closed-form tier, keyed by the first known pair in the order
/// (V,I), (V,R), (V,P), (I,R), (I,P), (R,P).
///
/// With more than two knowns the remaining ones are recomputed from that
/// pair.
pub fn solve_ohms_law_closed_form(input: &OhmsLawInput) -> Result<OhmsLawSolution> {
    let OhmsLawInput { v, i, r, p } = *input;
    let solution = match (v, i, r, p) {
        (Some(v), Some(i), _, _) => OhmsLawSolution { v, i, r: v / i, p: v * i },
        (Some(v), _, Some(r), _) => OhmsLawSolution { v, i: v / r, r, p: v * v / r },
        (Some(v), _, _, Some(p)) => OhmsLawSolution { v, i: p / v, r: v * v / p, p },
        (_, Some(i), Some(r), _) => OhmsLawSolution { v: i * r, i, r, p: i * i * r },
        (_, Some(i), _, Some(p)) => OhmsLawSolution { v: p / i, i, r: p / (i * i), p },
        (_, _, Some(r), Some(p)) => OhmsLawSolution { v: (p * r).sqrt(), i: (p / r).sqrt(), r, p },
        _ => return Err(Error::InvalidArgument(NEED_TWO_VALUES.to_string())),
    };
    Ok(solution)
}

/// Solves Ohm's law: numeric tier first, closed-form table on failure.
///
/// # Errors
///
/// [`Error::InvalidArgument`] with fewer than two knowns, or when neither
/// tier yields finite values (e.g. `V` and `I = 0`).
pub fn solve_ohms_law(input: &OhmsLawInput) -> Result<OhmsLawSolution> {
    if input.known_count() < 2 {
        return Err(Error::InvalidArgument(NEED_TWO_VALUES.to_string()));
    }
    let solution = match solve_ohms_law_numeric(input) {
        Ok(s) if s.is_finite() => s,
        _ => solve_ohms_law_closed_form(input)?,
    };
    if !solution.is_finite() {
        return Err(Error::InvalidArgument(NEED_TWO_VALUES.to_string()));
    }
    Ok(solution)
}

// ============ Resistor networks ============

/// Series total: the sum; empty is 0.
pub fn series_resistance(values: &[f64]) -> f64 {
    values.iter().sum()
}

/// Parallel total.
///
/// Empty or any zero (a short) gives 0. A reciprocal sum of zero gives
/// `+inf`.
pub fn parallel_resistance(values: &[f64]) -> f64 {
    if values.is_empty() || values.iter().any(|&v| v == 0.0) {
        return 0.0;
    }
    let reciprocal: f64 = values.iter().map(|v| 1.0 / v).sum();
    if reciprocal == 0.0 {
        return f64::INFINITY;
    }
    1.0 / reciprocal
}

// ============ RLC impedance ============

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RlcInput {
    #[serde(rename = "R")]
    pub r: f64,
    #[serde(rename = "L")]
    pub l: f64,
    #[serde(rename = "C")]
    pub c: f64,
    pub f: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RlcOutput {
    #[serde(rename = "Xl")]
    pub xl: f64,
    #[serde(rename = "Xc")]
    pub xc: f64,
    #[serde(rename = "Z_mag")]
    pub z_mag: f64,
    #[serde(rename = "Z_phase_deg")]
    pub z_phase_deg: f64,
}

/// Series RLC impedance at frequency `f`.
///
/// `C = 0` is an open capacitor: `Xc = +inf`, phase −90°.
pub fn rlc_impedance(input: &RlcInput) -> RlcOutput {
    let w = 2.0 * PI * input.f;
    let xl = w * input.l;
    let xc = if input.c == 0.0 {
        f64::INFINITY
    } else {
        1.0 / (w * input.c)
    };
    let x = xl - xc;
    RlcOutput {
        xl,
        xc,
        z_mag: input.r.hypot(x),
        z_phase_deg: x.atan2(input.r).to_degrees(),
    }
}

// ============ Resistor color code ============

/// Digit colors 0–9.
pub const DIGIT_COLORS: [&str; 10] = [
    "black", "brown", "red", "orange", "yellow", "green", "blue", "violet", "gray", "white",
];

/// Four-band code: two significant digits, multiplier, gold tolerance.
///
/// The value is rounded to two significant digits.
///
/// # Errors
///
/// [`Error::InvalidArgument`] for non-positive or non-finite values, and
/// for values whose multiplier falls outside silver (×0.01) to white (×10⁹).
pub fn resistor_bands(ohms: f64) -> Result<[&'static str; 4]> {
    if !ohms.is_finite() || ohms <= 0.0 {
        return Err(Error::InvalidArgument(NEED_POSITIVE_OHMS.to_string()));
    }

    let mut significand = ohms;
    let mut exponent: i32 = 0;
    while significand >= 100.0 {
        significand /= 10.0;
        exponent += 1;
    }
    while significand < 10.0 {
        significand *= 10.0;
        exponent -= 1;
    }
    let mut digits = significand.round() as u32;
    if digits >= 100 {
        digits = 10;
        exponent += 1;
    }

    let multiplier = match exponent {
        -2 => "silver",
        -1 => "gold",
        0..=9 => DIGIT_COLORS[exponent as usize],
        _ => {
            return Err(Error::InvalidArgument(format!(
                "{} Ω is outside the 4-band color code range (0.1 Ω to 99 GΩ)",
                ohms
            )))
        }
    };

    Ok([
        DIGIT_COLORS[(digits / 10) as usize],
        DIGIT_COLORS[(digits % 10) as usize],
        multiplier,
        "gold",
    ])
}

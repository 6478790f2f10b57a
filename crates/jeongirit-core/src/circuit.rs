//! Random series-circuit practice problems with a rendered schematic.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::Rng;
use serde::Serialize;

use crate::error::Result;
use crate::schematic::SchematicFormat;

/// Supply voltages a problem may use, in volts.
pub const SUPPLY_VOLTAGES: [f64; 4] = [5.0, 9.0, 12.0, 24.0];

/// E12 series in tenths of an ohm (1.0 … 8.2).
const E12_TENTHS: [u32; 12] = [10, 12, 15, 18, 22, 27, 33, 39, 47, 56, 68, 82];

/// Decades applied to the E12 values: 10 Ω, 100 Ω and 1 kΩ.
const DECADE_SCALE: [u32; 3] = [1, 10, 100];

/// Worked answer for a two-resistor series circuit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesSolution {
    #[serde(rename = "Rt")]
    pub rt: f64,
    #[serde(rename = "I")]
    pub i: f64,
    #[serde(rename = "V1")]
    pub v1: f64,
    #[serde(rename = "V2")]
    pub v2: f64,
}

impl SeriesSolution {
    pub fn solve(v: f64, r1: f64, r2: f64) -> Self {
        let rt = r1 + r2;
        let i = v / rt;
        Self {
            rt,
            i,
            v1: i * r1,
            v2: i * r2,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CircuitProblem {
    #[serde(rename = "V")]
    pub v: f64,
    #[serde(rename = "R1")]
    pub r1: f64,
    #[serde(rename = "R2")]
    pub r2: f64,
    pub question: String,
    pub solution: SeriesSolution,
    /// Base64 of the schematic, encoded as `image_mime`.
    pub image_base64: String,
    pub image_mime: &'static str,
}

/// Draws a new problem from `rng` and renders its schematic as `format`.
pub fn generate<R: Rng>(rng: &mut R, format: SchematicFormat) -> Result<CircuitProblem> {
    let v = SUPPLY_VOLTAGES[rng.gen_range(0..SUPPLY_VOLTAGES.len())];
    let r1 = random_resistor(rng);
    let r2 = random_resistor(rng);

    let question = format!(
        "{} V 전원에 R1 = {} Ω, R2 = {} Ω 저항이 직렬로 연결되어 있습니다. \
         전체 저항, 회로 전류, 각 저항의 전압 강하를 구하세요.",
        v, r1, r2
    );
    let image = format.render(v, r1, r2)?;

    Ok(CircuitProblem {
        v,
        r1,
        r2,
        question,
        solution: SeriesSolution::solve(v, r1, r2),
        image_base64: STANDARD.encode(image),
        image_mime: format.mime(),
    })
}

fn random_resistor<R: Rng>(rng: &mut R) -> f64 {
    let base = E12_TENTHS[rng.gen_range(0..E12_TENTHS.len())];
    let scale = DECADE_SCALE[rng.gen_range(0..DECADE_SCALE.len())];
    f64::from(base * scale)
}

/* ************************************************************************ **
** This file is part of bocs, and is licensed under EITHER the MIT license  **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of bocs is provided under this permissive license, **
** and that the project as a whole is licensed under the GPL 3.0.           **
** ************************************************************************ */

//! The volume-dependent pressure correction of a bottom-up coarse-grained model.

use crate::spline::{SplineKind, SplineTable};
use crate::FailResult;
use std::path::PathBuf;

/// How the correction is specified in the input.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum CorrectionBasis {
    /// Polynomial in the relative volume deviation from `vavg`.
    #[serde(rename_all = "kebab-case")]
    Analytic {
        vavg: f64,
        n_mol: usize,
        coeffs: Vec<f64>,
    },
    LinearSpline(PathBuf),
    CubicSpline(PathBuf),
}

impl CorrectionBasis {
    /// Read any table and produce the evaluator.
    pub fn build(&self) -> FailResult<PressureCorrection> {
        Ok(match self {
            CorrectionBasis::Analytic { vavg, n_mol, coeffs } => {
                if !(*vavg > 0.0) {
                    config_err!("analytic correction needs a positive average volume, got {}", vavg);
                }
                if coeffs.is_empty() {
                    config_err!("analytic correction needs at least one coefficient");
                }
                PressureCorrection::Analytic { vavg: *vavg, n_mol: *n_mol, coeffs: coeffs.clone() }
            },
            CorrectionBasis::LinearSpline(path) => {
                PressureCorrection::Spline(SplineTable::read(path, SplineKind::Linear)?)
            },
            CorrectionBasis::CubicSpline(path) => {
                PressureCorrection::Spline(SplineTable::read(path, SplineKind::Cubic)?)
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PressureCorrection {
    /// `-Σ_{i=1..N} c_i (n_mol i / vavg) ((V - vavg) / vavg)^(i-1)`
    Analytic {
        vavg: f64,
        n_mol: usize,
        coeffs: Vec<f64>,
    },
    Spline(SplineTable),
}

impl PressureCorrection {
    /// The correction to add to the scalar pressure at this volume.
    pub fn evaluate(&self, volume: f64) -> FailResult<f64> {
        match self {
            PressureCorrection::Analytic { vavg, n_mol, coeffs } => {
                let x = (volume - vavg) / vavg;
                let n_mol = *n_mol as f64;
                let mut correction = 0.0;
                let mut power = 1.0;
                for (i, c) in (1..).zip(coeffs) {
                    correction -= c * (n_mol * i as f64 / vavg) * power;
                    power *= x;
                }
                Ok(correction)
            },
            PressureCorrection::Spline(table) => table.evaluate(volume),
        }
    }
}

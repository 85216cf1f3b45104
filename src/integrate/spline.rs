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

//! Tabulated pressure corrections as a function of volume.
//!
//! A table file holds one `volume , correction` pair per line, with volumes
//! increasing.  The samples are expected (but not required) to be evenly
//! spaced.

use crate::{ErrorKind, FailResult};
use std::path::Path;
use std::str::FromStr;

/// Maximum deviation of a volume spacing from the first spacing before we complain.
pub const SPACING_TOL: f64 = 1e-3;

#[derive(Serialize, Deserialize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SplineKind {
    Linear,
    Cubic,
}

impl SplineKind {
    /// The numeric basis flag used by older input decks: 1 is linear, 2 is cubic.
    pub fn from_basis_type(flag: i32) -> FailResult<SplineKind> {
        match flag {
            1 => Ok(SplineKind::Linear),
            2 => Ok(SplineKind::Cubic),
            _ => throw!(ErrorKind::InvalidArgument(format!("unrecognized spline basis type: {}", flag))),
        }
    }

    pub fn min_samples(self) -> usize {
        match self {
            SplineKind::Linear => 2,
            SplineKind::Cubic => 3,
        }
    }
}

impl FromStr for SplineKind {
    type Err = failure::Error;

    fn from_str(s: &str) -> FailResult<SplineKind> {
        match s {
            "linear_spline" | "linear" => Ok(SplineKind::Linear),
            "cubic_spline" | "cubic" => Ok(SplineKind::Cubic),
            _ => throw!(ErrorKind::InvalidArgument(format!("unrecognized spline basis: {:?}", s))),
        }
    }
}

/// Coefficients `[a, b, c, d]` of `a + b dx + c dx^2 + d dx^3` on one interval.
pub type Segment = [f64; 4];

#[derive(Debug, Clone, PartialEq)]
pub struct SplineTable {
    kind: SplineKind,
    volumes: Vec<f64>,
    values: Vec<f64>,
    /// Empty for linear tables.
    segments: Vec<Segment>,
    uniform: bool,
}

/// Parse `volume , correction` lines.
///
/// Blank lines are skipped.  Lines that do not parse are logged and counted,
/// and the number of them is returned alongside the good samples.
pub fn parse_samples<I>(lines: I) -> (Vec<(f64, f64)>, usize)
where I: IntoIterator<Item=(usize, String)>,
{
    let mut samples = vec![];
    let mut malformed = 0;
    for (lineno, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Some(pair) => samples.push(pair),
            None => {
                warn!("correction table line {}: expected 'volume, correction', got {:?}", lineno, line);
                malformed += 1;
            },
        }
    }
    (samples, malformed)
}

fn parse_line(line: &str) -> Option<(f64, f64)> {
    let mut words = line.split(',');
    let volume = words.next()?.trim().parse().ok()?;
    let value = words.next()?.trim().parse().ok()?;
    match words.next() {
        None => Some((volume, value)),
        Some(_) => None,
    }
}

impl SplineTable {
    pub fn read(path: impl AsRef<Path>, kind: SplineKind) -> FailResult<SplineTable> {
        let path = path.as_ref();
        let lines = bocs_fs_util::read_numbered_lines(path).map_err(ErrorKind::from)?;
        let (samples, malformed) = parse_samples(lines);
        if malformed > 0 {
            warn!("skipped {} malformed line(s) in {}", malformed, path.display());
        }
        info!("read {} correction samples from {}", samples.len(), path.display());
        SplineTable::from_samples(kind, &samples)
    }

    pub fn from_samples(kind: SplineKind, samples: &[(f64, f64)]) -> FailResult<SplineTable> {
        if samples.len() < kind.min_samples() {
            throw!(ErrorKind::InvalidArgument(format!(
                "a {:?} correction table needs at least {} samples, got {}",
                kind, kind.min_samples(), samples.len(),
            )));
        }
        let volumes: Vec<_> = samples.iter().map(|&(v, _)| v).collect();
        let values: Vec<_> = samples.iter().map(|&(_, p)| p).collect();
        if !volumes.windows(2).all(|w| w[0] < w[1]) {
            throw!(ErrorKind::InvalidArgument("correction table volumes must be strictly increasing".into()));
        }

        let uniform = check_spacing(&volumes);
        let segments = match kind {
            SplineKind::Linear => vec![],
            SplineKind::Cubic => natural_cubic(&volumes, &values),
        };
        Ok(SplineTable { kind, volumes, values, segments, uniform })
    }

    pub fn kind(&self) -> SplineKind { self.kind }
    pub fn len(&self) -> usize { self.volumes.len() }
    pub fn is_empty(&self) -> bool { self.volumes.is_empty() }
    pub fn volumes(&self) -> &[f64] { &self.volumes }
    pub fn values(&self) -> &[f64] { &self.values }
    pub fn segments(&self) -> &[Segment] { &self.segments }

    /// Whether every volume spacing matched the first one within [`SPACING_TOL`].
    pub fn is_uniform(&self) -> bool { self.uniform }

    pub fn range(&self) -> (f64, f64) {
        (self.volumes[0], self.volumes[self.volumes.len() - 1])
    }

    /// Index of the interval containing `volume`.
    fn find_segment(&self, volume: f64) -> FailResult<usize> {
        let (lo, hi) = self.range();
        if !(lo <= volume && volume <= hi) {
            throw!(ErrorKind::NumericalInstability(format!(
                "volume {} is outside of the tabulated correction range [{}, {}]", volume, lo, hi,
            )));
        }
        let upper = self.volumes.partition_point(|&v| v <= volume);
        Ok(usize::min(upper.saturating_sub(1), self.volumes.len() - 2))
    }

    pub fn evaluate(&self, volume: f64) -> FailResult<f64> {
        let i = self.find_segment(volume)?;
        let dx = volume - self.volumes[i];
        Ok(match self.kind {
            SplineKind::Linear => {
                let slope = (self.values[i + 1] - self.values[i]) / (self.volumes[i + 1] - self.volumes[i]);
                self.values[i] + dx * slope
            },
            SplineKind::Cubic => {
                let [a, b, c, d] = self.segments[i];
                a + dx * (b + dx * (c + dx * d))
            },
        })
    }
}

fn check_spacing(volumes: &[f64]) -> bool {
    let first = volumes[1] - volumes[0];
    let bad = volumes.windows(2).position(|w| (w[1] - w[0] - first).abs() > SPACING_TOL);
    match bad {
        None => true,
        Some(i) => {
            warn!(
                "correction table volumes are not evenly spaced (spacing {} at sample {}, expected {}); \
                 continuing with the uneven table",
                volumes[i + 1] - volumes[i], i + 1, first,
            );
            false
        },
    }
}

/// Natural cubic spline through `(x[i], a[i])`.
///
/// Standard tridiagonal solve for the second-derivative coefficients; the
/// returned `n - 1` segments are in powers of `x - x[i]`.
fn natural_cubic(x: &[f64], a: &[f64]) -> Vec<Segment> {
    let n = x.len();
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();

    // scratch arrays carry one spare slot past the last sample, kept at zero
    let mut alpha = vec![0.0; n + 1];
    for i in 1..n - 1 {
        alpha[i] = 3.0 / h[i] * (a[i + 1] - a[i]) - 3.0 / h[i - 1] * (a[i] - a[i - 1]);
    }

    let mut l = vec![0.0; n + 1];
    let mut mu = vec![0.0; n + 1];
    let mut z = vec![0.0; n + 1];
    l[0] = 1.0;
    for i in 1..n - 1 {
        l[i] = 2.0 * (x[i + 1] - x[i - 1]) - h[i - 1] * mu[i - 1];
        mu[i] = h[i] / l[i];
        z[i] = (alpha[i] - h[i - 1] * z[i - 1]) / l[i];
    }
    l[n - 1] = 1.0;

    let mut c = vec![0.0; n + 1];
    let mut segments = vec![[0.0; 4]; n - 1];
    for j in (0..n - 1).rev() {
        c[j] = z[j] - mu[j] * c[j + 1];
        let b = (a[j + 1] - a[j]) / h[j] - h[j] * (c[j + 1] + 2.0 * c[j]) / 3.0;
        let d = (c[j + 1] - c[j]) / (3.0 * h[j]);
        segments[j] = [a[j], b, c[j], d];
    }
    segments
}

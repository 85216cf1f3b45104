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

//! The whitespace-separated keyword form of [`Params`], as found in input decks:
//!
//! ```text
//! temp 300.0 300.0 100.0 cgiso 0.986 0.986 1000.0 analytic 66476.015 968 2 245030.42 -759.58
//! ```

use crate::barostat::Couple;
use crate::correction::CorrectionBasis;
use crate::params::{Dilate, Params, PressureTargets, Ramp};
use crate::spline::SplineKind;
use crate::{ErrorKind, FailResult};

use std::path::PathBuf;
use std::str::FromStr;

macro_rules! bad_arg {
    ($($arg:tt)+) => { throw!(ErrorKind::InvalidArgument(format!($($arg)+))) };
}

/// Parse a whole line of keywords.
pub fn parse_line(line: &str) -> FailResult<Params> {
    parse_args(&line.split_whitespace().collect::<Vec<_>>())
}

/// Parse pre-split keyword arguments.
///
/// Later occurrences of a keyword override earlier ones.  Nothing is checked
/// beyond the syntax; see [`Params::validate`].
pub fn parse_args<S: AsRef<str>>(args: &[S]) -> FailResult<Params> {
    let mut tokens = Tokens { args, pos: 0 };
    let mut params = Params::default();

    while let Some(keyword) = tokens.next_opt() {
        match keyword {
            "temp" => params.temp = Some(tokens.ramp(keyword)?),

            "iso" | "cgiso" | "aniso" | "tri" | "x" | "y" | "z" | "yz" | "xz" | "xy" => {
                let ramp = tokens.ramp(keyword)?;
                let targets = params.pressure.get_or_insert_with(PressureTargets::default);
                *pressure_slot(targets, keyword) = Some(ramp);
            },

            "analytic" => {
                let vavg = tokens.parse::<f64>(keyword)?;
                let n_mol = tokens.parse::<usize>(keyword)?;
                let ncoeff = tokens.parse::<usize>(keyword)?;
                let coeffs = (0..ncoeff)
                    .map(|_| tokens.parse::<f64>(keyword))
                    .collect::<FailResult<Vec<_>>>()?;
                params.correction = Some(CorrectionBasis::Analytic { vavg, n_mol, coeffs });
            },
            "linear_spline" | "cubic_spline" => {
                let path = PathBuf::from(tokens.value(keyword)?);
                params.correction = Some(spline_basis(keyword.parse()?, path));
            },
            "basis" => {
                let kind = SplineKind::from_basis_type(tokens.parse(keyword)?)?;
                let path = PathBuf::from(tokens.value(keyword)?);
                params.correction = Some(spline_basis(kind, path));
            },

            "tchain" => params.tchain = tokens.parse(keyword)?,
            "pchain" => params.pchain = tokens.parse(keyword)?,
            "mtk" => params.mtk = tokens.yes_no(keyword)?,
            "tloop" => params.tloop = tokens.parse(keyword)?,
            "ploop" => params.ploop = tokens.parse(keyword)?,
            "nreset" => params.nreset = tokens.parse(keyword)?,
            "drag" => params.drag = tokens.parse(keyword)?,
            "dilate" => {
                params.dilate = match tokens.value(keyword)? {
                    "all" => Dilate::All,
                    "partial" => Dilate::Partial,
                    s => bad_arg!("dilate must be 'all' or 'partial', not {:?}", s),
                };
            },
            "couple" => {
                params.couple = Some(match tokens.value(keyword)? {
                    "none" => Couple::None,
                    "xyz" => Couple::Xyz,
                    "xy" => Couple::Xy,
                    "yz" => Couple::Yz,
                    "xz" => Couple::Xz,
                    s => bad_arg!("unrecognized couple style: {:?}", s),
                });
            },
            "fixedpoint" => {
                let x = tokens.parse(keyword)?;
                let y = tokens.parse(keyword)?;
                let z = tokens.parse(keyword)?;
                params.fixedpoint = Some([x, y, z]);
            },
            "flip" => params.flip = tokens.yes_no(keyword)?,
            "scaleyz" => params.scaleyz = Some(tokens.yes_no(keyword)?),
            "scalexz" => params.scalexz = Some(tokens.yes_no(keyword)?),
            "scalexy" => params.scalexy = Some(tokens.yes_no(keyword)?),

            _ => bad_arg!("unrecognized keyword: {:?}", keyword),
        }
    }
    Ok(params)
}

fn spline_basis(kind: SplineKind, path: PathBuf) -> CorrectionBasis {
    match kind {
        SplineKind::Linear => CorrectionBasis::LinearSpline(path),
        SplineKind::Cubic => CorrectionBasis::CubicSpline(path),
    }
}

fn pressure_slot<'a>(targets: &'a mut PressureTargets, keyword: &str) -> &'a mut Option<Ramp> {
    match keyword {
        "iso" | "cgiso" => &mut targets.iso,
        "aniso" => &mut targets.aniso,
        "tri" => &mut targets.tri,
        "x" => &mut targets.x,
        "y" => &mut targets.y,
        "z" => &mut targets.z,
        "yz" => &mut targets.yz,
        "xz" => &mut targets.xz,
        _ => &mut targets.xy,
    }
}

struct Tokens<'a, S> {
    args: &'a [S],
    pos: usize,
}

impl<'a, S: AsRef<str>> Tokens<'a, S> {
    fn next_opt(&mut self) -> Option<&'a str> {
        let out = self.args.get(self.pos).map(|s| s.as_ref());
        self.pos += 1;
        out
    }

    fn value(&mut self, keyword: &str) -> FailResult<&'a str> {
        match self.next_opt() {
            Some(s) => Ok(s),
            None => bad_arg!("missing value for keyword {:?}", keyword),
        }
    }

    fn parse<T: FromStr>(&mut self, keyword: &str) -> FailResult<T> {
        let s = self.value(keyword)?;
        match s.parse() {
            Ok(x) => Ok(x),
            Err(_) => bad_arg!("invalid value for keyword {:?}: {:?}", keyword, s),
        }
    }

    fn yes_no(&mut self, keyword: &str) -> FailResult<bool> {
        match self.value(keyword)? {
            "yes" => Ok(true),
            "no" => Ok(false),
            s => bad_arg!("{} must be 'yes' or 'no', not {:?}", keyword, s),
        }
    }

    fn ramp(&mut self, keyword: &str) -> FailResult<Ramp> {
        let start = self.parse(keyword)?;
        let stop = self.parse(keyword)?;
        let damp = self.parse(keyword)?;
        Ok(Ramp { start, stop, damp })
    }
}

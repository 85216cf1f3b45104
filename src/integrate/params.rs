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

//! Integrator settings.
//!
//! [`Params`] is the raw, deserializable form.  It becomes usable only after
//! [`Params::validate`] has checked it against the simulation cell and filled
//! in the defaults that depend on the cell.

#![allow(non_snake_case)]

use crate::atoms::GROUP_ALL;
use crate::barostat::{Barostat, Couple, PressureStyle};
use crate::chain::NoseHooverChain;
use crate::correction::CorrectionBasis;
use crate::domain::Domain;
use crate::tensor::Voigt;
use crate::FailResult;

/// `start`, `stop` and the damping period of a thermostat or barostat target.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Copy, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Ramp {
    pub start: f64,
    pub stop: f64,
    /// Damping period, in time units.
    pub damp: f64,
}

impl Ramp {
    pub fn constant(value: f64, damp: f64) -> Ramp { Ramp { start: value, stop: value, damp } }
}

/// Barostatted stress components.
///
/// At most one of `iso`, `aniso` and `tri` may be given.  The single
/// components may be given alongside them and take precedence.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct PressureTargets {
    /// Couple all normal components into one strain rate.
    #[serde(default)] pub iso: Option<Ramp>,
    /// Independent normal components.
    #[serde(default)] pub aniso: Option<Ramp>,
    /// Independent normal components, and shear components with target zero.
    #[serde(default)] pub tri: Option<Ramp>,

    #[serde(default)] pub x: Option<Ramp>,
    #[serde(default)] pub y: Option<Ramp>,
    #[serde(default)] pub z: Option<Ramp>,
    #[serde(default)] pub yz: Option<Ramp>,
    #[serde(default)] pub xz: Option<Ramp>,
    #[serde(default)] pub xy: Option<Ramp>,
}

/// Which atoms have their positions rescaled along with the cell.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Dilate {
    All,
    /// Only atoms in the integrator's group.
    Partial,
}

impl Default for Dilate {
    fn default() -> Self { Dilate::All }
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Params {
    /// Thermostat.  Required.
    #[serde(default)]
    pub temp: Option<Ramp>,

    /// Barostat.  Required.
    #[serde(default)]
    pub pressure: Option<PressureTargets>,

    /// Overrides the coupling implied by `pressure`.
    #[serde(default)]
    pub couple: Option<Couple>,

    /// Volume-dependent correction added to the scalar pressure.
    #[serde(default)]
    pub correction: Option<CorrectionBasis>,

    /// Links in the thermostat chain.
    #[serde(default = "params__tchain")]
    pub tchain: usize,

    /// Links in the barostat's thermostat chain.  May be zero.
    #[serde(default = "params__pchain")]
    pub pchain: usize,

    /// Include the Martyna-Tuckerman-Klein correction terms.
    #[serde(default = "params__mtk")]
    pub mtk: bool,

    /// Sub-iterations per thermostat half-step.
    #[serde(default = "params__tloop")]
    pub tloop: usize,

    /// Sub-iterations per barostat chain half-step.
    #[serde(default = "params__ploop")]
    pub ploop: usize,

    /// Recapture the reference cell every this many steps.  Zero disables.
    #[serde(default)]
    pub nreset: i64,

    /// Extra damping of the chain and strain-rate velocities.  Zero is pure Nose-Hoover.
    #[serde(default)]
    pub drag: f64,

    #[serde(default)]
    pub dilate: Dilate,

    /// Point that stays fixed as the cell changes.  Defaults to the center of the cell.
    #[serde(default)]
    pub fixedpoint: Option<[f64; 3]>,

    /// Reduce tilt factors by whole lattice vectors when they grow too large.
    #[serde(default = "params__flip")]
    pub flip: bool,

    /// Scale a tilt factor along with its cell length.  Defaults to yes for
    /// nonzero tilts of periodic cells that are not themselves barostatted.
    #[serde(default)] pub scaleyz: Option<bool>,
    #[serde(default)] pub scalexz: Option<bool>,
    #[serde(default)] pub scalexy: Option<bool>,

    /// Group bits of the atoms that are integrated.
    #[serde(default = "params__group")]
    pub group: u32,
}

fn params__tchain() -> usize { 3 }
fn params__pchain() -> usize { 3 }
fn params__mtk() -> bool { true }
fn params__tloop() -> usize { 1 }
fn params__ploop() -> usize { 1 }
fn params__flip() -> bool { true }
fn params__group() -> u32 { GROUP_ALL }

impl Default for Params {
    fn default() -> Self {
        Params {
            temp: None,
            pressure: None,
            couple: None,
            correction: None,
            tchain: params__tchain(),
            pchain: params__pchain(),
            mtk: params__mtk(),
            tloop: params__tloop(),
            ploop: params__ploop(),
            nreset: 0,
            drag: 0.0,
            dilate: Dilate::All,
            fixedpoint: None,
            flip: params__flip(),
            scaleyz: None,
            scalexz: None,
            scalexy: None,
            group: params__group(),
        }
    }
}

/// Settings that have been checked against the cell, with all defaults resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedParams {
    pub groupbit: u32,

    pub t_start: f64,
    pub t_stop: f64,
    pub t_period: f64,

    pub p_start: Voigt,
    pub p_stop: Voigt,
    pub p_period: Voigt,
    pub p_flag: [bool; 6],
    pub pstyle: PressureStyle,
    pub pcouple: Couple,
    pub deviatoric: bool,

    pub correction: Option<CorrectionBasis>,

    pub mtchain: usize,
    pub mpchain: usize,
    pub nc_tchain: usize,
    pub nc_pchain: usize,
    pub mtk: bool,
    pub nreset: i64,
    pub drag: f64,
    pub dilate: Dilate,
    pub fixedpoint: [f64; 3],
    pub flip: bool,
    pub scaleyz: bool,
    pub scalexz: bool,
    pub scalexy: bool,
}

const COMPONENT_NAMES: [&str; 6] = ["x", "y", "z", "yz", "xz", "xy"];

#[derive(Default)]
struct Components {
    start: Voigt,
    stop: Voigt,
    period: Voigt,
    flag: [bool; 6],
}

impl Components {
    fn set(&mut self, i: usize, ramp: &Ramp) {
        self.start[i] = ramp.start;
        self.stop[i] = ramp.stop;
        self.period[i] = ramp.damp;
        self.flag[i] = true;
    }

    fn clear(&mut self, i: usize) {
        self.start[i] = 0.0;
        self.stop[i] = 0.0;
        self.period[i] = 0.0;
        self.flag[i] = false;
    }

    fn same_settings(&self, i: usize, j: usize) -> bool {
        self.start[i] == self.start[j]
            && self.stop[i] == self.stop[j]
            && self.period[i] == self.period[j]
    }
}

impl Params {
    pub fn validate(&self, domain: &Domain) -> FailResult<ValidatedParams> {
        let dimension = domain.dimension;
        let [_, yperiodic, zperiodic] = domain.periodic;

        let temp = match self.temp {
            Some(temp) => temp,
            None => config_err!("a thermostat ('temp') is required"),
        };
        let pressure = match &self.pressure {
            Some(pressure) => pressure,
            None => config_err!("a barostat (one of 'iso', 'aniso', 'tri' or a single component) is required"),
        };

        if !(temp.start > 0.0 && temp.stop > 0.0) {
            config_err!("target temperature must be positive (got {} to {})", temp.start, temp.stop);
        }
        if !(temp.damp > 0.0) {
            config_err!("thermostat damping period must be > 0, got {}", temp.damp);
        }

        let mut scaleyz = zperiodic && dimension == 3 && domain.yz != 0.0;
        let mut scalexz = zperiodic && dimension == 3 && domain.xz != 0.0;
        let mut scalexy = yperiodic && domain.xy != 0.0;

        let mut comps = Components::default();
        let mut pcouple = Couple::None;
        let mut deviatoric = false;

        let styles = [&pressure.iso, &pressure.aniso, &pressure.tri];
        if styles.iter().filter(|x| x.is_some()).count() > 1 {
            config_err!("at most one of 'iso', 'aniso' and 'tri' may be given");
        }
        if let Some(ramp) = pressure.iso.as_ref().or(pressure.aniso.as_ref()).or(pressure.tri.as_ref()) {
            for i in 0..3 {
                comps.set(i, ramp);
            }
            if pressure.iso.is_some() {
                pcouple = Couple::Xyz;
            }
            if pressure.tri.is_some() {
                scaleyz = false;
                scalexz = false;
                scalexy = false;
                for i in 3..6 {
                    comps.set(i, &Ramp::constant(0.0, ramp.damp));
                }
            }
            if dimension == 2 {
                for &i in &[2, 3, 4] {
                    comps.clear(i);
                }
            }
        }

        let singles = [&pressure.x, &pressure.y, &pressure.z, &pressure.yz, &pressure.xz, &pressure.xy];
        for (i, ramp) in singles.iter().enumerate() {
            if let Some(ramp) = ramp {
                if dimension == 2 && [2, 3, 4].contains(&i) {
                    config_err!("'{}' cannot be barostatted in a 2d simulation", COMPONENT_NAMES[i]);
                }
                comps.set(i, ramp);
                deviatoric = true;
                match i {
                    3 => scaleyz = false,
                    4 => scalexz = false,
                    5 => scalexy = false,
                    _ => {},
                }
            }
        }

        if !comps.flag.iter().any(|&f| f) {
            config_err!("the barostat does not control any stress component");
        }

        if let Some(couple) = self.couple {
            pcouple = couple;
        }
        if let Some(x) = self.scaleyz { scaleyz = x; }
        if let Some(x) = self.scalexz { scalexz = x; }
        if let Some(x) = self.scalexy { scalexy = x; }

        if scaleyz && !zperiodic {
            config_err!("cannot scale yz when z is a non-periodic dimension");
        }
        if scalexz && !zperiodic {
            config_err!("cannot scale xz when z is a non-periodic dimension");
        }
        if scalexy && !yperiodic {
            config_err!("cannot scale xy when y is a non-periodic dimension");
        }
        for &(i, scale) in &[(3, scaleyz), (4, scalexz), (5, scalexy)] {
            if comps.flag[i] && scale {
                config_err!("cannot use both {0} dynamics and {0} scaling", COMPONENT_NAMES[i]);
            }
        }

        if !domain.triclinic && comps.flag[3..].iter().any(|&f| f) {
            config_err!("shear stress can only be barostatted for a triclinic cell");
        }

        let coupled: &[usize] = match pcouple {
            Couple::None => &[],
            Couple::Xyz if dimension == 2 => &[0, 1],
            Couple::Xyz => &[0, 1, 2],
            Couple::Xy => &[0, 1],
            Couple::Yz => &[1, 2],
            Couple::Xz => &[0, 2],
        };
        if dimension == 2 && (pcouple == Couple::Yz || pcouple == Couple::Xz) {
            config_err!("couple {:?} is invalid in a 2d simulation", pcouple);
        }
        for &i in coupled {
            if !comps.flag[i] || !comps.same_settings(i, coupled[0]) {
                config_err!("coupled pressure components must all be barostatted with identical settings");
            }
        }

        for i in 0..6 {
            if comps.flag[i] && !(comps.period[i] > 0.0) {
                config_err!("barostat damping period of '{}' must be > 0", COMPONENT_NAMES[i]);
            }
        }

        for i in 0..3 {
            if comps.flag[i] && !domain.periodic[i] {
                config_err!("cannot barostat '{}' along a non-periodic dimension", COMPONENT_NAMES[i]);
            }
        }
        if (comps.flag[3] || comps.flag[4]) && !zperiodic {
            config_err!("cannot barostat yz or xz when z is a non-periodic dimension");
        }
        if comps.flag[5] && !yperiodic {
            config_err!("cannot barostat xy when y is a non-periodic dimension");
        }

        let pstyle = match () {
            _ if comps.flag[3..].iter().any(|&f| f) => PressureStyle::Triclinic,
            _ if pcouple == Couple::Xyz || (dimension == 2 && pcouple == Couple::Xy) => PressureStyle::Iso,
            _ => PressureStyle::Aniso,
        };
        // the correction is applied to the scalar pressure only
        if self.correction.is_some() && pstyle != PressureStyle::Iso {
            config_err!("a pressure correction requires an isotropic barostat ('iso'), not {:?}", pstyle);
        }

        if self.tchain < 1 {
            config_err!("tchain must be at least 1");
        }
        if self.tloop < 1 || self.ploop < 1 {
            config_err!("tloop and ploop must be at least 1");
        }
        if self.nreset < 0 {
            config_err!("nreset must not be negative");
        }
        if !(self.drag >= 0.0) {
            config_err!("drag must not be negative, got {}", self.drag);
        }

        Ok(ValidatedParams {
            groupbit: self.group,
            t_start: temp.start,
            t_stop: temp.stop,
            t_period: temp.damp,
            p_start: comps.start,
            p_stop: comps.stop,
            p_period: comps.period,
            p_flag: comps.flag,
            pstyle,
            pcouple,
            deviatoric,
            correction: self.correction.clone(),
            mtchain: self.tchain,
            mpchain: self.pchain,
            nc_tchain: self.tloop,
            nc_pchain: self.ploop,
            mtk: self.mtk,
            nreset: self.nreset,
            drag: self.drag,
            dilate: self.dilate,
            fixedpoint: self.fixedpoint.unwrap_or_else(|| domain.center()),
            flip: self.flip,
            scaleyz,
            scalexz,
            scalexy,
        })
    }
}

impl ValidatedParams {
    /// Thermostat coupling frequency.
    pub fn t_freq(&self) -> f64 { 1.0 / self.t_period }

    /// Barostat state at rest, before masses are known.
    pub fn barostat(&self) -> Barostat {
        let mut p_freq = [0.0; 6];
        for i in 0..6 {
            if self.p_flag[i] {
                p_freq[i] = 1.0 / self.p_period[i];
            }
        }
        let p_freq_max = p_freq.iter().cloned().fold(0.0, f64::max);

        Barostat {
            pstyle: self.pstyle,
            pcouple: self.pcouple,
            mtk: self.mtk,
            deviatoric: self.deviatoric,
            nreset: self.nreset,
            p_start: self.p_start,
            p_stop: self.p_stop,
            p_freq,
            p_flag: self.p_flag,
            p_target: [0.0; 6],
            p_current: [0.0; 6],
            p_hydro: 0.0,
            p_freq_max,
            pdim: self.p_flag[..3].iter().filter(|&&f| f).count(),
            omega: [0.0; 6],
            omega_dot: [0.0; 6],
            omega_mass: [0.0; 6],
            chain: NoseHooverChain::new(self.mpchain),
            nc_pchain: self.nc_pchain,
            pdrag_factor: 1.0,
            vol0: 0.0,
            t0: 0.0,
            h0_inv: [0.0; 6],
            sigma: [0.0; 6],
            fdev: [0.0; 6],
            mtk_term1: 0.0,
            mtk_term2: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn cube() -> Domain { Domain::orthogonal([0.0; 3], [10.0; 3]).unwrap() }
    fn tilted() -> Domain { Domain::triclinic([0.0; 3], [10.0; 3], [1.0, 0.0, 0.0]).unwrap() }

    fn config_error(params: &Params, domain: &Domain) -> String {
        let e = params.validate(domain).unwrap_err();
        match e.downcast_ref::<ErrorKind>() {
            Some(ErrorKind::Configuration(msg)) => msg.clone(),
            other => panic!("expected a configuration error, got {:?}", other),
        }
    }

    #[test]
    fn iso_defaults() {
        let params: Params = from_json!({
            "temp": { "start": 300.0, "stop": 300.0, "damp": 100.0 },
            "pressure": { "iso": { "start": 1.0, "stop": 1.0, "damp": 1000.0 } },
        });
        let valid = params.validate(&cube()).unwrap();
        assert_eq!(valid.pstyle, PressureStyle::Iso);
        assert_eq!(valid.pcouple, Couple::Xyz);
        assert_eq!(valid.p_flag, [true, true, true, false, false, false]);
        assert_eq!((valid.mtchain, valid.mpchain, valid.nc_tchain, valid.nc_pchain), (3, 3, 1, 1));
        assert!(valid.mtk && valid.flip && !valid.deviatoric);
        assert_eq!(valid.fixedpoint, [5.0; 3]);
        assert_eq!(valid.dilate, Dilate::All);

        let baro = valid.barostat();
        assert_eq!(baro.pdim, 3);
        assert_close!(baro.p_freq_max, 1e-3);
    }

    #[test]
    fn thermostat_and_barostat_are_both_required() {
        let only_temp: Params = from_json!({
            "temp": { "start": 300.0, "stop": 300.0, "damp": 100.0 },
        });
        config_error(&only_temp, &cube());

        let only_press: Params = from_json!({
            "pressure": { "aniso": { "start": 1.0, "stop": 1.0, "damp": 1000.0 } },
        });
        config_error(&only_press, &cube());
    }

    #[test]
    fn bad_settings() {
        let base: Params = from_json!({
            "temp": { "start": 300.0, "stop": 300.0, "damp": 100.0 },
            "pressure": { "aniso": { "start": 1.0, "stop": 1.0, "damp": 1000.0 } },
        });
        base.validate(&cube()).unwrap();

        let mut p = base.clone();
        p.temp = Some(Ramp::constant(0.0, 100.0));
        config_error(&p, &cube());

        let mut p = base.clone();
        p.temp = Some(Ramp::constant(300.0, -1.0));
        config_error(&p, &cube());

        let mut p = base.clone();
        p.pressure.as_mut().unwrap().xy = Some(Ramp::constant(0.0, 100.0));
        let msg = config_error(&p, &cube());
        assert!(msg.contains("triclinic"), "{}", msg);

        let mut p = base.clone();
        p.pressure.as_mut().unwrap().x = Some(Ramp::constant(5.0, 1000.0));
        p.couple = Some(Couple::Xy);
        config_error(&p, &cube());

        let mut nonperiodic = cube();
        nonperiodic.periodic[2] = false;
        config_error(&base, &nonperiodic);

        let mut p = base.clone();
        p.tchain = 0;
        config_error(&p, &cube());
    }

    #[test]
    fn single_components_are_deviatoric() {
        let params: Params = from_json!({
            "temp": { "start": 1.0, "stop": 1.0, "damp": 1.0 },
            "pressure": {
                "x": { "start": 1.0, "stop": 1.0, "damp": 10.0 },
                "xy": { "start": 0.5, "stop": 0.5, "damp": 10.0 },
            },
        });
        let valid = params.validate(&tilted()).unwrap();
        assert_eq!(valid.pstyle, PressureStyle::Triclinic);
        assert_eq!(valid.p_flag, [true, false, false, false, false, true]);
        assert!(valid.deviatoric);
        // xy is barostatted, so it is not also scaled
        assert!(!valid.scalexy);
    }

    #[test]
    fn correction_needs_an_isotropic_barostat() {
        let analytic = json!({ "analytic": { "vavg": 1000.0, "n-mol": 10, "coeffs": [0.5] } });
        let mut params: Params = from_json!({
            "temp": { "start": 1.0, "stop": 1.0, "damp": 1.0 },
            "pressure": { "iso": { "start": 1.0, "stop": 1.0, "damp": 10.0 } },
        });
        params.correction = Some(serde_json::from_value(analytic).unwrap());
        assert!(params.validate(&cube()).unwrap().correction.is_some());

        let mut aniso = params.clone();
        aniso.pressure = from_json!({ "aniso": { "start": 1.0, "stop": 1.0, "damp": 10.0 } });
        config_error(&aniso, &cube());

        let mut tri = params.clone();
        tri.pressure = from_json!({ "tri": { "start": 1.0, "stop": 1.0, "damp": 10.0 } });
        config_error(&tri, &tilted());

        let mut single = params.clone();
        single.pressure = from_json!({ "x": { "start": 1.0, "stop": 1.0, "damp": 10.0 } });
        config_error(&single, &cube());

        // x, y and z coupled together is isotropic
        let mut coupled = params.clone();
        coupled.pressure = from_json!({
            "x": { "start": 1.0, "stop": 1.0, "damp": 10.0 },
            "y": { "start": 1.0, "stop": 1.0, "damp": 10.0 },
            "z": { "start": 1.0, "stop": 1.0, "damp": 10.0 },
        });
        coupled.couple = Some(Couple::Xyz);
        assert_eq!(coupled.validate(&cube()).unwrap().pstyle, PressureStyle::Iso);
    }

    #[test]
    fn tilt_scaling_defaults() {
        let params: Params = from_json!({
            "temp": { "start": 1.0, "stop": 1.0, "damp": 1.0 },
            "pressure": { "aniso": { "start": 1.0, "stop": 1.0, "damp": 10.0 } },
        });
        let valid = params.validate(&tilted()).unwrap();
        assert_eq!(valid.pstyle, PressureStyle::Aniso);
        assert_eq!((valid.scaleyz, valid.scalexz, valid.scalexy), (false, false, true));

        let valid = params.validate(&cube()).unwrap();
        assert_eq!((valid.scaleyz, valid.scalexz, valid.scalexy), (false, false, false));
    }

    #[test]
    fn two_dimensional_iso() {
        let domain = Domain::new(2, [true, true, false], false, [0.0; 3], [4.0, 4.0, 1.0], [0.0; 3]).unwrap();
        let params: Params = from_json!({
            "temp": { "start": 1.0, "stop": 1.0, "damp": 1.0 },
            "pressure": { "iso": { "start": 1.0, "stop": 1.0, "damp": 10.0 } },
        });
        let valid = params.validate(&domain).unwrap();
        assert_eq!(valid.pstyle, PressureStyle::Iso);
        assert_eq!(valid.p_flag, [true, true, false, false, false, false]);
    }
}

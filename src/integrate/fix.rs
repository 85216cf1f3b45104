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

//! The integrator itself.
//!
//! A step is split symmetrically:
//!
//! ```text
//! initial_integrate:  barostat chain / thermostat chain / strain rate / v half-kick
//!                     / half cell update / drift / half cell update
//! (forces)
//! final_integrate:    v half-kick / strain rate / thermostat chain / barostat chain
//! ```

use crate::atoms::Atoms;
use crate::barostat::{Barostat, Kinetic, PressureStyle};
use crate::chain::{HalfStep, NoseHooverChain};
use crate::compute::{BocsPressure, CgCorrection, KSpace, PressureCompute, RigidDeform, Temperature, TemperatureCompute};
use crate::correction::PressureCorrection;
use crate::params::{Dilate, ValidatedParams};
use crate::schedule;
use crate::system::System;
use crate::tensor::{Voigt, XX, YY, ZZ, YZ, XZ, XY};
use crate::FailResult;

use std::fmt;

/// Nose-Hoover chain NPT integration of one group of atoms.
pub struct FixBocs {
    pub(crate) groupbit: u32,

    pub(crate) t_start: f64,
    pub(crate) t_stop: f64,
    pub(crate) t_freq: f64,
    pub(crate) t_target: f64,
    pub(crate) t_current: f64,
    pub(crate) tdof: f64,
    pub(crate) ke_target: f64,
    pub(crate) chain: NoseHooverChain,
    pub(crate) nc_tchain: usize,
    pub(crate) drag: f64,
    pub(crate) tdrag_factor: f64,

    pub(crate) baro: Barostat,
    pub(crate) dilate: Dilate,
    pub(crate) fixedpoint: [f64; 3],
    pub(crate) scaleyz: bool,
    pub(crate) scalexz: bool,
    pub(crate) scalexy: bool,
    /// Tilt flips are checked before reneighboring.
    pub(crate) pre_exchange_flag: bool,

    correction: Option<PressureCorrection>,
    temperature: Box<dyn TemperatureCompute>,
    pressure: Box<dyn PressureCompute>,
    pub(crate) rigid: Vec<Box<dyn RigidDeform>>,
    kspace: Option<Box<dyn KSpace>>,

    pub(crate) dt: f64,
    pub(crate) dtv: f64,
    pub(crate) dtf: f64,
    pub(crate) dthalf: f64,
    /// Half-step used by the cell update.  Always based on the innermost rRESPA level.
    pub(crate) dto: f64,
    step_respa: Vec<f64>,
}

impl FixBocs {
    /// Build the integrator with the default computes: a plain kinetic
    /// temperature of all atoms and a virial pressure that carries the
    /// configured correction.
    pub fn new(params: ValidatedParams, sys: &System) -> FailResult<FixBocs> {
        let correction = match &params.correction {
            Some(basis) => Some(basis.build()?),
            None => None,
        };

        let mut pressure = BocsPressure::new();
        if let Some(correction) = &correction {
            pressure.send_cg_info(correction.clone());
        }

        let domain = &sys.domain;
        let can_tilt = params.p_flag[3..].iter().any(|&f| f)
            || domain.xy != 0.0 || domain.xz != 0.0 || domain.yz != 0.0;

        let baro = params.barostat();
        info!(
            "bocs: {:?} barostat over {} components, thermostat chain of {}, barostat chain of {}",
            baro.pstyle, baro.pdof(), params.mtchain, params.mpchain,
        );
        if let Some(correction) = &correction {
            match correction {
                PressureCorrection::Analytic { coeffs, .. } => {
                    info!("bocs: analytic pressure correction with {} coefficients", coeffs.len());
                },
                PressureCorrection::Spline(table) => {
                    info!("bocs: {:?} pressure correction over {} samples", table.kind(), table.len());
                },
            }
        }

        Ok(FixBocs {
            groupbit: params.groupbit,
            t_start: params.t_start,
            t_stop: params.t_stop,
            t_freq: params.t_freq(),
            t_target: params.t_start,
            t_current: 0.0,
            tdof: 0.0,
            ke_target: 0.0,
            chain: NoseHooverChain::new(params.mtchain),
            nc_tchain: params.nc_tchain,
            drag: params.drag,
            tdrag_factor: 1.0,

            baro,
            dilate: params.dilate,
            fixedpoint: params.fixedpoint,
            scaleyz: params.scaleyz,
            scalexz: params.scalexz,
            scalexy: params.scalexy,
            pre_exchange_flag: params.flip && can_tilt,

            correction,
            temperature: Box::new(Temperature::new(params.groupbit)),
            pressure: Box::new(pressure),
            rigid: vec![],
            kspace: None,

            dt: sys.dt,
            dtv: sys.dt,
            dtf: 0.0,
            dthalf: 0.5 * sys.dt,
            dto: 0.5 * sys.dt,
            step_respa: vec![],
        })
    }

    /// Replace the temperature compute.
    pub fn set_temperature_compute(&mut self, temperature: Box<dyn TemperatureCompute>) {
        self.temperature = temperature;
    }

    /// Replace the pressure compute.
    ///
    /// When a correction is configured, the compute must be able to carry it.
    pub fn set_pressure_compute(&mut self, mut pressure: Box<dyn PressureCompute>) -> FailResult<()> {
        if let Some(correction) = &self.correction {
            match pressure.cg_correction() {
                Some(cg) => cg.send_cg_info(correction.clone()),
                None => config_err!("a pressure correction is configured, but the pressure compute cannot apply one"),
            }
        }
        self.pressure = pressure;
        Ok(())
    }

    /// Rigid bodies whose positions must follow the cell.
    pub fn add_rigid(&mut self, rigid: Box<dyn RigidDeform>) {
        self.rigid.push(rigid);
    }

    /// Long-range solver to refresh whenever the cell changes.
    pub fn set_kspace(&mut self, kspace: Box<dyn KSpace>) {
        self.kspace = Some(kspace);
    }

    pub fn temperature(&self) -> &dyn TemperatureCompute { &*self.temperature }
    pub fn pressure(&self) -> &dyn PressureCompute { &*self.pressure }
    pub fn barostat(&self) -> &Barostat { &self.baro }
    pub fn thermostat_chain(&self) -> &NoseHooverChain { &self.chain }
    pub fn t_target(&self) -> f64 { self.t_target }

    /// Prepare for a run with a single timestep size.
    pub fn init(&mut self, sys: &System) {
        self.step_respa.clear();
        self.reset_dt(sys);
        if self.baro.vol0 == 0.0 {
            self.baro.capture_reference(&sys.domain);
        }
    }

    /// Prepare for an rRESPA run.  `steps[0]` is the innermost timestep.
    pub fn init_respa(&mut self, sys: &System, steps: &[f64]) {
        self.init(sys);
        self.step_respa = steps.to_vec();
        if let Some(&inner) = steps.first() {
            self.dto = 0.5 * inner;
        }
    }

    /// Rederive everything that depends on the timestep.
    pub fn reset_dt(&mut self, sys: &System) {
        let dt = sys.dt;
        self.dt = dt;
        self.dtv = dt;
        self.dtf = 0.5 * dt * sys.units.ftm2v;
        self.dthalf = 0.5 * dt;
        self.dto = self.dthalf;

        self.tdrag_factor = 1.0 - dt * self.t_freq * self.drag / self.nc_tchain as f64;
        self.baro.pdrag_factor = 1.0 - dt * self.baro.p_freq_max * self.drag / self.baro.nc_pchain as f64;
    }

    /// Set a new constant temperature target.
    pub fn reset_target(&mut self, t: f64) {
        self.t_target = t;
        self.t_start = t;
        self.t_stop = t;
    }

    /// Compute the initial temperature, pressure and targets, and assign masses.
    ///
    /// Forces and the virial must already be computed.
    pub fn setup(&mut self, sys: &System) -> FailResult<()> {
        self.t_current = self.temperature.compute_scalar(sys);
        self.tdof = self.temperature.dof();
        self.compute_temp_target(sys);
        if self.baro.t0 == 0.0 {
            self.baro.t0 = self.t_target;
        }

        self.baro.compute_press_target(sys.ntimestep, sys.beginstep, sys.endstep, &sys.domain);
        self.compute_current_pressure(sys, false)?;

        let kt = sys.units.boltz * self.t_target;
        self.set_chain_masses(kt);
        self.chain.init_forces(kt);
        self.baro.set_masses(kt, sys.natoms);

        info!(
            "bocs: setup at T = {:.6} (target {:.6}), P = {:?}, volume {:.6}",
            self.t_current, self.t_target, &self.baro.p_current[..3], sys.domain.volume(),
        );
        Ok(())
    }

    pub fn initial_integrate(&mut self, sys: &mut System) -> FailResult<()> {
        self.open_extended_half_step(sys)?;
        self.nve_v(sys);
        self.remap(sys)?;
        self.nve_x(sys);
        self.remap(sys)?;
        if let Some(kspace) = &mut self.kspace {
            kspace.setup(&sys.domain);
        }
        Ok(())
    }

    pub fn final_integrate(&mut self, sys: &mut System) -> FailResult<()> {
        self.nve_v(sys);

        // a bias may hold per-atom state that went stale when atoms moved between ranks
        if self.temperature.has_bias() && sys.reneighbored {
            self.t_current = self.temperature.compute_scalar(sys);
        }
        self.nh_v_press(sys);

        self.t_current = self.temperature.compute_scalar(sys);
        self.tdof = self.temperature.dof();
        self.compute_current_pressure(sys, false)?;
        self.nh_omega_dot(sys);

        self.nhc_temp_integrate(sys);
        let kt = sys.units.boltz * self.t_target;
        self.baro.nhc_press_integrate(kt, self.dt);
        Ok(())
    }

    fn respa_step(&self, level: usize) -> FailResult<f64> {
        match self.step_respa.get(level) {
            Some(&step) => Ok(step),
            None => config_err!("rRESPA level {} was not set up for this integrator", level),
        }
    }

    fn is_outermost(&self, level: usize) -> bool { level + 1 == self.step_respa.len() }

    pub fn initial_integrate_respa(&mut self, sys: &mut System, level: usize) -> FailResult<()> {
        let step = self.respa_step(level)?;
        self.dtv = step;
        self.dtf = 0.5 * step * sys.units.ftm2v;
        self.dthalf = 0.5 * step;

        if self.is_outermost(level) {
            self.open_extended_half_step(sys)?;
        }
        self.nve_v(sys);

        if level == 0 {
            self.remap(sys)?;
            self.nve_x(sys);
            self.remap(sys)?;
        }
        Ok(())
    }

    /// Refresh the long-range solver once per outer step, after the cell has moved.
    pub fn pre_force_respa(&mut self, sys: &System, level: usize) {
        if self.is_outermost(level) {
            if let Some(kspace) = &mut self.kspace {
                kspace.setup(&sys.domain);
            }
        }
    }

    pub fn final_integrate_respa(&mut self, sys: &mut System, level: usize) -> FailResult<()> {
        let step = self.respa_step(level)?;
        self.dtf = 0.5 * step * sys.units.ftm2v;
        self.dthalf = 0.5 * step;

        match self.is_outermost(level) {
            true => self.final_integrate(sys),
            false => {
                self.nve_v(sys);
                Ok(())
            },
        }
    }

    // Everything in initial_integrate that comes before the velocity kick.
    fn open_extended_half_step(&mut self, sys: &mut System) -> FailResult<()> {
        let kt = sys.units.boltz * self.t_target;
        self.baro.nhc_press_integrate(kt, self.dt);

        self.compute_temp_target(sys);
        self.nhc_temp_integrate(sys);

        // kinetic energy changed, so the pressure did too
        self.compute_current_pressure(sys, true)?;

        self.baro.compute_press_target(sys.ntimestep, sys.beginstep, sys.endstep, &sys.domain);
        self.nh_omega_dot(sys);
        self.nh_v_press(sys);
        Ok(())
    }

    /// Evaluate the pressure the barostat needs and couple it.
    fn compute_current_pressure(&mut self, sys: &System, refresh_temperature: bool) -> FailResult<()> {
        match self.baro.pstyle {
            PressureStyle::Iso => {
                if refresh_temperature {
                    self.temperature.compute_scalar(sys);
                }
                self.pressure.compute_scalar(sys, &*self.temperature)?;
            },
            _ => {
                self.temperature.compute_vector(sys);
                self.pressure.compute_vector(sys, &*self.temperature)?;
            },
        }
        self.baro.couple(self.pressure.scalar(), &self.pressure.vector())?;
        self.pressure.addstep(sys.ntimestep + 1);
        Ok(())
    }

    pub(crate) fn compute_temp_target(&mut self, sys: &System) {
        self.t_target = schedule::ramp(sys.ntimestep, sys.beginstep, sys.endstep, self.t_start, self.t_stop);
        self.ke_target = self.tdof * sys.units.boltz * self.t_target;
    }

    fn set_chain_masses(&mut self, kt: f64) {
        let t_freq2 = self.t_freq * self.t_freq;
        self.chain.set_masses(self.tdof * kt / t_freq2, kt / t_freq2);
    }

    /// Half-step of the thermostat chain, rescaling the group's velocities.
    pub(crate) fn nhc_temp_integrate(&mut self, sys: &mut System) {
        let boltz = sys.units.boltz;
        let kt = boltz * self.t_target;
        // masses follow the target so that the coupling frequency stays fixed
        self.set_chain_masses(kt);

        let step = HalfStep {
            dt: self.dt,
            nloop: self.nc_tchain,
            drag_factor: self.tdrag_factor,
            target: self.ke_target,
            kt,
        };
        let ke_current = self.tdof * boltz * self.t_current;

        let groupbit = self.groupbit;
        let tdof = self.tdof;
        let temperature = &mut self.temperature;
        let t_current = &mut self.t_current;
        let atoms = &mut sys.atoms;
        self.chain.half_step(step, ke_current, |factor| {
            nh_v_temp(atoms, groupbit, &mut **temperature, factor);
            *t_current *= factor * factor;
            tdof * boltz * *t_current
        });
    }

    fn nh_omega_dot(&mut self, sys: &System) {
        let kinetic = Kinetic {
            t_current: self.t_current,
            tdof: self.tdof,
            ke_tensor: self.temperature.vector(),
        };
        self.baro.nh_omega_dot(&sys.domain, kinetic, sys.natoms, &sys.units, self.dthalf);
    }

    /// Scale velocities by the strain rate, including the MTK term.
    pub(crate) fn nh_v_press(&mut self, sys: &mut System) {
        let omega_dot = self.baro.omega_dot;
        let mtk_term2 = self.baro.mtk_term2;
        let dt4 = 0.25 * self.dt;
        let dthalf = self.dthalf;
        let triclinic = self.baro.pstyle == PressureStyle::Triclinic;

        let factor = [
            (-dt4 * (omega_dot[XX] + mtk_term2)).exp(),
            (-dt4 * (omega_dot[YY] + mtk_term2)).exp(),
            (-dt4 * (omega_dot[ZZ] + mtk_term2)).exp(),
        ];

        let groupbit = self.groupbit;
        let temperature = &mut self.temperature;
        let bias = temperature.has_bias();
        let atoms = &mut sys.atoms;
        for (i, (v, &mask)) in atoms.v.iter_mut().zip(&atoms.mask).enumerate() {
            if mask & groupbit == 0 {
                continue;
            }
            if bias {
                temperature.remove_bias(i, v);
            }
            for k in 0..3 {
                v[k] *= factor[k];
            }
            if triclinic {
                v[0] += -dthalf * (v[1] * omega_dot[XY] + v[2] * omega_dot[XZ]);
                v[1] += -dthalf * v[2] * omega_dot[YZ];
            }
            for k in 0..3 {
                v[k] *= factor[k];
            }
            if bias {
                temperature.restore_bias(i, v);
            }
        }
    }

    /// Half-kick from the forces.
    pub(crate) fn nve_v(&mut self, sys: &mut System) {
        let groupbit = self.groupbit;
        let atoms = &mut sys.atoms;
        for (v, f, &mass, &mask) in izip!(&mut atoms.v, &atoms.f, &atoms.mass, &atoms.mask) {
            if mask & groupbit != 0 {
                let dtfm = self.dtf / mass;
                for k in 0..3 {
                    v[k] += dtfm * f[k];
                }
            }
        }
    }

    /// Drift.
    pub(crate) fn nve_x(&mut self, sys: &mut System) {
        let groupbit = self.groupbit;
        let atoms = &mut sys.atoms;
        for (x, v, &mask) in izip!(&mut atoms.x, &atoms.v, &atoms.mask) {
            if mask & groupbit != 0 {
                for k in 0..3 {
                    x[k] += self.dtv * v[k];
                }
            }
        }
    }

    fn thermostat_energy(&self, kt: f64) -> f64 {
        self.chain.energy(self.ke_target, kt)
    }

    /// Energy of the extended variables.
    ///
    /// Its sum with the kinetic and potential energy of the atoms is conserved.
    pub fn compute_scalar(&self, sys: &System) -> f64 {
        let kt = sys.units.boltz * self.t_target;
        self.thermostat_energy(kt) + self.baro.energy(kt, &sys.domain, sys.units.nktv2p)
    }

    pub fn report(&self, sys: &System) -> Report {
        let kt = sys.units.boltz * self.t_target;
        let nktv2p = sys.units.nktv2p;
        let m = self.chain.len();
        let mp = self.baro.chain.len();
        let strain_energy = match self.baro.deviatoric {
            true => self.baro.strain_energy(&sys.domain, nktv2p),
            false => 0.0,
        };
        Report {
            step: sys.ntimestep,
            t_current: self.t_current,
            t_target: self.t_target,
            p_current: self.baro.p_current,
            p_target: self.baro.p_target,
            volume: sys.domain.volume(),
            eta: self.chain.eta.clone(),
            eta_dot: self.chain.eta_dot[..m].to_vec(),
            omega: self.baro.omega,
            omega_dot: self.baro.omega_dot,
            etap: self.baro.chain.eta.clone(),
            etap_dot: self.baro.chain.eta_dot[..mp].to_vec(),
            thermostat_energy: self.thermostat_energy(kt),
            barostat_energy: self.baro.energy(kt, &sys.domain, nktv2p) - strain_energy,
            strain_energy,
            energy: self.compute_scalar(sys),
        }
    }
}

// Applies a thermostat scaling factor to the group's velocities, leaving any bias alone.
fn nh_v_temp(atoms: &mut Atoms, groupbit: u32, temperature: &mut dyn TemperatureCompute, factor: f64) {
    let bias = temperature.has_bias();
    for (i, (v, &mask)) in atoms.v.iter_mut().zip(&atoms.mask).enumerate() {
        if mask & groupbit == 0 {
            continue;
        }
        if bias {
            temperature.remove_bias(i, v);
        }
        for x in v.iter_mut() {
            *x *= factor;
        }
        if bias {
            temperature.restore_bias(i, v);
        }
    }
}

/// A snapshot of the extended variables for thermo output.
#[derive(Serialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Report {
    pub step: i64,
    pub t_current: f64,
    pub t_target: f64,
    pub p_current: Voigt,
    pub p_target: Voigt,
    pub volume: f64,

    pub eta: Vec<f64>,
    pub eta_dot: Vec<f64>,
    pub omega: Voigt,
    pub omega_dot: Voigt,
    pub etap: Vec<f64>,
    pub etap_dot: Vec<f64>,

    pub thermostat_energy: f64,
    /// Cell and barostat chain, excluding strain energy.
    pub barostat_energy: f64,
    pub strain_energy: f64,
    /// Sum of the above.
    pub energy: f64,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p_mean = (self.p_current[XX] + self.p_current[YY] + self.p_current[ZZ]) / 3.0;
        write!(
            f, "{:>8} T {:>10.5} ({:.5})  P {:>10.5}  V {:>12.5}  E_ext {:>12.6}",
            self.step, self.t_current, self.t_target, p_mean, self.volume, self.energy,
        )?;
        if let Some(eta) = self.eta.first() {
            write!(f, "  eta0 {:.5}", eta)?;
        }
        Ok(())
    }
}

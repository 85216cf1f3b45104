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

//! Collaborators of the integrator.
//!
//! The integrator never sums over atoms itself to obtain a temperature or a
//! pressure; it asks one of these.  Each `compute_*` method performs a global
//! reduction through [`System::comm`], and the matching accessor returns the
//! last computed value without communicating.
//!
//! All tensors are in Voigt order `xx, yy, zz, yz, xz, xy`.

use crate::atoms::GROUP_ALL;
use crate::correction::PressureCorrection;
use crate::domain::Domain;
use crate::system::System;
use crate::tensor::{Voigt, XX, YY, ZZ, YZ, XZ, XY};
use crate::FailResult;

pub trait TemperatureCompute {
    /// Degrees of freedom as of the last `compute_scalar`.
    fn dof(&self) -> f64;

    fn compute_scalar(&mut self, sys: &System) -> f64;

    /// The kinetic energy tensor `Σ m v ⊗ v` (energy units, not divided by dof).
    fn compute_vector(&mut self, sys: &System) -> Voigt;

    fn scalar(&self) -> f64;

    fn vector(&self) -> Voigt;

    /// Whether part of each velocity is a streaming velocity that thermostatting should leave alone.
    fn has_bias(&self) -> bool { false }

    /// Subtract the bias from the velocity of local atom `i`.
    ///
    /// Only valid after a `compute_scalar` on the same configuration.
    fn remove_bias(&mut self, _i: usize, _v: &mut [f64; 3]) {}

    /// Undo `remove_bias`.
    fn restore_bias(&mut self, _i: usize, _v: &mut [f64; 3]) {}
}

pub trait PressureCompute {
    /// Scalar pressure.  Uses `temperature.scalar()` and `temperature.dof()`,
    /// which must be current.
    fn compute_scalar(&mut self, sys: &System, temperature: &dyn TemperatureCompute) -> FailResult<f64>;

    /// Pressure tensor.  Uses `temperature.vector()`, which must be current.
    fn compute_vector(&mut self, sys: &System, temperature: &dyn TemperatureCompute) -> FailResult<Voigt>;

    fn scalar(&self) -> f64;

    fn vector(&self) -> Voigt;

    /// Hint that the virial will be needed again on `ntimestep`.
    fn addstep(&mut self, _ntimestep: i64) {}

    /// Capability probe for computes that accept a volume-dependent correction.
    fn cg_correction(&mut self) -> Option<&mut dyn CgCorrection> { None }
}

/// A pressure compute that adds a coarse-graining correction to its scalar pressure.
pub trait CgCorrection {
    fn send_cg_info(&mut self, correction: PressureCorrection);
}

/// Rigid bodies whose centers must follow the cell during a remap.
pub trait RigidDeform {
    /// `false`: convert body coordinates to fractional using the old cell.
    /// `true`: convert back using the new cell.
    fn deform(&mut self, domain: &Domain, to_box: bool);
}

/// A long-range solver whose coefficients depend on the cell.
pub trait KSpace {
    fn setup(&mut self, domain: &Domain);
}

//--------------------------------------------------------

/// Plain kinetic temperature of a group.
#[derive(Debug, Clone)]
pub struct Temperature {
    groupbit: u32,
    dof: f64,
    scalar: f64,
    vector: Voigt,
}

impl Temperature {
    pub fn new(groupbit: u32) -> Self {
        Temperature { groupbit, dof: 0.0, scalar: 0.0, vector: [0.0; 6] }
    }

    pub fn all() -> Self { Temperature::new(GROUP_ALL) }
}

// dimension * N, minus the dimension for the conserved total momentum
fn group_dof(sys: &System, groupbit: u32) -> f64 {
    let count = sys.atoms.in_group(groupbit).count() as f64;
    let count = sys.comm.sum_scalar(count);
    let dim = sys.domain.dimension as f64;
    dim * count - dim
}

fn temperature_from_mvv(sys: &System, dof: f64, mvv: f64) -> f64 {
    let units = sys.units;
    match dof > 0.0 {
        true => units.mvv2e * mvv / (dof * units.boltz),
        false => 0.0,
    }
}

fn add_mvv_tensor(out: &mut Voigt, mass: f64, v: [f64; 3]) {
    out[XX] += mass * v[0] * v[0];
    out[YY] += mass * v[1] * v[1];
    out[ZZ] += mass * v[2] * v[2];
    out[YZ] += mass * v[1] * v[2];
    out[XZ] += mass * v[0] * v[2];
    out[XY] += mass * v[0] * v[1];
}

fn reduce_tensor(sys: &System, local: &Voigt) -> Voigt {
    let mut global = [0.0; 6];
    sys.comm.all_reduce_sum(local, &mut global);
    for x in &mut global {
        *x *= sys.units.mvv2e;
    }
    global
}

impl TemperatureCompute for Temperature {
    fn dof(&self) -> f64 { self.dof }

    fn compute_scalar(&mut self, sys: &System) -> f64 {
        self.dof = group_dof(sys, self.groupbit);

        let atoms = &sys.atoms;
        let local: f64 = atoms.in_group(self.groupbit).map(|i| {
            let v = atoms.v[i];
            atoms.mass[i] * (v[0] * v[0] + v[1] * v[1] + v[2] * v[2])
        }).sum();

        self.scalar = temperature_from_mvv(sys, self.dof, sys.comm.sum_scalar(local));
        self.scalar
    }

    fn compute_vector(&mut self, sys: &System) -> Voigt {
        let atoms = &sys.atoms;
        let mut local = [0.0; 6];
        for i in atoms.in_group(self.groupbit) {
            add_mvv_tensor(&mut local, atoms.mass[i], atoms.v[i]);
        }
        self.vector = reduce_tensor(sys, &local);
        self.vector
    }

    fn scalar(&self) -> f64 { self.scalar }
    fn vector(&self) -> Voigt { self.vector }
}

/// Temperature after subtracting the center-of-mass velocity of the group.
///
/// The center-of-mass velocity is the bias.
#[derive(Debug, Clone)]
pub struct ComTemperature {
    groupbit: u32,
    dof: f64,
    scalar: f64,
    vector: Voigt,
    vbias: [f64; 3],
}

impl ComTemperature {
    pub fn new(groupbit: u32) -> Self {
        ComTemperature { groupbit, dof: 0.0, scalar: 0.0, vector: [0.0; 6], vbias: [0.0; 3] }
    }

    pub fn vbias(&self) -> [f64; 3] { self.vbias }

    fn compute_vbias(&mut self, sys: &System) {
        let atoms = &sys.atoms;
        let mut local = [0.0; 4];
        for i in atoms.in_group(self.groupbit) {
            let m = atoms.mass[i];
            for k in 0..3 {
                local[k] += m * atoms.v[i][k];
            }
            local[3] += m;
        }
        let mut global = [0.0; 4];
        sys.comm.all_reduce_sum(&local, &mut global);

        self.vbias = match global[3] > 0.0 {
            true => [global[0] / global[3], global[1] / global[3], global[2] / global[3]],
            false => [0.0; 3],
        };
    }

    fn unbiased(&self, v: [f64; 3]) -> [f64; 3] {
        let b = self.vbias;
        [v[0] - b[0], v[1] - b[1], v[2] - b[2]]
    }
}

impl TemperatureCompute for ComTemperature {
    fn dof(&self) -> f64 { self.dof }

    fn compute_scalar(&mut self, sys: &System) -> f64 {
        self.dof = group_dof(sys, self.groupbit);
        self.compute_vbias(sys);

        let atoms = &sys.atoms;
        let local: f64 = atoms.in_group(self.groupbit).map(|i| {
            let v = self.unbiased(atoms.v[i]);
            atoms.mass[i] * (v[0] * v[0] + v[1] * v[1] + v[2] * v[2])
        }).sum();

        self.scalar = temperature_from_mvv(sys, self.dof, sys.comm.sum_scalar(local));
        self.scalar
    }

    fn compute_vector(&mut self, sys: &System) -> Voigt {
        self.compute_vbias(sys);

        let atoms = &sys.atoms;
        let mut local = [0.0; 6];
        for i in atoms.in_group(self.groupbit) {
            add_mvv_tensor(&mut local, atoms.mass[i], self.unbiased(atoms.v[i]));
        }
        self.vector = reduce_tensor(sys, &local);
        self.vector
    }

    fn scalar(&self) -> f64 { self.scalar }
    fn vector(&self) -> Voigt { self.vector }

    fn has_bias(&self) -> bool { true }

    fn remove_bias(&mut self, _: usize, v: &mut [f64; 3]) {
        for k in 0..3 {
            v[k] -= self.vbias[k];
        }
    }

    fn restore_bias(&mut self, _: usize, v: &mut [f64; 3]) {
        for k in 0..3 {
            v[k] += self.vbias[k];
        }
    }
}

//--------------------------------------------------------

/// Virial pressure.
#[derive(Debug, Clone, Default)]
pub struct Pressure {
    scalar: f64,
    vector: Voigt,
}

impl Pressure {
    pub fn new() -> Self { Default::default() }
}

fn global_virial(sys: &System) -> Voigt {
    let mut global = [0.0; 6];
    sys.comm.all_reduce_sum(&sys.virial, &mut global);
    global
}

fn virial_pressure_scalar(sys: &System, temperature: &dyn TemperatureCompute) -> f64 {
    let virial = global_virial(sys);
    let ke = temperature.dof() * sys.units.boltz * temperature.scalar();
    let inv_volume = 1.0 / sys.domain.volume();
    match sys.domain.dimension {
        3 => (ke + virial[XX] + virial[YY] + virial[ZZ]) / 3.0 * inv_volume * sys.units.nktv2p,
        _ => (ke + virial[XX] + virial[YY]) / 2.0 * inv_volume * sys.units.nktv2p,
    }
}

fn virial_pressure_vector(sys: &System, temperature: &dyn TemperatureCompute) -> Voigt {
    let virial = global_virial(sys);
    let ke = temperature.vector();
    let factor = sys.units.nktv2p / sys.domain.volume();
    let mut out = [0.0; 6];
    match sys.domain.dimension {
        3 => for k in 0..6 {
            out[k] = (ke[k] + virial[k]) * factor;
        },
        _ => for &k in &[XX, YY, XY] {
            out[k] = (ke[k] + virial[k]) * factor;
        },
    }
    out
}

impl PressureCompute for Pressure {
    fn compute_scalar(&mut self, sys: &System, temperature: &dyn TemperatureCompute) -> FailResult<f64> {
        self.scalar = virial_pressure_scalar(sys, temperature);
        Ok(self.scalar)
    }

    fn compute_vector(&mut self, sys: &System, temperature: &dyn TemperatureCompute) -> FailResult<Voigt> {
        self.vector = virial_pressure_vector(sys, temperature);
        Ok(self.vector)
    }

    fn scalar(&self) -> f64 { self.scalar }
    fn vector(&self) -> Voigt { self.vector }
}

/// Virial pressure plus a volume-dependent coarse-graining correction.
///
/// The correction only enters the scalar pressure.  Without a correction
/// this behaves exactly like [`Pressure`].
#[derive(Debug, Clone, Default)]
pub struct BocsPressure {
    correction: Option<PressureCorrection>,
    scalar: f64,
    vector: Voigt,
}

impl BocsPressure {
    pub fn new() -> Self { Default::default() }

    pub fn correction(&self) -> Option<&PressureCorrection> { self.correction.as_ref() }
}

impl CgCorrection for BocsPressure {
    fn send_cg_info(&mut self, correction: PressureCorrection) {
        self.correction = Some(correction);
    }
}

impl PressureCompute for BocsPressure {
    fn compute_scalar(&mut self, sys: &System, temperature: &dyn TemperatureCompute) -> FailResult<f64> {
        let mut scalar = virial_pressure_scalar(sys, temperature);
        if let Some(correction) = &self.correction {
            scalar += correction.evaluate(sys.domain.volume())?;
        }
        self.scalar = scalar;
        Ok(scalar)
    }

    fn compute_vector(&mut self, sys: &System, temperature: &dyn TemperatureCompute) -> FailResult<Voigt> {
        self.vector = virial_pressure_vector(sys, temperature);
        Ok(self.vector)
    }

    fn scalar(&self) -> f64 { self.scalar }
    fn vector(&self) -> Voigt { self.vector }

    fn cg_correction(&mut self) -> Option<&mut dyn CgCorrection> { Some(self) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util;

    #[test]
    fn temperature_of_known_velocities() {
        let mut sys = test_util::cubic_system(2, 1.0);
        let n = sys.atoms.len() as f64;
        for (i, v) in sys.atoms.v.iter_mut().enumerate() {
            *v = match i % 2 { 0 => [1.0, 0.0, 0.0], _ => [-1.0, 0.0, 0.0] };
        }
        let mut temp = Temperature::all();
        let t = temp.compute_scalar(&sys);
        assert_close!(temp.dof(), 3.0 * n - 3.0);
        assert_close!(t, n / (3.0 * n - 3.0));

        let tensor = temp.compute_vector(&sys);
        assert_close!(tensor[XX], n);
        assert_close!(abs=1e-14, tensor[YY], 0.0);
        assert_close!(abs=1e-14, tensor[XY], 0.0);
    }

    // two ranks holding identical halves of the system
    struct Mirrored;

    impl crate::comm::Comm for Mirrored {
        fn rank(&self) -> usize { 0 }
        fn size(&self) -> usize { 2 }

        fn all_reduce_sum(&self, local: &[f64], global: &mut [f64]) {
            for (g, l) in global.iter_mut().zip(local) {
                *g = 2.0 * l;
            }
        }

        fn migrate(&self, _: &mut crate::atoms::Atoms, _: &crate::domain::Domain) {}
    }

    #[test]
    fn temperature_reduces_over_ranks() {
        let sys = test_util::cubic_system(2, 1.0);
        let n = sys.atoms.len();
        let mut sys = sys.with_comm(Box::new(Mirrored), 2 * n);
        for (i, v) in sys.atoms.v.iter_mut().enumerate() {
            *v = match i % 2 { 0 => [1.0, 0.0, 0.0], _ => [-1.0, 0.0, 0.0] };
        }
        let n = n as f64;
        let mut temp = Temperature::all();
        let t = temp.compute_scalar(&sys);
        assert_close!(temp.dof(), 6.0 * n - 3.0);
        assert_close!(t, 2.0 * n / (6.0 * n - 3.0));
        assert_close!(temp.compute_vector(&sys)[XX], 2.0 * n);
        assert_eq!(sys.natoms, 2 * sys.atoms.len());
    }

    #[test]
    fn com_bias_round_trip() {
        let mut sys = test_util::cubic_system(2, 1.0);
        for v in &mut sys.atoms.v {
            *v = [0.5, -0.25, 2.0];
        }
        let mut temp = ComTemperature::new(GROUP_ALL);
        assert_eq!(temp.compute_scalar(&sys), 0.0);
        assert_close!(temp.vbias(), [0.5, -0.25, 2.0]);

        let mut v = sys.atoms.v[3];
        temp.remove_bias(3, &mut v);
        assert_close!(abs=1e-15, v, [0.0; 3]);
        temp.restore_bias(3, &mut v);
        assert_close!(v, sys.atoms.v[3]);
    }

    #[test]
    fn ideal_gas_pressure() {
        let mut sys = test_util::cubic_system(2, 1.0);
        test_util::thermalize(&mut sys, 1.5, 11);
        let mut temp = Temperature::all();
        let t = temp.compute_scalar(&sys);
        temp.compute_vector(&sys);

        let mut press = Pressure::new();
        let p = press.compute_scalar(&sys, &temp).unwrap();
        assert_close!(p, temp.dof() * t / 3.0 / sys.domain.volume());

        let tensor = press.compute_vector(&sys, &temp).unwrap();
        let mean = (tensor[XX] + tensor[YY] + tensor[ZZ]) / 3.0;
        assert_close!(mean, p);
    }

    #[test]
    fn bocs_pressure_adds_correction() {
        let sys = test_util::cubic_system(2, 1.0);
        let temp = Temperature::all();
        let volume = sys.domain.volume();

        let mut press = BocsPressure::new();
        let base = press.compute_scalar(&sys, &temp).unwrap();
        press.cg_correction().expect("has capability").send_cg_info(PressureCorrection::Analytic {
            vavg: volume,
            n_mol: 10,
            coeffs: vec![2.0],
        });
        // at V == vavg only the first coefficient survives
        let corrected = press.compute_scalar(&sys, &temp).unwrap();
        assert_close!(corrected - base, -2.0 * 10.0 / volume);

        assert!(Pressure::new().cg_correction().is_none());
    }
}

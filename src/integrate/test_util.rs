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

//! Small systems and force fields shared by the unit tests.

use crate::atoms::Atoms;
use crate::barostat::Barostat;
use crate::compute::{Temperature, TemperatureCompute};
use crate::domain::Domain;
use crate::fix::FixBocs;
use crate::integrator::ForceCompute;
use crate::params::Params;
use crate::system::System;
use crate::tensor::{XX, YY, ZZ, YZ, XZ, XY};
use crate::units::Units;
use crate::FailResult;

use rand::{Rng, SeedableRng, XorShiftRng};

/// `n^3` unit-mass atoms on a simple cubic lattice with the given spacing.
pub fn cubic_system(n: usize, spacing: f64) -> System {
    let mut x = vec![];
    for i in 0..n {
        for j in 0..n {
            for k in 0..n {
                let offset = 0.5 * spacing;
                x.push([
                    i as f64 * spacing + offset,
                    j as f64 * spacing + offset,
                    k as f64 * spacing + offset,
                ]);
            }
        }
    }
    let len = n as f64 * spacing;
    let domain = Domain::orthogonal([0.0; 3], [len; 3]).unwrap();
    let mass = vec![1.0; x.len()];
    let atoms = Atoms::new(x, mass).unwrap();
    System::new(domain, atoms, Units::lj(), 0.005)
}

/// [`cubic_system`] sheared by `[xy, xz, yz]`, with every atom at the same fractional position.
pub fn tilted_system(n: usize, spacing: f64, tilts: [f64; 3]) -> System {
    let mut sys = cubic_system(n, spacing);
    let len = n as f64 * spacing;
    let domain = Domain::triclinic([0.0; 3], [len; 3], tilts).unwrap();
    for x in &mut sys.atoms.x {
        *x = domain.lamda2x(sys.domain.x2lamda(*x));
    }
    sys.domain = domain;
    sys
}

/// Random velocities with zero total momentum and exactly temperature `t`.
pub fn thermalize(sys: &mut System, t: f64, seed: u32) {
    let mut rng: XorShiftRng = SeedableRng::from_seed([0x1234_5678, 0x9abc_def0, 7, seed]);
    for v in &mut sys.atoms.v {
        for k in 0..3 {
            v[k] = rng.gen_range(-1.0, 1.0);
        }
    }

    let mut com = [0.0; 3];
    for (v, m) in izip!(&sys.atoms.v, &sys.atoms.mass) {
        for k in 0..3 {
            com[k] += m * v[k];
        }
    }
    let total_mass: f64 = sys.atoms.mass.iter().sum();
    for v in &mut sys.atoms.v {
        for k in 0..3 {
            v[k] -= com[k] / total_mass;
        }
    }

    let current = Temperature::all().compute_scalar(sys);
    let factor = (t / current).sqrt();
    for v in &mut sys.atoms.v {
        for k in 0..3 {
            v[k] *= factor;
        }
    }
}

/// An isotropic barostat at rest, with unit frequencies and a 3-link chain.
pub fn iso_barostat() -> Barostat {
    let params: Params = from_json!({
        "temp": { "start": 1.0, "stop": 1.0, "damp": 1.0 },
        "pressure": { "iso": { "start": 1.0, "stop": 1.0, "damp": 1.0 } },
    });
    let domain = Domain::orthogonal([0.0; 3], [2.0; 3]).unwrap();
    let mut baro = params.validate(&domain).unwrap().barostat();
    baro.omega_mass = [1.0, 1.0, 1.0, 0.0, 0.0, 0.0];
    baro
}

/// Build a fix from JSON params for `sys`, ready to run `nsteps`.
pub fn fix_for(sys: &mut System, params: serde_json::Value, nsteps: i64) -> FixBocs {
    let params: Params = serde_json::from_value(params).unwrap();
    let params = params.validate(&sys.domain).unwrap();
    sys.begin_run(nsteps);
    FixBocs::new(params, sys).unwrap()
}

/// Kinetic plus potential energy plus the fix's extended-system energy.
pub fn conserved(fix: &FixBocs, sys: &System) -> f64 {
    let ke: f64 = izip!(&sys.atoms.v, &sys.atoms.mass)
        .map(|(v, m)| 0.5 * m * (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]))
        .sum();
    ke * sys.units.mvv2e + sys.pe + fix.compute_scalar(sys)
}

/// Purely repulsive pairs: `E = eps (1 - r/rc)^2` inside the cutoff.
///
/// Brute force over minimum images, so `rc` must be under half of every cell width.
#[derive(Debug, Copy, Clone)]
pub struct SoftSpheres {
    pub eps: f64,
    pub rc: f64,
}

impl ForceCompute for SoftSpheres {
    fn compute(&mut self, sys: &mut System, _level: usize) -> FailResult<()> {
        let domain = &sys.domain;
        let atoms = &mut sys.atoms;
        let n = atoms.len();
        for i in 0..n {
            for j in i + 1..n {
                let mut s = {
                    let si = domain.x2lamda(atoms.x[i]);
                    let sj = domain.x2lamda(atoms.x[j]);
                    [si[0] - sj[0], si[1] - sj[1], si[2] - sj[2]]
                };
                for k in 0..3 {
                    if domain.periodic[k] {
                        s[k] -= s[k].round();
                    }
                }
                let origin = domain.lamda2x([0.0; 3]);
                let d = domain.lamda2x(s);
                let d = [d[0] - origin[0], d[1] - origin[1], d[2] - origin[2]];

                let r = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
                if r >= self.rc {
                    continue;
                }
                let u = 1.0 - r / self.rc;
                sys.pe += self.eps * u * u;
                // force on i is d * fpair
                let fpair = 2.0 * self.eps * u / (self.rc * r);
                for k in 0..3 {
                    atoms.f[i][k] += d[k] * fpair;
                    atoms.f[j][k] -= d[k] * fpair;
                }
                let v = &mut sys.virial;
                v[XX] += d[0] * d[0] * fpair;
                v[YY] += d[1] * d[1] * fpair;
                v[ZZ] += d[2] * d[2] * fpair;
                v[YZ] += d[1] * d[2] * fpair;
                v[XZ] += d[0] * d[2] * fpair;
                v[XY] += d[0] * d[1] * fpair;
            }
        }
        Ok(())
    }
}

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

//! Pair potentials, evaluated by brute force over minimum images.

use crate::FailResult;
use bocs_integrate::integrator::ForceCompute;
use bocs_integrate::tensor::{XX, YY, ZZ, YZ, XZ, XY};
use bocs_integrate::{Domain, System};
use bocs_tasks_config as cfg;

/// Build the configured potential, placing it on `level` of `nlevels` rRESPA levels.
pub fn from_config(potential: &cfg::Potential, level: usize, nlevels: usize) -> FailResult<Box<dyn ForceCompute>> {
    if level >= nlevels {
        bail!("pair level {} does not exist; there are only {} levels", level, nlevels);
    }
    let inner: Box<dyn ForceCompute> = match potential {
        cfg::Potential::Zero => Box::new(Zero),
        cfg::Potential::LennardJones(lj) => Box::new(LennardJones::new(lj)?),
    };
    Ok(match nlevels {
        1 => inner,
        _ => Box::new(OnLevel { inner, level, nlevels }),
    })
}

/// No interactions.
#[derive(Debug, Copy, Clone, Default)]
pub struct Zero;

impl ForceCompute for Zero {
    fn compute(&mut self, _: &mut System, _: usize) -> FailResult<()> { Ok(()) }
}

/// Restricts a single-level force field to one rRESPA level.
pub struct OnLevel {
    inner: Box<dyn ForceCompute>,
    level: usize,
    nlevels: usize,
}

impl ForceCompute for OnLevel {
    fn levels(&self) -> usize { self.nlevels }

    fn compute(&mut self, sys: &mut System, level: usize) -> FailResult<()> {
        match level == self.level {
            true => self.inner.compute(sys, 0),
            false => Ok(()),
        }
    }
}

/// 12-6 Lennard-Jones, optionally shifted to zero at the cutoff.
#[derive(Debug, Copy, Clone)]
pub struct LennardJones {
    epsilon: f64,
    sigma: f64,
    cutoff: f64,
    offset: f64,
}

impl LennardJones {
    pub fn new(settings: &cfg::LennardJones) -> FailResult<LennardJones> {
        let cfg::LennardJones { epsilon, sigma, cutoff, shift } = *settings;
        if !(sigma > 0.0 && cutoff > 0.0) {
            bail!("lj: sigma and cutoff must be positive (got {}, {})", sigma, cutoff);
        }
        let mut lj = LennardJones { epsilon, sigma, cutoff, offset: 0.0 };
        if shift {
            lj.offset = lj.unshifted(cutoff * cutoff).0;
        }
        Ok(lj)
    }

    // energy and (force / r) at squared distance rsq
    fn unshifted(&self, rsq: f64) -> (f64, f64) {
        let sr2 = self.sigma * self.sigma / rsq;
        let sr6 = sr2 * sr2 * sr2;
        let energy = 4.0 * self.epsilon * (sr6 * sr6 - sr6);
        let fpair = 24.0 * self.epsilon * (2.0 * sr6 * sr6 - sr6) / rsq;
        (energy, fpair)
    }
}

/// Distance between opposite faces of the cell, along each axis.
fn face_spacings(domain: &Domain) -> [f64; 3] {
    let h = &domain.h;
    let volume = h[XX] * h[YY] * h[ZZ];
    // |b x c| and |c x a| for a = (lx,0,0), b = (xy,ly,0), c = (xz,yz,lz)
    let bc = {
        let (x, y, z) = (h[YY] * h[ZZ], -h[XY] * h[ZZ], h[XY] * h[YZ] - h[YY] * h[XZ]);
        (x * x + y * y + z * z).sqrt()
    };
    let ca = h[XX] * (h[ZZ] * h[ZZ] + h[YZ] * h[YZ]).sqrt();
    [volume / bc, volume / ca, h[ZZ]]
}

impl ForceCompute for LennardJones {
    fn compute(&mut self, sys: &mut System, _level: usize) -> FailResult<()> {
        let domain = &sys.domain;
        let spacings = face_spacings(domain);
        for k in 0..3 {
            if domain.periodic[k] && !(2.0 * self.cutoff < spacings[k]) {
                bail!(
                    "lj: cutoff {} is too long for a cell only {} across; minimum images would be ambiguous",
                    self.cutoff, spacings[k],
                );
            }
        }

        let cutsq = self.cutoff * self.cutoff;
        let lamda: Vec<_> = sys.atoms.x.iter().map(|&x| domain.x2lamda(x)).collect();
        let origin = domain.lamda2x([0.0; 3]);
        let atoms = &mut sys.atoms;
        for i in 0..lamda.len() {
            for j in i + 1..lamda.len() {
                let mut s = [
                    lamda[i][0] - lamda[j][0],
                    lamda[i][1] - lamda[j][1],
                    lamda[i][2] - lamda[j][2],
                ];
                for k in 0..3 {
                    if domain.periodic[k] {
                        s[k] -= s[k].round();
                    }
                }
                let d = domain.lamda2x(s);
                let d = [d[0] - origin[0], d[1] - origin[1], d[2] - origin[2]];

                let rsq = d[0] * d[0] + d[1] * d[1] + d[2] * d[2];
                if rsq >= cutsq {
                    continue;
                }
                let (energy, fpair) = self.unshifted(rsq);
                sys.pe += energy - self.offset;
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

#[cfg(test)]
mod tests {
    use super::*;
    use bocs_integrate::{Atoms, Units};

    fn lj_settings(shift: bool) -> cfg::LennardJones {
        cfg::LennardJones { epsilon: 1.0, sigma: 1.0, cutoff: 2.5, shift }
    }

    fn pair(r: f64, domain: Domain) -> System {
        let atoms = Atoms::new(vec![[1.0, 1.0, 1.0], [1.0 + r, 1.0, 1.0]], vec![1.0; 2]).unwrap();
        System::new(domain, atoms, Units::lj(), 0.005)
    }

    #[test]
    fn pair_at_the_minimum() {
        let rmin = 2f64.powf(1.0 / 6.0);
        let mut sys = pair(rmin, Domain::orthogonal([0.0; 3], [6.0; 3]).unwrap());
        let mut lj = LennardJones::new(&lj_settings(false)).unwrap();
        lj.compute(&mut sys, 0).unwrap();
        assert_close!(sys.pe, -1.0);
        assert_close!(abs=1e-12, sys.atoms.f[0][0], 0.0);
        assert_close!(abs=1e-12, sys.virial[XX], 0.0);
    }

    #[test]
    fn forces_are_minus_the_gradient() {
        let domain = Domain::triclinic([0.0; 3], [6.0, 6.5, 7.0], [0.5, -0.3, 0.2]).unwrap();
        let mut lj = LennardJones::new(&lj_settings(true)).unwrap();
        let energy = |r: f64, lj: &mut LennardJones| {
            let mut sys = pair(r, domain.clone());
            lj.compute(&mut sys, 0).unwrap();
            sys
        };

        let r = 1.3;
        let h = 1e-6;
        let sys = energy(r, &mut lj);
        let numeric = -(energy(r + h, &mut lj).pe - energy(r - h, &mut lj).pe) / (2.0 * h);
        assert_close!(rel=1e-6, sys.atoms.f[1][0], numeric);
        assert_close!(rel=1e-12, sys.atoms.f[0][0], -sys.atoms.f[1][0]);
        // virial of a pair along x is r * f
        assert_close!(rel=1e-12, sys.virial[XX], -r * sys.atoms.f[0][0]);
    }

    #[test]
    fn shifted_energy_vanishes_at_the_cutoff() {
        let lj = LennardJones::new(&lj_settings(true)).unwrap();
        let (e, _) = lj.unshifted(2.5 * 2.5);
        assert_eq!(e, lj.offset);
    }

    #[test]
    fn pairs_interact_across_the_boundary() {
        let domain = Domain::orthogonal([0.0; 3], [6.0; 3]).unwrap();
        let atoms = Atoms::new(vec![[0.2, 1.0, 1.0], [5.8, 1.0, 1.0]], vec![1.0; 2]).unwrap();
        let mut sys = System::new(domain, atoms, Units::lj(), 0.005);
        LennardJones::new(&lj_settings(false)).unwrap().compute(&mut sys, 0).unwrap();
        // 0.4 apart through the boundary: strongly repulsive, pushing atom 0 in +x
        assert!(sys.atoms.f[0][0] > 0.0);
        assert!(sys.pe > 0.0);
    }

    #[test]
    fn cutoff_must_fit_in_the_cell() {
        let mut sys = pair(1.0, Domain::orthogonal([0.0; 3], [4.0; 3]).unwrap());
        assert!(LennardJones::new(&lj_settings(false)).unwrap().compute(&mut sys, 0).is_err());
    }

    #[test]
    fn on_level_only_computes_its_level() {
        let settings = cfg::Potential::LennardJones(lj_settings(false));
        let mut forces = from_config(&settings, 1, 2).unwrap();
        assert_eq!(forces.levels(), 2);

        let mut sys = pair(1.1, Domain::orthogonal([0.0; 3], [6.0; 3]).unwrap());
        forces.compute(&mut sys, 0).unwrap();
        assert_eq!(sys.pe, 0.0);
        forces.compute(&mut sys, 1).unwrap();
        assert!(sys.pe != 0.0);

        assert!(from_config(&settings, 2, 2).is_err());
    }
}

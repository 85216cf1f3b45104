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

//! The timestep loop around [`FixBocs`] for a single timestep size.
//!
//! See [`crate::respa`] for the multiple-timestep variant.

use crate::fix::FixBocs;
use crate::system::System;
use crate::FailResult;

/// A force field, possibly split across rRESPA levels.
pub trait ForceCompute {
    /// Number of rRESPA levels the force field is split across.
    fn levels(&self) -> usize { 1 }

    /// Add the forces belonging to `level` into `sys.atoms.f`, their virial
    /// into `sys.virial` and their energy into `sys.pe`.
    ///
    /// The caller clears these beforehand as appropriate.
    fn compute(&mut self, sys: &mut System, level: usize) -> FailResult<()>;
}

/// Forces from every level at once.
pub(crate) fn compute_all_levels(forces: &mut dyn ForceCompute, sys: &mut System) -> FailResult<()> {
    sys.clear_forces();
    for level in 0..forces.levels() {
        forces.compute(sys, level)?;
    }
    Ok(())
}

/// Velocity Verlet.
#[derive(Debug, Copy, Clone, Default)]
pub struct Verlet;

impl Verlet {
    pub fn new() -> Self { Verlet }

    /// Initial forces, then the fix's own setup.  Call once per run, after `System::begin_run`.
    pub fn setup(&mut self, fix: &mut FixBocs, sys: &mut System, forces: &mut dyn ForceCompute) -> FailResult<()> {
        fix.init(sys);
        sys.pbc();
        compute_all_levels(forces, sys)?;
        fix.setup(sys)
    }

    /// Advance one timestep.
    ///
    /// `reneighbor` marks steps on which atoms are rewrapped and migrated
    /// (and the cell may be flipped).
    pub fn step(
        &mut self,
        fix: &mut FixBocs,
        sys: &mut System,
        forces: &mut dyn ForceCompute,
        reneighbor: bool,
    ) -> FailResult<()> {
        sys.ntimestep += 1;
        fix.initial_integrate(sys)?;

        sys.reneighbored = reneighbor;
        if reneighbor {
            fix.pre_exchange(sys);
            sys.pbc();
        }

        compute_all_levels(forces, sys)?;
        fix.final_integrate(sys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{KSpace, RigidDeform};
    use crate::domain::Domain;
    use crate::test_util::{self, conserved, SoftSpheres};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Calls {
        kspace: Vec<f64>,
        rigid: Vec<bool>,
    }

    struct Spy(Rc<RefCell<Calls>>);

    impl KSpace for Spy {
        fn setup(&mut self, domain: &Domain) { self.0.borrow_mut().kspace.push(domain.volume()) }
    }

    impl RigidDeform for Spy {
        fn deform(&mut self, _: &Domain, to_box: bool) { self.0.borrow_mut().rigid.push(to_box) }
    }

    #[test]
    fn collaborators_follow_the_cell() {
        let mut sys = test_util::cubic_system(3, 1.0);
        test_util::thermalize(&mut sys, 0.5, 9);
        let mut fix = test_util::fix_for(&mut sys, json!({
            "temp": { "start": 0.5, "stop": 0.5, "damp": 0.5 },
            "pressure": { "iso": { "start": 1.0, "stop": 1.0, "damp": 2.0 } },
        }), 3);
        let calls = Rc::new(RefCell::new(Calls::default()));
        fix.set_kspace(Box::new(Spy(calls.clone())));
        fix.add_rigid(Box::new(Spy(calls.clone())));

        let mut forces = SoftSpheres { eps: 1.0, rc: 1.2 };
        let mut verlet = Verlet::new();
        verlet.setup(&mut fix, &mut sys, &mut forces).unwrap();
        for _ in 0..3 {
            verlet.step(&mut fix, &mut sys, &mut forces, false).unwrap();
        }

        let calls = calls.borrow();
        // two remaps per step, each converting out of and back into the box
        assert_eq!(calls.rigid, vec![false, true].repeat(6));
        assert_eq!(calls.kspace.len(), 3);
        assert_eq!(calls.kspace.last(), Some(&sys.domain.volume()));
    }

    #[test]
    fn npt_conserves_extended_energy() {
        let mut sys = test_util::cubic_system(4, 1.0);
        test_util::thermalize(&mut sys, 0.5, 3);
        let nsteps = 400;
        let mut fix = test_util::fix_for(&mut sys, json!({
            "temp": { "start": 0.5, "stop": 0.5, "damp": 0.5 },
            "pressure": { "iso": { "start": 1.0, "stop": 1.0, "damp": 2.0 } },
        }), nsteps);
        let mut forces = SoftSpheres { eps: 1.0, rc: 1.5 };
        let mut verlet = Verlet::new();
        verlet.setup(&mut fix, &mut sys, &mut forces).unwrap();

        let start = conserved(&fix, &sys);
        let volume0 = sys.domain.volume();
        for step in 0..nsteps {
            verlet.step(&mut fix, &mut sys, &mut forces, step % 10 == 0).unwrap();
        }
        let end = conserved(&fix, &sys);

        assert!(sys.domain.volume() != volume0);
        let scale = sys.natoms as f64 * 0.5;
        assert!((end - start).abs() < 0.01 * scale, "{} -> {}", start, end);
    }

    #[test]
    fn aniso_conserves_extended_energy() {
        let mut sys = test_util::cubic_system(4, 1.0);
        test_util::thermalize(&mut sys, 0.5, 5);
        let nsteps = 300;
        let mut fix = test_util::fix_for(&mut sys, json!({
            "temp": { "start": 0.5, "stop": 0.5, "damp": 0.5 },
            "pressure": { "aniso": { "start": 0.5, "stop": 0.5, "damp": 2.0 } },
        }), nsteps);
        let mut forces = SoftSpheres { eps: 1.0, rc: 1.5 };
        let mut verlet = Verlet::new();
        verlet.setup(&mut fix, &mut sys, &mut forces).unwrap();

        let start = conserved(&fix, &sys);
        for _ in 0..nsteps {
            verlet.step(&mut fix, &mut sys, &mut forces, false).unwrap();
        }
        let end = conserved(&fix, &sys);

        let scale = sys.natoms as f64 * 0.5;
        assert!((end - start).abs() < 0.01 * scale, "{} -> {}", start, end);
    }

    fn run_tilted(params: serde_json::Value, seed: u32, nsteps: i64) -> (f64, f64, System, FixBocs) {
        let mut sys = test_util::tilted_system(4, 1.0, [0.2, 0.1, -0.1]);
        test_util::thermalize(&mut sys, 0.5, seed);
        let mut fix = test_util::fix_for(&mut sys, params, nsteps);
        let mut forces = SoftSpheres { eps: 1.0, rc: 1.5 };
        let mut verlet = Verlet::new();
        verlet.setup(&mut fix, &mut sys, &mut forces).unwrap();

        let start = conserved(&fix, &sys);
        for step in 0..nsteps {
            verlet.step(&mut fix, &mut sys, &mut forces, step % 10 == 0).unwrap();
        }
        let end = conserved(&fix, &sys);
        (start, end, sys, fix)
    }

    #[test]
    fn tri_conserves_extended_energy() {
        let (start, end, sys, fix) = run_tilted(json!({
            "temp": { "start": 0.5, "stop": 0.5, "damp": 0.5 },
            "pressure": { "tri": { "start": 0.5, "stop": 0.5, "damp": 2.0 } },
        }), 17, 300);

        // the shear components moved the tilts
        let omega_dot = fix.barostat().omega_dot;
        assert!(omega_dot[3..].iter().any(|&w| w != 0.0));
        assert!(sys.domain.xy != 0.2 && sys.domain.xz != 0.1 && sys.domain.yz != -0.1);

        let scale = sys.natoms as f64 * 0.5;
        assert!((end - start).abs() < 0.005 * scale, "{} -> {}", start, end);
    }

    #[test]
    fn deviatoric_conserves_extended_energy() {
        let (start, end, sys, fix) = run_tilted(json!({
            "temp": { "start": 0.5, "stop": 0.5, "damp": 0.5 },
            "pressure": {
                "x": { "start": 0.5, "stop": 0.5, "damp": 2.0 },
                "y": { "start": 0.8, "stop": 0.8, "damp": 2.0 },
                "z": { "start": 0.5, "stop": 0.5, "damp": 2.0 },
                "xy": { "start": 0.2, "stop": 0.2, "damp": 2.0 },
            },
        }), 19, 300);

        assert!(fix.barostat().deviatoric);
        // the strain energy is part of what is conserved
        let report = fix.report(&sys);
        assert!(report.strain_energy != 0.0);
        assert_close!(rel=1e-12, report.energy, fix.compute_scalar(&sys));

        let scale = sys.natoms as f64 * 0.5;
        assert!((end - start).abs() < 0.005 * scale, "{} -> {}", start, end);
    }
}

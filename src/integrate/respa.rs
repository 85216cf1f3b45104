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

//! rRESPA multiple-timestep integration.
//!
//! Level 0 is the innermost (fastest) level and is the only one at which
//! positions and the cell move.  The thermostat and barostat are advanced
//! once per outermost step.

use crate::fix::FixBocs;
use crate::integrator::ForceCompute;
use crate::system::System;
use crate::tensor::Voigt;
use crate::FailResult;

#[derive(Debug, Clone)]
pub struct Respa {
    /// Substeps of each level per step of the level above.  The outermost is always 1.
    loops: Vec<usize>,
    steps: Vec<f64>,

    // most recent forces, virial and energy of each level
    f_level: Vec<Vec<[f64; 3]>>,
    v_level: Vec<Voigt>,
    pe_level: Vec<f64>,
}

impl Respa {
    /// `loops[i]` is the number of level `i` steps per level `i + 1` step,
    /// so there are `loops.len() + 1` levels.  `dt` is the outermost timestep.
    pub fn new(dt: f64, loops: Vec<usize>) -> FailResult<Respa> {
        if !(dt > 0.0) {
            config_err!("rRESPA timestep must be positive, not {}", dt);
        }
        if let Some(i) = loops.iter().position(|&n| n == 0) {
            config_err!("rRESPA loop factor for level {} must be at least 1", i);
        }

        let mut loops = loops;
        loops.push(1);
        let nlevels = loops.len();

        let mut steps = vec![0.0; nlevels];
        steps[nlevels - 1] = dt;
        for i in (0..nlevels - 1).rev() {
            steps[i] = steps[i + 1] / loops[i] as f64;
        }

        Ok(Respa {
            loops, steps,
            f_level: vec![vec![]; nlevels],
            v_level: vec![[0.0; 6]; nlevels],
            pe_level: vec![0.0; nlevels],
        })
    }

    pub fn nlevels(&self) -> usize { self.loops.len() }

    /// Timestep of each level, innermost first.
    pub fn steps(&self) -> &[f64] { &self.steps }

    /// Forces at every level, then the fix's own setup.  Call once per run, after `System::begin_run`.
    pub fn setup(&mut self, fix: &mut FixBocs, sys: &mut System, forces: &mut dyn ForceCompute) -> FailResult<()> {
        if forces.levels() != self.nlevels() {
            config_err!(
                "force field is split over {} levels, but rRESPA has {}",
                forces.levels(), self.nlevels(),
            );
        }
        sys.dt = self.steps[self.nlevels() - 1];
        fix.init_respa(sys, &self.steps);
        sys.pbc();

        for level in 0..self.nlevels() {
            sys.clear_forces();
            forces.compute(sys, level)?;
            self.store_level(sys, level);
        }
        self.sum_levels(sys);

        debug!("rRESPA setup with steps {:?}", self.steps);
        fix.setup(sys)
    }

    /// Advance one outermost timestep.
    pub fn step(
        &mut self,
        fix: &mut FixBocs,
        sys: &mut System,
        forces: &mut dyn ForceCompute,
        reneighbor: bool,
    ) -> FailResult<()> {
        sys.ntimestep += 1;
        sys.reneighbored = reneighbor;
        let outer = self.nlevels() - 1;
        self.recurse(fix, sys, forces, reneighbor, outer)
    }

    fn recurse(
        &mut self,
        fix: &mut FixBocs,
        sys: &mut System,
        forces: &mut dyn ForceCompute,
        reneighbor: bool,
        level: usize,
    ) -> FailResult<()> {
        let outermost = level + 1 == self.nlevels();

        self.load_level(sys, level)?;
        for _ in 0..self.loops[level] {
            fix.initial_integrate_respa(sys, level)?;

            if level > 0 {
                self.recurse(fix, sys, forces, reneighbor, level - 1)?;
            }

            // inner levels have finished drifting the atoms and the cell
            if outermost && reneighbor {
                fix.pre_exchange(sys);
                sys.pbc();
            }

            sys.clear_forces();
            fix.pre_force_respa(sys, level);
            forces.compute(sys, level)?;
            self.store_level(sys, level);

            fix.final_integrate_respa(sys, level)?;
        }
        self.load_level(sys, level)
    }

    // Make `sys` hold the forces of one level, with the virial and energy of all of them.
    fn load_level(&self, sys: &mut System, level: usize) -> FailResult<()> {
        let f = &self.f_level[level];
        if f.len() != sys.atoms.len() {
            config_err!(
                "rRESPA level {} holds forces for {} atoms, but there are {}; \
                 atom migration is not supported between rRESPA levels",
                level, f.len(), sys.atoms.len(),
            );
        }
        sys.atoms.f.copy_from_slice(f);
        self.sum_energies(sys);
        Ok(())
    }

    // Record what was just computed for one level, leaving the totals in `sys`.
    fn store_level(&mut self, sys: &mut System, level: usize) {
        self.f_level[level].clear();
        self.f_level[level].extend_from_slice(&sys.atoms.f);
        self.v_level[level] = sys.virial;
        self.pe_level[level] = sys.pe;
        self.sum_energies(sys);
    }

    fn sum_energies(&self, sys: &mut System) {
        sys.virial = [0.0; 6];
        for v in &self.v_level {
            for k in 0..6 {
                sys.virial[k] += v[k];
            }
        }
        sys.pe = self.pe_level.iter().sum();
    }

    fn sum_levels(&self, sys: &mut System) {
        for f in &mut sys.atoms.f {
            *f = [0.0; 3];
        }
        for level_f in &self.f_level {
            for (f, g) in sys.atoms.f.iter_mut().zip(level_f) {
                for k in 0..3 {
                    f[k] += g[k];
                }
            }
        }
        self.sum_energies(sys);
    }
}

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

use crate::atoms::Atoms;
use crate::comm::{Comm, SingleProcess};
use crate::domain::Domain;
use crate::tensor::Voigt;
use crate::units::Units;

/// Everything the integrator reads or writes that it does not own.
///
/// One of these lives on each rank.  `atoms` holds only the local atoms,
/// while `natoms` is the global count.
pub struct System {
    pub domain: Domain,
    pub atoms: Atoms,
    pub units: Units,
    pub comm: Box<dyn Comm>,
    pub natoms: usize,

    pub dt: f64,
    pub ntimestep: i64,
    /// First and last step of the current run.
    pub beginstep: i64,
    pub endstep: i64,

    /// This rank's contribution to the force-field virial, `Σ r ⊗ f` in energy units.
    pub virial: Voigt,
    /// This rank's contribution to the potential energy.
    pub pe: f64,
    /// Set on steps where atoms were rewrapped and migrated.
    pub reneighbored: bool,
}

impl System {
    pub fn new(domain: Domain, atoms: Atoms, units: Units, dt: f64) -> System {
        let natoms = atoms.len();
        System {
            domain, atoms, units, dt, natoms,
            comm: Box::new(SingleProcess),
            ntimestep: 0,
            beginstep: 0,
            endstep: 0,
            virial: [0.0; 6],
            pe: 0.0,
            reneighbored: false,
        }
    }

    /// Replace the communicator.  `natoms` must be the total over all ranks.
    pub fn with_comm(mut self, comm: Box<dyn Comm>, natoms: usize) -> System {
        self.comm = comm;
        self.natoms = natoms;
        self
    }

    /// Declare the step range of a run starting at the current step.
    pub fn begin_run(&mut self, nsteps: i64) {
        self.beginstep = self.ntimestep;
        self.endstep = self.ntimestep + nsteps;
    }

    /// Wrap every local atom back into the cell.
    pub fn pbc(&mut self) {
        let domain = &self.domain;
        for (x, image) in self.atoms.x.iter_mut().zip(&mut self.atoms.image) {
            domain.remap(x, image);
        }
    }

    pub fn clear_forces(&mut self) {
        for f in &mut self.atoms.f {
            *f = [0.0; 3];
        }
        self.virial = [0.0; 6];
        self.pe = 0.0;
    }
}

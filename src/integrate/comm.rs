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

//! The reduction boundary between the integrator and the rest of the world.
//!
//! # MPI
//!
//! Every method here is collective: it must be called on every rank, in the
//! same order, with buffers of the same length.  Everything the integrator
//! derives from the reduced values is then bit-identical across ranks, which
//! is what keeps the replicated chain variables in sync.

use crate::atoms::Atoms;
use crate::domain::Domain;

pub trait Comm {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Element-wise sum of `local` over all ranks, written to `global` on every rank.
    fn all_reduce_sum(&self, local: &[f64], global: &mut [f64]);

    /// Hand atoms that now belong to another rank's subdomain to that rank.
    ///
    /// Called after the cell changed shape discontinuously (a tilt flip).
    /// Positions are already wrapped into the global cell.
    fn migrate(&self, atoms: &mut Atoms, domain: &Domain);

    fn sum_scalar(&self, local: f64) -> f64 {
        let mut out = [0.0];
        self.all_reduce_sum(&[local], &mut out);
        out[0]
    }

    fn is_root(&self) -> bool { self.rank() == 0 }
}

/// A single rank that owns the whole system.
#[derive(Debug, Copy, Clone, Default)]
pub struct SingleProcess;

impl Comm for SingleProcess {
    fn rank(&self) -> usize { 0 }

    fn size(&self) -> usize { 1 }

    fn all_reduce_sum(&self, local: &[f64], global: &mut [f64]) {
        global.copy_from_slice(local);
    }

    fn migrate(&self, _: &mut Atoms, _: &Domain) {}
}

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

//! Moving the cell.
//!
//! The cell follows `dH/dt = Ω̇ H` for upper-triangular `H` and `Ω̇`.  Atoms
//! (and rigid bodies) are carried along in fractional coordinates.  Tilts
//! that wander past half a cell length are reduced separately, by whole
//! lattice vectors, before reneighboring.

use crate::barostat::PressureStyle;
use crate::domain::Domain;
use crate::fix::FixBocs;
use crate::params::Dilate;
use crate::system::System;
use crate::tensor::{Voigt, XX, YY, ZZ, YZ, XZ, XY};
use crate::{ErrorKind, FailResult};

/// Largest tilt, as a fraction of the corresponding cell length, that a single cell update may produce.
const TILT_MAX: f64 = 1.5;

/// A tilt is flipped once it passes `(0.5 + DELTA_FLIP)` cell lengths.
const DELTA_FLIP: f64 = 0.1;

impl FixBocs {
    /// Advance the cell by `dto` and carry the atoms along.
    pub(crate) fn remap(&mut self, sys: &mut System) -> FailResult<()> {
        let dto = self.dto;
        for i in 0..6 {
            self.baro.omega[i] += dto * self.baro.omega_dot[i];
        }

        let groupbit = self.groupbit;
        let dilate = self.dilate;
        let follows_cell = |mask: u32| dilate == Dilate::All || mask & groupbit != 0;

        {
            let System { domain, atoms, .. } = &mut *sys;
            for (x, &mask) in atoms.x.iter_mut().zip(&atoms.mask) {
                if follows_cell(mask) {
                    *x = domain.x2lamda(*x);
                }
            }
        }
        for rigid in &mut self.rigid {
            rigid.deform(&sys.domain, false);
        }

        self.deform_cell(&mut sys.domain)?;

        {
            let System { domain, atoms, .. } = &mut *sys;
            for (x, &mask) in atoms.x.iter_mut().zip(&atoms.mask) {
                if follows_cell(mask) {
                    *x = domain.lamda2x(*x);
                }
            }
        }
        for rigid in &mut self.rigid {
            rigid.deform(&sys.domain, true);
        }
        Ok(())
    }

    /// Update the bounds and tilts of the cell by one `dto`.
    ///
    /// Shear is applied in two halves around the diagonal, in an order that keeps
    /// the whole update time-reversible.
    pub(crate) fn deform_cell(&self, domain: &mut Domain) -> FailResult<()> {
        let dto = self.dto;
        let omega_dot = &self.baro.omega_dot;
        let p_flag = &self.baro.p_flag;
        let triclinic = self.baro.pstyle == PressureStyle::Triclinic;

        // the diagonal of h stays at its old values until set_global_box
        let mut h = domain.h;

        if triclinic {
            shear_half_step(&mut h, omega_dot, p_flag, dto);
        }

        for k in 0..3 {
            if !p_flag[k] {
                continue;
            }
            let expfac = (dto * omega_dot[k]).exp();
            let fixed = self.fixedpoint[k];
            domain.boxlo[k] = (domain.boxlo[k] - fixed) * expfac + fixed;
            domain.boxhi[k] = (domain.boxhi[k] - fixed) * expfac + fixed;

            match k {
                1 => if self.scalexy {
                    h[XY] *= expfac;
                },
                2 => {
                    if self.scalexz {
                        h[XZ] *= expfac;
                    }
                    if self.scaleyz {
                        h[YZ] *= expfac;
                    }
                },
                _ => {},
            }
        }

        if triclinic {
            shear_half_step(&mut h, omega_dot, p_flag, dto);
        }

        domain.yz = h[YZ];
        domain.xz = h[XZ];
        domain.xy = h[XY];

        let [xprd, yprd, _] = domain.prd();
        if domain.yz.abs() > TILT_MAX * yprd
            || domain.xz.abs() > TILT_MAX * xprd
            || domain.xy.abs() > TILT_MAX * xprd
        {
            throw!(ErrorKind::GeometryInvalid(format!(
                "the barostat tilted the cell too far in one step (xy = {}, xz = {}, yz = {}); \
                 the cell is too far from equilibrium for this timestep",
                domain.xy, domain.xz, domain.yz,
            )));
        }

        domain.set_global_box();
        Ok(())
    }

    /// Reduce overgrown tilts by whole lattice vectors, then rewrap and migrate the atoms.
    ///
    /// Call before atoms are exchanged between ranks.  Does nothing for cells that cannot tilt.
    pub fn pre_exchange(&mut self, sys: &mut System) {
        if !self.pre_exchange_flag {
            return;
        }
        let flips = match flip_tilts(&mut sys.domain) {
            Some(flips) => flips,
            None => return,
        };
        debug!(
            "bocs: flipped cell at step {} (xy, xz, yz flips {:?}); tilts now {} {} {}",
            sys.ntimestep, flips, sys.domain.xy, sys.domain.xz, sys.domain.yz,
        );

        let System { domain, atoms, comm, .. } = &mut *sys;
        for image in &mut atoms.image {
            domain.image_flip(image, flips);
        }
        for (x, image) in atoms.x.iter_mut().zip(&mut atoms.image) {
            domain.remap(x, image);
        }
        comm.migrate(atoms, domain);
    }
}

// Ordering: xz, yz, xy, xz, each with exponential factors on both sides.
fn shear_half_step(h: &mut Voigt, omega_dot: &Voigt, p_flag: &[bool; 6], dto: f64) {
    let dto2 = dto / 2.0;
    let dto4 = dto / 4.0;

    if p_flag[XZ] {
        xz_quarter_step(h, omega_dot, dto);
    }
    if p_flag[YZ] {
        let expfac = (dto4 * omega_dot[YY]).exp();
        h[YZ] *= expfac;
        h[YZ] += dto2 * (omega_dot[YZ] * h[ZZ]);
        h[YZ] *= expfac;
    }
    if p_flag[XY] {
        let expfac = (dto4 * omega_dot[XX]).exp();
        h[XY] *= expfac;
        h[XY] += dto2 * (omega_dot[XY] * h[YY]);
        h[XY] *= expfac;
    }
    if p_flag[XZ] {
        xz_quarter_step(h, omega_dot, dto);
    }
}

fn xz_quarter_step(h: &mut Voigt, omega_dot: &Voigt, dto: f64) {
    let expfac = (dto / 8.0 * omega_dot[XX]).exp();
    h[XZ] *= expfac;
    h[XZ] += dto / 4.0 * (omega_dot[XY] * h[YZ] + omega_dot[XZ] * h[ZZ]);
    h[XZ] *= expfac;
}

/// Shift any tilt beyond `±(0.5 + DELTA_FLIP)` cell lengths back by one lattice vector.
///
/// Returns the `[xy, xz, yz]` flip directions, or `None` if nothing changed.
/// A `yz` flip also shifts `xz` by `xy`.
pub fn flip_tilts(domain: &mut Domain) -> Option<[i32; 3]> {
    let [xprd, yprd, _] = domain.prd();
    let xtiltmax = (0.5 + DELTA_FLIP) * xprd;
    let ytiltmax = (0.5 + DELTA_FLIP) * yprd;

    let (mut flip_xy, mut flip_xz, mut flip_yz) = (0, 0, 0);

    if domain.periodic[1] {
        if domain.yz < -ytiltmax {
            domain.yz += yprd;
            domain.xz += domain.xy;
            flip_yz = 1;
        } else if domain.yz >= ytiltmax {
            domain.yz -= yprd;
            domain.xz -= domain.xy;
            flip_yz = -1;
        }
    }

    if domain.periodic[0] {
        if domain.xz < -xtiltmax {
            domain.xz += xprd;
            flip_xz = 1;
        } else if domain.xz >= xtiltmax {
            domain.xz -= xprd;
            flip_xz = -1;
        }
        if domain.xy < -xtiltmax {
            domain.xy += xprd;
            flip_xy = 1;
        } else if domain.xy >= xtiltmax {
            domain.xy -= xprd;
            flip_xy = -1;
        }
    }

    match (flip_xy, flip_xz, flip_yz) {
        (0, 0, 0) => None,
        _ => {
            domain.set_global_box();
            Some([flip_xy, flip_xz, flip_yz])
        },
    }
}

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

use crate::tensor::{Voigt, XX, YY, ZZ, YZ, XZ, XY};
use crate::{ErrorKind, FailResult};

/// The global simulation cell.
///
/// The cell is described LAMMPS-style by `boxlo`, `boxhi` and three tilt
/// factors.  `h` and `h_inv` are derived quantities and are only brought up
/// to date by [`Domain::set_global_box`]; code that edits `boxlo`/`boxhi` or
/// the tilts directly must call it before converting coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    pub dimension: usize,
    pub periodic: [bool; 3],
    pub triclinic: bool,
    pub boxlo: [f64; 3],
    pub boxhi: [f64; 3],
    pub xy: f64,
    pub xz: f64,
    pub yz: f64,

    /// `[lx, ly, lz, yz, xz, xy]`
    pub h: Voigt,
    pub h_inv: Voigt,
}

impl Domain {
    /// An orthogonal, fully periodic 3D box.
    pub fn orthogonal(boxlo: [f64; 3], boxhi: [f64; 3]) -> FailResult<Domain> {
        Domain::new(3, [true; 3], false, boxlo, boxhi, [0.0; 3])
    }

    /// A fully periodic 3D box that is allowed to tilt.
    ///
    /// `tilts` is `[xy, xz, yz]`.
    pub fn triclinic(boxlo: [f64; 3], boxhi: [f64; 3], tilts: [f64; 3]) -> FailResult<Domain> {
        Domain::new(3, [true; 3], true, boxlo, boxhi, tilts)
    }

    pub fn new(
        dimension: usize,
        periodic: [bool; 3],
        triclinic: bool,
        boxlo: [f64; 3],
        boxhi: [f64; 3],
        [xy, xz, yz]: [f64; 3],
    ) -> FailResult<Domain> {
        if dimension != 2 && dimension != 3 {
            throw!(ErrorKind::InvalidArgument(format!("dimension must be 2 or 3, not {}", dimension)));
        }
        for k in 0..3 {
            if !(boxhi[k] > boxlo[k]) {
                throw!(ErrorKind::GeometryInvalid(format!(
                    "box bounds along axis {} are inverted or empty: {} .. {}", k, boxlo[k], boxhi[k],
                )));
            }
        }
        if !triclinic && (xy != 0.0 || xz != 0.0 || yz != 0.0) {
            throw!(ErrorKind::GeometryInvalid("an orthogonal box cannot have tilt factors".into()));
        }
        if dimension == 2 && (xz != 0.0 || yz != 0.0) {
            throw!(ErrorKind::GeometryInvalid("a 2d box cannot tilt out of plane".into()));
        }

        let mut domain = Domain {
            dimension, periodic, triclinic, boxlo, boxhi, xy, xz, yz,
            h: [0.0; 6],
            h_inv: [0.0; 6],
        };
        domain.set_global_box();
        Ok(domain)
    }

    /// Recompute `h` and `h_inv` from the bounds and tilts.
    pub fn set_global_box(&mut self) {
        let h = &mut self.h;
        h[XX] = self.boxhi[0] - self.boxlo[0];
        h[YY] = self.boxhi[1] - self.boxlo[1];
        h[ZZ] = self.boxhi[2] - self.boxlo[2];
        h[YZ] = self.yz;
        h[XZ] = self.xz;
        h[XY] = self.xy;

        let hi = &mut self.h_inv;
        hi[XX] = 1.0 / h[XX];
        hi[YY] = 1.0 / h[YY];
        hi[ZZ] = 1.0 / h[ZZ];
        hi[YZ] = -h[YZ] / (h[YY] * h[ZZ]);
        hi[XZ] = (h[YZ] * h[XY] - h[YY] * h[XZ]) / (h[XX] * h[YY] * h[ZZ]);
        hi[XY] = -h[XY] / (h[XX] * h[YY]);
    }

    pub fn prd(&self) -> [f64; 3] { [self.h[XX], self.h[YY], self.h[ZZ]] }

    /// Volume (or area, in 2D).
    pub fn volume(&self) -> f64 {
        match self.dimension {
            3 => self.h[XX] * self.h[YY] * self.h[ZZ],
            _ => self.h[XX] * self.h[YY],
        }
    }

    pub fn center(&self) -> [f64; 3] {
        let mut out = [0.0; 3];
        for k in 0..3 {
            out[k] = 0.5 * (self.boxlo[k] + self.boxhi[k]);
        }
        out
    }

    pub fn x2lamda(&self, x: [f64; 3]) -> [f64; 3] {
        let hi = &self.h_inv;
        let d = [x[0] - self.boxlo[0], x[1] - self.boxlo[1], x[2] - self.boxlo[2]];
        [
            hi[XX] * d[0] + hi[XY] * d[1] + hi[XZ] * d[2],
            hi[YY] * d[1] + hi[YZ] * d[2],
            hi[ZZ] * d[2],
        ]
    }

    pub fn lamda2x(&self, s: [f64; 3]) -> [f64; 3] {
        let h = &self.h;
        [
            h[XX] * s[0] + h[XY] * s[1] + h[XZ] * s[2] + self.boxlo[0],
            h[YY] * s[1] + h[YZ] * s[2] + self.boxlo[1],
            h[ZZ] * s[2] + self.boxlo[2],
        ]
    }

    /// Wrap a position back into the primary cell along periodic
    /// dimensions, updating its image flags to match.
    pub fn remap(&self, x: &mut [f64; 3], image: &mut [i32; 3]) {
        let mut s = self.x2lamda(*x);
        for k in 0..self.dimension {
            if !self.periodic[k] {
                continue;
            }
            let shift = s[k].floor();
            if shift != 0.0 {
                s[k] -= shift;
                // guard against s == 1.0 after round-off
                if s[k] >= 1.0 {
                    s[k] -= 1.0;
                    image[k] += 1;
                }
                image[k] += shift as i32;
            }
        }
        *x = self.lamda2x(s);
    }

    /// Rewrite image flags after the tilts were flipped by whole lattice vectors,
    /// so that unwrapped coordinates are unchanged.
    ///
    /// Each flip is `+1`, `-1` or `0` for the direction the tilt was shifted.
    pub fn image_flip(&self, image: &mut [i32; 3], [flip_xy, flip_xz, flip_yz]: [i32; 3]) {
        let [mut xbox, mut ybox, zbox] = *image;
        ybox -= flip_yz * zbox;
        xbox -= flip_xy * ybox + flip_xz * zbox;
        *image = [xbox, ybox, zbox];
    }

    /// The unwrapped position implied by a wrapped position and its image flags.
    pub fn unmap(&self, x: [f64; 3], image: [i32; 3]) -> [f64; 3] {
        let h = &self.h;
        let [ix, iy, iz] = [image[0] as f64, image[1] as f64, image[2] as f64];
        [
            x[0] + h[XX] * ix + h[XY] * iy + h[XZ] * iz,
            x[1] + h[YY] * iy + h[YZ] * iz,
            x[2] + h[ZZ] * iz,
        ]
    }
}

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

//! Six-component tensors and the 3x3 matrices they stand for.
//!
//! Everything uses Voigt order `xx, yy, zz, yz, xz, xy`.  This is also the
//! order of the cell vector `h = [lx, ly, lz, yz, xz, xy]`, whose matrix is
//! upper triangular:
//!
//! ```text
//! [ 0 5 4 ]
//! [ - 1 3 ]
//! [ - - 2 ]
//! ```

pub type Voigt = [f64; 6];
pub type M33 = [[f64; 3]; 3];

pub const XX: usize = 0;
pub const YY: usize = 1;
pub const ZZ: usize = 2;
pub const YZ: usize = 3;
pub const XZ: usize = 4;
pub const XY: usize = 5;

/// The upper-triangular matrix of a cell vector (or its inverse).
pub fn upper_triangular(h: &Voigt) -> M33 {
    [
        [h[XX], h[XY], h[XZ]],
        [  0.0, h[YY], h[YZ]],
        [  0.0,   0.0, h[ZZ]],
    ]
}

/// The full matrix of a symmetric tensor.
pub fn symmetric(p: &Voigt) -> M33 {
    [
        [p[XX], p[XY], p[XZ]],
        [p[XY], p[YY], p[YZ]],
        [p[XZ], p[YZ], p[ZZ]],
    ]
}

/// Read back the upper triangle of a (symmetric) matrix in Voigt order.
pub fn upper_voigt(m: &M33) -> Voigt {
    [m[0][0], m[1][1], m[2][2], m[1][2], m[0][2], m[0][1]]
}

pub fn transpose(m: &M33) -> M33 {
    let mut out = [[0.0; 3]; 3];
    for r in 0..3 {
        for c in 0..3 {
            out[c][r] = m[r][c];
        }
    }
    out
}

pub fn mat_mul(a: &M33, b: &M33) -> M33 {
    let mut out = [[0.0; 3]; 3];
    for r in 0..3 {
        for c in 0..3 {
            out[r][c] = (0..3).map(|k| a[r][k] * b[k][c]).sum();
        }
    }
    out
}

/// `a * b * a^T`
pub fn congruence(a: &M33, b: &M33) -> M33
{ mat_mul(&mat_mul(a, b), &transpose(a)) }

pub fn trace(m: &M33) -> f64
{ m[0][0] + m[1][1] + m[2][2] }

pub fn all_finite(xs: &[f64]) -> bool
{ xs.iter().all(|x| x.is_finite()) }

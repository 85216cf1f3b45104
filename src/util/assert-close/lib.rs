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

//! Approximate equality for the floating point data that shows up in the integrator:
//! scalars, Voigt tensors, chain variables and per-atom arrays.

#[macro_use]
extern crate failure;

use std::fmt;

pub const DEFAULT_NONZERO_TOL: f64 = 1e-9;

/// `assert_close!([rel=TOL,] [abs=TOL,] a, b [, fmt...])`
///
/// Defaults to `rel=1e-9, abs=0`.  Works on anything implementing [`CheckClose`].
#[macro_export]
macro_rules! assert_close {
    ($($t:tt)*) => {
        $crate::__assert_close_impl!{@parse [$($t)*] [$crate::DEFAULT_NONZERO_TOL] [0.0]}
    };
}

#[macro_export]
macro_rules! debug_assert_close {
    ($($t:tt)*) => {{
        #[cfg(debug_assertions)] {
            $crate::assert_close!{$($t)*}
        }
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __assert_close_impl {
    (@parse [rel=$tol:expr, $($rest:tt)*] [$rel:expr] [$abs:expr]) => {
        $crate::__assert_close_impl!{@parse [$($rest)*] [$tol] [$abs]}
    };
    (@parse [abs=$tol:expr, $($rest:tt)*] [$rel:expr] [$abs:expr]) => {
        $crate::__assert_close_impl!{@parse [$($rest)*] [$rel] [$tol]}
    };
    (@parse [$a:expr, $b:expr $(,)*] [$rel:expr] [$abs:expr]) => {
        $crate::__assert_close_impl!{@check [$a, $b] [$rel] [$abs] ["not nearly equal!"]}
    };
    (@parse [$a:expr, $b:expr, $($fmt:tt)+] [$rel:expr] [$abs:expr]) => {
        $crate::__assert_close_impl!{@check [$a, $b] [$rel] [$abs] [$($fmt)+]}
    };
    (@check [$a:expr, $b:expr] [$rel:expr] [$abs:expr] [$($fmt:tt)+]) => {{
        let a = $a;
        let b = $b;
        let tol = $crate::Tolerances { rel: $rel, abs: $abs };
        if let Err(e) = $crate::CheckClose::check_close(&a, &b, tol) {
            panic!(
                "{} (tolerances: rel={}, abs={})\n left: {:?}\nright: {:?}\n{}",
                format!($($fmt)+), tol.rel, tol.abs, a, b, e,
            );
        }
    }};
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Tolerances {
    pub rel: f64,
    pub abs: f64,
}

/// The python `math.isclose` criterion.
pub fn is_close(a: f64, b: f64, Tolerances { rel, abs }: Tolerances) -> bool {
    assert!(rel >= 0.0);
    assert!(abs >= 0.0);

    // also catches infinities of the same sign
    if a == b { return true; }
    if a.is_infinite() || b.is_infinite() { return false; }

    // NaN falls through to false here
    (a - b).abs() <= abs.max(rel * a.abs()).max(rel * b.abs())
}

/// The first mismatching pair of scalars, along with where it was found.
#[derive(Debug, Fail)]
pub struct CheckCloseError {
    /// Indices from the outermost container inward.
    pub path: Vec<usize>,
    pub values: (f64, f64),
    pub tol: Tolerances,
}

impl CheckCloseError {
    fn at(mut self, index: usize) -> Self {
        self.path.insert(0, index);
        self
    }
}

impl fmt::Display for CheckCloseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (left, right) = self.values;
        write!(f, "first mismatch at ")?;
        match self.path.len() {
            0 => write!(f, "(scalar)")?,
            _ => for i in &self.path { write!(f, "[{}]", i)?; },
        }
        write!(f, ": {:e} vs {:e} (diff {:e})", left, right, left - right)
    }
}

pub trait CheckClose<Rhs: ?Sized = Self> {
    fn check_close(&self, other: &Rhs, tol: Tolerances) -> Result<(), CheckCloseError>;
}

impl CheckClose for f64 {
    fn check_close(&self, other: &f64, tol: Tolerances) -> Result<(), CheckCloseError> {
        match is_close(*self, *other, tol) {
            true => Ok(()),
            false => Err(CheckCloseError { path: vec![], values: (*self, *other), tol }),
        }
    }
}

impl<'a, A: ?Sized + CheckClose<B>, B: ?Sized> CheckClose<&'a B> for &'a A {
    fn check_close(&self, other: &&'a B, tol: Tolerances) -> Result<(), CheckCloseError> {
        (**self).check_close(*other, tol)
    }
}

impl<T: CheckClose> CheckClose for [T] {
    fn check_close(&self, other: &[T], tol: Tolerances) -> Result<(), CheckCloseError> {
        assert_eq!(self.len(), other.len(), "length mismatch in check_close");
        for (i, (a, b)) in self.iter().zip(other).enumerate() {
            a.check_close(b, tol).map_err(|e| e.at(i))?;
        }
        Ok(())
    }
}

impl<T: CheckClose, const N: usize> CheckClose for [T; N] {
    fn check_close(&self, other: &[T; N], tol: Tolerances) -> Result<(), CheckCloseError> {
        self[..].check_close(&other[..], tol)
    }
}

impl<T: CheckClose> CheckClose for Vec<T> {
    fn check_close(&self, other: &Vec<T>, tol: Tolerances) -> Result<(), CheckCloseError> {
        self[..].check_close(&other[..], tol)
    }
}

impl<T: CheckClose> CheckClose<[T]> for Vec<T> {
    fn check_close(&self, other: &[T], tol: Tolerances) -> Result<(), CheckCloseError> {
        self[..].check_close(other, tol)
    }
}

impl<T: CheckClose> CheckClose<Vec<T>> for [T] {
    fn check_close(&self, other: &Vec<T>, tol: Tolerances) -> Result<(), CheckCloseError> {
        self.check_close(&other[..], tol)
    }
}

#[cfg(test)]
#[deny(unused)]
mod tests {
    #[test]
    fn macro_forms() {
        assert_close!(1.0, 1.0);
        assert_close!(abs=1e-8, 1.0, 1.0 + 1e-9);
        assert_close!(rel=1e-8, abs=1e-8, 1.0, 1.0,);
        assert_close!(rel=1e-3, vec![1.0, 2.0], vec![1.0, 2.0005], "{}", "vecs");
        assert_close!([[1.0, 2.0]; 3], [[1.0, 2.0]; 3]);
    }

    #[test]
    #[should_panic(expected = "[1][0]")]
    fn reports_nested_path() {
        assert_close!(abs=0.0, rel=0.0, vec![[1.0], [2.0]], vec![[1.0], [2.5]]);
    }

    #[test]
    fn nan_is_never_close() {
        let tol = super::Tolerances { rel: 1.0, abs: 1.0 };
        assert!(!super::is_close(::std::f64::NAN, ::std::f64::NAN, tol));
        assert!(super::is_close(::std::f64::INFINITY, ::std::f64::INFINITY, tol));
        assert!(!super::is_close(::std::f64::INFINITY, -::std::f64::INFINITY, tol));
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic)]
    fn debug_not_close() {
        debug_assert_close!(abs=0.0, rel=0.0, 1.0, 1.1);
    }
}

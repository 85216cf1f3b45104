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

use crate::{ErrorKind, FailResult};

/// Bit of the group that every atom belongs to.
pub const GROUP_ALL: u32 = 1;

/// The atoms owned by this process.
///
/// This is a plain struct-of-arrays.  All arrays have the same length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Atoms {
    pub x: Vec<[f64; 3]>,
    pub v: Vec<[f64; 3]>,
    pub f: Vec<[f64; 3]>,
    pub mass: Vec<f64>,
    /// Group membership bits.
    pub mask: Vec<u32>,
    pub image: Vec<[i32; 3]>,
}

impl Atoms {
    /// Atoms at rest in the `all` group.
    pub fn new(x: Vec<[f64; 3]>, mass: Vec<f64>) -> FailResult<Atoms> {
        if x.len() != mass.len() {
            throw!(ErrorKind::InvalidArgument(format!(
                "got {} positions but {} masses", x.len(), mass.len(),
            )));
        }
        if let Some(m) = mass.iter().find(|&&m| !(m > 0.0)) {
            throw!(ErrorKind::InvalidArgument(format!("non-positive atom mass: {}", m)));
        }
        let n = x.len();
        Ok(Atoms {
            x,
            mass,
            v: vec![[0.0; 3]; n],
            f: vec![[0.0; 3]; n],
            mask: vec![GROUP_ALL; n],
            image: vec![[0; 3]; n],
        })
    }

    pub fn with_velocities(mut self, v: Vec<[f64; 3]>) -> Self {
        assert_eq!(v.len(), self.len());
        self.v = v;
        self
    }

    pub fn len(&self) -> usize { self.x.len() }
    pub fn is_empty(&self) -> bool { self.x.is_empty() }

    /// Indices of local atoms whose mask shares a bit with `groupbit`.
    pub fn in_group(&self, groupbit: u32) -> impl Iterator<Item=usize> + '_ {
        self.mask.iter().enumerate()
            .filter(move |&(_, &mask)| mask & groupbit != 0)
            .map(|(i, _)| i)
    }
}

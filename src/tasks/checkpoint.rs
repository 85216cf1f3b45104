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

//! The atoms and cell at the end of a run, as JSON.
//!
//! The integrator's own state goes in a separate binary restart fragment
//! (see `bocs_integrate::restart`); the two together are enough to continue.

use crate::FailResult;
use bocs_integrate::{Atoms, Domain, System};

use slice_of_array::prelude::*;
use std::io::Write;
use std::path::Path;

pub const DUMP_FILE: &str = "final.json";
pub const RESTART_FILE: &str = "restart.bin";

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Checkpoint {
    pub step: i64,
    pub dimension: usize,
    pub periodic: [bool; 3],
    pub triclinic: bool,
    pub boxlo: [f64; 3],
    pub boxhi: [f64; 3],
    /// `[xy, xz, yz]`
    pub tilt: [f64; 3],

    pub mass: Vec<f64>,
    pub mask: Vec<u32>,
    /// Flattened `[x, y, z]` per atom.
    pub positions: Vec<f64>,
    pub velocities: Vec<f64>,
    pub images: Vec<i32>,
}

impl Checkpoint {
    pub fn from_system(sys: &System) -> Checkpoint {
        let d = &sys.domain;
        let a = &sys.atoms;
        Checkpoint {
            step: sys.ntimestep,
            dimension: d.dimension,
            periodic: d.periodic,
            triclinic: d.triclinic,
            boxlo: d.boxlo,
            boxhi: d.boxhi,
            tilt: [d.xy, d.xz, d.yz],
            mass: a.mass.clone(),
            mask: a.mask.clone(),
            positions: a.x.flat().to_vec(),
            velocities: a.v.flat().to_vec(),
            images: a.image.flat().to_vec(),
        }
    }

    pub fn domain(&self) -> FailResult<Domain> {
        Domain::new(self.dimension, self.periodic, self.triclinic, self.boxlo, self.boxhi, self.tilt)
    }

    pub fn atoms(&self) -> FailResult<Atoms> {
        let n = self.mass.len();
        for &(name, len) in &[
            ("positions", self.positions.len()),
            ("velocities", self.velocities.len()),
            ("images", self.images.len()),
        ] {
            if len != 3 * n {
                bail!("checkpoint has {} masses but {} values in '{}'", n, len, name);
            }
        }
        if self.mask.len() != n {
            bail!("checkpoint has {} masses but {} group masks", n, self.mask.len());
        }

        let mut atoms = Atoms::new(self.positions.nest().to_vec(), self.mass.clone())?
            .with_velocities(self.velocities.nest().to_vec());
        atoms.image = self.images.nest().to_vec();
        atoms.mask = self.mask.clone();
        Ok(atoms)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> FailResult<()> {
        let mut file = bocs_fs_util::create_buffered(path)?;
        serde_json::to_writer(&mut file, self)?;
        file.flush()?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> FailResult<Checkpoint> {
        let file = bocs_fs_util::open_text(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bocs_integrate::Units;

    fn system() -> System {
        let domain = Domain::triclinic([0.0, -1.0, 0.0], [3.0, 2.0, 4.0], [0.5, 0.25, -0.125]).unwrap();
        let atoms = Atoms::new(vec![[0.5, 0.5, 0.5], [1.5, 0.25, 2.0]], vec![1.0, 3.0]).unwrap()
            .with_velocities(vec![[0.1, 0.2, 0.3], [-0.3, 0.0, 0.1]]);
        let mut sys = System::new(domain, atoms, Units::lj(), 0.005);
        sys.atoms.image[1] = [1, -2, 0];
        sys.atoms.mask[0] = 3;
        sys.ntimestep = 1234;
        sys
    }

    #[test]
    fn restores_atoms_and_cell() {
        let sys = system();
        let dir = tempdir::TempDir::new("bocs-checkpoint").unwrap();
        let path = dir.path().join(DUMP_FILE);
        Checkpoint::from_system(&sys).save(&path).unwrap();

        let checkpoint = Checkpoint::load(&path).unwrap();
        assert_eq!(checkpoint.step, 1234);
        assert_eq!(checkpoint.domain().unwrap(), sys.domain);
        assert_eq!(checkpoint.atoms().unwrap(), sys.atoms);
    }

    #[test]
    fn inconsistent_lengths() {
        let mut checkpoint = Checkpoint::from_system(&system());
        checkpoint.velocities.pop();
        assert!(checkpoint.atoms().is_err());
    }
}

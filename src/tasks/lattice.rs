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

//! Initial configurations.

use crate::FailResult;
use bocs_integrate::compute::{Temperature, TemperatureCompute};
use bocs_integrate::{Atoms, Domain, System, Units};
use bocs_tasks_config as cfg;

use rand::{Rng, SeedableRng, XorShiftRng};

fn basis(kind: cfg::LatticeKind) -> &'static [[f64; 3]] {
    match kind {
        cfg::LatticeKind::Sc => &[[0.0, 0.0, 0.0]],
        cfg::LatticeKind::Bcc => &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]],
        cfg::LatticeKind::Fcc => &[
            [0.0, 0.0, 0.0],
            [0.0, 0.5, 0.5],
            [0.5, 0.0, 0.5],
            [0.5, 0.5, 0.0],
        ],
    }
}

/// The cell, filled with a block of conventional cells.  Atoms start at rest.
pub fn build(lattice: &cfg::Lattice) -> FailResult<(Domain, Atoms)> {
    let cfg::Lattice { kind, constant, cells, mass, tilt } = *lattice;
    if !(constant > 0.0) {
        bail!("lattice constant must be positive, not {}", constant);
    }
    if cells.iter().any(|&n| n == 0) {
        bail!("lattice needs at least one cell along each axis, got {:?}", cells);
    }

    let boxhi = [
        cells[0] as f64 * constant,
        cells[1] as f64 * constant,
        cells[2] as f64 * constant,
    ];
    let domain = Domain::new(3, [true; 3], tilt.is_some(), [0.0; 3], boxhi, tilt.unwrap_or([0.0; 3]))?;

    let mut x = vec![];
    for (i, j, k) in iproduct!(0..cells[0], 0..cells[1], 0..cells[2]) {
        for b in basis(kind) {
            // a quarter-cell offset keeps every site off the cell faces
            let frac = [
                (i as f64 + b[0] + 0.25) / cells[0] as f64,
                (j as f64 + b[1] + 0.25) / cells[1] as f64,
                (k as f64 + b[2] + 0.25) / cells[2] as f64,
            ];
            x.push(domain.lamda2x(frac));
        }
    }
    let n = x.len();
    let atoms = Atoms::new(x, vec![mass; n])?;
    Ok((domain, atoms))
}

pub fn system(lattice: &cfg::Lattice, units: Units, dt: f64) -> FailResult<System> {
    let (domain, atoms) = build(lattice)?;
    info!("built {} atoms in a {:?} cell", atoms.len(), domain.prd());
    Ok(System::new(domain, atoms, units, dt))
}

/// Uniformly random velocities with no net momentum, scaled to exactly `temperature`.
pub fn thermalize(sys: &mut System, velocities: &cfg::Velocities) -> FailResult<()> {
    let cfg::Velocities { temperature, seed } = *velocities;
    if !(temperature > 0.0) {
        bail!("initial temperature must be positive, not {}", temperature);
    }

    let mut rng: XorShiftRng = SeedableRng::from_seed([0x193a_6754, 0xa8a7_d469, 0x9783_0e05, seed | 1]);
    for v in &mut sys.atoms.v {
        *v = [rng.gen_range(-0.5, 0.5), rng.gen_range(-0.5, 0.5), rng.gen_range(-0.5, 0.5)];
    }

    let mut momentum = [0.0; 3];
    for (v, &m) in izip!(&sys.atoms.v, &sys.atoms.mass) {
        for k in 0..3 {
            momentum[k] += m * v[k];
        }
    }
    let total_mass: f64 = sys.atoms.mass.iter().sum();
    for v in &mut sys.atoms.v {
        for k in 0..3 {
            v[k] -= momentum[k] / total_mass;
        }
    }

    let current = Temperature::all().compute_scalar(sys);
    let factor = (temperature / current).sqrt();
    for v in &mut sys.atoms.v {
        for k in 0..3 {
            v[k] *= factor;
        }
    }
    debug!("velocities rescaled by {} to T = {}", factor, temperature);
    Ok(())
}

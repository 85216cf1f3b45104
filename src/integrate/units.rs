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

/// Conversion constants, named the way LAMMPS names them.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Copy, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Units {
    /// Boltzmann constant (energy / temperature).
    pub boltz: f64,
    /// Converts (energy / volume) to pressure.
    pub nktv2p: f64,
    /// Converts (force / mass * time) to velocity.
    pub ftm2v: f64,
    /// Converts (mass * velocity^2) to energy.
    pub mvv2e: f64,
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum UnitStyle {
    Lj,
    /// kcal/mol, Angstrom, fs, atm
    Real,
    /// eV, Angstrom, ps, bar
    Metal,
}

impl Units {
    pub fn from_style(style: UnitStyle) -> Units {
        match style {
            UnitStyle::Lj => Units { boltz: 1.0, nktv2p: 1.0, ftm2v: 1.0, mvv2e: 1.0 },
            UnitStyle::Real => Units {
                boltz: 0.0019872067,
                nktv2p: 68568.415,
                ftm2v: 1.0 / 48.88821291 / 48.88821291,
                mvv2e: 48.88821291 * 48.88821291,
            },
            UnitStyle::Metal => Units {
                boltz: 8.617343e-5,
                nktv2p: 1.6021765e6,
                ftm2v: 1.0 / 1.0364269e-4,
                mvv2e: 1.0364269e-4,
            },
        }
    }

    pub fn lj() -> Units { Units::from_style(UnitStyle::Lj) }
}

impl Default for Units {
    fn default() -> Self { Units::lj() }
}

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

#![allow(non_snake_case)]

// Crate where serde_yaml code for the 'tasks' crate is monomorphized.
//
// The functions here also make use of serde_ignored to catch typos in the config.

// NOTE: Please make sure to use the YamlRead trait!
//       DO NOT USE serde_yaml::from_{reader,value,etc.} OUTSIDE THIS CRATE.

#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate log;

use bocs_integrate::units::UnitStyle;
use bocs_integrate::Params;
use std::io::Read;

/// Provides an alternative to serde_yaml::from_reader where all of the
/// expensive codegen has already been performed in this crate.
pub trait YamlRead: for<'de> serde::Deserialize<'de> {
    fn from_reader(mut r: impl Read) -> Result<Self, serde_yaml::Error>
    { YamlRead::from_dyn_reader(&mut r) }

    fn from_dyn_reader(r: &mut dyn Read) -> Result<Self, serde_yaml::Error> {
        // serde_ignored needs a Deserializer, and serde_yaml only gives us one for Value.
        Self::from_value(value_from_dyn_reader(r)?)
    }

    fn from_value(value: serde_yaml::Value) -> Result<Self, serde_yaml::Error>;
}

macro_rules! derive_yaml_read {
    ($Type:ty) => {
        impl YamlRead for $Type {
            // NOTE: a default fn on the trait makes codegen lazy, hence the macro.
            fn from_value(value: serde_yaml::Value) -> Result<$Type, serde_yaml::Error> {
                serde_ignored::deserialize(
                    value,
                    |path| warn!("Unused config item (possible typo?): {}", path),
                )
            }
        }
    };
}

derive_yaml_read!{serde_yaml::Value}

fn value_from_dyn_reader(r: &mut dyn Read) -> Result<serde_yaml::Value, serde_yaml::Error>
{ serde_yaml::from_reader(r) }

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    #[serde(default = "_settings__units")]
    pub units: UnitStyle,

    pub lattice: Lattice,

    pub potential: Potential,

    #[serde(default)]
    pub velocities: Option<Velocities>,

    pub integrator: Integrator,

    pub run: Run,
}
derive_yaml_read!{Settings}

fn _settings__units() -> UnitStyle { UnitStyle::Lj }

#[derive(Serialize, Deserialize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LatticeKind { Sc, Bcc, Fcc }

/// A block of conventional cells filling a periodic box.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Lattice {
    pub kind: LatticeKind,

    /// Edge of the conventional cell.
    pub constant: f64,

    /// Conventional cells along each axis.
    pub cells: [usize; 3],

    #[serde(default = "_lattice__mass")]
    pub mass: f64,

    /// `[xy, xz, yz]`, in distance units.  Giving this makes the box triclinic.
    #[serde(default)]
    pub tilt: Option<[f64; 3]>,
}
fn _lattice__mass() -> f64 { 1.0 }

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum Potential {
    /// No interactions at all.  The barostat then sees only the kinetic pressure.
    Zero,
    #[serde(rename = "lj")]
    LennardJones(LennardJones),
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct LennardJones {
    #[serde(default = "_lennard_jones__epsilon")]
    pub epsilon: f64,
    #[serde(default = "_lennard_jones__sigma")]
    pub sigma: f64,
    pub cutoff: f64,
    /// Shift the energy to zero at the cutoff.
    #[serde(default = "_lennard_jones__shift")]
    pub shift: bool,
}
fn _lennard_jones__epsilon() -> f64 { 1.0 }
fn _lennard_jones__sigma() -> f64 { 1.0 }
fn _lennard_jones__shift() -> bool { true }

/// Initial velocities.  When absent, atoms start at rest.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Velocities {
    pub temperature: f64,
    #[serde(default = "_velocities__seed")]
    pub seed: u32,
}
fn _velocities__seed() -> u32 { 12345 }

/// Integrator settings, either as a mapping or as a line of input-deck keywords.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Integrator {
    Keywords(String),
    Params(Params),
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Run {
    pub steps: i64,
    pub dt: f64,

    /// Steps between thermo lines.  Zero prints only the first and last.
    #[serde(default = "_run__thermo")]
    pub thermo: i64,

    /// Steps between rewrapping atoms into the cell (and flipping tilts).
    #[serde(default = "_run__reneighbor")]
    pub reneighbor: i64,

    /// Use rRESPA instead of velocity Verlet.
    #[serde(default)]
    pub respa: Option<Respa>,
}
fn _run__thermo() -> i64 { 100 }
fn _run__reneighbor() -> i64 { 10 }

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Respa {
    /// Substeps of each level per step of the level above, innermost first.
    pub loops: Vec<usize>,

    /// Level on which the pair forces are computed.  Defaults to the outermost.
    #[serde(default)]
    pub pair_level: Option<usize>,
}

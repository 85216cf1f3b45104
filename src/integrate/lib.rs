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

//! Nose-Hoover chain NPT integration with optional BOCS volume corrections.
//!
//! The entry point is [`FixBocs`], which is driven through the usual
//! `setup` / `initial_integrate` / `pre_exchange` / `final_integrate` cycle
//! by whatever owns the timestep loop.  Everything the fix needs from the rest
//! of the simulation (forces, temperatures, pressures, communication) is
//! reached through the traits in [`compute`] and [`comm`].

#![allow(clippy::needless_range_loop)]

#[macro_use] extern crate failure;
#[macro_use] extern crate serde_derive;
#[macro_use] extern crate log;
#[macro_use] extern crate itertools;
#[cfg(test)] #[macro_use] extern crate bocs_assert_close;
#[cfg(test)] #[macro_use] extern crate serde_json;

// like `bail!`, but keeps the concrete `Fail` type so that it can be downcast
macro_rules! throw {
    ($e:expr) => {
        return Err(::std::convert::Into::into($e))
    };
}

#[cfg(test)]
macro_rules! from_json {
    ($($arg:tt)*) => { ::serde_json::from_value(json!($($arg)*)).unwrap() };
}

pub use crate::errors::{ErrorKind, FailResult};
#[macro_use]
mod errors;

pub mod tensor;
pub mod units;
pub mod domain;
pub mod atoms;
pub mod system;
pub mod comm;
pub mod compute;

pub mod spline;
pub mod correction;
pub mod schedule;
pub mod chain;
pub mod barostat;

pub mod params;
pub mod keywords;
pub mod integrator;
pub mod respa;
mod fix;
mod remap;
pub mod restart;

pub use crate::atoms::Atoms;
pub use crate::comm::{Comm, SingleProcess};
pub use crate::domain::Domain;
pub use crate::fix::{FixBocs, Report};
pub use crate::params::{Params, ValidatedParams};
pub use crate::system::System;
pub use crate::units::Units;

#[cfg(test)]
pub(crate) mod test_util;

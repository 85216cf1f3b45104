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

//! Whole NPT runs, from a settings file to a directory of outputs.

#[macro_use] extern crate failure;
#[macro_use] extern crate serde_derive;
#[macro_use] extern crate log;
#[macro_use] extern crate itertools;
#[cfg(test)] #[macro_use] extern crate bocs_assert_close;

pub type FailResult<T> = Result<T, failure::Error>;

pub mod logging;
pub mod lattice;
pub mod potential;
pub mod checkpoint;
pub mod simulation;
pub mod entry_points;

pub use bocs_tasks_config::Settings;
pub use crate::checkpoint::Checkpoint;
pub use crate::simulation::Simulation;

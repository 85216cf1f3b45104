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

//! Umbrella crate over the workspace.
//!
//! The integrator itself is [`integrate`]; [`tasks`] drives whole runs from a
//! settings file.

pub use bocs_integrate as integrate;
pub use bocs_tasks as tasks;
pub use bocs_tasks_config as config;

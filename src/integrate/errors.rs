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

pub type FailResult<T> = Result<T, failure::Error>;

/// Every error raised by this crate is one of these.
///
/// None of them are recoverable in the sense of retrying the same timestep;
/// callers are expected to stop the run.  Use `failure::Error::downcast_ref`
/// to tell them apart.
#[derive(Debug, Clone, PartialEq, Fail)]
pub enum ErrorKind {
    /// Missing or contradictory settings.  Raised during construction/setup.
    #[fail(display = "invalid integrator settings: {}", _0)]
    Configuration(String),

    /// Non-finite pressure, volume outside a tabulated correction, etc.
    #[fail(display = "simulation unstable: {}", _0)]
    NumericalInstability(String),

    /// The cell was deformed further in one step than the timestep permits.
    #[fail(display = "invalid cell geometry: {}", _0)]
    GeometryInvalid(String),

    #[fail(display = "I/O error: {}", _0)]
    Io(String),

    /// An unrecognized keyword or selector value.
    #[fail(display = "invalid argument: {}", _0)]
    InvalidArgument(String),
}

impl From<bocs_fs_util::FsError> for ErrorKind {
    fn from(e: bocs_fs_util::FsError) -> Self { ErrorKind::Io(e.to_string()) }
}

impl From<std::io::Error> for ErrorKind {
    fn from(e: std::io::Error) -> Self { ErrorKind::Io(e.to_string()) }
}

macro_rules! config_err {
    ($($arg:tt)+) => { throw!($crate::ErrorKind::Configuration(format!($($arg)+))) };
}

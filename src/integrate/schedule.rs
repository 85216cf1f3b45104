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

/// How far `current` is through the run, as a fraction.
///
/// Not clamped; steps past `end` extrapolate.
/// A run of zero length is always at its start.
pub fn fraction(current: i64, begin: i64, end: i64) -> f64 {
    match end == begin {
        true => 0.0,
        false => (current - begin) as f64 / (end - begin) as f64,
    }
}

/// Linear interpolation of a target from `start` to `stop` over the run.
pub fn ramp(current: i64, begin: i64, end: i64, start: f64, stop: f64) -> f64 {
    start + fraction(current, begin, end) * (stop - start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_ramp() {
        assert_eq!(ramp(0, 0, 100, 300.0, 600.0), 300.0);
        assert_eq!(ramp(50, 0, 100, 300.0, 600.0), 450.0);
        assert_eq!(ramp(100, 0, 100, 300.0, 600.0), 600.0);
        assert_eq!(ramp(200, 0, 100, 300.0, 600.0), 900.0);
    }

    #[test]
    fn empty_run() {
        assert_eq!(ramp(7, 7, 7, 1.0, 2.0), 1.0);
        assert_eq!(ramp(9, 7, 7, 1.0, 2.0), 1.0);
    }
}

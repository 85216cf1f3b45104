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

//! byte-tools from crates.io, extended with `f64` slices and `i32` scalars.
//!
//! Like the functions they wrap, these panic if the byte slice is not
//! exactly the right length.

extern crate byte_tools;
pub use byte_tools::*;

// TODO missing: big endian

pub fn read_f64v_le(dst: &mut [f64], src: &[u8]) {
    let mut u64s = vec![0u64; dst.len()];

    read_u64v_le(&mut u64s, src);

    for (f, i) in dst.iter_mut().zip(u64s) {
        *f = f64::from_bits(i);
    }
}

pub fn write_f64v_le(dst: &mut [u8], src: &[f64]) {
    let u64s: Vec<u64> = src.iter().map(|f| f.to_bits()).collect();

    write_u64v_le(dst, &u64s);
}

pub fn read_i32_le(src: &[u8]) -> i32 { read_u32_le(src) as i32 }

pub fn write_i32_le(dst: &mut [u8], n: i32) { write_u32_le(dst, n as u32) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_are_stored_by_bits() {
        let values = [1.0, -0.0, std::f64::consts::PI, std::f64::INFINITY, 1e-310];
        let mut bytes = vec![0u8; 8 * values.len()];
        write_f64v_le(&mut bytes, &values);
        assert_eq!(&bytes[..8], &[0, 0, 0, 0, 0, 0, 0xf0, 0x3f]);
        assert_eq!(&bytes[8..16], &[0, 0, 0, 0, 0, 0, 0, 0x80]);

        let mut back = [0.0; 5];
        read_f64v_le(&mut back, &bytes);
        for (a, b) in values.iter().zip(&back) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn signed_words() {
        let mut bytes = [0u8; 4];
        write_i32_le(&mut bytes, -2);
        assert_eq!(bytes, [0xfe, 0xff, 0xff, 0xff]);
        assert_eq!(read_i32_le(&bytes), -2);

        write_i32_le(&mut bytes, 296);
        assert_eq!(bytes, [0x28, 0x01, 0, 0]);
        assert_eq!(read_i32_le(&bytes), 296);
    }
}

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

//! Restart fragments.
//!
//! A fragment is an `i32` byte count followed by that many bytes of `f64`s,
//! all little-endian:
//!
//! ```text
//! tstat_flag
//!   mtchain  eta[mtchain]  eta_dot[mtchain]
//! pstat_flag
//!   omega[6]  omega_dot[6]  vol0  t0  mpchain
//!     etap[mpchain]  etap_dot[mpchain]
//!   deviatoric_flag
//!     h0_inv[6]
//! ```
//!
//! Both flags are always set by this integrator, but a reader honors them.

use crate::comm::Comm;
use crate::fix::FixBocs;
use crate::{ErrorKind, FailResult};

use bocs_byte_tools_plus_float as byte_tools;
use std::io::{Read, Write};

const HEADER_SIZE: usize = 4;
const F64_SIZE: usize = 8;

impl FixBocs {
    /// Number of doubles in the fragment.
    pub fn size_restart(&self) -> usize {
        let mut nsize = 2;
        nsize += 1 + 2 * self.chain.len();
        nsize += 16 + 2 * self.baro.chain.len();
        if self.baro.deviatoric {
            nsize += 6;
        }
        nsize
    }

    pub fn pack_restart(&self) -> Vec<f64> {
        let mtchain = self.chain.len();
        let mpchain = self.baro.chain.len();
        let baro = &self.baro;

        let mut list = Vec::with_capacity(self.size_restart());
        list.push(1.0);
        list.push(mtchain as f64);
        list.extend_from_slice(&self.chain.eta);
        list.extend_from_slice(&self.chain.eta_dot[..mtchain]);

        list.push(1.0);
        list.extend_from_slice(&baro.omega);
        list.extend_from_slice(&baro.omega_dot);
        list.push(baro.vol0);
        list.push(baro.t0);
        list.push(mpchain as f64);
        list.extend_from_slice(&baro.chain.eta);
        list.extend_from_slice(&baro.chain.eta_dot[..mpchain]);
        list.push(bool_to_f64(baro.deviatoric));
        if baro.deviatoric {
            list.extend_from_slice(&baro.h0_inv);
        }
        list
    }

    /// Restore state from a fragment.
    ///
    /// A chain whose stored length differs from this integrator's is skipped,
    /// leaving that chain at rest.
    pub fn unpack_restart(&mut self, list: &[f64]) -> FailResult<()> {
        let mut r = Reader { list, pos: 0 };

        if r.flag()? {
            let m = r.count()?;
            match m == self.chain.len() {
                true => {
                    self.chain.eta.copy_from_slice(r.take(m)?);
                    self.chain.eta_dot[..m].copy_from_slice(r.take(m)?);
                },
                false => {
                    warn!("restart has a thermostat chain of {} links, not {}; ignoring it", m, self.chain.len());
                    r.skip_chain(m)?;
                },
            }
        }

        if r.flag()? {
            let baro = &mut self.baro;
            baro.omega.copy_from_slice(r.take(6)?);
            baro.omega_dot.copy_from_slice(r.take(6)?);
            baro.vol0 = r.next()?;
            baro.t0 = r.next()?;

            let m = r.count()?;
            match m == baro.chain.len() {
                true => {
                    baro.chain.eta.copy_from_slice(r.take(m)?);
                    baro.chain.eta_dot[..m].copy_from_slice(r.take(m)?);
                },
                false => {
                    warn!("restart has a barostat chain of {} links, not {}; ignoring it", m, baro.chain.len());
                    r.skip_chain(m)?;
                },
            }

            if r.flag()? {
                baro.h0_inv.copy_from_slice(r.take(6)?);
            }
        }
        debug!("bocs: read {} restart values", r.pos);
        Ok(())
    }

    /// Write the framed fragment.  Only the root rank writes anything.
    pub fn write_restart<W: Write>(&self, comm: &dyn Comm, mut w: W) -> FailResult<()> {
        if !comm.is_root() {
            return Ok(());
        }
        let bytes = encode(&self.pack_restart());
        w.write_all(&bytes).map_err(ErrorKind::from)?;
        Ok(())
    }

    /// Read a framed fragment written by [`FixBocs::write_restart`].
    pub fn read_restart<R: Read>(&mut self, r: R) -> FailResult<()> {
        let list = read_fragment(r)?;
        self.unpack_restart(&list)
    }
}

fn bool_to_f64(b: bool) -> f64 {
    match b { true => 1.0, false => 0.0 }
}

struct Reader<'a> {
    list: &'a [f64],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> FailResult<&'a [f64]> {
        let end = match self.pos.checked_add(n) {
            Some(end) if end <= self.list.len() => end,
            _ => throw!(ErrorKind::Io(format!(
                "restart data ends after {} values, but {} more were expected after the first {}",
                self.list.len(), n, self.pos,
            ))),
        };
        let out = &self.list[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    // the eta and eta_dot of a chain of length m
    fn skip_chain(&mut self, m: usize) -> FailResult<()> {
        match m.checked_mul(2) {
            Some(n) => self.take(n).map(|_| ()),
            None => throw!(ErrorKind::Io(format!("restart data has an invalid chain length: {}", m))),
        }
    }

    fn remaining(&self) -> usize { self.list.len() - self.pos }

    fn next(&mut self) -> FailResult<f64> { Ok(self.take(1)?[0]) }

    fn flag(&mut self) -> FailResult<bool> { Ok(self.next()? != 0.0) }

    fn count(&mut self) -> FailResult<usize> {
        let x = self.next()?;
        if !(x >= 0.0 && x.fract() == 0.0 && x <= self.remaining() as f64) {
            throw!(ErrorKind::Io(format!("restart data has an invalid chain length: {}", x)));
        }
        Ok(x as usize)
    }
}

/// Frame doubles as an `i32` byte count followed by the values, little-endian.
pub fn encode(list: &[f64]) -> Vec<u8> {
    let size = list.len() * F64_SIZE;
    let mut bytes = vec![0u8; HEADER_SIZE + size];
    byte_tools::write_i32_le(&mut bytes[..HEADER_SIZE], size as i32);
    byte_tools::write_f64v_le(&mut bytes[HEADER_SIZE..], list);
    bytes
}

/// Inverse of [`encode`].  Trailing bytes after the fragment are an error.
pub fn decode(bytes: &[u8]) -> FailResult<Vec<f64>> {
    read_fragment(bytes).and_then(|list| match HEADER_SIZE + list.len() * F64_SIZE == bytes.len() {
        true => Ok(list),
        false => throw!(ErrorKind::Io(format!(
            "restart fragment of {} values is followed by {} extra bytes",
            list.len(), bytes.len() - HEADER_SIZE - list.len() * F64_SIZE,
        ))),
    })
}

fn read_fragment<R: Read>(mut r: R) -> FailResult<Vec<f64>> {
    let mut header = [0u8; HEADER_SIZE];
    r.read_exact(&mut header).map_err(ErrorKind::from)?;
    let size = byte_tools::read_i32_le(&header);
    if size < 0 || size as usize % F64_SIZE != 0 {
        throw!(ErrorKind::Io(format!("restart fragment has an invalid byte count: {}", size)));
    }

    let mut body = vec![0u8; size as usize];
    r.read_exact(&mut body).map_err(ErrorKind::from)?;

    let mut list = vec![0.0; body.len() / F64_SIZE];
    byte_tools::read_f64v_le(&mut list, &body);
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SingleProcess;
    use crate::system::System;
    use crate::test_util;
    use crate::atoms::Atoms;
    use crate::domain::Domain;

    fn params(tchain: usize, pchain: usize) -> serde_json::Value {
        json!({
            "temp": { "start": 1.0, "stop": 1.0, "damp": 1.0 },
            "pressure": {
                "x": { "start": 1.0, "stop": 2.0, "damp": 1.0 },
                "y": { "start": 1.0, "stop": 1.0, "damp": 1.0 },
                "z": { "start": 1.0, "stop": 1.0, "damp": 1.0 },
            },
            "tchain": tchain,
            "pchain": pchain,
        })
    }

    fn scrambled_fix(sys: &mut System, tchain: usize, pchain: usize) -> FixBocs {
        let mut fix = test_util::fix_for(sys, params(tchain, pchain), 10);
        fix.init(sys);
        for (i, x) in fix.chain.eta.iter_mut().enumerate() {
            *x = 0.1 * i as f64 + 1.0 / 3.0;
        }
        for (i, x) in fix.chain.eta_dot.iter_mut().take(tchain).enumerate() {
            *x = -0.7 * i as f64 + std::f64::consts::PI;
        }
        for (i, x) in fix.baro.chain.eta.iter_mut().enumerate() {
            *x = 1e-17 * i as f64 - 2.5;
        }
        for (i, x) in fix.baro.chain.eta_dot.iter_mut().take(pchain).enumerate() {
            *x = 1.0 / (i as f64 + 7.0);
        }
        fix.baro.omega = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        fix.baro.omega_dot = [1e-3, -2e-3, 3e-3, 0.0, 0.0, 0.0];
        fix.baro.t0 = 1.25;
        fix.baro.h0_inv[0] = 0.123_456_789;
        fix
    }

    #[test]
    fn round_trip_is_bit_for_bit() {
        let mut sys = test_util::cubic_system(2, 1.0);
        let fix = scrambled_fix(&mut sys, 3, 2);
        assert!(fix.baro.deviatoric);
        assert_eq!(fix.pack_restart().len(), fix.size_restart());
        assert_eq!(fix.size_restart(), 2 + 7 + 16 + 4 + 6);

        let mut bytes = vec![];
        fix.write_restart(&SingleProcess, &mut bytes).unwrap();
        assert_eq!(bytes.len(), 4 + 8 * fix.size_restart());

        let mut fresh = test_util::fix_for(&mut sys, params(3, 2), 10);
        fresh.read_restart(&bytes[..]).unwrap();

        assert_eq!(fresh.chain.eta, fix.chain.eta);
        assert_eq!(fresh.chain.eta_dot, fix.chain.eta_dot);
        assert_eq!(fresh.baro.chain.eta, fix.baro.chain.eta);
        assert_eq!(fresh.baro.chain.eta_dot, fix.baro.chain.eta_dot);
        assert_eq!(fresh.baro.omega, fix.baro.omega);
        assert_eq!(fresh.baro.omega_dot, fix.baro.omega_dot);
        assert_eq!(fresh.baro.vol0, fix.baro.vol0);
        assert_eq!(fresh.baro.t0, fix.baro.t0);
        assert_eq!(fresh.baro.h0_inv, fix.baro.h0_inv);
        assert_eq!(fresh.pack_restart(), fix.pack_restart());
    }

    #[test]
    fn mismatched_chains_are_skipped() {
        let mut sys = test_util::cubic_system(2, 1.0);
        let fix = scrambled_fix(&mut sys, 3, 2);
        let list = fix.pack_restart();

        let mut other = test_util::fix_for(&mut sys, params(4, 2), 10);
        other.unpack_restart(&list).unwrap();
        assert_eq!(other.chain.eta, vec![0.0; 4]);
        // everything after the skipped block is still read
        assert_eq!(other.baro.chain.eta, fix.baro.chain.eta);
        assert_eq!(other.baro.omega, fix.baro.omega);

        let mut other = test_util::fix_for(&mut sys, params(3, 0), 10);
        other.unpack_restart(&list).unwrap();
        assert_eq!(other.chain.eta, fix.chain.eta);
        assert_eq!(other.baro.h0_inv, fix.baro.h0_inv);
    }

    #[test]
    fn truncated_data_is_an_io_error() {
        let mut sys = test_util::cubic_system(2, 1.0);
        let fix = scrambled_fix(&mut sys, 3, 2);
        let list = fix.pack_restart();
        let bytes = encode(&list);

        let is_io = |e: failure::Error| match e.downcast_ref::<ErrorKind>() {
            Some(ErrorKind::Io(_)) => true,
            _ => false,
        };

        let mut other = test_util::fix_for(&mut sys, params(3, 2), 10);
        assert!(is_io(other.unpack_restart(&list[..list.len() - 1]).unwrap_err()));
        assert!(is_io(other.read_restart(&bytes[..bytes.len() - 3]).unwrap_err()));
        assert!(is_io(other.read_restart(&bytes[..2]).unwrap_err()));

        let mut extra = bytes.clone();
        extra.push(0);
        assert!(is_io(decode(&extra).unwrap_err()));
        assert_eq!(decode(&bytes).unwrap(), list);
    }

    #[test]
    fn corrupt_chain_lengths_are_io_errors() {
        let mut sys = test_util::cubic_system(2, 1.0);
        let mut fix = scrambled_fix(&mut sys, 3, 2);
        let is_io = |e: failure::Error| match e.downcast_ref::<ErrorKind>() {
            Some(ErrorKind::Io(_)) => true,
            _ => false,
        };

        for &bad in &[1e300, std::f64::INFINITY, 1.5, -1.0, std::f64::NAN, 1e6] {
            assert!(is_io(fix.unpack_restart(&[1.0, bad, 0.0]).unwrap_err()), "accepted {}", bad);
        }

        let mut list = fix.pack_restart();
        let mpchain_at = 2 + 2 * 3 + 1 + 12 + 2;
        assert_eq!(list[mpchain_at], 2.0);
        list[mpchain_at] = 1e300;
        assert!(is_io(fix.unpack_restart(&list).unwrap_err()));
    }

    #[test]
    fn only_root_writes() {
        struct OtherRank;
        impl Comm for OtherRank {
            fn rank(&self) -> usize { 1 }
            fn size(&self) -> usize { 2 }
            fn all_reduce_sum(&self, local: &[f64], global: &mut [f64]) { global.copy_from_slice(local) }
            fn migrate(&self, _: &mut Atoms, _: &Domain) {}
        }

        let mut sys = test_util::cubic_system(2, 1.0);
        let fix = scrambled_fix(&mut sys, 3, 2);
        let mut bytes = vec![];
        fix.write_restart(&OtherRank, &mut bytes).unwrap();
        assert!(bytes.is_empty());
    }
}

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

//! The cell degrees of freedom of the extended system.
//!
//! `omega_dot[i]` is the logarithmic strain rate of Voigt component `i`.  The
//! barostat sees the instantaneous pressure tensor (after coupling), the
//! target stress, and optionally a reference cell that turns a non-hydrostatic
//! target into a deviatoric force.

use crate::chain::{HalfStep, NoseHooverChain};
use crate::domain::Domain;
use crate::schedule;
use crate::tensor::{self, Voigt, XX, YY, ZZ};
use crate::units::Units;
use crate::{ErrorKind, FailResult};

/// Number of independent cell degrees of freedom.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PressureStyle {
    /// One strain rate shared by all barostatted normal components.
    Iso,
    /// Up to three independent normal strain rates.
    Aniso,
    /// Normal and shear strain rates.
    Triclinic,
}

/// Which normal components of the pressure are averaged before the barostat sees them.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Couple {
    None,
    Xyz,
    Xy,
    Yz,
    Xz,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Barostat {
    pub pstyle: PressureStyle,
    pub pcouple: Couple,
    pub mtk: bool,
    pub deviatoric: bool,
    /// Steps between recaptures of the reference cell.  Zero to never recapture.
    pub nreset: i64,

    pub p_start: Voigt,
    pub p_stop: Voigt,
    pub p_freq: Voigt,
    pub p_flag: [bool; 6],
    pub p_target: Voigt,
    pub p_current: Voigt,
    pub p_hydro: f64,
    pub p_freq_max: f64,
    /// Number of barostatted normal components.
    pub pdim: usize,

    pub omega: Voigt,
    pub omega_dot: Voigt,
    pub omega_mass: Voigt,
    /// The barostat's own thermostat.  May have zero links.
    pub chain: NoseHooverChain,
    pub nc_pchain: usize,
    pub pdrag_factor: f64,

    pub vol0: f64,
    /// Reference temperature for the cell masses.
    pub t0: f64,
    pub h0_inv: Voigt,
    pub sigma: Voigt,
    pub fdev: Voigt,

    pub mtk_term1: f64,
    pub mtk_term2: f64,
}

/// Snapshot of the thermal state that [`Barostat::nh_omega_dot`] needs.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Kinetic {
    pub t_current: f64,
    pub tdof: f64,
    /// Kinetic energy tensor from the temperature compute.
    pub ke_tensor: Voigt,
}

impl Barostat {
    /// Normal components and, for a triclinic barostat, shear components.
    pub fn active_components(&self) -> impl Iterator<Item=usize> + '_ {
        let ncomp = match self.pstyle { PressureStyle::Triclinic => 6, _ => 3 };
        (0..ncomp).filter(move |&i| self.p_flag[i])
    }

    /// Number of barostatted components, for the chain target.
    pub fn pdof(&self) -> usize { self.active_components().count() }

    /// Target for the first link of the barostat's thermostat.
    pub fn chain_target(&self, kt: f64) -> f64 {
        match self.pstyle {
            PressureStyle::Iso => kt,
            _ => self.pdof() as f64 * kt,
        }
    }

    /// Assign the cell masses and the barostat chain masses.
    pub fn set_masses(&mut self, kt: f64, natoms: usize) {
        for i in 0..6 {
            if self.p_freq[i] > 0.0 {
                self.omega_mass[i] = (natoms + 1) as f64 * kt / (self.p_freq[i] * self.p_freq[i]);
            }
        }
        let mass = kt / (self.p_freq_max * self.p_freq_max);
        self.chain.set_masses(mass, mass);
        self.chain.init_forces(kt);
    }

    /// Reduce the pressure compute's output to the components the barostat is coupled to.
    ///
    /// `scalar` is only used by an isotropic barostat, and `tensor` only by the others.
    pub fn couple(&mut self, scalar: f64, tensor: &Voigt) -> FailResult<()> {
        let p = &mut self.p_current;
        match (self.pstyle, self.pcouple) {
            (PressureStyle::Iso, _) => {
                p[XX] = scalar;
                p[YY] = scalar;
                p[ZZ] = scalar;
            },
            (_, Couple::Xyz) => {
                let ave = (tensor[XX] + tensor[YY] + tensor[ZZ]) / 3.0;
                p[XX] = ave;
                p[YY] = ave;
                p[ZZ] = ave;
            },
            (_, Couple::Xy) => {
                let ave = 0.5 * (tensor[XX] + tensor[YY]);
                p[XX] = ave;
                p[YY] = ave;
                p[ZZ] = tensor[ZZ];
            },
            (_, Couple::Yz) => {
                let ave = 0.5 * (tensor[YY] + tensor[ZZ]);
                p[YY] = ave;
                p[ZZ] = ave;
                p[XX] = tensor[XX];
            },
            (_, Couple::Xz) => {
                let ave = 0.5 * (tensor[XX] + tensor[ZZ]);
                p[XX] = ave;
                p[ZZ] = ave;
                p[YY] = tensor[YY];
            },
            (_, Couple::None) => {
                p[XX] = tensor[XX];
                p[YY] = tensor[YY];
                p[ZZ] = tensor[ZZ];
            },
        }
        if !tensor::all_finite(&p[..3]) {
            throw!(ErrorKind::NumericalInstability(format!("non-numeric pressure {:?}", &p[..3])));
        }

        if self.pstyle == PressureStyle::Triclinic {
            p[3..].copy_from_slice(&tensor[3..]);
            if !tensor::all_finite(&p[3..]) {
                throw!(ErrorKind::NumericalInstability(format!("non-numeric shear stress {:?}", &p[3..])));
            }
        }
        Ok(())
    }

    /// Interpolate the target stress for the current step.
    pub fn compute_press_target(&mut self, ntimestep: i64, beginstep: i64, endstep: i64, domain: &Domain) {
        self.p_hydro = 0.0;
        for i in 0..3 {
            if self.p_flag[i] {
                self.p_target[i] = schedule::ramp(ntimestep, beginstep, endstep, self.p_start[i], self.p_stop[i]);
                self.p_hydro += self.p_target[i];
            }
        }
        if self.pdim > 0 {
            self.p_hydro /= self.pdim as f64;
        }

        if self.pstyle == PressureStyle::Triclinic {
            for i in 3..6 {
                self.p_target[i] = schedule::ramp(ntimestep, beginstep, endstep, self.p_start[i], self.p_stop[i]);
            }
        }

        if self.deviatoric {
            self.compute_sigma(ntimestep - beginstep, domain);
        }
    }

    /// Remember the current cell as the reference state.
    pub fn capture_reference(&mut self, domain: &Domain) {
        self.vol0 = domain.volume();
        self.h0_inv = domain.h_inv;
    }

    /// `sigma = V0 H0^-1 (P_target - p_hydro I) H0^-T`
    ///
    /// `elapsed` is the number of steps since the start of the run, which
    /// decides whether the reference cell is due to be recaptured.
    pub fn compute_sigma(&mut self, elapsed: i64, domain: &Domain) {
        if self.nreset > 0 && elapsed % self.nreset == 0 {
            self.capture_reference(domain);
        }

        let mut dev = self.p_target;
        for i in 0..3 {
            dev[i] -= self.p_hydro;
        }
        let h0_inv = tensor::upper_triangular(&self.h0_inv);
        let sigma = tensor::congruence(&h0_inv, &tensor::symmetric(&dev));
        self.sigma = tensor::upper_voigt(&sigma);
        for x in &mut self.sigma {
            *x *= self.vol0;
        }
    }

    /// `fdev = H sigma H^T` for the current cell.
    pub fn compute_deviatoric(&mut self, domain: &Domain) {
        let h = tensor::upper_triangular(&domain.h);
        let fdev = tensor::congruence(&h, &tensor::symmetric(&self.sigma));
        self.fdev = tensor::upper_voigt(&fdev);
    }

    /// `0.5 Tr(sigma H H^T) / nktv2p`
    pub fn strain_energy(&self, domain: &Domain, nktv2p: f64) -> f64 {
        let h = tensor::upper_triangular(&domain.h);
        let hht = tensor::mat_mul(&h, &tensor::transpose(&h));
        let product = tensor::mat_mul(&tensor::symmetric(&self.sigma), &hht);
        0.5 * tensor::trace(&product) / nktv2p
    }

    /// Half-step update of the strain rates from the current pressure.
    pub fn nh_omega_dot(&mut self, domain: &Domain, kinetic: Kinetic, natoms: usize, units: &Units, dthalf: f64) {
        let volume = domain.volume();
        let nktv2p = units.nktv2p;

        if self.deviatoric {
            self.compute_deviatoric(domain);
        }

        let norm = (self.pdim * natoms) as f64;
        self.mtk_term1 = 0.0;
        if self.mtk {
            self.mtk_term1 = match self.pstyle {
                PressureStyle::Iso => kinetic.tdof * units.boltz * kinetic.t_current,
                _ => (0..3).filter(|&i| self.p_flag[i]).map(|i| kinetic.ke_tensor[i]).sum(),
            };
            self.mtk_term1 /= norm;
        }

        for i in 0..3 {
            if self.p_flag[i] {
                let mass = self.omega_mass[i];
                let mut f_omega = (self.p_current[i] - self.p_hydro) * volume / (mass * nktv2p);
                f_omega += self.mtk_term1 / mass;
                if self.deviatoric {
                    f_omega -= self.fdev[i] / (mass * nktv2p);
                }
                self.omega_dot[i] += f_omega * dthalf;
                self.omega_dot[i] *= self.pdrag_factor;
            }
        }

        self.mtk_term2 = 0.0;
        if self.mtk {
            self.mtk_term2 = (0..3).filter(|&i| self.p_flag[i]).map(|i| self.omega_dot[i]).sum();
            if self.pdim > 0 {
                self.mtk_term2 /= norm;
            }
        }

        if self.pstyle == PressureStyle::Triclinic {
            for i in 3..6 {
                if self.p_flag[i] {
                    let mass = self.omega_mass[i];
                    let mut f_omega = self.p_current[i] * volume / (mass * nktv2p);
                    if self.deviatoric {
                        f_omega -= self.fdev[i] / (mass * nktv2p);
                    }
                    self.omega_dot[i] += f_omega * dthalf;
                    self.omega_dot[i] *= self.pdrag_factor;
                }
            }
        }
    }

    fn cell_kinetic_energy(&self) -> f64 {
        self.active_components()
            .map(|i| self.omega_mass[i] * self.omega_dot[i] * self.omega_dot[i])
            .sum()
    }

    /// Half-step of the barostat's thermostat, which rescales the strain rates.
    pub fn nhc_press_integrate(&mut self, kt: f64, dt: f64) {
        if self.chain.is_empty() {
            return;
        }
        let step = HalfStep {
            dt,
            nloop: self.nc_pchain,
            drag_factor: self.pdrag_factor,
            target: self.chain_target(kt),
            kt,
        };
        let ke_current = self.cell_kinetic_energy();

        let ncomp = match self.pstyle { PressureStyle::Triclinic => 6, _ => 3 };
        let flags = self.p_flag;
        let omega_mass = &self.omega_mass;
        let omega_dot = &mut self.omega_dot;
        self.chain.half_step(step, ke_current, |factor| {
            let mut ke = 0.0;
            for i in (0..ncomp).filter(|&i| flags[i]) {
                omega_dot[i] *= factor;
                ke += omega_mass[i] * omega_dot[i] * omega_dot[i];
            }
            ke
        });
    }

    /// Energy of the cell variables and the barostat chain in the extended Hamiltonian.
    pub fn energy(&self, kt: f64, domain: &Domain, nktv2p: f64) -> f64 {
        let volume = domain.volume();
        let mut energy = 0.0;
        for i in self.active_components() {
            energy += 0.5 * self.omega_dot[i] * self.omega_dot[i] * self.omega_mass[i];
            if i < 3 {
                energy += self.p_hydro * (volume - self.vol0) / (self.pdim as f64 * nktv2p);
            }
        }
        energy += self.chain.energy(self.chain_target(kt), kt);
        if self.deviatoric {
            energy += self.strain_energy(domain, nktv2p);
        }
        energy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util;

    fn aniso(pcouple: Couple) -> Barostat {
        let mut baro = test_util::iso_barostat();
        baro.pstyle = PressureStyle::Aniso;
        baro.pcouple = pcouple;
        baro
    }

    #[test]
    fn couple_modes() {
        let tensor = [1.0, 2.0, 6.0, 0.1, 0.2, 0.3];

        let mut baro = test_util::iso_barostat();
        baro.couple(4.5, &tensor).unwrap();
        assert_eq!(&baro.p_current[..3], &[4.5; 3]);

        let expected = [
            (Couple::None, [1.0, 2.0, 6.0]),
            (Couple::Xyz, [3.0, 3.0, 3.0]),
            (Couple::Xy, [1.5, 1.5, 6.0]),
            (Couple::Yz, [1.0, 4.0, 4.0]),
            (Couple::Xz, [3.5, 2.0, 3.5]),
        ];
        for &(pcouple, p) in &expected {
            let mut baro = aniso(pcouple);
            baro.couple(f64::NAN, &tensor).unwrap();
            assert_close!(&baro.p_current[..3], &p[..], "{:?}", pcouple);
            // shear is only copied for a triclinic barostat
            assert_eq!(&baro.p_current[3..], &[0.0; 3]);
        }

        let mut baro = aniso(Couple::None);
        baro.pstyle = PressureStyle::Triclinic;
        baro.couple(0.0, &tensor).unwrap();
        assert_eq!(baro.p_current, tensor);
    }

    #[test]
    fn non_finite_pressure_is_an_instability() {
        let mut baro = test_util::iso_barostat();
        let e = baro.couple(f64::NAN, &[0.0; 6]).unwrap_err();
        match e.downcast_ref::<ErrorKind>() {
            Some(ErrorKind::NumericalInstability(_)) => {},
            other => panic!("{:?}", other),
        }

        let mut baro = aniso(Couple::None);
        baro.pstyle = PressureStyle::Triclinic;
        let e = baro.couple(0.0, &[1.0, 1.0, 1.0, 0.0, std::f64::INFINITY, 0.0]).unwrap_err();
        assert!(e.downcast_ref::<ErrorKind>().is_some());
    }

    #[test]
    fn press_target_and_hydrostatic_part() {
        let domain = Domain::orthogonal([0.0; 3], [2.0; 3]).unwrap();
        let mut baro = aniso(Couple::None);
        baro.p_start = [1.0, 2.0, 3.0, 0.0, 0.0, 0.0];
        baro.p_stop = [3.0, 2.0, 1.0, 0.0, 0.0, 0.0];
        baro.compute_press_target(5, 0, 10, &domain);
        assert_close!(&baro.p_target[..3], &[2.0, 2.0, 2.0][..]);
        assert_close!(baro.p_hydro, 2.0);

        baro.p_flag[2] = false;
        baro.pdim = 2;
        baro.compute_press_target(0, 0, 10, &domain);
        assert_close!(baro.p_hydro, 1.5);
    }

    #[test]
    fn sigma_is_zero_for_hydrostatic_targets() {
        let domain = Domain::triclinic([0.0; 3], [2.0, 3.0, 4.0], [0.5, 0.1, -0.2]).unwrap();
        let mut baro = aniso(Couple::None);
        baro.deviatoric = true;
        baro.capture_reference(&domain);
        baro.p_start = [2.0, 2.0, 2.0, 0.0, 0.0, 0.0];
        baro.p_stop = baro.p_start;
        baro.compute_press_target(0, 0, 10, &domain);
        assert_close!(abs=1e-14, baro.sigma, [0.0; 6]);
    }

    #[test]
    fn deviatoric_force_on_reference_cell() {
        // on the reference cell, H sigma H^T = V0 (P - p_hydro I)
        let domain = Domain::triclinic([0.0; 3], [2.0, 3.0, 4.0], [0.5, 0.1, -0.2]).unwrap();
        let mut baro = aniso(Couple::None);
        baro.pstyle = PressureStyle::Triclinic;
        baro.deviatoric = true;
        baro.p_flag = [true; 6];
        baro.capture_reference(&domain);
        baro.p_start = [1.0, 2.0, 6.0, 0.5, -0.25, 0.75];
        baro.p_stop = baro.p_start;
        baro.compute_press_target(0, 0, 0, &domain);
        baro.compute_deviatoric(&domain);

        let v0 = domain.volume();
        let expected = [-2.0 * v0, -1.0 * v0, 3.0 * v0, 0.5 * v0, -0.25 * v0, 0.75 * v0];
        assert_close!(abs=1e-12, baro.fdev, expected);
    }

    #[test]
    fn strain_energy_of_stretched_cell() {
        let mut domain = Domain::orthogonal([0.0; 3], [2.0; 3]).unwrap();
        let mut baro = aniso(Couple::None);
        baro.deviatoric = true;
        baro.capture_reference(&domain);
        baro.p_start = [1.0, 2.0, 6.0, 0.0, 0.0, 0.0];
        baro.p_stop = baro.p_start;
        baro.compute_press_target(0, 0, 0, &domain);
        // V0 H0^-1 D H0^-T with H0 = 2 I
        assert_close!(&baro.sigma[..3], &[-4.0, -2.0, 6.0][..]);

        domain.boxhi[0] = 4.0;
        domain.set_global_box();
        // 0.5 * (-4 * 16 + -2 * 4 + 6 * 4)
        assert_close!(baro.strain_energy(&domain, 1.0), -24.0);
    }

    #[test]
    fn nreset_recaptures_reference() {
        let mut domain = Domain::orthogonal([0.0; 3], [2.0; 3]).unwrap();
        let mut baro = aniso(Couple::None);
        baro.deviatoric = true;
        baro.nreset = 5;
        baro.capture_reference(&domain);

        domain.boxhi = [3.0; 3];
        domain.set_global_box();
        baro.compute_sigma(4, &domain);
        assert_eq!(baro.vol0, 8.0);
        baro.compute_sigma(10, &domain);
        assert_eq!(baro.vol0, 27.0);
    }

    #[test]
    fn overpressure_expands_the_cell() {
        let domain = Domain::orthogonal([0.0; 3], [2.0; 3]).unwrap();
        let mut baro = test_util::iso_barostat();
        baro.compute_press_target(0, 0, 10, &domain);
        baro.couple(baro.p_hydro + 1.0, &[0.0; 6]).unwrap();

        let kinetic = Kinetic { t_current: 1.0, tdof: 21.0, ke_tensor: [7.0, 7.0, 7.0, 0.0, 0.0, 0.0] };
        baro.nh_omega_dot(&domain, kinetic, 8, &Units::lj(), 0.005);
        assert!(baro.omega_dot[XX] > 0.0);
        assert_eq!(baro.omega_dot[XX], baro.omega_dot[ZZ]);
        // mtk: kinetic share per barostatted dof
        assert_close!(baro.mtk_term1, 21.0 / 24.0);
        assert_close!(baro.mtk_term2, 3.0 * baro.omega_dot[XX] / 24.0);
    }

    #[test]
    fn barostat_chain_damps_strain_rate() {
        let mut baro = test_util::iso_barostat();
        baro.set_masses(1.0, 8);
        baro.omega_dot = [2.0, 2.0, 2.0, 0.0, 0.0, 0.0];
        baro.nhc_press_integrate(1.0, 0.01);
        assert!(baro.omega_dot[XX] < 2.0);
        assert!(baro.chain.eta_dot[0] > 0.0);
    }
}

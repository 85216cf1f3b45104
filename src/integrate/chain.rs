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

//! Nose-Hoover chains.
//!
//! The same chain drives both the particle thermostat (coupled to the
//! kinetic energy of the atoms) and the barostat's thermostat (coupled to
//! the kinetic energy of the cell variables).  Only the quantity being
//! scaled differs, so that part is a callback.

/// Positions, velocities, accelerations and masses of a chain of `len` links.
///
/// `eta_dot` carries one extra trailing slot which is always zero, so that the
/// last link can be updated with the same formula as the others.
#[derive(Debug, Clone, PartialEq)]
pub struct NoseHooverChain {
    pub eta: Vec<f64>,
    pub eta_dot: Vec<f64>,
    pub eta_dotdot: Vec<f64>,
    pub eta_mass: Vec<f64>,
}

/// Settings of one half-step.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HalfStep {
    /// The full timestep.  Each half-step advances by `dt / 2`.
    pub dt: f64,
    /// Number of sub-iterations.
    pub nloop: usize,
    /// Multiplier applied to velocities during the inward sweep.
    pub drag_factor: f64,
    /// Target kinetic energy of the coupled system (first link).
    pub target: f64,
    /// `kB T`, the target of every later link.
    pub kt: f64,
}

impl NoseHooverChain {
    /// A chain at rest.  `len` may be zero, in which case nothing happens.
    pub fn new(len: usize) -> Self {
        NoseHooverChain {
            eta: vec![0.0; len],
            eta_dot: vec![0.0; len + 1],
            eta_dotdot: vec![0.0; len],
            eta_mass: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize { self.eta.len() }
    pub fn is_empty(&self) -> bool { self.eta.is_empty() }

    /// Assign `first` to the first link and `rest` to all others.
    pub fn set_masses(&mut self, first: f64, rest: f64) {
        for (ich, mass) in self.eta_mass.iter_mut().enumerate() {
            *mass = match ich { 0 => first, _ => rest };
        }
    }

    /// Force on link `ich > 0` from the link below it.
    fn coupling_force(&self, ich: usize, kt: f64) -> f64 {
        let below = ich - 1;
        (self.eta_mass[below] * self.eta_dot[below] * self.eta_dot[below] - kt) / self.eta_mass[ich]
    }

    /// Force on the first link from the coupled system.
    fn driving_force(&self, ke_current: f64, target: f64) -> f64 {
        match self.eta_mass[0] > 0.0 {
            true => (ke_current - target) / self.eta_mass[0],
            false => 0.0,
        }
    }

    /// Recompute the accelerations of all links but the first.
    pub fn init_forces(&mut self, kt: f64) {
        for ich in 1..self.len() {
            self.eta_dotdot[ich] = self.coupling_force(ich, kt);
        }
    }

    /// Advance the chain by half of `step.dt`.
    ///
    /// `ke_current` is the kinetic energy of the coupled system.  `scale`
    /// receives each velocity scaling factor, must apply it to the coupled
    /// system, and returns the new kinetic energy.
    ///
    /// The update is a palindrome: the sweep up the chain undoes the order of
    /// the sweep down it, so a half-step with `-dt` reverses one with `dt`.
    pub fn half_step<F>(&mut self, step: HalfStep, ke_current: f64, mut scale: F)
    where F: FnMut(f64) -> f64,
    {
        let m = self.len();
        if m == 0 {
            return;
        }

        let HalfStep { dt, nloop, drag_factor, target, kt } = step;
        let ncfac = 1.0 / nloop as f64;
        let dthalf = 0.5 * dt;
        let dt4 = 0.25 * dt;
        let dt8 = 0.125 * dt;

        self.eta_dotdot[0] = self.driving_force(ke_current, target);

        for _ in 0..nloop {
            for ich in (0..m).rev() {
                let expfac = (-ncfac * dt8 * self.eta_dot[ich + 1]).exp();
                self.eta_dot[ich] *= expfac;
                self.eta_dot[ich] += self.eta_dotdot[ich] * ncfac * dt4;
                self.eta_dot[ich] *= drag_factor;
                self.eta_dot[ich] *= expfac;
            }

            let factor = (-ncfac * dthalf * self.eta_dot[0]).exp();
            let ke_current = scale(factor);
            self.eta_dotdot[0] = self.driving_force(ke_current, target);

            for ich in 0..m {
                self.eta[ich] += ncfac * dthalf * self.eta_dot[ich];
            }

            for ich in 0..m {
                let expfac = (-ncfac * dt8 * self.eta_dot[ich + 1]).exp();
                self.eta_dot[ich] *= expfac;
                if ich > 0 {
                    self.eta_dotdot[ich] = self.coupling_force(ich, kt);
                }
                self.eta_dot[ich] += self.eta_dotdot[ich] * ncfac * dt4;
                self.eta_dot[ich] *= expfac;
            }
        }
        trace!("chain: eta = {:?}, eta_dot = {:?}", self.eta, &self.eta_dot[..m]);
    }

    /// Energy of the chain in the extended Hamiltonian.
    ///
    /// The first link's potential is `target * eta[0]`; every other link contributes `kt * eta`.
    pub fn energy(&self, target: f64, kt: f64) -> f64 {
        let mut energy = 0.0;
        for ich in 0..self.len() {
            let potential = match ich { 0 => target, _ => kt };
            energy += potential * self.eta[ich];
            energy += 0.5 * self.eta_mass[ich] * self.eta_dot[ich] * self.eta_dot[ich];
        }
        energy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_chain(len: usize) -> NoseHooverChain {
        let mut chain = NoseHooverChain::new(len);
        chain.set_masses(30.0, 2.0);
        for (ich, v) in chain.eta_dot.iter_mut().take(len).enumerate() {
            *v = 0.3 - 0.2 * ich as f64;
        }
        chain.init_forces(1.5);
        chain
    }

    fn step(dt: f64, nloop: usize) -> HalfStep {
        HalfStep { dt, nloop, drag_factor: 1.0, target: 45.0, kt: 1.5 }
    }

    #[test]
    fn dummy_slot_stays_zero() {
        let mut chain = setup_chain(3);
        let mut ke = 60.0;
        chain.half_step(step(0.01, 2), ke, |f| { ke *= f * f; ke });
        assert_eq!(chain.eta_dot.len(), 4);
        assert_eq!(chain.eta_dot[3], 0.0);
    }

    #[test]
    fn half_step_is_time_reversible() {
        for &(len, nloop) in &[(1, 1), (3, 1), (3, 2), (5, 3)] {
            let mut chain = setup_chain(len);
            let original = chain.clone();
            let mut ke = 60.0;

            chain.half_step(step(0.05, nloop), ke, |f| { ke *= f * f; ke });
            assert!(chain.eta[0] != 0.0);
            chain.half_step(step(-0.05, nloop), ke, |f| { ke *= f * f; ke });

            assert_close!(rel=1e-10, ke, 60.0);
            assert_close!(abs=1e-12, chain.eta, original.eta);
            assert_close!(abs=1e-12, chain.eta_dot, original.eta_dot);
        }
    }

    #[test]
    fn hot_system_accelerates_first_link() {
        let mut chain = NoseHooverChain::new(2);
        chain.set_masses(10.0, 1.0);
        let mut ke = 100.0;
        chain.half_step(step(0.01, 1), ke, |f| { ke *= f * f; ke });
        // kinetic energy above target: friction grows and the system cools
        assert!(chain.eta_dot[0] > 0.0);
        assert!(ke < 100.0);
    }

    #[test]
    fn empty_chain_is_inert() {
        let mut chain = NoseHooverChain::new(0);
        chain.half_step(step(0.01, 1), 1.0, |_| panic!("should not scale"));
        assert_eq!(chain.energy(1.0, 1.0), 0.0);
    }

    #[test]
    fn massless_first_link_feels_no_force() {
        let mut chain = NoseHooverChain::new(1);
        let mut ke = 5.0;
        chain.half_step(step(0.01, 1), ke, |f| { ke *= f * f; ke });
        assert_eq!(chain.eta_dot[0], 0.0);
        assert_eq!(ke, 5.0);
    }
}

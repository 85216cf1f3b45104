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

use crate::checkpoint::{Checkpoint, DUMP_FILE, RESTART_FILE};
use crate::{lattice, potential, FailResult};
use bocs_integrate::integrator::{ForceCompute, Verlet};
use bocs_integrate::respa::Respa;
use bocs_integrate::{keywords, FixBocs, Params, Report, System, Units};
use bocs_tasks_config::{self as cfg, Settings};

use std::io::Write;
use std::path::Path;

enum Driver {
    Verlet(Verlet),
    Respa(Respa),
}

/// One thermo line.
#[derive(Serialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Thermo {
    #[serde(flatten)]
    pub report: Report,
    pub kinetic_energy: f64,
    pub potential_energy: f64,
    /// Kinetic, potential and extended-system energy together.
    pub conserved: f64,
}

/// An NPT run: the atoms, the integrator, the force field and the timestep loop.
pub struct Simulation {
    pub sys: System,
    pub fix: FixBocs,
    forces: Box<dyn ForceCompute>,
    driver: Driver,
    run: cfg::Run,
}

/// The integrator settings, whichever way they were written.
pub fn integrator_params(integrator: &cfg::Integrator) -> FailResult<Params> {
    match integrator {
        cfg::Integrator::Keywords(line) => keywords::parse_line(line),
        cfg::Integrator::Params(params) => Ok(params.clone()),
    }
}

impl Simulation {
    /// Start from the configured lattice.
    pub fn new(settings: &Settings) -> FailResult<Simulation> {
        let units = Units::from_style(settings.units);
        let mut sys = lattice::system(&settings.lattice, units, settings.run.dt)?;
        if let Some(velocities) = &settings.velocities {
            lattice::thermalize(&mut sys, velocities)?;
        }
        Simulation::assemble(settings, sys, None)
    }

    /// Continue from the outputs that [`Simulation::save`] wrote to `dir`.
    ///
    /// The initial velocities in `settings` are ignored.
    pub fn resume(settings: &Settings, dir: impl AsRef<Path>) -> FailResult<Simulation> {
        let dir = dir.as_ref();
        let checkpoint = Checkpoint::load(dir.join(DUMP_FILE))?;
        let units = Units::from_style(settings.units);
        let mut sys = System::new(checkpoint.domain()?, checkpoint.atoms()?, units, settings.run.dt);
        sys.ntimestep = checkpoint.step;
        info!("resuming from step {} in '{}'", checkpoint.step, dir.display());
        Simulation::assemble(settings, sys, Some(&dir.join(RESTART_FILE)))
    }

    fn assemble(settings: &Settings, mut sys: System, restart: Option<&Path>) -> FailResult<Simulation> {
        let run = settings.run.clone();
        if run.steps < 0 {
            bail!("run.steps cannot be negative");
        }

        let params = integrator_params(&settings.integrator)?.validate(&sys.domain)?;
        let mut fix = FixBocs::new(params, &sys)?;
        if let Some(path) = restart {
            fix.read_restart(bocs_fs_util::open(path)?)?;
        }

        let (driver, nlevels) = match &run.respa {
            None => (Driver::Verlet(Verlet::new()), 1),
            Some(respa) => {
                let respa = Respa::new(run.dt, respa.loops.clone())?;
                let nlevels = respa.nlevels();
                (Driver::Respa(respa), nlevels)
            },
        };
        let pair_level = run.respa.as_ref().and_then(|r| r.pair_level).unwrap_or(nlevels - 1);
        let forces = potential::from_config(&settings.potential, pair_level, nlevels)?;

        sys.begin_run(run.steps);
        Ok(Simulation { sys, fix, forces, driver, run })
    }

    fn is_reneighbor_step(&self, step: i64) -> bool {
        self.run.reneighbor > 0 && step % self.run.reneighbor == 0
    }

    fn is_thermo_step(&self, step: i64) -> bool {
        step == self.sys.beginstep
            || step == self.sys.endstep
            || (self.run.thermo > 0 && step % self.run.thermo == 0)
    }

    pub fn thermo(&self) -> Thermo {
        let sys = &self.sys;
        let ke: f64 = izip!(&sys.atoms.v, &sys.atoms.mass)
            .map(|(v, m)| 0.5 * m * (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]))
            .sum();
        let kinetic_energy = sys.comm.sum_scalar(ke) * sys.units.mvv2e;
        let potential_energy = sys.comm.sum_scalar(sys.pe);
        let report = self.fix.report(sys);
        let conserved = kinetic_energy + potential_energy + report.energy;
        Thermo { report, kinetic_energy, potential_energy, conserved }
    }

    /// Set up and run every configured step, returning the thermo lines.
    pub fn run(&mut self) -> FailResult<Vec<Thermo>> {
        let Simulation { sys, fix, forces, driver, .. } = self;
        match driver {
            Driver::Verlet(verlet) => verlet.setup(fix, sys, &mut **forces)?,
            Driver::Respa(respa) => respa.setup(fix, sys, &mut **forces)?,
        }

        let mut thermo = vec![];
        self.log_thermo(&mut thermo);
        while self.sys.ntimestep < self.sys.endstep {
            let reneighbor = self.is_reneighbor_step(self.sys.ntimestep + 1);
            let Simulation { sys, fix, forces, driver, .. } = self;
            match driver {
                Driver::Verlet(verlet) => verlet.step(fix, sys, &mut **forces, reneighbor)?,
                Driver::Respa(respa) => respa.step(fix, sys, &mut **forces, reneighbor)?,
            }
            if self.is_thermo_step(self.sys.ntimestep) {
                self.log_thermo(&mut thermo);
            }
        }
        Ok(thermo)
    }

    fn log_thermo(&self, out: &mut Vec<Thermo>) {
        let thermo = self.thermo();
        info!("{}  PE {:>12.5}  E_tot {:>12.6}", thermo.report, thermo.potential_energy, thermo.conserved);
        out.push(thermo);
    }

    /// Write what [`Simulation::resume`] needs into `dir`.
    pub fn save(&self, dir: impl AsRef<Path>) -> FailResult<()> {
        let dir = dir.as_ref();
        if self.sys.comm.is_root() {
            Checkpoint::from_system(&self.sys).save(dir.join(DUMP_FILE))?;
        }

        let path = dir.join(RESTART_FILE);
        if self.sys.comm.is_root() {
            let mut file = bocs_fs_util::create_buffered(&path)?;
            self.fix.write_restart(&*self.sys.comm, &mut file)?;
            file.flush()?;
            debug!("wrote {} restart values to '{}'", self.fix.size_restart(), path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bocs_tasks_config::YamlRead;

    fn settings(extra: &str) -> Settings {
        let text = format!("
lattice: {{ kind: fcc, constant: 1.6796, cells: [3, 3, 3] }}
potential:
  lj: {{ cutoff: 2.2 }}
velocities: {{ temperature: 1.0, seed: 7 }}
integrator: temp 1.0 1.0 0.5 iso 1.0 1.0 2.5
run:
  steps: 60
  dt: 0.004
  thermo: 20
  reneighbor: 10
{}", extra);
        Settings::from_reader(text.as_bytes()).unwrap()
    }

    #[test]
    fn thermo_schedule() {
        let mut sim = Simulation::new(&settings("")).unwrap();
        let thermo = sim.run().unwrap();
        let steps: Vec<_> = thermo.iter().map(|t| t.report.step).collect();
        assert_eq!(steps, vec![0, 20, 40, 60]);
        assert_eq!(sim.sys.ntimestep, 60);
    }

    #[test]
    fn conserved_quantity_stays_put() {
        let mut sim = Simulation::new(&settings("")).unwrap();
        let thermo = sim.run().unwrap();
        let first = thermo[0].conserved;
        let natoms = sim.sys.natoms as f64;
        for t in &thermo {
            assert!((t.conserved - first).abs() < 1e-3 * natoms, "{} vs {}", t.conserved, first);
        }
    }

    #[test]
    fn respa_runs() {
        let mut sim = Simulation::new(&settings("  respa: { loops: [2], pair-level: 1 }")).unwrap();
        let thermo = sim.run().unwrap();
        assert_eq!(thermo.last().map(|t| t.report.step), Some(60));
        assert!(thermo.iter().all(|t| t.conserved.is_finite()));
    }

    #[test]
    fn keywords_and_mappings_agree() {
        let line = cfg::Integrator::Keywords("temp 1 1 0.5 iso 1 1 2.5 tchain 4".into());
        let mut params = Params::default();
        params.temp = Some(bocs_integrate::params::Ramp::constant(1.0, 0.5));
        params.pressure = Some(bocs_integrate::params::PressureTargets {
            iso: Some(bocs_integrate::params::Ramp::constant(1.0, 2.5)),
            ..Default::default()
        });
        params.tchain = 4;
        assert_eq!(integrator_params(&line).unwrap(), params);
    }
}

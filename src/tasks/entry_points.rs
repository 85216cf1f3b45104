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

use crate::logging::GlobalLogger;
use crate::simulation::Simulation;
use crate::FailResult;
use bocs_tasks_config::{Settings, YamlRead};

use clap::{App, Arg, ArgMatches};
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const THERMO_FILE: &str = "thermo.json";
pub const SETTINGS_FILE: &str = "settings.json";
pub const LOG_FILE: &str = "bocs.log";

fn wrap_result_main<F>(main: F)
where F: FnOnce() -> FailResult<()>,
{
    main().unwrap_or_else(|e| {
        for cause in e.iter_chain() {
            error!("{}", cause);
        }

        if std::env::var_os("RUST_BACKTRACE") == Some(OsStr::new("1").to_owned()) {
            error!("{}", e.backtrace());
        }
        std::process::exit(1);
    });
}

/// Command line of `bocs-npt`.
#[derive(Debug, Clone, PartialEq)]
pub struct NptArgs {
    pub config: PathBuf,
    pub output: PathBuf,
    pub resume: Option<PathBuf>,
    pub force: bool,
    pub verbosity: u64,
}

fn npt_app<'a, 'b>() -> App<'a, 'b> {
    App::new("bocs-npt")
        .about("Nose-Hoover NPT molecular dynamics with BOCS pressure corrections.")
        .args(&[
            Arg::with_name("config")
                .short("c").long("config").value_name("CONFIG")
                .takes_value(true).required(true)
                .help("settings yaml"),
            Arg::with_name("output")
                .short("o").long("output").value_name("OUTDIR")
                .takes_value(true).required(true)
                .help("output directory"),
            Arg::with_name("resume")
                .long("resume").value_name("DIR")
                .takes_value(true)
                .help("continue from the final state written to a previous output directory"),
            Arg::with_name("force")
                .short("f").long("force")
                .help("write into an existing output directory"),
            Arg::with_name("verbose")
                .short("v").long("verbose").multiple(true)
                .help("log more; may be repeated"),
        ])
}

impl NptArgs {
    fn from_matches(m: &ArgMatches<'_>) -> FailResult<NptArgs> {
        let path = |name: &str| -> FailResult<PathBuf> {
            match m.value_of_os(name) {
                Some(s) => Ok(PathBuf::from(s)),
                None => bail!("missing required argument --{}", name),
            }
        };
        Ok(NptArgs {
            config: path("config")?,
            output: path("output")?,
            resume: m.value_of_os("resume").map(PathBuf::from),
            force: m.is_present("force"),
            verbosity: m.occurrences_of("verbose"),
        })
    }

    pub fn parse_from<I, T>(args: I) -> FailResult<NptArgs>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = npt_app().get_matches_from_safe(args)?;
        NptArgs::from_matches(&matches)
    }
}

/// Everything `bocs-npt` does after the logger is up.
pub fn run_npt(args: &NptArgs) -> FailResult<()> {
    let settings = Settings::from_reader(bocs_fs_util::open_text(&args.config)?)?;
    write_json(args.output.join(SETTINGS_FILE), &settings)?;

    let mut sim = match &args.resume {
        None => Simulation::new(&settings)?,
        Some(dir) => Simulation::resume(&settings, dir)?,
    };
    let thermo = sim.run()?;
    write_json(args.output.join(THERMO_FILE), &thermo)?;
    sim.save(&args.output)?;
    info!("wrote results to '{}'", args.output.display());
    Ok(())
}

fn write_json(path: impl AsRef<Path>, value: &impl serde::Serialize) -> FailResult<()> {
    let mut file = bocs_fs_util::create_buffered(path)?;
    serde_json::to_writer_pretty(&mut file, value)?;
    writeln!(file)?;
    file.flush()?;
    Ok(())
}

fn prepare_output_dir(args: &NptArgs) -> FailResult<()> {
    if args.output.exists() && !args.force {
        bail!("'{}' already exists; use --force to write into it", args.output.display());
    }
    bocs_fs_util::create_dir_all(&args.output)?;
    Ok(())
}

// %% CRATES: binary: bocs-npt %%
pub fn bocs_npt() {
    wrap_result_main(|| {
        let args = NptArgs::from_matches(&npt_app().get_matches())?;
        prepare_output_dir(&args)?;
        GlobalLogger::default()
            .path(args.output.join(LOG_FILE))
            .verbosity(args.verbosity)
            .apply()?;
        run_npt(&args)
    });
}

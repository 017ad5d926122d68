//! Main rover-side executable entry point.
//!
//! # Architecture
//!
//! The executable runs three threads:
//!
//!     - Frame drain: reads frames from the camera into the frame cell, dropping stale ones
//!     - Control loop: runs the autonomous controller on the freshest frame each cycle
//!     - Main thread: reads operator commands (stdin or a script) and executes them through the
//!       mode dispatcher
//!
//! All threads share a `RoverCtx` and stop cooperatively when its stop flag is raised.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, info, warn};
use std::io::BufReader;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;
use structopt::StructOpt;

// Internal
use rov_lib::{
    act_client::LogActuator,
    auto_ctrl::{self, AutoCtrl},
    auto_loop::AutoLoop,
    cmd_processor,
    cmd_source::{CmdSource, LineSource},
    ctx::RoverCtx,
    params::RovExecParams,
    per::{self, Detector, FrameSource, SimilarityOracle},
    profile::ProfileTable,
};
use util::{
    logger::{logger_init, LevelFilter},
    module::State,
    script_interpreter::{PendingTokens, ScriptInterpreter},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Command line options.
#[derive(Debug, StructOpt)]
#[structopt(name = "rov_exec", about = "Sign following rover executable")]
struct Opt {
    /// Command script to execute instead of reading commands from stdin
    #[structopt(parse(from_os_str))]
    script: Option<PathBuf>,

    /// Minimum log level, `debug` or `trace`
    #[structopt(short, long, default_value = "debug")]
    log_level: LevelFilter,

    /// Stop after this many seconds
    #[structopt(short, long)]
    duration_s: Option<f64>,

    /// Parameter file, relative to the params directory
    #[structopt(short, long, default_value = "rov_exec.toml")]
    params: String,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("rov_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(opt.log_level, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Sign Following Rover Executable\n");
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI options: {:?}", opt);

    // ---- LOAD PARAMETERS ----

    let params: RovExecParams = util::params::load(&opt.params)
        .wrap_err("Could not load exec params")?;

    let profiles = ProfileTable::load(&params.profiles_file)
        .wrap_err("Could not load the profile table")?;

    info!("Exec parameters loaded, profiles: {:?}", profiles.ids());

    // ---- INITIALISE COMMAND SOURCE ----

    let mut cmd_source = match opt.script {
        Some(ref path) => {
            info!("Loading script from {:?}", path);

            let si = ScriptInterpreter::new(path).wrap_err("Failed to load script")?;

            info!(
                "Loaded script lasts {:.02} s and contains {} commands\n",
                si.get_duration(),
                si.get_num_tokens()
            );

            CmdSource::Script(si)
        }
        None => {
            info!("No script provided, commands will be read from stdin\n");

            CmdSource::Lines(
                LineSource::spawn(BufReader::new(std::io::stdin()))
                    .wrap_err("Failed to start the stdin reader")?,
            )
        }
    };

    // ---- INITIALISE CONTEXT AND MODULES ----

    info!("Initialising modules...");

    let ctx = RoverCtx::new(params, profiles, Box::new(LogActuator::new()))
        .wrap_err("Failed to create the rover context")?;

    let (frame_source, detector, oracle) = collaborators(&ctx.params)?;

    let mut ctrl = AutoCtrl::new(
        detector,
        oracle,
        ctx.profiles.clone(),
        ctx.dispatcher.snapshot(),
    );
    ctrl.init(
        auto_ctrl::InitData {
            archive: ctx.params.archive,
        },
        &session,
    )
    .wrap_err("Failed to initialise AutoCtrl")?;
    info!("AutoCtrl init complete");

    info!("Module initialisation complete\n");

    // ---- START THREADS ----

    let drain_jh = per::spawn_frame_drain(frame_source, ctx.frame_cell.clone(), ctx.stop.clone())
        .wrap_err("Failed to start the frame drain")?;

    let loop_jh = AutoLoop::new(
        ctrl,
        ctx.dispatcher.clone(),
        ctx.frame_cell.clone(),
        ctx.stop.clone(),
        ctx.params.cycle_period_s,
        ctx.params.max_consec_overruns,
    )
    .spawn()
    .wrap_err("Failed to start the control loop")?;

    // ---- COMMAND LOOP ----

    info!("Begining command processing\n");

    let start = Instant::now();
    let poll_period = util::time::seconds_to_std(ctx.params.cycle_period_s);

    loop {
        if let Some(d) = opt.duration_s {
            if start.elapsed().as_secs_f64() >= d {
                info!("Run duration of {:.02} s reached, stopping", d);
                break;
            }
        }

        match cmd_source.poll() {
            PendingTokens::None => (),
            PendingTokens::Some(tokens) => {
                for t in tokens.iter() {
                    cmd_processor::exec(&ctx.dispatcher, t);
                }
            }
            PendingTokens::EndOfScript => {
                info!("End of command input reached, stopping");
                break;
            }
        }

        thread::sleep(poll_period);
    }

    // ---- SHUTDOWN ----

    ctx.shutdown();

    match loop_jh.join() {
        Ok(exit) => info!("Control loop exited: {:?}", exit),
        Err(_) => warn!("Control loop panicked"),
    }
    if drain_jh.join().is_err() {
        warn!("Frame drain panicked");
    }

    info!("End of execution");

    Ok(())
}

/// Build the camera and vision collaborators.
#[cfg(feature = "sim")]
fn collaborators(
    params: &RovExecParams,
) -> Result<
    (
        Box<dyn FrameSource>,
        Box<dyn Detector>,
        Box<dyn SimilarityOracle>,
    ),
    Report,
> {
    use rov_lib::sim::{ColourDetector, MeanAbsDiffOracle, SimCamera};

    info!("Using the simulated camera and vision stack");

    Ok((
        Box::new(SimCamera::new(params.sim.clone())),
        Box::new(ColourDetector),
        Box::new(MeanAbsDiffOracle),
    ))
}

/// Build the camera and vision collaborators.
#[cfg(not(feature = "sim"))]
fn collaborators(
    _params: &RovExecParams,
) -> Result<
    (
        Box<dyn FrameSource>,
        Box<dyn Detector>,
        Box<dyn SimilarityOracle>,
    ),
    Report,
> {
    Err(color_eyre::eyre::eyre!(
        "No camera or vision stack available, build with the `sim` feature"
    ))
}

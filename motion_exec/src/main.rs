//! Motion control executable entry point.
//!
//! Runs one of the motion controllers against the kinematic unicycle model,
//! either in simulated time (as fast as possible) or in real time against the
//! wall clock.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logger and parameters
//!     - Build the selected controller from its parameters and the CLI
//!     - Main loop:
//!         - Integrate the last command into the model
//!         - Controller processing
//!         - Command limiting
//!         - Archiving
//!         - Cycle management
//!
//! Parameters are loaded from `$MOTION_SW_ROOT/params`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::{eyre, WrapErr}, Report};
use log::{debug, info, warn};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use motion_lib::{
    model::Unicycle,
    params::{self, PathFollowParams, PositionParams, TrajParams},
    Clock, Command, Configuration, CubicPath, MonotonicClock, PathFollowController,
    PositionController, SimClock, TrajController,
};
use util::{
    archive::Archiver,
    host,
    logger::{logger_init, LevelFilter},
    maths::{clamp, wrap_pi},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Directory, relative to the software root, in which sessions are created.
const SESSIONS_DIR: &str = "sessions";

/// Name of the per-cycle archive inside the session's archive directory.
const TICK_ARCHIVE: &str = "ticks.csv";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Command line options
#[derive(Debug, StructOpt)]
#[structopt(
    name = "motion_exec",
    about = "Run a motion controller against a simulated unicycle"
)]
struct Opt {
    /// Run in real time against the wall clock instead of in simulated time
    #[structopt(long)]
    realtime: bool,

    /// Log every controller step
    #[structopt(long)]
    trace: bool,

    /// Initial X position of the robot in meters
    #[structopt(long, default_value = "0", allow_hyphen_values = true)]
    start_x_m: f64,

    /// Initial Y position of the robot in meters
    #[structopt(long, default_value = "0", allow_hyphen_values = true)]
    start_y_m: f64,

    /// Initial heading of the robot in radians
    #[structopt(long, default_value = "0", allow_hyphen_values = true)]
    start_heading_rad: f64,

    #[structopt(subcommand)]
    ctrl: CtrlOpt,
}

/// The controller to run
#[derive(Debug, StructOpt)]
enum CtrlOpt {
    /// Follow a cubic path at constant speed
    #[structopt(name = "path-follow")]
    PathFollow {
        /// Path coefficients as `ax0,ax1,ax2,ax3,ay0,ay1,ay2,ay3`
        #[structopt(long, use_delimiter = true, allow_hyphen_values = true)]
        coeffs: Vec<f64>,

        /// Linear speed along the path in meters/second
        #[structopt(long, default_value = "0.2")]
        speed_ms: f64,
    },

    /// Track a cosine velocity profile trajectory along a cubic path
    #[structopt(name = "traj")]
    Traj {
        /// Path coefficients as `ax0,ax1,ax2,ax3,ay0,ay1,ay2,ay3`
        #[structopt(long, use_delimiter = true, allow_hyphen_values = true)]
        coeffs: Vec<f64>,

        /// Peak speed of the trajectory in meters/second
        #[structopt(long, default_value = "0.3")]
        v_max_ms: f64,
    },

    /// Drive to a point
    #[structopt(name = "position")]
    Position {
        /// Goal X position in meters
        #[structopt(allow_hyphen_values = true)]
        x_m: f64,

        /// Goal Y position in meters
        #[structopt(allow_hyphen_values = true)]
        y_m: f64,
    },
}

/// Parameters of the executable itself
#[derive(Debug, Clone, Deserialize)]
struct ExecParams {
    /// Target period of one cycle
    cycle_period_s: f64,

    /// Number of cycles after which the run is abandoned
    max_cycles: usize,

    /// Limit on the magnitude of the commanded linear velocity
    max_speed_ms: f64,

    /// Limit on the magnitude of the commanded angular velocity
    max_turn_rate_rads: f64,
}

/// What the controller produced in one cycle, beyond the command.
#[derive(Debug, Default, Copy, Clone)]
struct StepSummary {
    /// Reference point on the path, or the goal
    ref_m: Option<Vector2<f64>>,

    /// True once the controller has nothing more to do
    done: bool,
}

/// A single archived cycle. Flat so that it can be written as CSV.
#[derive(Debug, Serialize)]
struct TickRecord {
    cycle: usize,
    time_s: f64,
    x_m: f64,
    y_m: f64,
    heading_rad: f64,
    dem_v_ms: f64,
    dem_w_rads: f64,
    v_ms: f64,
    w_rads: f64,
    ref_x_m: Option<f64>,
    ref_y_m: Option<f64>,
    done: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Source of time for the run.
enum ExecClock {
    /// Simulated time, advanced by one period at the end of each cycle
    Sim(SimClock),

    /// Wall clock time, with the remainder of each cycle slept away
    Wall(MonotonicClock),
}

/// The controller under test.
enum Controller {
    PathFollow {
        ctrl: PathFollowController,
        speed_ms: f64,
    },
    Traj(TrajController),
    Position(PositionController),
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    let opt = Opt::from_args();

    // Initialise session
    let session = Session::new(
        "motion_exec",
        SESSIONS_DIR
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    let ctrl_level = if opt.trace { LevelFilter::Trace } else { LevelFilter::Debug };
    logger_init(LevelFilter::Debug, ctrl_level, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Motion Control Executable\n");
    info!("Running on: {}", host::get_platform());
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI options: {:?}", opt);

    // ---- LOAD PARAMETERS ----

    let exec_params: ExecParams = params::load("exec.toml")
        .wrap_err("Could not load exec params")?;

    if !(exec_params.cycle_period_s > 0.0 && exec_params.cycle_period_s.is_finite()) {
        return Err(eyre!(
            "Expected a positive cycle period, found {}", exec_params.cycle_period_s
        ));
    }

    info!("Exec parameters loaded");

    // ---- INITIALISE CONTROLLER ----

    let mut ctrl = Controller::from_opt(&opt.ctrl)
        .wrap_err("Failed to initialise the controller")?;

    let mut archiver = Archiver::from_path(&session, TICK_ARCHIVE)
        .wrap_err("Failed to initialise the tick archive")?;

    // ---- MAIN LOOP ----

    let mut clock = if opt.realtime {
        ExecClock::Wall(MonotonicClock)
    }
    else {
        ExecClock::Sim(SimClock::new())
    };
    let mut robot = Unicycle::new(opt.start_x_m, opt.start_y_m, opt.start_heading_rad);
    let period = Duration::from_secs_f64(exec_params.cycle_period_s);

    let start_time = clock.now();
    let mut prev_time = start_time;
    let mut cmd = Command::stop();
    let mut done = false;

    info!("Beginning main loop\n");

    for cycle in 0..exec_params.max_cycles {
        let cycle_start = clock.now();

        // ---- MODEL ----

        // The last command is held for the whole of the previous cycle
        robot.integrate(
            cmd,
            cycle_start.saturating_duration_since(prev_time).as_secs_f64()
        );
        prev_time = cycle_start;

        let config = robot.configuration();

        // ---- CONTROL ----

        let (dem_cmd, summary) = ctrl.step(&config, &clock)
            .wrap_err_with(|| format!("Controller failed on cycle {}", cycle))?;

        cmd = limit_command(dem_cmd, &exec_params);
        if cmd != dem_cmd {
            debug!(
                "Command ({:.3}, {:.3}) limited to ({:.3}, {:.3})",
                dem_cmd.v_ms, dem_cmd.w_rads, cmd.v_ms, cmd.w_rads
            );
        }

        // ---- WRITE ARCHIVES ----

        archiver.serialise(TickRecord {
            cycle,
            time_s: cycle_start.saturating_duration_since(start_time).as_secs_f64(),
            x_m: config.x(),
            y_m: config.y(),
            heading_rad: wrap_pi(config.heading_rad),
            dem_v_ms: dem_cmd.v_ms,
            dem_w_rads: dem_cmd.w_rads,
            v_ms: cmd.v_ms,
            w_rads: cmd.w_rads,
            ref_x_m: summary.ref_m.map(|r| r[0]),
            ref_y_m: summary.ref_m.map(|r| r[1]),
            done: summary.done,
        }).wrap_err("Failed to archive the cycle")?;

        if summary.done {
            info!("Controller finished after {} cycles", cycle);
            done = true;
            break
        }

        // ---- CYCLE MANAGEMENT ----

        clock.end_cycle(cycle_start, period);
    }

    if !done {
        warn!(
            "Controller did not finish within {} cycles",
            exec_params.max_cycles
        );
    }

    // ---- SHUTDOWN ----

    let end = robot.configuration();
    info!(
        "Final configuration: ({:.3}, {:.3}) m, {:.3} rad after {:.3} s",
        end.x(), end.y(), wrap_pi(end.heading_rad),
        clock.now().saturating_duration_since(start_time).as_secs_f64()
    );

    info!("End of execution");

    Ok(())
}

/// Limit a command to the configured maximum speed and turn rate.
fn limit_command(cmd: Command, params: &ExecParams) -> Command {
    Command::new(
        clamp(cmd.v_ms, -params.max_speed_ms, params.max_speed_ms),
        clamp(cmd.w_rads, -params.max_turn_rate_rads, params.max_turn_rate_rads)
    )
}

/// Build a path from the coefficients given on the command line.
fn path_from_opt(coeffs: &[f64]) -> Result<CubicPath, Report> {
    CubicPath::from_slice(coeffs).wrap_err("Invalid path coefficients")
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Clock for ExecClock {
    fn now(&self) -> Instant {
        match self {
            ExecClock::Sim(c) => c.now(),
            ExecClock::Wall(c) => c.now(),
        }
    }
}

impl ExecClock {
    /// Finish the cycle which started at `cycle_start`.
    fn end_cycle(&mut self, cycle_start: Instant, period: Duration) {
        match self {
            ExecClock::Sim(c) => c.advance(period),
            ExecClock::Wall(_) => {
                let cycle_dur = cycle_start.elapsed();

                match period.checked_sub(cycle_dur) {
                    Some(d) => thread::sleep(d),
                    None => warn!(
                        "Cycle overran by {:.06} s",
                        cycle_dur.as_secs_f64() - period.as_secs_f64()
                    )
                }
            }
        }
    }
}

impl Controller {
    /// Build the controller selected on the command line from its parameters.
    fn from_opt(opt: &CtrlOpt) -> Result<Self, Report> {
        match opt {
            CtrlOpt::PathFollow { coeffs, speed_ms } => {
                let p: PathFollowParams = params::load("path_follow.toml")
                    .wrap_err("Could not load path following params")?;
                let path = path_from_opt(coeffs)?;

                info!("PathFollow: L = {:.3} m at {:.3} m/s", path.arc_length(1.0), speed_ms);

                Ok(Controller::PathFollow {
                    ctrl: PathFollowController::new(p.k_ang, p.k_lin, path),
                    speed_ms: *speed_ms
                })
            },
            CtrlOpt::Traj { coeffs, v_max_ms } => {
                let p: TrajParams = params::load("traj.toml")
                    .wrap_err("Could not load trajectory params")?;

                let mut ctrl = TrajController::from_params(&p);
                ctrl.set_trajectory(path_from_opt(coeffs)?, *v_max_ms)
                    .wrap_err("Could not set the trajectory")?;

                Ok(Controller::Traj(ctrl))
            },
            CtrlOpt::Position { x_m, y_m } => {
                let p: PositionParams = params::load("position.toml")
                    .wrap_err("Could not load position params")?;

                let mut ctrl = PositionController::from_params(&p);
                ctrl.set_goal(Vector2::new(*x_m, *y_m));

                Ok(Controller::Position(ctrl))
            }
        }
    }

    /// Run one control cycle.
    fn step<C: Clock>(
        &mut self,
        config: &Configuration,
        clock: &C
    ) -> Result<(Command, StepSummary), Report> {
        match self {
            Controller::PathFollow { ctrl, speed_ms } => {
                let (cmd, report) = ctrl.step(config, *speed_ms);
                Ok((cmd, StepSummary {
                    ref_m: Some(Vector2::new(report.ref_x_m, report.ref_y_m)),
                    done: report.finished
                }))
            },
            Controller::Traj(ctrl) => {
                let (cmd, report) = ctrl.step(config, clock)?;
                Ok((cmd, StepSummary {
                    ref_m: Some(Vector2::new(report.ref_x_m, report.ref_y_m)),
                    done: report.finished
                }))
            },
            Controller::Position(ctrl) => {
                let goal = ctrl.goal();
                let (cmd, report) = ctrl.step(config, clock);
                Ok((cmd, StepSummary {
                    ref_m: goal,
                    done: report.arrived
                }))
            }
        }
    }
}

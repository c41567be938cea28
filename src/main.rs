//! Binary entry point.
//!
//! `run` drives the control loop until a shutdown signal; the command modes
//! (`configure`, `event`, `show`) open the persisted schedule, apply or query
//! one thing and print the result with logging turned off.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;

use smartflag::args::{CliAction, ParsedArgs, ShowQuery, display_help, display_version_info};
use smartflag::common::constants::{EXIT_FAILURE, EXIT_SUCCESS, SIMULATION_TIME_MULTIPLIER};
use smartflag::common::logger::Log;
use smartflag::config::{self, Config};
use smartflag::control::ControlLoop;
use smartflag::hardware::LoggingAnnunciator;
use smartflag::hardware::sim::SimRig;
use smartflag::motor::MotorController;
use smartflag::schedule::Scheduler;
use smartflag::signals::setup_signal_handler;
use smartflag::station::Station;
use smartflag::storage::FileBlobStore;
use smartflag::time::{Clock, SimulatedClock, SystemClock};
use smartflag::{log_block_start, log_debug, log_decorated, log_end, log_error_exit, log_pipe, log_version};

fn main() {
    let parsed = ParsedArgs::from_env();

    let result = match parsed.action {
        CliAction::ShowHelp => {
            display_help();
            Ok(EXIT_SUCCESS)
        }
        CliAction::ShowVersion => {
            display_version_info();
            Ok(EXIT_SUCCESS)
        }
        CliAction::ShowHelpDueToError => {
            display_help();
            Ok(EXIT_FAILURE)
        }
        CliAction::Run {
            debug_enabled,
            simulate,
            log_file,
            config_dir,
        } => run(debug_enabled, simulate, log_file, config_dir),
        CliAction::Configure { json, config_dir } => {
            command(config_dir, |scheduler| scheduler.configure(&json, Utc::now()))
        }
        CliAction::Event { json, config_dir } => {
            command(config_dir, |scheduler| scheduler.submit_event(&json, Utc::now()))
        }
        CliAction::Show { query, config_dir } => show(query, config_dir),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            Log::set_enabled(true);
            log_pipe!();
            log_error_exit!("{e:#}");
            std::process::exit(EXIT_FAILURE);
        }
    }
}

fn run(
    debug_enabled: bool,
    simulate: bool,
    log_file: Option<String>,
    config_dir: Option<String>,
) -> Result<i32> {
    let _log_guard = match log_file {
        Some(path) => Some(Log::start_file_logging(path)?),
        None => None,
    };
    Log::set_debug(debug_enabled);
    Log::set_timestamps(true);

    log_version!();
    config::set_config_dir(config_dir)?;
    let config = Config::load()?;
    config.log_config();

    let signal_state = setup_signal_handler(debug_enabled)?;

    let clock: Arc<dyn Clock> = if simulate {
        log_block_start!("Simulated time at {SIMULATION_TIME_MULTIPLIER}x");
        Arc::new(SimulatedClock::accelerated(Utc::now(), SIMULATION_TIME_MULTIPLIER))
    } else {
        Arc::new(SystemClock::new())
    };

    let store_path = config.state_file_path()?;
    log_decorated!("Schedule store: {}", store_path.display());
    let scheduler = Scheduler::begin(Box::new(FileBlobStore::new(store_path)), clock.utc_now());

    // No board bindings are compiled in; the halyard is the simulated rig.
    let rig = SimRig::at_station(clock.clone(), Station::Full);
    let motor = MotorController::new(Box::new(rig.motor()), config.motor_tuning());

    let mut control = ControlLoop::new(
        scheduler,
        motor,
        Box::new(rig.sensors()),
        Box::new(LoggingAnnunciator::new()),
        clock,
        config.loop_settings(),
    );
    control.run_until(&signal_state.shutdown);

    if let Ok(status) = serde_json::to_string(&control.status()) {
        log_debug!("Final status: {status}");
    }
    log_end!();
    Ok(EXIT_SUCCESS)
}

fn open_scheduler(config_dir: Option<String>) -> Result<Scheduler> {
    config::set_config_dir(config_dir)?;
    let config = Config::load()?;
    let store = FileBlobStore::new(config.state_file_path()?);
    Ok(Scheduler::begin(Box::new(store), Utc::now()))
}

/// Apply one JSON command and print its result code.
fn command(config_dir: Option<String>, apply: impl FnOnce(&mut Scheduler) -> i32) -> Result<i32> {
    Log::set_enabled(false);
    let mut scheduler = open_scheduler(config_dir)?;
    let code = apply(&mut scheduler);
    println!("{code}");
    Ok(if code == 0 { EXIT_SUCCESS } else { EXIT_FAILURE })
}

fn show(query: ShowQuery, config_dir: Option<String>) -> Result<i32> {
    Log::set_enabled(false);
    let scheduler = open_scheduler(config_dir)?;

    let output = match query {
        ShowQuery::Config => Some(scheduler.show_config()),
        ShowQuery::Events => Some(scheduler.show_event_list()),
        ShowQuery::Event(index) => scheduler.show_event(index),
        ShowQuery::Store => scheduler.show_persisted(),
        ShowQuery::Next => Some(scheduler.show_next(Utc::now())),
    };

    match output {
        Some(text) => {
            println!("{text}");
            Ok(EXIT_SUCCESS)
        }
        None => {
            println!("null");
            Ok(EXIT_FAILURE)
        }
    }
}

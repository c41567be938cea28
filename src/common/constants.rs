//! Application-wide constants: host configuration defaults and limits,
//! scheduler capacities, motor tuning and persisted-record identifiers.

// # Event store

/// Number of flag events the scheduler can hold at once.
pub const EVENT_CAPACITY: usize = 20;

/// Flag code that always qualifies an event, regardless of the unit's top flag.
pub const FEDERAL_FLAG_CODE: &str = "US";

/// Unbounded event ends are treated as this far in the future while resolving.
pub const OPEN_END_HORIZON_SECS: i64 = 30 * 24 * 60 * 60;

/// Wake this long before sunrise so sun-relative marks are re-derived each morning.
pub const PRE_SUNRISE_WAKE_SECS: i64 = 30 * 60;

/// Widest standard-time offset any zone uses, in hours either side of UTC.
pub const MAXIMUM_UTC_OFFSET_HOURS: f64 = 14.0;

/// Fallback poll when neither today's nor tomorrow's sunrise is usable.
pub const FALLBACK_WAKE_SECS: i64 = 60 * 60;

// # Persisted record layout

pub const STORE_SEGMENT_TYPE: char = 'S';
pub const STORE_SEGMENT_VERSION: u8 = 1;
pub const STORE_JURISDICTION_WIDTH: usize = 9;
pub const STORE_FLAG_WIDTH: usize = 2;
pub const STORE_MARK_WIDTH: usize = 24;
pub const STORE_POSTAL_WIDTH: usize = 5;
pub const STORE_FILE_NAME: &str = "schedule.json";

// # Motor defaults

pub const DEFAULT_STALL_AMPS: f32 = 1.8;
pub const DEFAULT_CURRENT_SCALE: f32 = 2.0; // amps per volt at the sense input
pub const DEFAULT_ADC_REFERENCE_VOLTS: f32 = 3.3;
pub const DEFAULT_ADC_MAX_COUNT: u16 = 4095;
pub const DEFAULT_RAMP_FLOOR_MS: u32 = 500;
pub const DEFAULT_MOVE_RAMP_MS: u32 = 1_000;
pub const DEFAULT_MOVE_TIMEOUT_MS: u32 = 120_000;
pub const DEFAULT_MOVE_SPEED: u8 = 255;

pub const MINIMUM_STALL_AMPS: f32 = 0.1;
pub const MAXIMUM_STALL_AMPS: f32 = 10.0;
pub const MINIMUM_RAMP_FLOOR_MS: u32 = 50;
pub const MAXIMUM_RAMP_FLOOR_MS: u32 = 5_000;
pub const MAXIMUM_MOVE_TIMEOUT_MS: u32 = 600_000;

// # Control loop defaults

pub const DEFAULT_TICK_INTERVAL_MS: u32 = 20;
pub const MINIMUM_TICK_INTERVAL_MS: u32 = 1;
pub const MAXIMUM_TICK_INTERVAL_MS: u32 = 1_000;
pub const DEFAULT_FAULT_DWELL_MS: u32 = 30_000;
pub const MINIMUM_FAULT_DWELL_MS: u32 = 1_000;
pub const MAXIMUM_FAULT_DWELL_MS: u32 = 3_600_000;

/// Speed-up factor for `run --simulate`.
pub const SIMULATION_TIME_MULTIPLIER: u32 = 60;

// # Host configuration file

pub const CONFIG_DIR_NAME: &str = "smartflag";
pub const CONFIG_FILE_NAME: &str = "smartflag.toml";

// # Exit codes

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

//! Scheduler error types and the numeric result codes of the command surface.

use std::fmt;

/// Stable result codes returned by the configure and submit-event commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ResultCode {
    Success = 0,
    GeneralFailure = 1,
    NotHalfOrFull = 2,
    BadSunEvent = 3,
    NotSunriseSunset = 4,
    NotZuluLocal = 5,
    ParseError = 6,
    Overflow = 7,
}

impl ResultCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Why a time mark could not be resolved to an instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeMarkError {
    /// Destination for a bare date was neither `H` nor `F`.
    NotHalfOrFull(char),
    /// The sun does not rise or set on that date at the configured location.
    BadSunEvent,
    /// Expected an `SR` or `SS` suffix.
    NotSunriseSunset(String),
    /// Expected a `Z` or `L` suffix.
    NotZuluLocal(char),
    /// Wrong length or unparseable date/time fields.
    Malformed(String),
}

impl TimeMarkError {
    pub fn result_code(&self) -> ResultCode {
        match self {
            TimeMarkError::NotHalfOrFull(_) => ResultCode::NotHalfOrFull,
            TimeMarkError::BadSunEvent => ResultCode::BadSunEvent,
            TimeMarkError::NotSunriseSunset(_) => ResultCode::NotSunriseSunset,
            TimeMarkError::NotZuluLocal(_) => ResultCode::NotZuluLocal,
            TimeMarkError::Malformed(_) => ResultCode::ParseError,
        }
    }
}

impl fmt::Display for TimeMarkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeMarkError::NotHalfOrFull(dest) => {
                write!(f, "time mark destination '{dest}' must be H or F")
            }
            TimeMarkError::BadSunEvent => {
                write!(f, "no sunrise or sunset on that date at this location")
            }
            TimeMarkError::NotSunriseSunset(suffix) => {
                write!(f, "expected SR or SS after the date, found '{suffix}'")
            }
            TimeMarkError::NotZuluLocal(suffix) => {
                write!(f, "expected Z or L after the time, found '{suffix}'")
            }
            TimeMarkError::Malformed(mark) => write!(f, "malformed time mark '{mark}'"),
        }
    }
}

impl std::error::Error for TimeMarkError {}

/// Rejection of a submitted flag event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// Malformed JSON, identifier or time mark. The event is discarded.
    Parse(String),
    /// Every slot holds a live event; existing events are untouched.
    Overflow,
}

impl ScheduleError {
    pub fn result_code(&self) -> ResultCode {
        match self {
            ScheduleError::Parse(_) => ResultCode::ParseError,
            ScheduleError::Overflow => ResultCode::Overflow,
        }
    }
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::Parse(reason) => write!(f, "event rejected: {reason}"),
            ScheduleError::Overflow => write!(f, "event list is full"),
        }
    }
}

impl std::error::Error for ScheduleError {}

impl From<TimeMarkError> for ScheduleError {
    fn from(err: TimeMarkError) -> Self {
        ScheduleError::Parse(err.to_string())
    }
}

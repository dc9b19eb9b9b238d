use thiserror::Error;

/// A units error.
#[derive(Debug, Error)]
pub enum UnitsError {
    /// A unit string could not be parsed.
    #[error("cannot parse units {_0:?}: {_1}")]
    Parse(String, String),
    /// An unknown unit name.
    #[error("unknown unit {_0:?}")]
    UnknownUnit(String),
    /// An unknown calendar name.
    #[error("unknown calendar {_0:?}")]
    UnknownCalendar(String),
    /// An invalid date.
    #[error("invalid date {_0}")]
    InvalidDate(String),
    /// Units which are not equivalent were combined or converted.
    #[error("units {_0:?} and {_1:?} are not equivalent")]
    Incompatible(String, String),
    /// Units which cannot be combined by an operation.
    #[error("cannot {_0} units {_1:?} and {_2:?}")]
    Algebra(&'static str, String, String),
    /// Shifted units raised to a power other than one.
    #[error("raising shifted units {_0:?} to the power {_1} is not well defined")]
    ShiftedPower(String, f64),
    /// Dimensioned units raised to a power which gives a non-integral exponent.
    #[error("cannot raise units {_0:?} to the non-integral power {_1}")]
    NonIntegralPower(String, f64),
    /// An operation requiring defined units.
    #[error("units are undefined")]
    Undefined,
    /// An operation requiring reference time units.
    #[error("units {_0:?} are not reference time units")]
    NotReferenceTime(String),
}

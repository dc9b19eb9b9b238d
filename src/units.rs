//! Physical units.
//!
//! A [`Units`] is an immutable value describing the physical units of the elements of an array.
//! Units are either undefined (no units at all, which is distinct from the dimensionless `"1"`), a linear combination of the SI base units with an optional offset (e.g. `"km"`, `"W m-2"`, `"degC"`), or reference time units (e.g. `"days since 2000-01-01"`) with a [`Calendar`].
//!
//! Two units are *equivalent* if values can be converted between them, and *equal* if that conversion is the identity.

mod calendar;
mod unit_parser;
mod units_errors;

pub use calendar::{Calendar, Date};
pub use units_errors::UnitsError;

use unit_parser::{parse_unit, Dimensions, UnitDefinition};

/// A linear conversion between equivalent units: `value * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    scale: f64,
    offset: f64,
}

impl Conversion {
    const TOLERANCE: f64 = 1e-12;

    /// The identity conversion.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
        }
    }

    /// The scale factor.
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// The offset, added after scaling.
    #[must_use]
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Convert a value.
    #[must_use]
    pub fn apply(&self, value: f64) -> f64 {
        value * self.scale + self.offset
    }

    /// Returns true if the conversion leaves values unchanged.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        (self.scale - 1.0).abs() <= Self::TOLERANCE && self.offset.abs() <= Self::TOLERANCE
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Reference {
    duration: String,
    date: Date,
    /// Seconds from the calendar epoch to the reference date.
    epoch: f64,
}

/// The physical units of an array.
#[derive(Debug, Clone)]
pub struct Units {
    units: Option<String>,
    definition: Option<UnitDefinition>,
    reference: Option<Reference>,
    calendar: Option<Calendar>,
    canonical_calendar: bool,
}

impl Default for Units {
    fn default() -> Self {
        Self::undefined()
    }
}

impl Units {
    /// Undefined units.
    #[must_use]
    pub fn undefined() -> Self {
        Self {
            units: None,
            definition: None,
            reference: None,
            calendar: None,
            canonical_calendar: false,
        }
    }

    /// The dimensionless units `"1"`.
    #[must_use]
    pub fn dimensionless() -> Self {
        Self {
            units: Some("1".to_string()),
            definition: Some(UnitDefinition {
                dimensions: Dimensions::default(),
                scale: 1.0,
                offset: 0.0,
            }),
            ..Self::undefined()
        }
    }

    /// Parse units.
    ///
    /// An empty string gives undefined units.
    ///
    /// # Errors
    /// Returns a [`UnitsError`] if `units` cannot be parsed.
    pub fn new(units: &str) -> Result<Self, UnitsError> {
        Self::with_calendar(units, None)
    }

    /// Parse units with a calendar.
    ///
    /// A calendar given here is *canonical*: it was explicitly requested rather than defaulted.
    /// Reference time units without a calendar use [`Calendar::Standard`].
    ///
    /// # Errors
    /// Returns a [`UnitsError`] if `units` cannot be parsed, or its reference date does not exist in the calendar.
    pub fn with_calendar(units: &str, calendar: Option<Calendar>) -> Result<Self, UnitsError> {
        let text = units.trim();
        let mut result = Self {
            calendar,
            canonical_calendar: calendar.is_some(),
            ..Self::undefined()
        };
        if text.is_empty() {
            return Ok(result);
        }

        if let Some(position) = text.to_ascii_lowercase().find(" since ") {
            let duration = text[..position].trim();
            let definition = parse_unit(duration)?;
            if definition.dimensions != Dimensions::time() || definition.offset != 0.0 {
                return Err(UnitsError::Parse(
                    text.to_string(),
                    format!("{duration:?} is not a unit of time"),
                ));
            }
            let date = Date::parse(&text[position + " since ".len()..])?;
            let epoch = calendar.unwrap_or(Calendar::Standard).seconds(&date)?;
            result.definition = Some(definition);
            result.reference = Some(Reference {
                duration: duration.to_string(),
                date,
                epoch,
            });
        } else {
            result.definition = Some(parse_unit(text)?);
        }
        result.units = Some(text.to_string());
        Ok(result)
    }

    /// Return the units with a different calendar, which is canonical if [`Some`].
    ///
    /// # Errors
    /// Returns [`UnitsError::InvalidDate`] if the reference date does not exist in `calendar`.
    pub fn override_calendar(&self, calendar: Option<Calendar>) -> Result<Self, UnitsError> {
        Self::with_calendar(self.as_str(), calendar)
    }

    /// Returns true if the units are defined.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        self.definition.is_some()
    }

    /// The units string, empty if undefined.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.units.as_deref().unwrap_or("")
    }

    /// The calendar, if set.
    #[must_use]
    pub fn calendar(&self) -> Option<Calendar> {
        self.calendar
    }

    /// Returns true if the calendar was explicitly requested.
    #[must_use]
    pub fn has_canonical_calendar(&self) -> bool {
        self.canonical_calendar
    }

    /// The calendar used to count days of reference time units.
    #[must_use]
    pub fn reference_calendar(&self) -> Calendar {
        self.calendar.unwrap_or(Calendar::Standard)
    }

    /// Returns true for reference time units.
    #[must_use]
    pub fn is_reftime(&self) -> bool {
        self.reference.is_some()
    }

    /// The reference date of reference time units.
    #[must_use]
    pub fn reference_date(&self) -> Option<&Date> {
        self.reference.as_ref().map(|reference| &reference.date)
    }

    /// Returns true for defined units with no dimensions, e.g. `"1"`, `"%"`, `"radians"`.
    #[must_use]
    pub fn is_dimensionless(&self) -> bool {
        self.reference.is_none()
            && self
                .definition
                .is_some_and(|definition| definition.dimensions.is_dimensionless())
    }

    /// Returns true for units of time which are not reference time units.
    #[must_use]
    pub fn is_duration(&self) -> bool {
        self.reference.is_none()
            && self
                .definition
                .is_some_and(|definition| definition.dimensions == Dimensions::time())
    }

    /// Returns true for units with an offset, e.g. `"degC"`.
    #[must_use]
    pub fn is_shifted(&self) -> bool {
        self.reference.is_none()
            && self
                .definition
                .is_some_and(|definition| definition.offset != 0.0)
    }

    /// Returns true if values can be converted between the units.
    ///
    /// Undefined units are only equivalent to undefined units, and reference time units are only equivalent to reference time units with an equivalent calendar.
    #[must_use]
    pub fn equivalent(&self, other: &Self) -> bool {
        match (&self.definition, &other.definition) {
            (None, None) => true,
            (Some(a), Some(b)) => match (&self.reference, &other.reference) {
                (Some(_), Some(_)) => self
                    .reference_calendar()
                    .equivalent(&other.reference_calendar()),
                (None, None) => a.dimensions == b.dimensions,
                _ => false,
            },
            _ => false,
        }
    }

    /// Returns true if the units are equivalent and conversion between them is the identity.
    #[must_use]
    pub fn equals(&self, other: &Self) -> bool {
        self.conversion(other)
            .is_ok_and(|conversion| conversion.is_identity())
    }

    fn base_offset(&self) -> f64 {
        match (&self.reference, &self.definition) {
            (Some(reference), _) => reference.epoch,
            (None, Some(definition)) => definition.offset,
            (None, None) => 0.0,
        }
    }

    /// The conversion of values in these units to `to`.
    ///
    /// # Errors
    /// Returns [`UnitsError::Incompatible`] if the units are not equivalent.
    pub fn conversion(&self, to: &Self) -> Result<Conversion, UnitsError> {
        if !self.equivalent(to) {
            return Err(UnitsError::Incompatible(
                self.as_str().to_string(),
                to.as_str().to_string(),
            ));
        }
        match (&self.definition, &to.definition) {
            (Some(from_definition), Some(to_definition)) => Ok(Conversion {
                scale: from_definition.scale / to_definition.scale,
                offset: (self.base_offset() - to.base_offset()) / to_definition.scale,
            }),
            _ => Ok(Conversion::identity()),
        }
    }

    /// Convert a value in these units to `to`.
    ///
    /// # Errors
    /// Returns [`UnitsError::Incompatible`] if the units are not equivalent.
    pub fn convert(&self, value: f64, to: &Self) -> Result<f64, UnitsError> {
        Ok(self.conversion(to)?.apply(value))
    }

    fn algebra_error(&self, operation: &'static str, other: &Self) -> UnitsError {
        UnitsError::Algebra(
            operation,
            self.as_str().to_string(),
            other.as_str().to_string(),
        )
    }

    fn combined(text: String, definition: UnitDefinition) -> Self {
        Self {
            units: Some(text),
            definition: Some(definition),
            ..Self::undefined()
        }
    }

    /// Multiply units. Offsets are dropped and undefined units are the identity.
    ///
    /// # Errors
    /// Returns [`UnitsError::Algebra`] if either units are reference time units.
    pub fn mul(&self, other: &Self) -> Result<Self, UnitsError> {
        if self.is_reftime() || other.is_reftime() {
            return Err(self.algebra_error("multiply", other));
        }
        match (&self.definition, &other.definition) {
            (Some(a), Some(b)) => Ok(Self::combined(
                format!("{} {}", self.as_str(), other.as_str()),
                a.mul(b),
            )),
            (Some(_), None) => Ok(self.clone()),
            (None, _) => Ok(other.clone()),
        }
    }

    /// Divide units. Offsets are dropped and undefined units are the identity.
    ///
    /// # Errors
    /// Returns [`UnitsError::Algebra`] if either units are reference time units.
    pub fn div(&self, other: &Self) -> Result<Self, UnitsError> {
        if self.is_reftime() || other.is_reftime() {
            return Err(self.algebra_error("divide", other));
        }
        match (&self.definition, &other.definition) {
            (Some(a), Some(b)) => {
                let denominator = other.as_str();
                let simple = denominator
                    .chars()
                    .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '+'));
                let text = if simple {
                    format!("{}/{denominator}", self.as_str())
                } else {
                    format!("{}/({denominator})", self.as_str())
                };
                Ok(Self::combined(text, a.div(b)))
            }
            (Some(_), None) => Ok(self.clone()),
            (None, _) => other.powf(-1.0),
        }
    }

    /// Raise units to a power. Offsets are dropped.
    ///
    /// # Errors
    /// Returns [`UnitsError::Algebra`] for reference time units, or [`UnitsError::NonIntegralPower`] if a dimension would have a non-integral exponent.
    #[allow(clippy::float_cmp, clippy::cast_possible_truncation)]
    pub fn powf(&self, power: f64) -> Result<Self, UnitsError> {
        if self.is_reftime() {
            return Err(self.algebra_error("exponentiate", &Self::undefined()));
        }
        let Some(definition) = self.definition else {
            return Ok(self.clone());
        };
        if power == 1.0 {
            return Ok(self.clone());
        }
        let powered = definition
            .powf(power)
            .ok_or_else(|| UnitsError::NonIntegralPower(self.as_str().to_string(), power))?;
        let base = self.as_str();
        let base = if base.chars().all(|c| c.is_alphabetic() || c == '_') {
            base.to_string()
        } else {
            format!("({base})")
        };
        let text = if power.fract() == 0.0 {
            format!("{base}^{}", power as i64)
        } else {
            format!("{base}^{power}")
        };
        Ok(Self::combined(text, powered))
    }

    /// The units of a duration in the time unit of reference time units, e.g. `"days"` for `"days since 2000-01-01"`.
    ///
    /// # Errors
    /// Returns [`UnitsError::NotReferenceTime`] if the units are not reference time units.
    pub fn duration(&self) -> Result<Self, UnitsError> {
        match &self.reference {
            Some(reference) => Self::new(&reference.duration),
            None => Err(UnitsError::NotReferenceTime(self.as_str().to_string())),
        }
    }

    fn reference_parts(&self) -> Result<(f64, f64), UnitsError> {
        match (&self.reference, &self.definition) {
            (Some(reference), Some(definition)) => Ok((definition.scale, reference.epoch)),
            _ => Err(UnitsError::NotReferenceTime(self.as_str().to_string())),
        }
    }

    /// The date of a value in reference time units.
    ///
    /// # Errors
    /// Returns [`UnitsError::NotReferenceTime`] if the units are not reference time units, or [`UnitsError::InvalidDate`] if the value is not finite or too far from the epoch.
    pub fn num_to_date(&self, value: f64) -> Result<Date, UnitsError> {
        const MAX_SECONDS: f64 = 1e17;
        let (scale, epoch) = self.reference_parts()?;
        let seconds = value * scale + epoch;
        if !seconds.is_finite() || seconds.abs() > MAX_SECONDS {
            return Err(UnitsError::InvalidDate(format!("{value} {}", self.as_str())));
        }
        Ok(self.reference_calendar().date_from_seconds(seconds))
    }

    /// The value of a date in reference time units.
    ///
    /// # Errors
    /// Returns [`UnitsError::NotReferenceTime`] if the units are not reference time units, or [`UnitsError::InvalidDate`] if `date` does not exist in the calendar.
    pub fn date_to_num(&self, date: &Date) -> Result<f64, UnitsError> {
        let (scale, epoch) = self.reference_parts()?;
        Ok((self.reference_calendar().seconds(date)? - epoch) / scale)
    }
}

impl PartialEq for Units {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl std::str::FromStr for Units {
    type Err = UnitsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for Units {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.calendar, self.canonical_calendar) {
            (Some(calendar), true) if self.is_reftime() => {
                write!(f, "{} {calendar}", self.as_str())
            }
            _ => write!(f, "{}", self.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(text: &str) -> Units {
        Units::new(text).unwrap()
    }

    #[test]
    fn units_undefined() {
        let undefined = Units::new("").unwrap();
        assert!(!undefined.is_defined());
        assert!(undefined.equivalent(&Units::undefined()));
        assert!(!undefined.equivalent(&Units::dimensionless()));
        assert!(units("1").is_dimensionless());
        assert!(units("%").is_dimensionless());
        assert!(!units("m").is_dimensionless());
    }

    #[test]
    fn units_equivalence() {
        assert!(units("km").equivalent(&units("m")));
        assert!(!units("km").equals(&units("m")));
        assert!(units("metre").equals(&units("m")));
        assert!(units("m s-1").equals(&units("m/s")));
        assert!(!units("m").equivalent(&units("s")));
        assert!(!units("days").equivalent(&units("days since 2000-01-01")));
        assert!(units("days since 2000-01-01").equivalent(&units("hours since 1970-01-01")));
    }

    #[test]
    fn units_conversion() {
        assert!((units("km").convert(1.5, &units("m")).unwrap() - 1500.0).abs() < 1e-9);
        assert!((units("degC").convert(0.0, &units("K")).unwrap() - 273.15).abs() < 1e-9);
        assert!(units("degF").convert(32.0, &units("degC")).unwrap().abs() < 1e-9);
        assert!((units("K").convert(0.0, &units("degC")).unwrap() + 273.15).abs() < 1e-9);
        assert!(matches!(
            units("m").convert(1.0, &units("s")),
            Err(UnitsError::Incompatible(..))
        ));
    }

    #[test]
    fn units_reftime_conversion() {
        let days = units("days since 2000-01-01");
        let hours = units("hours since 2000-01-02");
        assert_eq!(days.convert(1.0, &hours).unwrap(), 0.0);
        assert_eq!(days.convert(2.5, &hours).unwrap(), 36.0);
        let days_360 = Units::with_calendar("days since 2000-01-01", Some(Calendar::Day360)).unwrap();
        assert!(!days.equivalent(&days_360));
        assert!(days_360.has_canonical_calendar());
        assert!(!days.has_canonical_calendar());
        assert_eq!(days_360.num_to_date(30.0).unwrap(), Date::new(2000, 2, 1));
        assert_eq!(days_360.date_to_num(&Date::new(2000, 2, 30)).unwrap(), 59.0);
        assert!(Units::with_calendar("days since 2000-02-30", Some(Calendar::Day360)).is_ok());
        assert!(Units::new("days since 2000-02-30").is_err());
        assert!(Units::new("m since 2000-01-01").is_err());
        assert!(units("days since 2000-01-01")
            .duration()
            .unwrap()
            .equals(&units("d")));
    }

    #[test]
    fn units_algebra() {
        let speed = units("m").div(&units("s")).unwrap();
        assert!(speed.equals(&units("m s-1")));
        let area = units("m").mul(&units("km")).unwrap();
        assert!(area.equivalent(&units("m2")));
        assert!((area.convert(1.0, &units("m2")).unwrap() - 1000.0).abs() < 1e-9);
        assert!(units("m s-1").powf(2.0).unwrap().equals(&units("m2 s-2")));
        assert!(units("W/m2").div(&units("K s")).unwrap().equals(&units("W m-2 K-1 s-1")));
        assert!(matches!(
            units("m").powf(0.5),
            Err(UnitsError::NonIntegralPower(..))
        ));
        assert!(units("m2").powf(0.5).unwrap().equals(&units("m")));
        assert!(!units("degC").mul(&units("m")).unwrap().is_shifted());
        assert!(units("days since 2000-01-01").mul(&units("m")).is_err());
        assert!(Units::undefined().mul(&units("m")).unwrap().equals(&units("m")));
        assert!(Units::undefined().div(&units("s")).unwrap().equals(&units("Hz")));
    }
}

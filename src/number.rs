//! SassScript numbers and their units.
//!
//! A [`Number`] carries a value plus a list of numerator units and a list of
//! denominator units, so `42`, `42px`, and `42px/s` are all representable.
//! Arithmetic converts between compatible units (e.g. `1in + 72pt` is
//! `2in`) and multiplication/division cancel units against each other.
//!
//! Numeric comparison uses a small epsilon to accommodate floating-point
//! round-off from unit conversion; see [`units_equal`].

use std::fmt;

use cssparser::{Parser, Token};
use float_cmp::approx_eq;
use itertools::Itertools;

use crate::error::*;
use crate::parsers::{finite_f64, Parse};

/// Epsilon for numeric comparison, roughly matching the precision with
/// which numbers are serialized (10 significant digits).
pub const EPSILON: f64 = 1e-11;

/// Conversion factors to each unit class's canonical unit.
///
/// Lengths canonicalize to `px`, angles to `deg`, time to `s`, frequency to
/// `Hz`, resolution to `dpi`.  A factor of `k` means `1 <unit> == k
/// <canonical>`.
const CONVERSIONS: &[&[(&str, f64)]] = &[
    &[
        ("px", 1.0),
        ("in", 96.0),
        ("cm", 96.0 / 2.54),
        ("mm", 96.0 / 25.4),
        ("q", 96.0 / 101.6),
        ("pt", 96.0 / 72.0),
        ("pc", 16.0),
    ],
    &[
        ("deg", 1.0),
        ("grad", 0.9),
        ("rad", 180.0 / std::f64::consts::PI),
        ("turn", 360.0),
    ],
    &[("s", 1.0), ("ms", 0.001)],
    &[("hz", 1.0), ("khz", 1000.0)],
    &[("dpi", 1.0), ("dpcm", 2.54), ("dppx", 96.0)],
];

/// Returns the factor to convert a value in `from` units into `to` units,
/// or `None` if the units belong to different classes.
pub fn conversion_factor(from: &str, to: &str) -> Option<f64> {
    if from.eq_ignore_ascii_case(to) {
        return Some(1.0);
    }

    for class in CONVERSIONS {
        let from_factor = class
            .iter()
            .find(|(unit, _)| from.eq_ignore_ascii_case(unit));
        let to_factor = class.iter().find(|(unit, _)| to.eq_ignore_ascii_case(unit));

        if let (Some((_, f)), Some((_, t))) = (from_factor, to_factor) {
            return Some(f / t);
        }
    }

    None
}

/// Compares two floats with the serialization-precision epsilon.
pub fn units_equal(a: f64, b: f64) -> bool {
    approx_eq!(f64, a, b, epsilon = EPSILON)
}

/// A SassScript number: a value with numerator and denominator units.
#[derive(Debug, Clone)]
pub struct Number {
    pub value: f64,
    pub numerator_units: Vec<String>,
    pub denominator_units: Vec<String>,
}

impl Number {
    /// A unitless number.
    pub fn unitless(value: f64) -> Number {
        Number {
            value,
            numerator_units: Vec::new(),
            denominator_units: Vec::new(),
        }
    }

    /// A number with a single numerator unit.
    pub fn with_unit(value: f64, unit: &str) -> Number {
        Number {
            value,
            numerator_units: vec![unit.to_string()],
            denominator_units: Vec::new(),
        }
    }

    pub fn new(value: f64, numerator_units: Vec<String>, denominator_units: Vec<String>) -> Number {
        Number {
            value,
            numerator_units,
            denominator_units,
        }
    }

    pub fn is_unitless(&self) -> bool {
        self.numerator_units.is_empty() && self.denominator_units.is_empty()
    }

    /// The string representation of this number's units, e.g. `px/s`.
    pub fn unit_string(&self) -> String {
        if self.is_unitless() {
            return String::new();
        }

        if self.denominator_units.is_empty() {
            self.numerator_units.iter().join("*")
        } else {
            format!(
                "{}/{}",
                self.numerator_units.iter().join("*"),
                self.denominator_units.iter().join("*")
            )
        }
    }

    /// Whether this number's units can be converted into `other`'s units.
    pub fn is_comparable_to(&self, other: &Number) -> bool {
        if self.is_unitless() || other.is_unitless() {
            return true;
        }

        self.convert_value(&other.numerator_units, &other.denominator_units)
            .is_ok()
    }

    /// Converts this number's value into the given units.
    ///
    /// Fails with a [`ScriptError`] if the unit lists are incompatible.
    pub fn convert_value(
        &self,
        numerator_units: &[String],
        denominator_units: &[String],
    ) -> Result<f64, ScriptError> {
        if self.numerator_units == numerator_units
            && self.denominator_units == denominator_units
        {
            return Ok(self.value);
        }

        // A unitless operand adopts the other operand's units.
        if self.is_unitless() {
            return Ok(self.value);
        }

        if numerator_units.is_empty() && denominator_units.is_empty() {
            return Err(ScriptError::new(format!(
                "expected {} to have no units",
                self
            )));
        }

        let mut value = self.value;
        value = convert_unit_list(value, &self.numerator_units, numerator_units, false)
            .ok_or_else(|| self.incompatible(numerator_units, denominator_units))?;
        value = convert_unit_list(value, &self.denominator_units, denominator_units, true)
            .ok_or_else(|| self.incompatible(numerator_units, denominator_units))?;

        Ok(value)
    }

    fn incompatible(&self, numerator_units: &[String], denominator_units: &[String]) -> ScriptError {
        let other = Number::new(
            0.0,
            numerator_units.to_vec(),
            denominator_units.to_vec(),
        );
        ScriptError::new(format!(
            "incompatible units {} and {}",
            self.unit_string(),
            other.unit_string()
        ))
    }

    /// Returns an equivalent number whose units match `other`'s.
    pub fn convert_to_match(&self, other: &Number) -> Result<Number, ScriptError> {
        if self.is_unitless() && !other.is_unitless() {
            return Ok(Number::new(
                self.value,
                other.numerator_units.clone(),
                other.denominator_units.clone(),
            ));
        }

        Ok(Number::new(
            self.convert_value(&other.numerator_units, &other.denominator_units)?,
            other.numerator_units.clone(),
            other.denominator_units.clone(),
        ))
    }

    /// Converts `other`'s value into this number's units; a unitless
    /// operand adopts the other operand's units.
    fn coerced_value(&self, other: &Number) -> Result<f64, ScriptError> {
        if self.is_unitless() {
            Ok(other.value)
        } else {
            other.convert_value(&self.numerator_units, &self.denominator_units)
        }
    }

    fn result_units(&self, other: &Number) -> (Vec<String>, Vec<String>) {
        let units = if self.is_unitless() { other } else { self };
        (
            units.numerator_units.clone(),
            units.denominator_units.clone(),
        )
    }

    pub fn add(&self, other: &Number) -> Result<Number, ScriptError> {
        let converted = self.coerced_value(other)?;
        let (numerator_units, denominator_units) = self.result_units(other);
        Ok(Number::new(
            self.value + converted,
            numerator_units,
            denominator_units,
        ))
    }

    pub fn subtract(&self, other: &Number) -> Result<Number, ScriptError> {
        let converted = self.coerced_value(other)?;
        let (numerator_units, denominator_units) = self.result_units(other);
        Ok(Number::new(
            self.value - converted,
            numerator_units,
            denominator_units,
        ))
    }

    pub fn multiply(&self, other: &Number) -> Number {
        multiply_units(
            self.value * other.value,
            self.numerator_units.clone(),
            self.denominator_units.clone(),
            other.numerator_units.clone(),
            other.denominator_units.clone(),
        )
    }

    pub fn divide(&self, other: &Number) -> Result<Number, ScriptError> {
        if other.value == 0.0 {
            return Err(ScriptError::new("division by zero"));
        }

        // Dividing swaps the right operand's numerators and denominators.
        Ok(multiply_units(
            self.value / other.value,
            self.numerator_units.clone(),
            self.denominator_units.clone(),
            other.denominator_units.clone(),
            other.numerator_units.clone(),
        ))
    }

    pub fn less_than(&self, other: &Number) -> Result<bool, ScriptError> {
        let converted = self.coerced_value(other)?;
        Ok(self.value < converted && !units_equal(self.value, converted))
    }

    pub fn less_than_or_equal(&self, other: &Number) -> Result<bool, ScriptError> {
        let converted = self.coerced_value(other)?;
        Ok(self.value < converted || units_equal(self.value, converted))
    }

    /// Fails unless this number has exactly the given unit.
    pub fn assert_unit(&self, unit: &str, name: &str) -> Result<(), ScriptError> {
        if self.numerator_units.len() == 1
            && self.denominator_units.is_empty()
            && self.numerator_units[0].eq_ignore_ascii_case(unit)
        {
            Ok(())
        } else {
            Err(ScriptError::for_argument(
                format!("expected {} to have unit \"{}\"", self, unit),
                name,
            ))
        }
    }

    /// Fails unless this number has no units.
    pub fn assert_no_units(&self, name: &str) -> Result<(), ScriptError> {
        if self.is_unitless() {
            Ok(())
        } else {
            Err(ScriptError::for_argument(
                format!("expected {} to have no units", self),
                name,
            ))
        }
    }

    /// Returns this number's value as an integer, failing if it is not one
    /// (within [`EPSILON`]).
    pub fn assert_int(&self, name: &str) -> Result<i64, ScriptError> {
        let rounded = self.value.round();
        if units_equal(self.value, rounded) {
            Ok(rounded as i64)
        } else {
            Err(ScriptError::for_argument(
                format!("{} is not an int", self),
                name,
            ))
        }
    }
}

/// Converts `value` between two unit lists, pairing off compatible units.
///
/// Returns `None` if a unit has no compatible counterpart.  `invert` flips
/// the factor for denominator units.
fn convert_unit_list(value: f64, from: &[String], to: &[String], invert: bool) -> Option<f64> {
    if from.len() != to.len() {
        return None;
    }

    let mut value = value;
    let mut remaining: Vec<&String> = to.iter().collect();

    for unit in from {
        let i = remaining
            .iter()
            .position(|other| conversion_factor(unit, other).is_some())?;
        let factor = conversion_factor(unit, remaining[i]).unwrap();
        remaining.remove(i);
        value *= if invert { 1.0 / factor } else { factor };
    }

    Some(value)
}

/// Multiplies two unit lists, cancelling numerators against denominators.
fn multiply_units(
    mut value: f64,
    num1: Vec<String>,
    mut den1: Vec<String>,
    num2: Vec<String>,
    mut den2: Vec<String>,
) -> Number {
    let mut numerators = Vec::new();

    for numerator in num1 {
        if let Some(i) = den2
            .iter()
            .position(|d| conversion_factor(&numerator, d).is_some())
        {
            value *= conversion_factor(&numerator, &den2[i]).unwrap();
            den2.remove(i);
        } else {
            numerators.push(numerator);
        }
    }

    for numerator in num2 {
        if let Some(i) = den1
            .iter()
            .position(|d| conversion_factor(&numerator, d).is_some())
        {
            value *= conversion_factor(&numerator, &den1[i]).unwrap();
            den1.remove(i);
        } else {
            numerators.push(numerator);
        }
    }

    den1.extend(den2);
    Number::new(value, numerators, den1)
}

impl PartialEq for Number {
    /// Two numbers are equal if their values coincide after unit
    /// conversion.
    fn eq(&self, other: &Number) -> bool {
        if self.is_unitless() != other.is_unitless() {
            return false;
        }

        match other.convert_value(&self.numerator_units, &self.denominator_units) {
            Ok(converted) => units_equal(self.value, converted),
            Err(_) => false,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit_string())
    }
}

impl Parse for Number {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Number, ParseError<'i>> {
        let token = parser.next()?.clone();

        match token {
            Token::Number { value, .. } => {
                let value = f64::from(value);
                finite_f64(value).map_err(|e| parser.new_custom_error(e))?;
                Ok(Number::unitless(value))
            }

            Token::Percentage { unit_value, .. } => {
                Ok(Number::with_unit(f64::from(unit_value) * 100.0, "%"))
            }

            Token::Dimension {
                value, ref unit, ..
            } => {
                let value = f64::from(value);
                finite_f64(value).map_err(|e| parser.new_custom_error(e))?;
                Ok(Number::with_unit(value, unit.as_ref()))
            }

            _ => Err(parser.new_unexpected_token_error(token)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbers() {
        assert_eq!(Number::parse_str("42").unwrap(), Number::unitless(42.0));
        assert_eq!(
            Number::parse_str("-42px").unwrap(),
            Number::with_unit(-42.0, "px")
        );
        assert_eq!(
            Number::parse_str("50%").unwrap(),
            Number::with_unit(50.0, "%")
        );
        assert!(Number::parse_str("foo").is_err());
    }

    #[test]
    fn converts_compatible_units() {
        let inches = Number::with_unit(1.0, "in");
        assert_eq!(inches.convert_value(&["px".to_string()], &[]).unwrap(), 96.0);
        assert_eq!(inches, Number::with_unit(96.0, "px"));
        assert_eq!(inches, Number::with_unit(72.0, "pt"));
        assert_ne!(inches, Number::with_unit(1.0, "px"));
    }

    #[test]
    fn rejects_incompatible_units() {
        let seconds = Number::with_unit(1.0, "s");
        assert!(seconds.convert_value(&["px".to_string()], &[]).is_err());
        assert!(seconds.add(&Number::with_unit(1.0, "deg")).is_err());
    }

    #[test]
    fn adds_with_conversion() {
        let sum = Number::with_unit(1.0, "in")
            .add(&Number::with_unit(72.0, "pt"))
            .unwrap();
        assert_eq!(sum, Number::with_unit(2.0, "in"));
        assert_eq!(sum.unit_string(), "in");
    }

    #[test]
    fn unitless_adopts_units() {
        let sum = Number::unitless(1.0).add(&Number::with_unit(2.0, "px")).unwrap();
        assert_eq!(sum, Number::with_unit(3.0, "px"));
    }

    #[test]
    fn multiplication_cancels_units() {
        let speed = Number::new(10.0, vec!["px".to_string()], vec!["s".to_string()]);
        let time = Number::with_unit(2.0, "s");

        let distance = speed.multiply(&time);
        assert_eq!(distance, Number::with_unit(20.0, "px"));
        assert_eq!(distance.unit_string(), "px");
    }

    #[test]
    fn division_produces_rates() {
        let distance = Number::with_unit(10.0, "px");
        let time = Number::with_unit(2.0, "s");

        let speed = distance.divide(&time).unwrap();
        assert_eq!(speed.value, 5.0);
        assert_eq!(speed.unit_string(), "px/s");

        assert!(distance.divide(&Number::unitless(0.0)).is_err());
    }

    #[test]
    fn comparison_uses_epsilon() {
        let a = Number::unitless(1.0);
        let b = Number::unitless(1.0 + 1e-13);
        assert_eq!(a, b);
        assert!(!a.less_than(&b).unwrap());
    }

    #[test]
    fn assert_int_rounds_within_epsilon() {
        assert_eq!(Number::unitless(2.0 + 1e-13).assert_int("n").unwrap(), 2);
        assert!(Number::unitless(2.5).assert_int("n").is_err());
    }
}

use std::f64::consts::PI;

use super::UnitsError;

/// Exponents of the SI base units: metre, kilogram, second, ampere, kelvin, mole, candela.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) struct Dimensions([i32; 7]);

const METRE: usize = 0;
const KILOGRAM: usize = 1;
const SECOND: usize = 2;
const AMPERE: usize = 3;
const KELVIN: usize = 4;
const MOLE: usize = 5;
const CANDELA: usize = 6;

impl Dimensions {
    fn new(exponents: [i32; 7]) -> Self {
        Self(exponents)
    }

    fn base(index: usize) -> Self {
        let mut exponents = [0; 7];
        exponents[index] = 1;
        Self(exponents)
    }

    pub(super) fn time() -> Self {
        Self::base(SECOND)
    }

    pub(super) fn is_dimensionless(&self) -> bool {
        self.0.iter().all(|&e| e == 0)
    }

    fn mul(&self, other: &Self) -> Self {
        Self(std::array::from_fn(|i| self.0[i] + other.0[i]))
    }

    fn div(&self, other: &Self) -> Self {
        Self(std::array::from_fn(|i| self.0[i] - other.0[i]))
    }

    /// Raise to `power`, or [`None`] if an exponent would be non-integral.
    #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
    fn powf(&self, power: f64) -> Option<Self> {
        let mut exponents = [0; 7];
        for (exponent, &e) in exponents.iter_mut().zip(&self.0) {
            let value = f64::from(e) * power;
            if value.fract() != 0.0 {
                return None;
            }
            *exponent = value as i32;
        }
        Some(Self(exponents))
    }
}

/// A linear unit: `value * scale + offset` in SI base units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct UnitDefinition {
    pub(super) dimensions: Dimensions,
    pub(super) scale: f64,
    pub(super) offset: f64,
}

impl UnitDefinition {
    fn new(dimensions: Dimensions, scale: f64) -> Self {
        Self {
            dimensions,
            scale,
            offset: 0.0,
        }
    }

    fn shifted(dimensions: Dimensions, scale: f64, offset: f64) -> Self {
        Self {
            dimensions,
            scale,
            offset,
        }
    }

    fn number(value: f64) -> Self {
        Self::new(Dimensions::new([0; 7]), value)
    }

    pub(super) fn mul(&self, other: &Self) -> Self {
        Self::new(
            self.dimensions.mul(&other.dimensions),
            self.scale * other.scale,
        )
    }

    pub(super) fn div(&self, other: &Self) -> Self {
        Self::new(
            self.dimensions.div(&other.dimensions),
            self.scale / other.scale,
        )
    }

    /// Raise to `power`, dropping any offset, or [`None`] if the dimensions would have a non-integral exponent.
    pub(super) fn powf(&self, power: f64) -> Option<Self> {
        Some(Self::new(
            self.dimensions.powf(power)?,
            self.scale.powf(power),
        ))
    }
}

const PREFIXES: [(&str, f64); 40] = [
    ("yotta", 1e24),
    ("zetta", 1e21),
    ("exa", 1e18),
    ("peta", 1e15),
    ("tera", 1e12),
    ("giga", 1e9),
    ("mega", 1e6),
    ("kilo", 1e3),
    ("hecto", 1e2),
    ("deka", 1e1),
    ("deca", 1e1),
    ("deci", 1e-1),
    ("centi", 1e-2),
    ("milli", 1e-3),
    ("micro", 1e-6),
    ("nano", 1e-9),
    ("pico", 1e-12),
    ("femto", 1e-15),
    ("atto", 1e-18),
    ("zepto", 1e-21),
    ("yocto", 1e-24),
    ("da", 1e1),
    ("Y", 1e24),
    ("Z", 1e21),
    ("E", 1e18),
    ("P", 1e15),
    ("T", 1e12),
    ("G", 1e9),
    ("M", 1e6),
    ("k", 1e3),
    ("h", 1e2),
    ("d", 1e-1),
    ("c", 1e-2),
    ("m", 1e-3),
    ("u", 1e-6),
    ("µ", 1e-6),
    ("n", 1e-9),
    ("p", 1e-12),
    ("f", 1e-15),
    ("a", 1e-18),
];

const SECONDS_PER_YEAR: f64 = 31_556_925.974_7;

fn named_unit(name: &str) -> Option<UnitDefinition> {
    use UnitDefinition as U;
    let dimensionless = Dimensions::default();
    let length = Dimensions::base(METRE);
    let mass = Dimensions::base(KILOGRAM);
    let time = Dimensions::base(SECOND);
    let temperature = Dimensions::base(KELVIN);
    let force = Dimensions::new([1, 1, -2, 0, 0, 0, 0]);
    let energy = Dimensions::new([2, 1, -2, 0, 0, 0, 0]);
    Some(match name {
        "m" | "metre" | "meter" => U::new(length, 1.0),
        "g" | "gram" | "gramme" => U::new(mass, 1e-3),
        "t" | "tonne" => U::new(mass, 1e3),
        "s" | "sec" | "second" => U::new(time, 1.0),
        "min" | "minute" => U::new(time, 60.0),
        "h" | "hr" | "hour" => U::new(time, 3600.0),
        "d" | "day" => U::new(time, 86400.0),
        "week" => U::new(time, 7.0 * 86400.0),
        "yr" | "year" => U::new(time, SECONDS_PER_YEAR),
        "month" => U::new(time, SECONDS_PER_YEAR / 12.0),
        "A" | "ampere" => U::new(Dimensions::base(AMPERE), 1.0),
        "K" | "kelvin" => U::new(temperature, 1.0),
        "degC" | "deg_C" | "celsius" | "degree_Celsius" | "degrees_Celsius" | "degree_C"
        | "degrees_C" => U::shifted(temperature, 1.0, 273.15),
        "degF" | "deg_F" | "fahrenheit" | "degree_Fahrenheit" | "degrees_Fahrenheit"
        | "degree_F" | "degrees_F" => U::shifted(temperature, 5.0 / 9.0, 459.67 * 5.0 / 9.0),
        "mol" | "mole" => U::new(Dimensions::base(MOLE), 1.0),
        "cd" | "candela" => U::new(Dimensions::base(CANDELA), 1.0),
        "rad" | "radian" => U::new(dimensionless, 1.0),
        "sr" | "steradian" => U::new(dimensionless, 1.0),
        "degree" | "degrees" | "arc_degree" | "angular_degree" | "degree_north"
        | "degrees_north" | "degree_N" | "degrees_N" | "degreeN" | "degree_east"
        | "degrees_east" | "degree_E" | "degrees_E" | "degreeE" | "degree_true"
        | "degrees_true" => U::new(dimensionless, PI / 180.0),
        "Pa" | "pascal" => U::new(Dimensions::new([-1, 1, -2, 0, 0, 0, 0]), 1.0),
        "bar" => U::new(Dimensions::new([-1, 1, -2, 0, 0, 0, 0]), 1e5),
        "N" | "newton" => U::new(force, 1.0),
        "J" | "joule" => U::new(energy, 1.0),
        "W" | "watt" => U::new(Dimensions::new([2, 1, -3, 0, 0, 0, 0]), 1.0),
        "Hz" | "hertz" => U::new(Dimensions::new([0, 0, -1, 0, 0, 0, 0]), 1.0),
        "C" | "coulomb" => U::new(Dimensions::new([0, 0, 1, 1, 0, 0, 0]), 1.0),
        "V" | "volt" => U::new(Dimensions::new([2, 1, -3, -1, 0, 0, 0]), 1.0),
        "l" | "L" | "litre" | "liter" => U::new(Dimensions::new([3, 0, 0, 0, 0, 0, 0]), 1e-3),
        "%" | "percent" => U::new(dimensionless, 1e-2),
        "ppm" => U::new(dimensionless, 1e-6),
        _ => return None,
    })
}

/// Look up a unit name, allowing plural names and SI prefixes.
fn lookup(name: &str) -> Option<UnitDefinition> {
    let singular = |name: &str| {
        named_unit(name).or_else(|| {
            name.strip_suffix('s')
                .filter(|stem| stem.len() > 2)
                .and_then(named_unit)
        })
    };
    singular(name).or_else(|| {
        PREFIXES.iter().find_map(|(prefix, factor)| {
            let rest = name.strip_prefix(prefix).filter(|rest| !rest.is_empty())?;
            let unit = singular(rest)?;
            (unit.offset == 0.0).then(|| UnitDefinition::new(unit.dimensions, unit.scale * factor))
        })
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Name(String),
    Multiply,
    Divide,
    Power,
    Open,
    Close,
}

fn is_name_char(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '%' || c == 'µ'
}

fn tokenize(text: &str) -> Result<Vec<Token>, UnitsError> {
    let error = |message: &str| UnitsError::Parse(text.to_string(), message.to_string());
    let chars: Vec<char> = text.chars().collect();
    let number_end = |start: usize| {
        let mut end = start;
        if matches!(chars.get(end), Some('-' | '+')) {
            end += 1;
        }
        while chars.get(end).is_some_and(char::is_ascii_digit) {
            end += 1;
        }
        if chars.get(end) == Some(&'.') && chars.get(end + 1).is_some_and(char::is_ascii_digit)
        {
            end += 1;
            while chars.get(end).is_some_and(char::is_ascii_digit) {
                end += 1;
            }
        }
        if matches!(chars.get(end), Some('e' | 'E'))
            && (chars.get(end + 1).is_some_and(char::is_ascii_digit)
                || (matches!(chars.get(end + 1), Some('-' | '+'))
                    && chars.get(end + 2).is_some_and(char::is_ascii_digit)))
        {
            end += 2;
            while chars.get(end).is_some_and(char::is_ascii_digit) {
                end += 1;
            }
        }
        end
    };
    let parse_number = |start: usize, end: usize| {
        chars[start..end]
            .iter()
            .collect::<String>()
            .parse::<f64>()
            .map_err(|_| error("invalid number"))
    };

    // an integer directly after a name or group is an exponent, e.g. m2 or s-1
    let push_exponent = |tokens: &mut Vec<Token>, start: usize| -> Result<usize, UnitsError> {
        let sign = usize::from(matches!(chars.get(start), Some('-' | '+')));
        if !chars.get(start + sign).is_some_and(char::is_ascii_digit) {
            return Ok(start);
        }
        let mut end = start + sign;
        while chars.get(end).is_some_and(char::is_ascii_digit) {
            end += 1;
        }
        tokens.push(Token::Power);
        tokens.push(Token::Number(parse_number(start, end)?));
        Ok(end)
    };

    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        if c.is_whitespace() {
            i += 1;
        } else if c == '*' && next == Some('*') {
            tokens.push(Token::Power);
            i += 2;
        } else if matches!(c, '*' | '.' | '·') {
            tokens.push(Token::Multiply);
            i += 1;
        } else if c == '/' {
            tokens.push(Token::Divide);
            i += 1;
        } else if c == '^' {
            tokens.push(Token::Power);
            i += 1;
        } else if c == '(' {
            tokens.push(Token::Open);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::Close);
            i = push_exponent(&mut tokens, i + 1)?;
        } else if c.is_ascii_digit()
            || (matches!(c, '-' | '+') && next.is_some_and(|n| n.is_ascii_digit()))
        {
            let end = number_end(i);
            tokens.push(Token::Number(parse_number(i, end)?));
            i = end;
        } else if is_name_char(c) {
            let start = i;
            while chars.get(i).copied().is_some_and(is_name_char) {
                i += 1;
            }
            tokens.push(Token::Name(chars[start..i].iter().collect()));
            i = push_exponent(&mut tokens, i)?;
        } else {
            return Err(error(&format!("unexpected character {c:?}")));
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    position: usize,
}

impl Parser<'_> {
    fn error(&self, message: impl Into<String>) -> UnitsError {
        UnitsError::Parse(self.text.to_string(), message.into())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn product(&mut self) -> Result<UnitDefinition, UnitsError> {
        let mut unit = self.power()?;
        loop {
            match self.peek() {
                Some(Token::Multiply) => {
                    self.position += 1;
                    unit = unit.mul(&self.power()?);
                }
                Some(Token::Divide) => {
                    self.position += 1;
                    unit = unit.div(&self.power()?);
                }
                Some(Token::Number(_) | Token::Name(_) | Token::Open) => {
                    unit = unit.mul(&self.power()?);
                }
                _ => return Ok(unit),
            }
        }
    }

    fn power(&mut self) -> Result<UnitDefinition, UnitsError> {
        let unit = self.primary()?;
        if self.peek() == Some(&Token::Power) {
            self.position += 1;
            let Some(Token::Number(exponent)) = self.next() else {
                return Err(self.error("expected an exponent"));
            };
            unit.powf(exponent)
                .ok_or_else(|| self.error(format!("non-integral exponent {exponent}")))
        } else {
            Ok(unit)
        }
    }

    fn primary(&mut self) -> Result<UnitDefinition, UnitsError> {
        match self.next() {
            Some(Token::Number(value)) => Ok(UnitDefinition::number(value)),
            Some(Token::Name(name)) => {
                lookup(&name).ok_or_else(|| UnitsError::UnknownUnit(name.clone()))
            }
            Some(Token::Open) => {
                let unit = self.product()?;
                match self.next() {
                    Some(Token::Close) => Ok(unit),
                    _ => Err(self.error("unbalanced parentheses")),
                }
            }
            _ => Err(self.error("expected a unit")),
        }
    }
}

/// Parse a unit string into a linear definition.
pub(super) fn parse_unit(text: &str) -> Result<UnitDefinition, UnitsError> {
    let mut parser = Parser {
        text,
        tokens: tokenize(text)?,
        position: 0,
    };
    let unit = parser.product()?;
    if parser.position < parser.tokens.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-12 * a.abs().max(b.abs())
    }

    #[test]
    fn parse_simple() {
        let unit = parse_unit("m").unwrap();
        assert_eq!(unit.dimensions, Dimensions::base(METRE));
        assert_eq!(unit.scale, 1.0);
        assert!(close(parse_unit("km").unwrap().scale, 1e3));
        assert!(close(parse_unit("hPa").unwrap().scale, 100.0));
        assert!(close(parse_unit("ms").unwrap().scale, 1e-3));
        assert!(close(parse_unit("days").unwrap().scale, 86400.0));
        assert!(close(parse_unit("kilometres").unwrap().scale, 1e3));
        assert_eq!(
            parse_unit("cd").unwrap().dimensions,
            Dimensions::base(CANDELA)
        );
    }

    #[test]
    fn parse_products() {
        let velocity = Dimensions::new([1, 0, -1, 0, 0, 0, 0]);
        for text in ["m s-1", "m/s", "m.s-1", "m*s^-1", "m s**-1", "(s/m)-1"] {
            assert_eq!(parse_unit(text).unwrap().dimensions, velocity, "{text}");
        }
        let flux = parse_unit("kg m-2 s-1").unwrap();
        assert_eq!(flux.dimensions, Dimensions::new([-2, 1, -1, 0, 0, 0, 0]));
        assert!(close(flux.scale, 1.0));
        assert!(close(parse_unit("0.001 kg").unwrap().scale, 1e-3));
        assert!(close(parse_unit("0.001 g").unwrap().scale, 1e-6));
        assert!(close(parse_unit("1e3 m2").unwrap().scale, 1e3));
        assert!(parse_unit("m/s2").unwrap().dimensions == Dimensions::new([1, 0, -2, 0, 0, 0, 0]));
    }

    #[test]
    fn parse_shifted() {
        let celsius = parse_unit("degC").unwrap();
        assert_eq!(celsius.offset, 273.15);
        assert_eq!(parse_unit("degC m").unwrap().offset, 0.0);
        assert!(parse_unit("kdegC").is_err());
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(parse_unit("furlong"), Err(UnitsError::UnknownUnit(_))));
        assert!(matches!(parse_unit("(m"), Err(UnitsError::Parse(..))));
        assert!(matches!(parse_unit("m^"), Err(UnitsError::Parse(..))));
        assert!(matches!(parse_unit("m$"), Err(UnitsError::Parse(..))));
        assert!(parse_unit("m^0.5").is_err());
    }
}

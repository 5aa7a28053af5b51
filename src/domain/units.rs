//! Units, dimensions and unit-tagged quantities.
//!
//! Every unit is described by a [`Dimension`] (a vector of exponents over
//! the base dimensions) and a factor that converts a value expressed in the
//! unit into the base unit of that dimension. A [`Quantity`] stores its
//! magnitude in base units and keeps the unit expression it should be
//! displayed in, so conversions never lose precision through repeated
//! rescaling.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::fmt;

use super::errors::{EvalError, EvalResult};

pub const DIMENSIONS: usize = 10;

pub const LENGTH: usize = 0;
pub const MASS: usize = 1;
pub const TIME: usize = 2;
pub const CURRENT: usize = 3;
pub const TEMPERATURE: usize = 4;
pub const AMOUNT: usize = 5;
pub const LUMINOSITY: usize = 6;
pub const ANGLE: usize = 7;
pub const INFORMATION: usize = 8;
pub const CURRENCY: usize = 9;

/// Exponents over the base dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimension([i8; DIMENSIONS]);

impl Dimension {
    pub const NONE: Dimension = Dimension([0; DIMENSIONS]);

    pub const fn base(index: usize) -> Self {
        let mut exponents = [0; DIMENSIONS];
        exponents[index] = 1;
        Dimension(exponents)
    }

    const fn of(exponents: [i8; DIMENSIONS]) -> Self {
        Dimension(exponents)
    }

    /// Adds exponents; `None` when one leaves the `i8` range.
    pub fn checked_mul(self, other: Dimension) -> Option<Dimension> {
        let mut exponents = self.0;
        for (exp, rhs) in exponents.iter_mut().zip(other.0) {
            *exp = exp.checked_add(rhs)?;
        }
        Some(Dimension(exponents))
    }

    pub fn checked_div(self, other: Dimension) -> Option<Dimension> {
        self.checked_mul(other.checked_pow(-1)?)
    }

    pub fn checked_pow(self, power: i32) -> Option<Dimension> {
        let mut exponents = self.0;
        for exp in exponents.iter_mut() {
            *exp = i8::try_from(i32::from(*exp).checked_mul(power)?).ok()?;
        }
        Some(Dimension(exponents))
    }

    pub fn is_dimensionless(&self) -> bool {
        self.0.iter().all(|&exp| exp == 0)
    }

    pub fn is_time(&self) -> bool {
        *self == Dimension::base(TIME)
    }
}

/// Which prefixes may be attached to a unit name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixKind {
    None,
    Short,
    Long,
}

const SHORT_PREFIXES: &[(&str, f64)] = &[
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

const LONG_PREFIXES: &[(&str, f64)] = &[
    ("tera", 1e12),
    ("giga", 1e9),
    ("mega", 1e6),
    ("kilo", 1e3),
    ("hecto", 1e2),
    ("deca", 1e1),
    ("deci", 1e-1),
    ("centi", 1e-2),
    ("milli", 1e-3),
    ("micro", 1e-6),
    ("nano", 1e-9),
    ("pico", 1e-12),
];

/// A named unit registered in a [`UnitTable`].
#[derive(Debug, Clone, PartialEq)]
pub struct UnitDef {
    pub dimension: Dimension,
    pub factor: f64,
    pub prefixes: PrefixKind,
}

/// A resolved unit, possibly carrying a prefix, as written by the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub name: String,
    pub dimension: Dimension,
    pub factor: f64,
}

impl Unit {
    pub fn new(name: impl Into<String>, dimension: Dimension, factor: f64) -> Self {
        Self {
            name: name.into(),
            dimension,
            factor,
        }
    }
}

struct Builtin {
    names: &'static [&'static str],
    dimension: Dimension,
    factor: f64,
    prefixes: PrefixKind,
}

const fn unit(
    names: &'static [&'static str],
    dimension: Dimension,
    factor: f64,
    prefixes: PrefixKind,
) -> Builtin {
    Builtin {
        names,
        dimension,
        factor,
        prefixes,
    }
}

const L: Dimension = Dimension::base(LENGTH);
const M: Dimension = Dimension::base(MASS);
const T: Dimension = Dimension::base(TIME);
const VOLUME: Dimension = Dimension::of([3, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
const FREQUENCY: Dimension = Dimension::of([0, 0, -1, 0, 0, 0, 0, 0, 0, 0]);
const VELOCITY: Dimension = Dimension::of([1, 0, -1, 0, 0, 0, 0, 0, 0, 0]);
const FORCE: Dimension = Dimension::of([1, 1, -2, 0, 0, 0, 0, 0, 0, 0]);
const ENERGY: Dimension = Dimension::of([2, 1, -2, 0, 0, 0, 0, 0, 0, 0]);
const POWER: Dimension = Dimension::of([2, 1, -3, 0, 0, 0, 0, 0, 0, 0]);
const PRESSURE: Dimension = Dimension::of([-1, 1, -2, 0, 0, 0, 0, 0, 0, 0]);
const VOLTAGE: Dimension = Dimension::of([2, 1, -3, -1, 0, 0, 0, 0, 0, 0]);

const BUILTIN_UNITS: &[Builtin] = &[
    // length
    unit(&["m"], L, 1.0, PrefixKind::Short),
    unit(&["meter", "meters", "metre", "metres"], L, 1.0, PrefixKind::Long),
    unit(&["inch", "inches"], L, 0.0254, PrefixKind::None),
    unit(&["ft", "foot", "feet"], L, 0.3048, PrefixKind::None),
    unit(&["yd", "yard", "yards"], L, 0.9144, PrefixKind::None),
    unit(&["mi", "mile", "miles"], L, 1609.344, PrefixKind::None),
    unit(&["nmi"], L, 1852.0, PrefixKind::None),
    // mass
    unit(&["g"], M, 1e-3, PrefixKind::Short),
    unit(&["gram", "grams"], M, 1e-3, PrefixKind::Long),
    unit(&["t", "tonne", "tonnes"], M, 1e3, PrefixKind::None),
    unit(&["lb", "lbs", "pound", "pounds"], M, 0.45359237, PrefixKind::None),
    unit(&["oz", "ounce", "ounces"], M, 0.028349523125, PrefixKind::None),
    // time
    unit(&["s"], T, 1.0, PrefixKind::Short),
    unit(&["sec", "secs", "second", "seconds"], T, 1.0, PrefixKind::Long),
    unit(&["min", "mins", "minute", "minutes"], T, 60.0, PrefixKind::None),
    unit(&["h", "hr", "hrs", "hour", "hours"], T, 3600.0, PrefixKind::None),
    unit(&["day", "days"], T, 86_400.0, PrefixKind::None),
    unit(&["week", "weeks"], T, 604_800.0, PrefixKind::None),
    unit(&["month", "months"], T, 2_629_800.0, PrefixKind::None),
    unit(&["year", "years"], T, 31_557_600.0, PrefixKind::None),
    // electric current, temperature, amount, luminosity
    unit(&["A"], Dimension::base(CURRENT), 1.0, PrefixKind::Short),
    unit(&["ampere", "amperes"], Dimension::base(CURRENT), 1.0, PrefixKind::Long),
    unit(&["K"], Dimension::base(TEMPERATURE), 1.0, PrefixKind::Short),
    unit(&["kelvin"], Dimension::base(TEMPERATURE), 1.0, PrefixKind::None),
    unit(&["mol"], Dimension::base(AMOUNT), 1.0, PrefixKind::Short),
    unit(&["cd"], Dimension::base(LUMINOSITY), 1.0, PrefixKind::None),
    // angle
    unit(&["rad"], Dimension::base(ANGLE), 1.0, PrefixKind::Short),
    unit(&["radian", "radians"], Dimension::base(ANGLE), 1.0, PrefixKind::Long),
    unit(&["deg", "degree", "degrees"], Dimension::base(ANGLE), PI / 180.0, PrefixKind::None),
    // information
    unit(&["b"], Dimension::base(INFORMATION), 1.0, PrefixKind::Short),
    unit(&["bit", "bits"], Dimension::base(INFORMATION), 1.0, PrefixKind::Long),
    unit(&["B"], Dimension::base(INFORMATION), 8.0, PrefixKind::Short),
    unit(&["byte", "bytes"], Dimension::base(INFORMATION), 8.0, PrefixKind::Long),
    // derived
    unit(&["L", "l"], VOLUME, 1e-3, PrefixKind::Short),
    unit(&["liter", "liters", "litre", "litres"], VOLUME, 1e-3, PrefixKind::Long),
    unit(&["Hz"], FREQUENCY, 1.0, PrefixKind::Short),
    unit(&["mph"], VELOCITY, 0.44704, PrefixKind::None),
    unit(&["N"], FORCE, 1.0, PrefixKind::Short),
    unit(&["J"], ENERGY, 1.0, PrefixKind::Short),
    unit(&["cal"], ENERGY, 4.184, PrefixKind::Short),
    unit(&["Wh"], ENERGY, 3600.0, PrefixKind::Short),
    unit(&["W"], POWER, 1.0, PrefixKind::Short),
    unit(&["Pa"], PRESSURE, 1.0, PrefixKind::Short),
    unit(&["V"], VOLTAGE, 1.0, PrefixKind::Short),
];

/// Lookup table for the built-in units, including SI prefixes.
#[derive(Debug, Clone)]
pub struct UnitTable {
    units: HashMap<String, UnitDef>,
}

impl UnitTable {
    pub fn new() -> Self {
        let mut units = HashMap::new();
        for builtin in BUILTIN_UNITS {
            for name in builtin.names {
                units.insert(
                    name.to_string(),
                    UnitDef {
                        dimension: builtin.dimension,
                        factor: builtin.factor,
                        prefixes: builtin.prefixes,
                    },
                );
            }
        }
        Self { units }
    }

    /// Resolves a unit name, trying an exact match before prefixed forms.
    pub fn lookup(&self, name: &str) -> Option<Unit> {
        if let Some(def) = self.units.get(name) {
            return Some(Unit::new(name, def.dimension, def.factor));
        }

        for (kind, prefixes) in [(PrefixKind::Short, SHORT_PREFIXES), (PrefixKind::Long, LONG_PREFIXES)] {
            for (prefix, scale) in prefixes {
                let Some(rest) = name.strip_prefix(prefix) else {
                    continue;
                };
                if let Some(def) = self.units.get(rest) {
                    if def.prefixes == kind {
                        return Some(Unit::new(name, def.dimension, def.factor * scale));
                    }
                }
            }
        }

        None
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl Default for UnitTable {
    fn default() -> Self {
        Self::new()
    }
}

/// One factor of a unit expression, such as `s^-2`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitPower {
    pub unit: Unit,
    pub power: i32,
}

/// A product of units raised to integer powers, e.g. `kg m / s^2`.
///
/// The combined dimension is computed as terms are combined, so an
/// expression whose exponents do not fit a [`Dimension`] is never built.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnitExpr {
    terms: Vec<UnitPower>,
    dimension: Dimension,
}

impl UnitExpr {
    pub fn single(unit: Unit) -> Self {
        UnitExpr {
            dimension: unit.dimension,
            terms: vec![UnitPower { unit, power: 1 }],
        }
    }

    pub fn terms(&self) -> &[UnitPower] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Factor converting a value in this expression into base units.
    pub fn factor(&self) -> f64 {
        self.terms
            .iter()
            .map(|term| term.unit.factor.powi(term.power))
            .product()
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn mul(&self, other: &UnitExpr) -> EvalResult<UnitExpr> {
        let dimension = self
            .dimension
            .checked_mul(other.dimension)
            .ok_or(EvalError::ExponentOverflow)?;

        let mut terms = self.terms.clone();
        for term in &other.terms {
            match terms.iter_mut().find(|t| t.unit.name == term.unit.name) {
                Some(existing) => {
                    existing.power = existing
                        .power
                        .checked_add(term.power)
                        .ok_or(EvalError::ExponentOverflow)?;
                }
                None => terms.push(term.clone()),
            }
        }
        terms.retain(|t| t.power != 0);
        Ok(UnitExpr { terms, dimension })
    }

    pub fn div(&self, other: &UnitExpr) -> EvalResult<UnitExpr> {
        self.mul(&other.pow(-1)?)
    }

    pub fn pow(&self, power: i32) -> EvalResult<UnitExpr> {
        let dimension = self
            .dimension
            .checked_pow(power)
            .ok_or(EvalError::ExponentOverflow)?;

        let mut terms = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            let power = term.power.checked_mul(power).ok_or(EvalError::ExponentOverflow)?;
            if power != 0 {
                terms.push(UnitPower {
                    unit: term.unit.clone(),
                    power,
                });
            }
        }
        Ok(UnitExpr { terms, dimension })
    }
}

impl fmt::Display for UnitExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let numerator: Vec<&UnitPower> = self.terms.iter().filter(|t| t.power > 0).collect();
        let denominator: Vec<&UnitPower> = self.terms.iter().filter(|t| t.power < 0).collect();

        let render = |term: &UnitPower, power: i32| {
            if power == 1 {
                term.unit.name.clone()
            } else {
                format!("{}^{}", term.unit.name, power)
            }
        };

        if numerator.is_empty() {
            let parts: Vec<String> = denominator.iter().map(|t| render(t, t.power)).collect();
            return write!(f, "{}", parts.join(" "));
        }

        let top: Vec<String> = numerator.iter().map(|t| render(t, t.power)).collect();
        write!(f, "{}", top.join(" "))?;

        if !denominator.is_empty() {
            let bottom: Vec<String> = denominator.iter().map(|t| render(t, -t.power)).collect();
            if bottom.len() == 1 {
                write!(f, " / {}", bottom[0])?;
            } else {
                write!(f, " / ({})", bottom.join(" "))?;
            }
        }

        Ok(())
    }
}

/// A magnitude tagged with a unit expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    /// Magnitude in base units of `dimension`.
    pub base_value: f64,
    pub dimension: Dimension,
    /// Units the quantity is displayed in.
    pub units: UnitExpr,
}

impl Quantity {
    /// Builds a quantity from a value expressed in `units`.
    pub fn new(value: f64, units: UnitExpr) -> Self {
        Self {
            base_value: value * units.factor(),
            dimension: units.dimension(),
            units,
        }
    }

    pub fn from_base(base_value: f64, units: UnitExpr) -> Self {
        Self {
            base_value,
            dimension: units.dimension(),
            units,
        }
    }

    /// Magnitude expressed in the display units.
    pub fn value(&self) -> f64 {
        self.base_value / self.units.factor()
    }

    pub fn to(&self, target: &UnitExpr) -> EvalResult<Quantity> {
        if self.dimension != target.dimension() {
            return Err(EvalError::UnitMismatch {
                left: self.units.to_string(),
                right: target.to_string(),
            });
        }
        Ok(Quantity::from_base(self.base_value, target.clone()))
    }

    pub fn with_base_value(&self, base_value: f64) -> Quantity {
        Quantity {
            base_value,
            dimension: self.dimension,
            units: self.units.clone(),
        }
    }

    pub fn ensure_same_dimension(&self, other: &Quantity) -> EvalResult<()> {
        if self.dimension == other.dimension {
            Ok(())
        } else {
            Err(EvalError::UnitMismatch {
                left: self.units.to_string(),
                right: other.units.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Unit {
        UnitTable::new().lookup(name).unwrap()
    }

    #[test]
    fn test_exact_lookup_wins_over_prefix() {
        let min = lookup("min");
        assert_eq!(min.factor, 60.0);
        assert!(min.dimension.is_time());

        let pa = lookup("Pa");
        assert_eq!(pa.factor, 1.0);
    }

    #[test]
    fn test_prefixed_lookup() {
        assert_eq!(lookup("km").factor, 1000.0);
        assert!((lookup("ms").factor - 0.001).abs() < 1e-15);
        assert_eq!(lookup("kg").factor, 1.0);
        assert_eq!(lookup("kilometers").factor, 1000.0);
        assert_eq!(lookup("kWh").factor, 3.6e6);
    }

    #[test]
    fn test_prefix_kind_is_respected() {
        let table = UnitTable::new();
        assert!(table.lookup("kmin").is_none());
        assert!(table.lookup("kmeter").is_none());
        assert!(table.lookup("kilom").is_none());
        assert!(table.lookup("furlong").is_none());
    }

    #[test]
    fn test_quantity_conversion() {
        let q = Quantity::new(1.5, UnitExpr::single(lookup("km")));
        let m = q.to(&UnitExpr::single(lookup("m"))).unwrap();
        assert!((m.value() - 1500.0).abs() < 1e-9);

        let err = q.to(&UnitExpr::single(lookup("s"))).unwrap_err();
        assert!(matches!(err, EvalError::UnitMismatch { .. }));
    }

    #[test]
    fn test_unit_expr_algebra() {
        let m = UnitExpr::single(lookup("m"));
        let s = UnitExpr::single(lookup("s"));
        let velocity = m.div(&s).unwrap();
        assert_eq!(velocity.to_string(), "m / s");
        assert_eq!(velocity.dimension(), VELOCITY);

        let area = m.mul(&m).unwrap();
        assert_eq!(area.to_string(), "m^2");
        assert!(area.div(&m).unwrap().div(&m).unwrap().is_empty());

        let kg = UnitExpr::single(lookup("kg"));
        let force = kg.mul(&m).unwrap().div(&s.pow(2).unwrap()).unwrap();
        assert_eq!(force.to_string(), "kg m / s^2");
        assert_eq!(force.dimension(), FORCE);
        assert_eq!(s.pow(-1).unwrap().to_string(), "s^-1");
    }

    #[test]
    fn test_dimension_arithmetic() {
        let speed = L.checked_div(T).unwrap();
        assert_eq!(speed, VELOCITY);
        assert!(speed.checked_mul(T).unwrap().checked_div(L).unwrap().is_dimensionless());
        assert_eq!(L.checked_pow(3), Some(VOLUME));
    }

    #[test]
    fn test_dimension_exponent_overflow() {
        let big = L.checked_pow(100).unwrap();
        assert_eq!(big.checked_mul(big), None);
        assert_eq!(L.checked_pow(128), None);
        assert_eq!(L.checked_pow(-128), Some(Dimension::of([-128, 0, 0, 0, 0, 0, 0, 0, 0, 0])));
        assert_eq!(VOLUME.checked_pow(64), None);
        assert_eq!(L.checked_pow(i32::MAX), None);
    }

    #[test]
    fn test_unit_expr_exponent_overflow() {
        let liter = UnitExpr::single(lookup("L"));
        assert_eq!(liter.pow(64), Err(EvalError::ExponentOverflow));
        assert_eq!(liter.pow(1_000_000_000), Err(EvalError::ExponentOverflow));

        let m = UnitExpr::single(lookup("m"));
        let km = UnitExpr::single(lookup("km"));
        let product = m.pow(64).unwrap().mul(&km.pow(64).unwrap());
        assert_eq!(product, Err(EvalError::ExponentOverflow));
        assert_eq!(m.pow(257), Err(EvalError::ExponentOverflow));
    }
}

//! Unit catalog
//!
//! Static registry of categories and their units, initialized once and never
//! mutated. Every factor is the multiplier that takes a value in that unit to
//! the category's base unit. Alternative catalogs can be injected through
//! [`UnitCatalog::new`], which checks the same invariants the builtin data holds.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::shared::error::{AppError, AppResult};

/// Unit categories for type-safe conversions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitCategory {
    Length,
    Mass,
    Temperature,
    Volume,
    Area,
    Time,
    #[serde(rename = "Digital Storage")]
    DigitalStorage,
    Speed,
}

impl UnitCategory {
    pub const ALL: [UnitCategory; 8] = [
        UnitCategory::Length,
        UnitCategory::Mass,
        UnitCategory::Temperature,
        UnitCategory::Volume,
        UnitCategory::Area,
        UnitCategory::Time,
        UnitCategory::DigitalStorage,
        UnitCategory::Speed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitCategory::Length => "Length",
            UnitCategory::Mass => "Mass",
            UnitCategory::Temperature => "Temperature",
            UnitCategory::Volume => "Volume",
            UnitCategory::Area => "Area",
            UnitCategory::Time => "Time",
            UnitCategory::DigitalStorage => "Digital Storage",
            UnitCategory::Speed => "Speed",
        }
    }
}

impl fmt::Display for UnitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        UnitCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AppError::Validation(format!("Unknown category: {}", s)))
    }
}

/// Unit definition with conversion factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDefinition {
    pub id: String,
    pub name: String,
    pub symbol: String,
    /// Multiplier to convert to the category base unit
    pub factor: f64,
    /// Carried for temperature units only; the affine branch dispatches on id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
}

impl UnitDefinition {
    pub fn new(id: &str, name: &str, symbol: &str, factor: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            factor,
            offset: None,
        }
    }

    fn with_offset(mut self, offset: f64) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDefinition {
    pub name: UnitCategory,
    pub base_unit_id: String,
    pub units: Vec<UnitDefinition>,
}

impl CategoryDefinition {
    pub fn find_unit(&self, unit_id: &str) -> Option<&UnitDefinition> {
        self.units.iter().find(|u| u.id == unit_id)
    }

    pub fn base_unit(&self) -> Option<&UnitDefinition> {
        self.find_unit(&self.base_unit_id)
    }

    /// Units preselected when the category becomes active: the first two,
    /// or the only unit on both sides
    pub fn default_pair(&self) -> Option<(&str, &str)> {
        match self.units.as_slice() {
            [] => None,
            [only] => Some((only.id.as_str(), only.id.as_str())),
            [first, second, ..] => Some((first.id.as_str(), second.id.as_str())),
        }
    }

    fn validate(&self) -> AppResult<()> {
        if self.units.is_empty() {
            return Err(AppError::Validation(format!("Category {} has no units", self.name)));
        }

        let mut seen = HashSet::new();
        for unit in &self.units {
            if !seen.insert(unit.id.as_str()) {
                return Err(AppError::Validation(format!(
                    "Duplicate unit id '{}' in {}",
                    unit.id, self.name
                )));
            }
            if self.name != UnitCategory::Temperature
                && !(unit.factor.is_finite() && unit.factor > 0.0)
            {
                return Err(AppError::Validation(format!(
                    "Unit '{}' in {} must have a positive finite factor, got {}",
                    unit.id, self.name, unit.factor
                )));
            }
        }

        if self.base_unit().is_none() {
            return Err(AppError::Validation(format!(
                "Base unit '{}' not found in {}",
                self.base_unit_id, self.name
            )));
        }

        Ok(())
    }
}

/// Ordered, immutable set of categories
#[derive(Debug, Clone, PartialEq)]
pub struct UnitCatalog {
    categories: Vec<CategoryDefinition>,
}

static BUILTIN: OnceLock<UnitCatalog> = OnceLock::new();

impl UnitCatalog {
    /// Build a catalog from injected data, checking every category invariant
    pub fn new(categories: Vec<CategoryDefinition>) -> AppResult<Self> {
        if categories.is_empty() {
            return Err(AppError::Validation("Catalog has no categories".to_string()));
        }

        let mut names = HashSet::new();
        for category in &categories {
            if !names.insert(category.name) {
                return Err(AppError::Validation(format!(
                    "Category {} defined twice",
                    category.name
                )));
            }
            category.validate()?;
        }

        Ok(Self { categories })
    }

    /// The compiled-in catalog, shared process-wide
    pub fn builtin() -> &'static UnitCatalog {
        BUILTIN.get_or_init(|| UnitCatalog {
            categories: builtin_categories(),
        })
    }

    pub fn list_categories(&self) -> &[CategoryDefinition] {
        &self.categories
    }

    pub fn find_category(&self, name: UnitCategory) -> Option<&CategoryDefinition> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Resolve a category by display name, falling back to the first entry
    pub fn category_or_default(&self, name: &str) -> &CategoryDefinition {
        name.parse::<UnitCategory>()
            .ok()
            .and_then(|category| self.find_category(category))
            .unwrap_or(&self.categories[0])
    }

    pub fn find_unit(&self, category: UnitCategory, unit_id: &str) -> Option<&UnitDefinition> {
        self.find_category(category)?.find_unit(unit_id)
    }
}

fn units(rows: &[(&str, &str, &str, f64)]) -> Vec<UnitDefinition> {
    rows.iter()
        .map(|&(id, name, symbol, factor)| UnitDefinition::new(id, name, symbol, factor))
        .collect()
}

fn builtin_categories() -> Vec<CategoryDefinition> {
    vec![
        // Length (base: meters)
        CategoryDefinition {
            name: UnitCategory::Length,
            base_unit_id: "m".to_string(),
            units: units(&[
                ("km", "Kilometer", "km", 1000.0),
                ("m", "Meter", "m", 1.0),
                ("cm", "Centimeter", "cm", 0.01),
                ("mm", "Millimeter", "mm", 0.001),
                ("mi", "Mile", "mi", 1609.344),
                ("yd", "Yard", "yd", 0.9144),
                ("ft", "Foot", "ft", 0.3048),
                ("in", "Inch", "in", 0.0254),
                ("nmi", "Nautical Mile", "nmi", 1852.0),
            ]),
        },
        // Mass (base: kilograms)
        CategoryDefinition {
            name: UnitCategory::Mass,
            base_unit_id: "kg".to_string(),
            units: units(&[
                ("t", "Metric Ton", "t", 1000.0),
                ("kg", "Kilogram", "kg", 1.0),
                ("g", "Gram", "g", 0.001),
                ("mg", "Milligram", "mg", 0.000001),
                ("lb", "Pound", "lb", 0.45359237),
                ("oz", "Ounce", "oz", 0.0283495),
                ("st", "Stone", "st", 6.35029),
            ]),
        },
        // Volume (base: liters)
        CategoryDefinition {
            name: UnitCategory::Volume,
            base_unit_id: "l".to_string(),
            units: units(&[
                ("l", "Liter", "L", 1.0),
                ("ml", "Milliliter", "mL", 0.001),
                ("gal_us", "Gallon (US)", "gal", 3.78541),
                ("qt_us", "Quart (US)", "qt", 0.946353),
                ("pt_us", "Pint (US)", "pt", 0.473176),
                ("cup_us", "Cup (US)", "cup", 0.236588),
                ("fl_oz_us", "Fluid Ounce (US)", "fl oz", 0.0295735),
                ("m3", "Cubic Meter", "m³", 1000.0),
            ]),
        },
        // Temperature (base: Celsius). Factor/offset are not used by the
        // conversion, which is special-cased on the c/f/k ids.
        CategoryDefinition {
            name: UnitCategory::Temperature,
            base_unit_id: "c".to_string(),
            units: vec![
                UnitDefinition::new("c", "Celsius", "°C", 1.0).with_offset(0.0),
                UnitDefinition::new("f", "Fahrenheit", "°F", 1.0).with_offset(0.0),
                UnitDefinition::new("k", "Kelvin", "K", 1.0).with_offset(0.0),
            ],
        },
        // Area (base: square meters)
        CategoryDefinition {
            name: UnitCategory::Area,
            base_unit_id: "m2".to_string(),
            units: units(&[
                ("km2", "Square Kilometer", "km²", 1_000_000.0),
                ("ha", "Hectare", "ha", 10_000.0),
                ("m2", "Square Meter", "m²", 1.0),
                ("cm2", "Square Centimeter", "cm²", 0.0001),
                ("mi2", "Square Mile", "mi²", 2_589_988.110336),
                ("ac", "Acre", "ac", 4046.8564224),
                ("yd2", "Square Yard", "yd²", 0.83612736),
                ("ft2", "Square Foot", "ft²", 0.09290304),
                ("in2", "Square Inch", "in²", 0.00064516),
            ]),
        },
        // Time (base: seconds)
        CategoryDefinition {
            name: UnitCategory::Time,
            base_unit_id: "s".to_string(),
            units: units(&[
                ("y", "Year (avg)", "yr", 31_557_600.0),
                ("wk", "Week", "wk", 604_800.0),
                ("d", "Day", "d", 86_400.0),
                ("h", "Hour", "hr", 3600.0),
                ("min", "Minute", "min", 60.0),
                ("s", "Second", "s", 1.0),
                ("ms", "Millisecond", "ms", 0.001),
            ]),
        },
        // Digital storage (base: bytes, 1024-based multiples)
        CategoryDefinition {
            name: UnitCategory::DigitalStorage,
            base_unit_id: "byte".to_string(),
            units: units(&[
                ("tb", "Terabyte", "TB", 1_099_511_627_776.0),
                ("gb", "Gigabyte", "GB", 1_073_741_824.0),
                ("mb", "Megabyte", "MB", 1_048_576.0),
                ("kb", "Kilobyte", "KB", 1024.0),
                ("byte", "Byte", "B", 1.0),
                ("bit", "Bit", "b", 0.125),
            ]),
        },
        // Speed (base: m/s)
        CategoryDefinition {
            name: UnitCategory::Speed,
            base_unit_id: "mps".to_string(),
            units: units(&[
                ("mps", "Meters/Second", "m/s", 1.0),
                ("kph", "Kilometers/Hour", "km/h", 1.0 / 3.6),
                ("mph", "Miles/Hour", "mph", 0.44704),
                ("fps", "Feet/Second", "ft/s", 0.3048),
                ("kn", "Knot", "kn", 1852.0 / 3600.0),
            ]),
        },
    ]
}

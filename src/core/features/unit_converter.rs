use crate::core::catalog::{CategoryDefinition, UnitCatalog, UnitCategory, UnitDefinition};
use crate::shared::types::QuickReferenceRow;
use enum_dispatch::enum_dispatch;
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

/// Shown in place of a result when the input is not a usable number
pub const NO_RESULT: &str = "---";

/// Inputs listed in the quick reference table
pub const QUICK_REFERENCE_INPUTS: [f64; 5] = [1.0, 5.0, 10.0, 50.0, 100.0];

const DISPLAY_DECIMALS: u32 = 6;

// Magnitudes outside [EXPONENT_BELOW, EXPONENT_FROM) print in exponent form
const EXPONENT_BELOW: f64 = 1e-6;
const EXPONENT_FROM: f64 = 1e21;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("Value is not a finite number")]
    InvalidInput,

    #[error("Unknown unit '{unit}' in {category}")]
    UnknownUnit { category: UnitCategory, unit: String },
}

pub type ConvertResult<T> = Result<T, ConversionError>;

// ============================================================================
// Conversion rules
// ============================================================================

/// One way of taking a value from one unit to another within a category
#[enum_dispatch]
pub trait ConversionRule {
    fn apply(&self, value: f64, from: &UnitDefinition, to: &UnitDefinition) -> ConvertResult<f64>;

    /// Human-readable formula, `x` standing for the input
    fn describe(&self, from: &UnitDefinition, to: &UnitDefinition) -> String;
}

/// `(value * from.factor) / to.factor`
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearRule;

/// Normalize to Celsius, then project to the target.
///
/// Keyed on the closed id set `c`, `f`, `k`; factor/offset are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemperatureRule;

#[enum_dispatch(ConversionRule)]
#[derive(Debug, Clone, Copy)]
pub enum Converter {
    Linear(LinearRule),
    Temperature(TemperatureRule),
}

impl Converter {
    pub fn for_category(category: UnitCategory) -> Self {
        match category {
            UnitCategory::Temperature => Converter::Temperature(TemperatureRule),
            _ => Converter::Linear(LinearRule),
        }
    }
}

impl ConversionRule for LinearRule {
    fn apply(&self, value: f64, from: &UnitDefinition, to: &UnitDefinition) -> ConvertResult<f64> {
        let base_value = value * from.factor;
        Ok(base_value / to.factor)
    }

    fn describe(&self, from: &UnitDefinition, to: &UnitDefinition) -> String {
        if from.id == to.id {
            return "x".to_string();
        }
        let ratio = from.factor / to.factor;
        if ratio >= 1.0 {
            format!("x × {}", format_number(ratio))
        } else {
            format!("x ÷ {}", format_number(to.factor / from.factor))
        }
    }
}

impl TemperatureRule {
    fn to_celsius(value: f64, unit: &UnitDefinition) -> Option<f64> {
        match unit.id.as_str() {
            "c" => Some(value),
            "f" => Some((value - 32.0) * (5.0 / 9.0)),
            "k" => Some(value - 273.15),
            _ => None,
        }
    }

    fn from_celsius(celsius: f64, unit: &UnitDefinition) -> Option<f64> {
        match unit.id.as_str() {
            "c" => Some(celsius),
            "f" => Some((celsius * 9.0 / 5.0) + 32.0),
            "k" => Some(celsius + 273.15),
            _ => None,
        }
    }

    fn unknown(unit: &UnitDefinition) -> ConversionError {
        ConversionError::UnknownUnit {
            category: UnitCategory::Temperature,
            unit: unit.id.clone(),
        }
    }
}

impl ConversionRule for TemperatureRule {
    fn apply(&self, value: f64, from: &UnitDefinition, to: &UnitDefinition) -> ConvertResult<f64> {
        let celsius = Self::to_celsius(value, from).ok_or_else(|| Self::unknown(from))?;
        Self::from_celsius(celsius, to).ok_or_else(|| Self::unknown(to))
    }

    fn describe(&self, from: &UnitDefinition, to: &UnitDefinition) -> String {
        match (from.id.as_str(), to.id.as_str()) {
            ("c", "f") => "x × 9/5 + 32",
            ("f", "c") => "(x - 32) × 5/9",
            ("c", "k") => "x + 273.15",
            ("k", "c") => "x - 273.15",
            ("f", "k") => "(x - 32) × 5/9 + 273.15",
            ("k", "f") => "(x - 273.15) × 9/5 + 32",
            _ => "x",
        }
        .to_string()
    }
}

// ============================================================================
// Engine
// ============================================================================

fn resolve<'a>(category: &'a CategoryDefinition, unit_id: &str) -> ConvertResult<&'a UnitDefinition> {
    category.find_unit(unit_id).ok_or_else(|| ConversionError::UnknownUnit {
        category: category.name,
        unit: unit_id.to_string(),
    })
}

/// Convert `value` between two units of `category`
pub fn convert(
    category: &CategoryDefinition,
    value: f64,
    from_unit_id: &str,
    to_unit_id: &str,
) -> ConvertResult<f64> {
    if !value.is_finite() {
        return Err(ConversionError::InvalidInput);
    }

    let from = resolve(category, from_unit_id)?;
    let to = resolve(category, to_unit_id)?;

    // Same unit, no conversion needed
    if from.id == to.id {
        return Ok(value);
    }

    let result = Converter::for_category(category.name).apply(value, from, to)?;
    debug!(
        category = %category.name,
        "[convert] {} {} → {} {}",
        value, from.id, result, to.id
    );
    Ok(result)
}

/// Formula shown next to the quick reference table
pub fn formula_hint(
    category: &CategoryDefinition,
    from_unit_id: &str,
    to_unit_id: &str,
) -> ConvertResult<String> {
    let from = resolve(category, from_unit_id)?;
    let to = resolve(category, to_unit_id)?;
    Ok(Converter::for_category(category.name).describe(from, to))
}

/// Computed reference rows for 1, 5, 10, 50 and 100 of the source unit
pub fn quick_reference(
    category: &CategoryDefinition,
    from_unit_id: &str,
    to_unit_id: &str,
) -> ConvertResult<Vec<QuickReferenceRow>> {
    QUICK_REFERENCE_INPUTS
        .iter()
        .map(|&input| {
            let output = convert(category, input, from_unit_id, to_unit_id)?;
            Ok(QuickReferenceRow {
                input,
                output: format_number(output),
            })
        })
        .collect()
}

/// Convert raw field text for display.
///
/// Returns `Some(NO_RESULT)` when the text is not a number and `None` when a
/// unit id does not resolve (nothing to show, the caller keeps its old output).
/// An unknown category name falls back to the first catalog entry.
pub fn convert_display(
    catalog: &UnitCatalog,
    category_name: &str,
    raw_input: &str,
    from_unit_id: &str,
    to_unit_id: &str,
) -> Option<String> {
    let Some(value) = parse_input_value(raw_input) else {
        return Some(NO_RESULT.to_string());
    };

    let category = catalog.category_or_default(category_name);
    match convert(category, value, from_unit_id, to_unit_id) {
        Ok(result) => Some(format_number(result)),
        Err(ConversionError::InvalidInput) => Some(NO_RESULT.to_string()),
        Err(e @ ConversionError::UnknownUnit { .. }) => {
            debug!("[convert_display] {}", e);
            None
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

// Compile regex pattern once (constant pattern, cannot fail)
fn leading_number() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)")
            .expect("Failed to compile leading number pattern")
    })
}

/// Parse the numeric prefix of `text` ("12.5kg" -> 12.5).
/// Empty, non-numeric or non-finite input yields `None`.
pub fn parse_input_value(text: &str) -> Option<f64> {
    let caps = leading_number().captures(text)?;
    let value = caps.get(1)?.as_str().parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

/// Render a number the way the widget's frontend prints numbers: shortest
/// round-trip digits, exponent form below 1e-6 and from 1e21 up.
/// Examples: 0.5 -> "0.5", 1e-7 -> "1e-7", 1e21 -> "1e+21"
pub fn display_number(value: f64) -> String {
    if !value.is_finite() {
        return NO_RESULT.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let magnitude = value.abs();
    if !(EXPONENT_BELOW..EXPONENT_FROM).contains(&magnitude) {
        let formatted = format!("{:e}", value);
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{}e+{}", mantissa, exponent)
            }
            _ => formatted,
        };
    }

    format!("{}", value)
}

/// Format a result for display and history.
///
/// Integers render without decimals; anything else is rounded to 6 decimal
/// places with trailing zeros stripped. Rounding works on the exact binary
/// value, ties away from zero. Examples: 2.0 -> "2", 1/3 -> "0.333333",
/// 2.0000025 -> "2.000002" (stored as 2.00000249999...)
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return NO_RESULT.to_string();
    }
    if value.fract() == 0.0 {
        // Also folds -0 into "0"
        return display_number(value);
    }

    match Decimal::from_f64_retain(value) {
        Some(decimal) => {
            let rounded = decimal
                .round_dp_with_strategy(DISPLAY_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
                .normalize();
            if rounded.is_zero() {
                "0".to_string()
            } else {
                rounded.to_string()
            }
        }
        None => display_number(value),
    }
}

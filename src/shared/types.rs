use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// A committed conversion, as shown in the history panel.
///
/// Flattened, stringified snapshot: it holds no reference back to the catalog,
/// so entries stay valid however the catalog is swapped or injected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings.ts")]
pub struct ConversionRecord {
    /// Row key for the frontend; not part of deduplication
    pub id: Uuid,
    pub from_value: String,
    /// Unit symbol, e.g. "mi"
    pub from_unit: String,
    pub to_value: String,
    pub to_unit: String,
    pub category: String,
    /// Milliseconds since the Unix epoch
    #[ts(type = "number")]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub is_ai_generated: Option<bool>,
}

impl ConversionRecord {
    /// Record for a manual (table-driven) conversion, stamped now
    pub fn manual(
        from_value: impl Into<String>,
        from_unit: impl Into<String>,
        to_value: impl Into<String>,
        to_unit: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_value: from_value.into(),
            from_unit: from_unit.into(),
            to_value: to_value.into(),
            to_unit: to_unit.into(),
            category: category.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            explanation: None,
            is_ai_generated: None,
        }
    }

    /// True when `other` would collapse into this entry at the ledger head
    pub fn is_repeat_of(&self, other: &ConversionRecord) -> bool {
        self.from_value == other.from_value
            && self.from_unit == other.from_unit
            && self.to_unit == other.to_unit
    }
}

/// Structured answer produced by the natural-language converter.
///
/// `source_unit == "Error"` marks a query the model could not interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings.ts")]
pub struct AiConversionResult {
    pub source_value: f64,
    pub source_unit: String,
    pub target_value: f64,
    pub target_unit: String,
    pub category: String,
    pub explanation: String,
    pub formula: String,
}

// Rich Unit Data Transfer Object for frontend
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct UnitDTO {
    pub id: String,     // Unit id (e.g., "gal_us")
    pub label: String,  // Display name (e.g., "Gallon (US)")
    pub symbol: String, // Display symbol (e.g., "gal")
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct CategoryDTO {
    pub name: String,
    pub base_unit_id: String,
    pub units: Vec<UnitDTO>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct GetCategoriesResponse {
    pub categories: Vec<CategoryDTO>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct ConvertUnitsRequest {
    pub category: String,
    /// Raw text from the input field
    pub value: String,
    pub from_unit: String,
    pub to_unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct ConvertUnitsResponse {
    pub result: f64,
    pub formatted_result: String,
    pub from_symbol: String,
    pub to_symbol: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct QuickReferenceRow {
    pub input: f64,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct QuickReferenceResponse {
    pub from_symbol: String,
    pub to_symbol: String,
    pub formula: String,
    pub rows: Vec<QuickReferenceRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct AiConvertRequest {
    pub query: String,
}

// Adjacently tagged for frontend compatibility
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "status", content = "payload")]
#[ts(export, export_to = "bindings.ts")]
pub enum AiConvertResponse {
    /// Interpreted and committed to history
    Success(AiConversionResult),
    /// The model answered but could not read the query as a conversion
    NotUnderstood,
    /// Nothing usable came back; the user may retry
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct GetHistoryResponse {
    pub entries: Vec<ConversionRecord>,
}

//! Command surface for the widget frontend
//!
//! Each command takes the session it operates on and speaks in the DTOs from
//! `shared::types`, so a shell (desktop IPC, terminal loop) only has to route.

use std::path::Path;
use tracing::info;

use crate::core::catalog::{CategoryDefinition, UnitCategory};
use crate::core::features::ai_converter::{AiOutcome, GeminiConverter};
use crate::core::features::unit_converter::{self, ConversionError};
use crate::core::session::ConverterSession;
use crate::shared::error::{AppError, AppResult};
use crate::shared::settings::AppSettings;
use crate::shared::types::{
    AiConvertRequest, AiConvertResponse, CategoryDTO, ConversionRecord, ConvertUnitsRequest,
    ConvertUnitsResponse, GetCategoriesResponse, GetHistoryResponse, QuickReferenceResponse, UnitDTO,
};

fn category_dto(category: &CategoryDefinition) -> CategoryDTO {
    CategoryDTO {
        name: category.name.to_string(),
        base_unit_id: category.base_unit_id.clone(),
        units: unit_dtos(category),
    }
}

fn unit_dtos(category: &CategoryDefinition) -> Vec<UnitDTO> {
    category
        .units
        .iter()
        .map(|u| UnitDTO {
            id: u.id.clone(),
            label: u.name.clone(),
            symbol: u.symbol.clone(),
        })
        .collect()
}

fn lookup_category<'a>(session: &'a ConverterSession, name: &str) -> AppResult<&'a CategoryDefinition> {
    let wanted: UnitCategory = name.parse()?;
    session
        .catalog()
        .find_category(wanted)
        .ok_or_else(|| AppError::Validation(format!("Category not in catalog: {}", wanted)))
}

/// All categories in catalog order
pub fn get_categories_command(session: &ConverterSession) -> GetCategoriesResponse {
    GetCategoriesResponse {
        categories: session.catalog().list_categories().iter().map(category_dto).collect(),
    }
}

/// Units of one category in display order
pub fn get_units_command(session: &ConverterSession, category: &str) -> AppResult<Vec<UnitDTO>> {
    Ok(unit_dtos(lookup_category(session, category)?))
}

/// Stateless conversion: does not touch the session's form or history
pub fn convert_units_command(
    session: &ConverterSession,
    request: ConvertUnitsRequest,
) -> AppResult<ConvertUnitsResponse> {
    let category = lookup_category(session, &request.category)?;

    let value = unit_converter::parse_input_value(&request.value)
        .ok_or(ConversionError::InvalidInput)?;
    let result = unit_converter::convert(category, value, &request.from_unit, &request.to_unit)?;

    let symbol = |id: &str| {
        category
            .find_unit(id)
            .map(|u| u.symbol.clone())
            .unwrap_or_else(|| id.to_string())
    };

    Ok(ConvertUnitsResponse {
        result,
        formatted_result: unit_converter::format_number(result),
        from_symbol: symbol(&request.from_unit),
        to_symbol: symbol(&request.to_unit),
        category: category.name.to_string(),
    })
}

/// Commit the session's current manual conversion (the field lost focus).
/// Returns the new head when something was recorded.
pub fn commit_conversion_command(session: &mut ConverterSession) -> Option<ConversionRecord> {
    if session.commit_manual() {
        session.history().head().cloned()
    } else {
        None
    }
}

pub async fn convert_with_ai_command(
    session: &mut ConverterSession,
    request: AiConvertRequest,
) -> AiConvertResponse {
    info!("[AiConvert] Query: {}", request.query);

    match session.convert_with_ai(&request.query).await {
        AiOutcome::Success(result) => AiConvertResponse::Success(result),
        AiOutcome::SemanticError(_) => AiConvertResponse::NotUnderstood,
        AiOutcome::TransportFailure(e) => AiConvertResponse::Failed { message: e.to_string() },
    }
}

pub fn get_history_command(session: &ConverterSession) -> GetHistoryResponse {
    GetHistoryResponse {
        entries: session.history().to_vec(),
    }
}

pub fn clear_history_command(session: &mut ConverterSession) {
    session.clear_history();
}

/// Reference table for the session's current unit pair
pub fn quick_reference_command(session: &ConverterSession) -> AppResult<QuickReferenceResponse> {
    let category = session.active_category();
    let (from_id, to_id) = (session.from_unit(), session.to_unit());

    let rows = unit_converter::quick_reference(category, from_id, to_id)?;
    let formula = unit_converter::formula_hint(category, from_id, to_id)?;

    let symbol = |id: &str| -> AppResult<String> {
        category
            .find_unit(id)
            .map(|u| u.symbol.clone())
            .ok_or_else(|| AppError::Validation(format!("Unknown unit: {}", id)))
    };

    Ok(QuickReferenceResponse {
        from_symbol: symbol(from_id)?,
        to_symbol: symbol(to_id)?,
        formula,
        rows,
    })
}

/// Current settings, secrets masked
pub fn get_settings_command(settings: &AppSettings) -> AppSettings {
    settings.masked()
}

/// Store a new model API key, save settings to `path` and turn on
/// natural-language conversions for the session
pub async fn set_api_key_command(
    session: &mut ConverterSession,
    settings: &mut AppSettings,
    path: &Path,
    api_key: &str,
) -> AppResult<AppSettings> {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        return Err(AppError::Validation("API key cannot be empty".to_string()));
    }

    let mut updated = settings.clone();
    updated.ai.api_key = api_key.to_string();
    let model = GeminiConverter::new(&updated.ai)?;

    updated.save(path).await?;
    *settings = updated;
    session.attach_model(Box::new(model));

    info!("[Settings] API key saved");
    Ok(settings.masked())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::UnitCatalog;
    use crate::core::features::ai_converter::testing::{kelvin_to_fahrenheit, not_understood, ScriptedModel};

    fn session() -> ConverterSession {
        ConverterSession::new(UnitCatalog::builtin().clone(), None)
    }

    fn request(category: &str, value: &str, from: &str, to: &str) -> ConvertUnitsRequest {
        ConvertUnitsRequest {
            category: category.to_string(),
            value: value.to_string(),
            from_unit: from.to_string(),
            to_unit: to.to_string(),
        }
    }

    #[test]
    fn test_get_categories() {
        let response = get_categories_command(&session());
        let names: Vec<_> = response.categories.iter().map(|c| c.name.as_str()).collect();

        assert_eq!(names.len(), 8);
        assert!(names.contains(&"Digital Storage"));
        assert!(response.categories.iter().all(|c| !c.units.is_empty()));
    }

    #[test]
    fn test_get_units() {
        let units = get_units_command(&session(), "volume").unwrap();
        let fl_oz = units.iter().find(|u| u.id == "fl_oz_us").unwrap();
        assert_eq!(fl_oz.symbol, "fl oz");

        assert!(matches!(get_units_command(&session(), "Currency"), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_convert_units() {
        let response = convert_units_command(&session(), request("Length", "5", "mi", "km")).unwrap();

        assert_eq!(response.formatted_result, "8.04672");
        assert_eq!(response.from_symbol, "mi");
        assert_eq!(response.to_symbol, "km");
        assert_eq!(response.category, "Length");
    }

    #[test]
    fn test_convert_units_errors() {
        let err = convert_units_command(&session(), request("Length", "five", "mi", "km")).unwrap_err();
        assert!(matches!(err, AppError::Calculation(_)));

        let err = convert_units_command(&session(), request("Length", "5", "mi", "kg")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_convert_units_leaves_history_alone() {
        let session = session();
        convert_units_command(&session, request("Mass", "1", "kg", "lb")).unwrap();
        assert!(get_history_command(&session).entries.is_empty());
    }

    #[test]
    fn test_commit_and_clear() {
        let mut session = session();
        session.set_input("2");

        let record = commit_conversion_command(&mut session).unwrap();
        assert_eq!(record.to_value, "2000");
        assert!(commit_conversion_command(&mut session).is_none());
        assert_eq!(get_history_command(&session).entries.len(), 1);

        clear_history_command(&mut session);
        assert!(get_history_command(&session).entries.is_empty());
    }

    #[test]
    fn test_quick_reference() {
        let mut session = session();
        session.select_category("Temperature");

        let table = quick_reference_command(&session).unwrap();

        assert_eq!(table.from_symbol, "°C");
        assert_eq!(table.to_symbol, "°F");
        assert_eq!(table.rows.len(), 5);
        assert_eq!(table.rows[0].output, "33.8");
        assert_eq!(table.rows[4].output, "212");
        assert!(!table.formula.is_empty());
    }

    #[tokio::test]
    async fn test_convert_with_ai_responses() {
        let with_model = |model: ScriptedModel| {
            ConverterSession::new(UnitCatalog::builtin().clone(), Some(Box::new(model)))
        };

        let mut answering = with_model(ScriptedModel::new(|_| Ok(kelvin_to_fahrenheit())));
        let response = convert_with_ai_command(&mut answering, AiConvertRequest { query: "300K in F".to_string() }).await;
        assert!(matches!(response, AiConvertResponse::Success(_)));
        assert_eq!(get_history_command(&answering).entries.len(), 1);

        let mut confused = with_model(ScriptedModel::new(|_| Ok(not_understood())));
        let response = convert_with_ai_command(&mut confused, AiConvertRequest { query: "hello".to_string() }).await;
        assert!(matches!(response, AiConvertResponse::NotUnderstood));
        assert!(get_history_command(&confused).entries.is_empty());

        let mut offline = session();
        let response = convert_with_ai_command(&mut offline, AiConvertRequest { query: "1 cup in ml".to_string() }).await;
        assert!(matches!(response, AiConvertResponse::Failed { .. }));
    }

    #[tokio::test]
    async fn test_set_api_key_enables_ai_and_masks() {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut session = session();
        let mut settings = AppSettings::default();
        assert!(!session.ai_available());

        let shown = set_api_key_command(&mut session, &mut settings, &path, "  new-key ").await.unwrap();

        assert!(session.ai_available());
        assert_eq!(settings.ai.api_key, "new-key");
        assert_eq!(shown.ai.api_key, "********");
        assert_eq!(get_settings_command(&settings), shown);
        assert!(!std::fs::read_to_string(&path).unwrap().contains("new-key"));
    }

    #[tokio::test]
    async fn test_set_api_key_rejects_blank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut session = session();
        let mut settings = AppSettings::default();

        let err = set_api_key_command(&mut session, &mut settings, &path, "   ").await.unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(!session.ai_available());
        assert!(!path.exists());
    }
}

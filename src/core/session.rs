//! Converter session
//!
//! One user's converter: the catalog in use, the manual form state, the
//! history ledger and (when a key is configured) the natural-language model.

use tracing::{debug, info};

use crate::core::catalog::{CategoryDefinition, UnitCatalog, UnitCategory, UnitDefinition};
use crate::core::features::ai_converter::{interpret, AiOutcome, ConversionModel, GeminiConverter};
use crate::core::features::unit_converter::{convert_display, parse_input_value, NO_RESULT};
use crate::core::history::HistoryLedger;
use crate::shared::error::{AppError, AppResult};
use crate::shared::settings::AppSettings;
use crate::shared::types::ConversionRecord;

const DEFAULT_INPUT: &str = "1";

pub struct ConverterSession {
    catalog: UnitCatalog,
    history: HistoryLedger,
    model: Option<Box<dyn ConversionModel>>,
    category: UnitCategory,
    input: String,
    from_unit: String,
    to_unit: String,
}

impl ConverterSession {
    /// Start on the first category of `catalog` with its default unit pair
    pub fn new(catalog: UnitCatalog, model: Option<Box<dyn ConversionModel>>) -> Self {
        let first = &catalog.list_categories()[0];
        let category = first.name;
        let (from_unit, to_unit) = default_pair(first);

        Self {
            catalog,
            history: HistoryLedger::new(),
            model,
            category,
            input: DEFAULT_INPUT.to_string(),
            from_unit,
            to_unit,
        }
    }

    /// Builtin catalog, preferences applied, Gemini attached when a key is set
    pub fn from_settings(settings: &AppSettings) -> AppResult<Self> {
        let model: Option<Box<dyn ConversionModel>> = if settings.ai_available() {
            Some(Box::new(GeminiConverter::new(&settings.ai)?))
        } else {
            info!("[Session] No API key configured, natural-language conversions disabled");
            None
        };

        let mut session = Self::new(UnitCatalog::builtin().clone(), model);
        session.select_category(&settings.preferences.default_category);
        session.set_input(&settings.preferences.default_input);
        Ok(session)
    }

    pub fn catalog(&self) -> &UnitCatalog {
        &self.catalog
    }

    pub fn active_category(&self) -> &CategoryDefinition {
        self.catalog.category_or_default(self.category.as_str())
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn from_unit(&self) -> &str {
        &self.from_unit
    }

    pub fn to_unit(&self) -> &str {
        &self.to_unit
    }

    /// Switch category (unknown names fall back to the first) and preselect
    /// its default unit pair
    pub fn select_category(&mut self, name: &str) -> UnitCategory {
        let category = self.catalog.category_or_default(name);
        let (from_unit, to_unit) = default_pair(category);

        self.category = category.name;
        self.from_unit = from_unit;
        self.to_unit = to_unit;
        debug!(category = %self.category, "[Session] Category selected");
        self.category
    }

    pub fn set_input(&mut self, raw: &str) {
        self.input = raw.to_string();
    }

    pub fn set_from_unit(&mut self, unit_id: &str) -> AppResult<()> {
        self.resolve_unit(unit_id)?;
        self.from_unit = unit_id.to_string();
        Ok(())
    }

    pub fn set_to_unit(&mut self, unit_id: &str) -> AppResult<()> {
        self.resolve_unit(unit_id)?;
        self.to_unit = unit_id.to_string();
        Ok(())
    }

    /// Set both units; if either is unknown neither changes
    pub fn set_units(&mut self, from_unit_id: &str, to_unit_id: &str) -> AppResult<()> {
        self.resolve_unit(from_unit_id)?;
        self.resolve_unit(to_unit_id)?;
        self.from_unit = from_unit_id.to_string();
        self.to_unit = to_unit_id.to_string();
        Ok(())
    }

    pub fn swap_units(&mut self) {
        std::mem::swap(&mut self.from_unit, &mut self.to_unit);
    }

    /// Formatted result for the current form, or `NO_RESULT`
    pub fn output(&self) -> String {
        convert_display(
            &self.catalog,
            self.category.as_str(),
            &self.input,
            &self.from_unit,
            &self.to_unit,
        )
        .unwrap_or_else(|| NO_RESULT.to_string())
    }

    /// Commit the current manual conversion to history.
    ///
    /// Nothing is recorded while the output is `NO_RESULT`. Returns whether an
    /// entry was added (a repeat of the head is not).
    pub fn commit_manual(&mut self) -> bool {
        let output = self.output();
        if output == NO_RESULT || parse_input_value(&self.input).is_none() {
            return false;
        }

        let category = self.active_category();
        let (Some(from), Some(to)) = (
            category.find_unit(&self.from_unit),
            category.find_unit(&self.to_unit),
        ) else {
            return false;
        };

        let record = ConversionRecord::manual(
            self.input.trim(),
            from.symbol.as_str(),
            output,
            to.symbol.as_str(),
            category.name.as_str(),
        );
        self.history.record(record)
    }

    /// Enable natural-language conversions (a key was configured at runtime)
    pub fn attach_model(&mut self, model: Box<dyn ConversionModel>) {
        self.model = Some(model);
        info!("[Session] Natural-language conversions enabled");
    }

    pub fn ai_available(&self) -> bool {
        self.model.is_some()
    }

    /// Interpret `query` and commit it to history on success
    pub async fn convert_with_ai(&mut self, query: &str) -> AiOutcome {
        let Some(model) = self.model.as_deref() else {
            return AiOutcome::TransportFailure(AppError::Config(
                "Natural-language conversions need an API key".to_string(),
            ));
        };

        let outcome = interpret(model, query).await;
        if let AiOutcome::Success(result) = &outcome {
            if let Some(record) = result.to_record() {
                self.history.record(record);
            }
        }
        outcome
    }

    pub fn history(&self) -> &HistoryLedger {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    fn resolve_unit(&self, unit_id: &str) -> AppResult<&UnitDefinition> {
        let category = self.active_category();
        category.find_unit(unit_id).ok_or_else(|| {
            AppError::Validation(format!("Unknown unit '{}' in {}", unit_id, category.name))
        })
    }
}

fn default_pair(category: &CategoryDefinition) -> (String, String) {
    category
        .default_pair()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::ai_converter::testing::{kelvin_to_fahrenheit, not_understood, ScriptedModel};

    fn session() -> ConverterSession {
        ConverterSession::new(UnitCatalog::builtin().clone(), None)
    }

    fn session_with(model: ScriptedModel) -> ConverterSession {
        ConverterSession::new(UnitCatalog::builtin().clone(), Some(Box::new(model)))
    }

    #[test]
    fn test_starts_on_first_category() {
        let session = session();

        assert_eq!(session.active_category().name, UnitCategory::Length);
        assert_eq!(session.input(), "1");
        assert_eq!(session.from_unit(), "km");
        assert_eq!(session.to_unit(), "m");
        assert_eq!(session.output(), "1000");
        assert!(!session.ai_available());
    }

    #[test]
    fn test_select_category_resets_pair() {
        let mut session = session();
        session.set_to_unit("mi").unwrap();

        assert_eq!(session.select_category("Temperature"), UnitCategory::Temperature);
        assert_eq!((session.from_unit(), session.to_unit()), ("c", "f"));

        assert_eq!(session.select_category("Nonsense"), UnitCategory::Length);
    }

    #[test]
    fn test_miles_to_kilometers() {
        let mut session = session();
        session.set_input("5");
        session.set_from_unit("mi").unwrap();
        session.set_to_unit("km").unwrap();

        assert_eq!(session.output(), "8.04672");
    }

    #[test]
    fn test_unknown_unit_keeps_state() {
        let mut session = session();
        assert!(matches!(session.set_from_unit("kg"), Err(AppError::Validation(_))));
        assert_eq!(session.from_unit(), "km");
    }

    #[test]
    fn test_set_units_is_all_or_nothing() {
        let mut session = session();

        assert!(session.set_units("mi", "kg").is_err());
        assert!(session.set_units("lb", "ft").is_err());
        assert_eq!((session.from_unit(), session.to_unit()), ("km", "m"));

        session.set_units("mi", "ft").unwrap();
        assert_eq!((session.from_unit(), session.to_unit()), ("mi", "ft"));
        assert_eq!(session.output(), "5280");
    }

    #[tokio::test]
    async fn test_attach_model_enables_ai() {
        let mut session = session();
        assert!(!session.ai_available());

        session.attach_model(Box::new(ScriptedModel::new(|_| Ok(kelvin_to_fahrenheit()))));

        assert!(session.ai_available());
        assert!(session.convert_with_ai("300 K in F").await.is_success());
    }

    #[test]
    fn test_swap_units() {
        let mut session = session();
        session.set_input("1000");
        session.swap_units();

        assert_eq!((session.from_unit(), session.to_unit()), ("m", "km"));
        assert_eq!(session.output(), "1");
    }

    #[test]
    fn test_invalid_input_is_not_committed() {
        let mut session = session();
        session.set_input("abc");

        assert_eq!(session.output(), NO_RESULT);
        assert!(!session.commit_manual());
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_commit_records_symbols_and_collapses_repeats() {
        let mut session = session();
        session.select_category("Temperature");
        session.set_input("100");

        assert!(session.commit_manual());
        assert!(!session.commit_manual());

        let head = session.history().head().unwrap();
        assert_eq!(head.from_value, "100");
        assert_eq!(head.from_unit, "°C");
        assert_eq!(head.to_value, "212");
        assert_eq!(head.to_unit, "°F");
        assert_eq!(head.category, "Temperature");
        assert_eq!(head.is_ai_generated, None);
    }

    #[tokio::test]
    async fn test_ai_success_is_committed() {
        let mut session = session_with(ScriptedModel::new(|_| Ok(kelvin_to_fahrenheit())));

        assert!(session.ai_available());
        assert!(session.convert_with_ai("300 Kelvin to Fahrenheit").await.is_success());

        let head = session.history().head().unwrap();
        assert_eq!(head.from_unit, "K");
        assert_eq!(head.to_value, "80.33");
        assert_eq!(head.is_ai_generated, Some(true));
    }

    #[tokio::test]
    async fn test_sentinel_never_enters_history() {
        let mut session = session_with(ScriptedModel::new(|_| Ok(not_understood())));

        let outcome = session.convert_with_ai("tell me a joke").await;

        assert!(matches!(outcome, AiOutcome::SemanticError(_)));
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_ai_unavailable_without_model() {
        let mut session = session();
        let outcome = session.convert_with_ai("1 cup in ml").await;

        assert!(matches!(outcome, AiOutcome::TransportFailure(AppError::Config(_))));
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_clear_history() {
        let mut session = session();
        session.commit_manual();
        assert_eq!(session.history().len(), 1);

        session.clear_history();
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_from_settings_applies_preferences() {
        let mut settings = AppSettings::default();
        settings.preferences.default_category = "Mass".to_string();
        settings.preferences.default_input = "2".to_string();

        let session = ConverterSession::from_settings(&settings).unwrap();

        assert_eq!(session.active_category().name, UnitCategory::Mass);
        assert_eq!(session.input(), "2");
        assert!(!session.ai_available());
    }
}

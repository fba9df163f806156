//! The structured adjustment the model is asked to return, and the lenient
//! reader that turns raw model text into one.
//!
//! Only text that is not JSON at all degrades to [`AdjustmentResponse::fallback`].
//! Inside valid JSON every field is read on its own: numbers are accepted
//! where text is expected and the other way round, missing or null macro
//! values count as zero, and an entry or change with an unknown `action`
//! is skipped without touching its siblings.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use nutricoach_db::models::Confidence;

/// What happened to a meal or to a food inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Modified,
    Added,
    Removed,
}

impl ChangeAction {
    fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "modified" => Some(Self::Modified),
            "added" => Some(Self::Added),
            "removed" => Some(Self::Removed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodChange {
    pub action: ChangeAction,
    pub food_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealAdjustment {
    pub meal_name: String,
    pub action: ChangeAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub changes: Vec<FoodChange>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MacroDelta {
    pub before: f64,
    pub after: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MacroChanges {
    pub calories: MacroDelta,
    pub protein: MacroDelta,
    pub carbs: MacroDelta,
    pub fats: MacroDelta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdjustmentResponse {
    pub adjustments: Vec<MealAdjustment>,
    pub macro_changes: MacroChanges,
    pub feedback_text: String,
    pub confidence: Confidence,
    pub summary: String,
}

pub const FALLBACK_SUMMARY: &str =
    "Não foi possível interpretar a resposta da IA como JSON; revise o texto manualmente.";

impl AdjustmentResponse {
    /// The response stored when the model text is not valid JSON: no
    /// edits, zeroed macros, low confidence and the raw text as feedback.
    pub fn fallback(raw: &str) -> Self {
        Self {
            adjustments: Vec::new(),
            macro_changes: MacroChanges::default(),
            feedback_text: raw.to_owned(),
            confidence: Confidence::Low,
            summary: FALLBACK_SUMMARY.to_owned(),
        }
    }

    /// Whether this is a degraded response built by [`Self::fallback`].
    pub fn is_fallback(&self) -> bool {
        self.adjustments.is_empty() && self.summary == FALLBACK_SUMMARY
    }
}

/// A model reply read into an [`AdjustmentResponse`], together with the
/// JSON document it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub response: AdjustmentResponse,
    /// The model's JSON exactly as parsed, keys the reader ignores
    /// included. For a fallback, the serialized fallback response.
    pub json: Value,
}

/// Parse model text into an [`AdjustmentResponse`]; never fails.
pub fn parse_response(raw: &str) -> AdjustmentResponse {
    parse_model_output(raw).response
}

/// Parse model text and keep the JSON document for auditing.
///
/// An optional fenced code block (with or without a `json` tag) is
/// stripped first. Text that is not a JSON object yields
/// [`AdjustmentResponse::fallback`].
pub fn parse_model_output(raw: &str) -> ModelOutput {
    let body = strip_fence(raw);
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(doc)) => ModelOutput {
            response: read_response(&doc),
            json: Value::Object(doc),
        },
        Ok(other) => {
            warn!(kind = json_kind(&other), "model response is not a JSON object, using fallback");
            fallback_output(raw)
        }
        Err(e) => {
            warn!(error = %e, "model response is not valid JSON, using fallback");
            fallback_output(raw)
        }
    }
}

fn fallback_output(raw: &str) -> ModelOutput {
    let response = AdjustmentResponse::fallback(raw);
    let json = serde_json::to_value(&response).unwrap_or(Value::Null);
    ModelOutput { response, json }
}

fn read_response(doc: &Map<String, Value>) -> AdjustmentResponse {
    let adjustments = match doc.get("adjustments") {
        Some(Value::Array(entries)) => entries.iter().filter_map(read_meal_adjustment).collect(),
        None | Some(Value::Null) => Vec::new(),
        Some(other) => {
            warn!(kind = json_kind(other), "\"adjustments\" is not a list; ignoring it");
            Vec::new()
        }
    };

    let macros = doc.get("macro_changes");
    let macro_changes = MacroChanges {
        calories: read_delta(macros, "calories"),
        protein: read_delta(macros, "protein"),
        carbs: read_delta(macros, "carbs"),
        fats: read_delta(macros, "fats"),
    };

    AdjustmentResponse {
        adjustments,
        macro_changes,
        feedback_text: doc.get("feedback_text").and_then(text).unwrap_or_default(),
        confidence: doc.get("confidence").map(read_confidence).unwrap_or_default(),
        summary: doc.get("summary").and_then(text).unwrap_or_default(),
    }
}

fn read_meal_adjustment(entry: &Value) -> Option<MealAdjustment> {
    let Some(meal_name) = entry.get("meal_name").and_then(text) else {
        warn!("adjustment entry without a meal_name; skipping it");
        return None;
    };
    // A missing action means the meal's foods are being edited.
    let action = match entry.get("action") {
        None | Some(Value::Null) => ChangeAction::Modified,
        Some(v) => match text(v).as_deref().and_then(ChangeAction::from_label) {
            Some(action) => action,
            None => {
                warn!(meal = %meal_name, action = %v, "unknown meal action; skipping entry");
                return None;
            }
        },
    };

    let changes = match entry.get("changes") {
        Some(Value::Array(changes)) => changes
            .iter()
            .filter_map(|c| read_food_change(&meal_name, c))
            .collect(),
        _ => Vec::new(),
    };

    Some(MealAdjustment {
        reason: entry.get("reason").and_then(text),
        meal_name,
        action,
        changes,
    })
}

fn read_food_change(meal_name: &str, change: &Value) -> Option<FoodChange> {
    let Some(food_name) = change.get("food_name").and_then(text) else {
        warn!(meal = %meal_name, "food change without a food_name; skipping it");
        return None;
    };
    let label = change.get("action").and_then(text);
    let Some(action) = label.as_deref().and_then(ChangeAction::from_label) else {
        warn!(
            meal = %meal_name,
            food = %food_name,
            action = label.as_deref().unwrap_or(""),
            "unknown food action; skipping change"
        );
        return None;
    };

    Some(FoodChange {
        action,
        food_name,
        old_value: change.get("old_value").and_then(text),
        new_value: change.get("new_value").and_then(text),
        reason: change.get("reason").and_then(text),
    })
}

fn read_delta(macros: Option<&Value>, key: &str) -> MacroDelta {
    let delta = macros.and_then(|m| m.get(key));
    MacroDelta {
        before: number(delta.and_then(|d| d.get("before"))),
        after: number(delta.and_then(|d| d.get("after"))),
    }
}

fn read_confidence(value: &Value) -> Confidence {
    let label = text(value).map(|s| s.trim().to_lowercase()).unwrap_or_default();
    match serde_json::from_value(Value::String(label)) {
        Ok(confidence) => confidence,
        Err(_) => {
            warn!(confidence = %value, "unknown confidence level; using low");
            Confidence::Low
        }
    }
}

/// Strings as-is, numbers and booleans in their JSON spelling. Null,
/// blank strings and containers read as absent.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numbers, or strings holding one (decimal comma accepted); anything else
/// is zero.
fn number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().replace(',', ".").parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after = &trimmed[start + 3..];
    // Skip the language tag on the opening fence line.
    let content = match after.find('\n') {
        Some(nl) => &after[nl + 1..],
        None => after,
    };
    match content.rfind("```") {
        Some(end) => content[..end].trim(),
        None => content.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "adjustments": [{
            "meal_name": "Lanche da Tarde",
            "action": "modified",
            "reason": "fome à tarde",
            "changes": [
                { "action": "added", "food_name": "Castanhas", "new_value": "15g", "reason": "saciedade" },
                { "action": "modified", "food_name": "Iogurte", "old_value": "170g", "new_value": "200g" }
            ]
        }],
        "macro_changes": { "calories": { "before": 1850, "after": 1900 } },
        "feedback_text": "Olá! Incluímos castanhas no lanche.",
        "confidence": "high",
        "summary": "Lanche reforçado"
    }"#;

    #[test]
    fn parses_plain_json() {
        let r = parse_response(VALID);
        assert_eq!(r.confidence, Confidence::High);
        assert_eq!(r.adjustments.len(), 1);
        assert_eq!(r.adjustments[0].changes[0].action, ChangeAction::Added);
        assert_eq!(r.adjustments[0].changes[1].old_value.as_deref(), Some("170g"));
        assert_eq!(r.macro_changes.calories.after, 1900.0);
        assert_eq!(r.macro_changes.protein, MacroDelta::default());
        assert!(!r.is_fallback());
    }

    #[test]
    fn strips_json_fence() {
        let fenced = format!("Segue a análise:\n```json\n{VALID}\n```\nAbraços");
        let r = parse_response(&fenced);
        assert_eq!(r.summary, "Lanche reforçado");
    }

    #[test]
    fn strips_untagged_fence() {
        let fenced = format!("```\n{VALID}\n```");
        assert_eq!(parse_response(&fenced).confidence, Confidence::High);
    }

    #[test]
    fn invalid_json_falls_back_to_raw_text() {
        let raw = "{\"adjustments\": [ {\"meal_name\": \"Almo";
        let r = parse_response(raw);
        assert!(r.is_fallback());
        assert_eq!(r.confidence, Confidence::Low);
        assert_eq!(r.feedback_text, raw);
        assert!(r.adjustments.is_empty());
        assert_eq!(r.macro_changes, MacroChanges::default());
    }

    #[test]
    fn prose_falls_back() {
        let r = parse_response("Desculpe, não consigo ajudar com isso.");
        assert!(r.is_fallback());
        assert_eq!(r.feedback_text, "Desculpe, não consigo ajudar com isso.");
    }

    #[test]
    fn odd_fields_do_not_discard_other_edits() {
        let raw = r#"{
            "adjustments": [
                {
                    "meal_name": "Almoço",
                    "action": "modified",
                    "changes": [
                        { "action": "modified", "food_name": "Arroz", "new_value": "80g" },
                        { "action": "modified", "food_name": "Feijão", "old_value": 100, "new_value": 60 },
                        { "action": "kept", "food_name": "Salada" }
                    ]
                },
                { "meal_name": "Jantar", "action": "kept", "changes": [] },
                { "meal_name": "Ceia", "changes": [ { "action": "Removed", "food_name": "Chá" } ] }
            ],
            "macro_changes": {
                "calories": { "before": 1850, "after": null },
                "protein": { "after": "130,5" }
            },
            "feedback_text": "Bom trabalho!",
            "confidence": "MEDIUM",
            "summary": "Ajustes no almoço"
        }"#;
        let r = parse_response(raw);

        assert!(!r.is_fallback());
        assert_eq!(r.confidence, Confidence::Medium);
        assert_eq!(r.adjustments.len(), 2);

        let almoco = &r.adjustments[0];
        assert_eq!(almoco.changes.len(), 2);
        assert_eq!(almoco.changes[0].new_value.as_deref(), Some("80g"));
        assert_eq!(almoco.changes[1].old_value.as_deref(), Some("100"));
        assert_eq!(almoco.changes[1].new_value.as_deref(), Some("60"));

        let ceia = &r.adjustments[1];
        assert_eq!(ceia.meal_name, "Ceia");
        assert_eq!(ceia.action, ChangeAction::Modified);
        assert_eq!(ceia.changes[0].action, ChangeAction::Removed);

        assert_eq!(r.macro_changes.calories, MacroDelta { before: 1850.0, after: 0.0 });
        assert_eq!(r.macro_changes.protein.after, 130.5);
        assert_eq!(r.macro_changes.fats, MacroDelta::default());
    }

    #[test]
    fn model_output_keeps_extra_keys() {
        let raw = r#"{"summary": "ok", "confidence": "high", "observacoes": ["beber água"]}"#;
        let out = parse_model_output(raw);
        assert_eq!(out.response.summary, "ok");
        assert_eq!(out.json["observacoes"][0], "beber água");
    }

    #[test]
    fn json_that_is_not_an_object_falls_back() {
        let out = parse_model_output("[1, 2, 3]");
        assert!(out.response.is_fallback());
        assert_eq!(out.json["summary"], FALLBACK_SUMMARY);
        assert_eq!(out.json["confidence"], "low");
    }

    #[test]
    fn unknown_confidence_is_low() {
        let r = parse_response(r#"{"confidence": "certeza", "summary": "x"}"#);
        assert_eq!(r.confidence, Confidence::Low);
        assert!(!r.is_fallback());
    }
}

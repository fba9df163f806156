//! Prompt assembly: check-in, diet and evolution summaries spliced into a
//! template by literal placeholder replacement.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use nutricoach_db::models::{Food, PlanWithMeals, PromptTemplate};

use crate::llm::PINNED_SONNET_MODEL;

pub const DEFAULT_MAX_TOKENS: u32 = 4000;
pub const DEFAULT_TEMPERATURE: f64 = 0.3;

/// Built-in template used when no prompt template is supplied.
pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"Você é um nutricionista experiente revisando o check-in de um paciente.

Paciente: {patientName}

## Check-in
{checkinData}

## Evolução
{evolutionData}

## Dieta atual
{currentDiet}

Objetivo declarado: {objetivo}
Horário em que sente fome: {fome_horario}
Alimento que gostaria de incluir: {alimento_incluir}

Ajuste a dieta somente onde o check-in justificar. Use exatamente os nomes de
refeições e alimentos listados acima.

{feedbackTemplate}

Responda apenas com JSON válido neste formato:
{
  "adjustments": [
    {
      "meal_name": "nome da refeição",
      "action": "modified",
      "reason": "motivo",
      "changes": [
        {
          "action": "modified | added | removed",
          "food_name": "nome do alimento",
          "old_value": "120g",
          "new_value": "80g",
          "reason": "motivo"
        }
      ]
    }
  ],
  "macro_changes": {
    "calories": { "before": 0, "after": 0 },
    "protein": { "before": 0, "after": 0 },
    "carbs": { "before": 0, "after": 0 },
    "fats": { "before": 0, "after": 0 }
  },
  "feedback_text": "mensagem para o paciente",
  "confidence": "high | medium | low",
  "summary": "resumo das alterações"
}"#;

/// Model settings and template text for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSettings {
    pub template: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT_TEMPLATE.to_owned(),
            model: PINNED_SONNET_MODEL.to_owned(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl From<&PromptTemplate> for PromptSettings {
    fn from(t: &PromptTemplate) -> Self {
        Self {
            template: t.prompt_template.clone(),
            model: t.model.clone(),
            max_tokens: u32::try_from(t.max_tokens).unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: t.temperature,
        }
    }
}

/// Patient-reported check-in answers. Unknown keys are kept in `extra`
/// and listed after the known ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckinData {
    #[serde(default)]
    pub peso: Option<f64>,
    #[serde(default)]
    pub objetivo: Option<String>,
    #[serde(default)]
    pub treino: Option<String>,
    #[serde(default)]
    pub fome_algum_horario: Option<String>,
    #[serde(default)]
    pub alimento_para_incluir: Option<String>,
    #[serde(default)]
    pub estresse: Option<String>,
    #[serde(default)]
    pub sono: Option<String>,
    #[serde(default)]
    pub nota_plano: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Comparison against the previous check-in.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EvolutionData {
    #[serde(default)]
    pub weight_delta: Option<f64>,
    #[serde(default)]
    pub waist_delta: Option<f64>,
    #[serde(default)]
    pub adherence_pct: Option<f64>,
}

/// Everything substituted into a template.
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub patient_name: &'a str,
    pub checkin: &'a CheckinData,
    pub evolution: &'a EvolutionData,
    pub plan: &'a PlanWithMeals,
    pub feedback_style: Option<&'a str>,
}

/// Substitute every placeholder in `template`. Placeholders absent from
/// the template are ignored; no escaping is performed.
pub fn build_prompt(template: &str, inputs: &PromptInputs<'_>) -> String {
    let or_blank = |v: &Option<String>| v.clone().unwrap_or_else(|| "não informado".to_owned());
    let style = inputs
        .feedback_style
        .map(|s| format!("Exemplo do tom esperado para o feedback:\n{s}"))
        .unwrap_or_default();

    let replacements: [(&str, String); 8] = [
        ("{patientName}", inputs.patient_name.to_owned()),
        ("{checkinData}", format_checkin(inputs.checkin)),
        ("{currentDiet}", format_diet(inputs.plan)),
        ("{evolutionData}", format_evolution(inputs.evolution)),
        ("{objetivo}", or_blank(&inputs.checkin.objetivo)),
        ("{fome_horario}", or_blank(&inputs.checkin.fome_algum_horario)),
        ("{alimento_incluir}", or_blank(&inputs.checkin.alimento_para_incluir)),
        ("{feedbackTemplate}", style),
    ];

    replacements
        .iter()
        .fold(template.to_owned(), |acc, (token, value)| acc.replace(token, value))
}

pub fn format_checkin(c: &CheckinData) -> String {
    let mut out = String::new();
    let mut line = |label: &str, value: String| {
        let _ = writeln!(out, "- {label}: {value}");
    };

    if let Some(p) = c.peso {
        line("Peso", format!("{p} kg"));
    }
    for (label, value) in [
        ("Objetivo", &c.objetivo),
        ("Treino", &c.treino),
        ("Fome em algum horário", &c.fome_algum_horario),
        ("Alimento para incluir", &c.alimento_para_incluir),
        ("Estresse", &c.estresse),
        ("Sono", &c.sono),
    ] {
        if let Some(v) = value {
            line(label, v.clone());
        }
    }
    if let Some(n) = c.nota_plano {
        line("Nota para o plano", format!("{n}/10"));
    }
    for (key, value) in &c.extra {
        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        line(key, rendered);
    }

    if out.is_empty() {
        out.push_str("Sem dados de check-in.\n");
    }
    out.trim_end().to_owned()
}

pub fn format_evolution(e: &EvolutionData) -> String {
    let mut parts = Vec::new();
    if let Some(w) = e.weight_delta {
        parts.push(format!("- Variação de peso: {w:+} kg"));
    }
    if let Some(w) = e.waist_delta {
        parts.push(format!("- Variação de cintura: {w:+} cm"));
    }
    if let Some(a) = e.adherence_pct {
        parts.push(format!("- Adesão ao plano: {a}%"));
    }
    if parts.is_empty() {
        "Sem dados de evolução.".to_owned()
    } else {
        parts.join("\n")
    }
}

/// Plan totals followed by each meal and its foods, using the display names
/// the model must echo back.
pub fn format_diet(p: &PlanWithMeals) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Plano: {}", p.plan.name);

    let totals = [
        ("kcal", p.plan.total_calories),
        ("proteína (g)", p.plan.total_protein),
        ("carboidratos (g)", p.plan.total_carbs),
        ("gorduras (g)", p.plan.total_fats),
    ];
    let known: Vec<String> = totals
        .iter()
        .filter_map(|(label, v)| v.map(|v| format!("{v} {label}")))
        .collect();
    if !known.is_empty() {
        let _ = writeln!(out, "Totais: {}", known.join(" | "));
    }

    for m in &p.meals {
        let _ = write!(out, "\n### {}", m.meal.meal_name);
        if let Some(time) = &m.meal.suggested_time {
            let _ = write!(out, " ({time})");
        }
        out.push('\n');
        for f in &m.foods {
            let _ = writeln!(out, "- {}", format_food(f));
        }
        if let Some(notes) = &m.meal.instructions {
            let _ = writeln!(out, "  Observações: {notes}");
        }
    }

    if !p.guidelines.is_empty() {
        out.push_str("\nOrientações:\n");
        for g in &p.guidelines {
            let _ = writeln!(out, "- {}: {}", g.title, g.content);
        }
    }

    out.trim_end().to_owned()
}

fn format_food(f: &Food) -> String {
    let amount = match f.unit.as_str() {
        "g" | "kg" | "ml" | "l" => format!("{}{}", f.quantity, f.unit),
        unit => format!("{} {unit}", f.quantity),
    };
    match f.calories {
        Some(kcal) => format!("{}: {amount} ({kcal} kcal)", f.food_name),
        None => format!("{}: {amount}", f.food_name),
    }
}

//! Parsing of free-text food amounts written by the model, such as
//! `"120g"`, `"3 unidade"`, `"reduzir para 80g"` or `"30g · 180kcal"`.

use std::sync::LazyLock;

use regex::Regex;

/// The amount and energy extracted from one value string. Every field is
/// independent: a string may yield calories without a quantity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedValue {
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub calories: Option<f64>,
}

impl ParsedValue {
    /// Nothing could be read from the string.
    pub fn is_empty(&self) -> bool {
        self.quantity.is_none() && self.unit.is_none() && self.calories.is_none()
    }
}

// A fraction like "1/2" is one number.
const NUMBER: &str = r"(\d+(?:[.,]\d+)?(?:/\d+)?)";

// Longer spellings come before their prefixes ("gramas" before "g").
const UNITS: &str = r"(kg|gramas?|g|mililitros?|ml|litros?|l|unidades?|unid|un|fatias?|colher(?:es)?(?:\s+de\s+(?:sopa|chá|cha))?|x[ií]caras?|copos?|conchas?|por[cç](?:ão|ões|ao|oes)|scoops?|peda[cç]os?)";

static PARA_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| build(&format!(r"(?i)\bpara\s+{NUMBER}\s*(?:{UNITS}\b)?")));

static LEADING_AMOUNT: LazyLock<Regex> = LazyLock::new(|| build(&format!(r"(?i)^\s*{NUMBER}\s*{UNITS}\b")));

static SEPARATED_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    build(&format!(r"(?i){NUMBER}\s*(?:{UNITS}\b)?\s*(?:[·•|;,()\-]|$)"))
});

static GRAMS: LazyLock<Regex> = LazyLock::new(|| build(&format!(r"(?i){NUMBER}\s*g\b")));

static LEADING_COUNT: LazyLock<Regex> = LazyLock::new(|| build(&format!(r"(?i)^\s*{NUMBER}\s+\p{{L}}")));

static CALORIES: LazyLock<Regex> = LazyLock::new(|| build(&format!(r"(?i){NUMBER}\s*kcal")));

fn build(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        // The patterns are constants; a failure here is a programming error.
        Err(e) => panic!("invalid quantity pattern {pattern:?}: {e}"),
    }
}

/// Where a quantity pattern takes its unit from.
#[derive(Clone, Copy)]
enum UnitSource {
    /// The optional second capture group.
    Captured,
    /// The pattern only matches grams.
    Grams,
    /// A count of items named in words ("2 ovos"); no unit.
    Count,
}

/// Parse a model-written value string.
///
/// Quantity patterns are tried in priority order and the first match
/// wins: `para <number>[unit]`, a leading `<number><unit>`, a number
/// followed by a separator or the end of the text, a bare `<number>g`,
/// and finally a leading count followed by a word. Calories come from
/// `<number> kcal` anywhere in the text. Decimal commas and simple
/// fractions (`1/2`) are accepted.
pub fn parse_food_value(text: &str) -> ParsedValue {
    let mut parsed = ParsedValue {
        calories: CALORIES
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| parse_number(m.as_str())),
        ..ParsedValue::default()
    };

    let patterns: [(&Regex, UnitSource); 5] = [
        (&PARA_AMOUNT, UnitSource::Captured),
        (&LEADING_AMOUNT, UnitSource::Captured),
        (&SEPARATED_AMOUNT, UnitSource::Captured),
        (&GRAMS, UnitSource::Grams),
        (&LEADING_COUNT, UnitSource::Count),
    ];
    for (re, unit_source) in patterns {
        let Some(caps) = re.captures(text) else {
            continue;
        };
        let Some(quantity) = caps.get(1).and_then(|m| parse_number(m.as_str())) else {
            continue;
        };
        parsed.quantity = Some(quantity);
        parsed.unit = match unit_source {
            UnitSource::Captured => caps.get(2).map(|m| normalize_unit(m.as_str())),
            UnitSource::Grams => Some("g".to_owned()),
            UnitSource::Count => None,
        };
        break;
    }

    parsed
}

fn parse_number(raw: &str) -> Option<f64> {
    match raw.split_once('/') {
        Some((num, den)) => {
            let den = parse_decimal(den)?;
            (den != 0.0).then_some(parse_decimal(num)? / den)
        }
        None => parse_decimal(raw),
    }
}

fn parse_decimal(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse().ok()
}

/// Lowercase a unit, collapse inner whitespace and map long spellings of
/// metric units onto their symbols.
pub fn normalize_unit(raw: &str) -> String {
    let unit = raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    match unit.as_str() {
        "grama" | "gramas" => "g".to_owned(),
        "mililitro" | "mililitros" => "ml".to_owned(),
        _ => unit,
    }
}

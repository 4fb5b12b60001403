use crate::scan::outcome::{AnalysisKind, AnalysisResult, ClassifierPayload, ClassifierSlot};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayRow {
    pub label: String,
    pub value: String,
}

impl fmt::Display for DisplayRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedSection {
    pub source: ClassifierSlot,
    pub title: &'static str,
    pub rows: Vec<DisplayRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedResult {
    pub kind: AnalysisKind,
    pub sections: Vec<RenderedSection>,
}

impl RenderedResult {
    pub fn rows(&self) -> impl Iterator<Item = &DisplayRow> {
        self.sections.iter().flat_map(|section| section.rows.iter())
    }

    pub fn row(&self, label: &str) -> Option<&DisplayRow> {
        self.rows().find(|row| row.label == label)
    }
}

impl fmt::Display for RenderedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, section) in self.sections.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}", section.title)?;
            for row in &section.rows {
                writeln!(f, "{}", row)?;
            }
        }
        Ok(())
    }
}

/// Turns an analysis into display rows. Pure; the same result always renders
/// the same way.
pub fn render_result(result: &AnalysisResult) -> RenderedResult {
    let sections = [ClassifierSlot::Plant, ClassifierSlot::Thermal]
        .into_iter()
        .filter_map(|slot| {
            result.payload(slot).map(|payload| RenderedSection {
                source: slot,
                title: section_title(slot),
                rows: render_payload(payload),
            })
        })
        .collect();

    RenderedResult {
        kind: result.kind(),
        sections,
    }
}

fn section_title(slot: ClassifierSlot) -> &'static str {
    match slot {
        ClassifierSlot::Plant => "Plant Disease Analysis",
        ClassifierSlot::Thermal => "Thermal Analysis",
    }
}

fn render_payload(payload: &ClassifierPayload) -> Vec<DisplayRow> {
    match payload {
        ClassifierPayload::Structured(map) => map
            .iter()
            .map(|(key, value)| DisplayRow {
                label: format_label(key),
                value: format_value(value),
            })
            .collect(),
        ClassifierPayload::Scalar(value) => vec![DisplayRow {
            label: "Result".to_string(),
            value: format_value(value),
        }],
    }
}

/// `leaf_spot_area` becomes `Leaf Spot Area`.
pub fn format_label(key: &str) -> String {
    key.replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn format_value(value: &Value) -> String {
    match value {
        Value::Number(number) => {
            if let Some(n) = number.as_u64() {
                format!("{}.00", n)
            } else if let Some(n) = number.as_i64() {
                format!("{}.00", n)
            } else {
                match number.as_f64() {
                    Some(n) => format!("{:.2}", n),
                    None => number.to_string(),
                }
            }
        }
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

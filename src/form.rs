//! Form state for one job's inspection answers.
//!
//! All writes funnel through [`FormState::set_value`]; the template itself is
//! immutable input and never lives here.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

/// One table row: column id mapped to that column's cell text.
pub type TableRow = HashMap<String, String>;

/// Stored answer for one field. Shape depends on the field type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Answer {
    /// text / textarea / date / signature / single-choice selects.
    Text(String),
    /// number fields. Never NaN; unparsable input clears the answer instead.
    Number(f64),
    /// boolean toggles. Absent until first toggle, then strictly true/false.
    Bool(bool),
    /// multi-select: set of selected option values, no duplicates.
    Multi(Vec<String>),
    /// table fields: ordered rows keyed by column id.
    Table(Vec<TableRow>),
}

/// Placeholder token stored by signature fields. Records only that a
/// signature was captured; no stroke data travels through the form.
pub const SIGNATURE_TOKEN: &str = "signed";

/// Answers for the whole form plus the free-text completion notes.
#[derive(Debug, Clone, Default)]
pub struct FormState {
    /// `{section_id: {field_id: answer}}`.
    values: HashMap<String, HashMap<String, Answer>>,
    /// Free-text notes attached to the completion, outside any section.
    pub notes: String,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The single mutation entry point. Every renderer and the table engine
    /// write through here.
    pub fn set_value(&mut self, section_id: &str, field_id: &str, answer: Answer) {
        self.values
            .entry(section_id.to_string())
            .or_default()
            .insert(field_id.to_string(), answer);
    }

    /// Remove an answer, returning the field to "unanswered".
    pub fn clear_value(&mut self, section_id: &str, field_id: &str) {
        if let Some(section) = self.values.get_mut(section_id) {
            section.remove(field_id);
        }
    }

    /// Read an answer. `None` means unanswered, which consumers must treat
    /// distinctly from explicit false / 0 / "".
    pub fn get(&self, section_id: &str, field_id: &str) -> Option<&Answer> {
        self.values.get(section_id)?.get(field_id)
    }

    /// Apply raw text typed into a number field. Strips everything except
    /// digits, `.` and `-`, then parses; failure or empty input clears the
    /// answer so NaN can never be stored.
    pub fn set_number_input(&mut self, section_id: &str, field_id: &str, raw: &str) {
        match parse_number_input(raw) {
            Some(n) => self.set_value(section_id, field_id, Answer::Number(n)),
            None => self.clear_value(section_id, field_id),
        }
    }

    /// Flip a boolean field. Untouched fields start absent, not false.
    pub fn toggle_bool(&mut self, section_id: &str, field_id: &str) {
        let next = match self.get(section_id, field_id) {
            Some(Answer::Bool(b)) => !b,
            _ => true,
        };
        self.set_value(section_id, field_id, Answer::Bool(next));
    }

    /// Single-choice select: overwrite the prior value, no deselection.
    pub fn select_option(&mut self, section_id: &str, field_id: &str, value: &str) {
        self.set_value(section_id, field_id, Answer::Text(value.to_string()));
    }

    /// Multi-select toggle: selecting an already-selected value removes it.
    pub fn toggle_multi(&mut self, section_id: &str, field_id: &str, value: &str) {
        let mut selected = match self.get(section_id, field_id) {
            Some(Answer::Multi(v)) => v.clone(),
            _ => Vec::new(),
        };
        if let Some(pos) = selected.iter().position(|v| v == value) {
            selected.remove(pos);
        } else {
            selected.push(value.to_string());
        }
        self.set_value(section_id, field_id, Answer::Multi(selected));
    }

    /// Append an empty table row. Every column starts as the empty string
    /// regardless of its type, so a fresh row is "all unanswered".
    pub fn add_table_row(&mut self, section_id: &str, field_id: &str, column_ids: &[String]) {
        let mut rows = self.table_rows(section_id, field_id);
        let row: TableRow = column_ids
            .iter()
            .map(|c| (c.clone(), String::new()))
            .collect();
        rows.push(row);
        self.set_value(section_id, field_id, Answer::Table(rows));
    }

    /// Remove a row by positional index. Out-of-range indexes are a no-op.
    pub fn remove_table_row(&mut self, section_id: &str, field_id: &str, index: usize) {
        let mut rows = self.table_rows(section_id, field_id);
        if index < rows.len() {
            rows.remove(index);
            self.set_value(section_id, field_id, Answer::Table(rows));
        }
    }

    /// Replace one cell, leaving every other row and column untouched.
    pub fn update_table_cell(
        &mut self,
        section_id: &str,
        field_id: &str,
        row_index: usize,
        column_id: &str,
        value: String,
    ) {
        let mut rows = self.table_rows(section_id, field_id);
        if let Some(row) = rows.get_mut(row_index) {
            row.insert(column_id.to_string(), value);
            self.set_value(section_id, field_id, Answer::Table(rows));
        }
    }

    /// Current rows of a table field, empty when unanswered.
    pub fn table_rows(&self, section_id: &str, field_id: &str) -> Vec<TableRow> {
        match self.get(section_id, field_id) {
            Some(Answer::Table(rows)) => rows.clone(),
            _ => Vec::new(),
        }
    }

    /// Serialize all answers for the wire (`{sectionId: {fieldId: value}}`).
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.values)
    }

    /// Whether no field has been answered yet.
    pub fn is_empty(&self) -> bool {
        self.values.values().all(|s| s.is_empty())
    }
}

/// Parse raw number input. Strips all characters except digits, `.` and `-`
/// before parsing; empty or unparsable input yields `None`, never NaN.
pub fn parse_number_input(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| !n.is_nan())
}

/// Display form for a stored date value. Unparsable values show blank
/// rather than failing the render.
pub fn display_date(stored: &str) -> String {
    match NaiveDate::parse_from_str(stored, "%Y-%m-%d") {
        Ok(d) => d.format("%Y-%m-%d").to_string(),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unanswered_is_absent_not_default() {
        let form = FormState::new();
        assert!(form.get("s", "f").is_none());
    }

    #[test]
    fn test_number_input_never_stores_nan() {
        // Arbitrary garbage either parses to a number or clears the answer.
        for raw in ["", "abc", "NaN", "-", ".", "1.2.3", "--5"] {
            let parsed = parse_number_input(raw);
            if let Some(n) = parsed {
                assert!(!n.is_nan(), "NaN stored for input {raw:?}");
            }
        }
        assert_eq!(parse_number_input("12abc.5"), Some(12.5));
        assert_eq!(parse_number_input("$-3"), Some(-3.0));
        assert_eq!(parse_number_input(""), None);
    }

    #[test]
    fn test_empty_number_input_clears_answer() {
        let mut form = FormState::new();
        form.set_number_input("s", "f", "42");
        assert_eq!(form.get("s", "f"), Some(&Answer::Number(42.0)));
        form.set_number_input("s", "f", "");
        assert!(form.get("s", "f").is_none());
    }

    #[test]
    fn test_bool_toggle_starts_true() {
        let mut form = FormState::new();
        form.toggle_bool("s", "f");
        assert_eq!(form.get("s", "f"), Some(&Answer::Bool(true)));
        form.toggle_bool("s", "f");
        assert_eq!(form.get("s", "f"), Some(&Answer::Bool(false)));
    }

    #[test]
    fn test_multi_select_toggle_symmetry() {
        let mut form = FormState::new();
        form.toggle_multi("s", "f", "a");
        form.toggle_multi("s", "f", "b");
        let before = match form.get("s", "f") {
            Some(Answer::Multi(v)) => {
                let mut v = v.clone();
                v.sort();
                v
            }
            other => panic!("unexpected answer: {other:?}"),
        };
        // Toggling the same value twice returns to the original set.
        form.toggle_multi("s", "f", "c");
        form.toggle_multi("s", "f", "c");
        let after = match form.get("s", "f") {
            Some(Answer::Multi(v)) => {
                let mut v = v.clone();
                v.sort();
                v
            }
            other => panic!("unexpected answer: {other:?}"),
        };
        assert_eq!(before, after);
    }

    #[test]
    fn test_select_overwrites_without_deselection() {
        let mut form = FormState::new();
        form.select_option("s", "f", "yes");
        form.select_option("s", "f", "no");
        assert_eq!(form.get("s", "f"), Some(&Answer::Text("no".into())));
    }

    #[test]
    fn test_new_table_row_is_all_empty_strings() {
        let mut form = FormState::new();
        let cols = vec!["part".to_string(), "qty".to_string(), "when".to_string()];
        form.add_table_row("s", "t", &cols);
        let rows = form.table_rows("s", "t");
        assert_eq!(rows.len(), 1);
        for col in &cols {
            assert_eq!(rows[0].get(col), Some(&String::new()));
        }
    }

    #[test]
    fn test_update_cell_touches_only_target() {
        let mut form = FormState::new();
        let cols = vec!["a".to_string(), "b".to_string()];
        form.add_table_row("s", "t", &cols);
        form.add_table_row("s", "t", &cols);
        form.update_table_cell("s", "t", 0, "a", "seed0".into());
        form.update_table_cell("s", "t", 1, "b", "seed1".into());
        let snapshot = form.table_rows("s", "t");

        form.update_table_cell("s", "t", 1, "a", "changed".into());
        let rows = form.table_rows("s", "t");
        // Only rows[1]["a"] may differ from the snapshot.
        assert_eq!(rows[0], snapshot[0]);
        assert_eq!(rows[1].get("b"), snapshot[1].get("b"));
        assert_eq!(rows[1].get("a"), Some(&"changed".to_string()));
    }

    #[test]
    fn test_remove_row_out_of_range_is_noop() {
        let mut form = FormState::new();
        let cols = vec!["a".to_string()];
        form.add_table_row("s", "t", &cols);
        form.remove_table_row("s", "t", 5);
        assert_eq!(form.table_rows("s", "t").len(), 1);
        form.remove_table_row("s", "t", 0);
        assert!(form.table_rows("s", "t").is_empty());
    }

    #[test]
    fn test_display_date_blank_on_garbage() {
        assert_eq!(display_date("2026-02-14"), "2026-02-14");
        assert_eq!(display_date("not a date"), "");
        assert_eq!(display_date("2026-13-99"), "");
    }

    #[test]
    fn test_answers_serialize_untagged() {
        let mut form = FormState::new();
        form.set_value("s1", "notes", Answer::Text("All clear".into()));
        form.set_value("s1", "count", Answer::Number(3.0));
        form.set_value("s1", "ok", Answer::Bool(true));
        let json: serde_json::Value = serde_json::from_str(&form.to_json().unwrap()).unwrap();
        assert_eq!(json["s1"]["notes"], "All clear");
        assert_eq!(json["s1"]["count"], 3.0);
        assert_eq!(json["s1"]["ok"], true);
    }
}

//! Inspection template model supplied by the dispatch backend.

use serde::{Deserialize, Serialize};

/// Server-defined inspection form for one job type. Immutable once fetched.
#[derive(Debug, Clone, Deserialize)]
pub struct InspectionTemplate {
    /// Ordered sections; render order equals data order.
    pub sections: Vec<Section>,
}

/// One titled group of fields.
#[derive(Debug, Clone, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Ordered fields within the section.
    pub fields: Vec<Field>,
}

/// One schema-defined question.
#[derive(Debug, Clone, Deserialize)]
pub struct Field {
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub help_text: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// Option set for select-like fields.
    #[serde(default)]
    pub options: Vec<FieldOption>,
    /// Column layout for table fields.
    #[serde(default)]
    pub columns: Vec<Column>,
}

/// One selectable choice; `value` is stored, `label` is display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

/// One column of a table field with its own primitive type.
#[derive(Debug, Clone, Deserialize)]
pub struct Column {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<FieldOption>,
    #[serde(default)]
    pub placeholder: Option<String>,
}

/// Closed field type tag set. Unknown future tags are preserved as
/// `Unknown` so the form renders a fallback notice instead of crashing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum FieldType {
    Text,
    Textarea,
    Number,
    Boolean,
    Select,
    MultiSelect,
    YesNo,
    YesNoNa,
    PassFail,
    Date,
    Signature,
    Table,
    Photo,
    PhotoMulti,
    Unknown(String),
}

impl From<String> for FieldType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "text" => FieldType::Text,
            "textarea" => FieldType::Textarea,
            "number" => FieldType::Number,
            "boolean" => FieldType::Boolean,
            "select" => FieldType::Select,
            "multi-select" => FieldType::MultiSelect,
            "yes-no" => FieldType::YesNo,
            "yes-no-na" => FieldType::YesNoNa,
            "pass-fail" => FieldType::PassFail,
            "date" => FieldType::Date,
            "signature" => FieldType::Signature,
            "table" => FieldType::Table,
            "photo" => FieldType::Photo,
            "photo-multi" => FieldType::PhotoMulti,
            _ => FieldType::Unknown(tag),
        }
    }
}

/// Primitive column type tag set for table fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ColumnType {
    Text,
    Number,
    Select,
    Date,
    Textarea,
    Unknown(String),
}

impl From<String> for ColumnType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "text" => ColumnType::Text,
            "number" => ColumnType::Number,
            "select" => ColumnType::Select,
            "date" => ColumnType::Date,
            "textarea" => ColumnType::Textarea,
            _ => ColumnType::Unknown(tag),
        }
    }
}

impl Field {
    /// Effective option set for single-choice fields. The yes-no family and
    /// pass-fail carry hardcoded lists, not schema-supplied ones.
    pub fn effective_options(&self) -> Vec<FieldOption> {
        match self.field_type {
            FieldType::YesNo => builtin_options(&["yes", "no"]),
            FieldType::YesNoNa => builtin_options(&["yes", "no", "na"]),
            FieldType::PassFail => builtin_options(&["pass", "fail"]),
            _ => self.options.clone(),
        }
    }
}

/// Build a fixed option list where value doubles as label.
fn builtin_options(values: &[&str]) -> Vec<FieldOption> {
    values
        .iter()
        .map(|v| FieldOption {
            value: (*v).into(),
            label: (*v).into(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_field_type_tags() {
        assert_eq!(FieldType::from("text".to_string()), FieldType::Text);
        assert_eq!(
            FieldType::from("multi-select".to_string()),
            FieldType::MultiSelect
        );
        assert_eq!(FieldType::from("pass-fail".to_string()), FieldType::PassFail);
    }

    #[test]
    fn test_unknown_field_type_is_preserved() {
        let json = r#"{"id":"f1","type":"unknown-future-type","label":"X"}"#;
        let field: Field = serde_json::from_str(json).unwrap();
        assert_eq!(
            field.field_type,
            FieldType::Unknown("unknown-future-type".into())
        );
    }

    #[test]
    fn test_template_deserializes_in_order() {
        let json = r#"{
            "sections": [
                {"id":"s1","title":"General","fields":[
                    {"id":"a","type":"text","label":"A"},
                    {"id":"b","type":"number","label":"B"}
                ]},
                {"id":"s2","title":"Safety","fields":[]}
            ]
        }"#;
        let t: InspectionTemplate = serde_json::from_str(json).unwrap();
        assert_eq!(t.sections.len(), 2);
        assert_eq!(t.sections[0].fields[0].id, "a");
        assert_eq!(t.sections[0].fields[1].field_type, FieldType::Number);
    }

    #[test]
    fn test_yes_no_na_options_are_hardcoded() {
        // Schema-supplied options are ignored for the yes-no family.
        let json = r#"{"id":"f","type":"yes-no-na","label":"Q","options":[{"value":"x","label":"X"}]}"#;
        let field: Field = serde_json::from_str(json).unwrap();
        let opts = field.effective_options();
        let values: Vec<&str> = opts.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, vec!["yes", "no", "na"]);
    }
}

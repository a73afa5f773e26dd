//! Person name parts and display formatting.
//!
//! Works on the flattened `name` entries of a person record, which are either
//! bare strings or structured records with `first` and a `surname` list.

use crate::model::record::Value;

const UNKNOWN_PART: &str = "?";
const PATRONYMIC_DERIVATION: &str = "Patronymic";

/// Decomposed person name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameParts {
    pub first: String,
    pub primary_surnames: Vec<String>,
    pub patronymics: Vec<String>,
    pub other_surnames: Vec<String>,
    /// Explicit grouping override declared on the name entry.
    pub group: Option<String>,
}

impl NameParts {
    /// Splits one `name` entry into its parts.
    ///
    /// A surname is primary unless `prim="0"`; patronymic derivation wins over
    /// the primary flag.
    pub fn from_value(value: &Value) -> Self {
        let Some(name) = value.as_record() else {
            return Self {
                first: UNKNOWN_PART.to_string(),
                primary_surnames: value.as_text().map(str::to_string).into_iter().collect(),
                patronymics: Vec::new(),
                other_surnames: Vec::new(),
                group: None,
            };
        };

        let mut parts = Self {
            first: name.text("first").unwrap_or(UNKNOWN_PART).to_string(),
            primary_surnames: Vec::new(),
            patronymics: Vec::new(),
            other_surnames: Vec::new(),
            group: name.text("group").map(str::to_string),
        };

        let Some(surnames) = name.get("surname") else {
            parts.primary_surnames.push(UNKNOWN_PART.to_string());
            return parts;
        };
        for surname in surnames.iter_items() {
            match surname {
                Value::Text(text) => parts.primary_surnames.push(text.clone()),
                Value::Record(record) => {
                    let text = record.text("text").unwrap_or("???").to_string();
                    if record.text("derivation") == Some(PATRONYMIC_DERIVATION) {
                        parts.patronymics.push(text);
                    } else if record.text("prim") != Some("0") {
                        parts.primary_surnames.push(text);
                    } else {
                        parts.other_surnames.push(text);
                    }
                }
                _ => {}
            }
        }
        parts
    }

    /// Full display form: `first patronymic primary (other)`.
    pub fn display(&self) -> String {
        let text = format!(
            "{} {} {} ({})",
            self.first,
            self.patronymics.join(" "),
            self.primary_surnames.join(", "),
            self.other_surnames.join(", ")
        )
        .replace(" ()", "");
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Short form: `first primary`.
    pub fn first_and_last(&self) -> String {
        format!("{} {}", self.first, self.primary_surnames.join(", "))
            .trim()
            .to_string()
    }
}

/// Parts for every `name` entry of a person record, in archive order.
pub fn name_parts(names: Option<&Value>) -> Vec<NameParts> {
    names
        .map(|value| value.iter_items().map(NameParts::from_value).collect())
        .unwrap_or_default()
}

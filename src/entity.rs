//! Entity descriptors and partial-update field sets

use crate::types::{FromRow, Value};

/// Declared schema of a record type the repository maps to a table
///
/// `FIELDS` lists the column names the type carries; `value_of` is the
/// typed accessor for them. Audit columns never need to be listed: the
/// repository writes them itself.
///
/// ```
/// use generic_repository::{Entity, FromRow, Row, Value, Result};
///
/// struct Category { id: i64, title: String }
///
/// impl FromRow for Category {
///     fn from_row(row: &Row) -> Result<Self> {
///         Ok(Self { id: row.get("Id")?, title: row.get("Title")? })
///     }
/// }
///
/// impl Entity for Category {
///     const NAME: &'static str = "Category";
///     const FIELDS: &'static [&'static str] = &["Id", "Title"];
///
///     fn value_of(&self, field: &str) -> Option<Value> {
///         match field {
///             "Id" => Some(self.id.into()),
///             "Title" => Some(self.title.clone().into()),
///             _ => None,
///         }
///     }
/// }
///
/// assert_eq!(Category::table_name(), "Categories");
/// ```
pub trait Entity: FromRow + Send + Sync {
    /// Type name; the table name is derived from it
    const NAME: &'static str;

    /// Column names this type carries values for
    const FIELDS: &'static [&'static str];

    fn value_of(&self, field: &str) -> Option<Value>;

    /// Physical table name, the plural of [`Entity::NAME`] by default
    fn table_name() -> String {
        pluralize(Self::NAME)
    }

    /// Case-insensitive lookup of a declared field
    fn declares(column: &str) -> bool {
        Self::FIELDS.iter().any(|f| f.eq_ignore_ascii_case(column))
    }

    /// Value for `column`, matching field names case-insensitively;
    /// a declared field without a value binds as NULL
    fn column_value(&self, column: &str) -> Value {
        Self::FIELDS
            .iter()
            .find(|f| f.eq_ignore_ascii_case(column))
            .and_then(|f| self.value_of(f))
            .unwrap_or(Value::Null)
    }
}

const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("foot", "feet"),
    ("tooth", "teeth"),
    ("ox", "oxen"),
];

const UNCOUNTABLE: &[&str] = &["equipment", "information", "money", "series", "species", "data"];

fn match_case(template: &str, word: &str) -> String {
    let mut chars = word.chars();
    match (template.chars().next(), chars.next()) {
        (Some(t), Some(first)) if t.is_uppercase() => {
            first.to_uppercase().chain(chars).collect()
        }
        _ => word.to_string(),
    }
}

/// English plural of a type name (`Person` → `People`)
///
/// Only the last CamelCase word is inflected: `OrderLine` → `OrderLines`.
pub fn pluralize(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }

    let split = name
        .char_indices()
        .skip(1)
        .filter(|(_, c)| c.is_uppercase())
        .map(|(i, _)| i)
        .last()
        .unwrap_or(0);
    let (head, word) = name.split_at(split);
    let lower = word.to_lowercase();

    if UNCOUNTABLE.contains(&lower.as_str()) {
        return name.to_string();
    }

    if let Some((_, plural)) = IRREGULAR_PLURALS.iter().find(|(s, _)| *s == lower) {
        return format!("{}{}", head, match_case(word, plural));
    }

    let plural = if word.ends_with('y')
        && word.len() > 1
        && !matches!(
            lower.chars().nth(lower.len() - 2),
            Some('a' | 'e' | 'i' | 'o' | 'u')
        ) {
        format!("{}ies", &word[..word.len() - 1])
    } else if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        format!("{}es", word)
    } else {
        format!("{}s", word)
    };

    format!("{}{}", head, plural)
}

/// Ordered field/value pairs for a partial update
///
/// Field names are checked against the table's columns before any SQL is
/// built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    fields: Vec<(String, Value)>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing an earlier value for the same name
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(f, _)| *f == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
        self
    }

    /// Value for `field`, matched case-insensitively
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(f, _)| f.eq_ignore_ascii_case(field))
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(f, v)| (f.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Changes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Changes::new(), |changes, (k, v)| changes.set(k, v))
    }
}

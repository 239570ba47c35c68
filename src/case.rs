//! Identifier conversion for generated operation and shape names.

/// Convert a single identifier from snake_case to camelCase.
/// e.g. "user_id" -> "userId", "created_at" -> "createdAt"
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a single identifier from camelCase to snake_case.
/// e.g. "userId" -> "user_id", "createdAt" -> "created_at"
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// "todo_item" / "todoItem" -> "TodoItem".
pub fn to_pascal_case(s: &str) -> String {
    upper_first(&to_camel_case(s))
}

pub fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// English plural of the last word of an identifier. Covers the regular
/// suffix rules; irregular nouns need an explicit name override.
pub fn pluralize(s: &str) -> String {
    let lower = s.to_lowercase();
    let ends_consonant_y = lower.ends_with('y')
        && lower
            .chars()
            .rev()
            .nth(1)
            .map(|c| !"aeiou".contains(c))
            .unwrap_or(false);
    if ends_consonant_y {
        format!("{}ies", &s[..s.len() - 1])
    } else if ["s", "x", "z", "ch", "sh"].iter().any(|suffix| lower.ends_with(suffix)) {
        format!("{}es", s)
    } else {
        format!("{}s", s)
    }
}

/// Names derived from a data shape's name, used by every capability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShapeNames {
    /// "TodoItem"
    pub pascal: String,
    /// "TodoItems"
    pub pascal_plural: String,
    /// "todoItem"
    pub singular: String,
    /// "todoItems"
    pub plural: String,
}

impl ShapeNames {
    pub fn new(name: &str) -> Self {
        let pascal = to_pascal_case(name);
        let pascal_plural = pluralize(&pascal);
        ShapeNames {
            singular: lower_first(&pascal),
            plural: lower_first(&pascal_plural),
            pascal,
            pascal_plural,
        }
    }
}

//! Numbered menu selection
//!
//! Menus list items starting at 1. A reply may mix numbers and names,
//! separated by commas or spaces, or be `all`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Invalid selection '{0}'. Please enter a valid number.")]
    Invalid(String),

    #[error("Please select exactly one item.")]
    NotSingle,
}

/// Resolve a menu reply to item names, in reply order without duplicates
///
/// An empty reply selects nothing.
pub fn parse_selection(input: &str, items: &[String]) -> Result<Vec<String>, SelectionError> {
    let tokens: Vec<&str> = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .collect();

    if tokens.len() == 1 && tokens[0].eq_ignore_ascii_case("all") {
        return Ok(items.to_vec());
    }

    let mut selected: Vec<String> = Vec::new();
    for token in tokens {
        let item = match token.parse::<usize>() {
            Ok(n) if n >= 1 && n <= items.len() => &items[n - 1],
            Ok(_) => return Err(SelectionError::Invalid(token.to_string())),
            Err(_) => items
                .iter()
                .find(|item| item.as_str() == token)
                .ok_or_else(|| SelectionError::Invalid(token.to_string()))?,
        };
        if !selected.contains(item) {
            selected.push(item.clone());
        }
    }
    Ok(selected)
}

/// Resolve a reply that must name at most one item
pub fn parse_single(input: &str, items: &[String]) -> Result<Option<String>, SelectionError> {
    let mut selected = parse_selection(input, items)?;
    match selected.len() {
        0 => Ok(None),
        1 => Ok(selected.pop()),
        _ => Err(SelectionError::NotSingle),
    }
}

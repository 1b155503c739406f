//! Identifier case conversion
//!
//! Internal names are kebab-case (`max-pool-size`), external attribute and
//! operation names are camelCase (`maxPoolSize`). Camel names without digits
//! or consecutive capitals survive `kebab_to_camel(camel_to_kebab(x))`; the
//! other direction loses capitals and empty segments. Name resolution falls
//! back to scanning declared names.

use crate::model::PathElement;

/// `max-pool-size` -> `maxPoolSize`
pub fn kebab_to_camel(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    for (i, part) in word.split('-').enumerate() {
        if i == 0 {
            out.push_str(part);
        } else {
            out.push_str(&capitalize(part));
        }
    }
    out
}

/// `maxPoolSize` -> `max-pool-size`, `Port` -> `-port`
pub fn camel_to_kebab(word: &str) -> String {
    let mut out = String::with_capacity(word.len() + 4);
    for c in word.chars() {
        if c.is_uppercase() {
            out.push('-');
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// External name of the synthesized operation creating a child of type `element`
///
/// `worker=*` -> `addWorker`, `single=only` -> `addSingleOnly`
pub fn add_operation_name(element: &PathElement) -> String {
    let mut name = format!("add{}", capitalize(&kebab_to_camel(&element.key)));
    if !element.is_wildcard() {
        name.push_str(&capitalize(&kebab_to_camel(&element.value)));
    }
    name
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests;

/// Turns a component prefix and an action name into an action type.
pub trait TypeFormatter {
    fn format(&self, prefix: Option<&str>, name: &str) -> String;
}

/// Formats `("my-list", "addItem")` as `MY_LIST_ADD_ITEM`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScreamingSnake;

impl TypeFormatter for ScreamingSnake {
    fn format(&self, prefix: Option<&str>, name: &str) -> String {
        match prefix {
            Some(prefix) if !prefix.is_empty() => {
                format!("{}_{}", screaming_snake(prefix), screaming_snake(name))
            }
            _ => screaming_snake(name),
        }
    }
}

pub fn screaming_snake(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev: Option<char> = None;
    for c in s.chars() {
        if matches!(c, '-' | ' ' | '_' | '.') {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            prev = None;
            continue;
        }
        if c.is_uppercase()
            && prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit())
            && !out.ends_with('_')
        {
            out.push('_');
        }
        out.extend(c.to_uppercase());
        prev = Some(c);
    }
    if out.ends_with('_') {
        out.pop();
    }
    out
}

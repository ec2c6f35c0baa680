//! Literal-aware splitting of selectors into path steps

/// Split a selector into steps, each keeping its own leading slashes.
///
/// A `/` inside a `'quoted'` literal never separates steps, and runs of
/// leading slashes stay attached to the step they introduce, so
/// `//ul//li` becomes `["//ul", "//li"]`.
pub fn split_steps(selector: &str) -> Vec<String> {
    let mut steps = Vec::new();
    let mut current = String::new();
    let mut in_literal = false;

    for c in selector.chars() {
        match c {
            '\'' => {
                in_literal = !in_literal;
                current.push(c);
            }
            '/' if !in_literal && has_body(&current) => {
                steps.push(std::mem::take(&mut current));
                current.push('/');
            }
            _ => current.push(c),
        }
    }

    if has_body(&current) {
        steps.push(current);
    }

    steps
}

/// Split at the last step separator outside literals, returning the prefix
/// (without the separator) and the final segment.
///
/// A selector with no separator returns an empty prefix.
pub fn split_last_step(selector: &str) -> (&str, &str) {
    let mut in_literal = false;
    let mut last = None;

    for (i, c) in selector.char_indices() {
        match c {
            '\'' => in_literal = !in_literal,
            '/' if !in_literal => last = Some(i),
            _ => {}
        }
    }

    match last {
        Some(i) => (&selector[..i], &selector[i + 1..]),
        None => ("", selector),
    }
}

fn has_body(buffer: &str) -> bool {
    buffer.chars().any(|c| c != '/')
}

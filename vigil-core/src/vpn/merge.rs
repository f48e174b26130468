//! User-defined OpenVPN directive merging
//!
//! Users may supply raw OpenVPN directives that override or extend the
//! generated configuration. A user line replaces the generated line with the
//! same directive keyword, in place; anything left over is appended.

/// Extract the directive keyword of a config line, lower-cased
///
/// Blank lines and comments (`#` or `;`) have no keyword.
pub fn directive_keyword(line: &str) -> Option<String> {
    let first = line.split_whitespace().next()?;
    if first.starts_with('#') || first.starts_with(';') {
        return None;
    }
    Some(first.to_lowercase())
}

/// Merge user-supplied directives into generated config lines
///
/// Each generated line whose keyword matches a not yet consumed user line is
/// replaced by that user line. Remaining non-blank user lines are appended in
/// their original order. Comments never replace anything.
pub fn merge_user_directives(generated: Vec<String>, user_text: &str) -> Vec<String> {
    if user_text.trim().is_empty() {
        return generated;
    }

    let mut user_lines: Vec<Option<&str>> = user_text
        .split('\n')
        .map(|line| Some(line.trim_end_matches('\r')))
        .collect();
    let user_keywords: Vec<Option<String>> = user_lines
        .iter()
        .map(|line| line.and_then(directive_keyword))
        .collect();

    let mut merged = Vec::with_capacity(generated.len() + user_lines.len());

    for line in generated {
        let replacement = directive_keyword(&line).and_then(|keyword| {
            user_lines
                .iter_mut()
                .zip(&user_keywords)
                .find(|(user_line, user_keyword)| {
                    user_line.is_some() && user_keyword.as_deref() == Some(keyword.as_str())
                })
                .and_then(|(user_line, _)| user_line.take())
        });

        match replacement {
            Some(user_line) => {
                tracing::debug!("User directive '{}' overrides '{}'", user_line, line);
                merged.push(user_line.to_string());
            }
            None => merged.push(line),
        }
    }

    merged.extend(
        user_lines
            .into_iter()
            .flatten()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string),
    );

    merged
}

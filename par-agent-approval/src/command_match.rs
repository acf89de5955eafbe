//! Allow / deny list matching for shell commands.
//!
//! A command line is split into segments at `&&`, `||`, `;`, `|`, `&` and
//! newlines (outside quotes). An `&` inside a redirection (`2>&1`, `>&2`,
//! `&>`) does not split. Each segment and each pattern is tokenised
//! with shell-word rules; a pattern matches a segment when its tokens are a
//! prefix of the segment's tokens, so `git` matches `git status` but not
//! `gitk`.
//!
//! Deny lists match if ANY segment matches: `ls && rm -rf /` is denied by
//! `rm -rf`. Allow lists match only if EVERY segment matches, so an allowed
//! prefix cannot smuggle in a second command.

/// `&` at byte `i` is part of `>&`, `<&` or `&>`.
fn is_redirection_amp(command: &str, i: usize) -> bool {
    let prev = command[..i].chars().next_back();
    let next = command[i + 1..].chars().next();
    matches!(prev, Some('>' | '<')) || next == Some('>')
}

/// Split a command line into its simple-command segments.
pub fn split_segments(command: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut chars = command.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some('\''), '\'') => quote = None,
            (Some('\''), _) => {}
            (_, '\\') => escaped = true,
            (Some('"'), '"') => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '&') if is_redirection_amp(command, i) => {}
            (None, ';' | '\n' | '|' | '&') => {
                segments.push(&command[start..i]);
                // `&&` and `||` are one separator.
                let mut end = i + c.len_utf8();
                if let Some(&(j, next)) = chars.peek()
                    && next == c
                    && c != ';'
                    && c != '\n'
                {
                    chars.next();
                    end = j + next.len_utf8();
                }
                start = end;
            }
            (None, _) => {}
        }
    }
    segments.push(&command[start..]);

    segments
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Tokenise with shell-word rules, falling back to whitespace splitting
/// when quotes are unbalanced.
pub fn tokenize(segment: &str) -> Vec<String> {
    shell_words::split(segment)
        .unwrap_or_else(|_| segment.split_whitespace().map(str::to_string).collect())
}

fn is_prefix(pattern: &[String], tokens: &[String], ignore_case: bool) -> bool {
    !pattern.is_empty()
        && pattern.len() <= tokens.len()
        && pattern.iter().zip(tokens).all(|(p, t)| {
            if ignore_case {
                p.eq_ignore_ascii_case(t)
            } else {
                p == t
            }
        })
}

/// The first deny pattern that matches any segment of `command`, if any.
///
/// Matching is ASCII case-insensitive.
pub fn deny_match<'a>(command: &str, patterns: &'a [String]) -> Option<&'a str> {
    if patterns.is_empty() {
        return None;
    }
    let segments: Vec<Vec<String>> = split_segments(command)
        .into_iter()
        .map(tokenize)
        .collect();
    patterns.iter().map(String::as_str).find(|pattern| {
        let pattern_tokens = tokenize(pattern);
        segments
            .iter()
            .any(|tokens| is_prefix(&pattern_tokens, tokens, true))
    })
}

/// `true` when every segment of `command` starts with some allow pattern.
///
/// An empty command is never allowed.
pub fn allow_match(command: &str, patterns: &[String]) -> bool {
    let pattern_tokens: Vec<Vec<String>> = patterns.iter().map(|p| tokenize(p)).collect();
    let segments = split_segments(command);
    !segments.is_empty()
        && segments.into_iter().all(|segment| {
            let tokens = tokenize(segment);
            pattern_tokens
                .iter()
                .any(|pattern| is_prefix(pattern, &tokens, false))
        })
}

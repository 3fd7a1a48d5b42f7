/// Splits a command line into tokens.
///
/// Handles:
/// - Space-separated tokens (runs of spaces count as one separator)
/// - Double-quoted strings, whose spaces are kept and quotes removed
/// - An unterminated quote, which runs to the end of the line
///
/// Empty tokens are dropped. Other whitespace is part of a token.
pub fn split_command_line(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quote = !in_quote;
            }
            ' ' if !in_quote => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => {
                current.push(ch);
            }
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

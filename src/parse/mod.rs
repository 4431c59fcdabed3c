mod error;
mod grammar;
mod parser;

pub use error::ParseError;
pub use parser::{ParsedItem, ParsedRule, ParsedRules};

/// Parse a DSL input string into [`ParsedRules`].
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not valid DSL syntax.
pub fn parse(input: &str) -> Result<ParsedRules, ParseError> {
    use winnow::Parser;
    let mut parsed = grammar::parse_rules
        .parse(input)
        .map_err(|e| ParseError::new(e.to_string()))?;
    for item in &mut parsed.items {
        if let ParsedItem::Rule(rule) = item {
            (rule.line, rule.column) = line_column(input, input.len() - rule.remaining);
        }
    }
    Ok(parsed)
}

/// Parse a standalone filter expression such as `host.zone == "eu"`.
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not a valid expression.
pub fn parse_filter(input: &str) -> Result<crate::Expr, ParseError> {
    use winnow::Parser;
    grammar::filter
        .parse(input)
        .map_err(|e| ParseError::new(e.to_string()))
}

fn line_column(input: &str, offset: usize) -> (u32, u32) {
    let before = &input[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rsplit('\n')
        .next()
        .map_or(0, |l| l.chars().count())
        + 1;
    (
        u32::try_from(line).unwrap_or(u32::MAX),
        u32::try_from(column).unwrap_or(u32::MAX),
    )
}

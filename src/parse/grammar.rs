use winnow::ascii::{dec_int, till_line_ending};
use winnow::combinator::{alt, cut_err, delimited, not, opt, preceded, repeat, terminated};
use winnow::error::{ErrMode, ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_while};

use crate::{CompareOp, Expr, Node, Value};

use super::parser::{ParsedItem, ParsedRule, ParsedRules};

// -- Whitespace & comments --------------------------------------------------

fn ws(input: &mut &str) -> ModalResult<()> {
    let _: () = repeat(
        0..,
        alt((
            take_while(1.., |c: char| c.is_ascii_whitespace()).void(),
            ('#', till_line_ending).void(),
            ("//", till_line_ending).void(),
        )),
    )
    .parse_next(input)?;
    Ok(())
}

// -- Identifiers & keywords -------------------------------------------------

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// A reserved word not followed by further identifier characters.
fn keyword<'i>(kw: &'static str) -> impl FnMut(&mut &'i str) -> ModalResult<&'i str> {
    move |input: &mut &'i str| terminated(kw, not(one_of(is_ident_char))).parse_next(input)
}

fn ident<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        take_while(1.., |c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., is_ident_char),
    )
        .take()
        .parse_next(input)
}

/// Dotted reference such as `host.vars.os`.
fn path<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        take_while(1.., |c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| is_ident_char(c) || c == '.'),
    )
        .take()
        .parse_next(input)
}

// -- Values -----------------------------------------------------------------

fn string_literal(input: &mut &str) -> ModalResult<String> {
    '"'.parse_next(input)?;
    let mut s = String::new();
    loop {
        let ch = any.parse_next(input)?;
        match ch {
            '"' => return Ok(s),
            '\\' => {
                let esc = any.parse_next(input)?;
                match esc {
                    '"' => s.push('"'),
                    '\\' => s.push('\\'),
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    other => {
                        s.push('\\');
                        s.push(other);
                    }
                }
            }
            c => s.push(c),
        }
    }
}

fn negative_number(input: &mut &str) -> ModalResult<Value> {
    let neg_str = ('-', take_while(1.., |c: char| c.is_ascii_digit() || c == '.'))
        .take()
        .parse_next(input)?;
    if neg_str.contains('.') {
        let f: f64 = neg_str
            .parse()
            .map_err(|_| ErrMode::from_input(input).cut())?;
        Ok(Value::Float(f))
    } else {
        let i: i64 = neg_str
            .parse()
            .map_err(|_| ErrMode::from_input(input).cut())?;
        Ok(Value::Int(i))
    }
}

fn float_literal(input: &mut &str) -> ModalResult<f64> {
    (
        take_while(1.., |c: char| c.is_ascii_digit()),
        '.',
        take_while(1.., |c: char| c.is_ascii_digit()),
    )
        .take()
        .try_map(|s: &str| s.parse::<f64>())
        .parse_next(input)
}

fn value(input: &mut &str) -> ModalResult<Value> {
    ws.parse_next(input)?;
    alt((
        string_literal.map(Value::String),
        keyword("true").value(Value::Bool(true)),
        keyword("false").value(Value::Bool(false)),
        negative_number,
        float_literal.map(Value::Float),
        dec_int::<_, i64, _>.map(Value::Int),
    ))
    .context(StrContext::Expected(StrContextValue::Description("value")))
    .parse_next(input)
}

// -- Comparison operators ---------------------------------------------------

fn compare_op(input: &mut &str) -> ModalResult<CompareOp> {
    ws.parse_next(input)?;
    alt((
        ">=".value(CompareOp::Gte),
        ">".value(CompareOp::Gt),
        "<=".value(CompareOp::Lte),
        "<".value(CompareOp::Lt),
        "==".value(CompareOp::Eq),
        "!=".value(CompareOp::Neq),
    ))
    .parse_next(input)
}

// -- Filter expressions (precedence: OR < AND < NOT < primary) ---------------

fn primary(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    alt((
        delimited('(', expr, (ws, cut_err(')'))),
        keyword("true").value(Expr::Const(true)),
        keyword("false").value(Expr::Const(false)),
        comparison_or_bare_path,
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "expression",
    )))
    .parse_next(input)
}

fn comparison_or_bare_path(input: &mut &str) -> ModalResult<Expr> {
    let field = path.parse_next(input)?;
    let checkpoint = input.checkpoint();
    if let Ok(op) = compare_op.parse_next(input) {
        let value = cut_err(value).parse_next(input)?;
        Ok(Expr::Compare {
            field: field.to_owned(),
            op,
            value,
        })
    } else {
        // A bare reference tests for boolean true.
        input.reset(&checkpoint);
        Ok(Expr::Compare {
            field: field.to_owned(),
            op: CompareOp::Eq,
            value: Value::Bool(true),
        })
    }
}

fn unary(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    if opt(alt((keyword("NOT"), keyword("not"), "!")))
        .parse_next(input)?
        .is_some()
    {
        let inner = cut_err(unary).parse_next(input)?;
        Ok(Expr::Not(Box::new(inner)))
    } else {
        primary(input)
    }
}

fn and_expr(input: &mut &str) -> ModalResult<Expr> {
    let first = unary(input)?;
    let rest: Vec<Expr> = repeat(
        0..,
        preceded((ws, alt((keyword("AND"), keyword("and"), "&&"))), cut_err(unary)),
    )
    .parse_next(input)?;
    Ok(rest.into_iter().fold(first, Expr::and))
}

fn or_expr(input: &mut &str) -> ModalResult<Expr> {
    let first = and_expr(input)?;
    let rest: Vec<Expr> = repeat(
        0..,
        preceded((ws, alt((keyword("OR"), keyword("or"), "||"))), cut_err(and_expr)),
    )
    .parse_next(input)?;
    Ok(rest.into_iter().fold(first, Expr::or))
}

pub(super) fn expr(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    or_expr(input)
}

/// A whole input holding one expression.
pub(super) fn filter(input: &mut &str) -> ModalResult<Expr> {
    let e = expr(input)?;
    ws.parse_next(input)?;
    Ok(e)
}

// -- Rule bodies ------------------------------------------------------------

enum Statement {
    Assign(Expr),
    Ignore(Expr),
    Set(Node),
}

fn where_clause<'i>(kw: &'static str) -> impl FnMut(&mut &'i str) -> ModalResult<Expr> {
    move |input: &mut &'i str| {
        (keyword(kw), ws, keyword("where")).parse_next(input)?;
        cut_err(expr)
            .context(StrContext::Expected(StrContextValue::Description(
                "filter expression",
            )))
            .parse_next(input)
    }
}

fn set_statement(input: &mut &str) -> ModalResult<Node> {
    let attribute = ident.parse_next(input)?;
    (ws, '=').parse_next(input)?;
    ws.parse_next(input)?;
    let value = cut_err(alt((value.map(Node::Literal), path.map(Node::variable))))
        .context(StrContext::Expected(StrContextValue::Description(
            "value or variable",
        )))
        .parse_next(input)?;
    Ok(Node::set(attribute, value))
}

fn statement(input: &mut &str) -> ModalResult<Statement> {
    ws.parse_next(input)?;
    let stmt = alt((
        where_clause("assign").map(Statement::Assign),
        where_clause("ignore").map(Statement::Ignore),
        set_statement.map(Statement::Set),
    ))
    .parse_next(input)?;
    opt((ws, ';')).parse_next(input)?;
    Ok(stmt)
}

// -- Top-level items --------------------------------------------------------

fn var_decl(input: &mut &str) -> ModalResult<ParsedItem> {
    keyword("var").parse_next(input)?;
    ws.parse_next(input)?;
    let name = cut_err(ident)
        .context(StrContext::Expected(StrContextValue::Description(
            "variable name",
        )))
        .parse_next(input)?;
    (ws, cut_err('=')).parse_next(input)?;
    let value = cut_err(value).parse_next(input)?;
    opt((ws, ';')).parse_next(input)?;
    Ok(ParsedItem::Var {
        name: name.to_owned(),
        value,
    })
}

fn apply_rule(input: &mut &str) -> ModalResult<ParsedItem> {
    let remaining = input.len();
    keyword("apply").parse_next(input)?;
    ws.parse_next(input)?;

    let kind = cut_err(ident)
        .context(StrContext::Expected(StrContextValue::Description("kind")))
        .parse_next(input)?;
    ws.parse_next(input)?;
    let name = cut_err(string_literal)
        .context(StrContext::Expected(StrContextValue::Description(
            "quoted rule name",
        )))
        .parse_next(input)?;
    ws.parse_next(input)?;
    cut_err(keyword("to"))
        .context(StrContext::Expected(StrContextValue::StringLiteral("to")))
        .parse_next(input)?;
    ws.parse_next(input)?;
    let target = cut_err(ident)
        .context(StrContext::Expected(StrContextValue::Description(
            "target type",
        )))
        .parse_next(input)?;
    (ws, cut_err('{')).parse_next(input)?;

    let statements: Vec<Statement> = repeat(0.., statement).parse_next(input)?;
    (ws, cut_err('}')).parse_next(input)?;

    let mut rule = ParsedRule {
        kind: kind.to_owned(),
        name,
        target: target.to_owned(),
        assign: Vec::new(),
        ignore: Vec::new(),
        body: Vec::new(),
        line: 0,
        column: 0,
        remaining,
    };
    for stmt in statements {
        match stmt {
            Statement::Assign(e) => rule.assign.push(e),
            Statement::Ignore(e) => rule.ignore.push(e),
            Statement::Set(n) => rule.body.push(n),
        }
    }
    Ok(ParsedItem::Rule(rule))
}

fn item(input: &mut &str) -> ModalResult<ParsedItem> {
    ws.parse_next(input)?;
    alt((var_decl, apply_rule)).parse_next(input)
}

pub fn parse_rules(input: &mut &str) -> ModalResult<ParsedRules> {
    let items: Vec<ParsedItem> = repeat(0.., item).parse_next(input)?;
    ws.parse_next(input)?;
    Ok(ParsedRules { items })
}

#[cfg(test)]
mod tests {
    use crate::parse::parse;

    use super::*;

    fn single_rule(input: &str) -> ParsedRule {
        let parsed = parse(input).unwrap();
        match parsed.items.into_iter().next() {
            Some(ParsedItem::Rule(rule)) => rule,
            other => panic!("expected rule, got {other:?}"),
        }
    }

    fn filter(src: &str) -> Expr {
        expr.parse(src).unwrap()
    }

    #[test]
    fn parse_minimal_rule() {
        let rule = single_rule(r#"apply Dependency "d" to Host { assign where true }"#);
        assert_eq!(rule.kind, "Dependency");
        assert_eq!(rule.name, "d");
        assert_eq!(rule.target, "Host");
        assert_eq!(rule.assign, vec![Expr::Const(true)]);
        assert!(rule.ignore.is_empty());
        assert!(rule.body.is_empty());
    }

    #[test]
    fn parse_body_statements_in_order() {
        let rule = single_rule(
            r#"apply Dependency "d" to Service {
                parent_host_name = "db1"
                zone = default_zone;
                disable_checks = true
                assign where service.name == "http"
                ignore where host.name == "lab"
            }"#,
        );
        assert_eq!(
            rule.body,
            vec![
                Node::assign("parent_host_name", "db1"),
                Node::set("zone", Node::variable("default_zone")),
                Node::assign("disable_checks", true),
            ]
        );
        assert_eq!(rule.assign.len(), 1);
        assert_eq!(rule.ignore.len(), 1);
    }

    #[test]
    fn parse_var_declaration() {
        let parsed = parse("var default_zone = \"eu\"\nvar retries = 3;").unwrap();
        assert!(matches!(
            &parsed.items[0],
            ParsedItem::Var { name, value } if name == "default_zone" && *value == Value::from("eu")
        ));
        assert!(matches!(
            &parsed.items[1],
            ParsedItem::Var { value: Value::Int(3), .. }
        ));
    }

    #[test]
    fn parse_operator_spellings() {
        for src in ["a == 1 && b == 2", "a == 1 AND b == 2", "a == 1 and b == 2"] {
            assert!(matches!(filter(src), Expr::And(_, _)), "failed for {src}");
        }
        for src in ["a == 1 || b == 2", "a == 1 OR b == 2", "a == 1 or b == 2"] {
            assert!(matches!(filter(src), Expr::Or(_, _)), "failed for {src}");
        }
        for src in ["!a", "NOT a", "not a"] {
            assert!(matches!(filter(src), Expr::Not(_)), "failed for {src}");
        }
    }

    #[test]
    fn parse_precedence_and_before_or() {
        match filter("a OR b AND c") {
            Expr::Or(left, right) => {
                assert!(matches!(left.as_ref(), Expr::Compare { field, .. } if field == "a"));
                assert!(matches!(right.as_ref(), Expr::And(_, _)));
            }
            other => panic!("expected Or, got {other:?}"),
        }
    }

    #[test]
    fn parse_parenthesized_grouping() {
        match filter("(a OR b) AND c") {
            Expr::And(left, _) => assert!(matches!(left.as_ref(), Expr::Or(_, _))),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn bare_path_means_true() {
        assert_eq!(
            filter("host.vars.virtual"),
            Expr::Compare {
                field: "host.vars.virtual".into(),
                op: CompareOp::Eq,
                value: Value::Bool(true),
            }
        );
    }

    #[test]
    fn keyword_prefix_is_an_identifier() {
        // `notes` and `order` start with operator words but are plain paths.
        match filter("notes OR order") {
            Expr::Or(left, right) => {
                assert!(matches!(left.as_ref(), Expr::Compare { field, .. } if field == "notes"));
                assert!(matches!(right.as_ref(), Expr::Compare { field, .. } if field == "order"));
            }
            other => panic!("expected Or, got {other:?}"),
        }
    }

    #[test]
    fn parse_all_comparison_ops() {
        let ops = [
            ("==", CompareOp::Eq),
            ("!=", CompareOp::Neq),
            (">", CompareOp::Gt),
            (">=", CompareOp::Gte),
            ("<", CompareOp::Lt),
            ("<=", CompareOp::Lte),
        ];
        for (sym, expected_op) in ops {
            match filter(&format!("host.cores {sym} 4")) {
                Expr::Compare { op, .. } => assert_eq!(op, expected_op, "failed for {sym}"),
                other => panic!("expected Compare for {sym}, got {other:?}"),
            }
        }
    }

    #[test]
    fn parse_all_value_types() {
        let cases = [
            ("42", Value::Int(42)),
            ("-5", Value::Int(-5)),
            ("2.5", Value::Float(2.5)),
            ("true", Value::Bool(true)),
            (r#""a\"b""#, Value::String("a\"b".into())),
        ];
        for (literal, expected) in cases {
            match filter(&format!("x == {literal}")) {
                Expr::Compare { value, .. } => assert_eq!(value, expected, "failed for {literal}"),
                other => panic!("expected Compare for {literal}, got {other:?}"),
            }
        }
    }

    #[test]
    fn comments_ignored() {
        let rule = single_rule(
            "# header\napply Dependency \"d\" to Host {\n  // why\n  assign where true # trailing\n}",
        );
        assert_eq!(rule.assign, vec![Expr::Const(true)]);
    }

    #[test]
    fn missing_brace_is_an_error() {
        assert!(parse(r#"apply Dependency "d" to Host { assign where true"#).is_err());
    }

    #[test]
    fn missing_filter_expression_is_an_error() {
        assert!(parse(r#"apply Dependency "d" to Host { assign where }"#).is_err());
    }

    #[test]
    fn rule_positions_recorded() {
        let parsed = parse("var z = \"eu\"\n\n  apply Dependency \"d\" to Host { assign where true }").unwrap();
        match &parsed.items[1] {
            ParsedItem::Rule(rule) => assert_eq!((rule.line, rule.column), (3, 3)),
            other => panic!("expected rule, got {other:?}"),
        }
    }
}

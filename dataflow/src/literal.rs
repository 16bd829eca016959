// literal.rs — Safe evaluator for constant argument text
//
// Parses the literal sublanguage (numbers, strings, booleans, dtype names,
// nested lists and tuples) with chumsky over the logos token stream, and
// evaluates it to an `Object`. Nothing else is ever evaluated: names other
// than dtypes are rejected, so bare identifiers can be reported as unbound.
//
// Preconditions: none.
// Postconditions: `parse` consumes the whole input or fails.
// Failure modes: lex/parse failures produce `LiteralError::Syntax`.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::Literal;
use crate::error::LiteralError;
use crate::lexer::Token;
use crate::object::Object;

/// Parse literal text into a `Literal`.
pub fn parse(text: &str) -> Result<Literal, LiteralError> {
    let lex_result = crate::lexer::lex(text);
    if let Some(err) = lex_result.errors.first() {
        return Err(LiteralError::Syntax {
            text: text.to_string(),
            message: err.message.clone(),
        });
    }
    let len = text.len();
    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let (literal, errors) = literal_parser(text).parse(stream).into_output_errors();
    match literal {
        Some(literal) if errors.is_empty() => Ok(literal),
        _ => Err(LiteralError::Syntax {
            text: text.to_string(),
            message: errors
                .first()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "not a literal".to_string()),
        }),
    }
}

/// Parse and evaluate literal text.
pub fn evaluate(text: &str) -> Result<Object, LiteralError> {
    parse(text)?.to_object()
}

// ── Grammar ──
//
// literal := INT | FLOAT | STR | True | False | NAME
//          | '[' (literal (',' literal)* ','?)? ']'
//          | '(' literal ')'
//          | '(' (literal ',')+ literal? ')' | '(' ')'

fn literal_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Literal, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    recursive(|literal| {
        let scalar = select! {
            Token::Int(n) => Literal::Int(n),
            Token::Float(x) => Literal::Float(x),
            Token::Str(s) => Literal::Str(s),
            Token::True => Literal::Bool(true),
            Token::False => Literal::Bool(false),
        };

        let name = just(Token::Name).map_with(move |_, e| {
            let span: SimpleSpan = e.span();
            Literal::Name(source[span.start()..span.end()].to_string())
        });

        let list = literal
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .map(Literal::List);

        // `(x)` is just `x`; a comma makes it a tuple.
        let grouped = literal
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let tuple = literal
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen))
            .map(Literal::Tuple);

        choice((scalar, name, list, grouped, tuple))
    })
    .then_ignore(end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::DType;

    fn parse_ok(text: &str) -> Literal {
        match parse(text) {
            Ok(lit) => lit,
            Err(e) => panic!("failed to parse {text:?}: {e}"),
        }
    }

    #[test]
    fn scalars() {
        assert_eq!(parse_ok("3"), Literal::Int(3));
        assert_eq!(parse_ok("-1"), Literal::Int(-1));
        assert_eq!(parse_ok("0."), Literal::Float(0.0));
        assert_eq!(parse_ok("True"), Literal::Bool(true));
        assert_eq!(parse_ok("'left'"), Literal::Str("left".into()));
    }

    #[test]
    fn nested_sequences() {
        assert_eq!(
            parse_ok("[[1, 2], [3, 4]]"),
            Literal::List(vec![
                Literal::List(vec![Literal::Int(1), Literal::Int(2)]),
                Literal::List(vec![Literal::Int(3), Literal::Int(4)]),
            ])
        );
        assert_eq!(parse_ok("(1, 2)"), Literal::Tuple(vec![Literal::Int(1), Literal::Int(2)]));
    }

    #[test]
    fn parenthesized_value_is_not_a_tuple() {
        assert_eq!(parse_ok("(5)"), Literal::Int(5));
        assert_eq!(parse_ok("(5,)"), Literal::Tuple(vec![Literal::Int(5)]));
        assert_eq!(parse_ok("()"), Literal::Tuple(vec![]));
    }

    #[test]
    fn evaluates_dtype_names() {
        assert_eq!(evaluate("tf.float32").unwrap(), Object::DType(DType::Float32));
    }

    #[test]
    fn rejects_identifiers_and_expressions() {
        assert!(matches!(evaluate("in1"), Err(LiteralError::UnknownName(_))));
        assert!(matches!(parse("1 + 2"), Err(LiteralError::Syntax { .. })));
        assert!(matches!(parse("[1, 2"), Err(LiteralError::Syntax { .. })));
        assert!(matches!(parse("1 2"), Err(LiteralError::Syntax { .. })));
    }
}

//! Grammar oracle, the second admission layer.
//!
//! The filter forwards a candidate only when the oracle says it does *not*
//! parse. Text that survives the byte denylist and still forms a complete
//! statement or compound expression is treated as a working injection.

use sqlparser::ast::Expr;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

/// Decides whether a candidate is well-formed under some query grammar.
pub trait Validator: Send + Sync {
    /// `true` if `candidate` parses as a complete, well-formed input.
    fn parses(&self, candidate: &str) -> bool;
}

/// MySQL grammar oracle backed by `sqlparser`.
///
/// A candidate parses if it is one or more complete statements, or a single
/// complete expression built from more than one term (an operator, call,
/// predicate, and so on). A bare identifier or literal is inert text.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlGrammarValidator;

impl SqlGrammarValidator {
    /// Validator for the MySQL dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn parses_as_statements(candidate: &str) -> bool {
        Parser::parse_sql(&MySqlDialect {}, candidate).is_ok_and(|stmts| !stmts.is_empty())
    }

    fn parses_as_compound_expr(candidate: &str) -> bool {
        let dialect = MySqlDialect {};
        let Ok(mut parser) = Parser::new(&dialect).try_with_sql(candidate) else {
            return false;
        };
        let Ok(expr) = parser.parse_expr() else {
            return false;
        };
        if parser.peek_token().token != Token::EOF {
            return false;
        }
        !matches!(
            expr,
            Expr::Identifier(_) | Expr::CompoundIdentifier(_) | Expr::Value(_)
        )
    }
}

impl Validator for SqlGrammarValidator {
    fn parses(&self, candidate: &str) -> bool {
        Self::parses_as_statements(candidate) || Self::parses_as_compound_expr(candidate)
    }
}

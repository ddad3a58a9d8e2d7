// src/domain/extract.rs

use crate::domain::{Action, DomainTag, ingest::normalize_action_type};
use regex::Regex;
use std::sync::LazyLock;

static SYMBOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9_-]+").expect("symbol pattern compiles"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTokens {
    pub name: String,
    pub args: Vec<String>,
}

impl ActionTokens {
    fn from_symbols<'a>(mut symbols: impl Iterator<Item = &'a str>) -> Option<Self> {
        let name = normalize_action_type(symbols.next()?);
        let args = symbols.map(str::to_lowercase).collect();
        Some(Self { name, args })
    }

    pub fn expect_arity(
        &self,
        action: &'static str,
        arity: usize,
        line: &str,
    ) -> Result<&[String], ExtractError> {
        if self.args.len() == arity {
            Ok(&self.args)
        } else {
            Err(ExtractError::Arity {
                action,
                expected: arity,
                found: self.args.len(),
                line: line.trim().to_string(),
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("unrecognized action `{0}`")]
    UnknownAction(String),
    #[error("cannot parse arguments of {action} from `{line}` (expected {expected}, found {found})")]
    Arity {
        action: &'static str,
        expected: usize,
        found: usize,
        line: String,
    },
}

pub trait ExtractionStrategy: Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, line: &str) -> Option<ActionTokens>;
}

/// `(stack a b)`: strip parentheses, split on whitespace.
pub struct WhitespaceTokens;

impl ExtractionStrategy for WhitespaceTokens {
    fn name(&self) -> &'static str {
        "whitespace"
    }

    fn extract(&self, line: &str) -> Option<ActionTokens> {
        let inner = line.trim().trim_start_matches('(').trim_end_matches(')');
        ActionTokens::from_symbols(inner.split_whitespace())
    }
}

/// `(stack,a,b)` or `stack(a, b)`: every identifier-like run is a token.
pub struct SymbolTokens;

impl ExtractionStrategy for SymbolTokens {
    fn name(&self) -> &'static str {
        "symbols"
    }

    fn extract(&self, line: &str) -> Option<ActionTokens> {
        ActionTokens::from_symbols(SYMBOL.find_iter(line).map(|m| m.as_str()))
    }
}

pub static STRATEGIES: &[&dyn ExtractionStrategy] = &[&WhitespaceTokens, &SymbolTokens];

/// Tries each strategy in order. The first whose tokens form a valid action
/// wins; otherwise the first arity error, or else the first failure, is returned.
pub fn parse_action_line(domain: DomainTag, line: &str) -> Result<Action, ExtractError> {
    let mut failure: Option<ExtractError> = None;

    for strategy in STRATEGIES {
        let Some(tokens) = strategy.extract(line) else {
            continue;
        };
        match Action::from_tokens(domain, &tokens, line) {
            Ok(action) => return Ok(action),
            // An arity complaint about a recognized action says more than "unknown".
            Err(error @ ExtractError::Arity { .. }) => {
                if !matches!(failure, Some(ExtractError::Arity { .. })) {
                    failure = Some(error);
                }
            }
            Err(error) => {
                failure.get_or_insert(error);
            }
        }
    }

    Err(failure.unwrap_or_else(|| ExtractError::UnknownAction(line.trim().to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::blocksworld::BlocksAction;

    #[test]
    fn whitespace_strategy_handles_canonical_lines() {
        let tokens = WhitespaceTokens.extract("(Stack A B)").unwrap();
        assert_eq!(tokens.name, "stack");
        assert_eq!(tokens.args, vec!["a", "b"]);
    }

    #[test]
    fn whitespace_strategy_declines_blank_lines() {
        assert_eq!(WhitespaceTokens.extract("  ( ) "), None);
        assert_eq!(SymbolTokens.extract("()"), None);
    }

    #[test]
    fn symbol_strategy_handles_commas() {
        let tokens = SymbolTokens.extract("(pick-up,a)").unwrap();
        assert_eq!(tokens.name, "pick-up");
        assert_eq!(tokens.args, vec!["a"]);
    }

    #[test]
    fn falls_through_to_later_strategy() {
        assert_eq!(
            parse_action_line(DomainTag::Blocksworld, "(pick-up,a)"),
            Ok(Action::Blocks(BlocksAction::PickUp { block: "a".into() }))
        );
    }

    #[test]
    fn missing_arguments_end_in_explicit_failure() {
        let error = parse_action_line(DomainTag::Blocksworld, "(stack a)").unwrap_err();
        assert_eq!(
            error,
            ExtractError::Arity {
                action: "stack",
                expected: 2,
                found: 1,
                line: "(stack a)".into()
            }
        );
        assert!(error.to_string().starts_with("cannot parse arguments of stack"));
    }

    #[test]
    fn unknown_actions_are_reported_as_such() {
        assert_eq!(
            parse_action_line(DomainTag::Blocksworld, "(fly a)"),
            Err(ExtractError::UnknownAction("(fly a)".into()))
        );
    }
}

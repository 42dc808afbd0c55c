#![allow(clippy::new_without_default)]
#![allow(clippy::type_complexity)]
#![forbid(unsafe_code)]

//! `earleypar` parses input with any context free grammar built by
//! [`earleygrm`](https://crates.io/crates/earleygrm), including ambiguous, left recursive, and
//! cyclic grammars.
//!
//! Parsing produces a [`Forest`]: a shared packed parse forest which compactly records every way
//! the grammar's start rule matches the input. A forest can then be:
//!
//!   * disambiguated in place, so that each node has a single derivation, either with the
//!     grammar's production priorities ([`Forest::prioritize`]) or any other ordering of
//!     productions ([`Forest::disambiguate`]);
//!   * walked with a user-defined [`ForestVisitor`];
//!   * evaluated with the grammar's actions ([`Forest::evaluate`]);
//!   * pretty printed ([`Forest::pp`]).
//!
//! Input is a slice of lexemes. A lexeme matches a grammar token if it is equal to the token's
//! name, or if the token is a token class whose predicate accepts it.
//!
//! ## Example
//!
//! A calculator with an ambiguous grammar. Productions declared earlier have higher priorities,
//! so `+` binds more loosely than `*`:
//!
//! ```rust
//! use earleygrm::{Grammar, GrammarBuilder, RuleDecl, Value};
//! use earleypar::EarleyParserBuilder;
//!
//! fn int(v: &Value<u64>) -> u64 {
//!     match v {
//!         Value::Lexeme(s) => s.parse().unwrap(),
//!         Value::Action(x) => *x,
//!     }
//! }
//!
//! let grm: Grammar<u64> = GrammarBuilder::new("Expr")
//!     .rule_decl(
//!         RuleDecl::new("Expr", &["Expr", "+", "Expr"])
//!             .action(|args| int(&args[0]) + int(&args[2])),
//!     )
//!     .rule_decl(
//!         RuleDecl::new("Expr", &["Expr", "*", "Expr"])
//!             .action(|args| int(&args[0]) * int(&args[2])),
//!     )
//!     .rule_decl(RuleDecl::new("Expr", &["INT"]).action(|args| int(&args[0])))
//!     .token_class("INT", |s| s.parse::<u64>().is_ok())
//!     .build()
//!     .unwrap();
//!
//! let input = ["2", "+", "3", "*", "4"];
//! let mut forest = EarleyParserBuilder::new(&grm).parse(&input).unwrap();
//! assert!(forest.is_ambiguous());
//! forest.prioritize();
//! assert_eq!(forest.evaluate(&input).unwrap(), Value::Action(14));
//! ```

mod chart;
mod disambiguate;
mod eval;
mod forest;
mod parser;
mod walk;

pub use crate::{
    chart::{Derivation, Derivations, ItemIdx, Tag},
    eval::EvalError,
    forest::{Forest, NodeShape},
    parser::{EarleyParserBuilder, ParseActionsError, ParseError, ParseErrorKind},
    walk::{ForestVisitor, SymbolNode},
};

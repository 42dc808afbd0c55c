#![allow(clippy::new_without_default)]
#![allow(clippy::type_complexity)]

//! A library for building Context Free Grammars (CFG) to be parsed by an Earley parser. Unlike
//! an LR table generator, an Earley parser places no restrictions on the grammar it is given:
//! rules may be ambiguous, left or right recursive, empty, or even cyclic.
//!
//! We use the following terminology throughout:
//!
//!   * A *grammar* is an ordered sequence of *productions*.
//!   * A *production* is an ordered sequence of *symbols*.
//!   * A *rule* maps a name to one or more productions.
//!   * A *token* is the name of a syntactic element. Tokens either match a lexeme exactly (by
//!     name) or are *token classes* which match any lexeme a predicate accepts.
//!   * A *rule position* is a production paired with a *dot*: the number of symbols of the
//!     production matched so far.
//!
//! For example, in the following grammar:
//!
//!   R1: "a" "b" | R2;
//!   R2: "c";
//!
//! the following statements are true:
//!
//!   * There are 3 productions. 1: ["a", "b"] 2: ["R2"] 3: ["c"]
//!   * There are two rules: R1 and R2. The mapping to productions is {R1: {1, 2}, R2: {3}}
//!   * There are three tokens: a, b, and c.
//!
//! earleygrm makes the following guarantees about grammars:
//!
//!   * Productions are numbered from `0` to `prods_len() - 1` (inclusive) in declaration order.
//!   * Rules are numbered from `0` to `rules_len() - 1` (inclusive) in order of first declaration.
//!   * Tokens are numbered from `0` to `tokens_len() - 1` (inclusive).
//!   * The StorageT type used to store productions, rules, and token indices can be infallibly
//!     converted into usize (see [`TIdx`](struct.TIdx.html) and friends for more details).
//!
//! Grammars are created with [`GrammarBuilder`](builder/struct.GrammarBuilder.html).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod builder;
pub mod grammar;
mod idxnewtype;

pub use crate::{
    builder::{GrammarBuilder, GrammarError, GrammarErrorKind, RuleDecl},
    grammar::{ActionFn, Grammar, Priority, RulePos, TokenClassFn, Value},
    idxnewtype::{PIdx, RIdx, SIdx, TIdx},
};

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Symbol<StorageT> {
    Rule(RIdx<StorageT>),
    Token(TIdx<StorageT>),
}

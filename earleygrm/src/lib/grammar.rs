use std::{collections::HashMap, fmt};

use num_traits::{AsPrimitive, PrimInt, Unsigned};

use crate::{PIdx, RIdx, SIdx, Symbol, TIdx};

/// A production's priority. When a forest is disambiguated, higher priorities win.
pub type Priority = i64;

/// The semantic action attached to a production. It receives one [`Value`] per symbol of the
/// production, in order.
pub type ActionFn<ActionT> = Box<dyn for<'input> Fn(Vec<Value<'input, ActionT>>) -> ActionT>;

/// The predicate of a token class: does the lexeme belong to the class?
pub type TokenClassFn = Box<dyn Fn(&str) -> bool>;

/// The values passed to, and produced by, semantic actions.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Value<'input, ActionT> {
    /// The text of a matched lexeme.
    Lexeme(&'input str),
    /// The value produced by a production's action.
    Action(ActionT),
}

/// A production paired with a dot: the symbols `0..dot` of the production have been matched.
/// Positions are plain values: all the information needed to advance them lives in the grammar.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct RulePos<StorageT> {
    pidx: PIdx<StorageT>,
    dot: SIdx<StorageT>,
}

impl<StorageT: Copy> RulePos<StorageT> {
    pub fn new(pidx: PIdx<StorageT>, dot: SIdx<StorageT>) -> Self {
        RulePos { pidx, dot }
    }

    pub fn pidx(&self) -> PIdx<StorageT> {
        self.pidx
    }

    pub fn dot(&self) -> SIdx<StorageT> {
        self.dot
    }
}

/// Representation of a `Grammar`. See the [top-level documentation](../index.html) for the
/// guarantees this struct makes about rules, tokens, productions, and symbols.
pub struct Grammar<ActionT = (), StorageT = u32> {
    /// A mapping from `RIdx` -> rule name.
    pub(crate) rule_names: Vec<String>,
    /// A mapping from `TIdx` -> token name.
    pub(crate) token_names: Vec<String>,
    /// A mapping from `TIdx` -> the predicate of a token class, or `None` for tokens which match
    /// lexemes by name.
    pub(crate) token_classes: Vec<Option<TokenClassFn>>,
    /// A mapping from the names of tokens which are not token classes to their `TIdx`.
    pub(crate) exact_tokens: HashMap<String, TIdx<StorageT>>,
    /// The user's start rule.
    pub(crate) start_rule: RIdx<StorageT>,
    /// A list of all productions.
    pub(crate) prods: Vec<Vec<Symbol<StorageT>>>,
    /// A mapping from rules to their productions, in declaration order.
    pub(crate) rules_prods: Vec<Vec<PIdx<StorageT>>>,
    /// A mapping from productions to their corresponding rule indexes.
    pub(crate) prods_rules: Vec<RIdx<StorageT>>,
    /// The priority of each production.
    pub(crate) prod_priorities: Vec<Priority>,
    /// The action of each production (if any).
    pub(crate) actions: Vec<Option<ActionFn<ActionT>>>,
}

impl<ActionT, StorageT: 'static + PrimInt + Unsigned> Grammar<ActionT, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// How many productions does this grammar have?
    pub fn prods_len(&self) -> PIdx<StorageT> {
        PIdx(self.prods.len().as_())
    }

    /// Return an iterator which produces (in order from `0..self.prods_len()`) all this
    /// grammar's valid `PIdx`s.
    pub fn iter_pidxs(&self) -> impl Iterator<Item = PIdx<StorageT>> {
        // The builder checks that every index fits within StorageT, so as_ is safe.
        (0..self.prods.len()).map(|x| PIdx(x.as_()))
    }

    /// Get the sequence of symbols for production `pidx`. Panics if `pidx` doesn't exist.
    pub fn prod(&self, pidx: PIdx<StorageT>) -> &[Symbol<StorageT>] {
        &self.prods[usize::from(pidx)]
    }

    /// How many symbols does production `pidx` have? Panics if `pidx` doesn't exist.
    pub fn prod_len(&self, pidx: PIdx<StorageT>) -> SIdx<StorageT> {
        SIdx(self.prods[usize::from(pidx)].len().as_())
    }

    /// Return the rule index of the production `pidx`. Panics if `pidx` doesn't exist.
    pub fn prod_to_rule(&self, pidx: PIdx<StorageT>) -> RIdx<StorageT> {
        self.prods_rules[usize::from(pidx)]
    }

    /// Return the priority of production `pidx`. Unless a priority was given explicitly, the
    /// i-th of n declared productions has priority n - i. Panics if `pidx` doesn't exist.
    pub fn priority(&self, pidx: PIdx<StorageT>) -> Priority {
        self.prod_priorities[usize::from(pidx)]
    }

    /// Does production `pidx` have a strictly higher priority than production `other`?
    pub fn higher_priority(&self, pidx: PIdx<StorageT>, other: PIdx<StorageT>) -> bool {
        self.priority(pidx) > self.priority(other)
    }

    /// Return the action of production `pidx`, if it has one. Panics if `pidx` doesn't exist.
    pub fn action(&self, pidx: PIdx<StorageT>) -> Option<&ActionFn<ActionT>> {
        self.actions[usize::from(pidx)].as_ref()
    }

    /// How many rules does this grammar have?
    pub fn rules_len(&self) -> RIdx<StorageT> {
        RIdx(self.rule_names.len().as_())
    }

    /// Return an iterator which produces (in order from `0..self.rules_len()`) all this
    /// grammar's valid `RIdx`s.
    pub fn iter_rules(&self) -> impl Iterator<Item = RIdx<StorageT>> {
        (0..self.rule_names.len()).map(|x| RIdx(x.as_()))
    }

    /// Return the productions for rule `ridx`. Panics if `ridx` doesn't exist.
    pub fn rule_to_prods(&self, ridx: RIdx<StorageT>) -> &[PIdx<StorageT>] {
        &self.rules_prods[usize::from(ridx)]
    }

    /// Return the name of rule `ridx`. Panics if `ridx` doesn't exist.
    pub fn rule_name_str(&self, ridx: RIdx<StorageT>) -> &str {
        self.rule_names[usize::from(ridx)].as_str()
    }

    /// Return the index of the rule named `n` or `None` if it doesn't exist.
    pub fn rule_idx(&self, n: &str) -> Option<RIdx<StorageT>> {
        self.rule_names
            .iter()
            .position(|x| x == n)
            .map(|x| RIdx(x.as_()))
    }

    /// What is the index of the start rule?
    pub fn start_rule_idx(&self) -> RIdx<StorageT> {
        self.start_rule
    }

    /// How many tokens does this grammar have?
    pub fn tokens_len(&self) -> TIdx<StorageT> {
        TIdx(self.token_names.len().as_())
    }

    /// Return an iterator which produces (in order from `0..self.tokens_len()`) all this
    /// grammar's valid `TIdx`s.
    pub fn iter_tidxs(&self) -> impl Iterator<Item = TIdx<StorageT>> {
        (0..self.token_names.len()).map(|x| TIdx(x.as_()))
    }

    /// Return the name of token `tidx`. Panics if `tidx` doesn't exist.
    pub fn token_name(&self, tidx: TIdx<StorageT>) -> &str {
        self.token_names[usize::from(tidx)].as_str()
    }

    /// Return the index of the token named `n` (whether a token class or not) or `None` if it
    /// doesn't exist.
    pub fn token_idx(&self, n: &str) -> Option<TIdx<StorageT>> {
        self.token_names
            .iter()
            .position(|x| x == n)
            .map(|x| TIdx(x.as_()))
    }

    /// Is token `tidx` a token class? Panics if `tidx` doesn't exist.
    pub fn is_token_class(&self, tidx: TIdx<StorageT>) -> bool {
        self.token_classes[usize::from(tidx)].is_some()
    }

    /// Return the index of the (non-class) token whose name is exactly `lexeme`, if there is
    /// one.
    pub fn lexeme_token(&self, lexeme: &str) -> Option<TIdx<StorageT>> {
        self.exact_tokens.get(lexeme).cloned()
    }

    /// Does `lexeme` match token `tidx`? Token classes match any lexeme their predicate accepts;
    /// other tokens match lexemes equal to their name. Panics if `tidx` doesn't exist.
    pub fn token_matches(&self, tidx: TIdx<StorageT>, lexeme: &str) -> bool {
        match &self.token_classes[usize::from(tidx)] {
            Some(pred) => pred(lexeme),
            None => self.token_name(tidx) == lexeme,
        }
    }

    /// Return the rule position at the start of production `pidx`.
    pub fn start_pos(&self, pidx: PIdx<StorageT>) -> RulePos<StorageT> {
        RulePos::new(pidx, SIdx(0usize.as_()))
    }

    /// Return `pos` with its dot moved one symbol to the right. A complete position is returned
    /// unchanged.
    pub fn advance(&self, pos: RulePos<StorageT>) -> RulePos<StorageT> {
        if self.is_complete(pos) {
            return pos;
        }
        RulePos::new(pos.pidx, SIdx((usize::from(pos.dot) + 1).as_()))
    }

    /// Have all the symbols of `pos`'s production been matched?
    pub fn is_complete(&self, pos: RulePos<StorageT>) -> bool {
        pos.dot >= self.prod_len(pos.pidx)
    }

    /// Return the symbol immediately after `pos`'s dot, or `None` if `pos` is complete.
    pub fn next_symbol(&self, pos: RulePos<StorageT>) -> Option<Symbol<StorageT>> {
        self.prod(pos.pidx).get(usize::from(pos.dot)).cloned()
    }

    fn pp_sym(&self, sym: Symbol<StorageT>) -> &str {
        match sym {
            Symbol::Token(tidx) => self.token_name(tidx),
            Symbol::Rule(ridx) => self.rule_name_str(ridx),
        }
    }

    /// Returns the string representation of a given production `pidx`.
    pub fn pp_prod(&self, pidx: PIdx<StorageT>) -> String {
        let mut sprod = String::new();
        sprod.push_str(self.rule_name_str(self.prod_to_rule(pidx)));
        sprod.push(':');
        for sym in self.prod(pidx) {
            sprod.push_str(&format!(" \"{}\"", self.pp_sym(*sym)));
        }
        sprod
    }

    /// Returns the string representation of a rule position, with the dot shown as `.`.
    pub fn pp_pos(&self, pos: RulePos<StorageT>) -> String {
        let mut spos = String::new();
        spos.push_str(self.rule_name_str(self.prod_to_rule(pos.pidx)));
        spos.push(':');
        for (i, sym) in self.prod(pos.pidx).iter().enumerate() {
            if i == usize::from(pos.dot) {
                spos.push_str(" .");
            }
            spos.push_str(&format!(" \"{}\"", self.pp_sym(*sym)));
        }
        if self.is_complete(pos) {
            spos.push_str(" .");
        }
        spos
    }
}

impl<ActionT, StorageT: fmt::Debug> fmt::Debug for Grammar<ActionT, StorageT> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("rule_names", &self.rule_names)
            .field("token_names", &self.token_names)
            .field("start_rule", &self.start_rule)
            .field("prods", &self.prods)
            .field("prod_priorities", &self.prod_priorities)
            .finish()
    }
}

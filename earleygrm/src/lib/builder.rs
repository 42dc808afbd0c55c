use std::{collections::HashMap, error::Error, fmt, marker::PhantomData};

use indexmap::{IndexMap, IndexSet};
use num_traits::{AsPrimitive, PrimInt, Unsigned};

use crate::{
    grammar::{ActionFn, Grammar, Priority, TokenClassFn, Value},
    PIdx, RIdx, Symbol, TIdx,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GrammarErrorKind {
    NoRules,
    InvalidStartRule,
    DuplicateTokenClass,
    TokenClassIsRule,
}

/// `GrammarBuilder::build` returns an instance of this struct if the grammar is malformed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GrammarError {
    pub kind: GrammarErrorKind,
    pub sym: Option<String>,
}

impl Error for GrammarError {}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let sym = self.sym.as_deref().unwrap_or("");
        match self.kind {
            GrammarErrorKind::NoRules => write!(f, "Grammar has no rules"),
            GrammarErrorKind::InvalidStartRule => {
                write!(f, "Start rule '{}' does not appear in grammar", sym)
            }
            GrammarErrorKind::DuplicateTokenClass => {
                write!(f, "Token class '{}' is declared more than once", sym)
            }
            GrammarErrorKind::TokenClassIsRule => {
                write!(f, "Token class '{}' is also declared as a rule", sym)
            }
        }
    }
}

/// A single rule declaration: a left-hand side name, the names of the production's symbols and,
/// optionally, an explicit priority and a semantic action.
pub struct RuleDecl<ActionT> {
    name: String,
    symbols: Vec<String>,
    priority: Option<Priority>,
    action: Option<ActionFn<ActionT>>,
}

impl<ActionT> RuleDecl<ActionT> {
    pub fn new(name: &str, symbols: &[&str]) -> Self {
        RuleDecl {
            name: name.to_owned(),
            symbols: symbols.iter().map(|s| (*s).to_owned()).collect(),
            priority: None,
            action: None,
        }
    }

    /// Give this production an explicit priority rather than one derived from its declaration
    /// order.
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Attach a semantic action to this production.
    pub fn action<F>(mut self, action: F) -> Self
    where
        F: for<'input> Fn(Vec<Value<'input, ActionT>>) -> ActionT + 'static,
    {
        self.action = Some(Box::new(action));
        self
    }
}

/// Incrementally declare a grammar's rules and token classes, then turn them into a [`Grammar`]
/// with [`build`](#method.build).
///
/// A name used in a production is a rule if some declaration has it as its left-hand side;
/// otherwise it is a token. Productions are numbered, and given default priorities, in the order
/// they are declared.
///
/// ```rust,ignore
/// let grm: Grammar = GrammarBuilder::new("S")
///     .rule("S", &["a", "S", "b"])
///     .rule("S", &[])
///     .build()?;
/// ```
pub struct GrammarBuilder<ActionT = (), StorageT = u32> {
    start: String,
    decls: Vec<RuleDecl<ActionT>>,
    token_classes: IndexMap<String, TokenClassFn>,
    duplicate_class: Option<String>,
    phantom: PhantomData<StorageT>,
}

impl<ActionT> GrammarBuilder<ActionT, u32> {
    /// Create a builder for a grammar whose start rule is `start`.
    pub fn new(start: &str) -> Self {
        GrammarBuilder::new_with_storaget(start)
    }
}

impl<ActionT, StorageT: 'static + PrimInt + Unsigned> GrammarBuilder<ActionT, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Create a builder for a grammar whose start rule is `start`, storing indices as
    /// `StorageT`.
    pub fn new_with_storaget(start: &str) -> Self {
        GrammarBuilder {
            start: start.to_owned(),
            decls: Vec::new(),
            token_classes: IndexMap::new(),
            duplicate_class: None,
            phantom: PhantomData,
        }
    }

    /// Declare the production `name: symbols`.
    pub fn rule(self, name: &str, symbols: &[&str]) -> Self {
        self.rule_decl(RuleDecl::new(name, symbols))
    }

    /// Declare a production which may carry an explicit priority and/or action.
    pub fn rule_decl(mut self, decl: RuleDecl<ActionT>) -> Self {
        self.decls.push(decl);
        self
    }

    /// Declare `name` as a token class: it matches any lexeme for which `pred` returns `true`.
    pub fn token_class<F>(mut self, name: &str, pred: F) -> Self
    where
        F: Fn(&str) -> bool + 'static,
    {
        if self
            .token_classes
            .insert(name.to_owned(), Box::new(pred))
            .is_some()
            && self.duplicate_class.is_none()
        {
            self.duplicate_class = Some(name.to_owned());
        }
        self
    }

    /// Validate the declarations and build a [`Grammar`].
    pub fn build(self) -> Result<Grammar<ActionT, StorageT>, GrammarError> {
        if self.decls.is_empty() {
            return Err(GrammarError {
                kind: GrammarErrorKind::NoRules,
                sym: None,
            });
        }

        let mut rules = IndexMap::<String, Vec<usize>>::new();
        for (i, decl) in self.decls.iter().enumerate() {
            rules.entry(decl.name.clone()).or_default().push(i);
        }
        let start_rule = match rules.get_index_of(&self.start) {
            Some(i) => RIdx(i.as_()),
            None => {
                return Err(GrammarError {
                    kind: GrammarErrorKind::InvalidStartRule,
                    sym: Some(self.start),
                })
            }
        };
        if let Some(name) = self.duplicate_class {
            return Err(GrammarError {
                kind: GrammarErrorKind::DuplicateTokenClass,
                sym: Some(name),
            });
        }
        if let Some(name) = self.token_classes.keys().find(|n| rules.contains_key(*n)) {
            return Err(GrammarError {
                kind: GrammarErrorKind::TokenClassIsRule,
                sym: Some(name.clone()),
            });
        }

        let mut tokens = IndexSet::<String>::new();
        for decl in &self.decls {
            for sym in &decl.symbols {
                if !rules.contains_key(sym) {
                    tokens.insert(sym.clone());
                }
            }
        }
        for name in self.token_classes.keys() {
            tokens.insert(name.clone());
        }

        // After these checks we can guarantee that things like RIdx(rules.len().as_()) are safe.
        let max = num_traits::cast::<StorageT, usize>(StorageT::max_value()).unwrap_or(usize::MAX);
        if rules.len() > max {
            panic!("StorageT is not big enough to store this grammar's rules.");
        }
        if tokens.len() > max {
            panic!("StorageT is not big enough to store this grammar's tokens.");
        }
        if self.decls.len() > max {
            panic!("StorageT is not big enough to store this grammar's productions.");
        }
        if self.decls.iter().any(|d| d.symbols.len() > max) {
            panic!("StorageT is not big enough to store the symbols of at least one of this grammar's productions.");
        }

        let mut token_classes = self.token_classes;
        let mut token_preds = Vec::with_capacity(tokens.len());
        let mut exact_tokens = HashMap::new();
        for (i, name) in tokens.iter().enumerate() {
            let pred = token_classes.shift_remove(name);
            if pred.is_none() {
                exact_tokens.insert(name.clone(), TIdx(i.as_()));
            }
            token_preds.push(pred);
        }

        let prods_len = self.decls.len();
        let mut prods = Vec::with_capacity(prods_len);
        let mut prods_rules = Vec::with_capacity(prods_len);
        let mut prod_priorities = Vec::with_capacity(prods_len);
        let mut actions = Vec::with_capacity(prods_len);
        for (i, decl) in self.decls.into_iter().enumerate() {
            let syms = decl
                .symbols
                .iter()
                .map(|s| match rules.get_index_of(s) {
                    Some(ridx) => Symbol::Rule(RIdx(ridx.as_())),
                    None => Symbol::Token(TIdx(tokens.get_index_of(s).unwrap_or(0).as_())),
                })
                .collect::<Vec<_>>();
            prods.push(syms);
            prods_rules.push(RIdx(rules.get_index_of(&decl.name).unwrap_or(0).as_()));
            prod_priorities.push(decl.priority.unwrap_or((prods_len - i) as Priority));
            actions.push(decl.action);
        }

        let rules_prods = rules
            .values()
            .map(|pidxs| pidxs.iter().map(|i| PIdx(i.as_())).collect())
            .collect();

        Ok(Grammar {
            rule_names: rules.into_keys().collect(),
            token_names: tokens.into_iter().collect(),
            token_classes: token_preds,
            exact_tokens,
            start_rule,
            prods,
            rules_prods,
            prods_rules,
            prod_priorities,
            actions,
        })
    }
}

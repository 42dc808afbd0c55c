use std::{
    error::Error,
    fmt::{self, Debug, Display},
};

use earleygrm::{Grammar, PIdx, Value};
use num_traits::{AsPrimitive, PrimInt, Unsigned};

use crate::{
    chart::{ItemIdx, Tag},
    walk::{ForestVisitor, SymbolNode},
};

/// The errors `Forest::evaluate` can return.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EvalError<StorageT> {
    /// The node still has more than one derivation.
    Ambiguous(ItemIdx),
    /// Production `PIdx` has no action and did not produce exactly one value.
    NoAction(PIdx<StorageT>),
    /// Every derivation of the root leads round a cycle.
    Cyclic,
}

impl<StorageT: Debug> Display for EvalError<StorageT> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EvalError::Ambiguous(idx) => write!(
                f,
                "Cannot evaluate ambiguous node ending at {} (item {})",
                idx.set(),
                idx.item()
            ),
            EvalError::NoAction(pidx) => write!(
                f,
                "Production {:?} has no action and does not produce exactly one value",
                pidx.0
            ),
            EvalError::Cyclic => write!(f, "The forest has no acyclic derivation"),
        }
    }
}

impl<StorageT: Debug> Error for EvalError<StorageT> {}

/// Evaluates a forest bottom-up: lexemes evaluate to their text; a production's action is called
/// with its children's values; a production without an action passes its only child's value
/// through.
pub(crate) struct Evaluator<'a, 'input, ActionT, StorageT, S> {
    grm: &'a Grammar<ActionT, StorageT>,
    input: &'input [S],
}

impl<'a, 'input, ActionT, StorageT, S> Evaluator<'a, 'input, ActionT, StorageT, S> {
    pub(crate) fn new(grm: &'a Grammar<ActionT, StorageT>, input: &'input [S]) -> Self {
        Evaluator { grm, input }
    }
}

impl<'input, ActionT, StorageT, S> ForestVisitor<StorageT>
    for Evaluator<'_, 'input, ActionT, StorageT, S>
where
    StorageT: 'static + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
    S: AsRef<str>,
{
    type Output = Result<Value<'input, ActionT>, EvalError<StorageT>>;
    type Derivation = Result<Vec<Value<'input, ActionT>>, EvalError<StorageT>>;

    fn choices(&mut self, node: ItemIdx, _: Tag<StorageT>, _: Vec<Self::Derivation>) -> Self::Output {
        Err(EvalError::Ambiguous(node))
    }

    fn derivation(&mut self, children: Vec<Self::Output>) -> Self::Derivation {
        children.into_iter().collect()
    }

    fn symbol(&mut self, node: SymbolNode<StorageT>, derivation: Self::Derivation) -> Self::Output {
        match node {
            SymbolNode::Lexeme { laidx, .. } => {
                let input = self.input;
                Ok(Value::Lexeme(input[laidx].as_ref()))
            }
            SymbolNode::Rule { pidx, .. } => {
                let mut vals = derivation?;
                if let Some(act) = self.grm.action(pidx) {
                    return Ok(Value::Action(act(vals)));
                }
                match (vals.pop(), vals.is_empty()) {
                    (Some(v), true) => Ok(v),
                    _ => Err(EvalError::NoAction(pidx)),
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use earleygrm::{GrammarBuilder, RuleDecl};

    use super::*;
    use crate::{
        parser::{test::small_lex, ParseActionsError},
        EarleyParserBuilder,
    };

    fn int(v: &Value<i64>) -> i64 {
        match v {
            Value::Lexeme(s) => s.parse().unwrap(),
            Value::Action(x) => *x,
        }
    }

    fn calc_grammar() -> Grammar<i64> {
        GrammarBuilder::new("Expr")
            .rule_decl(
                RuleDecl::new("Expr", &["Expr", "+", "Expr"])
                    .action(|args| int(&args[0]) + int(&args[2])),
            )
            .rule_decl(
                RuleDecl::new("Expr", &["Expr", "*", "Expr"])
                    .action(|args| int(&args[0]) * int(&args[2])),
            )
            .rule_decl(RuleDecl::new("Expr", &["(", "Expr", ")"]).action(|args| int(&args[1])))
            .rule_decl(RuleDecl::new("Expr", &["INT"]).action(|args| int(&args[0])))
            .token_class("INT", |s| s.parse::<i64>().is_ok())
            .build()
            .unwrap()
    }

    const CALC_LEX: &str = "[0-9]+\n\\+\n\\*\n\\(\n\\)";

    #[test]
    fn test_calc() {
        let grm = calc_grammar();
        let eval = |s: &str| {
            let lexemes = small_lex(CALC_LEX, s);
            match EarleyParserBuilder::new(&grm).parse_actions(&lexemes) {
                Ok(Value::Action(x)) => Ok(x),
                Ok(Value::Lexeme(_)) => unreachable!(),
                Err(e) => Err(e.to_string()),
            }
        };
        assert_eq!(eval("2"), Ok(2));
        assert_eq!(eval("(2)"), Ok(2));
        // "+" has a higher priority than "*", so it ends up nearest the root.
        assert_eq!(eval("2+3*4"), Ok(14));
        assert_eq!(eval("2*3+4"), Ok(10));
        assert_eq!(eval("(2+3)*4"), Ok(20));
        assert_eq!(eval("2+"), Err("Parse error: unexpected end of input at lexeme 2".to_owned()));
    }

    #[test]
    fn test_ambiguous() {
        let grm = calc_grammar();
        let lexemes = small_lex(CALC_LEX, "1+2+3");
        let forest = EarleyParserBuilder::new(&grm).parse(&lexemes).unwrap();
        match forest.evaluate(&lexemes) {
            Err(EvalError::Ambiguous(idx)) => assert_eq!(idx, forest.root()),
            _ => panic!("Expected an ambiguity error"),
        }
        let mut forest = forest;
        forest.prioritize();
        assert_eq!(forest.evaluate(&lexemes), Ok(Value::Action(6)));
    }

    #[test]
    fn test_pass_through() {
        let grm: Grammar<String> = GrammarBuilder::new("S")
            .rule("S", &["T"])
            .rule("T", &["t"])
            .build()
            .unwrap();
        assert_eq!(
            EarleyParserBuilder::new(&grm)
                .parse_actions(&["t"])
                .unwrap(),
            Value::Lexeme("t")
        );
    }

    #[test]
    fn test_no_action() {
        let grm: Grammar<String> = GrammarBuilder::new("S")
            .rule("S", &["a", "b"])
            .rule("S", &[])
            .build()
            .unwrap();
        for input in [&["a", "b"][..], &[][..]] {
            match EarleyParserBuilder::new(&grm).parse_actions(input) {
                Err(ParseActionsError::EvalError(EvalError::NoAction(pidx))) => {
                    assert_eq!(grm.prod_to_rule(pidx), grm.start_rule_idx())
                }
                _ => panic!("Expected a missing action error"),
            }
        }
    }

    #[test]
    fn test_empty_match_has_no_children() {
        let grm: Grammar<usize> = GrammarBuilder::new("S")
            .rule_decl(RuleDecl::new("S", &["E", "a", "E"]).action(|args| args.len()))
            .rule_decl(RuleDecl::new("E", &[]).action(|args| args.len()))
            .build()
            .unwrap();
        let forest = EarleyParserBuilder::new(&grm).parse(&["a"]).unwrap();
        let mut seen = Vec::new();
        struct Lens<'s>(&'s mut Vec<usize>);
        impl ForestVisitor<u32> for Lens<'_> {
            type Output = ();
            type Derivation = usize;
            fn choices(&mut self, _: ItemIdx, _: Tag<u32>, _: Vec<usize>) {}
            fn derivation(&mut self, children: Vec<()>) -> usize {
                children.len()
            }
            fn symbol(&mut self, node: SymbolNode<u32>, d: usize) {
                if let SymbolNode::Rule { .. } = node {
                    self.0.push(d);
                }
            }
        }
        forest.walk(&mut Lens(&mut seen)).unwrap();
        assert_eq!(seen, vec![0, 0, 3]);
        assert_eq!(forest.evaluate(&["a"]), Ok(Value::Action(3)));
    }

    fn count(v: &Value<usize>) -> usize {
        match v {
            Value::Lexeme(_) => 0,
            Value::Action(n) => *n,
        }
    }

    #[test]
    fn test_long_lists() {
        // A left recursive list parses in linear time, but its forest is as deep as the input is
        // long.
        let grm: Grammar<usize> = GrammarBuilder::new("L")
            .rule_decl(RuleDecl::new("L", &["L", "x"]).action(|args| count(&args[0]) + 1))
            .rule_decl(RuleDecl::new("L", &["x"]).action(|_| 1))
            .build()
            .unwrap();
        let input = vec!["x"; 20_000];
        let mut forest = EarleyParserBuilder::new(&grm).parse(&input).unwrap();
        forest.prioritize();
        assert!(!forest.is_ambiguous());
        assert_eq!(forest.evaluate(&input), Ok(Value::Action(20_000)));

        let grm: Grammar<usize> = GrammarBuilder::new("L")
            .rule_decl(RuleDecl::new("L", &["x", "L"]).action(|args| count(&args[1]) + 1))
            .rule_decl(RuleDecl::new("L", &[]).action(|_| 0))
            .build()
            .unwrap();
        let input = vec!["x"; 1_000];
        assert_eq!(
            EarleyParserBuilder::new(&grm).parse_actions(&input).unwrap(),
            Value::Action(1_000)
        );
    }

    #[test]
    fn test_parse_error() {
        let grm = calc_grammar();
        match EarleyParserBuilder::new(&grm).parse_actions(&["1", "+", "+"]) {
            Err(ParseActionsError::ParseError(e)) => assert_eq!(e.laidx(), 2),
            _ => panic!("Expected a parse error"),
        }
    }
}

use std::collections::HashSet;

use earleygrm::{Grammar, GrammarBuilder, RuleDecl, Value};
use earleypar::{EarleyParserBuilder, ForestVisitor, ItemIdx, NodeShape, SymbolNode, Tag};

type Decls = &'static [(&'static str, &'static [&'static str])];

fn build(start: &str, decls: Decls) -> Grammar {
    decls
        .iter()
        .fold(GrammarBuilder::new(start), |b, (name, syms)| b.rule(name, syms))
        .build()
        .unwrap()
}

/// A naive recogniser: compute, by fixed point, every (rule, start, end) triple such that the rule
/// derives `input[start..end]`.
fn recognises(start: &str, decls: Decls, input: &[&str]) -> bool {
    let rules = decls.iter().map(|(n, _)| *n).collect::<HashSet<_>>();
    let n = input.len();
    let mut derives = HashSet::<(&str, usize, usize)>::new();
    loop {
        let mut changed = false;
        for (name, syms) in decls {
            for i in 0..=n {
                // All the positions the production's prefix can reach from i.
                let mut reach = vec![i];
                for sym in syms.iter() {
                    let mut next = Vec::new();
                    for &p in &reach {
                        if rules.contains(sym) {
                            for q in p..=n {
                                if derives.contains(&(*sym, p, q)) && !next.contains(&q) {
                                    next.push(q);
                                }
                            }
                        } else if p < n && input[p] == *sym && !next.contains(&(p + 1)) {
                            next.push(p + 1);
                        }
                    }
                    reach = next;
                }
                for j in reach {
                    changed |= derives.insert((*name, i, j));
                }
            }
        }
        if !changed {
            break;
        }
    }
    derives.contains(&(start, 0, n))
}

/// Every string over `alphabet` of length at most `max`.
fn sentences(alphabet: &[&'static str], max: usize) -> Vec<Vec<&'static str>> {
    let mut all = vec![vec![]];
    let mut last = vec![vec![]];
    for _ in 0..max {
        let mut next = Vec::new();
        for s in &last {
            for a in alphabet {
                let mut t: Vec<&'static str> = s.clone();
                t.push(a);
                next.push(t);
            }
        }
        all.extend(next.iter().cloned());
        last = next;
    }
    all
}

fn check_language(start: &str, decls: Decls, alphabet: &[&'static str], max: usize) {
    let grm = build(start, decls);
    let pb = EarleyParserBuilder::new(&grm);
    for s in sentences(alphabet, max) {
        let expected = recognises(start, decls, &s);
        let forest = pb.parse(&s);
        assert_eq!(forest.is_ok(), expected, "{:?}", s);
        if let Ok(mut forest) = forest {
            assert_eq!(forest.sets_len(), s.len() + 1);
            assert_eq!(forest.start(forest.root()), 0);
            assert_eq!(forest.end(forest.root()), s.len());
            forest.prioritize();
            assert!(!forest.is_ambiguous());
            assert_eq!(frontier(&forest, &s), s);
        }
    }
}

/// Return the lexemes of an unambiguous forest in order.
fn frontier<'a>(forest: &earleypar::Forest<(), u32>, input: &[&'a str]) -> Vec<&'a str> {
    struct Offsets;
    impl ForestVisitor<u32> for Offsets {
        type Output = Vec<usize>;
        type Derivation = Vec<usize>;
        fn choices(&mut self, _: ItemIdx, _: Tag<u32>, _: Vec<Vec<usize>>) -> Vec<usize> {
            panic!("Unexpected ambiguity");
        }
        fn derivation(&mut self, children: Vec<Vec<usize>>) -> Vec<usize> {
            children.concat()
        }
        fn symbol(&mut self, node: SymbolNode<u32>, derivation: Vec<usize>) -> Vec<usize> {
            match node {
                SymbolNode::Lexeme { laidx, .. } => vec![laidx],
                SymbolNode::Rule { .. } => derivation,
            }
        }
    }
    forest
        .walk(&mut Offsets)
        .unwrap()
        .into_iter()
        .map(|i| input[i])
        .collect()
}

const SCENARIO_A: Decls = &[("S", &["a", "S", "b"]), ("S", &[])];

#[test]
fn scenario_a_language() {
    check_language("S", SCENARIO_A, &["a", "b"], 6);
}

#[test]
fn scenario_c_language() {
    check_language(
        "S",
        &[("S", &["A", "A"]), ("A", &[]), ("A", &["a"])],
        &["a", "b"],
        4,
    );
}

#[test]
fn palindromes() {
    check_language(
        "P",
        &[
            ("P", &["a", "P", "a"]),
            ("P", &["b", "P", "b"]),
            ("P", &["a"]),
            ("P", &["b"]),
            ("P", &[]),
        ],
        &["a", "b"],
        6,
    );
}

#[test]
fn ambiguous_expressions() {
    check_language(
        "E",
        &[("E", &["E", "+", "E"]), ("E", &["E", "*", "E"]), ("E", &["n"])],
        &["n", "+", "*"],
        5,
    );
}

#[test]
fn nullable_chains() {
    check_language(
        "S",
        &[
            ("S", &["A", "B", "A", "c"]),
            ("A", &["B", "B"]),
            ("A", &["a"]),
            ("B", &[]),
            ("B", &["A"]),
            ("B", &["b"]),
        ],
        &["a", "b", "c"],
        4,
    );
}

#[test]
fn cyclic_grammar() {
    check_language(
        "S",
        &[("S", &["S"]), ("S", &["S", "S"]), ("S", &["a"]), ("S", &[])],
        &["a", "b"],
        4,
    );
}

#[test]
fn round_trip() {
    // An unambiguous grammar of balanced brackets and letters.
    let grm = build(
        "L",
        &[
            ("L", &["L", "I"]),
            ("L", &[]),
            ("I", &["(", "L", ")"]),
            ("I", &["x"]),
        ],
    );
    let input = ["(", "x", "(", ")", "x", ")", "x"];
    let forest = EarleyParserBuilder::new(&grm).parse(&input).unwrap();
    assert!(!forest.is_ambiguous());
    assert_eq!(frontier(&forest, &input), input.to_vec());

    // Identity actions reconstruct the input.
    let grm: Grammar<String> = GrammarBuilder::new("L")
        .rule_decl(RuleDecl::new("L", &["L", "I"]).action(|args| concat(&args)))
        .rule_decl(RuleDecl::new("L", &[]).action(|args| concat(&args)))
        .rule_decl(RuleDecl::new("I", &["(", "L", ")"]).action(|args| concat(&args)))
        .rule_decl(RuleDecl::new("I", &["x"]).action(|args| concat(&args)))
        .build()
        .unwrap();
    assert_eq!(
        EarleyParserBuilder::new(&grm).parse_actions(&input).unwrap(),
        Value::Action(input.concat())
    );
}

fn concat(args: &[Value<String>]) -> String {
    args.iter()
        .map(|v| match v {
            Value::Lexeme(s) => (*s).to_owned(),
            Value::Action(s) => s.clone(),
        })
        .collect()
}

#[test]
fn priority_law() {
    // Scenario B, in both declaration orders.
    for prios in [[5, 1], [1, 5]] {
        let grm: Grammar<i64> = GrammarBuilder::new("A")
            .rule_decl(RuleDecl::new("A", &["x"]).priority(prios[0]).action(move |_| prios[0]))
            .rule_decl(RuleDecl::new("A", &["x"]).priority(prios[1]).action(move |_| prios[1]))
            .build()
            .unwrap();
        assert_eq!(
            EarleyParserBuilder::new(&grm).parse_actions(&["x"]).unwrap(),
            Value::Action(5)
        );
    }
}

#[test]
fn scenario_c_forest() {
    let grm = build("S", &[("S", &["A", "A"]), ("A", &[]), ("A", &["a"])]);
    let forest = EarleyParserBuilder::new(&grm).parse(&["a"]).unwrap();
    assert_eq!(forest.shape(forest.root()), NodeShape::Ambiguous);
    let a = grm.rule_idx("A").unwrap();
    let spans = forest
        .derivations(forest.root())
        .iter()
        .map(|d| {
            let (l, r) = (d.left().unwrap(), d.right().unwrap());
            assert_eq!(forest.tag(l), Tag::Rule(a));
            assert_eq!(forest.tag(r), Tag::Rule(a));
            ((forest.start(l), forest.end(l)), (forest.start(r), forest.end(r)))
        })
        .collect::<Vec<_>>();
    assert_eq!(spans, vec![((0, 0), (0, 1)), ((0, 1), (1, 1))]);
}

#[test]
fn scenario_a_sets() {
    let grm = build("S", SCENARIO_A);
    let forest = EarleyParserBuilder::new(&grm)
        .parse(&["a", "a", "b", "b"])
        .unwrap();
    assert_eq!(forest.sets_len(), 5);
    let e = EarleyParserBuilder::new(&grm)
        .parse(&["a", "a", "b"])
        .unwrap_err();
    assert_eq!(e.laidx(), 3);
}

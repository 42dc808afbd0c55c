use std::{cmp::Ordering, fmt::Debug, hash::Hash};

use earleygrm::PIdx;
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use tracing::debug;
use vob::Vob;

use crate::{
    chart::{Chart, Derivation, ItemIdx},
    forest::Forest,
};

/// Collapse every ambiguous node reachable from `forest`'s root to a single derivation.
///
/// Nodes are resolved depth first. A node is `active` while its derivations are being resolved and
/// `done` once it has been collapsed; `done` nodes never change again. A derivation with an
/// `active` child would close a cycle, so is never selected: the resolved forest is therefore
/// acyclic even if the grammar is not.
pub(crate) fn disambiguate<ActionT, StorageT, F>(forest: &mut Forest<ActionT, StorageT>, prefer: F)
where
    StorageT: 'static + Debug + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
    F: Fn(PIdx<StorageT>, PIdx<StorageT>) -> bool,
{
    let root = forest.root;
    let items_len = forest.chart.items_len();
    let mut done = Vob::new();
    done.resize(items_len, false);
    let mut active = Vob::new();
    active.resize(items_len, false);
    let mut dis = Disambiguator {
        offsets: forest.chart.offsets(),
        chart: &mut forest.chart,
        prefer,
        done,
        active,
        collapsed: 0,
    };
    dis.resolve(root);
    debug!(collapsed = dis.collapsed, "disambiguated forest");
}

struct Disambiguator<'c, StorageT: Eq + Hash, F> {
    chart: &'c mut Chart<StorageT>,
    prefer: F,
    /// The offset of each set's first item in `done` and `active`.
    offsets: Vec<usize>,
    done: Vob,
    active: Vob,
    /// How many ambiguous nodes have been collapsed?
    collapsed: usize,
}

/// A node whose derivations are being resolved.
struct Frame<StorageT> {
    idx: ItemIdx,
    off: usize,
    alts: Vec<Derivation<StorageT>>,
    /// The derivation being resolved, and which of its children (0 = left, 1 = right) is next.
    alt: usize,
    child: usize,
    best: Option<Derivation<StorageT>>,
}

enum Entered<StorageT> {
    Done(bool),
    Frame(Frame<StorageT>),
}

impl<StorageT, F> Disambiguator<'_, StorageT, F>
where
    StorageT: 'static + Debug + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
    F: Fn(PIdx<StorageT>, PIdx<StorageT>) -> bool,
{
    fn off(&self, idx: ItemIdx) -> usize {
        self.offsets[idx.set()] + idx.item()
    }

    /// Resolve `root` and everything beneath it, children before parents. Returns `false` if every
    /// derivation of `root` leads round a cycle.
    fn resolve(&mut self, root: ItemIdx) -> bool {
        let mut stack = match self.enter(root) {
            Entered::Done(ok) => return ok,
            Entered::Frame(f) => vec![f],
        };
        // The result of the most recently resolved child, to be given to the top of the stack.
        let mut ret = None;
        while let Some(f) = stack.last_mut() {
            if let Some(ok) = ret.take() {
                if ok {
                    f.child += 1;
                } else {
                    // This derivation is cyclic: skip the rest of it.
                    f.alt += 1;
                    f.child = 0;
                }
            }
            match f.alts.get(f.alt).copied() {
                Some(d) if f.child < 2 => {
                    let child = if f.child == 0 { d.left() } else { d.right() };
                    ret = Some(match child {
                        Some(c) => match self.enter(c) {
                            Entered::Done(ok) => ok,
                            Entered::Frame(nf) => {
                                stack.push(nf);
                                continue;
                            }
                        },
                        None => true,
                    });
                }
                Some(d) => {
                    f.best = match f.best {
                        Some(b) if self.cmp_derivs(&d, &b) != Ordering::Greater => Some(b),
                        _ => Some(d),
                    };
                    f.alt += 1;
                    f.child = 0;
                }
                None => {
                    if let Some(f) = stack.pop() {
                        ret = Some(self.leave(f));
                    }
                }
            }
        }
        ret.unwrap_or(false)
    }

    /// Start resolving `idx`. A node already `done` succeeds immediately; one that is `active`
    /// fails, as reaching it again closes a cycle.
    fn enter(&mut self, idx: ItemIdx) -> Entered<StorageT> {
        let off = self.off(idx);
        if self.done[off] {
            return Entered::Done(true);
        }
        if self.active[off] {
            return Entered::Done(false);
        }
        let alts = self.chart.item(idx).derivs.iter().cloned().collect::<Vec<_>>();
        if alts.is_empty() {
            // Lexemes have no derivations.
            self.done.set(off, true);
            return Entered::Done(true);
        }
        self.active.set(off, true);
        Entered::Frame(Frame {
            idx,
            off,
            alts,
            alt: 0,
            child: 0,
            best: None,
        })
    }

    /// Collapse `f`'s node to its best derivation. If it has none, the node is left untouched so
    /// that it can be resolved again from a different context.
    fn leave(&mut self, f: Frame<StorageT>) -> bool {
        self.active.set(f.off, false);
        match f.best {
            Some(b) => {
                if f.alts.len() > 1 {
                    self.chart.sets[f.idx.set()].items[f.idx.item()]
                        .derivs
                        .collapse(b);
                    self.collapsed += 1;
                }
                self.done.set(f.off, true);
                true
            }
            None => false,
        }
    }

    /// Order two derivations of the same node: first by `prefer`, then by their left children, then
    /// by their right children, each compared in the same way. Both derivations' children must
    /// already be resolved.
    fn cmp_derivs(&self, d1: &Derivation<StorageT>, d2: &Derivation<StorageT>) -> Ordering {
        let mut todo = vec![(*d1, *d2)];
        while let Some((d1, d2)) = todo.pop() {
            if d1.pidx() != d2.pidx() {
                if (self.prefer)(d1.pidx(), d2.pidx()) {
                    return Ordering::Greater;
                }
                if (self.prefer)(d2.pidx(), d1.pidx()) {
                    return Ordering::Less;
                }
            }
            // Right is pushed first so that left is compared first.
            for (i1, i2) in [(d1.right(), d2.right()), (d1.left(), d2.left())] {
                if let (Some(i1), Some(i2)) = (i1, i2) {
                    if i1 == i2 {
                        continue;
                    }
                    if let (Some(s1), Some(s2)) = (
                        self.chart.item(i1).derivs.sole(),
                        self.chart.item(i2).derivs.sole(),
                    ) {
                        todo.push((*s1, *s2));
                    }
                }
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod test {
    use earleygrm::{Grammar, GrammarBuilder, RuleDecl};

    use crate::{
        chart::Tag,
        parser::test::{scenario_c, small_lex},
        EarleyParserBuilder, NodeShape,
    };

    #[test]
    fn test_scenario_b() {
        // Whichever order they're declared in, the production with the higher priority wins.
        for (p1, p2) in [(5, 1), (1, 5)] {
            let grm: Grammar = GrammarBuilder::new("A")
                .rule_decl(RuleDecl::new("A", &["x"]).priority(p1))
                .rule_decl(RuleDecl::new("A", &["x"]).priority(p2))
                .build()
                .unwrap();
            let mut forest = EarleyParserBuilder::new(&grm).parse(&["x"]).unwrap();
            assert_eq!(forest.derivations(forest.root()).len(), 2);
            forest.prioritize();
            let d = forest.derivations(forest.root()).sole().unwrap();
            assert_eq!(grm.priority(d.pidx()), 5);
        }
    }

    #[test]
    fn test_scenario_c() {
        let grm = scenario_c();
        let mut forest = EarleyParserBuilder::new(&grm).parse(&["a"]).unwrap();
        forest.prioritize();
        assert!(!forest.is_ambiguous());
        // Both alternatives use "S: A A"; the left children differ and "A:" has a higher priority
        // than "A: a".
        assert_eq!(forest.pp(&["a"]), "S\n A\n A\n  a a\n");
    }

    #[test]
    fn test_custom_comparator() {
        let grm = scenario_c();
        let mut forest = EarleyParserBuilder::new(&grm).parse(&["a"]).unwrap();
        forest.disambiguate(|p1, p2| grm.priority(p1) < grm.priority(p2));
        assert_eq!(forest.pp(&["a"]), "S\n A\n  a a\n A\n");
    }

    #[test]
    fn test_first_seen_wins() {
        let grm = scenario_c();
        let mut forest = EarleyParserBuilder::new(&grm).parse(&["a"]).unwrap();
        let first = *forest.derivations(forest.root()).iter().next().unwrap();
        forest.disambiguate(|_, _| false);
        assert_eq!(forest.derivations(forest.root()).sole(), Some(&first));
    }

    #[test]
    fn test_redisambiguate() {
        let grm = expr_grammar();
        let lexemes = small_lex("[0-9]+\n\\+\n\\*", "1+2*3+4");
        let mut forest = EarleyParserBuilder::new(&grm).parse(&lexemes).unwrap();
        assert!(forest.is_ambiguous());
        forest.prioritize();
        assert!(!forest.is_ambiguous());
        let once = forest.pp(&lexemes);
        let snapshot = forest
            .iter_items()
            .map(|i| forest.derivations(i).clone())
            .collect::<Vec<_>>();
        forest.prioritize();
        assert_eq!(forest.pp(&lexemes), once);
        assert_eq!(
            forest
                .iter_items()
                .map(|i| forest.derivations(i).clone())
                .collect::<Vec<_>>(),
            snapshot
        );
    }

    fn expr_grammar() -> Grammar {
        GrammarBuilder::new("E")
            .rule("E", &["E", "+", "E"])
            .rule("E", &["E", "*", "E"])
            .rule("E", &["INT"])
            .token_class("INT", |s| s.parse::<u64>().is_ok())
            .build()
            .unwrap()
    }

    #[test]
    fn test_priorities_in_expressions() {
        let grm = expr_grammar();
        let lexemes = small_lex("[0-9]+\n\\+\n\\*", "2+3*4");
        let mut forest = EarleyParserBuilder::new(&grm).parse(&lexemes).unwrap();
        assert_eq!(forest.shape(forest.root()), NodeShape::Ambiguous);
        forest.prioritize();
        // "E: E + E" has the highest priority so becomes the root.
        assert_eq!(
            forest.pp(&lexemes),
            "E
 E
  INT 2
 + +
 E
  E
   INT 3
  * *
  E
   INT 4
"
        );
    }

    #[test]
    fn test_cyclic_grammar() {
        let grm: Grammar = GrammarBuilder::new("S")
            .rule("S", &["S"])
            .rule("S", &["S", "S"])
            .rule("S", &["a"])
            .rule("S", &[])
            .build()
            .unwrap();
        let input = ["a", "a"];
        let mut forest = EarleyParserBuilder::new(&grm).parse(&input).unwrap();
        let s = grm.rule_idx("S").unwrap();
        let s00 = forest.find_item(Tag::Rule(s), 0, 0).unwrap();
        // "S: S" applies to every S, so even the empty match is cyclic.
        assert!(forest
            .derivations(s00)
            .iter()
            .any(|d| d.right() == Some(s00)));
        forest.prioritize();
        assert!(!forest.is_ambiguous());
        // Walking the resolved forest terminates.
        let pp = forest.pp(&input);
        assert!(pp.starts_with("S\n"));
        assert_eq!(pp.matches("a a").count(), 2);
        forest.prioritize();
        assert_eq!(forest.pp(&input), pp);
    }
}

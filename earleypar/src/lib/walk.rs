use std::{fmt::Debug, hash::Hash, mem};

use earleygrm::{PIdx, RIdx, Symbol, TIdx};
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use vob::Vob;

use crate::{
    chart::{Derivation, ItemIdx, Tag},
    forest::{Forest, NodeShape},
};

/// A completed node handed to [`ForestVisitor::symbol`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SymbolNode<StorageT> {
    /// The lexeme at input offset `laidx`, matched as token `tidx`.
    Lexeme { laidx: usize, tidx: TIdx<StorageT> },
    /// Rule `ridx`, matched by production `pidx`.
    Rule {
        ridx: RIdx<StorageT>,
        pidx: PIdx<StorageT>,
    },
}

/// Callbacks for [`Forest::walk`].
///
/// For each derivation walked, the results of its children (in production order) are passed to
/// `derivation`. A completed node then passes its derivation's result to `symbol`; an ambiguous
/// node instead passes the results of all its derivations to `choices`. The prefixes of
/// productions are never seen directly: their children are spliced into the child sequence of
/// the node which completes the production.
///
/// An empty production has an empty sequence of children.
pub trait ForestVisitor<StorageT> {
    type Output;
    type Derivation;

    fn choices(
        &mut self,
        node: ItemIdx,
        tag: Tag<StorageT>,
        alts: Vec<Self::Derivation>,
    ) -> Self::Output;
    fn derivation(&mut self, children: Vec<Self::Output>) -> Self::Derivation;
    fn symbol(&mut self, node: SymbolNode<StorageT>, derivation: Self::Derivation)
        -> Self::Output;
}

enum Walked<O> {
    One(O),
    Seq(Vec<O>),
}

/// The result of starting to walk a node: either it was walked immediately, or it needs its
/// children walking first.
enum Entered<O, F> {
    Done(Option<Walked<O>>),
    Frame(F),
}

/// A node part way through being walked.
struct Frame<StorageT, O, D> {
    idx: ItemIdx,
    off: usize,
    tag: Tag<StorageT>,
    shape: NodeShape,
    derivs: Vec<Derivation<StorageT>>,
    /// The next derivation to walk.
    next: usize,
    /// The derivation being walked, its children (each with the token it must be matched as, if
    /// it is a lexeme), and how many of those children have been walked.
    cur: Option<Derivation<StorageT>>,
    children: Vec<(ItemIdx, Option<TIdx<StorageT>>)>,
    child: usize,
    seq: Vec<O>,
    failed: bool,
    alts: Vec<D>,
}

struct Walker<'f, 'a, 'v, ActionT, StorageT: Eq + Hash, V> {
    forest: &'f Forest<'a, ActionT, StorageT>,
    visitor: &'v mut V,
    offsets: Vec<usize>,
    /// The nodes currently being walked. A derivation which leads back to one of these is
    /// skipped.
    on_stack: Vob,
}

pub(crate) fn walk<ActionT, StorageT, V>(
    forest: &Forest<ActionT, StorageT>,
    visitor: &mut V,
) -> Option<V::Output>
where
    StorageT: 'static + Debug + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
    V: ForestVisitor<StorageT>,
{
    let mut on_stack = Vob::new();
    on_stack.resize(forest.items_len(), false);
    let mut w = Walker {
        forest,
        visitor,
        offsets: forest.chart.offsets(),
        on_stack,
    };
    match w.walk_root(forest.root())? {
        Walked::One(o) => Some(o),
        Walked::Seq(_) => None,
    }
}

type WalkFrame<StorageT, V> = Frame<
    StorageT,
    <V as ForestVisitor<StorageT>>::Output,
    <V as ForestVisitor<StorageT>>::Derivation,
>;

impl<'f, 'a, ActionT, StorageT, V> Walker<'f, 'a, '_, ActionT, StorageT, V>
where
    StorageT: 'static + Debug + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
    V: ForestVisitor<StorageT>,
{
    /// Walk the forest from `root`, children before parents, with an explicit stack of
    /// part-walked nodes.
    fn walk_root(&mut self, root: ItemIdx) -> Option<Walked<V::Output>> {
        let mut stack: Vec<WalkFrame<StorageT, V>> = Vec::new();
        // The result of the most recently finished child, to be given to the top of the stack.
        let mut ret = match self.enter(root, None) {
            Entered::Done(r) => return r,
            Entered::Frame(f) => {
                stack.push(f);
                None
            }
        };
        while let Some(frame) = stack.last_mut() {
            if let Some(r) = ret.take() {
                match r {
                    Some(Walked::One(o)) => frame.seq.push(o),
                    Some(Walked::Seq(s)) => frame.seq.extend(s),
                    None => frame.failed = true,
                }
            }

            let Some(d) = frame.cur else {
                if let Some(&d) = frame.derivs.get(frame.next) {
                    frame.next += 1;
                    frame.children = self.children(frame.tag, &d);
                    frame.child = 0;
                    frame.cur = Some(d);
                    continue;
                }
                // Only ambiguous nodes walk more than one derivation.
                let r = if frame.alts.is_empty() {
                    None
                } else {
                    let alts = mem::take(&mut frame.alts);
                    Some(Walked::One(self.visitor.choices(frame.idx, frame.tag, alts)))
                };
                ret = Some(self.leave(&mut stack, r));
                continue;
            };

            if !frame.failed {
                if let Some(&(c, tidx)) = frame.children.get(frame.child) {
                    frame.child += 1;
                    match self.enter(c, tidx) {
                        Entered::Done(r) => ret = Some(r),
                        Entered::Frame(f) => stack.push(f),
                    }
                    continue;
                }
            }

            frame.cur = None;
            let seq = mem::take(&mut frame.seq);
            let failed = mem::replace(&mut frame.failed, false);
            let r = match (frame.shape, failed) {
                (NodeShape::Ambiguous, false) => {
                    let dv = self.visitor.derivation(seq);
                    frame.alts.push(dv);
                    continue;
                }
                (NodeShape::Ambiguous, true) => continue,
                (_, true) => None,
                (NodeShape::Intermediate, false) => Some(Walked::Seq(seq)),
                (NodeShape::Complete, false) => match frame.tag {
                    Tag::Rule(ridx) => {
                        let dv = self.visitor.derivation(seq);
                        let node = SymbolNode::Rule {
                            ridx,
                            pidx: d.pidx(),
                        };
                        Some(Walked::One(self.visitor.symbol(node, dv)))
                    }
                    Tag::Lexeme(_) | Tag::Pos(_) => None,
                },
            };
            ret = Some(self.leave(&mut stack, r));
        }
        ret.flatten()
    }

    /// Start walking `idx`. Lexemes, and nodes with nothing beneath them, are walked immediately;
    /// a node already on the stack cannot be walked at all.
    fn enter(
        &mut self,
        idx: ItemIdx,
        tidx: Option<TIdx<StorageT>>,
    ) -> Entered<V::Output, WalkFrame<StorageT, V>> {
        let forest = self.forest;
        let tag = forest.tag(idx);
        if let Tag::Lexeme(laidx) = tag {
            return Entered::Done(tidx.map(|tidx| {
                let dv = self.visitor.derivation(Vec::new());
                Walked::One(self.visitor.symbol(SymbolNode::Lexeme { laidx, tidx }, dv))
            }));
        }
        let off = self.offsets[idx.set()] + idx.item();
        if self.on_stack[off] {
            return Entered::Done(None);
        }
        let shape = forest.shape(idx);
        let derivs = forest.derivations(idx).iter().cloned().collect::<Vec<_>>();
        if derivs.is_empty() {
            return Entered::Done(match shape {
                NodeShape::Intermediate => Some(Walked::Seq(Vec::new())),
                NodeShape::Ambiguous | NodeShape::Complete => None,
            });
        }
        self.on_stack.set(off, true);
        Entered::Frame(Frame {
            idx,
            off,
            tag,
            shape,
            derivs,
            next: 0,
            cur: None,
            children: Vec::new(),
            child: 0,
            seq: Vec::new(),
            failed: false,
            alts: Vec::new(),
        })
    }

    /// Pop the top of `stack`, whose result is `r`.
    fn leave(
        &mut self,
        stack: &mut Vec<WalkFrame<StorageT, V>>,
        r: Option<Walked<V::Output>>,
    ) -> Option<Walked<V::Output>> {
        if let Some(f) = stack.pop() {
            self.on_stack.set(f.off, false);
        }
        r
    }

    /// Return `d`'s children in order. A lexeme child is paired with the token its position in
    /// the production requires: a left child that is a lexeme is always the production's first
    /// symbol, and the right child is the symbol just before the dot of `tag`.
    fn children(
        &self,
        tag: Tag<StorageT>,
        d: &Derivation<StorageT>,
    ) -> Vec<(ItemIdx, Option<TIdx<StorageT>>)> {
        let grm = self.forest.grm;
        let prod = grm.prod(d.pidx());
        let token = |i: usize| match prod.get(i) {
            Some(Symbol::Token(tidx)) => Some(*tidx),
            _ => None,
        };
        let dot = match tag {
            Tag::Pos(pos) => usize::from(pos.dot()),
            Tag::Rule(_) | Tag::Lexeme(_) => prod.len(),
        };
        let mut cs = Vec::with_capacity(2);
        if let Some(l) = d.left() {
            cs.push((l, token(0)));
        }
        if let Some(r) = d.right() {
            cs.push((r, dot.checked_sub(1).and_then(token)));
        }
        cs
    }
}

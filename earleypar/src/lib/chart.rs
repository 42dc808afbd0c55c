use std::hash::Hash;

use earleygrm::{Grammar, PIdx, RIdx, RulePos, Symbol};
use fnv::FnvHashMap;
use indexmap::IndexSet;
use num_traits::{AsPrimitive, PrimInt, Unsigned};

/// The index of an item within a chart: `set` is the input position the item ends at, `item` the
/// item's offset within that set.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ItemIdx {
    set: usize,
    item: usize,
}

impl ItemIdx {
    pub(crate) fn new(set: usize, item: usize) -> Self {
        ItemIdx { set, item }
    }

    /// The input position this item ends at.
    pub fn set(&self) -> usize {
        self.set
    }

    /// This item's offset within its set.
    pub fn item(&self) -> usize {
        self.item
    }
}

/// What an item has matched.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Tag<StorageT> {
    /// The lexeme at the given input offset.
    Lexeme(usize),
    /// A prefix of a production: the position's dot is always short of the production's length.
    Pos(RulePos<StorageT>),
    /// A fully matched rule, regardless of which of its productions matched.
    Rule(RIdx<StorageT>),
}

/// One way of building an item: `left` covers the already matched prefix (elided when trivial)
/// and `right` the most recently matched symbol. An empty production has neither.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Derivation<StorageT> {
    left: Option<ItemIdx>,
    right: Option<ItemIdx>,
    pidx: PIdx<StorageT>,
}

impl<StorageT: Copy> Derivation<StorageT> {
    pub(crate) fn new(left: Option<ItemIdx>, right: Option<ItemIdx>, pidx: PIdx<StorageT>) -> Self {
        Derivation { left, right, pidx }
    }

    pub fn left(&self) -> Option<ItemIdx> {
        self.left
    }

    pub fn right(&self) -> Option<ItemIdx> {
        self.right
    }

    /// The production this derivation belongs to.
    pub fn pidx(&self) -> PIdx<StorageT> {
        self.pidx
    }
}

/// The derivations of an item, in the order they were discovered. Lexemes have none.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Derivations<StorageT: Eq + Hash> {
    None,
    One(Derivation<StorageT>),
    Many(IndexSet<Derivation<StorageT>>),
}

impl<StorageT: Copy + Eq + Hash> Derivations<StorageT> {
    pub fn len(&self) -> usize {
        match self {
            Derivations::None => 0,
            Derivations::One(_) => 1,
            Derivations::Many(ds) => ds.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Derivations::None)
    }

    /// If there is exactly one derivation, return it.
    pub fn sole(&self) -> Option<&Derivation<StorageT>> {
        match self {
            Derivations::One(d) => Some(d),
            _ => None,
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &Derivation<StorageT>> + '_> {
        match self {
            Derivations::None => Box::new(std::iter::empty()),
            Derivations::One(d) => Box::new(std::iter::once(d)),
            Derivations::Many(ds) => Box::new(ds.iter()),
        }
    }

    /// Add `d`, returning `false` if an identical derivation was already present.
    pub(crate) fn add(&mut self, d: Derivation<StorageT>) -> bool {
        match self {
            Derivations::None => {
                *self = Derivations::One(d);
                true
            }
            Derivations::One(x) => {
                if *x == d {
                    return false;
                }
                let mut ds = IndexSet::with_capacity(2);
                ds.insert(*x);
                ds.insert(d);
                *self = Derivations::Many(ds);
                true
            }
            Derivations::Many(ds) => ds.insert(d),
        }
    }

    /// Replace all the derivations with `d`.
    pub(crate) fn collapse(&mut self, d: Derivation<StorageT>) {
        *self = Derivations::One(d);
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Item<StorageT: Eq + Hash> {
    pub(crate) tag: Tag<StorageT>,
    pub(crate) start: usize,
    pub(crate) derivs: Derivations<StorageT>,
}

/// All the items ending at one input position.
#[derive(Clone, Debug)]
pub(crate) struct Set<StorageT: Eq + Hash> {
    pub(crate) items: Vec<Item<StorageT>>,
    /// (tag, start) -> offset in `items`.
    idx: FnvHashMap<(Tag<StorageT>, usize), usize>,
    /// The items awaiting a given rule or exactly named token.
    wants: FnvHashMap<Symbol<StorageT>, Vec<usize>>,
    /// The items awaiting a token class.
    wants_class: Vec<usize>,
}

impl<StorageT: Eq + Hash> Set<StorageT> {
    fn new() -> Self {
        Set {
            items: Vec::new(),
            idx: FnvHashMap::default(),
            wants: FnvHashMap::default(),
            wants_class: Vec::new(),
        }
    }
}

/// The sets of a parse, one per input position `0..=n`. Every item of a parse lives in the chart
/// and items refer to each other by [`ItemIdx`].
#[derive(Clone, Debug)]
pub(crate) struct Chart<StorageT: Eq + Hash> {
    pub(crate) sets: Vec<Set<StorageT>>,
}

impl<StorageT: 'static + Copy + Eq + Hash + PrimInt + Unsigned> Chart<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub(crate) fn new() -> Self {
        Chart { sets: Vec::new() }
    }

    /// Append a new, empty, set and return its position.
    pub(crate) fn push_set(&mut self) -> usize {
        self.sets.push(Set::new());
        self.sets.len() - 1
    }

    pub(crate) fn item(&self, idx: ItemIdx) -> &Item<StorageT> {
        &self.sets[idx.set].items[idx.item]
    }

    pub(crate) fn items_len(&self) -> usize {
        self.sets.iter().map(|s| s.items.len()).sum()
    }

    /// Return the offset of the first item of each set when all items are laid out end to end.
    pub(crate) fn offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.sets.len());
        let mut off = 0;
        for s in &self.sets {
            offsets.push(off);
            off += s.items.len();
        }
        offsets
    }

    pub(crate) fn find_item(&self, tag: Tag<StorageT>, start: usize, end: usize) -> Option<ItemIdx> {
        self.sets
            .get(end)
            .and_then(|s| s.idx.get(&(tag, start)))
            .map(|i| ItemIdx::new(end, *i))
    }

    /// Return the item `(tag, start, end)`, creating it if necessary. A new item awaiting a symbol
    /// is registered in the set's wants indexes.
    pub(crate) fn add_item<ActionT>(
        &mut self,
        grm: &Grammar<ActionT, StorageT>,
        tag: Tag<StorageT>,
        start: usize,
        end: usize,
    ) -> ItemIdx {
        let set = &mut self.sets[end];
        if let Some(i) = set.idx.get(&(tag, start)) {
            return ItemIdx::new(end, *i);
        }
        let i = set.items.len();
        set.items.push(Item {
            tag,
            start,
            derivs: Derivations::None,
        });
        set.idx.insert((tag, start), i);
        if let Tag::Pos(pos) = tag {
            match grm.next_symbol(pos) {
                Some(Symbol::Token(tidx)) if grm.is_token_class(tidx) => set.wants_class.push(i),
                Some(sym) => set.wants.entry(sym).or_default().push(i),
                None => (),
            }
        }
        ItemIdx::new(end, i)
    }

    /// Return the items of set `set` awaiting `sym`.
    pub(crate) fn wants(&self, set: usize, sym: Symbol<StorageT>) -> Vec<usize> {
        self.sets[set].wants.get(&sym).cloned().unwrap_or_default()
    }

    /// Return the items of set `set` awaiting a token class.
    pub(crate) fn wants_class(&self, set: usize) -> Vec<usize> {
        self.sets[set].wants_class.clone()
    }

    /// Add the derivation `(left, right, pidx)` to `item`. A left item which is the first or
    /// second position of a production carries no information of its own, so it is replaced by
    /// what it wraps: nothing for dot 0, its sole right child for dot 1.
    pub(crate) fn add_derivation(
        &mut self,
        item: ItemIdx,
        left: Option<ItemIdx>,
        right: Option<ItemIdx>,
        pidx: PIdx<StorageT>,
    ) -> bool {
        let left = match left {
            Some(l) => match self.item(l).tag {
                Tag::Pos(pos) if usize::from(pos.dot()) == 0 => None,
                Tag::Pos(pos) if usize::from(pos.dot()) == 1 => {
                    self.item(l).derivs.sole().and_then(|d| d.right)
                }
                _ => Some(l),
            },
            None => None,
        };
        self.sets[item.set].items[item.item]
            .derivs
            .add(Derivation::new(left, right, pidx))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn d(left: Option<usize>, right: Option<usize>, pidx: u32) -> Derivation<u32> {
        Derivation::new(
            left.map(|i| ItemIdx::new(0, i)),
            right.map(|i| ItemIdx::new(1, i)),
            PIdx(pidx),
        )
    }

    #[test]
    fn test_derivations_add() {
        let mut ds = Derivations::None;
        assert!(ds.is_empty());
        assert_eq!(ds.len(), 0);
        assert!(ds.add(d(None, Some(0), 0)));
        assert_eq!(ds, Derivations::One(d(None, Some(0), 0)));
        assert!(!ds.add(d(None, Some(0), 0)));
        assert_eq!(ds.len(), 1);
        assert!(ds.add(d(Some(1), Some(0), 0)));
        assert_eq!(ds.len(), 2);
        assert!(ds.sole().is_none());
        assert!(!ds.add(d(Some(1), Some(0), 0)));
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn test_derivations_distinguish_rules() {
        // Two derivations which differ only by production are both kept.
        let mut ds = Derivations::None;
        assert!(ds.add(d(None, Some(0), 0)));
        assert!(ds.add(d(None, Some(0), 1)));
        assert_eq!(
            ds.iter().map(|x| x.pidx()).collect::<Vec<_>>(),
            vec![PIdx(0), PIdx(1)]
        );
    }

    #[test]
    fn test_derivations_order_and_collapse() {
        let mut ds = Derivations::None;
        ds.add(d(None, Some(2), 0));
        ds.add(d(None, Some(0), 0));
        ds.add(d(None, Some(1), 0));
        assert_eq!(
            ds.iter().map(|x| x.right().unwrap().item()).collect::<Vec<_>>(),
            vec![2, 0, 1]
        );
        ds.collapse(d(None, Some(1), 0));
        assert_eq!(ds.sole(), Some(&d(None, Some(1), 0)));
    }
}

use std::{
    fmt::{self, Debug},
    hash::Hash,
};

use earleygrm::{Grammar, PIdx, Value};
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use vob::Vob;

use crate::{
    chart::{Chart, Derivations, ItemIdx, Tag},
    disambiguate::disambiguate,
    eval::{EvalError, Evaluator},
    walk::{walk, ForestVisitor, SymbolNode},
};

/// The role a forest node plays when the forest is traversed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeShape {
    /// The node has more than one derivation.
    Ambiguous,
    /// The node is a prefix of a production: its children are spliced into those of the node
    /// which completes the production.
    Intermediate,
    /// The node is a lexeme or a fully matched rule.
    Complete,
}

/// A shared packed parse forest: every way the start rule matched the input. Nodes are
/// [`ItemIdx`]s, and any node which is reachable by more than one path is stored only once.
pub struct Forest<'a, ActionT, StorageT: Eq + Hash> {
    pub(crate) grm: &'a Grammar<ActionT, StorageT>,
    pub(crate) chart: Chart<StorageT>,
    pub(crate) root: ItemIdx,
}

impl<'a, ActionT, StorageT: Clone + Eq + Hash> Clone for Forest<'a, ActionT, StorageT> {
    fn clone(&self) -> Self {
        Forest {
            grm: self.grm,
            chart: self.chart.clone(),
            root: self.root,
        }
    }
}

impl<'a, ActionT, StorageT> Debug for Forest<'a, ActionT, StorageT>
where
    StorageT: 'static + Debug + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Forest")
            .field("root", &self.root)
            .field("sets_len", &self.sets_len())
            .field("items_len", &self.items_len())
            .finish()
    }
}

impl<'a, ActionT, StorageT> Forest<'a, ActionT, StorageT>
where
    StorageT: 'static + Debug + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
{
    pub(crate) fn new(
        grm: &'a Grammar<ActionT, StorageT>,
        chart: Chart<StorageT>,
        root: ItemIdx,
    ) -> Self {
        Forest { grm, chart, root }
    }

    pub fn grammar(&self) -> &'a Grammar<ActionT, StorageT> {
        self.grm
    }

    /// The node matching the start rule over the whole input.
    pub fn root(&self) -> ItemIdx {
        self.root
    }

    /// How many sets did the parse create? This is always one more than the input's length.
    pub fn sets_len(&self) -> usize {
        self.chart.sets.len()
    }

    /// How many items did the parse create, whether or not they are reachable from the root?
    pub fn items_len(&self) -> usize {
        self.chart.items_len()
    }

    /// Return an iterator over every item the parse created.
    pub fn iter_items(&self) -> impl Iterator<Item = ItemIdx> + '_ {
        self.chart
            .sets
            .iter()
            .enumerate()
            .flat_map(|(i, s)| (0..s.items.len()).map(move |j| ItemIdx::new(i, j)))
    }

    /// Return the item with tag `tag` spanning `start..end`, if the parse created one.
    pub fn find_item(&self, tag: Tag<StorageT>, start: usize, end: usize) -> Option<ItemIdx> {
        self.chart.find_item(tag, start, end)
    }

    /// Panics if `idx` doesn't exist.
    pub fn tag(&self, idx: ItemIdx) -> Tag<StorageT> {
        self.chart.item(idx).tag
    }

    /// The input offset `idx` starts at. Panics if `idx` doesn't exist.
    pub fn start(&self, idx: ItemIdx) -> usize {
        self.chart.item(idx).start
    }

    /// The input offset `idx` ends at (exclusive).
    pub fn end(&self, idx: ItemIdx) -> usize {
        idx.set()
    }

    /// Panics if `idx` doesn't exist.
    pub fn derivations(&self, idx: ItemIdx) -> &Derivations<StorageT> {
        &self.chart.item(idx).derivs
    }

    /// Classify `idx`. Panics if `idx` doesn't exist.
    pub fn shape(&self, idx: ItemIdx) -> NodeShape {
        let item = self.chart.item(idx);
        if item.derivs.len() > 1 {
            NodeShape::Ambiguous
        } else if let Tag::Pos(_) = item.tag {
            NodeShape::Intermediate
        } else {
            NodeShape::Complete
        }
    }

    /// Is any node reachable from the root ambiguous?
    pub fn is_ambiguous(&self) -> bool {
        let offsets = self.chart.offsets();
        let mut seen = Vob::new();
        seen.resize(self.items_len(), false);
        let mut todo = vec![self.root];
        while let Some(idx) = todo.pop() {
            let off = offsets[idx.set()] + idx.item();
            if seen[off] {
                continue;
            }
            seen.set(off, true);
            let derivs = self.derivations(idx);
            if derivs.len() > 1 {
                return true;
            }
            for d in derivs.iter() {
                todo.extend(d.left());
                todo.extend(d.right());
            }
        }
        false
    }

    /// Collapse every reachable ambiguous node to the single derivation `prefer` likes best.
    /// `prefer(a, b)` returns `true` if production `a` should win over production `b`. Where
    /// `prefer` does not decide between two derivations, their left, and then right, children
    /// are compared in the same way; any remaining ties go to the first derivation discovered.
    ///
    /// This is destructive: discarded derivations cannot be recovered (clone the forest first if
    /// they are needed). Disambiguating twice with the same `prefer` changes nothing.
    pub fn disambiguate<F>(&mut self, prefer: F)
    where
        F: Fn(PIdx<StorageT>, PIdx<StorageT>) -> bool,
    {
        disambiguate(self, prefer);
    }

    /// Disambiguate using the grammar's production priorities.
    pub fn prioritize(&mut self) {
        let grm = self.grm;
        self.disambiguate(|p1, p2| grm.higher_priority(p1, p2));
    }

    /// Walk the forest from its root with `visitor`. Returns `None` only if the root cannot be
    /// walked without going round a cycle.
    pub fn walk<V>(&self, visitor: &mut V) -> Option<V::Output>
    where
        V: ForestVisitor<StorageT>,
    {
        walk(self, visitor)
    }

    /// Evaluate the (unambiguous) forest with the grammar's actions.
    pub fn evaluate<'input, S: AsRef<str>>(
        &self,
        input: &'input [S],
    ) -> Result<Value<'input, ActionT>, EvalError<StorageT>> {
        let mut ev = Evaluator::new(self.grm, input);
        self.walk(&mut ev).unwrap_or(Err(EvalError::Cyclic))
    }

    /// Return a pretty-printed version of the forest: one node per line, with children indented
    /// by one space. Ambiguous nodes are shown as `<choice ...>` with each alternative beneath an
    /// `<alt>` line.
    pub fn pp<S: AsRef<str>>(&self, input: &[S]) -> String {
        let mut pp = PrettyPrinter {
            grm: self.grm,
            input,
        };
        let mut s = String::new();
        for l in self.walk(&mut pp).unwrap_or_default() {
            s.push_str(&l);
            s.push('\n');
        }
        s
    }
}

struct PrettyPrinter<'a, 'input, ActionT, StorageT, S> {
    grm: &'a Grammar<ActionT, StorageT>,
    input: &'input [S],
}

impl<ActionT, StorageT, S> ForestVisitor<StorageT> for PrettyPrinter<'_, '_, ActionT, StorageT, S>
where
    StorageT: 'static + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
    S: AsRef<str>,
{
    type Output = Vec<String>;
    type Derivation = Vec<String>;

    fn choices(&mut self, _: ItemIdx, tag: Tag<StorageT>, alts: Vec<Vec<String>>) -> Vec<String> {
        let name = match tag {
            Tag::Rule(ridx) => self.grm.rule_name_str(ridx).to_owned(),
            Tag::Pos(pos) => self.grm.pp_pos(pos),
            Tag::Lexeme(laidx) => self.input[laidx].as_ref().to_owned(),
        };
        let mut lines = vec![format!("<choice {}>", name)];
        for alt in alts {
            lines.push(" <alt>".to_owned());
            lines.extend(alt.into_iter().map(|l| format!(" {}", l)));
        }
        lines
    }

    fn derivation(&mut self, children: Vec<Vec<String>>) -> Vec<String> {
        children
            .into_iter()
            .flatten()
            .map(|l| format!(" {}", l))
            .collect()
    }

    fn symbol(&mut self, node: SymbolNode<StorageT>, derivation: Vec<String>) -> Vec<String> {
        match node {
            SymbolNode::Lexeme { laidx, tidx } => vec![format!(
                "{} {}",
                self.grm.token_name(tidx),
                self.input[laidx].as_ref()
            )],
            SymbolNode::Rule { ridx, .. } => {
                let mut lines = Vec::with_capacity(derivation.len() + 1);
                lines.push(self.grm.rule_name_str(ridx).to_owned());
                lines.extend(derivation);
                lines
            }
        }
    }
}

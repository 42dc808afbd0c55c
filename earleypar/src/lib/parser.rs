// Copyright (c) 2017 King's College London
// created by the Software Development Team <http://soft-dev.org/>
//
// The Universal Permissive License (UPL), Version 1.0
//
// Subject to the condition set forth below, permission is hereby granted to any person obtaining a
// copy of this software, associated documentation and/or data (collectively the "Software"), free
// of charge and under any and all copyright rights in the Software, and any and all patent rights
// owned or freely licensable by each licensor hereunder covering either (i) the unmodified
// Software as contributed to or provided by such licensor, or (ii) the Larger Works (as defined
// below), to deal in both
//
// (a) the Software, and
// (b) any piece of software and/or hardware listed in the lrgrwrks.txt file
// if one is included with the Software (each a "Larger Work" to which the Software is contributed
// by such licensors),
//
// without restriction, including without limitation the rights to copy, create derivative works
// of, display, perform, and distribute the Software and make, use, sell, offer for sale, import,
// export, have made, and have sold the Software and the Larger Work(s), and to sublicense the
// foregoing rights on either these or other terms.
//
// This license is subject to the following condition: The above copyright notice and either this
// complete permission notice or at a minimum a reference to the UPL must be included in all copies
// or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING
// BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use std::{
    error::Error,
    fmt::{self, Debug, Display},
    hash::Hash,
};

use earleygrm::{Grammar, RIdx, Symbol, TIdx, Value};
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use tracing::{debug, trace};

use crate::{
    chart::{Chart, ItemIdx, Tag},
    eval::EvalError,
    forest::Forest,
};

pub(crate) struct Parser<'a, 'input, ActionT, StorageT: Eq + Hash, S> {
    grm: &'a Grammar<ActionT, StorageT>,
    input: &'input [S],
    /// A mapping from input offset -> the (non-class) token whose name equals the lexeme, if any.
    lexeme_tidxs: Vec<Option<TIdx<StorageT>>>,
    chart: Chart<StorageT>,
}

impl<'a, 'input, ActionT, StorageT, S> Parser<'a, 'input, ActionT, StorageT, S>
where
    StorageT: 'static + Debug + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
    S: AsRef<str>,
{
    fn parse(
        grm: &'a Grammar<ActionT, StorageT>,
        start: RIdx<StorageT>,
        input: &'input [S],
    ) -> Result<Forest<'a, ActionT, StorageT>, ParseError> {
        let mut psr = Parser {
            grm,
            input,
            lexeme_tidxs: input.iter().map(|l| grm.lexeme_token(l.as_ref())).collect(),
            chart: Chart::new(),
        };
        let s0 = psr.chart.push_set();
        psr.predict(s0, start);
        psr.process(s0);
        for laidx in 0..input.len() {
            let set = psr.scan(laidx);
            psr.process(set);
            // If nothing awaited the lexeme, the set contains only the lexeme's item and no later
            // set can contain anything else.
            if psr.chart.sets[set].items.len() == 1 {
                debug!(laidx, "no item awaits lexeme");
                return Err(ParseError {
                    laidx,
                    kind: ParseErrorKind::UnexpectedLexeme,
                });
            }
        }
        match psr
            .chart
            .find_item(Tag::Rule(start), 0, input.len())
        {
            Some(root) => {
                debug!(
                    sets = psr.chart.sets.len(),
                    items = psr.chart.items_len(),
                    "parse succeeded"
                );
                Ok(Forest::new(grm, psr.chart, root))
            }
            None => {
                debug!(laidx = input.len(), "input ended before the start rule matched");
                Err(ParseError {
                    laidx: input.len(),
                    kind: ParseErrorKind::UnexpectedEnd,
                })
            }
        }
    }

    /// Predict, and complete, items in `set` until no new items are created. Nullable rules mean
    /// that an item processed early in a pass may need to combine with one created later in the
    /// same pass, hence the fixed point.
    fn process(&mut self, set: usize) {
        let mut passes = 0;
        loop {
            let len = self.chart.sets[set].items.len();
            let mut i = 0;
            while i < self.chart.sets[set].items.len() {
                let idx = ItemIdx::new(set, i);
                let tag = self.chart.item(idx).tag;
                match tag {
                    Tag::Pos(pos) => {
                        if let Some(Symbol::Rule(ridx)) = self.grm.next_symbol(pos) {
                            self.predict(set, ridx);
                        }
                    }
                    Tag::Rule(_) | Tag::Lexeme(_) => self.complete(idx),
                }
                i += 1;
            }
            passes += 1;
            if self.chart.sets[set].items.len() == len {
                break;
            }
        }
        trace!(
            set,
            items = self.chart.sets[set].items.len(),
            passes,
            "processed set"
        );
    }

    /// Add the start of every production of rule `ridx` to `set`. Empty productions are
    /// complete as soon as they are predicted.
    fn predict(&mut self, set: usize, ridx: RIdx<StorageT>) {
        let grm = self.grm;
        for &pidx in grm.rule_to_prods(ridx) {
            let pos = grm.start_pos(pidx);
            if grm.is_complete(pos) {
                let item = self.chart.add_item(grm, Tag::Rule(ridx), set, set);
                self.chart.add_derivation(item, None, None, pidx);
            } else {
                self.chart.add_item(grm, Tag::Pos(pos), set, set);
            }
        }
    }

    /// Create a new set containing the lexeme at `laidx` and return the new set's position.
    fn scan(&mut self, laidx: usize) -> usize {
        let set = self.chart.push_set();
        self.chart.add_item(self.grm, Tag::Lexeme(laidx), laidx, set);
        set
    }

    /// Advance every item awaiting the symbol `c` matched.
    fn complete(&mut self, c: ItemIdx) {
        let grm = self.grm;
        let input = self.input;
        let item = self.chart.item(c);
        let (tag, start) = (item.tag, item.start);
        match tag {
            Tag::Rule(ridx) => {
                for w in self.chart.wants(start, Symbol::Rule(ridx)) {
                    self.advance_item(ItemIdx::new(start, w), c);
                }
            }
            Tag::Lexeme(laidx) => {
                if let Some(tidx) = self.lexeme_tidxs[laidx] {
                    for w in self.chart.wants(start, Symbol::Token(tidx)) {
                        self.advance_item(ItemIdx::new(start, w), c);
                    }
                }
                let lexeme = input[laidx].as_ref();
                for w in self.chart.wants_class(start) {
                    let widx = ItemIdx::new(start, w);
                    if let Tag::Pos(pos) = self.chart.item(widx).tag {
                        if let Some(Symbol::Token(tidx)) = grm.next_symbol(pos) {
                            if grm.token_matches(tidx, lexeme) {
                                self.advance_item(widx, c);
                            }
                        }
                    }
                }
            }
            Tag::Pos(_) => (),
        }
    }

    /// Record that `w`, followed by the completed symbol `c`, forms the item one position on from
    /// `w`.
    fn advance_item(&mut self, w: ItemIdx, c: ItemIdx) {
        let grm = self.grm;
        let item = self.chart.item(w);
        let (tag, start) = (item.tag, item.start);
        if let Tag::Pos(pos) = tag {
            let next = grm.advance(pos);
            let tag = if grm.is_complete(next) {
                Tag::Rule(grm.prod_to_rule(pos.pidx()))
            } else {
                Tag::Pos(next)
            };
            let nidx = self.chart.add_item(grm, tag, start, c.set());
            self.chart.add_derivation(nidx, Some(w), Some(c), pos.pidx());
        }
    }
}

/// A builder for parsing input with a [`Grammar`].
///
/// ```rust,ignore
/// let forest = EarleyParserBuilder::new(&grm).parse(&["a", "a", "b", "b"])?;
/// ```
pub struct EarleyParserBuilder<'a, ActionT, StorageT: Eq + Hash> {
    grm: &'a Grammar<ActionT, StorageT>,
    start_rule: RIdx<StorageT>,
}

impl<'a, ActionT, StorageT> EarleyParserBuilder<'a, ActionT, StorageT>
where
    StorageT: 'static + Debug + Hash + PrimInt + Unsigned,
    usize: AsPrimitive<StorageT>,
{
    pub fn new(grm: &'a Grammar<ActionT, StorageT>) -> Self {
        EarleyParserBuilder {
            grm,
            start_rule: grm.start_rule_idx(),
        }
    }

    /// Parse against rule `ridx` rather than the grammar's start rule.
    pub fn start_rule(mut self, ridx: RIdx<StorageT>) -> Self {
        self.start_rule = ridx;
        self
    }

    /// Parse `input`. On success return the forest of all the ways the start rule matches the
    /// whole of `input`; on failure return a `ParseError`.
    pub fn parse<S: AsRef<str>>(
        &self,
        input: &[S],
    ) -> Result<Forest<'a, ActionT, StorageT>, ParseError> {
        Parser::parse(self.grm, self.start_rule, input)
    }

    /// Parse `input`, resolve ambiguities using production priorities, and evaluate the result
    /// with the grammar's actions.
    pub fn parse_actions<'input, S: AsRef<str>>(
        &self,
        input: &'input [S],
    ) -> Result<Value<'input, ActionT>, ParseActionsError<StorageT>> {
        let mut forest = self.parse(input)?;
        forest.prioritize();
        Ok(forest.evaluate(input)?)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseErrorKind {
    /// No item awaited the lexeme.
    UnexpectedLexeme,
    /// All of the input was consumed without the start rule matching it.
    UnexpectedEnd,
}

/// Records a failed parse.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseError {
    laidx: usize,
    kind: ParseErrorKind,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            ParseErrorKind::UnexpectedLexeme => write!(f, "Parse error at lexeme {}", self.laidx),
            ParseErrorKind::UnexpectedEnd => {
                write!(f, "Parse error: unexpected end of input at lexeme {}", self.laidx)
            }
        }
    }
}

impl Error for ParseError {}

impl ParseError {
    /// Return the offset of the furthest lexeme the parser reached: the first lexeme which
    /// could not be scanned, or the input's length if the input ended too soon.
    pub fn laidx(&self) -> usize {
        self.laidx
    }

    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }
}

/// The errors `EarleyParserBuilder::parse_actions` can return.
#[derive(Debug)]
pub enum ParseActionsError<StorageT> {
    ParseError(ParseError),
    EvalError(EvalError<StorageT>),
}

impl<StorageT: Debug> Display for ParseActionsError<StorageT> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseActionsError::ParseError(e) => Display::fmt(e, f),
            ParseActionsError::EvalError(e) => Display::fmt(e, f),
        }
    }
}

impl<StorageT: Debug> Error for ParseActionsError<StorageT> {}

impl<StorageT> From<ParseError> for ParseActionsError<StorageT> {
    fn from(err: ParseError) -> ParseActionsError<StorageT> {
        ParseActionsError::ParseError(err)
    }
}

impl<StorageT> From<EvalError<StorageT>> for ParseActionsError<StorageT> {
    fn from(err: EvalError<StorageT>) -> ParseActionsError<StorageT> {
        ParseActionsError::EvalError(err)
    }
}

//! Greedy packing of boundary units into size-bounded pieces.

use super::text::{char_len, sentences};

/// A boundary-delimited span plus the separator used when it is appended
/// to a non-empty piece.
#[derive(Debug, Clone)]
pub(crate) struct Unit {
    pub text: String,
    pub joiner: &'static str,
    len: usize,
}

impl Unit {
    pub fn new(text: impl Into<String>, joiner: &'static str) -> Self {
        let text = text.into();
        let len = char_len(&text);
        Self { text, joiner, len }
    }
}

/// Units destined for one fragment.
#[derive(Debug, Clone, Default)]
pub(crate) struct Piece {
    units: Vec<Unit>,
    len: usize,
}

impl Piece {
    fn len_with(&self, unit: &Unit) -> usize {
        if self.units.is_empty() { unit.len } else { self.len + unit.joiner.len() + unit.len }
    }

    fn push(&mut self, unit: Unit) {
        self.len = self.len_with(&unit);
        self.units.push(unit);
    }

    fn push_front(&mut self, unit: Unit) {
        let added = match self.units.first() { Some(first) => unit.len + first.joiner.len(), None => unit.len };
        self.len += added;
        self.units.insert(0, unit);
    }

    fn pop(&mut self) -> Option<Unit> {
        let unit = self.units.pop()?;
        self.len -= if self.units.is_empty() { unit.len } else { unit.len + unit.joiner.len() };
        Some(unit)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, unit) in self.units.iter().enumerate() {
            if i > 0 { out.push_str(unit.joiner); }
            out.push_str(&unit.text);
        }
        out
    }
}

/// Replace units longer than `target` by their sentences. A unit with a
/// single sentence stays whole: it cannot be split without cutting text.
pub(crate) fn refine_oversized(units: Vec<Unit>, target: usize) -> Vec<Unit> {
    let mut out = Vec::with_capacity(units.len());
    for unit in units {
        if unit.len <= target { out.push(unit); continue; }
        let parts = sentences(&unit.text);
        if parts.len() < 2 { out.push(unit); continue; }
        for (i, s) in parts.into_iter().enumerate() {
            out.push(Unit::new(s, if i == 0 { unit.joiner } else { " " }));
        }
    }
    out
}

/// Accumulate units while the joined length stays within `target`.
pub(crate) fn pack(units: Vec<Unit>, target: usize) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut current = Piece::default();
    for unit in units {
        if !current.units.is_empty() && current.len_with(&unit) > target {
            pieces.push(std::mem::take(&mut current));
        }
        current.push(unit);
    }
    if !current.units.is_empty() { pieces.push(current); }
    pieces
}

/// Grow a trailing piece shorter than `min_size` by moving units back from
/// its predecessor, as long as both stay non-empty and within `target`.
pub(crate) fn rebalance_tail(mut pieces: Vec<Piece>, min_size: usize, target: usize) -> Vec<Piece> {
    let n = pieces.len();
    if min_size == 0 || n < 2 { return pieces; }
    let (head, tail) = pieces.split_at_mut(n - 1);
    let (prev, last) = (&mut head[n - 2], &mut tail[0]);
    while last.len < min_size && prev.units.len() > 1 {
        let Some(candidate) = prev.units.last() else { break };
        let grown = match last.units.first() { Some(first) => candidate.len + first.joiner.len() + last.len, None => candidate.len };
        if grown > target { break; }
        if let Some(unit) = prev.pop() { last.push_front(unit); }
    }
    pieces
}

/// Render pieces, prefixing each after the first with the tail of its
/// predecessor.
///
/// The carried tail is at most `overlap - 1` characters plus one joining
/// space, and is snapped forward to a word start so no token is cut.
pub(crate) fn render_with_overlap(pieces: &[Piece], overlap: usize) -> Vec<String> {
    let bases: Vec<String> = pieces.iter().map(Piece::render).collect();
    let mut out = Vec::with_capacity(bases.len());
    for (i, base) in bases.iter().enumerate() {
        let carried = if i == 0 { "" } else { overlap_tail(&bases[i - 1], overlap) };
        if carried.is_empty() { out.push(base.clone()); } else { out.push(format!("{carried} {base}")); }
    }
    out
}

pub(crate) fn overlap_tail(prev: &str, overlap: usize) -> &str {
    let budget = overlap.saturating_sub(1);
    if budget == 0 { return ""; }
    let total = char_len(prev);
    if total <= budget { return prev.trim(); }
    let start = prev.char_indices().nth(total - budget).map_or(prev.len(), |(b, _)| b);
    let window = &prev[start..];
    let at_word_start = prev[..start].chars().next_back().map_or(true, char::is_whitespace);
    if at_word_start { return window.trim(); }
    match window.find(char::is_whitespace) {
        Some(ws) => window[ws..].trim(),
        None => "",
    }
}

//! Candidate neighbourhoods and the nearest-definition tie-break.

use crate::domain::SnippetSequence;
use serde::Serialize;

/// Inclusive index bounds, already clamped to the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Window {
    pub lower: usize,
    pub upper: usize,
}

impl Window {
    pub fn around(target: usize, radius: usize, sequence: &SnippetSequence) -> Self {
        let first = sequence.first_index().unwrap_or(target);
        let last = sequence.last_index().unwrap_or(target);
        Self {
            lower: target.saturating_sub(radius).max(first),
            upper: target.saturating_add(radius).min(last),
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.lower <= index && index <= self.upper
    }

    pub fn covers(&self, other: &Window) -> bool {
        self.lower <= other.lower && other.upper <= self.upper
    }
}

/// Where a symbol's definition was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Candidates in preference order; the first one wins.
    pub candidates: Vec<usize>,
    pub window: Window,
}

impl Selection {
    pub fn chosen(&self) -> Option<usize> {
        self.candidates.first().copied()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WindowSelector {
    base: usize,
    cap: usize,
}

impl WindowSelector {
    pub fn new(base: usize, cap: usize) -> Self {
        Self { base, cap: cap.max(base) }
    }

    pub fn base_window(&self, target: usize, sequence: &SnippetSequence) -> Window {
        Window::around(target, self.base, sequence)
    }

    /// The widest window any search for `target` may reach.
    pub fn max_window(&self, target: usize, sequence: &SnippetSequence) -> Window {
        Window::around(target, self.cap, sequence)
    }

    /// Snippet indices inside `window` in search order: preceding snippets
    /// nearest-first, then following snippets nearest-first.
    pub fn candidates(
        &self,
        target: usize,
        window: Window,
        sequence: &SnippetSequence,
    ) -> Vec<usize> {
        let in_range = sequence.range(window.lower, window.upper);
        let preceding = in_range.iter().rev().map(|s| s.index).filter(|i| *i < target);
        let following = in_range.iter().map(|s| s.index).filter(|i| *i > target);
        preceding.chain(following).collect()
    }

    /// Search for a definer of a symbol, widening the radius until the cap.
    ///
    /// `definers` lists every parseable snippet defining the symbol, ascending.
    pub fn select(
        &self,
        target: usize,
        definers: &[usize],
        sequence: &SnippetSequence,
    ) -> Option<Selection> {
        let mut radius = self.base;
        loop {
            let window = Window::around(target, radius, sequence);
            let candidates = order_candidates(target, definers, window);
            if !candidates.is_empty() {
                return Some(Selection { candidates, window });
            }
            if radius >= self.cap {
                return None;
            }
            let next = radius.saturating_mul(2).max(radius + 1).min(self.cap);
            tracing::debug!(
                snippet = target,
                from = radius,
                to = next,
                "expanding candidate window"
            );
            radius = next;
        }
    }
}

/// Definers inside `window` ordered by the nearest-preceding-first tie-break.
pub fn order_candidates(target: usize, definers: &[usize], window: Window) -> Vec<usize> {
    let preceding = definers.iter().rev().copied().filter(|i| *i < target && window.contains(*i));
    let following = definers.iter().copied().filter(|i| *i > target && window.contains(*i));
    preceding.chain(following).collect()
}

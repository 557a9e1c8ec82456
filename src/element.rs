/*!
This module provides the algebraic representation of partial regexes.

An [`Element`] is an immutable value describing a fragment of a regular
expression over UTF-16 code units. Elements are assembled bottom-up by the
trie-to-regex conversion in the `dafsa` module and rewritten into a
canonical form by `Element::optimize`. Rendering to concrete regex syntax
happens exactly once per value and is memoized, because the optimizer
leans on the rendered string for equality, hashing and ordering.

That last point is worth dwelling on: two elements are equal if and only
if they render to the same regex string, and the ordering between elements
is the lexicographic ordering of those strings. This is what makes every
`BTreeSet<Element>` in this crate iterate in a stable order, which in turn
is what makes the compiler's output bit-identical across runs.
*/

use std::{
    collections::BTreeSet,
    fmt::Write,
    sync::{
        atomic::{AtomicBool, Ordering::Relaxed},
        Arc,
    },
};

use once_cell::sync::OnceCell;

/// A fragment of a regular expression over UTF-16 code units.
///
/// An element is a cheap-to-clone handle to one of six variants: the empty
/// string, a single code unit, a set of code units, a concatenation, a
/// zero-or-one repetition or an alternation. Construct them with
/// [`Element::nothing`], [`Element::char`], [`Element::set`],
/// [`Element::seq`], [`Element::maybe`] and [`Element::or`].
///
/// Elements are logically immutable. The rendered regex string and the
/// "already optimized" flag are per-handle caches; they never change the
/// observable value of an element.
#[derive(Clone)]
pub struct Element {
    inner: Arc<Inner>,
}

struct Inner {
    kind: Kind,
    rendered: OnceCell<String>,
    optimized: AtomicBool,
}

/// The closed set of element variants.
///
/// The optimizer pattern-matches exhaustively on this, so adding a variant
/// is a cross-cutting change by design.
pub(crate) enum Kind {
    /// Matches the empty string.
    Nothing,
    /// Matches exactly one code unit.
    Char(u16),
    /// Matches any single member of the set.
    Set(BTreeSet<u16>),
    /// Matches the concatenation of the children.
    Seq(Vec<Element>),
    /// Matches the child zero or one times.
    Maybe(Element),
    /// Matches any one of the options.
    Or(BTreeSet<Element>),
}

impl Element {
    fn new(kind: Kind) -> Element {
        Element {
            inner: Arc::new(Inner {
                kind,
                rendered: OnceCell::new(),
                optimized: AtomicBool::new(false),
            }),
        }
    }

    /// Create an element matching the empty string.
    pub fn nothing() -> Element {
        Element::new(Kind::Nothing)
    }

    /// Create an element matching exactly the given code unit.
    pub fn char(unit: u16) -> Element {
        Element::new(Kind::Char(unit))
    }

    /// Create an element matching any single one of the given code units.
    pub fn set<I: IntoIterator<Item = u16>>(units: I) -> Element {
        Element::new(Kind::Set(units.into_iter().collect()))
    }

    /// Create an element matching the given elements in order.
    pub fn seq<I: IntoIterator<Item = Element>>(elements: I) -> Element {
        Element::new(Kind::Seq(elements.into_iter().collect()))
    }

    /// Create an element matching the given element zero or one times.
    pub fn maybe(element: Element) -> Element {
        Element::new(Kind::Maybe(element))
    }

    /// Create an element matching any one of the given options.
    ///
    /// Options are kept as a set: two options rendering to the same regex
    /// collapse into one.
    pub fn or<I: IntoIterator<Item = Element>>(options: I) -> Element {
        Element::new(Kind::Or(options.into_iter().collect()))
    }

    pub(crate) fn kind(&self) -> &Kind {
        &self.inner.kind
    }

    /// Whether this element is `Nothing`.
    pub(crate) fn is_nothing(&self) -> bool {
        matches!(self.inner.kind, Kind::Nothing)
    }

    /// Whether this element renders as a single atom, i.e. something that
    /// a `?` quantifier can follow without a group around it.
    fn is_atom(&self) -> bool {
        matches!(
            self.inner.kind,
            Kind::Nothing | Kind::Char(_) | Kind::Set(_)
        )
    }

    pub(crate) fn is_optimized(&self) -> bool {
        self.inner.optimized.load(Relaxed)
    }

    /// Record that this element is the output of `optimize`, so that
    /// re-optimization can return it unchanged.
    pub(crate) fn mark_optimized(&self) {
        self.inner.optimized.store(true, Relaxed);
    }

    /// The length, in code units, of the longest string this element can
    /// match.
    pub fn max_possible_len(&self) -> usize {
        match self.inner.kind {
            Kind::Nothing => 0,
            Kind::Char(_) | Kind::Set(_) => 1,
            Kind::Seq(ref elements) => {
                elements.iter().map(Element::max_possible_len).sum()
            }
            Kind::Maybe(ref element) => element.max_possible_len(),
            Kind::Or(ref options) => options
                .iter()
                .map(Element::max_possible_len)
                .max()
                .unwrap_or(0),
        }
    }

    /// A sequence view of this element: its children if it is a `Seq`,
    /// and otherwise a singleton list holding the element itself.
    ///
    /// The optimizer uses this to reason uniformly about the prefixes and
    /// suffixes of alternation options.
    pub fn as_sequence(&self) -> Vec<Element> {
        match self.inner.kind {
            Kind::Seq(ref elements) => elements.clone(),
            _ => vec![self.clone()],
        }
    }

    /// Render this element to concrete regex syntax.
    ///
    /// The result is memoized, so repeated calls are cheap. The rendered
    /// syntax uses only `?`, `|`, `[…]` classes with `-` ranges, `(?:…)`
    /// groups, `\uXXXX` escapes and backslash-escaped ASCII
    /// metacharacters, which keeps it portable across the common regex
    /// dialects.
    pub fn to_regex(&self) -> &str {
        self.inner.rendered.get_or_init(|| self.render()).as_str()
    }

    fn render(&self) -> String {
        match self.inner.kind {
            Kind::Nothing => String::new(),
            Kind::Char(unit) => {
                let mut out = String::new();
                render_char(&mut out, unit);
                out
            }
            Kind::Set(ref units) => render_set(units),
            Kind::Seq(ref elements) => {
                let mut out = String::new();
                for element in elements.iter() {
                    // Alternations bind loosest, so they need a group to
                    // take part in a concatenation.
                    if matches!(element.inner.kind, Kind::Or(_)) {
                        out.push_str("(?:");
                        out.push_str(element.to_regex());
                        out.push(')');
                    } else {
                        out.push_str(element.to_regex());
                    }
                }
                out
            }
            Kind::Maybe(ref element) => {
                if element.is_atom() {
                    format!("{}?", element.to_regex())
                } else {
                    format!("(?:{})?", element.to_regex())
                }
            }
            Kind::Or(ref options) => {
                // Longest-match-first: a left-to-right regex engine tries
                // alternatives in the order written, so options that can
                // match longer strings must come first. Ties are broken
                // lexicographically to keep the output stable.
                let mut options: Vec<&Element> = options.iter().collect();
                options.sort_by(|e1, e2| {
                    e2.max_possible_len()
                        .cmp(&e1.max_possible_len())
                        .then_with(|| e1.to_regex().cmp(e2.to_regex()))
                });
                let mut out = String::new();
                for (i, option) in options.iter().enumerate() {
                    if i > 0 {
                        out.push('|');
                    }
                    out.push_str(option.to_regex());
                }
                out
            }
        }
    }
}

/// Render one code unit.
///
/// ASCII metacharacters get a backslash. Everything at or above 128 is
/// emitted as `\uXXXX` with exactly four upper-case hex digits, which
/// means a surrogate pair stays two adjacent escapes and astral input
/// round-trips through engines that work on UTF-16 code units.
fn render_char(out: &mut String, unit: u16) {
    if unit < 128 {
        let ch = char::from(unit as u8);
        if regex_syntax::is_meta_character(ch) {
            out.push('\\');
        }
        out.push(ch);
    } else {
        write!(out, "\\u{:04X}", unit).unwrap();
    }
}

/// Render a character class.
///
/// Maximal runs of consecutive code units collapse into `from-to` ranges,
/// but only for runs of three or more: `a-b` saves nothing over `ab`.
fn render_set(units: &BTreeSet<u16>) -> String {
    let units: Vec<u16> = units.iter().copied().collect();
    let mut out = String::from("[");
    let mut i = 0;
    while i < units.len() {
        let mut j = i;
        while j + 1 < units.len()
            && u32::from(units[j + 1]) == u32::from(units[j]) + 1
        {
            j += 1;
        }
        if j - i + 1 >= 3 {
            render_char(&mut out, units[i]);
            out.push('-');
            render_char(&mut out, units[j]);
        } else {
            for k in i..=j {
                render_char(&mut out, units[k]);
            }
        }
        i = j + 1;
    }
    out.push(']');
    out
}

impl PartialEq for Element {
    fn eq(&self, other: &Element) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || self.to_regex() == other.to_regex()
    }
}

impl Eq for Element {}

impl PartialOrd for Element {
    fn partial_cmp(&self, other: &Element) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Element {
    fn cmp(&self, other: &Element) -> std::cmp::Ordering {
        self.to_regex().cmp(other.to_regex())
    }
}

impl std::hash::Hash for Element {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_regex().hash(state);
    }
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_regex())
    }
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Element({:?})", self.to_regex())
    }
}

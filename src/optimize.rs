/*!
This module rewrites elements into a canonical, compact form.

`Element::optimize` normalizes the easy variants (empty sets, one-element
sequences, nested `?`) and hands alternations to the part that earns its
keep: `optimize_or`. That routine strips optionality off the options,
flattens nested alternations and character sets, factors out shared
prefixes and suffixes, fuses what remains of the single-character options
into one character class and finally re-applies optionality around the
result.

The factoring discipline matters. Passes alternate between prefixes and
suffixes at a fixed probe width (`xfix_len`), and the width only grows
once both directions stall. Widening earlier loses factorings that only
become visible after a narrower contraction has rewritten the options.
Everything iterates over B-tree containers so that a given input always
factors the same way.
*/

use std::collections::{BTreeMap, BTreeSet};

use crate::element::{Element, Kind};

impl Element {
    /// Rewrite this element into a canonical form matching the same
    /// strings.
    ///
    /// Optimization is idempotent: optimizing the result again returns it
    /// unchanged. The rewrite never reorders semantics, only
    /// representation, so `e.optimize().to_regex()` and `e.to_regex()`
    /// recognize exactly the same language.
    pub fn optimize(&self) -> Element {
        if self.is_optimized() {
            return self.clone();
        }
        let out = match self.kind() {
            Kind::Nothing | Kind::Char(_) => self.clone(),
            Kind::Set(units) => match units.len() {
                0 => Element::nothing(),
                1 => Element::char(*units.iter().next().unwrap()),
                _ => self.clone(),
            },
            Kind::Seq(elements) => optimize_seq(elements),
            Kind::Maybe(element) => optimize_maybe(element),
            Kind::Or(options) => optimize_or(options),
        };
        out.mark_optimized();
        out
    }
}

/// Flatten nested sequences, drop empty children and collapse trivial
/// results.
fn optimize_seq(elements: &[Element]) -> Element {
    let mut elements = elements.to_vec();
    loop {
        let mut changed = false;
        let mut next = Vec::with_capacity(elements.len());
        for element in elements.iter() {
            let element = element.optimize();
            match element.kind() {
                Kind::Nothing => changed = true,
                Kind::Seq(inner) => {
                    changed = true;
                    next.extend(inner.iter().cloned());
                }
                _ => next.push(element.clone()),
            }
        }
        elements = next;
        if !changed {
            break;
        }
    }
    match elements.len() {
        0 => Element::nothing(),
        1 => elements.pop().unwrap(),
        _ => Element::seq(elements),
    }
}

fn optimize_maybe(element: &Element) -> Element {
    let element = element.optimize();
    match element.kind() {
        // `(?:)?` is the empty string and `(?:x?)?` is `x?`.
        Kind::Nothing | Kind::Maybe(_) => element.clone(),
        _ => Element::maybe(element.clone()),
    }
}

/// Which end of the options a factoring pass probes.
#[derive(Clone, Copy, Debug)]
enum Xfix {
    Prefix,
    Suffix,
}

/// Normalize an alternation.
fn optimize_or(options: &BTreeSet<Element>) -> Element {
    // Step 1: optimize every option and strip outer optionality. An
    // option `x?` contributes `x` to the alternation and makes the whole
    // alternation optional.
    let mut optional = false;
    let mut pool: BTreeSet<Element> = BTreeSet::new();
    for option in options.iter() {
        let option = option.optimize();
        match option.kind() {
            Kind::Maybe(inner) => {
                optional = true;
                pool.insert(inner.clone());
            }
            _ => {
                pool.insert(option.clone());
            }
        }
    }

    // Step 2: flatten. Nested alternations merge their options in, and
    // character sets explode into their single characters so that the
    // factoring below sees them uniformly. (Step 4 re-fuses whatever is
    // still a lone character when factoring is done.)
    loop {
        let mut changed = false;
        let mut next: BTreeSet<Element> = BTreeSet::new();
        for option in pool.iter() {
            match option.kind() {
                Kind::Or(inner) => {
                    changed = true;
                    for o in inner.iter() {
                        next.insert(o.optimize());
                    }
                }
                Kind::Set(units) => {
                    changed = true;
                    for &unit in units.iter() {
                        next.insert(Element::char(unit));
                    }
                }
                _ => {
                    next.insert(option.clone());
                }
            }
        }
        pool = next;
        if !changed {
            break;
        }
    }

    // Step 3: factor shared prefixes and suffixes, narrowest first. The
    // probe width only widens once neither direction finds anything at
    // the current width.
    let mut xfix_len = 1;
    loop {
        let max_len = pool
            .iter()
            .map(|option| option.as_sequence().len())
            .max()
            .unwrap_or(0);
        if xfix_len >= max_len {
            break;
        }
        let factored_prefix = xfix_pass(&mut pool, xfix_len, Xfix::Prefix);
        let factored_suffix = xfix_pass(&mut pool, xfix_len, Xfix::Suffix);
        if !factored_prefix && !factored_suffix {
            xfix_len += 1;
        }
    }

    // Step 4: fuse the remaining single-character options into one
    // character class.
    let mut units: BTreeSet<u16> = BTreeSet::new();
    let mut fused: BTreeSet<Element> = BTreeSet::new();
    for option in pool.iter() {
        match option.kind() {
            Kind::Char(unit) => {
                units.insert(*unit);
            }
            Kind::Set(set) => {
                units.extend(set.iter().copied());
            }
            _ => {
                fused.insert(option.clone());
            }
        }
    }
    if !units.is_empty() {
        let class = Element::set(units).optimize();
        if !class.is_nothing() {
            fused.insert(class);
        }
    }
    pool = fused;

    // Step 5: an empty-string option makes the alternation optional
    // rather than surviving as a `|`-branch of its own.
    if pool.remove(&Element::nothing()) {
        optional = true;
    }
    let out = match pool.len() {
        0 => return Element::nothing(),
        1 => pool.into_iter().next().unwrap(),
        _ => {
            let or = Element::or(pool);
            or.mark_optimized();
            or
        }
    };
    if optional {
        Element::maybe(out).optimize()
    } else {
        out
    }
}

/// One factoring pass over the options at the given probe width.
///
/// Options are grouped by the (optimized) sequence of their first or last
/// `xfix_len` elements. A group of two or more options sharing a
/// non-empty key contracts into a single option with the shared part
/// hoisted out of a nested alternation. Options shorter than the probe
/// width key as `Nothing` and pass through untouched; leaving them as
/// bare alternatives is what later lets an empty remainder turn into
/// optionality (`ab|b` becoming `a?b`).
///
/// Returns true if anything contracted.
fn xfix_pass(
    pool: &mut BTreeSet<Element>,
    xfix_len: usize,
    end: Xfix,
) -> bool {
    let mut groups: BTreeMap<Element, Vec<Element>> = BTreeMap::new();
    for option in pool.iter() {
        let seq = option.as_sequence();
        let key = if seq.len() < xfix_len {
            Element::nothing()
        } else {
            match end {
                Xfix::Prefix => Element::seq(seq[..xfix_len].to_vec()),
                Xfix::Suffix => {
                    Element::seq(seq[seq.len() - xfix_len..].to_vec())
                }
            }
            .optimize()
        };
        groups.entry(key).or_default().push(option.clone());
    }

    let mut changed = false;
    let mut next: BTreeSet<Element> = BTreeSet::new();
    for (key, group) in groups {
        if group.len() == 1 || key.is_nothing() {
            next.extend(group);
            continue;
        }
        let mut remainders: BTreeSet<Element> = BTreeSet::new();
        for option in group.iter() {
            let seq = option.as_sequence();
            let rest = match end {
                Xfix::Prefix => seq[xfix_len..].to_vec(),
                Xfix::Suffix => seq[..seq.len() - xfix_len].to_vec(),
            };
            remainders.insert(Element::seq(rest));
        }
        log::trace!(
            "factoring {} options behind {:?} {}",
            group.len(),
            key.to_regex(),
            match end {
                Xfix::Prefix => "prefix",
                Xfix::Suffix => "suffix",
            },
        );
        let factored = match end {
            Xfix::Prefix => Element::seq([key, Element::or(remainders)]),
            Xfix::Suffix => Element::seq([Element::or(remainders), key]),
        };
        next.insert(factored.optimize());
        changed = true;
    }
    *pool = next;
    changed
}

//! Argument matcher.
//!
//! Maps a supplied (positional + named + variadic) argument list onto a
//! formals-ordered slot array. The matcher is a pure function of the
//! signature and the supplied *names*: it never touches argument payloads,
//! so the resulting permutation can be replayed against expressions on the
//! first call through a site, against cached shapes on inline-cache hits,
//! and against already-created promises on generic re-dispatch.
//!
//! Matching order: exact names, then unique prefixes (prefix matching only
//! reaches formals before the variadic marker), then variadic collection
//! and positional fill, then defaults.

use crate::signature::{Signature, DOTS};

/// Where one formal slot gets its payload from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotSource {
    /// Index into the supplied list.
    Supplied(usize),
    /// The formal's own default expression.
    Default,
    /// Neither supplied nor defaulted.
    Missing,
    /// The variadic slot's bundle: supplied indices in original relative
    /// order.
    DotsBundle(Vec<usize>),
}

/// The matched permutation. Invariant: `slots.len()` equals the signature
/// length; the variadic slot holds the bundle placeholder, not individual
/// values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedPositions {
    pub slots: Vec<SlotSource>,
}

/// Matching failures, carrying supplied/formal indices; the engine turns
/// these into user-visible errors with the deparsed argument text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgMatchError {
    /// A supplied argument had an empty-string name.
    ZeroLengthName { index: usize },
    /// A supplied name prefix-matched two distinct formals.
    AmbiguousMatch { index: usize },
    /// One formal was matched by two supplied arguments.
    FormalMatchedMultiple { formal: String },
    /// Leftover supplied arguments with no variadic sink.
    UnusedArguments { indices: Vec<usize> },
}

/// Match `supplied` argument names against `sig`, producing the
/// formals-ordered permutation.
pub fn match_positions(
    sig: &Signature,
    supplied: &[Option<&str>],
) -> Result<MatchedPositions, ArgMatchError> {
    let n = sig.len();
    let dots_pos = sig.dots_position();

    // Fast path: all-positional call of a fixed-arity callee.
    if dots_pos.is_none() && supplied.iter().all(Option::is_none) {
        if supplied.len() > n {
            return Err(ArgMatchError::UnusedArguments {
                indices: (n..supplied.len()).collect(),
            });
        }
        let slots = (0..n)
            .map(|j| {
                if j < supplied.len() {
                    SlotSource::Supplied(j)
                } else {
                    default_or_missing(sig, j)
                }
            })
            .collect();
        return Ok(MatchedPositions { slots });
    }

    let mut filled: Vec<Option<usize>> = vec![None; n];
    let mut matched_by_name = vec![false; n];
    let mut consumed = vec![false; supplied.len()];

    // Exact-name pass. An empty name is an error regardless of whether a
    // variadic sink exists.
    for (i, name) in supplied.iter().enumerate() {
        let Some(name) = name else { continue };
        if name.is_empty() {
            return Err(ArgMatchError::ZeroLengthName { index: i });
        }
        if *name == DOTS {
            continue; // only the bundle can absorb an argument named "..."
        }
        for (j, formal) in sig.params().iter().enumerate() {
            if formal.is_dots() {
                continue;
            }
            if formal.name == *name {
                if matched_by_name[j] {
                    return Err(ArgMatchError::FormalMatchedMultiple {
                        formal: formal.name.clone(),
                    });
                }
                matched_by_name[j] = true;
                filled[j] = Some(i);
                consumed[i] = true;
                break;
            }
        }
    }

    // Unique-prefix pass over formals before the variadic marker.
    let prefix_limit = dots_pos.unwrap_or(n);
    for (i, name) in supplied.iter().enumerate() {
        let Some(name) = name else { continue };
        if consumed[i] || *name == DOTS {
            continue;
        }
        let mut hit: Option<usize> = None;
        for (j, formal) in sig.params().iter().enumerate().take(prefix_limit) {
            if !formal.name.starts_with(name) {
                continue;
            }
            if matched_by_name[j] {
                return Err(ArgMatchError::FormalMatchedMultiple {
                    formal: formal.name.clone(),
                });
            }
            if hit.is_some() {
                return Err(ArgMatchError::AmbiguousMatch { index: i });
            }
            hit = Some(j);
        }
        if let Some(j) = hit {
            matched_by_name[j] = true;
            filled[j] = Some(i);
            consumed[i] = true;
        }
    }

    // Positional fill of still-empty formals before the variadic marker;
    // everything left over is gathered into the bundle in original order,
    // or reported unused when there is no bundle.
    let mut next_formal = 0usize;
    let mut bundle: Vec<usize> = Vec::new();
    let mut leftovers: Vec<usize> = Vec::new();
    for (i, name) in supplied.iter().enumerate() {
        if consumed[i] {
            continue;
        }
        if name.is_none() {
            while next_formal < prefix_limit && filled[next_formal].is_some() {
                next_formal += 1;
            }
            if next_formal < prefix_limit {
                filled[next_formal] = Some(i);
                next_formal += 1;
                continue;
            }
        }
        if dots_pos.is_some() {
            bundle.push(i);
        } else {
            leftovers.push(i);
        }
    }
    if !leftovers.is_empty() {
        return Err(ArgMatchError::UnusedArguments { indices: leftovers });
    }

    let slots = (0..n)
        .map(|j| {
            if Some(j) == dots_pos {
                SlotSource::DotsBundle(bundle.clone())
            } else if let Some(i) = filled[j] {
                SlotSource::Supplied(i)
            } else {
                default_or_missing(sig, j)
            }
        })
        .collect();
    Ok(MatchedPositions { slots })
}

fn default_or_missing(sig: &Signature, j: usize) -> SlotSource {
    if sig.params()[j].default.is_some() {
        SlotSource::Default
    } else {
        SlotSource::Missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;
    use std::rc::Rc;

    fn sig(names: &[&str]) -> Signature {
        Signature::new(names.iter().map(|n| (n.to_string(), None)).collect()).unwrap()
    }

    fn sig_with_defaults(params: &[(&str, bool)]) -> Signature {
        Signature::new(
            params
                .iter()
                .map(|(n, has_default)| {
                    let default = has_default.then(|| Rc::new(Expr::num(0.0)));
                    (n.to_string(), default)
                })
                .collect(),
        )
        .unwrap()
    }

    fn names<'a>(args: &[Option<&'a str>]) -> Vec<Option<&'a str>> {
        args.to_vec()
    }

    #[test]
    fn test_fast_path_positional_zip() {
        let s = sig(&["x", "y", "z"]);
        let m = match_positions(&s, &names(&[None, None])).unwrap();
        assert_eq!(
            m.slots,
            vec![
                SlotSource::Supplied(0),
                SlotSource::Supplied(1),
                SlotSource::Missing
            ]
        );
    }

    #[test]
    fn test_fast_path_oversupply_is_unused() {
        let s = sig(&["x", "y"]);
        let err = match_positions(&s, &names(&[None, None, None])).unwrap_err();
        assert_eq!(err, ArgMatchError::UnusedArguments { indices: vec![2] });
    }

    #[test]
    fn test_exact_then_positional() {
        // f(alpha, beta, ...) called as f(beta = ?, ?, ?)
        let s = sig(&["alpha", "beta", "..."]);
        let m = match_positions(&s, &names(&[Some("beta"), None, None])).unwrap();
        assert_eq!(
            m.slots,
            vec![
                SlotSource::Supplied(1),
                SlotSource::Supplied(0),
                SlotSource::DotsBundle(vec![2]),
            ]
        );
    }

    #[test]
    fn test_unique_prefix_match() {
        let s = sig(&["verbose", "value"]);
        let m = match_positions(&s, &names(&[Some("verb"), None])).unwrap();
        assert_eq!(
            m.slots,
            vec![SlotSource::Supplied(0), SlotSource::Supplied(1)]
        );
    }

    #[test]
    fn test_ambiguous_prefix() {
        let s = sig(&["value", "verbose"]);
        let err = match_positions(&s, &names(&[Some("v")])).unwrap_err();
        assert_eq!(err, ArgMatchError::AmbiguousMatch { index: 0 });
    }

    #[test]
    fn test_exact_beats_prefix() {
        // "value" matches the formal `value` exactly even though it is
        // also a prefix of `value2`.
        let s = sig(&["value", "value2"]);
        let m = match_positions(&s, &names(&[Some("value")])).unwrap();
        assert_eq!(
            m.slots,
            vec![SlotSource::Supplied(0), SlotSource::Missing]
        );
    }

    #[test]
    fn test_formal_matched_twice_exact_then_prefix() {
        let s = sig(&["alpha"]);
        let err = match_positions(&s, &names(&[Some("alpha"), Some("al")])).unwrap_err();
        assert_eq!(
            err,
            ArgMatchError::FormalMatchedMultiple {
                formal: "alpha".to_string()
            }
        );
    }

    #[test]
    fn test_same_formal_named_twice() {
        let s = sig(&["x", "y"]);
        let err = match_positions(&s, &names(&[Some("x"), Some("x")])).unwrap_err();
        assert_eq!(
            err,
            ArgMatchError::FormalMatchedMultiple {
                formal: "x".to_string()
            }
        );
    }

    #[test]
    fn test_zero_length_name() {
        let s = sig(&["x", "..."]);
        let err = match_positions(&s, &names(&[Some("")])).unwrap_err();
        assert_eq!(err, ArgMatchError::ZeroLengthName { index: 0 });
    }

    #[test]
    fn test_unmatched_named_goes_to_bundle() {
        let s = sig(&["x", "..."]);
        let m = match_positions(&s, &names(&[Some("extra"), None])).unwrap();
        assert_eq!(
            m.slots,
            vec![SlotSource::Supplied(1), SlotSource::DotsBundle(vec![0])]
        );
    }

    #[test]
    fn test_unmatched_named_without_bundle_is_unused() {
        let s = sig(&["x"]);
        let err = match_positions(&s, &names(&[None, Some("zzz")])).unwrap_err();
        assert_eq!(err, ArgMatchError::UnusedArguments { indices: vec![1] });
    }

    #[test]
    fn test_prefix_never_reaches_past_dots() {
        // `al` must not partially match the post-variadic formal `alpha`;
        // it lands in the bundle instead.
        let s = sig(&["x", "...", "alpha"]);
        let m = match_positions(&s, &names(&[None, Some("al")])).unwrap();
        assert_eq!(
            m.slots,
            vec![
                SlotSource::Supplied(0),
                SlotSource::DotsBundle(vec![1]),
                SlotSource::Missing,
            ]
        );
    }

    #[test]
    fn test_exact_reaches_past_dots() {
        let s = sig(&["x", "...", "alpha"]);
        let m = match_positions(&s, &names(&[None, Some("alpha")])).unwrap();
        assert_eq!(
            m.slots,
            vec![
                SlotSource::Supplied(0),
                SlotSource::DotsBundle(vec![]),
                SlotSource::Supplied(1),
            ]
        );
    }

    #[test]
    fn test_bundle_preserves_relative_order() {
        let s = sig(&["x", "..."]);
        let m = match_positions(
            &s,
            &names(&[None, Some("a"), None, Some("b"), None]),
        )
        .unwrap();
        assert_eq!(
            m.slots,
            vec![
                SlotSource::Supplied(0),
                SlotSource::DotsBundle(vec![1, 2, 3, 4]),
            ]
        );
    }

    #[test]
    fn test_defaults_fill_empty_slots() {
        let s = sig_with_defaults(&[("x", false), ("y", true)]);
        let m = match_positions(&s, &names(&[None])).unwrap();
        assert_eq!(m.slots, vec![SlotSource::Supplied(0), SlotSource::Default]);
    }

    #[test]
    fn test_slot_count_invariant() {
        let s = sig(&["a", "b", "...", "c"]);
        let m = match_positions(&s, &names(&[None])).unwrap();
        assert_eq!(m.slots.len(), s.len());
    }
}

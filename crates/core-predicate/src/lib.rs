//! Predicate registry and tri-state evaluator.
//!
//! Predicates are append-only records addressed by [`PredicateHandle`];
//! routing and gating nodes keep handles, never predicate values, so a
//! `modify_predicate` node can flip `enabled`/`inverted` flags and every
//! holder observes the change on its next evaluation.
//!
//! Evaluation is tri-state: `Disabled` (invalid handle, disabled record, or
//! a field predicate applied to no event) behaves as the identity inside
//! conjunction/disjunction, which makes dynamically disabling a clause
//! indistinguishable from deleting it. An aggregate all of whose children
//! are `Disabled` is itself `Disabled`. Inversion applies after
//! aggregation (it flips the truth value, never the children) and leaves
//! `Disabled` untouched.
//!
//! Aggregate nesting depth is configuration-controlled, so the evaluator
//! runs on an explicit frame stack instead of native recursion.

use core_events::{EventData, Modifier};

/// Stable index into a [`PredicateRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PredicateHandle(u32);

impl PredicateHandle {
    pub fn from_index(index: usize) -> Self {
        PredicateHandle(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PredicateResult {
    Disabled,
    Rejected,
    Accepted,
}

impl PredicateResult {
    pub fn accepted(self) -> bool {
        self == PredicateResult::Accepted
    }

    fn invert(self, inverted: bool) -> Self {
        if !inverted {
            return self;
        }
        match self {
            PredicateResult::Accepted => PredicateResult::Rejected,
            PredicateResult::Rejected => PredicateResult::Accepted,
            PredicateResult::Disabled => PredicateResult::Disabled,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PredicateKind {
    /// Accepts everything (useful as a mutable gate).
    Accept,
    CodeNs { min: i64, max: i64 },
    CodeMajor { min: i64, max: i64 },
    CodeMinor { min: i64, max: i64 },
    Payload { min: i64, max: i64 },
    InputIndex { min: i64, max: i64 },
    /// Accepts events carrying the given modifier.
    Modifier(Modifier),
    Conjunction(Vec<PredicateHandle>),
    Disjunction(Vec<PredicateHandle>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Predicate {
    pub kind: PredicateKind,
    pub enabled: bool,
    pub inverted: bool,
}

impl Predicate {
    pub fn new(kind: PredicateKind) -> Self {
        Predicate {
            kind,
            enabled: true,
            inverted: false,
        }
    }

    pub fn inverted(kind: PredicateKind) -> Self {
        Predicate {
            kind,
            enabled: true,
            inverted: true,
        }
    }
}

/// The event view a predicate evaluates against: the data fields plus the
/// input slot the event arrived through.
#[derive(Clone, Copy, Debug)]
pub struct PredicateTarget<'a> {
    pub data: &'a EventData,
    pub input_index: usize,
}

#[derive(Debug, Default)]
pub struct PredicateRegistry {
    values: Vec<Predicate>,
}

struct Frame<'p> {
    children: &'p [PredicateHandle],
    next_child: usize,
    disjunction: bool,
    inverted: bool,
    any_decisive: bool,
}

impl PredicateRegistry {
    pub fn new() -> Self {
        PredicateRegistry::default()
    }

    /// Append-only registration; handles stay valid until [`reset`].
    ///
    /// [`reset`]: PredicateRegistry::reset
    pub fn register(&mut self, predicate: Predicate) -> PredicateHandle {
        let handle = PredicateHandle::from_index(self.values.len());
        self.values.push(predicate);
        handle
    }

    pub fn get(&self, handle: PredicateHandle) -> Option<&Predicate> {
        self.values.get(handle.index())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Invalid handles are ignored, matching the "no effect" policy for
    /// handler-visible anomalies.
    pub fn set_enabled(&mut self, handle: PredicateHandle, enabled: bool) {
        if let Some(p) = self.values.get_mut(handle.index()) {
            p.enabled = enabled;
        }
    }

    pub fn set_inverted(&mut self, handle: PredicateHandle, inverted: bool) {
        if let Some(p) = self.values.get_mut(handle.index()) {
            p.inverted = inverted;
        }
    }

    /// Bulk reset; the only way predicates are ever released.
    pub fn reset(&mut self) {
        self.values.clear();
    }

    fn leaf_result(
        &self,
        predicate: &Predicate,
        target: Option<&PredicateTarget<'_>>,
    ) -> PredicateResult {
        let accepted = match &predicate.kind {
            PredicateKind::Accept => true,
            PredicateKind::CodeNs { min, max }
            | PredicateKind::CodeMajor { min, max }
            | PredicateKind::CodeMinor { min, max }
            | PredicateKind::Payload { min, max }
            | PredicateKind::InputIndex { min, max } => {
                let Some(target) = target else {
                    return PredicateResult::Disabled;
                };
                let actual = match &predicate.kind {
                    PredicateKind::CodeNs { .. } => target.data.code.ns as i64,
                    PredicateKind::CodeMajor { .. } => target.data.code.major as i64,
                    PredicateKind::CodeMinor { .. } => target.data.code.minor as i64,
                    PredicateKind::Payload { .. } => target.data.payload,
                    PredicateKind::InputIndex { .. } => target.input_index as i64,
                    _ => unreachable!("outer match restricted kind to range predicates"),
                };
                *min <= actual && actual <= *max
            }
            PredicateKind::Modifier(modifier) => {
                let Some(target) = target else {
                    return PredicateResult::Disabled;
                };
                target.data.modifiers.has(*modifier)
            }
            PredicateKind::Conjunction(_) | PredicateKind::Disjunction(_) => {
                unreachable!("aggregates are evaluated on the frame stack")
            }
        };
        let result = if accepted {
            PredicateResult::Accepted
        } else {
            PredicateResult::Rejected
        };
        result.invert(predicate.inverted)
    }

    /// Evaluate `handle` against `target` (`None` models "no event", which
    /// disables every field-reading predicate).
    pub fn apply(
        &self,
        handle: PredicateHandle,
        target: Option<PredicateTarget<'_>>,
    ) -> PredicateResult {
        let target = target.as_ref();
        let mut frames: Vec<Frame<'_>> = Vec::new();
        let mut descend = Some(handle);
        let mut result = PredicateResult::Disabled;

        loop {
            // Descend until a leaf produced a result or an aggregate opened
            // a frame for its first child.
            while let Some(h) = descend.take() {
                result = PredicateResult::Disabled;
                let Some(predicate) = self.get(h) else {
                    break;
                };
                if !predicate.enabled {
                    break;
                }
                match &predicate.kind {
                    PredicateKind::Conjunction(children)
                    | PredicateKind::Disjunction(children) => {
                        if children.is_empty() {
                            break;
                        }
                        frames.push(Frame {
                            children,
                            next_child: 1,
                            disjunction: matches!(
                                predicate.kind,
                                PredicateKind::Disjunction(_)
                            ),
                            inverted: predicate.inverted,
                            any_decisive: false,
                        });
                        descend = Some(children[0]);
                    }
                    _ => {
                        result = self.leaf_result(predicate, target);
                        break;
                    }
                }
            }

            // Fold the completed result into open frames until one of them
            // wants another child (or the stack empties).
            loop {
                let Some(top) = frames.last_mut() else {
                    return result;
                };
                let short_circuit = match result {
                    PredicateResult::Disabled => false,
                    PredicateResult::Accepted => {
                        top.any_decisive = true;
                        top.disjunction
                    }
                    PredicateResult::Rejected => {
                        top.any_decisive = true;
                        !top.disjunction
                    }
                };
                if short_circuit {
                    let decided = if top.disjunction {
                        PredicateResult::Accepted
                    } else {
                        PredicateResult::Rejected
                    };
                    result = decided.invert(top.inverted);
                    frames.pop();
                    continue;
                }
                if top.next_child < top.children.len() {
                    descend = Some(top.children[top.next_child]);
                    top.next_child += 1;
                    break;
                }
                // Exhausted without a short circuit: the operator identity,
                // unless every child was disabled.
                result = if !top.any_decisive {
                    PredicateResult::Disabled
                } else if top.disjunction {
                    PredicateResult::Rejected
                } else {
                    PredicateResult::Accepted
                }
                .invert(top.inverted);
                frames.pop();
            }
        }
    }
}

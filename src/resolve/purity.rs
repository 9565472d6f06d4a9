//! Purity and recursion analysis over the user call graph.
//!
//! A function is impure iff its body invokes an impure built-in or an impure
//! user function. Purity is solved as a fixpoint: every function starts pure
//! unless it directly calls an impure built-in, and impurity then propagates
//! from callees to callers until nothing changes. Functions on a call-graph
//! cycle therefore start optimistic and are demoted only if the cycle reaches
//! an impure call.

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};

use crate::ir::{Builtin, Purity};

/// What one function body calls directly.
#[derive(Debug, Clone, Default)]
pub struct CallFacts {
    /// User callees in first-call order.
    pub callees: IndexSet<String>,
    /// Impure built-ins invoked directly, in first-call order.
    pub impure_builtins: IndexSet<Builtin>,
}

impl CallFacts {
    pub fn record_builtin(&mut self, b: Builtin) {
        if !b.is_pure() {
            self.impure_builtins.insert(b);
        }
    }

    pub fn record_user(&mut self, name: &str) {
        self.callees.insert(name.to_owned());
    }
}

#[derive(Debug, Clone)]
pub struct CallGraphSummary {
    pub purity: IndexMap<String, Purity>,
    pub recursive: HashSet<String>,
}

/// Solves purity and recursion for every function in `facts`.
pub fn analyze(facts: &IndexMap<String, CallFacts>) -> CallGraphSummary {
    let mut purity: IndexMap<String, Purity> = facts
        .iter()
        .map(|(name, f)| {
            let p = match f.impure_builtins.first() {
                Some(b) => Purity::Impure(format!(
                    "calls '{}' ({})",
                    b.name(),
                    b.impurity().unwrap_or("impure")
                )),
                None => Purity::Pure,
            };
            (name.clone(), p)
        })
        .collect();

    loop {
        let mut changed = false;
        for (name, f) in facts {
            if !purity.get(name).map_or(false, Purity::is_pure) {
                continue;
            }
            let impure_callee = f
                .callees
                .iter()
                .find(|c| purity.get(c.as_str()).map_or(false, |p| !p.is_pure()));
            if let Some(callee) = impure_callee {
                let reason = format!("calls impure function '{}'", callee);
                tracing::trace!(function = %name, %reason, "demoted to impure");
                purity.insert(name.clone(), Purity::Impure(reason));
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let recursive = facts
        .keys()
        .filter(|name| reaches(facts, name, name))
        .cloned()
        .collect();

    CallGraphSummary { purity, recursive }
}

/// Returns whether `target` is reachable from `from` through at least one call.
fn reaches(facts: &IndexMap<String, CallFacts>, from: &str, target: &str) -> bool {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = facts
        .get(from)
        .map(|f| f.callees.iter().map(String::as_str).collect())
        .unwrap_or_default();
    while let Some(name) = stack.pop() {
        if name == target {
            return true;
        }
        if !seen.insert(name) {
            continue;
        }
        if let Some(f) = facts.get(name) {
            stack.extend(f.callees.iter().map(String::as_str));
        }
    }
    false
}

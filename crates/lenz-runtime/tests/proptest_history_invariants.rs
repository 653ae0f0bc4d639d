//! Property-based invariant tests for the undo history and effect scopes.
//!
//! **History:**
//! 1. `count() <= capacity` after every operation (bounded histories).
//! 2. The timeline always matches a reference model (vector + cursor).
//! 3. `can_undo`/`can_redo` agree with the cursor position.
//! 4. Nothing follows `current` after a push.
//! 5. `clear` keeps the cursor and drops only the redo branch.
//! 6. `try_undo`/`try_redo` fail exactly when `undo`/`redo` would not move.
//!
//! **Effect scopes:**
//! 7. Every disposer in a scope tree runs exactly once, whatever order the
//!    scopes are disposed in.
//! 8. Dispose is idempotent.

use std::cell::RefCell;
use std::rc::Rc;

use lenz_runtime::{EffectScope, History, HistoryConfig, HistoryError, Runtime};
use proptest::prelude::*;

// ── Strategies ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Push(u8),
    Undo,
    Redo,
    Clear,
    Reset,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        5 => (0u8..8).prop_map(Op::Push),
        3 => Just(Op::Undo),
        2 => Just(Op::Redo),
        1 => Just(Op::Clear),
        1 => Just(Op::Reset),
    ]
}

fn ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(op_strategy(), 0..=max_len)
}

fn config_strategy() -> impl Strategy<Value = HistoryConfig> {
    (0usize..=6, proptest::bool::ANY)
        .prop_map(|(capacity, dedupe)| HistoryConfig::new(capacity).with_dedupe(dedupe))
}

// ── Reference model ───────────────────────────────────────────────────────

struct Model {
    items: Vec<u8>,
    cursor: usize,
    limit: usize,
    dedupe: bool,
}

impl Model {
    fn new(initial: u8, config: &HistoryConfig) -> Self {
        let limit = if config.capacity == 0 {
            usize::MAX
        } else {
            config.capacity
        };
        Self {
            items: vec![initial],
            cursor: 0,
            limit,
            dedupe: config.dedupe,
        }
    }

    fn apply(&mut self, op: &Op) {
        match *op {
            Op::Push(v) => {
                if self.dedupe && self.items[self.cursor] == v {
                    return;
                }
                self.items.truncate(self.cursor + 1);
                self.items.push(v);
                while self.items.len() > self.limit {
                    self.items.remove(0);
                }
                self.cursor = self.items.len() - 1;
            }
            Op::Undo => self.cursor = self.cursor.saturating_sub(1),
            Op::Redo => {
                if self.cursor + 1 < self.items.len() {
                    self.cursor += 1;
                }
            }
            Op::Clear => self.items.truncate(self.cursor + 1),
            Op::Reset => {
                let current = self.items[self.cursor];
                self.items = vec![current];
                self.cursor = 0;
            }
        }
    }
}

fn apply(history: &mut History<u8>, op: &Op) {
    match *op {
        Op::Push(v) => {
            history.push(v);
        }
        Op::Undo => {
            history.undo();
        }
        Op::Redo => {
            history.redo();
        }
        Op::Clear => history.clear(),
        Op::Reset => history.reset(),
    }
}

fn timeline(history: &History<u8>) -> Vec<u8> {
    history.snapshots().map(|s| *s.data()).collect()
}

// ═════════════════════════════════════════════════════════════════════════
// History Tests
// ═════════════════════════════════════════════════════════════════════════

// 1. Capacity bound

proptest! {
    #[test]
    fn history_never_exceeds_capacity(
        config in config_strategy(),
        ops in ops_strategy(60),
    ) {
        let capacity = config.capacity;
        let mut history = History::with_config(0u8, config);
        for op in &ops {
            apply(&mut history, op);
            if capacity > 0 {
                prop_assert!(
                    history.count() <= capacity,
                    "count {} exceeds capacity {} after {:?}",
                    history.count(), capacity, op
                );
            }
            prop_assert!(history.count() >= 1);
        }
    }
}

// 2-3. Model agreement

proptest! {
    #[test]
    fn history_matches_model(
        config in config_strategy(),
        initial in 0u8..8,
        ops in ops_strategy(60),
    ) {
        let mut model = Model::new(initial, &config);
        let mut history = History::with_config(initial, config);
        for op in &ops {
            model.apply(op);
            apply(&mut history, op);

            prop_assert_eq!(timeline(&history), model.items.clone(), "after {:?}", op);
            prop_assert_eq!(*history.current().data(), model.items[model.cursor]);
            prop_assert_eq!(history.undo_depth(), model.cursor);
            prop_assert_eq!(history.can_undo(), model.cursor > 0);
            prop_assert_eq!(history.can_redo(), model.cursor + 1 < model.items.len());
            prop_assert_eq!(*history.oldest().data(), model.items[0]);
        }
    }
}

// 4. Push leaves no redo branch

proptest! {
    #[test]
    fn push_truncates_redo_branch(
        ops in ops_strategy(40),
        value in 100u8..=255,
    ) {
        let mut history = History::with_config(0u8, HistoryConfig::new(8));
        for op in &ops {
            apply(&mut history, op);
        }
        history.push(value);
        prop_assert!(!history.can_redo());
        prop_assert!(history.next().is_none());
        prop_assert_eq!(*history.current().data(), value);
    }
}

// 5. Clear keeps the cursor

proptest! {
    #[test]
    fn clear_keeps_current(ops in ops_strategy(40)) {
        let mut history = History::with_config(0u8, HistoryConfig::unlimited());
        for op in &ops {
            apply(&mut history, op);
        }
        let current = *history.current().data();
        let depth = history.undo_depth();
        history.clear();
        prop_assert_eq!(*history.current().data(), current);
        prop_assert_eq!(history.undo_depth(), depth);
        prop_assert_eq!(history.redo_depth(), 0);
    }
}

// 6. try_* agree with can_*

proptest! {
    #[test]
    fn try_variants_fail_exactly_at_the_edges(ops in ops_strategy(40)) {
        let mut history = History::with_config(0u8, HistoryConfig::new(5));
        for op in &ops {
            apply(&mut history, op);
            let could_undo = history.can_undo();
            let undone = history.try_undo().map(|v| *v);
            prop_assert_eq!(undone.is_ok(), could_undo);
            if !could_undo {
                prop_assert_eq!(undone, Err(HistoryError::NothingToUndo));
            }
            let could_redo = history.can_redo();
            let redone = history.try_redo().map(|v| *v);
            prop_assert_eq!(redone.is_ok(), could_redo);
            if !could_redo {
                prop_assert_eq!(redone, Err(HistoryError::NothingToRedo));
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// Effect Scope Tests
// ═════════════════════════════════════════════════════════════════════════

/// Build a scope tree: `parents[i]` picks the parent of scope `i + 1` among
/// the scopes created so far (scope 0 is a child of the root scope).
fn build_tree(rt: &Runtime, parents: &[usize]) -> Vec<EffectScope> {
    let mut scopes = vec![rt.create_scope()];
    for &pick in parents {
        let parent = scopes[pick % scopes.len()].clone();
        scopes.push(parent.child());
    }
    scopes
}

// 7-8. Every disposer runs exactly once

proptest! {
    #[test]
    fn scope_tree_disposers_run_once(
        parents in proptest::collection::vec(0usize..16, 0..12),
        order in proptest::collection::vec(0usize..16, 0..16),
    ) {
        let rt = Runtime::new();
        let scopes = build_tree(&rt, &parents);
        let runs = Rc::new(RefCell::new(vec![0u32; scopes.len()]));
        for (i, scope) in scopes.iter().enumerate() {
            let runs = Rc::clone(&runs);
            let _ = scope.add_disposer(move || runs.borrow_mut()[i] += 1);
        }

        for &pick in &order {
            scopes[pick % scopes.len()].dispose();
        }
        rt.root_scope().dispose();
        rt.root_scope().dispose();

        for scope in &scopes {
            prop_assert!(scope.is_disposed());
        }
        prop_assert!(runs.borrow().iter().all(|&n| n == 1), "runs: {:?}", runs.borrow());
    }
}

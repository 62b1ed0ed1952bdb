use crate::error::StoreDiagnostic;
use crate::reactive::{RawState, StateValue};

use super::action::ActionMap;

/// Check a store's raw state and actions for shapes that are accepted but
/// almost certainly mistakes.
pub fn validate_state(store: &str, state: &RawState, actions: &ActionMap) -> Vec<StoreDiagnostic> {
    let mut diagnostics = Vec::new();

    state.with(|value| {
        if matches!(value, StateValue::Pending(_)) {
            diagnostics.push(StoreDiagnostic::PendingState {
                store: store.to_string(),
            });
        }

        let mut fields = Vec::new();
        collect_fields(value, &mut Vec::new(), &mut fields);
        for (path, kind) in fields {
            let field = path.join(".");
            diagnostics.push(match kind {
                FieldKind::Reactive => StoreDiagnostic::ReactiveField {
                    store: store.to_string(),
                    field,
                },
                FieldKind::Function => StoreDiagnostic::FunctionField {
                    store: store.to_string(),
                    field,
                },
            });
        }
    });

    for key in state.keys() {
        if actions.contains(&key) {
            diagnostics.push(StoreDiagnostic::DuplicateKey {
                store: store.to_string(),
                key,
            });
        }
    }

    diagnostics
}

enum FieldKind {
    Reactive,
    Function,
}

fn collect_fields(value: &StateValue, path: &mut Vec<String>, out: &mut Vec<(Vec<String>, FieldKind)>) {
    match value {
        StateValue::Reactive(_) => out.push((path.clone(), FieldKind::Reactive)),
        StateValue::Function(_) => out.push((path.clone(), FieldKind::Function)),
        StateValue::Map(_) | StateValue::List(_) => {
            for key in value.keys() {
                if let Some(child) = value.child(&key) {
                    path.push(key);
                    collect_fields(child, path, out);
                    path.pop();
                }
            }
        }
        _ => {}
    }
}

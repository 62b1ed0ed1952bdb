use tracing::debug;

use crate::error::StoreDiagnostic;
use crate::reactive::{ReactiveState, StateValue};

use super::action::ActionMap;
use super::context::StoreContext;
use super::descriptor::{
    get_final_actions, get_final_deep_selector, get_final_namespace, get_final_persist,
    get_final_state, to_raw, NamespaceOptions, StateDescriptor,
};
use super::hook::StoreHook;
use super::lifecycle::LifeCycle;
use super::middleware::Pipeline;
use super::validate::validate_state;

/// Default store name used by [`create_store`] diagnostics.
pub const DEFAULT_STORE_NAME: &str = "createStore";

/// Create a store from a setup function and the middleware requested in
/// `options`.
///
/// `setup` runs exactly once, wrapped by the requested middleware in their
/// fixed order. In development, shape problems in the returned state are
/// reported on `ctx` but never prevent the store from being created. When
/// the store's namespace enables devtools and the environment allows it,
/// its actions are replaced by instrumented ones.
///
/// # Examples
///
/// ```
/// use tinstore::{create_state, ActionMap, CreateStateOptions, StateDescriptor, StateValue, StoreContext};
///
/// let ctx = StoreContext::default();
/// let store = create_state(
///     &ctx,
///     || StateDescriptor::plain(serde_json::json!({ "count": 0 })),
///     "counter",
///     CreateStateOptions::new().with_actions(|state| {
///         let state = state.clone();
///         ActionMap::new().action("increment", 0, move |_| {
///             state.update("count", |v| *v = StateValue::from(v.as_i64().unwrap_or(0) + 1));
///             Ok(StateValue::Null)
///         })
///     }),
/// );
///
/// store.dispatch("increment", &[]).unwrap();
/// assert_eq!(store.get_state().get("count").and_then(|v| v.as_i64()), Some(1));
/// ```
pub fn create_state<S>(
    ctx: &StoreContext,
    setup: S,
    name: &str,
    options: impl Into<Pipeline>,
) -> StoreHook
where
    S: FnOnce() -> StateDescriptor + 'static,
{
    let descriptor = options.into().compose(Box::new(setup))();

    let raw = to_raw(get_final_state(&descriptor));
    let actions = get_final_actions(&descriptor);
    let namespace = get_final_namespace(&descriptor, name);
    let deep_selector = get_final_deep_selector(&descriptor);
    let persist = get_final_persist(&descriptor);

    let environment = ctx.environment();
    if environment.development {
        for diagnostic in validate_state(name, &raw, &actions) {
            ctx.report(diagnostic);
        }
        if namespace.enable_devtools && !ctx.claim_namespace(&namespace.name) {
            ctx.report(StoreDiagnostic::DuplicateNamespace {
                store: name.to_string(),
                namespace: namespace.name.clone(),
            });
        }
    }

    let reactive = ReactiveState::new(raw.clone());

    let devtools = namespace.enable_devtools && environment.devtools_allowed();
    let actions = if devtools {
        ctx.devtools()
            .connect(&namespace.name, actions, &raw, &reactive)
    } else {
        actions
    };

    debug!(
        store = name,
        namespace = %namespace.name,
        actions = actions.len(),
        devtools,
        deep_selector,
        "store created"
    );

    StoreHook::new(
        reactive,
        LifeCycle::new(),
        deep_selector,
        namespace,
        actions,
        persist,
    )
}

/// Create a store around state that is already reactive.
///
/// No middleware is applied. The store uses `lifecycle` if given, else the
/// context's global store lifecycle, else a fresh one.
pub fn create_store<C>(
    ctx: &StoreContext,
    creator: C,
    name: &str,
    lifecycle: Option<LifeCycle>,
) -> StoreHook
where
    C: FnOnce() -> StateDescriptor,
{
    let descriptor = creator();

    if descriptor.is_decorated() {
        ctx.report(StoreDiagnostic::MiddlewareUnsupported {
            store: name.to_string(),
        });
    }

    let state = get_final_state(&descriptor);
    if !state.with(|value| matches!(value, StateValue::Reactive(_))) {
        ctx.report(StoreDiagnostic::ExpectedReactive {
            store: name.to_string(),
        });
    }

    let lifecycle = lifecycle
        .or_else(|| ctx.global_lifecycle())
        .unwrap_or_default();

    debug!(store = name, "store created without middleware");

    StoreHook::new(
        ReactiveState::new(to_raw(state)),
        lifecycle,
        true,
        NamespaceOptions::fallback(name),
        ActionMap::new(),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::context::Environment;
    use crate::store::middleware::CreateStateOptions;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counter_actions(state: &ReactiveState) -> ActionMap {
        let state = state.clone();
        ActionMap::new().action("increment", 1, move |args| {
            let n = args.first().and_then(StateValue::as_i64).unwrap_or(1);
            state.update("count", |v| *v = (v.as_i64().unwrap_or(0) + n).into());
            Ok(StateValue::Null)
        })
    }

    #[test]
    fn setup_runs_exactly_once() {
        let ctx = StoreContext::new(Environment::development());
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let _store = create_state(
            &ctx,
            move || {
                counter.set(counter.get() + 1);
                StateDescriptor::plain(json!({ "count": 0 }))
            },
            "counter",
            CreateStateOptions::new()
                .with_actions(counter_actions)
                .with_namespace("counter")
                .with_deep_selector(false),
        );
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn options_flow_into_the_hook() {
        let ctx = StoreContext::new(Environment::production());
        let store = create_state(
            &ctx,
            || StateDescriptor::plain(json!({ "count": 0 })),
            "counter",
            CreateStateOptions::new()
                .with_actions(counter_actions)
                .with_deep_selector(false),
        );

        assert!(!store.deep_selector());
        assert_eq!(store.namespace(), &NamespaceOptions::fallback("counter"));
        store.dispatch("increment", &[2.into()]).unwrap();
        assert_eq!(store.get_state().get("count").and_then(|v| v.as_i64()), Some(2));
    }

    #[test]
    fn anomalies_are_reported_but_the_store_still_works() {
        let ctx = StoreContext::new(Environment::development());
        let store = create_state(
            &ctx,
            || {
                StateDescriptor::plain(StateValue::map([
                    ("count", StateValue::from(0)),
                    ("increment", StateValue::from(0)),
                ]))
            },
            "counter",
            CreateStateOptions::new().with_actions(counter_actions),
        );
        assert_eq!(
            ctx.diagnostics(),
            vec![StoreDiagnostic::DuplicateKey {
                store: "counter".into(),
                key: "increment".into()
            }]
        );
        store.dispatch("increment", &[]).unwrap();
        assert_eq!(store.get_state().get("count").and_then(|v| v.as_i64()), Some(1));
    }

    #[test]
    fn reused_namespace_is_reported() {
        let ctx = StoreContext::new(Environment::development());
        let make = || {
            create_state(
                &ctx,
                || StateDescriptor::plain(json!({})),
                "store",
                CreateStateOptions::new().with_namespace("shared"),
            )
        };
        let _first = make();
        assert!(ctx.diagnostics().is_empty());
        let _second = make();
        assert_eq!(
            ctx.diagnostics(),
            vec![StoreDiagnostic::DuplicateNamespace {
                store: "store".into(),
                namespace: "shared".into()
            }]
        );
    }

    #[test]
    fn reactive_root_is_not_double_wrapped() {
        let ctx = StoreContext::new(Environment::development());
        let inner = ReactiveState::from_value(json!({ "count": 4 }));
        let source = inner.clone();
        let store = create_state(
            &ctx,
            move || StateDescriptor::reactive(source),
            "wrapped",
            CreateStateOptions::new(),
        );
        assert!(ctx.diagnostics().is_empty());
        assert!(store.get_state().ptr_eq(&inner.raw()));
    }

    #[test]
    fn create_store_expects_reactive_state_and_no_middleware() {
        let ctx = StoreContext::new(Environment::development());
        let _plain = create_store(&ctx, || StateDescriptor::plain(json!({})), "plain", None);
        let _decorated = create_store(
            &ctx,
            || {
                let reactive = ReactiveState::from_value(json!({}));
                let mut decorated = StateDescriptor::reactive(reactive).into_decorated();
                decorated.deep_selector = Some(false);
                decorated.into()
            },
            "decorated",
            None,
        );

        assert_eq!(
            ctx.diagnostics(),
            vec![
                StoreDiagnostic::ExpectedReactive {
                    store: "plain".into()
                },
                StoreDiagnostic::MiddlewareUnsupported {
                    store: "decorated".into()
                },
            ]
        );
    }

    #[test]
    fn create_store_prefers_explicit_then_global_lifecycle() {
        let ctx = StoreContext::new(Environment::production());
        let global = LifeCycle::new();
        ctx.set_global_lifecycle(Some(global.clone()));
        let reactive = || StateDescriptor::reactive(ReactiveState::from_value(json!({})));

        let uses_global = create_store(&ctx, reactive, DEFAULT_STORE_NAME, None);
        assert!(uses_global.get_life_cycle().ptr_eq(&global));

        let own = LifeCycle::new();
        let uses_own = create_store(&ctx, reactive, DEFAULT_STORE_NAME, Some(own.clone()));
        assert!(uses_own.get_life_cycle().ptr_eq(&own));

        ctx.set_global_lifecycle(None);
        let fresh = create_store(&ctx, reactive, DEFAULT_STORE_NAME, None);
        assert!(!fresh.get_life_cycle().ptr_eq(&global));
    }
}

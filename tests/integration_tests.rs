//! Integration tests for Tinstore

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::executor::LocalPool;
use futures::task::LocalSpawnExt;
use serde_json::{json, Value};
use tinstore::{
    Action, ActionError, ActionMap, ActionMeta, ActionResult, CreateStateOptions, DevToolsConnection,
    DevToolsError, DevToolsTransport, Environment, MemoryStorage, MemoryTransport, PersistOptions,
    PersistStorage, ReactiveState, StateDescriptor, StateValue, StoreContext, StoreDiagnostic,
    StoreHook,
};

fn dev_context() -> (StoreContext, MemoryTransport) {
    let transport = MemoryTransport::new();
    let ctx = StoreContext::builder()
        .environment(Environment::development())
        .transport(transport.clone())
        .build();
    (ctx, transport)
}

fn count_of(store: &StoreHook) -> i64 {
    store
        .get_state()
        .get("count")
        .and_then(|v| v.as_i64())
        .unwrap_or(0)
}

fn increment_actions(state: &ReactiveState) -> ActionMap {
    let state = state.clone();
    ActionMap::new().action("increment", 1, move |args| {
        let n = args.first().and_then(StateValue::as_i64).unwrap_or(1);
        state.update("count", |v| *v = StateValue::from(v.as_i64().unwrap_or(0) + n));
        Ok(StateValue::Null)
    })
}

fn counter_store(ctx: &StoreContext, name: &str) -> StoreHook {
    ctx.create_state(
        || StateDescriptor::plain(json!({ "count": 0 })),
        name,
        CreateStateOptions::new()
            .with_namespace(name)
            .with_actions(increment_actions),
    )
}

/// Async actions that wait for a signal before applying their change.
struct Gated {
    senders: VecDeque<oneshot::Sender<()>>,
    receivers: Rc<RefCell<VecDeque<oneshot::Receiver<()>>>>,
}

impl Gated {
    fn new(calls: usize) -> Self {
        let mut senders = VecDeque::new();
        let mut receivers = VecDeque::new();
        for _ in 0..calls {
            let (tx, rx) = oneshot::channel();
            senders.push_back(tx);
            receivers.push_back(rx);
        }
        Self {
            senders,
            receivers: Rc::new(RefCell::new(receivers)),
        }
    }

    fn release(&mut self) {
        if let Some(tx) = self.senders.pop_front() {
            tx.send(()).unwrap();
        }
    }

    /// `load(n)` sets `count` to `n` once released; `n < 0` rejects instead.
    fn actions(&self) -> impl FnOnce(&ReactiveState) -> ActionMap + 'static {
        let receivers = self.receivers.clone();
        move |state: &ReactiveState| {
            let state = state.clone();
            ActionMap::new().async_action("load", 1, move |args| {
                let n = args.first().and_then(StateValue::as_i64).unwrap_or(0);
                let wait = receivers.borrow_mut().pop_front();
                let state = state.clone();
                async move {
                    if let Some(wait) = wait {
                        let _ = wait.await;
                    }
                    if n < 0 {
                        return Err(ActionError::failed("negative"));
                    }
                    state.set("count", n);
                    Ok(StateValue::Null)
                }
            })
        }
    }
}

fn spawn_dispatch(
    pool: &LocalPool,
    store: &StoreHook,
    action: &str,
    args: &[StateValue],
) -> Rc<RefCell<Option<ActionResult>>> {
    let returned = store.dispatch(action, args).unwrap();
    assert!(returned.is_pending());
    let slot = Rc::new(RefCell::new(None));
    let out = slot.clone();
    pool.spawner()
        .spawn_local(async move {
            *out.borrow_mut() = Some(returned.settle().await);
        })
        .unwrap();
    slot
}

#[test]
fn sync_action_reports_once_with_post_call_snapshot() {
    let (ctx, transport) = dev_context();
    let store = counter_store(&ctx, "counter");

    store.dispatch("increment", &[3.into()]).unwrap();

    let events = transport.events();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].action,
        ActionMeta::sync_action("counter", "increment", vec![json!(3)])
    );
    assert_eq!(events[0].state["counter"]["count"], json!(3));
    assert_eq!(count_of(&store), 3);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn snapshot_contains_every_connected_store() {
    let (ctx, transport) = dev_context();
    let a = counter_store(&ctx, "a");
    let _b = counter_store(&ctx, "b");

    a.dispatch("increment", &[]).unwrap();

    let event = transport.last_event().unwrap();
    assert_eq!(event.action.kind, "syncAction-a/increment");
    assert_eq!(event.state, json!({ "a": { "count": 1 }, "b": { "count": 0 } }));
    assert_eq!(ctx.devtools().registry().names(), vec!["a", "b"]);
}

#[test]
fn direct_mutation_is_reported_passively() {
    let (ctx, transport) = dev_context();
    let store = counter_store(&ctx, "counter");
    store.get_life_cycle().set_sync_update_component(true);

    let renders = Rc::new(Cell::new(0));
    let _sub = store.subscribe(
        |state| state.get("count").and_then(|v| v.as_i64()),
        {
            let renders = renders.clone();
            move |_| renders.set(renders.get() + 1)
        },
    );

    store.update_state_without_reactive_update(|state| state.set("count", 5));

    assert_eq!(transport.event_kinds(), vec!["subscribeAction-counter"]);
    assert_eq!(
        transport.last_event().map(|e| e.state),
        Some(json!({ "counter": { "count": 5 } }))
    );
    assert_eq!(renders.get(), 0);
    assert!(store.get_life_cycle().can_update_component());
}

#[test]
fn writes_that_create_keys_are_reported() {
    let (ctx, transport) = dev_context();
    let store = counter_store(&ctx, "c");

    store.get_final_state().set_path(&["profile", "name"], "x");
    assert_eq!(transport.event_kinds(), vec!["subscribeAction-c"]);
    assert_eq!(
        transport.last_event().map(|e| e.state),
        Some(json!({ "c": { "count": 0, "profile": { "name": "x" } } }))
    );

    transport.clear();
    store.get_final_state().set("theme", "dark");
    store.get_final_state().set_path(&["profile", "name"], "y");
    assert_eq!(
        transport.event_kinds(),
        vec!["subscribeAction-c", "subscribeAction-c"]
    );
}

#[test]
fn shallow_state_subscribers_see_new_keys() {
    let ctx = StoreContext::new(Environment::production());
    let store = ctx.create_state(
        || StateDescriptor::plain(json!({ "count": 0 })),
        "shallow",
        CreateStateOptions::new().with_deep_selector(false),
    );
    store.get_life_cycle().set_sync_update_component(true);

    let hits = Rc::new(Cell::new(0));
    let _sub = store.subscribe_state({
        let hits = hits.clone();
        move |_| hits.set(hits.get() + 1)
    });

    store.get_final_state().set_path(&["profile", "name"], "x");
    assert_eq!(hits.get(), 1);

    store.get_final_state().set("theme", "dark");
    assert_eq!(hits.get(), 2);
}

#[test]
fn removing_a_list_item_updates_selectors_of_later_items() {
    let ctx = StoreContext::new(Environment::production());
    let store = ctx.create_state(
        || StateDescriptor::plain(json!({ "list": [1, 2, 3] })),
        "list",
        CreateStateOptions::new(),
    );
    store.get_life_cycle().set_sync_update_component(true);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sub = store.subscribe(
        |state| state.get_path(&["list", "1"]).and_then(|v| v.as_i64()),
        {
            let seen = seen.clone();
            move |value: &Option<i64>| seen.borrow_mut().push(*value)
        },
    );

    store.get_final_state().remove_path(&["list", "0"]);

    assert_eq!(*seen.borrow(), vec![Some(3)]);
    assert_eq!(sub.value(), Some(Some(3)));
}

#[test]
fn async_action_reports_only_after_settling() {
    let (ctx, transport) = dev_context();
    let mut gated = Gated::new(1);
    let store = ctx.create_state(
        || StateDescriptor::plain(json!({ "count": 0 })),
        "counter",
        CreateStateOptions::new()
            .with_namespace("counter")
            .with_actions(gated.actions()),
    );

    let mut pool = LocalPool::new();
    let result = spawn_dispatch(&pool, &store, "load", &[7.into()]);
    pool.run_until_stalled();
    assert!(transport.events().is_empty());
    assert!(result.borrow().is_none());

    gated.release();
    pool.run_until_stalled();

    assert_eq!(transport.event_kinds(), vec!["asyncAction-counter/load"]);
    assert_eq!(
        transport.last_event().map(|e| e.state),
        Some(json!({ "counter": { "count": 7 } }))
    );
    assert_eq!(*result.borrow(), Some(Ok(StateValue::Null)));
}

#[test]
fn rejected_async_action_is_still_reported() {
    let (ctx, transport) = dev_context();
    let mut gated = Gated::new(1);
    let store = ctx.create_state(
        || StateDescriptor::plain(json!({ "count": 0 })),
        "counter",
        CreateStateOptions::new()
            .with_namespace("counter")
            .with_actions(gated.actions()),
    );

    let mut pool = LocalPool::new();
    let result = spawn_dispatch(&pool, &store, "load", &[(-1).into()]);
    gated.release();
    pool.run_until_stalled();

    assert_eq!(*result.borrow(), Some(Err(ActionError::failed("negative"))));
    assert_eq!(transport.event_kinds(), vec!["asyncAction-counter/load"]);

    // The store is no longer busy: changes are reported passively again.
    store.get_final_state().set("count", 1);
    assert_eq!(
        transport.event_kinds(),
        vec!["asyncAction-counter/load", "subscribeAction-counter"]
    );
}

#[test]
fn overlapping_async_actions_each_report_once() {
    let (ctx, transport) = dev_context();
    let mut gated = Gated::new(2);
    let store = ctx.create_state(
        || StateDescriptor::plain(json!({ "count": 0 })),
        "counter",
        CreateStateOptions::new()
            .with_namespace("counter")
            .with_actions(gated.actions()),
    );

    let mut pool = LocalPool::new();
    let first = spawn_dispatch(&pool, &store, "load", &[1.into()]);
    let second = spawn_dispatch(&pool, &store, "load", &[2.into()]);
    pool.run_until_stalled();

    gated.release();
    pool.run_until_stalled();
    assert!(first.borrow().is_some());
    assert!(second.borrow().is_none());
    assert_eq!(transport.event_kinds(), vec!["asyncAction-counter/load"]);

    gated.release();
    pool.run_until_stalled();
    assert!(second.borrow().is_some());
    assert_eq!(
        transport.event_kinds(),
        vec!["asyncAction-counter/load", "asyncAction-counter/load"]
    );
    assert_eq!(count_of(&store), 2);
}

#[test]
fn nested_actions_report_inner_first() {
    let (ctx, transport) = dev_context();
    let handle: Rc<RefCell<Option<StoreHook>>> = Rc::new(RefCell::new(None));

    let outer = handle.clone();
    let store = ctx.create_state(
        || StateDescriptor::plain(json!({ "count": 0 })),
        "counter",
        CreateStateOptions::new()
            .with_namespace("counter")
            .with_actions(move |state| {
                increment_actions(state).action("bump_twice", 0, move |_| {
                    if let Some(store) = outer.borrow().as_ref() {
                        store.dispatch("increment", &[])?;
                        store.dispatch("increment", &[])?;
                    }
                    Ok(StateValue::Null)
                })
            }),
    );
    *handle.borrow_mut() = Some(store.clone());

    store.dispatch("bump_twice", &[]).unwrap();

    assert_eq!(
        transport.event_kinds(),
        vec![
            "syncAction-counter/increment",
            "syncAction-counter/increment",
            "syncAction-counter/bump_twice",
        ]
    );
    assert_eq!(count_of(&store), 2);

    // Break the store -> action -> store cycle.
    handle.borrow_mut().take();
}

#[test]
fn reconnecting_a_namespace_stops_the_old_controller() {
    let (ctx, transport) = dev_context();
    let first = counter_store(&ctx, "counter");
    let first_controller = ctx.devtools().registry().controller("counter").unwrap();

    let second = counter_store(&ctx, "counter");

    assert!(!first_controller.is_active());
    assert_eq!(ctx.devtools().registry().live_controllers().len(), 1);
    assert_eq!(
        ctx.diagnostics(),
        vec![StoreDiagnostic::DuplicateNamespace {
            store: "counter".into(),
            namespace: "counter".into()
        }]
    );

    transport.clear();
    first.get_final_state().set("count", 9);
    assert!(transport.events().is_empty());

    second.get_final_state().set("count", 1);
    assert_eq!(transport.event_kinds(), vec!["subscribeAction-counter"]);
}

#[test]
fn without_transport_actions_pass_through() {
    let ctx = StoreContext::new(Environment::development());
    let store = counter_store(&ctx, "counter");

    store.dispatch("increment", &[2.into()]).unwrap();
    assert_eq!(count_of(&store), 2);
    assert!(!ctx.devtools().is_enabled());
    assert!(ctx.devtools().registry().is_empty());
}

struct BrokenConnection;

impl DevToolsConnection for BrokenConnection {
    fn init(&self, _state: &Value) -> Result<(), DevToolsError> {
        Err(DevToolsError::Send("init rejected".into()))
    }

    fn send(&self, _action: &ActionMeta, _state: &Value) -> Result<(), DevToolsError> {
        Err(DevToolsError::Send("payload rejected".into()))
    }
}

struct BrokenTransport {
    refuse_connect: bool,
}

impl DevToolsTransport for BrokenTransport {
    fn connect(&self, _name: &str) -> Result<Rc<dyn DevToolsConnection>, DevToolsError> {
        if self.refuse_connect {
            return Err(DevToolsError::Connect("unavailable".into()));
        }
        Ok(Rc::new(BrokenConnection))
    }
}

#[test]
fn transport_failures_never_reach_the_caller() {
    for refuse_connect in [false, true] {
        let ctx = StoreContext::builder()
            .environment(Environment::development())
            .transport(BrokenTransport { refuse_connect })
            .build();
        let store = counter_store(&ctx, "counter");

        let result = store.dispatch("increment", &[]).unwrap().ready();
        assert_eq!(result, Some(Ok(StateValue::Null)));
        store.get_final_state().set("count", 10);
        assert_eq!(count_of(&store), 10);
        assert_eq!(
            ctx.devtools().registry().contains("counter"),
            !refuse_connect
        );
    }
}

#[test]
fn anonymous_actions_use_the_fallback_label() {
    let (ctx, transport) = dev_context();
    let store = ctx.create_state(
        || StateDescriptor::plain(json!({ "count": 0 })),
        "counter",
        CreateStateOptions::new()
            .with_namespace("counter")
            .with_actions(|_| ActionMap::new().with("reset", Action::sync(0, |_| Ok(StateValue::Null)))),
    );

    store.dispatch("reset", &[]).unwrap();
    assert_eq!(transport.event_kinds(), vec!["syncAction-counter/anonymous"]);
}

#[test]
fn unserializable_fields_are_dropped_from_snapshots() {
    let (ctx, transport) = dev_context();
    let store = ctx.create_state(
        || {
            StateDescriptor::plain(StateValue::map([
                ("count", StateValue::from(0)),
                ("callback", StateValue::function(|_| StateValue::Null)),
                ("ratio", StateValue::Float(f64::NAN)),
            ]))
        },
        "counter",
        CreateStateOptions::new()
            .with_namespace("counter")
            .with_actions(increment_actions),
    );

    store.dispatch("increment", &[]).unwrap();

    assert_eq!(
        transport.last_event().map(|e| e.state),
        Some(json!({ "counter": { "count": 1, "ratio": null } }))
    );
    assert_eq!(
        ctx.diagnostics(),
        vec![StoreDiagnostic::FunctionField {
            store: "counter".into(),
            field: "callback".into()
        }]
    );
}

#[test]
fn production_and_server_skip_devtools() {
    for environment in [Environment::production(), Environment::server()] {
        let transport = MemoryTransport::new();
        let ctx = StoreContext::builder()
            .environment(environment)
            .transport(transport.clone())
            .build();
        let store = ctx.create_state(
            || StateDescriptor::plain(json!({ "count": 0, "increment": 0 })),
            "counter",
            CreateStateOptions::new()
                .with_namespace("counter")
                .with_actions(increment_actions),
        );
        store.dispatch("increment", &[]).unwrap();

        assert!(transport.connections().is_empty());
        assert!(transport.events().is_empty());
        // Diagnostics follow the development flag only.
        assert_eq!(ctx.diagnostics().len(), usize::from(environment.development));
    }
}

#[test]
fn gate_restores_its_previous_value() {
    let (ctx, _transport) = dev_context();
    let store = counter_store(&ctx, "counter");
    let lifecycle = store.get_life_cycle();

    for writes in [0, 1, 5] {
        store.update_state_without_reactive_update(|state| {
            for i in 0..writes {
                state.set("count", i);
            }
        });
        assert!(lifecycle.can_update_component());
    }

    lifecycle.set_can_update_component(false);
    store.update_state_without_reactive_update(|state| state.set("count", 1));
    assert!(!lifecycle.can_update_component());
}

#[test]
fn persisted_state_survives_recreation() {
    let storage = MemoryStorage::new();
    let ctx = StoreContext::new(Environment::development());
    let make = |storage: &MemoryStorage| {
        ctx.create_state(
            || StateDescriptor::plain(json!({ "count": 0, "theme": "light" })),
            "prefs",
            CreateStateOptions::new()
                .with_persist(PersistOptions::new("prefs", storage.clone()))
                .with_actions(increment_actions),
        )
    };

    let first = make(&storage);
    first.dispatch("increment", &[4.into()]).unwrap();
    assert!(storage.get_item("prefs").unwrap().is_some());
    drop(first);

    let second = make(&storage);
    assert_eq!(count_of(&second), 4);
    assert_eq!(second.get_state().snapshot()["theme"], json!("light"));
}

#[test]
fn create_store_shares_the_global_lifecycle() {
    let ctx = StoreContext::new(Environment::development());
    let global = tinstore::LifeCycle::new();
    global.set_sync_update_component(true);
    ctx.set_global_lifecycle(Some(global.clone()));

    let state = ReactiveState::from_value(json!({ "count": 0 }));
    let source = state.clone();
    let store = ctx.create_store(move || StateDescriptor::reactive(source), "plain", None);
    assert!(store.get_life_cycle().ptr_eq(&global));
    assert!(ctx.diagnostics().is_empty());

    let seen = Rc::new(Cell::new(0));
    let _sub = store.subscribe(
        |state| state.get("count").and_then(|v| v.as_i64()).unwrap_or(0),
        {
            let seen = seen.clone();
            move |count| seen.set(*count)
        },
    );
    state.set("count", 3);
    assert_eq!(seen.get(), 3);
}

//! Fine-grained reactive state.
//!
//! This module provides the building blocks stores are made of:
//! - [`StateValue`]: dynamic state data, JSON-shaped
//! - [`RawState`] / [`ReactiveState`]: the untracked object and its tracked view
//! - [`Controller`]: a tracked computation with an explicit update hook
//! - [`Effect`]: a computation that re-runs when its dependencies change

mod controller;
mod effect;
mod state;
mod value;

pub use controller::{Controller, WeakController};
pub use effect::Effect;
pub use state::{RawState, ReactiveState};
pub use value::{PendingValue, StateFn, StateValue};

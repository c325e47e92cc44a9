//! Host runtime for loading and executing Lua scripts in driftwood
//!
//! One interpreter serves the whole process. Every access to it goes through
//! the [`Runner`], which executes tasks one at a time on a dedicated thread.
//! Scripts reach the platform through bindings exposed as the `driftwood`
//! module.

pub mod bindings;
pub mod dispatcher;
pub mod loader;
pub mod manager;
pub mod marshal;
pub mod platform;
pub mod ready;
pub mod registry;
pub mod runner;
pub mod state;

pub use bindings::{Binding, DispatchError};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use loader::discover_scripts;
pub use manager::{LoadSummary, ManagerError, ScriptManager};
pub use marshal::{InteractionEvent, MarshalError, ScriptValue};
pub use platform::{
    interaction_from_serenity, ChannelInfo, InteractionHandle, MessageRef, PlatformError,
    PlatformSession, SerenitySession,
};
pub use ready::ReadyRegistrar;
pub use registry::{BindingGroup, BindingRegistry, DEFAULT_GROUP, MODULE_NAME};
pub use runner::{Runner, RunnerError};
pub use state::StateStore;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mlua::Table;
use tokio::runtime::Handle;
use tracing::{debug, error, info};

use crate::bindings::{
    AddMessageBinding, AddReactionBinding, Binding, ButtonBinding, CancelTimerBinding,
    ChannelBinding, ClearStateBinding, CommandBinding, ComponentBinding, DeleteMessageBinding,
    DispatchError, EditMessageBinding, GetStateBinding, OptionBinding, RemoveReactionBinding,
    RunAfterBinding, SelectMenuBinding, SelectMenuOptionBinding, SetStateBinding, TimerScheduler,
};
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::loader::{discover_scripts, package_path_entries};
use crate::marshal::InteractionEvent;
use crate::platform::PlatformSession;
use crate::ready::ReadyRegistrar;
use crate::registry::{BindingGroup, BindingRegistry, DEFAULT_GROUP};
use crate::runner::{Runner, RunnerError};
use crate::state::StateStore;

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("failed to read script directory {}: {source}", path.display())]
    ScriptDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install the driftwood module: {0}")]
    Install(String),

    #[error("script {name} failed: {message}")]
    Script { name: String, message: String },
}

/// Outcome of loading a script directory
#[derive(Debug, Default)]
pub struct LoadSummary {
    pub loaded: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Owns the scripting host: bindings, state and the scripts themselves.
///
/// All interpreter work goes through the runner. Methods block the calling
/// thread until that work is done, so async callers should use
/// `spawn_blocking`.
pub struct ScriptManager {
    runner: Runner,
    registry: BindingRegistry,
    dispatcher: Dispatcher,
    ready: ReadyRegistrar,
    state: StateStore,
    commands: Arc<CommandBinding>,
    timers: TimerScheduler,
}

impl ScriptManager {
    /// Create a manager on the process-wide runner
    pub fn new(runtime: Handle) -> Result<Self, ManagerError> {
        let runner = Runner::global()?.clone();
        Self::with_runner(runner, runtime)
    }

    /// Create a manager on a specific runner
    pub fn with_runner(runner: Runner, runtime: Handle) -> Result<Self, ManagerError> {
        let state = StateStore::new();
        let ready = ReadyRegistrar::new();
        let timers = TimerScheduler::new(runner.clone(), runtime);
        let commands = Arc::new(CommandBinding::new(runner.clone()));

        let registry = BindingRegistry::new(vec![
            BindingGroup::new(
                DEFAULT_GROUP,
                vec![
                    commands.clone(),
                    Arc::new(ComponentBinding::new(runner.clone())),
                    Arc::new(ButtonBinding),
                    Arc::new(SelectMenuBinding),
                    Arc::new(SelectMenuOptionBinding),
                    Arc::new(ChannelBinding::new()),
                ],
            ),
            BindingGroup::new(
                "timer",
                vec![
                    Arc::new(RunAfterBinding::new(timers.clone())),
                    Arc::new(CancelTimerBinding::new(timers.clone())),
                ],
            ),
            BindingGroup::new(
                "state",
                vec![
                    Arc::new(GetStateBinding::new(state.clone())),
                    Arc::new(SetStateBinding::new(state.clone())),
                    Arc::new(ClearStateBinding::new(state.clone())),
                ],
            ),
            BindingGroup::new(
                "message",
                vec![
                    Arc::new(AddMessageBinding::new()),
                    Arc::new(EditMessageBinding::new()),
                    Arc::new(DeleteMessageBinding::new()),
                ],
            ),
            BindingGroup::new(
                "reaction",
                vec![
                    Arc::new(AddReactionBinding::new()),
                    Arc::new(RemoveReactionBinding::new()),
                ],
            ),
            BindingGroup::new(
                "option",
                OptionBinding::all()
                    .into_iter()
                    .map(|b| Arc::new(b) as Arc<dyn Binding>)
                    .collect(),
            ),
        ]);

        {
            let registry = registry.clone();
            let ready = ready.clone();
            runner
                .call(move |lua| registry.install(lua, &ready).map_err(|e| e.to_string()))?
                .map_err(ManagerError::Install)?;
        }
        debug!(target: "scripting", "Installed bindings into the interpreter");

        Ok(Self {
            dispatcher: Dispatcher::new(registry.clone()),
            runner,
            registry,
            ready,
            state,
            commands,
            timers,
        })
    }

    /// Execute every script found under `root`.
    ///
    /// A script that fails is logged and recorded; the rest still load.
    pub fn load_scripts(&self, root: &Path) -> Result<LoadSummary, ManagerError> {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        info!(target: "scripting", "Loading scripts from {}", root.display());

        let scripts = discover_scripts(&root).map_err(|source| ManagerError::ScriptDir {
            path: root.clone(),
            source,
        })?;

        let entries = package_path_entries(&root);
        self.runner
            .call(move |lua| {
                let extend = || -> mlua::Result<()> {
                    let package: Table = lua.globals().get("package")?;
                    let path: String = package.get("path")?;
                    package.set("path", format!("{};{}", path, entries))
                };
                extend().map_err(|e| e.to_string())
            })?
            .map_err(ManagerError::Install)?;

        let mut summary = LoadSummary::default();
        for script in scripts {
            let name = script.display().to_string();
            let result = fs::read_to_string(&script)
                .map_err(|e| ManagerError::Script {
                    name: name.clone(),
                    message: e.to_string(),
                })
                .and_then(|source| self.load_source(&name, source));

            match result {
                Ok(()) => summary.loaded.push(script),
                Err(e) => {
                    error!(target: "scripting", "Failed to load {}: {}", name, e);
                    summary.failed.push((script, e.to_string()));
                }
            }
        }

        info!(
            target: "scripting",
            "Loaded {} script(s), {} failed",
            summary.loaded.len(),
            summary.failed.len()
        );
        Ok(summary)
    }

    /// Execute one chunk of script source
    pub fn load_source(&self, name: &str, source: impl Into<String>) -> Result<(), ManagerError> {
        let chunk_name = name.to_string();
        let source = source.into();
        debug!(target: "scripting", "Executing {}", name);

        self.runner
            .call(move |lua| {
                lua.load(source.as_str())
                    .set_name(chunk_name)
                    .exec()
                    .map_err(|e| e.to_string())
            })?
            .map_err(|message| ManagerError::Script {
                name: name.to_string(),
                message,
            })
    }

    /// Hand the connected session to every binding, then run ready callbacks.
    ///
    /// Returns the number of callbacks run. Deferred command registrations
    /// are replayed before any callback starts.
    pub fn handle_ready(&self, session: Arc<dyn PlatformSession>) -> Result<usize, ManagerError> {
        let registry = self.registry.clone();
        self.runner.run(move |_| {
            for binding in registry.bindings() {
                binding.set_session(Arc::clone(&session));
            }
        })?;

        let fired = self.ready.fire(&self.runner)?;
        // Wait for the callbacks queued above
        self.runner.run(|_| {})?;
        Ok(fired)
    }

    /// Route an inbound interaction to the binding that handles it
    pub fn dispatch(&self, event: &InteractionEvent) -> Result<DispatchOutcome, DispatchError> {
        self.dispatcher.dispatch(event)
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn commands(&self) -> &CommandBinding {
        &self.commands
    }

    pub fn timers(&self) -> &TimerScheduler {
        &self.timers
    }
}

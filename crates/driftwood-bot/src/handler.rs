use std::sync::Arc;

use driftwood_scripting_host::{
    interaction_from_serenity, DispatchOutcome, ScriptManager, SerenitySession,
};
use serenity::all::Interaction;
use serenity::client::Context;
use serenity::model::gateway::Ready;
use serenity::prelude::EventHandler;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

/// Forwards gateway events to the script manager
pub struct Handler {
    manager: Option<Arc<ScriptManager>>,
    guild_id: Option<u64>,
}

impl Handler {
    pub fn new(manager: Option<Arc<ScriptManager>>, guild_id: Option<u64>) -> Self {
        Self { manager, guild_id }
    }
}

#[serenity::async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Discord bot logged in as: {}", ready.user.name);
        ctx.http.set_application_id(ready.application.id);

        let Some(manager) = self.manager.clone() else {
            return;
        };

        let session = Arc::new(SerenitySession::new(
            ctx.http.clone(),
            self.guild_id,
            Handle::current(),
        ));

        // Ready callbacks may block on platform calls
        let result = tokio::task::spawn_blocking(move || manager.handle_ready(session)).await;
        match result {
            Ok(Ok(count)) => info!("Scripts notified of readiness ({} callback(s))", count),
            Ok(Err(e)) => error!("Failed to notify scripts of readiness: {}", e),
            Err(e) => error!("Readiness task failed: {}", e),
        }
    }

    async fn interaction_create(&self, _ctx: Context, interaction: Interaction) {
        let Some(manager) = self.manager.clone() else {
            return;
        };
        let Some(event) = interaction_from_serenity(&interaction) else {
            debug!("Ignoring unsupported interaction {}", interaction.id());
            return;
        };

        info!(
            "Received {} interaction {} from user {}",
            event.kind.as_str(),
            event.id,
            event.user.id
        );

        let result = tokio::task::spawn_blocking(move || manager.dispatch(&event)).await;
        match result {
            Ok(Ok(DispatchOutcome::Handled { binding })) => {
                debug!("Interaction handled by {}", binding)
            }
            Ok(Ok(DispatchOutcome::Unhandled)) => warn!("Interaction was not handled"),
            Ok(Err(e)) => warn!("Failed to dispatch interaction: {}", e),
            Err(e) => error!("Dispatch task failed: {}", e),
        }
    }
}

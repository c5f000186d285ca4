use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use emberbot_core::Database;
use emberbot_core::auth::{CredentialManager, TokenRefresher};
use emberbot_core::models::IdentityRole;
use emberbot_core::overlay::{self, OverlayBroadcaster};
use emberbot_core::platforms::twitch::{
    HelixChatApi, HelixUserDirectory, TwitchAuthenticator, TwitchHelixClient, UserDirectory,
};
use emberbot_core::platforms::twitch_eventsub::EventSubRuntime;
use emberbot_core::repositories::{
    CollectionRepository, PostgresCollectionRepository, PostgresStatsRepository,
    PostgresTokenRepository, StatsRepository, TokenRepository,
};
use emberbot_core::services::message_sender::{MessageSender, OutboundChat};
use emberbot_core::services::twitch::builtin_commands::{
    CompletedSeriesCommand, LeaderboardCommand, ModifyStatCommand, SeriesRedeemCommand,
    SeriesResetCommand, SeriesShowCommand, StatsCommand,
};
use emberbot_core::services::twitch::builtin_redeems::{
    DiceRedemption, PotionRedemption, SeriesRedemption,
};
use emberbot_core::services::twitch::builtin_triggers::VocabularyTrigger;
use emberbot_core::services::twitch::dispatcher::{
    BotContext, ChatCommand, ChatTrigger, Dispatcher, RewardRedemption, SharedRng,
};
use emberbot_core::services::twitch::series::default_series;

mod config;
use config::Config;

/// How long in-flight behavior tasks get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser, Debug, Clone)]
#[command(name = "emberbot")]
#[command(author, version, about = "Single-channel Twitch chat bot with an overlay feed")]
struct Args {
    /// Postgres connection URL.
    #[arg(long, default_value = "postgres://ember@localhost:5432/emberbot")]
    db_url: String,

    /// Port for the overlay SSE server.
    #[arg(long, default_value_t = 8081)]
    overlay_port: u16,

    /// EventSub websocket URL (point at the Twitch CLI mock for local runs).
    #[arg(long, default_value = "wss://eventsub.wss.twitch.tv/ws")]
    eventsub_url: String,
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("emberbot=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub).expect("Failed to set global subscriber");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();
    let cfg = Config::from_env()?;

    let db = Database::new(&args.db_url).await?;
    db.migrate().await?;

    // Both identities share the OAuth client; a failed initial refresh for
    // either one aborts startup.
    let token_repo: Arc<dyn TokenRepository> =
        Arc::new(PostgresTokenRepository::new(db.pool().clone()));
    let refresher: Arc<dyn TokenRefresher> = Arc::new(TwitchAuthenticator::new(
        cfg.client_id.clone(),
        cfg.client_secret.clone(),
    ));
    let owner = CredentialManager::bootstrap(
        IdentityRole::Owner,
        refresher.clone(),
        token_repo.clone(),
        cfg.owner_tokens.clone(),
    )
    .await?;
    let bot = CredentialManager::bootstrap(
        IdentityRole::Bot,
        refresher,
        token_repo,
        cfg.bot_tokens.clone(),
    )
    .await?;

    let helix = TwitchHelixClient::new(&cfg.client_id);
    let chat: Arc<dyn OutboundChat> = Arc::new(MessageSender::new(
        Arc::new(HelixChatApi::new(helix.clone())),
        bot,
        cfg.bot_user_id.clone(),
        cfg.channel_user_id.clone(),
    ));
    let directory: Arc<dyn UserDirectory> =
        Arc::new(HelixUserDirectory::new(helix, owner.clone()));

    let stats: Arc<dyn StatsRepository> =
        Arc::new(PostgresStatsRepository::new(db.pool().clone()));
    let collections: Arc<dyn CollectionRepository> =
        Arc::new(PostgresCollectionRepository::new(db.pool().clone()));
    let broadcaster = Arc::new(OverlayBroadcaster::new());

    let ctx = Arc::new(BotContext {
        chat,
        stats,
        collections,
        overlay: broadcaster.clone(),
        directory,
        rng: SharedRng::from_os(),
        bot_user_id: cfg.bot_user_id.clone(),
    });

    let series = default_series();

    let mut commands: Vec<Arc<dyn ChatCommand>> = vec![
        Arc::new(StatsCommand),
        Arc::new(LeaderboardCommand),
        Arc::new(ModifyStatCommand),
        Arc::new(CompletedSeriesCommand),
    ];
    for s in &series {
        commands.push(Arc::new(SeriesRedeemCommand::new(s.clone())));
        commands.push(Arc::new(SeriesResetCommand::new(s.clone())));
        commands.push(Arc::new(SeriesShowCommand::new(s.clone())));
    }

    let triggers: Vec<Arc<dyn ChatTrigger>> = vec![Arc::new(VocabularyTrigger::new(
        &["come", "coming", "cum", "came"],
        20,
        "no coming",
    ))];

    let mut redemptions: Vec<Arc<dyn RewardRedemption>> =
        vec![Arc::new(PotionRedemption), Arc::new(DiceRedemption)];
    for s in &series {
        redemptions.push(Arc::new(SeriesRedemption::new(s.clone())));
    }

    let dispatcher = Arc::new(Dispatcher::new(ctx, commands, triggers, redemptions));
    let shutdown = CancellationToken::new();

    let overlay_handle = tokio::spawn({
        let broadcaster = broadcaster.clone();
        let shutdown = shutdown.clone();
        let port = args.overlay_port;
        async move {
            if let Err(e) = overlay::server::serve(broadcaster, port, shutdown).await {
                error!(err = %e, "overlay server error");
            }
        }
    });

    let runtime = EventSubRuntime::new(
        dispatcher.clone(),
        owner,
        cfg.client_id.clone(),
        cfg.channel_user_id.clone(),
        args.eventsub_url.clone(),
        shutdown.clone(),
    );
    let runtime_handle = tokio::spawn(async move {
        if let Err(e) = runtime.run().await {
            error!(err = %e, "eventsub runtime error");
        }
    });

    info!("emberbot started");

    wait_for_shutdown_signal().await;
    info!("shutdown signal received");

    // Stop taking new events, then give in-flight handlers a bounded
    // window before the process exits underneath them.
    shutdown.cancel();
    dispatcher.drain(SHUTDOWN_GRACE).await;
    let _ = runtime_handle.await;
    let _ = overlay_handle.await;

    info!("emberbot shutdown complete");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!(err = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

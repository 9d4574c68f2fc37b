use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};

use storefront_api as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(&cfg.log_level, cfg.log_json);
    api::handlers::health::init_start_time();

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db = Arc::new(db_pool);

    // Collaborators
    let vault = Arc::new(api::services::card_vault::CardVault::new(&cfg.card_vault_secret)?);
    let gateway: Arc<dyn api::services::payment_gateway::PaymentGateway> = Arc::new(
        api::services::payment_gateway::HttpPaymentGateway::new(
            &cfg.gateway_url,
            cfg.gateway_merchant_name.clone(),
            cfg.gateway_timeout(),
        )?,
    );
    let mailer = api::services::notifications::mailer_from_config(&cfg)?;
    if cfg.smtp_host.is_none() {
        warn!("SMTP host not configured; receipts will be logged instead of emailed");
    }
    let notifier = Arc::new(api::services::notifications::OrderNotifier::new(
        db.clone(),
        mailer,
    ));

    // Init events
    let (event_sender, event_rx) = api::events::EventSender::channel(cfg.event_channel_capacity);
    tokio::spawn(api::events::process_events(event_rx, notifier));

    let services = api::handlers::AppServices::new(
        db.clone(),
        vault,
        gateway,
        Arc::new(event_sender),
        cfg.default_currency.clone(),
    );

    let host: std::net::IpAddr = cfg
        .host
        .parse()
        .with_context(|| format!("invalid listen host {:?}", cfg.host))?;
    let addr = SocketAddr::new(host, cfg.port);

    let app = api::build_router(api::AppState {
        db,
        config: Arc::new(cfg),
        services,
    });

    // Bind and serve
    info!("storefront-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("storefront-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

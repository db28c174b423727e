use anyhow::Context;
use std::sync::Arc;
use storefront_checkout::{
    config, db, events, handlers,
    payments::{stripe::StripeGateway, PaymentGateway},
    services::AppServices,
    AppState,
};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load_config().context("failed to load configuration")?;

    init_tracing(&config);

    let db = Arc::new(
        db::establish_connection(&config)
            .await
            .context("failed to connect to database")?,
    );
    if config.auto_migrate {
        db::init_schema(&db).await.context("schema bootstrap failed")?;
    }

    let (event_sender, _event_task) = events::spawn_event_logger(256);

    let gateway: Arc<dyn PaymentGateway> = Arc::new(StripeGateway::new(
        config.payment_api_base.clone(),
        config.payment_secret_key.clone(),
    ));

    let services = AppServices::build(db.clone(), &config, gateway, event_sender.clone());

    let state = AppState {
        db,
        config: config.clone(),
        event_sender,
        services,
    };

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    let mut app = handlers::router(state);
    if !config.is_production() {
        info!("permissive CORS enabled outside production");
        app = app.layer(CorsLayer::permissive());
    }

    info!(%addr, environment = %config.environment, "checkout engine listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

fn init_tracing(config: &config::AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("failed to install ctrl-c handler");
        return;
    }
    info!("shutdown signal received");
}

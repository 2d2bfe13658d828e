use std::sync::Arc;

use anyhow::Context;
use surf_onboard::config::WizardConfig;
use surf_onboard::onboarding::{SessionRegistry, spawn_expiry_task};
use surf_onboard::server::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = WizardConfig::from_env();
    config.validate()?;
    let port = config.port;

    eprintln!("🏄 Surf Onboard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api/sessions", port);
    eprintln!("   Express: http://0.0.0.0:{}/api/express-checkout", port);
    eprintln!("   Operator: http://0.0.0.0:{}/api/operator/summary", port);

    let registry = Arc::new(SessionRegistry::simulated(config));
    let _expiry_handle = spawn_expiry_task(Arc::clone(&registry));

    let app = build_router(registry);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    tracing::info!(port, "Onboarding server started");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

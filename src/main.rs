/**
 * VIGIE - Point d'entrée du serveur de métriques
 *
 * RÔLE : Bootstrap complet : config, sélection du backend de stockage,
 * routeur HTTP, écoute. Un seul process, pas de tâche de fond : le trim
 * de rétention est synchrone à chaque ingestion.
 */
mod charts;
mod config;
mod dashboard;
mod http;
mod models;
mod store;

use crate::http::AppState;
use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    let cfg = config::load_config().await;
    let store = store::open_store(&cfg.store, cfg.retention_cap)?;

    let host: IpAddr = cfg.listen.host.parse()?;
    let addr = SocketAddr::from((host, cfg.listen.port));

    println!("[vigie] metrics dashboard server starting");
    println!("[vigie] dashboard:    http://{addr}/");
    println!("[vigie] api endpoint: http://{addr}/api/metrics");
    println!("[vigie] health check: http://{addr}/health");

    let app = http::build_router(AppState { store, cfg });

    let listener = TcpListener::bind(addr).await?;
    // ConnectInfo requis pour dériver l'identifiant client depuis l'IP source
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

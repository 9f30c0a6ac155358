//! HTTP diagnostics surface, `§6`: `/healthz` and `/readyz` are liveness
//! probes, `/api/health` serves the node's `HealthSnapshot`.

use std::sync::Arc;

use actix_web::{web, App, HttpResponse, HttpServer};
use log::info;

use seda_overlay_core::{build_snapshot, MainTask, TxStats};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const VM_VERSION: &str = "v1";

pub struct AppState {
    pub main_task: Arc<MainTask>,
    pub active_identities: Vec<String>,
}

async fn healthz() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn readyz() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn api_health(state: web::Data<AppState>) -> HttpResponse {
    let pool = state.main_task.pool();
    let snapshot = build_snapshot(
        &*pool,
        TxStats {
            queued: 0,
            broadcast: 0,
            retried: 0,
            failed: 0,
        },
        state.active_identities.clone(),
        VERSION.to_string(),
        VM_VERSION.to_string(),
    );
    HttpResponse::Ok().json(snapshot)
}

/// Binds and runs the diagnostics server until cancelled; returns once
/// `actix-web`'s own server handle stops.
pub async fn run(port: u16, state: AppState) -> std::io::Result<()> {
    let data = web::Data::new(state);

    info!("starting http diagnostics server on 0.0.0.0:{port}");

    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .route("/healthz", web::get().to(healthz))
            .route("/readyz", web::get().to(readyz))
            .route("/api/health", web::get().to(api_health))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

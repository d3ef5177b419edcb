//! Metrics exposition endpoint.
//!
//! A single-route Actix Web application serving `GET /metrics` in the
//! Prometheus text format. The handler only reads gauge values; the
//! reconciliation engine is the sole writer.

use crate::error::{Error, Result};
use actix_web::{App, HttpResponse, HttpServer, Responder, dev::Server, web};
use prometheus::{Registry, TextEncoder};

/// Encode the registry's current state as a scrape response.
pub async fn metrics_handler(registry: web::Data<Registry>) -> impl Responder {
    let encoder = TextEncoder::new();
    let mut body = String::new();
    match encoder.encode_utf8(&registry.gather(), &mut body) {
        Ok(()) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4; charset=utf-8")
            .body(body),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            HttpResponse::InternalServerError().body(e.to_string())
        }
    }
}

/// Bind the exposition server.
///
/// Binding failure is a startup error the caller should treat as fatal; the
/// returned server future runs until the process exits.
pub fn serve(bind_address: &str, port: u16, registry: Registry) -> Result<Server> {
    let data = web::Data::new(registry);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .route("/metrics", web::get().to(metrics_handler))
    })
    .workers(1)
    .bind((bind_address, port))
    .map_err(|e| Error::Exposition(format!("cannot bind {}:{}: {}", bind_address, port, e)))?
    .run();

    tracing::info!(bind = %bind_address, port, "metrics endpoint listening");
    Ok(server)
}

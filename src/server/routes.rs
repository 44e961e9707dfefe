use std::convert::Infallible;
use std::sync::Arc;

use prometheus::Registry;
use tracing::warn;
use warp::http::StatusCode;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use super::dashboard;
use super::IngestRejection;
use super::ServerContext;
use crate::metrics::metrics_handler;
use crate::metrics::REGISTRY;

/// Every route the service exposes, with rejections turned into replies.
pub fn routes(
    ctx: Arc<ServerContext>
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    alive_route(ctx.clone())
        .or(dashboard_route(ctx.clone()))
        .or(metrics_route(ctx.metrics_enabled))
        .recover(handle_rejection)
}

fn with_ctx(
    ctx: Arc<ServerContext>
) -> impl Filter<Extract = (Arc<ServerContext>,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

/// `POST /alive?clientid=<id>&key=<key>`
fn alive_route(
    ctx: Arc<ServerContext>
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("alive")
        .and(warp::post())
        .and(warp::query::<Vec<(String, String)>>())
        .and(with_ctx(ctx))
        .and_then(alive)
}

fn dashboard_route(
    ctx: Arc<ServerContext>
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path::end()
        .and(warp::get())
        .and(with_ctx(ctx))
        .and_then(dashboard)
}

fn metrics_route(
    enabled: bool
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("metrics")
        .and(warp::get())
        .and_then(move || async move {
            if enabled {
                Ok::<Registry, Rejection>(REGISTRY.clone())
            } else {
                Err(warp::reject::not_found())
            }
        })
        .and_then(metrics_handler)
}

async fn alive(
    params: Vec<(String, String)>,
    ctx: Arc<ServerContext>,
) -> Result<impl Reply, Rejection> {
    ctx.ingest.handle(&params).map_err(warp::reject::custom)?;
    Ok("Success!")
}

async fn dashboard(ctx: Arc<ServerContext>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::html(dashboard::render(&ctx.store, &ctx.watch)))
}

pub(crate) async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(e) = err.find::<IngestRejection>() {
        (e.status(), e.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid query string".to_string())
    } else {
        warn!("unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
    };
    Ok(warp::reply::with_status(message, status))
}

//! Actix Web preview server exposing the browser UI, the annotated MJPEG
//! stream, loop status, and start/stop controls.
//!
//! The server runs on a dedicated thread to keep the frame loop free from
//! Actix runtime concerns. Control requests are forwarded to the loop over its
//! command channel; the server never touches the camera itself.

use std::{net::SocketAddr, time::Duration};

use actix_web::{
    App, HttpResponse, HttpServer,
    http::header,
    web::{self, Bytes},
};
use anyhow::{Context, Result};
use async_stream::stream;
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::control::{
    data::{
        ControlCommand, FrameHistory, FramePacket, SessionSettings, SharedFrame, StatusBoard,
        StatusSnapshot,
    },
    telemetry,
};

/// Shared state backing HTTP handlers.
pub(crate) struct ServerState {
    pub(crate) latest: SharedFrame,
    pub(crate) history: FrameHistory,
    pub(crate) status: StatusBoard,
    pub(crate) control: Sender<ControlCommand>,
    /// Prefilled values for the UI controls.
    pub(crate) defaults: SessionSettings,
}

#[derive(Default)]
/// Handle for the preview server thread.
pub(crate) struct PreviewServer {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl PreviewServer {
    /// Signal the server to stop and block until the thread exits.
    pub(crate) fn stop(self) {
        if let Some(tx) = self.shutdown {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle {
            let _ = handle.join();
        }
    }
}

#[derive(Deserialize)]
struct FrameQuery {
    frame: Option<u64>,
}

#[derive(Serialize)]
struct StatusResponse<'a> {
    #[serde(flatten)]
    status: &'a StatusSnapshot,
    defaults: SessionSettings,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Spawn the preview server thread and return a handle that can stop it.
pub(crate) fn spawn_preview_server(state: ServerState, bind: SocketAddr) -> Result<PreviewServer> {
    let data = web::Data::new(state);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = telemetry::spawn_thread("gesture-preview-server", move || {
        if let Err(err) = actix_web::rt::System::new().block_on(async move {
            let server = HttpServer::new(move || App::new().app_data(data.clone()).configure(routes))
                .workers(2)
                .bind(bind)?
                .run();

            let srv_handle = server.handle();
            actix_web::rt::spawn(async move {
                let _ = shutdown_rx.await;
                srv_handle.stop(true).await;
            });

            server.await
        }) {
            error!("HTTP server error: {err}");
        }
    })
    .context("Failed to spawn preview server thread")?;
    info!("Preview UI available at http://{bind}/");
    Ok(PreviewServer {
        shutdown: Some(shutdown_tx),
        handle: Some(handle),
    })
}

pub(crate) fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index_route))
        .route("/frame.jpg", web::get().to(frame_handler))
        .route("/stream.mjpg", web::get().to(stream_handler))
        .route("/status", web::get().to(status_handler))
        .route("/control/start", web::post().to(start_handler))
        .route("/control/stop", web::post().to(stop_handler))
        .route("/metrics", web::get().to(metrics_handler));
}

/// Fetch the latest encoded frame from the shared pointer.
fn latest_frame(shared: &SharedFrame) -> Option<FramePacket> {
    match shared.lock() {
        Ok(guard) => guard.clone(),
        Err(_) => None,
    }
}

/// Retrieve a historical frame by sequence number.
fn history_frame(history: &FrameHistory, frame_number: u64) -> Option<FramePacket> {
    match history.lock() {
        Ok(buffer) => buffer
            .iter()
            .find(|packet| packet.frame_number == frame_number)
            .cloned(),
        Err(_) => None,
    }
}

/// Per-frame metadata sent next to every JPEG.
fn frame_headers(packet: &FramePacket) -> Vec<(&'static str, String)> {
    let mut headers = vec![
        ("X-Sequence", packet.frame_number.to_string()),
        ("X-Timestamp", packet.timestamp_ms.to_string()),
        ("X-Fps", format!("{:.1}", packet.fps)),
        ("X-Hands", packet.hands.to_string()),
    ];
    if let Some(reading) = packet.reading {
        headers.push(("X-Volume-Percent", format!("{:.0}", reading.percent)));
    }
    headers
}

fn jpeg_response(packet: FramePacket, warning: Option<String>) -> HttpResponse {
    let mut response = HttpResponse::Ok();
    for pair in frame_headers(&packet) {
        response.append_header(pair);
    }
    if let Some(warning) = warning {
        response.append_header((header::WARNING, warning));
    }
    response
        .content_type("image/jpeg")
        .append_header(("Cache-Control", "no-cache"))
        .body(packet.jpeg)
}

/// Return a single JPEG frame by sequence number or the latest frame.
async fn frame_handler(
    query: web::Query<FrameQuery>,
    state: web::Data<ServerState>,
) -> HttpResponse {
    if let Some(requested) = query.frame {
        if let Some(packet) = history_frame(&state.history, requested) {
            return jpeg_response(packet, None);
        } else if let Some(latest) = latest_frame(&state.latest) {
            let warning = format!(
                "299 gesture-volume \"frame {} not buffered; returning latest {}\"",
                requested, latest.frame_number
            );
            return jpeg_response(latest, Some(warning));
        } else {
            return HttpResponse::NoContent().finish();
        }
    }

    match latest_frame(&state.latest) {
        Some(packet) => jpeg_response(packet, None),
        None => HttpResponse::NoContent().finish(),
    }
}

/// Stream the MJPEG feed over a multipart response.
async fn stream_handler(state: web::Data<ServerState>) -> HttpResponse {
    let state = state.clone();
    let stream = stream! {
        let mut interval = actix_web::rt::time::interval(Duration::from_millis(33));
        let mut last_sent = 0u64;
        loop {
            interval.tick().await;
            let frame = latest_frame(&state.latest);
            if let Some(packet) = frame {
                if packet.frame_number == last_sent {
                    continue;
                }
                last_sent = packet.frame_number;
                let mut payload = Vec::with_capacity(packet.jpeg.len() + 64);
                payload.extend_from_slice(b"--frame\r\n");
                for (name, value) in frame_headers(&packet) {
                    payload.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
                }
                payload.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
                payload.extend_from_slice(&packet.jpeg);
                payload.extend_from_slice(b"\r\n");
                yield Ok::<Bytes, actix_web::Error>(Bytes::from(payload));
            }
        }
    };

    HttpResponse::Ok()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "GET"))
        .insert_header((header::ACCESS_CONTROL_EXPOSE_HEADERS, "Content-Type"))
        .append_header(("Cache-Control", "no-cache"))
        .append_header(("Content-Type", "multipart/x-mixed-replace; boundary=frame"))
        .streaming(stream)
}

/// Serve the browser UI.
async fn index_route() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(crate::html::hud::HUD_INDEX_HTML)
}

async fn status_handler(state: web::Data<ServerState>) -> HttpResponse {
    let snapshot = state.status.snapshot();
    HttpResponse::Ok()
        .append_header(("Cache-Control", "no-cache"))
        .json(StatusResponse {
            status: &snapshot,
            defaults: state.defaults,
        })
}

async fn start_handler(
    settings: web::Json<SessionSettings>,
    state: web::Data<ServerState>,
) -> HttpResponse {
    let settings = settings.into_inner();
    if let Err(err) = settings.validate() {
        warn!("Rejected start request: {err}");
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: err.to_string(),
        });
    }
    send_command(&state, ControlCommand::Start(settings))
}

async fn stop_handler(state: web::Data<ServerState>) -> HttpResponse {
    send_command(&state, ControlCommand::Stop)
}

fn send_command(state: &ServerState, command: ControlCommand) -> HttpResponse {
    match state.control.send(command) {
        Ok(()) => HttpResponse::Accepted().json(state.status.snapshot()),
        Err(err) => HttpResponse::ServiceUnavailable().json(ErrorResponse {
            error: format!("frame loop is not running: {err}"),
        }),
    }
}

/// Prometheus text exposition.
async fn metrics_handler() -> HttpResponse {
    match telemetry::prometheus_handle() {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::ServiceUnavailable().finish(),
    }
}

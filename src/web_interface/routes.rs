use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{error, info, warn};
use warp::{http::StatusCode, reply, Filter, Rejection, Reply};

use super::types::*;
use crate::configuration::Config;
use crate::data_capture::{Direction, Payload};
use crate::gateway::GatewayExchange;
use crate::session_management::session::PacketEvent;
use crate::session_management::session_manager::TraceStore;

pub const PCAP_CONTENT_TYPE: &str = "application/vnd.tcpdump.pcap";
const MAX_AUDIO_ECHO: usize = 1024 * 1024;

fn json_reply<T: serde::Serialize>(body: &T, status: StatusCode) -> reply::Response {
    reply::with_status(reply::json(body), status).into_response()
}

fn error_reply(message: &str, status: StatusCode) -> reply::Response {
    json_reply(&ApiError::new(message), status)
}

fn with_store(
    store: Arc<TraceStore>,
) -> impl Filter<Extract = (Arc<TraceStore>,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

fn client_ip(remote: Option<SocketAddr>) -> String {
    remote
        .map(|a| a.ip().to_string())
        .unwrap_or_else(|| String::from("127.0.0.1"))
}

/// Optional JSON body; a missing or unreadable body counts as empty.
fn optional_trace_body() -> impl Filter<Extract = (TraceRequest,), Error = Infallible> + Clone {
    warp::body::json::<TraceRequest>()
        .or(warp::any().map(TraceRequest::default))
        .unify()
}

/// POST /trace/start
pub fn start_trace_route(
    store: Arc<TraceStore>,
    config: Arc<Config>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("trace" / "start")
        .and(warp::post())
        .and(with_store(store))
        .and(warp::any().map(move || config.clone()))
        .and(warp::addr::remote())
        .map(
            |store: Arc<TraceStore>, config: Arc<Config>, remote: Option<SocketAddr>| {
                let id = match store.start() {
                    Ok(id) => id,
                    Err(e) => {
                        error!("Error starting trace: {}", e);
                        return error_reply(
                            &format!("Failed to start trace: {}", e),
                            StatusCode::INTERNAL_SERVER_ERROR,
                        );
                    }
                };
                info!("Started trace successfully with ID: {}", id);
                GatewayExchange::new(&config, &client_ip(remote)).log_samples();

                json_reply(
                    &StartResponse {
                        status: STATUS_SUCCESS.into(),
                        trace_id: id,
                        message: "Trace started. Packets will be captured in PCAP format.".into(),
                    },
                    StatusCode::OK,
                )
            },
        )
}

/// POST /trace/stop
pub fn stop_trace_route(
    store: Arc<TraceStore>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("trace" / "stop")
        .and(warp::post())
        .and(with_store(store))
        .and(optional_trace_body())
        .map(|store: Arc<TraceStore>, body: TraceRequest| {
            let summary = parse_trace_id(body.trace_id.as_deref())
                .ok()
                .and_then(|id| store.stop(id));
            match summary {
                Some(summary) => {
                    let message = format!("Trace stopped. {} packets captured.", summary.packet_count);
                    json_reply(
                        &StopResponse {
                            status: STATUS_SUCCESS.into(),
                            trace_info: summary,
                            message,
                        },
                        StatusCode::OK,
                    )
                }
                None => error_reply("No active trace to stop", StatusCode::NOT_FOUND),
            }
        })
}

/// GET /trace/list
pub fn list_traces_route(
    store: Arc<TraceStore>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("trace" / "list")
        .and(warp::get())
        .and(with_store(store))
        .map(|store: Arc<TraceStore>| {
            json_reply(
                &ListResponse {
                    status: STATUS_SUCCESS.into(),
                    traces: store.list_all(),
                    active_trace_id: store.default_session(),
                },
                StatusCode::OK,
            )
        })
}

/// GET /trace/status
pub fn trace_status_route(
    store: Arc<TraceStore>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("trace" / "status")
        .and(warp::get())
        .and(with_store(store))
        .map(|store: Arc<TraceStore>| {
            let active_trace = store.describe(None);
            json_reply(
                &StatusResponse {
                    status: STATUS_SUCCESS.into(),
                    tracing_active: active_trace.is_some(),
                    active_trace,
                },
                StatusCode::OK,
            )
        })
}

/// GET /trace/download/:id
pub fn download_trace_route(
    store: Arc<TraceStore>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("trace" / "download" / String)
        .and(warp::get())
        .and(with_store(store))
        .and_then(|id_str: String, store: Arc<TraceStore>| async move {
            let path = match parse_trace_id(Some(&id_str)) {
                Ok(Some(id)) => store.capture_path(id),
                _ => None,
            };
            let Some(path) = path else {
                return Ok::<_, Rejection>(error_reply(
                    "Trace file not found",
                    StatusCode::NOT_FOUND,
                ));
            };

            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    let filename = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| format!("{}.pcap", id_str));
                    let res = reply::with_header(
                        reply::with_header(bytes, "Content-Type", PCAP_CONTENT_TYPE),
                        "Content-Disposition",
                        format!("attachment; filename=\"{}\"", filename),
                    )
                    .into_response();
                    Ok::<_, Rejection>(res)
                }
                Err(e) => {
                    warn!("Trace file {} unreadable: {}", path.display(), e);
                    Ok::<_, Rejection>(error_reply("Trace file not found", StatusCode::NOT_FOUND))
                }
            }
        })
}

/// POST /trace/record
pub fn record_packet_route(
    store: Arc<TraceStore>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("trace" / "record")
        .and(warp::post())
        .and(with_store(store))
        .and(warp::body::json::<RecordRequest>())
        .map(|store: Arc<TraceStore>, req: RecordRequest| {
            let direction: Direction = match req.direction.parse() {
                Ok(d) => d,
                Err(e) => return error_reply(&e, StatusCode::BAD_REQUEST),
            };
            let Ok(trace_id) = parse_trace_id(req.trace_id.as_deref()) else {
                return error_reply("Trace not found or not active", StatusCode::NOT_FOUND);
            };

            let mut event = PacketEvent::new(
                direction,
                &req.protocol,
                req.payload.unwrap_or_else(|| Payload::Text(String::new())),
            );
            if let Some(addr) = req.src_addr {
                event.src_addr = addr;
            }
            if let Some(addr) = req.dst_addr {
                event.dst_addr = addr;
            }
            if let Some(port) = req.src_port {
                event.src_port = port;
            }
            if let Some(port) = req.dst_port {
                event.dst_port = port;
            }

            match store.record(&event, trace_id) {
                Some(packet) => json_reply(
                    &RecordResponse {
                        status: STATUS_SUCCESS.into(),
                        packet,
                    },
                    StatusCode::OK,
                ),
                None => error_reply("Trace not found or not active", StatusCode::NOT_FOUND),
            }
        })
}

/// POST /stream-audio
pub fn stream_audio_route(
    store: Arc<TraceStore>,
    config: Arc<Config>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("stream-audio")
        .and(warp::post())
        .and(with_store(store))
        .and(warp::any().map(move || config.clone()))
        .and(warp::addr::remote())
        .and(warp::body::json::<AudioRequest>())
        .map(
            |store: Arc<TraceStore>,
             config: Arc<Config>,
             remote: Option<SocketAddr>,
             req: AudioRequest| {
                let audio = req.audio.unwrap_or_default();
                info!("Processing audio stream: {} bytes", audio.len());

                let explicit = parse_trace_id(req.trace_id.as_deref()).unwrap_or_else(|e| {
                    warn!("Ignoring malformed trace id: {}", e);
                    None
                });
                GatewayExchange::new(&config, &client_ip(remote)).run(&store, &audio, explicit);

                let echoed = if audio.len() > MAX_AUDIO_ECHO {
                    warn!(
                        "Audio data too large ({} bytes), truncating for response",
                        audio.len()
                    );
                    let mut end = MAX_AUDIO_ECHO;
                    while !audio.is_char_boundary(end) {
                        end -= 1;
                    }
                    audio[..end].to_string()
                } else {
                    audio
                };

                let default = store.default_session();
                json_reply(
                    &AudioResponse {
                        status: STATUS_SUCCESS.into(),
                        audio: echoed,
                        trace_id: explicit.or(default),
                        trace_active: default.is_some(),
                    },
                    StatusCode::OK,
                )
            },
        )
}

/// Turn rejections into JSON errors.
pub async fn handle_rejection(err: Rejection) -> Result<reply::Response, Infallible> {
    if err.is_not_found() {
        return Ok(error_reply("Endpoint not found", StatusCode::NOT_FOUND));
    }
    if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        return Ok(error_reply(&format!("Invalid JSON: {}", e), StatusCode::BAD_REQUEST));
    }
    if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(error_reply("Method not allowed", StatusCode::METHOD_NOT_ALLOWED));
    }
    error!("Unhandled rejection: {:?}", err);
    Ok(error_reply("Internal error", StatusCode::INTERNAL_SERVER_ERROR))
}

/// Every trace endpoint, with JSON error replies.
pub fn trace_api(
    store: Arc<TraceStore>,
    config: Arc<Config>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    start_trace_route(store.clone(), config.clone())
        .or(stop_trace_route(store.clone()))
        .or(list_traces_route(store.clone()))
        .or(trace_status_route(store.clone()))
        .or(download_trace_route(store.clone()))
        .or(record_packet_route(store.clone()))
        .or(stream_audio_route(store, config))
        .recover(handle_rejection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_capture::read_capture;
    use crate::data_capture::pcap::parse_capture;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn api() -> (
        TempDir,
        Arc<TraceStore>,
        impl Filter<Extract = impl Reply, Error = Infallible> + Clone,
    ) {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = TempDir::new().unwrap();
        let store = Arc::new(TraceStore::new(dir.path().join("logs")));
        let api = trace_api(store.clone(), Arc::new(Config::default()));
        (dir, store, api)
    }

    fn body(res: &warp::http::Response<impl AsRef<[u8]>>) -> Value {
        serde_json::from_slice(res.body().as_ref()).unwrap()
    }

    #[tokio::test]
    async fn start_record_stop_download() {
        let (_dir, store, api) = api();

        let res = warp::test::request()
            .method("POST")
            .path("/trace/start")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let id = body(&res)["trace_id"].as_str().unwrap().to_string();
        assert_eq!(store.default_session().unwrap().to_string(), id);

        let res = warp::test::request()
            .method("POST")
            .path("/trace/record")
            .json(&json!({
                "direction": "sip_to_grpc",
                "protocol": "TCP",
                "payload": {"a": 1},
                "src_addr": "10.0.0.1",
                "dst_addr": "10.0.0.2",
                "src_port": 5060,
                "dst_port": 50051
            }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(&res)["packet"]["size_bytes"], 7);

        let res = warp::test::request()
            .method("GET")
            .path("/trace/status")
            .reply(&api)
            .await;
        let status = body(&res);
        assert_eq!(status["tracing_active"], true);
        assert_eq!(status["active_trace"]["packet_count"], 1);

        let res = warp::test::request()
            .method("POST")
            .path("/trace/stop")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let stopped = body(&res);
        assert_eq!(stopped["trace_info"]["packet_count"], 1);
        assert_eq!(stopped["trace_info"]["sip_to_grpc_count"], 1);
        assert_eq!(stopped["message"], "Trace stopped. 1 packets captured.");

        let res = warp::test::request()
            .method("GET")
            .path(&format!("/trace/download/{}", id))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["content-type"], PCAP_CONTENT_TYPE);
        let disposition = res.headers()["content-disposition"].to_str().unwrap().to_string();
        assert!(disposition.starts_with("attachment; filename=\"sip_grpc_trace_"));
        let (_, recs) = parse_capture(res.body().as_ref()).unwrap();
        assert_eq!(recs.len(), 1);
    }

    #[tokio::test]
    async fn stop_without_trace_is_404() {
        let (_dir, _store, api) = api();
        let res = warp::test::request()
            .method("POST")
            .path("/trace/stop")
            .body("not json")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&res)["message"], "No active trace to stop");
    }

    #[tokio::test]
    async fn stop_with_explicit_id() {
        let (_dir, store, api) = api();
        let first = store.start().unwrap();
        let _second = store.start().unwrap();
        let res = warp::test::request()
            .method("POST")
            .path("/trace/stop")
            .json(&json!({ "trace_id": first.to_string() }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(&res)["trace_info"]["id"], first.to_string());
        assert!(store.default_session().is_some());
    }

    #[tokio::test]
    async fn record_rejects_unknown_direction_and_missing_trace() {
        let (_dir, _store, api) = api();
        let res = warp::test::request()
            .method("POST")
            .path("/trace/record")
            .json(&json!({ "direction": "sideways" }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = warp::test::request()
            .method("POST")
            .path("/trace/record")
            .json(&json!({ "direction": "client_to_sip", "payload": "hi" }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn record_with_unusable_ports_uses_defaults() {
        let (_dir, store, api) = api();
        let id = store.start().unwrap();
        for port in [json!(true), json!([1]), json!({"p": 1}), json!("sip")] {
            let res = warp::test::request()
                .method("POST")
                .path("/trace/record")
                .json(&json!({
                    "direction": "client_to_sip",
                    "payload": "INVITE",
                    "src_port": port.clone(),
                    "dst_port": 6000
                }))
                .reply(&api)
                .await;
            assert_eq!(res.status(), StatusCode::OK, "{port}");
            let packet = &body(&res)["packet"];
            assert_eq!(packet["src_port"], 5060);
            assert_eq!(packet["dst_port"], 50051);
        }

        let res = warp::test::request()
            .method("POST")
            .path("/trace/record")
            .json(&json!({
                "direction": "sip_to_grpc",
                "src_port": 5060.0,
                "dst_port": 1e30
            }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let packet = &body(&res)["packet"];
        assert_eq!(packet["src_port"], 5060);
        assert_eq!(packet["dst_port"], 65535);

        assert_eq!(store.packets(Some(id)).unwrap().len(), 5);
        let (_, recs) = read_capture(store.capture_path(id).unwrap()).unwrap();
        assert_eq!(recs.len(), 5);
    }

    #[tokio::test]
    async fn download_unknown_trace_is_404() {
        let (_dir, _store, api) = api();
        for path in ["/trace/download/not-a-uuid", "/trace/download/6f1c1b54-27c5-4b1e-9a3e-0c3f4f0b2a11"] {
            let res = warp::test::request().method("GET").path(path).reply(&api).await;
            assert_eq!(res.status(), StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn list_in_creation_order() {
        let (_dir, store, api) = api();
        let a = store.start().unwrap();
        let b = store.start().unwrap();
        let res = warp::test::request()
            .method("GET")
            .path("/trace/list")
            .reply(&api)
            .await;
        let list = body(&res);
        assert_eq!(list["traces"][0]["id"], a.to_string());
        assert_eq!(list["traces"][1]["id"], b.to_string());
        assert_eq!(list["active_trace_id"], b.to_string());
    }

    #[tokio::test]
    async fn stream_audio_records_four_hops() {
        let (_dir, store, api) = api();
        let id = store.start().unwrap();
        let res = warp::test::request()
            .method("POST")
            .path("/stream-audio")
            .remote_addr("192.168.1.9:40000".parse().unwrap())
            .json(&json!({ "audio": "UklGRiQAAABXQVZFZm10IBAAAAABAAEA" }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let reply = body(&res);
        assert_eq!(reply["audio"], "UklGRiQAAABXQVZFZm10IBAAAAABAAEA");
        assert_eq!(reply["trace_id"], id.to_string());
        assert_eq!(reply["trace_active"], true);

        let packets = store.packets(Some(id)).unwrap();
        assert_eq!(packets.len(), 4);
        assert_eq!(packets[0].src_addr, "192.168.1.9");
        let (_, recs) = read_capture(store.capture_path(id).unwrap()).unwrap();
        assert_eq!(recs.len(), 4);
    }

    #[tokio::test]
    async fn stream_audio_rejects_bad_json() {
        let (_dir, _store, api) = api();
        let res = warp::test::request()
            .method("POST")
            .path("/stream-audio")
            .header("content-type", "application/json")
            .body("{oops")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_endpoint_is_json_404() {
        let (_dir, _store, api) = api();
        let res = warp::test::request().method("GET").path("/nowhere").reply(&api).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&res)["status"], "error");
    }
}

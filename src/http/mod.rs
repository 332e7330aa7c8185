//! HTTP endpoint serving the garbage profile.
//!
//! `GET /debug/pprof/garbage?seconds=N&debug=M`
//!
//! The status line and headers go out immediately; the profile body follows
//! once the window has been sampled (about `2 * seconds` later).

use crate::profile::write_garbage_profile_with;
use crate::runtime::{BacktraceSymbolizer, MemRuntime, Symbolizer, TrackingRuntime};
use crate::utils::config::{DEFAULT_PROFILE_SECONDS, GARBAGE_ROUTE, PROFILE_CONTENT_TYPE};
use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use log::{debug, info, warn};
use serde::Deserialize;
use std::io::{self, BufWriter, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

// Body chunks buffered between the profiler thread and the connection
const BODY_CHANNEL_CAPACITY: usize = 16;

/// Raw query string values. Kept as strings so bad numbers fall back to
/// defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct GarbageParams {
    pub seconds: Option<String>,
    pub debug: Option<String>,
}

/// Profile window in seconds: the parsed value, or the default when the
/// parameter is absent, not a number, zero or negative.
pub fn parse_seconds(raw: Option<&str>) -> u64 {
    match raw.and_then(|s| s.trim().parse::<i64>().ok()) {
        Some(secs) if secs > 0 => secs as u64,
        _ => DEFAULT_PROFILE_SECONDS,
    }
}

/// Verbose output is on for any non-zero integer
pub fn parse_debug(raw: Option<&str>) -> bool {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .map_or(false, |level| level != 0)
}

struct ProfileState<R> {
    runtime: R,
    symbolizer: Arc<dyn Symbolizer + Send + Sync>,
}

impl<R: Clone> Clone for ProfileState<R> {
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            symbolizer: Arc::clone(&self.symbolizer),
        }
    }
}

/// Router with the garbage route backed by the process-wide tracker
///
/// **Public** - mount this in an existing axum app or use [`serve`]
pub fn router() -> Router {
    let runtime = TrackingRuntime::global();
    router_with(runtime, Arc::new(BacktraceSymbolizer::new()))
}

/// Router with explicit collaborators
pub fn router_with<R>(runtime: R, symbolizer: Arc<dyn Symbolizer + Send + Sync>) -> Router
where
    R: MemRuntime + Clone + Send + Sync + 'static,
{
    Router::new()
        .route(GARBAGE_ROUTE, get(garbage_handler::<R>))
        .with_state(ProfileState {
            runtime,
            symbolizer,
        })
}

async fn garbage_handler<R>(
    State(state): State<ProfileState<R>>,
    Query(params): Query<GarbageParams>,
) -> Response
where
    R: MemRuntime + Clone + Send + Sync + 'static,
{
    let seconds = parse_seconds(params.seconds.as_deref());
    let debug = parse_debug(params.debug.as_deref());
    info!("Garbage profile requested: {}s, debug={}", seconds, debug);

    let (tx, rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
    tokio::task::spawn_blocking(move || {
        let mut body = BufWriter::new(ChannelWriter { tx });
        let result = write_garbage_profile_with(
            &mut body,
            &state.runtime,
            state.symbolizer.as_ref(),
            Duration::from_secs(seconds),
            debug,
        );
        match result {
            Ok(sampled) => debug!("Garbage profile sent ({} call sites)", sampled.table.len()),
            Err(e) => warn!("Garbage profile not delivered: {}", e),
        }
    });

    (
        [(header::CONTENT_TYPE, PROFILE_CONTENT_TYPE)],
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response()
}

/// `io::Write` adapter feeding the response body channel from a blocking thread
struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Serve the garbage route until the process exits
///
/// **Public** - used by the `serve` command
pub async fn serve(addr: SocketAddr) -> io::Result<()> {
    serve_router(addr, router()).await
}

pub async fn serve_router(addr: SocketAddr, app: Router) -> io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(
        "Serving garbage profiles on http://{}{}",
        listener.local_addr()?,
        GARBAGE_ROUTE
    );
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{AllocRecord, Frame};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds(Some("5")), 5);
        assert_eq!(parse_seconds(None), 30);
        assert_eq!(parse_seconds(Some("")), 30);
        assert_eq!(parse_seconds(Some("abc")), 30);
        assert_eq!(parse_seconds(Some("0")), 30);
        assert_eq!(parse_seconds(Some("-3")), 30);
    }

    #[test]
    fn test_parse_debug() {
        assert!(!parse_debug(None));
        assert!(!parse_debug(Some("0")));
        assert!(!parse_debug(Some("yes")));
        assert!(parse_debug(Some("1")));
        assert!(parse_debug(Some("2")));
    }

    /// Empty profile table; every counter read sees a new cycle.
    #[derive(Clone, Default)]
    struct Idle {
        cycles: Arc<AtomicU32>,
    }

    impl MemRuntime for Idle {
        fn num_gc(&self) -> u32 {
            self.cycles.fetch_add(1, Ordering::SeqCst)
        }

        fn force_gc(&self) {}

        fn mem_profile(&self, _records: &mut [AllocRecord]) -> (usize, bool) {
            (0, true)
        }

        fn sample_rate(&self) -> u64 {
            4096
        }
    }

    struct NoSymbols;

    impl Symbolizer for NoSymbols {
        fn symbolize(&self, pc: usize) -> Frame {
            Frame::unresolved(pc)
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_route_streams_text_profile() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router_with(Idle::default(), Arc::new(NoSymbols));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let url = format!("http://{}{}?seconds=1&debug=1", addr, GARBAGE_ROUTE);
        let response = reqwest::get(&url).await.unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(
            response.headers()[reqwest::header::CONTENT_TYPE],
            PROFILE_CONTENT_TYPE
        );
        assert_eq!(
            response.text().await.unwrap(),
            "heap profile: 0: 0 [0: 0] @ heap/8192\n"
        );
    }
}

//! Response body streaming through pooled buffers.
//!
//! A spawned copy task reads the upstream body into a checked-out
//! [`PooledBuffer`] and hands each filled slice to the client body over a
//! one-slot channel. The task owns everything held for the transfer (buffer,
//! upstream permit, request context), so they are released when it ends:
//! end of body, upstream error, client gone, or a stall.
//!
//! Two limits keep a transfer from holding its upstream slot forever:
//! - `idle`: an upstream read or a hand-off to the client that makes no
//!   progress for this long ends the stream
//! - `ceiling`: the whole transfer never runs longer than this

use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use bytes::Bytes;
use futures_util::{stream, TryStreamExt};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, OwnedSemaphorePermit};
use tokio::time;
use tokio_util::io::StreamReader;

use crate::buffer::{BufferPool, PooledBuffer};
use crate::http::request::ProxyRequestContext;
use crate::observability::TrafficCounter;

type Chunk = io::Result<Bytes>;

/// Time limits for one response body transfer.
#[derive(Debug, Clone, Copy)]
pub struct StreamLimits {
    pub idle: Duration,
    pub ceiling: Duration,
}

/// Wrap an upstream body so it is copied to the client through `pool`.
pub fn pooled_body<B>(
    upstream: B,
    pool: &BufferPool,
    traffic: Arc<TrafficCounter>,
    permit: Option<OwnedSemaphorePermit>,
    context: ProxyRequestContext,
    limits: StreamLimits,
) -> Body
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<axum::BoxError>,
{
    let reader = StreamReader::new(Body::new(upstream).into_data_stream().map_err(io::Error::other));
    copy_body(reader, pool.acquire(), traffic, permit, context, limits)
}

fn copy_body<R>(
    reader: R,
    buffer: PooledBuffer,
    traffic: Arc<TrafficCounter>,
    permit: Option<OwnedSemaphorePermit>,
    context: ProxyRequestContext,
    limits: StreamLimits,
) -> Body
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Chunk>(1);

    tokio::spawn(async move {
        let _permit = permit;
        let copy = pump(reader, buffer, &traffic, &tx, &context, limits.idle);
        if time::timeout(limits.ceiling, copy).await.is_err() {
            tracing::warn!(
                request_id = %context.request_id(),
                path = %context.path(),
                ceiling = ?limits.ceiling,
                "Response stream exceeded its time limit"
            );
            fail(&tx, io::ErrorKind::TimedOut, "response stream time limit", limits.idle).await;
        }
    });

    let chunks = stream::unfold(rx, |mut rx| async move {
        let chunk = rx.recv().await?;
        Some((chunk, rx))
    });
    Body::from_stream(chunks)
}

async fn pump<R>(
    mut reader: R,
    mut buffer: PooledBuffer,
    traffic: &TrafficCounter,
    tx: &mpsc::Sender<Chunk>,
    context: &ProxyRequestContext,
    idle: Duration,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let read = tokio::select! {
            read = time::timeout(idle, reader.read(&mut buffer[..])) => read,
            _ = tx.closed() => return,
        };

        let n = match read {
            Ok(Ok(0)) => return,
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                tracing::warn!(request_id = %context.request_id(), error = %e, "Upstream body failed");
                let _ = time::timeout(idle, tx.send(Err(e))).await;
                return;
            }
            Err(_) => {
                tracing::warn!(request_id = %context.request_id(), idle = ?idle, "Upstream body stalled");
                fail(tx, io::ErrorKind::TimedOut, "upstream body stalled", idle).await;
                return;
            }
        };

        let chunk = Bytes::copy_from_slice(&buffer[..n]);
        match time::timeout(idle, tx.send(Ok(chunk))).await {
            Ok(Ok(())) => traffic.add(n as u64),
            // Client body dropped.
            Ok(Err(_)) => return,
            Err(_) => {
                tracing::warn!(request_id = %context.request_id(), idle = ?idle, "Client stopped reading");
                return;
            }
        }
    }
}

async fn fail(tx: &mpsc::Sender<Chunk>, kind: io::ErrorKind, message: &'static str, idle: Duration) {
    let _ = time::timeout(idle, tx.send(Err(io::Error::new(kind, message)))).await;
}

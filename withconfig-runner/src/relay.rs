use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use withconfig_core::{RelayOutcome, StreamKind, WithConfigError};

/// Upper bound on a single read. Whatever the child has written so far is
/// forwarded immediately; nothing waits for a full buffer or a newline.
const RELAY_CHUNK_SIZE: usize = 8 * 1024;

/// Forward bytes from `source` to `sink` until end-of-stream.
///
/// Each chunk is written and flushed before the next read. A read error ends
/// the relay and is recorded in the outcome. A write error is recorded too,
/// but the source keeps being drained so the child never blocks on a full
/// pipe.
pub async fn relay<R, W>(stream: StreamKind, mut source: R, mut sink: W) -> RelayOutcome
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut outcome = RelayOutcome::new(stream);
    let mut buf = vec![0u8; RELAY_CHUNK_SIZE];

    loop {
        let n = match source.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                let err = WithConfigError::RelayRead { stream, source: e };
                warn!(stream = %stream, error = %err, "Relay stopped before end of stream");
                outcome.read_error = Some(err.to_string());
                break;
            }
        };

        if outcome.write_error.is_some() {
            continue;
        }

        match write_chunk(&mut sink, &buf[..n]).await {
            Ok(()) => outcome.bytes_forwarded += n as u64,
            Err(e) => {
                warn!(stream = %stream, error = %e, "Unable to forward output; discarding the rest");
                outcome.write_error = Some(e.to_string());
            }
        }
    }

    debug!(
        stream = %stream,
        bytes = outcome.bytes_forwarded,
        "Relay finished"
    );
    outcome
}

async fn write_chunk<W: AsyncWrite + Unpin>(sink: &mut W, chunk: &[u8]) -> std::io::Result<()> {
    sink.write_all(chunk).await?;
    sink.flush().await
}

/// Run [`relay`] on its own task.
pub fn spawn_relay<R, W>(stream: StreamKind, source: R, sink: W) -> JoinHandle<RelayOutcome>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(relay(stream, source, sink))
}

/// Wait for a spawned relay. A relay task that panicked is reported as a
/// relay that stopped early rather than failing the launch.
pub async fn join_relay(stream: StreamKind, handle: JoinHandle<RelayOutcome>) -> RelayOutcome {
    match handle.await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(stream = %stream, error = %e, "Relay task failed");
            let mut outcome = RelayOutcome::new(stream);
            outcome.read_error = Some(format!("relay task failed: {}", e));
            outcome
        }
    }
}

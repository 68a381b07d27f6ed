//! JSON-lines transport for the plugin channel.
//!
//! One [`MethodCall`] per input line, one [`MethodReply`] per output line.
//! Calls are dispatched to the plugin in arrival order. Only the wait for a
//! `startListening` transcript runs on its own task, so a later
//! `stopListening` can answer it. Replies are funneled through a single
//! writer task.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use voicesearch_core::error::{Result, VoiceSearchError};

use crate::plugin::{Dispatched, VoiceSearchPlugin};
use crate::wire::{MethodCall, MethodReply, Reply};

/// Serve calls from `reader` until EOF, writing replies to `writer`.
///
/// On EOF any live session is torn down, every outstanding call is answered,
/// and the writer is flushed before returning.
pub async fn serve<R, W>(reader: R, writer: W, plugin: Arc<VoiceSearchPlugin>) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (reply_tx, reply_rx) = mpsc::unbounded_channel::<MethodReply>();
    let writer_task = tokio::spawn(write_replies(writer, reply_rx));

    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    let mut in_flight = JoinSet::new();

    info!(channel = plugin.channel_name(), "Serving channel");

    let read_result = loop {
        line.clear();
        let bytes = match reader.read_line(&mut line).await {
            Ok(bytes) => bytes,
            Err(e) => break Err(VoiceSearchError::Io(e)),
        };
        if bytes == 0 {
            break Ok(());
        }

        let payload = line.trim_end();
        if payload.is_empty() {
            continue;
        }

        let call = match serde_json::from_str::<MethodCall>(payload) {
            Ok(call) => call,
            Err(e) => {
                warn!(error = %e, "Malformed call");
                let err = VoiceSearchError::from(e);
                let _ = reply_tx.send(MethodReply::new(
                    0,
                    Reply::error(err.wire_code(), err.to_string()),
                ));
                continue;
            }
        };

        debug!(id = call.id, method = %call.method, "Call received");
        match plugin.dispatch(call) {
            Dispatched::Ready(reply) => {
                if reply_tx.send(reply).is_err() {
                    debug!("Reply dropped, writer is gone");
                }
            }
            waiting => {
                let reply_tx = reply_tx.clone();
                in_flight.spawn(async move {
                    let reply = waiting.into_reply().await;
                    if reply_tx.send(reply).is_err() {
                        debug!("Reply dropped, writer is gone");
                    }
                });
            }
        }

        // Reap finished calls so the set does not grow unbounded.
        while let Some(joined) = in_flight.try_join_next() {
            if let Err(e) = joined {
                warn!(error = %e, "Call task failed");
            }
        }
    };

    // Every session was opened by the loop above, so one teardown answers
    // every outstanding transcript.
    debug!(outstanding = in_flight.len(), "Channel closed, shutting down");
    plugin.shutdown();
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "Call task failed");
        }
    }

    drop(reply_tx);
    let write_result = writer_task
        .await
        .map_err(|e| VoiceSearchError::Channel(format!("writer task failed: {e}")))?;

    info!(channel = plugin.channel_name(), "Channel closed");
    read_result.and(write_result)
}

async fn write_replies<W>(mut writer: W, mut replies: mpsc::UnboundedReceiver<MethodReply>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(reply) = replies.recv().await {
        write_reply(&mut writer, &reply).await?;
    }
    writer.shutdown().await?;
    Ok(())
}

async fn write_reply<W>(writer: &mut W, reply: &MethodReply) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_string(reply)?;
    writer.write_all(format!("{}\n", payload).as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

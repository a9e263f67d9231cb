//! Hi-res payloads arrive as FLAC inside an MP4 container; ffmpeg copies the
//! audio track out into a plain FLAC stream without re-encoding.

use std::path::Path;
use std::process::Stdio;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::StreamReader;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::http::ByteReader;

const CHUNK_SIZE: usize = 64 * 1024;

/// Pipe `input` through ffmpeg and return its FLAC output
///
/// A non-zero ffmpeg exit surfaces as a read error at the end of the stream.
/// Dropping the returned reader kills the child process and drops `input`.
pub(super) fn to_flac(ffmpeg: &Path, mut input: ByteReader) -> Result<ByteReader> {
    let mut child = Command::new(ffmpeg)
        .args([
            "-nostdin",
            "-loglevel",
            "error",
            "-fflags",
            "+genpts",
            "-i",
            "pipe:0",
            "-map",
            "0:a:0",
            "-map_metadata",
            "0",
            "-c:a",
            "copy",
            "-f",
            "flac",
            "pipe:1",
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::ExternalTool(format!("failed to start {}: {}", ffmpeg.display(), e)))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| Error::ExternalTool("ffmpeg stdin not captured".to_string()))?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::ExternalTool("ffmpeg stdout not captured".to_string()))?;

    let feeder = AbortOnDropHandle::new(tokio::spawn(async move {
        if let Err(e) = tokio::io::copy(&mut input, &mut stdin).await {
            debug!(error = %e, "feeding ffmpeg stopped early");
        }
    }));

    let (tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(8);
    tokio::spawn(async move {
        // Aborts the feeder, and with it the input stream, on every exit path
        let _feeder = feeder;
        tokio::select! {
            _ = tx.closed() => {
                debug!("remux output dropped, stopping ffmpeg");
                if let Err(e) = child.start_kill() {
                    debug!(error = %e, "ffmpeg already gone");
                }
            }
            _ = pump(&mut child, &mut stdout, &tx) => {}
        }
    });

    Ok(Box::pin(StreamReader::new(ReceiverStream::new(rx))))
}

/// Forward ffmpeg's stdout to `tx`, then report a failed exit as a read error
async fn pump(
    child: &mut Child,
    stdout: &mut ChildStdout,
    tx: &mpsc::Sender<std::io::Result<Bytes>>,
) {
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match stdout.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(Ok(Bytes::copy_from_slice(&buf[..n]))).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                return;
            }
        }
    }

    match child.wait().await {
        Ok(status) if status.success() => {}
        Ok(status) => {
            warn!(status = %status, "ffmpeg remux failed");
            let _ = tx
                .send(Err(std::io::Error::other(format!("ffmpeg exited with {}", status))))
                .await;
        }
        Err(e) => {
            let _ = tx.send(Err(e)).await;
        }
    }
}

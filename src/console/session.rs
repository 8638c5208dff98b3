//! # Operator console session.
//!
//! ```text
//! write prompt
//! loop {
//!   line ◄── FramedRead<input, LinesCodec>     (EOF / token → stop)
//!   write "Echo: <line>"
//!   Command::parse(line)
//!     ├─ Ok(None)       → nothing
//!     ├─ Ok(Some(cmd))  → feed.execute(cmd) → write outcome | "error: …"
//!     └─ Err(e)         → write "error: …"   (no side effects)
//!   write prompt
//! }
//! ```

use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;

use super::Command;
use crate::core::{Feed, Outcome};
use crate::error::FeedError;

/// Longest accepted console line.
const MAX_LINE_LEN: usize = 8 * 1024;

/// Reads commands from `input` until EOF or `token` is cancelled.
///
/// Ending the console does not stop the feed.
pub async fn run_console<R, W>(feed: Arc<Feed>, input: R, mut output: W, token: CancellationToken)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if let Err(e) = session(&feed, input, &mut output, &token).await {
        tracing::warn!(error = %e, "console closed");
    } else {
        tracing::debug!("console closed");
    }
}

async fn session<R, W>(
    feed: &Feed,
    input: R,
    output: &mut W,
    token: &CancellationToken,
) -> Result<(), FeedError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let prompt = feed.config().prompt.clone();
    let mut lines = FramedRead::new(input, LinesCodec::new_with_max_length(MAX_LINE_LEN));

    write(output, &prompt).await?;
    loop {
        let next = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            next = lines.next() => next,
        };
        let line = match next {
            None => return Ok(()),
            Some(Ok(line)) => line,
            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                write(output, &format!("error: line longer than {MAX_LINE_LEN} bytes\n")).await?;
                write(output, &prompt).await?;
                continue;
            }
            Some(Err(LinesCodecError::Io(e))) => return Err(e.into()),
        };

        write(output, &format!("Echo: {line}\n")).await?;
        let reply = match Command::parse(&line) {
            Ok(None) => None,
            Ok(Some(command)) => Some(feed.execute(command).await),
            Err(e) => Some(Err(e.into())),
        };
        let quit = matches!(reply, Some(Ok(Outcome::Quit)));
        match reply {
            Some(Ok(outcome)) => write(output, &format!("{outcome}\n")).await?,
            Some(Err(e)) => {
                tracing::debug!(error = e.as_label(), "command rejected");
                write(output, &format!("error: {}\n", e.as_message())).await?;
            }
            None => {}
        }
        if quit {
            return Ok(());
        }
        write(output, &prompt).await?;
    }
}

async fn write<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<(), FeedError> {
    output.write_all(text.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}

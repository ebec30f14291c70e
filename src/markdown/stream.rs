//! Paced reveal of a finished response.
//!
//! [`reveal`] turns a completed markdown response into a lazy stream of
//! rendered HTML chunks with a fixed pause between them. The stream owns its
//! chunks, so creating it again replays the same sequence from the first
//! chunk; nothing here touches the DOM or the transport. The SSE endpoint
//! subscribes to it and the page animates each chunk as it arrives.

use std::time::Duration;

use futures::Stream;

use super::{chunk_text, parse_markdown, strip_think};

/// Default pause between revealed chunks.
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(60);

/// Slower pause used on development builds.
pub const DEV_CHUNK_DELAY: Duration = Duration::from_millis(90);

/// Stream the rendered chunks of `text`, pausing `chunk_delay` after each.
///
/// Chunking and rendering follow [`chunk_text`] and [`parse_markdown`];
/// `<think>` sections are stripped before chunking. The chunk contents are
/// deterministic for a given input; only the pacing is time-dependent.
pub fn reveal(text: &str, chunk_delay: Duration) -> impl Stream<Item = String> + Send + use<> {
    let chunks = chunk_text(&strip_think(text));

    async_stream::stream! {
        for chunk in chunks {
            yield parse_markdown(&chunk);
            tokio::time::sleep(chunk_delay).await;
        }
    }
}

// SPDX-License-Identifier: Apache-2.0

use std::io::Write;
use tracing::debug;

use crate::BoxError;
use crate::event_queue::EventReceiver;

/// Write every event as one JSON line until all senders are gone. Returns
/// the number of events written.
pub fn forward_events<W: Write>(rx: EventReceiver, mut out: W) -> Result<usize, BoxError> {
    let mut count = 0;
    while let Some(event) = rx.recv_blocking() {
        serde_json::to_writer(&mut out, &event)?;
        out.write_all(b"\n")?;
        out.flush()?;
        count += 1;
    }
    debug!(events = count, "Event queue closed, forwarder exiting");
    Ok(count)
}

//! Reader worker: pulls packets from the source and feeds the decoder.
//!
//! The reader owns the seek protocol's first half. A pending seek is
//! taken-and-cleared at the top of every loop; the marker is pushed onto
//! the packet queue *before* the source repositions, so the decoder is
//! guaranteed to observe the boundary ahead of any post-seek packet. The
//! queue is flushed first so the marker isn't stuck behind stale packets.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use pm_common::{EngineError, Frame, Timestamp};

use crate::controller::{PartsCell, PipelineParams};
use crate::decode::decode_main;
use crate::msg::PipelineMsg;
use crate::queue::MsgQueue;

/// How long the reader naps when the source has nothing yet.
const PULL_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Seek mailbox shared between the controller and the reader thread.
/// A later request simply replaces an earlier pending one.
#[derive(Default)]
pub(crate) struct ReaderCtl {
    pub(crate) request_seek: Mutex<Option<Timestamp>>,
}

pub(crate) fn reader_main(
    cell: Arc<PartsCell>,
    ctl: Arc<ReaderCtl>,
    sink: Arc<MsgQueue<Option<Frame>>>,
    params: PipelineParams,
) {
    debug!("reader thread starting");

    let Some(mut source) = cell.source.lock().take() else {
        error!("packet source unavailable");
        sink.finish(EngineError::External("packet source unavailable".into()));
        return;
    };

    // Packet queue: communication reader <-> decoder.
    let pkt_queue = Arc::new(MsgQueue::new(params.max_nb_packets));

    let decoder_handle = {
        let cell = cell.clone();
        let pkt_queue = pkt_queue.clone();
        let sink = sink.clone();
        let params = params.clone();
        thread::Builder::new()
            .name("playmill-decoder".to_string())
            .spawn(move || decode_main(cell, pkt_queue, sink, params))
    };
    let decoder_handle = match decoder_handle {
        Ok(handle) => handle,
        Err(err) => {
            error!(%err, "unable to start decoding thread");
            sink.finish(EngineError::External(err.to_string()));
            *cell.source.lock() = Some(source);
            return;
        }
    };

    let mut pkt_index: i64 = 0;
    let mut status = EngineError::Eof;

    loop {
        // Take-and-clear the pending seek under the mailbox lock.
        let pending = ctl.request_seek.lock().take();

        if let Some(target) = pending {
            debug!(target = %target, "forwarding seek to decoder");
            // Drop stale packets so the marker is processed ASAP.
            pkt_queue.flush();
            if let Err(err) = pkt_queue.send(PipelineMsg::Seek(target)) {
                pkt_queue.finish(err.clone());
                status = err;
                break;
            }
            // Reposition the source; the next pull lands near the target.
            if let Err(err) = source.seek(target) {
                warn!(%err, target = %target, "source seek failed");
                status = err;
                break;
            }
        }

        let pkt = match source.pull_packet() {
            Ok(pkt) => pkt,
            Err(EngineError::Again) => {
                thread::sleep(PULL_RETRY_INTERVAL);
                continue;
            }
            Err(err) => {
                status = err;
                break;
            }
        };

        let index = pkt_index;
        pkt_index += 1;
        if params.pkt_skip_mod > 1 && !pkt.keyframe && index % params.pkt_skip_mod != 0 {
            trace!(index, "thinning non-key packet");
            continue;
        }

        trace!(size = pkt.data.len(), pts = pkt.pts, "queueing packet");
        if let Err(err) = pkt_queue.send(PipelineMsg::Packet(pkt)) {
            if !err.is_eof() {
                error!(%err, "unable to send packet to decoder");
            }
            status = err;
            break;
        }
    }

    // Notify the decoder so it drains and dies, then wait for it.
    debug!(%status, "notifying decoder");
    pkt_queue.finish(status);
    if decoder_handle.join().is_err() {
        error!("decoding thread panicked");
    }

    *cell.source.lock() = Some(source);
    debug!("reader thread ending");
}

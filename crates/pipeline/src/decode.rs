//! Decode worker: drives the decoder capability and hosts the filterer.
//!
//! The worker consumes the packet queue one message at a time. Packets
//! go to the capability; a seek marker makes it drain the capability,
//! flush the frames queue, and arm the sink's fixup filter — after the
//! drain the capability is quiescent, so every frame emitted from then
//! on is measured against the new target. On upstream EOF the worker
//! submits empty packets until the capability reports it has nothing
//! left, flushes once more so reordered tails and the cached skipped
//! frame surface, and tears down in reverse order of construction.

use std::sync::Arc;

use tracing::{debug, error, warn};

use pm_common::{EngineError, Frame};

use crate::controller::{PartsCell, PipelineParams};
use crate::msg::PipelineMsg;
use crate::queue::MsgQueue;
use crate::sink::FrameSink;

pub(crate) fn decode_main(
    cell: Arc<PartsCell>,
    pkt_queue: Arc<MsgQueue<PipelineMsg>>,
    sink_queue: Arc<MsgQueue<Option<Frame>>>,
    params: PipelineParams,
) {
    debug!("decoder thread starting");

    let Some(mut decoder) = cell.decoder.lock().take() else {
        error!("decoder capability unavailable");
        let err = EngineError::External("decoder unavailable".into());
        pkt_queue.cancel(err.clone());
        sink_queue.finish(err);
        return;
    };

    // Frames queue: communication decode <-> filter.
    let frames_queue = Arc::new(MsgQueue::new(params.max_nb_frames));
    let sink = FrameSink::new(
        frames_queue.clone(),
        params.timebase,
        params.use_pkt_duration,
    );

    if let Err(err) = decoder.init(sink.clone(), &params.decode) {
        error!(%err, "decoder init failed");
        // Fail fast so neither the reader nor the client blocks on a
        // queue nothing will ever service.
        pkt_queue.cancel(err.clone());
        sink_queue.finish(err);
        *cell.decoder.lock() = Some(decoder);
        return;
    }

    // Wire and spawn the filterer.
    {
        let Some(mut filter) = cell.filter.lock().take() else {
            error!("filter graph unavailable");
            decoder.uninit();
            let err = EngineError::External("filter unavailable".into());
            pkt_queue.cancel(err.clone());
            sink_queue.finish(err);
            *cell.decoder.lock() = Some(decoder);
            return;
        };
        if let Err(err) = filter.init(frames_queue.clone(), sink_queue.clone(), params.sw_pix_fmt)
        {
            error!(%err, "filter init failed");
            *cell.filter.lock() = Some(filter);
            decoder.uninit();
            pkt_queue.cancel(err.clone());
            sink_queue.finish(err);
            *cell.decoder.lock() = Some(decoder);
            return;
        }
        *cell.filter.lock() = Some(filter);
    }
    let filterer_handle = {
        let cell = cell.clone();
        std::thread::Builder::new()
            .name("playmill-filterer".to_string())
            .spawn(move || {
                if let Some(mut filter) = cell.filter.lock().take() {
                    debug!("filtering thread starting");
                    filter.run();
                    debug!("filtering thread ending");
                    *cell.filter.lock() = Some(filter);
                }
            })
    };
    let filterer_handle = match filterer_handle {
        Ok(handle) => handle,
        Err(err) => {
            error!(%err, "unable to start filtering thread");
            decoder.uninit();
            let err = EngineError::External(err.to_string());
            pkt_queue.cancel(err.clone());
            sink_queue.finish(err);
            *cell.decoder.lock() = Some(decoder);
            return;
        }
    };

    // Main packet decoding loop.
    let mut status = EngineError::Eof;
    loop {
        match pkt_queue.recv() {
            Err(err) => {
                // Upstream is done (or dead); stop it from producing more.
                pkt_queue.cancel(err.clone());
                status = err;
                break;
            }
            Ok(PipelineMsg::Seek(target)) => {
                debug!(target = %target, "seek marker in packet queue");
                // Drain the capability: after this it emits nothing until
                // a new packet arrives, so the arm below races nothing.
                decoder.flush();
                // Drop already-decoded frames belonging to the old
                // position so the client is not fed stale matches.
                frames_queue.flush();
                sink.arm_seek(target);
            }
            Ok(PipelineMsg::Packet(pkt)) => match decoder.push_packet(Some(pkt)) {
                Ok(()) => {}
                Err(EngineError::InvalidData) => {
                    warn!("discarding invalid packet");
                }
                Err(err) => {
                    if !err.is_eof() {
                        error!(%err, "decode failed");
                    }
                    status = err;
                    break;
                }
            },
        }
    }

    // Drain cached frames out of the capability.
    debug!("draining decoder");
    loop {
        match decoder.push_packet(None) {
            Ok(()) | Err(EngineError::Again) => continue,
            Err(_) => break,
        }
    }
    // Surface reordered tails and the cached skipped frame.
    decoder.flush();
    decoder.uninit();

    debug!(%status, "notifying filterer");
    frames_queue.finish(status.clone());
    if filterer_handle.join().is_err() {
        error!("filtering thread panicked");
    }
    if let Some(mut filter) = cell.filter.lock().take() {
        filter.uninit();
        *cell.filter.lock() = Some(filter);
    }

    // Stop the reader promptly (it may be blocked mid-send).
    pkt_queue.cancel(if status.is_eof() {
        EngineError::Eof
    } else {
        status
    });

    *cell.decoder.lock() = Some(decoder);
    debug!("decoder thread ending");
}

//! Messages carried by the packet queue.

use pm_common::{Packet, Timestamp};

/// One message on the reader → decoder queue.
///
/// Seek markers share the queue with packets so their ordering relative
/// to the surrounding packets is preserved: everything queued before the
/// marker belongs to the old position, everything after it to the new
/// one. Dropping a message releases its payload either way.
#[derive(Debug)]
pub enum PipelineMsg {
    /// A compressed packet bound for the decoder.
    Packet(Packet),
    /// Seek boundary: the decoder must flush and re-arm at this target
    /// (canonical time base).
    Seek(Timestamp),
}

//! Action types for state machine I/O requests.

/// Action requested by a state machine.
///
/// The caller performs the requested I/O and calls `step()` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Read the next packet into `buffer_set.read_buffer`, then call
    /// `step()` again.
    NeedPacket,

    /// A result set ended and another one follows.
    ///
    /// The response is not finished: reading the next packet and calling
    /// `step()` starts the next result set.
    ResultSetEnd,

    /// The response is complete. No packet of it remains on the wire.
    Finished,
}

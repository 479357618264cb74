//! Buffer set for state machine operations.

/// Buffers owned by a connection and lent to state machines.
#[derive(Debug)]
pub struct BufferSet {
    /// Payload of the last packet read
    pub read_buffer: Vec<u8>,
    /// Command payload being assembled
    pub write_buffer: Vec<u8>,
}

impl BufferSet {
    /// Create a new buffer set.
    pub fn new() -> Self {
        Self {
            read_buffer: Vec::with_capacity(8192),
            write_buffer: Vec::with_capacity(8192),
        }
    }

    /// Clear the write buffer and return it for a new command.
    pub fn new_command(&mut self) -> &mut Vec<u8> {
        self.write_buffer.clear();
        &mut self.write_buffer
    }
}

impl Default for BufferSet {
    fn default() -> Self {
        Self::new()
    }
}

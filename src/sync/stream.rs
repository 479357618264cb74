//! Blocking sockets and packet framing.

use std::io::{BufReader, Read, Write};
use std::net::TcpStream;
use std::os::unix::net::UnixStream;

use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::protocol::packet::{
    HEADER_LEN, MAX_PAYLOAD_LEN, check_sequence, chunks, decode_header, encode_header,
};
use crate::transport::{SessionInfo, Transport};

/// A TCP or Unix socket to a MySQL server.
pub enum Stream {
    Tcp(BufReader<TcpStream>),
    Unix(BufReader<UnixStream>),
}

impl Stream {
    pub fn tcp(stream: TcpStream) -> Self {
        Self::Tcp(BufReader::new(stream))
    }

    pub fn unix(stream: UnixStream) -> Self {
        Self::Unix(BufReader::new(stream))
    }

    /// Open the socket described by `opts`. The MySQL handshake is not
    /// performed.
    pub fn connect(opts: &Opts) -> Result<Self> {
        if let Some(socket_path) = &opts.socket {
            return Ok(Self::unix(UnixStream::connect(socket_path)?));
        }
        if opts.host.is_empty() {
            return Err(Error::InvalidUsage("host is empty".into()));
        }
        let tcp = TcpStream::connect((opts.host.as_str(), opts.port))?;
        tcp.set_nodelay(true)?;
        Ok(Self::tcp(tcp))
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Stream::Tcp(r) => r.read(buf),
            Stream::Unix(r) => r.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Stream::Tcp(r) => r.get_mut().write(buf),
            Stream::Unix(r) => r.get_mut().write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Stream::Tcp(r) => r.get_mut().flush(),
            Stream::Unix(r) => r.get_mut().flush(),
        }
    }
}

/// Packet framing over a byte stream that completed the handshake.
pub struct PacketStream<S> {
    stream: S,
    session: SessionInfo,
    sequence_id: u8,
}

impl<S: Read + Write> PacketStream<S> {
    /// Wrap an authenticated stream.
    pub fn new(stream: S, session: SessionInfo) -> Self {
        Self {
            stream,
            session,
            sequence_id: 0,
        }
    }

    /// Get the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Unwrap the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: Read + Write> Transport for PacketStream<S> {
    fn send_command(&mut self, payload: &[u8]) -> Result<()> {
        self.sequence_id = 0;
        for chunk in chunks(payload) {
            self.stream
                .write_all(&encode_header(chunk.len(), self.sequence_id))?;
            self.stream.write_all(chunk)?;
            self.sequence_id = self.sequence_id.wrapping_add(1);
        }
        self.stream.flush()?;
        Ok(())
    }

    fn read_packet(&mut self, buf: &mut Vec<u8>) -> Result<()> {
        buf.clear();
        loop {
            let mut header = [0u8; HEADER_LEN];
            self.stream.read_exact(&mut header)?;
            let (len, sequence_id) = decode_header(header);
            check_sequence(self.sequence_id, sequence_id)?;
            self.sequence_id = self.sequence_id.wrapping_add(1);

            let start = buf.len();
            buf.resize(start + len, 0);
            self.stream.read_exact(&mut buf[start..])?;
            if len < MAX_PAYLOAD_LEN {
                return Ok(());
            }
        }
    }

    fn session(&self) -> SessionInfo {
        self.session
    }
}

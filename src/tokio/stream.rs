//! Async sockets and packet framing for tokio.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf};
use tokio::net::TcpStream;
use tokio::net::UnixStream;

use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::protocol::packet::{
    HEADER_LEN, MAX_PAYLOAD_LEN, check_sequence, chunks, decode_header, encode_header,
};
use crate::transport::{AsyncTransport, SessionInfo};

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
    pub async fn connect(opts: &Opts) -> Result<Self> {
        if let Some(socket_path) = &opts.socket {
            return Ok(Self::unix(UnixStream::connect(socket_path).await?));
        }
        if opts.host.is_empty() {
            return Err(Error::InvalidUsage("host is empty".into()));
        }
        let tcp = TcpStream::connect((opts.host.as_str(), opts.port)).await?;
        tcp.set_nodelay(true)?;
        Ok(Self::tcp(tcp))
    }
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(r) => Pin::new(r).poll_read(cx, buf),
            Stream::Unix(r) => Pin::new(r).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Stream::Tcp(r) => Pin::new(r).poll_write(cx, buf),
            Stream::Unix(r) => Pin::new(r).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(r) => Pin::new(r).poll_flush(cx),
            Stream::Unix(r) => Pin::new(r).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(r) => Pin::new(r).poll_shutdown(cx),
            Stream::Unix(r) => Pin::new(r).poll_shutdown(cx),
        }
    }
}

/// Packet framing over an async byte stream that completed the handshake.
pub struct PacketStream<S> {
    stream: S,
    session: SessionInfo,
    sequence_id: u8,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> PacketStream<S> {
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

impl<S: AsyncRead + AsyncWrite + Unpin + Send> AsyncTransport for PacketStream<S> {
    async fn send_command(&mut self, payload: &[u8]) -> Result<()> {
        self.sequence_id = 0;
        for chunk in chunks(payload) {
            self.stream
                .write_all(&encode_header(chunk.len(), self.sequence_id))
                .await?;
            self.stream.write_all(chunk).await?;
            self.sequence_id = self.sequence_id.wrapping_add(1);
        }
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_packet(&mut self, buf: &mut Vec<u8>) -> Result<()> {
        buf.clear();
        loop {
            let mut header = [0u8; HEADER_LEN];
            self.stream.read_exact(&mut header).await?;
            let (len, sequence_id) = decode_header(header);
            check_sequence(self.sequence_id, sequence_id)?;
            self.sequence_id = self.sequence_id.wrapping_add(1);

            let start = buf.len();
            buf.resize(start + len, 0);
            self.stream.read_exact(&mut buf[start..]).await?;
            if len < MAX_PAYLOAD_LEN {
                return Ok(());
            }
        }
    }

    fn session(&self) -> SessionInfo {
        self.session
    }
}

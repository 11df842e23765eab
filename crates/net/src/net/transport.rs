use std::io::{self, BufWriter};
use std::net::{IpAddr, Ipv4Addr, Shutdown, SocketAddr, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use super::codec::{FrameReader, write_frame};
use super::error::TransportError;
use super::protocol::MAX_FRAME_LEN;

/// Reliable ordered channel carrying whole records to one peer.
pub trait Transport: Send + Sync {
    fn send(&self, body: &[u8]) -> Result<(), TransportError>;
    fn close(&self);
    fn is_open(&self) -> bool;
    fn peer_addr(&self) -> Option<SocketAddr>;
}

pub struct TcpTransport {
    writer: Mutex<BufWriter<TcpStream>>,
    control: TcpStream,
    peer: SocketAddr,
    open: AtomicBool,
}

impl TcpTransport {
    /// Splits a connected stream into a sending transport and the blocking
    /// reader for its receive thread.
    pub fn split(stream: TcpStream) -> io::Result<(Self, FrameReader<TcpStream>)> {
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let reader = stream.try_clone()?;
        let control = stream.try_clone()?;

        Ok((
            Self {
                writer: Mutex::new(BufWriter::new(stream)),
                control,
                peer,
                open: AtomicBool::new(true),
            },
            FrameReader::new(reader),
        ))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.control.local_addr()
    }
}

impl Transport for TcpTransport {
    fn send(&self, body: &[u8]) -> Result<(), TransportError> {
        if !self.is_open() {
            return Ok(());
        }
        if body.len() > MAX_FRAME_LEN {
            return Err(TransportError::FrameTooLarge(body.len()));
        }

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        match write_frame(&mut *writer, body) {
            Ok(()) => Ok(()),
            // A concurrent close races with this write; that is not the caller's problem.
            Err(_) if !self.is_open() => Ok(()),
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            let _ = self.control.shutdown(Shutdown::Both);
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        Some(self.peer)
    }
}

/// In-process transport that keeps every sent record for inspection or
/// for handing to a peer living in the same process.
#[derive(Debug)]
pub struct MemoryTransport {
    sent: Mutex<Vec<Vec<u8>>>,
    open: AtomicBool,
    failing: AtomicBool,
    peer: Option<SocketAddr>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            open: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            peer: None,
        }
    }

    pub fn with_peer(peer: SocketAddr) -> Self {
        Self {
            peer: Some(peer),
            ..Self::new()
        }
    }

    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Makes every later send fail with a broken pipe while set.
    pub fn fail_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    fn send(&self, body: &[u8]) -> Result<(), TransportError> {
        if !self.is_open() {
            return Ok(());
        }
        if self.failing.load(Ordering::Acquire) {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe).into());
        }
        if body.len() > MAX_FRAME_LEN {
            return Err(TransportError::FrameTooLarge(body.len()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(body.to_vec());
        Ok(())
    }

    fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}

/// Discovers the address other peers know this host by.
pub trait AddressResolver: Send + Sync {
    fn local_address(&self) -> IpAddr;
}

/// Asks the OS which interface would route outbound traffic. Nothing is
/// sent; falls back to loopback on hosts without a route.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl AddressResolver for SystemResolver {
    fn local_address(&self) -> IpAddr {
        let probe = || -> io::Result<IpAddr> {
            let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
            socket.connect((Ipv4Addr::new(192, 0, 2, 1), 9))?;
            Ok(socket.local_addr()?.ip())
        };

        match probe() {
            Ok(ip) if !ip.is_unspecified() => ip,
            Ok(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
            Err(e) => {
                log::debug!(target: "serfnet::session", "Local address lookup failed: {}", e);
                IpAddr::V4(Ipv4Addr::LOCALHOST)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedAddress(pub IpAddr);

impl AddressResolver for FixedAddress {
    fn local_address(&self) -> IpAddr {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_memory_transport_records_until_closed() {
        let transport = MemoryTransport::new();
        transport.send(&[1, 2]).unwrap();
        transport.close();
        transport.send(&[3]).unwrap();

        assert!(!transport.is_open());
        assert_eq!(transport.take_sent(), vec![vec![1, 2]]);
        assert_eq!(transport.sent_count(), 0);
    }

    #[test]
    fn test_tcp_transport_frames_records() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let client = TcpStream::connect(addr).unwrap();
        let (accepted, _) = listener.accept().unwrap();

        let (sender, _) = TcpTransport::split(client).unwrap();
        let (_, mut reader) = TcpTransport::split(accepted).unwrap();

        sender.send(&[7, 8, 9]).unwrap();
        assert_eq!(reader.read_frame().unwrap(), Some(vec![7, 8, 9]));

        sender.close();
        assert!(!sender.is_open());
        sender.send(&[1]).unwrap();
        assert_eq!(reader.read_frame().unwrap(), None);
    }

    #[test]
    fn test_fixed_address_resolver() {
        let ip: IpAddr = "10.1.2.3".parse().unwrap();
        assert_eq!(FixedAddress(ip).local_address(), ip);
    }
}

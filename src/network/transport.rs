//! Datagram transports.
//!
//! Both implementations are unreliable in the same way the protocol assumes:
//! a send is fire-and-forget, and nothing is acknowledged or retried.

use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{Mutex, mpsc};

use crate::config::PROTOCOL_PORT;
use crate::error::{Error, Result};
use crate::protocol::{Envelope, ProtocolMessage};
use crate::Address;

const MAX_DATAGRAM: usize = 65_507;

pub trait Transport {
    fn local_address(&self) -> &str;

    fn send(&self, to: &str, message: &ProtocolMessage) -> impl Future<Output = Result<()>> + Send;

    /// Waits for the next inbound message and its sender.
    fn recv(&mut self) -> impl Future<Output = Result<(Address, ProtocolMessage)>> + Send;
}

pub struct UdpTransport {
    address: Address,
    socket: UdpSocket,
    peers: BTreeMap<Address, SocketAddr>,
    buffer: Vec<u8>,
}

impl UdpTransport {
    pub async fn bind(address: Address, bind: SocketAddr, peers: BTreeMap<Address, SocketAddr>) -> Result<Self> {
        let socket = UdpSocket::bind(bind).await?;
        debug!("{}: listening on {}", address, socket.local_addr()?);
        Ok(Self {
            address,
            socket,
            peers,
            buffer: vec![0u8; MAX_DATAGRAM],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    fn resolve(&self, to: &str) -> Result<SocketAddr> {
        if let Some(addr) = self.peers.get(to) {
            return Ok(*addr);
        }
        to.parse::<IpAddr>()
            .map(|ip| SocketAddr::new(ip, PROTOCOL_PORT))
            .map_err(|_| Error::UnknownPeer(to.to_string()))
    }
}

impl Transport for UdpTransport {
    fn local_address(&self) -> &str {
        &self.address
    }

    async fn send(&self, to: &str, message: &ProtocolMessage) -> Result<()> {
        let target = self.resolve(to)?;
        let data = Envelope::new(self.address.clone(), message.clone()).serialize()?;
        self.socket.send_to(&data, target).await?;
        debug!("{}: sent {} to {} ({})", self.address, message.kind(), to, target);
        Ok(())
    }

    async fn recv(&mut self) -> Result<(Address, ProtocolMessage)> {
        loop {
            let (len, source) = self.socket.recv_from(&mut self.buffer).await?;
            match Envelope::deserialize(&self.buffer[..len]) {
                Ok(envelope) => return Ok((envelope.from, envelope.message)),
                Err(e) => warn!("{}: undecodable datagram from {}: {}", self.address, source, e),
            }
        }
    }
}

type Inbox = mpsc::UnboundedSender<(Address, ProtocolMessage)>;

/// In-process datagram network: one unbounded queue per registered address.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    inboxes: Arc<Mutex<HashMap<Address, Inbox>>>,
}

pub struct MemoryTransport {
    address: Address,
    network: MemoryNetwork,
    inbox: mpsc::UnboundedReceiver<(Address, ProtocolMessage)>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn endpoint(&self, address: impl Into<Address>) -> MemoryTransport {
        let address = address.into();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inboxes.lock().await.insert(address.clone(), tx);
        MemoryTransport {
            address,
            network: self.clone(),
            inbox: rx,
        }
    }
}

impl Transport for MemoryTransport {
    fn local_address(&self) -> &str {
        &self.address
    }

    async fn send(&self, to: &str, message: &ProtocolMessage) -> Result<()> {
        let inboxes = self.network.inboxes.lock().await;
        let inbox = inboxes.get(to).ok_or_else(|| Error::UnknownPeer(to.to_string()))?;
        if inbox.send((self.address.clone(), message.clone())).is_err() {
            debug!("{}: {} is gone, dropping {}", self.address, to, message.kind());
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<(Address, ProtocolMessage)> {
        self.inbox.recv().await.ok_or(Error::ChannelClosed)
    }
}

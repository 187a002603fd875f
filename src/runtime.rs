use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::network::Transport;
use crate::protocol::{CompletedRound, DataPacket, Host, Monitor, MonitorCommand, Outbound, ProtocolMessage, Router, Snapshot};

const RECV_BACKOFF: Duration = Duration::from_millis(100);

/// Sends every outbound message. A failed send is logged and skipped, the
/// protocol has no retransmission.
pub async fn dispatch<T: Transport>(transport: &T, outbound: Vec<Outbound>) {
    for Outbound { to, message } in outbound {
        if let Err(e) = transport.send(&to, &message).await {
            warn!("{}: failed to send {} to {}: {}", transport.local_address(), message.kind(), to, e);
        }
    }
}

/// Runs a router until its transport closes.
pub async fn run_router<T: Transport>(mut router: Router, mut transport: T) -> Result<()> {
    info!("Starting router {} with neighbors {:?}", router.address(), router.neighbors());

    loop {
        let (from, message) = match transport.recv().await {
            Ok(received) => received,
            Err(Error::ChannelClosed) => {
                info!("{}: transport closed, stopping", router.address());
                return Ok(());
            }
            Err(e) => {
                error!("{}: receive error: {}", router.address(), e);
                tokio::time::sleep(RECV_BACKOFF).await;
                continue;
            }
        };

        match router.handle(&from, message) {
            Ok(handled) => {
                debug!("{}: {:?}", router.address(), handled.disposition);
                dispatch(&transport, handled.outbound).await;
            }
            Err(e) => warn!("{}: rejected message from {}: {}", router.address(), from, e),
        }
    }
}

/// Announces the host to its routers, then hands every accepted packet to
/// `on_packet` until the transport closes.
pub async fn run_host<T, F>(host: Host, mut transport: T, mut on_packet: F) -> Result<()>
where
    T: Transport,
    F: FnMut(DataPacket),
{
    info!("Starting host {} behind {:?}", host.address(), host.gateway());
    dispatch(&transport, host.announce()).await;

    loop {
        match transport.recv().await {
            Ok((from, message)) => {
                if let Some(packet) = host.receive(&from, message) {
                    on_packet(packet);
                }
            }
            Err(Error::ChannelClosed) => return Ok(()),
            Err(e) => {
                error!("{}: receive error: {}", host.address(), e);
                tokio::time::sleep(RECV_BACKOFF).await;
            }
        }
    }
}

/// Drives a [`Monitor`] over a transport: collection rounds, one-off
/// snapshots and administrative commands.
pub struct MonitorService<T: Transport> {
    monitor: Monitor,
    transport: T,
    collect_timeout: Option<Duration>,
}

impl<T: Transport> MonitorService<T> {
    pub fn new(monitor: Monitor, transport: T) -> Self {
        Self {
            monitor,
            transport,
            collect_timeout: None,
        }
    }

    /// Bounds how long a round waits for stragglers. Without a timeout a
    /// silent router stalls the round forever.
    pub fn with_collect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.collect_timeout = timeout;
        self
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// One full link-state round: request every table, wait for all of
    /// them, compute and push the new tables.
    pub async fn collect_round(&mut self) -> Result<CompletedRound> {
        let requests = self.monitor.start_round();
        dispatch(&self.transport, requests).await;

        let completed = match self.collect_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.await_completion()).await {
                Ok(result) => result?,
                Err(_) => {
                    let missing = self.monitor.missing();
                    warn!("{}: round timed out, missing {:?}", self.monitor.address(), missing);
                    return Err(Error::CollectTimeout {
                        secs: limit.as_secs(),
                        missing,
                    });
                }
            },
            None => self.await_completion().await?,
        };

        dispatch(&self.transport, completed.commands()).await;
        info!("{}: pushed {} routing tables", self.monitor.address(), completed.tables.len());
        Ok(completed)
    }

    async fn await_completion(&mut self) -> Result<CompletedRound> {
        loop {
            let (from, message) = self.transport.recv().await?;
            match self.monitor.handle(&from, message) {
                Ok(Some(completed)) => return Ok(completed),
                Ok(None) => {}
                Err(e) => warn!("{}: {}", self.monitor.address(), e),
            }
        }
    }

    /// Periodic rounds. A timed-out round is logged and the next one starts
    /// on schedule.
    pub async fn watch(&mut self, period: Duration) -> Result<()> {
        let mut ticker = tokio::time::interval(period);
        // A stalled round must not be followed by a burst of catch-up rounds.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.collect_round().await {
                Ok(round) => debug!("{}: round {:?} done", self.monitor.address(), round.round),
                Err(Error::CollectTimeout { missing, .. }) => {
                    warn!("{}: skipping round, no answer from {:?}", self.monitor.address(), missing)
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Sends `command` to one router, or to every known router.
    pub async fn command(&self, target: Option<&str>, command: MonitorCommand) {
        let outbound = match target {
            Some(router) => self.monitor.command_one(router, command),
            None => self.monitor.command_all(command),
        };
        dispatch(&self.transport, outbound).await;
    }

    /// Fetches one router's current table outside of any round.
    pub async fn snapshot(&mut self, router: &str) -> Result<Snapshot> {
        self.command(Some(router), MonitorCommand::get_snapshot()).await;

        match self.collect_timeout {
            Some(limit) => tokio::time::timeout(limit, self.await_snapshot(router))
                .await
                .map_err(|_| Error::CollectTimeout {
                    secs: limit.as_secs(),
                    missing: vec![router.to_string()],
                })?,
            None => self.await_snapshot(router).await,
        }
    }

    async fn await_snapshot(&mut self, router: &str) -> Result<Snapshot> {
        loop {
            match self.transport.recv().await? {
                (from, ProtocolMessage::MonitorResponse(snapshot)) if from == router => return Ok(snapshot),
                (from, other) => debug!("{}: ignoring {} from {}", self.monitor.address(), other.kind(), from),
            }
        }
    }
}

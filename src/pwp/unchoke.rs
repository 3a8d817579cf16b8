use super::message::{Message, MessageId, read_message};
use crate::{millisec, sec};
use std::io::{self, Read};
use std::net::TcpStream;
use std::time::Duration;

/// How long to wait for the remote peer to unchoke us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnchokePolicy {
    /// Readiness waits that may time out before giving up.
    pub attempts: usize,
    /// Length of one readiness wait.
    pub timeout: Duration,
    /// Cap on messages processed while waiting.
    pub max_messages: usize,
}

impl Default for UnchokePolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            timeout: sec!(10),
            max_messages: 64,
        }
    }
}

/// A byte stream that can wait a bounded time for incoming data.
pub trait PeerStream: Read {
    /// `Ok(false)` if nothing arrived within `timeout`. `Ok(true)` if data is available or the
    /// peer closed the connection, so that the next read does not block.
    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Run `f` with every read inside it failing after `timeout` without data, then restore the
    /// previous read timeout.
    fn with_read_timeout<T>(
        &mut self,
        timeout: Duration,
        f: impl FnOnce(&mut Self) -> T,
    ) -> io::Result<T>;
}

impl PeerStream for TcpStream {
    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        let mut first_byte = [0u8; 1];
        match self.with_read_timeout(timeout, |sock| sock.peek(&mut first_byte))? {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn with_read_timeout<T>(
        &mut self,
        timeout: Duration,
        f: impl FnOnce(&mut Self) -> T,
    ) -> io::Result<T> {
        let previous = self.read_timeout()?;
        // a zero read timeout is rejected
        self.set_read_timeout(Some(timeout.max(millisec!(1))))?;
        let result = f(self);
        self.set_read_timeout(previous)?;
        Ok(result)
    }
}

/// Wait until the peer sends `unchoke`. See [`wait_for_unchoke_with_backlog`].
pub fn wait_for_unchoke<S: PeerStream>(stream: &mut S, policy: &UnchokePolicy) -> bool {
    wait_for_unchoke_with_backlog(stream, policy).is_some()
}

/// Read whole messages until `unchoke` arrives, and return everything else received meanwhile
/// (except keep-alives) in arrival order. Only waits that time out count against
/// `policy.attempts`. A frame must arrive in full within `policy.timeout` once it has started.
/// Gives up with `None` when attempts or `policy.max_messages` run out, or on any read error.
pub fn wait_for_unchoke_with_backlog<S: PeerStream>(
    stream: &mut S,
    policy: &UnchokePolicy,
) -> Option<Vec<Message>> {
    let mut backlog = Vec::new();
    let mut timeouts = 0usize;
    let mut processed = 0usize;

    while timeouts < policy.attempts && processed < policy.max_messages {
        match stream.wait_readable(policy.timeout) {
            Ok(true) => {}
            Ok(false) => {
                timeouts += 1;
                log::debug!(
                    "No message within {:?} ({timeouts}/{} attempts)",
                    policy.timeout,
                    policy.attempts
                );
                continue;
            }
            Err(e) => {
                log::warn!("Waiting for unchoke failed: {e}");
                return None;
            }
        }

        let msg = match stream.with_read_timeout(policy.timeout, read_message) {
            Ok(Ok(msg)) => msg,
            Ok(Err(e)) => {
                log::warn!("Waiting for unchoke failed: {e}");
                return None;
            }
            Err(e) => {
                log::warn!("Waiting for unchoke failed: {e}");
                return None;
            }
        };
        processed += 1;

        match msg.id() {
            MessageId::Unchoke => {
                log::info!("Unchoked by peer after {processed} messages");
                return Some(backlog);
            }
            MessageId::KeepAlive => log::trace!("Keep-alive while waiting for unchoke"),
            _ => {
                log::debug!("Received {msg:?} while waiting for unchoke");
                backlog.push(msg);
            }
        }
    }

    log::warn!("Peer did not unchoke ({timeouts} timeouts, {processed} messages)");
    None
}

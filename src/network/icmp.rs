//! Raw-socket ICMP echo probing
//!
//! One pinger wraps one raw ICMPv4 socket. Raw sockets see every ICMP
//! datagram arriving on the host, so each pinger stamps its echo
//! requests with a per-pinger identifier and only accepts replies
//! carrying it back.

use std::mem::MaybeUninit;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{checksum, IcmpCode, IcmpPacket, IcmpTypes};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use rand::Rng;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::time::timeout;

use crate::{RadarError, Result};

/// Echo request length: 8-byte ICMP header plus an 8-byte payload
const ECHO_REQUEST_LEN: usize = 16;

/// Minimum reply length: IPv4 header plus ICMP echo header
const MIN_REPLY_LEN: usize = 28;

/// A matched echo reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingReply {
    pub rtt: Duration,
}

/// Raw ICMP echo prober
pub struct IcmpPinger {
    socket: Socket,
    identifier: u16,
    sequence: AtomicU16,
}

impl IcmpPinger {
    /// Open a raw ICMPv4 socket. Requires CAP_NET_RAW or equivalent;
    /// a permission failure here is the engine's fatal startup case.
    pub fn new() -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                RadarError::Permission(
                    "raw ICMP socket denied; run with elevated privileges".to_string(),
                )
            } else {
                RadarError::Network(e.to_string())
            }
        })?;

        socket
            .set_nonblocking(true)
            .map_err(|e| RadarError::Network(e.to_string()))?;

        Ok(Self {
            socket,
            identifier: rand::thread_rng().gen::<u16>(),
            sequence: AtomicU16::new(0),
        })
    }

    /// Send one echo request and wait up to `wait` for the matching
    /// reply. `None` means the probe timed out; only socket-level
    /// failures surface as errors, and callers treat those as loss too.
    pub async fn ping(&self, target: Ipv4Addr, wait: Duration) -> Result<Option<PingReply>> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.send_echo_request(target, sequence)?;

        let started = Instant::now();
        match timeout(wait, self.wait_for_reply(target, sequence, started)).await {
            Ok(reply) => reply.map(Some),
            Err(_) => Ok(None),
        }
    }

    fn send_echo_request(&self, target: Ipv4Addr, sequence: u16) -> Result<()> {
        let mut buffer = [0u8; ECHO_REQUEST_LEN];
        {
            let mut echo = MutableEchoRequestPacket::new(&mut buffer)
                .ok_or_else(|| RadarError::Network("echo request buffer too small".to_string()))?;
            echo.set_icmp_type(IcmpTypes::EchoRequest);
            echo.set_icmp_code(IcmpCode(0));
            echo.set_identifier(self.identifier);
            echo.set_sequence_number(sequence);
            echo.set_checksum(0);
        }

        let sum = IcmpPacket::new(&buffer)
            .map(|packet| checksum(&packet))
            .ok_or_else(|| RadarError::Network("echo request buffer too small".to_string()))?;
        {
            let mut echo = MutableEchoRequestPacket::new(&mut buffer)
                .ok_or_else(|| RadarError::Network("echo request buffer too small".to_string()))?;
            echo.set_checksum(sum);
        }

        let dest = socket2::SockAddr::from(SocketAddr::new(IpAddr::V4(target), 0));
        self.socket
            .send_to(&buffer, &dest)
            .map_err(|e| RadarError::Network(e.to_string()))?;
        Ok(())
    }

    async fn wait_for_reply(
        &self,
        target: Ipv4Addr,
        sequence: u16,
        started: Instant,
    ) -> Result<PingReply> {
        let mut buffer = vec![MaybeUninit::new(0u8); 1024];

        loop {
            match self.socket.recv_from(&mut buffer) {
                Ok((received, _addr)) => {
                    if received < MIN_REPLY_LEN {
                        continue;
                    }
                    let datagram: Vec<u8> = buffer[..received]
                        .iter()
                        .map(|byte| unsafe { byte.assume_init() })
                        .collect();

                    if matches_reply(&datagram, target, self.identifier, sequence) {
                        return Ok(PingReply {
                            rtt: started.elapsed(),
                        });
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                Err(e) => return Err(RadarError::Network(e.to_string())),
            }
        }
    }
}

/// Whether `datagram` is an echo reply from the probed target stamped
/// with our identifier and the probe's sequence number.
///
/// The source check matters: identifiers are random per pinger, so two
/// concurrent probes can collide on identifier and sequence, and a raw
/// socket sees both replies.
fn matches_reply(datagram: &[u8], target: Ipv4Addr, identifier: u16, sequence: u16) -> bool {
    let Some(ip_packet) = Ipv4Packet::new(datagram) else {
        return false;
    };
    if ip_packet.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
        return false;
    }
    if ip_packet.get_source() != target {
        return false;
    }

    let offset = (ip_packet.get_header_length() as usize) * 4;
    if offset >= datagram.len() {
        return false;
    }

    let Some(reply) = EchoReplyPacket::new(&datagram[offset..]) else {
        return false;
    };
    reply.get_icmp_type() == IcmpTypes::EchoReply
        && reply.get_identifier() == identifier
        && reply.get_sequence_number() == sequence
}

/// Startup capability check: prove we can open a raw socket and complete
/// an echo exchange against loopback.
pub async fn verify_capability(wait: Duration) -> Result<()> {
    let pinger = IcmpPinger::new()?;
    match pinger.ping(Ipv4Addr::LOCALHOST, wait).await? {
        Some(_) => Ok(()),
        None => Err(RadarError::Network(
            "loopback echo probe got no reply; ICMP capability unverified".to_string(),
        )),
    }
}

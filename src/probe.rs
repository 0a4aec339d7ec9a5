use async_trait::async_trait;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use surge_ping::{Client as PingClient, Config as PingConfig, PingIdentifier, PingSequence, ICMP};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::config::ProbeKind;
use crate::error::ProbeError;

/// One best-effort reachability attempt. `Ok(false)` means unreachable;
/// `Err` is reserved for faults no retry can fix.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &str) -> Result<bool, ProbeError>;
}

pub fn from_config(kind: &ProbeKind, target: &str) -> Result<Box<dyn Prober>, ProbeError> {
    validate_target(target)?;
    let resolver = Resolver::new();
    match kind {
        ProbeKind::Icmp { timeout_ms } => {
            info!("Probing with ICMP echo (timeout {}ms)", timeout_ms);
            let prober = IcmpProber::new(resolver, target, Duration::from_millis(*timeout_ms))?;
            Ok(Box::new(prober))
        }
        ProbeKind::Tcp { port, timeout_ms } => {
            info!("Probing with TCP connect to port {} (timeout {}ms)", port, timeout_ms);
            Ok(Box::new(TcpProber::new(resolver, *port, Duration::from_millis(*timeout_ms))))
        }
    }
}

/// Accepts IP literals and RFC 1123 host names. A name whose last label is
/// all digits (`999.1.1.1`) is a mistyped address, not a host name.
pub fn validate_target(target: &str) -> Result<(), ProbeError> {
    let invalid = || ProbeError::InvalidTarget(target.to_string());
    if target.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    let name = target.strip_suffix('.').unwrap_or(target);
    if name.is_empty() || name.len() > 253 {
        return Err(invalid());
    }
    for label in name.split('.') {
        let well_formed = !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-');
        if !well_formed {
            return Err(invalid());
        }
    }
    let top_level = name.rsplit('.').next().unwrap_or(name);
    if top_level.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    Ok(())
}

pub struct Resolver {
    dns_resolver: TokioResolver,
}

impl Resolver {
    pub fn new() -> Self {
        let dns_resolver = TokioResolver::builder_with_config(
            ResolverConfig::cloudflare(),
            TokioConnectionProvider::default(),
        )
        .build();
        debug!("DNS resolver configured: Cloudflare 1.1.1.1 / 1.0.0.1");
        Self { dns_resolver }
    }

    /// `Ok(None)` when the name does not resolve; with the link down that is
    /// the expected outcome.
    pub async fn resolve(&self, target: &str) -> Result<Option<IpAddr>, ProbeError> {
        self.resolve_matching(target, |_| true).await
    }

    /// First address of `target` accepted by `usable`.
    pub async fn resolve_matching<F>(&self, target: &str, usable: F) -> Result<Option<IpAddr>, ProbeError>
    where
        F: Fn(&IpAddr) -> bool + Send,
    {
        validate_target(target)?;
        if let Ok(ip) = target.parse::<IpAddr>() {
            return Ok(Some(ip).filter(|ip| usable(ip)));
        }
        match self.dns_resolver.lookup_ip(target).await {
            Ok(lookup) => Ok(lookup.iter().find(|ip| usable(ip))),
            Err(e) => {
                debug!("DNS resolution of {} failed: {}", target, e);
                Ok(None)
            }
        }
    }
}

pub struct IcmpProber {
    resolver: Resolver,
    v4: PingClient,
    v6: Option<PingClient>,
    timeout: Duration,
    sequence: AtomicU16,
}

impl IcmpProber {
    /// Fails when `target` is an IPv6 literal and no ICMPv6 socket can be
    /// opened. Host names fall back to IPv4 addresses in that case.
    pub fn new(resolver: Resolver, target: &str, timeout: Duration) -> Result<Self, ProbeError> {
        let v4 = PingClient::new(&PingConfig::default())
            .map_err(|e| ProbeError::Unavailable(format!("ICMP socket: {}", e)))?;
        let v6 = icmpv6_client(target, PingClient::new(&PingConfig::builder().kind(ICMP::V6).build()))?;
        Ok(Self {
            resolver,
            v4,
            v6,
            timeout,
            sequence: AtomicU16::new(0),
        })
    }
}

fn icmpv6_client<C>(target: &str, opened: std::io::Result<C>) -> Result<Option<C>, ProbeError> {
    match opened {
        Ok(client) => Ok(Some(client)),
        Err(e) if matches!(target.parse::<IpAddr>(), Ok(IpAddr::V6(_))) => {
            Err(ProbeError::Unavailable(format!("ICMPv6 socket for {}: {}", target, e)))
        }
        Err(e) => {
            debug!("ICMPv6 unavailable, probing IPv4 addresses only: {}", e);
            Ok(None)
        }
    }
}

#[async_trait]
impl Prober for IcmpProber {
    async fn probe(&self, target: &str) -> Result<bool, ProbeError> {
        let has_v6 = self.v6.is_some();
        let usable = move |ip: &IpAddr| ip.is_ipv4() || has_v6;
        let Some(ip) = self.resolver.resolve_matching(target, usable).await? else {
            return Ok(false);
        };
        let client = match ip {
            IpAddr::V4(_) => &self.v4,
            IpAddr::V6(_) => match &self.v6 {
                Some(client) => client,
                None => return Err(ProbeError::Unavailable("ICMPv6 socket".into())),
            },
        };

        let payload = [0u8; 56];
        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(self.timeout);
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);

        match pinger.ping(PingSequence(seq), &payload).await {
            Ok((_, latency)) => {
                debug!("ICMP reply from {} in {:.1}ms", ip, latency.as_secs_f64() * 1000.0);
                Ok(true)
            }
            Err(e) => {
                debug!("ICMP probe to {} failed: {}", ip, e);
                Ok(false)
            }
        }
    }
}

pub struct TcpProber {
    resolver: Resolver,
    port: u16,
    timeout: Duration,
}

impl TcpProber {
    pub fn new(resolver: Resolver, port: u16, timeout: Duration) -> Self {
        Self { resolver, port, timeout }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, target: &str) -> Result<bool, ProbeError> {
        let Some(ip) = self.resolver.resolve(target).await? else {
            return Ok(false);
        };
        let addr = SocketAddr::new(ip, self.port);
        match tokio::time::timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(e)) => {
                debug!("Connection to {} refused: {}", addr, e);
                Ok(false)
            }
            Err(_) => {
                debug!("Connection to {} timed out", addr);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Answers from a fixed script, then repeats `fallback`.
    pub struct ScriptedProber {
        script: Mutex<VecDeque<bool>>,
        fallback: bool,
        calls: AtomicUsize,
    }

    impl ScriptedProber {
        pub fn new(script: impl IntoIterator<Item = bool>, fallback: bool) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                fallback,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn always(reachable: bool) -> Self {
            Self::new(Vec::<bool>::new(), reachable)
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Prober for ScriptedProber {
        async fn probe(&self, _target: &str) -> Result<bool, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.script.lock().unwrap().pop_front().unwrap_or(self.fallback))
        }
    }

    /// Fails every attempt with a capability fault.
    pub struct BrokenProber;

    #[async_trait]
    impl Prober for BrokenProber {
        async fn probe(&self, target: &str) -> Result<bool, ProbeError> {
            Err(ProbeError::InvalidTarget(target.to_string()))
        }
    }
}

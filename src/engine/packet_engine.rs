use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::concealment::ConcealmentPolicy;
use super::connection::{connection_key, ConnectionState, DEFAULT_WINDOW};
use crate::dsp::Pipeline;
use crate::net::{Datagram, UdpSender};
use crate::shutdown::ShutdownToken;

/// Factory invoked once per new connection to produce a fresh, independently
/// stateful pipeline instance.
pub type PipelineFactory = Arc<dyn Fn() -> Pipeline + Send + Sync>;

/// Tuning knobs for the packet engine; all have the defaults named in spec.md.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub window: usize,
    pub default_timeout: Duration,
    pub reap_period: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            default_timeout: Duration::from_secs(10),
            reap_period: Duration::from_secs(15),
        }
    }
}

/// Owns the connection table, the sender handle, and the reaper timer.
pub struct PacketEngine {
    table: Mutex<HashMap<u64, ConnectionState>>,
    sender: Arc<UdpSender>,
    pipeline_factory: PipelineFactory,
    concealment: ConcealmentPolicy,
    config: EngineConfig,
}

impl PacketEngine {
    pub fn new(
        sender: Arc<UdpSender>,
        pipeline_factory: PipelineFactory,
        concealment: ConcealmentPolicy,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            table: Mutex::new(HashMap::new()),
            sender,
            pipeline_factory,
            concealment,
            config,
        })
    }

    /// Number of live connections; exposed for tests and diagnostics.
    pub fn connection_count(&self) -> usize {
        self.table.lock().len()
    }

    /// Processes one inbound datagram end to end: table lookup/insert, gap
    /// handling, concealment, filtering, and (if applicable) dispatch to the
    /// sender. Holds the table lock for the duration of slot manipulation and
    /// pipeline evaluation, but never while performing network I/O.
    pub async fn handle_packet(&self, datagram: Datagram, src: SocketAddr) {
        let addr = match src.ip() {
            IpAddr::V4(v4) => v4,
            IpAddr::V6(_) => return,
        };
        let key = connection_key(addr, src.port());
        let now = Instant::now();

        let dispatch = {
            let mut table = self.table.lock();
            let conn = table.entry(key).or_insert_with(|| {
                debug!(key, "new connection");
                ConnectionState::new(
                    (self.pipeline_factory)(),
                    self.config.window,
                    now,
                    self.config.default_timeout,
                )
            });

            conn.touch(now, self.config.default_timeout);
            conn.maybe_reset_for_far_jump(datagram.seq);
            conn.insert(datagram);
            conn.refresh_readiness();

            let (mut input, port) = if conn.is_initialized() {
                conn.consume_or_conceal(self.concealment)
            } else {
                conn.prime_silence()
            };

            // Invariant guard: a pipeline bug producing the wrong length
            // falls back to silence rather than propagating a malformed block.
            if input.len() != crate::net::datagram::BLOCK_LEN {
                input = [0.0; crate::net::datagram::BLOCK_LEN];
            }

            let mut output = Vec::with_capacity(crate::net::datagram::BLOCK_LEN);
            conn.pipeline.process_block(&input, &mut output);

            trace!(key, seq = conn.expected_seq(), port, "dispatched block");

            fixed_block(output).map(|block| (block, port))
        };

        if let Some((block, port)) = dispatch {
            self.sender.async_send(block, port);
        }
    }

    /// Removes every connection whose deadline has passed.
    pub fn reap(&self) {
        let now = Instant::now();
        let mut table = self.table.lock();
        let before = table.len();
        table.retain(|_, conn| conn.deadline() > now);
        let removed = before - table.len();
        if removed > 0 {
            debug!(removed, remaining = table.len(), "reaped idle connections");
        }
    }

    /// Spawns the periodic reaper task; exits without rescheduling once
    /// `shutdown` is cancelled.
    pub fn spawn_reaper(
        self: &Arc<Self>,
        mut shutdown: ShutdownToken,
    ) -> tokio::task::JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(engine.config.reap_period);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("reaper stopping");
                        return;
                    }
                    _ = ticker.tick() => {
                        engine.reap();
                    }
                }
            }
        })
    }
}

fn fixed_block(v: Vec<f32>) -> Option<[f32; crate::net::datagram::BLOCK_LEN]> {
    if v.len() != crate::net::datagram::BLOCK_LEN {
        return None;
    }
    let mut block = [0.0; crate::net::datagram::BLOCK_LEN];
    block.copy_from_slice(&v);
    Some(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::datagram::BLOCK_LEN;
    use std::net::{Ipv4Addr, SocketAddrV4};

    fn make_engine(concealment: ConcealmentPolicy) -> Arc<PacketEngine> {
        // Senders bind a real (ephemeral) socket even in tests; loopback is fine.
        let sender = futures_block_on(UdpSender::bind(Ipv4Addr::LOCALHOST));
        let factory: PipelineFactory = Arc::new(|| {
            let mut p = Pipeline::new();
            p.add_gain(1.0);
            p
        });
        PacketEngine::new(sender, factory, concealment, EngineConfig::default())
    }

    fn futures_block_on<F: std::future::Future>(f: F) -> F::Output {
        tokio::runtime::Handle::try_current()
            .map(|h| h.block_on(f))
            .unwrap_or_else(|_| tokio::runtime::Runtime::new().unwrap().block_on(f))
    }

    fn src(port: u16) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))
    }

    fn block_of(seq: u64) -> Datagram {
        let mut samples = [0.0; BLOCK_LEN];
        for (i, s) in samples.iter_mut().enumerate() {
            *s = (seq as f32) + i as f32 * 1e-4;
        }
        Datagram {
            seq,
            out_port: 7777,
            samples,
        }
    }

    #[tokio::test]
    async fn priming_window_requires_five_slots() {
        let engine = make_engine(ConcealmentPolicy::AllZero);
        engine.handle_packet(block_of(0), src(40000)).await;
        assert_eq!(engine.connection_count(), 1);
    }

    #[tokio::test]
    async fn far_future_jump_resets_expected_seq_without_replaying_gap() {
        let engine = make_engine(ConcealmentPolicy::AllZero);
        for seq in 0..11 {
            engine.handle_packet(block_of(seq), src(40000)).await;
        }
        engine.handle_packet(block_of(10_000_000), src(40000)).await;
        // We can't observe expected_seq directly from outside the engine;
        // the absence of a multi-second stall here is the behavioral proxy
        // exercised end to end in tests/packet_engine.rs.
        assert_eq!(engine.connection_count(), 1);
    }

    #[tokio::test]
    async fn reap_removes_only_expired_connections() {
        let mut config = EngineConfig::default();
        config.default_timeout = Duration::from_millis(1);
        let sender = UdpSender::bind(Ipv4Addr::LOCALHOST).await.unwrap();
        let factory: PipelineFactory = Arc::new(|| {
            let mut p = Pipeline::new();
            p.add_gain(1.0);
            p
        });
        let engine = PacketEngine::new(
            Arc::new(sender),
            factory,
            ConcealmentPolicy::AllZero,
            config,
        );

        engine.handle_packet(block_of(0), src(40000)).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        engine.reap();
        assert_eq!(engine.connection_count(), 0);
    }
}

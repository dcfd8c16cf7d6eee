use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use crate::dsp::Pipeline;
use crate::net::datagram::{Datagram, BLOCK_LEN};

/// Default reorder window capacity (W in spec terms).
pub const DEFAULT_WINDOW: usize = 32;
/// Number of ever-filled slots before a connection starts emitting live output.
pub const READY_THRESHOLD: u32 = 5;
/// Last-port placeholder for a connection that has never produced real output.
const UNSET_LAST_PORT: u16 = 55555;

/// 64-bit connection fingerprint: (source IPv4 << 16) | source port.
pub fn connection_key(addr: Ipv4Addr, port: u16) -> u64 {
    (u32::from(addr) as u64) << 16 | port as u64
}

/// Per-source reorder buffer, sequence state, and this connection's private pipeline.
pub struct ConnectionState {
    buffer: Vec<Option<Datagram>>,
    /// Bit i set iff `buffer[i]` holds an unconsumed datagram.
    present: u32,
    window: usize,
    expected_seq: u64,
    initialized: bool,
    last_good: Option<[f32; BLOCK_LEN]>,
    faded_last_good: [f32; BLOCK_LEN],
    last_port: u16,
    last_arrive: Instant,
    deadline: Instant,
    pub pipeline: Pipeline,
}

impl ConnectionState {
    pub fn new(pipeline: Pipeline, window: usize, now: Instant, default_timeout: Duration) -> Self {
        Self {
            buffer: vec![None; window],
            present: 0,
            window,
            expected_seq: 0,
            initialized: false,
            last_good: None,
            faded_last_good: [0.0; BLOCK_LEN],
            last_port: UNSET_LAST_PORT,
            last_arrive: now,
            deadline: now + default_timeout,
            pipeline,
        }
    }

    pub fn touch(&mut self, now: Instant, default_timeout: Duration) {
        self.last_arrive = now;
        self.deadline = now + default_timeout;
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn expected_seq(&self) -> u64 {
        self.expected_seq
    }

    /// Far-future reset: the sender jumped ahead beyond any plausible reorder.
    pub fn maybe_reset_for_far_jump(&mut self, seq: u64) {
        if seq >= self.expected_seq + 2 * self.window as u64 {
            self.expected_seq = seq;
            self.present = 0;
        }
    }

    /// Stores `datagram` in its modular slot, overwriting any live entry there.
    pub fn insert(&mut self, datagram: Datagram) {
        let idx = (datagram.seq % self.window as u64) as usize;
        self.buffer[idx] = Some(datagram);
        self.present |= 1 << idx;
    }

    /// Readiness is sticky: once true, it never reverts to false.
    pub fn refresh_readiness(&mut self) {
        if !self.initialized && self.present.count_ones() >= READY_THRESHOLD {
            self.initialized = true;
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn head_index(&self) -> usize {
        (self.expected_seq % self.window as u64) as usize
    }

    fn head_present(&self) -> bool {
        self.present & (1 << self.head_index()) != 0
    }

    pub fn last_port(&self) -> u16 {
        self.last_port
    }

    /// Consumes the head slot if present, advancing `expected_seq` regardless.
    /// Returns the 128-sample block to filter and the destination port.
    pub fn consume_or_conceal(
        &mut self,
        policy: super::concealment::ConcealmentPolicy,
    ) -> ([f32; BLOCK_LEN], u16) {
        use super::concealment::ConcealmentPolicy::*;

        let result = if self.head_present() {
            let idx = self.head_index();
            let datagram = self.buffer[idx].take().expect("head_present implies Some");
            self.present &= !(1 << idx);

            self.last_port = datagram.out_port;
            self.last_good = Some(datagram.samples);
            self.faded_last_good = fade(&datagram.samples);

            (datagram.samples, datagram.out_port)
        } else {
            let port = self.last_port;
            let block = match policy {
                RepeatLastGood => self.last_good.unwrap_or([0.0; BLOCK_LEN]),
                FadeLastGood => {
                    let current = self.faded_last_good;
                    if let Some(last_good) = self.last_good {
                        self.faded_last_good = fade(&last_good);
                    }
                    current
                }
                AllZero => [0.0; BLOCK_LEN],
            };
            (block, port)
        };

        self.expected_seq += 1;
        result
    }

    /// Priming silence: emitted while the connection hasn't yet seen enough
    /// packets to be considered initialized. Still advances `expected_seq`.
    pub fn prime_silence(&mut self) -> ([f32; BLOCK_LEN], u16) {
        let port = self.last_port;
        self.expected_seq += 1;
        ([0.0; BLOCK_LEN], port)
    }
}

fn fade(block: &[f32; BLOCK_LEN]) -> [f32; BLOCK_LEN] {
    let mut out = [0.0; BLOCK_LEN];
    for (o, &v) in out.iter_mut().zip(block.iter()) {
        *o = 0.8 * v;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_from(ip: [u8; 4], port: u16) -> u64 {
        connection_key(Ipv4Addr::from(ip), port)
    }

    #[test]
    fn distinct_ports_on_same_host_hash_differently() {
        let a = key_from([127, 0, 0, 1], 40000);
        let b = key_from([127, 0, 0, 1], 40001);
        assert_ne!(a, b);
    }

    #[test]
    fn presence_bit_implies_modular_slot_match() {
        let mut state = ConnectionState::new(Pipeline::new(), 32, Instant::now(), Duration::from_secs(10));
        let dg = Datagram {
            seq: 37,
            out_port: 1,
            samples: [0.0; BLOCK_LEN],
        };
        state.insert(dg);
        assert_eq!(state.present & (1 << (37 % 32)), 1 << (37 % 32));
    }
}

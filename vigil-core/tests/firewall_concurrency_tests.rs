//! Concurrency tests for the kill-switch coordinator
//!
//! Operations issued from several threads must leave the coordinator and the
//! backend in a configuration some serial order of the same calls produces.

use std::collections::{BTreeSet, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use vigil_core::firewall::backend::{BackendError, FirewallBackend};
use vigil_core::firewall::{FirewallCoordinator, FirewallState};

/// What the packet filter currently enforces
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
struct Rules {
    enabled: bool,
    persistent: bool,
    client: Option<IpAddr>,
    hosts: BTreeSet<IpAddr>,
}

/// In-memory packet filter; disabling drops every exception
#[derive(Default)]
struct ModelBackend {
    rules: Mutex<Rules>,
}

impl ModelBackend {
    fn rules(&self) -> Rules {
        self.rules.lock().unwrap().clone()
    }
}

impl FirewallBackend for ModelBackend {
    fn enable(&self) -> Result<(), BackendError> {
        self.rules.lock().unwrap().enabled = true;
        Ok(())
    }
    fn disable(&self) -> Result<(), BackendError> {
        let mut rules = self.rules.lock().unwrap();
        rules.enabled = false;
        rules.client = None;
        rules.hosts.clear();
        Ok(())
    }
    fn is_enabled(&self) -> Result<bool, BackendError> {
        Ok(self.rules.lock().unwrap().enabled)
    }
    fn set_persistent(&self, persistent: bool) -> Result<(), BackendError> {
        self.rules.lock().unwrap().persistent = persistent;
        Ok(())
    }
    fn allow_client(&self, addr: IpAddr) -> Result<(), BackendError> {
        self.rules.lock().unwrap().client = Some(addr);
        Ok(())
    }
    fn remove_client(&self) -> Result<(), BackendError> {
        let mut rules = self.rules.lock().unwrap();
        rules.client = None;
        rules.hosts.clear();
        Ok(())
    }
    fn allow_hosts(&self, hosts: &[IpAddr]) -> Result<(), BackendError> {
        self.rules.lock().unwrap().hosts.extend(hosts.iter().copied());
        Ok(())
    }
    fn allow_lan(&self, _allow_lan: bool, _allow_multicast: bool) -> Result<(), BackendError> {
        Ok(())
    }
    fn allow_dns(&self, _addr: IpAddr) -> Result<(), BackendError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Op {
    SetEnabled(bool),
    SetPersistent(bool),
    Connect(IpAddr),
    Disconnect,
    Pause,
    Resume,
    AddHost(IpAddr),
    QueryEnabled,
}

fn apply(fw: &FirewallCoordinator<ModelBackend>, op: Op) {
    match op {
        Op::SetEnabled(enable) => fw.set_enabled(enable).unwrap(),
        Op::SetPersistent(persistent) => fw.set_persistent(persistent).unwrap(),
        Op::Connect(addr) => fw.client_connected(addr).unwrap(),
        Op::Disconnect => fw.client_disconnected().unwrap(),
        Op::Pause => fw.client_paused(),
        Op::Resume => fw.client_resumed(),
        Op::AddHost(addr) => fw.add_hosts_to_exceptions(&[addr]).unwrap(),
        Op::QueryEnabled => {
            fw.get_enabled().unwrap();
        }
    }
}

/// Every merge of the per-thread sequences that keeps each thread's order
fn interleavings(seqs: &[Vec<Op>]) -> Vec<Vec<Op>> {
    fn walk(
        seqs: &[Vec<Op>],
        positions: &mut Vec<usize>,
        current: &mut Vec<Op>,
        out: &mut Vec<Vec<Op>>,
    ) {
        let mut done = true;
        for thread in 0..seqs.len() {
            if positions[thread] < seqs[thread].len() {
                done = false;
                current.push(seqs[thread][positions[thread]]);
                positions[thread] += 1;
                walk(seqs, positions, current, out);
                positions[thread] -= 1;
                current.pop();
            }
        }
        if done {
            out.push(current.clone());
        }
    }

    let mut out = Vec::new();
    walk(seqs, &mut vec![0; seqs.len()], &mut Vec::new(), &mut out);
    out
}

fn serial_outcomes(seqs: &[Vec<Op>]) -> HashSet<(StateKey, Rules)> {
    interleavings(seqs)
        .into_iter()
        .map(|schedule| {
            let fw = FirewallCoordinator::new(ModelBackend::default());
            for op in schedule {
                apply(&fw, op);
            }
            (StateKey::from(fw.state()), fw.backend().rules())
        })
        .collect()
}

/// Hashable view of `FirewallState`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StateKey {
    enabled: bool,
    persistent: bool,
    connected_client_addr: Option<IpAddr>,
    client_paused: bool,
    ad_hoc_exceptions: BTreeSet<IpAddr>,
}

impl From<FirewallState> for StateKey {
    fn from(state: FirewallState) -> Self {
        Self {
            enabled: state.enabled,
            persistent: state.persistent,
            connected_client_addr: state.connected_client_addr,
            client_paused: state.client_paused,
            ad_hoc_exceptions: state.ad_hoc_exceptions,
        }
    }
}

fn run_concurrently(seqs: &[Vec<Op>]) -> (StateKey, Rules) {
    let fw = Arc::new(FirewallCoordinator::new(ModelBackend::default()));
    let barrier = Arc::new(Barrier::new(seqs.len()));

    let handles: Vec<_> = seqs
        .iter()
        .cloned()
        .map(|ops| {
            let fw = Arc::clone(&fw);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for op in ops {
                    apply(&fw, op);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker thread panicked");
    }

    (StateKey::from(fw.state()), fw.backend().rules())
}

/// One step of a 64-bit linear congruential generator
fn lcg_step(x: u64) -> u64 {
    x.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407)
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

#[test]
fn test_connect_disconnect_enable_race_is_serializable() {
    // Given: Three callers racing connect, disconnect and re-enable
    let seqs = vec![
        vec![Op::Connect(ip("10.0.0.2")), Op::Pause, Op::Resume],
        vec![Op::SetEnabled(false), Op::SetEnabled(true), Op::Disconnect],
        vec![Op::AddHost(ip("198.51.100.1")), Op::Connect(ip("10.0.0.3")), Op::QueryEnabled],
    ];
    let allowed = serial_outcomes(&seqs);

    // When/Then: Every concurrent run lands on a serial outcome
    for _ in 0..200 {
        let outcome = run_concurrently(&seqs);
        assert!(
            allowed.contains(&outcome),
            "non-serializable outcome: {:?}",
            outcome
        );
    }
}

#[test]
fn test_pause_enable_race_is_serializable() {
    let seqs = vec![
        vec![Op::SetEnabled(true), Op::Connect(ip("10.0.0.2")), Op::SetEnabled(true)],
        vec![Op::Pause, Op::SetEnabled(false), Op::Resume],
        vec![Op::SetPersistent(true), Op::Disconnect, Op::SetPersistent(false)],
    ];
    let allowed = serial_outcomes(&seqs);

    for _ in 0..200 {
        let outcome = run_concurrently(&seqs);
        assert!(
            allowed.contains(&outcome),
            "non-serializable outcome: {:?}",
            outcome
        );
    }
}

#[test]
fn test_interleaving_enumeration() {
    let seqs = vec![vec![Op::Pause, Op::Resume], vec![Op::Disconnect, Op::QueryEnabled]];
    // 4! / (2! * 2!)
    assert_eq!(interleavings(&seqs).len(), 6);
}

#[test]
fn test_stress_many_threads() {
    // Given: Eight threads issuing long pseudo-random operation mixes
    let fw = Arc::new(FirewallCoordinator::new(ModelBackend::default()));
    let handles: Vec<_> = (0..8u64)
        .map(|seed| {
            let fw = Arc::clone(&fw);
            thread::spawn(move || {
                let mut x = lcg_step(seed);
                for _ in 0..500 {
                    x = lcg_step(x);
                    let op = match (x >> 33) % 8 {
                        0 => Op::SetEnabled(true),
                        1 => Op::SetEnabled(false),
                        2 => Op::Connect(IpAddr::from([10, 0, 0, (x % 250) as u8 + 1])),
                        3 => Op::Disconnect,
                        4 => Op::Pause,
                        5 => Op::Resume,
                        6 => Op::AddHost(IpAddr::from([198, 51, 100, (x % 250) as u8 + 1])),
                        _ => Op::QueryEnabled,
                    };
                    apply(&fw, op);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker thread panicked");
    }

    // When: Settling the connection and enabling
    fw.client_disconnected().unwrap();
    fw.set_enabled(true).unwrap();

    // Then: State and backend agree
    let state = fw.state();
    let rules = fw.backend().rules();
    assert_eq!(state.connected_client_addr, None);
    assert!(state.ad_hoc_exceptions.is_empty());
    assert!(state.enabled && rules.enabled);
}

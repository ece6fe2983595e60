// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// End-to-end walkthrough of the resource manager, in one process:
// a registry with the three stock providers, one manager, one session
// over a queue-backed channel, and a scripted request/release exchange
// playing the remote endpoint's part.
//
// Usage:
//   demo_resmgr

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use resmgr::providers::{AuxClkDesc, AuxClkDriver, AuxClkParent, GpTimerDesc, GpTimerDriver, SdmaDriver};
use resmgr::{wire, Channel, Manager, ManagerRegistry, ResourceRegistry, Session};

/// Queue-backed channel: the server's sends pile up here and the
/// scripted client pops them.
#[derive(Default)]
struct QueueChannel {
    outbound: Mutex<VecDeque<Vec<u8>>>,
}

impl QueueChannel {
    fn pop(&self) -> Vec<u8> {
        self.outbound
            .lock()
            .unwrap()
            .pop_front()
            .expect("server sent no message")
    }
}

impl Channel for QueueChannel {
    fn send(&self, data: &[u8]) -> io::Result<()> {
        self.outbound.lock().unwrap().push_back(data.to_vec());
        Ok(())
    }
}

fn board_registry() -> ResourceRegistry {
    let registry = ResourceRegistry::new();

    let timers = [3u32, 4, 9, 11]
        .iter()
        .map(|&id| GpTimerDesc {
            id,
            base_address: 0x4803_2000 + id * 0x1000,
            sources: vec![0, 1, 2],
        })
        .collect();
    registry.register(Arc::new(GpTimerDriver::new(timers))).unwrap();

    let parents = vec![
        AuxClkParent { name: "sys_clkin_ck".into(), max_rate: 38_400_000 },
        AuxClkParent { name: "dpll_core_m3x2_ck".into(), max_rate: 232_000_000 },
        AuxClkParent { name: "dpll_per_m3x2_ck".into(), max_rate: 192_000_000 },
    ];
    let clocks = (0u32..4)
        .map(|id| AuxClkDesc {
            id,
            name: format!("auxclk{id}_ck"),
            base_address: 0x4A30_A310 + id * 8,
            max_rate: 192_000_000,
            parents: parents.clone(),
        })
        .collect();
    registry.register(Arc::new(AuxClkDriver::new(clocks))).unwrap();

    registry.register(Arc::new(SdmaDriver::new(16))).unwrap();
    registry
}

fn u32s(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

fn main() {
    let registry = board_registry();
    let managers = ManagerRegistry::new();
    managers
        .register(Manager::assemble("boardA", &registry, &["gptimer", "auxclk", "sdma"]).unwrap())
        .unwrap();

    let channel = Arc::new(QueueChannel::default());
    let session = Session::connect(&managers, "boardA", Arc::clone(&channel)).expect("connect");
    let status = wire::decode_connect_ack(&channel.pop()).unwrap();
    println!("connected to boardA, status {status}");

    // Timer 3 on source clock 1 (resource index 0).
    let _ = session.handle_message(&wire::encode_request(0, &u32s(&[3, 1])));
    let buf = channel.pop();
    let ack = wire::decode_request_ack(&buf).unwrap();
    println!(
        "gptimer: status {}, id {}, base {:#010x}",
        ack.status, ack.resource_id, ack.base_address
    );
    let timer_id = ack.resource_id;

    // auxclk0 at 19.2 MHz from parent 1 at 192 MHz (resource index 1).
    let _ = session.handle_message(&wire::encode_request(
        1,
        &u32s(&[0, 19_200_000, 1, 192_000_000]),
    ));
    let buf = channel.pop();
    let ack = wire::decode_request_ack(&buf).unwrap();
    println!("auxclk: status {}, id {}", ack.status, ack.resource_id);

    // Two DMA channels (resource index 2). Args carry the full
    // capacity-sized channel array; the ack echo holds the grants.
    let mut args = vec![0u32; 17];
    args[0] = 2;
    let _ = session.handle_message(&wire::encode_request(2, &u32s(&args)));
    let buf = channel.pop();
    let ack = wire::decode_request_ack(&buf).unwrap();
    let chans: Vec<i32> = (0..2)
        .map(|i| i32::from_le_bytes(ack.data[4 + i * 4..8 + i * 4].try_into().unwrap()))
        .collect();
    println!("sdma: status {}, id {}, channels {chans:?}", ack.status, ack.resource_id);

    println!("\n{}", session.describe());

    // Fire-and-forget release of the timer: no ack to wait on.
    let _ = session.handle_message(&wire::encode_release(timer_id));
    println!("released timer, {} resources still live", session.resource_count());

    // The manager cannot go away while the session is bound.
    match managers.unregister("boardA") {
        Err(e) => println!("unregister while connected: {e}"),
        Ok(()) => unreachable!(),
    }

    session.close();
    managers.unregister("boardA").expect("unregister after close");
    println!("session closed, manager unregistered");
}

//! Cancellation of in-flight work from another thread.

use std::time::{Duration, Instant};

use replfs::Error;
use replfs::repl::{StopOutcome, WorkState};

use crate::mock_board::{Rig, SimFs, test_config};

/// Incompressible payload large enough for many upload chunks.
fn payload(len: usize) -> Vec<u8> {
    let mut x: u64 = 0x9E37_79B9_7F4A_7C15;
    (0..len)
        .map(|_| {
            x = x.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            (x >> 56) as u8
        })
        .collect()
}

#[test]
fn stop_while_idle_returns_immediately() {
    let rig = Rig::new(SimFs::default());
    let started = Instant::now();
    assert_eq!(rig.shell.stop_working(), StopOutcome::NotWorking);
    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(rig.commands().is_empty());
}

#[test]
fn upload_stops_between_chunks() {
    let original = b"previous firmware".to_vec();
    let sim = SimFs::default().with_file("/big.bin", &original);
    let mut rig = Rig::with(sim, test_config(), |mut board| {
        board.read_delay = Duration::from_millis(2);
        board
    });
    let handle = rig.shell.interrupt_handle();
    let sim = std::sync::Arc::clone(&rig.fs);

    let requester = std::thread::spawn(move || {
        let started = Instant::now();
        while sim.lock().unwrap().chunks_received < 3 {
            if started.elapsed() > Duration::from_secs(10) {
                return None;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(handle.state(), WorkState::Working);
        Some(handle.request_stop())
    });

    let result = rig.shell.write_file("/big.bin", &payload(64 * 1024));

    assert_eq!(result, Err(Error::Interrupted));
    assert_eq!(requester.join().unwrap(), Some(StopOutcome::Acknowledged));
    assert_eq!(rig.shell.work_state(), WorkState::Idle);

    let sim = rig.sim();
    assert!(sim.chunks_received < 64 * 1024 / 256);
    assert_eq!(sim.files["/big.bin"], original, "target untouched");
    assert!(!sim.files.contains_key("/big.bin.rfs-part"));
    assert!(sim.open_handle.is_none());
    drop(sim);
    assert!(!rig.commands().iter().any(|c| c.contains("_rfs_inflate(")));
    assert!(rig.repl.lock().unwrap().interrupts >= 1);
}

#[test]
fn shell_is_usable_after_interrupt() {
    let mut rig = Rig::with(SimFs::default(), test_config(), |mut board| {
        board.read_delay = Duration::from_millis(2);
        board
    });
    let handle = rig.shell.interrupt_handle();
    let sim = std::sync::Arc::clone(&rig.fs);

    let requester = std::thread::spawn(move || {
        while sim.lock().unwrap().chunks_received < 1 {
            std::thread::sleep(Duration::from_millis(1));
        }
        handle.request_stop()
    });
    let _ = rig.shell.write_file("/big.bin", &payload(32 * 1024));
    requester.join().unwrap();

    rig.shell.write_file("/small.txt", b"after").unwrap();
    assert_eq!(rig.sim().files["/small.txt"], b"after");
}

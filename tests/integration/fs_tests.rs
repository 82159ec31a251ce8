//! Filesystem adapter against the simulated board.

use std::sync::{Arc, Mutex};

use replfs::config::ShellConfig;
use replfs::fs::{FileType, FsError, RemoteFs};
use replfs::repl::{LinkEvent, LinkEvents, Shell};

use crate::mock_board::{FakeRepl, SimFs, sim_responder, test_config};

struct FsRig {
    fs: RemoteFs<FakeRepl>,
    sim: Arc<Mutex<SimFs>>,
    events: Arc<LinkEvents>,
}

fn rig(sim: SimFs, config: ShellConfig) -> FsRig {
    let sim = Arc::new(Mutex::new(sim));
    let events = Arc::new(LinkEvents::new());
    let board = FakeRepl::new(sim_responder(&sim), Arc::clone(&events));
    let shell = Shell::new(board, config, Arc::clone(&events)).unwrap();
    FsRig {
        fs: RemoteFs::new(shell),
        sim,
        events,
    }
}

fn cached_config() -> ShellConfig {
    ShellConfig {
        cache_enabled: true,
        ..test_config()
    }
}

#[test]
fn stat_while_disconnected_is_unavailable() {
    let r = rig(SimFs::default().with_file("/lib/main.py", b"x"), test_config());
    r.events.publish(LinkEvent::Disconnected);
    assert!(matches!(r.fs.stat("/lib/main.py"), Err(FsError::Unavailable(_))));
}

#[test]
fn stat_of_unlisted_path_is_not_found() {
    let r = rig(SimFs::default().with_file("/main.py", b"x"), test_config());
    assert_eq!(
        r.fs.stat("/other.py"),
        Err(FsError::NotFound("/other.py".into()))
    );
    assert!(r.fs.stat("/main.py").is_ok());
}

#[test]
fn list_returns_names_and_kinds() {
    let r = rig(
        SimFs::default().with_dir("/lib").with_file("/main.py", b"x"),
        test_config(),
    );
    assert_eq!(
        r.fs.list("/").unwrap(),
        vec![
            ("lib".to_string(), FileType::Directory),
            ("main.py".to_string(), FileType::File),
        ]
    );
    assert!(matches!(r.fs.list("/missing"), Err(FsError::NotFound(_))));
}

#[test]
fn cache_is_off_by_default() {
    let r = rig(SimFs::default().with_file("/a.py", b"1"), test_config());
    r.fs.stat("/a.py").unwrap();
    assert!(r.fs.cached_paths().is_empty());
}

#[test]
fn cached_stat_skips_the_board() {
    let r = rig(SimFs::default().with_file("/a.py", b"1"), cached_config());
    assert_eq!(r.fs.stat("/a.py").unwrap().size, 1);

    r.sim.lock().unwrap().files.insert("/a.py".into(), b"1234".to_vec());
    assert_eq!(r.fs.stat("/a.py").unwrap().size, 1, "served from cache");
}

#[test]
fn refresh_updates_present_and_drops_absent() {
    let r = rig(
        SimFs::default()
            .with_file("/p1.py", b"1")
            .with_file("/p2.py", b"2"),
        cached_config(),
    );
    r.fs.stat("/p1.py").unwrap();
    r.fs.stat("/p2.py").unwrap();
    assert_eq!(r.fs.cached_paths(), vec!["/p1.py", "/p2.py"]);

    {
        let mut sim = r.sim.lock().unwrap();
        sim.files.insert("/p1.py".into(), b"updated".to_vec());
        sim.files.remove("/p2.py");
    }
    r.fs.refresh_cache().unwrap();

    assert_eq!(r.fs.cached_paths(), vec!["/p1.py"]);
    assert_eq!(r.fs.stat("/p1.py").unwrap().size, 7);
    assert!(matches!(r.fs.stat("/p2.py"), Err(FsError::NotFound(_))));
}

#[test]
fn clear_cache_forces_live_stat() {
    let r = rig(SimFs::default().with_file("/a.py", b"1"), cached_config());
    r.fs.stat("/a.py").unwrap();
    r.sim.lock().unwrap().files.insert("/a.py".into(), b"12".to_vec());

    r.fs.clear_cache();
    assert!(r.fs.cached_paths().is_empty());
    assert_eq!(r.fs.stat("/a.py").unwrap().size, 2);
}

#[test]
fn interpreter_errors_keep_traceback_detail() {
    let r = rig(SimFs::default().with_dir("/d"), test_config());
    let err: FsError = r
        .fs
        .with_shell(|shell| shell.create_dir("/d"))
        .unwrap()
        .unwrap_err()
        .into();
    match err {
        FsError::Exists(detail) => assert!(detail.contains("Traceback (")),
        other => panic!("expected Exists, got {:?}", other),
    }
}

#[test]
fn concurrent_callers_queue() {
    let r = rig(
        SimFs::default()
            .with_file("/a.py", b"a")
            .with_file("/b.py", b"bb"),
        test_config(),
    );
    let fs = Arc::new(r.fs);

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let fs = Arc::clone(&fs);
            std::thread::spawn(move || {
                let path = if i % 2 == 0 { "/a.py" } else { "/b.py" };
                fs.stat(path).map(|e| e.size)
            })
        })
        .collect();

    let sizes: Vec<u64> = workers
        .into_iter()
        .map(|w| w.join().unwrap().unwrap())
        .collect();
    assert_eq!(sizes, vec![1, 2, 1, 2]);
}

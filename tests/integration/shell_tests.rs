//! End-to-end shell operations against the simulated board.

use std::time::Duration;

use replfs::Error;
use replfs::listing::EntryKind;
use replfs::repl::{ConnectionState, LinkEvent, Mode};

use crate::mock_board::{FakeRepl, Rig, SimFs, test_config};

/// Deterministic, poorly compressible content.
fn noise(len: usize) -> Vec<u8> {
    let mut x: u32 = 0x1234_5678;
    (0..len)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            (x >> 24) as u8
        })
        .collect()
}

#[test]
fn write_then_read_round_trips() {
    let mut rig = Rig::new(SimFs::default());
    let content = noise(1500);

    rig.shell.initialise().unwrap();
    rig.shell.write_file("/lib/deep/mod.py", &content).unwrap();

    {
        let sim = rig.sim();
        assert_eq!(sim.files["/lib/deep/mod.py"], content);
        assert!(!sim.files.contains_key("/lib/deep/mod.py.rfs-part"));
        assert!(sim.open_handle.is_none());
        assert!(sim.dirs.contains("/lib"));
        assert!(sim.dirs.contains("/lib/deep"));
        let staged = rig.shell.compress(&content).len();
        assert_eq!(sim.chunks_received, staged.div_ceil(256));
    }

    let read = rig.shell.read_file("/lib/deep/mod.py").unwrap();
    assert_eq!(read.bytes, content);
}

#[test]
fn upload_creates_parents_before_opening() {
    let mut rig = Rig::new(SimFs::default());
    rig.shell.write_file("/a/b/c.txt", b"hi").unwrap();

    let commands = rig.commands();
    let mkdir = commands.iter().position(|c| c.contains("_rfs_mkdir('/a')")).unwrap();
    let open = commands.iter().position(|c| c.contains("_rfs_f = open(")).unwrap();
    let inflate = commands
        .iter()
        .position(|c| c.contains("_rfs_inflate('/a/b/c.txt.rfs-part')"))
        .unwrap();
    let replace = commands
        .iter()
        .position(|c| c.contains("uos.rename('/a/b/c.txt.rfs-part', '/a/b/c.txt')"))
        .unwrap();
    assert!(mkdir < open && open < inflate && inflate < replace);
    assert!(commands[open].contains("open('/a/b/c.txt.rfs-part', 'wb')"));

    let mkdir_cmd = &commands[mkdir];
    let a = mkdir_cmd.find("_rfs_mkdir('/a')").unwrap();
    let ab = mkdir_cmd.find("_rfs_mkdir('/a/b')").unwrap();
    assert!(a < ab);
}

#[test]
fn upload_replaces_existing_file() {
    let mut rig = Rig::new(SimFs::default().with_file("/main.py", b"old"));
    rig.shell.write_file("/main.py", b"new content").unwrap();

    let sim = rig.sim();
    assert_eq!(sim.files["/main.py"], b"new content");
    assert_eq!(sim.files.len(), 1);
}

#[test]
fn late_chunk_answer_is_not_resent() {
    let mut rig = Rig::new(SimFs::default().with_file("/x.bin", b"keep me"));
    rig.sim().answer_late = Some(("_rfs_f.write(".into(), 2));

    let result = rig.shell.write_file("/x.bin", &noise(2000));

    assert_eq!(result, Err(Error::Timeout));
    let writes = rig
        .commands()
        .iter()
        .filter(|c| c.contains("_rfs_f.write("))
        .count();
    assert_eq!(writes, 2);

    let sim = rig.sim();
    assert_eq!(sim.chunks_received, 2);
    assert_eq!(sim.files["/x.bin"], b"keep me");
    assert!(!sim.files.contains_key("/x.bin.rfs-part"));
    assert!(sim.open_handle.is_none());
}

#[test]
fn late_inflate_answer_is_not_rerun() {
    let mut rig = Rig::new(SimFs::default().with_file("/x.py", b"keep me"));
    rig.sim().answer_late = Some(("_rfs_inflate(".into(), 1));

    assert_eq!(rig.shell.write_file("/x.py", b"print(1)\n"), Err(Error::Timeout));

    let inflates = rig
        .commands()
        .iter()
        .filter(|c| c.contains("_rfs_inflate('/x.py.rfs-part')"))
        .count();
    assert_eq!(inflates, 1);
    assert!(!rig.commands().iter().any(|c| c.contains("uos.rename(")));

    let sim = rig.sim();
    assert_eq!(sim.files["/x.py"], b"keep me");
    assert!(!sim.files.contains_key("/x.py.rfs-part"));
}

#[test]
fn failed_close_keeps_previous_file() {
    let mut rig = Rig::new(SimFs::default().with_file("/boot.py", b"import gc\n"));
    rig.sim().hang_once = Some("_rfs_f.close()\r\ndel(".into());

    assert!(rig.shell.write_file("/boot.py", &noise(600)).is_err());

    let sim = rig.sim();
    assert_eq!(sim.files["/boot.py"], b"import gc\n");
    assert!(!sim.files.contains_key("/boot.py.rfs-part"));
    assert!(sim.open_handle.is_none());
}

#[test]
fn empty_file_round_trips() {
    let mut rig = Rig::new(SimFs::default());
    rig.shell.write_file("/empty.txt", b"").unwrap();
    assert!(rig.sim().files["/empty.txt"].is_empty());

    let read = rig.shell.read_file("/empty.txt").unwrap();
    assert!(read.bytes.is_empty());
    assert_eq!(read.text, "");
}

#[test]
fn read_strips_stale_soft_reset_ack() {
    let mut rig = Rig::new(SimFs::default().with_file("/boot.py", b"import gc\n"));
    rig.shell.initialise().unwrap();
    rig.repl.lock().unwrap().stale_ok = true;

    let read = rig.shell.read_file("/boot.py").unwrap();
    assert_eq!(read.text, "import gc\n");
}

#[test]
fn missing_file_surfaces_traceback() {
    let mut rig = Rig::new(SimFs::default());
    match rig.shell.read_file("/nope.py") {
        Err(Error::Interpreter(text)) => {
            assert!(text.contains("Traceback ("));
            assert!(text.contains("ENOENT"));
        }
        other => panic!("expected interpreter error, got {:?}", other),
    }
}

#[test]
fn recursive_hashed_listing() {
    let mut rig = Rig::new(
        SimFs::default()
            .with_dir("/lib")
            .with_file("/main.py", b"print('hi')\n")
            .with_file("/lib/util.py", b"def f(): pass\n"),
    );

    let entries = rig.shell.list("/", true, true).unwrap();
    assert_eq!(entries.len(), 3);
    for entry in &entries {
        assert!(matches!(entry.kind, EntryKind::File | EntryKind::Directory));
        assert_eq!(entry.hash.is_some(), entry.kind == EntryKind::File);
    }
    let util = entries.iter().find(|e| e.name == "util.py").unwrap();
    assert_eq!(util.full_name, "/lib/util.py");
    assert_eq!(util.path, "/lib");
    assert_eq!(util.size, 14);
}

#[test]
fn unhashed_listing_has_no_hashes() {
    let mut rig = Rig::new(SimFs::default().with_file("/main.py", b"x"));
    let entries = rig.shell.list("/", false, false).unwrap();
    assert!(entries.iter().all(|e| e.hash.is_none()));
}

#[test]
fn listing_missing_root_is_not_found() {
    let mut rig = Rig::new(SimFs::default());
    assert_eq!(
        rig.shell.list("/nowhere", false, false),
        Err(Error::NotFound("/nowhere".into()))
    );
}

#[test]
fn stat_finds_entries_and_reports_absence() {
    let mut rig = Rig::new(SimFs::default().with_dir("/lib").with_file("/lib/main.py", b"abc"));

    let entry = rig.shell.file_stat("/lib/main.py").unwrap().unwrap();
    assert_eq!(entry.kind, EntryKind::File);
    assert_eq!(entry.size, 3);

    let dir = rig.shell.file_stat("/lib").unwrap().unwrap();
    assert!(dir.is_dir());

    assert_eq!(rig.shell.file_stat("/lib/other.py").unwrap(), None);
    assert_eq!(rig.shell.file_stat("/missing/x.py").unwrap(), None);
}

#[test]
fn verify_hash_compares_content() {
    let mut rig = Rig::new(SimFs::default().with_file("/data.bin", b"payload"));
    assert!(rig.shell.verify_hash("/data.bin", b"payload").unwrap());
    assert!(!rig.shell.verify_hash("/data.bin", b"tampered").unwrap());
    assert!(matches!(
        rig.shell.verify_hash("/other.bin", b"payload"),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn file_primitives() {
    let mut rig = Rig::new(SimFs::default().with_file("/old.py", b"1"));

    rig.shell.rename_file("/old.py", "/new.py").unwrap();
    rig.shell.create_dir("/d").unwrap();
    rig.shell.change_dir("/d").unwrap();
    rig.shell.remove_dir("/d").unwrap();
    rig.shell.remove_file("/new.py").unwrap();

    let sim = rig.sim();
    assert!(sim.files.is_empty());
    assert!(sim.dirs.is_empty());
}

#[test]
fn mkdir_existing_is_interpreter_error() {
    let mut rig = Rig::new(SimFs::default().with_dir("/d"));
    match rig.shell.create_dir("/d") {
        Err(Error::Interpreter(text)) => assert!(text.contains("EEXIST")),
        other => panic!("expected EEXIST, got {:?}", other),
    }
}

#[test]
fn free_space_and_eval() {
    let mut rig = Rig::new(SimFs::default());
    assert_eq!(rig.shell.free_space().unwrap(), 2_097_152);
    assert_eq!(
        rig.shell.eval("1 + 1", Duration::from_millis(200)).unwrap(),
        ""
    );
    assert_eq!(rig.commands().last().unwrap(), "1 + 1");
}

#[test]
fn hung_command_is_retried() {
    let mut rig = Rig::new(SimFs::default().with_file("/slow.py", b"ok"));
    rig.sim().hang_once = Some("b2a_base64".into());

    let read = rig.shell.read_file("/slow.py").unwrap();
    assert_eq!(read.bytes, b"ok");

    let attempts = rig.commands().iter().filter(|c| c.contains("b2a_base64")).count();
    assert_eq!(attempts, 2);
    assert!(rig.repl.lock().unwrap().interrupts >= 1);
}

#[test]
fn raw_mode_entered_once_per_session() {
    let mut rig = Rig::new(SimFs::default().with_file("/a", b"1"));
    rig.shell.initialise().unwrap();
    rig.shell.file_stat("/a").unwrap();
    rig.shell.free_space().unwrap();

    let written = rig.repl.lock().unwrap().written.clone();
    assert_eq!(written.iter().filter(|&&b| b == 0x01).count(), 1);
    assert_eq!(rig.shell.mode(), Mode::Raw);
}

#[test]
fn reset_reconnects_and_reenters_raw() {
    let mut rig = Rig::new(SimFs::default());
    rig.shell.initialise().unwrap();
    rig.shell.reset().unwrap();

    assert_eq!(rig.shell.mode(), Mode::Friendly);
    assert_eq!(rig.repl.lock().unwrap().reconnects, 1);
    assert_eq!(rig.shell.connection(), ConnectionState::Connected);

    rig.shell.free_space().unwrap();
    let written = rig.repl.lock().unwrap().written.clone();
    assert_eq!(written.iter().filter(|&&b| b == 0x01).count(), 2);
}

#[test]
fn clean_close_restores_friendly_mode_on_serial() {
    let mut rig = Rig::new(SimFs::default());
    rig.shell.initialise().unwrap();
    rig.shell.clean_close().unwrap();

    let st = rig.repl.lock().unwrap();
    assert!(!st.raw);
    assert!(st.written.ends_with(b"\x02\r\n"));
    assert!(st.connected);
}

#[test]
fn close_drops_network_links() {
    let mut rig = Rig::with(SimFs::default(), test_config(), FakeRepl::network);
    rig.shell.initialise().unwrap();
    rig.shell.close().unwrap();

    assert!(!rig.repl.lock().unwrap().connected);
    assert_eq!(rig.shell.connection(), ConnectionState::Disconnected);
}

#[test]
fn clean_close_reboots_when_configured() {
    let config = replfs::config::ShellConfig {
        reboot_after_upload: true,
        ..test_config()
    };
    let mut rig = Rig::with(SimFs::default(), config, |b| b);
    rig.shell.initialise().unwrap();
    rig.shell.clean_close().unwrap();

    assert!(rig.commands().last().unwrap().contains("machine.reset()"));
    assert_eq!(rig.repl.lock().unwrap().reconnects, 1);
}

#[test]
fn operations_fail_fast_after_disconnect_event() {
    let mut rig = Rig::new(SimFs::default());
    rig.shell.initialise().unwrap();
    let before = rig.repl.lock().unwrap().written.len();

    rig.events.publish(LinkEvent::Disconnected);
    assert_eq!(rig.shell.free_space(), Err(Error::Connectivity));
    assert_eq!(rig.shell.mode(), Mode::Friendly);
    assert_eq!(rig.repl.lock().unwrap().written.len(), before);

    rig.events.publish(LinkEvent::Connected);
    assert_eq!(rig.shell.free_space().unwrap(), 2_097_152);
}

#[test]
fn safeboot_restart_reenters_raw() {
    let mut rig = Rig::new(SimFs::default());
    rig.shell.initialise().unwrap();
    rig.shell.safeboot_restart().unwrap();
    assert_eq!(rig.shell.mode(), Mode::Raw);
    assert!(rig.repl.lock().unwrap().raw);
}

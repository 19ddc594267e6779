
use crossbeam_channel::unbounded;
use std::{path::PathBuf, time::Duration};
use syslane::{transports::FileTransport, EventKind, TimeLimit, TransportEvent};

#[test]
fn test_size_rotation_replaces_file() {
    let dir = test_utils::dir();
    let (tx, rx) = unbounded();
    let file = FileTransport::builder(dir.path(), "app")
        .file_size_limit(5_u64)
        .file_date_template("fixed")
        .on(EventKind::Rotate, move |e| {
            if let TransportEvent::Rotate { from, to } = e {
                tx.send((from.clone(), to.clone())).unwrap();
            }
        })
        .try_build()
        .unwrap();
    let transport = file.transport();
    for unit in ["aaaa\n", "bbbb\n", "cccc\n"] {
        assert!(transport.write_str(unit));
    }
    transport.end();
    transport.join();

    let expected = file.directory().join("app_fixed.log");
    assert_eq!(test_utils::files(dir.path(), "*"), vec![expected.clone()]);
    assert_eq!(test_utils::read(&expected), "cccc\n");
    let rotations: Vec<(Option<PathBuf>, PathBuf)> = rx.try_iter().collect();
    assert_eq!(rotations.len(), 2);
    for (from, to) in rotations {
        assert_eq!(from, Some(expected.clone()));
        assert_eq!(to, expected);
    }
}

#[test]
fn test_size_rotation_keeps_whole_units() {
    let dir = test_utils::dir();
    let file = FileTransport::builder(dir.path(), "app")
        .file_size_limit(12_u64)
        .file_date_template("fixed")
        .save_rotation_file(true)
        .try_build()
        .unwrap();
    let transport = file.transport();
    for unit in ["aaaa\n", "bbbb\n", "cccc\n", "dddd\n", "eeee\n"] {
        assert!(transport.write_str(unit));
    }
    transport.end();
    transport.join();

    let names: Vec<String> = test_utils::files(dir.path(), "*")
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec!["app_fixed(1).log", "app_fixed(2).log", "app_fixed.log"]
    );
    let read = |name: &str| test_utils::read(&file.directory().join(name));
    assert_eq!(read("app_fixed.log"), "aaaa\nbbbb\n");
    assert_eq!(read("app_fixed(1).log"), "cccc\ndddd\n");
    assert_eq!(read("app_fixed(2).log"), "eeee\n");
    assert_eq!(file.bytes_written(), 5);
}

#[test]
fn test_time_rotation() {
    let dir = test_utils::dir();
    let (tx, rx) = unbounded();
    let file = FileTransport::builder(dir.path(), "app")
        .file_time_limit(TimeLimit::Second)
        .file_date_template("%Y%m%d%H%M%S")
        .save_rotation_file(true)
        .on(EventKind::Rotate, move |_| tx.send(()).unwrap())
        .try_build()
        .unwrap();
    let transport = file.transport();

    let mut written = 0;
    for _ in 0..25 {
        assert!(transport.write_str(&format!("line {written}\n")));
        written += 1;
        std::thread::sleep(Duration::from_millis(100));
    }
    transport.end();
    transport.join();

    let rotations = rx.try_iter().count();
    assert!((2..=3).contains(&rotations), "{rotations} rotations");

    let files = test_utils::files(dir.path(), "app_*.log");
    assert_eq!(files.len(), rotations + 1);
    let lines: usize = files
        .iter()
        .map(|path| test_utils::read(path).lines().count())
        .sum();
    assert_eq!(lines, written);
}

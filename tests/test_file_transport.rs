
use crossbeam_channel::unbounded;
use std::sync::Arc;
use syslane::{
    transports::{FileTransport, FileTransportOptions},
    EventKind, Level, SyslaneError, TransportEvent,
};

#[test]
fn test_write_and_end() {
    let dir = test_utils::dir();
    let (tx, rx) = unbounded();
    let file = FileTransport::builder(dir.path(), "app")
        .on(EventKind::Open, {
            let tx = tx.clone();
            move |e| {
                if let TransportEvent::Open(path) = e {
                    tx.send(path.clone()).unwrap();
                }
            }
        })
        .try_build()
        .unwrap();

    let transport = file.transport();
    assert!(transport.write_str("first line\n"));
    assert!(transport.write_str("second line\n"));
    transport.end();
    transport.join();

    let path = rx.try_recv().unwrap().unwrap();
    assert_eq!(Some(path.clone()), file.path());
    assert!(path.starts_with(file.directory()));
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("app_"));
    assert!(name.ends_with(".log"));

    assert_eq!(test_utils::read(&path), "first line\nsecond line\n");
    assert_eq!(file.bytes_written(), 23);
    assert!(transport.is_closed());
    assert!(!transport.is_destroyed());
    drop(tx);
}

#[test]
fn test_level_filter_from_options() {
    let dir = test_utils::dir();
    let options = FileTransportOptions::from_toml(
        r#"
        levels = ["error", "crit"]
        fileDateTemplate = "fixed"
        "#,
    )
    .unwrap();
    let file = FileTransport::builder(dir.path(), "app")
        .options(options)
        .try_build()
        .unwrap();
    let transport = file.transport();
    assert!(transport.accepts(Level::ERROR));
    assert!(transport.accepts(Level::CRIT));
    assert!(!transport.accepts(Level::DEBUG));
    transport.end();
    transport.join();
    assert_eq!(
        test_utils::files(dir.path(), "*"),
        vec![file.directory().join("app_fixed.log")]
    );
}

#[test]
fn test_oversized_unit_destroys() {
    let dir = test_utils::dir();
    let (tx, rx) = unbounded();
    let file = FileTransport::builder(dir.path(), "app")
        .file_size_limit(4_u64)
        .on(EventKind::Error, move |e| {
            if let TransportEvent::Error(err) = e {
                tx.send(Arc::clone(err)).unwrap();
            }
        })
        .try_build()
        .unwrap();
    let transport = file.transport();
    assert!(transport.write_str("too long\n"));
    transport.join();

    let err = rx.try_recv().unwrap();
    assert!(matches!(
        *err,
        SyslaneError::MessageSizeExceeded { size: 9, limit: 4 }
    ));
    assert!(transport.is_destroyed());
    assert!(transport.is_closed());
    assert_eq!(test_utils::read(&file.path().unwrap()), "");
    assert!(!transport.write_str("x"));
}

#[test]
fn test_destroy_keeps_what_was_written() {
    let dir = test_utils::dir();
    let (tx, rx) = unbounded();
    let file = FileTransport::builder(dir.path(), "app")
        .on(EventKind::Close, move |_| tx.send(()).unwrap())
        .try_build()
        .unwrap();
    let transport = file.transport();
    assert!(transport.write_str("written\n"));
    assert!(test_utils::wait_until(|| file.bytes_written() == 8));
    transport.destroy(None);
    transport.join();

    rx.try_recv().unwrap();
    assert!(transport.is_destroyed());
    assert_eq!(test_utils::read(&file.path().unwrap()), "written\n");
}

#[test]
fn test_bad_directory() {
    let dir = test_utils::dir();
    let not_a_dir = dir.path().join("plain_file");
    std::fs::write(&not_a_dir, "x").unwrap();
    assert!(matches!(
        FileTransport::builder(&not_a_dir, "app").try_build(),
        Err(SyslaneError::OutputBadDirectory)
    ));
}

#[test]
fn test_missing_directory_is_created() {
    let dir = test_utils::dir();
    let nested = dir.path().join("a").join("b");
    let file = FileTransport::builder(&nested, "app").try_build().unwrap();
    assert!(nested.is_dir());
    file.transport().end();
    file.transport().join();
}

#[test]
fn test_invalid_date_template() {
    let dir = test_utils::dir();
    assert!(matches!(
        FileTransport::builder(dir.path(), "app")
            .file_date_template("%Y-%Q")
            .try_build(),
        Err(SyslaneError::InvalidDateTemplate(_))
    ));
}

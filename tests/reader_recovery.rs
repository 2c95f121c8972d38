use std::io::{Seek, SeekFrom, Write};
use std::time::Duration;

use seglogq::{segment_path, Error, OpenOptions, Queue};
use tempfile::tempdir;

#[test]
fn open_recovery_leaves_physical_size_equal_to_durable_size() {
    let dir = tempdir().expect("tempdir");
    let prefix = dir.path().join("q");

    {
        let mut queue = Queue::open(&prefix, 4096, OpenOptions::DEFAULT).expect("open");
        queue.write(1, b"committed").expect("write");
        queue.synchronize(true).expect("synchronize");
        queue.write(2, b"uncommitted tail").expect("write without a following sync");
    }

    let _queue = Queue::open(&prefix, 4096, OpenOptions::DEFAULT).expect("reopen");
    let segment0 = segment_path(&prefix, 0);
    let physical_size = std::fs::metadata(&segment0).expect("stat").len();

    // Reading the recovered segment's own header.durable_size via a second
    // open confirms invariant 4: after recovery, physical size == durable_size.
    let read_only = Queue::open(&prefix, 4096, OpenOptions::READ_ONLY).expect("reopen read-only");
    let mut reader = read_only.make_reader(0).expect("make reader");
    let (ts, msg) = reader.read(Some(Duration::ZERO)).expect("read surviving record");
    assert_eq!(ts, 1);
    assert_eq!(msg, b"committed".to_vec());
    assert!(matches!(
        reader.read(Some(Duration::ZERO)),
        Err(Error::NotFound)
    ));

    let metadata = seglogq::read_file_metadata(&segment0).expect("read file metadata");
    assert_eq!(metadata.durable_size, physical_size);
}

#[test]
fn a_checksum_corrupted_record_surfaces_broken_data_and_freezes_the_cursor() {
    let dir = tempdir().expect("tempdir");
    let prefix = dir.path().join("q");

    let mut queue = Queue::open(&prefix, 4096, OpenOptions::DEFAULT).expect("open");
    queue.write(1, b"hello").expect("write");
    queue.synchronize(true).expect("synchronize");

    let segment0 = segment_path(&prefix, 0);
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .open(&segment0)
        .expect("open for corruption");
    let size = file.metadata().expect("stat").len();
    file.seek(SeekFrom::Start(size - 1)).expect("seek to checksum byte");
    file.write_all(&[0xff]).expect("corrupt checksum byte");
    drop(file);

    let queue = Queue::open(&prefix, 4096, OpenOptions::READ_ONLY).expect("reopen read-only");
    let mut reader = queue.make_reader(0).expect("make reader");
    assert!(matches!(
        reader.read(Some(Duration::ZERO)),
        Err(Error::BrokenData(_))
    ));
    // The cursor is left at the broken position: retrying surfaces the
    // same failure rather than silently skipping past it.
    assert!(matches!(
        reader.read(Some(Duration::ZERO)),
        Err(Error::BrokenData(_))
    ));
}

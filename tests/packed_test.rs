use std::path::PathBuf;

use image_resource_engine::error::{FormatError, ResourceError};
use image_resource_engine::format::packed::{build_packed, load_packed};
use image_resource_engine::progress::ProgressSink;

const FRAME_SIZE: usize = 4 * 1024;

fn write_frames(dir: &std::path::Path, fills: &[u8]) -> Vec<PathBuf> {
    fills
        .iter()
        .enumerate()
        .map(|(i, fill)| {
            let path = dir.join(format!("output_{:04}.bin", i + 1));
            std::fs::write(&path, vec![*fill; FRAME_SIZE]).unwrap();
            path
        })
        .collect()
}

#[tokio::test]
async fn test_build_and_load_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let sources = write_frames(dir.path(), &[0x11, 0x22, 0x33]);
    let output = dir.path().join("packed.rgb");

    let (progress, mut rx) = ProgressSink::channel(256);
    build_packed(&sources, &output, FRAME_SIZE, &progress)
        .await
        .unwrap();

    let meta = std::fs::metadata(&output).unwrap();
    assert_eq!(meta.len(), (FRAME_SIZE * 3) as u64);

    let frames = load_packed(&output, FRAME_SIZE, 3).unwrap();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0][0], 0x11);
    assert_eq!(frames[1][0], 0x22);
    assert_eq!(frames[2][FRAME_SIZE - 1], 0x33);

    // The build ends with the hide event.
    let mut last = None;
    while let Ok(event) = rx.try_recv() {
        last = Some(event);
    }
    let last = last.unwrap();
    assert_eq!(last.current, 100);
    assert!(last.message.is_none());
}

#[tokio::test]
async fn test_wrong_size_source_leaves_old_pack_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut sources = write_frames(dir.path(), &[0x11, 0x22]);
    // Third frame is short.
    let short = dir.path().join("output_0003.bin");
    std::fs::write(&short, vec![0x33u8; FRAME_SIZE / 2]).unwrap();
    sources.push(short);

    let output = dir.path().join("packed.rgb");
    std::fs::write(&output, b"previous pack").unwrap();

    let err = build_packed(&sources, &output, FRAME_SIZE, &ProgressSink::disabled())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ResourceError::Format(FormatError::WrongFrameSize { .. })
    ));
    // Validation happens before the old pack is removed.
    assert_eq!(std::fs::read(&output).unwrap(), b"previous pack");
}

#[tokio::test]
async fn test_missing_source_fails_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let mut sources = write_frames(dir.path(), &[0x11]);
    sources.push(dir.path().join("output_0002.bin")); // never written

    let output = dir.path().join("packed.rgb");
    let result = build_packed(&sources, &output, FRAME_SIZE, &ProgressSink::disabled()).await;

    assert!(result.is_err());
    assert!(!output.exists());
}

#[test]
fn test_short_pack_load_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("packed.rgb");
    // Two and a half frames.
    std::fs::write(&path, vec![0u8; FRAME_SIZE * 5 / 2]).unwrap();

    assert!(load_packed(&path, FRAME_SIZE, 3).is_err());
}

#[test]
fn test_missing_pack_load_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_packed(&dir.path().join("packed.rgb"), FRAME_SIZE, 3).is_err());
}

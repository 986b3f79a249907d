//! End-to-end tests running real decoders over still images.

use std::sync::Arc;
use std::time::Duration;

use qr_scanner::cli::{self, CommandError, ScanOptions, Strategy};
use qr_scanner::config::Config;
use qr_scanner::decoder::{
    ContinuousDecoder, DecodeOptions, FrameDecoder, RqrrDecoder, SampledDecoder,
};
use qr_scanner::media::{Frame, MediaSource, StillImageSource, StreamConstraints};
use qr_scanner::result::read_artifact;
use qr_scanner::{ScanController, SessionState};
use qrcode::{Color, QrCode};
use tempfile::TempDir;

const BINARY_PAYLOAD: [u8; 5] = [0xff, 0x00, 0x01, 0x02, 0x03];

/// Render `payload` as a QR code, 6 px per module with a 4 module quiet zone.
fn qr_image(payload: &[u8]) -> image::RgbImage {
    const SCALE: u32 = 6;
    const QUIET: u32 = 4;
    let code = QrCode::new(payload).unwrap();
    let modules = code.width() as u32;
    let colors = code.to_colors();
    let side = (modules + 2 * QUIET) * SCALE;
    let span = QUIET..QUIET + modules;

    image::RgbImage::from_fn(side, side, |x, y| {
        let (mx, my) = (x / SCALE, y / SCALE);
        let dark = span.contains(&mx)
            && span.contains(&my)
            && colors[((my - QUIET) * modules + (mx - QUIET)) as usize] == Color::Dark;
        if dark {
            image::Rgb([0, 0, 0])
        } else {
            image::Rgb([255, 255, 255])
        }
    })
}

fn qr_frame(payload: &[u8]) -> Frame {
    let image = qr_image(payload);
    let (width, height) = image.dimensions();
    Frame::rgb(image.into_raw(), width, height)
}

fn qr_png(dir: &TempDir, name: &str, payload: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    qr_image(payload).save(&path).unwrap();
    path
}

fn still_controller(
    media: &Arc<StillImageSource>,
    decoder: Arc<dyn FrameDecoder>,
) -> ScanController {
    ScanController::new(
        Arc::clone(media) as Arc<dyn MediaSource>,
        decoder,
        StreamConstraints::default(),
    )
}

/// Write a blank white PNG and return its path.
fn blank_png(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("blank.png");
    image::RgbImage::from_pixel(64, 64, image::Rgb([255, 255, 255]))
        .save(&path)
        .unwrap();
    path
}

#[tokio::test]
async fn test_blank_image_keeps_scanning_until_stopped() {
    let media = Arc::new(StillImageSource::new(
        Frame::rgb(vec![255; 64 * 64 * 3], 64, 64),
        200,
    ));
    let decoder = SampledDecoder::with_options(
        RqrrDecoder::new(),
        DecodeOptions { try_inverted: true },
        Duration::from_millis(1),
    );
    let controller = ScanController::new(
        Arc::clone(&media) as Arc<dyn MediaSource>,
        Arc::new(decoder),
        StreamConstraints::default(),
    );

    controller.start().await.unwrap();
    let mut updates = controller.subscribe();
    tokio::time::timeout(Duration::from_secs(5), updates.wait_for(|s| s.attempts >= 2))
        .await
        .expect("decoder should keep sampling")
        .unwrap();
    assert_eq!(controller.state(), SessionState::Scanning);
    assert!(controller.result().is_none());

    controller.stop();
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(media.open_streams(), 0);
}

#[tokio::test]
async fn test_image_file_through_continuous_decoder() {
    let dir = TempDir::new().unwrap();
    let media = Arc::new(StillImageSource::from_path(&blank_png(&dir), 100).unwrap());
    let decoder = ContinuousDecoder::with_options(
        RqrrDecoder::new(),
        DecodeOptions::default(),
        Duration::from_millis(1),
    );
    let controller = ScanController::new(
        Arc::clone(&media) as Arc<dyn MediaSource>,
        Arc::new(decoder),
        StreamConstraints::default(),
    );

    let outcome = tokio::time::timeout(Duration::from_millis(100), controller.scan()).await;
    assert!(outcome.is_err(), "a blank image holds no code");
    assert_eq!(controller.state(), SessionState::Scanning);
    assert_eq!(media.open_streams(), 1);

    drop(controller);
    assert_eq!(media.open_streams(), 0);
}

#[tokio::test]
async fn test_decode_command_times_out_on_blank_image() {
    let dir = TempDir::new().unwrap();
    let options = ScanOptions {
        timeout: Some(1),
        save_dir: Some(dir.path().to_path_buf()),
        ..ScanOptions::default()
    };

    let err = cli::run_decode(&Config::default(), &blank_png(&dir), &options)
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::TimedOut(1)));
}

#[tokio::test]
async fn test_text_code_through_continuous_decoder() {
    let media = Arc::new(StillImageSource::new(qr_frame(b"HELLO"), 100));
    let decoder = ContinuousDecoder::with_options(
        RqrrDecoder::new(),
        DecodeOptions::default(),
        Duration::from_millis(1),
    );
    let controller = still_controller(&media, Arc::new(decoder));

    let result = tokio::time::timeout(Duration::from_secs(5), controller.scan())
        .await
        .expect("code should decode")
        .unwrap();
    assert_eq!(result.text, "HELLO");
    assert_eq!(result.raw_bytes, None);
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(media.open_streams(), 0);
}

#[tokio::test]
async fn test_binary_code_through_sampled_decoder() {
    let media = Arc::new(StillImageSource::new(qr_frame(&BINARY_PAYLOAD), 100));
    let decoder = SampledDecoder::with_options(
        RqrrDecoder::new(),
        DecodeOptions::default(),
        Duration::from_millis(1),
    );
    let controller = still_controller(&media, Arc::new(decoder));

    let result = tokio::time::timeout(Duration::from_secs(5), controller.scan())
        .await
        .expect("code should decode")
        .unwrap();
    assert_eq!(result.raw_bytes, Some(BINARY_PAYLOAD.to_vec()));
    assert!(result.is_binary());
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(media.open_streams(), 0);
}

#[tokio::test]
async fn test_text_png_through_sampled_decoder() {
    let dir = TempDir::new().unwrap();
    let path = qr_png(&dir, "hello.png", b"HELLO");
    let media = Arc::new(StillImageSource::from_path(&path, 100).unwrap());
    let decoder = SampledDecoder::with_options(
        RqrrDecoder::new(),
        DecodeOptions::default(),
        Duration::from_millis(1),
    );
    let controller = still_controller(&media, Arc::new(decoder));

    let result = tokio::time::timeout(Duration::from_secs(5), controller.scan())
        .await
        .expect("code should decode")
        .unwrap();
    assert_eq!(result.text, "HELLO");
    assert_eq!(media.open_streams(), 0);
}

#[tokio::test]
async fn test_decode_command_saves_binary_payload() {
    let dir = TempDir::new().unwrap();
    let image = qr_png(&dir, "binary.png", &BINARY_PAYLOAD);
    let out = dir.path().join("out");
    let options = ScanOptions {
        timeout: Some(5),
        save_dir: Some(out.clone()),
        ..ScanOptions::default()
    };

    cli::run_decode(&Config::default(), &image, &options)
        .await
        .unwrap();

    let saved: Vec<_> = std::fs::read_dir(&out)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(saved.len(), 1);
    let name = saved[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("qr-data-") && name.ends_with(".bin"), "{}", name);
    assert_eq!(read_artifact(&saved[0]).unwrap(), BINARY_PAYLOAD.to_vec());
}

#[tokio::test]
async fn test_decode_command_text_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let image = qr_png(&dir, "hello.png", b"HELLO");
    let out = dir.path().join("out");
    let options = ScanOptions {
        timeout: Some(5),
        save_dir: Some(out.clone()),
        strategy: Some(Strategy::Sampled),
        ..ScanOptions::default()
    };

    cli::run_decode(&Config::default(), &image, &options)
        .await
        .unwrap();
    assert!(!out.exists());
}

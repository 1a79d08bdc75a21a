use super::*;
use crate::config::settings::MixerConfig;
use crate::foundation::core::Canvas;
use crate::waveform::bars::ColorMode;

fn small_spec(mode: ColorMode) -> WaveformSpec {
    let mut cfg = MixerConfig::default();
    cfg.encoder.fps.num = 10;
    cfg.waveform.bar_count = 8;
    cfg.waveform.strip_fraction = 0.25;
    let frame = Canvas {
        width: 64,
        height: 40,
    };
    WaveformSpec::from_config(&cfg, mode, frame).unwrap()
}

fn sine(freq: f32, secs: f32) -> Vec<f32> {
    let n = (44_100.0 * secs) as usize;
    (0..n)
        .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / 44_100.0).sin())
        .collect()
}

#[test]
fn bars_are_bottom_aligned_with_gap() {
    let spec = small_spec(ColorMode::Classic);
    let mut heights = vec![0; 8];
    heights[0] = 10;
    heights[2] = 3;
    let frame = WaveformFrame::from_heights(&spec, &heights);

    assert_eq!((frame.width(), frame.height()), (64, 10));
    assert_eq!(frame.alpha.get_pixel(0, 0)[0], 180);
    assert_eq!(frame.alpha.get_pixel(6, 9)[0], 180);
    assert_eq!(frame.alpha.get_pixel(7, 9)[0], 0);
    assert_eq!(frame.alpha.get_pixel(8, 9)[0], 0);
    assert_eq!(frame.rgb.get_pixel(3, 5).0, [0, 255, 0]);

    assert_eq!(frame.alpha.get_pixel(16, 6)[0], 0);
    assert_eq!(frame.alpha.get_pixel(16, 7)[0], 180);
    assert_eq!(frame.alpha.get_pixel(22, 9)[0], 180);
    assert_eq!(frame.alpha.get_pixel(23, 9)[0], 0);
}

#[test]
fn rgba_bytes_interleave_planes() {
    let spec = small_spec(ColorMode::Gradient);
    let mut heights = vec![0; 8];
    heights[0] = 1;
    let frame = WaveformFrame::from_heights(&spec, &heights);
    let bytes = frame.to_rgba_bytes();
    assert_eq!(bytes.len(), 64 * 10 * 4);

    let bottom_left = (9 * 64) * 4;
    assert_eq!(&bytes[bottom_left..bottom_left + 4], &[0, 120, 255, 180]);
    assert_eq!(&bytes[0..4], &[0, 0, 0, 0]);

    let img = frame.to_rgba_image().unwrap();
    assert_eq!(img.get_pixel(0, 9).0, [0, 120, 255, 180]);
}

#[test]
fn silence_draws_nothing() {
    let spec = small_spec(ColorMode::Classic);
    let renderer = WaveformRenderer::from_pcm(spec, &vec![0.0; 44_100], 1.0).unwrap();
    assert!(renderer.bar_heights_at(0.5).iter().all(|h| *h == 0));
    let frame = renderer.render_at(0.5);
    assert!(frame.alpha.as_raw().iter().all(|a| *a == 0));
}

#[test]
fn tone_raises_bars_within_strip() {
    let spec = small_spec(ColorMode::Classic);
    let renderer = WaveformRenderer::from_pcm(spec, &sine(1000.0, 1.0), 1.0).unwrap();
    let heights = renderer.bar_heights_at(0.5);
    assert_eq!(heights.len(), 8);
    assert!(heights.iter().all(|h| *h <= 10));
    assert!(heights.iter().copied().max().unwrap() >= 8);
}

#[test]
fn frames_cover_duration_at_output_rate() {
    let spec = small_spec(ColorMode::Classic);
    let renderer = WaveformRenderer::from_pcm(spec.clone(), &sine(440.0, 1.0), 1.0).unwrap();
    assert_eq!(renderer.frame_count(), 10);
    let frames = renderer.frames();
    assert_eq!(frames.len(), 10);
    for frame in frames {
        assert_eq!((frame.width(), frame.height()), (64, 10));
    }

    let longer = WaveformRenderer::from_pcm(spec, &sine(440.0, 1.0), 2.05).unwrap();
    assert_eq!(longer.frame_count(), 21);
}

#[test]
fn mismatched_analysis_is_rejected() {
    let spec = small_spec(ColorMode::Classic);
    let mut other = spec.analysis;
    other.hop_length = 256;
    let spectrogram = Spectrogram::analyze(&sine(440.0, 0.2), other, spec.floor_db).unwrap();
    assert!(WaveformRenderer::new(spec, spectrogram, 0.2).is_err());
}

#[test]
fn non_positive_duration_is_rejected() {
    let spec = small_spec(ColorMode::Classic);
    assert!(WaveformRenderer::from_pcm(spec, &sine(440.0, 0.2), 0.0).is_err());
}

#[test]
fn png_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("strip.png");
    let spec = small_spec(ColorMode::Classic);
    WaveformFrame::from_heights(&spec, &[5; 8])
        .save_png(&path)
        .unwrap();
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}

#[test]
fn height_table_matches_per_frame_heights() {
    let spec = small_spec(ColorMode::Gradient);
    let renderer = WaveformRenderer::from_pcm(spec.clone(), &sine(3000.0, 0.5), 0.5).unwrap();
    let table = renderer.height_table();
    assert_eq!(table.len(), 5);
    for (i, row) in table.iter().enumerate() {
        assert_eq!(row, &renderer.bar_heights_at(spec.fps.frames_to_secs(i as u64)));
    }
}

#[test]
fn frames_are_drawn_from_the_height_table() {
    let spec = small_spec(ColorMode::Classic);
    let renderer = WaveformRenderer::from_pcm(spec.clone(), &sine(1000.0, 0.5), 0.5).unwrap();
    let table = renderer.height_table();
    let frames: Vec<WaveformFrame> = renderer.frames().collect();
    assert_eq!(frames.len(), table.len());
    for (frame, row) in frames.iter().zip(&table) {
        assert_eq!(frame, &WaveformFrame::from_heights(&spec, row));
    }
    assert_eq!(renderer.frames().count(), 5);
}

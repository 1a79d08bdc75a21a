use super::*;

#[test]
fn defaults_match_documented_values() {
    let cfg = MixerConfig::default();
    cfg.validate().unwrap();
    assert_eq!(cfg.results_folder, "__results");
    assert_eq!(cfg.formats.audio, vec!["mp3"]);
    assert_eq!(cfg.formats.video, vec!["mp4"]);
    assert_eq!(cfg.formats.image_preference, vec!["jpg", "jpeg", "webp", "png"]);
    assert_eq!(cfg.encoder.canvas.width, 1920);
    assert_eq!(cfg.encoder.canvas.height, 1080);
    assert_eq!(cfg.encoder.fps.to_string(), "30");
    assert_eq!(cfg.waveform.bar_count, 64);
    assert_eq!(cfg.audio_collision, AudioCollisionPolicy::Reject);
}

#[test]
fn partial_json_keeps_defaults_and_normalizes_extensions() {
    let cfg = MixerConfig::from_json(
        r#"{
            "formats": { "audio": [".MP3", "Wav"], "image": [".PNG"], "image_preference": ["png"] },
            "encoder": { "canvas": { "width": 1280, "height": 720 } },
            "audio_collision": "first_by_name"
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.formats.audio, vec!["mp3", "wav"]);
    assert_eq!(cfg.formats.video, vec!["mp4"]);
    assert_eq!(cfg.formats.image, vec!["png"]);
    assert_eq!(cfg.encoder.canvas.width, 1280);
    assert_eq!(cfg.encoder.video_preset, "ultrafast");
    assert_eq!(cfg.audio_collision, AudioCollisionPolicy::FirstByName);
}

#[test]
fn overlapping_extension_sets_are_rejected() {
    let err = MixerConfig::from_json(r#"{ "formats": { "audio": ["mp4"] } }"#).unwrap_err();
    assert!(err.to_string().contains("'mp4'"));
}

#[test]
fn odd_canvas_is_rejected() {
    let mut cfg = MixerConfig::default();
    cfg.encoder.canvas.width = 1921;
    assert!(cfg.validate().is_err());
}

#[test]
fn bad_waveform_settings_are_rejected() {
    let mut cfg = MixerConfig::default();
    cfg.waveform.n_fft = 1000;
    assert!(cfg.validate().is_err());

    let mut cfg = MixerConfig::default();
    cfg.waveform.bar_count = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn results_folder_must_be_a_plain_name() {
    let mut cfg = MixerConfig::default();
    cfg.results_folder = "out/nested".to_string();
    assert!(cfg.validate().is_err());
    cfg.results_folder = "..".to_string();
    assert!(cfg.validate().is_err());
}

#[test]
fn image_rank_puts_unlisted_extensions_last() {
    let formats = FormatConfig::default();
    assert_eq!(formats.image_rank("jpg"), 0);
    assert_eq!(formats.image_rank("png"), 3);
    assert_eq!(formats.image_rank("bmp"), usize::MAX);
}

#[test]
fn config_round_trips_through_json() {
    let cfg = MixerConfig::default();
    let json = serde_json::to_string_pretty(&cfg).unwrap();
    assert_eq!(MixerConfig::from_json(&json).unwrap(), cfg);
}

#[test]
fn missing_config_file_is_an_error() {
    assert!(MixerConfig::from_path("/nonexistent/media-mixer.json").is_err());
}

use super::*;
use std::collections::HashMap;

struct TableProbe {
    durations: HashMap<&'static str, f64>,
    sizes: HashMap<&'static str, Canvas>,
}

impl TableProbe {
    fn new(durations: HashMap<&'static str, f64>) -> Self {
        Self {
            durations,
            sizes: HashMap::new(),
        }
    }

    fn with_size(mut self, name: &'static str, width: u32, height: u32) -> Self {
        self.sizes.insert(name, Canvas { width, height });
        self
    }
}

impl DurationProbe for TableProbe {
    fn probe_duration(&self, path: &Path) -> MixerResult<f64> {
        let name = path.file_name().unwrap().to_string_lossy();
        self.durations
            .get(name.as_ref())
            .copied()
            .ok_or_else(|| MixerError::duration_unavailable(path, "not in table"))
    }

    fn probe_frame_size(&self, path: &Path) -> MixerResult<Canvas> {
        let name = path.file_name().unwrap().to_string_lossy();
        self.sizes
            .get(name.as_ref())
            .copied()
            .ok_or_else(|| MixerError::frame_size_unavailable(path, "not in table"))
    }
}

fn audio(name: &str, secs: f64) -> MediaAsset {
    MediaAsset::new(format!("/in/{name}"), MediaKind::Audio)
        .unwrap()
        .with_duration(secs)
}

fn visual(name: &str, kind: MediaKind) -> MediaAsset {
    MediaAsset::new(format!("/in/{name}"), kind).unwrap()
}

fn pair(audio_secs: f64, visual_name: &str, kind: MediaKind) -> MediaPair {
    MediaPair::new(audio("song.mp3", audio_secs), visual(visual_name, kind)).unwrap()
}

fn position(args: &[OsString], flag: &str) -> usize {
    args.iter().position(|a| a == flag).unwrap()
}

#[test]
fn shorter_video_loops() {
    let cfg = MixerConfig::default();
    let probe = TableProbe::new(HashMap::from([("song.mp4", 10.0)]));
    let plan = ProcessingPlanner::new(&cfg, &probe)
        .plan(&pair(25.0, "song.mp4", MediaKind::Video), None, Path::new("/out"))
        .unwrap();

    assert_eq!(plan.branch, Branch::LoopVideo { loop_count: 3 });
    assert_eq!(plan.output_path, Path::new("/out/song.mp4"));
    assert_eq!(plan.audio_duration_secs, 25.0);
    assert_eq!(
        &plan.encoder_args[..9],
        &["-y", "-loglevel", "error", "-stream_loop", "2", "-i", "/in/song.mp4", "-i", "/in/song.mp3"]
    );
    let t = position(&plan.encoder_args, "-t");
    assert_eq!(plan.encoder_args[t + 1], "25");
    assert_eq!(plan.encoder_args.last().unwrap(), "/out/song.mp4");
    assert_eq!(plan.encoder_args[plan.encoder_args.len() - 2], "-shortest");
    assert!(!plan.encoder_args.iter().any(|a| a == "stillimage"));
    assert!(plan.scratch_audio.is_none());
}

#[test]
fn exact_multiple_still_adds_a_loop() {
    assert_eq!(choose_video_branch(20.0, 10.0), Branch::LoopVideo { loop_count: 3 });
    assert_eq!(choose_video_branch(10.0, 10.0), Branch::TrimVideo);
    assert_eq!(choose_video_branch(10.5, 10.0), Branch::LoopVideo { loop_count: 2 });
}

#[test]
fn longer_video_is_trimmed() {
    let cfg = MixerConfig::default();
    let probe = TableProbe::new(HashMap::from([("song.mp4", 40.0)]));
    let plan = ProcessingPlanner::new(&cfg, &probe)
        .plan(&pair(25.5, "song.mp4", MediaKind::Video), None, Path::new("/out"))
        .unwrap();

    assert_eq!(plan.branch, Branch::TrimVideo);
    assert!(!plan.encoder_args.iter().any(|a| a == "-stream_loop"));
    let t = position(&plan.encoder_args, "-t");
    assert_eq!(plan.encoder_args[t + 1], "25.5");
}

#[test]
fn image_is_held_with_still_tuning() {
    let cfg = MixerConfig::default();
    let probe = TableProbe::new(HashMap::new());
    let plan = ProcessingPlanner::new(&cfg, &probe)
        .plan(&pair(12.0, "song.jpg", MediaKind::Image), None, Path::new("/out"))
        .unwrap();

    assert_eq!(plan.branch, Branch::ImageToVideo);
    assert_eq!(
        &plan.encoder_args[3..9],
        &["-loop", "1", "-framerate", "30", "-i", "/in/song.jpg"]
    );
    let tune = position(&plan.encoder_args, "-tune");
    assert_eq!(plan.encoder_args[tune + 1], "stillimage");
    assert_eq!(plan.encoder_args[tune - 2], "-preset");
}

#[test]
fn codec_tail_is_fixed() {
    let cfg = MixerConfig::default();
    let probe = TableProbe::new(HashMap::from([("song.mp4", 40.0)]));
    let plan = ProcessingPlanner::new(&cfg, &probe)
        .plan(&pair(25.0, "song.mp4", MediaKind::Video), None, Path::new("/out"))
        .unwrap();

    let start = position(&plan.encoder_args, "-c:v");
    let expected = [
        "-c:v",
        "libx264",
        "-preset",
        "ultrafast",
        "-profile:v",
        "main",
        "-level",
        "4.0",
        "-tag:v",
        "avc1",
        "-pix_fmt",
        "yuv420p",
        "-vf",
        "scale=1920:1080:force_original_aspect_ratio=decrease,pad=1920:1080:(ow-iw)/2:(oh-ih)/2",
        "-r",
        "30",
        "-vsync",
        "cfr",
        "-c:a",
        "aac",
        "-b:a",
        "192k",
        "-ac",
        "2",
        "-ar",
        "44100",
        "-movflags",
        "+faststart",
        "-threads",
        "4",
        "-shortest",
        "/out/song.mp4",
    ];
    assert_eq!(&plan.encoder_args[start..], &expected);
}

#[test]
fn prefix_is_applied_to_output_name() {
    let mut cfg = MixerConfig::default();
    cfg.output_prefix = "mixed_".to_string();
    let probe = TableProbe::new(HashMap::new());
    let plan = ProcessingPlanner::new(&cfg, &probe)
        .plan(&pair(3.0, "song.png", MediaKind::Image), None, Path::new("/out"))
        .unwrap();
    assert_eq!(plan.output_path, Path::new("/out/mixed_song.mp4"));
}

#[test]
fn overlay_adds_strip_pipe_and_scratch_audio() {
    let cfg = MixerConfig::default();
    let probe = TableProbe::new(HashMap::from([("song.mp4", 10.0)]))
        .with_size("song.mp4", 1920, 1080);
    let plan = ProcessingPlanner::new(&cfg, &probe)
        .plan(
            &pair(25.0, "song.mp4", MediaKind::Video),
            Some(ColorMode::Gradient),
            Path::new("/out"),
        )
        .unwrap();

    let spec = plan.overlay.as_ref().unwrap();
    assert_eq!(spec.color_mode, ColorMode::Gradient);
    assert_eq!(plan.scratch_audio.as_deref(), Some(Path::new("/out/temp/song.f32le")));

    let args = &plan.encoder_args;
    assert_eq!(&args[3..7], &["-stream_loop", "2", "-i", "/in/song.mp4"]);
    let pipe = position(args, "pipe:0");
    assert_eq!(&args[pipe - 9..pipe], &["-f", "rawvideo", "-pix_fmt", "rgba", "-s", "1920x162", "-r", "30", "-i"]);
    let scratch = position(args, "/out/temp/song.f32le");
    assert_eq!(&args[scratch - 7..scratch], &["-f", "f32le", "-ar", "44100", "-ac", "2", "-i"]);
    assert!(!args.iter().any(|a| a == "/in/song.mp3"));
    assert!(!args.iter().any(|a| a == "-vf"));

    let fc = position(args, "-filter_complex");
    let filter = args[fc + 1].to_str().unwrap();
    assert!(filter.starts_with(
        "[0:v][1:v]overlay=x=(W-w)/2:y=H-h:format=auto[mixed];[mixed]scale=1920:1080"
    ));
    assert!(filter.ends_with("pad=1920:1080:(ow-iw)/2:(oh-ih)/2[v]"));
    assert_eq!(&args[fc + 2..fc + 6], &["-map", "[v]", "-map", "2:a:0"]);
}

#[test]
fn overlay_strip_matches_a_four_by_three_video() {
    let cfg = MixerConfig::default();
    let probe = TableProbe::new(HashMap::from([("song.mp4", 40.0)]))
        .with_size("song.mp4", 1440, 1080);
    let plan = ProcessingPlanner::new(&cfg, &probe)
        .plan(
            &pair(25.0, "song.mp4", MediaKind::Video),
            Some(ColorMode::Classic),
            Path::new("/out"),
        )
        .unwrap();

    let spec = plan.overlay.as_ref().unwrap();
    assert_eq!(
        spec.strip,
        Canvas {
            width: 1440,
            height: 162
        }
    );
    let size = position(&plan.encoder_args, "-s");
    assert_eq!(plan.encoder_args[size + 1], "1440x162");
}

#[test]
fn overlay_strip_matches_a_still_image() {
    let dir = tempfile::tempdir().unwrap();
    let cover = dir.path().join("song.png");
    image::RgbImage::new(800, 600).save(&cover).unwrap();
    let cfg = MixerConfig::default();
    let probe = TableProbe::new(HashMap::new());
    let pair = MediaPair::new(
        audio("song.mp3", 4.0),
        MediaAsset::new(&cover, MediaKind::Image).unwrap(),
    )
    .unwrap();

    let plan = ProcessingPlanner::new(&cfg, &probe)
        .plan(&pair, Some(ColorMode::Classic), Path::new("/out"))
        .unwrap();
    assert_eq!(
        plan.overlay.as_ref().unwrap().strip,
        Canvas {
            width: 800,
            height: 90
        }
    );
}

#[test]
fn overlay_scratch_audio_uses_configured_channels() {
    let mut cfg = MixerConfig::default();
    cfg.encoder.audio_channels = 1;
    let probe = TableProbe::new(HashMap::from([("song.mp4", 40.0)]))
        .with_size("song.mp4", 1280, 720);
    let plan = ProcessingPlanner::new(&cfg, &probe)
        .plan(
            &pair(25.0, "song.mp4", MediaKind::Video),
            Some(ColorMode::Classic),
            Path::new("/out"),
        )
        .unwrap();

    assert_eq!(plan.overlay.as_ref().unwrap().channels, 1);
    let scratch = position(&plan.encoder_args, "/out/temp/song.f32le");
    assert_eq!(&plan.encoder_args[scratch - 3..scratch], &["-ac", "1", "-i"]);
}

#[test]
fn overlay_without_frame_size_fails() {
    let cfg = MixerConfig::default();
    let probe = TableProbe::new(HashMap::from([("song.mp4", 40.0)]));
    let err = ProcessingPlanner::new(&cfg, &probe)
        .plan(
            &pair(25.0, "song.mp4", MediaKind::Video),
            Some(ColorMode::Classic),
            Path::new("/out"),
        )
        .unwrap_err();
    assert!(matches!(err, MixerError::FrameSizeUnavailable { .. }));
}

#[cfg(unix)]
#[test]
fn non_utf8_paths_pass_through_unchanged() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt as _;

    let cover = Path::new(OsStr::from_bytes(b"/in/caf\xe9.png"));
    let out_dir = Path::new(OsStr::from_bytes(b"/out/r\xe9sultats"));
    let cfg = MixerConfig::default();
    let probe = TableProbe::new(HashMap::new());
    let pair = MediaPair::explicit(
        audio("song.mp3", 4.0),
        MediaAsset::new(cover, MediaKind::Image).unwrap(),
    )
    .unwrap();

    let plan = ProcessingPlanner::new(&cfg, &probe)
        .plan(&pair, None, out_dir)
        .unwrap();
    assert!(plan.encoder_args.iter().any(|a| a.as_os_str() == cover.as_os_str()));
    assert_eq!(
        plan.encoder_args.last().unwrap().as_os_str(),
        out_dir.join("song.mp4").as_os_str()
    );
}

#[test]
fn audio_visual_is_unsupported() {
    let cfg = MixerConfig::default();
    let probe = TableProbe::new(HashMap::new());
    let pair = MediaPair::explicit(audio("a.mp3", 5.0), audio("b.mp3", 5.0)).unwrap();
    let err = ProcessingPlanner::new(&cfg, &probe)
        .plan(&pair, None, Path::new("/out"))
        .unwrap_err();
    assert!(matches!(err, MixerError::UnsupportedMediaKind { kind: MediaKind::Audio, .. }));
}

#[test]
fn unprobeable_video_is_duration_unavailable() {
    let cfg = MixerConfig::default();
    let probe = TableProbe::new(HashMap::from([("song.mp4", 0.0)]));
    let planner = ProcessingPlanner::new(&cfg, &probe);
    let err = planner
        .plan(&pair(5.0, "song.mp4", MediaKind::Video), None, Path::new("/out"))
        .unwrap_err();
    assert!(matches!(err, MixerError::DurationUnavailable { .. }));

    let missing = MediaPair::new(audio("other.mp3", 5.0), visual("other.mp4", MediaKind::Video)).unwrap();
    let err = planner.plan(&missing, None, Path::new("/out")).unwrap_err();
    assert!(matches!(err, MixerError::DurationUnavailable { .. }));
}

#[test]
fn explicit_pair_probes_audio_when_needed() {
    let cfg = MixerConfig::default();
    let probe = TableProbe::new(HashMap::from([("track.mp3", 8.0)]));
    let pair = MediaPair::explicit(
        visual("track.mp3", MediaKind::Audio),
        visual("cover.png", MediaKind::Image),
    )
    .unwrap();
    let plan = ProcessingPlanner::new(&cfg, &probe)
        .plan(&pair, None, Path::new("/out"))
        .unwrap();
    assert_eq!(plan.audio_duration_secs, 8.0);
    assert_eq!(plan.output_path, Path::new("/out/track.mp4"));
}

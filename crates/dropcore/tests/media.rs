//! Splitter and extractor behaviour against a scripted ffmpeg.

mod common;

use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use common::{FakeFfmpeg, FakeProber};
use dropcore::media::{FileSplitter, FrameExtractor, MediaInfo, MediaTools, ThumbnailStrategy};

fn media_tools(prober: FakeProber, ffmpeg: FakeFfmpeg) -> (MediaTools, Arc<FakeProber>, Arc<FakeFfmpeg>) {
    let prober = Arc::new(prober);
    let ffmpeg = Arc::new(ffmpeg);
    (MediaTools::new(prober.clone(), ffmpeg.clone()), prober, ffmpeg)
}

fn source(dir: &Path, size: usize) -> std::path::PathBuf {
    let path = dir.join("job.mp4");
    std::fs::write(&path, vec![1u8; size]).unwrap();
    path
}

#[tokio::test]
async fn splitter_leaves_small_files_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = source(dir.path(), 100);
    let (tools, _, ffmpeg) = media_tools(FakeProber::new(60.0), FakeFfmpeg::new());

    let parts = FileSplitter::new(tools).split(&path, 100).await;

    assert_eq!(parts, vec![path]);
    assert!(ffmpeg.invocations().is_empty());
}

#[tokio::test]
async fn splitter_skips_failed_parts() {
    let dir = tempfile::tempdir().unwrap();
    let path = source(dir.path(), 300);
    let ffmpeg = FakeFfmpeg {
        fail_matching: Some("job_part2".to_string()),
        ..FakeFfmpeg::new()
    };
    let (tools, _, ffmpeg) = media_tools(FakeProber::new(90.0), ffmpeg);

    let parts = FileSplitter::new(tools).split(&path, 100).await;

    assert_eq!(parts, vec![dir.path().join("job_part1.mp4"), dir.path().join("job_part3.mp4")]);
    assert!(!dir.path().join("job_part2.mp4").exists());
    let starts: Vec<String> = ffmpeg.invocations().iter().map(|a| a[2].clone()).collect();
    assert_eq!(starts, ["0.000", "30.000", "60.000"]);
}

#[tokio::test]
async fn splitter_falls_back_to_the_original() {
    let dir = tempfile::tempdir().unwrap();
    let path = source(dir.path(), 300);

    // every part fails
    let ffmpeg = FakeFfmpeg {
        fail_matching: Some("_part".to_string()),
        ..FakeFfmpeg::new()
    };
    let (failing, _, _) = media_tools(FakeProber::new(90.0), ffmpeg);
    assert_eq!(FileSplitter::new(failing).split(&path, 100).await, vec![path.clone()]);

    // duration unknown
    let (unknown, _, ffmpeg) = media_tools(FakeProber::new(0.0), FakeFfmpeg::new());
    assert_eq!(FileSplitter::new(unknown).split(&path, 100).await, vec![path.clone()]);
    assert!(ffmpeg.invocations().is_empty());
}

#[tokio::test]
async fn midpoint_thumbnail_falls_back_to_accurate_seek() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    // an empty frame counts as a failure, so the fast seek "fails"
    let ffmpeg = FakeFfmpeg {
        output_size: 0,
        ..FakeFfmpeg::new()
    };
    let (tools, _, ffmpeg) = media_tools(FakeProber::new(100.0), ffmpeg);
    let extractor = FrameExtractor::new(tools, ThumbnailStrategy::Midpoint);

    assert_eq!(extractor.thumbnail(&path).await, None);

    let calls = ffmpeg.invocations();
    assert_eq!(calls.len(), 2);
    assert_eq!(&calls[0][1..3], ["-ss", "60.000"]);
    assert_eq!(&calls[1][1..5], ["-i", path.to_str().unwrap(), "-ss", "60.000"]);
    assert!(!dir.path().join("clip_thumb.jpg").exists());
}

#[tokio::test]
async fn best_frame_keeps_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    let (tools, _, ffmpeg) = media_tools(FakeProber::new(200.0), FakeFfmpeg::new());
    let extractor = FrameExtractor::new(tools, ThumbnailStrategy::BestFrame);

    let thumb = extractor.thumbnail(&path).await.unwrap();

    assert_eq!(thumb, dir.path().join("clip_thumb.jpg"));
    assert!(thumb.is_file());
    assert_eq!(ffmpeg.invocations().len(), 4);
    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().flatten().collect();
    assert_eq!(leftovers.len(), 1);
}

#[tokio::test]
async fn scene_strategy_falls_back_to_the_nearest_keyframe() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    let prober = FakeProber {
        keyframes: vec![0.0, 10.0, 58.0, 90.0],
        ..FakeProber::new(100.0)
    };
    let ffmpeg = FakeFfmpeg {
        fail_matching: Some("scene".to_string()),
        ..FakeFfmpeg::new()
    };
    let (tools, _, ffmpeg) = media_tools(prober, ffmpeg);
    let extractor = FrameExtractor::new(tools, ThumbnailStrategy::Scene);

    assert!(extractor.thumbnail(&path).await.is_some());

    let calls = ffmpeg.invocations();
    assert_eq!(calls.len(), 2);
    // 60% of the safe range (95s) is 57s; the closest keyframe is 58s
    assert_eq!(&calls[1][1..3], ["-ss", "58.000"]);
}

#[tokio::test]
async fn screenshots_are_evenly_spaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    let (tools, _, ffmpeg) = media_tools(FakeProber::new(100.0), FakeFfmpeg::new());
    let extractor = FrameExtractor::new(tools, ThumbnailStrategy::Midpoint);

    let shots = extractor.screenshots(&path, 4).await;

    assert_eq!(shots.len(), 4);
    assert_eq!(shots[0], dir.path().join("clip_screenshot_1.jpg"));
    let positions: Vec<String> = ffmpeg.invocations().iter().map(|a| a[2].clone()).collect();
    assert_eq!(positions, ["20.000", "40.000", "60.000", "80.000"]);
}

#[tokio::test]
async fn sample_starts_at_thirty_percent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    let (tools, prober, ffmpeg) = media_tools(FakeProber::new(100.0), FakeFfmpeg::new());
    let extractor = FrameExtractor::new(tools, ThumbnailStrategy::Midpoint);

    let sample = extractor.sample(&path, 20.0).await.unwrap();
    assert_eq!(sample, dir.path().join("clip_sample.mp4"));
    assert_eq!(&ffmpeg.invocations()[0][1..5], ["-ss", "30.000", "-t", "20.000"]);

    // nothing is produced without a duration
    prober.set(&path, MediaInfo::default());
    assert_eq!(extractor.sample(&path, 20.0).await, None);
    assert_eq!(extractor.thumbnail(&path).await, None);
    assert!(extractor.screenshots(&path, 3).await.is_empty());
    assert_eq!(ffmpeg.invocations().len(), 1);
}

#[tokio::test]
async fn splitting_twice_gives_the_same_parts() {
    let dir = tempfile::tempdir().unwrap();
    let path = source(dir.path(), 350);
    let (tools, _, ffmpeg) = media_tools(FakeProber::new(3600.0), FakeFfmpeg::new());
    let splitter = FileSplitter::new(tools);

    let first = splitter.split(&path, 175).await;
    let second = splitter.split(&path, 175).await;

    assert_eq!(first, vec![dir.path().join("job_part1.mp4"), dir.path().join("job_part2.mp4")]);
    assert_eq!(first, second);

    let spans: Vec<(String, String)> = ffmpeg
        .invocations()
        .iter()
        .map(|args| (args[2].clone(), args[4].clone()))
        .collect();
    let expected = [
        ("0.000".to_string(), "1800.000".to_string()),
        ("1800.000".to_string(), "1800.000".to_string()),
    ];
    assert_eq!(spans[..2], expected);
    assert_eq!(spans[2..], expected);
}

//! Integration Tests
//!
//! End-to-end tests for the voice effect pipeline.

use std::path::{Path, PathBuf};
use std::thread;

use approx::assert_abs_diff_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tempfile::{tempdir, TempDir};
use test_case::test_case;

use voicefx::dsp::{normalize, FilterKind, FilterPresets};
use voicefx::engine::{
    encode, file_checksum, ingest, write_wav, IngestOptions, WavEncoding, CANONICAL_SAMPLE_RATE,
};
use voicefx::{DeliveryFormat, EngineConfig, ErrorCategory, JobStage, SampleBuffer, VoiceEngine};

/// Engine writing into `root`, with optional WAV delivery and a fixed seed
fn engine_in(root: &TempDir, format: DeliveryFormat) -> VoiceEngine {
    let mut config = EngineConfig::with_temp_dir(root.path().join("work"));
    config.output_dir = Some(root.path().join("out"));
    config.output.format = format;
    config.noise_seed = Some(1234);
    VoiceEngine::new(config).unwrap()
}

fn write_clip(root: &TempDir, name: &str, buffer: &SampleBuffer) -> PathBuf {
    let path = root.path().join(name);
    write_wav(buffer, &path, WavEncoding::Float32).unwrap();
    path
}

fn read_back(path: &Path, scratch: &TempDir) -> SampleBuffer {
    let options = IngestOptions {
        sample_rate: CANONICAL_SAMPLE_RATE,
        max_input_bytes: 20 * 1024 * 1024,
        supported_extensions: vec!["wav".to_string(), "mp3".to_string()],
    };
    ingest(path, &scratch.path().join("readback.wav"), &options).unwrap()
}

/// Frequency estimate from rising zero crossings
fn zero_crossing_hz(buffer: &SampleBuffer) -> f32 {
    let crossings: Vec<usize> = buffer
        .samples()
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] <= 0.0 && w[1] > 0.0)
        .map(|(i, _)| i)
        .collect();

    match (crossings.first(), crossings.last()) {
        (Some(&first), Some(&last)) if last > first => {
            let span_secs = (last - first) as f32 / buffer.sample_rate() as f32;
            (crossings.len() - 1) as f32 / span_secs
        }
        _ => 0.0,
    }
}

fn workspace_count(root: &TempDir) -> usize {
    match std::fs::read_dir(root.path().join("work")) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("job-"))
            .count(),
        Err(_) => 0,
    }
}

// === Filter Bank Properties ===

#[test_case(FilterKind::Deep)]
#[test_case(FilterKind::Robot)]
#[test_case(FilterKind::Radio)]
#[test_case(FilterKind::Echo)]
#[test_case(FilterKind::Bass)]
#[test_case(FilterKind::PassThrough)]
fn test_normalized_peak_within_full_scale(kind: FilterKind) {
    let input = SampleBuffer::sine(220.0, 0.99, 1.0, CANONICAL_SAMPLE_RATE);
    let spec = FilterPresets::default().spec_for(kind);

    let filtered = spec.apply(&input, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();
    let output = normalize(filtered).unwrap();

    assert!(
        output.peak() <= 1.0,
        "{} peaked at {}",
        kind,
        output.peak()
    );
    assert!(output.is_finite());
}

#[test_case(FilterKind::Robot)]
#[test_case(FilterKind::Radio)]
#[test_case(FilterKind::Echo)]
#[test_case(FilterKind::Bass)]
#[test_case(FilterKind::PassThrough)]
fn test_spectral_filters_preserve_length(kind: FilterKind) {
    let input = SampleBuffer::sine(330.0, 0.5, 0.75, CANONICAL_SAMPLE_RATE);
    let spec = FilterPresets::default().spec_for(kind);

    let output = spec.apply(&input, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();

    assert_eq!(output.len(), input.len());
    assert_eq!(output.sample_rate(), input.sample_rate());
}

#[test]
fn test_deep_stretches_duration() {
    let input = SampleBuffer::sine(180.0, 0.5, 2.0, CANONICAL_SAMPLE_RATE);
    let presets = FilterPresets::default();
    let spec = presets.spec_for(FilterKind::Deep);

    let output = spec.apply(&input, &mut ChaCha8Rng::seed_from_u64(0)).unwrap();

    let expected = input.len() as f64 / presets.deep.stretch_rate as f64;
    let tolerance = input.len() as f64 / 1000.0 + 1.0;
    assert!(
        (output.len() as f64 - expected).abs() <= tolerance,
        "expected ~{} samples, got {}",
        expected,
        output.len()
    );
}

// === Pipeline Tests ===

#[test]
fn test_echo_impulse_through_pipeline() {
    let root = tempdir().unwrap();
    let engine = engine_in(&root, DeliveryFormat::Wav);
    let input = write_clip(&root, "click.wav", &SampleBuffer::impulse(44100, CANONICAL_SAMPLE_RATE));

    let result = engine.process(&input, "echo");
    assert_eq!(result.stage, JobStage::Done);

    let output = read_back(&result.output_path, &root);
    assert_eq!(output.len(), 44100);

    let samples = output.samples();
    assert_abs_diff_eq!(samples[0], 1.0, epsilon = 1e-3);
    assert_abs_diff_eq!(samples[13230], 0.6, epsilon = 1e-3);
    assert_abs_diff_eq!(samples[26460], 0.3, epsilon = 1e-3);
    assert_abs_diff_eq!(samples[20000], 0.0, epsilon = 1e-3);
}

#[test]
fn test_unknown_filter_round_trips_tone() {
    let root = tempdir().unwrap();
    let engine = engine_in(&root, DeliveryFormat::Mp3);
    let tone = SampleBuffer::sine(440.0, 0.5, 1.0, CANONICAL_SAMPLE_RATE);
    let input = write_clip(&root, "tone.wav", &tone);

    let result = engine.process(&input, "nonexistent");

    assert_eq!(result.stage, JobStage::Done);
    assert_eq!(result.applied, FilterKind::PassThrough);
    assert_eq!(result.output_path.extension().unwrap(), "mp3");

    let decoded = read_back(&result.output_path, &root);
    let n = decoded.len();
    let interior = decoded.with_samples(decoded.samples()[n / 4..3 * n / 4].to_vec());
    assert!((zero_crossing_hz(&interior) - 440.0).abs() < 5.0);
    assert!((decoded.rms_db() - tone.rms_db()).abs() < 1.5);
}

#[test]
fn test_zero_byte_input_returns_original() {
    let root = tempdir().unwrap();
    let engine = engine_in(&root, DeliveryFormat::Mp3);
    let input = root.path().join("voice.ogg");
    std::fs::write(&input, b"").unwrap();

    let result = engine.process(&input, "robot");

    assert!(result.is_fallback());
    assert_eq!(result.output_path, input);
    let failure = result.failure.unwrap();
    assert_eq!(failure.category, ErrorCategory::Decode);
    assert_eq!(failure.code, "EMPTY_AUDIO");
    assert_eq!(failure.stage, JobStage::Ingesting);
    assert_eq!(workspace_count(&root), 0);
}

#[test]
fn test_corrupt_mp3_returns_original() {
    let root = tempdir().unwrap();
    let engine = engine_in(&root, DeliveryFormat::Mp3);
    let input = root.path().join("voice.mp3");
    std::fs::write(&input, vec![0x5Au8; 4096]).unwrap();

    let result = engine.process(&input, "radio");

    assert!(result.is_fallback());
    assert_eq!(result.output_path, input);
    assert_eq!(std::fs::read(&input).unwrap(), vec![0x5Au8; 4096]);
}

#[test]
fn test_workspace_removed_after_success() {
    let root = tempdir().unwrap();
    let engine = engine_in(&root, DeliveryFormat::Wav);
    let input = write_clip(
        &root,
        "voice.wav",
        &SampleBuffer::sine(200.0, 0.4, 0.5, CANONICAL_SAMPLE_RATE),
    );

    let result = engine.process(&input, "bass");

    assert_eq!(result.stage, JobStage::Done);
    assert_eq!(workspace_count(&root), 0);

    // Exactly one artifact, and no part files
    let outputs: Vec<_> = std::fs::read_dir(root.path().join("out"))
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(outputs.len(), 1);
}

#[test]
fn test_cleanup_missing_file() {
    let root = tempdir().unwrap();
    let engine = engine_in(&root, DeliveryFormat::Wav);
    std::fs::create_dir_all(root.path().join("out")).unwrap();

    assert!(engine.cleanup(&root.path().join("out").join("gone.wav")));
}

// === Concurrency Tests ===

#[test]
fn test_concurrent_jobs_match_serial() {
    let root = tempdir().unwrap();
    let engine = engine_in(&root, DeliveryFormat::Wav);

    // Distinct clips and filters; the MP3 inputs go through the decoded intermediate
    let clips = [
        ("alice.wav", 180.0, "deep"),
        ("bob.mp3", 260.0, "robot"),
        ("carol.wav", 340.0, "radio"),
        ("dave.mp3", 420.0, "echo"),
        ("erin.wav", 500.0, "bass"),
        ("frank.mp3", 580.0, "deep"),
    ];

    let jobs: Vec<(PathBuf, &str, &str)> = clips
        .iter()
        .map(|&(name, frequency, filter)| {
            let tone = SampleBuffer::sine(frequency, 0.6, 0.5, CANONICAL_SAMPLE_RATE);
            let path = root.path().join(name);
            if name.ends_with(".mp3") {
                encode(&tone, &path, DeliveryFormat::Mp3, 64).unwrap();
            } else {
                write_wav(&tone, &path, WavEncoding::Float32).unwrap();
            }
            let stem = name.split('.').next().unwrap();
            (path, stem, filter)
        })
        .collect();

    let serial: Vec<String> = jobs
        .iter()
        .map(|(input, _, filter)| {
            let result = engine.process(input, filter);
            assert_eq!(result.stage, JobStage::Done);
            let checksum = file_checksum(&result.output_path).unwrap();
            assert!(engine.cleanup(&result.output_path));
            checksum
        })
        .collect();

    let workers: Vec<_> = jobs
        .iter()
        .map(|(input, _, filter)| {
            let engine = engine.clone();
            let input = input.clone();
            let filter = filter.to_string();
            thread::spawn(move || engine.process(&input, &filter))
        })
        .collect();

    let parallel: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    let mut paths: Vec<_> = parallel.iter().map(|r| r.output_path.clone()).collect();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), jobs.len());

    for ((result, expected), (_, stem, filter)) in parallel.iter().zip(&serial).zip(&jobs) {
        assert_eq!(result.stage, JobStage::Done);
        assert!(result.failure.is_none());

        let name = result.output_path.file_name().unwrap().to_string_lossy().to_string();
        assert!(
            name.starts_with(&format!("{}_{}_", stem, filter)),
            "unexpected output name {}",
            name
        );
        assert_eq!(&file_checksum(&result.output_path).unwrap(), expected);
    }

    assert_eq!(workspace_count(&root), 0);
    let delivered = std::fs::read_dir(root.path().join("out")).unwrap().count();
    assert_eq!(delivered, jobs.len());
}

#[test]
fn test_background_handles() {
    let root = tempdir().unwrap();
    let engine = engine_in(&root, DeliveryFormat::Wav);
    let input = write_clip(
        &root,
        "voice.wav",
        &SampleBuffer::sine(300.0, 0.6, 0.3, CANONICAL_SAMPLE_RATE),
    );

    let handles: Vec<_> = (0..4)
        .map(|_| engine.process_in_background(&input, "echo"))
        .collect();

    for handle in handles {
        let result = handle.join();
        assert_eq!(result.applied, FilterKind::Echo);
        assert!(result.output_path.exists());
    }
}

#[cfg(feature = "async")]
mod async_dispatch {
    use super::*;
    use std::time::{Duration, Instant};

    /// Wait until `out/` exists and both `out/` and `work/` are empty
    async fn abandoned_job_settles(root: &TempDir, limit: Duration) -> bool {
        let count = |dir: PathBuf| std::fs::read_dir(dir).ok().map(|d| d.count());
        let deadline = Instant::now() + limit;
        while Instant::now() < deadline {
            let out = count(root.path().join("out"));
            let work = count(root.path().join("work"));
            if out == Some(0) && work == Some(0) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_process_async() {
        let root = tempdir().unwrap();
        let engine = engine_in(&root, DeliveryFormat::Wav);
        let input = write_clip(
            &root,
            "voice.wav",
            &SampleBuffer::sine(300.0, 0.6, 0.3, CANONICAL_SAMPLE_RATE),
        );

        let result = engine.process_async(input, "radio".to_string()).await;

        assert_eq!(result.stage, JobStage::Done);
        assert_eq!(result.applied, FilterKind::Radio);
    }

    #[tokio::test]
    async fn test_timeout_returns_original() {
        let root = tempdir().unwrap();
        let engine = engine_in(&root, DeliveryFormat::Wav);
        let input = write_clip(
            &root,
            "long.wav",
            &SampleBuffer::sine(300.0, 0.6, 5.0, CANONICAL_SAMPLE_RATE),
        );

        let result = engine
            .process_async_with_timeout(input.clone(), "deep".to_string(), Duration::ZERO)
            .await;

        assert!(result.is_fallback());
        assert_eq!(result.output_path, input);
        assert_eq!(result.failure.unwrap().code, "TIMEOUT");

        // The abandoned job finishes on the blocking pool and cleans up after itself
        assert!(
            abandoned_job_settles(&root, Duration::from_secs(120)).await,
            "abandoned job left files behind"
        );
        assert!(input.exists());
    }
}

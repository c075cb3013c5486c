//! Randomised invariant checks for the watermark mixer
//!
//! Buffers are generated from a fixed seed so failures reproduce.

use beatmark::mixer::overlay_starts;
use beatmark::{mix, AudioBuffer, MixConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_buffer(
    rng: &mut StdRng,
    sample_rate: u32,
    channels: usize,
    length: usize,
    peak: f32,
) -> AudioBuffer {
    let data = (0..channels)
        .map(|_| (0..length).map(|_| rng.random_range(-peak..=peak)).collect())
        .collect();
    AudioBuffer::new(sample_rate, data).unwrap()
}

#[test]
fn test_output_shape_matches_main() {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..50 {
        let sample_rate = rng.random_range(100..=4000);
        let main_channels = rng.random_range(1..=3);
        let wm_channels = rng.random_range(0..=3);
        let main_len = rng.random_range(0..2000);
        let wm_len = rng.random_range(0..500);
        let main = random_buffer(&mut rng, sample_rate, main_channels, main_len, 1.0);
        let watermark = random_buffer(&mut rng, sample_rate, wm_channels, wm_len, 1.0);
        let config = MixConfig::new(rng.random_range(0.01..2.0), rng.random_range(0.0..150.0));

        let out = mix(&main, &watermark, &config).unwrap();
        assert_eq!(out.length(), main.length());
        assert_eq!(out.number_of_channels(), main.number_of_channels());
        assert_eq!(out.sample_rate(), main.sample_rate());
    }
}

#[test]
fn test_every_sample_within_full_scale() {
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..50 {
        // Watermark deliberately exceeds full scale and is boosted
        let main = random_buffer(&mut rng, 1000, 2, 1500, 1.0);
        let wm_channels = rng.random_range(1..=2);
        let watermark = random_buffer(&mut rng, 1000, wm_channels, 300, 1.5);
        let config = MixConfig::new(rng.random_range(0.05..1.0), rng.random_range(10.0..300.0));

        let out = mix(&main, &watermark, &config).unwrap();
        for channel in out.channels() {
            assert!(channel.iter().all(|s| (-1.0..=1.0).contains(s)));
        }
    }
}

#[test]
fn test_empty_watermark_returns_main_exactly() {
    let mut rng = StdRng::seed_from_u64(7);
    let main = random_buffer(&mut rng, 8000, 2, 4000, 1.0);
    let watermark = AudioBuffer::new(8000, vec![Vec::new(), Vec::new()]).unwrap();

    let out = mix(&main, &watermark, &MixConfig::new(0.05, 100.0)).unwrap();
    assert_eq!(out.channels(), main.channels());
}

#[test]
fn test_untouched_samples_are_copied_verbatim() {
    let mut rng = StdRng::seed_from_u64(99);
    let main = random_buffer(&mut rng, 1000, 1, 3500, 0.5);
    let watermark = random_buffer(&mut rng, 1000, 1, 50, 0.5);
    let config = MixConfig::new(1.0, 75.0);

    let out = mix(&main, &watermark, &config).unwrap();
    let starts: Vec<usize> = overlay_starts(main.length(), main.sample_rate(), &config)
        .unwrap()
        .collect();
    assert_eq!(starts, vec![0, 1000, 2000, 3000]);

    let covered = |n: usize| starts.iter().any(|&s| n >= s && n < s + 50);
    let before = main.channel(0).unwrap();
    let after = out.channel(0).unwrap();
    for n in 0..main.length() {
        if !covered(n) {
            assert_eq!(after[n], before[n], "sample {} changed", n);
        }
    }
}

use super::*;

const SR: u32 = 48_000;

fn processor() -> WsolaProcessor {
    WsolaProcessor::new(SR, WsolaConfig::default()).unwrap()
}

#[test]
fn sizes_follow_config() {
    let cfg = WsolaConfig::default();
    assert_eq!(cfg.frame_size_samples(SR), 1200);
    assert_eq!(cfg.hop_size_samples(SR), 600);
    assert_eq!(cfg.search_range_samples(SR), 480);

    let odd = WsolaConfig {
        frame_size_ms: 1.0,
        search_range_ms: 0.0,
    };
    assert_eq!(odd.frame_size_samples(44_100) % 2, 0);
}

#[test]
fn invalid_config_is_rejected() {
    let bad = WsolaConfig {
        frame_size_ms: 0.0,
        ..WsolaConfig::default()
    };
    assert!(WsolaProcessor::new(SR, bad).is_err());
    assert!(WsolaProcessor::new(0, WsolaConfig::default()).is_err());
}

#[test]
fn waits_for_initial_fill() {
    let mut p = processor();
    let mut out = vec![0.0; 4096];
    assert_eq!(p.process(&vec![0.5; 1679], 1.0, &mut out), 0);
    assert_eq!(p.pending_input(), 1679);
    assert_eq!(p.process(&[0.5], 1.0, &mut out), 600);
}

#[test]
fn constant_signal_passes_through_at_unit_speed() {
    let mut p = processor();
    let input = vec![0.5_f32; 4800];
    let mut out = vec![0.0; 4800];
    let written = p.process(&input, 1.0, &mut out);

    assert_eq!(written, 3600);
    let hop = p.hop_size();
    for (i, s) in out[hop..written].iter().enumerate() {
        assert!((s - 0.5).abs() < 1e-4, "sample {} = {s}", i + hop);
    }
    assert!(out[0] < 0.01);
}

#[test]
fn speed_scales_consumption() {
    let mut p = processor();
    let input = vec![0.25_f32; SR as usize];
    let mut out = vec![0.0; SR as usize];
    let written = p.process(&input, 2.0, &mut out);
    assert!(written as f64 >= 0.45 * f64::from(SR), "{written}");
    assert!(written as f64 <= 0.5 * f64::from(SR) + 600.0, "{written}");
}

#[test]
fn short_output_buffers_are_left_untouched() {
    let mut p = processor();
    let mut out = vec![9.0; 100];
    assert_eq!(p.process(&vec![0.5; 4000], 1.0, &mut out), 0);
    assert!(out.iter().all(|&s| s == 9.0));
}

#[test]
fn reset_then_silence_is_silent() {
    let mut p = processor();
    let tone: Vec<f32> = (0..9600)
        .map(|i| (i as f32 * 0.05).sin() * 0.8)
        .collect();
    let mut out = vec![0.0; 9600];
    assert!(p.process(&tone, 1.3, &mut out) > 0);

    p.reset();
    assert_eq!(p.pending_input(), 0);
    assert_eq!(p.last_offset(), 0);

    let mut out = vec![1.0; 9600];
    let written = p.process(&vec![0.0; 9600], 1.0, &mut out);
    assert!(written > 0);
    assert!(out[..written].iter().all(|&s| s == 0.0));
}

#[test]
fn sine_alignment_stays_in_search_window() {
    let mut p = processor();
    let tone: Vec<f32> = (0..SR as usize)
        .map(|i| (std::f32::consts::TAU * 220.0 * i as f32 / SR as f32).sin())
        .collect();
    let mut out = vec![0.0; SR as usize];
    let mut fed = 0;
    while fed < tone.len() {
        let chunk = &tone[fed..(fed + 960).min(tone.len())];
        p.process(chunk, 0.75, &mut out);
        assert!(p.last_offset().unsigned_abs() <= 480);
        fed += chunk.len();
    }
    assert!(p.pending_input() < tone.len());
}

mod common;

use common::*;
use vox_analysis::AudioBuffer;
use vox_dsp::{PitchCurve, ProcessorKind};
use vox_edit::{EditPipeline, EditPoint, EngineConfig};

fn bump_edits() -> Vec<EditPoint> {
    vec![
        EditPoint::new(0.0, 0.0),
        EditPoint::new(0.5, 7.0),
        EditPoint::new(1.0, 0.0),
    ]
}

fn one_second_sine() -> Vec<f32> {
    gen_sine(220.0, SR, SR as usize, 0.5)
}

#[test]
fn test_end_to_end_bump() {
    let input = one_second_sine();
    let buffer = AudioBuffer::mono(input.clone(), SR).unwrap();
    let mut pipeline = EditPipeline::new(SR, EngineConfig::default()).unwrap();

    let frames = frames_for(&input, SR, 2048, 1024);
    let result = pipeline.run(&frames, &bump_edits()).unwrap();
    assert_eq!(result.outliers, 0);
    assert_eq!(result.frames.len(), frames.len());
    assert!(result.frames.iter().all(|f| !f.is_outlier));

    // Curve rises to the edit in the middle and falls back
    let peak = result
        .frames
        .iter()
        .max_by(|a, b| a.pitch_shift.total_cmp(&b.pitch_shift))
        .unwrap();
    assert!((peak.time - 0.5).abs() < 0.05, "peak at {}", peak.time);
    assert!((peak.pitch_shift - 7.0).abs() < 0.2);
    for pair in result.frames.windows(2) {
        assert!((pair[1].pitch_shift - pair[0].pitch_shift).abs() < 1.0);
    }

    let output = pipeline.run_buffer(&buffer, &bump_edits()).unwrap();
    assert_eq!(output.len(), input.len());

    let start = peak_frequency(&output, SR, 0, 4096);
    let middle = peak_frequency(&output, SR, 19200, 9600);
    let end = peak_frequency(&output, SR, output.len() - 4096, 4096);
    assert!(start < 250.0, "start = {}", start);
    assert!(middle > 300.0 && middle < 345.0, "middle = {}", middle);
    assert!(end < 255.0, "end = {}", end);
}

#[test]
fn test_single_edit_stays_local() {
    let input = one_second_sine();
    let buffer = AudioBuffer::mono(input.clone(), SR).unwrap();
    let mut pipeline = EditPipeline::new(SR, EngineConfig::default()).unwrap();
    let edits = [EditPoint::new(0.3, 5.0)];

    let frames = frames_for(&input, SR, 2048, 1024);
    let result = pipeline.run(&frames, &edits).unwrap();
    let shifted: Vec<f64> = result
        .frames
        .iter()
        .filter(|f| f.pitch_shift != 0.0)
        .map(|f| f.time)
        .collect();
    assert!(!shifted.is_empty() && shifted.len() <= 3);
    assert!(shifted.iter().all(|t| (t - 0.3).abs() < 0.03));

    let output = pipeline.run_buffer(&buffer, &edits).unwrap();
    assert_eq!(output.len(), input.len());
    // Away from the edit the signal passes through untouched
    assert!(rms_difference(&output[100..12000], &input[100..12000]) < 1e-4);
    assert!(rms_difference(&output[24000..43200], &input[24000..43200]) < 1e-4);
    // Around it, it does not
    assert!(rms_difference(&output[14400..16800], &input[14400..16800]) > 0.05);
}

#[test]
fn test_processor_curve_hits_edit_values_at_edit_times() {
    let input = one_second_sine();
    let frames = frames_for(&input, SR, 2048, 1024);
    let pipeline = EditPipeline::new(SR, EngineConfig::default()).unwrap();

    let (prepared, _) = pipeline.prepare_frames(&frames, &[EditPoint::new(0.3, 5.0)]);
    let curve = PitchCurve::from_frames(&prepared);
    assert!((curve.semitones_at(0.3) - 5.0).abs() < 1e-6, "at 0.3 = {}", curve.semitones_at(0.3));

    let (prepared, _) = pipeline.prepare_frames(&frames, &bump_edits());
    let curve = PitchCurve::from_frames(&prepared);
    assert!((curve.semitones_at(0.5) - 7.0).abs() < 0.05, "at 0.5 = {}", curve.semitones_at(0.5));
    assert!(curve.semitones_at(0.0).abs() < 1e-6);
}

#[test]
fn test_no_edits_is_transparent() {
    let input = one_second_sine();
    let buffer = AudioBuffer::mono(input.clone(), SR).unwrap();
    let mut pipeline = EditPipeline::new(SR, EngineConfig::default()).unwrap();
    let output = pipeline.run_buffer(&buffer, &[]).unwrap();
    assert_eq!(output.len(), input.len());
    assert!(rms_difference(&output, &input) < 1e-4);
    assert_eq!(output[0], input[0]);
}

#[test]
fn test_alternate_strategies_follow_the_bump() {
    let input = one_second_sine();
    let buffer = AudioBuffer::mono(input.clone(), SR).unwrap();
    for strategy in [ProcessorKind::Psola, ProcessorKind::Wsola] {
        let config = EngineConfig {
            strategy,
            ..Default::default()
        };
        let mut pipeline = EditPipeline::new(SR, config).unwrap();
        assert_eq!(pipeline.processor().name(), strategy.as_str());

        let output = pipeline.run_buffer(&buffer, &bump_edits()).unwrap();
        assert_eq!(output.len(), input.len());
        let middle = peak_frequency(&output, SR, 19200, 9600);
        assert!(middle > 295.0 && middle < 350.0, "{}: middle = {}", strategy, middle);
        assert!(windowed_rms(&output, 19200, 9600) > 0.1);
    }
}

#[test]
fn test_duration_span_lengthens_output() {
    let input = one_second_sine();
    let buffer = AudioBuffer::mono(input.clone(), SR).unwrap();
    let mut pipeline = EditPipeline::new(SR, EngineConfig::default()).unwrap();
    pipeline.set_duration(0.0, 0.5, 2.0).unwrap();
    assert!(pipeline.set_duration(0.0, 0.5, -1.0).is_err());

    let output = pipeline.run_buffer(&buffer, &[]).unwrap();
    assert!(output.len() > input.len() + 20000, "len = {}", output.len());

    pipeline.clear_durations();
    assert_eq!(pipeline.run_buffer(&buffer, &[]).unwrap().len(), input.len());
}

#[test]
fn test_rejects_mismatched_sample_rate() {
    let mut pipeline = EditPipeline::new(SR, EngineConfig::default()).unwrap();
    let buffer = AudioBuffer::mono(vec![0.0; 4410], 44100).unwrap();
    assert!(pipeline.run_buffer(&buffer, &[]).is_err());
    assert!(EditPipeline::new(0, EngineConfig::default()).is_err());
}

#[test]
fn test_empty_input() {
    let mut pipeline = EditPipeline::new(SR, EngineConfig::default()).unwrap();
    let result = pipeline.run(&[], &bump_edits()).unwrap();
    assert!(result.samples.is_empty() && result.frames.is_empty());
}

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wavresample::audio::{
    decode_block, encode_block, AudioFormat, ConverterPort, LinearConverter, SampleBlockBuffer,
};

const BLOCK: usize = 1024;

fn codec_benchmark(c: &mut Criterion) {
    for bits in [16u16, 24] {
        let format = AudioFormat::new(48000.0, 2, bits).unwrap();
        let left: Vec<f64> = (0..BLOCK).map(|i| (i as f64 * 0.01).sin() * 8000.0).collect();
        let right: Vec<f64> = left.iter().map(|v| -v).collect();

        let mut raw = Vec::new();
        encode_block(&[&left, &right], BLOCK, &format, &mut raw).unwrap();
        let mut block = SampleBlockBuffer::new(2, BLOCK).unwrap();

        c.bench_function(&format!("decode_block_{}bit_stereo", bits), |b| {
            b.iter(|| decode_block(black_box(&raw), &format, &mut block))
        });

        let mut out = Vec::new();
        c.bench_function(&format!("encode_block_{}bit_stereo", bits), |b| {
            b.iter(|| encode_block(black_box(&[&left, &right]), BLOCK, &format, &mut out).unwrap())
        });
    }

    let input: Vec<f64> = (0..BLOCK).map(|i| i as f64).collect();
    let mut converter = LinearConverter::new(44100.0, 48000.0, BLOCK).unwrap();
    c.bench_function("linear_converter_44k1_to_48k", |b| {
        b.iter(|| converter.process(black_box(&input)).len())
    });
}

criterion_group!(benches, codec_benchmark);
criterion_main!(benches);

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use optlayer_core::{ConfigOption, DeviceHandle, HashSetLayer, LayerDescriptor, LayerKey, OptionBuilder, OptionManager};
use std::sync::Arc;

fn manager_with_options(count: usize) -> (Arc<OptionManager>, Vec<ConfigOption<f32>>) {
    let manager = OptionManager::new();
    let options = (0..count)
        .map(|i| {
            OptionBuilder::new("bench", format!("value{i}"), 0.0f32)
                .register(&manager)
                .unwrap()
        })
        .collect();
    manager.set_initialized(true);
    (manager, options)
}

fn resolve_benchmark(c: &mut Criterion) {
    c.bench_function("apply_pending_values (1000 dirty floats, 3 layers)", |b| {
        let (manager, options) = manager_with_options(1000);
        let layers: Vec<_> = (0..3u32)
            .map(|i| {
                manager
                    .acquire_layer(LayerDescriptor::new(LayerKey::new(1000 + i, format!("layer{i}"))).blend(0.5, 0.1))
                    .unwrap()
            })
            .collect();
        let device = DeviceHandle::none();

        b.iter(|| {
            for (i, option) in options.iter().enumerate() {
                option.set_deferred(i as f32, Some(&layers[i % layers.len()]));
            }
            black_box(manager.apply_pending_values(&device, false));
        })
    });

    // Nothing dirty: the per-frame fast path
    c.bench_function("apply_pending_values (idle)", |b| {
        let (manager, _options) = manager_with_options(1000);
        let device = DeviceHandle::none();

        b.iter(|| black_box(manager.apply_pending_values(&device, false)))
    });
}

fn hash_set_benchmark(c: &mut Criterion) {
    let text = (0..256u64)
        .map(|i| if i % 4 == 0 { format!("-0x{i:016X}") } else { format!("0x{i:016X}") })
        .collect::<Vec<_>>()
        .join(", ");

    c.bench_function("HashSetLayer::parse (256 entries)", |b| {
        b.iter(|| HashSetLayer::parse(black_box(&text)))
    });

    c.bench_function("HashSetLayer::merge_from (256 entries)", |b| {
        let strong = HashSetLayer::parse(&text);
        let weak: HashSetLayer = (128..384u64).collect();
        b.iter(|| {
            let mut merged = strong.clone();
            merged.merge_from(black_box(&weak));
            merged
        })
    });
}

criterion_group!(benches, resolve_benchmark, hash_set_benchmark);
criterion_main!(benches);

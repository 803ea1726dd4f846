use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flame_device::BufferRole;
use flame_device::resources::DeviceResources;

fn grow_all_roles_to(resources: &mut DeviceResources, required: u64) {
    for role in BufferRole::ALL {
        resources.grow(*role, required);
    }
}

fn bench_growth(c: &mut Criterion) {
    c.bench_function("grow_all_roles_cold", |b| {
        b.iter(|| {
            let mut resources = DeviceResources::new();
            grow_all_roles_to(&mut resources, black_box(1 << 20));
        })
    });

    c.bench_function("grow_all_roles_no_op", |b| {
        let mut resources = DeviceResources::new();
        grow_all_roles_to(&mut resources, 1 << 20);
        b.iter(|| {
            grow_all_roles_to(&mut resources, black_box(1 << 20));
        })
    });
}

criterion_group!(benches, bench_growth);
criterion_main!(benches);

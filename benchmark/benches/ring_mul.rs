use criterion::{criterion_group, criterion_main, Criterion};
use pq_primitives::{field::Modulus, ring::ModularRing};
use rand::{rngs::StdRng, thread_rng, Rng, SeedableRng};

const N: [usize; 5] = [16, 64, 256, 512, 1024];

pub fn ring_mul(c: &mut Criterion) {
    let mut rng: StdRng = SeedableRng::from_seed(thread_rng().gen());
    let mut group = c.benchmark_group("ring mul");

    for q in [3329u32, 12289] {
        let modulus = Modulus::new(q).unwrap();
        for n in N {
            let ring = ModularRing::new(modulus, n).unwrap();
            let a = ring.uniform(&mut rng);
            let b = ring.uniform(&mut rng);
            group.bench_function(format!("{q}/{n}"), |bencher| {
                bencher.iter(|| ring.mul(&a, &b).unwrap())
            });
        }
    }

    group.finish();
}

criterion_group!(benches, ring_mul);
criterion_main!(benches);

use core::hash::Hash;
use core::hash::Hasher;
use core::hint::black_box;

use criterion::AxisScale;
use criterion::BatchSize;
use criterion::Criterion;
use criterion::PlotConfiguration;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use hashbrown::hash_table::Entry as HashbrownEntry;
use hashbrown::hash_table::HashTable as HashbrownHashTable;
use rand::Rng;
use rand::SeedableRng;
use rand::TryRngCore;
use rand::rngs::OsRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand_distr::Zipf;
use robin_hash::HashTable as RobinHashTable;
use robin_hash::hash_table::Entry as RobinEntry;
use siphasher::sip::SipHasher;

trait KeyValuePair: Clone {
    fn new(key: u64) -> Self;

    fn hash_key(&self) -> u64;
    fn eq_key(&self, other: &Self) -> bool;
}

#[derive(Clone)]
struct TestItem {
    key: String,
    _value: u64,
}

impl KeyValuePair for TestItem {
    fn new(key: u64) -> Self {
        black_box(Self {
            key: format!("key_{:016X}", key),
            _value: key,
        })
    }

    fn hash_key(&self) -> u64 {
        let mut hasher = SipHasher::new();
        self.key.hash(&mut hasher);
        hasher.finish()
    }

    fn eq_key(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

#[derive(Clone)]
struct SmallTestItem {
    key: u64,
}

impl KeyValuePair for SmallTestItem {
    fn new(key: u64) -> Self {
        black_box(Self { key })
    }

    fn hash_key(&self) -> u64 {
        let mut hasher = SipHasher::new();
        self.key.hash(&mut hasher);
        hasher.finish()
    }

    fn eq_key(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

#[derive(Clone)]
struct LargeTestItem {
    key: u64,
    _value: [u8; 256],
}

impl KeyValuePair for LargeTestItem {
    fn new(key: u64) -> Self {
        let mut value = [0u8; 256];
        for (i, byte) in value.iter_mut().enumerate() {
            *byte = ((key >> ((i % 8) * 8)) & 0xFF) as u8;
        }
        black_box(Self { key, _value: value })
    }

    fn hash_key(&self) -> u64 {
        let mut hasher = SipHasher::new();
        self.key.hash(&mut hasher);
        hasher.finish()
    }

    fn eq_key(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

/// The operations each benchmark drives, so every workload is written once
/// and run against both tables.
trait BenchTable<T: KeyValuePair> {
    const NAME: &'static str;

    /// A table that holds `entries` items without growing.
    fn preallocated(entries: usize) -> Self;
    fn empty() -> Self;
    fn insert(&mut self, hash: u64, item: T);
    fn find(&self, hash: u64, item: &T) -> bool;
    fn remove(&mut self, hash: u64, item: &T) -> bool;
    fn count(&self) -> usize;
    fn drain_count(&mut self) -> usize;
}

impl<T: KeyValuePair> BenchTable<T> for RobinHashTable<T> {
    const NAME: &'static str = "robin_hash";

    fn preallocated(entries: usize) -> Self {
        let mut table = RobinHashTable::new();
        table.reserve(entries);
        table
    }

    fn empty() -> Self {
        RobinHashTable::new()
    }

    fn insert(&mut self, hash: u64, item: T) {
        match self.entry(hash, |v| v.eq_key(&item)) {
            RobinEntry::Vacant(entry) => {
                black_box(entry.insert(item));
            }
            RobinEntry::Occupied(_) => {}
        }
    }

    fn find(&self, hash: u64, item: &T) -> bool {
        RobinHashTable::find(self, hash, |v| v.eq_key(item)).is_some()
    }

    fn remove(&mut self, hash: u64, item: &T) -> bool {
        RobinHashTable::remove(self, hash, |v| v.eq_key(item)).is_some()
    }

    fn count(&self) -> usize {
        self.iter().count()
    }

    fn drain_count(&mut self) -> usize {
        self.drain().count()
    }
}

impl<T: KeyValuePair> BenchTable<T> for HashbrownHashTable<T> {
    const NAME: &'static str = "hashbrown";

    fn preallocated(entries: usize) -> Self {
        HashbrownHashTable::with_capacity(entries)
    }

    fn empty() -> Self {
        HashbrownHashTable::new()
    }

    fn insert(&mut self, hash: u64, item: T) {
        match self.entry(hash, |v| v.eq_key(&item), |v| v.hash_key()) {
            HashbrownEntry::Vacant(entry) => {
                black_box(entry.insert(item));
            }
            HashbrownEntry::Occupied(_) => {}
        }
    }

    fn find(&self, hash: u64, item: &T) -> bool {
        HashbrownHashTable::find(self, hash, |v| v.eq_key(item)).is_some()
    }

    fn remove(&mut self, hash: u64, item: &T) -> bool {
        match HashbrownHashTable::find_entry(self, hash, |v| v.eq_key(item)) {
            Ok(entry) => {
                black_box(entry.remove());
                true
            }
            Err(_) => false,
        }
    }

    fn count(&self) -> usize {
        self.iter().count()
    }

    fn drain_count(&mut self) -> usize {
        self.drain().count()
    }
}

const SIZES: &[usize] = &[
    (1 << 10),
    (1 << 11),
    (1 << 12),
    (1 << 13),
    (1 << 14),
    (1 << 15),
    (1 << 16),
    (1 << 17),
    (1 << 18),
];

fn random_items<T: KeyValuePair>(count: usize) -> Vec<(u64, T)> {
    let mut rng = OsRng;
    (0..count)
        .map(|_| {
            let item = T::new(rng.try_next_u64().unwrap());
            (item.hash_key(), item)
        })
        .collect()
}

fn sequential_items<T: KeyValuePair>(range: core::ops::Range<u64>) -> Vec<(u64, T)> {
    range
        .map(|key| {
            let item = T::new(key);
            (item.hash_key(), item)
        })
        .collect()
}

fn group_name<T>(prefix: &str) -> String {
    format!("{prefix}_{}", core::any::type_name::<T>())
}

fn run_insert<T: KeyValuePair, Table: BenchTable<T>>(
    group: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>,
    items: &[(u64, T)],
    preallocate: bool,
) {
    group.bench_function(Table::NAME, |b| {
        b.iter_batched(
            || {
                let mut items = items.to_vec();
                items.shuffle(&mut SmallRng::from_os_rng());
                items
            },
            |items| {
                let mut table = if preallocate {
                    Table::preallocated(items.len())
                } else {
                    Table::empty()
                };
                for (hash, item) in items {
                    table.insert(hash, item);
                }
                black_box(table)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_insert_random<T: KeyValuePair, const MAX_SIZE: usize>(c: &mut Criterion) {
    for preallocate in [false, true] {
        let prefix = if preallocate {
            "insert_random_preallocated"
        } else {
            "insert_random"
        };
        let mut group = c.benchmark_group(group_name::<T>(prefix));
        group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

        for &size in SIZES[..=MAX_SIZE].iter() {
            let items = random_items::<T>(size);
            group.throughput(Throughput::Elements(size as u64));
            run_insert::<T, RobinHashTable<T>>(&mut group, &items, preallocate);
            run_insert::<T, HashbrownHashTable<T>>(&mut group, &items, preallocate);
        }
        group.finish();
    }
}

fn run_find<T: KeyValuePair, Table: BenchTable<T>>(
    group: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>,
    present: &[(u64, T)],
    probes: &[(u64, T)],
) {
    let mut table = Table::empty();
    for (hash, item) in present.iter().cloned() {
        table.insert(hash, item);
    }

    group.bench_function(Table::NAME, |b| {
        b.iter(|| {
            let mut found = 0usize;
            for (hash, item) in probes {
                found += table.find(*hash, item) as usize;
            }
            black_box(found)
        })
    });
}

fn bench_find<T: KeyValuePair, const MAX_SIZE: usize>(c: &mut Criterion) {
    for (prefix, hit_ratio) in [("find_hit", 1.0), ("find_miss", 0.0), ("find_hit_miss", 0.5)] {
        let mut group = c.benchmark_group(group_name::<T>(prefix));
        group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

        for &size in SIZES[..=MAX_SIZE].iter() {
            let present = sequential_items::<T>(0..size as u64);
            let absent = sequential_items::<T>(size as u64..2 * size as u64);

            let mut rng = SmallRng::from_os_rng();
            let mut probes = (0..size)
                .map(|i| {
                    if rng.random_bool(hit_ratio) {
                        present[i].clone()
                    } else {
                        absent[i].clone()
                    }
                })
                .collect::<Vec<_>>();
            probes.shuffle(&mut rng);

            group.throughput(Throughput::Elements(size as u64));
            run_find::<T, RobinHashTable<T>>(&mut group, &present, &probes);
            run_find::<T, HashbrownHashTable<T>>(&mut group, &present, &probes);
        }
        group.finish();
    }
}

fn run_remove<T: KeyValuePair, Table: BenchTable<T>>(
    group: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>,
    items: &[(u64, T)],
) {
    group.bench_function(Table::NAME, |b| {
        b.iter_batched(
            || {
                let mut table = Table::empty();
                for (hash, item) in items.iter().cloned() {
                    table.insert(hash, item);
                }
                let mut order = items.to_vec();
                order.shuffle(&mut SmallRng::from_os_rng());
                (table, order)
            },
            |(mut table, order)| {
                for (hash, item) in &order {
                    black_box(table.remove(*hash, item));
                }
                black_box(table)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_remove<T: KeyValuePair, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(group_name::<T>("remove"));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for &size in SIZES[..=MAX_SIZE].iter() {
        let items = random_items::<T>(size);
        group.throughput(Throughput::Elements(size as u64));
        run_remove::<T, RobinHashTable<T>>(&mut group, &items);
        run_remove::<T, HashbrownHashTable<T>>(&mut group, &items);
    }
    group.finish();
}

fn run_iterate_drain<T: KeyValuePair, Table: BenchTable<T>>(
    group: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>,
    items: &[(u64, T)],
    drain: bool,
) {
    group.bench_function(Table::NAME, |b| {
        b.iter_batched(
            || {
                let mut table = Table::empty();
                for (hash, item) in items.iter().cloned() {
                    table.insert(hash, item);
                }
                table
            },
            |mut table| {
                if drain {
                    black_box(table.drain_count());
                } else {
                    black_box(table.count());
                }
                black_box(table)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_iteration<T: KeyValuePair, const MAX_SIZE: usize>(c: &mut Criterion) {
    for (prefix, drain) in [("iteration", false), ("drain", true)] {
        let mut group = c.benchmark_group(group_name::<T>(prefix));
        group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

        for &size in SIZES[..=MAX_SIZE].iter() {
            let items = random_items::<T>(size);
            group.throughput(Throughput::Elements(size as u64));
            run_iterate_drain::<T, RobinHashTable<T>>(&mut group, &items, drain);
            run_iterate_drain::<T, HashbrownHashTable<T>>(&mut group, &items, drain);
        }
        group.finish();
    }
}

const KEY_SPACE_MULTIPLIER: usize = 4;

fn run_mixed_zipf<T: KeyValuePair, Table: BenchTable<T>>(
    group: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>,
    keys: &[(u64, T)],
    ops: usize,
) {
    let key_distr = Zipf::new(keys.len() as f32 - 1.0, 1.0).unwrap();
    group.bench_function(Table::NAME, |b| {
        b.iter_batched(
            || {
                let mut rng = SmallRng::from_os_rng();
                (0..ops)
                    .map(|_| {
                        let op: u8 = rng.random_range(0..10);
                        let key = rng.sample(key_distr) as usize;
                        (op, key)
                    })
                    .collect::<Vec<_>>()
            },
            |script| {
                let mut table = Table::empty();
                for (op, key) in script {
                    let (hash, item) = &keys[key];
                    match op {
                        0..=3 => table.insert(*hash, item.clone()),
                        4..=7 => {
                            black_box(table.find(*hash, item));
                        }
                        _ => {
                            black_box(table.remove(*hash, item));
                        }
                    }
                }
                black_box(table)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_mixed_probabilistic_zipf<T: KeyValuePair, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(group_name::<T>("mixed_probabilistic_zipf"));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for &size in SIZES[..=MAX_SIZE].iter() {
        let keys = sequential_items::<T>(0..(size * KEY_SPACE_MULTIPLIER) as u64);
        group.throughput(Throughput::Elements(size as u64));
        run_mixed_zipf::<T, RobinHashTable<T>>(&mut group, &keys, size);
        run_mixed_zipf::<T, HashbrownHashTable<T>>(&mut group, &keys, size);
    }
    group.finish();
}

fn run_churn<T: KeyValuePair, Table: BenchTable<T>>(
    group: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>,
    resident: &[(u64, T)],
    churn: &[(u64, T)],
) {
    group.bench_function(Table::NAME, |b| {
        b.iter_batched(
            || {
                let mut table = Table::empty();
                for (hash, item) in resident.iter().cloned() {
                    table.insert(hash, item);
                }
                table
            },
            |mut table| {
                // Remove-then-insert cycles keep the population fixed; the
                // table never accumulates deleted markers.
                for (i, (hash, item)) in churn.iter().enumerate() {
                    let (old_hash, old_item) = &resident[i % resident.len()];
                    table.remove(*old_hash, old_item);
                    table.insert(*hash, item.clone());
                    table.remove(*hash, item);
                    table.insert(*old_hash, old_item.clone());
                }
                black_box(table)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_churn<T: KeyValuePair, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(group_name::<T>("churn"));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for &size in SIZES[..=MAX_SIZE].iter() {
        let resident = random_items::<T>(size);
        let churn = random_items::<T>(size);
        group.throughput(Throughput::Elements(size as u64 * 4));
        run_churn::<T, RobinHashTable<T>>(&mut group, &resident, &churn);
        run_churn::<T, HashbrownHashTable<T>>(&mut group, &resident, &churn);
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_insert_random::<SmallTestItem, 8>,
    bench_insert_random::<TestItem, 6>,
    bench_insert_random::<LargeTestItem, 4>,
    bench_find::<SmallTestItem, 8>,
    bench_find::<TestItem, 6>,
    bench_find::<LargeTestItem, 4>,
    bench_remove::<SmallTestItem, 8>,
    bench_remove::<TestItem, 6>,
    bench_iteration::<SmallTestItem, 8>,
    bench_iteration::<LargeTestItem, 4>,
    bench_mixed_probabilistic_zipf::<SmallTestItem, 8>,
    bench_mixed_probabilistic_zipf::<TestItem, 6>,
    bench_churn::<SmallTestItem, 8>,
    bench_churn::<TestItem, 6>,
);

criterion_main!(benches);

use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;

use clap::Parser;
use robin_hash::HashTable;
use robin_hash::hash_table::Entry;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    #[arg(short = 'l', long = "max_load_factor", default_value_t = 0.5)]
    max_load_factor: f32,

    /// Erase every n-th value after filling, then print the stats again.
    #[arg(short = 'e', long = "erase_every", default_value_t = 3)]
    erase_every: u64,
}

fn hash_u64(value: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn main() {
    let args = Args::parse();

    println!(
        "Creating HashTable with target capacity: {}",
        args.target_capacity
    );

    let mut table: HashTable<u64> = HashTable::with_capacity(args.target_capacity);
    table.set_max_load_factor(args.max_load_factor);

    println!("Actual capacity: {}", table.capacity());
    println!("Max load factor: {:.2}", table.max_load_factor());
    println!("Filling table with u64 values up to the growth limit...");

    let capacity = table.capacity();
    let mut value = 0u64;
    // Stop just before the insert that would grow the table.
    while table.debug_stats().growth_limit > table.len() {
        let hash = hash_u64(value);
        match table.entry(hash, |&v| v == value) {
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
            Entry::Occupied(_) => {
                panic!("Value already exists in table: {}", value);
            }
        }
        value += 1;
    }
    assert_eq!(table.capacity(), capacity);

    println!("Inserted {} values into table", table.len());
    println!("Final load factor: {:.2}%", table.load_factor() * 100.0);

    table.probe_histogram().print();
    table.debug_stats().print();
    table.assert_invariants();

    if args.erase_every == 0 {
        return;
    }

    let mut erased = 0;
    for v in (0..value).step_by(args.erase_every as usize) {
        if table.remove(hash_u64(v), |&x| x == v).is_some() {
            erased += 1;
        }
    }

    println!();
    println!("Erased {} values (every {}th)", erased, args.erase_every);
    println!("Load factor after erasure: {:.2}%", table.load_factor() * 100.0);

    table.probe_histogram().print();
    table.debug_stats().print();
    table.assert_invariants();
}

#![feature(test)]

extern crate ldcf;
#[cfg(feature = "farmhash")]
extern crate farmhash;
extern crate fnv;
extern crate rand;
extern crate test;

use self::ldcf::CuckooFilter;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

fn get_words() -> String {
    let path = Path::new("/usr/share/dict/words");
    let display = path.display();

    let mut file = match File::open(&path) {
        Err(why) => panic!("couldn't open {}: {}", display, why),
        Ok(file) => file,
    };

    let mut contents = String::new();
    if let Err(why) = file.read_to_string(&mut contents) {
        panic!("couldn't read {}: {}", display, why);
    }
    contents
}

fn perform_insertions<H: std::hash::Hasher + Default>(b: &mut test::Bencher) {
    let contents = get_words();
    let split: Vec<&str> = contents.split('\n').take(1000).collect();

    b.iter(|| {
        let mut cf = CuckooFilter::<H>::new(split.len() * 2, 16, 0);
        for s in &split {
            test::black_box(cf.insert(s));
        }
    });
}

#[bench]
fn bench_new(b: &mut test::Bencher) {
    b.iter(|| {
        test::black_box(CuckooFilter::<fnv::FnvHasher>::new(1 << 16, 16, 0));
    });
}

#[bench]
fn bench_contains_miss(b: &mut test::Bencher) {
    let mut cf = CuckooFilter::<fnv::FnvHasher>::new(1 << 16, 16, 0);
    for i in 0..1000 {
        cf.insert(&format!("word{i}"));
    }

    b.iter(|| {
        test::black_box(cf.contains("absent"));
    });
}

#[cfg(feature = "farmhash")]
#[bench]
fn bench_insertion_farmhash(b: &mut test::Bencher) {
    perform_insertions::<farmhash::FarmHasher>(b);
}

#[bench]
fn bench_insertion_fnv(b: &mut test::Bencher) {
    perform_insertions::<fnv::FnvHasher>(b);
}

#[bench]
fn bench_insertion_default(b: &mut test::Bencher) {
    perform_insertions::<std::collections::hash_map::DefaultHasher>(b);
}

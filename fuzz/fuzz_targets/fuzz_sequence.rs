#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use trix::sequence::{MonotoneSequence, PefSequence, Range, SequenceParams, NOT_FOUND};

#[derive(Arbitrary, Debug)]
struct Input {
    values: Vec<u32>,
    log_partition_size: u8,
    target: u32,
}

fuzz_target!(|input: Input| {
    let mut values: Vec<u64> = input.values.into_iter().map(u64::from).collect();
    values.sort_unstable();
    let params = SequenceParams {
        log_partition_size: 1 + input.log_partition_size % 16,
    };

    let seq = PefSequence::build(&values, &params).unwrap();
    assert_eq!(seq.len(), values.len() as u64);
    for (i, &v) in values.iter().enumerate() {
        assert_eq!(seq.access(i as u64), v);
    }

    let target = u64::from(input.target);
    let all = Range::new(0, seq.len());
    let expected = values.partition_point(|&v| v < target) as u64;
    let found = seq.next_geq(all, target);
    if expected == seq.len() {
        assert_eq!(found, NOT_FOUND);
    } else {
        assert_eq!(found, expected);
    }
});

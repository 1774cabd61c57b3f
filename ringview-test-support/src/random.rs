//! Seeded random `SkbMeta` sequences.

use rand::rngs::StdRng;
use rand::{ Rng, SeedableRng };

use ringview::{ Checksum, Record, SkbMeta };

/// Generates arbitrary but reproducible records from a seed.
pub struct RandomRecords {
    rng: StdRng,
}

impl RandomRecords {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn next_record(&mut self) -> SkbMeta {
        let rng = &mut self.rng;
        SkbMeta {
            address: rng.gen(),
            len: rng.gen_range(60..=9000),
            pkt_type: rng.gen_range(0..8),
            mark: rng.gen(),
            priority: rng.gen(),
            ingress_ifindex: rng.gen_range(1..64),
            ifindex: rng.gen_range(1..64),
            queue_mapping: rng.gen(),
            protocol: rng.gen(),
            vlan_present: rng.gen_range(0..2),
            vlan_tci: rng.gen(),
            vlan_proto: rng.gen(),
            tc_index: rng.gen(),
            cb: rng.gen(),
        }
    }

    pub fn take(&mut self, count: usize) -> Vec<SkbMeta> {
        (0..count).map(|_| self.next_record()).collect()
    }
}

/// Reference checksum computed directly from the records.
pub fn checksum_of<'a>(records: impl IntoIterator<Item = &'a SkbMeta>) -> Checksum {
    let mut sum = Checksum::default();
    for record in records {
        sum.absorb(record.fold());
    }
    sum
}

use std::collections::HashMap;
use log::{info, warn};
use stabtree::{Interval, IntervalTree};




/**
 * A per-chromosome shard of interval trees, in the role of an external
 * bulk loader: rows arrive as (chromosome, begin, end, name) tuples, and
 * malformed rows are repaired or skipped before anything reaches a tree.
 */
struct GenomeIndex {
    shards: HashMap<&'static str, IntervalTree<u64, String>>,
}

impl GenomeIndex {
    fn new() -> Self {
        Self { shards: HashMap::new() }
    }

    fn load(&mut self, rows: &[(&'static str, u64, u64, &str)]) {
        for &(chrom, begin, end, name) in rows {
            let (begin, end) = if begin < end { (begin, end) } else { (end, begin) };
            match Interval::new(begin, end, name.to_string()) {
                Ok(iv) => {
                    self.shards.entry(chrom).or_insert_with(IntervalTree::new).add(iv);
                }
                Err(_) => warn!("skipping zero-length row {}:{}-{}", chrom, begin, end),
            }
        }
    }

    fn at(&self, chrom: &str, p: u64) -> Vec<String> {
        self.shards
            .get(chrom)
            .map(|tree| tree.at(p).into_iter().map(|iv| iv.data().clone()).collect())
            .unwrap_or_default()
    }
}




fn main() {
    simple_logger::SimpleLogger::new().init().unwrap();

    let rows = [
        ("chr1", 11_873, 14_409, "DDX11L1"),
        ("chr1", 14_361, 29_370, "WASH7P"),
        ("chr1", 17_369, 17_436, "MIR6859-1"),
        ("chr1", 30_366, 30_366, "degenerate"),
        ("chr2", 38_814, 46_870, "FAM110C"),
        ("chr2", 46_870, 46_870, "degenerate"),
        ("chr2", 197_569, 202_605, "AC079779.1"),
    ];

    let mut index = GenomeIndex::new();
    index.load(&rows);

    for (chrom, tree) in &index.shards {
        info!(
            "{}: {} features spanning [{}, {})",
            chrom,
            tree.len(),
            tree.begin(),
            tree.end()
        );
    }

    info!("features at chr1:17400 = {:?}", index.at("chr1", 17_400));

    let chr1 = index.shards.get_mut("chr1").unwrap();
    info!(
        "features overlapping chr1:14000-18000 = {:?}",
        chr1.overlap(14_000, 18_000).into_iter().map(|iv| iv.data()).collect::<Vec<_>>()
    );
    info!(
        "features enveloped by chr1:14000-18000 = {:?}",
        chr1.envelop(14_000, 18_000).into_iter().map(|iv| iv.data()).collect::<Vec<_>>()
    );

    // mask out a repeat region, then collapse what remains per locus
    chr1.chop(17_000, 18_000).unwrap();
    chr1.merge_overlaps_with(true, |a, b| format!("{}+{}", a, b));
    for iv in chr1.iter() {
        info!("merged locus [{}, {}) = {}", iv.begin(), iv.end(), iv.data());
    }

    chr1.verify();
}

use std::{
    collections::BTreeMap,
    sync::Arc,
    time::{Duration, SystemTime},
};

use compaction_parts::{
    is_visible, ActivePartsCollector, DataPart, Disk, PartCatalog, PartRanges, PartitionId,
    PartitionScope, PartsCollector, PlacementPolicy, StorageMetadata, StoragePolicy,
    TransactionLog, TxnContext, TxnId, TxnSnapshot, TxnStatus, VersionMetadata,
    VisiblePartsCollector, Volume,
};

const TABLE: &str = "events";
const PARTITIONS: [&str; 4] = ["202401", "202402", "202403", "202404"];
const DISKS: [&str; 4] = ["ssd0", "ssd1", "ro", "retiring"];

fn metadata() -> StorageMetadata {
    StorageMetadata::new(TABLE).partition_by(["toYYYYMM(ts)"])
}

fn now() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(10_000)
}

fn policy() -> StoragePolicy {
    StoragePolicy::new("default").volume(
        Volume::new()
            .disk(Disk::new("ssd0"))
            .disk(Disk::new("ssd1"))
            .disk(Disk::new("ro").read_only(true))
            .disk(Disk::new("retiring").decommission_at(now())),
    )
}

struct World {
    catalog: PartCatalog,
    log: TransactionLog,
    reader: TxnSnapshot,
}

/// Random catalog whose parts reference committed, running and rolled-back
/// transactions, some started after the reader's snapshot.
fn world(rng: &mut fastrand::Rng) -> World {
    let log = TransactionLog::new();
    let mut txns = vec![TxnId::PREHISTORIC];
    for _ in 0..4 {
        let txn = log.begin().expect("begin").owner().expect("owner");
        log.commit(txn).expect("commit");
        txns.push(txn);
    }
    let reader = log.begin().expect("begin");
    txns.push(reader.owner().expect("owner"));
    for _ in 0..6 {
        let txn = log.begin().expect("begin").owner().expect("owner");
        match rng.u8(0..3) {
            0 => log.commit(txn).expect("commit"),
            1 => log.rollback(txn).expect("rollback"),
            _ => {}
        }
        txns.push(txn);
    }

    let catalog = PartCatalog::new(TABLE);
    for partition in PARTITIONS {
        let mut block = rng.i64(0..3);
        for _ in 0..rng.usize(0..12) {
            let width = rng.i64(0..3);
            let creation_txn = txns[rng.usize(0..txns.len())];
            let removal_txn = if rng.u8(0..4) == 0 {
                Some(txns[rng.usize(0..txns.len())])
            } else {
                None
            };
            let part = DataPart::new(partition, block, block + width, DISKS[rng.usize(0..DISKS.len())])
                .with_level(u32::from(width > 0))
                .with_version(VersionMetadata {
                    creation_txn,
                    removal_txn,
                })
                .with_stats(rng.u64(1..1 << 20), rng.u64(1..10_000));
            catalog.insert(part).expect("insert");
            block += width + 1 + rng.i64(0..2);
        }
    }
    World {
        catalog,
        log,
        reader,
    }
}

fn random_scope(rng: &mut fastrand::Rng) -> Option<PartitionScope> {
    if rng.bool() {
        return None;
    }
    let mut scope: PartitionScope = PARTITIONS
        .iter()
        .filter(|_| rng.bool())
        .map(|p| PartitionId::new(p))
        .collect();
    if rng.bool() {
        scope.insert(PartitionId::new("199912"));
    }
    Some(scope)
}

fn usable(part: &DataPart, visible: impl Fn(&DataPart) -> bool) -> bool {
    visible(part) && policy().is_eligible(&part.disk, now()).expect("eligible")
}

/// Reference model: per partition, split the in-scope active parts at every
/// unusable one.
fn expected_ranges(
    catalog: &PartCatalog,
    scope: Option<&PartitionScope>,
    visible: impl Fn(&DataPart) -> bool,
) -> Vec<Vec<String>> {
    let snapshot = catalog.active_snapshot().expect("snapshot");
    let mut by_partition: BTreeMap<PartitionId, Vec<Arc<DataPart>>> = BTreeMap::new();
    for part in snapshot.parts() {
        if scope.map_or(true, |s| s.contains(&part.partition_id)) {
            by_partition
                .entry(part.partition_id.clone())
                .or_default()
                .push(Arc::clone(part));
        }
    }
    let mut out = Vec::new();
    for parts in by_partition.values() {
        for run in parts.split(|p| !usable(p, &visible)) {
            if !run.is_empty() {
                out.push(run.iter().map(|p| p.name().to_string()).collect());
            }
        }
    }
    out
}

fn names(ranges: &PartRanges) -> Vec<Vec<String>> {
    ranges
        .iter()
        .map(|r| r.parts().iter().map(|p| p.name().to_string()).collect())
        .collect()
}

fn committed(log: &TransactionLog, txn: TxnId) -> bool {
    log.status(txn).expect("status") == TxnStatus::Committed
}

#[test]
fn transactional_ranges_match_reference_model() {
    let mut rng = fastrand::Rng::with_seed(0x5eed);
    for _ in 0..200 {
        let world = world(&mut rng);
        let scope = random_scope(&mut rng);
        let collector =
            VisiblePartsCollector::new(&world.catalog, TxnContext::Transaction(&world.reader));
        let ranges = collector
            .collect(&metadata(), &policy(), now(), scope.as_ref())
            .expect("collect");

        let expected = expected_ranges(&world.catalog, scope.as_ref(), |p| {
            is_visible(&p.version, &world.reader)
        });
        assert_eq!(names(&ranges), expected);

        for range in &ranges {
            assert!(!range.is_empty());
            if let Some(scope) = &scope {
                assert!(scope.contains(range.partition_id()));
            }
            for pair in range.parts().windows(2) {
                assert!(pair[0].max_block < pair[1].min_block);
            }
            for part in range {
                assert_eq!(&part.partition_id, range.partition_id());
                assert!(world.reader.sees(part.version.creation_txn));
                assert!(part
                    .version
                    .removal_txn
                    .map_or(true, |txn| !world.reader.sees(txn)));
                assert!(policy().is_eligible(&part.disk, now()).expect("eligible"));
            }
        }

        let again = collector
            .collect(&metadata(), &policy(), now(), scope.as_ref())
            .expect("collect");
        assert_eq!(ranges, again);
    }
}

#[test]
fn non_transactional_ranges_use_committed_rule() {
    let mut rng = fastrand::Rng::with_seed(42);
    for _ in 0..200 {
        let world = world(&mut rng);
        let scope = random_scope(&mut rng);
        let ranges = VisiblePartsCollector::new(&world.catalog, TxnContext::NonTransactional(&world.log))
            .collect(&metadata(), &policy(), now(), scope.as_ref())
            .expect("collect");
        let expected = expected_ranges(&world.catalog, scope.as_ref(), |p| {
            committed(&world.log, p.version.creation_txn)
                && p
                    .version
                    .removal_txn
                    .map_or(true, |txn| !committed(&world.log, txn))
        });
        assert_eq!(names(&ranges), expected);
    }
}

#[test]
fn active_strategy_sees_every_active_part() {
    let mut rng = fastrand::Rng::with_seed(7);
    for _ in 0..50 {
        let world = world(&mut rng);
        let ranges = ActivePartsCollector::new(&world.catalog)
            .collect(&metadata(), &policy(), now(), None)
            .expect("collect");
        assert_eq!(names(&ranges), expected_ranges(&world.catalog, None, |_| true));
    }
}

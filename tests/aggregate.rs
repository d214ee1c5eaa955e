use chia_block_sync::{
    timestamp::utc_day, AddressResolver, Aggregator, Bech32mResolver, BlockRecord, Clock, Error,
    LinearEstimator, SqliteStore, Store,
};
use chrono::NaiveDate;

/// Height 0 lands on 2023-11-15 00:00:00 UTC.
const GENESIS: u64 = 1_700_006_400;

/// A wall clock that never moves.
struct FixedClock(u64);

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}

fn puzzle_hash(tag: u8) -> String {
    format!("0x{}", hex::encode([tag; 32]))
}

fn record(height: u64, farmer: u8) -> BlockRecord {
    BlockRecord {
        height,
        farmer_puzzle_hash: puzzle_hash(farmer),
        pool_puzzle_hash: puzzle_hash(farmer + 100),
        ..Default::default()
    }
}

fn address(tag: u8) -> String {
    Bech32mResolver::mainnet().resolve(&puzzle_hash(tag)).unwrap()
}

fn day(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn aggregator(now: u64) -> Aggregator<SqliteStore, Bech32mResolver, LinearEstimator, FixedClock> {
    Aggregator::new(
        SqliteStore::new_in_memory().unwrap(),
        Bech32mResolver::mainnet(),
        LinearEstimator {
            genesis_timestamp: GENESIS,
            block_interval_ms: 18_750,
        },
        FixedClock(now),
    )
}

/// Ten blocks, three farmers appearing 5, 3 and 2 times.
fn ten_blocks() -> Vec<BlockRecord> {
    [1, 2, 1, 3, 1, 2, 1, 2, 3, 1]
        .iter()
        .enumerate()
        .map(|(h, &farmer)| record(h as u64, farmer))
        .collect()
}

#[tokio::test]
async fn counts_blocks_per_farmer_and_advances_watermark() -> anyhow::Result<()> {
    let agg = aggregator(GENESIS + 10 * 86_400);

    let watermark = agg.apply_batch(0, &ten_blocks(), false, false).await?;
    assert_eq!(watermark, 9);
    assert_eq!(agg.watermark().await?, Some(9));

    let store = agg.store();
    let today = day("2023-11-15");
    for (farmer, n) in [(1u8, 5u64), (2, 3), (3, 2)] {
        assert_eq!(store.farmer_total(&address(farmer)).await?, Some(n));
        assert_eq!(store.farmer_daily(&address(farmer), today).await?, Some(n));
    }
    Ok(())
}

#[tokio::test]
async fn replayed_batch_is_never_counted_twice() -> anyhow::Result<()> {
    let agg = aggregator(GENESIS);
    let blocks = ten_blocks();

    agg.apply_batch(0, &blocks, false, false).await?;
    // A retry of the same range after it already committed.
    let err = agg.apply_batch(0, &blocks, false, false).await.unwrap_err();
    assert!(matches!(err, Error::OutOfOrder { expected: 10, got: 0 }));

    assert_eq!(agg.store().farmer_total(&address(1)).await?, Some(5));
    assert_eq!(agg.watermark().await?, Some(9));
    Ok(())
}

#[tokio::test]
async fn watermark_moves_by_records_applied() -> anyhow::Result<()> {
    let agg = aggregator(GENESIS);
    let mut expected = None;
    let mut start = 0;
    for len in [10u64, 10, 3, 1, 7] {
        let batch: Vec<_> = (start..start + len).map(|h| record(h, 1)).collect();
        let watermark = agg.apply_batch(start, &batch, false, false).await?;
        assert_eq!(watermark, start + len - 1);
        assert!(expected.map_or(true, |prev| watermark > prev));
        expected = Some(watermark);
        start = watermark + 1;
    }
    assert_eq!(agg.watermark().await?, Some(30));
    assert_eq!(agg.store().farmer_total(&address(1)).await?, Some(31));
    Ok(())
}

#[tokio::test]
async fn one_bad_puzzle_hash_fails_the_whole_batch() -> anyhow::Result<()> {
    let agg = aggregator(GENESIS);
    let mut blocks = ten_blocks();
    blocks[7].farmer_puzzle_hash = "0xnothex".into();

    let err = agg.apply_batch(0, &blocks, false, false).await.unwrap_err();
    assert!(matches!(err, Error::AddressResolution(_)), "got {err:?}");

    assert_eq!(agg.watermark().await?, None);
    assert_eq!(agg.store().farmer_total(&address(1)).await?, None);
    Ok(())
}

#[tokio::test]
async fn gaps_and_empty_batches_are_rejected() {
    let agg = aggregator(GENESIS);

    let err = agg.apply_batch(0, &[], true, false).await.unwrap_err();
    assert!(matches!(err, Error::EmptyBatch));

    let gap = vec![record(0, 1), record(2, 1)];
    let err = agg.apply_batch(0, &gap, true, false).await.unwrap_err();
    assert!(matches!(err, Error::OutOfOrder { expected: 1, got: 2 }));
}

#[tokio::test]
async fn historical_blocks_use_the_height_estimate() -> anyhow::Result<()> {
    // Height 4608 * 2 is two days after genesis at 18.75 s per block.
    let agg = aggregator(GENESIS + 365 * 86_400);
    let height = 4_608 * 2;
    let start = 0;
    let batch: Vec<_> = (start..=height).map(|h| record(h, 1)).collect();

    let writes = agg.plan(start, &batch, false, false)?;
    assert_eq!(writes.daily[&(address(1), day("2023-11-15"))], 4_608);
    assert_eq!(writes.daily[&(address(1), day("2023-11-16"))], 4_608);
    assert_eq!(writes.daily[&(address(1), day("2023-11-17"))], 1);
    Ok(())
}

#[tokio::test]
async fn caught_up_blocks_use_the_wall_clock() -> anyhow::Result<()> {
    let now = GENESIS + 100 * 86_400 + 3_600;
    let agg = aggregator(now);

    let writes = agg.plan(0, &[record(0, 1), record(1, 2)], true, false)?;
    let today = utc_day(now)?;
    assert_eq!(today, day("2024-02-23"));
    assert_eq!(writes.daily[&(address(1), today)], 1);
    assert_eq!(writes.daily[&(address(2), today)], 1);
    Ok(())
}

#[tokio::test]
async fn reported_timestamps_win() -> anyhow::Result<()> {
    let agg = aggregator(GENESIS);
    let mut block = record(0, 1);
    block.timestamp = Some(GENESIS + 3 * 86_400 + 5);

    for caught_up in [false, true] {
        let writes = agg.plan(0, std::slice::from_ref(&block), caught_up, false)?;
        assert_eq!(writes.daily[&(address(1), day("2023-11-18"))], 1);
    }
    Ok(())
}

#[tokio::test]
async fn block_syncing_stores_enriched_records() -> anyhow::Result<()> {
    let agg = aggregator(GENESIS);
    let mut blocks = vec![record(0, 1), record(1, 2), record(2, 1)];
    blocks[1].timestamp = Some(GENESIS + 60);
    blocks[2].pool_puzzle_hash = "0x1234".into();

    agg.apply_batch(0, &blocks, false, true).await?;
    let store = agg.store();

    let first = store.load_block(0).await?.expect("block 0 stored");
    assert_eq!(first.farmer_address, address(1));
    assert_eq!(first.pool_address, Some(address(101)));
    assert!(!first.is_transaction_block);
    // The estimate is only for bucketing, never written back.
    assert_eq!(first.record.timestamp, None);

    let second = store.load_block(1).await?.expect("block 1 stored");
    assert!(second.is_transaction_block);
    assert_eq!(second.record.timestamp, Some(GENESIS + 60));

    // A pool hash that does not encode does not block the batch.
    let third = store.load_block(2).await?.expect("block 2 stored");
    assert_eq!(third.pool_address, None);
    assert_eq!(store.farmer_total(&address(1)).await?, Some(2));
    Ok(())
}

#[tokio::test]
async fn counters_only_without_block_syncing() -> anyhow::Result<()> {
    let agg = aggregator(GENESIS);
    let writes = agg.plan(0, &ten_blocks(), false, false)?;
    assert!(writes.blocks.is_empty());

    agg.apply_batch(0, &ten_blocks(), false, false).await?;
    assert!(agg.store().load_block(0).await?.is_none());
    assert_eq!(agg.store().load_watermark().await?, Some(9));
    Ok(())
}

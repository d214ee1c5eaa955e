use chia_block_sync::{record::GetBlockRecordsResponse, Error};

/// A `get_block_records` body the way the node sends it: one transaction block,
/// one non-transaction block, plus fields we never read.
const REPLY: &str = r#"{
    "block_records": [
        {
            "challenge_block_info_hash": "0x3a8c1e5b3e9fd2b5e43fc9b0f4a4d5a6f0c0e1b2c3d4e5f60718293a4b5c6d7e",
            "challenge_vdf_output": { "data": "0x0200" },
            "deficit": 0,
            "farmer_puzzle_hash": "0xabababababababababababababababababababababababababababababababab",
            "fees": 250000,
            "finished_challenge_slot_hashes": null,
            "finished_infused_challenge_slot_hashes": null,
            "finished_reward_slot_hashes": null,
            "header_hash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "height": 5000000,
            "infused_challenge_vdf_output": null,
            "overflow": false,
            "pool_puzzle_hash": "0xcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcd",
            "prev_hash": "0x0000000000000000000000000000000000000000000000000000000000000000",
            "prev_transaction_block_hash": "0x2222222222222222222222222222222222222222222222222222222222222222",
            "prev_transaction_block_height": 4999998,
            "required_iters": 1234567,
            "reward_claims_incorporated": [],
            "reward_infusion_new_challenge": "0x3333333333333333333333333333333333333333333333333333333333333333",
            "signage_point_index": 42,
            "sub_epoch_summary_included": null,
            "sub_slot_iters": 147849216,
            "timestamp": 1700000000,
            "total_iters": 18446744073709551621,
            "weight": 340282366920938463463374607431768211455
        },
        {
            "challenge_block_info_hash": "0x4444444444444444444444444444444444444444444444444444444444444444",
            "deficit": 15,
            "farmer_puzzle_hash": "0xabababababababababababababababababababababababababababababababab",
            "fees": null,
            "header_hash": "0x5555555555555555555555555555555555555555555555555555555555555555",
            "height": 5000001,
            "overflow": true,
            "pool_puzzle_hash": "0xcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcd",
            "prev_hash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "prev_transaction_block_hash": null,
            "prev_transaction_block_height": 5000000,
            "required_iters": 7654321,
            "reward_infusion_new_challenge": "0x6666666666666666666666666666666666666666666666666666666666666666",
            "signage_point_index": 43,
            "sub_slot_iters": 147849216,
            "timestamp": null,
            "total_iters": 18446744073709551700,
            "weight": 18446744073709551616000
        }
    ],
    "success": true
}"#;

#[test]
fn realistic_reply_decodes() -> anyhow::Result<()> {
    let reply: GetBlockRecordsResponse = serde_json::from_str(REPLY)?;
    let records = reply.into_records(5_000_000, 5_000_010)?;
    assert_eq!(records.len(), 2);

    let tx = &records[0];
    assert_eq!(tx.height, 5_000_000);
    assert_eq!(tx.timestamp, Some(1_700_000_000));
    assert_eq!(tx.fees, Some(250_000));
    assert!(tx.is_transaction_block());
    assert_eq!(tx.total_iters, u128::from(u64::MAX) + 6);
    assert_eq!(tx.weight, u128::MAX);
    assert_eq!(tx.signage_point_index, 42);

    let plain = &records[1];
    assert_eq!(plain.timestamp, None);
    assert_eq!(plain.fees, None);
    assert_eq!(plain.prev_transaction_block_hash, None);
    assert!(!plain.is_transaction_block());
    assert!(plain.overflow);
    assert_eq!(plain.weight, 18_446_744_073_709_551_616_000);
    Ok(())
}

#[test]
fn zero_timestamp_is_not_a_transaction_block() -> anyhow::Result<()> {
    let reply: GetBlockRecordsResponse =
        serde_json::from_str(r#"{ "block_records": [ { "height": 7, "timestamp": 0 } ] }"#)?;
    let records = reply.into_records(7, 17)?;
    assert_eq!(records[0].reported_timestamp(), None);
    assert!(!records[0].is_transaction_block());
    Ok(())
}

#[test]
fn node_side_failure_is_a_transport_error() -> anyhow::Result<()> {
    let reply: GetBlockRecordsResponse =
        serde_json::from_str(r#"{ "success": false, "error": "Block 999 not found" }"#)?;
    let err = reply.into_records(999, 1_009).unwrap_err();
    let Error::Transport(msg) = &err else {
        panic!("expected a transport error, got {err:?}");
    };
    assert!(msg.contains("Block 999 not found"), "{msg}");
    assert!(!err.is_fatal());

    // No message from the node still fails.
    let reply: GetBlockRecordsResponse = serde_json::from_str(r#"{ "success": false }"#)?;
    assert!(matches!(reply.into_records(0, 10), Err(Error::Transport(_))));
    Ok(())
}

#[test]
fn empty_reply_near_the_head() -> anyhow::Result<()> {
    let reply: GetBlockRecordsResponse =
        serde_json::from_str(r#"{ "block_records": [], "success": true }"#)?;
    assert!(reply.into_records(100, 110)?.is_empty());
    Ok(())
}

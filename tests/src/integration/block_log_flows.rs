//! # Block Log Integration Flows
//!
//! Exercises the block log the way the node uses it: a producer appending
//! irreversible blocks while the API layer reads through `BlockLogApi`, and
//! the operator tooling that restarts, copies and truncates logs.
//!
//! ## Flows Tested:
//!
//! 1. **Producer → API**: appended blocks are served by number, range and id
//! 2. **Crash → Restart**: lost index tails and torn records are recovered
//! 3. **Replication**: stored bytes copied from one log to another verbatim
//! 4. **Rewrite**: a log cut back to a block number opens cleanly

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    use qc_02_block_log::test_utils::{make_chain, test_dictionary};
    use qc_02_block_log::{BlockLog, BlockLogApi, BlockLogConfig, BlockLogError, FileManager};
    use shared_types::SignedBlock;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn production_config() -> BlockLogConfig {
        BlockLogConfig::default()
            .with_compression_level(3)
            .with_dictionary(0, test_dictionary(0))
    }

    fn write_chain(path: &Path, config: BlockLogConfig, chain: &[SignedBlock]) {
        let log = BlockLog::open_at(path, false, config).unwrap();
        for block in chain {
            log.append(block).unwrap();
        }
    }

    // =============================================================================
    // PRODUCER → API
    // =============================================================================

    #[test]
    fn test_api_layer_reads_while_producer_appends() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(BlockLog::open_at(dir.path().join("block_log"), false, production_config()).unwrap());
        let api: Arc<dyn BlockLogApi> = log.clone();
        let chain = make_chain(300);
        let done = Arc::new(AtomicBool::new(false));

        let api_thread = {
            let api = Arc::clone(&api);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut served = 0u32;
                while !done.load(Ordering::Acquire) {
                    let Some(head) = api.head() else { continue };
                    let n = head.block_num();

                    let (id, key) = api.read_data_by_num(n).unwrap();
                    assert_eq!(id, Some(head.id()));
                    assert_eq!(key, Some(head.signee()));

                    let first = n.saturating_sub(9).max(1);
                    let blocks = api.read_block_range_by_num(first, 10).unwrap();
                    assert_eq!(blocks.last().map(|b| b.block_num()), Some(n));
                    for pair in blocks.windows(2) {
                        assert_eq!(pair[1].header.header.previous, pair[0].id());
                    }
                    served += 1;
                }
                served
            })
        };

        for block in &chain {
            log.append(block).unwrap();
        }
        done.store(true, Ordering::Release);
        api_thread.join().unwrap();

        assert_eq!(api.head().unwrap().block_num(), 300);
        let ids = api.read_data_range_by_num(1, 300).unwrap();
        assert!(ids.values().zip(&chain).all(|(identity, block)| identity.0 == Some(block.id())));
    }

    // =============================================================================
    // CRASH → RESTART
    // =============================================================================

    #[test]
    fn test_restart_after_losing_index_tails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("block_log");
        let chain = make_chain(50);
        write_chain(&path, production_config(), &chain);

        // index writes after the data write never made it to disk
        let index = FileManager::index_path(&path);
        let hash_index = FileManager::hash_index_path(&path);
        fs::OpenOptions::new().write(true).open(&index).unwrap().set_len(8 * 41 + 3).unwrap();
        fs::OpenOptions::new().write(true).open(&hash_index).unwrap().set_len(52 * 12).unwrap();

        let log = BlockLog::open_at(&path, false, production_config()).unwrap();

        assert_eq!(fs::metadata(&index).unwrap().len(), 8 * 50);
        assert_eq!(fs::metadata(&hash_index).unwrap().len(), 52 * 50);
        assert_eq!(log.read_block_range_by_num(1, 50).unwrap(), chain);
    }

    #[test]
    fn test_restart_after_torn_append_then_continue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("block_log");
        let chain = make_chain(20);
        write_chain(&path, production_config(), &chain[..19]);

        // half of block 20's record reached the disk, none of its index entries did
        let stored = chain[19].to_bytes().unwrap();
        let mut file = fs::read(&path).unwrap();
        file.extend_from_slice(&stored[..stored.len() / 2]);
        fs::write(&path, &file).unwrap();

        let log = BlockLog::open_at(&path, false, production_config()).unwrap();
        assert_eq!(log.head().unwrap().block_num(), 19);

        log.append(&chain[19]).unwrap();
        drop(log);

        let log = BlockLog::open_at(&path, true, production_config()).unwrap();
        assert_eq!(log.read_block_range_by_num(1, 20).unwrap(), chain);
    }

    #[test]
    fn test_read_only_follower_sees_snapshot_at_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("block_log");
        let chain = make_chain(10);

        let writer = BlockLog::open_at(&path, false, production_config()).unwrap();
        for block in &chain[..5] {
            writer.append(block).unwrap();
        }

        let follower = BlockLog::open_at(&path, true, production_config()).unwrap();
        for block in &chain[5..] {
            writer.append(block).unwrap();
        }

        assert_eq!(follower.head().unwrap().block_num(), 5);
        assert_eq!(follower.read_block_by_num(8).unwrap(), None);
        assert_eq!(follower.read_block_range_by_num(1, 10).unwrap(), chain[..5].to_vec());
    }

    // =============================================================================
    // REPLICATION
    // =============================================================================

    #[test]
    fn test_replicate_stored_bytes_between_logs() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("source");
        let chain = make_chain(30);
        write_chain(&source_path, production_config(), &chain);

        let source = BlockLog::open_at(&source_path, true, production_config()).unwrap();
        let replica = BlockLog::open_at(dir.path().join("replica"), false, production_config()).unwrap();
        for n in 1..=30 {
            let (bytes, attributes) = source.read_raw_block_data_by_num(n).unwrap().unwrap();
            replica.append_raw(&bytes, attributes).unwrap();
        }
        drop(replica);

        assert_eq!(
            fs::read(&source_path).unwrap(),
            fs::read(dir.path().join("replica")).unwrap()
        );
    }

    #[test]
    fn test_replica_rejects_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("source");
        let chain = make_chain(3);
        write_chain(&source_path, production_config(), &chain);

        let source = BlockLog::open_at(&source_path, true, production_config()).unwrap();
        let replica = BlockLog::open_at(dir.path().join("replica"), false, production_config()).unwrap();
        let (bytes, attributes) = source.read_raw_block_data_by_num(2).unwrap().unwrap();

        assert!(matches!(
            replica.append_raw(&bytes, attributes),
            Err(BlockLogError::NonSequentialBlock { expected: 1, actual: 2 })
        ));
    }

    // =============================================================================
    // REWRITE
    // =============================================================================

    #[test]
    fn test_rewrite_then_open_truncated_log() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("block_log");
        let output = dir.path().join("block_log.truncated");
        let chain = make_chain(40);
        write_chain(&input, production_config(), &chain);

        let report = qc_02_block_log::rewrite(&input, &output, 25, &production_config().dictionaries).unwrap();
        assert_eq!(report.blocks_written, 25);

        let log = BlockLog::open_at(&output, false, production_config()).unwrap();
        assert_eq!(log.head().unwrap().block_num(), 25);
        assert_eq!(log.read_block_range_by_num(1, 40).unwrap(), chain[..25].to_vec());

        // the truncated log keeps growing from where it was cut
        log.append(&chain[25]).unwrap();
        assert_eq!(log.read_block_by_num(26).unwrap(), Some(chain[25].clone()));
    }
}

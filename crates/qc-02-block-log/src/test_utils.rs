use shared_types::{BlockHeader, BlockId, BlockTransaction, SignedBlock, SignedBlockHeader};

/// A block following `previous`, with a couple of compressible transactions.
pub fn make_test_block(previous: BlockId) -> SignedBlock {
    let block_num = previous.block_num() + 1;
    SignedBlock {
        header: SignedBlockHeader {
            header: BlockHeader {
                previous,
                timestamp: 1_700_000_000 + block_num * 3,
                witness: format!("witness-{}", block_num % 21),
                transaction_merkle_root: [block_num as u8; 20],
            },
            signing_key: [(block_num % 251) as u8; 32],
            witness_signature: [0x5A; 64],
        },
        transactions: (0..2)
            .map(|i| BlockTransaction {
                ref_block_num: (block_num & 0xFFFF) as u16,
                expiration: 1_700_000_600 + i,
                operations: format!("transfer block={} op={} memo=aaaaaaaaaaaaaaaa", block_num, i)
                    .into_bytes(),
            })
            .collect(),
    }
}

/// Blocks `1..=count`, linked by id.
pub fn make_chain(count: u32) -> Vec<SignedBlock> {
    let mut previous = BlockId::zero();
    (0..count)
        .map(|_| {
            let block = make_test_block(previous);
            previous = block.id();
            block
        })
        .collect()
}

/// Dictionary contents used by tests; zstd accepts any bytes as a raw-content
/// dictionary.
pub fn test_dictionary(seed: u8) -> Vec<u8> {
    let mut dictionary = Vec::new();
    for i in 0..64u32 {
        dictionary.extend_from_slice(
            format!("transfer block={} op=0 memo=aaaaaaaaaaaaaaaa witness-{} ", i, seed).as_bytes(),
        );
    }
    dictionary
}

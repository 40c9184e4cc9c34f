use bitcoin::Transaction;

/// Version, lock time and the input/output counts.
pub const TX_OVERHEAD_VBYTES: u64 = 10;
/// Outpoint, sequence and a signature plus public key script. Signing is
/// done by the node, so assume the largest common single-key spend.
pub const INPUT_VBYTES: u64 = 148;
pub const OUTPUT_VBYTES: u64 = 34;

/// Estimated virtual size of a transaction before it is signed. Inputs
/// dominate; the estimate never undershoots a single-key spend.
pub fn estimate_vsize(inputs: usize, outputs: usize) -> u64 {
    TX_OVERHEAD_VBYTES + INPUT_VBYTES * inputs as u64 + OUTPUT_VBYTES * outputs as u64
}

pub fn get_tx_vsize(tx: &Transaction) -> u64 {
    tx.vsize() as u64
}

use crate::chunk::ChunkPlanner;
use crate::error::TransferError;
use crate::FileRecord;

/// Check the invariants a File Record must hold before it is persisted.
pub fn validate_record(record: &FileRecord, planner: &ChunkPlanner) -> Result<(), TransferError> {
    if record.encryption.key.is_none() {
        return Err(TransferError::MissingKey);
    }
    if record.size == 0 {
        return Err(TransferError::InvalidRecord(format!("file {} has size 0", record.id)));
    }

    let plan = planner.plan(record.size, &record.encryption.provider);
    let locators = record.encryption.chunk_locators.len();
    if locators != plan.chunk_count as usize {
        return Err(TransferError::InvalidRecord(format!(
            "file {} has {} chunk locators, expected {} for {} bytes at {} bytes per chunk",
            record.id, locators, plan.chunk_count, record.size, plan.chunk_size
        )));
    }

    Ok(())
}

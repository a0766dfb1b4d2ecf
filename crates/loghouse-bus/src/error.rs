use thiserror::Error;

pub type Result<T> = std::result::Result<T, BusError>;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Partition {partition} does not exist (partition count {partition_count})")]
    UnknownPartition { partition: u32, partition_count: u32 },

    #[error("Offset commit failed: {0}")]
    Commit(String),
}

pub mod checkpoint;

pub use checkpoint::{
    Checkpoint, CheckpointError, CheckpointMetadata, list_checkpoints, load_checkpoint,
    load_latest_valid_checkpoint, prune_checkpoints, save_checkpoint,
};

use crate::core::io::traits::SourceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Atom of instance '{asym_id}' has no registered entity")]
    UnknownInstance { asym_id: String },

    #[error("Non-finite coordinate for atom '{atom_id}' of instance '{asym_id}'")]
    InvalidCoordinate { asym_id: String, atom_id: String },

    #[error("Model '{model_id}' not present in entry '{entry_id}'")]
    ModelNotFound { entry_id: String, model_id: String },

    #[error("Entry source failed: {source}")]
    Source {
        #[from]
        source: SourceError,
    },
}

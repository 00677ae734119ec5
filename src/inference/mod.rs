pub mod client;
pub mod error;
pub mod types;

pub use client::{InferenceClient, Predictor};
pub use error::InferenceError;
pub use types::{
    FaceTensor, ModelStatusResponse, ModelVersionStatus, PredictRequest, PredictResponse,
};

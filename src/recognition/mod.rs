mod gender;
mod image;

pub use gender::{
    ACTION_NAME, GenderExecutor, GenderGoal, LoadedModel, ModelLoader, RecognizeGender,
    ReloadModel, gender_executor,
};
pub use image::{BgrImage, BoundingBox, GrayImage};

//! The gender recognition action: one goal is an image plus the face boxes
//! found in it, the payload is one label per box.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::image::{BgrImage, BoundingBox};
use crate::action::{RecoveryStep, ResourceLoader, TaskBody};
use crate::config::RecognitionConfig;
use crate::error::ActionError;
use crate::executor::{ActionExecutor, ExecutorConfig};
use crate::inference::{FaceTensor, Predictor};

pub const ACTION_NAME: &str = "recognize_gender";

/// Input of one recognition run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenderGoal {
    pub image: BgrImage,
    #[serde(default)]
    pub bounding_boxes: Vec<BoundingBox>,
}

/// A model confirmed to be servable, owned by a single execution.
pub struct LoadedModel<P> {
    predictor: Arc<P>,
    pub version: String,
}

impl<P> Clone for LoadedModel<P> {
    fn clone(&self) -> Self {
        Self {
            predictor: Arc::clone(&self.predictor),
            version: self.version.clone(),
        }
    }
}

async fn acquire<P: Predictor>(predictor: Arc<P>) -> Result<LoadedModel<P>, ActionError> {
    let status = predictor.model_status().await?;
    match status.available_version() {
        Some(v) => {
            let version = v.version.clone();
            Ok(LoadedModel { predictor, version })
        }
        None => Err(ActionError::ModelUnavailable(status.describe_unavailable())),
    }
}

/// Checks with the inference backend that the model is `AVAILABLE`.
pub struct ModelLoader<P> {
    predictor: Arc<P>,
}

impl<P> ModelLoader<P> {
    pub fn new(predictor: Arc<P>) -> Self {
        Self { predictor }
    }
}

impl<P: Predictor> ResourceLoader for ModelLoader<P> {
    type Handle = LoadedModel<P>;

    async fn load(&self) -> Result<LoadedModel<P>, ActionError> {
        info!("loading gender model");
        let model = acquire(Arc::clone(&self.predictor)).await?;
        info!(version = %model.version, "gender model available");
        Ok(model)
    }
}

/// Re-acquires the model between two recognition attempts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReloadModel;

impl<P: Predictor> RecoveryStep<LoadedModel<P>> for ReloadModel {
    async fn recover(&self, handle: LoadedModel<P>) -> Result<LoadedModel<P>, ActionError> {
        let previous = handle.version.clone();
        let model = acquire(handle.predictor).await?;
        if model.version != previous {
            warn!(%previous, current = %model.version, "model version changed during recovery");
        }
        Ok(model)
    }
}

/// Crops, normalises and classifies every face of the goal.
#[derive(Debug, Clone)]
pub struct RecognizeGender {
    labels: Vec<String>,
    input_size: (u32, u32),
}

impl RecognizeGender {
    pub fn new(labels: Vec<String>, input_size: (u32, u32)) -> Result<Self, ActionError> {
        if labels.is_empty() {
            return Err(ActionError::Other("at least one label is required".into()));
        }
        if input_size.0 == 0 || input_size.1 == 0 {
            return Err(ActionError::Other(format!(
                "model input size must be non-zero, got {}x{}",
                input_size.0, input_size.1
            )));
        }
        Ok(Self { labels, input_size })
    }

    pub fn preprocess(&self, goal: &GenderGoal) -> Result<Vec<FaceTensor>, ActionError> {
        let gray = goal.image.to_gray()?;
        let (width, height) = self.input_size;
        goal.bounding_boxes
            .iter()
            .map(|bbox| Ok(gray.crop(bbox)?.resize(width, height).normalized()))
            .collect()
    }

    fn label_for(&self, scores: &[f32]) -> Result<String, ActionError> {
        if scores.len() != self.labels.len() {
            return Err(ActionError::Classification(format!(
                "model returned {} scores for {} labels",
                scores.len(),
                self.labels.len()
            )));
        }
        scores
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| self.labels[i].clone())
            .ok_or_else(|| ActionError::Classification("empty prediction".into()))
    }
}

impl<P: Predictor> TaskBody<GenderGoal, LoadedModel<P>> for RecognizeGender {
    type Payload = Vec<String>;

    async fn run(
        &self,
        goal: &GenderGoal,
        model: &LoadedModel<P>,
    ) -> Result<Vec<String>, ActionError> {
        if goal.bounding_boxes.is_empty() {
            debug!("goal has no faces");
            return Ok(Vec::new());
        }

        info!(faces = goal.bounding_boxes.len(), "recognizing genders");
        let faces = self.preprocess(goal)?;
        let predictions = model.predictor.predict(faces).await?;
        if predictions.len() != goal.bounding_boxes.len() {
            return Err(ActionError::Classification(format!(
                "model returned {} predictions for {} faces",
                predictions.len(),
                goal.bounding_boxes.len()
            )));
        }

        predictions.iter().map(|p| self.label_for(p)).collect()
    }
}

pub type GenderExecutor<P> =
    ActionExecutor<GenderGoal, ModelLoader<P>, RecognizeGender, ReloadModel>;

/// Assemble the recognition action on top of `predictor`.
pub fn gender_executor<P: Predictor>(
    predictor: Arc<P>,
    recognition: &RecognitionConfig,
    config: ExecutorConfig,
) -> Result<GenderExecutor<P>, ActionError> {
    let task = RecognizeGender::new(recognition.labels.clone(), recognition.input_size())?;
    Ok(
        ActionExecutor::new(ACTION_NAME, ModelLoader::new(predictor), task, config)
            .with_recovery(ReloadModel),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::inference::{InferenceError, ModelStatusResponse, ModelVersionStatus};
    use crate::state_machine::{FailureKind, State};

    /// Scores faces by brightness: dark faces lean to label 0, bright to label 1.
    struct MockPredictor {
        state: &'static str,
        failing_predictions: AtomicU32,
        status_calls: AtomicU32,
        batches: Mutex<Vec<usize>>,
    }

    impl MockPredictor {
        fn available() -> Self {
            Self::with_state("AVAILABLE", 0)
        }

        fn with_state(state: &'static str, failing_predictions: u32) -> Self {
            Self {
                state,
                failing_predictions: AtomicU32::new(failing_predictions),
                status_calls: AtomicU32::new(0),
                batches: Mutex::new(Vec::new()),
            }
        }
    }

    impl Predictor for MockPredictor {
        async fn model_status(&self) -> Result<ModelStatusResponse, InferenceError> {
            let call = self.status_calls.fetch_add(1, Ordering::SeqCst);
            Ok(ModelStatusResponse {
                model_version_status: vec![ModelVersionStatus {
                    version: (call + 1).to_string(),
                    state: self.state.to_string(),
                    status: Default::default(),
                }],
            })
        }

        async fn predict(
            &self,
            instances: Vec<FaceTensor>,
        ) -> Result<Vec<Vec<f32>>, InferenceError> {
            self.batches.lock().unwrap().push(instances.len());
            if self
                .failing_predictions
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(InferenceError::ApiError {
                    status: 503,
                    message: "overloaded".into(),
                });
            }
            Ok(instances
                .iter()
                .map(|face| {
                    let pixels: Vec<f32> = face.iter().flatten().map(|c| c[0]).collect();
                    let mean = pixels.iter().sum::<f32>() / pixels.len() as f32;
                    vec![1.0 - mean, mean]
                })
                .collect())
        }
    }

    fn labels() -> Vec<String> {
        vec!["female".to_string(), "male".to_string()]
    }

    /// 4x2 image: left half black, right half white.
    fn goal() -> GenderGoal {
        let mut data = Vec::new();
        for _row in 0..2 {
            data.extend_from_slice(&[0; 6]);
            data.extend_from_slice(&[255; 6]);
        }
        GenderGoal {
            image: BgrImage::new(4, 2, data).unwrap(),
            bounding_boxes: vec![
                BoundingBox {
                    x: 2,
                    y: 0,
                    width: 2,
                    height: 2,
                },
                BoundingBox {
                    x: 0,
                    y: 0,
                    width: 2,
                    height: 2,
                },
            ],
        }
    }

    fn recognition_config() -> RecognitionConfig {
        RecognitionConfig {
            labels: labels(),
            image_size: [3, 3],
            ..Default::default()
        }
    }

    fn executor(predictor: Arc<MockPredictor>, attempts: u32) -> GenderExecutor<MockPredictor> {
        gender_executor(
            predictor,
            &recognition_config(),
            ExecutorConfig {
                timeout: Duration::from_secs(5),
                max_recovery_attempts: attempts,
            },
        )
        .unwrap()
    }

    #[test]
    fn rejects_bad_task_configuration() {
        assert!(RecognizeGender::new(Vec::new(), (64, 64)).is_err());
        assert!(RecognizeGender::new(labels(), (0, 64)).is_err());
    }

    #[test]
    fn preprocess_resizes_every_face() {
        let task = RecognizeGender::new(labels(), (3, 3)).unwrap();
        let faces = task.preprocess(&goal()).unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0], vec![vec![[1.0]; 3]; 3]);
        assert_eq!(faces[1], vec![vec![[0.0]; 3]; 3]);
    }

    #[test]
    fn label_for_rejects_wrong_width() {
        let task = RecognizeGender::new(labels(), (3, 3)).unwrap();
        assert_eq!(task.label_for(&[0.2, 0.8]).unwrap(), "male");
        assert!(matches!(
            task.label_for(&[0.2, 0.3, 0.5]),
            Err(ActionError::Classification(_))
        ));
    }

    #[tokio::test]
    async fn labels_follow_bounding_box_order() {
        let predictor = Arc::new(MockPredictor::available());
        let mut executor = executor(Arc::clone(&predictor), 1);

        let result = executor.execute(goal()).await.unwrap();

        assert!(result.success);
        assert_eq!(
            result.payload,
            Some(vec!["male".to_string(), "female".to_string()])
        );
        assert_eq!(*predictor.batches.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn no_faces_yields_empty_labels() {
        let predictor = Arc::new(MockPredictor::available());
        let mut executor = executor(Arc::clone(&predictor), 1);
        let mut goal = goal();
        goal.bounding_boxes.clear();

        let result = executor.execute(goal).await.unwrap();

        assert!(result.success);
        assert_eq!(result.payload, Some(Vec::new()));
        assert!(predictor.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unavailable_model_fails_initialization() {
        let predictor = Arc::new(MockPredictor::with_state("LOADING", 0));
        let mut executor = executor(Arc::clone(&predictor), 3);

        let result = executor.execute(goal()).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.report.recovery_count, 0);
        assert_eq!(
            result.failure,
            Some(FailureKind::Initialization(
                "Model unavailable: version 1 is LOADING".into()
            ))
        );
        assert_eq!(predictor.status_calls.load(Ordering::SeqCst), 1);
        assert!(predictor.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn backend_hiccup_is_recovered_by_reload() {
        let predictor = Arc::new(MockPredictor::with_state("AVAILABLE", 1));
        let mut executor = executor(Arc::clone(&predictor), 1);

        let result = executor.execute(goal()).await.unwrap();

        assert!(result.success);
        assert_eq!(result.report.recovery_count, 1);
        assert_eq!(result.report.final_state, State::Done);
        // One status call to load, one to reload.
        assert_eq!(predictor.status_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn persistent_backend_failure_exhausts_budget() {
        let predictor = Arc::new(MockPredictor::with_state("AVAILABLE", 5));
        let mut executor = executor(Arc::clone(&predictor), 1);

        let result = executor.execute(goal()).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.report.recovery_count, 1);
        match result.failure {
            Some(FailureKind::Task(msg)) => assert!(msg.contains("overloaded"), "{msg}"),
            other => panic!("expected task failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_box_is_a_task_failure() {
        let predictor = Arc::new(MockPredictor::available());
        let mut executor = executor(Arc::clone(&predictor), 0);
        let mut goal = goal();
        goal.bounding_boxes.push(BoundingBox {
            x: 3,
            y: 1,
            width: 4,
            height: 4,
        });

        let result = executor.execute(goal).await.unwrap();

        assert!(matches!(result.failure, Some(FailureKind::Task(_))));
        assert!(predictor.batches.lock().unwrap().is_empty());
    }

    #[test]
    fn goal_deserializes_without_boxes() {
        let goal: GenderGoal =
            serde_json::from_str(r#"{"image": {"width": 1, "height": 1, "data": [1, 2, 3]}}"#)
                .unwrap();
        assert!(goal.bounding_boxes.is_empty());
        assert_eq!(goal.image.data, vec![1, 2, 3]);
    }
}

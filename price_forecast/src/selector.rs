//! Model selection
//!
//! Trains every registered model on the same series, scores each by its
//! held-out RMSE and forecasts with the lowest-scoring one. A model that fails
//! to train scores `+inf` and only the failure of all of them is an error.

use crate::config::{ForecastConfig, HISTORY_TAIL, MAX_HORIZON};
use crate::data::{HistoricalTail, PriceSeries};
use crate::error::{ForecastError, Result};
use crate::models::{
    check_forecast, ExponentialSmoothing, ForecastModel, ForecastResult, ModelKind,
    RandomForestModel, RecurrentModel,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Number of days to forecast, validated against an upper bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Horizon(usize);

impl Horizon {
    pub fn new(days: usize, max: usize) -> Result<Self> {
        if days == 0 || days > max {
            return Err(ForecastError::InvalidParameter(format!(
                "Horizon must be between 1 and {} days, got {}",
                max, days
            )));
        }
        Ok(Self(days))
    }

    pub fn days(&self) -> usize {
        self.0
    }
}

impl TryFrom<usize> for Horizon {
    type Error = ForecastError;

    fn try_from(days: usize) -> Result<Self> {
        Horizon::new(days, MAX_HORIZON)
    }
}

/// Validation score of one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub model: ModelKind,
    /// Held-out RMSE, `+inf` when training failed (`null` in JSON)
    #[serde(with = "rmse_or_null")]
    pub rmse: f64,
    /// Why training failed, if it did
    pub failure: Option<String>,
}

impl ModelScore {
    fn failed(model: ModelKind, reason: String) -> Self {
        Self {
            model,
            rmse: f64::INFINITY,
            failure: Some(reason),
        }
    }

    pub fn is_viable(&self) -> bool {
        self.rmse.is_finite()
    }
}

mod rmse_or_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(rmse: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if rmse.is_finite() {
            serializer.serialize_some(rmse)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

/// Scores of all registered models, in registration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub scores: Vec<ModelScore>,
}

impl EvaluationResult {
    pub fn get(&self, model: ModelKind) -> Option<f64> {
        self.scores.iter().find(|s| s.model == model).map(|s| s.rmse)
    }

    /// Position and score of the lowest finite RMSE. Earlier models win ties.
    pub fn best(&self) -> Option<(usize, &ModelScore)> {
        self.scores
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_viable())
            .fold(None, |best: Option<(usize, &ModelScore)>, (i, s)| match best {
                Some((_, b)) if s.rmse >= b.rmse => best,
                _ => Some((i, s)),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelScore> {
        self.scores.iter()
    }
}

impl fmt::Display for EvaluationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for score in &self.scores {
            match &score.failure {
                None => writeln!(f, "  {:<14} RMSE {:.4}", score.model.name(), score.rmse)?,
                Some(reason) => writeln!(f, "  {:<14} failed: {}", score.model.name(), reason)?,
            }
        }
        Ok(())
    }
}

/// Result of a selection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionOutcome {
    pub best: ModelKind,
    pub best_rmse: f64,
    pub scores: EvaluationResult,
    pub forecast: ForecastResult,
    pub history: HistoricalTail,
}

/// Trains the candidate models and forecasts with the best one
#[derive(Debug)]
pub struct ModelSelector {
    models: Vec<Box<dyn ForecastModel>>,
    parallel: bool,
    deadline: Option<Duration>,
    history_tail: usize,
}

impl ModelSelector {
    /// Register ETS, Random Forest and RNN, in that order
    pub fn new(config: &ForecastConfig) -> Result<Self> {
        let models: Vec<Box<dyn ForecastModel>> = vec![
            Box::new(ExponentialSmoothing::new(
                config.smoothing.clone(),
                config.split_ratio,
            )?),
            Box::new(RandomForestModel::new(
                config.regression.clone(),
                config.split_ratio,
            )?),
            Box::new(RecurrentModel::new(
                config.recurrent.clone(),
                config.split_ratio,
            )?),
        ];
        Self::with_models(config, models)
    }

    /// Use a custom candidate set; registration order is the tie-break order
    pub fn with_models(
        config: &ForecastConfig,
        models: Vec<Box<dyn ForecastModel>>,
    ) -> Result<Self> {
        config.validate()?;
        if models.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "At least one model must be registered".to_string(),
            ));
        }

        Ok(Self {
            models,
            parallel: config.parallel,
            deadline: config.training_deadline(),
            history_tail: config.history_tail,
        })
    }

    /// Smallest series any registered model accepts
    pub fn min_observations(&self) -> usize {
        self.models
            .iter()
            .map(|m| m.min_observations())
            .min()
            .unwrap_or(0)
    }

    pub fn kinds(&self) -> Vec<ModelKind> {
        self.models.iter().map(|m| m.kind()).collect()
    }

    /// Train every model and collect its validation score
    pub fn evaluate(&mut self, series: &PriceSeries) -> Result<EvaluationResult> {
        let started = Instant::now();
        let deadline = self.deadline;

        let scores: Vec<ModelScore> = if self.parallel {
            self.models
                .par_iter_mut()
                .map(|model| train_one(model.as_mut(), series))
                .collect()
        } else {
            let mut scores = Vec::with_capacity(self.models.len());
            for model in self.models.iter_mut() {
                check_deadline(started, deadline)?;
                scores.push(train_one(model.as_mut(), series));
            }
            scores
        };
        check_deadline(started, deadline)?;

        Ok(EvaluationResult { scores })
    }

    /// Evaluate all models, then forecast `horizon` days with the best one.
    ///
    /// A winner whose forecast fails or contains a non-positive price scores
    /// `+inf` and the next-best model forecasts instead.
    pub fn run(&mut self, series: &PriceSeries, horizon: Horizon) -> Result<SelectionOutcome> {
        let mut scores = self.evaluate(series)?;

        while let Some((index, best)) = scores.best().map(|(i, s)| (i, s.clone())) {
            info!(
                "Forecasting {} days with {} (RMSE={:.4})",
                horizon.days(),
                best.model,
                best.rmse
            );
            let forecast = self.models[index]
                .predict(horizon.days())
                .and_then(|values| check_forecast(best.model, &values).map(|_| values));

            match forecast {
                Ok(values) => {
                    info!("Best model: {} (RMSE={:.4})", best.model, best.rmse);
                    return Ok(SelectionOutcome {
                        best: best.model,
                        best_rmse: best.rmse,
                        scores,
                        forecast: ForecastResult::new(best.model, values),
                        history: series.tail(self.history_tail),
                    });
                }
                Err(e) => {
                    warn!("{} forecast rejected: {}", best.model, e);
                    scores.scores[index] =
                        ModelScore::failed(best.model, format!("forecast rejected: {}", e));
                }
            }
        }

        error!("No model produced a usable forecast");
        Err(ForecastError::NoViableModel(format!(
            "no model produced a usable forecast:\n{}",
            scores
        )))
    }
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self {
            models: vec![
                Box::new(ExponentialSmoothing::default()),
                Box::new(RandomForestModel::default()),
                Box::new(RecurrentModel::default()),
            ],
            parallel: false,
            deadline: None,
            history_tail: HISTORY_TAIL,
        }
    }
}

fn train_one(model: &mut dyn ForecastModel, series: &PriceSeries) -> ModelScore {
    let kind = model.kind();
    info!("Training model {}...", kind);

    match model.train(series) {
        Ok(rmse) if rmse.is_finite() && rmse >= 0.0 => {
            info!("{}: RMSE = {:.4}", kind, rmse);
            ModelScore {
                model: kind,
                rmse,
                failure: None,
            }
        }
        Ok(rmse) => {
            warn!("{}: unusable validation score {}", kind, rmse);
            ModelScore::failed(kind, format!("unusable validation score {}", rmse))
        }
        Err(e) if e.is_recoverable() => {
            warn!("{} excluded: {}", kind, e);
            ModelScore::failed(kind, e.to_string())
        }
        Err(e) => {
            error!("Error training {}: {}", kind, e);
            ModelScore::failed(kind, e.to_string())
        }
    }
}

fn check_deadline(started: Instant, deadline: Option<Duration>) -> Result<()> {
    match deadline {
        Some(limit) if started.elapsed() > limit => {
            error!("Training deadline of {:?} expired", limit);
            Err(ForecastError::NoViableModel(format!(
                "training did not finish within {:?}",
                limit
            )))
        }
        _ => Ok(()),
    }
}

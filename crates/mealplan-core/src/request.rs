//! Meal plan request parameters.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Baseline meals per day used to phrase the cuisine distribution.
pub const ESTIMATED_MEALS_PER_DAY: u32 = 3;

/// Rejections raised before any cache or LLM work happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("numberOfDays must be a positive integer")]
    ZeroDays,

    #[error("dailyCalories must be a positive integer")]
    ZeroCalories,
}

/// Parameters of a single meal plan request.
///
/// Field names follow the JSON contract used by the web frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub number_of_days: u32,
    pub daily_calories: u32,
    #[serde(default)]
    pub health_conditions: Vec<String>,
    /// Bare labels (`"Italian"`) or weighted labels (`"Mexican:30"`).
    #[serde(default)]
    pub cuisine_preferences: Vec<String>,
    #[serde(default)]
    pub include_cheat_meal: bool,
}

impl PlanRequest {
    /// Create a request with no health conditions, cuisines or cheat meal.
    pub fn new(number_of_days: u32, daily_calories: u32) -> Self {
        Self {
            number_of_days,
            daily_calories,
            health_conditions: Vec::new(),
            cuisine_preferences: Vec::new(),
            include_cheat_meal: false,
        }
    }

    /// Set the health condition labels.
    pub fn with_health_conditions<I, S>(mut self, conditions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.health_conditions = conditions.into_iter().map(Into::into).collect();
        self
    }

    /// Set the cuisine preferences.
    pub fn with_cuisines<I, S>(mut self, cuisines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cuisine_preferences = cuisines.into_iter().map(Into::into).collect();
        self
    }

    /// Include or exclude a cheat meal.
    pub fn with_cheat_meal(mut self, include: bool) -> Self {
        self.include_cheat_meal = include;
        self
    }

    /// Reject requests that can never produce a valid plan.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.number_of_days == 0 {
            return Err(RequestError::ZeroDays);
        }
        if self.daily_calories == 0 {
            return Err(RequestError::ZeroCalories);
        }
        Ok(())
    }

    /// Parsed cuisine preferences, in the order they were given.
    pub fn cuisines(&self) -> Vec<CuisinePreference> {
        self.cuisine_preferences
            .iter()
            .map(|raw| CuisinePreference::parse(raw))
            .filter(|pref| !pref.label.is_empty())
            .collect()
    }

    /// Meal count the distribution is phrased against.
    pub fn estimated_total_meals(&self) -> u32 {
        self.number_of_days.saturating_mul(ESTIMATED_MEALS_PER_DAY)
    }
}

/// A cuisine label with an optional share of the plan in percent.
#[derive(Debug, Clone, PartialEq)]
pub struct CuisinePreference {
    pub label: String,
    pub percentage: Option<f64>,
}

impl CuisinePreference {
    /// Parse `"label"` or `"label:percentage"`.
    ///
    /// A suffix that is not a finite, non-negative number stays part of the label.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let Some((label, pct)) = trimmed.rsplit_once(':') {
            let label = label.trim();
            if let Ok(value) = pct.trim().parse::<f64>() {
                if value.is_finite() && value >= 0.0 && !label.is_empty() {
                    return Self {
                        label: label.to_string(),
                        percentage: Some(value),
                    };
                }
            }
        }

        Self {
            label: trimmed.to_string(),
            percentage: None,
        }
    }

    pub fn is_weighted(&self) -> bool {
        self.percentage.is_some()
    }
}

impl fmt::Display for CuisinePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.percentage {
            Some(pct) => write!(f, "{}:{}", self.label, pct),
            None => write!(f, "{}", self.label),
        }
    }
}

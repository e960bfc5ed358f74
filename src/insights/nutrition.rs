//! Nutrition aggregates supplied by the food-log collaborator.

use serde::{Deserialize, Serialize};

/// Macro totals for a period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroTotals {
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

impl MacroTotals {
    /// Share of calories from protein, carbs and fat (4/4/9 kcal per gram).
    /// `None` when nothing was logged.
    pub fn energy_split(&self) -> Option<(f64, f64, f64)> {
        let protein = self.protein_g.max(0.0) * 4.0;
        let carbs = self.carbs_g.max(0.0) * 4.0;
        let fat = self.fat_g.max(0.0) * 9.0;
        let total = protein + carbs + fat;
        if total <= 0.0 || !total.is_finite() {
            return None;
        }
        Some((protein / total, carbs / total, fat / total))
    }
}

/// Daily targets set by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroGoals {
    pub calories: f64,
    pub protein_g: f64,
    #[serde(default)]
    pub water_ml: Option<f64>,
}

/// Read-only view of the user's log for insight generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionSnapshot {
    pub today: MacroTotals,
    pub today_meal_count: u32,
    pub weekly_average: MacroTotals,
    pub days_using_app: u32,
    pub logging_streak: u32,
    #[serde(default)]
    pub goals: Option<MacroGoals>,
    #[serde(default)]
    pub water_ml: Option<f64>,
    /// Local hour of day (0-23) the snapshot was taken.
    #[serde(default = "default_hour")]
    pub local_hour: u8,
}

fn default_hour() -> u8 {
    12
}

/// Pull-based provider of nutrition aggregates.
pub trait NutritionSource: Send + Sync {
    fn snapshot(&self) -> NutritionSnapshot;
}

impl NutritionSource for NutritionSnapshot {
    fn snapshot(&self) -> NutritionSnapshot {
        self.clone()
    }
}

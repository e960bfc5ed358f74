//! Rule-based insights used whenever the model path is unavailable.
//!
//! Total and I/O-free: any snapshot, including one full of zeros or NaNs,
//! yields between one and [`MAX_FALLBACK_INSIGHTS`] encouraging insights.

use super::nutrition::NutritionSnapshot;
use super::types::{Insight, InsightCategory, InsightSource};

/// Maximum number of fallback insights returned.
pub const MAX_FALLBACK_INSIGHTS: usize = 3;

/// Accounts younger than this get the onboarding message.
pub const ONBOARDING_DAYS: u32 = 3;

/// Streak length that earns a celebration.
pub const STREAK_THRESHOLD: u32 = 3;

const BELOW_PACE_RATIO: f64 = 0.8;
const ABOVE_PACE_RATIO: f64 = 1.3;

/// Generate fallback insights in rule priority order.
pub fn generate(snapshot: &NutritionSnapshot) -> Vec<Insight> {
    generate_focused(snapshot, None)
}

/// Like [`generate`], with insights of `focus` moved to the front before
/// the cap is applied.
pub fn generate_focused(snapshot: &NutritionSnapshot, focus: Option<InsightCategory>) -> Vec<Insight> {
    let mut insights: Vec<Insight> = [
        onboarding(snapshot),
        empty_day(snapshot),
        protein_pace(snapshot),
        streak(snapshot),
        macro_balance(snapshot),
        hydration(snapshot),
    ]
    .into_iter()
    .flatten()
    .collect();

    if insights.is_empty() {
        insights.push(general(snapshot));
    }
    if let Some(focus) = focus {
        // Stable: rule order is kept within each group.
        insights.sort_by_key(|insight| insight.category != focus);
    }
    insights.truncate(MAX_FALLBACK_INSIGHTS);
    insights
}

fn insight(rule: &str, category: InsightCategory, icon: &str, body: String) -> Insight {
    Insight {
        id: format!("fallback:{}", rule),
        category,
        icon: icon.to_string(),
        title: category.title().to_string(),
        body,
        source: InsightSource::Fallback,
    }
}

fn finite(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

fn onboarding(snapshot: &NutritionSnapshot) -> Option<Insight> {
    (snapshot.days_using_app < ONBOARDING_DAYS).then(|| {
        insight(
            "onboarding",
            InsightCategory::Onboarding,
            "👋",
            "Welcome aboard. Log a few meals over the next couple of days and personal observations will start to show up here."
                .to_string(),
        )
    })
}

fn empty_day(snapshot: &NutritionSnapshot) -> Option<Insight> {
    if snapshot.today_meal_count > 0 {
        return None;
    }
    let body = if snapshot.local_hour < 11 {
        "Nothing logged yet today. Adding breakfast gives the day a starting point."
    } else {
        "Nothing logged yet today. Your first entry, even a quick snack, gives the day a starting point."
    };
    Some(insight("empty-day", InsightCategory::General, "🍽️", body.to_string()))
}

/// Share of the daily target expected by `hour`, from 06:00 to 21:00.
fn expected_day_fraction(hour: u8) -> f64 {
    ((f64::from(hour) - 6.0) / 15.0).clamp(0.2, 1.0)
}

fn protein_target(snapshot: &NutritionSnapshot) -> Option<f64> {
    let goal = snapshot.goals.map(|g| finite(g.protein_g)).unwrap_or(0.0);
    if goal > 0.0 {
        return Some(goal);
    }
    let average = finite(snapshot.weekly_average.protein_g);
    (average > 0.0).then_some(average)
}

fn protein_pace(snapshot: &NutritionSnapshot) -> Option<Insight> {
    if snapshot.today_meal_count == 0 {
        return None;
    }
    let target = protein_target(snapshot)?;
    let eaten = finite(snapshot.today.protein_g);
    let expected = target * expected_day_fraction(snapshot.local_hour);
    let ratio = eaten / expected;

    if ratio < BELOW_PACE_RATIO {
        Some(insight(
            "protein-below-pace",
            InsightCategory::Protein,
            "🥚",
            format!(
                "You're at {:.0} g of protein so far, a little under your usual pace for this time of day. A protein-rich snack could help close the gap.",
                eaten
            ),
        ))
    } else if ratio > ABOVE_PACE_RATIO {
        Some(insight(
            "protein-above-pace",
            InsightCategory::Protein,
            "💪",
            format!(
                "Protein is running ahead of pace at {:.0} g. Later meals can lean on vegetables and whole grains for balance.",
                eaten
            ),
        ))
    } else {
        None
    }
}

fn streak(snapshot: &NutritionSnapshot) -> Option<Insight> {
    (snapshot.logging_streak >= STREAK_THRESHOLD).then(|| {
        insight(
            "streak",
            InsightCategory::Consistency,
            "🔥",
            format!(
                "{} days in a row of logging. Consistency like this makes every other trend easier to see.",
                snapshot.logging_streak
            ),
        )
    })
}

fn macro_balance(snapshot: &NutritionSnapshot) -> Option<Insight> {
    if snapshot.today_meal_count == 0 {
        return None;
    }
    let (protein, carbs, fat) = snapshot.today.energy_split()?;
    let body = if carbs > 0.6 {
        format!(
            "About {:.0}% of today's energy came from carbs. Pairing the next meal with some protein or healthy fat can keep energy steadier.",
            carbs * 100.0
        )
    } else if fat > 0.45 {
        format!(
            "Fat made up about {:.0}% of today's energy. Adding fruit, grains or lean protein later would round things out.",
            fat * 100.0
        )
    } else if (0.15..=0.35).contains(&protein) && (0.35..=0.6).contains(&carbs) {
        "Today's macros are nicely balanced across protein, carbs and fat.".to_string()
    } else {
        return None;
    };
    Some(insight("macro-balance", InsightCategory::MacroBalance, "⚖️", body))
}

fn hydration(snapshot: &NutritionSnapshot) -> Option<Insight> {
    let goal = finite(snapshot.goals.and_then(|g| g.water_ml)?);
    if goal <= 0.0 {
        return None;
    }
    let drunk = finite(snapshot.water_ml.unwrap_or(0.0));
    let ratio = drunk / goal;
    if ratio >= 1.0 {
        Some(insight(
            "hydration-goal-met",
            InsightCategory::Hydration,
            "💧",
            format!("Water goal reached with {:.0} ml logged today.", drunk),
        ))
    } else if ratio < 0.5 && snapshot.local_hour >= 12 {
        Some(insight(
            "hydration-reminder",
            InsightCategory::Hydration,
            "💧",
            format!(
                "{:.0} ml of water logged so far. A glass with your next meal is an easy way to catch up.",
                drunk
            ),
        ))
    } else {
        None
    }
}

fn general(snapshot: &NutritionSnapshot) -> Insight {
    let meals = snapshot.today_meal_count;
    let noun = if meals == 1 { "meal" } else { "meals" };
    insight(
        "steady-day",
        InsightCategory::General,
        "📈",
        format!("{} {} logged today. Keep going and clearer patterns will emerge over the week.", meals, noun),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::nutrition::{MacroGoals, MacroTotals};

    fn established() -> NutritionSnapshot {
        NutritionSnapshot {
            today: MacroTotals { calories: 1500.0, protein_g: 80.0, carbs_g: 170.0, fat_g: 50.0 },
            today_meal_count: 3,
            weekly_average: MacroTotals { calories: 2000.0, protein_g: 100.0, carbs_g: 230.0, fat_g: 65.0 },
            days_using_app: 30,
            logging_streak: 0,
            goals: None,
            water_ml: None,
            local_hour: 18,
        }
    }

    #[test]
    fn expected_fraction_is_clamped() {
        assert_eq!(expected_day_fraction(0), 0.2);
        assert_eq!(expected_day_fraction(23), 1.0);
        assert!((expected_day_fraction(12) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn goal_takes_precedence_over_weekly_average() {
        let mut snapshot = established();
        snapshot.goals = Some(MacroGoals { calories: 2200.0, protein_g: 150.0, water_ml: None });
        assert_eq!(protein_target(&snapshot), Some(150.0));
        snapshot.goals = None;
        assert_eq!(protein_target(&snapshot), Some(100.0));
    }

    #[test]
    fn non_finite_values_do_not_panic() {
        let mut snapshot = established();
        snapshot.today.protein_g = f64::NAN;
        snapshot.weekly_average.protein_g = f64::INFINITY;
        let insights = generate(&snapshot);
        assert!(!insights.is_empty());
        assert!(insights.len() <= MAX_FALLBACK_INSIGHTS);
    }

    #[test]
    fn hydration_reminder_after_noon() {
        let mut snapshot = established();
        snapshot.goals = Some(MacroGoals { calories: 2000.0, protein_g: 0.0, water_ml: Some(2000.0) });
        snapshot.water_ml = Some(400.0);
        let reminder = hydration(&snapshot).unwrap();
        assert_eq!(reminder.id, "fallback:hydration-reminder");
        snapshot.local_hour = 9;
        assert!(hydration(&snapshot).is_none());
    }

    #[test]
    fn general_insight_when_no_rule_fires() {
        let mut snapshot = established();
        snapshot.today = MacroTotals { calories: 1500.0, protein_g: 75.0, carbs_g: 100.0, fat_g: 60.0 };
        let insights = generate(&snapshot);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].id, "fallback:steady-day");
    }
}

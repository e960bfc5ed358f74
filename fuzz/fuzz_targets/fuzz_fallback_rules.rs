//! Fuzz target for the fallback insight rules.
//!
//! Any snapshot, including NaN and infinite totals, must yield between one
//! and three insights without panicking.

#![no_main]

use arbitrary::Arbitrary;
use insight_core::insights::fallback::{generate_focused, MAX_FALLBACK_INSIGHTS};
use insight_core::insights::{InsightCategory, MacroGoals, MacroTotals, NutritionSnapshot};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    today: [f64; 4],
    week: [f64; 4],
    meals: u32,
    days: u32,
    streak: u32,
    goals: Option<(f64, f64, Option<f64>)>,
    water: Option<f64>,
    hour: u8,
    focus: Option<u8>,
}

fn totals(values: [f64; 4]) -> MacroTotals {
    MacroTotals { calories: values[0], protein_g: values[1], carbs_g: values[2], fat_g: values[3] }
}

fuzz_target!(|input: Input| {
    let snapshot = NutritionSnapshot {
        today: totals(input.today),
        today_meal_count: input.meals,
        weekly_average: totals(input.week),
        days_using_app: input.days,
        logging_streak: input.streak,
        goals: input
            .goals
            .map(|(calories, protein_g, water_ml)| MacroGoals { calories, protein_g, water_ml }),
        water_ml: input.water,
        local_hour: input.hour,
    };
    let focus = input
        .focus
        .map(|i| InsightCategory::ALL[usize::from(i) % InsightCategory::ALL.len()]);

    let insights = generate_focused(&snapshot, focus);
    assert!(!insights.is_empty());
    assert!(insights.len() <= MAX_FALLBACK_INSIGHTS);
    assert_eq!(insights, generate_focused(&snapshot, focus));
});

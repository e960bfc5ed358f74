//! Prompt text for the model path.

use std::fmt::Write as _;

use super::nutrition::NutritionSnapshot;
use super::types::{InsightCategory, InsightRequest};

const BASE_SYSTEM_PROMPT: &str = "You are a supportive nutrition companion inside a food-logging app. \
Write one short observation about the user's eating today. \
Start with exactly one emoji, then at most three plain sentences. \
Be warm and specific, never judgmental. Do not use exclamation marks. \
Do not give medical advice or mention weight loss.";

/// System prompt, optionally steered towards one category.
pub fn system_prompt(request: &InsightRequest) -> String {
    let mut prompt = BASE_SYSTEM_PROMPT.to_string();
    if let Some(focus) = request.focus {
        let _ = write!(prompt, " Focus on {}.", focus_phrase(focus));
    }
    prompt
}

fn focus_phrase(category: InsightCategory) -> &'static str {
    match category {
        InsightCategory::MacroBalance => "the balance between protein, carbs and fat",
        InsightCategory::Protein => "protein intake and pacing through the day",
        InsightCategory::Consistency => "logging consistency and habits",
        InsightCategory::Hydration => "water intake",
        InsightCategory::Onboarding => "getting started with logging",
        InsightCategory::General => "the day as a whole",
    }
}

/// User turn carrying today's numbers.
pub fn user_message(snapshot: &NutritionSnapshot) -> String {
    let today = &snapshot.today;
    let week = &snapshot.weekly_average;
    let mut message = String::with_capacity(320);
    let _ = writeln!(message, "Local time: {:02}:00", snapshot.local_hour.min(23));
    let _ = writeln!(
        message,
        "Today ({} meals): {:.0} kcal, {:.0} g protein, {:.0} g carbs, {:.0} g fat",
        snapshot.today_meal_count, today.calories, today.protein_g, today.carbs_g, today.fat_g
    );
    let _ = writeln!(
        message,
        "7-day average: {:.0} kcal, {:.0} g protein, {:.0} g carbs, {:.0} g fat",
        week.calories, week.protein_g, week.carbs_g, week.fat_g
    );
    if let Some(goals) = snapshot.goals {
        let _ = writeln!(message, "Goals: {:.0} kcal, {:.0} g protein", goals.calories, goals.protein_g);
        if let (Some(target), Some(drunk)) = (goals.water_ml, snapshot.water_ml) {
            let _ = writeln!(message, "Water: {:.0} of {:.0} ml", drunk, target);
        }
    }
    let _ = writeln!(message, "Logging streak: {} days", snapshot.logging_streak);
    let _ = write!(message, "Days using the app: {}", snapshot.days_using_app);
    message
}

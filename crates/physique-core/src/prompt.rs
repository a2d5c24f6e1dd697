use crate::plan::{ASSESSMENT_HEADER, DIET_HEADER, WORKOUT_HEADER};
use crate::profile::UserProfile;

/// Build the single instruction sent with the photos.
pub fn build_plan_prompt(profile: &UserProfile) -> String {
    let mut prompt = String::new();

    prompt.push_str("Quickly analyze physique and provide in Markdown:\n");
    prompt.push_str(&format!("Goal: {}\n", profile.goal().display_name()));
    prompt.push_str(&format!("Height: {}cm\n", profile.height_cm()));
    prompt.push_str(&format!("Weight: {}kg\n", profile.weight_kg()));
    prompt.push_str(&format!("Age: {}\n", profile.age()));

    prompt.push_str("Return:\n");
    prompt.push_str(ASSESSMENT_HEADER);
    prompt.push_str("\n[Brief physique assessment]\n");
    prompt.push_str(DIET_HEADER);
    prompt.push_str("\n[Simple daily diet plan]\n");
    prompt.push_str(WORKOUT_HEADER);
    prompt.push_str("\n[Basic weekly workout]");

    prompt
}

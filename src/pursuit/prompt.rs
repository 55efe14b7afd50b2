//! Fixed prompts sent to the vision model
//!
//! The navigation prompt is an external contract: the advice parser expects
//! exactly the five labelled lines it asks for.

/// Navigation prompt; `{goal}` is replaced with the goal object
pub const NAVIGATION_PROMPT_TEMPLATE: &str = r#"
You are the navigation AI for a robot that is 25cm wide. Your task is to guide it to the GOAL OBJECT.
Analyze the current view and provide the following information, each on a new line:
1. GOAL VISIBLE: [Yes/No]
2. GOAL DIRECTION: [Not Visible/Center/Slightly Left/Slightly Right/Far Left/Far Right]
3. GOAL PROXIMITY: [Not Visible/Reachable/Very Close/Near/Medium/Far]
4. PATH STATUS: [Clear/Minor Obstacle/Major Obstacle/Blocked]
5. OBSTACLE INFO: [Describe briefly if Minor or Major Obstacle, otherwise "None"]

Prioritize reaching the GOAL OBJECT safely. Be very concise and follow the format precisely.
Only consider obstacles directly in the robot's 25cm path.
GOAL OBJECT: {goal}
"#;

/// One-shot scene description used before a pursuit starts
pub const SCENE_PROMPT: &str = r#"
You are the vision system of a robot. Describe the scene in front of you.
Say exactly: I see the following elements: [list up to 5 distinct objects].
The closest object appears to be [closest object]. The furthest object appears to be [furthest object].
Example: I see the following elements: a red ball, a blue box, a yellow chair. The closest object appears to be a red ball. The furthest object appears to be a yellow chair.
"#;

/// Fill the navigation template for one goal
pub fn navigation_prompt(goal_object: &str) -> String {
    NAVIGATION_PROMPT_TEMPLATE.replace("{goal}", goal_object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_prompt_names_goal() {
        let prompt = navigation_prompt("red ball");
        assert!(prompt.trim_end().ends_with("GOAL OBJECT: red ball"));
        assert!(!prompt.contains("{goal}"));
    }

    #[test]
    fn test_navigation_prompt_lists_five_fields() {
        let prompt = navigation_prompt("cup");
        for label in [
            "1. GOAL VISIBLE:",
            "2. GOAL DIRECTION:",
            "3. GOAL PROXIMITY:",
            "4. PATH STATUS:",
            "5. OBSTACLE INFO:",
        ] {
            assert!(prompt.contains(label), "missing {}", label);
        }
        assert!(prompt.contains("25cm wide"));
    }
}

//! Structured observations and the advice parser
//!
//! The model answers in five labelled lines. Parsing is line based,
//! case-insensitive and never fails: anything missing falls back to the
//! most cautious value (goal not visible, path blocked).
//!
//! ```text
//! 1. GOAL VISIBLE: Yes            → goal_visible = true
//! 2. GOAL DIRECTION: Slightly Left → GoalDirection::SlightlyLeft
//! 3. GOAL PROXIMITY: Near          → GoalProximity::Near
//! 4. PATH STATUS: Clear            → PathStatus::Clear
//! 5. OBSTACLE INFO: None           → "none"
//! ```

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Sentinel stored in `obstacle_info` when nothing is reported
pub const NO_OBSTACLE: &str = "none";

/// Forward duration for a proximity outside the known table
const UNKNOWN_PROXIMITY_FORWARD: Duration = Duration::from_millis(900);

/// Collapse case, underscores, hyphens, repeated spaces and trailing
/// punctuation so "Very_Close." and "very close" compare equal
fn canonical(value: &str) -> String {
    value
        .trim()
        .trim_end_matches(['.', '!', ','])
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Where the goal appears in the frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalDirection {
    NotVisible,
    Center,
    SlightlyLeft,
    SlightlyRight,
    FarLeft,
    FarRight,
    /// Text outside the permitted values, kept verbatim (lower-cased)
    Other(String),
}

impl GoalDirection {
    pub fn from_text(value: &str) -> Self {
        match canonical(value).as_str() {
            "not visible" => GoalDirection::NotVisible,
            "center" | "centre" => GoalDirection::Center,
            "slightly left" => GoalDirection::SlightlyLeft,
            "slightly right" => GoalDirection::SlightlyRight,
            "far left" => GoalDirection::FarLeft,
            "far right" => GoalDirection::FarRight,
            _ => GoalDirection::Other(value.trim().to_lowercase()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            GoalDirection::NotVisible => "not visible",
            GoalDirection::Center => "center",
            GoalDirection::SlightlyLeft => "slightly left",
            GoalDirection::SlightlyRight => "slightly right",
            GoalDirection::FarLeft => "far left",
            GoalDirection::FarRight => "far right",
            GoalDirection::Other(text) => text,
        }
    }

    /// True for the two "slightly" variants
    pub fn is_slight(&self) -> bool {
        matches!(self, GoalDirection::SlightlyLeft | GoalDirection::SlightlyRight)
    }
}

impl Default for GoalDirection {
    fn default() -> Self {
        GoalDirection::NotVisible
    }
}

impl fmt::Display for GoalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far away the goal looks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalProximity {
    NotVisible,
    Reachable,
    VeryClose,
    Near,
    Medium,
    Far,
    Other(String),
}

impl GoalProximity {
    pub fn from_text(value: &str) -> Self {
        match canonical(value).as_str() {
            "not visible" => GoalProximity::NotVisible,
            "reachable" => GoalProximity::Reachable,
            "very close" => GoalProximity::VeryClose,
            "near" => GoalProximity::Near,
            "medium" => GoalProximity::Medium,
            "far" => GoalProximity::Far,
            _ => GoalProximity::Other(value.trim().to_lowercase()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            GoalProximity::NotVisible => "not visible",
            GoalProximity::Reachable => "reachable",
            GoalProximity::VeryClose => "very close",
            GoalProximity::Near => "near",
            GoalProximity::Medium => "medium",
            GoalProximity::Far => "far",
            GoalProximity::Other(text) => text,
        }
    }

    /// Close enough to call the pursuit a success
    pub fn is_reached(&self) -> bool {
        matches!(self, GoalProximity::Reachable | GoalProximity::VeryClose)
    }

    /// How long to drive forward toward a goal at this distance
    pub fn forward_duration(&self) -> Duration {
        match self {
            GoalProximity::VeryClose => Duration::from_millis(1200),
            GoalProximity::Reachable => Duration::from_millis(1600),
            GoalProximity::Near => Duration::from_millis(2000),
            GoalProximity::Medium => Duration::from_millis(2200),
            GoalProximity::Far => Duration::from_millis(2400),
            GoalProximity::NotVisible | GoalProximity::Other(_) => UNKNOWN_PROXIMITY_FORWARD,
        }
    }
}

impl Default for GoalProximity {
    fn default() -> Self {
        GoalProximity::NotVisible
    }
}

impl fmt::Display for GoalProximity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the robot's own path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStatus {
    Clear,
    MinorObstacle,
    MajorObstacle,
    Blocked,
    Other(String),
}

impl PathStatus {
    pub fn from_text(value: &str) -> Self {
        match canonical(value).as_str() {
            "clear" => PathStatus::Clear,
            "minor obstacle" => PathStatus::MinorObstacle,
            "major obstacle" => PathStatus::MajorObstacle,
            "blocked" => PathStatus::Blocked,
            _ => PathStatus::Other(value.trim().to_lowercase()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PathStatus::Clear => "clear",
            PathStatus::MinorObstacle => "minor obstacle",
            PathStatus::MajorObstacle => "major obstacle",
            PathStatus::Blocked => "blocked",
            PathStatus::Other(text) => text,
        }
    }

    /// Major obstacle or fully blocked
    pub fn is_obstructed(&self) -> bool {
        matches!(self, PathStatus::MajorObstacle | PathStatus::Blocked)
    }
}

impl Default for PathStatus {
    fn default() -> Self {
        PathStatus::Blocked
    }
}

impl fmt::Display for PathStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step's interpretation of the model's advice
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub goal_visible: bool,
    pub goal_direction: GoalDirection,
    pub goal_proximity: GoalProximity,
    pub path_status: PathStatus,
    /// Free text, [`NO_OBSTACLE`] when nothing was reported
    pub obstacle_info: String,
}

impl Default for Observation {
    fn default() -> Self {
        Self {
            goal_visible: false,
            goal_direction: GoalDirection::default(),
            goal_proximity: GoalProximity::default(),
            path_status: PathStatus::default(),
            obstacle_info: NO_OBSTACLE.to_string(),
        }
    }
}

impl Observation {
    /// Sentence narrated after each parsed step
    pub fn summary(&self) -> String {
        let mut summary = if self.goal_visible {
            format!(
                "Goal is visible. It's {} and {}. ",
                self.goal_direction, self.goal_proximity
            )
        } else {
            "Goal is not visible. ".to_string()
        };

        summary.push_str(&format!("Path is {}", self.path_status));
        let info = self.obstacle_info.trim();
        if self.path_status.as_str().contains("obstacle") && !info.is_empty() && info != NO_OBSTACLE {
            summary.push_str(&format!(" with {}", info));
        }
        summary.push('.');
        summary
    }
}

/// Why a parse fell back to defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseIssue {
    /// The advice text was empty or whitespace
    Empty,
    /// No "goal visible" line was found
    VisibilityUndetermined,
}

impl ParseIssue {
    /// Warning for the narrator
    pub fn narration(&self) -> &'static str {
        match self {
            ParseIssue::Empty => "I had trouble understanding the scene analysis.",
            ParseIssue::VisibilityUndetermined => {
                "My analysis about goal visibility was incomplete. Assuming not visible."
            }
        }
    }
}

/// Result of [`parse`]: always a complete observation, plus an optional warning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAdvice {
    pub observation: Observation,
    pub issue: Option<ParseIssue>,
}

impl ParsedAdvice {
    pub fn is_complete(&self) -> bool {
        self.issue.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Visible,
    Direction,
    Proximity,
    Path,
    Obstacle,
}

/// Label and declared number of every field
const FIELDS: [(Field, &str, u32); 5] = [
    (Field::Visible, "goal visible", 1),
    (Field::Direction, "goal direction", 2),
    (Field::Proximity, "goal proximity", 3),
    (Field::Path, "path status", 4),
    (Field::Obstacle, "obstacle info", 5),
];

/// Split "3. rest" / "3) rest" into (Some(3), "rest")
fn split_number(line: &str) -> (Option<u32>, &str) {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return (None, line);
    }
    let rest = &line[digits..];
    match rest.strip_prefix(['.', ')']) {
        Some(rest) => (line[..digits].parse().ok(), rest.trim_start()),
        None => (None, line),
    }
}

/// Recognise one labelled line, returning the field and its raw value
fn match_line(line: &str) -> Option<(Field, String)> {
    let lowered = line.trim().to_lowercase();
    let unbulleted = lowered
        .trim_start_matches(['-', '*', '•', '#'])
        .trim_start();
    let (number, body) = split_number(unbulleted);
    let body = body.trim_start_matches('*');

    FIELDS.iter().find_map(|(field, label, declared)| {
        if number.is_some_and(|n| n != *declared) {
            return None;
        }
        let after = body.strip_prefix(label)?;
        let after = after.trim_start_matches('*').trim_start();
        let value = after.strip_prefix(':')?;
        let value = value.trim().trim_matches('*').trim();
        Some((*field, value.to_string()))
    })
}

/// Convert free-text model advice into an [`Observation`]
///
/// Never fails. Later lines for the same field override earlier ones.
pub fn parse(raw_text: &str) -> ParsedAdvice {
    let mut observation = Observation::default();

    if raw_text.trim().is_empty() {
        return ParsedAdvice {
            observation,
            issue: Some(ParseIssue::Empty),
        };
    }

    let mut visible = None;
    for line in raw_text.lines() {
        let Some((field, value)) = match_line(line) else {
            continue;
        };
        match field {
            Field::Visible => visible = Some(value.contains("yes")),
            Field::Direction => observation.goal_direction = GoalDirection::from_text(&value),
            Field::Proximity => observation.goal_proximity = GoalProximity::from_text(&value),
            Field::Path => observation.path_status = PathStatus::from_text(&value),
            Field::Obstacle => observation.obstacle_info = value,
        }
    }

    observation.goal_visible = visible.unwrap_or(false);
    ParsedAdvice {
        observation,
        issue: visible.is_none().then_some(ParseIssue::VisibilityUndetermined),
    }
}

//! Follow-up questions while a session collects information

use serde::{Deserialize, Serialize};

use crate::domain::{DraftField, TripDraft};

/// The next question to ask and suggested answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUp {
    /// Field the question fills; `None` once everything required is known
    pub field: Option<DraftField>,
    pub question: String,
    pub quick_replies: Vec<String>,
}

fn replies(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Ask for the first missing required field
///
/// Once every required field is known, a draft without an explicit total
/// gets the optional budget question instead.
pub fn followup_for(draft: &TripDraft) -> FollowUp {
    let Some(field) = draft.missing_fields().into_iter().next() else {
        if draft.budget_total.is_none() {
            return budget_followup();
        }
        return FollowUp {
            field: None,
            question: "Perfect! I have all the information I need to start planning your trip. Let me craft your perfect itinerary!".to_string(),
            quick_replies: replies(&["Show me the plan", "Modify details", "Start over"]),
        };
    };

    let places = ["I have a destination in mind", "Show me options", "Help me decide", "Tell me more"];
    let (question, quick_replies) = match field {
        DraftField::Origin => ("Where are you traveling from?".to_string(), replies(&places)),
        DraftField::Destination => ("Where would you like to go?".to_string(), replies(&places)),
        DraftField::Dates => (
            "When would you like to travel?".to_string(),
            replies(&["Next month", "Summer vacation", "Holiday season", "Flexible dates"]),
        ),
        DraftField::Travelers => {
            let question = match draft.destination.as_deref() {
                Some(dest) if !dest.trim().is_empty() => format!(
                    "Great choice! {} is amazing. How many people will be joining this adventure?",
                    dest.trim()
                ),
                _ => "Who's joining your adventure?".to_string(),
            };
            (
                question,
                replies(&["Solo explorer", "Romantic duo", "Family trip", "Friend squad"]),
            )
        }
        other => (
            format!("Please provide {}", other),
            replies(&["Tell me more", "Help me decide", "Show me options"]),
        ),
    };
    FollowUp {
        field: Some(field),
        question,
        quick_replies,
    }
}

fn budget_followup() -> FollowUp {
    FollowUp {
        field: Some(DraftField::Tier),
        question: "What's your budget preference for this trip?".to_string(),
        quick_replies: replies(&[
            "Budget-friendly ($50-100/day)",
            "Moderate ($100-300/day)",
            "Luxury ($300+/day)",
        ]),
    }
}

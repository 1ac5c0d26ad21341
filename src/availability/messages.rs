/// Status lines shown while the backend wakes up, in display order.
pub const WAKE_MESSAGES: &[&str] = &[
    "Waking up the kitchen server...",
    "Preheating the oven...",
    "Sharpening the knives...",
    "Gathering fresh ingredients...",
    "Dusting off the recipe books...",
    "Stirring the database soup...",
    "Tasting the sauce one more time...",
    "Plating up your recipes...",
];

/// Message for a rotation index; wraps around the list.
pub fn message_at(index: usize) -> &'static str {
    WAKE_MESSAGES[index % WAKE_MESSAGES.len()]
}

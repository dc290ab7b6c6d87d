//! Prompt templates for the two model roles.
//!
//! The fixed instruction bodies live in `prompts/*.txt`; these helpers splice
//! in the per-session and per-turn values. The exact wording is part of the
//! system's behavior, so the templates change meaning if edited.

/// Assistant prefill the narrator continues from.
pub const NARRATOR_PREFILL: &str = "Narrator:\n<Narration>";

/// Assistant prefill the compactor continues from.
pub const COMPACTOR_PREFILL: &str = "<New context>MAP JSON:";

/// System prompt for a narration call: role instructions for the given
/// setting and language, with the current world context appended.
pub fn narrator_system(setting: &str, language: &str, context: &str) -> String {
    let mut prompt = format!(
        "You are an AI Dungeon Master / narrator for an RPG game set in {setting}.\n"
    );
    prompt.push_str(include_str!("prompts/narrator.txt"));
    prompt.push_str(&format!("Speak {language} language."));
    prompt.push_str(" Context: ");
    prompt.push_str(context);
    prompt
}

/// User message for a narration call.
pub fn narrator_user(input: &str, interaction: u32) -> String {
    format!("{input} This is interaction number {interaction} with player.")
}

/// System prompt for a compaction call.
pub fn compactor_system() -> &'static str {
    include_str!("prompts/compactor.txt")
}

/// User message for a compaction call: previous context, this turn's
/// narration and the player's input, each in its own tag.
pub fn compactor_user(context: &str, narration: &str, input: &str) -> String {
    format!(
        "<Previous context>ITEMS: {context}</Previous context>\n<Narration>{narration}</Narration>\n\n<Player input>{input}</Player input>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrator_system_layout() {
        let prompt = narrator_system("Ancient Greece", "Greek", "ITEMS: sandals");

        assert!(prompt.starts_with(
            "You are an AI Dungeon Master / narrator for an RPG game set in Ancient Greece.\n"
        ));
        assert!(prompt.contains("less than 130 words"));
        assert!(prompt.contains("Speak Greek language."));
        assert!(prompt.ends_with(" Context: ITEMS: sandals"));
    }

    #[test]
    fn test_narrator_user_quotes_interaction_number() {
        assert_eq!(
            narrator_user("Open the door.", 3),
            "Open the door. This is interaction number 3 with player."
        );
    }

    #[test]
    fn test_compactor_system_is_fixed() {
        let prompt = compactor_system();
        assert!(prompt.starts_with("You are an AI context rememberer"));
        assert!(prompt.contains("within 900 words"));
        assert!(prompt.contains("DON'T ADVANCE CONVERSATIONS"));
    }

    #[test]
    fn test_compactor_user_embeds_all_three_verbatim() {
        let user = compactor_user("old context", "You see a door.", "open it");
        assert_eq!(
            user,
            "<Previous context>ITEMS: old context</Previous context>\n\
             <Narration>You see a door.</Narration>\n\n\
             <Player input>open it</Player input>"
        );
    }

    #[test]
    fn test_prefills() {
        assert_eq!(NARRATOR_PREFILL, "Narrator:\n<Narration>");
        assert_eq!(COMPACTOR_PREFILL, "<New context>MAP JSON:");
    }
}

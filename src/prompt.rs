//! Provider-agnostic prompt assembly.
//!
//! Turns a character profile plus bounded conversation history into a
//! `CanonicalPrompt`: one system string, an ordered list of labelled turns,
//! and the new utterance as the final to-answer line. Only the trailing N
//! turns survive; older context is dropped, not summarized, so callers must
//! not assume unlimited memory.

use serde::{Deserialize, Serialize};

use crate::character::CharacterProfile;

/// One message in a conversation, ordered by creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub content: String,
    pub is_user: bool,
}

impl Turn {
    pub fn user(content: &str) -> Self {
        Self { content: content.to_string(), is_user: true }
    }

    pub fn assistant(content: &str) -> Self {
        Self { content: content.to_string(), is_user: false }
    }
}

/// How the context is framed for the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVariant {
    /// Last 10 turns, assistant speaks as a generic "You".
    Generic,
    /// Last 8 turns, assistant speaks under the character's own name, with
    /// stricter roleplay ground rules.
    Character,
}

impl PromptVariant {
    /// How many trailing turns of history are retained.
    pub fn history_window(&self) -> usize {
        match self {
            PromptVariant::Generic => 10,
            PromptVariant::Character => 8,
        }
    }
}

/// Speaker label for the user side of the transcript.
pub const USER_LABEL: &str = "User";

/// A fully assembled, provider-agnostic generation request.
#[derive(Debug, Clone)]
pub struct CanonicalPrompt {
    /// System prompt establishing the character.
    pub system: String,
    /// Bounded history, oldest first: (speaker label, is_user, text).
    pub turns: Vec<PromptTurn>,
    /// The new utterance to answer.
    pub user_text: String,
    /// Label the assistant's reply is expected under ("You" or the
    /// character's name).
    pub reply_label: String,
}

/// One labelled turn inside a canonical prompt.
#[derive(Debug, Clone)]
pub struct PromptTurn {
    pub speaker: String,
    pub is_user: bool,
    pub text: String,
}

impl CanonicalPrompt {
    /// Render the transcript as one speaker-prefixed text block ending with
    /// the to-answer cue line. Shared by the backends that take a single
    /// prompt string rather than a role-tagged message list.
    pub fn flatten(&self) -> String {
        let mut block = String::new();
        for turn in &self.turns {
            block.push_str(&turn.speaker);
            block.push_str(": ");
            block.push_str(&turn.text);
            block.push('\n');
        }
        block.push_str(USER_LABEL);
        block.push_str(": ");
        block.push_str(&self.user_text);
        block.push('\n');
        block.push_str(&self.reply_label);
        block.push(':');
        block
    }
}

/// Build a canonical prompt for one generation call. Pure transformation.
pub fn build_prompt(
    character: &CharacterProfile,
    history: &[Turn],
    user_text: &str,
    variant: PromptVariant,
) -> CanonicalPrompt {
    let (system, reply_label) = match variant {
        PromptVariant::Generic => (generic_system(character), "You".to_string()),
        PromptVariant::Character => (character_system(character), character.name.clone()),
    };

    let window = variant.history_window();
    let start = history.len().saturating_sub(window);
    let turns = history[start..]
        .iter()
        .map(|t| PromptTurn {
            speaker: if t.is_user { USER_LABEL.to_string() } else { reply_label.clone() },
            is_user: t.is_user,
            text: t.content.clone(),
        })
        .collect();

    CanonicalPrompt {
        system,
        turns,
        user_text: user_text.to_string(),
        reply_label,
    }
}

fn generic_system(character: &CharacterProfile) -> String {
    format!(
        "You are {description}\n\n\
         Your personality: {personality}\n\n\
         Answer in the first person, as if you really are this character.\n\
         Be natural, playful and a little flirtatious.\n\
         Don't use a formal tone; be friendly and warm.\n\
         Keep replies under 200 words.",
        description = character.description,
        personality = character.personality,
    )
}

fn character_system(character: &CharacterProfile) -> String {
    format!(
        "You are {name} - {description}\n\n\
         Your personality: {personality}\n\n\
         GROUND RULES:\n\
         1. Answer in the first person, as if you really are this character\n\
         2. Be natural, playful and charming\n\
         3. Don't use a formal tone; be friendly and warm\n\
         4. You may flirt a little\n\
         5. Keep replies under 200 words\n\
         6. Stay in character\n\
         7. React to the user's emotions\n\
         8. Ask questions and show interest in the other person\n\
         9. Use emoji to express feelings",
        name = character.name,
        description = character.description,
        personality = character.personality,
    )
}

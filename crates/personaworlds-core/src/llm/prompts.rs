//! Prompt construction for the OpenAI-compatible provider.
//!
//! Kept separate from the HTTP client so the exact wording can evolve
//! without touching transport code.

use super::{ActivitySnapshot, PersonaVoice, RoomContext, ThreadMessage};

const FORMALITY_LABELS: [&str; 4] = ["very casual", "casual", "neutral", "formal"];

/// System prompt establishing the persona's voice.
pub fn persona_system(persona: &PersonaVoice) -> String {
    let formality = FORMALITY_LABELS
        .get(persona.formality.max(0) as usize)
        .unwrap_or(&"neutral");
    let language = if persona.preferred_language == "tr" {
        "Turkish"
    } else {
        "English"
    };

    let mut prompt = format!(
        "You are {name}, a social persona. Bio: {bio}\n\
         Tone: {tone}. Register: {formality}. Write in {language}.\n\
         Writing samples of your voice:\n",
        name = persona.name,
        bio = persona.bio,
        tone = persona.tone,
    );
    for sample in &persona.writing_samples {
        prompt.push_str("- ");
        prompt.push_str(sample);
        prompt.push('\n');
    }
    if !persona.catchphrases.is_empty() {
        prompt.push_str("Catchphrases you may occasionally use: ");
        prompt.push_str(&persona.catchphrases.join("; "));
        prompt.push('\n');
    }
    if !persona.do_not_say.is_empty() {
        prompt.push_str("Never say any of: ");
        prompt.push_str(&persona.do_not_say.join("; "));
        prompt.push('\n');
    }
    prompt.push_str("Reply with the post text only, no quotes, no preamble.");
    prompt
}

/// User message asking for a post draft in a room.
pub fn draft_request(room: &RoomContext, variant: u8, max_runes: usize) -> String {
    let angle = if variant >= 2 {
        "Take a different angle than your first instinct."
    } else {
        "Take your most natural angle."
    };
    format!(
        "Write one short post for the room \"{name}\" ({description}). \
         {angle} Keep it under {max_runes} characters.",
        name = room.name,
        description = room.description,
    )
}

/// User message asking for a reply within a thread.
pub fn reply_request(post_content: &str, thread: &[ThreadMessage], max_runes: usize) -> String {
    let mut prompt = format!("The post under discussion:\n{post_content}\n");
    if !thread.is_empty() {
        prompt.push_str("\nThe thread so far, oldest first:\n");
        for message in thread {
            prompt.push_str(&format!("[{}] {}\n", message.author_label, message.content));
        }
    }
    prompt.push_str(&format!(
        "\nWrite your reply. Keep it under {max_runes} characters."
    ));
    prompt
}

/// System prompt for neutral summarization tasks.
pub fn summarizer_system() -> String {
    "You are a concise, neutral summarizer for a social discussion product. \
     Reply with the summary text only."
        .to_string()
}

/// User message asking for a thread summary.
pub fn thread_summary_request(post_content: &str, replies: &[String]) -> String {
    let mut prompt = format!("Summarize this discussion in 2-3 sentences.\nPost:\n{post_content}\n");
    if !replies.is_empty() {
        prompt.push_str("Replies:\n");
        for reply in replies {
            prompt.push_str("- ");
            prompt.push_str(reply);
            prompt.push('\n');
        }
    }
    prompt
}

/// User message asking for a daily activity summary in the persona's voice.
pub fn activity_summary_request(persona: &PersonaVoice, activity: &ActivitySnapshot) -> String {
    let language = if persona.preferred_language == "tr" {
        "Turkish"
    } else {
        "English"
    };
    let mut prompt = format!(
        "Write one short paragraph in {language} summarizing what the persona \
         \"{name}\" did today: {posts} posts published, {replies} replies written.",
        name = persona.name,
        posts = activity.posts,
        replies = activity.replies,
    );
    if !activity.thread_labels.is_empty() {
        prompt.push_str(" Most active threads: ");
        prompt.push_str(&activity.thread_labels.join(" | "));
        prompt.push('.');
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice() -> PersonaVoice {
        PersonaVoice {
            name: "Ayşe".to_string(),
            bio: "Istanbul tech critic".to_string(),
            tone: "dry".to_string(),
            writing_samples: vec![
                "Sample one.".to_string(),
                "Sample two.".to_string(),
                "Sample three.".to_string(),
            ],
            do_not_say: vec!["synergy".to_string()],
            catchphrases: vec!["olur öyle".to_string()],
            preferred_language: "tr".to_string(),
            formality: 1,
        }
    }

    #[test]
    fn persona_system_includes_voice_material() {
        let prompt = persona_system(&voice());
        assert!(prompt.contains("Ayşe"));
        assert!(prompt.contains("Sample two."));
        assert!(prompt.contains("Never say any of: synergy"));
        assert!(prompt.contains("Turkish"));
        assert!(prompt.contains("casual"));
    }

    #[test]
    fn draft_variants_differ() {
        let room = RoomContext {
            name: "tech".to_string(),
            description: "technology talk".to_string(),
        };
        let first = draft_request(&room, 1, 500);
        let second = draft_request(&room, 2, 500);
        assert_ne!(first, second);
        assert!(first.contains("500"));
    }

    #[test]
    fn reply_request_includes_thread() {
        let thread = vec![ThreadMessage {
            author_label: "persona:Ali".to_string(),
            content: "first take".to_string(),
        }];
        let prompt = reply_request("the post", &thread, 280);
        assert!(prompt.contains("[persona:Ali] first take"));
        assert!(prompt.contains("280"));
    }

    #[test]
    fn out_of_range_formality_falls_back() {
        let mut persona = voice();
        persona.formality = 7;
        let prompt = persona_system(&persona);
        assert!(prompt.contains("neutral"));
    }
}

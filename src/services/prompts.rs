use crate::core::state::CharacterProfile;

pub const IDENTIFY_PROMPT: &str = r#"Look at this image and identify the single main object, animal, landmark, artwork, or thing in it.

Work in three steps:
1. Visually analyze the subject: shape, materials, colors, text, setting, and any distinctive details.
2. If a web search is available, use it to confirm the identification and prefer the proper name of famous landmarks, monuments, buildings, or artworks (e.g. "Statue of Liberty", "Eiffel Tower", "Mona Lisa"). Otherwise use a common name (e.g. "Sunflower", "Golden Retriever").
3. If the image shows a depiction of a person or character (a bust, portrait, painting, statue of someone), name the depicted subject, not the medium or the place it is displayed.

Respond with ONLY a JSON object (no markdown, no code fences, no extra text):
{
  "entity": "the best name for the subject",
  "entity_type": "landmark | artwork | person | animal | plant | object | other",
  "specificity": "exact | specific | generic",
  "confidence": 0.0,
  "alternatives": ["other plausible names, most likely first"]
}

"specificity" is "exact" for a uniquely identifiable thing (a named landmark or artwork), "specific" for a precise kind (a breed or species), and "generic" for a broad category. "confidence" is between 0 and 1."#;

pub fn disambiguate_prompt(candidates: &[String]) -> String {
    let list = candidates
        .iter()
        .map(|c| format!("- {}", c))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Look at this image again. A first pass suggested these candidate names for the main subject:\n\
        {}\n\n\
        Pick the candidate that best matches what is actually visible, or give a more precise name if none fits. \
        If the subject is a depiction of a person or character, name the depicted subject.\n\
        Respond with ONLY the name. Do not add any explanation.",
        list
    )
}

pub fn research_prompt(entity: &str) -> String {
    format!(
        "You are a research assistant. The object identified in a photo is: {entity}\n\n\
        Produce a detailed, factual research brief about this entity. Cover:\n\
        1. What it is (physical description, category)\n\
        2. Historical background (when created/discovered, by whom, why)\n\
        3. Cultural significance and symbolism\n\
        4. Interesting facts and lesser-known details\n\
        5. Where it is located (if applicable)\n\
        6. Famous stories, legends, or anecdotes associated with it\n\n\
        Respond with ONLY a JSON object (no markdown, no code fences):\n\
        {{\n\
          \"research_summary\": \"3-5 paragraphs of grounded, factual prose\",\n\
          \"canonical_facts\": [\"up to 8 short, verifiable facts\"],\n\
          \"source_urls\": [\"up to 8 URLs of the sources you relied on\"]\n\
        }}"
    )
}

pub fn character_prompt(entity: &str, research_summary: &str, canonical_facts: &[String]) -> String {
    let facts = if canonical_facts.is_empty() {
        "(none)".to_string()
    } else {
        canonical_facts
            .iter()
            .map(|f| format!("- {}", f))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "You are a character designer for a children's educational app.\n\
        Based on the following research about \"{entity}\", create a vivid first-person character.\n\n\
        RESEARCH:\n{research_summary}\n\n\
        KEY FACTS:\n{facts}\n\n\
        Respond in EXACTLY this JSON format (no markdown, no code fences, no extra text):\n\
        {{\n\
          \"name\": \"A fun, memorable name for this character (e.g. 'Lady Liberty' for Statue of Liberty)\",\n\
          \"backstory\": \"A 2-3 paragraph first-person backstory. Rich, emotional, historically grounded. Written as if the entity is telling its own life story to a child.\",\n\
          \"personality_traits\": [\"trait1\", \"trait2\", \"trait3\", \"trait4\", \"trait5\"],\n\
          \"speaking_style\": \"A 2-3 sentence description of how this character speaks. Include tone, vocabulary level, verbal quirks, catchphrases.\",\n\
          \"voice_description\": \"An 80-260 character description of the ideal speaking voice. It must state the age range, gender presentation, accent or region, tone, pacing, and energy. Example: 'A warm, wise elderly woman in her seventies with a gentle French accent, speaking slowly and grandly with calm, proud energy'\",\n\
          \"fun_facts\": [\"fact1\", \"fact2\", \"fact3\"],\n\
          \"canonical_facts\": [\"the most important true facts from the research, restated simply\"],\n\
          \"greeting\": \"A 1-2 sentence excited greeting in character, introducing themselves to a curious child. Include an emoji.\"\n\
        }}\n\n\
        Make the character age-appropriate for children 4-10. Be creative and educational, but keep every fact true to the research."
    )
}

pub fn chat_system_prompt(profile: &CharacterProfile) -> String {
    let fun_facts = profile
        .fun_facts
        .iter()
        .map(|f| format!("- {}", f))
        .collect::<Vec<_>>()
        .join("\n");

    let mut knowledge = String::new();
    if !profile.research_summary.trim().is_empty() {
        knowledge.push_str(&format!("\n\nWHAT YOU KNOW ABOUT YOURSELF:\n{}", profile.research_summary.trim()));
    }
    if !profile.canonical_facts.is_empty() {
        let facts = profile
            .canonical_facts
            .iter()
            .map(|f| format!("- {}", f))
            .collect::<Vec<_>>()
            .join("\n");
        knowledge.push_str(&format!("\n\nTRUE FACTS (never contradict these):\n{}", facts));
    }

    format!(
        "You ARE {name}. Here is everything about who you are:\n\n\
        BACKSTORY:\n{backstory}\n\n\
        YOUR PERSONALITY: {traits}\n\n\
        HOW YOU SPEAK:\n{speaking_style}\n\n\
        FUN FACTS YOU KNOW (weave these in naturally):\n{fun_facts}{knowledge}\n\n\
        A curious child (ages 4-10) is talking to you.\n\n\
        Rules:\n\
        - Stay deeply in character as {name} at all times\n\
        - Use simple words a young child can understand\n\
        - Keep responses to 2-4 short sentences\n\
        - Be fun, friendly, and educational\n\
        - Draw on your backstory and fun facts when relevant\n\
        - Speak in your unique style described above\n\
        - If asked something outside your knowledge, respond in character about what you DO know\n\
        - Never break character or mention being an AI\n\
        - Show genuine personality: be warm, quirky, and memorable",
        name = profile.name,
        backstory = profile.backstory,
        traits = profile.personality_traits.join(", "),
        speaking_style = profile.speaking_style,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> CharacterProfile {
        CharacterProfile {
            name: "Lady Liberty".to_string(),
            backstory: "I arrived by ship in 1885.".to_string(),
            personality_traits: vec!["brave".to_string(), "welcoming".to_string()],
            speaking_style: "Grand and warm.".to_string(),
            voice_description: "A warm, wise elderly woman with a gentle French accent".to_string(),
            fun_facts: vec!["My torch was rebuilt.".to_string()],
            research_summary: String::new(),
            canonical_facts: vec![],
            source_urls: vec![],
        }
    }

    #[test]
    fn test_disambiguate_prompt_lists_candidates() {
        let prompt = disambiguate_prompt(&["Eiffel Tower".to_string(), "Tokyo Tower".to_string()]);
        assert!(prompt.contains("- Eiffel Tower\n- Tokyo Tower"));
    }

    #[test]
    fn test_chat_prompt_includes_persona() {
        let prompt = chat_system_prompt(&profile());
        assert!(prompt.starts_with("You ARE Lady Liberty."));
        assert!(prompt.contains("YOUR PERSONALITY: brave, welcoming"));
        assert!(prompt.contains("- My torch was rebuilt."));
        assert!(!prompt.contains("TRUE FACTS"));
    }

    #[test]
    fn test_chat_prompt_includes_research_when_present() {
        let mut p = profile();
        p.research_summary = "A copper statue in New York Harbor.".to_string();
        p.canonical_facts = vec!["Dedicated in 1886".to_string()];

        let prompt = chat_system_prompt(&p);
        assert!(prompt.contains("A copper statue in New York Harbor."));
        assert!(prompt.contains("TRUE FACTS (never contradict these):\n- Dedicated in 1886"));
    }

    #[test]
    fn test_research_prompt_names_entity() {
        let prompt = research_prompt("Eiffel Tower");
        assert!(prompt.contains("identified in a photo is: Eiffel Tower"));
        assert!(prompt.contains("\"canonical_facts\""));
    }
}

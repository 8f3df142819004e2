pub fn system_prompt() -> String {
    "You are an AI prompt engineering expert. Your task is to refine and improve a given \
user prompt.\n\
Focus on adding specific details, artistic styles, technical parameters (like resolution \
or aspect ratio if applicable), and clarity to get a better result from an AI model.\n\
Return ONLY the improved prompt text, without any explanation or preamble."
        .to_string()
}

pub fn user_message(prompt_text: &str) -> String {
    format!("Refine this prompt: \"{prompt_text}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_quotes_the_prompt() {
        assert_eq!(
            user_message("a cat in space"),
            "Refine this prompt: \"a cat in space\""
        );
    }
}

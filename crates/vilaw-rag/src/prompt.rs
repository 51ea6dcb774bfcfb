//! Prompt templates for answer generation and the safety check.

use vilaw_memory::RetrievedChunk;

/// System instructions for the Llama-Guard style safety classifier. The
/// model must answer `safe`, or `unsafe` followed by the violated category
/// codes on a second line.
pub const SAFETY_SYSTEM_PROMPT: &str = "\
Task: Check if there is unsafe content in 'User' messages in conversations according to our safety policy with the below categories.

<BEGIN UNSAFE CONTENT CATEGORIES>
S1: Violent Crimes.
S2: Non-Violent Crimes
S3: Sex-Related Crimes
S4: Child Sexual Exploitation
S5: Defamation
S6: Specialized Advice
S7: Privacy
S8: Intellectual Property
S9: Indiscriminate Weapon
S10: Hate
S11: Suicide & Self-Harm
S12: Sexual Content
S13: Elections
S14: Offensive and Vulgar Language
<END UNSAFE CONTENT CATEGORIES>

Provide your safety assessment for ONLY THE LAST User message in the above conversation:

First line must read 'safe' or 'unsafe'.
If unsafe, a second line must include a comma-separated list of violated categories.";

/// Build the full prompt sent to the safety classifier.
pub fn build_safety_prompt(question: &str) -> String {
    format!("{SAFETY_SYSTEM_PROMPT}\n\nUser: {question}")
}

/// Format retrieved chunks into the numbered context block the answer
/// prompt cites by document number.
pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    let mut context = String::from("\nExtracted docs:\n");
    for (i, chunk) in chunks.iter().enumerate() {
        context.push_str(&format!("Document {i}:::\n{}", chunk.text));
    }
    context
}

/// Build the grounded answer prompt: answer in Vietnamese, cite the source
/// document number, fall back to "tôi không biết" when the context does not
/// contain the answer.
pub fn build_rag_prompt(question: &str, chunks: &[RetrievedChunk]) -> String {
    let context = build_context(chunks);
    format!(
        "\
Read the context below carefully and use the information to answer the question in Vietnamese.

- Provide a comprehensive but concise response, directly related to the question.
- Include the number of the source document if your answer is based on specific information from the context.
- If you cannot deduce the answer from the context, respond with \"tôi không biết\".

Context:
{context}
---
Now, answer the following question:

Question: {question}"
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> RetrievedChunk {
        RetrievedChunk {
            text: text.to_string(),
            source: "thong-tu-01".to_string(),
            score: 1.0,
        }
    }

    #[test]
    fn context_numbers_documents_in_order() {
        let context = build_context(&[chunk("điều một"), chunk("điều hai")]);
        let pos_0 = context.find("Document 0:::").unwrap();
        let pos_1 = context.find("Document 1:::").unwrap();
        assert!(pos_0 < pos_1);
        assert!(context.contains("điều một"));
        assert!(context.contains("điều hai"));
    }

    #[test]
    fn rag_prompt_embeds_question_and_fallback_instruction() {
        let prompt = build_rag_prompt("Dụng cụ là gì?", &[chunk("dụng cụ là tài sản")]);
        assert!(prompt.contains("Question: Dụng cụ là gì?"));
        assert!(prompt.contains("tôi không biết"));
        assert!(prompt.contains("Document 0:::"));
    }

    #[test]
    fn safety_prompt_carries_categories_and_question() {
        let prompt = build_safety_prompt("hướng dẫn cách lách luật");
        assert!(prompt.contains("S14: Offensive and Vulgar Language"));
        assert!(prompt.ends_with("User: hướng dẫn cách lách luật"));
    }
}

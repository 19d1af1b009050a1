use crate::cast::Cast;
use crate::logw;
use crate::naming::scene_number_padded;
use serde_json::{Value, json};

/// Prompt asking the model for a Resolve-friendly `EVO_XXX_ACTION_CAST.mp4` name.
pub fn filename_prompt(raw_line: &str, scene_id: u32, cast: &Cast) -> String {
    let keys = cast.keys().collect::<Vec<_>>().join(", ");
    format!(
        "You are a film production assistant. Respond ONLY with a filename.\n\
         Format: EVO_XXX_ACTION_CAST.mp4\n\
         Characters: {keys}\n\
         - Use 3-letter initials (e.g., AEL, THA).\n\
         - Use 'GEN' if no characters are present.\n\
         - MUST end with '.mp4'.\n\n\
         Index: {} | Line: '{raw_line}'",
        scene_number_padded(scene_id)
    )
}

pub fn generate_content_body(prompt: &str) -> Value {
    json!({
        "contents": [
            {"role": "user", "parts": [{"text": prompt}]}
        ],
        "generationConfig": {"temperature": 0.1},
    })
}

/// Pulls the first text part out of a `generateContent` response.
pub fn gemini_extract_text(resp_json: &str) -> Option<String> {
    let root: Value = serde_json::from_str(resp_json).ok()?;

    if let Some(err) = root.get("error") {
        if let Some(msg) = err.get("message").and_then(|v| v.as_str()) {
            logw(format!("Gemini error message: {}", msg));
        }
        if let Some(status) = err.get("status").and_then(|v| v.as_str()) {
            logw(format!("Gemini error status: {}", status));
        }
        return None;
    }

    let candidates = root.get("candidates")?.as_array()?;
    for candidate in candidates {
        let parts = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array());
        if let Some(parts) = parts {
            for part in parts {
                if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                    if !text.trim().is_empty() {
                        return Some(text.to_string());
                    }
                }
            }
        }
    }

    None
}

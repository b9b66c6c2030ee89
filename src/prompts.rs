use crate::labeler::{CategoryDefinition, LabelRequest, OTHERS};

pub fn system_classifier(categories: &[CategoryDefinition]) -> String {
    let mut lines = vec![
        "You are a review classifier. For each review comment, determine which of these issue categories apply:\n"
            .to_string(),
    ];
    for (i, c) in categories.iter().enumerate() {
        lines.push(format!("{}. \"{}\" — {}", i + 1, c.name, c.description));
    }
    lines.push(format!(
        "{}. \"{OTHERS}\" — The comment does not match any of the above categories.",
        categories.len() + 1
    ));
    lines.push(format!(
        r#"
Rules:
- A review can match MULTIPLE categories.
- If none of the defined categories apply, assign "{OTHERS}".
- "{OTHERS}" should NOT be combined with other categories.
- Base your decision on the semantic meaning, not just keywords.

Respond with ONLY a JSON array where each element is an object with "id" (the review id) and "category" (array of matching category strings). No other text."#
    ));
    lines.join("\n")
}

pub fn user_batch(batch: &[LabelRequest]) -> String {
    let mut out = String::from("Classify these reviews:\n\n");
    for r in batch {
        out.push_str(&format!("ID={}: \"\"\"{}\"\"\"\n\n", r.id, r.comment));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_lists_categories_then_others() {
        let cats = vec![
            CategoryDefinition::new("Crash", "IDE crashes"),
            CategoryDefinition::new("Freeze / Hang", "IDE becomes unresponsive"),
        ];
        let p = system_classifier(&cats);
        assert!(p.contains("1. \"Crash\" — IDE crashes"));
        assert!(p.contains("2. \"Freeze / Hang\""));
        assert!(p.contains("3. \"Others\""));
    }

    #[test]
    fn user_prompt_quotes_each_comment() {
        let batch = vec![LabelRequest {
            id: "17".into(),
            comment: "hangs on startup".into(),
        }];
        assert!(user_batch(&batch).contains("ID=17: \"\"\"hangs on startup\"\"\""));
    }
}

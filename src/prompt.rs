use log::warn;
use std::fs;
use std::path::Path;

pub const RULE_BASE_FILE: &str = "rule_base.txt";
pub const PERFORM_TEMPLATE_FILE: &str = "perform_prompt_template.txt";
pub const VOTE_TEMPLATE_FILE: &str = "vote_prompt_template.txt";

/// The file-backed prompt material: shared rule text plus one template per
/// turn kind. A file that cannot be read degrades to an empty string so a
/// broken prompt directory never aborts a match.
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    pub rules: String,
    pub perform_template: String,
    pub vote_template: String,
}

impl PromptLibrary {
    pub fn load(dir: &str) -> Self {
        let dir = Path::new(dir);
        Self {
            rules: read_or_empty(&dir.join(RULE_BASE_FILE)),
            perform_template: read_or_empty(&dir.join(PERFORM_TEMPLATE_FILE)),
            vote_template: read_or_empty(&dir.join(VOTE_TEMPLATE_FILE)),
        }
    }
}

fn read_or_empty(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(content) => content.trim().to_string(),
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            String::new()
        }
    }
}

/// Named substitution values shared by both turn templates.
#[derive(Debug, Clone)]
pub struct PromptFields<'a> {
    pub rules: &'a str,
    pub self_name: &'a str,
    pub self_keyword: &'a str,
    pub round_count: u32,
    pub player_list: &'a [String],
    pub player_count: usize,
    pub previous_info: &'a str,
}

/// Fills `{field}` placeholders in a turn template. Unknown placeholders are
/// left untouched, which keeps literal JSON braces in templates intact.
pub fn fill(template: &str, fields: &PromptFields) -> String {
    let player_list =
        serde_json::to_string(fields.player_list).unwrap_or_else(|_| "[]".to_string());

    template
        .replace("{rules}", fields.rules)
        .replace("{self_name}", fields.self_name)
        .replace("{self_keyword}", fields.self_keyword)
        .replace("{round_count}", &fields.round_count.to_string())
        .replace("{player_list}", &player_list)
        .replace("{player_count}", &fields.player_count.to_string())
        .replace("{previous_info}", fields.previous_info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_substitutes_all_fields() {
        let players = vec!["A".to_string(), "B".to_string()];
        let fields = PromptFields {
            rules: "be subtle",
            self_name: "A",
            self_keyword: "Werewolf",
            round_count: 2,
            player_list: &players,
            player_count: 2,
            previous_info: "history",
        };
        let out = fill(
            "{rules}|{self_name}|{self_keyword}|{round_count}|{player_list}|{player_count}|{previous_info}",
            &fields,
        );
        assert_eq!(out, "be subtle|A|Werewolf|2|[\"A\",\"B\"]|2|history");
    }

    #[test]
    fn fill_leaves_literal_braces_alone() {
        let fields = PromptFields {
            rules: "",
            self_name: "A",
            self_keyword: "",
            round_count: 1,
            player_list: &[],
            player_count: 0,
            previous_info: "",
        };
        let out = fill("respond as {\"description\": ...} please, {self_name}", &fields);
        assert_eq!(out, "respond as {\"description\": ...} please, A");
    }

    #[test]
    fn missing_prompt_dir_degrades_to_empty() {
        let lib = PromptLibrary::load("./definitely/not/a/dir");
        assert!(lib.rules.is_empty());
        assert!(lib.perform_template.is_empty());
        assert!(lib.vote_template.is_empty());
    }
}

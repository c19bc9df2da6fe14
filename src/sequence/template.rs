use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::common::Vars;

/// Placeholder format: `{{name}}`, whitespace inside the braces allowed.
const PLACEHOLDER_PATTERN: &str = r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(PLACEHOLDER_PATTERN).unwrap());

/// Variables the engine always provides. Absent values render blank.
pub const KNOWN_VARIABLES: [&str; 9] = ["razaoSocial", "nomeFantasia", "cidade", "uf", "cnpj", "telefone", "status", "classification", "lastReply"];

/// Replace `{{var}}` placeholders with values from `vars`.
///
/// Unknown variables are left untouched so typos stay visible in the sent text.
pub fn render(
    template: &str,
    vars: &Vars,
) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            match vars.get_text(name) {
                Some(value) => value,
                None if KNOWN_VARIABLES.contains(&name) => String::new(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Names of the placeholders used by `template`, in order of appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    PLACEHOLDER.captures_iter(template).map(|caps| caps[1].to_string()).collect()
}

/// Placeholders that no lead or enrollment variable will fill.
pub fn unknown_placeholders(template: &str) -> Vec<String> {
    placeholders(template).into_iter().filter(|name| !KNOWN_VARIABLES.contains(&name.as_str())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead_vars() -> Vars {
        Vars::new().with("razaoSocial", "Padaria Sol LTDA").with("nomeFantasia", "Padaria Sol").with("cidade", "Natal").with("uf", "RN")
    }

    #[test]
    fn test_render_no_variables() {
        assert_eq!(render("hello world", &lead_vars()), "hello world");
    }

    #[test]
    fn test_render_known_variables() {
        let text = render("Olá {{nomeFantasia}}, de {{cidade}}/{{ uf }}!", &lead_vars());
        assert_eq!(text, "Olá Padaria Sol, de Natal/RN!");
    }

    #[test]
    fn test_render_known_but_absent_is_blank() {
        let text = render("CNPJ: [{{cnpj}}]", &lead_vars());
        assert_eq!(text, "CNPJ: []");
    }

    #[test]
    fn test_render_unknown_stays_literal() {
        let text = render("Oi {{apelido}} e {{ nomeFantasia }}", &lead_vars());
        assert_eq!(text, "Oi {{apelido}} e Padaria Sol");
    }

    #[test]
    fn test_render_non_placeholder_braces() {
        assert_eq!(render("{{}} {{1abc}} {single}", &lead_vars()), "{{}} {{1abc}} {single}");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders("{{a}} x {{ b_2 }}"), vec!["a".to_string(), "b_2".to_string()]);
        assert_eq!(unknown_placeholders("{{ cidade }} {{apelido}} {{lastReply}}"), vec!["apelido".to_string()]);
    }
}

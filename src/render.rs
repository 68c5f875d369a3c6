use anyhow::{Context, Result};
use handlebars::Handlebars;

use crate::contributors::ContributorRecord;

/// One login per line.
pub const DEFAULT_TEMPLATE: &str = "{{#each this}}{{login}}\n{{/each}}";

/// Fields every record exposes to templates, with their types.
const FIELDS: &[(&str, &str)] = &[
    ("login", "string"),
    ("id", "int"),
    ("avatar_url", "string"),
    ("gravatar_id", "string"),
    ("url", "string"),
    ("html_url", "string"),
    ("followers_url", "string"),
    ("following_url", "string"),
    ("gists_url", "string"),
    ("starred_url", "string"),
    ("subscriptions_url", "string"),
    ("organizations_url", "string"),
    ("repos_url", "string"),
    ("events_url", "string"),
    ("received_events_url", "string"),
    ("type", "string"),
    ("site_admin", "bool"),
    ("contributions", "int"),
];

/// Help text describing the data handed to templates.
pub fn template_fields() -> String {
    let mut out = String::from(
        "The template is a Handlebars template rendered against a list of\n\
         contributors, sorted by contributions (descending) then login.\n\
         Each contributor has the following fields:\n\n",
    );
    for (name, kind) in FIELDS {
        out.push_str(&format!("  {name:<22}{kind}\n"));
    }
    out
}

/// Render `records` through `template`. Output is plain text, so nothing is
/// HTML-escaped.
pub fn render(template: &str, records: &[ContributorRecord]) -> Result<String> {
    let mut hb = Handlebars::new();
    hb.register_escape_fn(handlebars::no_escape);
    hb.render_template(template, &records)
        .context("Failed to render contributor template")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contributors::Contributor;

    fn record(login: &str, contributions: u64) -> ContributorRecord {
        ContributorRecord {
            profile: Contributor {
                login: login.to_string(),
                html_url: format!("https://github.com/{login}?tab=repositories&x=1"),
                ..Default::default()
            },
            contributions,
        }
    }

    #[test]
    fn default_template_lists_logins() {
        let out = render(DEFAULT_TEMPLATE, &[record("bob", 10), record("alice", 8)]).unwrap();
        assert_eq!(out, "bob\nalice\n");
    }

    #[test]
    fn custom_template_sees_all_fields_unescaped() {
        let out = render(
            "{{#each this}}{{login}} {{contributions}} {{html_url}}\n{{/each}}",
            &[record("bob", 10)],
        )
        .unwrap();
        assert_eq!(
            out,
            "bob 10 https://github.com/bob?tab=repositories&x=1\n"
        );
    }

    #[test]
    fn empty_list_renders_nothing() {
        assert_eq!(render(DEFAULT_TEMPLATE, &[]).unwrap(), "");
    }

    #[test]
    fn broken_template_is_an_error() {
        assert!(render("{{#each this}}{{login}}", &[record("bob", 1)]).is_err());
    }

    #[test]
    fn help_lists_every_field() {
        let help = template_fields();
        for (name, _) in FIELDS {
            assert!(help.contains(name), "missing {name}");
        }
    }
}

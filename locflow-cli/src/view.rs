use locflow::{CanonicalMessage, Codec, plural_rules::collect_resource_plural_issues};

const PREVIEW_CHARS: usize = 50;

fn preview(value: &str, full: bool) -> String {
    if full || value.chars().count() <= PREVIEW_CHARS {
        value.to_string()
    } else {
        let truncated: String = value.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", truncated)
    }
}

/// Print a view of the resources in a codec.
pub fn print_view(codec: &Codec, lang_filter: &Option<String>, full: bool) -> Result<(), String> {
    let resources: Vec<_> = match lang_filter {
        Some(lang) => codec.iter().filter(|r| r.language == *lang).collect(),
        None => codec.iter().collect(),
    };

    if resources.is_empty() {
        return Err(match lang_filter {
            Some(lang) => format!("No resources found for language: {}", lang),
            None => "No resources found".to_string(),
        });
    }

    for (i, resource) in resources.iter().enumerate() {
        println!("\n=== Resource {} ===", i + 1);
        println!("Language: {}", resource.language);
        println!("Entries: {}", resource.entries.len());

        for (j, entry) in resource.entries.iter().enumerate() {
            println!("\n  Entry {}: {}", j + 1, entry.key);
            if let Some(description) = &entry.description {
                println!("    Description: {}", description);
            }
            match &entry.message {
                CanonicalMessage::Singular(value) => {
                    println!("    Value: {}", preview(value, full));
                }
                CanonicalMessage::Plural(plural) => {
                    println!("    Plural argument: {}", plural.argument);
                    for (category, value) in &plural.forms {
                        println!("      {}: {}", category, preview(value, full));
                    }
                }
            }
        }
    }

    let plural_reports: Vec<_> = resources
        .iter()
        .flat_map(|resource| collect_resource_plural_issues(resource))
        .collect();
    if !plural_reports.is_empty() {
        println!("\n=== Missing plural forms ===");
        for report in plural_reports {
            let missing: Vec<_> = report.missing.iter().map(|c| c.as_str()).collect();
            println!("  {} [{}]: {}", report.key, report.language, missing.join(", "));
        }
    }

    let issues: Vec<_> = codec
        .issues
        .iter()
        .filter(|issue| {
            lang_filter
                .as_ref()
                .is_none_or(|lang| issue.language.as_deref().is_none_or(|l| l == lang))
        })
        .collect();
    if !issues.is_empty() {
        println!("\n=== Issues ({}) ===", issues.len());
        for issue in issues {
            let mut line = format!("  {:?}", issue.kind);
            if let Some(key) = &issue.key {
                line.push_str(&format!(" key={}", key));
            }
            if let Some(language) = &issue.language {
                line.push_str(&format!(" language={}", language));
            }
            if let Some(number) = issue.line {
                line.push_str(&format!(" line={}", number));
            }
            println!("{}", line);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_counts_characters() {
        let long = "é".repeat(60);
        assert_eq!(preview(&long, false).chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(preview(&long, true), long);
        assert_eq!(preview("short", false), "short");
    }
}

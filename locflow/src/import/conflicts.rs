//! Conflict detection between staged and committed translations.

use crate::{
    error::Error,
    import::model::{Conflict, ImportLanguage, ImportTranslation, Resolution},
    store::{Language, LanguageId, ProjectId, ProjectStore, same_language_tag},
};

/// Recomputes the conflicts of one staged language.
///
/// A translation conflicts when its paired language already holds a
/// different text for the same key and namespace. With `keep_resolutions`
/// a resolution survives if the conflicting translation is still the same
/// one; otherwise every resolution is reset.
pub fn compute_language_conflicts(
    store: &dyn ProjectStore,
    project: ProjectId,
    namespace: Option<&str>,
    language: &mut ImportLanguage,
    keep_resolutions: bool,
) -> Result<(), Error> {
    let Some(existing_language) = language.existing_language else {
        for translation in &mut language.translations {
            translation.conflict = None;
            translation.resolution = Resolution::Unresolved;
        }
        return Ok(());
    };
    let mut count = 0;
    for translation in &mut language.translations {
        let existing = store.find_translation(project, &translation.key, namespace, existing_language)?;
        let conflict = existing
            .filter(|e| e.text != translation.text)
            .map(|e| Conflict {
                translation_id: e.id,
                text: e.text,
            });
        let same_conflict = match (&translation.conflict, &conflict) {
            (Some(old), Some(new)) => old.translation_id == new.translation_id,
            _ => false,
        };
        if !(keep_resolutions && same_conflict) {
            translation.resolution = Resolution::Unresolved;
        }
        count += usize::from(conflict.is_some());
        translation.conflict = conflict;
    }
    tracing::debug!(
        language = language.tag.as_str(),
        existing_language,
        conflicts = count,
        "computed conflicts"
    );
    Ok(())
}

/// Finds the project language a staged tag pairs with by default.
pub fn infer_pairing(tag: &str, languages: &[Language]) -> Option<LanguageId> {
    languages
        .iter()
        .find(|l| same_language_tag(&l.tag, tag))
        .map(|l| l.id)
}

/// Sets the resolution of one conflicting translation.
pub fn resolve(translation: &mut ImportTranslation, override_existing: bool) -> Result<(), Error> {
    if translation.conflict.is_none() {
        return Err(Error::validation_error(format!(
            "translation of `{}` has no conflict to resolve",
            translation.key
        )));
    }
    translation.resolution = Resolution::from_override(override_existing);
    Ok(())
}

/// Sets every unresolved conflict of a language. Calling it again changes
/// nothing.
pub fn resolve_all(language: &mut ImportLanguage, override_existing: bool) -> usize {
    let resolution = Resolution::from_override(override_existing);
    let mut changed = 0;
    for translation in language.translations.iter_mut().filter(|t| t.is_unresolved()) {
        translation.resolution = resolution;
        changed += 1;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryProjectStore;

    fn staged(existing_language: Option<LanguageId>, rows: &[(&str, &str)]) -> ImportLanguage {
        ImportLanguage {
            id: 1,
            tag: "en".to_string(),
            existing_language,
            translations: rows
                .iter()
                .enumerate()
                .map(|(i, (key, text))| ImportTranslation {
                    id: i as u64 + 10,
                    key: key.to_string(),
                    description: None,
                    text: text.to_string(),
                    is_plural: false,
                    conflict: None,
                    resolution: Resolution::Unresolved,
                })
                .collect(),
        }
    }

    #[test]
    fn test_conflict_only_for_different_text() {
        let store = MemoryProjectStore::new();
        let en = store.add_language(1, "en", true);
        store.set_translation(1, "same", None, en.id, "Same").unwrap();
        let existing = store.set_translation(1, "changed", None, en.id, "Old").unwrap();
        let mut language = staged(Some(en.id), &[("same", "Same"), ("changed", "New"), ("fresh", "Fresh")]);
        compute_language_conflicts(&store, 1, None, &mut language, false).unwrap();
        let conflicts: Vec<_> = language.translations.iter().map(|t| t.conflict.clone()).collect();
        assert_eq!(
            conflicts,
            vec![
                None,
                Some(Conflict {
                    translation_id: existing,
                    text: "Old".to_string()
                }),
                None
            ]
        );

        compute_language_conflicts(&store, 1, Some("other"), &mut language, false).unwrap();
        assert_eq!(language.conflict_count(), 0);
    }

    #[test]
    fn test_resolutions_kept_for_same_conflict() {
        let store = MemoryProjectStore::new();
        let en = store.add_language(1, "en", true);
        store.set_translation(1, "a", None, en.id, "Old").unwrap();
        let mut language = staged(Some(en.id), &[("a", "New")]);
        compute_language_conflicts(&store, 1, None, &mut language, false).unwrap();
        resolve(&mut language.translations[0], true).unwrap();

        compute_language_conflicts(&store, 1, None, &mut language, true).unwrap();
        assert_eq!(language.translations[0].resolution, Resolution::Override);

        compute_language_conflicts(&store, 1, None, &mut language, false).unwrap();
        assert_eq!(language.translations[0].resolution, Resolution::Unresolved);

        language.existing_language = None;
        compute_language_conflicts(&store, 1, None, &mut language, true).unwrap();
        assert!(language.translations[0].conflict.is_none());
    }

    #[test]
    fn test_resolve_all_is_idempotent() {
        let store = MemoryProjectStore::new();
        let en = store.add_language(1, "en", true);
        store.set_translation(1, "a", None, en.id, "A").unwrap();
        store.set_translation(1, "b", None, en.id, "B").unwrap();
        let mut language = staged(Some(en.id), &[("a", "A2"), ("b", "B2"), ("c", "C")]);
        compute_language_conflicts(&store, 1, None, &mut language, false).unwrap();
        assert_eq!(resolve_all(&mut language, false), 2);
        let first = language.clone();
        assert_eq!(resolve_all(&mut language, false), 0);
        assert_eq!(language, first);
        assert_eq!(language.unresolved_count(), 0);
        assert!(resolve(&mut language.translations[2], true).is_err());
    }

    #[test]
    fn test_infer_pairing() {
        let store = MemoryProjectStore::new();
        let pt = store.add_language(1, "pt-BR", false);
        let languages = store.languages(1).unwrap();
        assert_eq!(infer_pairing("pt_br", &languages), Some(pt.id));
        assert_eq!(infer_pairing("de", &languages), None);
    }
}

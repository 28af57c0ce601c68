//! Committing a staged import into the project store.
//!
//! [`apply_force_mode`] settles unresolved conflicts, [`plan`] creates
//! missing languages and namespaces and lists the translation writes, and
//! [`commit`] writes them in cancellable sub-chunks before tagging the
//! imported keys.

use std::collections::{BTreeSet, HashMap};

use tokio_util::sync::CancellationToken;

use crate::{
    batch::{self, BatchOutcome},
    error::Error,
    import::{
        conflicts,
        model::{ApplyOptions, ApplyOutcome, ForceMode, Import, ImportState},
    },
    store::{KeyId, LanguageId, NamespaceId, ProjectId, ProjectStore, TranslationWrite},
};

/// The writes of one apply, in commit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyPlan {
    pub project: ProjectId,
    pub writes: Vec<TranslationWrite>,
}

impl ApplyPlan {
    pub fn total(&self) -> usize {
        self.writes.len()
    }
}

/// Settles unresolved conflicts for the force mode.
///
/// With [`ForceMode::NoForce`] the first language that still has unresolved
/// conflicts is reported as [`Error::UnresolvedConflicts`].
pub fn apply_force_mode(import: &mut Import, force_mode: ForceMode) -> Result<(), Error> {
    let override_existing = match force_mode {
        ForceMode::NoForce => {
            if let Some(language) = import.languages().find(|l| l.unresolved_count() > 0) {
                return Err(Error::UnresolvedConflicts {
                    language: language.tag.clone(),
                    count: language.unresolved_count(),
                });
            }
            return Ok(());
        }
        ForceMode::ForceOverride => true,
        ForceMode::ForceKeepExisting => false,
    };
    for file in &mut import.files {
        for language in &mut file.languages {
            conflicts::resolve_all(language, override_existing);
        }
    }
    Ok(())
}

/// Creates the languages and namespaces the import introduces and lists the
/// writes. Rows resolved as keep-existing are left out. When several files
/// carry the same key, the later file is written last.
///
/// Only the staged pairing decides where a language is written. An unpaired
/// language is always created, and the store refuses a tag it already has.
pub fn plan(store: &dyn ProjectStore, import: &Import) -> Result<ApplyPlan, Error> {
    let project = import.project_id;
    let mut created: HashMap<String, LanguageId> = HashMap::new();
    let mut namespaces: HashMap<String, NamespaceId> = HashMap::new();
    let mut writes = Vec::new();

    for file in &import.files {
        let namespace = match file.namespace.as_deref() {
            Some(name) => match namespaces.get(name) {
                Some(id) => Some(*id),
                None => {
                    let id = store.find_or_create_namespace(project, name)?.id;
                    namespaces.insert(name.to_string(), id);
                    Some(id)
                }
            },
            None => None,
        };
        for language in &file.languages {
            let language_id: LanguageId = match language.existing_language {
                Some(id) => id,
                None => match created.get(&language.tag) {
                    Some(id) => *id,
                    None => {
                        let new_language = store.create_language(project, &language.tag)?;
                        tracing::info!(project, tag = new_language.tag.as_str(), "created language");
                        created.insert(language.tag.clone(), new_language.id);
                        new_language.id
                    }
                },
            };
            writes.extend(
                language
                    .translations
                    .iter()
                    .filter(|t| t.is_written())
                    .map(|t| TranslationWrite {
                        key: t.key.clone(),
                        namespace,
                        description: t.description.clone(),
                        language: language_id,
                        text: t.text.clone(),
                        is_plural: t.is_plural,
                    }),
            );
        }
    }
    Ok(ApplyPlan { project, writes })
}

/// Writes the plan in sub-chunks, then tags the touched keys.
///
/// `progress` sees the number of committed rows after each sub-chunk. A
/// cancelled commit returns `Ok` with [`ImportState::Cancelled`].
pub async fn commit<G>(
    store: &dyn ProjectStore,
    plan: &ApplyPlan,
    options: &ApplyOptions,
    cancel: &CancellationToken,
    mut progress: G,
) -> Result<ApplyOutcome, Error>
where
    G: FnMut(usize),
{
    let total = plan.total();
    let mut key_ids: Vec<KeyId> = Vec::with_capacity(total);
    let outcome = batch::run_chunked(
        &plan.writes,
        options.chunk_size,
        cancel,
        |chunk| {
            key_ids.extend(store.write_batch(plan.project, chunk)?);
            Ok(())
        },
        &mut progress,
    )
    .await?;
    if let BatchOutcome::Cancelled { processed } = outcome {
        return Ok(ApplyOutcome {
            state: ImportState::Cancelled,
            applied: processed,
            total,
        });
    }

    if !options.tags.is_empty() {
        let keys: Vec<KeyId> = key_ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        let tagged = batch::run_chunked(
            &keys,
            options.chunk_size,
            cancel,
            |chunk| store.tag_keys(plan.project, chunk, &options.tags),
            |_| {},
        )
        .await?;
        tracing::debug!(keys = tagged.processed(), tags = ?options.tags, "tagged imported keys");
        if tagged.is_cancelled() {
            return Ok(ApplyOutcome {
                state: ImportState::Cancelled,
                applied: total,
                total,
            });
        }
    }

    Ok(ApplyOutcome {
        state: ImportState::Applied,
        applied: total,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        formats::ImportFormat,
        import::model::{Conflict, ImportFile, ImportLanguage, ImportTranslation, Resolution},
        store::MemoryProjectStore,
    };

    fn import(store: &MemoryProjectStore, count: usize, namespace: Option<&str>) -> Import {
        let en = store.languages(1).unwrap().into_iter().find(|l| l.tag == "en");
        let mut import = Import::new(1, 1, 1);
        import.files.push(ImportFile {
            id: 1,
            name: "en.json".to_string(),
            format: ImportFormat::Json,
            namespace: namespace.map(str::to_string),
            raw: None,
            languages: vec![
                ImportLanguage {
                    id: 2,
                    tag: "en".to_string(),
                    existing_language: en.map(|l| l.id),
                    translations: (0..count)
                        .map(|i| ImportTranslation {
                            id: 10 + i as u64,
                            key: format!("key.{}", i),
                            description: None,
                            text: format!("Text {}", i),
                            is_plural: false,
                            conflict: None,
                            resolution: Resolution::Unresolved,
                        })
                        .collect(),
                },
                ImportLanguage {
                    id: 3,
                    tag: "fr".to_string(),
                    existing_language: None,
                    translations: Vec::new(),
                },
            ],
            issues: Vec::new(),
        });
        import
    }

    #[test]
    fn test_force_modes() {
        let store = MemoryProjectStore::new();
        store.add_language(1, "en", true);
        let mut staged = import(&store, 2, None);
        staged.files[0].languages[0].translations[0].conflict = Some(Conflict {
            translation_id: 99,
            text: "Old".to_string(),
        });

        let error = apply_force_mode(&mut staged.clone(), ForceMode::NoForce).unwrap_err();
        assert!(matches!(error, Error::UnresolvedConflicts { ref language, count: 1 } if language == "en"));

        let mut keep = staged.clone();
        apply_force_mode(&mut keep, ForceMode::ForceKeepExisting).unwrap();
        assert_eq!(plan(&store, &keep).unwrap().total(), 1);

        apply_force_mode(&mut staged, ForceMode::ForceOverride).unwrap();
        assert_eq!(plan(&store, &staged).unwrap().total(), 2);
    }

    #[test]
    fn test_plan_creates_languages_and_namespaces() {
        let store = MemoryProjectStore::new();
        store.add_language(1, "en", true);
        let staged = import(&store, 1, Some("admin"));
        let plan = plan(&store, &staged).unwrap();
        let tags: Vec<_> = store.languages(1).unwrap().into_iter().map(|l| l.tag).collect();
        assert_eq!(tags, vec!["en", "fr"]);
        let namespace = store.namespaces(1).unwrap()[0].clone();
        assert_eq!(namespace.name, "admin");
        assert_eq!(plan.writes[0].namespace, Some(namespace.id));
    }

    #[test]
    fn test_unpaired_language_never_joins_existing_one() {
        let store = MemoryProjectStore::new();
        store.add_language(1, "en", true);
        let mut staged = import(&store, 1, None);
        staged.files[0].languages[0].existing_language = None;
        assert!(plan(&store, &staged).unwrap_err().is_validation());
        assert_eq!(store.languages(1).unwrap().len(), 1);
    }

    #[test]
    fn test_same_new_tag_is_created_once() {
        let store = MemoryProjectStore::new();
        let mut staged = import(&store, 1, None);
        let mut second = staged.files[0].clone();
        second.id = 4;
        second.name = "more/en.json".to_string();
        staged.files.push(second);
        let plan = plan(&store, &staged).unwrap();
        let tags: Vec<_> = store.languages(1).unwrap().into_iter().map(|l| l.tag).collect();
        assert_eq!(tags, vec!["en", "fr"]);
        assert_eq!(plan.writes[0].language, plan.writes[1].language);
    }

    #[tokio::test]
    async fn test_commit_with_tags() {
        let store = MemoryProjectStore::new();
        store.add_language(1, "en", true);
        let staged = import(&store, 250, None);
        let plan = plan(&store, &staged).unwrap();
        let options = ApplyOptions::default().with_tags(vec!["release".to_string()]);
        let mut seen = Vec::new();
        let outcome = commit(&store, &plan, &options, &CancellationToken::new(), |n| seen.push(n))
            .await
            .unwrap();
        assert_eq!(outcome.state, ImportState::Applied);
        assert_eq!(outcome.applied, 250);
        assert_eq!(seen, vec![100, 200, 250]);
        assert_eq!(store.translation_count(1), 250);
        assert!(store.key(1, "key.249", None).unwrap().tags.contains("release"));
    }

    #[tokio::test]
    async fn test_cancelled_commit_keeps_whole_chunks() {
        let store = MemoryProjectStore::new();
        store.add_language(1, "en", true);
        let staged = import(&store, 1000, None);
        let plan = plan(&store, &staged).unwrap();
        let token = CancellationToken::new();
        let outcome = commit(&store, &plan, &ApplyOptions::default(), &token, |n| {
            if n == 300 {
                token.cancel();
            }
        })
        .await
        .unwrap();
        assert_eq!(outcome.state, ImportState::Cancelled);
        assert_eq!(outcome.applied, 300);
        assert_eq!(store.translation_count(1), 300);
    }
}

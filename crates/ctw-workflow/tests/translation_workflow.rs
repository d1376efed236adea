use std::sync::Arc;

use async_trait::async_trait;
use ctw_core::{EntityId, Langcode, ModerationState, NewEntity, Revision, TranslationSnapshot};
use ctw_storage::{ForwardRevisionTask, ReconciliationQueue, RevisionStorage, SaveRequest};
use ctw_workflow::config::WorkflowConfig;
use ctw_workflow::{DrainOutcome, TeardownError, TerminateSubscriber, Workflow, WorkflowStorage};

fn lang(code: &str) -> Langcode {
    Langcode::new(code).unwrap()
}

async fn workflow() -> Workflow {
    let mut config = WorkflowConfig::default();
    config.logging.level = "debug".into();
    Workflow::from_config(config).await.unwrap()
}

async fn create_published(workflow: &Workflow, codes: &[&str]) -> Revision {
    let mut entity = NewEntity::new(TranslationSnapshot::new(
        lang(codes[0]),
        format!("{}-name--0", codes[0]),
        ModerationState::Published,
    ));
    for code in &codes[1..] {
        entity = entity
            .add_translation(TranslationSnapshot::new(
                lang(code),
                format!("{code}-name--0"),
                ModerationState::Published,
            ))
            .unwrap();
    }
    workflow.storage().create(entity).await.unwrap()
}

/// Edits one translation of `base` and saves it through that translation.
async fn save_from(
    workflow: &Workflow,
    mut base: Revision,
    code: &str,
    title: &str,
    state: ModerationState,
) -> Revision {
    let translation = base.get_translation_mut(&lang(code)).unwrap();
    translation.set_title(title);
    translation.set_moderation_state(state);
    workflow
        .storage()
        .save(base.entity_id, SaveRequest::from_revision(base, lang(code)))
        .await
        .unwrap()
}

async fn latest(workflow: &Workflow, entity: EntityId) -> Revision {
    workflow.storage().load_latest(entity).await.unwrap().unwrap()
}

async fn default(workflow: &Workflow, entity: EntityId) -> Revision {
    workflow.storage().load_default(entity).await.unwrap().unwrap()
}

/// Edits the latest revision, like a request that loads before saving.
async fn edit_latest(
    workflow: &Workflow,
    entity: EntityId,
    code: &str,
    title: &str,
    state: ModerationState,
) -> Revision {
    let base = latest(workflow, entity).await;
    save_from(workflow, base, code, title, state).await
}

fn assert_translation(revision: &Revision, code: &str, title: &str, state: ModerationState) {
    let translation = revision.translation(&lang(code)).unwrap();
    assert_eq!(translation.title, title, "title of {code}");
    assert_eq!(translation.moderation_state, state, "state of {code}");
}

async fn assert_current(workflow: &Workflow, entity: EntityId, code: &str, title: &str) {
    let current = workflow
        .storage()
        .load_current_translation(entity, &lang(code))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.title, title, "current title of {code}");
    assert!(current.is_published());
}

#[tokio::test]
async fn drafts_survive_publishing_other_translations() {
    use ModerationState::{Draft, Published};

    let workflow = workflow().await;
    let entity = create_published(&workflow, &["en", "fr", "de"]).await.entity_id;
    assert_eq!(workflow.queue().number_of_items().await.unwrap(), 0);

    for code in ["en", "fr", "de"] {
        edit_latest(&workflow, entity, code, &format!("{code}-name--1"), Draft).await;
        let report = workflow.end_cycle().await;
        assert!(report.failed.is_empty());
    }

    // Republish en: fr and de drafts are carried forward
    let published = edit_latest(&workflow, entity, "en", "en-name--1", Published).await;
    workflow.end_cycle().await;
    let revision = latest(&workflow, entity).await;
    assert_translation(&revision, "en", "en-name--1", Published);
    assert_translation(&revision, "fr", "fr-name--1", Draft);
    assert_translation(&revision, "de", "de-name--1", Draft);
    assert_eq!(default(&workflow, entity).await.revision_id, published.revision_id);

    // Publish fr: de's draft is still preserved
    edit_latest(&workflow, entity, "fr", "fr-name--1", Published).await;
    workflow.end_cycle().await;
    let revision = latest(&workflow, entity).await;
    assert_translation(&revision, "en", "en-name--1", Published);
    assert_translation(&revision, "fr", "fr-name--1", Published);
    assert_translation(&revision, "de", "de-name--1", Draft);

    // Publish de last: everything settles without a forward revision
    edit_latest(&workflow, entity, "de", "de-name--1", Published).await;
    workflow.end_cycle().await;
    let revision = latest(&workflow, entity).await;
    for code in ["en", "fr", "de"] {
        assert_translation(&revision, code, &format!("{code}-name--1"), Published);
    }
    assert_eq!(revision.revision_id, default(&workflow, entity).await.revision_id);
    assert_eq!(workflow.queue().number_of_items().await.unwrap(), 0);
}

#[tokio::test]
async fn publishing_from_stale_base_does_not_regress_other_translations() {
    use ModerationState::{Draft, Published};

    let workflow = workflow().await;
    let created = create_published(&workflow, &["en", "fr", "de"]).await;
    let entity = created.entity_id;

    for code in ["en", "fr", "de"] {
        edit_latest(&workflow, entity, code, &format!("{code}-name--1"), Draft).await;
        workflow.end_cycle().await;
    }

    // Every publish below starts from the revision holding all three drafts
    let base = latest(&workflow, entity).await;

    save_from(&workflow, base.clone(), "en", "en-name--1", Published).await;
    workflow.end_cycle().await;
    assert_current(&workflow, entity, "en", "en-name--1").await;

    let fr_published = save_from(&workflow, base.clone(), "fr", "fr-name--1", Published).await;
    workflow.end_cycle().await;

    // A forward revision restores en's publication and keeps de's draft
    let forward = latest(&workflow, entity).await;
    assert!(forward.revision_id > fr_published.revision_id);
    assert!(!forward.is_default_revision());
    assert_translation(&forward, "en", "en-name--1", Published);
    assert_translation(&forward, "fr", "fr-name--1", Published);
    assert_translation(&forward, "de", "de-name--1", Draft);
    assert_eq!(default(&workflow, entity).await.revision_id, fr_published.revision_id);

    // Readers never see en regress to its first text
    assert_current(&workflow, entity, "en", "en-name--1").await;
    assert_current(&workflow, entity, "fr", "fr-name--1").await;
    assert_current(&workflow, entity, "de", "de-name--0").await;

    let de_published = save_from(&workflow, base, "de", "de-name--1", Published).await;
    workflow.end_cycle().await;

    // Settled: no forward revision, latest is the default
    let revision = latest(&workflow, entity).await;
    assert_eq!(revision.revision_id, de_published.revision_id);
    assert_eq!(default(&workflow, entity).await.revision_id, de_published.revision_id);
    for code in ["en", "fr", "de"] {
        assert_current(&workflow, entity, code, &format!("{code}-name--1")).await;
    }
}

#[tokio::test]
async fn publish_from_creation_revision_keeps_newer_publications() {
    use ModerationState::{Draft, Published};

    let workflow = workflow().await;
    let created = create_published(&workflow, &["en", "fr", "de"]).await;
    let entity = created.entity_id;

    edit_latest(&workflow, entity, "en", "en-name--1", Draft).await;
    workflow.end_cycle().await;
    edit_latest(&workflow, entity, "fr", "fr-name--1", Published).await;
    workflow.end_cycle().await;

    // An editor still holding the creation revision publishes de
    let de_published = save_from(&workflow, created, "de", "de-name--1", Published).await;
    workflow.end_cycle().await;
    assert_eq!(default(&workflow, entity).await.revision_id, de_published.revision_id);
    assert_translation(&de_published, "fr", "fr-name--0", Published);

    assert_current(&workflow, entity, "fr", "fr-name--1").await;
    assert_current(&workflow, entity, "de", "de-name--1").await;
    assert_current(&workflow, entity, "en", "en-name--0").await;

    // The forward revision restores fr's text and en's draft
    let forward = latest(&workflow, entity).await;
    assert!(forward.revision_id > de_published.revision_id);
    assert_translation(&forward, "en", "en-name--1", Draft);
    assert_translation(&forward, "fr", "fr-name--1", Published);
    assert_translation(&forward, "de", "de-name--1", Published);
    assert_eq!(workflow.queue().number_of_items().await.unwrap(), 0);
}

#[tokio::test]
async fn archiving_withdraws_a_translation() {
    use ModerationState::{Archived, Published};

    let workflow = workflow().await;
    let entity = create_published(&workflow, &["en", "fr"]).await.entity_id;

    let archived = edit_latest(&workflow, entity, "en", "en-name--0", Archived).await;
    workflow.end_cycle().await;
    assert_eq!(default(&workflow, entity).await.revision_id, archived.revision_id);

    let en = workflow
        .storage()
        .load_current_translation(entity, &lang("en"))
        .await
        .unwrap();
    assert!(en.is_none());
    assert_current(&workflow, entity, "fr", "fr-name--0").await;

    edit_latest(&workflow, entity, "fr", "fr-name--1", Published).await;
    workflow.end_cycle().await;
    let en = workflow
        .storage()
        .load_current_translation(entity, &lang("en"))
        .await
        .unwrap();
    assert!(en.is_none());
    assert_current(&workflow, entity, "fr", "fr-name--1").await;
}

#[tokio::test]
async fn reconciliation_is_idempotent() {
    use ModerationState::{Draft, Published};

    let workflow = workflow().await;
    let created = create_published(&workflow, &["en", "fr"]).await;
    let entity = created.entity_id;

    save_from(&workflow, created.clone(), "en", "en-draft", Draft).await;
    save_from(&workflow, created, "fr", "fr-name--1", Published).await;
    workflow.end_cycle().await;
    let settled = latest(&workflow, entity).await;
    assert_translation(&settled, "en", "en-draft", Draft);

    // Duplicate tasks for the same entity collapse to no-ops
    for _ in 0..3 {
        let task = ForwardRevisionTask::new(entity).to_value().unwrap();
        workflow.queue().create_item(task).await.unwrap();
    }
    let report = workflow.drain().await.unwrap();
    assert_eq!(report.deleted, 3);
    assert_eq!(latest(&workflow, entity).await.revision_id, settled.revision_id);

    workflow.drain().await.unwrap();
    assert_eq!(latest(&workflow, entity).await.revision_id, settled.revision_id);
}

#[tokio::test]
async fn drain_terminates_with_many_and_unknown_tasks() {
    let workflow = workflow().await;
    let created = create_published(&workflow, &["en", "fr"]).await;

    for n in 0..20 {
        let entity = if n % 2 == 0 { created.entity_id } else { EntityId(1000 + n) };
        let task = ForwardRevisionTask::new(entity).to_value().unwrap();
        workflow.queue().create_item(task).await.unwrap();
    }

    let report = workflow.drain().await.unwrap();
    assert_eq!(report.outcome, DrainOutcome::Drained);
    assert_eq!(report.claimed, 20);
    assert_eq!(report.deleted, 20);
    assert_eq!(workflow.queue().number_of_items().await.unwrap(), 0);
    assert_eq!(latest(&workflow, created.entity_id).await.revision_id, created.revision_id);
}

#[tokio::test]
async fn iteration_limit_defers_remaining_items() {
    let mut config = WorkflowConfig::default();
    config.drain.max_iterations = Some(2);
    let workflow = Workflow::from_config(config).await.unwrap();
    let created = create_published(&workflow, &["en"]).await;

    for _ in 0..5 {
        let task = ForwardRevisionTask::new(created.entity_id).to_value().unwrap();
        workflow.queue().create_item(task).await.unwrap();
    }

    workflow.end_cycle().await;
    let report = workflow.drainer().last_report().await.unwrap();
    assert_eq!(report.outcome, DrainOutcome::LimitReached);
    assert_eq!(workflow.queue().number_of_items().await.unwrap(), 3);

    workflow.end_cycle().await;
    workflow.end_cycle().await;
    assert_eq!(workflow.queue().number_of_items().await.unwrap(), 0);
    let report = workflow.drainer().last_report().await.unwrap();
    assert_eq!(report.outcome, DrainOutcome::Drained);
}

/// Publishes a translation during teardown, before the drain runs.
struct PublishOnTeardown {
    storage: WorkflowStorage,
    entity: EntityId,
}

#[async_trait]
impl TerminateSubscriber for PublishOnTeardown {
    fn name(&self) -> &str {
        "publish_on_teardown"
    }

    fn priority(&self) -> i32 {
        100
    }

    async fn on_terminate(&self) -> Result<(), TeardownError> {
        let mut base = self
            .storage
            .load_latest(self.entity)
            .await?
            .ok_or_else(|| TeardownError::execution("entity vanished"))?;
        let fr = Langcode::new("fr").map_err(|e| TeardownError::execution(e.to_string()))?;
        base.translation_mut(&fr)
            .ok_or_else(|| TeardownError::execution("missing fr"))?
            .set_moderation_state(ModerationState::Published);
        self.storage
            .save(self.entity, SaveRequest::from_revision(base, fr))
            .await?;
        Ok(())
    }
}

#[tokio::test]
async fn drain_runs_after_other_teardown_work() {
    use ModerationState::{Draft, Published};

    let workflow = workflow().await;
    let created = create_published(&workflow, &["en", "fr"]).await;
    let entity = created.entity_id;
    let en_draft = save_from(&workflow, created.clone(), "en", "en-draft", Draft).await;
    save_from(&workflow, en_draft, "fr", "fr-draft", Draft).await;
    workflow.drain().await.unwrap();

    workflow
        .teardown()
        .subscribe(Arc::new(PublishOnTeardown {
            storage: workflow.storage().clone(),
            entity,
        }))
        .await;

    let report = workflow.end_cycle().await;
    assert_eq!(report.completed, vec!["publish_on_teardown", "forward_revision_drain"]);
    assert_eq!(workflow.queue().number_of_items().await.unwrap(), 0);

    let revision = latest(&workflow, entity).await;
    assert_translation(&revision, "en", "en-draft", Draft);
    assert_translation(&revision, "fr", "fr-draft", Published);
}

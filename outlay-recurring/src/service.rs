//! Owner-checked create/edit/toggle/delete of recurring templates.

use std::sync::Arc;

use outlay_core::{OutlayError, RecurringTemplate, Result, TemplateDraft};
use tracing::info;
use uuid::Uuid;

use crate::store::TemplateStore;

pub struct TemplateService {
    templates: Arc<dyn TemplateStore>,
}

impl TemplateService {
    pub fn new(templates: Arc<dyn TemplateStore>) -> Self {
        Self { templates }
    }

    /// Owner's templates, soonest due first.
    pub async fn list(&self, owner_id: i64) -> Result<Vec<RecurringTemplate>> {
        self.templates.list_for_owner(owner_id).await
    }

    pub async fn add(&self, owner_id: i64, draft: TemplateDraft) -> Result<RecurringTemplate> {
        let template = RecurringTemplate::new(owner_id, draft.validate()?);
        self.templates.insert(template.clone()).await?;
        info!(template_id = %template.id, owner_id, "recurring expense added");
        Ok(template)
    }

    pub async fn update(
        &self,
        owner_id: i64,
        id: Uuid,
        draft: TemplateDraft,
    ) -> Result<RecurringTemplate> {
        let fields = draft.validate()?;
        let mut template = self.owned(owner_id, id).await?;
        template.apply(fields);
        self.templates.save(&template).await?;
        Ok(template)
    }

    pub async fn set_active(
        &self,
        owner_id: i64,
        id: Uuid,
        active: bool,
    ) -> Result<RecurringTemplate> {
        self.owned(owner_id, id).await?;
        self.templates.set_active(id, active).await?;
        info!(template_id = %id, active, "recurring expense toggled");
        self.templates
            .get(id)
            .await?
            .ok_or_else(|| OutlayError::not_found("Recurring expense", id))
    }

    pub async fn delete(&self, owner_id: i64, id: Uuid) -> Result<()> {
        self.owned(owner_id, id).await?;
        self.templates.delete(id).await?;
        info!(template_id = %id, "recurring expense deleted");
        Ok(())
    }

    async fn owned(&self, owner_id: i64, id: Uuid) -> Result<RecurringTemplate> {
        let template = self
            .templates
            .get(id)
            .await?
            .ok_or_else(|| OutlayError::not_found("Recurring expense", id))?;
        template.ensure_owner(owner_id)?;
        Ok(template)
    }
}

use rocket::tokio::sync::OnceCell;

use crate::error::PreconditionFailure;
use crate::mailer::{TemplateId, TemplateLookup};

/// The provider-side ID of a named template, looked up once and kept for the
/// life of the process.
///
/// Concurrent first callers share a single lookup. A failed lookup caches
/// nothing, so the next caller tries again.
pub struct TemplateCache {
    name: String,
    id: OnceCell<TemplateId>,
}

impl TemplateCache {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: OnceCell::new(),
        }
    }

    /// A cache that already knows the ID and never looks it up.
    pub fn with_id(name: impl Into<String>, id: TemplateId) -> Self {
        Self {
            name: name.into(),
            id: OnceCell::new_with(Some(id)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cached(&self) -> Option<TemplateId> {
        self.id.get().copied()
    }

    /// Get the template ID, looking it up on first use.
    pub async fn resolve(
        &self,
        lookup: &dyn TemplateLookup,
    ) -> Result<TemplateId, PreconditionFailure> {
        self.id
            .get_or_try_init(|| async {
                match lookup.template_id(&self.name).await {
                    Ok(Some(id)) => {
                        info!("Resolved template {:?} to {id}", self.name);
                        Ok(id)
                    }
                    Ok(None) => Err(PreconditionFailure::TemplateNotFound(self.name.clone())),
                    Err(e) => {
                        error!("Template lookup for {:?} failed: {e}", self.name);
                        Err(PreconditionFailure::TemplateNotFound(self.name.clone()))
                    }
                }
            })
            .await
            .copied()
    }
}

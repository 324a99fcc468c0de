//! Additional-section glue.

use tabula_proto::{Name, Record, RecordType};
use tracing::debug;

use crate::engine::Engine;
use crate::{ResolutionContext, Result};

/// Resolves A, AAAA and CNAME records for a host named by an NS, MX or SRV
/// answer.
///
/// The host is looked up in whichever known zone owns it, with the full
/// exact/wildcard search of the engine. Hosts outside every known zone have
/// no glue.
#[derive(Debug, Clone, Copy)]
pub struct GlueResolver<'a> {
    engine: &'a Engine,
}

impl<'a> GlueResolver<'a> {
    /// Creates a glue resolver backed by `engine`.
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Returns the glue records for `host`.
    pub async fn resolve(&self, ctx: &ResolutionContext, host: &Name) -> Result<Vec<Record>> {
        let Some(zone) = self.engine.catalog().matches(host) else {
            debug!(host = %host, "no glue, host outside known zones");
            return Ok(Vec::new());
        };

        let found = self.engine.find(ctx, &zone, host, &RecordType::GLUE).await?;
        Ok(found.answers)
    }
}

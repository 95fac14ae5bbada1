//! Configuration of a [`CqlTemplate`].
//!
//! ### Example
//! ```
//! # use std::error::Error;
//! # async fn check_only_compiles(session: scylla::client::session::Session) -> Result<(), Box<dyn Error>> {
//! use scylla::statement::Consistency;
//! use scylla_template::client::template::CqlTemplate;
//! use scylla_template::options::{RetryPolicyKind, StatementOptions};
//!
//! let template = CqlTemplate::builder(session)
//!     .default_options(
//!         StatementOptions::builder()
//!             .consistency(Consistency::LocalQuorum)
//!             .retry_policy(RetryPolicyKind::DowngradingConsistency)
//!             .build(),
//!     )
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::debug;

use crate::errors::TemplateBuildError;
use crate::options::StatementOptions;
use crate::session::CqlSession;
use crate::translator::{DefaultExceptionTranslator, ExceptionTranslator};

use super::template::CqlTemplate;

/// `CqlTemplateBuilder` is used to create new [`CqlTemplate`]s.
pub struct CqlTemplateBuilder<S: CqlSession> {
    session: Arc<S>,
    translator: Option<Arc<dyn ExceptionTranslator>>,
    runtime: Option<Handle>,
    default_options: StatementOptions,
}

impl<S: CqlSession> CqlTemplateBuilder<S> {
    pub(crate) fn new(session: S) -> Self {
        Self::from_shared(Arc::new(session))
    }

    /// Starts from a session shared with other users.
    pub fn from_shared(session: Arc<S>) -> Self {
        Self {
            session,
            translator: None,
            runtime: None,
            default_options: StatementOptions::default(),
        }
    }

    /// Sets the translator for backend errors. [`DefaultExceptionTranslator`] by default.
    pub fn translator(mut self, translator: Arc<dyn ExceptionTranslator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Sets the runtime requests are spawned on.
    ///
    /// By default the runtime [`build`](Self::build) is called in.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Sets the options every new operation starts from.
    pub fn default_options(mut self, options: StatementOptions) -> Self {
        self.default_options = options;
        self
    }

    /// Builds the template.
    ///
    /// Fails if no runtime was set and `build` is not called within one.
    pub fn build(self) -> Result<CqlTemplate<S>, TemplateBuildError> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current()?,
        };
        let translator = self
            .translator
            .unwrap_or_else(|| Arc::new(DefaultExceptionTranslator::new()));
        debug!(
            "Building template with translator {:?} and default options {:?}",
            translator, self.default_options
        );

        Ok(CqlTemplate::from_parts(
            self.session,
            translator,
            runtime,
            self.default_options,
        ))
    }
}

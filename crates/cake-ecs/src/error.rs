use crate::component::Phase;
use crate::entity::Entity;

/// Boxed error returned by the embedding application's frame body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure reported by a component callback.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] BoxError),
}

impl ComponentError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// Errors that abort a frame.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    #[error("{phase} of `{component}` on entity {entity} failed")]
    Callback {
        phase: Phase,
        entity: Entity,
        component: &'static str,
        #[source]
        source: ComponentError,
    },

    #[error("frame body failed")]
    FrameBody(#[source] BoxError),
}

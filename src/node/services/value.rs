//! Service layer for node creation and value updates.

use super::{GeneratorCursor, ValueChangeEngine, ValueChangeError};
use crate::node::{
    domain::{NodeDefinition, NodeDescriptor, NodeDomainError, NodeId, NodeSpec, expand_spec},
    ports::{NodeRepository, NodeRepositoryError},
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Service-level errors for node operations.
#[derive(Debug, Error)]
pub enum NodeValueServiceError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] NodeDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] NodeRepositoryError),
    /// Next-value computation failed.
    #[error(transparent)]
    ValueChange(#[from] ValueChangeError),
    /// No node exists with the given identifier.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
}

/// Result type for node service operations.
pub type NodeValueServiceResult<T> = Result<T, NodeValueServiceError>;

/// Outcome of one timed generator step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// Node after the new value was stored.
    pub node: NodeDescriptor,
    /// State to pass to the following step.
    pub cursor: GeneratorCursor,
    /// Delay before the following step.
    pub delay: Duration,
}

/// Node creation and value-update service.
#[derive(Debug)]
pub struct NodeValueService<R>
where
    R: NodeRepository,
{
    repository: Arc<R>,
    engine: Arc<ValueChangeEngine>,
}

impl<R> Clone for NodeValueService<R>
where
    R: NodeRepository,
{
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<R> NodeValueService<R>
where
    R: NodeRepository,
{
    /// Creates a new node service.
    #[must_use]
    pub const fn new(repository: Arc<R>, engine: Arc<ValueChangeEngine>) -> Self {
        Self { repository, engine }
    }

    async fn find_node_or_error(&self, node_id: NodeId) -> NodeValueServiceResult<NodeDescriptor> {
        self.repository
            .find_by_id(node_id)
            .await?
            .ok_or(NodeValueServiceError::NodeNotFound(node_id))
    }

    /// Validates and stores a node.
    ///
    /// # Errors
    ///
    /// Returns domain errors for invalid input and repository errors, such as
    /// a duplicate address, from persistence.
    pub async fn create(&self, spec: NodeSpec) -> NodeValueServiceResult<NodeDescriptor> {
        let definition = NodeDefinition::new(spec)?;
        let node = self.repository.create(definition).await?;
        info!(node_id = %node.id(), address = %node.definition().address(), "node created");
        Ok(node)
    }

    /// Expands a `{n}` / `{start-end}` pattern and stores one node per index.
    ///
    /// Every expanded node is validated before any is stored.
    ///
    /// # Errors
    ///
    /// Returns domain errors for an invalid pattern or node, and repository
    /// errors from persistence.
    pub async fn create_batch(&self, spec: &NodeSpec) -> NodeValueServiceResult<Vec<NodeDescriptor>> {
        let definitions = expand_spec(spec)?
            .into_iter()
            .map(NodeDefinition::new)
            .collect::<Result<Vec<_>, _>>()?;

        let mut created = Vec::with_capacity(definitions.len());
        for definition in definitions {
            created.push(self.repository.create(definition).await?);
        }
        info!(count = created.len(), pattern = %spec.name, "node batch created");
        Ok(created)
    }

    /// Recomputes a conditional node after `trigger_node_id` changed and
    /// stores the result.
    ///
    /// Returns the node unchanged when the trigger does not match.
    ///
    /// # Errors
    ///
    /// Returns [`NodeValueServiceError::NodeNotFound`] when either node is
    /// missing, and value-change or repository errors.
    pub async fn apply_trigger(
        &self,
        node_id: NodeId,
        trigger_node_id: NodeId,
    ) -> NodeValueServiceResult<NodeDescriptor> {
        let node = self.find_node_or_error(node_id).await?;
        let trigger = self.find_node_or_error(trigger_node_id).await?;

        let Some(value) = self.engine.next_value(&node, Some(&trigger))? else {
            debug!(node_id = %node_id, trigger_node_id = %trigger_node_id, "trigger did not match");
            return Ok(node);
        };

        let updated = self
            .repository
            .update_value(node_id, value.to_string())
            .await?;
        info!(
            node_id = %node_id,
            trigger_node_id = %trigger_node_id,
            value = %value,
            "conditional value applied"
        );
        Ok(updated)
    }

    /// Takes one timed generator step and stores the new value.
    ///
    /// Returns `None` for nodes without a timed generator.
    ///
    /// # Errors
    ///
    /// Returns [`NodeValueServiceError::NodeNotFound`] when the node is
    /// missing, and value-change or repository errors.
    pub async fn step(
        &self,
        node_id: NodeId,
        cursor: GeneratorCursor,
    ) -> NodeValueServiceResult<Option<StepOutcome>> {
        let node = self.find_node_or_error(node_id).await?;
        let Some(step) = self.engine.advance(&node, cursor)? else {
            return Ok(None);
        };

        let updated = self
            .repository
            .update_value(node_id, step.value.to_string())
            .await?;
        debug!(node_id = %node_id, value = %step.value, delay_ms = step.delay.as_millis(), "generator stepped");
        Ok(Some(StepOutcome {
            node: updated,
            cursor: step.cursor,
            delay: step.delay,
        }))
    }
}

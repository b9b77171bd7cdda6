use std::sync::Arc;

use super::Project;
use crate::error::ControllerError;
use crate::node::Node;
use crate::pool::BatchPool;

impl Project {
    pub async fn start_all(&self) -> Result<(), ControllerError> {
        self.pool()
            .run(self.nodes(), |node: Arc<Node>| async move {
                node.start().await.map_err(ControllerError::from)
            })
            .await
    }

    pub async fn stop_all(&self) -> Result<(), ControllerError> {
        self.pool()
            .run(self.nodes(), |node: Arc<Node>| async move {
                node.stop().await.map_err(ControllerError::from)
            })
            .await
    }

    pub async fn suspend_all(&self) -> Result<(), ControllerError> {
        self.pool()
            .run(self.nodes(), |node: Arc<Node>| async move {
                node.suspend().await.map_err(ControllerError::from)
            })
            .await
    }

    /// True while at least one node that can be stopped is not stopped.
    pub fn is_running(&self) -> bool {
        self.nodes.iter().any(|node| node.is_running())
    }

    fn pool(&self) -> BatchPool {
        BatchPool::new(self.config.batch_concurrency)
    }
}

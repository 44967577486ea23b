//! Layout operators for background execution.
//!
//! A [`LayoutOperatorFactory`] captures everything a run needs (policy,
//! mesh snapshot and world transform) and hands out [`LayoutOperator`]s:
//! self-contained jobs that can be moved to a worker thread and calculated
//! there.

use std::sync::Arc;

use nalgebra::Affine3;

use super::cancel::Cancellation;
use super::layout::{run_layout, LayoutOutcome, LayoutPolicy};
use crate::error::Result;
use crate::mesh::TriangleMesh;

/// Builds layout operators from the current settings.
#[derive(Debug, Clone)]
pub struct LayoutOperatorFactory {
    /// Settings for the next operator.
    pub policy: LayoutPolicy,
    /// Mesh snapshot shared with the operators.
    pub mesh: Arc<TriangleMesh>,
    /// Object-to-world transform of the mesh.
    pub world_transform: Affine3<f64>,
}

impl LayoutOperatorFactory {
    /// Create a factory with an identity world transform.
    pub fn new(policy: LayoutPolicy, mesh: Arc<TriangleMesh>) -> Self {
        Self {
            policy,
            mesh,
            world_transform: Affine3::identity(),
        }
    }

    /// Set the object-to-world transform.
    pub fn with_world_transform(mut self, world_transform: Affine3<f64>) -> Self {
        self.world_transform = world_transform;
        self
    }

    /// Snapshot the current settings into an operator.
    pub fn make_operator(&self) -> LayoutOperator {
        LayoutOperator {
            policy: self.policy.clone(),
            mesh: Arc::clone(&self.mesh),
            world_transform: self.world_transform,
        }
    }
}

/// One immutable layout job.
#[derive(Debug, Clone)]
pub struct LayoutOperator {
    policy: LayoutPolicy,
    mesh: Arc<TriangleMesh>,
    world_transform: Affine3<f64>,
}

impl LayoutOperator {
    /// The policy the operator runs with.
    pub fn policy(&self) -> &LayoutPolicy {
        &self.policy
    }

    /// The mesh the operator reads.
    pub fn mesh(&self) -> &Arc<TriangleMesh> {
        &self.mesh
    }

    /// Run the layout.
    pub fn calculate(&self, cancel: &dyn Cancellation) -> Result<LayoutOutcome> {
        run_layout(&self.policy, &self.mesh, &self.world_transform, cancel)
    }
}

//! Services the surrounding host provides to the normalizer
//!
//! Nodes and fields leave the pipeline only through these traits, so a host
//! can store them anywhere. `NodeCollector` keeps them in memory.

use super::types::{Node, NodeField};
use crate::error::Result;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Source of globally unique node ids
pub trait IdGenerator: Send + Sync {
    /// A fresh id
    fn generate(&self) -> String;
}

/// Random v4 UUIDs
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// `<prefix>-1`, `<prefix>-2`, ... for reproducible output
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    /// Create a generator producing `<prefix>-<n>`
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }
}

/// Receives created nodes
pub trait NodeSink: Send + Sync {
    /// Register a node
    fn create_node(&self, node: &Node) -> Result<()>;
}

/// Receives derived fields
pub trait FieldSink: Send + Sync {
    /// Register a field value for `node`
    fn create_field(&self, node: &Node, name: &str, value: Value) -> Result<()>;
}

/// In-memory node and field store
#[derive(Debug, Default)]
pub struct NodeCollector {
    nodes: Mutex<Vec<Node>>,
    fields: Mutex<Vec<NodeField>>,
}

impl NodeCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes received so far, in order
    pub fn nodes(&self) -> Vec<Node> {
        self.nodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fields received so far, in order
    pub fn fields(&self) -> Vec<NodeField> {
        self.fields
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain everything received so far
    pub fn take(&self) -> (Vec<Node>, Vec<NodeField>) {
        let nodes = std::mem::take(&mut *self.nodes.lock().unwrap_or_else(PoisonError::into_inner));
        let fields =
            std::mem::take(&mut *self.fields.lock().unwrap_or_else(PoisonError::into_inner));
        (nodes, fields)
    }
}

impl NodeSink for NodeCollector {
    fn create_node(&self, node: &Node) -> Result<()> {
        self.nodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(node.clone());
        Ok(())
    }
}

impl FieldSink for NodeCollector {
    fn create_field(&self, node: &Node, name: &str, value: Value) -> Result<()> {
        self.fields
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(NodeField {
                node_id: node.id.clone(),
                name: name.to_string(),
                value,
            });
        Ok(())
    }
}

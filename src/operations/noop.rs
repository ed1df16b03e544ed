// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagflow contributors

//! No-op operation: logs its parameters and succeeds

use async_trait::async_trait;

use super::{Operation, OperationError};
use crate::pipeline::Parameters;

pub struct NoopOperation;

#[async_trait]
impl Operation for NoopOperation {
    async fn execute(&self, parameters: &Parameters) -> Result<(), OperationError> {
        let keys: Vec<&str> = parameters.keys().map(String::as_str).collect();
        tracing::info!(parameters = ?keys, "noop");
        Ok(())
    }
}

//! Test helpers for constraints that use ValidationContext.

use crate::core::{validation_context::CURRENT_CONTEXT, Constraint, ExpectationOutcome, ValidationContext};
use crate::prelude::*;
use arrow::array::ArrayRef;
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;
use std::sync::Arc;

/// Evaluates a constraint with the given table name in the validation context.
pub async fn evaluate_constraint_with_context(
    constraint: &dyn Constraint,
    ctx: &SessionContext,
    table_name: &str,
) -> Result<ExpectationOutcome> {
    let validation_ctx = ValidationContext::new(table_name);
    CURRENT_CONTEXT
        .scope(validation_ctx, constraint.evaluate(ctx))
        .await
}

/// Registers a single-batch in-memory table built from named columns.
pub fn register_columns(ctx: &SessionContext, table_name: &str, columns: Vec<(&str, ArrayRef)>) {
    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
            .collect::<Vec<_>>(),
    ));
    let batch = RecordBatch::try_new(
        schema.clone(),
        columns.into_iter().map(|(_, array)| array).collect(),
    )
    .unwrap();
    let provider = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
    ctx.register_table(table_name, Arc::new(provider)).unwrap();
}

/// Creates a context with a one-column table named `data`.
pub fn single_column_context(column: &str, array: ArrayRef) -> SessionContext {
    let ctx = SessionContext::new();
    register_columns(&ctx, "data", vec![(column, array)]);
    ctx
}
